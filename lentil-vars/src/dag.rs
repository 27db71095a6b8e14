//! Two-slice directed acyclic graph of a dynamic Bayesian network.
//!
//! Every time-T variable owns a parent set. Parents are either time-T
//! variables or interface (time T-1) variables. The time-0 slice has no
//! past, so its parent sets are the time-T ones without interface parents.

use crate::dynamic_variables::DynamicVariables;
use crate::errors::VarsError;
use crate::variables::{VarId, Variable};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ParentSet {
    main_var: Variable,
    parents: Vec<Variable>,
}

impl ParentSet {
    fn new(main_var: Variable) -> Self {
        Self {
            main_var,
            parents: vec![],
        }
    }

    pub fn main_var(&self) -> &Variable {
        &self.main_var
    }

    pub fn parents(&self) -> &[Variable] {
        &self.parents
    }

    pub fn number_of_parents(&self) -> usize {
        self.parents.len()
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.parents.contains(var)
    }

    /// Add an edge `parent -> main_var`.
    ///
    /// Self edges and duplicated edges are rejected.
    pub fn add_parent(&mut self, parent: &Variable) -> Result<(), VarsError> {
        if parent == &self.main_var || self.contains(parent) {
            return Err(VarsError::InvalidEdge {
                parent: parent.name().to_string(),
                child: self.main_var.name().to_string(),
            });
        }
        self.parents.push(parent.clone());
        Ok(())
    }

    pub fn remove_parent(&mut self, parent: &Variable) -> bool {
        let before = self.parents.len();
        self.parents.retain(|p| p != parent);
        before != self.parents.len()
    }
}

impl fmt::Display for ParentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.parents.iter().map(|p| p.name()).collect();
        write!(
            f,
            "{} has {} parent(s): {{{}}}",
            self.main_var.name(),
            names.len(),
            names.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub struct DynamicDag {
    variables: Arc<DynamicVariables>,
    parent_sets_time_t: Vec<ParentSet>,
}

impl DynamicDag {
    /// Empty graph over `variables`
    pub fn new(variables: Arc<DynamicVariables>) -> Self {
        let parent_sets_time_t = variables.iter().cloned().map(ParentSet::new).collect();
        Self {
            variables,
            parent_sets_time_t,
        }
    }

    pub fn variables(&self) -> &Arc<DynamicVariables> {
        &self.variables
    }

    pub fn parent_sets_time_t(&self) -> &[ParentSet] {
        &self.parent_sets_time_t
    }

    pub fn parent_sets_time_t_mut(&mut self) -> std::slice::IterMut<'_, ParentSet> {
        self.parent_sets_time_t.iter_mut()
    }

    pub fn parent_set_time_t(&self, var: &Variable) -> Result<&ParentSet, VarsError> {
        self.parent_sets_time_t
            .get(var.id())
            .filter(|ps| ps.main_var == *var)
            .ok_or(VarsError::UnknownVariable(var.id()))
    }

    pub fn parent_set_time_t_mut(&mut self, var: &Variable) -> Result<&mut ParentSet, VarsError> {
        self.parent_sets_time_t
            .get_mut(var.id())
            .filter(|ps| ps.main_var == *var)
            .ok_or(VarsError::UnknownVariable(var.id()))
    }

    /// Parents in the first slice: interface parents dropped
    pub fn parents_time_0(&self, var: &Variable) -> Result<Vec<Variable>, VarsError> {
        Ok(self
            .parent_set_time_t(var)?
            .parents()
            .iter()
            .filter(|p| !p.is_interface())
            .cloned()
            .collect())
    }

    /// Cycle check over intra-slice (time T) edges.
    /// Interface parents point backwards in time and never close a cycle.
    pub fn contains_cycles(&self) -> bool {
        let n = self.parent_sets_time_t.len();
        // 0: unvisited, 1: on stack, 2: done
        let mut state = vec![0u8; n];

        fn visit(v: VarId, sets: &[ParentSet], state: &mut [u8]) -> bool {
            state[v] = 1;
            for p in sets[v].parents().iter().filter(|p| !p.is_interface()) {
                let u = p.id();
                if u >= sets.len() {
                    continue;
                }
                if state[u] == 1 || (state[u] == 0 && visit(u, sets, state)) {
                    return true;
                }
            }
            state[v] = 2;
            false
        }

        (0..n).any(|v| state[v] == 0 && visit(v, &self.parent_sets_time_t, &mut state))
    }
}

impl fmt::Display for DynamicDag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DAG Time T")?;
        for ps in self.parent_sets_time_t.iter() {
            writeln!(f, "{}", ps)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{Attributes, StateSpaceType};

    fn dag() -> DynamicDag {
        let attributes = Attributes::from_columns(&[
            ("A", StateSpaceType::FiniteSet(2)),
            ("B", StateSpaceType::FiniteSet(2)),
            ("C", StateSpaceType::Real),
        ])
        .unwrap();
        DynamicDag::new(Arc::new(DynamicVariables::new(&attributes)))
    }

    #[test]
    fn test_self_and_duplicated_edges() {
        let mut dag = dag();
        let vars = dag.variables().clone();
        let a = vars.get_variable_by_id(0).unwrap();
        let b = vars.get_variable_by_id(1).unwrap();

        let ps = dag.parent_set_time_t_mut(a).unwrap();
        assert!(ps.add_parent(a).is_err());
        ps.add_parent(b).unwrap();
        assert!(ps.add_parent(b).is_err());
        assert_eq!(ps.number_of_parents(), 1);
    }

    #[test]
    fn test_cycles_ignore_interface_edges() {
        let mut dag = dag();
        let vars = dag.variables().clone();
        let a = vars.get_variable_by_id(0).unwrap();
        let b = vars.get_variable_by_id(1).unwrap();
        let a_if = vars.get_interface_variable(a).unwrap();

        dag.parent_set_time_t_mut(a).unwrap().add_parent(a_if).unwrap();
        dag.parent_set_time_t_mut(b).unwrap().add_parent(a).unwrap();
        assert!(!dag.contains_cycles());
        assert_eq!(dag.parents_time_0(a).unwrap().len(), 0);

        dag.parent_set_time_t_mut(a).unwrap().add_parent(b).unwrap();
        assert!(dag.contains_cycles());
    }
}
