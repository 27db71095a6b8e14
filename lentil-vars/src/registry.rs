//! Registry of latent parameter variables.
//!
//! Parameter variables get ids right after the variables of the
//! enclosing universe, so the two never collide. The registry goes
//! through two phases:
//!
//! 1. [`ParameterVariablesBuilder`] - single-threaded model construction,
//!    parameters are appended in order
//! 2. [`ParameterVariables`] - returned by `block()`, read-only and
//!    shareable across worker threads
//!
//! Both phases implement [`ParameterFactory`]; the blocked registry
//! answers every creation request with [`VarsError::RegistrySealed`].

use crate::errors::VarsError;
use crate::variables::*;
use std::collections::HashMap;

/// Create parameter variables.
pub trait ParameterFactory {
    fn new_parameter(
        &mut self,
        name: &str,
        state_space: StateSpaceType,
        family: DistributionFamily,
    ) -> Result<Variable, VarsError>;

    /// Mean of a Normal distribution
    fn new_gaussian_parameter(&mut self, name: &str) -> Result<Variable, VarsError> {
        self.new_parameter(name, StateSpaceType::Real, DistributionFamily::Gaussian)
    }

    /// Variance of a Normal distribution
    fn new_inverse_gamma_parameter(&mut self, name: &str) -> Result<Variable, VarsError> {
        self.new_parameter(name, StateSpaceType::Real, DistributionFamily::InverseGamma)
    }

    /// Probability vector of a Multinomial distribution with `k` states
    fn new_dirichlet_parameter(&mut self, name: &str, k: usize) -> Result<Variable, VarsError> {
        self.new_parameter(
            name,
            StateSpaceType::FiniteSet(k),
            DistributionFamily::Dirichlet(k),
        )
    }
}

/// Read access shared by both phases
pub trait ParameterLookup {
    fn base_index(&self) -> usize;
    fn variables(&self) -> &[Variable];
    fn name_to_id(&self) -> &HashMap<String, VarId>;

    /// O(1) lookup by offset from the base index
    fn get_variable_by_id(&self, id: VarId) -> Result<&Variable, VarsError> {
        let base = self.base_index();
        let len = self.variables().len();
        if id < base || id >= base + len {
            return Err(VarsError::OutOfRange { id, base, len });
        }
        Ok(&self.variables()[id - base])
    }

    fn get_variable_by_name(&self, name: &str) -> Result<&Variable, VarsError> {
        let id = self
            .name_to_id()
            .get(name)
            .ok_or_else(|| VarsError::UnknownName(name.to_string()))?;
        self.get_variable_by_id(*id)
    }

    /// Position of a parameter variable in insertion order
    fn offset(&self, var: &Variable) -> Result<usize, VarsError> {
        self.get_variable_by_id(var.id())?;
        Ok(var.id() - self.base_index())
    }

    fn len(&self) -> usize {
        self.variables().len()
    }

    fn is_empty(&self) -> bool {
        self.variables().is_empty()
    }

    fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables().iter()
    }
}

/// Mutable phase of the registry
#[derive(Debug, Clone)]
pub struct ParameterVariablesBuilder {
    base_index: usize,
    variables: Vec<Variable>,
    name_to_id: HashMap<String, VarId>,
}

impl ParameterVariablesBuilder {
    /// Start minting ids at `base_index`
    pub fn new(base_index: usize) -> Self {
        Self {
            base_index,
            variables: vec![],
            name_to_id: HashMap::new(),
        }
    }

    /// Start minting ids right after the variables of `universe`
    pub fn for_universe<U: VariableUniverse>(universe: &U) -> Self {
        Self::new(universe.number_of_ids())
    }

    /// Freeze the registry; no more parameters can be added.
    pub fn block(self) -> ParameterVariables {
        ParameterVariables {
            base_index: self.base_index,
            variables: self.variables,
            name_to_id: self.name_to_id,
        }
    }
}

impl ParameterFactory for ParameterVariablesBuilder {
    fn new_parameter(
        &mut self,
        name: &str,
        state_space: StateSpaceType,
        family: DistributionFamily,
    ) -> Result<Variable, VarsError> {
        if self.name_to_id.contains_key(name) {
            return Err(VarsError::DuplicateName(name.to_string()));
        }
        let id = self.base_index + self.variables.len();
        let var = Variable::parameter(id, name, state_space, family);
        self.name_to_id.insert(name.to_string(), id);
        self.variables.push(var.clone());
        Ok(var)
    }
}

impl ParameterLookup for ParameterVariablesBuilder {
    fn base_index(&self) -> usize {
        self.base_index
    }
    fn variables(&self) -> &[Variable] {
        &self.variables
    }
    fn name_to_id(&self) -> &HashMap<String, VarId> {
        &self.name_to_id
    }
}

/// Blocked (read-only) phase of the registry
#[derive(Debug, Clone)]
pub struct ParameterVariables {
    base_index: usize,
    variables: Vec<Variable>,
    name_to_id: HashMap<String, VarId>,
}

impl ParameterVariables {
    /// Already blocked
    pub fn block(self) -> Self {
        self
    }
}

impl ParameterFactory for ParameterVariables {
    fn new_parameter(
        &mut self,
        name: &str,
        _state_space: StateSpaceType,
        _family: DistributionFamily,
    ) -> Result<Variable, VarsError> {
        Err(VarsError::RegistrySealed(name.to_string()))
    }
}

impl ParameterLookup for ParameterVariables {
    fn base_index(&self) -> usize {
        self.base_index
    }
    fn variables(&self) -> &[Variable] {
        &self.variables
    }
    fn name_to_id(&self) -> &HashMap<String, VarId> {
        &self.name_to_id
    }
}

impl<'a> IntoIterator for &'a ParameterVariables {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}
