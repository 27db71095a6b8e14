//! Structure templates.
//!
//! A structure strategy maps a variable universe and the id of the class
//! variable to a DAG. Any `Fn(&Arc<DynamicVariables>, VarId)` with the
//! right return type is a strategy, so alternative templates can be
//! handed to the classifier without touching the learning code.

use lentil_vars::{DynamicDag, DynamicVariables, VarId, VarsError};
use std::sync::Arc;

pub trait StructureLearner {
    fn learn_structure(
        &self,
        variables: &Arc<DynamicVariables>,
        class_var_id: VarId,
    ) -> Result<DynamicDag, VarsError>;
}

impl<F> StructureLearner for F
where
    F: Fn(&Arc<DynamicVariables>, VarId) -> Result<DynamicDag, VarsError>,
{
    fn learn_structure(
        &self,
        variables: &Arc<DynamicVariables>,
        class_var_id: VarId,
    ) -> Result<DynamicDag, VarsError> {
        self(variables, class_var_id)
    }
}

/// Dynamic naive Bayes: the class is a parent of every other time-T
/// variable, and the class depends on its own previous slice.
pub fn naive_bayes_structure(
    variables: &Arc<DynamicVariables>,
    class_var_id: VarId,
) -> Result<DynamicDag, VarsError> {
    let class_var = main_variable(variables, class_var_id)?;
    let mut dag = DynamicDag::new(variables.clone());

    for ps in dag.parent_sets_time_t_mut() {
        if ps.main_var() != class_var {
            ps.add_parent(class_var)?;
        }
    }

    let interface = variables.get_interface_variable(class_var)?;
    dag.parent_set_time_t_mut(class_var)?.add_parent(interface)?;

    Ok(dag)
}

/// Naive Bayes within each slice, without the class transition.
pub fn static_naive_bayes_structure(
    variables: &Arc<DynamicVariables>,
    class_var_id: VarId,
) -> Result<DynamicDag, VarsError> {
    let class_var = main_variable(variables, class_var_id)?;
    let mut dag = DynamicDag::new(variables.clone());

    for ps in dag.parent_sets_time_t_mut() {
        if ps.main_var() != class_var {
            ps.add_parent(class_var)?;
        }
    }

    Ok(dag)
}

/// Time-T variables only; interface ids are not valid class ids
fn main_variable(
    variables: &DynamicVariables,
    id: VarId,
) -> Result<&lentil_vars::Variable, VarsError> {
    if id >= variables.number_of_vars() {
        return Err(VarsError::UnknownVariable(id));
    }
    variables.get_variable_by_id(id)
}
