//! Variables of a dynamic (two-slice) Bayesian network.
//!
//! Main variables take ids `0..n` in attribute order. Each main variable
//! has an interface (time T-1) copy with id `n + main_id`, named
//! `<name>_Interface`. The link between the two is kept as a lookup
//! table in both directions, not as references between variables.

use crate::errors::VarsError;
use crate::variables::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DynamicVariables {
    attributes: Attributes,
    main_vars: Vec<Variable>,
    interface_vars: Vec<Variable>,
    /// main id -> interface id
    main_to_interface: Vec<VarId>,
    /// interface id -> main id
    interface_to_main: HashMap<VarId, VarId>,
    name_to_id: HashMap<String, VarId>,
}

pub const INTERFACE_SUFFIX: &str = "_Interface";

impl DynamicVariables {
    pub fn new(attributes: &Attributes) -> Self {
        let n = attributes.len();

        let main_vars: Vec<Variable> = attributes
            .iter()
            .map(|a| {
                Variable::new(
                    a.index,
                    &a.name,
                    true,
                    a.state_space,
                    DistributionFamily::for_attribute(a.state_space),
                    VariableRole::Attribute(a.index),
                )
            })
            .collect();

        let interface_vars: Vec<Variable> = main_vars
            .iter()
            .map(|v| {
                Variable::new(
                    n + v.id(),
                    &format!("{}{}", v.name(), INTERFACE_SUFFIX),
                    true,
                    v.state_space(),
                    v.family(),
                    VariableRole::Interface { main: v.id() },
                )
            })
            .collect();

        let main_to_interface = interface_vars.iter().map(|v| v.id()).collect();
        let interface_to_main = interface_vars.iter().map(|v| (v.id(), v.id() - n)).collect();

        let name_to_id = main_vars
            .iter()
            .chain(interface_vars.iter())
            .map(|v| (v.name().to_string(), v.id()))
            .collect();

        Self {
            attributes: attributes.clone(),
            main_vars,
            interface_vars,
            main_to_interface,
            interface_to_main,
            name_to_id,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Number of time-T (main) variables
    pub fn number_of_vars(&self) -> usize {
        self.main_vars.len()
    }

    /// Look up a main or interface variable
    pub fn get_variable_by_id(&self, id: VarId) -> Result<&Variable, VarsError> {
        let n = self.main_vars.len();
        if id < n {
            Ok(&self.main_vars[id])
        } else {
            self.interface_vars
                .get(id - n)
                .ok_or(VarsError::UnknownVariable(id))
        }
    }

    pub fn get_variable_by_name(&self, name: &str) -> Result<&Variable, VarsError> {
        let id = self
            .name_to_id
            .get(name)
            .ok_or_else(|| VarsError::UnknownName(name.to_string()))?;
        self.get_variable_by_id(*id)
    }

    /// Interface (time T-1) copy of a main variable
    pub fn get_interface_variable(&self, main: &Variable) -> Result<&Variable, VarsError> {
        let interface_id = self
            .main_to_interface
            .get(main.id())
            .ok_or(VarsError::UnknownVariable(main.id()))?;
        self.get_variable_by_id(*interface_id)
    }

    /// Main variable behind an interface variable
    pub fn get_main_variable(&self, interface: &Variable) -> Result<&Variable, VarsError> {
        let main_id = self
            .interface_to_main
            .get(&interface.id())
            .ok_or(VarsError::UnknownVariable(interface.id()))?;
        self.get_variable_by_id(*main_id)
    }

    /// Time-T variables in id order
    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.main_vars.iter()
    }

    pub fn interface_variables(&self) -> std::slice::Iter<'_, Variable> {
        self.interface_vars.iter()
    }
}

impl VariableUniverse for DynamicVariables {
    fn number_of_ids(&self) -> usize {
        self.main_vars.len() + self.interface_vars.len()
    }
}
