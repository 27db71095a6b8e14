//! Variables, attributes and the static variable universe.

use crate::errors::VarsError;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a variable within its universe
pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSpaceType {
    Real,
    FiniteSet(usize),
}

impl StateSpaceType {
    pub fn number_of_states(&self) -> Option<usize> {
        match self {
            StateSpaceType::FiniteSet(k) => Some(*k),
            StateSpaceType::Real => None,
        }
    }
}

/// Distribution family attached to a variable.
///
/// * `Multinomial`, `Normal` - observed attribute variables
/// * `Gaussian`, `InverseGamma`, `Dirichlet(k)` - conjugate priors of
///   parameter variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionFamily {
    Multinomial,
    Normal,
    Gaussian,
    InverseGamma,
    Dirichlet(usize),
}

impl DistributionFamily {
    /// Family for an observed attribute over `state_space`
    pub fn for_attribute(state_space: StateSpaceType) -> Self {
        match state_space {
            StateSpaceType::FiniteSet(_) => DistributionFamily::Multinomial,
            StateSpaceType::Real => DistributionFamily::Normal,
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(
            self,
            DistributionFamily::Gaussian
                | DistributionFamily::InverseGamma
                | DistributionFamily::Dirichlet(_)
        )
    }

    /// Length of the sufficient statistics (and natural parameters)
    pub fn sufficient_statistic_dim(&self, state_space: StateSpaceType) -> usize {
        match self {
            DistributionFamily::Dirichlet(k) => *k,
            DistributionFamily::Multinomial => state_space.number_of_states().unwrap_or(1),
            DistributionFamily::Normal
            | DistributionFamily::Gaussian
            | DistributionFamily::InverseGamma => 2,
        }
    }
}

/// Where a variable comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRole {
    /// backed by the attribute at this column
    Attribute(usize),
    /// time (T-1) copy of the main variable `main`
    Interface { main: VarId },
    /// latent model parameter
    Parameter,
}

/// Immutable identity of a random variable.
///
/// Two variables are equal iff their ids are equal.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VarId,
    name: String,
    observable: bool,
    state_space: StateSpaceType,
    family: DistributionFamily,
    role: VariableRole,
}

impl Variable {
    pub fn new(
        id: VarId,
        name: &str,
        observable: bool,
        state_space: StateSpaceType,
        family: DistributionFamily,
        role: VariableRole,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            observable,
            state_space,
            family,
            role,
        }
    }

    pub(crate) fn parameter(
        id: VarId,
        name: &str,
        state_space: StateSpaceType,
        family: DistributionFamily,
    ) -> Self {
        Self::new(id, name, false, state_space, family, VariableRole::Parameter)
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_observable(&self) -> bool {
        self.observable
    }

    pub fn state_space(&self) -> StateSpaceType {
        self.state_space
    }

    pub fn family(&self) -> DistributionFamily {
        self.family
    }

    pub fn role(&self) -> VariableRole {
        self.role
    }

    /// `None` for real-valued variables
    pub fn number_of_states(&self) -> Option<usize> {
        self.state_space.number_of_states()
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.role, VariableRole::Parameter)
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.role, VariableRole::Interface { .. })
    }

    /// Column of the backing attribute, if any
    pub fn attribute_index(&self) -> Option<usize> {
        match self.role {
            VariableRole::Attribute(j) => Some(j),
            _ => None,
        }
    }

    pub fn sufficient_statistic_dim(&self) -> usize {
        self.family.sufficient_statistic_dim(self.state_space)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A column of the data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub index: usize,
    pub name: String,
    pub state_space: StateSpaceType,
}

/// Ordered attribute schema with unique names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    attributes: Vec<Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from `(name, state space)` pairs
    pub fn from_columns(columns: &[(&str, StateSpaceType)]) -> Result<Self, VarsError> {
        let mut ret = Self::new();
        for (name, state_space) in columns {
            ret.push(name, *state_space)?;
        }
        Ok(ret)
    }

    /// Append a new column; returns its index
    pub fn push(&mut self, name: &str, state_space: StateSpaceType) -> Result<usize, VarsError> {
        if self.attributes.iter().any(|a| a.name == name) {
            return Err(VarsError::DuplicateName(name.to_string()));
        }
        let index = self.attributes.len();
        self.attributes.push(Attribute {
            index,
            name: name.to_string(),
            state_space,
        });
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }
}

/// Anything that owns a contiguous block of variable ids starting at 0.
///
/// A parameter registry built on top of a universe starts minting ids
/// at `number_of_ids()`.
pub trait VariableUniverse {
    fn number_of_ids(&self) -> usize;
}

/// Static variables: one observed variable per attribute
#[derive(Debug, Clone)]
pub struct Variables {
    attributes: Attributes,
    variables: Vec<Variable>,
    name_to_id: HashMap<String, VarId>,
}

impl Variables {
    pub fn new(attributes: &Attributes) -> Self {
        let variables: Vec<Variable> = attributes
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
        let name_to_id = variables
            .iter()
            .map(|v| (v.name().to_string(), v.id()))
            .collect();
        Self {
            attributes: attributes.clone(),
            variables,
            name_to_id,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get_variable_by_id(&self, id: VarId) -> Result<&Variable, VarsError> {
        self.variables.get(id).ok_or(VarsError::UnknownVariable(id))
    }

    pub fn get_variable_by_name(&self, name: &str) -> Result<&Variable, VarsError> {
        let id = self
            .name_to_id
            .get(name)
            .ok_or_else(|| VarsError::UnknownName(name.to_string()))?;
        self.get_variable_by_id(*id)
    }

    pub fn number_of_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }
}

impl VariableUniverse for Variables {
    fn number_of_ids(&self) -> usize {
        self.variables.len()
    }
}
