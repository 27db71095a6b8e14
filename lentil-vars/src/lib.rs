//! Variables, parameter variables and two-slice DAGs.
//!
//! Attribute schemas become variable universes ([`Variables`],
//! [`DynamicVariables`]); latent model parameters are minted by a
//! [`ParameterVariablesBuilder`] and frozen into a [`ParameterVariables`]
//! registry before any learning starts.

/// Error taxonomy for registry and structure misuse
pub mod errors;

/// Variable identity, attributes and the static universe
pub mod variables;

/// Main and interface variables of a dynamic network
pub mod dynamic_variables;

/// Parameter-variable registry (builder and blocked phases)
pub mod registry;

/// Two-slice DAG
pub mod dag;

pub use dag::{DynamicDag, ParentSet};
pub use dynamic_variables::DynamicVariables;
pub use errors::VarsError;
pub use registry::{
    ParameterFactory, ParameterLookup, ParameterVariables, ParameterVariablesBuilder,
};
pub use variables::{
    Attribute, Attributes, DistributionFamily, StateSpaceType, VarId, Variable, VariableRole,
    VariableUniverse, Variables,
};
