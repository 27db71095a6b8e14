//! Variational Bayesian learning of dynamic naive-Bayes networks.
//!
//! A [`DynamicDag`](lentil_vars::DynamicDag) is turned into a conjugate
//! exponential-family model ([`model::ExpFamilyModel`]) whose posterior
//! lives in one [`natural_params::CompoundVector`]. The posterior is
//! learned by batch (optionally parallel) variational message passing
//! ([`engine`]) or by stochastic VI over batches ([`svi`]), and scored
//! with [`elbo::compute_elbo`].

pub mod config;
pub mod data;
pub mod expfam;
pub mod natural_params;
pub mod structure;

/// Parameter variables and priors of a supported DAG
pub mod model;

/// Per-sequence mean-field refinement and message accumulation
pub mod local;

pub mod engine;
pub mod svi;
pub mod elbo;

/// Class-variable facade over structure and parameter learning
pub mod classifier;

/// Random networks and sequences for tests and experiments
pub mod sampler;

pub use classifier::DynamicNaiveBayesClassifier;
pub use config::{LearningRate, LocalConfig, PriorConfig, SviConfig, VmpConfig};
pub use data::{DataInstance, DataOnMemory, DataStream, Sequence};
pub use elbo::compute_elbo;
pub use engine::{learn, learn_from, LearnedModel, LearningReport};
pub use local::LocalAccumulator;
pub use model::ExpFamilyModel;
pub use natural_params::CompoundVector;
pub use sampler::{sample_dynamic_naive_bayes, SamplerConfig, SyntheticNetwork};
pub use structure::{naive_bayes_structure, static_naive_bayes_structure, StructureLearner};
pub use svi::{StochasticVI, StopReason, SviReport};
