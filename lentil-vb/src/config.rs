//! Learning configurations.
//!
//! Every learning call receives its own immutable configuration, so
//! independent sessions can run side by side.

use std::time::Duration;

/// Hyper-parameters of the conjugate priors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorConfig {
    /// Dirichlet pseudo-count per state. Default: 1.0
    pub dirichlet_alpha: f64,
    /// Prior mean of Normal means. Default: 0.0
    pub gaussian_mean: f64,
    /// Prior variance of Normal means. Default: 1e4
    pub gaussian_variance: f64,
    /// Inverse-gamma shape of Normal variances. Default: 1.0
    pub inverse_gamma_shape: f64,
    /// Inverse-gamma scale of Normal variances. Default: 1.0
    pub inverse_gamma_scale: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            dirichlet_alpha: 1.0,
            gaussian_mean: 0.0,
            gaussian_variance: 1e4,
            inverse_gamma_shape: 1.0,
            inverse_gamma_scale: 1.0,
        }
    }
}

/// Bounds on the per-sequence variational refinement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalConfig {
    /// Maximum number of sweeps over a sequence; zero leaves latent
    /// class slots uniform. Default: 50
    pub iteration_cap: usize,
    /// Stop when no local posterior moves more than this. Default: 1e-3
    pub threshold: f64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            iteration_cap: 50,
            threshold: 1e-3,
        }
    }
}

/// Options for batch (and parallel) variational message passing.
#[derive(Debug, Clone, PartialEq)]
pub struct VmpConfig {
    /// Maximum number of global rounds. Default: 100
    pub global_iteration_cap: usize,
    /// Relative ELBO change below which learning may stop. Default: 1e-10
    pub global_threshold: f64,
    /// Learning stops only once a round also moves no natural parameter
    /// by more than this. Default: 1e-6
    pub parameter_threshold: f64,
    /// Maximum number of local sweeps per sequence. Default: 50
    pub local_iteration_cap: usize,
    /// Local convergence threshold. Default: 1e-3
    pub local_threshold: f64,
    /// Process sequences on the rayon pool. Default: true
    pub parallel: bool,
    /// Random seed of the initial posterior. Default: 0
    pub seed: u64,
    /// Wall-clock limit, checked between rounds. Default: none
    pub time_limit: Option<Duration>,
    pub priors: PriorConfig,
    /// Draw a progress bar over the global rounds. Default: false
    pub show_progress: bool,
}

impl Default for VmpConfig {
    fn default() -> Self {
        Self {
            global_iteration_cap: 100,
            global_threshold: 1e-10,
            parameter_threshold: 1e-6,
            local_iteration_cap: 50,
            local_threshold: 1e-3,
            parallel: true,
            seed: 0,
            time_limit: None,
            priors: PriorConfig::default(),
            show_progress: false,
        }
    }
}

impl VmpConfig {
    pub fn local(&self) -> LocalConfig {
        LocalConfig {
            iteration_cap: self.local_iteration_cap,
            threshold: self.local_threshold,
        }
    }
}

/// Step size of the stochastic natural-gradient update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LearningRate {
    /// constant ρ in (0, 1]
    Fixed(f64),
    /// ρ_t = (t + delay)^(-forgetting) with delay >= 1 and forgetting in (0.5, 1]
    RobbinsMonro { delay: f64, forgetting: f64 },
}

impl LearningRate {
    /// Step size of the `t`-th batch (0-based)
    pub fn at(&self, t: usize) -> f64 {
        match self {
            LearningRate::Fixed(rho) => *rho,
            LearningRate::RobbinsMonro { delay, forgetting } => {
                (t as f64 + delay).powf(-forgetting)
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            LearningRate::Fixed(rho) => {
                if !(*rho > 0.0 && *rho <= 1.0) {
                    anyhow::bail!("learning rate must be in (0, 1], got {}", rho);
                }
            }
            LearningRate::RobbinsMonro { delay, forgetting } => {
                if *delay < 1.0 {
                    anyhow::bail!("learning-rate delay must be >= 1, got {}", delay);
                }
                if !(*forgetting > 0.5 && *forgetting <= 1.0) {
                    anyhow::bail!("forgetting rate must be in (0.5, 1], got {}", forgetting);
                }
            }
        }
        Ok(())
    }
}

/// Options for stochastic variational inference.
#[derive(Debug, Clone, PartialEq)]
pub struct SviConfig {
    /// Local refinement, parallelism, seed and priors
    pub vmp: VmpConfig,
    /// Minimum number of instances per batch. Default: 1000
    pub batch_size: usize,
    /// Default: fixed 0.5
    pub learning_rate: LearningRate,
    /// Size of the full data set the batches are drawn from; `None`
    /// counts the stream in a separate pass before the first update
    pub dataset_size: Option<usize>,
    /// Wall-clock limit, checked between batches. Default: none
    pub time_limit: Option<Duration>,
    /// Refine the local posteriors of the first batch. With `false` (for
    /// a posterior seeded from an earlier run) the first batch runs no
    /// local sweeps: observed classes count as they are and latent ones
    /// stay uniform. Default: true
    pub vmp_on_first_batch: bool,
}

impl Default for SviConfig {
    fn default() -> Self {
        Self {
            vmp: VmpConfig::default(),
            batch_size: 1000,
            learning_rate: LearningRate::Fixed(0.5),
            dataset_size: None,
            time_limit: None,
            vmp_on_first_batch: true,
        }
    }
}
