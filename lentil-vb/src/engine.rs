//! Batch and parallel variational message passing.
//!
//! Each global round refines every sequence under the current posterior,
//! sums the natural-parameter messages, and replaces the posterior by
//! `prior + messages`. Learning has converged once both the ELBO and the
//! natural parameters have stopped moving between rounds. In parallel
//! mode the sequences are folded on the rayon pool, one
//! [`LocalAccumulator`] per worker, and the partial sums are merged at
//! the end of the round.

use crate::config::{LocalConfig, VmpConfig};
use crate::data::{sequences, DataStream, Sequence};
use crate::local::{refine_into, LocalAccumulator};
use crate::model::ExpFamilyModel;
use crate::natural_params::CompoundVector;

use indicatif::{ProgressBar, ProgressDrawTarget};
use lentil_vars::DynamicDag;
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened during a learning run
#[derive(Debug, Clone, Default)]
pub struct LearningReport {
    pub iterations: usize,
    pub converged: bool,
    pub time_limit_hit: bool,
    /// ELBO of the posterior each round started from, its local
    /// posteriors refined
    pub elbo_trace: Vec<f64>,
    pub elapsed: Duration,
}

impl LearningReport {
    pub fn final_elbo(&self) -> Option<f64> {
        self.elbo_trace.last().copied()
    }
}

/// A model together with its learned posterior
#[derive(Debug, Clone)]
pub struct LearnedModel {
    pub model: Arc<ExpFamilyModel>,
    pub posterior: CompoundVector,
    pub report: LearningReport,
}

impl LearnedModel {
    /// Posterior means by parameter name
    pub fn posterior_mean(&self, name: &str) -> anyhow::Result<Vec<f64>> {
        use lentil_vars::ParameterLookup;
        let var = self.model.parameters().get_variable_by_name(name)?;
        Ok(self.model.posterior_mean(&self.posterior, var))
    }
}

impl fmt::Display for LearnedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.model.write_posterior(f, &self.posterior)
    }
}

/// Learn the posterior of all parameters of `dag` from `data`
pub fn learn(
    data: &dyn DataStream,
    dag: &DynamicDag,
    config: &VmpConfig,
) -> anyhow::Result<LearnedModel> {
    let model = Arc::new(ExpFamilyModel::new(dag, &config.priors)?);
    learn_from(data, model, None, config)
}

/// Learn starting from `initial` (a random perturbation of the prior
/// when `None`)
pub fn learn_from(
    data: &dyn DataStream,
    model: Arc<ExpFamilyModel>,
    initial: Option<CompoundVector>,
    config: &VmpConfig,
) -> anyhow::Result<LearnedModel> {
    let started = Instant::now();
    let seqs = collect_sequences(data, &model)?;

    let mut posterior = match initial {
        Some(x) => {
            model.check_compatible(&x)?;
            x
        }
        None => {
            let mut rng = SmallRng::seed_from_u64(config.seed);
            model.initial_posterior(&mut rng)
        }
    };

    let local = config.local();
    let mut report = LearningReport::default();

    info!(
        "VMP: {} sequences, {} instances, cap={}, parallel={}",
        seqs.len(),
        seqs.iter().map(|s| s.len()).sum::<usize>(),
        config.global_iteration_cap,
        config.parallel
    );

    let pb = ProgressBar::new(config.global_iteration_cap as u64);
    if !config.show_progress {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut prev_elbo: Option<f64> = None;

    for iter in 0..config.global_iteration_cap {
        let acc = accumulate(&model, &posterior, &seqs, &local, config.parallel);
        let elbo = acc.elbo - model.kl_divergence(&posterior);

        let mut updated = model.prior().clone();
        updated.sum(&acc.stats);
        let change = updated.max_abs_diff(&posterior);
        posterior = updated;

        report.iterations = iter + 1;
        report.elbo_trace.push(elbo);
        pb.inc(1);

        if acc.unconverged > 0 {
            info!(
                "[{}] {} sequence(s) hit the local sweep cap",
                iter + 1,
                acc.unconverged
            );
        }

        if let Some(prev) = prev_elbo {
            if elbo < prev {
                warn!("[{}] ELBO decreased: {} -> {}", iter + 1, prev, elbo);
            }
            let rel = ((elbo - prev) / prev.abs().max(f64::MIN_POSITIVE)).abs();
            info!(
                "[{}] ELBO = {}, relative change = {:e}, parameter change = {:e}",
                iter + 1,
                elbo,
                rel,
                change
            );
            // the returned posterior is this round's update
            if rel < config.global_threshold && change < config.parameter_threshold {
                report.converged = true;
                break;
            }
        } else {
            info!("[{}] ELBO = {}, parameter change = {:e}", iter + 1, elbo, change);
        }
        prev_elbo = Some(elbo);

        if let Some(limit) = config.time_limit {
            if started.elapsed() >= limit {
                info!("time limit reached after {} round(s)", iter + 1);
                report.time_limit_hit = true;
                break;
            }
        }
    }
    pb.finish_and_clear();

    report.elapsed = started.elapsed();
    info!(
        "VMP done: {} round(s), converged={}, {:.3}s",
        report.iterations,
        report.converged,
        report.elapsed.as_secs_f64()
    );

    Ok(LearnedModel {
        model,
        posterior,
        report,
    })
}

/// Sum of sequence contributions under `posterior`; identical (up to
/// floating-point summation order) in sequential and parallel mode
pub fn accumulate(
    model: &ExpFamilyModel,
    posterior: &CompoundVector,
    seqs: &[Sequence],
    local: &LocalConfig,
    parallel: bool,
) -> LocalAccumulator {
    let moments = model.moments(posterior);

    if parallel {
        seqs.par_iter()
            .fold(
                || LocalAccumulator::zeros(model),
                |mut acc, seq| {
                    refine_into(&mut acc, model, &moments, seq, local);
                    acc
                },
            )
            .reduce(|| LocalAccumulator::zeros(model), LocalAccumulator::merge)
    } else {
        let mut acc = LocalAccumulator::zeros(model);
        for seq in seqs {
            refine_into(&mut acc, model, &moments, seq, local);
        }
        acc
    }
}

/// Read `data` into sequences, checking every instance against the model
pub fn collect_sequences(
    data: &dyn DataStream,
    model: &ExpFamilyModel,
) -> anyhow::Result<Vec<Sequence>> {
    if data.attributes() != model.attributes() {
        anyhow::bail!("data attributes do not match the model attributes");
    }
    let mut instances = vec![];
    for x in data.stream() {
        model.check_instance(&x.values)?;
        instances.push(x);
    }
    Ok(sequences(instances))
}
