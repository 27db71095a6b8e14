//! Stochastic variational inference over a stream of batches.
//!
//! Every batch is a window of whole sequences. For batch `b` of `n_b`
//! instances drawn from a data set of `N` instances, the local posteriors
//! are refined under the current global posterior `λ` and
//!
//! ```text
//! λ̂ = prior + (N / n_b) · messages(b)
//! λ ← (1 - ρ_t) λ + ρ_t λ̂
//! ```
//!
//! with `ρ_t` taken from the configured [`LearningRate`](crate::config::LearningRate).
//!
//! Windows are pulled from the stream one at a time; cancellation and the
//! time limit are checked before each pull.

use crate::config::{LocalConfig, SviConfig};
use crate::data::{windows, DataStream};
use crate::engine::{accumulate, LearnedModel, LearningReport};
use crate::model::ExpFamilyModel;
use crate::natural_params::CompoundVector;

use indicatif::{ProgressBar, ProgressDrawTarget};
use lentil_vars::DynamicDag;
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why [`StochasticVI::update_model`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// every batch of the stream was processed
    Exhausted,
    TimeLimit,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SviReport {
    pub batches: usize,
    pub instances: usize,
    pub stop: StopReason,
    /// step sizes used, one per batch
    pub learning_rates: Vec<f64>,
    /// local sweeps over all sequences, one entry per batch
    pub local_sweeps: Vec<usize>,
    pub elapsed: Duration,
}

pub struct StochasticVI {
    model: Arc<ExpFamilyModel>,
    config: SviConfig,
    posterior: CompoundVector,
    /// batches seen over the lifetime of this learner
    batches_seen: usize,
    cancel: Arc<AtomicBool>,
}

impl StochasticVI {
    pub fn new(dag: &DynamicDag, config: SviConfig) -> anyhow::Result<Self> {
        let model = Arc::new(ExpFamilyModel::new(dag, &config.vmp.priors)?);
        Self::with_model(model, config)
    }

    /// Start from a random perturbation of the prior
    pub fn with_model(model: Arc<ExpFamilyModel>, config: SviConfig) -> anyhow::Result<Self> {
        config.learning_rate.validate()?;
        let mut rng = SmallRng::seed_from_u64(config.vmp.seed);
        let posterior = model.initial_posterior(&mut rng);
        Ok(Self {
            model,
            config,
            posterior,
            batches_seen: 0,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Continue from an earlier run
    pub fn from_learned(learned: &LearnedModel, config: SviConfig) -> anyhow::Result<Self> {
        let mut svi = Self::with_model(learned.model.clone(), config)?;
        svi.update_natural_parameter_posteriors(learned.posterior.clone())?;
        Ok(svi)
    }

    /// Replace the global posterior
    pub fn update_natural_parameter_posteriors(
        &mut self,
        posterior: CompoundVector,
    ) -> anyhow::Result<()> {
        self.model.check_compatible(&posterior)?;
        self.posterior = posterior;
        Ok(())
    }

    /// Setting the flag stops [`update_model`](Self::update_model) before
    /// its next batch
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn model(&self) -> &Arc<ExpFamilyModel> {
        &self.model
    }

    pub fn posterior(&self) -> &CompoundVector {
        &self.posterior
    }

    pub fn batches_seen(&self) -> usize {
        self.batches_seen
    }

    /// Process the batches of `data`; may be called again on more data.
    ///
    /// Without a configured `dataset_size`, the stream is counted in a
    /// separate pass right before the first update.
    pub fn update_model(&mut self, data: &dyn DataStream) -> anyhow::Result<SviReport> {
        let started = Instant::now();
        if data.attributes() != self.model.attributes() {
            anyhow::bail!("data attributes do not match the model attributes");
        }

        let mut dataset_size = self.config.dataset_size;
        info!(
            "SVI: batch size {}, data set size {:?}",
            self.config.batch_size, dataset_size
        );

        let pb = ProgressBar::no_length();
        if !self.config.vmp.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        let mut report = SviReport {
            batches: 0,
            instances: 0,
            stop: StopReason::Exhausted,
            learning_rates: vec![],
            local_sweeps: vec![],
            elapsed: Duration::ZERO,
        };

        let mut stream = windows(data.stream(), self.config.batch_size);

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancelled after {} batch(es)", report.batches);
                report.stop = StopReason::Cancelled;
                break;
            }
            if let Some(limit) = self.config.time_limit {
                if started.elapsed() >= limit {
                    info!("time limit reached after {} batch(es)", report.batches);
                    report.stop = StopReason::TimeLimit;
                    break;
                }
            }

            let Some(batch) = stream.next() else {
                break;
            };
            for x in batch.iter().flat_map(|seq| seq.instances.iter()) {
                self.model.check_instance(&x.values)?;
            }

            let n = match dataset_size {
                Some(n) => n,
                None => {
                    let n = data.stream().count();
                    info!("counted {} instances", n);
                    dataset_size = Some(n);
                    n
                }
            };

            let local = if self.batches_seen == 0 && !self.config.vmp_on_first_batch {
                LocalConfig {
                    iteration_cap: 0,
                    ..self.config.vmp.local()
                }
            } else {
                self.config.vmp.local()
            };

            let acc = accumulate(
                &self.model,
                &self.posterior,
                &batch,
                &local,
                self.config.vmp.parallel,
            );

            let mut estimate = acc.stats;
            estimate.multiply_by(n as f64 / acc.num_instances.max(1) as f64);
            estimate.sum(self.model.prior());

            let rho = self.config.learning_rate.at(self.batches_seen);
            self.posterior = self.posterior.weighted_combination(1.0 - rho, &estimate, rho);

            self.batches_seen += 1;
            report.batches += 1;
            report.instances += acc.num_instances;
            report.learning_rates.push(rho);
            report.local_sweeps.push(acc.sweeps);
            debug!(
                "batch {}: {} instances, {} local sweep(s), rho = {:.4}",
                self.batches_seen, acc.num_instances, acc.sweeps, rho
            );
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.elapsed = started.elapsed();
        info!(
            "SVI done: {} batch(es), {} instance(s), {:?}, {:.3}s",
            report.batches,
            report.instances,
            report.stop,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Snapshot of the current posterior
    pub fn learned_model(&self) -> LearnedModel {
        LearnedModel {
            model: self.model.clone(),
            posterior: self.posterior.clone(),
            report: LearningReport {
                iterations: self.batches_seen,
                ..Default::default()
            },
        }
    }

    /// ELBO of `data` under the current posterior
    pub fn compute_elbo(&self, data: &dyn DataStream) -> anyhow::Result<f64> {
        crate::elbo::compute_elbo(data, &self.learned_model(), &self.config.vmp.local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningRate;
    use crate::data::{DataInstance, DataOnMemory};
    use crate::structure::naive_bayes_structure;
    use lentil_vars::*;

    fn data(n: u64) -> DataOnMemory {
        let attributes = Attributes::from_columns(&[
            ("Y", StateSpaceType::FiniteSet(2)),
            ("C", StateSpaceType::FiniteSet(2)),
        ])
        .unwrap();
        let instances = (0..n)
            .map(|s| DataInstance::new(s, 0, vec![(s % 2) as f64, (s % 2) as f64]))
            .collect();
        DataOnMemory::new(attributes, instances)
    }

    #[test]
    fn test_batches_and_rates() {
        let data = data(10);
        let vars = Arc::new(DynamicVariables::new(data.attributes()));
        let dag = naive_bayes_structure(&vars, 1).unwrap();
        let config = SviConfig {
            batch_size: 3,
            learning_rate: LearningRate::RobbinsMonro {
                delay: 1.0,
                forgetting: 0.75,
            },
            ..Default::default()
        };
        let mut svi = StochasticVI::new(&dag, config).unwrap();
        let report = svi.update_model(&data).unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.batches, 4);
        assert_eq!(report.instances, 10);
        assert!((report.learning_rates[0] - 1.0).abs() < 1e-12);
        assert!(report.learning_rates[3] < report.learning_rates[1]);

        // the step schedule continues across calls
        let report = svi.update_model(&data).unwrap();
        assert_eq!(svi.batches_seen(), 8);
        assert!(report.learning_rates[0] < 0.5);
    }

    #[test]
    fn test_rejects_incompatible_posterior() {
        let data = data(4);
        let vars = Arc::new(DynamicVariables::new(data.attributes()));
        let nb = naive_bayes_structure(&vars, 1).unwrap();
        let empty = DynamicDag::new(vars);

        let mut svi = StochasticVI::new(&nb, SviConfig::default()).unwrap();
        let other = ExpFamilyModel::new(&empty, &Default::default()).unwrap();
        assert!(svi
            .update_natural_parameter_posteriors(other.prior().clone())
            .is_err());
    }
}
