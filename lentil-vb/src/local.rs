//! Local variational refinement of one sequence.
//!
//! With the global posterior held fixed, the class variables of a
//! sequence get a mean-field posterior `q(c_t)`. Observed class values
//! pin `q(c_t)` to a point mass; missing ones are refined by sweeping
//! over the sequence:
//!
//! ```text
//! log q(c_t = i) = E[log p(x_t | c_t = i)]
//!                + Σ_j q(c_{t-1} = j) E[log θ_{j,i}]      (or E[log θ0_i] at t = 0)
//!                + Σ_l q(c_{t+1} = l) E[log θ_{i,l}]
//!                + const
//! ```
//!
//! The refined posterior yields the sequence's expected sufficient
//! statistics (natural-parameter messages to the global parameters) and
//! its share of the ELBO.

use crate::config::LocalConfig;
use crate::data::{DataInstance, Sequence};
use crate::model::{EmissionNode, EmissionParameters, ExpFamilyModel};
use crate::natural_params::CompoundVector;

const LN_2PI: f64 = 1.8378770664093453;

/// Per-worker sum of sequence contributions
#[derive(Debug, Clone)]
pub struct LocalAccumulator {
    /// natural-parameter messages (without the prior)
    pub stats: CompoundVector,
    /// expected complete log-likelihood plus local entropy
    pub elbo: f64,
    pub num_instances: usize,
    pub num_sequences: usize,
    /// sequences that hit the local sweep cap
    pub unconverged: usize,
    pub sweeps: usize,
}

impl LocalAccumulator {
    pub fn zeros(model: &ExpFamilyModel) -> Self {
        Self {
            stats: model.zeros(),
            elbo: 0.0,
            num_instances: 0,
            num_sequences: 0,
            unconverged: 0,
            sweeps: 0,
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.stats.sum(&other.stats);
        self.elbo += other.elbo;
        self.num_instances += other.num_instances;
        self.num_sequences += other.num_sequences;
        self.unconverged += other.unconverged;
        self.sweeps += other.sweeps;
        self
    }
}

/// `q(c_t)` for every slice of a sequence
#[derive(Debug, Clone)]
pub struct SequencePosterior {
    pub responsibilities: Vec<Vec<f64>>,
    /// expected emission log-likelihood per class state
    emission: Vec<Vec<f64>>,
    latent: Vec<bool>,
    pub sweeps: usize,
    pub converged: bool,
}

/// Refine `q(c_t)` of one sequence under the posterior `moments`
/// (expected sufficient statistics of the global parameters).
///
/// A sequence that does not settle within `iteration_cap` sweeps is
/// returned as it stands; with a cap of zero its latent slots keep their
/// uniform start.
pub fn infer_sequence(
    model: &ExpFamilyModel,
    moments: &CompoundVector,
    seq: &Sequence,
    local: &LocalConfig,
) -> SequencePosterior {
    let k = model.num_class_states();
    let nt = seq.len();

    let emission: Vec<Vec<f64>> = seq
        .instances
        .iter()
        .map(|x| emission_log_likelihood(model, moments, x))
        .collect();

    let observed: Vec<Option<usize>> = match model.class() {
        Some(c) => seq
            .instances
            .iter()
            .map(|x| x.value(c.attribute).map(|v| v as usize))
            .collect(),
        None => vec![Some(0); nt],
    };

    let mut r: Vec<Vec<f64>> = observed
        .iter()
        .map(|o| match o {
            Some(c) => one_hot(k, *c),
            None => vec![1.0 / k as f64; k],
        })
        .collect();

    let latent: Vec<bool> = observed.iter().map(|o| o.is_none()).collect();

    let mut sweeps = 0;
    let mut converged = true;

    if latent.iter().any(|&z| z) {
        converged = false;
        while sweeps < local.iteration_cap {
            sweeps += 1;
            let mut delta = 0_f64;
            for t in (0..nt).filter(|&t| latent[t]) {
                let prior = log_prior(model, moments, &r, t);
                let future = log_future(model, moments, &r, t);
                let logits: Vec<f64> = (0..k)
                    .map(|i| emission[t][i] + prior[i] + future[i])
                    .collect();
                let new_r = softmax(&logits);
                for (a, b) in new_r.iter().zip(r[t].iter()) {
                    delta = delta.max((a - b).abs());
                }
                r[t] = new_r;
            }
            if delta < local.threshold {
                converged = true;
                break;
            }
        }
    }

    SequencePosterior {
        responsibilities: r,
        emission,
        latent,
        sweeps,
        converged,
    }
}

/// `Σ_t E_q[log p(x_t, c_t | c_{t-1})] + H[q(c)]`
pub fn local_elbo(
    model: &ExpFamilyModel,
    moments: &CompoundVector,
    post: &SequencePosterior,
) -> f64 {
    let r = &post.responsibilities;
    let mut elbo = 0.0;
    for t in 0..r.len() {
        let prior = log_prior(model, moments, r, t);
        for (c, &w) in r[t].iter().enumerate() {
            elbo += w * (post.emission[t][c] + prior[c]);
        }
        if post.latent[t] {
            elbo += entropy(&r[t]);
        }
    }
    elbo
}

/// Add the expected sufficient statistics of `seq` to `stats`
pub fn add_messages(
    model: &ExpFamilyModel,
    moments: &CompoundVector,
    seq: &Sequence,
    post: &SequencePosterior,
    stats: &mut CompoundVector,
) {
    let r = &post.responsibilities;
    let k = model.num_class_states();

    for (t, x) in seq.instances.iter().enumerate() {
        if let Some(class) = model.class() {
            match &class.transition {
                Some(trans) if t > 0 => {
                    for (j, theta) in trans.iter().enumerate() {
                        let w = r[t - 1][j];
                        for (s, &rt) in stats.block_mut(theta).iter_mut().zip(r[t].iter()) {
                            *s += w * rt;
                        }
                    }
                }
                _ => {
                    for (s, &rt) in stats.block_mut(&class.initial).iter_mut().zip(r[t].iter()) {
                        *s += rt;
                    }
                }
            }
        }

        for node in model.nodes() {
            let Some(v) = x.value(node.attribute) else {
                continue;
            };
            if node.conditioned {
                for c in 0..k {
                    add_emission_message(node, c, r[t][c], v, moments, stats);
                }
            } else {
                add_emission_message(node, 0, 1.0, v, moments, stats);
            }
        }
    }
}

/// Refine one sequence and fold its contribution into `acc`
pub fn refine_into(
    acc: &mut LocalAccumulator,
    model: &ExpFamilyModel,
    moments: &CompoundVector,
    seq: &Sequence,
    local: &LocalConfig,
) {
    let post = infer_sequence(model, moments, seq, local);
    acc.elbo += local_elbo(model, moments, &post);
    add_messages(model, moments, seq, &post, &mut acc.stats);
    acc.num_instances += seq.len();
    acc.num_sequences += 1;
    acc.sweeps += post.sweeps;
    if !post.converged {
        acc.unconverged += 1;
    }
}

fn add_emission_message(
    node: &EmissionNode,
    idx: usize,
    w: f64,
    v: f64,
    moments: &CompoundVector,
    stats: &mut CompoundVector,
) {
    match &node.params {
        EmissionParameters::Multinomial { theta, .. } => {
            stats.block_mut(&theta[idx])[v as usize] += w;
        }
        EmissionParameters::Normal { mean, variance } => {
            // E[1/σ²], E[μ], E[μ²]
            let precision = moments.block(&variance[idx])[1];
            let mu = moments.block(&mean[idx]);
            let sq_err = v * v - 2.0 * v * mu[0] + mu[1];

            let b = stats.block_mut(&mean[idx]);
            b[0] += w * precision * v;
            b[1] -= 0.5 * w * precision;

            let b = stats.block_mut(&variance[idx]);
            b[0] -= 0.5 * w;
            b[1] -= 0.5 * w * sq_err;
        }
    }
}

/// `E[log p(x | c)]` for every class state `c`
pub fn emission_log_likelihood(
    model: &ExpFamilyModel,
    moments: &CompoundVector,
    x: &DataInstance,
) -> Vec<f64> {
    let k = model.num_class_states();
    let mut ret = vec![0.0; k];
    for node in model.nodes() {
        let Some(v) = x.value(node.attribute) else {
            continue;
        };
        for (c, llik) in ret.iter_mut().enumerate() {
            let idx = node.param_index(c);
            *llik += match &node.params {
                EmissionParameters::Multinomial { theta, .. } => moments.block(&theta[idx])[v as usize],
                EmissionParameters::Normal { mean, variance } => {
                    let mu = moments.block(&mean[idx]);
                    let s2 = moments.block(&variance[idx]);
                    -0.5 * LN_2PI - 0.5 * s2[0] - 0.5 * s2[1] * (v * v - 2.0 * v * mu[0] + mu[1])
                }
            };
        }
    }
    ret
}

/// Expected log-probability of `c_t` given the previous slice
fn log_prior(model: &ExpFamilyModel, moments: &CompoundVector, r: &[Vec<f64>], t: usize) -> Vec<f64> {
    let Some(class) = model.class() else {
        return vec![0.0; 1];
    };
    match &class.transition {
        Some(trans) if t > 0 => {
            let mut ret = vec![0.0; class.num_states];
            for (j, theta) in trans.iter().enumerate() {
                let w = r[t - 1][j];
                for (acc, &elog) in ret.iter_mut().zip(moments.block(theta).iter()) {
                    *acc += w * elog;
                }
            }
            ret
        }
        _ => moments.block(&class.initial).to_vec(),
    }
}

/// Expected log-probability of `c_{t+1}` as a function of `c_t`
fn log_future(model: &ExpFamilyModel, moments: &CompoundVector, r: &[Vec<f64>], t: usize) -> Vec<f64> {
    let k = model.num_class_states();
    let trans = match model.class().and_then(|c| c.transition.as_ref()) {
        Some(trans) if t + 1 < r.len() => trans,
        _ => return vec![0.0; k],
    };
    trans
        .iter()
        .map(|theta| {
            moments
                .block(theta)
                .iter()
                .zip(r[t + 1].iter())
                .map(|(elog, w)| w * elog)
                .sum()
        })
        .collect()
}

fn one_hot(k: usize, c: usize) -> Vec<f64> {
    let mut ret = vec![0.0; k];
    ret[c] = 1.0;
    ret
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = logits.iter().map(|x| (x - max).exp()).collect();
    let tot: f64 = exp.iter().sum();
    exp.into_iter().map(|x| x / tot).collect()
}

fn entropy(p: &[f64]) -> f64 {
    -p.iter().filter(|&&x| x > 0.0).map(|x| x * x.ln()).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriorConfig;
    use crate::data::sequences;
    use crate::structure::naive_bayes_structure;
    use lentil_vars::*;
    use std::sync::Arc;

    fn model() -> ExpFamilyModel {
        let attributes = Attributes::from_columns(&[
            ("X", StateSpaceType::Real),
            ("Y", StateSpaceType::FiniteSet(2)),
            ("C", StateSpaceType::FiniteSet(2)),
        ])
        .unwrap();
        let vars = Arc::new(DynamicVariables::new(&attributes));
        let dag = naive_bayes_structure(&vars, 2).unwrap();
        ExpFamilyModel::new(&dag, &PriorConfig::default()).unwrap()
    }

    #[test]
    fn test_observed_class_counts() {
        let model = model();
        let moments = model.moments(model.prior());
        let seqs = sequences(vec![
            DataInstance::new(0, 0, vec![1.0, 0.0, 0.0]),
            DataInstance::new(0, 1, vec![2.0, 1.0, 1.0]),
            DataInstance::new(0, 2, vec![f64::NAN, 1.0, 1.0]),
        ]);

        let mut acc = LocalAccumulator::zeros(&model);
        refine_into(&mut acc, &model, &moments, &seqs[0], &LocalConfig::default());

        let p = model.parameters();
        let time0 = p.get_variable_by_name("Theta_C_Time0").unwrap();
        let from0 = p.get_variable_by_name("Theta_C|C_Interface=0").unwrap();
        let from1 = p.get_variable_by_name("Theta_C|C_Interface=1").unwrap();
        let y1 = p.get_variable_by_name("Theta_Y|C=1").unwrap();
        let x1 = p.get_variable_by_name("Var_X|C=1").unwrap();

        assert_eq!(acc.stats.block(time0), &[1.0, 0.0]);
        assert_eq!(acc.stats.block(from0), &[0.0, 1.0]);
        assert_eq!(acc.stats.block(from1), &[0.0, 1.0]);
        assert_eq!(acc.stats.block(y1), &[0.0, 2.0]);
        // one observed X under class 1; missing X skipped
        assert!((acc.stats.block(x1)[0] + 0.5).abs() < 1e-12);
        assert_eq!(acc.sweeps, 0);
        assert_eq!(acc.unconverged, 0);
        assert_eq!(acc.num_instances, 3);
    }

    #[test]
    fn test_latent_class_is_a_distribution() {
        let model = model();
        let mut rng = <rand::rngs::SmallRng as rand::SeedableRng>::seed_from_u64(7);
        let posterior = model.initial_posterior(&mut rng);
        let moments = model.moments(&posterior);
        let seqs = sequences(vec![
            DataInstance::new(0, 0, vec![1.0, 0.0, f64::NAN]),
            DataInstance::new(0, 1, vec![-2.0, 1.0, f64::NAN]),
        ]);

        let post = infer_sequence(&model, &moments, &seqs[0], &LocalConfig::default());
        for r in post.responsibilities.iter() {
            assert!((r.iter().sum::<f64>() - 1.0).abs() < 1e-12);
            assert!(r.iter().all(|&x| x >= 0.0));
        }
        assert!(post.sweeps >= 1);
        assert!(local_elbo(&model, &moments, &post).is_finite());
    }

    #[test]
    fn test_sweep_cap_is_respected() {
        let model = model();
        let moments = model.moments(model.prior());
        let seqs = sequences(vec![
            DataInstance::new(0, 0, vec![1.0, 0.0, f64::NAN]),
            DataInstance::new(0, 1, vec![2.0, 1.0, f64::NAN]),
        ]);
        let local = LocalConfig {
            iteration_cap: 1,
            threshold: 0.0,
        };
        let post = infer_sequence(&model, &moments, &seqs[0], &local);
        assert_eq!(post.sweeps, 1);
        assert!(!post.converged);
    }

    #[test]
    fn test_zero_cap_keeps_uniform_start() {
        let model = model();
        let moments = model.moments(model.prior());
        let seqs = sequences(vec![
            DataInstance::new(0, 0, vec![1.0, 0.0, f64::NAN]),
            DataInstance::new(0, 1, vec![2.0, 1.0, 1.0]),
        ]);
        let local = LocalConfig {
            iteration_cap: 0,
            threshold: 1e-3,
        };
        let post = infer_sequence(&model, &moments, &seqs[0], &local);
        assert_eq!(post.sweeps, 0);
        assert!(!post.converged);
        assert_eq!(post.responsibilities[0], vec![0.5, 0.5]);
        assert_eq!(post.responsibilities[1], vec![0.0, 1.0]);
    }
}
