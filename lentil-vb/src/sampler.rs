//! Synthetic dynamic naive-Bayes networks and data.
//!
//! A random network has a class chain with `num_class_states` states,
//! `num_multinomial` discrete emissions and `num_gaussian` real ones, all
//! conditioned on the class. Attributes are named `DiscreteVar{i}`,
//! `GaussianVar{i}` and `ClassVar`, in that order, so the class is the
//! last attribute.

use crate::data::{DataInstance, DataOnMemory};

use lentil_vars::{Attributes, StateSpaceType, VarId};
use rand::Rng;
use rand_distr::{weighted::WeightedIndex, Distribution, Gamma, StandardNormal};

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Default: 5
    pub num_multinomial: usize,
    /// states of every discrete emission. Default: 2
    pub num_states: usize,
    /// Default: 2
    pub num_gaussian: usize,
    /// Default: 2
    pub num_class_states: usize,
    /// Default: 100
    pub num_sequences: usize,
    /// Default: 10
    pub sequence_length: usize,
    /// probability of a class value being missing. Default: 0.0
    pub hidden_class_prob: f64,
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            num_multinomial: 5,
            num_states: 2,
            num_gaussian: 2,
            num_class_states: 2,
            num_sequences: 100,
            sequence_length: 10,
            hidden_class_prob: 0.0,
            seed: 0,
        }
    }
}

/// Ground-truth parameters of a sampled network
#[derive(Debug, Clone)]
pub struct SyntheticNetwork {
    attributes: Attributes,
    initial: Vec<f64>,
    /// row = previous class state
    transition: Vec<Vec<f64>>,
    /// [variable][class] -> (mean, sd)
    gaussian: Vec<Vec<(f64, f64)>>,
    sequence_length: usize,
    hidden_class_prob: f64,
    initial_dist: WeightedIndex<f64>,
    transition_dist: Vec<WeightedIndex<f64>>,
    /// [variable][class] -> state distribution
    multinomial: Vec<Vec<WeightedIndex<f64>>>,
}

impl SyntheticNetwork {
    pub fn random<R: Rng>(config: &SamplerConfig, rng: &mut R) -> anyhow::Result<Self> {
        if config.num_class_states < 1 || config.num_states < 1 {
            anyhow::bail!("need at least one class state and one emission state");
        }
        if !(0.0..=1.0).contains(&config.hidden_class_prob) {
            anyhow::bail!(
                "hidden class probability must be in [0, 1], got {}",
                config.hidden_class_prob
            );
        }

        let k = config.num_class_states;
        let mut columns: Vec<(String, StateSpaceType)> = vec![];
        for i in 0..config.num_multinomial {
            columns.push((
                format!("DiscreteVar{}", i),
                StateSpaceType::FiniteSet(config.num_states),
            ));
        }
        for i in 0..config.num_gaussian {
            columns.push((format!("GaussianVar{}", i), StateSpaceType::Real));
        }
        columns.push(("ClassVar".to_string(), StateSpaceType::FiniteSet(k)));

        let mut attributes = Attributes::new();
        for (name, ss) in columns.iter() {
            attributes.push(name, *ss)?;
        }

        let initial = dirichlet(&vec![1.0; k], rng)?;

        // sticky chain
        let mut transition = vec![];
        for j in 0..k {
            let mut alpha = vec![1.0; k];
            alpha[j] += 2.0;
            transition.push(dirichlet(&alpha, rng)?);
        }

        let mut multinomial = vec![];
        for _ in 0..config.num_multinomial {
            let mut per_class = vec![];
            for _ in 0..k {
                per_class.push(dirichlet(&vec![1.0; config.num_states], rng)?);
            }
            multinomial.push(weighted_tables(&per_class)?);
        }

        let mut gaussian = vec![];
        for _ in 0..config.num_gaussian {
            let per_class = (0..k)
                .map(|_| {
                    let z: f64 = StandardNormal.sample(rng);
                    (5.0 * z, rng.random_range(0.5..1.5))
                })
                .collect();
            gaussian.push(per_class);
        }

        let initial_dist = WeightedIndex::new(&initial)?;
        let transition_dist = weighted_tables(&transition)?;

        Ok(Self {
            attributes,
            initial,
            transition,
            multinomial,
            gaussian,
            sequence_length: config.sequence_length,
            hidden_class_prob: config.hidden_class_prob,
            initial_dist,
            transition_dist,
        })
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The class is the last attribute
    pub fn class_var_id(&self) -> VarId {
        self.attributes.len() - 1
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn transition(&self) -> &[Vec<f64>] {
        &self.transition
    }

    /// Draw `num_sequences` sequences with ids starting at `first_id`
    pub fn sample<R: Rng>(&self, num_sequences: usize, first_id: u64, rng: &mut R) -> DataOnMemory {
        let class_attr = self.class_var_id();
        let mut instances = Vec::with_capacity(num_sequences * self.sequence_length);

        for s in 0..num_sequences {
            let mut c = self.initial_dist.sample(rng);
            for t in 0..self.sequence_length {
                if t > 0 {
                    c = self.transition_dist[c].sample(rng);
                }
                let mut values = Vec::with_capacity(self.attributes.len());
                for dists in self.multinomial.iter() {
                    values.push(dists[c].sample(rng) as f64);
                }
                for params in self.gaussian.iter() {
                    let (mu, sd) = params[c];
                    let z: f64 = StandardNormal.sample(rng);
                    values.push(mu + sd * z);
                }
                let hide = rng.random::<f64>() < self.hidden_class_prob;
                values.push(if hide { f64::NAN } else { c as f64 });
                debug_assert_eq!(values.len(), class_attr + 1);

                instances.push(DataInstance::new(first_id + s as u64, t as u64, values));
            }
        }

        DataOnMemory::new(self.attributes.clone(), instances)
    }
}

/// Network and data drawn with the configured seed
pub fn sample_dynamic_naive_bayes(
    config: &SamplerConfig,
) -> anyhow::Result<(SyntheticNetwork, DataOnMemory)> {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let network = SyntheticNetwork::random(config, &mut rng)?;
    let data = network.sample(config.num_sequences, 0, &mut rng);
    Ok((network, data))
}

fn dirichlet<R: Rng>(alpha: &[f64], rng: &mut R) -> anyhow::Result<Vec<f64>> {
    let mut draws = Vec::with_capacity(alpha.len());
    for &a in alpha {
        let gamma = Gamma::new(a, 1.0).map_err(|e| anyhow::anyhow!("Gamma({}, 1): {}", a, e))?;
        draws.push(gamma.sample(rng));
    }
    let tot: f64 = draws.iter().sum();
    Ok(draws.into_iter().map(|x| x / tot).collect())
}

/// One sampling table per row of probabilities
fn weighted_tables(rows: &[Vec<f64>]) -> anyhow::Result<Vec<WeightedIndex<f64>>> {
    rows.iter()
        .map(|p| WeightedIndex::new(p).map_err(|e| anyhow::anyhow!("{:?}: {}", p, e)))
        .collect()
}
