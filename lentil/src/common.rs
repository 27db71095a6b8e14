#![allow(unused)]

pub use clap::{Args, Parser, Subcommand};
pub use env_logger;

pub use log::info;
pub use std::path::Path;
pub use std::sync::Arc;
pub use std::time::{Duration, Instant};

pub use lentil_vars::*;
pub use lentil_vb::*;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::ThreadPoolBuilder;

/// Synthetic data shared by every experiment
#[derive(Args, Debug)]
pub struct SimArgs {
    #[arg(
        long = "multinomial",
        default_value_t = 5,
        help = "#discrete attributes",
        long_help = "Number of discrete (multinomial) attributes \n\
		     emitted by the class variable at every time step."
    )]
    pub num_multinomial: usize,

    #[arg(
        long = "states",
        default_value_t = 2,
        help = "#states of each discrete attribute"
    )]
    pub num_states: usize,

    #[arg(
        long = "gaussian",
        default_value_t = 2,
        help = "#real-valued attributes",
        long_help = "Number of real-valued (normal) attributes \n\
		     emitted by the class variable at every time step."
    )]
    pub num_gaussian: usize,

    #[arg(
        short = 'k',
        long = "class-states",
        default_value_t = 2,
        help = "#states of the class variable"
    )]
    pub num_class_states: usize,

    #[arg(
        short = 'n',
        long = "sequences",
        default_value_t = 1000,
        help = "#training sequences"
    )]
    pub num_sequences: usize,

    #[arg(
        long = "test-sequences",
        default_value_t = 100,
        help = "#held-out sequences for the test ELBO"
    )]
    pub num_test_sequences: usize,

    #[arg(
        short = 'l',
        long = "length",
        default_value_t = 10,
        help = "#time steps per sequence"
    )]
    pub sequence_length: usize,

    #[arg(
        long = "hidden",
        default_value_t = 0.0,
        help = "Probability of hiding a class value",
        long_help = "Probability that a class value is missing in the data. \n\
		     Missing class values are treated as latent and refined \n\
		     locally for every sequence. 1.0 learns a hidden Markov model."
    )]
    pub hidden_class_prob: f64,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    pub seed: u64,
}

impl SimArgs {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            num_multinomial: self.num_multinomial,
            num_states: self.num_states,
            num_gaussian: self.num_gaussian,
            num_class_states: self.num_class_states,
            num_sequences: self.num_sequences,
            sequence_length: self.sequence_length,
            hidden_class_prob: self.hidden_class_prob,
            seed: self.seed,
        }
    }

    /// Training data and held-out data from one random network
    pub fn simulate(&self) -> anyhow::Result<(SyntheticNetwork, DataOnMemory, DataOnMemory)> {
        let (network, train) = sample_dynamic_naive_bayes(&self.sampler_config())?;
        let mut rng = SmallRng::seed_from_u64(self.seed.wrapping_add(1));
        let test = network.sample(
            self.num_test_sequences,
            self.num_sequences as u64,
            &mut rng,
        );
        info!(
            "simulated {} training and {} test instances",
            train.len(),
            test.len()
        );
        Ok((network, train, test))
    }
}

pub fn setup_thread_pool(max_threads: usize) -> anyhow::Result<()> {
    let max_threads = num_cpus::get().min(max_threads.max(1));
    ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build_global()?;
    info!("will use {} threads", rayon::current_num_threads());
    Ok(())
}

/// Print the model or write it to `out`
pub fn emit_model(learned: &LearnedModel, out: Option<&str>) -> anyhow::Result<()> {
    match out {
        Some(file) => {
            std::fs::write(file, learned.to_string())?;
            info!("wrote the model to {}", file);
        }
        None => println!("{}", learned),
    }
    Ok(())
}
