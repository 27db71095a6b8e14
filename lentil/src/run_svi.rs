use crate::common::*;

#[derive(Args, Debug)]
pub struct SviArgs {
    #[command(flatten)]
    sim: SimArgs,

    #[arg(
        short = 'b',
        long = "batch-size",
        default_value_t = 1000,
        help = "Minimum #instances per batch",
        long_help = "Minimum number of instances per batch. \n\
		     Batches are made of whole sequences."
    )]
    batch_size: usize,

    #[arg(
        long = "rate",
        default_value_t = 0.5,
        help = "Fixed learning rate in (0, 1]"
    )]
    learning_rate: f64,

    #[arg(
        long = "forgetting",
        help = "Robbins-Monro forgetting rate in (0.5, 1]",
        long_help = "Use the decaying step size (t + delay)^(-forgetting) \n\
		     instead of the fixed learning rate."
    )]
    forgetting: Option<f64>,

    #[arg(
        long = "delay",
        default_value_t = 1.0,
        help = "Robbins-Monro delay (>= 1)"
    )]
    delay: f64,

    #[arg(
        long = "dataset-size",
        help = "Size of the full data set",
        long_help = "Number of instances of the full data set the batches \n\
		     are drawn from. Without it the training stream is counted \n\
		     in a separate pass."
    )]
    dataset_size: Option<usize>,

    #[arg(
        long = "local-iter",
        default_value_t = 50,
        help = "Maximum number of local sweeps per sequence"
    )]
    local_iter: usize,

    #[arg(
        long = "local-threshold",
        default_value_t = 1e-3,
        help = "Local convergence threshold"
    )]
    local_threshold: f64,

    #[arg(
        long = "time-limit",
        help = "Wall-clock limit in seconds, checked between batches"
    )]
    time_limit: Option<f64>,

    #[arg(
        long = "max-threads",
        default_value_t = 16,
        help = "Maximum number of threads"
    )]
    max_threads: usize,

    #[arg(short, long, help = "Write the learned model here instead of stdout")]
    out: Option<Box<str>>,

    #[arg(long, help = "Show a progress bar")]
    progress: bool,
}

pub fn run_svi(args: &SviArgs) -> anyhow::Result<()> {
    setup_thread_pool(args.max_threads)?;

    let (network, train, test) = args.sim.simulate()?;

    let vmp = VmpConfig {
        local_iteration_cap: args.local_iter,
        local_threshold: args.local_threshold,
        seed: args.sim.seed,
        show_progress: args.progress,
        ..Default::default()
    };

    let learning_rate = match args.forgetting {
        Some(forgetting) => LearningRate::RobbinsMonro {
            delay: args.delay,
            forgetting,
        },
        None => LearningRate::Fixed(args.learning_rate),
    };

    let started = Instant::now();

    // one short batch round to seed the stochastic updates
    let vars = Arc::new(DynamicVariables::new(train.attributes()));
    let dag = naive_bayes_structure(&vars, network.class_var_id())?;
    let init = learn(
        &train,
        &dag,
        &VmpConfig {
            global_iteration_cap: 1,
            ..vmp.clone()
        },
    )?;
    info!("initialized in {:.3}s", started.elapsed().as_secs_f64());

    let config = SviConfig {
        vmp,
        batch_size: args.batch_size,
        learning_rate,
        dataset_size: args.dataset_size,
        time_limit: args.time_limit.map(Duration::from_secs_f64),
        vmp_on_first_batch: false,
    };

    let mut svi = StochasticVI::from_learned(&init, config)?;
    let report = svi.update_model(&train)?;
    let elapsed = started.elapsed();

    let learned = svi.learned_model();
    emit_model(&learned, args.out.as_deref())?;

    info!("{} batch(es), stopped: {:?}", report.batches, report.stop);
    println!("Test ELBO: {}", svi.compute_elbo(&test)?);
    println!("Running time: {:.3}s", elapsed.as_secs_f64());
    Ok(())
}
