use crate::common::*;

#[derive(Args, Debug)]
pub struct VmpArgs {
    #[command(flatten)]
    sim: SimArgs,

    #[arg(
        long = "global-iter",
        default_value_t = 100,
        help = "Maximum number of global rounds"
    )]
    global_iter: usize,

    #[arg(
        long = "global-threshold",
        default_value_t = 1e-10,
        help = "Relative ELBO change to stop at",
        long_help = "Learning stops once the relative change of the ELBO \n\
		     between two rounds falls below this threshold \n\
		     and the parameters have settled (see --parameter-threshold)."
    )]
    global_threshold: f64,

    #[arg(
        long = "parameter-threshold",
        default_value_t = 1e-6,
        help = "Largest natural-parameter change to stop at"
    )]
    parameter_threshold: f64,

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
        help = "Wall-clock limit in seconds",
        long_help = "Stop after the first round that ends past this many seconds."
    )]
    time_limit: Option<f64>,

    #[arg(long, help = "Process sequences one at a time")]
    sequential: bool,

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

pub fn run_vmp(args: &VmpArgs) -> anyhow::Result<()> {
    setup_thread_pool(args.max_threads)?;

    let (network, train, test) = args.sim.simulate()?;

    let config = VmpConfig {
        global_iteration_cap: args.global_iter,
        global_threshold: args.global_threshold,
        parameter_threshold: args.parameter_threshold,
        local_iteration_cap: args.local_iter,
        local_threshold: args.local_threshold,
        parallel: !args.sequential,
        seed: args.sim.seed,
        time_limit: args.time_limit.map(Duration::from_secs_f64),
        show_progress: args.progress,
        ..Default::default()
    };

    let local = config.local();
    let started = Instant::now();
    let mut classifier = DynamicNaiveBayesClassifier::with_config(network.class_var_id(), config);
    let learned = classifier.learn(&train)?;
    let elapsed = started.elapsed();

    emit_model(learned, args.out.as_deref())?;

    let elbo = compute_elbo(&test, learned, &local)?;
    info!(
        "{} round(s), converged: {}",
        learned.report.iterations, learned.report.converged
    );
    println!("Test ELBO: {}", elbo);
    println!("Running time: {:.3}s", elapsed.as_secs_f64());
    Ok(())
}
