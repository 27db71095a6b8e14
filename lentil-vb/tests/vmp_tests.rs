use approx::assert_relative_eq;
use lentil_vars::*;
use lentil_vb::engine::{accumulate, collect_sequences};
use lentil_vb::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

fn sampled(hidden: f64, seed: u64) -> anyhow::Result<(SyntheticNetwork, DataOnMemory)> {
    let config = SamplerConfig {
        num_multinomial: 3,
        num_states: 3,
        num_gaussian: 2,
        num_class_states: 2,
        num_sequences: 60,
        sequence_length: 8,
        hidden_class_prob: hidden,
        seed,
    };
    sample_dynamic_naive_bayes(&config)
}

fn model_for(data: &DataOnMemory, class_id: usize) -> anyhow::Result<Arc<ExpFamilyModel>> {
    let vars = Arc::new(DynamicVariables::new(data.attributes()));
    let dag = naive_bayes_structure(&vars, class_id)?;
    Ok(Arc::new(ExpFamilyModel::new(&dag, &PriorConfig::default())?))
}

fn assert_close(a: &CompoundVector, b: &CompoundVector) {
    assert!(a.is_compatible(b));
    for (x, y) in a.to_vec().iter().zip(b.to_vec().iter()) {
        assert_relative_eq!(*x, *y, epsilon = 1e-12, max_relative = 1e-9);
    }
}

// ─────────────────────────────────────────────────────
// Merge invariance
// ─────────────────────────────────────────────────────

#[test]
fn partitioned_sums_match_single_pass() -> anyhow::Result<()> {
    let (network, data) = sampled(0.3, 1)?;
    let model = model_for(&data, network.class_var_id())?;
    let seqs = collect_sequences(&data, &model)?;

    let mut rng = SmallRng::seed_from_u64(5);
    let posterior = model.initial_posterior(&mut rng);
    let local = LocalConfig::default();

    let whole = accumulate(&model, &posterior, &seqs, &local, false);

    for k in [1, 2, 7, seqs.len()] {
        let chunk = seqs.len().div_ceil(k);
        let merged = seqs
            .chunks(chunk)
            .map(|part| accumulate(&model, &posterior, part, &local, false))
            .fold(LocalAccumulator::zeros(&model), LocalAccumulator::merge);

        assert_close(&whole.stats, &merged.stats);
        assert_relative_eq!(whole.elbo, merged.elbo, max_relative = 1e-9);
        assert_eq!(whole.num_instances, merged.num_instances);
        assert_eq!(whole.num_sequences, merged.num_sequences);
    }

    let parallel = accumulate(&model, &posterior, &seqs, &local, true);
    assert_close(&whole.stats, &parallel.stats);
    assert_relative_eq!(whole.elbo, parallel.elbo, max_relative = 1e-9);
    Ok(())
}

#[test]
fn parallel_and_sequential_learning_agree() -> anyhow::Result<()> {
    let (network, data) = sampled(0.0, 2)?;
    let model = model_for(&data, network.class_var_id())?;

    // run every round on both sides
    let config = VmpConfig {
        global_iteration_cap: 5,
        global_threshold: 0.0,
        parallel: false,
        ..Default::default()
    };
    let sequential = learn_from(&data, model.clone(), None, &config)?;
    let parallel = learn_from(
        &data,
        model,
        None,
        &VmpConfig {
            parallel: true,
            ..config
        },
    )?;

    assert_close(&sequential.posterior, &parallel.posterior);
    assert_eq!(sequential.report.iterations, parallel.report.iterations);
    Ok(())
}

// ─────────────────────────────────────────────────────
// Stopping rules
// ─────────────────────────────────────────────────────

#[test]
fn single_round_cap() -> anyhow::Result<()> {
    let (network, data) = sampled(0.5, 3)?;
    let vars = Arc::new(DynamicVariables::new(data.attributes()));
    let dag = naive_bayes_structure(&vars, network.class_var_id())?;
    let config = VmpConfig {
        global_iteration_cap: 1,
        ..Default::default()
    };
    let learned = learn(&data, &dag, &config)?;
    assert_eq!(learned.report.iterations, 1);
    assert_eq!(learned.report.elbo_trace.len(), 1);
    assert!(!learned.report.converged);
    Ok(())
}

#[test]
fn zero_time_limit_stops_after_one_round() -> anyhow::Result<()> {
    let (network, data) = sampled(0.5, 4)?;
    let model = model_for(&data, network.class_var_id())?;
    let config = VmpConfig {
        time_limit: Some(Duration::ZERO),
        ..Default::default()
    };
    let learned = learn_from(&data, model, None, &config)?;
    assert_eq!(learned.report.iterations, 1);
    assert!(learned.report.time_limit_hit);
    Ok(())
}

#[test]
fn continue_from_supplied_posterior() -> anyhow::Result<()> {
    let (network, data) = sampled(0.0, 5)?;
    let model = model_for(&data, network.class_var_id())?;
    let config = VmpConfig::default();
    let first = learn_from(&data, model.clone(), None, &config)?;
    assert!(first.report.converged);

    let again = learn_from(
        &data,
        model.clone(),
        Some(first.posterior.clone()),
        &VmpConfig {
            global_iteration_cap: 2,
            ..config.clone()
        },
    )?;

    // already at a fixed point
    let moved = first.posterior.max_abs_diff(&again.posterior);
    assert!(moved < 10.0 * config.parameter_threshold, "moved by {}", moved);

    // wrong layout
    let other = Arc::new(ExpFamilyModel::new(
        &DynamicDag::new(model.dag().variables().clone()),
        &PriorConfig::default(),
    )?);
    assert!(learn_from(&data, other, Some(first.posterior), &VmpConfig::default()).is_err());
    Ok(())
}

#[test]
fn converged_posterior_survives_one_more_round() -> anyhow::Result<()> {
    let (network, data) = sampled(0.0, 5)?;
    let model = model_for(&data, network.class_var_id())?;
    let config = VmpConfig {
        parallel: false,
        ..Default::default()
    };
    let learned = learn_from(&data, model.clone(), None, &config)?;
    assert!(learned.report.converged);
    assert!(learned.report.iterations < config.global_iteration_cap);

    let next = learn_from(
        &data,
        model,
        Some(learned.posterior.clone()),
        &VmpConfig {
            global_iteration_cap: 1,
            ..config.clone()
        },
    )?;
    let moved = learned.posterior.max_abs_diff(&next.posterior);
    assert!(moved < config.parameter_threshold, "moved by {}", moved);

    // the trace scores the posterior each round started from, so the
    // next round starts where the last one ended up
    let last = learned
        .report
        .final_elbo()
        .ok_or_else(|| anyhow::anyhow!("empty trace"))?;
    let resumed = next.report.elbo_trace[0];
    assert!(resumed >= last - 1e-6 * last.abs());
    Ok(())
}

#[test]
fn elbo_alone_does_not_stop_learning() -> anyhow::Result<()> {
    let (network, data) = sampled(0.0, 5)?;
    let model = model_for(&data, network.class_var_id())?;
    let config = VmpConfig {
        global_threshold: f64::INFINITY,
        parameter_threshold: 0.0,
        global_iteration_cap: 6,
        ..Default::default()
    };
    let learned = learn_from(&data, model, None, &config)?;
    assert!(!learned.report.converged);
    assert_eq!(learned.report.iterations, 6);
    Ok(())
}

// ─────────────────────────────────────────────────────
// Recovery of sampled parameters
// ─────────────────────────────────────────────────────

#[test]
fn recovers_class_chain_from_observed_classes() -> anyhow::Result<()> {
    let config = SamplerConfig {
        num_multinomial: 2,
        num_gaussian: 1,
        num_sequences: 300,
        sequence_length: 20,
        seed: 11,
        ..Default::default()
    };
    let (network, data) = sample_dynamic_naive_bayes(&config)?;
    let mut classifier = DynamicNaiveBayesClassifier::new(network.class_var_id());
    let learned = classifier.learn(&data)?;
    assert!(learned.report.converged);

    for (j, row) in network.transition().iter().enumerate() {
        let estimate = learned.posterior_mean(&format!("Theta_ClassVar|ClassVar_Interface={}", j))?;
        for (p, q) in row.iter().zip(estimate.iter()) {
            assert!((p - q).abs() < 0.05, "{:?} vs {:?}", row, estimate);
        }
    }
    Ok(())
}

#[test]
fn latent_classes_raise_the_elbo() -> anyhow::Result<()> {
    let (network, data) = sampled(1.0, 6)?;
    let model = model_for(&data, network.class_var_id())?;
    let config = VmpConfig {
        global_iteration_cap: 30,
        ..Default::default()
    };
    let learned = learn_from(&data, model, None, &config)?;
    let trace = &learned.report.elbo_trace;
    assert!(trace.len() > 1);
    assert!(trace.iter().all(|x| x.is_finite()));
    assert!(trace[trace.len() - 1] > trace[0]);
    Ok(())
}
