use lentil_vars::*;
use lentil_vb::*;
use std::sync::Arc;

fn universe(n: usize) -> anyhow::Result<Arc<DynamicVariables>> {
    let mut attributes = Attributes::new();
    for j in 0..n {
        let ss = if j % 2 == 0 {
            StateSpaceType::FiniteSet(3)
        } else {
            StateSpaceType::Real
        };
        attributes.push(&format!("V{}", j), ss)?;
    }
    Ok(Arc::new(DynamicVariables::new(&attributes)))
}

#[test]
fn naive_bayes_parent_sets() -> anyhow::Result<()> {
    for n in 1..6 {
        let vars = universe(n)?;
        for class_id in 0..n {
            let dag = naive_bayes_structure(&vars, class_id)?;
            let class = vars.get_variable_by_id(class_id)?;
            let interface = vars.get_interface_variable(class)?;

            for ps in dag.parent_sets_time_t() {
                assert!(!ps.contains(ps.main_var()));
                if ps.main_var() == class {
                    assert_eq!(ps.parents(), &[interface.clone()]);
                } else {
                    assert_eq!(ps.parents(), &[class.clone()]);
                }
            }

            // time 0 drops the temporal edge
            assert!(dag.parents_time_0(class)?.is_empty());
            assert!(!dag.contains_cycles());
        }
    }
    Ok(())
}

#[test]
fn unknown_class_ids_are_rejected() -> anyhow::Result<()> {
    let vars = universe(3)?;

    // interface variable ids are not valid class ids
    for id in [3, 4, 5, 6, 100] {
        match naive_bayes_structure(&vars, id) {
            Err(VarsError::UnknownVariable(x)) => assert_eq!(x, id),
            other => panic!("expected UnknownVariable({}), got {:?}", id, other.map(|_| ())),
        }
    }
    Ok(())
}

#[test]
fn static_structure_through_classifier() -> anyhow::Result<()> {
    let config = SamplerConfig {
        num_multinomial: 2,
        num_gaussian: 1,
        num_sequences: 20,
        sequence_length: 5,
        ..Default::default()
    };
    let (network, data) = sample_dynamic_naive_bayes(&config)?;

    let mut classifier = DynamicNaiveBayesClassifier::new(network.class_var_id())
        .with_structure(static_naive_bayes_structure);
    let learned = classifier.learn(&data)?;

    let class = learned
        .model
        .class()
        .ok_or_else(|| anyhow::anyhow!("missing class"))?;
    assert!(class.transition.is_none());
    assert!(learned
        .model
        .parameters()
        .get_variable_by_name("Theta_ClassVar|ClassVar_Interface=0")
        .is_err());
    Ok(())
}
