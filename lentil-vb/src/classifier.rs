//! Dynamic naive-Bayes classifier.
//!
//! Builds the DAG from the data schema with a pluggable structure
//! strategy, then learns its parameters with [`engine::learn`].

use crate::config::VmpConfig;
use crate::data::{DataStream, Sequence};
use crate::engine::{self, LearnedModel};
use crate::local::infer_sequence;
use crate::structure::{naive_bayes_structure, StructureLearner};

use lentil_vars::{DynamicVariables, VarId};
use log::info;
use std::sync::Arc;

pub struct DynamicNaiveBayesClassifier {
    class_var_id: VarId,
    config: VmpConfig,
    structure: Box<dyn StructureLearner + Send + Sync>,
    model: Option<LearnedModel>,
}

impl DynamicNaiveBayesClassifier {
    pub fn new(class_var_id: VarId) -> Self {
        Self::with_config(class_var_id, VmpConfig::default())
    }

    pub fn with_config(class_var_id: VarId, config: VmpConfig) -> Self {
        Self {
            class_var_id,
            config,
            structure: Box::new(naive_bayes_structure),
            model: None,
        }
    }

    /// Replace the default naive-Bayes template
    pub fn with_structure<S>(mut self, structure: S) -> Self
    where
        S: StructureLearner + Send + Sync + 'static,
    {
        self.structure = Box::new(structure);
        self
    }

    pub fn class_var_id(&self) -> VarId {
        self.class_var_id
    }

    pub fn set_class_var_id(&mut self, class_var_id: VarId) {
        self.class_var_id = class_var_id;
    }

    pub fn is_parallel_mode(&self) -> bool {
        self.config.parallel
    }

    pub fn set_parallel_mode(&mut self, parallel: bool) {
        self.config.parallel = parallel;
    }

    pub fn config(&self) -> &VmpConfig {
        &self.config
    }

    /// Build the structure for the schema of `data` and learn it
    pub fn learn(&mut self, data: &dyn DataStream) -> anyhow::Result<&LearnedModel> {
        let variables = Arc::new(DynamicVariables::new(data.attributes()));
        let dag = self
            .structure
            .learn_structure(&variables, self.class_var_id)?;
        info!("structure:\n{}", dag);

        let learned = engine::learn(data, &dag, &self.config)?;
        Ok(self.model.insert(learned))
    }

    /// The model of the last successful [`learn`](Self::learn)
    pub fn dynamic_model(&self) -> Option<&LearnedModel> {
        self.model.as_ref()
    }

    /// `q(c_t)` for every slice of `seq`, ignoring any class values it
    /// carries
    pub fn class_posterior(&self, seq: &Sequence) -> anyhow::Result<Vec<Vec<f64>>> {
        let learned = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("the classifier has not been trained"))?;
        let model = learned.model.as_ref();
        let class = model
            .class()
            .ok_or_else(|| anyhow::anyhow!("the learned structure has no class variable"))?;

        let mut hidden = seq.clone();
        for x in hidden.instances.iter_mut() {
            model.check_instance(&x.values)?;
            x.values[class.attribute] = f64::NAN;
        }

        let moments = model.moments(&learned.posterior);
        Ok(infer_sequence(model, &moments, &hidden, &self.config.local()).responsibilities)
    }
}
