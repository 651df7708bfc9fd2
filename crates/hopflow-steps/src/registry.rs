//! Step registry: maps a step type key (e.g. "filter") to a constructor.
//!
//! The executor only sees the `StepFactory` side of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use hopflow_core::graph::StepMeta;
use hopflow_core::step::{StepError, StepFactory, StepLogic};
use hopflow_core::variables::MessageCatalog;

use crate::{csv_input, csv_output, dummy, filter, generate, rename};

type Constructor =
    Arc<dyn Fn(&StepMeta, usize) -> Result<Box<dyn StepLogic>, StepError> + Send + Sync>;

#[derive(Clone)]
pub struct StepRegistry {
    constructors: BTreeMap<String, Constructor>,
    messages: MessageCatalog,
}

impl StepRegistry {
    /// A registry without any step types.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
            messages: MessageCatalog::new(),
        }
    }

    /// Registry with every built-in step and its messages.
    pub fn new() -> Self {
        let mut r = Self::empty();
        r.register(generate::TYPE, generate::create);
        r.register(filter::TYPE, filter::create);
        r.register(rename::TYPE, rename::create);
        r.register(dummy::TYPE, dummy::create);
        r.register(csv_input::TYPE, csv_input::create);
        r.register(csv_output::TYPE, csv_output::create);
        filter::register_messages(&mut r.messages);
        csv_input::register_messages(&mut r.messages);
        r
    }

    pub fn register<F>(&mut self, key: impl Into<String>, ctor: F)
    where
        F: Fn(&StepMeta, usize) -> Result<Box<dyn StepLogic>, StepError> + Send + Sync + 'static,
    {
        self.constructors.insert(key.into(), Arc::new(ctor));
    }

    pub fn add_message(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.messages.insert(key, template);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    /// Registered type keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StepFactory for StepRegistry {
    fn create(&self, meta: &StepMeta, copy: usize) -> Result<Box<dyn StepLogic>, StepError> {
        let ctor = self.constructors.get(&meta.step_type).ok_or_else(|| {
            StepError::Config(format!("unknown step type '{}'", meta.step_type))
        })?;
        ctor(meta, copy)
    }

    fn messages(&self) -> MessageCatalog {
        self.messages.clone()
    }
}

/// Deserialize a step's config blob; a missing blob reads as `{}`.
pub fn parse_config<T: DeserializeOwned>(meta: &StepMeta) -> Result<T, StepError> {
    let value = if meta.config.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        meta.config.clone()
    };
    serde_json::from_value(value)
        .map_err(|e| StepError::Config(format!("step '{}': {e}", meta.name)))
}
