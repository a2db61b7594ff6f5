// Per-run workspace of named record sets
// Author: Gabriel Demetrios Lafis

use std::borrow::Cow;
use std::collections::HashMap;

use crate::data::{Record, RecordSet};
use crate::processing::{ProcessingError, StepConfig, StepOutput};
use crate::storage::RecordStore;

/// Record sets produced so far by one run, backed by the record store for
/// names no step has produced
pub struct Workspace<'a> {
    sets: HashMap<String, RecordSet>,
    store: &'a dyn RecordStore,
}

impl<'a> Workspace<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Workspace {
            sets: HashMap::new(),
            store,
        }
    }

    pub fn insert(&mut self, name: &str, records: RecordSet) {
        self.sets.insert(name.to_string(), records);
    }

    pub fn get(&self, name: &str) -> Option<&RecordSet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<RecordSet> {
        self.sets.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Records of `name`: the workspace first, then the record store
    pub fn resolve(&self, name: &str) -> Result<Cow<'_, [Record]>, ProcessingError> {
        if let Some(records) = self.sets.get(name) {
            return Ok(Cow::Borrowed(records.as_slice()));
        }

        if self.store.has_collection(name)? {
            return Ok(Cow::Owned(self.store.find_all(name, None)?));
        }

        Err(ProcessingError::UnresolvedSource(name.to_string()))
    }

    /// Resolve the inputs of `config` and run its processor
    pub fn execute(&self, config: &StepConfig) -> Result<StepOutput, ProcessingError> {
        let resolved = config
            .sources()
            .into_iter()
            .map(|name| self.resolve(name))
            .collect::<Result<Vec<_>, _>>()?;

        let inputs: Vec<&[Record]> = resolved.iter().map(|set| set.as_ref()).collect();
        config.processor().process(&inputs)
    }
}
