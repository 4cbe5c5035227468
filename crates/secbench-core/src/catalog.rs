//! Ordered rule catalog for one benchmark version.

use crate::error::{EngineError, Result};
use crate::rule::Rule;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered, id-unique set of rules plus the benchmark's published point count.
///
/// `total_possible_points` is a property of the benchmark version, not of the
/// rule count: some rules cover several benchmark items.
pub struct Catalog {
    name: String,
    version: String,
    total_possible_points: u32,
    rules: Vec<Arc<dyn Rule>>,
    ids: HashSet<String>,
}

impl Catalog {
    pub fn new(name: impl Into<String>, version: impl Into<String>, total_possible_points: u32) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            total_possible_points,
            rules: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Append a rule. Rejects an id already registered.
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> Result<()> {
        if !self.ids.insert(rule.id().to_string()) {
            return Err(EngineError::DuplicateRule(rule.id().to_string()));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Builder form of [`Catalog::register`].
    pub fn with_rule(mut self, rule: Arc<dyn Rule>) -> Result<Self> {
        self.register(rule)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn total_possible_points(&self) -> u32 {
        self.total_possible_points
    }

    /// Rules in catalog order.
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.iter().find(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// SHA-256 over the ordered rule ids. Order sensitive.
    pub fn digest(&self) -> String {
        compute_ids_digest(self.rules.iter().map(|r| r.id()))
    }
}

fn compute_ids_digest<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
