use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::error::AnalyzerError;

use super::backend::{AnalysisCapability, SceneAnalyzer};

/// Registry of scene analyzers.
///
/// Analyzers are shared as `Arc<dyn SceneAnalyzer>`; the trait uses interior
/// mutability so no outer lock is needed. `initialize_all` records which analyzers
/// loaded, and lookups skip analyzers that failed so callers fall back to whatever
/// is still usable (normally the heuristic analyzer).
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn SceneAnalyzer>>,
    order: Vec<String>,
    default_name: Option<String>,
    failed: HashSet<String>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            analyzers: HashMap::new(),
            order: Vec::new(),
            default_name: None,
            failed: HashSet::new(),
        }
    }

    /// Register an analyzer. The first registered analyzer becomes the default.
    pub fn register(&mut self, analyzer: Arc<dyn SceneAnalyzer>) {
        let name = analyzer.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        if !self.analyzers.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.failed.remove(&name);
        self.analyzers.insert(name, analyzer);
    }

    /// Set default analyzer by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.analyzers.contains_key(name) {
            return Err(anyhow!("analyzer '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SceneAnalyzer>> {
        self.analyzers.get(name).cloned()
    }

    pub fn default_analyzer(&self) -> Option<Arc<dyn SceneAnalyzer>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered analyzer names, in registration order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.analyzers.contains_key(name) && !self.failed.contains(name)
    }

    /// Initialize every analyzer; failures are recorded and returned, not fatal.
    pub fn initialize_all(&mut self) -> Vec<(String, AnalyzerError)> {
        let mut errors = Vec::new();
        for name in &self.order {
            let Some(analyzer) = self.analyzers.get(name) else {
                continue;
            };
            match analyzer.initialize() {
                Ok(()) => {
                    self.failed.remove(name);
                }
                Err(e) => {
                    log::warn!("analyzer {} unavailable: {}", name, e);
                    self.failed.insert(name.clone());
                    errors.push((name.clone(), e));
                }
            }
        }
        errors
    }

    /// Select an analyzer that supports the requested capability.
    ///
    /// Prefers the default analyzer when it supports the capability and loaded.
    pub fn analyzer_for(&self, capability: AnalysisCapability) -> Result<Arc<dyn SceneAnalyzer>> {
        if let Some(name) = &self.default_name {
            if let Some(found) = self.usable(name, capability) {
                return Ok(found);
            }
        }
        for name in &self.order {
            if let Some(found) = self.usable(name, capability) {
                return Ok(found);
            }
        }
        Err(anyhow!(
            "no available analyzer supports capability {:?}",
            capability
        ))
    }

    /// The named analyzer if usable for `capability`, else any usable one.
    pub fn preferred(
        &self,
        name: &str,
        capability: AnalysisCapability,
    ) -> Result<Arc<dyn SceneAnalyzer>> {
        if let Some(found) = self.usable(name, capability) {
            return Ok(found);
        }
        log::info!(
            "analyzer {} unavailable for {:?}; falling back",
            name,
            capability
        );
        self.analyzer_for(capability)
    }

    fn usable(&self, name: &str, capability: AnalysisCapability) -> Option<Arc<dyn SceneAnalyzer>> {
        if self.failed.contains(name) {
            return None;
        }
        self.analyzers
            .get(name)
            .filter(|a| a.supports(capability))
            .cloned()
    }

    /// Dispose every analyzer.
    pub fn dispose_all(&self) {
        for analyzer in self.analyzers.values() {
            analyzer.dispose();
        }
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
