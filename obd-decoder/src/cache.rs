//! Per-model-year registry cache

use crate::signals::{CommandRegistry, SignalSet};
use crate::types::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type BuildFn = dyn Fn(u32) -> Result<CommandRegistry> + Send + Sync;

/// Cache of command registries keyed by model year
///
/// The cache owns the function that builds a registry for a year, so the
/// year alone identifies a cached registry. Each registry is built at most
/// once. Building happens under the cache lock, so concurrent callers asking
/// for the same year wait for the first build and then share its result.
/// Published registries are never mutated.
///
/// # Thread Safety
///
/// The cache can be shared across threads using `Arc`.
pub struct RegistryCache {
    build: Box<BuildFn>,
    registries: Mutex<HashMap<u32, Arc<CommandRegistry>>>,
}

impl RegistryCache {
    /// Create a cache that builds missing registries with `build`
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(u32) -> Result<CommandRegistry> + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
            registries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a cache over a vehicle signal set, optionally layered on a base set
    ///
    /// Each year's registry holds the commands whose filter admits that year.
    pub fn for_signal_sets(base: Option<SignalSet>, vehicle: SignalSet) -> Self {
        Self::new(move |model_year| {
            Ok(CommandRegistry::for_model_year(
                base.as_ref(),
                &vehicle,
                model_year,
            ))
        })
    }

    /// Return the registry for `model_year`, building it if absent
    ///
    /// A failed build leaves the cache untouched; the next call retries.
    pub fn registry_for(&self, model_year: u32) -> Result<Arc<CommandRegistry>> {
        let mut registries = self.registries.lock();
        if let Some(registry) = registries.get(&model_year) {
            return Ok(Arc::clone(registry));
        }

        log::debug!("Building command registry for model year {}", model_year);
        let registry = Arc::new((self.build)(model_year)?);
        registries.insert(model_year, Arc::clone(&registry));
        Ok(registry)
    }

    /// Cached registry for `model_year`, if one was built
    pub fn get(&self, model_year: u32) -> Option<Arc<CommandRegistry>> {
        self.registries.lock().get(&model_year).cloned()
    }

    pub fn len(&self) -> usize {
        self.registries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.lock().is_empty()
    }

    /// Drop every cached registry
    pub fn clear(&self) {
        self.registries.lock().clear();
    }
}

impl fmt::Debug for RegistryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut years: Vec<u32> = self.registries.lock().keys().copied().collect();
        years.sort_unstable();
        f.debug_struct("RegistryCache")
            .field("model_years", &years)
            .finish_non_exhaustive()
    }
}
