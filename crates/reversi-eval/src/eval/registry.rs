//! Shared evaluator stores.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use rapidhash::fast::RapidHasher;

use super::{CoeffError, Eval};

type StoreMap = HashMap<(char, char), Arc<Eval>, BuildHasherDefault<RapidHasher<'static>>>;

/// Caches one [`Eval`] per family/set pair.
///
/// An explicit collaborator rather than a process global: the embedding
/// search context owns a registry and hands shared stores to its threads.
/// Loading happens under the lock, so concurrent first requests for the
/// same pair build the store once.
pub struct EvalRegistry {
    base_dir: PathBuf,
    cache: Mutex<StoreMap>,
}

impl EvalRegistry {
    /// Creates a registry rooted at the directory containing
    /// `coefficients/`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        EvalRegistry {
            base_dir: base_dir.into(),
            cache: Mutex::new(StoreMap::default()),
        }
    }

    /// Returns the store for the pair, loading it on first use.
    pub fn find(&self, family: char, set: char) -> Result<Arc<Eval>, CoeffError> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = cache.get(&(family, set)) {
            return Ok(Arc::clone(found));
        }
        let eval = Arc::new(Eval::load(family, set, &self.base_dir)?);
        cache.insert((family, set), Arc::clone(&eval));
        Ok(eval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_family_is_rejected() {
        let registry = EvalRegistry::new("/nonexistent");
        let err = registry.find('K', 'A').err().expect("load must fail");
        assert!(matches!(err, CoeffError::UnsupportedFamily { family: 'K' }));
    }

    #[test]
    fn test_missing_files_surface_the_path() {
        let registry = EvalRegistry::new("/nonexistent");
        let err = registry.find('J', 'A').err().expect("load must fail");
        match err {
            CoeffError::File { path, .. } => {
                assert!(path.ends_with("coefficients/JAa.cof"));
            }
            other => panic!("expected File error, got {other:?}"),
        }
    }
}
