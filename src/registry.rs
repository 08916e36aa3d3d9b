//! In-memory model registry
//!
//! Models are immutable once inserted, so reads hand out `Arc<Model>` clones
//! and proceed concurrently; inserts and removals take the write lock.

use crate::error::{EngineError, Result};
use crate::training::Model;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Default)]
struct RegistryInner {
    models: HashMap<String, Arc<Model>>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

/// Thread-safe map from model id to trained model
#[derive(Debug, Default)]
pub struct ModelRegistry {
    inner: RwLock<RegistryInner>,
    /// Evict the oldest entry once this many models are held
    capacity: Option<usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            capacity,
        }
    }

    /// Insert a model under its own id, replacing any previous entry
    pub fn insert(&self, model: Model) -> Arc<Model> {
        self.insert_arc(Arc::new(model))
    }

    pub fn insert_arc(&self, model: Arc<Model>) -> Arc<Model> {
        let mut inner = self.inner.write();
        let id = model.id.clone();

        if inner.models.insert(id.clone(), Arc::clone(&model)).is_some() {
            inner.order.retain(|existing| existing != &id);
        }
        inner.order.push_back(id);

        if let Some(cap) = self.capacity {
            while inner.models.len() > cap.max(1) {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.models.remove(&oldest);
                tracing::debug!(model_id = %oldest, "evicted model from registry");
            }
        }
        model
    }

    /// Look up a model by id
    pub fn get(&self, id: &str) -> Result<Arc<Model>> {
        self.inner
            .read()
            .models
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::ModelNotFound(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Result<Arc<Model>> {
        let mut inner = self.inner.write();
        let model = inner
            .models
            .remove(id)
            .ok_or_else(|| EngineError::ModelNotFound(id.to_string()))?;
        inner.order.retain(|existing| existing != id);
        Ok(model)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().models.contains_key(id)
    }

    /// Ids in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.inner.read().order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ClusteringParams, ModelConfig, ModelFamily, ModelParameters, ModelPerformance, TrainingDataInfo};
    use ndarray::array;

    fn model() -> Model {
        Model::new(
            ModelFamily::KMeans,
            ModelParameters::Clustering { centroids: array![[0.0]] },
            ModelConfig::Clustering(ClusteringParams::default()),
            TrainingDataInfo {
                feature_names: vec!["x".to_string()],
                target_name: None,
                split_ratio: 1.0,
                n_samples: 1,
            },
            ModelPerformance::default(),
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = ModelRegistry::new();
        let stored = registry.insert(model());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&stored.id));
        assert_eq!(registry.get(&stored.id).unwrap().id, stored.id);

        registry.remove(&stored.id).unwrap();
        assert!(registry.is_empty());
        assert!(matches!(registry.get(&stored.id), Err(EngineError::ModelNotFound(_))));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let registry = ModelRegistry::with_capacity(Some(2));
        let first = registry.insert(model());
        let second = registry.insert(model());
        let third = registry.insert(model());

        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&first.id));
        assert_eq!(registry.ids(), vec![second.id.clone(), third.id.clone()]);
    }

    #[test]
    fn test_concurrent_reads() {
        let registry = Arc::new(ModelRegistry::new());
        let id = registry.insert(model()).id.clone();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                std::thread::spawn(move || registry.get(&id).is_ok())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
