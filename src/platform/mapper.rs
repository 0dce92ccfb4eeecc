//! Algorithm name to model mapping.

use crate::config::AlgorithmConfig;
use std::collections::BTreeMap;

/// Model a scene's algorithm runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBinding {
    /// Model identifier handed to the detector factory.
    pub model_id: String,
    /// Classes allowed to raise alarms. Empty means all.
    pub target_classes: Vec<String>,
}

/// Resolves algorithm names to models.
pub trait SceneMapper: Send + Sync {
    /// Binding for `algorithm`, or `None` if unknown.
    fn resolve_model(&self, algorithm: &str) -> Option<ModelBinding>;
}

/// Mapper backed by the `[algorithms]` config table.
#[derive(Debug, Clone, Default)]
pub struct ConfigSceneMapper {
    bindings: BTreeMap<String, AlgorithmConfig>,
}

impl ConfigSceneMapper {
    /// Build from config bindings.
    pub fn new(bindings: BTreeMap<String, AlgorithmConfig>) -> Self {
        Self { bindings }
    }

    /// Known algorithm names.
    pub fn algorithms(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl SceneMapper for ConfigSceneMapper {
    fn resolve_model(&self, algorithm: &str) -> Option<ModelBinding> {
        self.bindings
            .get(algorithm.trim())
            .map(|binding| ModelBinding {
                model_id: binding.model.clone(),
                target_classes: binding.target_classes.clone(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mapper() -> ConfigSceneMapper {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "fire".to_string(),
            AlgorithmConfig {
                model: "fire-smoke-v3".to_string(),
                target_classes: vec!["fire".to_string(), "smoke".to_string()],
            },
        );
        bindings.insert(
            "helmet".to_string(),
            AlgorithmConfig {
                model: "helmet-v1".to_string(),
                target_classes: vec![],
            },
        );
        ConfigSceneMapper::new(bindings)
    }

    #[test]
    fn test_known_algorithm() {
        let binding = mapper().resolve_model("fire").unwrap();
        assert_eq!(binding.model_id, "fire-smoke-v3");
        assert_eq!(binding.target_classes, vec!["fire", "smoke"]);
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(mapper().resolve_model("flood").is_none());
    }

    #[test]
    fn test_lists_algorithms() {
        let m = mapper();
        assert_eq!(m.algorithms().collect::<Vec<_>>(), vec!["fire", "helmet"]);
    }
}
