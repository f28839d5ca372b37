//! Component lookup by type.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Registry of shared components available to policies and connectors
///
/// Components are stored behind `Arc` and looked up by their concrete type.
/// The registry is usually built once per API and shared by every exchange.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    components: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, replacing any previous one of the same type
    pub fn register<T: Any + Send + Sync>(&self, component: Arc<T>) {
        self.components.insert(TypeId::of::<T>(), component);
    }

    /// Look up a component by type
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.components.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Settings {
        name: &'static str,
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ComponentRegistry::new();
        registry.register(Arc::new(Settings { name: "proxy" }));

        let settings = registry.get::<Settings>().unwrap();
        assert_eq!(settings.name, "proxy");
        assert!(registry.get::<String>().is_none());
    }

    #[test]
    fn test_clones_share_components() {
        let registry = ComponentRegistry::new();
        let clone = registry.clone();
        clone.register(Arc::new(42u32));

        assert!(registry.contains::<u32>());
        assert_eq!(registry.len(), 1);
    }
}
