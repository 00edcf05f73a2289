//! Instance registry collaborator

use crate::error::{RegistryError, RegistryResult};
use crate::types::RegisteredThing;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Full current listing of registered things
    async fn list_things(&self) -> RegistryResult<Vec<RegisteredThing>>;
}

/// Registry held in process memory. Clones share the same listing.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    things: Arc<RwLock<Vec<RegisteredThing>>>,
    outage: Arc<RwLock<Option<String>>>,
}

impl MemoryRegistry {
    pub fn new(things: Vec<RegisteredThing>) -> Self {
        Self {
            things: Arc::new(RwLock::new(things)),
            outage: Arc::default(),
        }
    }

    pub fn register(&self, thing: RegisteredThing) {
        let mut things = self.things.write();
        things.retain(|existing| existing.thing_name != thing.thing_name);
        things.push(thing);
    }

    pub fn set_outage(&self, reason: Option<String>) {
        *self.outage.write() = reason;
    }
}

#[async_trait]
impl InstanceRegistry for MemoryRegistry {
    async fn list_things(&self) -> RegistryResult<Vec<RegisteredThing>> {
        if let Some(reason) = self.outage.read().clone() {
            return Err(RegistryError::Unavailable(reason));
        }
        Ok(self.things.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_register_replaces_by_name() {
        let registry = MemoryRegistry::default();
        registry.register(RegisteredThing {
            thing_name: "TestThing_1".to_string(),
            attributes: HashMap::new(),
        });
        registry.register(RegisteredThing {
            thing_name: "TestThing_1".to_string(),
            attributes: HashMap::from([("instance".to_string(), "zach".to_string())]),
        });

        let things = registry.list_things().await.unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].instance_name(), Some("zach"));
    }
}
