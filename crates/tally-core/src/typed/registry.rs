//! TypedRegistry - task_type → handler lookup.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;

/// Holds one type-erased handler per task type.
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<TrackEvent, _>(tracking_handler)?;
/// let handler = registry.get(TrackEvent::TYPE);
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for task type '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let task_type = T::TYPE.to_string();
        if self.handlers.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type));
        }
        self.handlers
            .insert(task_type, Arc::new(TypedHandler::new(handler)));
        Ok(())
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
