use crate::{Agent, TrackStore};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Builds an agent bound to a catalog store.
pub type AgentFactory = Arc<dyn Fn(Arc<dyn TrackStore>) -> Arc<dyn Agent> + Send + Sync>;

/// An instantiated agent together with the name it was registered under.
#[derive(Clone)]
pub struct RegisteredAgent {
    pub name: String,
    pub agent: Arc<dyn Agent>,
}

impl fmt::Debug for RegisteredAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAgent")
            .field("name", &self.name)
            .finish()
    }
}

/// Name → factory mapping for every pluggable agent.
///
/// Registration order is preserved so fan-out is deterministic; re-registering
/// a name swaps the factory in place. The registry can be shared between
/// threads and mutated while brokers are dispatching: the lock only guards the
/// factory list and is released before any agent runs.
#[derive(Default)]
pub struct AgentRegistry {
    factories: RwLock<Vec<(String, AgentFactory)>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the factory for `name`, replacing any previous registration.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(Arc<dyn TrackStore>) -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: AgentFactory = Arc::new(factory);
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(slot) = factories.iter_mut().find(|(n, _)| *n == name) {
            log::debug!("Replacing agent factory '{name}'");
            slot.1 = factory;
        } else {
            log::debug!("Registering agent factory '{name}'");
            factories.push((name, factory));
        }
    }

    /// Remove the factory for `name`. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        let before = factories.len();
        factories.retain(|(n, _)| n != name);
        before != factories.len()
    }

    /// Instantiate every registered agent against `store`, in registration order.
    pub fn enabled_agents(&self, store: &Arc<dyn TrackStore>) -> Vec<RegisteredAgent> {
        // Snapshot the factories so no lock is held while they run.
        let factories: Vec<(String, AgentFactory)> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        factories
            .into_iter()
            .map(|(name, factory)| RegisteredAgent {
                agent: factory(Arc::clone(store)),
                name,
            })
            .collect()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}
