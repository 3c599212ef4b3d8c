//! Process-wide wiring helpers.
//!
//! The broker itself never reads global state; these accessors exist for the
//! outermost layer (binaries, plugin initialisation) that needs one registry
//! and one broker per store for the whole process.

use crate::{Agent, AgentRegistry, BrokerConfig, ScrobbleBroker, TrackStore};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static REGISTRY: OnceLock<Arc<AgentRegistry>> = OnceLock::new();
static BROKERS: OnceLock<Mutex<Vec<Arc<ScrobbleBroker>>>> = OnceLock::new();

/// The process-wide agent registry, created empty on first use.
pub fn agent_registry() -> Arc<AgentRegistry> {
    Arc::clone(REGISTRY.get_or_init(|| Arc::new(AgentRegistry::new())))
}

/// Register an agent factory in the process-wide registry.
pub fn register_agent<F>(name: impl Into<String>, factory: F)
where
    F: Fn(Arc<dyn TrackStore>) -> Arc<dyn Agent> + Send + Sync + 'static,
{
    agent_registry().register(name, factory);
}

/// The broker for `store`, created with the default config on first request.
pub fn get_broker(store: &Arc<dyn TrackStore>) -> Arc<ScrobbleBroker> {
    get_broker_with_config(store, BrokerConfig::default())
}

/// The broker for `store`. `config` is only used if the broker does not exist
/// yet; later calls return the existing instance unchanged.
///
/// Brokers are cached for the life of the process and keep their store alive.
/// Call [`release_broker`] to drop the cached instance for a store.
pub fn get_broker_with_config(
    store: &Arc<dyn TrackStore>,
    config: BrokerConfig,
) -> Arc<ScrobbleBroker> {
    let mut brokers = brokers();

    if let Some(broker) = brokers.iter().find(|b| serves(b, store)) {
        return Arc::clone(broker);
    }

    log::debug!("Creating shared scrobble broker");
    let broker = Arc::new(ScrobbleBroker::with_config(
        Arc::clone(store),
        agent_registry(),
        config,
    ));
    brokers.push(Arc::clone(&broker));
    broker
}

/// Remove the cached broker for `store`. Returns whether one was cached.
///
/// Handles already given out keep working; the next [`get_broker`] call for
/// the store creates a fresh broker with an empty now-playing table.
pub fn release_broker(store: &Arc<dyn TrackStore>) -> bool {
    let mut brokers = brokers();
    let before = brokers.len();
    brokers.retain(|b| !serves(b, store));
    before != brokers.len()
}

fn brokers() -> MutexGuard<'static, Vec<Arc<ScrobbleBroker>>> {
    BROKERS
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn serves(broker: &ScrobbleBroker, store: &Arc<dyn TrackStore>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(broker.store()), Arc::as_ptr(store))
}
