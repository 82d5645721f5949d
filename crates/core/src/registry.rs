//! Function Registry
//!
//! The process-wide table that routes function calls and remote replies to
//! agents. It is created once per game session and shared as an
//! `Arc<FunctionRegistry>`. Agents hold [`Registration`] guards that remove
//! their bindings when dropped.
//!
//! Delivery never runs agent code directly. Messages are pushed into each
//! agent's inbox channel and drained on the simulation step, so one agent
//! never processes two commands at once.

use crate::command::FunctionCall;
use crate::error::RegistryError;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Messages delivered to an agent's inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    FunctionCall(FunctionCall),
    /// Text spoken by the remote persona.
    Reply(String),
}

/// Process-wide connection settings for the dialogue service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub base_url: String,
    pub game_id: String,
    /// Ask the service to synthesise speech for the local client.
    pub tts: bool,
}

/// The sending half of an agent's inbox together with the names of the
/// functions it understands.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    agent_id: Uuid,
    functions: Arc<HashSet<String>>,
    inbox: mpsc::UnboundedSender<AgentMessage>,
}

impl AgentHandle {
    pub fn new(
        agent_id: Uuid,
        functions: impl IntoIterator<Item = String>,
        inbox: mpsc::UnboundedSender<AgentMessage>,
    ) -> Self {
        Self {
            agent_id,
            functions: Arc::new(functions.into_iter().collect()),
            inbox,
        }
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn handles(&self, function: &str) -> bool {
        self.functions.contains(function)
    }

    fn send(&self, message: AgentMessage) -> bool {
        self.inbox.send(message).is_ok()
    }
}

struct Binding {
    token: u64,
    handle: AgentHandle,
}

/// Guard for one registry binding. Dropping it unbinds the key unless a
/// later registration has already replaced it.
#[derive(Debug)]
pub struct Registration {
    key: String,
    token: u64,
    registry: Weak<FunctionRegistry>,
}

impl Registration {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.key, self.token);
        }
    }
}

pub struct FunctionRegistry {
    config: RegistryConfig,
    bindings: Mutex<HashMap<String, Binding>>,
    next_token: AtomicU64,
}

impl FunctionRegistry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            bindings: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn game_id(&self) -> &str {
        &self.config.game_id
    }

    fn bindings(&self) -> MutexGuard<'_, HashMap<String, Binding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `key` to `handle`, replacing any earlier binding for the key.
    pub fn register(self: &Arc<Self>, key: impl Into<String>, handle: AgentHandle) -> Registration {
        let key = key.into();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let agent_id = handle.agent_id;
        let previous = self
            .bindings()
            .insert(key.clone(), Binding { token, handle });
        match previous {
            Some(previous) => info!(
                %key,
                %agent_id,
                replaced = %previous.handle.agent_id,
                "Replaced registry binding"
            ),
            None => info!(%key, %agent_id, "Registered agent"),
        }
        Registration {
            key,
            token,
            registry: Arc::downgrade(self),
        }
    }

    /// Drops a registration now rather than at end of scope.
    pub fn unregister(&self, registration: Registration) {
        drop(registration);
    }

    fn release(&self, key: &str, token: u64) {
        let mut bindings = self.bindings();
        if bindings.get(key).is_some_and(|b| b.token == token) {
            bindings.remove(key);
            debug!(%key, "Unregistered agent");
        }
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.bindings().contains_key(key)
    }

    /// Agent currently bound to `key`.
    pub fn agent_for(&self, key: &str) -> Option<Uuid> {
        self.bindings().get(key).map(|b| b.handle.agent_id)
    }

    pub fn len(&self) -> usize {
        self.bindings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers a function call to the listener bound to `key`.
    pub fn dispatch(&self, key: &str, call: FunctionCall) -> Result<(), RegistryError> {
        self.deliver(key, AgentMessage::FunctionCall(call))
    }

    /// Delivers a remote reply to the listener bound to `key`.
    pub fn deliver_reply(&self, key: &str, text: impl Into<String>) -> Result<(), RegistryError> {
        self.deliver(key, AgentMessage::Reply(text.into()))
    }

    fn deliver(&self, key: &str, message: AgentMessage) -> Result<(), RegistryError> {
        let mut bindings = self.bindings();
        let binding = bindings
            .get(key)
            .ok_or_else(|| RegistryError::UnknownListener(key.to_string()))?;
        if binding.handle.send(message) {
            Ok(())
        } else {
            bindings.remove(key);
            warn!(%key, "Listener closed; binding pruned");
            Err(RegistryError::ListenerClosed(key.to_string()))
        }
    }

    /// Fans a call out to every agent whose vocabulary includes it.
    ///
    /// An agent bound under several keys receives the call once. Returns the
    /// number of agents reached.
    pub fn broadcast(&self, call: FunctionCall) -> usize {
        let mut bindings = self.bindings();
        let mut reached = HashSet::new();
        let mut closed = Vec::new();
        for (key, binding) in bindings.iter() {
            let handle = &binding.handle;
            if !handle.handles(&call.name) || reached.contains(&handle.agent_id) {
                continue;
            }
            if handle.send(AgentMessage::FunctionCall(call.clone())) {
                reached.insert(handle.agent_id);
            } else {
                closed.push(key.clone());
            }
        }
        for key in closed {
            bindings.remove(&key);
            warn!(%key, "Listener closed; binding pruned");
        }
        debug!(function = %call.name, reached = reached.len(), "Broadcast function call");
        reached.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Arc<FunctionRegistry> {
        FunctionRegistry::new(RegistryConfig {
            base_url: "http://localhost:4315/v1".into(),
            game_id: "test-game".into(),
            tts: false,
        })
    }

    fn listener() -> (AgentHandle, mpsc::UnboundedReceiver<AgentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let functions = ["move_to", "stop"].map(String::from);
        (AgentHandle::new(Uuid::new_v4(), functions, tx), rx)
    }

    fn stop_call() -> FunctionCall {
        FunctionCall::new("stop", json!({}))
    }

    #[test]
    fn test_connection_settings() {
        let registry = registry();
        assert_eq!(registry.base_url(), "http://localhost:4315/v1");
        assert_eq!(registry.game_id(), "test-game");
        assert!(!registry.config().tts);
    }

    #[test]
    fn test_reregistration_replaces_binding() {
        let registry = registry();
        let (first, mut first_rx) = listener();
        let (second, mut second_rx) = listener();
        let second_id = second.agent_id();

        let _a = registry.register("Victor", first);
        let _b = registry.register("Victor", second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.agent_for("Victor"), Some(second_id));

        registry.dispatch("Victor", stop_call()).unwrap();
        assert!(first_rx.try_recv().is_err());
        assert_eq!(
            second_rx.try_recv().unwrap(),
            AgentMessage::FunctionCall(stop_call())
        );
    }

    #[test]
    fn test_dropping_replaced_registration_keeps_newer_binding() {
        let registry = registry();
        let (first, _first_rx) = listener();
        let (second, _second_rx) = listener();
        let second_id = second.agent_id();

        let a = registry.register("Victor", first);
        let b = registry.register("Victor", second);
        drop(a);
        assert_eq!(registry.agent_for("Victor"), Some(second_id));

        registry.unregister(b);
        assert!(!registry.is_registered("Victor"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_to_unknown_key() {
        let registry = registry();
        assert_eq!(
            registry.dispatch("nobody", stop_call()).unwrap_err(),
            RegistryError::UnknownListener("nobody".into())
        );
    }

    #[test]
    fn test_closed_listener_is_pruned() {
        let registry = registry();
        let (handle, rx) = listener();
        let _reg = registry.register("Victor", handle);
        drop(rx);

        assert_eq!(
            registry.deliver_reply("Victor", "hi").unwrap_err(),
            RegistryError::ListenerClosed("Victor".into())
        );
        assert!(!registry.is_registered("Victor"));
    }

    #[test]
    fn test_broadcast_dedupes_and_filters_by_vocabulary() {
        let registry = registry();
        let (a, mut a_rx) = listener();
        let (b, mut b_rx) = listener();
        let _a_name = registry.register("Victor", a.clone());
        let _a_session = registry.register("session-1", a);
        let _b = registry.register("Ada", b);

        assert_eq!(registry.broadcast(stop_call()), 2);
        assert!(a_rx.try_recv().is_ok());
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());

        assert_eq!(registry.broadcast(FunctionCall::new("dance", json!({}))), 0);
    }

    #[test]
    fn test_registration_outliving_registry_is_harmless() {
        let registry = registry();
        let (handle, _rx) = listener();
        let reg = registry.register("Victor", handle);
        drop(registry);
        assert_eq!(reg.key(), "Victor");
        drop(reg);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = registry();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let (handle, rx) = listener();
                    (registry.register(format!("npc-{}", i), handle), rx)
                })
            })
            .collect();
        let registrations: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(registry.len(), 8);

        drop(registrations);
        assert!(registry.is_empty());
    }
}
