//! One complete NPC: the behaviour state machine, its dialogue session, and
//! the inbox through which the function registry reaches it.

use crate::agent::{Agent, Animator};
use crate::dialogue_client::DialogueClient;
use crate::navigation::Navigator;
use crate::registry::{AgentHandle, AgentMessage, FunctionRegistry, Registration};
use crate::session::{DialogueSession, Persona};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct Npc<N: Navigator, A: Animator> {
    agent: Agent<N, A>,
    session: DialogueSession,
    inbox: mpsc::UnboundedReceiver<AgentMessage>,
    _registration: Registration,
}

impl<N: Navigator, A: Animator> Npc<N, A> {
    /// Wires `agent` to a new dialogue session and registers it with the
    /// registry under the agent's name. Dropping the `Npc` removes every
    /// binding it created.
    pub fn new(
        agent: Agent<N, A>,
        persona: Persona,
        client: Arc<dyn DialogueClient>,
        registry: Arc<FunctionRegistry>,
        max_chat_entries: usize,
    ) -> Self {
        let (tx, inbox) = mpsc::unbounded_channel();
        let functions = agent.vocabulary().into_iter().map(|d| d.name);
        let handle = AgentHandle::new(agent.id(), functions, tx);
        let registration = registry.register(agent.name(), handle.clone());
        let session = DialogueSession::new(persona, client, registry, handle, max_chat_entries);
        Self {
            agent,
            session,
            inbox,
            _registration: registration,
        }
    }

    /// Spawns the remote identity. Call once per lifetime.
    pub fn start(&self) -> JoinHandle<()> {
        self.session.spawn(self.agent.vocabulary())
    }

    /// Player text: recorded, tried as a command, and sent as chat.
    pub fn submit(&mut self, text: &str) -> Option<JoinHandle<()>> {
        self.session.submit(text, &mut self.agent)
    }

    /// One simulation step. Applies finished network operations, then queued
    /// function calls and replies in arrival order, then steering.
    pub fn tick(&mut self, dt: f32) {
        self.session.poll();
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                AgentMessage::FunctionCall(call) => {
                    // Failures are logged inside the agent.
                    let _ = self.agent.handle_function_call(&call);
                }
                AgentMessage::Reply(text) => self.session.on_remote_reply(&text),
            }
        }
        self.agent.tick(dt);
        debug!(npc = %self.agent.name(), intent = %self.agent.intent(), "Tick");
    }

    pub fn agent(&self) -> &Agent<N, A> {
        &self.agent
    }

    pub fn session(&self) -> &DialogueSession {
        &self.session
    }
}
