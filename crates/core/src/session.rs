//! Dialogue Session Manager
//!
//! Owns one remote conversational identity: the spawn that creates it, the
//! chat messages sent to it, and the transcript shown to the player.
//!
//! Network operations run as tokio tasks and never block the simulation
//! step. Their results come back over a channel and are applied by
//! [`DialogueSession::poll`], which the owner calls once per tick. There is no
//! retry and no timeout at this layer. A reply that arrives late is still
//! displayed.

use crate::agent::CommandSink;
use crate::command::FunctionDefinition;
use crate::dialogue_client::{ChatRequest, DialogueClient, SpawnRequest};
use crate::error::{SessionError, TransportError};
use crate::registry::{AgentHandle, FunctionRegistry, Registration};
use crate::transcript::{HUMAN_SENDER, Transcript};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, instrument, warn};

/// TTS mode requested when the registry has speech enabled.
pub const TTS_LOCAL_CLIENT: &str = "local_client";

/// Character configuration sent to the dialogue service on spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub short_name: String,
    pub full_name: String,
    pub character_description: String,
    pub system_prompt: String,
    pub voice_id: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            short_name: "Victor".to_string(),
            full_name: "Victor J. Johnson".to_string(),
            character_description: "I am crazed scientist on the hunt for gold!".to_string(),
            system_prompt: "Victor is a scientist obsessed with finding gold.".to_string(),
            voice_id: "01955d76-ed5b-7451-92d6-5ef579d3ed28".to_string(),
        }
    }
}

/// Completion of a network operation, sent back to the session.
#[derive(Debug)]
enum SessionEvent {
    Spawned(Result<String, TransportError>),
    ChatSent(Result<(), TransportError>),
}

pub struct DialogueSession {
    persona: Persona,
    client: Arc<dyn DialogueClient>,
    registry: Arc<FunctionRegistry>,
    handle: AgentHandle,
    session_id: Option<String>,
    registration: Option<Registration>,
    transcript: Transcript,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl DialogueSession {
    /// Creates a session with no remote identity yet. `handle` is what gets
    /// registered under the session id once spawn succeeds.
    pub fn new(
        persona: Persona,
        client: Arc<dyn DialogueClient>,
        registry: Arc<FunctionRegistry>,
        handle: AgentHandle,
        max_entries: usize,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            persona,
            client,
            registry,
            handle,
            session_id: None,
            registration: None,
            transcript: Transcript::new(max_entries),
            events_tx,
            events_rx,
        }
    }

    /// The remote session id, once spawn has completed successfully.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Issues the spawn request. The outcome is applied on a later `poll`.
    ///
    /// Calling this twice creates two remote identities; only the last one to
    /// succeed stays registered.
    #[instrument(skip_all, fields(npc = %self.persona.short_name))]
    pub fn spawn(&self, commands: Vec<FunctionDefinition>) -> JoinHandle<()> {
        let request = SpawnRequest {
            short_name: self.persona.short_name.clone(),
            name: self.persona.full_name.clone(),
            character_description: self.persona.character_description.clone(),
            system_prompt: self.persona.system_prompt.clone(),
            voice_id: self.persona.voice_id.clone(),
            commands,
        };
        let client = self.client.clone();
        let game_id = self.registry.game_id().to_string();
        let events_tx = self.events_tx.clone();
        info!(%game_id, commands = request.commands.len(), "Spawning remote NPC");

        tokio::spawn(
            async move {
                let result = client.spawn(&game_id, &request).await;
                if events_tx.send(SessionEvent::Spawned(result)).is_err() {
                    debug!("Session dropped before spawn completed");
                }
            }
            .in_current_span(),
        )
    }

    /// Handles text typed by the player.
    ///
    /// Blank text is ignored. Otherwise the text is recorded in the
    /// transcript, tried as a manual command on `sink`, and sent as chat if a
    /// remote session exists. Returns the handle of the chat task, if one was
    /// started.
    pub fn submit(&mut self, text: &str, sink: &mut dyn CommandSink) -> Option<JoinHandle<()>> {
        if text.trim().is_empty() {
            return None;
        }
        self.transcript.push(HUMAN_SENDER, text);
        // Failures are logged by the sink; chat still goes out.
        let _ = sink.process_command(text);

        match self.send_chat(text, sink.describe_state()) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(npc = %self.persona.short_name, error = %e, "Chat message not sent");
                None
            }
        }
    }

    fn send_chat(
        &self,
        text: &str,
        game_state_info: Option<String>,
    ) -> Result<JoinHandle<()>, SessionError> {
        let session_id = self
            .session_id
            .clone()
            .ok_or(SessionError::SessionUnavailable)?;
        let request = ChatRequest {
            sender_name: self.persona.full_name.clone(),
            sender_message: text.to_string(),
            game_state_info,
            tts: self
                .registry
                .config()
                .tts
                .then(|| TTS_LOCAL_CLIENT.to_string()),
        };
        let client = self.client.clone();
        let game_id = self.registry.game_id().to_string();
        let events_tx = self.events_tx.clone();
        let span = tracing::info_span!("chat", npc = %self.persona.short_name, %session_id);

        Ok(tokio::spawn(
            async move {
                let result = client.chat(&game_id, &session_id, &request).await;
                if events_tx.send(SessionEvent::ChatSent(result)).is_err() {
                    debug!("Session dropped before chat completed");
                }
            }
            .instrument(span),
        ))
    }

    /// Appends a line spoken by the remote persona.
    pub fn on_remote_reply(&mut self, text: &str) {
        info!(npc = %self.persona.short_name, text, "Remote reply");
        self.transcript.push(self.persona.full_name.clone(), text);
    }

    /// Applies every network completion received so far, in arrival order.
    /// Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: SessionEvent) {
        let npc = &self.persona.short_name;
        match event {
            SessionEvent::Spawned(Ok(session_id)) => {
                info!(%npc, %session_id, "Remote NPC spawned");
                self.registration = Some(self.registry.register(session_id.clone(), self.handle.clone()));
                self.session_id = Some(session_id);
            }
            SessionEvent::Spawned(Err(e)) => {
                let e = SessionError::from(e);
                error!(%npc, error = %e, "Failed to spawn remote NPC");
            }
            SessionEvent::ChatSent(Ok(())) => debug!(%npc, "Chat message delivered"),
            SessionEvent::ChatSent(Err(e)) => {
                let e = SessionError::from(e);
                error!(%npc, error = %e, "Failed to send chat message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, vocabulary};
    use crate::dialogue_client::MockDialogueClient;
    use crate::error::CommandError;
    use crate::registry::{AgentMessage, RegistryConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        inputs: Vec<String>,
        results: Vec<Result<(), CommandError>>,
    }

    impl CommandSink for RecordingSink {
        fn process_command(&mut self, input: &str) -> Result<(), CommandError> {
            self.inputs.push(input.to_string());
            let result = Command::parse(input).map(|_| ());
            self.results.push(result.clone());
            result
        }

        fn describe_state(&self) -> Option<String> {
            Some("Victor is idle".to_string())
        }
    }

    struct Fixture {
        session: DialogueSession,
        registry: Arc<FunctionRegistry>,
        _inbox: mpsc::UnboundedReceiver<AgentMessage>,
    }

    fn fixture(client: MockDialogueClient, tts: bool, max_entries: usize) -> Fixture {
        let registry = FunctionRegistry::new(RegistryConfig {
            base_url: "http://localhost:4315/v1".into(),
            game_id: "test-game".into(),
            tts,
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = AgentHandle::new(
            Uuid::new_v4(),
            vocabulary().into_iter().map(|d| d.name),
            tx,
        );
        let session = DialogueSession::new(
            Persona::default(),
            Arc::new(client),
            registry.clone(),
            handle,
            max_entries,
        );
        Fixture {
            session,
            registry,
            _inbox: rx,
        }
    }

    async fn spawned(mut client: MockDialogueClient, tts: bool) -> Fixture {
        client
            .expect_spawn()
            .times(1)
            .returning(|_, _| Ok("session-1".to_string()));
        let mut fx = fixture(client, tts, 8);
        fx.session.spawn(vocabulary()).await.unwrap();
        assert_eq!(fx.session.poll(), 1);
        fx
    }

    #[tokio::test]
    async fn test_spawn_success_stores_id_and_registers() {
        let mut client = MockDialogueClient::new();
        client
            .expect_spawn()
            .withf(|game_id, request| {
                game_id == "test-game"
                    && request.short_name == "Victor"
                    && request.name == "Victor J. Johnson"
                    && request.commands.len() == 6
            })
            .times(1)
            .returning(|_, _| Ok("session-1".to_string()));
        let mut fx = fixture(client, false, 8);

        assert!(!fx.session.is_ready());
        fx.session.spawn(vocabulary()).await.unwrap();
        assert_eq!(fx.session.poll(), 1);

        assert_eq!(fx.session.session_id(), Some("session-1"));
        assert!(fx.registry.is_registered("session-1"));
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_session_unset() {
        let mut client = MockDialogueClient::new();
        client.expect_spawn().times(1).returning(|_, _| {
            Err(TransportError::Status {
                status: 500,
                body: "boom".into(),
            })
        });
        let mut fx = fixture(client, false, 8);

        fx.session.spawn(vocabulary()).await.unwrap();
        fx.session.poll();
        assert_eq!(fx.session.session_id(), None);
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_second_spawn_replaces_first_registration() {
        let mut client = MockDialogueClient::new();
        let spawns = AtomicUsize::new(0);
        client.expect_spawn().times(2).returning(move |_, _| {
            let n = spawns.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("session-{}", n))
        });
        let mut fx = fixture(client, false, 8);

        fx.session.spawn(vocabulary()).await.unwrap();
        fx.session.poll();
        fx.session.spawn(vocabulary()).await.unwrap();
        fx.session.poll();

        assert_eq!(fx.session.session_id(), Some("session-2"));
        assert!(fx.registry.is_registered("session-2"));
        assert!(!fx.registry.is_registered("session-1"));
    }

    #[tokio::test]
    async fn test_blank_submit_is_a_no_op() {
        let mut fx = fixture(MockDialogueClient::new(), false, 8);
        let mut sink = RecordingSink::default();

        assert!(fx.session.submit("", &mut sink).is_none());
        assert!(fx.session.submit("   ", &mut sink).is_none());
        assert!(fx.session.transcript().is_empty());
        assert!(sink.inputs.is_empty());
    }

    #[tokio::test]
    async fn test_submit_after_failed_spawn_records_and_parses_without_chat() {
        let mut client = MockDialogueClient::new();
        client
            .expect_spawn()
            .returning(|_, _| Err(TransportError::Decode("empty".into())));
        client.expect_chat().never();
        let mut fx = fixture(client, false, 8);
        fx.session.spawn(vocabulary()).await.unwrap();
        fx.session.poll();

        let mut sink = RecordingSink::default();
        assert!(fx.session.submit("hello", &mut sink).is_none());

        let last = fx.session.transcript().last().unwrap();
        assert_eq!(last.sender, HUMAN_SENDER);
        assert_eq!(last.text, "hello");
        assert_eq!(sink.inputs, vec!["hello"]);
        assert_eq!(
            sink.results,
            vec![Err(CommandError::UnknownCommand("hello".into()))]
        );
    }

    #[tokio::test]
    async fn test_submit_sends_chat_with_persona_and_tts() {
        let mut client = MockDialogueClient::new();
        client
            .expect_chat()
            .withf(|game_id, session_id, request| {
                game_id == "test-game"
                    && session_id == "session-1"
                    && request.sender_name == "Victor J. Johnson"
                    && request.sender_message == "move 3"
                    && request.game_state_info.as_deref() == Some("Victor is idle")
                    && request.tts.as_deref() == Some(TTS_LOCAL_CLIENT)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut fx = spawned(client, true).await;
        let mut sink = RecordingSink::default();

        let task = fx.session.submit("move 3", &mut sink).unwrap();
        task.await.unwrap();
        assert_eq!(fx.session.poll(), 1);
        assert_eq!(sink.inputs, vec!["move 3"]);
        assert_eq!(sink.results, vec![Ok(())]);
    }

    #[tokio::test]
    async fn test_chat_failure_is_absorbed() {
        let mut client = MockDialogueClient::new();
        client.expect_chat().times(1).returning(|_, _, request| {
            assert_eq!(request.tts, None);
            Err(TransportError::Status {
                status: 404,
                body: "no such npc".into(),
            })
        });
        let mut fx = spawned(client, false).await;
        let mut sink = RecordingSink::default();

        fx.session.submit("hi there", &mut sink).unwrap().await.unwrap();
        assert_eq!(fx.session.poll(), 1);
        assert_eq!(fx.session.session_id(), Some("session-1"));
        assert_eq!(fx.session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_chats_keep_human_order() {
        let mut client = MockDialogueClient::new();
        client.expect_chat().times(3).returning(|_, _, _| Ok(()));
        let mut fx = spawned(client, false).await;
        let mut sink = RecordingSink::default();

        let tasks: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .filter_map(|text| fx.session.submit(text, &mut sink))
            .collect();
        let texts: Vec<_> = fx
            .session
            .transcript()
            .entries()
            .map(|e| e.text.clone())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(fx.session.poll(), 3);
    }

    #[tokio::test]
    async fn test_replies_use_full_name_and_evict_oldest() {
        let mut fx = fixture(MockDialogueClient::new(), false, 2);
        let mut sink = RecordingSink::default();

        fx.session.submit("hello", &mut sink);
        fx.session.on_remote_reply("Gold!");
        fx.session.on_remote_reply("More gold!");

        let entries: Vec<_> = fx.session.transcript().entries().cloned().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sender, "Victor J. Johnson");
        assert_eq!(entries[0].text, "Gold!");
        assert_eq!(entries[1].text, "More gold!");
    }
}
