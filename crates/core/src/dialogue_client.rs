//! HTTP client for the remote dialogue service.

use crate::command::FunctionDefinition;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;

/// Body of the spawn request: the persona plus the command vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnRequest {
    pub short_name: String,
    pub name: String,
    pub character_description: String,
    pub system_prompt: String,
    pub voice_id: String,
    pub commands: Vec<FunctionDefinition>,
}

/// Body of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub sender_name: String,
    pub sender_message: String,
    pub game_state_info: Option<String>,
    pub tts: Option<String>,
}

/// The two remote operations a session needs.
///
/// Replies to chat messages do not come back on the HTTP response; they are
/// delivered separately through the function registry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DialogueClient: Send + Sync {
    /// Creates a remote conversational identity and returns its session id.
    async fn spawn(&self, game_id: &str, request: &SpawnRequest) -> Result<String, TransportError>;

    async fn chat(
        &self,
        game_id: &str,
        session_id: &str,
        request: &ChatRequest,
    ) -> Result<(), TransportError>;
}

/// A `DialogueClient` speaking JSON over HTTP.
pub struct HttpDialogueClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpDialogueClient {
    /// Creates a client for the service rooted at `base_url`
    /// (e.g. `http://127.0.0.1:4315/v1`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn spawn_url(&self, game_id: &str) -> String {
        format!("{}/npc/games/{}/npcs/spawn", self.base_url, game_id)
    }

    fn chat_url(&self, game_id: &str, session_id: &str) -> String {
        format!(
            "{}/npc/games/{}/npcs/{}/chat",
            self.base_url, game_id, session_id
        )
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<String, TransportError> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

/// Extracts the session id from a spawn response body (a quoted string).
pub fn parse_session_id(body: &str) -> Result<String, TransportError> {
    let id = body.trim().trim_matches('"').trim();
    if id.is_empty() {
        return Err(TransportError::Decode(
            "spawn response did not contain a session id".to_string(),
        ));
    }
    Ok(id.to_string())
}

#[async_trait]
impl DialogueClient for HttpDialogueClient {
    async fn spawn(&self, game_id: &str, request: &SpawnRequest) -> Result<String, TransportError> {
        let body = self.post(&self.spawn_url(game_id), request).await?;
        parse_session_id(&body)
    }

    async fn chat(
        &self,
        game_id: &str,
        session_id: &str,
        request: &ChatRequest,
    ) -> Result<(), TransportError> {
        self.post(&self.chat_url(game_id, session_id), request)
            .await
            .map(|_| ())
    }
}
