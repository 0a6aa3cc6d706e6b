//! Mirage Generation Pipeline
//!
//! Turns a short context string into a complete HTML page by chaining three
//! chat completions (index, css, js), rendering the result, and storing it.
//!
//! ```text
//!   context ─► index {title, body, shortcode} ─► css ─► js
//!                                                       │
//!                      render ◄─────────────────────────┘
//!                        │
//!                        ▼
//!   make_identifier(shortcode) ─► ResultStore::create ─► Identifier
//! ```
//!
//! Nothing reaches the store unless every stage succeeded.

pub mod chain;
pub mod client;
pub mod page;

pub use chain::{generate, parse_index, Goal, IndexContent};
pub use client::{
    ChatMessage, ClientFactory, CompletionClient, OpenAiClient, OpenAiClientFactory,
    OpenAiSettings,
};
pub use page::GeneratedPage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mirage_core::{make_identifier, Identifier};
use mirage_store::{ResultStore, StoreError};
use thiserror::Error;

/// Prompt used when no override file is configured
pub const BUNDLED_SYSTEM_PROMPT: &str = include_str!("../prompts/system.txt");

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Upstream completion failed: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Render error: {0}")]
    Render(#[from] askama::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to read system prompt {}: {source}", path.display())]
    Prompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Read the system prompt from `path`, or fall back to the bundled one.
pub async fn load_system_prompt(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(BUNDLED_SYSTEM_PROMPT.to_string());
    };

    let prompt = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PipelineError::Prompt {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), "Loaded system prompt override");
    Ok(prompt)
}

/// Generation entry point shared by every request
#[derive(Clone)]
pub struct GenerationPipeline {
    store: ResultStore,
    clients: Arc<dyn ClientFactory>,
    system_prompt: Arc<str>,
}

impl GenerationPipeline {
    pub fn new(
        store: ResultStore,
        clients: Arc<dyn ClientFactory>,
        system_prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            clients,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Generate, render and persist one page for `context`.
    ///
    /// `api_key` is used for this call only.
    pub async fn run(&self, api_key: &str, context: &str) -> Result<Identifier> {
        let client = self.clients.client(api_key);
        let page = generate(client.as_ref(), &self.system_prompt, context).await?;
        let html = page.render()?;

        let identifier = make_identifier(&page.shortcode);
        self.store.create(&identifier, html).await?;

        tracing::info!(identifier = %identifier, "Page generated");
        Ok(identifier)
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::client::{ChatMessage, ClientFactory, CompletionClient};
    use crate::{PipelineError, Result};

    /// Replays canned answers in order and records every request.
    #[derive(Clone, Default)]
    pub struct ScriptedClient {
        answers: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
        calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
        keys: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedClient {
        pub fn new<'a>(
            answers: impl IntoIterator<Item = std::result::Result<&'a str, &'a str>>,
        ) -> Self {
            let answers = answers
                .into_iter()
                .map(|a| a.map(str::to_string).map_err(str::to_string))
                .collect();
            Self {
                answers: Arc::new(Mutex::new(answers)),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }

        pub fn keys(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            match self.answers.lock().unwrap().pop_front() {
                Some(Ok(answer)) => Ok(answer),
                Some(Err(e)) => Err(PipelineError::Upstream(e)),
                None => Err(PipelineError::Upstream("script exhausted".to_string())),
            }
        }
    }

    impl ClientFactory for ScriptedClient {
        fn client(&self, api_key: &str) -> Arc<dyn CompletionClient> {
            self.keys.lock().unwrap().push(api_key.to_string());
            Arc::new(self.clone())
        }
    }
}
