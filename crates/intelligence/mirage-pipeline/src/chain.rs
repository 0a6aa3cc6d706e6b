//! Three-stage prompt chain: index, then css, then js.
//!
//! Every stage repeats the system prompt and the user's context so the model
//! sees the whole page it is building. Later stages also see the output of
//! earlier ones.

use serde::Deserialize;

use crate::client::{ChatMessage, CompletionClient};
use crate::page::GeneratedPage;
use crate::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Index,
    Css,
    Js,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Index => "index",
            Goal::Css => "css",
            Goal::Js => "js",
        }
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the `index` goal must answer with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexContent {
    pub title: String,
    pub body: String,
    pub shortcode: String,
}

pub(crate) fn messages(
    system_prompt: &str,
    context: &str,
    goal: Goal,
    extra: &[String],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(extra.len() + 3);
    messages.push(ChatMessage::developer(system_prompt));
    messages.push(ChatMessage::developer(format!("context: {}", context)));
    messages.extend(extra.iter().cloned().map(ChatMessage::developer));
    messages.push(ChatMessage::developer(format!("goal: {}", goal)));
    messages
}

/// Parse the `index` answer, tolerating a surrounding markdown code fence.
pub fn parse_index(raw: &str) -> Result<IndexContent> {
    let index: IndexContent = serde_json::from_str(strip_fence(raw))
        .map_err(|e| PipelineError::Upstream(format!("index is not valid JSON: {}", e)))?;

    if index.body.trim().is_empty() {
        return Err(PipelineError::Upstream("index has an empty body".to_string()));
    }
    Ok(index)
}

fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

async fn ask(
    client: &dyn CompletionClient,
    system_prompt: &str,
    context: &str,
    goal: Goal,
    extra: &[String],
) -> Result<String> {
    tracing::debug!(goal = %goal, "Requesting completion");
    let content = client
        .complete(&messages(system_prompt, context, goal, extra))
        .await?;

    if content.trim().is_empty() {
        return Err(PipelineError::Upstream(format!("empty {} completion", goal)));
    }
    Ok(content)
}

/// Run the full chain. Stops at the first failing stage.
pub async fn generate(
    client: &dyn CompletionClient,
    system_prompt: &str,
    context: &str,
) -> Result<GeneratedPage> {
    let index = parse_index(&ask(client, system_prompt, context, Goal::Index, &[]).await?)?;

    let body_message = format!("body: {}", index.body);
    let css = ask(
        client,
        system_prompt,
        context,
        Goal::Css,
        std::slice::from_ref(&body_message),
    )
    .await?;

    let css_message = format!("css: {}", css);
    let script = ask(
        client,
        system_prompt,
        context,
        Goal::Js,
        &[body_message, css_message],
    )
    .await?;

    Ok(GeneratedPage {
        title: index.title,
        body: index.body,
        css,
        script,
        shortcode: index.shortcode,
    })
}
