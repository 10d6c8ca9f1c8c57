//! The model transform: a request goes in, a stream of typed fragments comes out.

mod anthropic;
mod scripted;

pub use anthropic::AnthropicClient;
pub use scripted::ScriptedClient;

use crate::{attachment::Attachment, config::Config, error::Result};
use serde::Serialize;

/// One part of the user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text {
        /// The text
        text: String,
    },

    /// An image
    Image(Attachment),
}

impl ContentPart {
    /// Creates a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A single-turn request to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Model identifier
    pub model: String,

    /// System prompt
    pub system: String,

    /// User message parts; attachments first, text last
    pub content: Vec<ContentPart>,

    /// Response token limit
    pub max_tokens: u32,

    /// Extended thinking budget, 0 to disable
    pub thinking_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl ModelRequest {
    /// Builds a request from the configured limits.
    #[must_use]
    pub fn new(
        config: &Config,
        system: impl Into<String>,
        message: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        let mut content: Vec<ContentPart> =
            attachments.into_iter().map(ContentPart::Image).collect();
        content.push(ContentPart::text(message));

        Self {
            model: config.model.clone(),
            system: system.into(),
            content,
            max_tokens: config.max_tokens,
            thinking_tokens: config.thinking_tokens,
            temperature: config.temperature,
        }
    }
}

/// A fragment of the streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A content block began
    BlockStart,

    /// Reasoning text, never part of the answer
    Thinking(String),

    /// Answer text
    Text(String),

    /// A content block ended
    BlockStop,
}

/// Response fragments in arrival order.
pub type EventStream = Box<dyn Iterator<Item = Result<StreamEvent>>>;

/// Anything that can turn a request into a fragment stream.
pub trait ModelClient {
    /// Sends the request and returns the response stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected before streaming starts.
    fn stream(&self, request: &ModelRequest) -> Result<EventStream>;
}

/// Concatenates the answer text of a stream.
///
/// Every event is passed to `observer` as it arrives. Only [`StreamEvent::Text`]
/// fragments are collected. A stream error is returned as is and the text
/// received so far is dropped.
///
/// # Errors
///
/// Returns the first error yielded by the stream.
pub fn collect_text<F>(stream: EventStream, mut observer: F) -> Result<String>
where
    F: FnMut(&StreamEvent),
{
    let mut text = String::new();

    for event in stream {
        let event = event?;
        observer(&event);

        if let StreamEvent::Text(fragment) = &event {
            text.push_str(fragment);
        }
    }

    Ok(text)
}
