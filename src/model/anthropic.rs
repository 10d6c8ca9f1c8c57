use super::{ContentPart, EventStream, ModelClient, ModelRequest, StreamEvent};
use crate::{
    config::{Config, API_KEY_ENV},
    error::{Error, Result},
};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{debug, trace};

const API_VERSION: &str = "2023-06-01";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client can't be built.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        // Streams can run for minutes; only the connect phase is bounded.
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Option::<Duration>::None)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Creates a client from configuration, resolving the API key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is available.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| Error::config(format!("{API_KEY_ENV} is not set")))?;

        Self::new(&config.api_base_url, api_key)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| Error::config("API key contains invalid header characters"))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        Ok(headers)
    }
}

impl ModelClient for AnthropicClient {
    fn stream(&self, request: &ModelRequest) -> Result<EventStream> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesBody::from(request);

        debug!(
            "POST {} (model {}, max_tokens {}, thinking {})",
            url, request.model, request.max_tokens, request.thinking_tokens
        );

        let response = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            return Err(Error::api(Some(status.as_u16()), message));
        }

        Ok(Box::new(SseEvents::new(BufReader::new(response))))
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a [ContentPart],
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

impl<'a> From<&'a ModelRequest> for MessagesBody<'a> {
    fn from(request: &'a ModelRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: [UserMessage {
                role: "user",
                content: &request.content,
            }],
            stream: true,
            thinking: (request.thinking_tokens > 0).then_some(ThinkingConfig {
                kind: "enabled",
                budget_tokens: request.thinking_tokens,
            }),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    ContentBlockStart,
    ContentBlockDelta { delta: WireDelta },
    ContentBlockStop,
    MessageStop,
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    ThinkingDelta { thinking: String },
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

enum Step {
    Emit(Result<StreamEvent>),
    Skip,
    Finish,
}

/// Server-sent events from a response body, mapped to [`StreamEvent`]s.
///
/// Ends after `message_stop`. End of input before that is an error.
pub(crate) struct SseEvents<R> {
    reader: R,
    line: String,
    done: bool,
}

impl<R: BufRead> SseEvents<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            done: false,
        }
    }

    fn fail(&mut self, error: Error) -> Option<Result<StreamEvent>> {
        self.done = true;
        Some(Err(error))
    }

    fn dispatch(data: &str) -> Step {
        trace!("SSE data: {}", data);

        let event = match serde_json::from_str::<WireEvent>(data) {
            Ok(event) => event,
            Err(e) => return Step::Emit(Err(Error::stream(format!("malformed event: {e}")))),
        };

        match event {
            WireEvent::ContentBlockStart => Step::Emit(Ok(StreamEvent::BlockStart)),
            WireEvent::ContentBlockDelta { delta } => match delta {
                WireDelta::ThinkingDelta { thinking } => {
                    Step::Emit(Ok(StreamEvent::Thinking(thinking)))
                }
                WireDelta::TextDelta { text } => Step::Emit(Ok(StreamEvent::Text(text))),
                WireDelta::Other => Step::Skip,
            },
            WireEvent::ContentBlockStop => Step::Emit(Ok(StreamEvent::BlockStop)),
            WireEvent::MessageStop => Step::Finish,
            WireEvent::Error { error } => Step::Emit(Err(Error::stream(error.message))),
            WireEvent::Other => Step::Skip,
        }
    }
}

impl<R: BufRead> Iterator for SseEvents<R> {
    type Item = Result<StreamEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut data = String::new();

        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) if data.is_empty() => {
                    return self.fail(Error::stream("connection closed before message_stop"));
                }
                Ok(0) => {}
                Ok(_) => {
                    let line = self.line.trim_end_matches(['\r', '\n']);
                    if let Some(payload) = line.strip_prefix("data:") {
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(payload.strip_prefix(' ').unwrap_or(payload));
                        continue;
                    }
                    if !line.is_empty() || data.is_empty() {
                        continue;
                    }
                }
                Err(e) => return self.fail(Error::stream(e.to_string())),
            }

            match Self::dispatch(&data) {
                Step::Emit(Ok(event)) => return Some(Ok(event)),
                Step::Emit(Err(e)) => return self.fail(e),
                Step::Skip => data.clear(),
                Step::Finish => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
