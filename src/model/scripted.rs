use super::{EventStream, ModelClient, ModelRequest, StreamEvent};
use crate::error::Result;
use std::sync::{Mutex, PoisonError};

/// A client that replays a fixed event script for every request.
///
/// Requests are recorded so callers can inspect what would have been sent.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    events: Vec<Result<StreamEvent>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedClient {
    /// Creates a client that replays `events`.
    #[must_use]
    pub fn new(events: Vec<Result<StreamEvent>>) -> Self {
        Self {
            events,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a client whose answer is `text`, delivered line by line in a
    /// single text block.
    #[must_use]
    pub fn with_text(text: &str) -> Self {
        let mut events = vec![Ok(StreamEvent::BlockStart)];
        events.extend(
            text.split_inclusive('\n')
                .map(|fragment| Ok(StreamEvent::Text(fragment.to_string()))),
        );
        events.push(Ok(StreamEvent::BlockStop));
        Self::new(events)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ModelClient for ScriptedClient {
    fn stream(&self, request: &ModelRequest) -> Result<EventStream> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        Ok(Box::new(self.events.clone().into_iter()))
    }
}
