//! Ingestion of resource change events.
//!
//! Events reach [`EventConsumer::run`] through a channel. [`forward_lines`]
//! feeds that channel from newline-delimited JSON, such as a bus bridge piping
//! into stdin or a replay file.

mod translator;

pub use translator::{EventTranslator, SearchableResource, SearchableResourceInfo};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::config::EventsConfig;
use crate::observability;
use crate::{Error, Result};

const DEAD_LETTER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub key: String,
    pub payload: Value,
}

impl Event {
    pub fn new(
        topic: impl Into<String>,
        type_: impl Into<String>,
        key: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            type_: type_.into(),
            key: key.into(),
            payload,
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    /// The handler applied the change.
    Processed,
    /// The payload did not match the event schema. Never retried.
    Rejected,
    /// Not applicable here: unknown class, already deleted, or not subscribed.
    Skipped,
    /// The handler failed with a service error.
    Failed(Error),
}

impl EventOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EventOutcome::Processed => "processed",
            EventOutcome::Rejected => "rejected",
            EventOutcome::Skipped => "skipped",
            EventOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EventOutcome::Failed(_))
    }
}

/// Consumes events one at a time, retrying failed ones.
pub struct EventConsumer {
    translator: Arc<EventTranslator>,
    max_retries: u32,
    retry_backoff: Duration,
    dead_letter: Option<mpsc::Sender<Event>>,
}

impl EventConsumer {
    pub fn new(translator: Arc<EventTranslator>, max_retries: u32) -> Self {
        Self {
            translator,
            max_retries,
            retry_backoff: Duration::from_millis(200),
            dead_letter: None,
        }
    }

    /// Consumer with retries and dead-lettering as configured. Returns the
    /// receiving end of the dead letter channel when `dead_letter` is enabled.
    pub fn from_config(
        translator: Arc<EventTranslator>,
        config: &EventsConfig,
    ) -> (Self, Option<mpsc::Receiver<Event>>) {
        let consumer = Self::new(translator, config.max_retries);
        if !config.dead_letter {
            return (consumer, None);
        }
        let (sender, receiver) = mpsc::channel(DEAD_LETTER_CAPACITY);
        (consumer.with_dead_letter(sender), Some(receiver))
    }

    /// Forward events that still fail after all retries to `sender`.
    pub fn with_dead_letter(mut self, sender: mpsc::Sender<Event>) -> Self {
        self.dead_letter = Some(sender);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub async fn process(&self, event: Event) -> EventOutcome {
        if !self.translator.is_of_interest(&event) {
            tracing::debug!(topic = %event.topic, event_type = %event.type_, "Event not subscribed to");
            return EventOutcome::Skipped;
        }

        let mut attempt = 0;
        let outcome = loop {
            let outcome = self.translator.translate(&event).await;
            match outcome {
                EventOutcome::Failed(ref err) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        key = %event.key,
                        event_type = %event.type_,
                        attempt,
                        "Event processing failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                outcome => break outcome,
            }
        };

        if let EventOutcome::Failed(ref err) = outcome {
            tracing::error!(
                key = %event.key,
                event_type = %event.type_,
                "Event processing failed after {} retries: {}",
                self.max_retries,
                err
            );
            self.send_to_dead_letter(event.clone()).await;
        }

        observability::record_event_consumed(&event.type_, outcome.label());
        outcome
    }

    async fn send_to_dead_letter(&self, event: Event) {
        match &self.dead_letter {
            Some(sender) => {
                if sender.send(event).await.is_err() {
                    tracing::error!("Dead letter channel closed, dropping event");
                }
            }
            None => tracing::warn!(key = %event.key, "No dead letter channel, dropping event"),
        }
    }

    /// Drain `receiver` until every sender is dropped.
    pub async fn run(&self, mut receiver: mpsc::Receiver<Event>) {
        while let Some(event) = receiver.recv().await {
            self.process(event).await;
        }
        tracing::info!("Event channel closed, consumer stopping");
    }
}

/// Forward newline-delimited JSON events from `reader` into `sender` until end
/// of input or until the channel closes. Blank lines are ignored and lines that
/// do not parse as an event are logged and skipped.
///
/// Returns the number of events forwarded.
pub async fn forward_lines<R>(reader: R, sender: mpsc::Sender<Event>) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(line) {
            Ok(event) => {
                if sender.send(event).await.is_err() {
                    tracing::warn!("Event channel closed, stopping event source");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => tracing::error!("Skipping line that is not an event: {}", e),
        }
    }

    Ok(forwarded)
}
