//! The ad client: queue, circuit breaker and ad cache behind a single-flight
//! submission guard.
//!
//! The client is meant to be driven from one task. Methods take `&self` so the
//! caller can keep enqueuing while a batch is awaiting the network, and no
//! interior borrow is held across an await point.

use std::cell::{Cell, RefCell};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::ad::{format_context, AdCache, RecommendedAd};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{ClientConfig, ResolvedConfig};
use crate::error::{ClientError, Result};
use crate::message::{ChatMessage, Role, SessionInfo};
use crate::queue::MessageQueue;
use crate::submitter::{BatchOutcome, BatchSubmitter};
use crate::transport::{request_headers, HttpTransport, Transport};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    Idle,
    Processing,
}

/// Why a message was queued without starting a batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueReason {
    /// Only user messages trigger submission.
    AssistantMessage,
    /// The circuit breaker is open.
    CircuitOpen,
    /// Another batch is in flight.
    Busy,
    /// Nothing was queued.
    Empty,
}

/// What happened to a submitted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Queued(QueueReason),
    Submitted(BatchOutcome),
}

/// Point-in-time view of a client, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub state: ClientState,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub error_count: u32,
    pub circuit_open: bool,
    pub healthy: bool,
    pub has_ad: bool,
}

/// Resets the state to Idle however the submission ends, including when the
/// submitting future is dropped mid-flight.
struct ProcessingGuard<'a> {
    state: &'a Cell<ClientState>,
}

impl<'a> ProcessingGuard<'a> {
    fn enter(state: &'a Cell<ClientState>) -> Self {
        state.set(ClientState::Processing);
        Self { state }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.state.set(ClientState::Idle);
    }
}

pub struct AdClient {
    config: ResolvedConfig,
    transport: Box<dyn Transport>,
    submitter: BatchSubmitter,
    state: Cell<ClientState>,
    queue: RefCell<MessageQueue>,
    breaker: RefCell<CircuitBreaker>,
    ads: RefCell<AdCache>,
}

impl AdClient {
    /// Build a client that talks HTTP through `reqwest`.
    ///
    /// Fails with [`ClientError::MissingApiKey`] when neither the config nor
    /// the environment provides a key.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new())
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Result<Self> {
        let config = config.resolve()?;
        let headers = request_headers(&config.api_key)
            .map_err(|_| ClientError::InvalidConfig("API key is not a valid header value".to_string()))?;
        let submitter = BatchSubmitter::new(config.api_url.as_str(), headers, config.timeout);

        if config.logging {
            info!(
                session_id = %config.session.session_id,
                "Ad client ready (endpoint {}, queue size {})",
                config.api_url,
                config.max_queue_size
            );
        }

        Ok(Self {
            queue: RefCell::new(MessageQueue::new(config.max_queue_size)),
            breaker: RefCell::new(CircuitBreaker::new(config.error_threshold, config.cooldown)),
            ads: RefCell::new(AdCache::new()),
            state: Cell::new(ClientState::Idle),
            transport: Box::new(transport),
            submitter,
            config,
        })
    }

    /// Queue a message and, when it is a user message and the client is free,
    /// submit everything queued so far.
    ///
    /// Transport failures are returned after being recorded against the
    /// circuit breaker; the queued messages stay for the next attempt.
    pub async fn submit_message(&self, role: Role, content: impl Into<String>) -> Result<Dispatch> {
        self.enqueue(ChatMessage::new(role, content));
        if role != Role::User {
            return Ok(Dispatch::Queued(QueueReason::AssistantMessage));
        }
        self.process_queue().await
    }

    /// Submit whatever is queued regardless of who spoke last.
    pub async fn flush(&self) -> Result<Dispatch> {
        self.process_queue().await
    }

    fn enqueue(&self, message: ChatMessage) {
        let evicted = self.queue.borrow_mut().enqueue(message);
        if evicted.is_some() && self.config.logging {
            warn!(
                "Message queue full ({}), dropped the oldest message",
                self.queue.borrow().capacity()
            );
        }
    }

    async fn process_queue(&self) -> Result<Dispatch> {
        if self.state.get() == ClientState::Processing {
            return Ok(Dispatch::Queued(QueueReason::Busy));
        }
        if self.breaker.borrow_mut().is_open() {
            if self.config.logging {
                debug!("Circuit breaker open, holding messages");
            }
            return Ok(Dispatch::Queued(QueueReason::CircuitOpen));
        }

        let (snapshot, end) = {
            let queue = self.queue.borrow();
            (queue.snapshot(), queue.tail_position())
        };
        if snapshot.is_empty() {
            return Ok(Dispatch::Queued(QueueReason::Empty));
        }

        let _guard = ProcessingGuard::enter(&self.state);
        let result = self
            .submitter
            .submit(self.transport.as_ref(), &self.config.session, &snapshot)
            .await;

        match result {
            Ok(outcome) => {
                self.queue.borrow_mut().commit_through(end);
                self.apply_outcome(&outcome);
                Ok(Dispatch::Submitted(outcome))
            }
            Err(err) => {
                if matches!(err, ClientError::Transport(_)) {
                    self.breaker.borrow_mut().record_error();
                }
                if self.config.logging {
                    error!(
                        "Batch of {} message(s) failed: {} ({} error(s) recorded)",
                        snapshot.len(),
                        err,
                        self.breaker.borrow().error_count()
                    );
                }
                Err(err)
            }
        }
    }

    fn apply_outcome(&self, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Matched(ad) => {
                if self.config.logging {
                    info!("Received ad recommendation: {}", ad.title);
                }
                self.ads.borrow_mut().store(ad.clone());
            }
            BatchOutcome::NoMatch => {
                if self.config.logging {
                    info!("No matching ad for this batch");
                }
            }
            BatchOutcome::Malformed(reason) => {
                self.ads.borrow_mut().clear();
                self.breaker.borrow_mut().record_error();
                if self.config.logging {
                    warn!("Discarding malformed ad response: {}", reason);
                }
            }
        }
    }

    /// Hand out the latest ad once; later calls return `None` until a new
    /// one arrives.
    pub fn take_latest_ad(&self) -> Option<RecommendedAd> {
        self.ads.borrow_mut().take()
    }

    /// Render `ad` with the configured context template.
    pub fn format_context(&self, ad: &RecommendedAd) -> String {
        format_context(ad, &self.config.context_template)
    }

    /// Take the latest ad and render it with the configured context template.
    pub fn take_formatted_context(&self) -> Option<String> {
        self.take_latest_ad().map(|ad| self.format_context(&ad))
    }

    pub fn state(&self) -> ClientState {
        self.state.get()
    }

    /// Closed breaker and room in the queue. Callers should back off while
    /// this is false.
    pub fn is_healthy(&self) -> bool {
        !self.breaker.borrow_mut().is_open() && !self.queue.borrow().is_full()
    }

    pub fn reset_circuit_breaker(&self) {
        self.breaker.borrow_mut().reset();
        if self.config.logging {
            info!("Circuit breaker reset");
        }
    }

    pub fn queued_messages(&self) -> Vec<ChatMessage> {
        self.queue.borrow().snapshot()
    }

    pub fn session(&self) -> &SessionInfo {
        &self.config.session
    }

    pub fn status(&self) -> ClientStatus {
        let circuit_open = self.breaker.borrow_mut().is_open();
        let queue = self.queue.borrow();
        ClientStatus {
            state: self.state.get(),
            queue_len: queue.len(),
            queue_capacity: queue.capacity(),
            error_count: self.breaker.borrow().error_count(),
            circuit_open,
            healthy: !circuit_open && !queue.is_full(),
            has_ad: !self.ads.borrow().is_empty(),
        }
    }
}
