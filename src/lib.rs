//! Client for a contextual ad-matching service.
//!
//! Chat messages are queued in a bounded buffer and sent in batches whenever
//! the user speaks. The service may answer with a product recommendation,
//! which is held until the application takes it and splices it into the
//! conversation. A circuit breaker stops outbound calls after repeated
//! failures and lets them through again after a cooldown.
//!
//! ```no_run
//! use admatch_client::{AdClient, ClientConfig, Role, SessionInfo};
//!
//! # async fn run() -> admatch_client::Result<()> {
//! let session = SessionInfo::new("session-42", "user-7", "web");
//! let client = AdClient::new(ClientConfig::new(session).api_key("secret"))?;
//!
//! client.submit_message(Role::User, "Any tips for a light travel laptop?").await?;
//! if let Some(context) = client.take_formatted_context() {
//!     println!("{}", context);
//! }
//! # Ok(())
//! # }
//! ```

pub mod ad;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod submitter;
pub mod transport;

pub use ad::{format_context, AdCache, RecommendedAd};
pub use circuit_breaker::CircuitBreaker;
pub use client::{AdClient, ClientState, ClientStatus, Dispatch, QueueReason};
pub use config::ClientConfig;
pub use error::{ClientError, Result, TransportError};
pub use message::{ChatMessage, Role, SessionInfo};
pub use queue::MessageQueue;
pub use submitter::BatchOutcome;
pub use transport::{HttpTransport, Transport, TransportRequest};
