//! GLPI REST API boundary
//!
//! Everything that knows the wire contract lives here: session lifecycle,
//! the HTTP client and its transport seam, the indexed-criteria search
//! convention with defensive response normalization, and the retry policy.
//! The provisioning layer above only ever sees typed results
//! ([`SearchReply`], [`CreateOutcome`]) and never raw response shapes.

pub mod auth;
pub mod client;
pub mod models;
pub mod resilience;
pub mod search;

pub use client::{ApiRequest, ApiResponse, GlpiClient, Method, Transport};
pub use models::{CreateOutcome, Credentials, ResourceType, SessionToken};
pub use resilience::RetryPolicy;
pub use search::{Criterion, SearchReply};
