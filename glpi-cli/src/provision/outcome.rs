//! Failure reasons and per-category statuses
//!
//! Reasons render as short human-readable strings suitable for a status
//! cell, never stack traces; a specific reason is always preferred over a
//! generic one.

use std::fmt;

/// Status cells accommodate a short message, not a dump.
pub const REASON_MAX_LEN: usize = 50;

/// Marker written to a status cell on success.
pub const SUCCESS_MARKER: &str = "OK";

/// Why a provisioning step failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorReason {
    /// Full name empty or unsplittable
    NameInvalid,
    /// Mandatory email absent
    EmailMissing,
    /// Email present but no `@` after marker stripping
    EmailMalformed,
    /// The server claimed a duplicate but no fallback search found it
    DuplicateNotFound,
    /// Row carried data but no level-A entity name
    EntityMissing,
    /// The entity hierarchy could not be resolved at all
    HierarchyFailed,
    /// Creation rejected with a non-duplicate HTTP failure
    CreateFailed { status: u16 },
    /// Creation succeeded but no id could be extracted or located
    CreatedWithoutId,
    /// The resolver exhausted every strategy for a dependency
    Unresolved { resource: &'static str, value: String },
    /// Anything unexpected, truncated for the cell
    Unexpected(String),
}

impl ErrorReason {
    pub fn unexpected(message: impl fmt::Display) -> Self {
        Self::Unexpected(truncate_reason(&message.to_string()))
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameInvalid => write!(f, "name invalid"),
            Self::EmailMissing => write!(f, "email missing"),
            Self::EmailMalformed => write!(f, "email malformed"),
            Self::DuplicateNotFound => write!(f, "duplicate not found"),
            Self::EntityMissing => write!(f, "entity A missing"),
            Self::HierarchyFailed => write!(f, "entity hierarchy unresolved"),
            Self::CreateFailed { status } => write!(f, "create failed (HTTP {status})"),
            Self::CreatedWithoutId => write!(f, "created but no id returned"),
            Self::Unresolved { resource, value } => {
                write!(f, "{resource} '{value}' unresolved")
            }
            Self::Unexpected(message) => f.write_str(message),
        }
    }
}

/// Outcome of one row category (user / line / mobile / notebook).
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// Nothing to do for this category on this row
    Skipped,
    Ok,
    Failed(ErrorReason),
}

impl StepStatus {
    /// Text written back to the status cell.
    pub fn cell_text(&self) -> String {
        match self {
            Self::Skipped => String::new(),
            Self::Ok => SUCCESS_MARKER.to_string(),
            Self::Failed(reason) => truncate_reason(&reason.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Clip a message to cell size, on a character boundary.
pub fn truncate_reason(message: &str) -> String {
    if message.chars().count() <= REASON_MAX_LEN {
        message.to_string()
    } else {
        let clipped: String = message.chars().take(REASON_MAX_LEN - 3).collect();
        format!("{clipped}...")
    }
}
