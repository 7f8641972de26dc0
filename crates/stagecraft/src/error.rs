//! # Runtime Errors
//!
//! Two error types cover the whole runtime. [`ActorError`] surfaces to callers
//! of the stage API (construction failures, illegal access, bad input).
//! [`FailureReason`] is the supervision channel: the outcome every actor
//! invocation answers, intercepted by the life cycle and forwarded to the
//! target's supervisor instead of unwinding across task boundaries.

/// Errors surfaced to callers of the stage API.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("invalid address format: {0:?}")]
    InvalidAddressFormat(String),
    #[error("actor construction failed: {0}")]
    ConstructionFailed(FailureReason),
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("stage already terminated")]
    StageTerminated,
    #[error("no mailbox provider registered under {0:?}")]
    UnknownMailboxProvider(String),
}

/// The reason an actor invocation failed.
///
/// Invocation outcomes are explicit values, never panics; the dispatcher's
/// drain step matches on them and routes failures into the supervision
/// protocol.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FailureReason {
    message: String,
}

impl FailureReason {
    pub fn because(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[doc(hidden)]
    pub fn protocol_mismatch(representation: &str) -> Self {
        Self::because(format!(
            "invocation {representation} does not match the target actor type"
        ))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for FailureReason {
    fn from(message: String) -> Self {
        Self::because(message)
    }
}

impl From<&str> for FailureReason {
    fn from(message: &str) -> Self {
        Self::because(message)
    }
}
