//! Handler failures and where they are reported.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

/// A handler invocation that did not complete normally.
///
/// Failures never reach the poll loop; they are handed to an [`ErrorSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerFailure {
    /// The handler returned an error.
    #[error("handler '{handler}' failed on update {update_id}: {message}")]
    Failed {
        update_id: i64,
        handler: String,
        message: String,
    },

    /// The handler panicked; the panic was caught at the task boundary.
    #[error("handler '{handler}' panicked on update {update_id}: {message}")]
    Panicked {
        update_id: i64,
        handler: String,
        message: String,
    },
}

impl HandlerFailure {
    pub fn update_id(&self) -> i64 {
        match self {
            Self::Failed { update_id, .. } | Self::Panicked { update_id, .. } => *update_id,
        }
    }

    pub fn handler(&self) -> &str {
        match self {
            Self::Failed { handler, .. } | Self::Panicked { handler, .. } => handler,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

/// Receives every [`HandlerFailure`]. Called from handler tasks, so it must be cheap.
pub type ErrorSink = Arc<dyn Fn(HandlerFailure) + Send + Sync>;

/// The default sink: logs each failure at `error` level.
pub fn log_failures() -> ErrorSink {
    Arc::new(|failure: HandlerFailure| {
        error!(
            update_id = failure.update_id(),
            handler = failure.handler(),
            panicked = failure.is_panic(),
            "{failure}"
        );
    })
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(payload.as_ref()), "kaboom");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn failure_display_names_handler_and_update() {
        let failure = HandlerFailure::Panicked {
            update_id: 101,
            handler: "echo".into(),
            message: "boom".into(),
        };
        assert_eq!(
            failure.to_string(),
            "handler 'echo' panicked on update 101: boom"
        );
        assert!(failure.is_panic());
        assert_eq!(failure.update_id(), 101);
    }
}
