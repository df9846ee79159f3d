//! Per-handler fault isolation shared by both dispatch tables.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::ports::HandlerError;

/// Which dispatch table a failure came from, for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Caps,
    Packet,
}

impl Channel {
    fn as_str(&self) -> &'static str {
        match self {
            Channel::Caps => "caps",
            Channel::Packet => "packet",
        }
    }
}

/// Runs one handler, logging and swallowing its error or panic.
///
/// Returns true if the handler completed successfully.
pub(crate) fn invoke_isolated<F>(channel: Channel, key: &str, handler_name: &str, call: F) -> bool
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(
                channel = channel.as_str(),
                key = key,
                handler = handler_name,
                error = %e,
                "Handler failed"
            );
            false
        }
        Err(panic) => {
            tracing::error!(
                channel = channel.as_str(),
                key = key,
                handler = handler_name,
                panic = %panic_message(panic.as_ref()),
                "Handler panicked"
            );
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_reported() {
        assert!(invoke_isolated(Channel::Caps, "Key", "ok", || Ok(())));
    }

    #[test]
    fn error_is_swallowed() {
        assert!(!invoke_isolated(Channel::Packet, "Key", "failing", || {
            Err(HandlerError::new("boom"))
        }));
    }

    #[test]
    fn panic_is_swallowed() {
        assert!(!invoke_isolated(Channel::Caps, "Key", "panicking", || {
            panic!("handler exploded")
        }));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
