//! Routes inbound envelopes to the handlers registered for their type

use super::mappers::payload_type;
use crate::proto::Payload;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handles one inbound envelope type
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Envelope type this handler answers to
    fn declared_type(&self) -> &str;

    /// Failures are reported by the handler itself, never propagated
    async fn handle(&self, payload: &Payload);
}

#[derive(Default)]
pub struct CommandDispatcher {
    handlers: HashMap<String, Vec<Arc<dyn CommandHandler>>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        self.handlers
            .entry(handler.declared_type().to_string())
            .or_default()
            .push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Invoke every handler matching the envelope type, in registration order.
    /// Returns the number of handlers invoked.
    pub async fn dispatch(&self, payload: &Payload) -> usize {
        let kind = payload_type(payload);
        let Some(handlers) = self.handlers.get(kind) else {
            warn!(envelope_type = %kind, "No handler for envelope type, dropping");
            return 0;
        };
        for handler in handlers {
            debug!(envelope_type = %kind, "Dispatching envelope");
            handler.handle(payload).await;
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Metadata;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        kind: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler for Counting {
        fn declared_type(&self) -> &str {
            self.kind
        }

        async fn handle(&self, _payload: &Payload) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(kind: &'static str) -> Arc<Counting> {
        Arc::new(Counting {
            kind,
            calls: AtomicUsize::new(0),
        })
    }

    fn payload(kind: &str) -> Payload {
        Payload {
            metadata: Some(Metadata {
                r#type: kind.to_string(),
                ..Default::default()
            }),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_dispatch_to_all_matching() {
        let first = counting("startProgram");
        let second = counting("startProgram");
        let other = counting("stopProgram");

        let dispatcher = CommandDispatcher::new()
            .with_handler(first.clone())
            .with_handler(second.clone())
            .with_handler(other.clone());

        assert_eq!(dispatcher.dispatch(&payload("startProgram")).await, 2);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_is_dropped() {
        let handler = counting("startProgram");
        let dispatcher = CommandDispatcher::new().with_handler(handler.clone());

        assert_eq!(dispatcher.dispatch(&payload("launchRocket")).await, 0);
        assert_eq!(dispatcher.dispatch(&Payload::default()).await, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
