use super::notifier::Notifier;
use crate::logic::types::Alert;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Emits alerts to the log and, when attached, to a notifier.
#[derive(Clone, Default)]
pub struct AlertSink {
    notifier: Option<Arc<dyn Notifier>>,
}

impl AlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier: Some(notifier) }
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    /// Logs `alert` and hands it to the notifier without waiting for delivery.
    ///
    /// The returned handle is only useful to callers that want to await delivery;
    /// dropping it leaves the task running.
    pub fn emit(&self, alert: &Alert) -> Option<JoinHandle<()>> {
        warn!(
            target: "reserve_watch::alert",
            block = alert.block,
            asset = %alert.asset,
            market = %alert.market_token,
            symbol = %alert.symbol,
            reasons = ?alert.reasons,
            "Risky reserve detected"
        );

        let notifier = Arc::clone(self.notifier.as_ref()?);
        let identifier = format!("{}@{}", alert.symbol, alert.block);
        let message = alert.message();
        Some(tokio::spawn(async move {
            if let Err(e) = notifier.notify(&identifier, &message).await {
                error!(identifier = %identifier, "Failed to deliver alert notification: {}", e);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, identifier: &str, message: &str) -> eyre::Result<()> {
            self.sent.lock().unwrap().push((identifier.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _identifier: &str, _message: &str) -> eyre::Result<()> {
            Err(eyre::eyre!("channel closed"))
        }
    }

    fn alert() -> Alert {
        Alert {
            block: 120,
            asset: Address::new([0x11; 20]),
            market_token: Address::new([0x22; 20]),
            symbol: "aX".to_string(),
            reasons: vec!["totalSupply 0.500000 aX < 1000000".to_string()],
        }
    }

    #[tokio::test]
    async fn test_emit_without_notifier() {
        let sink = AlertSink::new();
        assert!(!sink.has_notifier());
        assert!(sink.emit(&alert()).is_none());
    }

    #[tokio::test]
    async fn test_emit_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = AlertSink::with_notifier(notifier.clone());

        sink.emit(&alert()).unwrap().await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "aX@120");
        assert!(sent[0].1.contains("totalSupply 0.500000 aX < 1000000"));
    }

    #[tokio::test]
    async fn test_notifier_failure_is_contained() {
        let sink = AlertSink::with_notifier(Arc::new(FailingNotifier));
        let handle = sink.emit(&alert()).unwrap();
        assert!(handle.await.is_ok());
    }
}
