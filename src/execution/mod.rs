/// Execution Layer
///
/// Delivers what the logic layer decides: alerts are logged and optionally
/// forwarded to an external notifier.
pub mod alert_sink;
pub mod notifier;

pub use alert_sink::AlertSink;
pub use notifier::{DiscordNotifier, NoopNotifier, Notifier};
