pub mod notify;

pub use notify::{NoopNotifier, Notifier, WebhookNotifier};
