//! External integrations

pub mod notifier;

pub use notifier::Notifier;
