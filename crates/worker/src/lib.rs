//! Worker assembly: configuration and the bus subscribers the binary wires
//! up (event logging and the audit-trail archiver).

pub mod config;
pub mod subscribers;

pub use config::Config;
pub use subscribers::{EventArchiver, LoggingSubscriber};
