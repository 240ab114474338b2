use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(calendar_notifier::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar_notifier::config))]
    Config(String),

    #[error("Calendar store connection error: {0}")]
    #[diagnostic(code(calendar_notifier::connection))]
    Connection(String),

    #[error("Calendar store error: {0}")]
    #[diagnostic(code(calendar_notifier::store))]
    Store(String),

    #[error("Calendar parse error: {0}")]
    #[diagnostic(code(calendar_notifier::parse))]
    Parse(String),

    #[error("Scheduler error: {0}")]
    #[diagnostic(code(calendar_notifier::scheduler))]
    Scheduler(String),

    #[error("Notification error: {0}")]
    #[diagnostic(code(calendar_notifier::notification))]
    Notification(String),

    #[error(transparent)]
    #[diagnostic(code(calendar_notifier::io))]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar_notifier::other))]
    Other(String),
}

/// Type alias for Result with our Error type
pub type BotResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create connection errors
pub fn connection_error(message: &str) -> Error {
    Error::Connection(message.to_string())
}

/// Helper to create listing/read errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}

/// Helper to create calendar parse errors
pub fn parse_error(message: &str) -> Error {
    Error::Parse(message.to_string())
}

/// Helper to create scheduler errors
pub fn scheduler_error(message: &str) -> Error {
    Error::Scheduler(message.to_string())
}

/// Helper to create notification errors
pub fn notification_error(message: &str) -> Error {
    Error::Notification(message.to_string())
}
