/// Settings loading: defaults, optional file, environment overrides.
pub mod config;
/// Error types of the binary-facing layers (settings, logging).
pub mod error;
/// Logging initialisation (filters, console and file sinks).
pub mod logging;
/// TCP line-protocol front end for the service.
pub mod network;
/// Pub/Sub: Bus, Subscription, Message.
pub mod pubsub;
/// Service adapter bridging client streams to bus subscriptions.
pub mod service;
/// Process termination signals.
pub mod signals;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::{BusSettings, ServerSettings, Settings};
/// Operation errors and result types.
pub use error::{LoggingError, SettingsError};
/// Logging entry point.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Network server.
pub use network::Server;
/// Pub/Sub API.
pub use pubsub::{Bus, BusStats, Message, Subscription};
/// Service layer.
pub use service::{Event, PubSubService, StreamGuard};
pub use subpub_error::{BusError, BusResult, ErrorExt, PushError, ServiceError, StatusCode};
