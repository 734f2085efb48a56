//! gRPC Driving Adapter
//!
//! Exposes the supervisor to a remote controller over a single duplex stream
//! of JSON-bodied envelopes.
//!
//! - `service`: accepts the stream and runs its receive loop
//! - `dispatcher` / `handlers`: route inbound commands to the supervisor
//! - `notifier`: pushes state snapshots back to the controller
//! - `transport`: TCP listener with health and reflection

pub mod control_channel;
pub mod dispatcher;
pub mod handlers;
pub mod mappers;
pub mod notifier;
pub mod service;
pub mod transport;

pub use control_channel::ControlChannel;
pub use dispatcher::{CommandDispatcher, CommandHandler};
pub use handlers::{LifecycleAction, LifecycleHandler, SubscriptionHandler};
pub use notifier::ChannelNotifier;
pub use service::ControlService;
pub use transport::{bind, serve_with_shutdown, TransportError};
