//! The fusion server and its control surface.
//!
//! - [`TsdfServer`]: owns the map and runs the per-message pipeline
//! - [`MapPublisher`]: where outputs go ([`NullPublisher`], [`LogPublisher`])
//! - [`ServerCommand`]: clear, mesh, save, load and publish requests
//! - [`run_event_loop`]: drives a server from a crossbeam channel with timers

mod commands;
mod event_loop;
mod publisher;
#[allow(clippy::module_inception)]
mod server;

pub use commands::{CommandResult, ServerCommand, ServerError};
pub use event_loop::{LoopStats, ServerEvent, handle_event, run_event_loop, send_command};
pub use publisher::{LogPublisher, MapPublisher, NullPublisher};
pub use server::TsdfServer;
