//! Single-threaded event loop around a [`TsdfServer`].
//!
//! Inputs arrive on one crossbeam channel and are handled strictly in
//! order, interleaved with the mesh and map timers:
//!
//! ```text
//!  producers ──► Sender<ServerEvent> ──┐
//!  mesh timer (update_mesh_every_n_sec) ├─► select! ─► TsdfServer
//!  map timer (publish_map_every_n_sec) ─┘
//! ```
//!
//! The loop ends on [`ServerEvent::Shutdown`] or once every sender is gone.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, never, select, tick};

use crate::core::{Timestamp, Transform};
use crate::ingest::{PointcloudMessage, TransformBuffer};
use crate::io::{LayerMessage, RecordedEvent};

use super::commands::{CommandResult, ServerCommand, ServerError};
use super::publisher::MapPublisher;
use super::server::TsdfServer;

/// Everything the loop reacts to.
#[derive(Debug)]
pub enum ServerEvent {
    /// Main point cloud stream
    Pointcloud(PointcloudMessage),
    /// Freespace point cloud stream
    FreespacePointcloud(PointcloudMessage),
    /// Pose of `frame_id` in the world frame
    Pose {
        /// Sensor frame
        frame_id: String,
        /// Pose stamp
        timestamp: Timestamp,
        /// `T_G_C`
        pose: Transform,
    },
    /// Map from another node
    RemoteLayer(LayerMessage),
    /// Control request with its reply channel
    Command {
        /// What to do
        command: ServerCommand,
        /// Receives the outcome
        reply: Sender<CommandResult>,
    },
    /// Stop the loop
    Shutdown,
}

impl From<RecordedEvent> for ServerEvent {
    fn from(event: RecordedEvent) -> Self {
        match event {
            RecordedEvent::Pointcloud(msg) => ServerEvent::Pointcloud(msg),
            RecordedEvent::FreespacePointcloud(msg) => ServerEvent::FreespacePointcloud(msg),
            RecordedEvent::Pose {
                frame_id,
                timestamp,
                pose,
            } => ServerEvent::Pose {
                frame_id,
                timestamp,
                pose,
            },
        }
    }
}

/// Counters reported when the loop exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Events handled
    pub events: u64,
    /// Mesh timer firings
    pub mesh_updates: u64,
    /// Map timer firings
    pub map_publishes: u64,
}

fn timer(period_secs: f64) -> Receiver<std::time::Instant> {
    if period_secs > 0.0 {
        tick(Duration::from_secs_f64(period_secs))
    } else {
        never()
    }
}

/// Apply one event. Returns `false` when the loop should stop.
pub fn handle_event<P: MapPublisher>(server: &mut TsdfServer<TransformBuffer, P>, event: ServerEvent) -> bool {
    match event {
        ServerEvent::Pointcloud(msg) => server.insert_pointcloud(msg),
        ServerEvent::FreespacePointcloud(msg) => server.insert_freespace_pointcloud(msg),
        ServerEvent::Pose {
            frame_id,
            timestamp,
            pose,
        } => server.resolver_mut().insert(&frame_id, timestamp, pose),
        ServerEvent::RemoteLayer(message) => {
            server.handle_remote_layer(message);
        }
        ServerEvent::Command { command, reply } => {
            let result = server.handle_command(command);
            if let Err(e) = &result {
                log::warn!("Command failed: {}", e);
            }
            // The requester may have given up waiting.
            let _ = reply.send(result);
        }
        ServerEvent::Shutdown => return false,
    }
    true
}

/// Run until shutdown or until every sender is dropped.
pub fn run_event_loop<P: MapPublisher>(
    server: &mut TsdfServer<TransformBuffer, P>,
    events: &Receiver<ServerEvent>,
) -> LoopStats {
    let mesh_timer = timer(server.settings().update_mesh_every_n_sec);
    let map_timer = timer(server.settings().publish_map_every_n_sec);
    let mut stats = LoopStats::default();

    log::info!("TSDF server event loop started");
    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else {
                    log::info!("All event senders closed");
                    break;
                };
                stats.events += 1;
                if !handle_event(server, event) {
                    log::info!("Shutdown requested");
                    break;
                }
            }
            recv(mesh_timer) -> _ => {
                server.update_mesh();
                stats.mesh_updates += 1;
            }
            recv(map_timer) -> _ => {
                server.publish_map(false);
                stats.map_publishes += 1;
            }
        }
    }
    log::info!(
        "TSDF server event loop stopped after {} events ({} mesh updates, {} map publishes)",
        stats.events,
        stats.mesh_updates,
        stats.map_publishes
    );
    stats
}

/// Send a command and wait for its outcome.
pub fn send_command(sender: &Sender<ServerEvent>, command: ServerCommand, timeout: Duration) -> CommandResult {
    let (reply, response) = bounded(1);
    sender
        .send(ServerEvent::Command { command, reply })
        .map_err(|_| ServerError::Disconnected)?;
    response.recv_timeout(timeout).map_err(|e| {
        if e.is_timeout() {
            ServerError::Timeout
        } else {
            ServerError::Disconnected
        }
    })?
}
