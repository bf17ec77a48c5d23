//! vastu-tsdf - replay a recording through the TSDF server.
//!
//! # Usage
//!
//! ```bash
//! # Fuse a recording with the default config
//! cargo run --release -- --recording drive.vrec
//!
//! # Custom config, save the final map and export the mesh
//! cargo run --release -- --config configs/tsdf.toml --recording drive.vrec \
//!     --save-map out/map.tsdf --mesh out/mesh.ply
//! ```
//!
//! Recordings hold stamped clouds and poses. A reader thread feeds them into
//! the server's event channel and the server loop runs on the main thread.
//! The loop stops at the end of the recording or on Ctrl-C.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use clap::Parser;
use crossbeam_channel::{Receiver, bounded};

use vastu_tsdf::io::RecordingReader;
use vastu_tsdf::server::{LoopStats, ServerEvent};
use vastu_tsdf::{
    LogPublisher, MapPublisher, ServerCommand, ServerConfig, TransformBuffer, TsdfServer, run_event_loop,
};

/// Events buffered between the reader thread and the server loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "vastu-tsdf")]
#[command(about = "Sliding-window TSDF fusion server")]
struct Args {
    /// TOML configuration file (defaults to configs/tsdf.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recording of clouds and poses to replay
    #[arg(short, long)]
    recording: PathBuf,

    /// Write the final map to this file
    #[arg(long)]
    save_map: Option<PathBuf>,

    /// Run a full mesh pass at the end and export it as PLY
    #[arg(long)]
    mesh: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::load_default()?,
    };
    Ok(config)
}

/// Run the server loop until shutdown, then wait for the reader thread.
///
/// The receiver is dropped before joining so a reader blocked on a full
/// channel sees the disconnect and exits.
fn replay<P: MapPublisher>(
    server: &mut TsdfServer<TransformBuffer, P>,
    events: Receiver<ServerEvent>,
    reader: JoinHandle<u64>,
) -> (LoopStats, u64) {
    let stats = run_event_loop(server, &events);
    drop(events);
    let replayed = reader.join().unwrap_or_default();
    (stats, replayed)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(path) = &args.mesh {
        config.server.mesh_filename = path.display().to_string();
    }

    log::info!("vastu-tsdf starting");
    log::info!("  Recording: {}", args.recording.display());
    log::info!(
        "  Map: {} m voxels, {} per block side",
        config.map.voxel_size,
        config.map.voxels_per_side
    );
    log::info!("  Integrator: {}", config.integrator.method);

    let resolver = TransformBuffer::new(config.server.transform_buffer_secs);
    let mut server = TsdfServer::new(&config, resolver, LogPublisher::default())?;

    let mut reader = RecordingReader::open(&args.recording)?;
    let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);

    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        let _ = shutdown_tx.send(ServerEvent::Shutdown);
    })?;

    let reader_handle = thread::Builder::new()
        .name("recording-reader".into())
        .spawn(move || {
            let mut count = 0u64;
            loop {
                match reader.next_event() {
                    Ok(Some(event)) => {
                        if tx.send(ServerEvent::from(event)).is_err() {
                            break;
                        }
                        count += 1;
                    }
                    Ok(None) => {
                        log::info!("End of recording reached");
                        break;
                    }
                    Err(e) => {
                        log::error!("Recording read error: {}", e);
                        break;
                    }
                }
            }
            let _ = tx.send(ServerEvent::Shutdown);
            count
        })?;

    let (stats, replayed) = replay(&mut server, rx, reader_handle);
    log::info!("Replayed {} events ({} handled)", replayed, stats.events);

    if args.mesh.is_some() {
        server.handle_command(ServerCommand::GenerateMesh)?;
    }
    if let Some(path) = &args.save_map {
        server.handle_command(ServerCommand::SaveMap(path.clone()))?;
        log::info!("Saved map to {}", path.display());
    }

    log::info!(
        "vastu-tsdf done: {} blocks, {} submaps finished",
        server.layer().num_allocated_blocks(),
        server.submaps().counter()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vastu_tsdf::{NullPublisher, Point, Timestamp, Transform};

    #[test]
    fn test_shutdown_releases_blocked_reader() {
        let config = ServerConfig::default();
        let mut server = TsdfServer::new(&config, TransformBuffer::new(1.0), NullPublisher).unwrap();

        let (tx, rx) = bounded(2);
        tx.send(ServerEvent::Shutdown).unwrap();
        let reader = thread::spawn(move || {
            let mut count = 0u64;
            for i in 1..=1000u64 {
                let event = ServerEvent::Pose {
                    frame_id: "lidar".into(),
                    timestamp: Timestamp::from_nanos(i),
                    pose: Transform::from_translation(Point::new(0.0, 0.0, 0.0)),
                };
                if tx.send(event).is_err() {
                    break;
                }
                count += 1;
            }
            count
        });

        let (stats, replayed) = replay(&mut server, rx, reader);
        assert_eq!(stats.events, 1);
        assert!(replayed < 1000);
    }
}
