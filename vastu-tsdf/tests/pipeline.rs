//! End-to-end behavior of the fusion pipeline.

mod common;

use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;

use common::*;
use vastu_tsdf::io::{RecordingReader, RecordingWriter};
use vastu_tsdf::server::{ServerEvent, send_command};
use vastu_tsdf::{MapAction, RecordedEvent, ServerCommand, ServerConfig, run_event_loop};

#[test]
fn test_shipped_config_is_valid() {
    let config = ServerConfig::from_toml(include_str!("../configs/tsdf.toml")).unwrap();
    assert_eq!(config.integrator.method, "simple");
    assert!(config.deintegration.max_queue_length.is_none());
    assert!(config.submap.persist_to_directory.is_empty());
}

#[test]
fn test_clouds_wait_for_their_pose() {
    let mut server = test_server(&test_config());
    server.insert_pointcloud(wall_cloud(1.0));
    server.insert_pointcloud(wall_cloud(2.0));
    assert_eq!(server.pending_pointclouds(), 2);
    assert_eq!(server.layer().num_allocated_blocks(), 0);

    server.resolver_mut().insert(SENSOR_FRAME, secs(0.0), pose_at(0.0));
    server.resolver_mut().insert(SENSOR_FRAME, secs(3.0), pose_at(3.0));
    server.insert_pointcloud(wall_cloud(2.5));
    assert_eq!(server.pending_pointclouds(), 0);
    assert!(server.layer().num_allocated_blocks() > 0);
}

#[test]
fn test_time_window_forgets_old_clouds() {
    let mut config = test_config();
    config.deintegration.max_time_interval = Some(2.5);
    let mut server = test_server(&config);

    for i in 1..10 {
        observe_at(&mut server, i as f64, i as f32);
    }
    // Stamps 7, 8 and 9 span 2 s; adding 6 would span 3 s.
    let stamps: Vec<f64> = server.window().iter().map(|p| p.timestamp().as_secs_f64()).collect();
    assert_eq!(stamps, vec![7.0, 8.0, 9.0]);

    server.prune_map();
    for block in server.layer().blocks() {
        assert!(block.center().x > 6.0, "block {:?} outlived its clouds", block.index());
    }
}

#[test]
fn test_distance_window_forgets_old_clouds() {
    let mut config = test_config();
    config.deintegration.max_distance_travelled = Some(1.0);
    let mut server = test_server(&config);

    for i in 0..6 {
        observe_at(&mut server, 1.0 + i as f64, i as f32 * 0.4);
    }
    // Positions 1.2, 1.6 and 2.0 span 0.8 m.
    assert_eq!(server.window().len(), 3);
    let front = server.window().front().unwrap().pose.position().x;
    assert!((front - 1.2).abs() < 1e-5);
}

#[test]
fn test_full_deintegration_empties_the_map() {
    let mut config = test_config();
    config.deintegration.max_queue_length = Some(1);
    let mut server = test_server(&config);

    observe_at(&mut server, 1.0, 0.0);
    server.update_mesh();
    let near_blocks = server.layer().num_allocated_blocks();
    assert!(near_blocks > 0);

    // Far enough that the two clouds share no block.
    observe_at(&mut server, 2.0, 10.0);
    assert!(server.map_needs_pruning());
    server.update_mesh();
    assert!(!server.map_needs_pruning());

    for block in server.layer().blocks() {
        assert!(block.center().x > 5.0);
    }
    let last_mesh = server.publisher().meshes.last().unwrap();
    let cleared = last_mesh.blocks.iter().filter(|b| b.vertices.is_empty()).count();
    assert!(cleared >= 1, "pruned blocks must be sent as empty mesh cells");
}

#[test]
fn test_map_snapshots_feed_a_peer() {
    let mut config = test_config();
    config.server.publish_tsdf_map = true;
    let mut source = test_server(&config);
    observe_at(&mut source, 1.0, 0.0);
    source.publish_map(false);

    let snapshot = source.publisher().maps[0].clone();
    assert_eq!(snapshot.action, MapAction::Reset);

    let mut peer = test_server(&config);
    observe_at(&mut peer, 1.0, 5.0);
    assert!(peer.handle_remote_layer(snapshot));
    assert_eq!(observed_blocks(peer.layer()), observed_blocks(source.layer()));
}

#[test]
fn test_merged_snapshot_keeps_local_blocks() {
    let mut config = test_config();
    config.server.publish_tsdf_map = true;
    let mut source = test_server(&config);
    observe_at(&mut source, 1.0, 0.0);
    source.publish_map(false);

    let mut snapshot = source.publisher().maps[0].clone();
    snapshot.action = MapAction::Merge;

    let mut peer = test_server(&config);
    observe_at(&mut peer, 1.0, 5.0);
    let local = observed_blocks(peer.layer());
    assert!(peer.handle_remote_layer(snapshot));
    let merged = observed_blocks(peer.layer());
    assert!(local.iter().all(|index| merged.contains(index)));
    assert!(merged.len() > local.len());
}

#[test]
fn test_recording_replay_through_event_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drive.vrec");

    let mut writer = RecordingWriter::create(&path).unwrap();
    for i in 0..5 {
        let stamp = 1.0 + i as f64 * 0.5;
        writer
            .record(&RecordedEvent::Pose {
                frame_id: SENSOR_FRAME.into(),
                timestamp: secs(stamp),
                pose: pose_at(i as f32 * 0.5),
            })
            .unwrap();
        writer.record(&RecordedEvent::Pointcloud(wall_cloud(stamp))).unwrap();
    }
    assert_eq!(writer.finish().unwrap(), 10);

    let mut config = test_config();
    config.deintegration.max_queue_length = Some(2);
    let mut server = test_server(&config);

    let (tx, rx) = unbounded();
    let reader = RecordingReader::open(&path).unwrap();
    let feeder = thread::spawn(move || {
        for event in reader {
            tx.send(ServerEvent::from(event.unwrap())).unwrap();
        }
    });
    let stats = run_event_loop(&mut server, &rx);
    feeder.join().unwrap();

    assert_eq!(stats.events, 10);
    assert_eq!(server.window().len(), 2);
    assert!(server.layer().num_allocated_blocks() > 0);
}

#[test]
fn test_commands_from_another_thread() {
    let dir = tempfile::tempdir().unwrap();
    let map_path = dir.path().join("map.tsdf");

    let (tx, rx) = unbounded();
    let loop_handle = thread::spawn(move || {
        let mut server = test_server(&test_config());
        run_event_loop(&mut server, &rx);
        server.layer().num_allocated_blocks()
    });

    tx.send(ServerEvent::Pose {
        frame_id: SENSOR_FRAME.into(),
        timestamp: secs(1.0),
        pose: pose_at(0.0),
    })
    .unwrap();
    tx.send(ServerEvent::Pointcloud(wall_cloud(1.0))).unwrap();

    let timeout = Duration::from_secs(10);
    send_command(&tx, ServerCommand::SaveMap(map_path.clone()), timeout).unwrap();
    send_command(&tx, ServerCommand::ClearMap, timeout).unwrap();
    send_command(&tx, ServerCommand::LoadMap(map_path), timeout).unwrap();
    let missing = dir.path().join("missing.tsdf");
    assert!(send_command(&tx, ServerCommand::LoadMap(missing), timeout).is_err());
    tx.send(ServerEvent::Shutdown).unwrap();

    assert!(loop_handle.join().unwrap() > 0);
}

#[test]
fn test_generate_mesh_exports_ply() {
    let dir = tempfile::tempdir().unwrap();
    let ply = dir.path().join("mesh.ply");
    let mut config = test_config();
    config.server.mesh_filename = ply.display().to_string();
    let mut server = test_server(&config);
    observe_at(&mut server, 1.0, 0.0);

    server.generate_mesh().unwrap();
    let contents = std::fs::read_to_string(&ply).unwrap();
    assert!(contents.starts_with("ply"));
    assert!(!server.publisher().meshes.is_empty());
}

#[test]
fn test_generate_mesh_reports_export_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.server.mesh_filename = dir.path().join("no/such/dir/mesh.ply").display().to_string();
    let mut server = test_server(&config);
    observe_at(&mut server, 1.0, 0.0);
    assert!(server.generate_mesh().is_err());
    // The mesh is still published.
    assert_eq!(server.publisher().meshes.len(), 1);
}
