//! The TSDF server: wires ingest, refinement, fusion, windowing, pruning and
//! submapping together.
//!
//! Per admitted message:
//!
//! ```text
//! IngestQueue ─► PoseResolver ─► PoseRefiner? ─► FusionEngine::integrate
//!      ─► DeintegrationWindow::append ─► DeintegrationWindow::service
//!      ─► distance culling ─► SubmapLifecycle::should_finalize ─► finalize?
//! ```
//!
//! Every call runs to completion before the next one starts. Consumers that
//! read the map (publishing, meshing, saving) run the pruner first.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ServerConfig, ServerSection, validate_persistence_root};
use crate::core::{LogOnce, LogThrottle, Observation, Timestamp, Transform};
use crate::ingest::{ColorMap, IngestQueue, PointcloudMessage, PoseResolver, TransformBuffer, colormap_from_name};
use crate::io::{
    LayerMessage, MapAction, PersistError, deserialize_into_layer, load_layer, save_layer, save_submap,
    serialize_layer, submap_directory, write_mesh_ply,
};
use crate::pruner::MapPruner;
use crate::refine::{PoseRefiner, TsdfIcp};
use crate::submap::{SubmapBundle, SubmapLifecycle, SubmapThresholds, window_trajectory};
use crate::tsdf::visualization::{distance_pointcloud, distance_slice, occupied_voxels, surface_pointcloud};
use crate::tsdf::{
    BlockMergingStrategy, FusionEngine, MeshExtractor, MeshLayer, MeshMessage, SurfaceMesher, TsdfLayer,
    create_engine,
};
use crate::window::{DeintegrationThresholds, DeintegrationWindow};

use super::commands::{CommandResult, ServerCommand, ServerError};
use super::publisher::{MapPublisher, NullPublisher};

const REMOTE_MAP_ERROR_PERIOD_SECS: f64 = 10.0;
const SURFACE_DISTANCE_FACTOR: f32 = 0.75;
const SLICE_AXIS_Z: usize = 2;

/// Single-threaded TSDF fusion server.
pub struct TsdfServer<R = TransformBuffer, P = NullPublisher> {
    settings: ServerSection,
    resolver: R,
    publisher: P,

    layer: TsdfLayer,
    mesh_layer: MeshLayer,
    engine: Box<dyn FusionEngine>,
    mesher: Box<dyn MeshExtractor>,
    color_map: Box<dyn ColorMap>,
    refiner: Option<PoseRefiner<TsdfIcp>>,

    pointcloud_queue: IngestQueue<PointcloudMessage>,
    freespace_queue: IngestQueue<PointcloudMessage>,
    window: DeintegrationWindow,
    pruner: MapPruner,
    submaps: SubmapLifecycle,
    persistence_root: Option<PathBuf>,
    submap_prefix: String,

    num_map_subscribers: usize,
    cached_mesh: Option<MeshMessage>,
    remote_map_error_log: LogThrottle,
    remote_map_info_log: LogOnce,
    freespace_disabled_log: LogOnce,
}

impl<R: PoseResolver, P: MapPublisher> TsdfServer<R, P> {
    /// Build a server with the engine named in the configuration.
    pub fn new(config: &ServerConfig, resolver: R, publisher: P) -> Result<Self, ServerError> {
        let engine = create_engine(&config.integrator)?;
        Ok(Self::with_engine(config, resolver, publisher, engine))
    }

    /// Build a server around an already constructed engine.
    ///
    /// Invalid optional settings are logged and disabled rather than
    /// rejected, so this never fails.
    pub fn with_engine(config: &ServerConfig, resolver: R, publisher: P, engine: Box<dyn FusionEngine>) -> Self {
        let settings = config.server.clone();
        let layer = TsdfLayer::new(config.map.voxel_size, config.map.voxels_per_side);
        let mesh_layer = MeshLayer::new(layer.block_size());

        let mut window = DeintegrationWindow::new(DeintegrationThresholds::from_config(&config.deintegration));
        if window.deintegration_enabled() && !engine.supports_deintegration() {
            log::error!(
                "Pointcloud deintegration is enabled, but not supported by the \"{}\" integrator. \
                 Use method \"simple\" or leave deintegration.max_queue_length, max_time_interval \
                 and max_distance_travelled unset.",
                engine.method()
            );
            window.disable_deintegration();
        }

        let refiner = config.refinement.enable_pose_refinement.then(|| {
            PoseRefiner::new(
                TsdfIcp::new(config.refinement.icp.clone()),
                config.refinement.accumulate_refinement_corrections,
            )
        });

        Self {
            resolver,
            publisher,
            mesh_layer,
            engine,
            mesher: Box::new(SurfaceMesher::new(config.mesh.clone())),
            color_map: colormap_from_name(&settings.intensity_colormap, settings.intensity_max_value),
            refiner,
            pointcloud_queue: IngestQueue::new(settings.min_time_between_msgs_sec),
            freespace_queue: IngestQueue::new(settings.min_time_between_msgs_sec),
            window,
            pruner: MapPruner::new(),
            submaps: SubmapLifecycle::new(SubmapThresholds::from_config(&config.submap)),
            persistence_root: validate_persistence_root(&config.submap.persist_to_directory),
            submap_prefix: config.submap.directory_prefix.clone(),
            num_map_subscribers: 0,
            cached_mesh: None,
            remote_map_error_log: LogThrottle::new(REMOTE_MAP_ERROR_PERIOD_SECS),
            remote_map_info_log: LogOnce::default(),
            freespace_disabled_log: LogOnce::default(),
            layer,
            settings,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Server options in effect.
    pub fn settings(&self) -> &ServerSection {
        &self.settings
    }

    /// The map.
    pub fn layer(&self) -> &TsdfLayer {
        &self.layer
    }

    /// The mesh cells.
    pub fn mesh_layer(&self) -> &MeshLayer {
        &self.mesh_layer
    }

    /// The live window.
    pub fn window(&self) -> &DeintegrationWindow {
        &self.window
    }

    /// Submap bookkeeping.
    pub fn submaps(&self) -> &SubmapLifecycle {
        &self.submaps
    }

    /// Validated submap root, if persistence is on.
    pub fn persistence_root(&self) -> Option<&Path> {
        self.persistence_root.as_deref()
    }

    /// Whether deintegration is pending a prune.
    pub fn map_needs_pruning(&self) -> bool {
        self.pruner.needs_pruning()
    }

    /// Current refinement correction, if refinement is on.
    pub fn refinement_correction(&self) -> Option<Transform> {
        self.refiner.as_ref().map(PoseRefiner::correction)
    }

    /// Last mesh message, kept when `cache_mesh` is set.
    pub fn cached_mesh(&self) -> Option<&MeshMessage> {
        self.cached_mesh.as_ref()
    }

    /// Messages waiting for their pose on the main stream.
    pub fn pending_pointclouds(&self) -> usize {
        self.pointcloud_queue.len()
    }

    /// The pose source.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Mutable pose source, for feeding poses.
    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    /// The output sink.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Mutable output sink.
    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Offer a message from the main stream and fuse everything that resolves.
    pub fn insert_pointcloud(&mut self, msg: PointcloudMessage) {
        self.pointcloud_queue.enqueue(msg);

        let mut processed_any = false;
        while let Some((msg, pose)) = self.pointcloud_queue.next_ready(&self.resolver, &self.settings.world_frame) {
            self.process_pointcloud(&msg, pose, false);
            processed_any = true;
        }
        if !processed_any {
            return;
        }

        if self.settings.publish_pointclouds_on_update {
            self.publish_pointclouds();
        }
        if self.settings.verbose {
            log::info!("Layer memory: {} bytes", self.layer.memory_size());
        }
    }

    /// Offer a message from the freespace stream.
    ///
    /// Ignored unless `use_freespace_pointcloud` is set.
    pub fn insert_freespace_pointcloud(&mut self, msg: PointcloudMessage) {
        if !self.settings.use_freespace_pointcloud {
            if self.freespace_disabled_log.ready() {
                log::warn!("Received a freespace pointcloud but use_freespace_pointcloud is off, ignoring.");
            }
            return;
        }
        self.freespace_queue.enqueue(msg);
        while let Some((msg, pose)) = self.freespace_queue.next_ready(&self.resolver, &self.settings.world_frame) {
            self.process_pointcloud(&msg, pose, true);
        }
    }

    /// Fuse one message whose pose is known.
    pub fn process_pointcloud(&mut self, msg: &PointcloudMessage, pose: Transform, is_freespace: bool) {
        let (points, colors) = msg.to_pointcloud(self.color_map.as_ref());
        let observation = Observation::new(msg.timestamp, points, colors, is_freespace);

        let mut refined_pose = pose;
        if let Some(refiner) = self.refiner.as_mut() {
            let update = refiner.refine(msg.timestamp, &pose, &observation.points, &self.layer);
            if self.settings.verbose {
                log::info!("Pose refinement performed {} successful update steps", update.update_count);
            }
            self.publisher.publish_refinement(&update);
            refined_pose = update.refined_pose;
        }

        if self.settings.verbose {
            log::info!("Integrating a pointcloud with {} points.", observation.len());
        }
        let start = Instant::now();
        self.integrate_observation(observation, refined_pose);
        if self.settings.verbose {
            log::info!(
                "Finished integrating in {:.4} seconds, have {} blocks.",
                start.elapsed().as_secs_f64(),
                self.layer.num_allocated_blocks()
            );
        }

        if self.publisher.num_reprojected_subscribers() > 0 {
            if let Some(points) = self.engine.reprojected_pointcloud() {
                self.publisher
                    .publish_reprojected_pointcloud(msg.timestamp, &msg.frame_id, points);
            }
        }

        if self.window.deintegration_enabled() {
            let start = Instant::now();
            self.service_window();
            if self.settings.verbose {
                log::info!("Finished deintegrating in {:.4} seconds.", start.elapsed().as_secs_f64());
            }
        }

        if let Some(max_distance) = self.settings.max_block_distance_from_body {
            let position = pose.position();
            self.layer.remove_distant_blocks(&position, max_distance);
            self.mesh_layer.clear_distant_mesh(&position, max_distance);
        }

        if self.submaps.should_finalize(msg.timestamp, &pose) {
            self.finalize_submap(msg.timestamp, &pose);
        }
    }

    /// Fuse an observation and record it in the window when anything needs it.
    pub fn integrate_observation(&mut self, observation: Observation, pose: Transform) {
        self.engine.integrate(
            &mut self.layer,
            &pose,
            &observation.points,
            &observation.colors,
            observation.is_freespace,
            false,
        );
        if self.window.deintegration_enabled() || self.submaps.is_enabled() {
            self.window.append(observation, pose);
        }
    }

    /// Deintegrate clouds that left the window. Returns how many.
    pub fn service_window(&mut self) -> usize {
        let evicted = self
            .window
            .service(self.engine.as_mut(), &mut self.layer, self.settings.verbose);
        if evicted > 0 {
            self.pruner.mark_dirty();
        }
        evicted
    }

    /// Remove blocks emptied by deintegration, if any deintegration happened.
    pub fn prune_map(&mut self) {
        if !self.pruner.needs_pruning() {
            return;
        }
        let removed = self.pruner.prune_if_needed(&mut self.layer, &mut self.mesh_layer);
        if self.settings.verbose {
            log::info!("Pruned {} TSDF blocks", removed);
        }
    }

    /// Apply a map received from another node.
    ///
    /// Invalid messages leave the map unchanged and are reported at most
    /// once every ten seconds.
    pub fn handle_remote_layer(&mut self, message: LayerMessage) -> bool {
        match deserialize_into_layer(message, &mut self.layer) {
            Ok(()) => {
                if self.remote_map_info_log.ready() {
                    log::info!("Got a TSDF map from the remote map stream");
                }
                if self.settings.publish_pointclouds_on_update {
                    self.publish_pointclouds();
                }
                true
            }
            Err(e) => {
                if self.remote_map_error_log.ready() {
                    log::error!("Got an invalid TSDF map message: {}", e);
                }
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Submaps
    // ------------------------------------------------------------------

    fn finalize_submap(&mut self, timestamp: Timestamp, pose: &Transform) {
        let index = self.submaps.counter();

        if self.publisher.num_submap_subscribers() > 0 {
            self.prune_map();
            let bundle = SubmapBundle {
                index,
                robot_name: self.settings.robot_name.clone(),
                layer: serialize_layer(&mut self.layer, false),
                trajectory: window_trajectory(&self.window, &self.settings.robot_name, &self.settings.world_frame),
            };
            self.publisher.publish_submap(&bundle);
        }

        let directory = self
            .persistence_root
            .as_ref()
            .map(|root| submap_directory(root, &self.submap_prefix, index));
        if let Some(directory) = directory {
            match self.save_submap(&directory) {
                Ok(()) => {
                    log::info!("Wrote submap {} to \"{}\"", index, directory.display());
                    self.publisher.publish_submap_path(&directory);
                }
                Err(e) => log::error!(
                    "Could not write submap {} to directory \"{}\": {}",
                    index,
                    directory.display(),
                    e
                ),
            }
        }

        // Without deintegration nothing else bounds the map.
        if !self.window.deintegration_enabled() {
            self.clear();
        }
        self.submaps.begin_next(timestamp, pose);
    }

    /// Write the map and the window trajectory into `directory`.
    pub fn save_submap(&mut self, directory: &Path) -> Result<(), PersistError> {
        self.prune_map();
        let trajectory = window_trajectory(&self.window, &self.settings.robot_name, &self.settings.world_frame);
        save_submap(directory, &self.layer, &trajectory)
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// Publish a map snapshot to map subscribers.
    ///
    /// Snapshots are incremental unless `reset_remote_map` is set or a new
    /// subscriber appeared since the last call.
    pub fn publish_map(&mut self, reset_remote_map: bool) {
        self.prune_map();
        if !self.settings.publish_tsdf_map {
            return;
        }
        let subscribers = self.publisher.num_map_subscribers();
        if subscribers > 0 {
            let reset = reset_remote_map || self.num_map_subscribers < subscribers;
            let mut message = serialize_layer(&mut self.layer, !reset);
            if reset {
                message.action = MapAction::Reset;
            }
            self.publisher.publish_map(&message);
        }
        self.num_map_subscribers = subscribers;
    }

    /// Publish every observed voxel with its distance as intensity.
    pub fn publish_all_updated_tsdf_voxels(&mut self) {
        self.prune_map();
        let points = distance_pointcloud(&self.layer);
        self.publisher.publish_distance_pointcloud(&points);
    }

    /// Publish voxels near the surface.
    pub fn publish_tsdf_surface_points(&mut self) {
        self.prune_map();
        let threshold = SURFACE_DISTANCE_FACTOR * self.layer.voxel_size();
        let points = surface_pointcloud(&self.layer, threshold);
        self.publisher.publish_surface_pointcloud(&points);
    }

    /// Publish occupied voxel centers.
    pub fn publish_tsdf_occupied_nodes(&mut self) {
        self.prune_map();
        let centers = occupied_voxels(&self.layer);
        self.publisher.publish_occupied_voxels(&centers);
    }

    /// Publish the horizontal distance slice at `slice_level`.
    pub fn publish_slices(&mut self) {
        self.prune_map();
        let points = distance_slice(&self.layer, SLICE_AXIS_Z, self.settings.slice_level);
        self.publisher.publish_slice(&points);
    }

    /// Publish all visualization clouds.
    pub fn publish_pointclouds(&mut self) {
        self.prune_map();
        self.publish_all_updated_tsdf_voxels();
        self.publish_tsdf_surface_points();
        self.publish_tsdf_occupied_nodes();
        if self.settings.publish_slices {
            self.publish_slices();
        }
    }

    /// Incremental mesh update, run on the mesh timer.
    pub fn update_mesh(&mut self) {
        if self.settings.verbose {
            log::info!("Updating mesh.");
        }
        self.prune_map();
        self.mesher
            .generate_mesh(&mut self.layer, &mut self.mesh_layer, true, true);
        let message = self.mesh_layer.take_updated();
        self.publisher.publish_mesh(&message);
        if self.settings.cache_mesh {
            self.cached_mesh = Some(message);
        }

        if self.settings.publish_pointclouds && !self.settings.publish_pointclouds_on_update {
            self.publish_pointclouds();
        }
    }

    /// Re-extract the whole mesh, publish it and export it if configured.
    pub fn generate_mesh(&mut self) -> Result<(), ServerError> {
        self.prune_map();
        self.mesher
            .generate_mesh(&mut self.layer, &mut self.mesh_layer, false, true);
        let message = self.mesh_layer.take_updated();
        self.publisher.publish_mesh(&message);

        if !self.settings.mesh_filename.is_empty() {
            let path = PathBuf::from(&self.settings.mesh_filename);
            match write_mesh_ply(&self.mesh_layer, &path) {
                Ok(vertices) => log::info!("Output file as PLY: {} ({} vertices)", path.display(), vertices),
                Err(e) => {
                    log::error!("Failed to output mesh as PLY: {}: {}", path.display(), e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Wipe the map, mesh and window. Map consumers get a reset snapshot.
    pub fn clear(&mut self) {
        self.layer.remove_all_blocks();
        self.mesh_layer.clear();
        self.window.clear();
        self.pruner.reset();

        if self.settings.publish_tsdf_map {
            self.publish_map(true);
        }
    }

    /// Write every block to a map file.
    pub fn save_map(&mut self, path: &Path) -> Result<(), ServerError> {
        self.prune_map();
        save_layer(&self.layer, path)?;
        Ok(())
    }

    /// Load a map file, replacing colliding blocks. Returns the blocks read.
    pub fn load_map(&mut self, path: &Path) -> Result<usize, ServerError> {
        let count = load_layer(path, BlockMergingStrategy::Replace, &mut self.layer)?;
        log::info!("Successfully loaded TSDF layer with {} blocks.", count);
        Ok(count)
    }

    /// Execute one control command.
    pub fn handle_command(&mut self, command: ServerCommand) -> CommandResult {
        match command {
            ServerCommand::ClearMap => {
                self.clear();
                Ok(())
            }
            ServerCommand::GenerateMesh => self.generate_mesh(),
            ServerCommand::SaveMap(path) => self.save_map(&path),
            ServerCommand::LoadMap(path) => self.load_map(&path).map(|_| ()),
            ServerCommand::PublishPointclouds => {
                self.publish_pointclouds();
                Ok(())
            }
            ServerCommand::PublishMap => {
                self.publish_map(false);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point;
    use crate::io::layer_from_file;
    use crate::refine::RefinementUpdate;
    use crate::submap::SubmapBundle;

    /// Resolves every frame to a translation along x given by the stamp in seconds.
    struct LinearMotion;

    impl PoseResolver for LinearMotion {
        fn lookup(&self, _: &str, _: &str, timestamp: Timestamp) -> Option<Transform> {
            Some(Transform::from_translation(Point::new(
                timestamp.as_secs_f64() as f32,
                0.0,
                0.0,
            )))
        }
    }

    #[derive(Default)]
    struct Recorder {
        map_subscribers: usize,
        submap_subscribers: usize,
        maps: Vec<LayerMessage>,
        meshes: Vec<MeshMessage>,
        submaps: Vec<SubmapBundle>,
        paths: Vec<PathBuf>,
        refinements: Vec<RefinementUpdate>,
        surface_clouds: usize,
    }

    impl MapPublisher for Recorder {
        fn num_map_subscribers(&self) -> usize {
            self.map_subscribers
        }
        fn num_submap_subscribers(&self) -> usize {
            self.submap_subscribers
        }
        fn publish_map(&mut self, message: &LayerMessage) {
            self.maps.push(message.clone());
        }
        fn publish_mesh(&mut self, message: &MeshMessage) {
            self.meshes.push(message.clone());
        }
        fn publish_submap(&mut self, bundle: &SubmapBundle) {
            self.submaps.push(bundle.clone());
        }
        fn publish_submap_path(&mut self, path: &Path) {
            self.paths.push(path.to_path_buf());
        }
        fn publish_refinement(&mut self, update: &RefinementUpdate) {
            self.refinements.push(*update);
        }
        fn publish_surface_pointcloud(&mut self, _: &[crate::tsdf::visualization::ColoredPoint]) {
            self.surface_clouds += 1;
        }
    }

    fn config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.server.verbose = false;
        config.map.voxel_size = 0.1;
        config.map.voxels_per_side = 8;
        // Unit weights deintegrate exactly.
        config.integrator.use_const_weight = true;
        config.integrator.use_weight_dropoff = false;
        config
    }

    /// A wall 1 m in front of the sensor.
    fn wall(secs: f64) -> PointcloudMessage {
        let mut points = Vec::new();
        for i in -5..=5 {
            for j in -5..=5 {
                points.push(Point::new(1.0, i as f32 * 0.05, j as f32 * 0.05));
            }
        }
        PointcloudMessage::new(Timestamp::from_secs_f64(secs), "lidar", points)
    }

    fn server(config: &ServerConfig) -> TsdfServer<LinearMotion, Recorder> {
        TsdfServer::new(config, LinearMotion, Recorder::default()).unwrap()
    }

    #[test]
    fn test_integration_without_window_keeps_nothing() {
        let mut server = server(&config());
        server.insert_pointcloud(wall(1.0));
        server.insert_pointcloud(wall(2.0));
        assert!(server.layer().num_allocated_blocks() > 0);
        assert!(server.window().is_empty());
    }

    #[test]
    fn test_queue_length_window_bounds_map() {
        let mut config = config();
        config.deintegration.max_queue_length = Some(2);
        let mut server = server(&config);
        for i in 1..=6 {
            server.insert_pointcloud(wall(i as f64 * 0.5));
        }
        assert_eq!(server.window().len(), 2);
        assert!(server.map_needs_pruning());
        server.prune_map();
        assert!(!server.map_needs_pruning());

        // Only blocks near the last two sensor positions survive.
        let front_x = server.window().front().unwrap().pose.position().x;
        for block in server.layer().blocks() {
            assert!(block.center().x > front_x - 1.0, "stale block at {:?}", block.index());
        }
    }

    #[test]
    fn test_merged_engine_disables_window() {
        let mut config = config();
        config.integrator.method = "merged".into();
        config.deintegration.max_time_interval = Some(1.0);
        let server = server(&config);
        assert!(!server.window().deintegration_enabled());
    }

    #[test]
    fn test_submap_window_without_deintegration_clears_map() {
        let mut config = config();
        config.submap.max_distance_travelled = Some(1.5);
        let mut server = server(&config);
        server.publisher_mut().submap_subscribers = 1;

        server.insert_pointcloud(wall(1.0));
        server.insert_pointcloud(wall(2.0));
        assert_eq!(server.window().len(), 2);
        assert!(server.publisher().submaps.is_empty());

        // 2 m from the reference at x = 1.
        server.insert_pointcloud(wall(3.0));
        let bundles = &server.publisher().submaps;
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].index, 0);
        assert_eq!(bundles[0].trajectory.stamped_poses.len(), 3);
        assert!(bundles[0].layer.num_blocks() > 0);

        assert_eq!(server.submaps().counter(), 1);
        assert_eq!(server.layer().num_allocated_blocks(), 0);
        assert!(server.window().is_empty());
    }

    #[test]
    fn test_submap_with_deintegration_keeps_map() {
        let mut config = config();
        config.submap.max_distance_travelled = Some(1.5);
        config.deintegration.max_queue_length = Some(5);
        let mut server = server(&config);
        for i in 1..=3 {
            server.insert_pointcloud(wall(i as f64));
        }
        assert_eq!(server.submaps().counter(), 1);
        assert!(server.layer().num_allocated_blocks() > 0);
        assert_eq!(server.window().len(), 3);
    }

    #[test]
    fn test_submap_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.submap.max_time_interval = Some(0.5);
        config.submap.persist_to_directory = format!("{}/", dir.path().display());
        let mut server = server(&config);
        server.insert_pointcloud(wall(1.0));
        server.insert_pointcloud(wall(2.0));

        let expected = dir.path().join("vastu_submap_0");
        assert_eq!(server.publisher().paths, vec![expected.clone()]);
        let layer = layer_from_file(&expected.join("volumetric_map.tsdf")).unwrap();
        assert!(layer.num_allocated_blocks() > 0);
    }

    #[test]
    fn test_invalid_persistence_root_is_disabled() {
        let mut config = config();
        config.submap.max_time_interval = Some(0.5);
        config.submap.persist_to_directory = "relative/submaps".into();
        let mut server = server(&config);
        assert!(server.persistence_root().is_none());
        server.insert_pointcloud(wall(1.0));
        server.insert_pointcloud(wall(2.0));
        assert_eq!(server.submaps().counter(), 1);
        assert!(server.publisher().paths.is_empty());
    }

    #[test]
    fn test_publish_map_resets_for_new_subscribers() {
        let mut config = config();
        config.server.publish_tsdf_map = true;
        let mut server = server(&config);
        server.insert_pointcloud(wall(1.0));

        // Nobody listening: nothing serialized.
        server.publish_map(false);
        assert!(server.publisher().maps.is_empty());

        server.publisher_mut().map_subscribers = 1;
        server.publish_map(false);
        assert_eq!(server.publisher().maps[0].action, MapAction::Reset);
        assert!(server.publisher().maps[0].num_blocks() > 0);

        // A reset snapshot leaves the update flags alone.
        server.publish_map(false);
        assert_eq!(server.publisher().maps[1].action, MapAction::Update);
        assert_eq!(server.publisher().maps[1].num_blocks(), server.publisher().maps[0].num_blocks());

        server.publish_map(false);
        assert_eq!(server.publisher().maps[2].num_blocks(), 0);
    }

    #[test]
    fn test_clear_command_publishes_reset() {
        let mut config = config();
        config.server.publish_tsdf_map = true;
        config.deintegration.max_queue_length = Some(3);
        let mut server = server(&config);
        server.publisher_mut().map_subscribers = 1;
        server.insert_pointcloud(wall(1.0));

        server.handle_command(ServerCommand::ClearMap).unwrap();
        assert_eq!(server.layer().num_allocated_blocks(), 0);
        assert!(server.window().is_empty());
        let last = server.publisher().maps.last().unwrap();
        assert_eq!(last.action, MapAction::Reset);
        assert_eq!(last.num_blocks(), 0);
    }

    #[test]
    fn test_mesh_timer_publishes_and_caches() {
        let mut config = config();
        config.server.cache_mesh = true;
        let mut server = server(&config);
        server.insert_pointcloud(wall(1.0));
        server.update_mesh();
        assert_eq!(server.publisher().meshes.len(), 1);
        assert!(!server.publisher().meshes[0].blocks.is_empty());
        assert!(server.cached_mesh().is_some());
    }

    #[test]
    fn test_publish_pointclouds_on_update() {
        let mut config = config();
        config.server.publish_pointclouds_on_update = true;
        let mut server = server(&config);
        server.insert_pointcloud(wall(1.0));
        assert_eq!(server.publisher().surface_clouds, 1);
    }

    #[test]
    fn test_freespace_ignored_when_disabled() {
        let mut config = config();
        config.deintegration.max_queue_length = Some(10);
        let mut server = server(&config);
        server.insert_freespace_pointcloud(wall(1.0));
        server.insert_freespace_pointcloud(wall(2.0));
        assert_eq!(server.layer().num_allocated_blocks(), 0);
        assert!(server.window().is_empty());
    }

    #[test]
    fn test_freespace_stream_has_its_own_gate() {
        let mut config = config();
        config.server.use_freespace_pointcloud = true;
        config.server.min_time_between_msgs_sec = 1.0;
        config.deintegration.max_queue_length = Some(10);
        let mut server = server(&config);

        server.insert_pointcloud(wall(5.0));
        // Older than the main stream's last message, but first on this stream.
        server.insert_freespace_pointcloud(wall(2.0));
        server.insert_freespace_pointcloud(wall(2.5));
        server.insert_freespace_pointcloud(wall(4.0));
        // The main gate is untouched by freespace traffic.
        server.insert_pointcloud(wall(5.5));

        let packets: Vec<(f64, bool)> = server
            .window()
            .iter()
            .map(|p| (p.timestamp().as_secs_f64(), p.observation.is_freespace))
            .collect();
        assert_eq!(packets, vec![(2.0, true), (4.0, true), (5.0, false)]);
    }

    #[test]
    fn test_freespace_does_not_publish_pointclouds() {
        let mut config = config();
        config.server.use_freespace_pointcloud = true;
        config.server.publish_pointclouds_on_update = true;
        config.deintegration.max_queue_length = Some(10);
        let mut server = server(&config);

        server.insert_freespace_pointcloud(wall(1.0));
        assert_eq!(server.window().len(), 1);
        assert_eq!(server.publisher().surface_clouds, 0);

        server.insert_pointcloud(wall(2.0));
        assert_eq!(server.publisher().surface_clouds, 1);
    }

    #[test]
    fn test_save_and_load_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsdf");
        let mut source = server(&config());
        source.insert_pointcloud(wall(1.0));
        source.handle_command(ServerCommand::SaveMap(path.clone())).unwrap();

        let mut target = server(&config());
        target.handle_command(ServerCommand::LoadMap(path)).unwrap();
        assert_eq!(
            target.layer().num_allocated_blocks(),
            source.layer().num_allocated_blocks()
        );

        let missing = dir.path().join("missing.tsdf");
        assert!(target.handle_command(ServerCommand::LoadMap(missing)).is_err());
    }

    #[test]
    fn test_invalid_remote_layer_is_rejected() {
        let mut server = server(&config());
        server.insert_pointcloud(wall(1.0));
        let before = server.layer().num_allocated_blocks();
        let message = LayerMessage {
            action: MapAction::Reset,
            voxel_size: 0.5,
            voxels_per_side: 8,
            blocks: Vec::new(),
        };
        assert!(!server.handle_remote_layer(message));
        assert_eq!(server.layer().num_allocated_blocks(), before);
    }

    #[test]
    fn test_refinement_publishes_updates() {
        let mut config = config();
        config.refinement.enable_pose_refinement = true;
        let mut server = server(&config);
        server.insert_pointcloud(wall(1.0));
        server.insert_pointcloud(wall(1.1));
        assert_eq!(server.publisher().refinements.len(), 2);
        assert!(server.refinement_correction().is_some());
    }

    #[test]
    fn test_distant_blocks_are_removed() {
        let mut config = config();
        config.server.max_block_distance_from_body = Some(2.0);
        let mut server = server(&config);
        server.insert_pointcloud(wall(1.0));
        server.insert_pointcloud(wall(20.0));
        for block in server.layer().blocks() {
            assert!(block.center().x > 15.0);
        }
    }
}
