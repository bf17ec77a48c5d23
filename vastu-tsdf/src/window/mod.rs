//! Sliding window of fused observations.
//!
//! The window records every cloud whose contribution is live in the map, in
//! timestamp order. Servicing it deintegrates clouds from the front until
//! none of the thresholds is exceeded:
//!
//! ```text
//!   front (oldest)                               back (newest)
//!   ┌──────┬──────┬──────┬──────┬──────┬──────┐
//!   │ t=0  │ t=1  │ t=2  │ t=3  │ t=4  │ t=5  │
//!   └──────┴──────┴──────┴──────┴──────┴──────┘
//!     ▲ evict while  len > max_queue_length
//!                 or back.t − front.t > max_time_interval
//!                 or ‖back.p − front.p‖ > max_distance_travelled
//! ```
//!
//! The last remaining packet is never evicted.

use std::collections::VecDeque;

use crate::config::DeintegrationConfig;
use crate::core::{Observation, Threshold, Timestamp, Transform};
use crate::tsdf::{FusionEngine, TsdfLayer};

/// One fused cloud with the pose it was fused at.
#[derive(Clone, Debug)]
pub struct WindowPacket {
    /// Points, colors, stamp and freespace flag
    pub observation: Observation,
    /// Pose used for fusion (after refinement)
    pub pose: Transform,
}

impl WindowPacket {
    /// Acquisition time.
    pub fn timestamp(&self) -> Timestamp {
        self.observation.timestamp
    }
}

/// Eviction bounds. Each is independent and optional.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeintegrationThresholds {
    /// Maximum number of packets
    pub max_queue_length: Threshold<usize>,
    /// Maximum seconds between oldest and newest packet
    pub max_time_interval: Threshold<f64>,
    /// Maximum meters between oldest and newest sensor position
    pub max_distance_travelled: Threshold<f32>,
}

impl DeintegrationThresholds {
    /// Validate raw configuration. Non-positive values are logged and left unset.
    pub fn from_config(config: &DeintegrationConfig) -> Self {
        let queue_length = Threshold::from_validated(
            "deintegration.max_queue_length",
            config.max_queue_length,
            |v| v > 0,
            "positive",
        );
        Self {
            max_queue_length: match queue_length.get() {
                Some(v) => Threshold::new(v as usize),
                None => Threshold::unset(),
            },
            max_time_interval: Threshold::from_validated(
                "deintegration.max_time_interval",
                config.max_time_interval,
                |v| v > 0.0,
                "positive",
            ),
            max_distance_travelled: Threshold::from_validated(
                "deintegration.max_distance_travelled",
                config.max_distance_travelled,
                |v| v > 0.0,
                "positive",
            ),
        }
    }

    /// True if any bound is set.
    pub fn any_set(&self) -> bool {
        self.max_queue_length.is_set()
            || self.max_time_interval.is_set()
            || self.max_distance_travelled.is_set()
    }

    /// Unset every bound.
    pub fn clear(&mut self) {
        self.max_queue_length.clear();
        self.max_time_interval.clear();
        self.max_distance_travelled.clear();
    }
}

/// Ordered record of the clouds currently fused into the map.
#[derive(Debug, Default)]
pub struct DeintegrationWindow {
    thresholds: DeintegrationThresholds,
    packets: VecDeque<WindowPacket>,
}

impl DeintegrationWindow {
    /// Create an empty window.
    pub fn new(thresholds: DeintegrationThresholds) -> Self {
        Self {
            thresholds,
            packets: VecDeque::new(),
        }
    }

    /// Active thresholds.
    pub fn thresholds(&self) -> &DeintegrationThresholds {
        &self.thresholds
    }

    /// Whether servicing can ever evict anything.
    pub fn deintegration_enabled(&self) -> bool {
        self.thresholds.any_set()
    }

    /// Turn off eviction (the engine cannot deintegrate).
    pub fn disable_deintegration(&mut self) {
        self.thresholds.clear();
    }

    /// Record a fused cloud.
    ///
    /// Packets stay sorted by timestamp. A packet older than the current back
    /// is inserted at its sorted position so eviction still removes the
    /// oldest contribution first.
    pub fn append(&mut self, observation: Observation, pose: Transform) {
        let packet = WindowPacket { observation, pose };
        match self.packets.back() {
            Some(back) if packet.timestamp() < back.timestamp() => {
                log::warn!(
                    "Fused cloud at {} is older than the newest window entry at {}, inserting in order",
                    packet.timestamp(),
                    back.timestamp()
                );
                let at = self.packets.partition_point(|p| p.timestamp() <= packet.timestamp());
                self.packets.insert(at, packet);
            }
            _ => self.packets.push_back(packet),
        }
    }

    /// True if the front packet should be evicted.
    fn should_evict(&self) -> bool {
        let (Some(front), Some(back)) = (self.packets.front(), self.packets.back()) else {
            return false;
        };
        let queue_length_exceeded = self.thresholds.max_queue_length.is_set_and_less_than(self.packets.len());
        let time_exceeded = self
            .thresholds
            .max_time_interval
            .is_set_and_less_than(back.timestamp().seconds_since(front.timestamp()));
        let distance_exceeded = self
            .thresholds
            .max_distance_travelled
            .is_set_and_less_than((back.pose.position() - front.pose.position()).norm());
        queue_length_exceeded || time_exceeded || distance_exceeded
    }

    /// Deintegrate packets from the front while any threshold is exceeded.
    ///
    /// Never evicts the last packet. Returns the number of evicted packets,
    /// a non-zero count means the map needs pruning.
    pub fn service(&mut self, engine: &mut dyn FusionEngine, layer: &mut TsdfLayer, verbose: bool) -> usize {
        let mut evicted = 0;
        while self.packets.len() > 1 && self.should_evict() {
            let Some(oldest) = self.packets.pop_front() else {
                break;
            };
            if verbose {
                log::info!("Deintegrating a pointcloud with {} points.", oldest.observation.len());
            }
            engine.integrate(
                layer,
                &oldest.pose,
                &oldest.observation.points,
                &oldest.observation.colors,
                oldest.observation.is_freespace,
                true,
            );
            evicted += 1;
        }
        evicted
    }

    /// Drop every packet without touching the map.
    pub fn clear(&mut self) {
        self.packets.clear();
    }

    /// Number of packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Packets from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &WindowPacket> {
        self.packets.iter()
    }

    /// Oldest packet.
    pub fn front(&self) -> Option<&WindowPacket> {
        self.packets.front()
    }

    /// Newest packet.
    pub fn back(&self) -> Option<&WindowPacket> {
        self.packets.back()
    }
}
