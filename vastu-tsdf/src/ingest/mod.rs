//! Message ingestion: conversion, pose resolution and rate-gated queuing.

mod colormap;
mod message;
mod queue;
mod resolver;

pub use colormap::{
    ColorMap, GrayscaleColorMap, InverseGrayscaleColorMap, InverseRainbowColorMap, IronbowColorMap,
    RainbowColorMap, colormap_from_name, rainbow,
};
pub use message::{PointPayload, PointcloudMessage};
pub use queue::{IngestQueue, MAX_QUEUE_SIZE, Stamped};
pub use resolver::{PoseResolver, TransformBuffer};
