//! Core types shared by every stage of the fusion pipeline.
//!
//! ## Type Categories
//!
//! ### Geometry
//! - [`Point`]: 3D position in meters (`nalgebra::Vector3<f32>`)
//! - [`Transform`]: Rigid body transform `T_G_C` (sensor frame to global frame)
//!
//! ### Sensor data
//! - [`Color`]: RGBA8 color attached to each point
//! - [`Pointcloud`] / [`Colors`]: Owned point and color buffers
//! - [`Observation`]: One point cloud with shared, immutable buffers
//!
//! ### Bookkeeping
//! - [`Timestamp`]: Nanosecond stamp, zero means "never set"
//! - [`Threshold`]: Optional numeric bound that never triggers while unset
//! - [`LogThrottle`] / [`LogOnce`]: Rate limiting for repeated log lines

mod observation;
mod point;
mod threshold;
mod throttle;
mod timestamp;
mod transform;

pub use observation::Observation;
pub use point::{Color, Colors, Point, Pointcloud, SharedColors, SharedPointcloud};
pub use threshold::Threshold;
pub use throttle::{LogOnce, LogThrottle};
pub use timestamp::Timestamp;
pub use transform::Transform;
