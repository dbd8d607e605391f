//! Core types for sensor observations.
//!
//! This module provides the value types that flow through the capture-to-wire
//! pipeline:
//! - [`Observation`] bundles everything captured on one tick
//! - [`DepthMap`] and [`DownsampledDepthMap`] hold 16-bit millimetre depth grids
//! - [`PointSample`] is one 3-D point with a confidence
//! - [`Pose`], [`Plane`] and [`TrackingState`] mirror the AR tracking output
//! - [`RawImage`] carries a camera frame until it is released
//! - [`StreamType`] tags packets on the wire
//!
//! ## Usage Example
//!
//! ```rust
//! use sensorcast::types::{DepthMap, Observation, Pose};
//!
//! let depth = DepthMap::new(2, 2, vec![1000, 0, 1200, 1400]).unwrap();
//! assert_eq!(depth.get(1, 0), Some(0));
//!
//! let mut observation = Observation::at(1_700_000_000_000);
//! observation.pose = Some(Pose::identity());
//! observation.depth = Some(depth);
//! assert_eq!(observation.plane_count(), 0);
//! ```

mod depth;
mod image;
mod observation;
mod pose;
mod stream_type;

pub use depth::{DEPTH16_FORMAT, DepthInfo, DepthMap, DownsampledDepthMap, PointSample};
pub use image::{ImageFormat, RawImage};
pub use observation::{MonotonicClock, Observation, now_millis};
pub use pose::{Plane, PlaneType, Pose, TrackingState};
pub use stream_type::StreamType;
