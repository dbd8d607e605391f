//! Real-time AR sensor streaming over UDP.
//!
//! Sensorcast captures pose, depth, camera frames, point clouds and metadata
//! from an AR tracking source at a fixed cadence, reduces and compresses them,
//! frames each payload into a small multiplexed packet and sends it as one UDP
//! datagram to a remote consumer.
//!
//! # Features
//!
//! - **Depth reduction**: hole-aware block averaging and bounded point clouds
//! - **Multiplexed framing**: 16-byte big-endian header per datagram
//! - **Non-blocking transport**: capture never waits on the network
//! - **Partial data**: any field may be absent on a tick without failing it
//!
//! # Pipeline
//!
//! ```text
//! ObservationSource ─► CaptureLoop ─► FrameSerializer ─► Transport ─► UDP
//!                        │                                  ▲
//!                        └──── DepthReducer ────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use sensorcast::{ObservationSource, Sensorcast, StreamerConfig};
//! # use sensorcast::types::{DepthMap, Plane, Pose, RawImage, TrackingState};
//! # struct ArSession;
//! # impl ObservationSource for ArSession {
//! #     fn current_pose(&self) -> Option<Pose> { None }
//! #     fn current_tracking_state(&self) -> Option<TrackingState> { None }
//! #     fn current_planes(&self) -> Option<Vec<Plane>> { None }
//! #     fn acquire_depth_map(&mut self) -> sensorcast::Result<Option<DepthMap>> { Ok(None) }
//! #     fn acquire_camera_image(&mut self) -> sensorcast::Result<Option<RawImage>> { Ok(None) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> sensorcast::Result<()> {
//!     let config = StreamerConfig::from_path("sensorcast.yaml")?;
//!     let session = Sensorcast::start(ArSession, config).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     println!("{:?}", session.stats());
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod depth;
mod error;
pub mod framing;
pub mod serializer;
mod session;
pub mod source;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod transport;
pub mod types;

pub use capture::{CaptureHandle, CaptureLoop, TickReport};
pub use config::{Destination, PointCloudConfig, PointCloudMode, StreamerConfig};
pub use depth::{DepthReducer, ReducedDepth};
pub use error::*;
pub use framing::{Packet, PacketHeader, frame};
pub use serializer::{FrameSerializer, PoseRecord};
pub use session::StreamSession;
pub use source::ObservationSource;
pub use transport::{TickPayloads, Transport, TransportState, TransportStats};
pub use types::*;

/// Entry point for streaming sessions.
pub struct Sensorcast;

impl Sensorcast {
    /// Start streaming from `source` as described by `config`.
    ///
    /// Opens the transport to `config.destination` and spawns the capture
    /// loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - The destination is not a valid IPv4 address and port
    /// - The UDP socket cannot be opened
    pub async fn start<S>(source: S, config: StreamerConfig) -> Result<StreamSession>
    where
        S: ObservationSource,
    {
        StreamSession::start(source, config).await
    }
}
