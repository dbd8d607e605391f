//! Stream type tags shared by every packet on the wire

use serde::{Deserialize, Serialize};

/// Tag distinguishing the streams multiplexed over one transport.
///
/// The discriminant is the value written into the first four bytes of every
/// packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum StreamType {
    /// Compressed camera frame
    Camera = 1,
    /// Downsampled depth map
    Depth = 2,
    /// Camera pose record
    Pose = 3,
    /// Sparse or dense point samples
    PointCloud = 4,
    /// Per-tick metadata record, also the heartbeat
    Metadata = 5,
}

impl StreamType {
    /// All stream types in wire-code order.
    pub const ALL: [StreamType; 5] = [
        StreamType::Camera,
        StreamType::Depth,
        StreamType::Pose,
        StreamType::PointCloud,
        StreamType::Metadata,
    ];

    /// Wire code for this stream type.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up a stream type by its wire code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|stream| stream.code() == code)
    }

    /// Whether packets of this type are queued even when the payload is empty.
    pub const fn is_heartbeat(self) -> bool {
        matches!(self, StreamType::Metadata)
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamType::Camera => "CAMERA",
            StreamType::Depth => "DEPTH",
            StreamType::Pose => "POSE",
            StreamType::PointCloud => "POINT_CLOUD",
            StreamType::Metadata => "METADATA",
        };
        f.write_str(name)
    }
}
