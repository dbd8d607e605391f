//! Camera pose and tracking types reported by the AR collaborator

use serde::{Deserialize, Serialize};

/// 6-DoF camera pose: translation in metres plus a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation `[tx, ty, tz]`
    pub position: [f32; 3],
    /// Rotation `[qx, qy, qz, qw]`, scalar last
    pub rotation: [f32; 4],
}

impl Pose {
    /// Create a pose from a translation and a scalar-last quaternion.
    pub const fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    /// Pose at the origin with no rotation.
    pub const fn identity() -> Self {
        Self { position: [0.0; 3], rotation: [0.0, 0.0, 0.0, 1.0] }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tracking quality reported for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingState {
    Tracking,
    Paused,
    Stopped,
}

impl TrackingState {
    /// Name used in the metadata and plane records.
    pub const fn name(self) -> &'static str {
        match self {
            TrackingState::Tracking => "TRACKING",
            TrackingState::Paused => "PAUSED",
            TrackingState::Stopped => "STOPPED",
        }
    }
}

/// Orientation class of a detected plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaneType {
    HorizontalUpwardFacing,
    HorizontalDownwardFacing,
    Vertical,
}

/// A plane detected by the tracking subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Identifier that stays stable for the lifetime of the plane
    pub id: u64,
    pub plane_type: PlaneType,
    pub tracking_state: TrackingState,
    /// Centre of the plane in world space
    pub center: [f32; 3],
    /// Extent along the plane's local X axis, in metres
    pub extent_x: f32,
    /// Extent along the plane's local Z axis, in metres
    pub extent_z: f32,
    /// Boundary polygon as `(x, z)` pairs in plane space
    pub polygon: Option<Vec<[f32; 2]>>,
}
