//! Observation source trait for the AR and camera collaborators

use crate::Result;
use crate::types::{DepthMap, Plane, Pose, RawImage, TrackingState};

/// Trait for per-tick sensor collaborators
///
/// A source wraps the AR tracking session and the camera. The capture loop
/// calls [`next_frame`](ObservationSource::next_frame) once per tick and then
/// reads every field it needs; any field may be absent on a given tick and
/// absence is never an error.
///
/// Errors from `next_frame` or the `acquire_*` methods are treated as
/// transient: the capture loop logs them, backs off and carries on.
#[async_trait::async_trait]
pub trait ObservationSource: Send + 'static {
    /// Wait for the next frame from the tracking session.
    ///
    /// May block briefly. Sources that poll rather than wait can rely on the
    /// default, which returns immediately.
    async fn next_frame(&mut self) -> Result<()> {
        Ok(())
    }

    /// Current camera pose, if tracking has one.
    fn current_pose(&self) -> Option<Pose>;

    /// Current tracking state, if known.
    fn current_tracking_state(&self) -> Option<TrackingState>;

    /// Planes detected so far.
    fn current_planes(&self) -> Option<Vec<Plane>>;

    /// Point cloud as `[x, y, z, confidence]` tuples, for sparse sampling.
    fn current_point_cloud(&self) -> Option<Vec<[f32; 4]>> {
        None
    }

    /// Depth map for this frame.
    ///
    /// Returns:
    /// - `Ok(Some(map))` - Depth available
    /// - `Ok(None)` - No depth this frame (normal)
    /// - `Err(e)` - Acquisition failed
    fn acquire_depth_map(&mut self) -> Result<Option<DepthMap>>;

    /// Camera image for this frame. The caller hands it back through
    /// [`release_image`](ObservationSource::release_image) once done.
    fn acquire_camera_image(&mut self) -> Result<Option<RawImage>>;

    /// Return a camera image acquired on this tick.
    ///
    /// Called exactly once per acquired image, whether or not it was
    /// serialized successfully.
    fn release_image(&mut self, image: RawImage) {
        drop(image);
    }
}
