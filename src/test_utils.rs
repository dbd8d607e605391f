//! Test utilities: a scripted observation source and sensor fixtures
//!
//! Shared by unit tests, integration tests and benchmarks. Fixtures are
//! generated in memory so no data files are needed.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::source::ObservationSource;
use crate::types::{DepthMap, Plane, PlaneType, Pose, RawImage, TrackingState};
use crate::{Result, StreamError};

/// Depth map with every sample nonzero, varying smoothly across the grid.
///
/// Values stay in the 500..=4000 millimetre range typical of indoor scenes.
pub fn depth_map_fixture(width: usize, height: usize) -> DepthMap {
    let samples = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            500 + ((x * 7 + y * 13) % 3500) as u16
        })
        .collect();
    DepthMap::new(width, height, samples).expect("fixture length matches dimensions")
}

/// Depth map where every third sample is a hole (zero).
pub fn sparse_depth_map_fixture(width: usize, height: usize) -> DepthMap {
    let samples = (0..width * height)
        .map(|i| if i % 3 == 0 { 0 } else { 1000 + (i % 1000) as u16 })
        .collect();
    DepthMap::new(width, height, samples).expect("fixture length matches dimensions")
}

/// Planar YUV 4:2:0 image with a gradient luma plane.
pub fn yuv_image_fixture(width: u32, height: u32) -> RawImage {
    let luma = (width * height) as usize;
    let chroma = luma / 4;
    let y = (0..luma).map(|i| (i % 256) as u8).collect();
    RawImage::yuv420(width, height, y, vec![128; chroma], vec![128; chroma])
}

/// One horizontal plane with a square boundary.
pub fn floor_plane_fixture(id: u64) -> Plane {
    Plane {
        id,
        plane_type: PlaneType::HorizontalUpwardFacing,
        tracking_state: TrackingState::Tracking,
        center: [0.0, -1.2, -2.0],
        extent_x: 2.0,
        extent_z: 2.0,
        polygon: Some(vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]]),
    }
}

/// Observation source that replays the same fields on every tick.
///
/// Builder methods set what the source reports; absent fields stay absent.
/// Images are cloned per tick and every release is counted, so tests can
/// check that each acquired image was handed back.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    pose: Option<Pose>,
    tracking_state: Option<TrackingState>,
    planes: Option<Vec<Plane>>,
    point_cloud: Option<Vec<[f32; 4]>>,
    depth: Option<DepthMap>,
    image: Option<RawImage>,
    failing_frames: usize,
    frames: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Source reporting an identity pose and nothing else.
    pub fn new() -> Self {
        Self { pose: Some(Pose::identity()), ..Self::default() }
    }

    pub fn with_tracking_state(mut self, state: TrackingState) -> Self {
        self.tracking_state = Some(state);
        self
    }

    pub fn with_planes(mut self, planes: Vec<Plane>) -> Self {
        self.planes = Some(planes);
        self
    }

    pub fn with_point_cloud(mut self, cloud: Vec<[f32; 4]>) -> Self {
        self.point_cloud = Some(cloud);
        self
    }

    pub fn with_depth(mut self, depth: DepthMap) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_image(mut self, image: RawImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Make the first `count` calls to `next_frame` fail.
    pub fn failing_frames(mut self, count: usize) -> Self {
        self.failing_frames = count;
        self
    }

    /// Images handed back so far.
    pub fn released_images(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ObservationSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<()> {
        let call = self.frames.fetch_add(1, Ordering::SeqCst);
        if call < self.failing_frames {
            return Err(StreamError::acquisition_failed(format!("scripted failure {}", call + 1)));
        }
        Ok(())
    }

    fn current_pose(&self) -> Option<Pose> {
        self.pose
    }

    fn current_tracking_state(&self) -> Option<TrackingState> {
        self.tracking_state
    }

    fn current_planes(&self) -> Option<Vec<Plane>> {
        self.planes.clone()
    }

    fn current_point_cloud(&self) -> Option<Vec<[f32; 4]>> {
        self.point_cloud.clone()
    }

    fn acquire_depth_map(&mut self) -> Result<Option<DepthMap>> {
        Ok(self.depth.clone())
    }

    fn acquire_camera_image(&mut self) -> Result<Option<RawImage>> {
        Ok(self.image.clone())
    }

    fn release_image(&mut self, image: RawImage) {
        drop(image);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
