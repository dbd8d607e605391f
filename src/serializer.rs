//! Payload encoders for each stream type.
//!
//! Pose, plane and metadata payloads are JSON objects. Camera and depth
//! payloads are length-prefixed binary buffers compressed with zlib at the
//! fastest level; point clouds are raw big-endian floats.
//!
//! Encoders never fail a tick: a pose that is absent encodes as `{}`, an empty
//! plane list as `[]`, and an image in an unsupported layout is logged and
//! reported as absent.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::types::{
    DepthInfo, DepthMap, ImageFormat, Plane, PlaneType, PointSample, Pose, RawImage, TrackingState,
};
use crate::{Result, StreamError};

/// Device tag written into metadata when none is configured.
pub const DEFAULT_DEVICE_TAG: &str = "sensorcast";

/// Encoding of an absent pose.
const EMPTY_OBJECT: &[u8] = b"{}";

/// Flat pose record as carried on the POSE stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub tx: f32,
    pub ty: f32,
    pub tz: f32,
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub qw: f32,
    pub timestamp: i64,
}

impl PoseRecord {
    pub fn new(pose: &Pose, timestamp: i64) -> Self {
        let [tx, ty, tz] = pose.position;
        let [qx, qy, qz, qw] = pose.rotation;
        Self { tx, ty, tz, qx, qy, qz, qw, timestamp }
    }

    pub fn pose(&self) -> Pose {
        Pose::new([self.tx, self.ty, self.tz], [self.qx, self.qy, self.qz, self.qw])
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaneRecord {
    id: u64,
    #[serde(rename = "type")]
    plane_type: PlaneType,
    tracking_state: &'static str,
    center: [f32; 3],
    extent_x: f32,
    extent_z: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    polygon: Option<Vec<f32>>,
}

impl From<&Plane> for PlaneRecord {
    fn from(plane: &Plane) -> Self {
        Self {
            id: plane.id,
            plane_type: plane.plane_type,
            tracking_state: plane.tracking_state.name(),
            center: plane.center,
            extent_x: plane.extent_x,
            extent_z: plane.extent_z,
            polygon: plane.polygon.as_ref().map(|vertices| vertices.iter().flatten().copied().collect()),
        }
    }
}

#[derive(Serialize)]
struct CameraRecord {
    position: [f32; 3],
    rotation: [f32; 4],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRecord<'a> {
    device: &'a str,
    timestamp: i64,
    tracking_state: &'static str,
    plane_count: usize,
    planes: Vec<PlaneRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera: Option<CameraRecord>,
    depth: &'a DepthInfo,
}

/// Encodes observation fields into stream payloads.
#[derive(Debug, Clone)]
pub struct FrameSerializer {
    device_tag: String,
}

impl Default for FrameSerializer {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_TAG)
    }
}

impl FrameSerializer {
    pub fn new(device_tag: impl Into<String>) -> Self {
        Self { device_tag: device_tag.into() }
    }

    pub fn device_tag(&self) -> &str {
        &self.device_tag
    }

    /// Encode a pose record, or `{}` when the pose is absent.
    pub fn encode_pose(&self, pose: Option<&Pose>, timestamp: i64) -> Vec<u8> {
        match pose {
            Some(pose) => serde_json::to_vec(&PoseRecord::new(pose, timestamp))
                .unwrap_or_else(|_| EMPTY_OBJECT.to_vec()),
            None => EMPTY_OBJECT.to_vec(),
        }
    }

    /// Decode a POSE payload; `{}` decodes to `None`.
    pub fn decode_pose(bytes: &[u8]) -> Result<Option<PoseRecord>> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let is_empty = match value.as_object() {
            Some(fields) => fields.is_empty(),
            None => {
                return Err(StreamError::decode(
                    "pose payload",
                    format!("expected object, got {value}"),
                ));
            }
        };
        if is_empty {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Encode the plane set as a JSON array.
    pub fn encode_planes(&self, planes: &[Plane]) -> Vec<u8> {
        let records: Vec<PlaneRecord> = planes.iter().map(PlaneRecord::from).collect();
        serde_json::to_vec(&records).unwrap_or_else(|_| b"[]".to_vec())
    }

    /// Pack and compress a planar YUV 4:2:0 image.
    ///
    /// The uncompressed buffer is `width, height, y_len, u_len` as big-endian
    /// `u32` followed by the Y, U and V planes. Any other layout is logged
    /// and reported as `None`.
    pub fn encode_image(&self, image: &RawImage) -> Option<Vec<u8>> {
        let packed = pack_image(image).and_then(|buffer| {
            let compressed = compress(&buffer)?;
            trace!(raw = buffer.len(), compressed = compressed.len(), "Compressed camera image");
            Ok(compressed)
        });

        match packed {
            Ok(compressed) => Some(compressed),
            Err(e @ StreamError::UnsupportedFormat { .. }) => {
                warn!(planes = image.planes.len(), "{}, skipping frame", e);
                None
            }
            Err(e) => {
                warn!("Failed to compress camera image: {}", e);
                None
            }
        }
    }

    /// Encode the per-tick metadata record.
    ///
    /// `planeCount` is the length of `planes`; each plane is embedded in the
    /// same record shape that [`encode_planes`](Self::encode_planes) emits.
    pub fn encode_metadata(
        &self,
        pose: Option<&Pose>,
        depth_info: &DepthInfo,
        tracking_state: Option<TrackingState>,
        planes: &[Plane],
        timestamp: i64,
    ) -> Vec<u8> {
        let record = MetadataRecord {
            device: &self.device_tag,
            timestamp,
            tracking_state: tracking_state.map_or("UNKNOWN", TrackingState::name),
            plane_count: planes.len(),
            planes: planes.iter().map(PlaneRecord::from).collect(),
            camera: pose.map(|p| CameraRecord { position: p.position, rotation: p.rotation }),
            depth: depth_info,
        };
        serde_json::to_vec(&record).unwrap_or_else(|_| EMPTY_OBJECT.to_vec())
    }

    /// Pack and compress a depth grid: `width, height` as big-endian `u32`,
    /// then the samples as big-endian `u16`.
    pub fn encode_depth(&self, map: &DepthMap) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(8 + map.samples().len() * 2);
        buffer.extend_from_slice(&(map.width() as u32).to_be_bytes());
        buffer.extend_from_slice(&(map.height() as u32).to_be_bytes());
        for sample in map.samples() {
            buffer.extend_from_slice(&sample.to_be_bytes());
        }
        compress(&buffer)
    }

    /// Encode point samples: `count` as big-endian `u32`, then
    /// `x, y, z, confidence` as big-endian `f32` per point.
    pub fn encode_points(&self, points: &[PointSample]) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(4 + points.len() * 16);
        buffer.extend_from_slice(&(points.len() as u32).to_be_bytes());
        for point in points {
            for value in [point.x, point.y, point.z, point.confidence] {
                buffer.extend_from_slice(&value.to_be_bytes());
            }
        }
        buffer
    }
}

/// Lay out a planar YUV 4:2:0 image ready for compression.
fn pack_image(image: &RawImage) -> Result<Vec<u8>> {
    if image.format != ImageFormat::Yuv420Planar || image.planes.len() != 3 {
        return Err(StreamError::unsupported_format("camera image", image.format.to_string()));
    }

    let (y, u, v) = (&image.planes[0], &image.planes[1], &image.planes[2]);
    let mut buffer = Vec::with_capacity(16 + image.byte_len());
    buffer.extend_from_slice(&image.width.to_be_bytes());
    buffer.extend_from_slice(&image.height.to_be_bytes());
    buffer.extend_from_slice(&(y.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&(u.len() as u32).to_be_bytes());
    buffer.extend_from_slice(y);
    buffer.extend_from_slice(u);
    buffer.extend_from_slice(v);
    Ok(buffer)
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::fast());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}
