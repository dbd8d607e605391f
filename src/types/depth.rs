//! Depth map and point sample types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Result, StreamError};

/// Format tag reported for 16-bit millimetre depth maps.
pub const DEPTH16_FORMAT: &str = "DEPTH16";

/// Dense depth map for one tick.
///
/// Samples are millimetres, row-major; 0 means "no depth return". The sample
/// buffer is shared through an `Arc` so the map can be handed between stages
/// without copying. A map is never mutated after construction: the next tick
/// supersedes it.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: usize,
    height: usize,
    samples: Arc<[u16]>,
    confidence: Option<Arc<[u8]>>,
}

impl DepthMap {
    /// Create a depth map, checking that the buffer matches the dimensions.
    pub fn new(width: usize, height: usize, samples: Vec<u16>) -> Result<Self> {
        let expected = width.checked_mul(height).ok_or_else(|| {
            StreamError::invalid_argument("dimensions", format!("{width}x{height} overflows"))
        })?;
        if samples.len() != expected {
            return Err(StreamError::invalid_argument(
                "samples",
                format!("expected {} samples for {}x{}, got {}", expected, width, height, samples.len()),
            ));
        }
        Ok(Self { width, height, samples: samples.into(), confidence: None })
    }

    /// Attach a confidence grid of the same dimensions.
    pub fn with_confidence(mut self, confidence: Vec<u8>) -> Result<Self> {
        if confidence.len() != self.samples.len() {
            return Err(StreamError::invalid_argument(
                "confidence",
                format!(
                    "confidence grid has {} entries, depth map has {}",
                    confidence.len(),
                    self.samples.len()
                ),
            ));
        }
        self.confidence = Some(confidence.into());
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major depth samples in millimetres.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Row-major confidence values, if the source provided them.
    pub fn confidence(&self) -> Option<&[u8]> {
        self.confidence.as_deref()
    }

    /// Raw sample at `(x, y)`, or `None` outside the map.
    pub fn get(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get(y * self.width + x).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Depth map produced by block-averaging a source map.
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampledDepthMap {
    pub(crate) map: DepthMap,
    pub(crate) source_width: usize,
    pub(crate) source_height: usize,
    pub(crate) factor: usize,
}

impl DownsampledDepthMap {
    /// The reduced grid.
    pub fn map(&self) -> &DepthMap {
        &self.map
    }

    pub fn width(&self) -> usize {
        self.map.width
    }

    pub fn height(&self) -> usize {
        self.map.height
    }

    /// Width of the map this one was reduced from.
    pub fn source_width(&self) -> usize {
        self.source_width
    }

    /// Height of the map this one was reduced from.
    pub fn source_height(&self) -> usize {
        self.source_height
    }

    /// Reduction factor along each axis.
    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn into_map(self) -> DepthMap {
        self.map
    }
}

/// Key/value description of the latest depth reduction, embedded in metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepthInfo(BTreeMap<String, serde_json::Value>);

impl DepthInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a reduction performed at `timestamp_millis`.
    pub fn describe(reduced: &DownsampledDepthMap, timestamp_millis: i64) -> Self {
        let mut info = Self::new();
        info.insert("originalWidth", reduced.source_width);
        info.insert("originalHeight", reduced.source_height);
        info.insert("width", reduced.width());
        info.insert("height", reduced.height());
        info.insert("downsampleFactor", reduced.factor);
        info.insert("format", DEPTH16_FORMAT);
        info.insert("timestamp", timestamp_millis);
        info
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A 3-D point in camera space with a normalized confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub confidence: f32,
}

impl PointSample {
    pub const fn new(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self { x, y, z, confidence }
    }
}

impl From<[f32; 4]> for PointSample {
    fn from([x, y, z, confidence]: [f32; 4]) -> Self {
        Self { x, y, z, confidence }
    }
}
