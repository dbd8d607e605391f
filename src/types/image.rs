//! Raw camera image buffers handed over by the camera collaborator

/// Pixel layout of a raw camera image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Planar luma followed by two chroma planes at quarter resolution
    Yuv420Planar,
    /// Semi-planar luma plus interleaved chroma
    Nv21,
    /// Already-compressed JPEG bytes in the first plane
    Jpeg,
    /// Platform format code with no known mapping
    Other(u32),
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Yuv420Planar => f.write_str("YUV_420_888"),
            ImageFormat::Nv21 => f.write_str("NV21"),
            ImageFormat::Jpeg => f.write_str("JPEG"),
            ImageFormat::Other(code) => write!(f, "0x{code:x}"),
        }
    }
}

/// Raw camera image for one tick.
///
/// The image is borrowed from the camera collaborator and must be handed back
/// through [`ObservationSource::release_image`](crate::ObservationSource::release_image)
/// once the tick is done with it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Plane buffers in layout order (Y, U, V for planar YUV)
    pub planes: Vec<Vec<u8>>,
}

impl RawImage {
    /// Build a planar YUV 4:2:0 image from its three planes.
    pub fn yuv420(width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Self {
        Self { format: ImageFormat::Yuv420Planar, width, height, planes: vec![y, u, v] }
    }

    /// Total size of all planes in bytes.
    pub fn byte_len(&self) -> usize {
        self.planes.iter().map(Vec::len).sum()
    }
}
