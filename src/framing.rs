//! Packet framing for the multiplexed wire protocol.
//!
//! Every datagram carries exactly one packet: a fixed 16-byte big-endian
//! header followed by the payload verbatim.
//!
//! ```text
//! ┌───────────────────┬──────────────────────┬───────────────────┬─────────┐
//! │ stream_type (i32) │ timestamp_ms (i64)   │ length (i32)      │ payload │
//! │ bytes 0..4        │ bytes 4..12          │ bytes 12..16      │ length  │
//! └───────────────────┴──────────────────────┴───────────────────┴─────────┘
//! ```
//!
//! Packets are independent: a receiver must tolerate loss and any interleaving
//! of stream types. Compression and serialization happen upstream; framing
//! never transforms the payload.

use tracing::trace;

use crate::types::StreamType;
use crate::{Result, StreamError};

/// Size of the packet header in bytes.
pub const HEADER_LEN: usize = 16;

/// Largest payload that fits a single IPv4 UDP datagram after the header.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507 - HEADER_LEN;

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub stream_type: StreamType,
    pub timestamp_millis: i64,
    pub payload_len: i32,
}

impl PacketHeader {
    /// Encode the header as 16 big-endian bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.stream_type.code().to_be_bytes());
        out[4..12].copy_from_slice(&self.timestamp_millis.to_be_bytes());
        out[12..16].copy_from_slice(&self.payload_len.to_be_bytes());
        out
    }

    /// Decode a header from the first 16 bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(StreamError::decode(
                "packet header",
                format!("need {} bytes, got {}", HEADER_LEN, bytes.len()),
            ));
        }

        let code = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let stream_type = StreamType::from_code(code).ok_or_else(|| {
            StreamError::decode("packet header", format!("unknown stream type {code}"))
        })?;

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[4..12]);
        let timestamp_millis = i64::from_be_bytes(ts);

        let payload_len = i32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        if payload_len < 0 {
            return Err(StreamError::decode(
                "packet header",
                format!("negative payload length {payload_len}"),
            ));
        }

        Ok(Self { stream_type, timestamp_millis, payload_len })
    }
}

/// Frame `payload` as a `stream_type` packet stamped at `timestamp_millis`.
///
/// Fails only when the payload length does not fit the 32-bit length field.
pub fn frame(stream_type: StreamType, timestamp_millis: i64, payload: &[u8]) -> Result<Vec<u8>> {
    let payload_len =
        i32::try_from(payload.len()).map_err(|_| StreamError::PayloadTooLarge { len: payload.len() })?;

    let header = PacketHeader { stream_type, timestamp_millis, payload_len };
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&header.encode());
    packet.extend_from_slice(payload);

    trace!(%stream_type, timestamp_millis, payload_len, "Framed packet");
    Ok(packet)
}

/// A decoded packet, as seen by a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Decode one datagram into a packet.
    ///
    /// The datagram must hold exactly the header plus `payload_len` bytes.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        let header = PacketHeader::decode(datagram)?;
        let body = &datagram[HEADER_LEN..];
        if body.len() != header.payload_len as usize {
            return Err(StreamError::decode(
                "packet payload",
                format!("header declares {} bytes, datagram carries {}", header.payload_len, body.len()),
            ));
        }
        Ok(Self { header, payload: body.to_vec() })
    }

    pub fn stream_type(&self) -> StreamType {
        self.header.stream_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_stream_type() -> impl Strategy<Value = StreamType> {
        prop::sample::select(StreamType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_frame_length_and_header(
            stream_type in arb_stream_type(),
            timestamp in any::<i64>(),
            payload in prop::collection::vec(any::<u8>(), 0..2048)
        ) {
            let packet = frame(stream_type, timestamp, &payload).unwrap();
            prop_assert_eq!(packet.len(), HEADER_LEN + payload.len());

            let header = PacketHeader::decode(&packet).unwrap();
            prop_assert_eq!(header.stream_type, stream_type);
            prop_assert_eq!(header.timestamp_millis, timestamp);
            prop_assert_eq!(header.payload_len as usize, payload.len());
            prop_assert_eq!(&packet[HEADER_LEN..], &payload[..]);
        }

        #[test]
        fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let _ = Packet::decode(&bytes);
        }
    }

    #[test]
    fn header_is_big_endian() {
        let packet = frame(StreamType::Pose, 0x0102_0304_0506_0708, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            &packet[..HEADER_LEN],
            &[0, 0, 0, 3, 1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 2]
        );
        assert_eq!(&packet[HEADER_LEN..], &[0xAA, 0xBB]);
    }

    #[test]
    fn empty_payload_frames_to_bare_header() {
        let packet = frame(StreamType::Metadata, 7, &[]).unwrap();
        assert_eq!(packet.len(), HEADER_LEN);

        let decoded = Packet::decode(&packet).unwrap();
        assert_eq!(decoded.stream_type(), StreamType::Metadata);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn decode_rejects_malformed_packets() {
        assert!(PacketHeader::decode(&[0; 15]).is_err());

        let mut unknown = frame(StreamType::Camera, 1, &[1]).unwrap();
        unknown[3] = 9;
        assert!(matches!(Packet::decode(&unknown), Err(StreamError::Decode { .. })));

        let truncated = frame(StreamType::Depth, 1, &[1, 2, 3]).unwrap();
        assert!(Packet::decode(&truncated[..HEADER_LEN + 2]).is_err());

        let mut negative = frame(StreamType::Depth, 1, &[]).unwrap();
        negative[12] = 0x80;
        assert!(Packet::decode(&negative).is_err());
    }
}
