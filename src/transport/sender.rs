//! Sender task: drains the outbound queue onto the UDP socket

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use super::queue::OutboundQueue;
use crate::framing::{HEADER_LEN, MAX_DATAGRAM_PAYLOAD, PacketHeader};

/// Counters published by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    /// Datagrams handed to the OS successfully
    pub packets_sent: u64,
    /// Bytes handed to the OS successfully, headers included
    pub bytes_sent: u64,
    /// Sends the OS rejected
    pub send_errors: u64,
    /// Packets evicted from a capped queue
    pub packets_dropped: u64,
}

/// Sender loop timing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SenderTiming {
    pub idle_sleep: Duration,
    pub send_backoff: Duration,
}

/// Sender loop state; owns the socket for its whole lifetime.
pub(crate) struct SenderLoop {
    pub socket: UdpSocket,
    pub destination: SocketAddr,
    pub queue: Arc<OutboundQueue>,
    pub stats: Arc<watch::Sender<TransportStats>>,
    pub timing: SenderTiming,
    pub cancel: CancellationToken,
}

impl SenderLoop {
    /// Pop and send until cancelled.
    ///
    /// A send failure never ends the loop: the packet is dropped, the error is
    /// logged and the loop pauses for `send_backoff`. An in-flight send always
    /// completes before cancellation is observed.
    pub async fn run(self) {
        info!(destination = %self.destination, "Sender loop started");
        let mut sent = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let packet = match self.queue.pop() {
                Some(packet) => packet,
                None => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.timing.idle_sleep) => {}
                    }
                    continue;
                }
            };

            if packet.len() > MAX_DATAGRAM_PAYLOAD + HEADER_LEN {
                warn!(len = packet.len(), "Packet exceeds one UDP datagram, send will likely fail");
            }

            match self.socket.send_to(&packet, self.destination).await {
                Ok(bytes) => {
                    sent += 1;
                    self.stats.send_modify(|stats| {
                        stats.packets_sent += 1;
                        stats.bytes_sent += bytes as u64;
                    });
                    if let Ok(header) = PacketHeader::decode(&packet) {
                        trace!(
                            stream = %header.stream_type,
                            timestamp_millis = header.timestamp_millis,
                            bytes,
                            "Sent packet"
                        );
                    }
                }
                Err(e) => {
                    self.stats.send_modify(|stats| stats.send_errors += 1);
                    warn!(
                        "Send to {} failed: {}; backing off for {:?}",
                        self.destination, e, self.timing.send_backoff
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.timing.send_backoff) => {}
                    }
                }
            }
        }

        info!("Sender loop stopped after {} packets", sent);
    }
}
