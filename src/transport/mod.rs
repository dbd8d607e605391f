//! Best-effort UDP transport for framed packets.
//!
//! The transport owns an [`OutboundQueue`] and, while running, a sender task
//! that drains it onto one UDP socket. Producers call
//! [`Transport::enqueue`] or [`Transport::enqueue_tick`]; those calls frame
//! the payloads and return immediately, so a stalled network delays only the
//! sender task and never the producer.
//!
//! # State machine
//!
//! ```text
//! Stopped ──start()──► Starting ──socket bound──► Running
//!    ▲                    │                          │
//!    └──── bind failed ───┘                          │
//!    └──────────────────── stop() ◄──────────────────┘
//! ```
//!
//! `stop()` is accepted in every state. Packets still queued when the
//! transport stops are discarded, not flushed.

mod queue;
mod sender;

pub use queue::OutboundQueue;
pub use sender::TransportStats;

use futures::Stream;
use parking_lot::Mutex;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{Destination, StreamerConfig};
use crate::framing::frame;
use crate::types::{StreamType, now_millis};
use crate::{Result, StreamError};
use sender::{SenderLoop, SenderTiming};

/// Lifecycle state of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    Stopped,
    Starting,
    Running,
}

/// Every payload produced on one capture tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickPayloads {
    /// Timestamp written into every packet header of the batch
    pub timestamp_millis: i64,
    pub camera: Option<Vec<u8>>,
    pub depth: Option<Vec<u8>>,
    pub pose: Option<Vec<u8>>,
    pub point_cloud: Option<Vec<u8>>,
    /// Always sent, even when empty, as the per-tick heartbeat
    pub metadata: Vec<u8>,
}

impl TickPayloads {
    pub fn at(timestamp_millis: i64) -> Self {
        Self { timestamp_millis, ..Self::default() }
    }

    /// Streams that will actually be queued, in queue order.
    pub fn streams(&self) -> Vec<(StreamType, &[u8])> {
        let optional = [
            (StreamType::Camera, &self.camera),
            (StreamType::Depth, &self.depth),
            (StreamType::Pose, &self.pose),
            (StreamType::PointCloud, &self.point_cloud),
        ];
        let mut streams: Vec<(StreamType, &[u8])> = optional
            .into_iter()
            .filter_map(|(stream, payload)| payload.as_deref().map(|bytes| (stream, bytes)))
            .filter(|(_, bytes)| !bytes.is_empty())
            .collect();
        streams.push((StreamType::Metadata, &self.metadata));
        streams
    }
}

struct Control {
    state: TransportState,
    destination: Option<SocketAddr>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    control: Mutex<Control>,
    queue: Arc<OutboundQueue>,
    stats: Arc<watch::Sender<TransportStats>>,
    timing: SenderTiming,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(cancel) = self.control.get_mut().cancel.take() {
            debug!("Dropping transport");
            cancel.cancel();
        }
    }
}

/// Multiplexing UDP transport.
///
/// Cloning yields another handle to the same transport.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::from_config(&StreamerConfig::default())
    }
}

impl Transport {
    /// Create a stopped transport using the queue and timing settings of `config`.
    pub fn from_config(config: &StreamerConfig) -> Self {
        let (stats, _) = watch::channel(TransportStats::default());
        Self {
            inner: Arc::new(Inner {
                control: Mutex::new(Control {
                    state: TransportState::Stopped,
                    destination: None,
                    cancel: None,
                    task: None,
                }),
                queue: Arc::new(OutboundQueue::new(config.queue_capacity)),
                stats: Arc::new(stats),
                timing: SenderTiming {
                    idle_sleep: config.idle_sleep(),
                    send_backoff: config.send_backoff(),
                },
            }),
        }
    }

    /// Start sending to `host:port`.
    ///
    /// A no-op when already running. While another `start` is still binding
    /// its socket this returns a `Transport` error, since that start may yet
    /// fail. On failure the transport is left `Stopped` and the error is
    /// returned; there is no automatic retry.
    pub async fn start(&self, host: &str, port: u32) -> Result<()> {
        let destination = Destination::new(host, port)?;
        self.start_to(&destination).await
    }

    /// Start sending to a validated destination.
    pub async fn start_to(&self, destination: &Destination) -> Result<()> {
        let addr = destination.socket_addr()?;

        {
            let mut control = self.inner.control.lock();
            match control.state {
                TransportState::Running => {
                    debug!("Transport already running");
                    return Ok(());
                }
                TransportState::Starting => {
                    return Err(StreamError::transport_failed("transport is already starting"));
                }
                TransportState::Stopped => control.state = TransportState::Starting,
            }
        }

        info!("Starting transport to {}", addr);
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = match UdpSocket::bind(bind_addr).await {
            Ok(socket) => socket,
            Err(e) => {
                self.inner.control.lock().state = TransportState::Stopped;
                return Err(StreamError::transport_io("failed to open UDP socket", e));
            }
        };

        let mut control = self.inner.control.lock();
        if control.state != TransportState::Starting {
            return Err(StreamError::transport_failed("transport stopped while starting"));
        }

        // Anything left over from a racing enqueue during the last stop is stale.
        self.inner.queue.clear();

        let cancel = CancellationToken::new();
        let sender = SenderLoop {
            socket,
            destination: addr,
            queue: Arc::clone(&self.inner.queue),
            stats: Arc::clone(&self.inner.stats),
            timing: self.inner.timing,
            cancel: cancel.clone(),
        };

        control.task = Some(tokio::spawn(sender.run()));
        control.cancel = Some(cancel);
        control.destination = Some(addr);
        control.state = TransportState::Running;
        info!("Transport running");
        Ok(())
    }

    /// Stop the sender task, close the socket and discard queued packets.
    ///
    /// Safe to call in any state, any number of times.
    pub async fn stop(&self) {
        let (cancel, task, dropped) = {
            let mut control = self.inner.control.lock();
            if control.state == TransportState::Stopped {
                debug!("Transport already stopped");
                return;
            }
            control.state = TransportState::Stopped;
            control.destination = None;
            let dropped = self.inner.queue.clear();
            (control.cancel.take(), control.task.take(), dropped)
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Sender task ended abnormally: {}", e);
            }
        }

        info!(dropped, "Transport stopped");
    }

    /// Frame and queue one payload stamped with the current time.
    ///
    /// Ignored while not running. Empty payloads are skipped except for
    /// metadata, which doubles as the per-tick heartbeat.
    pub fn enqueue(&self, stream_type: StreamType, payload: &[u8]) {
        self.enqueue_framed(now_millis(), [(stream_type, payload)]);
    }

    /// Frame and queue every payload of one tick.
    pub fn enqueue_tick(&self, payloads: &TickPayloads) {
        self.enqueue_framed(payloads.timestamp_millis, payloads.streams());
    }

    fn enqueue_framed<'a, I>(&self, timestamp_millis: i64, streams: I)
    where
        I: IntoIterator<Item = (StreamType, &'a [u8])>,
    {
        let control = self.inner.control.lock();
        if control.state != TransportState::Running {
            trace!("Transport not running, ignoring enqueue");
            return;
        }

        for (stream_type, payload) in streams {
            if payload.is_empty() && !stream_type.is_heartbeat() {
                continue;
            }
            let packet = match frame(stream_type, timestamp_millis, payload) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!(%stream_type, "Dropping unframeable payload: {}", e);
                    continue;
                }
            };
            if self.inner.queue.push(packet).is_some() {
                self.inner.stats.send_modify(|stats| stats.packets_dropped += 1);
            }
        }
    }

    pub fn state(&self) -> TransportState {
        self.inner.control.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == TransportState::Running
    }

    /// Destination of the current running period.
    pub fn destination(&self) -> Option<SocketAddr> {
        self.inner.control.lock().destination
    }

    /// Packets waiting for the sender task.
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// Current counters.
    pub fn stats(&self) -> TransportStats {
        *self.inner.stats.borrow()
    }

    /// Counter updates as a stream, starting with the current value.
    pub fn stats_updates(&self) -> impl Stream<Item = TransportStats> + 'static {
        WatchStream::new(self.inner.stats.subscribe())
    }

    /// Mark the transport running without a sender task, so queued packets
    /// stay observable.
    #[cfg(test)]
    pub(crate) fn force_running_for_tests(&self) {
        self.force_state_for_tests(TransportState::Running);
    }

    #[cfg(test)]
    pub(crate) fn force_state_for_tests(&self, state: TransportState) {
        self.inner.control.lock().state = state;
    }

    #[cfg(test)]
    pub(crate) fn drain_for_tests(&self) -> Vec<Vec<u8>> {
        self.inner.queue.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::Packet;
    use std::time::Duration;

    async fn receiver() -> (UdpSocket, u32) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port() as u32;
        (socket, port)
    }

    async fn recv_packet(socket: &UdpSocket) -> Option<Packet> {
        let mut buf = vec![0u8; 65_536];
        let len = tokio::time::timeout(Duration::from_millis(500), socket.recv(&mut buf))
            .await
            .ok()?
            .ok()?;
        Some(Packet::decode(&buf[..len]).unwrap())
    }

    #[test]
    fn tick_payloads_skip_empty_streams_but_keep_metadata() {
        let mut payloads = TickPayloads::at(10);
        payloads.pose = Some(b"{}".to_vec());
        payloads.depth = Some(Vec::new());

        let streams: Vec<StreamType> = payloads.streams().into_iter().map(|(s, _)| s).collect();
        assert_eq!(streams, vec![StreamType::Pose, StreamType::Metadata]);
    }

    #[tokio::test]
    async fn enqueue_while_stopped_is_ignored() {
        let transport = Transport::default();
        assert_eq!(transport.state(), TransportState::Stopped);

        transport.enqueue(StreamType::Pose, b"{}");
        transport.enqueue_tick(&TickPayloads::at(1));
        assert_eq!(transport.queue_len(), 0);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_twice_is_safe() {
        let transport = Transport::default();
        transport.start("127.0.0.1", 9000).await.unwrap();
        assert!(transport.is_running());
        assert_eq!(transport.destination(), Some("127.0.0.1:9000".parse().unwrap()));

        transport.start("127.0.0.1", 9001).await.unwrap();
        assert_eq!(transport.destination(), Some("127.0.0.1:9000".parse().unwrap()));

        transport.stop().await;
        transport.stop().await;
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.queue_len(), 0);
        assert_eq!(transport.destination(), None);
    }

    #[tokio::test]
    async fn start_while_starting_reports_an_error() {
        let transport = Transport::default();
        transport.force_state_for_tests(TransportState::Starting);

        let result = transport.start("127.0.0.1", 9000).await;
        assert!(matches!(result, Err(StreamError::Transport { .. })));
        assert_eq!(transport.state(), TransportState::Starting);
        assert_eq!(transport.destination(), None);

        transport.stop().await;
        assert_eq!(transport.state(), TransportState::Stopped);
        transport.start("127.0.0.1", 9000).await.unwrap();
        assert!(transport.is_running());
        transport.stop().await;
    }

    #[tokio::test]
    async fn invalid_destination_leaves_transport_stopped() {
        let transport = Transport::default();
        let result = transport.start("not-an-ip", 9000).await;
        assert!(matches!(result, Err(StreamError::Address { .. })));
        assert_eq!(transport.state(), TransportState::Stopped);

        assert!(transport.start("127.0.0.1", 0).await.is_err());
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[tokio::test]
    async fn sends_one_pose_packet_per_enqueue() {
        let (socket, port) = receiver().await;
        let transport = Transport::default();
        transport.start("127.0.0.1", port).await.unwrap();

        transport.enqueue(StreamType::Pose, b"{\"tx\":1.0}");

        let packet = recv_packet(&socket).await.expect("pose packet should arrive");
        assert_eq!(packet.stream_type(), StreamType::Pose);
        assert_eq!(packet.payload, b"{\"tx\":1.0}");
        assert!(recv_packet(&socket).await.is_none());

        transport.stop().await;
        transport.enqueue(StreamType::Pose, b"{}");
        assert_eq!(transport.queue_len(), 0);
        assert!(recv_packet(&socket).await.is_none());

        let stats = transport.stats();
        assert_eq!(stats.packets_sent, 1);
        assert_eq!(stats.bytes_sent, 16 + 10);
        assert_eq!(stats.send_errors, 0);
    }

    #[tokio::test]
    async fn tick_batch_shares_timestamp() {
        let (socket, port) = receiver().await;
        let transport = Transport::default();
        transport.start("127.0.0.1", port).await.unwrap();

        let mut payloads = TickPayloads::at(4242);
        payloads.depth = Some(vec![1, 2, 3]);
        payloads.camera = Some(Vec::new());
        transport.enqueue_tick(&payloads);

        let first = recv_packet(&socket).await.unwrap();
        let second = recv_packet(&socket).await.unwrap();
        assert_eq!(first.stream_type(), StreamType::Depth);
        assert_eq!(second.stream_type(), StreamType::Metadata);
        assert!(second.payload.is_empty());
        assert_eq!(first.header.timestamp_millis, 4242);
        assert_eq!(second.header.timestamp_millis, 4242);
        assert!(recv_packet(&socket).await.is_none());

        transport.stop().await;
    }

    #[tokio::test]
    async fn stop_discards_queued_packets() {
        let config = StreamerConfig { idle_sleep_ms: 1, ..StreamerConfig::default() };
        let transport = Transport::from_config(&config);
        transport.start("127.0.0.1", 9000).await.unwrap();

        for _ in 0..1000 {
            transport.enqueue(StreamType::Metadata, &[]);
        }
        transport.stop().await;
        assert_eq!(transport.queue_len(), 0);
    }

    #[tokio::test]
    async fn capped_queue_counts_drops() {
        let config = StreamerConfig { queue_capacity: Some(1), ..StreamerConfig::default() };
        let transport = Transport::from_config(&config);

        transport.force_running_for_tests();
        transport.enqueue(StreamType::Pose, b"a");
        transport.enqueue(StreamType::Pose, b"b");
        transport.enqueue(StreamType::Pose, b"c");

        assert_eq!(transport.queue_len(), 1);
        assert_eq!(transport.stats().packets_dropped, 2);

        transport.stop().await;
        assert_eq!(transport.queue_len(), 0);
    }
}
