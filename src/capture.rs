//! Capture loop: the producer side of the pipeline.
//!
//! Each tick pulls one [`Observation`] from the source, reduces depth,
//! serializes every available field and hands the payloads to the
//! [`Transport`] as one batch. The loop runs at a fixed delay between ticks;
//! a failed tick is logged and followed by a longer backoff, and never ends
//! the loop.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::Result;
use crate::config::{PointCloudMode, StreamerConfig};
use crate::depth::{DepthReducer, dense_points, sparse_points};
use crate::serializer::FrameSerializer;
use crate::source::ObservationSource;
use crate::transport::{TickPayloads, Transport};
use crate::types::{DepthInfo, Observation, PointSample, StreamType, now_millis};

/// What one tick produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub timestamp_millis: i64,
    /// Streams handed to the transport, in queue order
    pub streams: Vec<StreamType>,
    pub plane_count: usize,
    /// Points placed on the POINT_CLOUD stream
    pub point_count: usize,
    /// Whether a camera image was acquired, regardless of whether it encoded
    pub image_acquired: bool,
}

impl TickReport {
    pub fn contains(&self, stream_type: StreamType) -> bool {
        self.streams.contains(&stream_type)
    }
}

/// Handle to a spawned capture loop.
pub struct CaptureHandle {
    cancel: CancellationToken,
    join: JoinHandle<u64>,
}

impl CaptureHandle {
    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request a stop and wait for the current tick to finish.
    ///
    /// Returns the number of completed ticks.
    pub async fn stop(self) -> u64 {
        self.cancel.cancel();
        match self.join.await {
            Ok(ticks) => ticks,
            Err(e) => {
                warn!("Capture task ended abnormally: {}", e);
                0
            }
        }
    }
}

/// Producer loop bound to one source and one transport.
pub struct CaptureLoop<S> {
    source: S,
    transport: Transport,
    reducer: DepthReducer,
    serializer: FrameSerializer,
    point_mode: PointCloudMode,
    max_points: usize,
    tick_interval: Duration,
    error_backoff: Duration,
    last_depth_info: DepthInfo,
}

impl<S> CaptureLoop<S>
where
    S: ObservationSource,
{
    /// Build a loop from validated configuration.
    pub fn new(source: S, config: &StreamerConfig, transport: Transport) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            transport,
            reducer: DepthReducer::new(config.downsample_factor)?,
            serializer: FrameSerializer::new(config.device_tag.clone()),
            point_mode: config.point_cloud.mode,
            max_points: config.point_cloud.max_points,
            tick_interval: config.tick_interval(),
            error_backoff: config.error_backoff(),
            last_depth_info: DepthInfo::new(),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Metadata describing the most recent reduced depth map.
    pub fn last_depth_info(&self) -> &DepthInfo {
        &self.last_depth_info
    }

    /// Run a single tick.
    ///
    /// An acquired camera image is released back to the source on every
    /// path out of this method.
    pub async fn tick(&mut self) -> Result<TickReport> {
        self.source.next_frame().await?;
        let mut observation = self.observe()?;

        let result = self.process(&observation);

        if let Some(image) = observation.image.take() {
            self.source.release_image(image);
        }
        result
    }

    fn observe(&mut self) -> Result<Observation> {
        let mut observation = Observation::at(now_millis());
        observation.pose = self.source.current_pose();
        observation.tracking_state = self.source.current_tracking_state();
        observation.planes = self.source.current_planes();
        observation.point_cloud = self.source.current_point_cloud();
        observation.depth = self.source.acquire_depth_map()?;
        observation.image = self.source.acquire_camera_image()?;
        Ok(observation)
    }

    fn process(&mut self, observation: &Observation) -> Result<TickReport> {
        let timestamp = observation.timestamp_millis;
        let mut payloads = TickPayloads::at(timestamp);
        let mut points: Vec<PointSample> = Vec::new();

        if let Some(depth) = &observation.depth {
            let reduced = self.reducer.process(depth, timestamp)?;
            payloads.depth = Some(self.serializer.encode_depth(reduced.map.map())?);
            if self.point_mode == PointCloudMode::Dense {
                points = dense_points(reduced.map.map(), self.max_points);
            }
            self.last_depth_info = reduced.info;
        }

        if self.point_mode == PointCloudMode::Sparse {
            if let Some(cloud) = &observation.point_cloud {
                points = sparse_points(cloud, self.max_points);
            }
        }
        if !points.is_empty() {
            payloads.point_cloud = Some(self.serializer.encode_points(&points));
        }

        if let Some(image) = &observation.image {
            payloads.camera = self.serializer.encode_image(image);
        }

        let pose = observation.pose.as_ref();
        payloads.pose = Some(self.serializer.encode_pose(pose, timestamp));

        let planes = observation.planes.as_deref().unwrap_or_default();
        payloads.metadata = self.serializer.encode_metadata(
            pose,
            &self.last_depth_info,
            observation.tracking_state,
            planes,
            timestamp,
        );

        let streams = payloads.streams().into_iter().map(|(stream, _)| stream).collect();
        self.transport.enqueue_tick(&payloads);

        Ok(TickReport {
            timestamp_millis: timestamp,
            streams,
            plane_count: observation.plane_count(),
            point_count: points.len(),
            image_acquired: observation.image.is_some(),
        })
    }

    /// Tick until `cancel` fires. Returns the number of completed ticks.
    ///
    /// Cancellation is observed between ticks and during the sleeps, never in
    /// the middle of a tick.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        info!(
            interval = ?self.tick_interval,
            point_mode = ?self.point_mode,
            "Capture loop started"
        );
        let mut ticks = 0u64;
        let mut errors = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let pause = match self.tick().await {
                Ok(report) => {
                    ticks += 1;
                    trace!(tick = ticks, streams = ?report.streams, "Tick complete");
                    self.tick_interval
                }
                Err(e) => {
                    errors += 1;
                    error!("Capture tick failed ({} so far): {}", errors, e);
                    for suggestion in e.recovery_suggestions() {
                        debug!("  {}", suggestion);
                    }
                    self.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Capture loop stopped after {} ticks ({} failed)", ticks, errors);
        ticks
    }

    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(self) -> CaptureHandle {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(cancel.clone()));
        CaptureHandle { cancel, join }
    }
}
