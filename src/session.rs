//! Running capture-to-UDP session

use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;
use crate::capture::{CaptureHandle, CaptureLoop};
use crate::config::StreamerConfig;
use crate::source::ObservationSource;
use crate::transport::{Transport, TransportStats};

/// A capture loop feeding a running transport.
///
/// Dropping the session cancels the capture loop; once its in-flight tick
/// finishes, the last transport handle goes away and the sender task is
/// cancelled too. Call [`stop`](StreamSession::stop) to wait for both.
pub struct StreamSession {
    transport: Transport,
    capture: Option<CaptureHandle>,
    cancel: CancellationToken,
}

impl StreamSession {
    /// Start the transport at `config.destination`, then spawn the capture loop.
    pub(crate) async fn start<S>(source: S, config: StreamerConfig) -> Result<Self>
    where
        S: ObservationSource,
    {
        config.validate()?;
        let transport = Transport::from_config(&config);
        let capture = CaptureLoop::new(source, &config, transport.clone())?;

        transport.start_to(&config.destination).await?;
        let capture = capture.spawn();
        info!(destination = %config.destination, "Streaming session started");

        Ok(Self { transport, cancel: capture.cancel_token(), capture: Some(capture) })
    }

    /// Stop capture, letting the current tick finish, then stop the transport.
    ///
    /// Returns the number of completed ticks.
    pub async fn stop(mut self) -> u64 {
        let ticks = match self.capture.take() {
            Some(capture) => capture.stop().await,
            None => 0,
        };
        self.transport.stop().await;
        info!(ticks, "Streaming session stopped");
        ticks
    }

    /// Whether the capture loop is still running.
    pub fn is_running(&self) -> bool {
        self.capture.as_ref().is_some_and(|capture| !capture.is_finished())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    pub fn stats_updates(&self) -> impl Stream<Item = TransportStats> + 'static {
        self.transport.stats_updates()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        debug!("Dropping streaming session");
        self.cancel.cancel();
    }
}
