//! Per-tick observation bundle

use std::sync::OnceLock;

use super::{DepthMap, Plane, Pose, RawImage, TrackingState};

/// Everything the collaborators produced for one capture tick.
///
/// Built once at the start of a tick and moved down the pipeline; every field
/// may be absent and absence is never an error.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp_millis: i64,
    pub pose: Option<Pose>,
    pub tracking_state: Option<TrackingState>,
    pub planes: Option<Vec<Plane>>,
    pub depth: Option<DepthMap>,
    pub image: Option<RawImage>,
    /// Externally supplied point cloud as `[x, y, z, confidence]` tuples
    pub point_cloud: Option<Vec<[f32; 4]>>,
}

impl Observation {
    /// Empty observation stamped at `timestamp_millis`.
    pub fn at(timestamp_millis: i64) -> Self {
        Self { timestamp_millis, ..Self::default() }
    }

    /// Number of planes, treating an absent list as empty.
    pub fn plane_count(&self) -> usize {
        self.planes.as_ref().map_or(0, Vec::len)
    }
}

/// Millisecond clock anchored to the wall clock once, then advanced by a
/// monotonic instant.
///
/// Readings never go backwards when the system clock is adjusted. If the
/// system clock reads before the Unix epoch at anchoring time, the clock
/// starts from 0.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    base: tokio::time::Instant,
    base_millis: i64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        let base_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as i64);
        Self { base: tokio::time::Instant::now(), base_millis }
    }

    /// Milliseconds since the Unix epoch.
    pub fn now_millis(&self) -> i64 {
        self.base_millis + self.base.elapsed().as_millis() as i64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

static CLOCK: OnceLock<MonotonicClock> = OnceLock::new();

/// Current time in milliseconds since the Unix epoch, from a process-wide
/// [`MonotonicClock`].
pub fn now_millis() -> i64 {
    CLOCK.get_or_init(MonotonicClock::new).now_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn clock_advances_with_monotonic_time() {
        let clock = MonotonicClock::new();
        let start = clock.now_millis();
        assert!(start > 1_600_000_000_000);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_millis() - start, 250);
    }

    #[test]
    fn shared_clock_never_goes_backwards() {
        let mut last = now_millis();
        for _ in 0..1_000 {
            let now = now_millis();
            assert!(now >= last);
            last = now;
        }
    }
}
