//! Depth map reduction and point extraction.
//!
//! Depth maps arrive at full sensor resolution on every tick. Before they are
//! serialized they are block-averaged down by a fixed factor, and a bounded
//! set of 3-D points is derived either from the reduced grid (dense mode) or
//! from the tracking subsystem's own point cloud (sparse mode).
//!
//! # Averaging rule
//!
//! A zero sample means "no depth return". Zeros are excluded from every block
//! average so that holes in the map do not drag nearby depths toward the
//! camera. A block with no valid sample reduces to 0. Integer means are
//! truncated toward zero.
//!
//! # Dense sampling
//!
//! The dense walk picks one stride per axis so that roughly `max_points` grid
//! cells are visited while keeping the map's aspect ratio:
//!
//! ```text
//! aspect   = width / height
//! stride_x = floor(width  / sqrt(max_points / aspect))   (at least 1)
//! stride_y = floor(height / sqrt(max_points * aspect))   (at least 1)
//! ```

use tracing::trace;

use crate::types::{DepthInfo, DepthMap, DownsampledDepthMap, PointSample};
use crate::{Result, StreamError};

/// Default block size used when reducing depth maps.
pub const DEFAULT_DOWNSAMPLE_FACTOR: usize = 4;

/// Reduce `map` by `factor` along both axes.
///
/// The output is `⌊width/factor⌋ × ⌊height/factor⌋`; remainder rows and
/// columns are dropped. When the source carries a confidence grid it is
/// averaged over the same valid samples.
pub fn reduce(map: &DepthMap, factor: usize) -> Result<DownsampledDepthMap> {
    if factor == 0 {
        return Err(StreamError::invalid_argument("factor", "downsample factor must be >= 1"));
    }

    let (src_w, src_h) = (map.width(), map.height());
    if factor == 1 {
        return Ok(DownsampledDepthMap {
            map: map.clone(),
            source_width: src_w,
            source_height: src_h,
            factor,
        });
    }

    let out_w = src_w / factor;
    let out_h = src_h / factor;
    let samples = map.samples();
    let confidence = map.confidence();

    let mut reduced = Vec::with_capacity(out_w * out_h);
    let mut reduced_conf = confidence.map(|_| Vec::with_capacity(out_w * out_h));

    for y in 0..out_h {
        for x in 0..out_w {
            let mut sum = 0u64;
            let mut conf_sum = 0u64;
            let mut count = 0u64;

            for by in 0..factor {
                let row = (y * factor + by) * src_w;
                for bx in 0..factor {
                    let idx = row + x * factor + bx;
                    let raw = samples[idx];
                    if raw == 0 {
                        continue;
                    }
                    sum += u64::from(raw);
                    count += 1;
                    if let Some(conf) = confidence {
                        conf_sum += u64::from(conf[idx]);
                    }
                }
            }

            let (mean, conf_mean) =
                if count == 0 { (0, 0) } else { ((sum / count) as u16, (conf_sum / count) as u8) };
            reduced.push(mean);
            if let Some(out) = reduced_conf.as_mut() {
                out.push(conf_mean);
            }
        }
    }

    let mut out_map = DepthMap::new(out_w, out_h, reduced)?;
    if let Some(conf) = reduced_conf {
        out_map = out_map.with_confidence(conf)?;
    }

    Ok(DownsampledDepthMap { map: out_map, source_width: src_w, source_height: src_h, factor })
}

/// Take up to `max_points` samples from an externally supplied point cloud.
///
/// Points are kept in the source's native order and truncated, never
/// resampled. An empty source yields an empty result.
pub fn sparse_points(source: &[[f32; 4]], max_points: usize) -> Vec<PointSample> {
    source.iter().take(max_points).copied().map(PointSample::from).collect()
}

/// Walk `map` on a strided grid and project valid samples into camera space.
///
/// Returns at most `max_points` samples; fewer when the grid runs out first.
pub fn dense_points(map: &DepthMap, max_points: usize) -> Vec<PointSample> {
    if max_points == 0 || map.is_empty() {
        return Vec::new();
    }

    let (stride_x, stride_y) = dense_strides(map.width(), map.height(), max_points);
    let width = map.width() as f32;
    let height = map.height() as f32;
    let confidence = map.confidence();

    let mut points = Vec::with_capacity(max_points.min(map.samples().len()));
    'rows: for py in (0..map.height()).step_by(stride_y) {
        for px in (0..map.width()).step_by(stride_x) {
            let idx = py * map.width() + px;
            let raw = map.samples()[idx];
            if raw == 0 {
                continue;
            }

            let depth_m = f32::from(raw) / 1000.0;
            let x = ((px as f32 / width) * 2.0 - 1.0) * depth_m;
            let y = ((py as f32 / height) * 2.0 - 1.0) * depth_m;
            let conf = confidence.map_or(1.0, |c| f32::from(c[idx]) / 255.0);
            points.push(PointSample::new(x, y, depth_m, conf));

            if points.len() >= max_points {
                break 'rows;
            }
        }
    }

    trace!(stride_x, stride_y, points = points.len(), "Extracted dense points");
    points
}

/// Per-axis strides for a dense walk targeting `max_points` cells.
pub fn dense_strides(width: usize, height: usize, max_points: usize) -> (usize, usize) {
    if width == 0 || height == 0 || max_points == 0 {
        return (1, 1);
    }
    let w = width as f64;
    let h = height as f64;
    let aspect = w / h;
    let target = max_points as f64;

    let stride_x = (w / (target / aspect).sqrt()).floor() as usize;
    let stride_y = (h / (target * aspect).sqrt()).floor() as usize;
    (stride_x.max(1), stride_y.max(1))
}

/// Output of one [`DepthReducer::process`] call.
#[derive(Debug, Clone)]
pub struct ReducedDepth {
    pub map: DownsampledDepthMap,
    pub info: DepthInfo,
}

/// Depth reduction stage with a fixed downsample factor.
#[derive(Debug, Clone, Copy)]
pub struct DepthReducer {
    factor: usize,
}

impl Default for DepthReducer {
    fn default() -> Self {
        Self { factor: DEFAULT_DOWNSAMPLE_FACTOR }
    }
}

impl DepthReducer {
    /// Create a reducer; `factor` must be at least 1.
    pub fn new(factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(StreamError::invalid_argument("factor", "downsample factor must be >= 1"));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Reduce one tick's depth map and describe the result.
    pub fn process(&self, map: &DepthMap, timestamp_millis: i64) -> Result<ReducedDepth> {
        let reduced = reduce(map, self.factor)?;
        trace!(
            source_width = map.width(),
            source_height = map.height(),
            width = reduced.width(),
            height = reduced.height(),
            factor = self.factor,
            "Reduced depth map"
        );
        let info = DepthInfo::describe(&reduced, timestamp_millis);
        Ok(ReducedDepth { map: reduced, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn arb_depth_map()(width in 0usize..40, height in 0usize..40)
            (samples in prop::collection::vec(
                prop_oneof![Just(0u16), 1u16..8000u16],
                width * height
            ), width in Just(width), height in Just(height)) -> DepthMap {
            DepthMap::new(width, height, samples).unwrap()
        }
    }

    fn block_mean(map: &DepthMap, x: usize, y: usize, factor: usize) -> u16 {
        let mut valid = Vec::new();
        for by in 0..factor {
            for bx in 0..factor {
                if let Some(v) = map.get(x * factor + bx, y * factor + by) {
                    if v != 0 {
                        valid.push(u64::from(v));
                    }
                }
            }
        }
        if valid.is_empty() { 0 } else { (valid.iter().sum::<u64>() / valid.len() as u64) as u16 }
    }

    proptest! {
        #[test]
        fn prop_reduce_dimensions_and_means(map in arb_depth_map(), factor in 1usize..6) {
            let reduced = reduce(&map, factor).unwrap();
            prop_assert_eq!(reduced.width(), map.width() / factor);
            prop_assert_eq!(reduced.height(), map.height() / factor);

            for y in 0..reduced.height() {
                for x in 0..reduced.width() {
                    prop_assert_eq!(reduced.map().get(x, y), Some(block_mean(&map, x, y, factor)));
                }
            }
        }

        #[test]
        fn prop_dense_points_bounded_and_sourced(map in arb_depth_map(), max_points in 0usize..500) {
            let points = dense_points(&map, max_points);
            prop_assert!(points.len() <= max_points);

            let valid: Vec<f32> = map
                .samples()
                .iter()
                .filter(|&&raw| raw != 0)
                .map(|&raw| f32::from(raw) / 1000.0)
                .collect();
            for point in &points {
                prop_assert!(point.z > 0.0);
                prop_assert!(valid.contains(&point.z));
            }
        }

        #[test]
        fn prop_sparse_points_bounded(
            cloud in prop::collection::vec(prop::array::uniform4(-10.0f32..10.0), 0..200),
            max_points in 0usize..300
        ) {
            let points = sparse_points(&cloud, max_points);
            prop_assert!(points.len() <= max_points);
            prop_assert!(points.len() <= cloud.len());
            prop_assert_eq!(points.len(), cloud.len().min(max_points));
        }
    }

    #[test]
    fn reduce_ignores_invalid_samples() {
        #[rustfmt::skip]
        let map = DepthMap::new(4, 2, vec![
            1000, 0,    0, 0,
            3000, 2000, 0, 0,
        ]).unwrap();

        let reduced = reduce(&map, 2).unwrap();
        assert_eq!(reduced.width(), 2);
        assert_eq!(reduced.height(), 1);
        assert_eq!(reduced.map().samples(), &[2000, 0]);
    }

    #[test]
    fn reduce_drops_remainder_edges() {
        let map = DepthMap::new(9, 5, vec![500; 45]).unwrap();
        let reduced = reduce(&map, 4).unwrap();
        assert_eq!((reduced.width(), reduced.height()), (2, 1));
        assert_eq!(reduced.source_width(), 9);
        assert_eq!(reduced.source_height(), 5);
        assert!(reduced.map().samples().iter().all(|&v| v == 500));
    }

    #[test]
    fn reduce_factor_one_is_a_copy() {
        let map = DepthMap::new(3, 1, vec![1, 0, 3]).unwrap().with_confidence(vec![9, 8, 7]).unwrap();
        let reduced = reduce(&map, 1).unwrap();
        assert_eq!(reduced.map(), &map);
    }

    #[test]
    fn reduce_rejects_zero_factor() {
        let map = DepthMap::new(1, 1, vec![1]).unwrap();
        assert!(matches!(reduce(&map, 0), Err(StreamError::InvalidArgument { .. })));
        assert!(DepthReducer::new(0).is_err());
    }

    #[test]
    fn reduce_averages_confidence_over_valid_samples() {
        let map = DepthMap::new(2, 2, vec![1000, 0, 1000, 0])
            .unwrap()
            .with_confidence(vec![200, 0, 100, 0])
            .unwrap();
        let reduced = reduce(&map, 2).unwrap();
        assert_eq!(reduced.map().confidence(), Some(&[150u8][..]));
    }

    #[test]
    fn dense_points_project_into_camera_space() {
        let map = DepthMap::new(2, 2, vec![2000, 0, 0, 1000]).unwrap();
        let points = dense_points(&map, 4);
        assert_eq!(points.len(), 2);

        // Top-left pixel: normalized coords (-1, -1)
        assert_eq!(points[0], PointSample::new(-2.0, -2.0, 2.0, 1.0));
        // Bottom-right pixel (1, 1): normalized coords (0, 0)
        assert_eq!(points[1], PointSample::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn dense_points_stop_at_cap() {
        let map = DepthMap::new(10, 10, vec![1500; 100]).unwrap();
        let points = dense_points(&map, 7);
        assert_eq!(points.len(), 7);
        assert!(points.iter().all(|p| p.z == 1.5));
    }

    #[test]
    fn dense_points_empty_inputs() {
        let empty = DepthMap::new(0, 0, Vec::new()).unwrap();
        assert!(dense_points(&empty, 100).is_empty());

        let holes = DepthMap::new(4, 4, vec![0; 16]).unwrap();
        assert!(dense_points(&holes, 100).is_empty());

        let map = DepthMap::new(4, 4, vec![1; 16]).unwrap();
        assert!(dense_points(&map, 0).is_empty());
    }

    #[test]
    fn dense_strides_follow_aspect_ratio() {
        // 160x120 with 5000 points: sqrt(3750) ~ 61.2, sqrt(6666.7) ~ 81.6
        assert_eq!(dense_strides(160, 120, 5000), (2, 1));
        // More points than cells clamps to 1
        assert_eq!(dense_strides(4, 4, 1000), (1, 1));
        // Square map: equal strides
        assert_eq!(dense_strides(100, 100, 100), (10, 10));
    }

    #[test]
    fn dense_points_use_confidence_grid() {
        let map = DepthMap::new(1, 1, vec![1000]).unwrap().with_confidence(vec![255]).unwrap();
        assert_eq!(dense_points(&map, 1)[0].confidence, 1.0);

        let map = DepthMap::new(1, 1, vec![1000]).unwrap().with_confidence(vec![0]).unwrap();
        assert_eq!(dense_points(&map, 1)[0].confidence, 0.0);
    }

    #[test]
    fn sparse_points_truncate_in_native_order() {
        let cloud = [[1.0, 2.0, 3.0, 0.5], [4.0, 5.0, 6.0, 0.9], [7.0, 8.0, 9.0, 0.1]];
        let points = sparse_points(&cloud, 2);
        assert_eq!(points, vec![
            PointSample::new(1.0, 2.0, 3.0, 0.5),
            PointSample::new(4.0, 5.0, 6.0, 0.9)
        ]);
        assert!(sparse_points(&[], 10).is_empty());
    }

    #[test]
    fn reducer_process_describes_output() {
        let reducer = DepthReducer::default();
        assert_eq!(reducer.factor(), DEFAULT_DOWNSAMPLE_FACTOR);

        let map = DepthMap::new(16, 8, vec![1200; 128]).unwrap();
        let reduced = reducer.process(&map, 99).unwrap();
        assert_eq!((reduced.map.width(), reduced.map.height()), (4, 2));
        assert_eq!(reduced.info.get("originalWidth"), Some(&serde_json::json!(16)));
        assert_eq!(reduced.info.get("timestamp"), Some(&serde_json::json!(99)));
    }
}
