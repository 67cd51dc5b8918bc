//! Delta-compressed geometry runs.
//!
//! A run is a sequence of points written as signed deltas at a reduced
//! coordinate resolution: each point contributes
//! `(x >> shift) - prev_x, (y >> shift) - prev_y`, zigzag- and
//! varint-encoded, X before Y. The accumulator seeds from the owning
//! box's origin, so the first delta of a run is always box-relative.
//!
//! The literal pair `(0, 0)` is reserved as a run separator (ring
//! boundaries inside a polygon stream); after a separator the accumulator
//! resets to the origin. Callers must not start a run on a point that
//! coincides with the origin at the target resolution, or the first delta
//! would alias the separator; geometry handed to the encoder is expected
//! to be non-degenerate.

use crate::codec::varint::{decode_zigzag32, encode_zigzag32, read_varint32, write_varint32};
use crate::error::Result;
use crate::tile::TilePoint;
use bytes::BytesMut;

/// Accumulated statistics of an encoded run, at the run's reduced
/// resolution. Used to place label points near the geometry's mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Sum of emitted X coordinates (shifted space).
    pub sum_x: i64,
    /// Sum of emitted Y coordinates (shifted space).
    pub sum_y: i64,
    /// Number of emitted points.
    pub count: u32,
}

impl RunStats {
    /// Mean emitted position in shifted space, if any point was emitted.
    pub fn mean(&self) -> Option<(i32, i32)> {
        if self.count == 0 {
            return None;
        }
        Some((
            (self.sum_x / self.count as i64) as i32,
            (self.sum_y / self.count as i64) as i32,
        ))
    }

    fn merge(&mut self, other: RunStats) {
        self.sum_x += other.sum_x;
        self.sum_y += other.sum_y;
        self.count += other.count;
    }
}

/// Encode one run of points against `origin` at `shift` resolution.
///
/// Returns the stats of the emitted points. The accumulator always
/// advances by the *encoded* delta, so resolution rounding never drifts.
/// A point that coincides with its predecessor at the target resolution
/// is dropped rather than written: its delta would be the literal
/// `(0,0)` pair, which is reserved for the separator.
pub fn encode_run(
    buf: &mut BytesMut,
    points: &[TilePoint],
    origin: TilePoint,
    shift: u8,
) -> RunStats {
    let mut prev_x = origin.x >> shift;
    let mut prev_y = origin.y >> shift;
    let mut stats = RunStats::default();

    for (i, p) in points.iter().enumerate() {
        let tx = (p.x >> shift) - prev_x;
        let ty = (p.y >> shift) - prev_y;
        debug_assert!(
            i != 0 || tx != 0 || ty != 0,
            "run starts on its origin at shift {} resolution", shift
        );
        if tx == 0 && ty == 0 {
            continue;
        }
        write_varint32(buf, encode_zigzag32(tx));
        write_varint32(buf, encode_zigzag32(ty));
        prev_x += tx;
        prev_y += ty;
        stats.sum_x += prev_x as i64;
        stats.sum_y += prev_y as i64;
        stats.count += 1;
    }
    stats
}

/// Encode several runs into one stream, separated by the reserved `(0,0)`
/// pair. The accumulator resets to `origin` after each separator.
pub fn encode_runs(
    buf: &mut BytesMut,
    runs: &[Vec<TilePoint>],
    origin: TilePoint,
    shift: u8,
) -> RunStats {
    let mut stats = RunStats::default();
    for (i, run) in runs.iter().enumerate() {
        if i > 0 {
            write_separator(buf);
        }
        stats.merge(encode_run(buf, run, origin, shift));
    }
    stats
}

/// Append the reserved run separator.
pub fn write_separator(buf: &mut BytesMut) {
    write_varint32(buf, 0);
    write_varint32(buf, 0);
}

/// Decode a delta stream back into runs of absolute points at `shift`
/// resolution (coordinates come back left-shifted, i.e. rounded).
///
/// This is the inverse of [`encode_runs`]; the writer itself never reads
/// files back, but tests and downstream tooling do.
pub fn decode_runs(data: &[u8], origin: TilePoint, shift: u8) -> Result<Vec<Vec<TilePoint>>> {
    let mut runs = Vec::new();
    let mut run = Vec::new();
    let mut prev_x = origin.x >> shift;
    let mut prev_y = origin.y >> shift;
    let mut pos = 0;

    while pos < data.len() {
        let zx = read_varint32(data, &mut pos)?;
        let zy = read_varint32(data, &mut pos)?;
        let tx = decode_zigzag32(zx);
        let ty = decode_zigzag32(zy);
        if tx == 0 && ty == 0 {
            runs.push(std::mem::take(&mut run));
            prev_x = origin.x >> shift;
            prev_y = origin.y >> shift;
            continue;
        }
        prev_x += tx;
        prev_y += ty;
        run.push(TilePoint::new(prev_x << shift, prev_y << shift));
    }
    runs.push(run);
    Ok(runs)
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
/// Falls back to the point distance when the chord is degenerate.
fn perp_distance(p: TilePoint, a: TilePoint, b: TilePoint) -> f64 {
    let cx = (b.x - a.x) as i64;
    let cy = (b.y - a.y) as i64;
    let px = (p.x - a.x) as i64;
    let py = (p.y - a.y) as i64;
    let chord_len_sq = cx * cx + cy * cy;
    if chord_len_sq == 0 {
        return ((px * px + py * py) as f64).sqrt();
    }
    (px * cy - py * cx).abs() as f64 / (chord_len_sq as f64).sqrt()
}

/// Greedy forward thinning pass.
///
/// Walks the run once, extending each jump while every skipped point stays
/// within `threshold` tile units of the chord joining the retained
/// endpoints. The first and last point of a run are always kept. This is
/// the cheap write-time pass for overview zoom levels, not a full offline
/// simplification.
pub fn thin_run(points: &[TilePoint], threshold: u32) -> Vec<TilePoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);
    let mut i = 0;
    while i < points.len() - 1 {
        let mut j = i + 1;
        let mut k = i + 2;
        while k < points.len() {
            let within = (i + 1..k)
                .all(|m| perp_distance(points[m], points[i], points[k]) <= threshold as f64);
            if !within {
                break;
            }
            j = k;
            k += 1;
        }
        out.push(points[j]);
        i = j;
    }
    out
}

/// Emit a label point when it is worth storing.
///
/// The natural label position is compared to the run's mean; when the
/// deviation on either axis exceeds `deadzone` (in full-resolution tile
/// units), or the object is always labelled, one extra zigzag/varint
/// delta pair (label minus mean, shifted space) is appended. Returns
/// whether the label was emitted.
pub fn encode_label(
    buf: &mut BytesMut,
    natural: TilePoint,
    stats: &RunStats,
    shift: u8,
    deadzone: u32,
    always: bool,
) -> bool {
    let Some((mean_x, mean_y)) = stats.mean() else {
        return false;
    };
    let nx = natural.x >> shift;
    let ny = natural.y >> shift;
    let dev_x = ((nx - mean_x).unsigned_abs() as u64) << shift;
    let dev_y = ((ny - mean_y).unsigned_abs() as u64) << shift;
    if !always && dev_x <= deadzone as u64 && dev_y <= deadzone as u64 {
        return false;
    }
    write_varint32(buf, encode_zigzag32(nx - mean_x));
    write_varint32(buf, encode_zigzag32(ny - mean_y));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> TilePoint {
        TilePoint::new(x, y)
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let origin = p(1 << 14, 1 << 14);
        let points = vec![p(20000, 18000), p(19000, 21000), p(25000, 16500)];
        let shift = 5;

        let mut buf = BytesMut::new();
        encode_run(&mut buf, &points, origin, shift);

        let runs = decode_runs(&buf, origin, shift).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), points.len());
        for (got, want) in runs[0].iter().zip(&points) {
            assert_eq!(got.x, want.x >> shift << shift);
            assert_eq!(got.y, want.y >> shift << shift);
        }
    }

    #[test]
    fn test_zero_delta_component() {
        // Vertical then horizontal movement: one component of each delta
        // is zero but the pair never aliases the separator.
        let origin = p(0, 0);
        let points = vec![p(0, 320), p(320, 320)];
        let mut buf = BytesMut::new();
        encode_run(&mut buf, &points, origin, 5);

        let runs = decode_runs(&buf, origin, 5).unwrap();
        assert_eq!(runs[0], vec![p(0, 320), p(320, 320)]);
    }

    #[test]
    fn test_negative_deltas() {
        let origin = p(100_000, 100_000);
        let points = vec![p(90_000, 110_000), p(80_000, 90_000)];
        let mut buf = BytesMut::new();
        encode_run(&mut buf, &points, origin, 4);

        let runs = decode_runs(&buf, origin, 4).unwrap();
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[0][1].x, 80_000 >> 4 << 4);
    }

    #[test]
    fn test_separator_splits_runs() {
        let origin = p(0, 0);
        let ring1 = vec![p(3200, 3200), p(6400, 3200)];
        let ring2 = vec![p(960, 640), p(640, 960)];
        let mut buf = BytesMut::new();
        encode_runs(&mut buf, &[ring1.clone(), ring2.clone()], origin, 5);

        let runs = decode_runs(&buf, origin, 5).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], ring1);
        assert_eq!(runs[1], ring2);
    }

    #[test]
    fn test_duplicate_point_collapsed() {
        // Points identical at the target resolution would alias the
        // separator; the encoder drops them instead.
        let origin = p(0, 0);
        let points = vec![p(3200, 3200), p(3210, 3205), p(6400, 6400)];
        let mut buf = BytesMut::new();
        let stats = encode_run(&mut buf, &points, origin, 5);
        assert_eq!(stats.count, 2);

        let runs = decode_runs(&buf, origin, 5).unwrap();
        assert_eq!(runs[0], vec![p(3200, 3200), p(6400, 6400)]);
    }

    #[test]
    fn test_thin_keeps_endpoints() {
        let points: Vec<TilePoint> = (0..50).map(|i| p(i * 100, (i % 3) * 10)).collect();
        let thinned = thin_run(&points, 31);
        assert_eq!(thinned.first(), points.first());
        assert_eq!(thinned.last(), points.last());
        assert!(thinned.len() < points.len());
    }

    #[test]
    fn test_thin_straight_line_collapses() {
        let points: Vec<TilePoint> = (0..20).map(|i| p(i * 50, i * 50)).collect();
        let thinned = thin_run(&points, 31);
        assert_eq!(thinned.len(), 2);
    }

    #[test]
    fn test_thin_preserves_sharp_corner() {
        let mut points: Vec<TilePoint> = (0..10).map(|i| p(i * 100, 0)).collect();
        points.extend((1..10).map(|i| p(900, i * 100)));
        let thinned = thin_run(&points, 31);
        assert!(thinned.contains(&p(900, 0)), "corner must survive thinning");
    }

    #[test]
    fn test_thin_short_run_untouched() {
        let points = vec![p(0, 0), p(10, 10)];
        assert_eq!(thin_run(&points, 31), points);
    }

    #[test]
    fn test_label_inside_deadzone_omitted() {
        let origin = p(0, 0);
        let points = vec![p(3200, 3200), p(6400, 6400)];
        let mut buf = BytesMut::new();
        let stats = encode_run(&mut buf, &points, origin, 5);

        let mut label_buf = BytesMut::new();
        // Natural label right at the mean: nothing to store.
        let mean = stats.mean().unwrap();
        let natural = p(mean.0 << 5, mean.1 << 5);
        assert!(!encode_label(&mut label_buf, natural, &stats, 5, 1024, false));
        assert!(label_buf.is_empty());
    }

    #[test]
    fn test_label_outside_deadzone_emitted() {
        let origin = p(0, 0);
        let points = vec![p(3200, 3200), p(6400, 6400)];
        let mut buf = BytesMut::new();
        let stats = encode_run(&mut buf, &points, origin, 5);

        let mut label_buf = BytesMut::new();
        let natural = p(100_000, 100_000);
        assert!(encode_label(&mut label_buf, natural, &stats, 5, 1024, false));
        assert!(!label_buf.is_empty());
    }

    #[test]
    fn test_label_always_forced() {
        let origin = p(0, 0);
        let points = vec![p(3200, 3200), p(6400, 6400)];
        let mut buf = BytesMut::new();
        let stats = encode_run(&mut buf, &points, origin, 5);

        let mut label_buf = BytesMut::new();
        let mean = stats.mean().unwrap();
        let natural = p(mean.0 << 5, mean.1 << 5);
        assert!(encode_label(&mut label_buf, natural, &stats, 5, 1024, true));
    }
}
