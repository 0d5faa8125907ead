//! Hough-transform line detection.
//!
//! The accumulator is a discrete `(r, θ)` vote grid: `2·r_max + 1` rows
//! (row 0 is `r = −r_max`) by `⌈180/Δθ⌉` columns. Grid detection runs it
//! over the preprocessed binary matrix, extracts the vote peaks, removes
//! near-duplicates and splits the survivors into the two orthogonal
//! pencils whose pairwise intersections form the cell lattice.

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// A straight line in polar form; `theta` is in degrees within
/// `[0, 180)`, `r` is the signed distance from the origin in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub r: f32,
    pub theta: f32,
}

/// Integer pixel coordinate, origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Lattice of line intersections: `height` rows by `width` columns of
/// points, strictly increasing in x along a row and in y down a column.
#[derive(Clone, Debug)]
pub struct PointGrid {
    points: Vec<Point>,
    height: usize,
    width: usize,
}

impl PointGrid {
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> Point {
        self.points[row * self.width + col]
    }
}

/// Discrete `(r, θ)` vote grid.
pub struct Accumulator {
    votes: Matrix,
    theta_step: f32,
    r_max: usize,
    max_votes: f32,
}

impl Accumulator {
    /// Builds the accumulator for `src` and casts one vote per ink pixel
    /// and θ column.
    pub fn populate(src: &Matrix, theta_step: f32) -> Result<Self> {
        if theta_step <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "theta step must be strictly positive, got {theta_step}"
            )));
        }

        let height = src.height();
        let width = src.width();
        let diag = ((height * height + width * width) as f64).sqrt();
        let r_max = diag.ceil() as usize;
        let theta_count = (180.0 / theta_step).ceil() as usize;

        let mut votes = Matrix::zeros(2 * r_max + 1, theta_count)?;

        // cos/sin caches, computed once for the whole sweep.
        let mut cos_table = Vec::with_capacity(theta_count);
        let mut sin_table = Vec::with_capacity(theta_count);
        for idx in 0..theta_count {
            let theta = (idx as f32 * theta_step).to_radians();
            cos_table.push(theta.cos());
            sin_table.push(theta.sin());
        }

        let mut max_votes = 0.0f32;
        for y in 0..height {
            for x in 0..width {
                if src.at(y, x) != 0.0 {
                    continue;
                }
                for idx in 0..theta_count {
                    let r = x as f32 * cos_table[idx] + y as f32 * sin_table[idx];
                    let r_index = (r + r_max as f32).round() as usize;
                    let count = votes.at(r_index, idx) + 1.0;
                    votes.set(r_index, idx, count);
                    if count > max_votes {
                        max_votes = count;
                    }
                }
            }
        }

        Ok(Self {
            votes,
            theta_step,
            r_max,
            max_votes,
        })
    }

    pub fn max_votes(&self) -> f32 {
        self.max_votes
    }

    /// Mean and standard deviation of the vote counts, for the
    /// `μ + k·σ` thresholding alternative.
    pub fn vote_statistics(&self) -> (f32, f32) {
        let n = (self.votes.height() * self.votes.width()) as f32;
        let mean = self.votes.sum() / n;
        let mut variance_sum = 0.0f32;
        for r_index in 0..self.votes.height() {
            for idx in 0..self.votes.width() {
                let diff = self.votes.at(r_index, idx) - mean;
                variance_sum += diff * diff;
            }
        }
        (mean, (variance_sum / n).sqrt())
    }

    /// θ (degrees) of the single most-voted cell. Scan order is r-major,
    /// so ties resolve deterministically.
    pub fn peak_theta(&self) -> f32 {
        let mut best = 0.0f32;
        let mut best_theta = 0.0f32;
        for r_index in 0..self.votes.height() {
            for idx in 0..self.votes.width() {
                let count = self.votes.at(r_index, idx);
                if count > best {
                    best = count;
                    best_theta = idx as f32 * self.theta_step;
                }
            }
        }
        best_theta
    }

    /// Emits every cell with at least `threshold` votes as a line, in
    /// r-major generation order.
    pub fn extract_lines(&self, threshold: f32) -> Vec<Line> {
        let mut lines = Vec::new();
        for r_index in 0..self.votes.height() {
            for idx in 0..self.votes.width() {
                if self.votes.at(r_index, idx) < threshold {
                    continue;
                }
                lines.push(Line {
                    r: r_index as f32 - self.r_max as f32,
                    theta: idx as f32 * self.theta_step,
                });
            }
        }
        lines
    }
}

/// Non-maximum suppression over polar lines.
///
/// Lines are visited in generation order; a later line is dropped when a
/// surviving earlier one is within `(delta_r, delta_theta)` of it. The
/// result is order-dependent but stable across runs.
pub fn suppress_duplicates(lines: &[Line], delta_r: f32, delta_theta: f32) -> Vec<Line> {
    let mut kept: Vec<Line> = Vec::with_capacity(lines.len());
    for candidate in lines {
        let duplicate = kept.iter().any(|survivor| {
            (candidate.r - survivor.r).round().abs() < delta_r
                && (candidate.theta - survivor.theta).round().abs() < delta_theta
        });
        if !duplicate {
            kept.push(*candidate);
        }
    }
    kept
}

/// Splits lines into the two pencils of a rectangular grid.
///
/// Grouping is by exact θ equality with the first representative of each
/// group; a third orientation means the image is not a clean grid. The
/// first returned pencil is the near-horizontal one (θ closest to 90°),
/// ordered by r ascending, so its index runs top to bottom.
pub fn split_pencils(lines: &[Line]) -> Result<(Vec<Line>, Vec<Line>)> {
    let mut first: Vec<Line> = Vec::new();
    let mut second: Vec<Line> = Vec::new();

    for line in lines {
        if first.is_empty() || line.theta == first[0].theta {
            first.push(*line);
        } else if second.is_empty() || line.theta == second[0].theta {
            second.push(*line);
        } else {
            return Err(Error::Geometry(format!(
                "three line orientations ({}deg, {}deg, {}deg) cannot form a grid",
                first[0].theta, second[0].theta, line.theta
            )));
        }
    }

    if second.is_empty() {
        return Err(Error::Geometry(
            "only one line orientation detected".into(),
        ));
    }
    if first.len() < 2 || second.len() < 2 {
        return Err(Error::Geometry(format!(
            "a grid needs at least two lines per direction, got {} and {}",
            first.len(),
            second.len()
        )));
    }

    // Rows must be the near-horizontal pencil so the lattice is ordered
    // top-to-bottom.
    let dist_to_horizontal = |theta: f32| (theta - 90.0).abs();
    if dist_to_horizontal(second[0].theta) < dist_to_horizontal(first[0].theta) {
        std::mem::swap(&mut first, &mut second);
    }

    first.sort_by(|a, b| a.r.total_cmp(&b.r));
    second.sort_by(|a, b| a.r.total_cmp(&b.r));
    Ok((first, second))
}

fn intersect(l1: &Line, l2: &Line) -> Result<Point> {
    let t1 = l1.theta.to_radians();
    let t2 = l2.theta.to_radians();
    let denom = (t1 - t2).sin();
    if denom == 0.0 {
        return Err(Error::Geometry(format!(
            "pencils at {}deg and {}deg are parallel",
            l1.theta, l2.theta
        )));
    }
    let x = (l2.r * t1.sin() - l1.r * t2.sin()) / denom;
    let y = (l1.r * t2.cos() - l2.r * t1.cos()) / denom;
    Ok(Point {
        x: x.round() as i32,
        y: y.round() as i32,
    })
}

/// Intersects every pair of lines across the two pencils.
///
/// `rows[i]` × `cols[j]` becomes the lattice point `(i, j)`; the result
/// is checked for strict monotonicity along both axes.
pub fn intersection_grid(rows: &[Line], cols: &[Line]) -> Result<PointGrid> {
    let height = rows.len();
    let width = cols.len();
    let mut points = Vec::with_capacity(height * width);
    for row_line in rows {
        for col_line in cols {
            points.push(intersect(row_line, col_line)?);
        }
    }

    let grid = PointGrid {
        points,
        height,
        width,
    };

    for i in 0..height {
        for j in 0..width {
            let p = grid.at(i, j);
            if j + 1 < width && grid.at(i, j + 1).x <= p.x {
                return Err(Error::Geometry(format!(
                    "lattice is not increasing in x at ({i}, {j})"
                )));
            }
            if i + 1 < height && grid.at(i + 1, j).y <= p.y {
                return Err(Error::Geometry(format!(
                    "lattice is not increasing in y at ({i}, {j})"
                )));
            }
        }
    }
    Ok(grid)
}

/// Full line-detection pass: accumulate, threshold, suppress duplicates,
/// split into pencils and intersect them.
///
/// The threshold is `peak_ratio · max` by default, or `μ + k·σ` over the
/// accumulator when `cfg.peak_sigma` is set.
pub fn detect_grid(src: &Matrix, cfg: &Config) -> Result<PointGrid> {
    let acc = Accumulator::populate(src, cfg.theta_step_deg)?;
    if acc.max_votes() == 0.0 {
        return Err(Error::Geometry("no ink pixels to vote with".into()));
    }

    let threshold = match cfg.peak_sigma {
        Some(k) => {
            let (mean, stddev) = acc.vote_statistics();
            mean + k * stddev
        }
        None => cfg.peak_ratio * acc.max_votes(),
    };
    let raw = acc.extract_lines(threshold);
    let lines = suppress_duplicates(&raw, cfg.nms_delta_r, cfg.nms_delta_theta);
    debug!(
        raw = raw.len(),
        kept = lines.len(),
        max_votes = acc.max_votes(),
        "hough lines extracted"
    );
    if lines.len() > 64 {
        warn!(count = lines.len(), "unusually many grid lines survived suppression");
    }

    let (rows, cols) = split_pencils(&lines)?;
    intersection_grid(&rows, &cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(r: f32, theta: f32) -> Line {
        Line { r, theta }
    }

    /// A single 100-pixel horizontal stroke must produce exactly one
    /// accumulator cell with 100 votes.
    #[test]
    fn test_single_line_has_unique_full_peak() {
        let mut src = Matrix::filled(20, 120, 255.0).unwrap();
        for x in 0..100 {
            src.set(5, x, 0.0);
        }
        let acc = Accumulator::populate(&src, 1.0).unwrap();
        assert_eq!(acc.max_votes(), 100.0);

        let full = acc.extract_lines(100.0);
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].theta, 90.0);
        assert_eq!(full[0].r, 5.0);
    }

    #[test]
    fn test_vote_statistics_on_uniform_accumulator() {
        // A single ink pixel gives every theta column exactly one vote,
        // so the mean is columns/cells and the counts are 0 or 1.
        let mut src = Matrix::filled(10, 10, 255.0).unwrap();
        src.set(0, 0, 0.0);
        let acc = Accumulator::populate(&src, 1.0).unwrap();
        let (mean, stddev) = acc.vote_statistics();
        let cells = (2 * 15 + 1) * 180;
        assert!((mean - 180.0 / cells as f32).abs() < 1e-5);
        assert!(stddev > 0.0);
    }

    #[test]
    fn test_sigma_threshold_detects_same_grid() {
        let mut src = Matrix::filled(300, 300, 255.0).unwrap();
        for &pos in &[0usize, 100, 200, 299] {
            for i in 0..300 {
                src.set(pos, i, 0.0);
                src.set(i, pos, 0.0);
            }
        }
        let cfg = Config {
            peak_sigma: Some(40.0),
            ..Config::default()
        };
        let grid = detect_grid(&src, &cfg).unwrap();
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 4);
    }

    #[test]
    fn test_nms_drops_near_duplicate() {
        let input = vec![line(100.0, 45.0), line(101.0, 45.2), line(250.0, 0.0)];
        let kept = suppress_duplicates(&input, 5.0, 1.0);
        assert_eq!(kept, vec![line(100.0, 45.0), line(250.0, 0.0)]);
    }

    #[test]
    fn test_nms_is_idempotent() {
        let input = vec![
            line(10.0, 0.0),
            line(12.0, 0.0),
            line(40.0, 90.0),
            line(41.0, 90.0),
            line(200.0, 90.0),
        ];
        let once = suppress_duplicates(&input, 5.0, 1.0);
        let twice = suppress_duplicates(&once, 5.0, 1.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_split_pencils_rejects_third_orientation() {
        let input = vec![
            line(0.0, 0.0),
            line(50.0, 0.0),
            line(0.0, 90.0),
            line(50.0, 90.0),
            line(30.0, 45.0),
        ];
        assert!(matches!(
            split_pencils(&input),
            Err(Error::Geometry(_))
        ));
    }

    #[test]
    fn test_split_pencils_orders_rows_top_to_bottom() {
        let input = vec![
            line(50.0, 0.0),
            line(0.0, 0.0),
            line(80.0, 90.0),
            line(10.0, 90.0),
        ];
        let (rows, cols) = split_pencils(&input).unwrap();
        assert_eq!(rows[0].theta, 90.0);
        assert!(rows[0].r < rows[1].r);
        assert!(cols[0].r < cols[1].r);
    }

    #[test]
    fn test_intersection_grid_is_monotonic() {
        let rows = vec![line(0.0, 90.0), line(100.0, 90.0), line(200.0, 90.0)];
        let cols = vec![line(0.0, 0.0), line(100.0, 0.0), line(200.0, 0.0)];
        let grid = intersection_grid(&rows, &cols).unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.width(), 3);
        for i in 0..3 {
            for j in 0..3 {
                let p = grid.at(i, j);
                assert_eq!(p.x, 100 * j as i32);
                assert_eq!(p.y, 100 * i as i32);
                if j > 0 {
                    assert!(grid.at(i, j - 1).x < p.x);
                }
                if i > 0 {
                    assert!(grid.at(i - 1, j).y < p.y);
                }
            }
        }
    }

    #[test]
    fn test_parallel_pencils_are_rejected() {
        let rows = vec![line(0.0, 90.0), line(100.0, 90.0)];
        let cols = vec![line(0.0, 90.0), line(50.0, 90.0)];
        assert!(intersection_grid(&rows, &cols).is_err());
    }

    /// Literal 3x3 synthetic scenario: a 300x300 page ruled at
    /// x,y ∈ {0, 100, 200, 299} must yield the 4x4 lattice.
    #[test]
    fn test_synthetic_three_by_three_grid() {
        let mut src = Matrix::filled(300, 300, 255.0).unwrap();
        for &pos in &[0usize, 100, 200, 299] {
            for i in 0..300 {
                src.set(pos, i, 0.0);
                src.set(i, pos, 0.0);
            }
        }
        let cfg = Config::default();
        let grid = detect_grid(&src, &cfg).unwrap();
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 4);
        let expected = [0i32, 100, 200, 299];
        for i in 0..4 {
            for j in 0..4 {
                let p = grid.at(i, j);
                assert!((p.x - expected[j]).abs() <= 1, "x at ({i},{j}) = {}", p.x);
                assert!((p.y - expected[i]).abs() <= 1, "y at ({i},{j}) = {}", p.y);
            }
        }
    }
}
