//! Page segmentation: grid cells from the intersection lattice, the
//! word-list region outside the grid, and word/letter boxes from
//! projection histograms.

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hough::{Point, PointGrid};
use crate::matrix::Matrix;

/// Axis-aligned rectangle given by its top-left and bottom-right corner,
/// both inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub tl: Point,
    pub br: Point,
}

impl BoundingBox {
    pub fn new(tl: Point, br: Point) -> Self {
        Self { tl, br }
    }

    /// Horizontal extent in pixels (inclusive corners).
    pub fn width(&self) -> i32 {
        self.br.x - self.tl.x + 1
    }

    /// Vertical extent in pixels (inclusive corners).
    pub fn height(&self) -> i32 {
        self.br.y - self.tl.y + 1
    }

    /// Shrinks the box by `amount` on every side. Fails when the padding
    /// eats the whole box.
    pub fn shrink(&self, amount: i32) -> Result<Self> {
        let tl = Point {
            x: self.tl.x + amount,
            y: self.tl.y + amount,
        };
        let br = Point {
            x: self.br.x - amount,
            y: self.br.y - amount,
        };
        if tl.x > br.x || tl.y > br.y {
            return Err(Error::InvalidInput(format!(
                "padding {amount} exceeds the {}x{} box",
                self.width(),
                self.height()
            )));
        }
        Ok(Self { tl, br })
    }
}

/// One word of the list: its box and the letter boxes inside it, left to
/// right.
#[derive(Clone, Debug)]
pub struct Word {
    pub bbox: BoundingBox,
    pub letters: Vec<BoundingBox>,
}

/// Cell rectangles of the letter grid, row-major: cell `(i, j)` spans
/// `P[i][j]` to `P[i+1][j+1]`.
pub fn cell_boxes(lattice: &PointGrid) -> Vec<BoundingBox> {
    let mut cells = Vec::with_capacity((lattice.height() - 1) * (lattice.width() - 1));
    for i in 0..lattice.height() - 1 {
        for j in 0..lattice.width() - 1 {
            cells.push(BoundingBox::new(lattice.at(i, j), lattice.at(i + 1, j + 1)));
        }
    }
    cells
}

/// Bounding box of the whole grid.
pub fn grid_bbox(lattice: &PointGrid) -> BoundingBox {
    BoundingBox::new(
        lattice.at(0, 0),
        lattice.at(lattice.height() - 1, lattice.width() - 1),
    )
}

/// Largest of the four rectangular strips around the grid box, where the
/// word list is printed. Ties break top > bottom > left > right.
pub fn word_region(grid: &BoundingBox, src_height: usize, src_width: usize) -> Result<BoundingBox> {
    let src_h = src_height as i32;
    let src_w = src_width as i32;
    if grid.br.y >= src_h || grid.br.x >= src_w || grid.tl.x < 0 || grid.tl.y < 0 {
        return Err(Error::Geometry(
            "grid bounding box lies outside the image".into(),
        ));
    }

    let top = grid.tl.y;
    let bottom = src_h - 1 - grid.br.y;
    let left = grid.tl.x;
    let right = src_w - 1 - grid.br.x;
    let best = top.max(bottom).max(left).max(right);
    if best <= 0 {
        return Err(Error::Geometry(
            "no space around the grid for a word list".into(),
        ));
    }

    let region = if best == top {
        BoundingBox::new(Point { x: 0, y: 0 }, Point {
            x: src_w - 1,
            y: grid.tl.y - 1,
        })
    } else if best == bottom {
        BoundingBox::new(
            Point {
                x: 0,
                y: grid.br.y + 1,
            },
            Point {
                x: src_w - 1,
                y: src_h - 1,
            },
        )
    } else if best == left {
        BoundingBox::new(Point { x: 0, y: 0 }, Point {
            x: grid.tl.x - 1,
            y: src_h - 1,
        })
    } else {
        BoundingBox::new(
            Point {
                x: grid.br.x + 1,
                y: 0,
            },
            Point {
                x: src_w - 1,
                y: src_h - 1,
            },
        )
    };
    Ok(region)
}

fn check_area(src: &Matrix, area: &BoundingBox) -> Result<()> {
    if area.tl.x < 0
        || area.tl.y < 0
        || area.br.x >= src.width() as i32
        || area.br.y >= src.height() as i32
    {
        return Err(Error::InvalidInput(format!(
            "area ({}, {})-({}, {}) lies outside the {}x{} matrix",
            area.tl.x,
            area.tl.y,
            area.br.x,
            area.br.y,
            src.height(),
            src.width()
        )));
    }
    Ok(())
}

/// Ink-pixel count per row of `area`, top to bottom.
pub fn horizontal_histogram(src: &Matrix, area: &BoundingBox) -> Result<Vec<usize>> {
    check_area(src, area)?;
    let mut histogram = vec![0usize; area.height() as usize];
    for (i, bin) in histogram.iter_mut().enumerate() {
        let row = (area.tl.y + i as i32) as usize;
        for col in area.tl.x..=area.br.x {
            if src.at(row, col as usize) == 0.0 {
                *bin += 1;
            }
        }
    }
    Ok(histogram)
}

/// Ink-pixel count per column of `area`, left to right.
pub fn vertical_histogram(src: &Matrix, area: &BoundingBox) -> Result<Vec<usize>> {
    check_area(src, area)?;
    let mut histogram = vec![0usize; area.width() as usize];
    for (i, bin) in histogram.iter_mut().enumerate() {
        let col = (area.tl.x + i as i32) as usize;
        for row in area.tl.y..=area.br.y {
            if src.at(row as usize, col) == 0.0 {
                *bin += 1;
            }
        }
    }
    Ok(histogram)
}

/// Word boxes inside `area`: maximal runs of rows whose ink count
/// exceeds `threshold`, spanning the full region width.
fn words_from_histogram(area: &BoundingBox, histogram: &[usize], threshold: usize) -> Vec<BoundingBox> {
    let mut boxes = Vec::new();
    let mut run_start: Option<i32> = None;
    for (i, &count) in histogram.iter().enumerate() {
        let y = area.tl.y + i as i32;
        if count > threshold {
            if run_start.is_none() {
                run_start = Some(y);
            }
        } else if let Some(start) = run_start.take() {
            boxes.push(BoundingBox::new(
                Point { x: area.tl.x, y: start },
                Point {
                    x: area.br.x,
                    y: y - 1,
                },
            ));
        }
    }
    if let Some(start) = run_start {
        boxes.push(BoundingBox::new(
            Point { x: area.tl.x, y: start },
            Point {
                x: area.br.x,
                y: area.br.y,
            },
        ));
    }
    boxes
}

/// Letter boxes inside a word box: maximal runs of columns whose ink
/// count reaches `threshold`, spanning the full word height.
fn letters_from_histogram(word: &BoundingBox, histogram: &[usize], threshold: usize) -> Vec<BoundingBox> {
    let mut boxes = Vec::new();
    let mut run_start: Option<i32> = None;
    for (i, &count) in histogram.iter().enumerate() {
        let x = word.tl.x + i as i32;
        if count >= threshold {
            if run_start.is_none() {
                run_start = Some(x);
            }
        } else if let Some(start) = run_start.take() {
            boxes.push(BoundingBox::new(
                Point { x: start, y: word.tl.y },
                Point {
                    x: x - 1,
                    y: word.br.y,
                },
            ));
        }
    }
    if let Some(start) = run_start {
        boxes.push(BoundingBox::new(
            Point { x: start, y: word.tl.y },
            Point {
                x: word.br.x,
                y: word.br.y,
            },
        ));
    }
    boxes
}

/// Splits every letter whose width reaches twice the global average into
/// `width / average` equal slices; the last slice absorbs the rounding
/// remainder. Catches touching letters that the projection histogram
/// fused into one run.
fn split_oversize_letters(words: &mut [Word]) {
    let mut total = 0i64;
    let mut count = 0i64;
    for word in words.iter() {
        for letter in &word.letters {
            total += (letter.br.x - letter.tl.x) as i64;
            count += 1;
        }
    }
    if count == 0 {
        return;
    }
    let average = (total / count) as i32;
    if average == 0 {
        return;
    }

    for word in words.iter_mut() {
        let mut rebuilt: Vec<BoundingBox> = Vec::with_capacity(word.letters.len());
        for letter in &word.letters {
            let width = letter.br.x - letter.tl.x;
            let parts = width / average;
            if parts < 2 {
                rebuilt.push(*letter);
                continue;
            }
            let slice_width = width / parts;
            for part in 0..parts {
                let x0 = letter.tl.x + slice_width * part;
                let x1 = if part == parts - 1 {
                    letter.br.x
                } else {
                    x0 + slice_width
                };
                rebuilt.push(BoundingBox::new(
                    Point { x: x0, y: letter.tl.y },
                    Point { x: x1, y: letter.br.y },
                ));
            }
        }
        word.letters = rebuilt;
    }
}

/// Locates the word list next to the grid and cuts it into words and
/// letters.
pub fn segment_words(src: &Matrix, grid: &BoundingBox, cfg: &Config) -> Result<Vec<Word>> {
    let region = word_region(grid, src.height(), src.width())?
        .shrink(cfg.region_padding as i32)?;

    let histogram = horizontal_histogram(src, &region)?;
    let mut word_boxes = words_from_histogram(&region, &histogram, cfg.word_row_threshold);

    // Breathing room above and below each word, clamped to the image.
    let margin = cfg.word_margin as i32;
    for b in &mut word_boxes {
        b.tl.y = (b.tl.y - margin).max(0);
        b.br.y = (b.br.y + margin).min(src.height() as i32 - 1);
    }

    let mut words = Vec::with_capacity(word_boxes.len());
    for bbox in word_boxes {
        let histogram = vertical_histogram(src, &bbox)?;
        let letters = letters_from_histogram(&bbox, &histogram, cfg.letter_col_threshold);
        if letters.is_empty() {
            debug!(?bbox, "dropping word box without letters");
            continue;
        }
        words.push(Word { bbox, letters });
    }

    split_oversize_letters(&mut words);
    debug!(words = words.len(), "word list segmented");
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hough::{detect_grid, intersection_grid, Line};

    fn pt(x: i32, y: i32) -> Point {
        Point { x, y }
    }

    fn lattice(ys: &[f32], xs: &[f32]) -> PointGrid {
        let rows: Vec<Line> = ys.iter().map(|&r| Line { r, theta: 90.0 }).collect();
        let cols: Vec<Line> = xs.iter().map(|&r| Line { r, theta: 0.0 }).collect();
        intersection_grid(&rows, &cols).unwrap()
    }

    #[test]
    fn test_cell_boxes_are_row_major() {
        let grid = lattice(&[0.0, 100.0, 200.0], &[0.0, 50.0, 100.0]);
        let cells = cell_boxes(&grid);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], BoundingBox::new(pt(0, 0), pt(50, 100)));
        assert_eq!(cells[1], BoundingBox::new(pt(50, 0), pt(100, 100)));
        assert_eq!(cells[2], BoundingBox::new(pt(0, 100), pt(50, 200)));
    }

    #[test]
    fn test_grid_bbox_spans_lattice() {
        let grid = lattice(&[10.0, 110.0], &[20.0, 220.0]);
        assert_eq!(grid_bbox(&grid), BoundingBox::new(pt(20, 10), pt(220, 110)));
    }

    /// End-to-end segmenter round trip on the literal 3x3 ruled page.
    #[test]
    fn test_synthetic_grid_round_trip() {
        let mut src = Matrix::filled(300, 300, 255.0).unwrap();
        for &pos in &[0usize, 100, 200, 299] {
            for i in 0..300 {
                src.set(pos, i, 0.0);
                src.set(i, pos, 0.0);
            }
        }
        let cfg = Config::default();
        let lattice = detect_grid(&src, &cfg).unwrap();
        let cells = cell_boxes(&lattice);
        assert_eq!(cells.len(), 9);
        for i in 0..3i32 {
            for j in 0..3i32 {
                let cell = cells[(i * 3 + j) as usize];
                assert!((cell.tl.x - j * 100).abs() <= 1);
                assert!((cell.tl.y - i * 100).abs() <= 1);
                assert!((cell.br.x - (j + 1) * 100).abs() <= 1);
                assert!((cell.br.y - (i + 1) * 100).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_word_region_picks_largest_strip() {
        // Grid in the upper-left corner of a tall page: the bottom strip
        // wins.
        let grid = BoundingBox::new(pt(10, 10), pt(190, 190));
        let region = word_region(&grid, 500, 200).unwrap();
        assert_eq!(region, BoundingBox::new(pt(0, 191), pt(199, 499)));
    }

    #[test]
    fn test_word_region_tie_prefers_top() {
        // Equal space on all four sides.
        let grid = BoundingBox::new(pt(100, 100), pt(199, 199));
        let region = word_region(&grid, 300, 300).unwrap();
        assert_eq!(region, BoundingBox::new(pt(0, 0), pt(299, 99)));
    }

    #[test]
    fn test_word_region_rejects_flush_grid() {
        let grid = BoundingBox::new(pt(0, 0), pt(99, 99));
        assert!(word_region(&grid, 100, 100).is_err());
    }

    #[test]
    fn test_histograms_count_ink() {
        let mut src = Matrix::filled(10, 10, 255.0).unwrap();
        for col in 2..7 {
            src.set(4, col, 0.0);
        }
        let area = BoundingBox::new(pt(0, 0), pt(9, 9));
        let horizontal = horizontal_histogram(&src, &area).unwrap();
        assert_eq!(horizontal[4], 5);
        assert_eq!(horizontal[3], 0);
        let vertical = vertical_histogram(&src, &area).unwrap();
        assert_eq!(vertical[2], 1);
        assert_eq!(vertical[8], 0);
    }

    fn stamp(src: &mut Matrix, x0: i32, y0: i32, w: i32, h: i32) {
        for row in y0..y0 + h {
            for col in x0..x0 + w {
                src.set(row as usize, col as usize, 0.0);
            }
        }
    }

    #[test]
    fn test_segment_words_finds_rows_and_letters() {
        let mut src = Matrix::filled(400, 200, 255.0).unwrap();
        // Fake grid strokes in the upper half so the region below wins.
        let grid = BoundingBox::new(pt(0, 0), pt(199, 199));

        // Two "words" of solid 10x10 letter blocks with 5px gaps.
        for (word, y) in [(0, 250i32), (1, 300)] {
            let letters = 3 + word;
            for l in 0..letters {
                stamp(&mut src, 40 + l * 15, y, 10, 10);
            }
        }

        let cfg = Config {
            region_padding: 5,
            word_margin: 2,
            ..Config::default()
        };
        let words = segment_words(&src, &grid, &cfg).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].letters.len(), 3);
        assert_eq!(words[1].letters.len(), 4);
        for word in &words {
            for letter in &word.letters {
                assert_eq!(letter.br.x - letter.tl.x + 1, 10);
            }
        }
    }

    #[test]
    fn test_split_oversize_letter() {
        // Five 10-wide letters and one 30-wide blob: the average width is
        // 13, so the blob splits into 30/13 = 2 slices.
        let letters: Vec<BoundingBox> = vec![
            BoundingBox::new(pt(0, 0), pt(10, 10)),
            BoundingBox::new(pt(20, 0), pt(30, 10)),
            BoundingBox::new(pt(40, 0), pt(50, 10)),
            BoundingBox::new(pt(60, 0), pt(70, 10)),
            BoundingBox::new(pt(80, 0), pt(90, 10)),
            BoundingBox::new(pt(100, 0), pt(130, 10)),
        ];
        let mut words = vec![Word {
            bbox: BoundingBox::new(pt(0, 0), pt(130, 10)),
            letters,
        }];
        split_oversize_letters(&mut words);
        let letters = &words[0].letters;
        assert_eq!(letters.len(), 7);
        assert_eq!(letters[5], BoundingBox::new(pt(100, 0), pt(115, 10)));
        // The last slice absorbs the rounding remainder.
        assert_eq!(letters[6], BoundingBox::new(pt(115, 0), pt(130, 10)));
    }

    #[test]
    fn test_split_leaves_regular_letters_alone() {
        let letters: Vec<BoundingBox> = (0..4)
            .map(|i| BoundingBox::new(pt(i * 20, 0), pt(i * 20 + 10, 10)))
            .collect();
        let mut words = vec![Word {
            bbox: BoundingBox::new(pt(0, 0), pt(70, 10)),
            letters: letters.clone(),
        }];
        split_oversize_letters(&mut words);
        assert_eq!(words[0].letters, letters);
    }
}
