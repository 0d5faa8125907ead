//! Word-search solving over the recovered letter grid.
//!
//! The solver is a plain eight-direction scan: for every start cell and
//! every unit direction it tries to match the word, first hit wins. The
//! interesting work happened upstream; this stage only needs to be
//! predictable.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::hough::Point;

/// Probe order: forward before reversed, horizontal before vertical
/// before the diagonals.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // east
    (-1, 0),  // west
    (0, 1),   // south
    (0, -1),  // north
    (1, 1),   // south-east
    (-1, -1), // north-west
    (-1, 1),  // south-west
    (1, -1),  // north-east
];

/// `rows × cols` buffer of upper-case letters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    letters: Vec<char>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, letters: Vec<char>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidInput(
                "grid dimensions must be non-zero".into(),
            ));
        }
        if letters.len() != rows * cols {
            return Err(Error::InvalidInput(format!(
                "{} letters cannot fill a {rows}x{cols} grid",
                letters.len()
            )));
        }
        Ok(Self { rows, cols, letters })
    }

    /// Parses a grid from its text form: one row of letters per line,
    /// all rows the same length.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut rows = 0;
        let mut cols = None;
        let mut letters = Vec::new();
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let width = line.chars().count();
            match cols {
                None => cols = Some(width),
                Some(expected) if expected != width => {
                    return Err(Error::InvalidInput(format!(
                        "ragged grid: row {} has {width} letters, expected {expected}",
                        rows + 1
                    )));
                }
                Some(_) => {}
            }
            letters.extend(line.chars().map(|c| c.to_ascii_uppercase()));
            rows += 1;
        }
        let cols = cols.ok_or_else(|| Error::InvalidInput("empty grid file".into()))?;
        Self::new(rows, cols, letters)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> char {
        self.letters[row * self.cols + col]
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                write!(f, "{}", self.at(row, col))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Upper-cases the word, rejecting anything that is not a letter.
pub fn normalize_word(word: &str) -> Result<String> {
    if word.is_empty() {
        return Err(Error::InvalidInput("empty search word".into()));
    }
    word.chars()
        .map(|c| {
            if c.is_ascii_alphabetic() {
                Ok(c.to_ascii_uppercase())
            } else {
                Err(Error::InvalidInput(format!(
                    "non-letter character '{c}' in search word"
                )))
            }
        })
        .collect()
}

fn matches_at(grid: &Grid, word: &[char], col: i32, row: i32, dx: i32, dy: i32) -> bool {
    let end_x = col + dx * (word.len() as i32 - 1);
    let end_y = row + dy * (word.len() as i32 - 1);
    if end_x < 0 || end_y < 0 || end_x >= grid.cols as i32 || end_y >= grid.rows as i32 {
        return false;
    }
    word.iter().enumerate().all(|(i, &c)| {
        let x = col + dx * i as i32;
        let y = row + dy * i as i32;
        grid.at(y as usize, x as usize) == c
    })
}

/// Finds `word` in the grid.
///
/// Returns the zero-based start and end coordinates (x right, y down) of
/// the first occurrence in row-major scan order, probing the eight
/// directions in a fixed order per cell.
pub fn solve(grid: &Grid, word: &str) -> Result<Option<(Point, Point)>> {
    let word: Vec<char> = normalize_word(word)?.chars().collect();

    for row in 0..grid.rows as i32 {
        for col in 0..grid.cols as i32 {
            for &(dx, dy) in &DIRECTIONS {
                if matches_at(grid, &word, col, row, dx, dy) {
                    let len = word.len() as i32 - 1;
                    return Ok(Some((
                        Point { x: col, y: row },
                        Point {
                            x: col + dx * len,
                            y: row + dy * len,
                        },
                    )));
                }
            }
        }
    }
    Ok(None)
}

/// Formats a solver result the way the CLI contract prints it.
pub fn format_result(result: Option<(Point, Point)>) -> String {
    match result {
        Some((start, end)) => format!("({},{})({},{})", start.x, start.y, end.x, end.y),
        None => "Not found".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> Grid {
        Grid::from_text("CATS\nOOOO\nXXXX\nYYYY").unwrap()
    }

    #[test]
    fn test_from_text_rejects_ragged_rows() {
        assert!(Grid::from_text("ABC\nAB").is_err());
        assert!(Grid::from_text("").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let grid = sample_grid();
        assert_eq!(Grid::from_text(&grid.to_string()).unwrap(), grid);
    }

    /// Literal scenario: CATS forward and TAC backward on the same row.
    #[test]
    fn test_horizontal_forward_and_backward() {
        let grid = sample_grid();
        let found = solve(&grid, "CATS").unwrap();
        assert_eq!(format_result(found), "(0,0)(3,0)");

        let found = solve(&grid, "TAC").unwrap();
        assert_eq!(format_result(found), "(2,0)(0,0)");
    }

    #[test]
    fn test_vertical_and_diagonal() {
        let grid = Grid::from_text("COXY\nAOXY\nTOXY\nSOXY").unwrap();
        let found = solve(&grid, "cats").unwrap();
        assert_eq!(format_result(found), "(0,0)(0,3)");

        let grid = Grid::from_text("CZZZ\nZAZZ\nZZTZ\nZZZS").unwrap();
        let found = solve(&grid, "CATS").unwrap();
        assert_eq!(format_result(found), "(0,0)(3,3)");
        let found = solve(&grid, "STAC").unwrap();
        assert_eq!(format_result(found), "(3,3)(0,0)");
    }

    #[test]
    fn test_anti_diagonal() {
        let grid = Grid::from_text("ZZZC\nZZAZ\nZTZZ\nSZZZ").unwrap();
        let found = solve(&grid, "CATS").unwrap();
        assert_eq!(format_result(found), "(3,0)(0,3)");
    }

    #[test]
    fn test_missing_word_not_found() {
        let grid = sample_grid();
        assert_eq!(format_result(solve(&grid, "DOG").unwrap()), "Not found");
    }

    #[test]
    fn test_word_longer_than_grid_not_found() {
        let grid = sample_grid();
        assert_eq!(
            format_result(solve(&grid, "CATSCATS").unwrap()),
            "Not found"
        );
    }

    #[test]
    fn test_rejects_non_letter_word() {
        let grid = sample_grid();
        assert!(solve(&grid, "CA-TS").is_err());
        assert!(solve(&grid, "").is_err());
    }
}
