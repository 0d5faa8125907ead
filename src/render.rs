//! Visualization of pipeline artifacts: lattice points, cell and word
//! boxes, and solved-word highlights drawn back onto the input image.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::hough::{Point, PointGrid};
use crate::pipeline::Analysis;
use crate::segment::BoundingBox;

const CELL_COLOR: Rgb<u8> = Rgb([0, 160, 0]);
const WORD_COLOR: Rgb<u8> = Rgb([0, 80, 220]);
const LETTER_COLOR: Rgb<u8> = Rgb([200, 120, 0]);
const POINT_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([220, 0, 120]);

fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let width = bbox.width().max(1) as u32;
    let height = bbox.height().max(1) as u32;
    draw_hollow_rect_mut(img, Rect::at(bbox.tl.x, bbox.tl.y).of_size(width, height), color);
}

/// Marks every lattice intersection with a small dot.
pub fn draw_lattice(img: &mut RgbImage, lattice: &PointGrid) {
    for row in 0..lattice.height() {
        for col in 0..lattice.width() {
            let p = lattice.at(row, col);
            draw_filled_circle_mut(img, (p.x, p.y), 3, POINT_COLOR);
        }
    }
}

/// Outlines a set of boxes.
pub fn draw_boxes(img: &mut RgbImage, boxes: &[BoundingBox], color: Rgb<u8>) {
    for bbox in boxes {
        draw_box(img, bbox, color);
    }
}

fn cell_center(analysis: &Analysis, cell: Point) -> (f32, f32) {
    let cols = analysis.grid.cols();
    let bbox = analysis.cells[cell.y as usize * cols + cell.x as usize];
    (
        (bbox.tl.x + bbox.br.x) as f32 / 2.0,
        (bbox.tl.y + bbox.br.y) as f32 / 2.0,
    )
}

/// Draws a stroke from the centre of the start cell to the centre of the
/// end cell of a found word.
pub fn highlight_match(img: &mut RgbImage, analysis: &Analysis, start: Point, end: Point) {
    let from = cell_center(analysis, start);
    let to = cell_center(analysis, end);
    // A few parallel strokes make the highlight readable on photographs.
    for offset in -1..=1 {
        draw_line_segment_mut(
            img,
            (from.0, from.1 + offset as f32),
            (to.0, to.1 + offset as f32),
            HIGHLIGHT_COLOR,
        );
    }
}

/// Copy of the input with every recovered artifact drawn on top:
/// lattice dots, cell boxes, word and letter boxes, and one stroke per
/// solved word.
pub fn render_analysis(
    image: &RgbImage,
    analysis: &Analysis,
    matches: &[(Point, Point)],
) -> RgbImage {
    let mut out = image.clone();
    draw_boxes(&mut out, &analysis.cells, CELL_COLOR);
    for word in &analysis.word_boxes {
        draw_box(&mut out, &word.bbox, WORD_COLOR);
        draw_boxes(&mut out, &word.letters, LETTER_COLOR);
    }
    draw_lattice(&mut out, &analysis.lattice);
    for &(start, end) in matches {
        highlight_match(&mut out, analysis, start, end);
    }
    out
}
