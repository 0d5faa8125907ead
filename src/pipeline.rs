//! End-to-end assembly: preprocess, detect the lattice, segment, classify
//! and gather the three artifacts the solver and renderer consume.

use image::RgbImage;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::hough::{detect_grid, PointGrid};
use crate::imageio::crop_matrix;
use crate::matrix::Matrix;
use crate::ocr::Classifier;
use crate::preprocess;
use crate::segment::{self, BoundingBox, Word};
use crate::solver::Grid;

/// Everything the image-to-symbolic pipeline recovers from one page.
pub struct Analysis {
    /// Upper-case letter grid, `(h−1) × (w−1)` for an `h × w` lattice.
    pub grid: Grid,
    /// Target words in reading order, as classified (lower-case, `?` for
    /// unreadable letters).
    pub words: Vec<String>,
    /// The raw intersection lattice, for rendering.
    pub lattice: PointGrid,
    /// Cell rectangles, row-major, one per grid letter.
    pub cells: Vec<BoundingBox>,
    /// Word and letter boxes inside the word-list region.
    pub word_boxes: Vec<Word>,
}

fn classify_box(classifier: &Classifier, bin: &Matrix, bbox: &BoundingBox) -> char {
    match crop_matrix(bin, bbox.tl.x, bbox.tl.y, bbox.br.x, bbox.br.y) {
        Ok(tile) => classifier.classify_lossy(&tile),
        Err(_) => '?',
    }
}

/// Runs the full pipeline over a decoded image.
#[instrument(skip_all)]
pub fn analyze(image: &RgbImage, classifier: &Classifier, cfg: &Config) -> Result<Analysis> {
    let pre = preprocess::process(image, cfg)?;

    // Ruling strokes can be thin; detection reads the pre-morphology
    // matrix while everything downstream reads the cleaned one.
    let lattice = detect_grid(&pre.aligned, cfg)?;
    let bin = pre.cleaned;
    drop(pre.aligned);
    let rows = lattice.height() - 1;
    let cols = lattice.width() - 1;
    info!(rows, cols, "grid lattice detected");

    let cells = segment::cell_boxes(&lattice);
    let grid_box = segment::grid_bbox(&lattice);
    let word_boxes = segment::segment_words(&bin, &grid_box, cfg)?;

    let letters: Vec<char> = cells
        .iter()
        .map(|cell| classify_box(classifier, &bin, cell).to_ascii_uppercase())
        .collect();
    let grid = Grid::new(rows, cols, letters)?;

    let words: Vec<String> = word_boxes
        .iter()
        .map(|word| {
            word.letters
                .iter()
                .map(|letter| classify_box(classifier, &bin, letter))
                .collect()
        })
        .collect();
    info!(words = words.len(), "page analyzed");

    Ok(Analysis {
        grid,
        words,
        lattice,
        cells,
        word_boxes,
    })
}

/// Convenience entry point: decode the image, load the model, analyze.
pub fn analyze_file(
    image_path: impl AsRef<std::path::Path>,
    model_path: impl AsRef<std::path::Path>,
    cfg: &Config,
) -> Result<Analysis> {
    let classifier = Classifier::from_file(model_path)?;
    let image = crate::imageio::load_image(image_path)?;
    analyze(&image, &classifier, cfg)
}

/// Re-runs the preprocessing chain and writes every stage as a grayscale
/// PNG into `dir`, for inspection.
pub fn dump_stages(
    image: &RgbImage,
    cfg: &Config,
    dir: impl AsRef<std::path::Path>,
) -> Result<()> {
    use crate::imageio::save_matrix_png;
    use crate::preprocess::{adaptive_threshold, grayscale, morph, Morph};

    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let gray = grayscale(image)?;
    save_matrix_png(&gray, dir.join("grayscale.png"))?;

    let thresholded = adaptive_threshold(
        &gray,
        cfg.max_value,
        cfg.threshold_kernel,
        cfg.threshold_sigma,
        cfg.threshold_c,
    )?;
    save_matrix_png(&thresholded, dir.join("thresholded.png"))?;

    let aligned = crate::deskew::deskew(&thresholded, cfg)?;
    save_matrix_png(&aligned, dir.join("deskewed.png"))?;

    let closed = morph(&aligned, cfg.closing_size, Morph::Closing)?;
    save_matrix_png(&closed, dir.join("closing.png"))?;

    let opened = morph(&closed, cfg.opening_size, Morph::Opening)?;
    save_matrix_png(&opened, dir.join("opening.png"))?;

    info!("stage images written to {}", dir.display());
    Ok(())
}
