//! End-to-end pipeline tests over synthetic pages written to disk.

use image::RgbImage;

use gridsight::deskew::{deskew, estimate_skew, rotate};
use gridsight::hough::detect_grid;
use gridsight::matrix::Matrix;
use gridsight::network::Network;
use gridsight::solver;
use gridsight::Config;

/// Model with zero weights and a hot bias: every tile classifies as the
/// same letter, which keeps the geometry checks independent of OCR
/// accuracy.
fn constant_model(hot: usize) -> Network {
    let weights = vec![Matrix::zeros(26, 784).unwrap()];
    let mut bias = Matrix::zeros(26, 1).unwrap();
    bias.set(hot, 0, 5.0);
    Network::from_parts(vec![784, 26], weights, vec![bias]).unwrap()
}

/// 400x400 page: a ruled 3x3 grid with a blob in every cell and a
/// three-blob word below it.
fn synthetic_page() -> RgbImage {
    let mut img = RgbImage::from_pixel(400, 400, image::Rgb([255, 255, 255]));
    let black = image::Rgb([0, 0, 0]);

    for &pos in &[20u32, 120, 220, 320] {
        for i in 20..=320 {
            img.put_pixel(i, pos, black);
            img.put_pixel(pos, i, black);
        }
    }
    let mut blob = |cx: u32, cy: u32| {
        for y in cy - 15..cy + 15 {
            for x in cx - 15..cx + 15 {
                img.put_pixel(x, y, black);
            }
        }
    };
    for row in 0..3u32 {
        for col in 0..3u32 {
            blob(70 + col * 100, 70 + row * 100);
        }
    }
    for letter in 0..3u32 {
        blob(80 + letter * 50, 370);
    }
    img
}

#[test]
fn test_analyze_file_recovers_page() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("page.png");
    let model_path = dir.path().join("letters.nn");

    synthetic_page().save(&image_path).unwrap();
    constant_model(23).save(&model_path).unwrap();

    let cfg = Config::default();
    let analysis = gridsight::analyze_file(&image_path, &model_path, &cfg).unwrap();

    assert_eq!(analysis.grid.rows(), 3);
    assert_eq!(analysis.grid.cols(), 3);
    assert_eq!(analysis.cells.len(), 9);
    for row in 0..3 {
        for col in 0..3 {
            assert_eq!(analysis.grid.at(row, col), 'X');
        }
    }
    assert_eq!(analysis.words, vec!["xxx".to_string()]);

    // Cell polygons line up with the printed ruling.
    let expected = [20i32, 120, 220, 320];
    for i in 0..3usize {
        for j in 0..3usize {
            let cell = analysis.cells[i * 3 + j];
            assert!((cell.tl.x - expected[j]).abs() <= 1);
            assert!((cell.tl.y - expected[i]).abs() <= 1);
            assert!((cell.br.x - expected[j + 1]).abs() <= 1);
            assert!((cell.br.y - expected[i + 1]).abs() <= 1);
        }
    }

    // The recovered grid feeds straight into the solver.
    let found = solver::solve(&analysis.grid, "XXX").unwrap();
    assert_eq!(solver::format_result(found), "(0,0)(2,0)");
}

#[test]
fn test_grid_file_round_trip_through_solver() {
    let dir = tempfile::tempdir().unwrap();
    let grid_path = dir.path().join("grid.txt");
    std::fs::write(&grid_path, "CATS\nOOOO\nXXXX\nYYYY\n").unwrap();

    let grid = solver::Grid::load(&grid_path).unwrap();
    let found = solver::solve(&grid, "cats").unwrap();
    assert_eq!(solver::format_result(found), "(0,0)(3,0)");
    assert_eq!(
        solver::format_result(solver::solve(&grid, "ZEBRA").unwrap()),
        "Not found"
    );
}

#[test]
fn test_dump_stages_writes_every_png() {
    let dir = tempfile::tempdir().unwrap();
    let stages = dir.path().join("stages");

    let cfg = Config::default();
    gridsight::pipeline::dump_stages(&synthetic_page(), &cfg, &stages).unwrap();

    for name in [
        "grayscale.png",
        "thresholded.png",
        "deskewed.png",
        "closing.png",
        "opening.png",
    ] {
        assert!(stages.join(name).is_file(), "missing {name}");
    }
}

/// A ruled page rotated by +10 degrees: the deskewer must report a −10
/// degree skew and, once rotated back, the lattice must keep its 100
/// pixel pitch.
#[test]
fn test_rotated_page_recovers_lattice() {
    let mut page = Matrix::filled(300, 300, 255.0).unwrap();
    for &pos in &[0usize, 100, 200, 299] {
        for i in 0..300 {
            page.set(pos, i, 0.0);
            page.set(i, pos, 0.0);
        }
    }

    let rotated = rotate(&page, 10.0, 255.0).unwrap();
    let skew = estimate_skew(&rotated).unwrap();
    assert!((skew - -10.0).abs() <= 0.5, "skew = {skew}");

    // Double resampling makes the one-pixel strokes wobble, which spreads
    // their votes across neighbouring r cells; a lower peak ratio keeps
    // every stroke above threshold.
    let cfg = Config {
        peak_ratio: 0.4,
        ..Config::default()
    };
    let aligned = deskew(&rotated, &cfg).unwrap();
    let lattice = detect_grid(&aligned, &cfg).unwrap();
    assert_eq!(lattice.height(), 4);
    assert_eq!(lattice.width(), 4);

    // Absolute coordinates shift with the grown canvas; pitch must not.
    for i in 0..4 {
        for j in 0..3 {
            let step = lattice.at(i, j + 1).x - lattice.at(i, j).x;
            let expected = if j == 2 { 99 } else { 100 };
            assert!((step - expected).abs() <= 3, "x pitch {step} at ({i},{j})");
        }
    }
    for j in 0..4 {
        for i in 0..3 {
            let step = lattice.at(i + 1, j).y - lattice.at(i, j).y;
            let expected = if i == 2 { 99 } else { 100 };
            assert!((step - expected).abs() <= 3, "y pitch {step} at ({i},{j})");
        }
    }
}
