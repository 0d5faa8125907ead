#![deny(clippy::all)]

//! Gridsight turns a photograph of a word-search page into a symbolic
//! puzzle: a letter grid with known dimensions, the list of target words,
//! and the pixel polygon of every grid cell so results can be rendered
//! back onto the input.
//!
//! The pipeline is a straight chain per image: preprocess, deskew, detect
//! the ruling lines, segment cells and the word list, classify each tile
//! with a feed-forward network, assemble. See `pipeline::analyze`.

pub mod config;
pub mod dataset;
pub mod deskew;
pub mod error;
pub mod hough;
pub mod imageio;
pub mod matrix;
pub mod network;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod render;
pub mod segment;
pub mod solver;

pub use config::Config;
pub use error::{Error, Result};
pub use matrix::Matrix;
pub use pipeline::{analyze, analyze_file, Analysis};

/// Installs the default `tracing` subscriber, honouring `RUST_LOG`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
