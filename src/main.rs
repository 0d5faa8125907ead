//! Analyze CLI: run the image-to-symbolic pipeline over one photograph
//! and print the artifacts the solver and the front-end consume.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use gridsight::hough::Point;
use gridsight::ocr::Classifier;
use gridsight::{render, solver, Config};

#[derive(Parser, Debug)]
#[command(
    name = "gridsight",
    about = "Solve a photographed word-search puzzle",
    version
)]
struct Args {
    /// Photograph or scan of the puzzle page (PNG or JPEG).
    image: PathBuf,

    /// Trained letter model file.
    #[arg(long)]
    model: PathBuf,

    /// Optional JSON file overriding pipeline parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write an annotated copy of the input image here.
    #[arg(long)]
    render: Option<PathBuf>,

    /// Dump every preprocessing stage as a PNG into this directory.
    #[arg(long)]
    stages: Option<PathBuf>,

    /// Skip solving; print only the recovered grid, words and polygons.
    #[arg(long)]
    no_solve: bool,
}

fn main() -> anyhow::Result<()> {
    gridsight::init_logging();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let classifier = Classifier::from_file(&args.model)
        .with_context(|| format!("loading model {}", args.model.display()))?;
    let image = gridsight::imageio::load_image(&args.image)
        .with_context(|| format!("loading image {}", args.image.display()))?;

    if let Some(dir) = &args.stages {
        gridsight::pipeline::dump_stages(&image, &cfg, dir)
            .with_context(|| format!("dumping stages to {}", dir.display()))?;
    }

    let analysis = gridsight::analyze(&image, &classifier, &cfg)
        .with_context(|| format!("analyzing {}", args.image.display()))?;

    // The three artifacts, in the order the front-end reads them.
    print!("{}", analysis.grid);
    println!();
    for word in &analysis.words {
        println!("{word}");
    }
    println!();
    for cell in &analysis.cells {
        println!("({},{},{},{})", cell.tl.x, cell.tl.y, cell.br.x, cell.br.y);
    }

    let mut matches: Vec<(Point, Point)> = Vec::new();
    if !args.no_solve {
        println!();
        for word in &analysis.words {
            if word.contains('?') {
                println!("{word}: unreadable");
                continue;
            }
            match solver::solve(&analysis.grid, word) {
                Ok(found) => {
                    println!("{word}: {}", solver::format_result(found));
                    if let Some(span) = found {
                        matches.push(span);
                    }
                }
                Err(e) => println!("{word}: {e}"),
            }
        }
    }

    if let Some(path) = &args.render {
        let annotated = render::render_analysis(&image, &analysis, &matches);
        annotated
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("annotated image written to {}", path.display());
    }

    Ok(())
}
