//! Solver CLI: `solver <grid_file> <word>` prints the zero-based start
//! and end coordinates of the word, or `Not found`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use gridsight::solver::{format_result, solve, Grid};

#[derive(Parser, Debug)]
#[command(name = "solver", about = "Search one word in a letter grid file")]
struct Args {
    /// Text file with one row of letters per line.
    grid_file: PathBuf,

    /// Word to search for (case-insensitive).
    word: String,
}

fn main() -> anyhow::Result<()> {
    gridsight::init_logging();
    let args = Args::parse();

    let grid = Grid::load(&args.grid_file)
        .with_context(|| format!("loading grid {}", args.grid_file.display()))?;
    let found = solve(&grid, &args.word)?;
    println!("{}", format_result(found));
    Ok(())
}
