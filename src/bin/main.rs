//! CLI entry point (C12): two subcommands, `morph` and `coexpr`, each
//! taking a job YAML path. Initialises logging, runs the job, writes its
//! outputs, and maps the library's error classification to the exit codes
//! of §6. Never called from library code — `morphcoexpr::*` only ever
//! returns `Result`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::error;

use morphcoexpr::color::HashColourAssigner;
use morphcoexpr::driver::{run_coexpr_job, run_morph_job};
use morphcoexpr::error::Result;
use morphcoexpr::job::{load_coexpr_job, load_morph_job};
use morphcoexpr::writer::{write_coexpr_network, write_morph_text, write_morph_yaml};

#[derive(Parser, Debug)]
#[clap(name = "morphcoexpr", about = "Gene co-expression discovery: MORPH ranking and CoExpr network construction")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank genes of interest against expression matrices and clusterings.
    Morph {
        /// Path to the MORPH job YAML.
        job: PathBuf,
    },
    /// Build a Cytoscape-compatible co-expression network from baits.
    Coexpr {
        /// Path to the CoExpr job YAML.
        job: PathBuf,
    },
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Morph { job } => run_morph(&job),
        Command::Coexpr { job } => run_coexpr(&job),
    }
}

fn base_dir_of(job_path: &Path) -> PathBuf {
    job_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

fn run_morph(job_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(job_path).map_err(|e| morphcoexpr::error::Error::Io {
        path: job_path.to_path_buf(),
        source: e,
    })?;
    let job = load_morph_job(&text)?;
    let base_dir = base_dir_of(job_path);

    let results = run_morph_job(&job, &base_dir)?;
    std::fs::create_dir_all(&job.output_dir).map_err(|e| morphcoexpr::error::Error::Io {
        path: job.output_dir.clone(),
        source: e,
    })?;

    for (i, result) in results.iter().enumerate() {
        let stem = format!("goi_{i}");
        write_morph_text(result, &job.output_dir.join(format!("{stem}.txt")))?;
        if job.output_yaml {
            write_morph_yaml(result, &job.output_dir.join(format!("{stem}.yaml")))?;
        }
    }
    Ok(())
}

fn run_coexpr(job_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(job_path).map_err(|e| morphcoexpr::error::Error::Io {
        path: job_path.to_path_buf(),
        source: e,
    })?;
    let job = load_coexpr_job(&text)?;
    let base_dir = base_dir_of(job_path);

    let (store, network) = run_coexpr_job(&job, &base_dir)?;
    std::fs::create_dir_all(&job.output_dir).map_err(|e| morphcoexpr::error::Error::Io {
        path: job.output_dir.clone(),
        source: e,
    })?;
    write_coexpr_network(&store, &network, &HashColourAssigner, &job.output_dir)?;
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        error!("{e}");
        process::exit(e.exit_code());
    }
}
