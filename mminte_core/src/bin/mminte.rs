//! Command-line interface for predicting pairwise microbial interactions
//!
//! # Usage
//!
//! ```bash
//! # Build the community model of every pair of single species models
//! mminte pairs --output pairs/ models/*.json
//!
//! # Growth rates of community models under a diet
//! mminte growth --diet western.txt --output growth_rates.csv pairs/*.json
//!
//! # Both steps
//! mminte run --diet western.txt --pair-folder pairs/ --output growth_rates.csv models/*.json
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use mminte_core::analysis::{
    calculate_growth_rates, create_interaction_models, get_all_pairs, BatchOutcome,
};
use mminte_core::configuration::{self, Solver};
use mminte_core::interaction::{read_medium_json, Medium};
use mminte_core::io::is_supported;
use mminte_core::io::tabular::{read_diet_file, write_growth_rates_file};

/// Main CLI configuration struct
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of worker threads, defaults to the available cores capped at 4
    #[arg(short = 'j', long, global = true)]
    processes: Option<usize>,

    /// Linear program solver
    #[arg(long, value_enum, global = true, default_value_t = SolverChoice::Clarabel)]
    solver: SolverChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SolverChoice {
    Clarabel,
    Microlp,
    Highs,
}

impl From<SolverChoice> for Solver {
    fn from(choice: SolverChoice) -> Self {
        match choice {
            SolverChoice::Clarabel => Solver::Clarabel,
            SolverChoice::Microlp => Solver::Microlp,
            SolverChoice::Highs => Solver::Highs,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Create two species community models for all pairs of models
    Pairs {
        /// Single species model files (.json, .xml, .sbml or .mat)
        #[arg(required = true, num_args = 2..)]
        models: Vec<PathBuf>,

        /// Folder for the community model files
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Calculate growth rates of two species community models
    Growth {
        /// Community model files
        #[arg(required = true)]
        communities: Vec<PathBuf>,

        /// Diet as a tab separated file, or a JSON object when the extension is .json
        #[arg(short, long)]
        diet: PathBuf,

        /// CSV file for the growth rates
        #[arg(short, long, default_value = "growth_rates.csv")]
        output: PathBuf,
    },
    /// Create the community models of all pairs and calculate their growth rates
    Run {
        /// Single species model files
        #[arg(required = true, num_args = 2..)]
        models: Vec<PathBuf>,

        /// Diet as a tab separated file, or a JSON object when the extension is .json
        #[arg(short, long)]
        diet: PathBuf,

        /// Folder for the community model files
        #[arg(long, default_value = ".")]
        pair_folder: PathBuf,

        /// CSV file for the growth rates
        #[arg(short, long, default_value = "growth_rates.csv")]
        output: PathBuf,
    },
}

fn read_diet(path: &Path) -> Result<Medium, Box<dyn std::error::Error>> {
    if path.extension().is_some_and(|ext| ext == "json") {
        Ok(read_medium_json(path)?)
    } else {
        Ok(read_diet_file(path)?)
    }
}

fn report_failures<T>(outcome: &BatchOutcome<T>) {
    for failure in &outcome.failures {
        let inputs: Vec<String> = failure
            .inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        warn!(
            "Task {} ({}) failed: {}",
            failure.index,
            inputs.join(", "),
            failure.error
        );
    }
}

fn build_pairs(
    models: &[PathBuf],
    output: &Path,
    processes: Option<usize>,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if let Some(path) = models.iter().find(|path| !is_supported(path)) {
        return Err(format!("Unsupported model file {}", path.display()).into());
    }
    fs::create_dir_all(output)?;
    let pairs = get_all_pairs(models);
    let outcome = create_interaction_models(&pairs, output, processes)?;
    report_failures(&outcome);
    info!(
        "Created {} of {} community models",
        outcome.completed.len(),
        pairs.len()
    );
    Ok(outcome.completed)
}

fn growth(
    communities: &[PathBuf],
    diet: &Path,
    output: &Path,
    processes: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let medium = read_diet(diet)?;
    let rates = calculate_growth_rates(communities, &medium, processes)?;
    report_failures(&rates);
    write_growth_rates_file(&rates.completed, output)?;
    info!(
        "Wrote growth rates of {} communities to {}",
        rates.completed.len(),
        output.display()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    configuration::set(configuration::Configuration {
        solver: cli.solver.into(),
        ..configuration::current()
    });

    match &cli.command {
        Commands::Pairs { models, output } => {
            build_pairs(models, output, cli.processes)?;
        }
        Commands::Growth {
            communities,
            diet,
            output,
        } => growth(communities, diet, output, cli.processes)?,
        Commands::Run {
            models,
            diet,
            pair_folder,
            output,
        } => {
            let communities = build_pairs(models, pair_folder, cli.processes)?;
            growth(&communities, diet, output, cli.processes)?;
        }
    }
    Ok(())
}
