//! Grading CLI
//!
//! Build grade tables from JSON inputs, diff two tables, and inspect a scenario store file.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use grading_cli::{
    build_table, compare, diff_tables, list, load_config, render_comparison, render_diff,
    render_list, render_table,
};

#[derive(Parser)]
#[command(name = "grading")]
#[command(about = "Grade structure scenario tool", long_about = None)]
struct Cli {
    /// Config file (JSON or YAML). Defaults to $GRADING_CONFIG_PATH.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a grade table
    Build {
        /// Grade list JSON file
        #[arg(long)]
        grades: PathBuf,

        /// Scenario inputs JSON file
        #[arg(long)]
        inputs: PathBuf,
    },

    /// Budget impact of a candidate table against a baseline
    Diff {
        /// Candidate table JSON file
        #[arg(long)]
        candidate: PathBuf,

        /// Baseline table JSON file
        #[arg(long)]
        baseline: PathBuf,

        /// Headcount-by-grade JSON file
        #[arg(long)]
        headcount: PathBuf,
    },

    /// Side-by-side comparison of stored scenarios
    Compare {
        /// Scenario store file
        #[arg(long)]
        store: PathBuf,

        /// Scenario id (repeatable)
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Prepend the current structure as a column
        #[arg(long, default_value = "false")]
        include_current: bool,
    },

    /// List stored scenarios
    List {
        /// Scenario store file
        #[arg(long)]
        store: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { grades, inputs } => {
            let table = build_table(&grades, &inputs, &config)?;
            emit(cli.json, &table, || render_table(&table))?;
        }

        Commands::Diff { candidate, baseline, headcount } => {
            let report = diff_tables(&candidate, &baseline, &headcount)?;
            emit(cli.json, &report, || render_diff(&report))?;
        }

        Commands::Compare { store, ids, include_current } => {
            let view = compare(&store, &ids, include_current, config)?;
            emit(cli.json, &view, || render_comparison(&view))?;
        }

        Commands::List { store } => {
            let summaries = list(&store)?;
            if summaries.is_empty() && !cli.json {
                println!("No scenarios in {}", store.display());
            } else {
                emit(cli.json, &summaries, || render_list(&summaries))?;
            }
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}
