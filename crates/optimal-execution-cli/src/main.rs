mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::execution::{AdaptiveArgs, FrontierArgs, StaticArgs};

/// Optimal trade-execution trajectory analytics
#[derive(Parser)]
#[command(
    name = "oex",
    version,
    about = "Optimal trade-execution trajectory analytics",
    long_about = "A CLI for computing optimal trade-execution trajectories: static \
                  mean-variance efficient trajectories, efficient-frontier sweeps, and \
                  adaptive closed-loop trajectories under stochastic liquidity and \
                  volatility."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Static efficient trajectory for one risk-aversion level
    Static(StaticArgs),
    /// Adaptive closed-loop trajectory under a stochastic market state
    Adaptive(AdaptiveArgs),
    /// Sweep the cost/variance efficient frontier
    Frontier(FrontierArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Static(args) => commands::execution::run_static(args),
        Commands::Adaptive(args) => commands::execution::run_adaptive(args),
        Commands::Frontier(args) => commands::execution::run_frontier(args),
        Commands::Version => {
            println!("oex {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
