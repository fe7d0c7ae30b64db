mod check;
mod schema;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "bindscope",
    version,
    about = "Resolves and validates dependency-injection binding graphs",
    long_about = "Bindscope reads component, module and class declarations, resolves the binding graph \
                  of every root component and reports missing or duplicate bindings, dependency cycles, \
                  scope violations and other configuration errors."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the binding graphs declared in a declaration file
    #[command(
        long_about = "Loads a JSON declaration file, validates every root component (or only the roots \
                      given with --root) and prints the diagnostics. Exits with a non-zero status when \
                      any error is reported."
    )]
    Check {
        /// Path to the JSON declaration file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Root component or module to validate; may be repeated
        #[arg(long = "root", value_name = "NAME")]
        roots: Vec<String>,

        /// Processor option such as bindscope.nullableValidation=WARNING; may be repeated
        #[arg(short = 'A', value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Also log to stderr
        #[arg(long)]
        verbose: bool,
    },
    /// Print the JSON schema of the declaration file format
    Schema,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Check { verbose: true, .. });
    let _guard = bindscope_core::logging::init_logging("check", verbose);

    let mut stdout = std::io::stdout().lock();
    match run_with(cli, &mut stdout) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Executes `cli`, writing its report to `out`.
///
/// Returns `false` when validation reported at least one error.
pub fn run_with(cli: Cli, out: &mut dyn Write) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Check {
            file,
            roots,
            options,
            verbose: _,
        } => check::run(&file, &roots, &options, out),
        Commands::Schema => {
            schema::run(out)?;
            Ok(true)
        }
    }
}
