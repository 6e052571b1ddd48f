use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

use broadsheet::build::{build_site, check, BuildReport};
use broadsheet::config::Config;

#[derive(clap::Parser)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Builds page data and feeds into the output directory.
    Build {
        /// The project directory. Parent directories are searched for the
        /// project file too.
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Overrides the project's output directory.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exits non-zero if any file was skipped or any feed wasn't written.
        #[arg(long)]
        strict: bool,
    },

    /// Parses every collection and validates tags without writing anything.
    Check {
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(
            EnvFilter::try_from_env("BROADSHEET_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse().command) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Command::Build {
            project,
            output,
            strict,
        } => {
            let config = Config::from_directory(&project, output.as_deref())?;
            let report = build_site(&config)?;
            print_summary(&report);
            Ok(exit_code(&report, strict))
        }
        Command::Check { project } => {
            let config = Config::from_directory(&project, None)?;
            let report = check(&config)?;
            print_summary(&report);
            Ok(exit_code(&report, true))
        }
    }
}

fn exit_code(report: &BuildReport, strict: bool) -> ExitCode {
    match strict && !report.is_clean() {
        true => ExitCode::FAILURE,
        false => ExitCode::SUCCESS,
    }
}

fn print_summary(report: &BuildReport) {
    for c in &report.collections {
        println!(
            "{}: {} published, {} drafts, {} pages, {} tags",
            c.name, c.published, c.drafts, c.pages, c.tags
        );
    }
    for (collection, err) in &report.skipped {
        println!("skipped ({}): {}", collection, err);
    }
    for err in &report.feed_failures {
        println!("feed failed: {}", err);
    }
}
