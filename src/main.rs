mod colors;
mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use commands::utils::TargetArgs;
use std::path::PathBuf;
use std::time::Duration;
use steep::config::Settings;
use steep::error::exit_code;

#[derive(Parser)]
#[command(name = "steep")]
#[command(author, version, about = "Resolve, verify and install binaries from release manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Retries after a failed download attempt [env: STEEP_MAX_RETRIES]
    #[arg(long, global = true, value_name = "N")]
    retries: Option<u32>,

    /// Per-attempt download timeout in seconds [env: STEEP_TIMEOUT_SECS]
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the artifact locator and digest for a platform
    Resolve {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Download and verify an artifact without installing it
    Fetch {
        #[command(flatten)]
        target: TargetArgs,

        /// Where to write the artifact (defaults to its file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download, verify and install a release
    Install {
        #[command(flatten)]
        target: TargetArgs,

        /// Install prefix [env: STEEP_PREFIX, HOMEBREW_PREFIX]
        #[arg(long)]
        prefix: Option<PathBuf>,

        /// Skip linking the binary into <prefix>/bin
        #[arg(long)]
        no_link: bool,
    },

    /// Verify a local file against the manifest digest
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// File to verify
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Fetch and verify every artifact in a release
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List releases in a manifest history and which are installed
    History {
        /// Manifest file, release history file, or directory of manifests
        #[arg(short, long)]
        manifest: PathBuf,
    },

    /// Show the detected host platform
    Platform,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "steep=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn settings(cli: &Cli) -> Settings {
    let mut settings = Settings::from_env();
    if let Some(retries) = cli.retries {
        settings.retry.max_retries = retries;
    }
    if let Some(secs) = cli.timeout.filter(|secs| *secs > 0) {
        settings.timeout = Duration::from_secs(secs);
    }
    settings
}

async fn run(cli: Cli) -> steep::Result<()> {
    let mut settings = settings(&cli);

    match cli.command {
        Commands::Resolve { target } => commands::resolve(&target),
        Commands::Fetch { target, output } => commands::fetch(&settings, &target, output).await,
        Commands::Install {
            target,
            prefix,
            no_link,
        } => {
            if let Some(prefix) = prefix {
                settings.prefix = prefix;
            }
            commands::install(&settings, &target, !no_link).await
        }
        Commands::Verify { target, file } => commands::verify(&target, &file),
        Commands::Check { target } => commands::check(&settings, &target).await,
        Commands::History { manifest } => commands::history(&settings, &manifest),
        Commands::Platform => commands::platform(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "steep", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_code::OTHER
            } else {
                exit_code::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);
    colors::init_colors();

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        std::process::exit(err.exit_code());
    }
}
