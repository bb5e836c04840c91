//! # folio CLI
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio render` | Bind the portfolio document onto the site template |
//! | `folio upload <paths…>` | Upload files to the configured Drive folder |
//! | `folio auth login` | Sign in with Google and optionally print the token |
//! | `folio auth logout` | Revoke the token in `FOLIO_ACCESS_TOKEN` |
//! | `folio rank fetch` | Append the current LeetCode rank to the feed |
//! | `folio rank stats` | Print current rank, best rank and days tracked |

use clap::{Parser, Subcommand};
use folio::config::{self, ConfigMissing};
use folio::progress::ProgressMode;
use folio::upload_cmd::UploadRequest;
use folio_core::orchestrator::OwnershipPolicy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// folio: render a portfolio page and upload files to Google Drive.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/folio.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "folio", version, about = "Portfolio renderer and Google Drive uploader")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the portfolio page.
    ///
    /// Fetches the document (URL or path), binds every section onto the
    /// template anchors, and writes the page. A document that cannot be
    /// loaded produces the error page and a non-zero exit.
    Render {
        /// Write here instead of `site.output`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Upload files to Google Drive.
    ///
    /// Directories are walked recursively. Files already present in the
    /// folder (same name, size and uploader) are skipped.
    Upload {
        /// Files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target folder id. Defaults to `drive.default_folder_id`.
        #[arg(long)]
        folder: Option<String>,

        /// Only take files under directories matching these globs.
        #[arg(long)]
        include: Vec<String>,

        /// Ownership transfer policy: `disabled`, `best-effort`, or `required`.
        #[arg(long)]
        ownership: Option<OwnershipPolicy>,

        /// Run against an in-memory Drive; nothing is sent anywhere.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Manage the Google sign-in.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Maintain the LeetCode rank feed.
    Rank {
        #[command(subcommand)]
        action: RankAction,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Sign in through the browser.
    Login {
        /// Print an `export FOLIO_ACCESS_TOKEN=…` line for reuse.
        #[arg(long)]
        print_token: bool,
    },
    /// Revoke the token in `FOLIO_ACCESS_TOKEN`.
    Logout,
}

#[derive(Subcommand)]
enum RankAction {
    /// Fetch the current rank and append it to the feed.
    Fetch {
        /// LeetCode username. Defaults to `rank.username`.
        #[arg(long)]
        user: Option<String>,
    },
    /// Print a summary of the feed.
    Stats,
}

fn print_config_banner(missing: &ConfigMissing) {
    eprintln!("⚠️ Configuration Required");
    eprintln!();
    eprintln!("Google Drive upload is not configured. Set these values in your config file");
    eprintln!("or through the FOLIO_CLIENT_ID / FOLIO_API_KEY environment variables:");
    for key in &missing.missing {
        eprintln!("  - {}", key);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let result = match cli.command {
        Commands::Render { output } => folio::render_cmd::run_render(&cfg, output).await,
        Commands::Upload {
            paths,
            folder,
            include,
            ownership,
            dry_run,
            progress,
        } => {
            let request = UploadRequest {
                paths,
                include,
                folder,
                ownership,
                dry_run,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            folio::upload_cmd::run_upload(&cfg, request).await
        }
        Commands::Auth { action } => match action {
            AuthAction::Login { print_token } => folio::auth_cmd::run_login(&cfg, print_token).await,
            AuthAction::Logout => folio::auth_cmd::run_logout(&cfg).await,
        },
        Commands::Rank { action } => match action {
            RankAction::Fetch { user } => folio::rank_fetch::run_rank_fetch(&cfg, user).await,
            RankAction::Stats => folio::rank_fetch::run_rank_stats(&cfg),
        },
    };

    if let Err(err) = &result {
        if let Some(missing) = err.downcast_ref::<ConfigMissing>() {
            print_config_banner(missing);
            std::process::exit(2);
        }
    }
    result
}
