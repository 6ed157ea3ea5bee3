use std::io;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use langsync_cli::backend::BackendKind;
use langsync_cli::cleanup::{CleanupOptions, run_cleanup_command};
use langsync_cli::lockfile::run_lockfile_command;
use langsync_cli::rekey::{RekeyOptions, run_rekey_command};
use langsync_cli::run::{RunOptions, run_translate_command};
use langsync_cli::status::run_status_command;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to i18n.json or i18n.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate keys that were added or changed since the last run.
    Run {
        /// Only process these target locales (repeatable)
        #[arg(short, long = "locale")]
        locales: Vec<String>,

        /// Translation backend
        #[arg(long, value_enum, default_value_t = BackendKind::Pseudo)]
        backend: BackendKind,

        /// Program to run for `--backend command`
        #[arg(long)]
        command: Option<String>,

        /// Translate every key, not only the changed ones
        #[arg(long)]
        force: bool,

        /// Fail instead of translating when anything is out of date
        #[arg(long, conflicts_with_all = ["force", "dry_run"])]
        frozen: bool,

        /// Print what would be translated without calling the backend
        #[arg(long)]
        dry_run: bool,
    },

    /// Show added, changed and stale keys per source file.
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Record fingerprints of the current source files without translating.
    Lockfile {
        /// Overwrite an existing lock file
        #[arg(long)]
        force: bool,
    },

    /// Remove keys that no longer exist in the source from target files and the lock file.
    Cleanup {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Only print what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Rename keys in the lock file and target files.
    Rekey {
        /// JSON file mapping original keys to new keys
        #[arg(short, long)]
        mapping: String,

        /// Only rename keys of this source file
        #[arg(long)]
        file: Option<String>,

        /// Only print what would be renamed
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    let config = args.config.as_deref();

    let result = match args.commands {
        Commands::Run {
            locales,
            backend,
            command,
            force,
            frozen,
            dry_run,
        } => run_translate_command(RunOptions {
            config: args.config.clone(),
            locales,
            backend,
            command,
            force,
            frozen,
            dry_run,
        })
        .await
        .map(|_| ()),
        Commands::Status { json } => run_status_command(config, json),
        Commands::Lockfile { force } => run_lockfile_command(config, force).map(|_| ()),
        Commands::Cleanup { yes, dry_run } => {
            run_cleanup_command(config, CleanupOptions { yes, dry_run })
        }
        Commands::Rekey {
            mapping,
            file,
            dry_run,
        } => run_rekey_command(
            config,
            RekeyOptions {
                mapping,
                file,
                dry_run,
            },
        ),
        Commands::Completions { shell } => {
            generate(shell, &mut Args::command(), "langsync", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
