//! listing-scraper: command-line entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use listing_scraper_cli::cli;
use listing_scraper_cli::cli::run::RunArgs;
use listing_scraper_cli::cli::scrape_cmd::BrowserArgs;

#[derive(Parser)]
#[command(
    name = "listing-scraper",
    about = "Scrape structured records from paginated listing pages",
    version,
    after_help = "Run 'listing-scraper <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a live listing in Chromium
    Scrape {
        /// Start URL (defaults to the job file's "url")
        url: Option<String>,

        #[command(flatten)]
        run: RunArgs,

        /// Show the browser window (e.g. to log in by hand)
        #[arg(long)]
        headful: bool,

        /// Chromium binary to use
        #[arg(long)]
        chromium: Option<PathBuf>,

        /// Seconds to wait after the first page opens
        #[arg(long)]
        login_wait: Option<u64>,

        /// Selector to wait for before the first extraction
        #[arg(long)]
        ready_selector: Option<String>,
    },
    /// Run a job over saved HTML pages
    Replay {
        /// HTML files in page order, or one directory of them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Write the built-in carrier-directory job file
    Init {
        /// Where to write it (default ./listing-job.json)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::output::set_json(cli.json);

    let result = match cli.command {
        Commands::Scrape {
            url,
            run,
            headful,
            chromium,
            login_wait,
            ready_selector,
        } => {
            let browser = BrowserArgs {
                headful,
                chromium,
                login_wait,
                ready_selector,
            };
            cli::scrape_cmd::run(url.as_deref(), &run, &browser).await
        }
        Commands::Replay { inputs, run } => cli::replay_cmd::run(&inputs, &run).await,
        Commands::Init { path, force } => cli::init_cmd::run(path.as_deref(), force),
        Commands::Doctor => cli::doctor::run(),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "listing-scraper", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
