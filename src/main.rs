use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use turath_library::config::LibraryConfig;
use turath_library::{LibraryService, TOOL_NAMES};

/// Catalog tools for the Turath library: sync, enrichment and citations.
#[derive(Parser)]
#[command(name = "turath-library", version, about)]
struct Cli {
    /// Local metadata database (overrides TURATH_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Catalog API base URL (overrides TURATH_API_BASE_URL).
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Base URL for citation links (overrides TURATH_REFERENCE_BASE_URL).
    #[arg(long, global = true)]
    reference_base: Option<String>,

    /// Default catalog API version.
    #[arg(long, global = true)]
    api_version: Option<u32>,

    /// HTTP timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available tools.
    Tools,
    /// Create the cache tables in an empty database file.
    InitDb,
    /// Run one tool and print its JSON result.
    Call {
        /// Tool name, e.g. get_book_details.
        tool: String,
        /// Arguments as a JSON object, e.g. '{"book_id": 23622}'.
        #[arg(default_value = "{}")]
        args: String,
    },
}

impl Cli {
    fn apply(&self, config: &mut LibraryConfig) {
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        if let Some(api_base) = &self.api_base {
            config.api_base_url = api_base.clone();
        }
        if let Some(reference_base) = &self.reference_base {
            config.reference_base_url = reference_base.clone();
        }
        if let Some(api_version) = self.api_version {
            config.api_version = api_version;
        }
        if let Some(secs) = self.timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Tools = cli.command {
        for name in TOOL_NAMES {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let mut config = match LibraryConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    if let Commands::InitDb = cli.command {
        return match turath_library::db::init_schema(&config.db_path) {
            Ok(_) => {
                tracing::info!(db = %config.db_path.display(), "cache schema ready");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!("{}", err);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(err) = config.ensure_database_exists() {
        tracing::error!("{}; make sure the metadata database is in place", err);
        return ExitCode::FAILURE;
    }
    tracing::info!(db = %config.db_path.display(), api = %config.api_base_url, "starting");

    let service = match LibraryService::from_config(&config) {
        Ok(service) => service,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let Commands::Call { tool, args } = cli.command else {
        return ExitCode::SUCCESS;
    };
    let args: serde_json::Value = match serde_json::from_str(&args) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!("arguments must be a JSON object: {}", err);
            return ExitCode::FAILURE;
        }
    };

    // Store calls go to the blocking pool; everything else stays on one thread.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(config.max_blocking_threads)
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("failed to start runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(service.call(&tool, args));
    match serde_json::to_string_pretty(&result) {
        Ok(text) => println!("{}", text),
        Err(err) => {
            tracing::error!("failed to print result: {}", err);
            return ExitCode::FAILURE;
        }
    }

    if result.get("error").is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
