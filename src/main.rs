use anyhow::Result;
use clap::{Parser, Subcommand};
use docsearch::api::{create_router, AppState};
use docsearch::scanner::DEFAULT_EXTENSION;
use docsearch::{
    BackendKind, Config, CorpusScanner, LocalBackend, MeiliBackend, SearchBackend, SearchService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Full-text search over an MDX documentation tree", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root of the content tree
    #[arg(long, global = true)]
    content: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,

    #[arg(long, global = true, env = "MEILISEARCH_HOST")]
    meili_host: Option<String>,

    #[arg(long, global = true, env = "MEILISEARCH_API_KEY", hide_env_values = true)]
    meili_key: Option<String>,

    /// Index name
    #[arg(long, global = true)]
    index: Option<String>,

    /// Data directory of the local backend
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the search and docs endpoints over HTTP
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Build or refresh the search index
    Index,
    /// Run a single query
    Search {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Show what would be indexed without touching the engine
    Scan {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Config file (or defaults) overlaid with command-line flags
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(content) = &cli.content {
        config.docs_dir = content.join("docs");
        config.content_dir = content.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(host) = &cli.meili_host {
        config.meili.host = host.clone();
    }
    if let Some(key) = &cli.meili_key {
        config.meili.api_key = Some(key.clone());
    }
    if let Some(index) = &cli.index {
        config.index = index.clone();
    }
    if let Some(data) = &cli.data {
        config.local.data_dir = Some(data.clone());
    }

    Ok(config)
}

fn scan(config: &Config, scanner: &CorpusScanner, json: bool) -> Result<()> {
    let report = scanner.scan(&config.content_dir)?;

    if json {
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|err| serde_json::json!({ "path": err.path(), "error": err.to_string() }))
            .collect();
        let output = serde_json::json!({ "documents": report.documents, "skipped": skipped });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for doc in &report.documents {
        println!("{}\t{}", doc.id, doc.title);
    }
    for err in &report.skipped {
        eprintln!("skipped {}: {}", err.path().display(), err);
    }
    let summary = report.summary();
    println!();
    println!("{} documents, {} skipped", summary.documents, summary.skipped);
    Ok(())
}

async fn run<B: SearchBackend>(
    command: Commands,
    config: &Config,
    scanner: CorpusScanner,
    backend: B,
) -> Result<()> {
    let service = SearchService::new(backend, config.content_dir.clone())
        .with_index(config.index.clone())
        .with_scanner(scanner.clone());

    match command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            let service = Arc::new(service);

            let warmup = Arc::clone(&service);
            tokio::spawn(async move {
                if let Err(err) = warmup.ensure_ready().await {
                    tracing::warn!("Search index not ready yet: {}", err);
                }
            });

            let extension = config
                .extensions
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
            let app = create_router(AppState::new(service, config.docs_dir.clone(), extension));

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            tracing::info!("Listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
        Commands::Index => {
            let summary = service.reindex().await?;
            println!(
                "Indexed {} documents into `{}` ({} skipped)",
                summary.documents,
                service.index_name(),
                summary.skipped
            );
        }
        Commands::Search { query, json } => {
            let results = service.query(&query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results for \"{}\"", query);
            } else {
                for (rank, result) in results.iter().enumerate() {
                    println!("{}. {} ({})", rank + 1, result.title, result.slug);
                    if !result.description.is_empty() {
                        println!("   {}", result.description);
                    }
                    println!("   {}", result.snippet.replace('\n', " "));
                }
            }
        }
        Commands::Scan { json } => scan(config, &scanner, json)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = load_config(&cli)?;
    let scanner = CorpusScanner::with_extensions(&config.extensions);

    match config.backend {
        BackendKind::Meili => {
            tracing::info!("Using Meilisearch at {}", config.meili.host);
            let backend = MeiliBackend::new(config.meili.host.clone(), config.meili.api_key.clone())
                .with_task_timeout(config.meili.task_timeout(), config.meili.poll_interval());
            run(cli.command, &config, scanner, backend).await
        }
        BackendKind::Local => {
            let backend = match &config.local.data_dir {
                Some(dir) => {
                    tracing::info!("Using local index at {}", dir.display());
                    LocalBackend::open(dir)?
                }
                None => {
                    tracing::info!("Using temporary local index");
                    LocalBackend::in_memory()?
                }
            };
            run(cli.command, &config, scanner, backend).await
        }
    }
}
