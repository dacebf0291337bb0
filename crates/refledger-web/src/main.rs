use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod handlers;
mod models;
mod state;

use refledger_affiliation::{AffiliationResolver, ResolverConfig};
use refledger_core::config_file::{self, ConfigFile};
use refledger_core::{
    EnhancementOrchestrator, ExtractionOrchestrator, JobRegistry, RecordStore,
};
use refledger_llm::{OpenAiBackend, ReferenceExtractor};
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "refledger-web", about = "Reference ledger API server")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 5002)]
    port: u16,

    /// Where records and job history are stored. Defaults to the
    /// platform data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn env_or_config(env_key: &str, config_value: Option<String>) -> Option<String> {
    std::env::var(env_key).ok().or(config_value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config: ConfigFile = config_file::load_config();
    let api_keys = config.api_keys.unwrap_or_default();
    let tuning = config.tuning.unwrap_or_default();

    let openai_key = env_or_config("OPENAI_API_KEY", api_keys.openai_key)
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set (env or config file)"))?;
    let openai_model = env_or_config("OPENAI_MODEL", api_keys.openai_model)
        .unwrap_or_else(|| "gpt-4o-mini".to_string());

    let data_dir = args
        .data_dir
        .or_else(|| {
            config
                .storage
                .and_then(|s| s.data_dir)
                .map(PathBuf::from)
        })
        .unwrap_or_else(config_file::default_data_dir);
    tracing::info!(data_dir = %data_dir.display(), "using data directory");

    let store = Arc::new(RecordStore::new(data_dir.join("records.json")));
    let registry = Arc::new(JobRegistry::new(data_dir.join("jobs")));

    // Hourly sweep: terminal jobs older than a day leave memory. Their
    // persisted snapshots stay on disk.
    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(Duration::from_secs(60 * 60));
            loop {
                sweep.tick().await;
                registry.evict_finished(Duration::from_secs(24 * 60 * 60));
            }
        });
    }

    let client = reqwest::Client::new();
    let mut extractor =
        ReferenceExtractor::new(Arc::new(OpenAiBackend::new(openai_key, openai_model)), client.clone());
    if let Some(secs) = tuning.model_timeout_secs {
        extractor = extractor.with_timeout(Duration::from_secs(secs));
    }

    let resolver_config = ResolverConfig {
        s2_api_key: env_or_config("S2_API_KEY", api_keys.s2_api_key),
        ai_search_key: env_or_config("AI_SEARCH_API_KEY", api_keys.ai_search_key),
        openalex_mailto: env_or_config("OPENALEX_MAILTO", api_keys.openalex_mailto),
        lookup_timeout_secs: tuning.lookup_timeout_secs.unwrap_or(0),
    };
    let resolver = Arc::new(AffiliationResolver::new(&resolver_config, client));

    let state = Arc::new(AppState {
        extraction: ExtractionOrchestrator::new(
            Arc::new(extractor),
            Arc::clone(&store),
            Arc::clone(&registry),
        ),
        enhancement: EnhancementOrchestrator::new(
            resolver,
            Arc::clone(&store),
            Arc::clone(&registry),
        ),
        store,
        registry,
    });

    // Document text can be large.
    let body_limit = axum::extract::DefaultBodyLimit::max(50 * 1024 * 1024);

    let app = axum::Router::new()
        .route(
            "/api/extract",
            axum::routing::post(handlers::extract::submit).get(handlers::extract::list),
        )
        .route(
            "/api/extract/{job_id}",
            axum::routing::get(handlers::extract::status).delete(handlers::extract::delete),
        )
        .route("/api/enhance", axum::routing::post(handlers::enhance::start))
        .route(
            "/api/enhance/{job_id}",
            axum::routing::get(handlers::enhance::status),
        )
        .route(
            "/api/records",
            axum::routing::get(handlers::records::list).delete(handlers::records::clear),
        )
        .route(
            "/api/records/stats",
            axum::routing::get(handlers::records::stats),
        )
        .layer(CorsLayer::permissive())
        .layer(body_limit)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
