//! Matchwise - Main Entry Point
//!
//! Recommendation matching service: serves ranked matches over HTTP and
//! keeps profile embeddings current by consuming profile-change events.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchwise::clients::HttpVectorIndex;
use matchwise::config::{Config, EVENT_EMBED};
use matchwise::handlers::{self, AppState};
use matchwise::services::{
    CandidateRetriever, EmbeddingEngine, EmbeddingUpdatePipeline, MatchingService,
};
use matchwise::store::{MemoryProfileStore, ProfileStore};
use matchwise::traits::VectorIndex;
use matchwise::{Profile, TopicBroker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "matchwise=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    info!("🚀 Starting Matchwise v{}", env!("CARGO_PKG_VERSION"));
    info!("📦 Encoder: {} ({}D)", config.encoder, config.embedding_dimension);
    info!("🔧 Port: {}", config.port);

    // Initialize the embedding engine; a model that cannot load is fatal.
    let engine = Arc::new(EmbeddingEngine::from_config(&config));
    if let Err(e) = engine.warm_up().await {
        tracing::error!("Failed to initialize embedding engine: {}", e);
        return Err(e);
    }

    // Profile store, optionally seeded from disk.
    let store = Arc::new(MemoryProfileStore::new());
    if let Some(path) = &config.seed_path {
        let profiles = load_seed(path)?;
        info!("✅ Seeded {} profiles from {}", profiles.len(), path);
        store.insert_all(profiles);
    }
    let shared_store: Arc<dyn ProfileStore> = store.clone();

    // Optional external vector index for the legacy upsert/delete events.
    let index: Option<Arc<dyn VectorIndex>> = match (
        &config.vector_index_url,
        &config.vector_index_api_key,
    ) {
        (Some(url), Some(key)) => {
            let client = HttpVectorIndex::new(url.clone(), key.clone());
            if client.is_available() {
                info!("✅ Vector index configured: {}", url);
                Some(Arc::new(client))
            } else {
                None
            }
        }
        _ => {
            info!("No vector index configured; upsert/delete events will be dropped");
            None
        }
    };

    // Broker topology and the profile-change consumer.
    let broker = Arc::new(TopicBroker::new(config.prefetch_count));
    let queue = config.user_queue();
    broker.ensure_topology(&queue);

    let pipeline = EmbeddingUpdatePipeline::new(shared_store.clone(), engine.clone(), index);
    broker.start_consumer(queue.clone(), pipeline.router());

    // Request embeddings for any seeded profile that is missing one.
    let mut published = 0;
    for id in store.ids_without_embeddings() {
        if broker.publish(&queue.exchange, EVENT_EMBED, serde_json::json!({ "userId": id })) {
            published += 1;
        }
    }
    if published > 0 {
        info!("Queued {} embedding refreshes", published);
    }

    let matching = Arc::new(MatchingService::new(
        CandidateRetriever::new(shared_store, config.pool_multiplier),
        engine,
    ));

    let state = Arc::new(AppState {
        matching,
        store,
        config: config.clone(),
    });

    // Build HTTP routes
    let app = Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Matching endpoints
        .route("/recommendations/:user_id", get(handlers::recommendations))
        .route(
            "/recommendations/:user_id/pool",
            get(handlers::eligible_pool),
        )
        // State
        .with_state(state)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("✅ Matchwise listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain in-flight event handlers before exiting.
    broker.close().await;

    Ok(())
}

fn load_seed(path: &str) -> Result<Vec<Profile>> {
    let content = std::fs::read_to_string(path)?;
    let profiles: Vec<Profile> = serde_json::from_str(&content)?;
    Ok(profiles)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
