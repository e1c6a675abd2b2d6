use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    storage::{db::SurrealDbClient, types::system_settings::SystemSettings},
    utils::{
        config::get_config,
        embedding::{Embedder, EmbeddingProvider},
    },
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;
    config.validate()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config before index setup: the HNSW
    // index dimension has to match the provider's output.
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(Arc::clone(&openai_client))).await?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    db.ensure_initialized(embedding_provider.dimension()).await?;

    let settings =
        SystemSettings::ensure_initialized(&db, &config, embedding_provider.dimension() as u32)
            .await?;
    if settings.embedding_dimensions as usize != embedding_provider.dimension() {
        warn!(
            stored_dimensions = settings.embedding_dimensions,
            provider_dimensions = embedding_provider.dimension(),
            "Embedding dimension changed; redefining the vector index. Existing \
             documents must be re-ingested before retrieval finds them again."
        );
        db.redefine_vector_index(embedding_provider.dimension())
            .await?;
        let mut changed = settings;
        changed.embedding_dimensions = embedding_provider.dimension() as u32;
        SystemSettings::update(&db, changed).await?;
    }

    let embedder: Arc<dyn Embedder> = embedding_provider;
    let api_state = ApiState::new(db, openai_client, embedder, config.clone())?;

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use common::utils::config::AppConfig;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn smoke_startup_with_in_memory_surrealdb() {
        let namespace = "test_ns";
        let database = format!("test_db_{}", Uuid::new_v4());

        let config = AppConfig::default();
        let db = Arc::new(
            SurrealDbClient::memory(namespace, &database)
                .await
                .expect("failed to start in-memory surrealdb"),
        );

        // Use hashed embeddings for tests to avoid external dependencies
        let embedding_provider = Arc::new(EmbeddingProvider::new_hashed(
            config.embedding_dimensions as usize,
        ));
        db.ensure_initialized(embedding_provider.dimension())
            .await
            .expect("failed to initialize schema");
        SystemSettings::ensure_initialized(&db, &config, embedding_provider.dimension() as u32)
            .await
            .expect("failed to seed settings");

        let openai_client = Arc::new(async_openai::Client::with_config(
            async_openai::config::OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));

        let embedder: Arc<dyn Embedder> = embedding_provider;
        let api_state =
            ApiState::new(db, openai_client, embedder, config).expect("failed to build state");

        let app = Router::new()
            .nest("/api/v1", api_routes_v1(&api_state))
            .with_state(api_state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/live")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let ready_response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/ready")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("ready response");
        assert_eq!(ready_response.status(), StatusCode::OK);
    }
}
