//! Event-driven embedding update pipeline.
//!
//! Consumes profile-change events and keeps embeddings current: `embed`
//! refreshes the stored embedding of one profile, while the legacy
//! `upsert_embeddings`/`delete_embeddings` events maintain the external
//! vector index in bulk.

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::broker::EventRouter;
use crate::config::{EVENT_DELETE, EVENT_EMBED, EVENT_UPSERT};
use crate::profile::Profile;
use crate::services::engine::EmbeddingEngine;
use crate::store::ProfileStore;
use crate::summary::summarize;
use crate::traits::{IndexPoint, VectorIndex};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedPayload {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct UpsertPayload {
    users: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletePayload {
    user_ids: Vec<String>,
}

pub struct EmbeddingUpdatePipeline {
    store: Arc<dyn ProfileStore>,
    engine: Arc<EmbeddingEngine>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl EmbeddingUpdatePipeline {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        engine: Arc<EmbeddingEngine>,
        index: Option<Arc<dyn VectorIndex>>,
    ) -> Self {
        Self {
            store,
            engine,
            index,
        }
    }

    /// Build the event router for the profile-change queue. Handler errors
    /// propagate to the consumer, which dead-letters the message.
    pub fn router(&self) -> EventRouter {
        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);
        let embed = move |payload: Value| {
            let store = Arc::clone(&store);
            let engine = Arc::clone(&engine);
            async move { handle_embed(store, engine, payload).await }
        };

        let engine = Arc::clone(&self.engine);
        let index = self.index.clone();
        let upsert = move |payload: Value| {
            let engine = Arc::clone(&engine);
            let index = index.clone();
            async move { handle_upsert(engine, index, payload).await }
        };

        let index = self.index.clone();
        let delete = move |payload: Value| {
            let index = index.clone();
            async move { handle_delete(index, payload).await }
        };

        EventRouter::new()
            .route(EVENT_EMBED, embed)
            .route(EVENT_UPSERT, upsert)
            .route(EVENT_DELETE, delete)
    }
}

/// Refresh one profile's stored embedding from its current bio.
async fn handle_embed(
    store: Arc<dyn ProfileStore>,
    engine: Arc<EmbeddingEngine>,
    payload: Value,
) -> Result<()> {
    let EmbedPayload { user_id } = serde_json::from_value(payload)?;

    let Some(profile) = store.find_by_id(&user_id).await? else {
        // Deleted between publish and consume; nothing to do.
        info!(user = %user_id, "Embed target no longer exists, acking");
        return Ok(());
    };

    let vector = engine.encode_one(&summarize(&profile)).await?;
    store.set_embedding(&user_id, &vector).await?;
    info!(user = %user_id, dimension = vector.len(), "Refreshed profile embedding");
    Ok(())
}

/// Bulk-embed profiles and upsert them into the external vector index.
/// Failed sub-batches are skipped, not retried.
async fn handle_upsert(
    engine: Arc<EmbeddingEngine>,
    index: Option<Arc<dyn VectorIndex>>,
    payload: Value,
) -> Result<()> {
    let Some(index) = index else {
        warn!("No vector index configured, dropping upsert event");
        return Ok(());
    };
    let UpsertPayload { users } = serde_json::from_value(payload)?;
    if users.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = users.iter().map(summarize).collect();
    let outcome = engine.encode_batches(&texts).await?;
    if outcome.skipped > 0 {
        warn!(skipped = outcome.skipped, total = users.len(), "Some profiles were not embedded");
    }

    let points: Vec<IndexPoint> = users
        .iter()
        .zip(outcome.vectors)
        .filter_map(|(user, vector)| {
            vector.map(|values| IndexPoint {
                id: user.id.clone(),
                values,
                metadata: None,
            })
        })
        .collect();

    let upserted = points.len();
    index.upsert(points).await?;
    info!(upserted, provider = index.provider_name(), "Upserted embeddings");
    Ok(())
}

/// Remove profiles from the external vector index.
async fn handle_delete(index: Option<Arc<dyn VectorIndex>>, payload: Value) -> Result<()> {
    let Some(index) = index else {
        warn!("No vector index configured, dropping delete event");
        return Ok(());
    };
    let DeletePayload { user_ids } = serde_json::from_value(payload)?;
    if user_ids.is_empty() {
        return Ok(());
    }

    index.delete(&user_ids).await?;
    info!(deleted = user_ids.len(), provider = index.provider_name(), "Deleted embeddings");
    Ok(())
}
