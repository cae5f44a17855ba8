//! End-to-end tests: broker delivery, the embedding update pipeline, and
//! the full matching path over an in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use matchwise::broker::{EventRouter, QueueDescriptor, TopicBroker};
use matchwise::clients::HashEncoder;
use matchwise::config::{EVENT_DELETE, EVENT_EMBED};
use matchwise::profile::Profile;
use matchwise::services::{
    CandidateRetriever, EmbeddingEngine, EmbeddingUpdatePipeline, MatchingService,
};
use matchwise::store::{MemoryProfileStore, ProfileStore};
use matchwise::traits::TextEncoder;

const DIM: usize = 64;

fn user_queue() -> QueueDescriptor {
    QueueDescriptor {
        name: "user_queue".to_string(),
        exchange: "user_events".to_string(),
        routing_key_pattern: "user_ai.*".to_string(),
        durable: true,
    }
}

fn hash_engine() -> Arc<EmbeddingEngine> {
    Arc::new(EmbeddingEngine::with_factory(8, || async {
        Ok(Arc::new(HashEncoder::new(DIM)) as Arc<dyn TextEncoder>)
    }))
}

fn active(id: &str, gender: &str, interest: Option<&str>) -> Profile {
    Profile {
        id: id.to_string(),
        gender: Some(gender.to_string()),
        gender_interest: interest.map(str::to_string),
        status: Some("active".to_string()),
        hobbies: vec![format!("hobby of {id}")],
        ..Profile::default()
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}

#[tokio::test]
async fn embed_event_flows_from_publish_to_stored_embedding() {
    let store = Arc::new(MemoryProfileStore::new());
    store.insert(active("u1", "male", None));

    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();
    let pipeline = EmbeddingUpdatePipeline::new(store.clone(), hash_engine(), None);
    broker.start_consumer(queue.clone(), pipeline.router());

    assert!(broker.publish(&queue.exchange, EVENT_EMBED, json!({"userId": "u1"})));

    loop {
        let profile = store.find_by_id("u1").await.unwrap().unwrap();
        if let Some(embedding) = profile.embedding {
            assert_eq!(embedding.len(), DIM);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(broker.dead_letters(&queue.name).is_empty());
    broker.close().await;
}

#[tokio::test]
async fn embed_event_for_a_missing_profile_is_acked_not_dead_lettered() {
    let store = Arc::new(MemoryProfileStore::new());
    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();
    let pipeline = EmbeddingUpdatePipeline::new(store.clone(), hash_engine(), None);
    broker.start_consumer(queue.clone(), pipeline.router());

    broker.publish(&queue.exchange, EVENT_EMBED, json!({"userId": "ghost"}));

    let broker_view = broker.clone();
    let queue_name = queue.name.clone();
    wait_for(move || broker_view.queue_depth(&queue_name) == 0).await;
    broker.close().await;

    assert!(broker.dead_letters(&queue.name).is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn unknown_event_type_is_dead_lettered() {
    let store = Arc::new(MemoryProfileStore::new());
    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();
    let pipeline = EmbeddingUpdatePipeline::new(store, hash_engine(), None);
    broker.start_consumer(queue.clone(), pipeline.router());

    // Matches the user_ai.* binding but no registered handler.
    broker.publish(&queue.exchange, "user_ai.reindex", json!({}));

    let broker_view = broker.clone();
    let queue_name = queue.name.clone();
    wait_for(move || broker_view.dead_letters(&queue_name).len() == 1).await;

    assert_eq!(broker.queue_depth(&queue.name), 0);
    broker.close().await;
}

#[tokio::test]
async fn failed_handler_dead_letters_without_redelivery() {
    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = EventRouter::new().route(EVENT_DELETE, move |_: Value| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("downstream unavailable"))
        }
    });
    broker.start_consumer(queue.clone(), router);

    broker.publish(&queue.exchange, EVENT_DELETE, json!({"userIds": ["u1"]}));

    let broker_view = broker.clone();
    let queue_name = queue.name.clone();
    wait_for(move || broker_view.dead_letters(&queue_name).len() == 1).await;

    // No retry loop: the handler ran exactly once.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(broker.queue_depth(&queue.name), 0);
    broker.close().await;
}

#[tokio::test]
async fn undecodable_message_body_is_dead_lettered() {
    let store = Arc::new(MemoryProfileStore::new());
    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();
    let pipeline = EmbeddingUpdatePipeline::new(store, hash_engine(), None);
    broker.start_consumer(queue.clone(), pipeline.router());

    broker.publish_bytes(&queue.exchange, "user_ai.embed", b"not json at all".to_vec());

    let broker_view = broker.clone();
    let queue_name = queue.name.clone();
    wait_for(move || broker_view.dead_letters(&queue_name).len() == 1).await;

    let dead = broker.dead_letters(&queue.name);
    assert_eq!(dead[0].body, b"not json at all");
    broker.close().await;
}

#[tokio::test]
async fn close_drains_in_flight_handlers() {
    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();

    let completed = Arc::new(AtomicUsize::new(0));
    let counter = completed.clone();
    let router = EventRouter::new().route(EVENT_EMBED, move |_: Value| {
        let counter = counter.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    broker.start_consumer(queue.clone(), router);

    broker.publish(&queue.exchange, EVENT_EMBED, json!({"userId": "u1"}));
    // Let the consumer pick the delivery up before signalling shutdown.
    tokio::time::sleep(Duration::from_millis(20)).await;

    broker.close().await;
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn matching_returns_exactly_the_requested_page() {
    let store = Arc::new(MemoryProfileStore::new());
    let engine = hash_engine();

    let mut me = active("me", "female", Some("male"));
    me.interests = vec!["hiking".to_string(), "jazz".to_string()];
    store.insert(me);
    for i in 0..20 {
        store.insert(active(&format!("m{i:02}"), "male", None));
    }

    // Give every candidate an embedding through the event pipeline.
    let broker = Arc::new(TopicBroker::new(1));
    let queue = user_queue();
    let pipeline = EmbeddingUpdatePipeline::new(store.clone(), engine.clone(), None);
    broker.start_consumer(queue.clone(), pipeline.router());
    for id in store.ids_without_embeddings() {
        broker.publish(&queue.exchange, EVENT_EMBED, json!({"userId": id}));
    }
    let store_view = store.clone();
    wait_for(move || store_view.ids_without_embeddings().is_empty()).await;
    broker.close().await;

    let matching = MatchingService::new(CandidateRetriever::new(store, 3), engine);
    let ranked = matching.recommend("me", 5).await.unwrap();

    assert_eq!(ranked.len(), 5);
    assert!(ranked.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(ranked.iter().all(|r| r.candidate.id != "me"));
    assert!(ranked.iter().all(|r| r.candidate.embedding.is_none()));
}
