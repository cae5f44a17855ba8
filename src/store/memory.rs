//! In-memory profile store.
//!
//! Executes the staged candidate query the way the production aggregation
//! pipeline does: geo pre-pass, status filter, self-exclusion, gender filter,
//! interaction anti-join, projection, working-set limit, randomized sample.
//! Also the store used by tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::profile::{Candidate, InteractionRecord, Profile};
use crate::store::{CandidateQuery, ProfileStore};

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
    interactions: RwLock<Vec<InteractionRecord>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: Profile) {
        self.profiles
            .write()
            .unwrap()
            .insert(profile.id.clone(), profile);
    }

    pub fn insert_all(&self, profiles: impl IntoIterator<Item = Profile>) {
        let mut guard = self.profiles.write().unwrap();
        for profile in profiles {
            guard.insert(profile.id.clone(), profile);
        }
    }

    /// Record that `actor` expressed interest in `target`.
    pub fn record_interaction(&self, actor: &str, target: &str) {
        self.interactions.write().unwrap().push(InteractionRecord {
            user_id: actor.to_string(),
            liked_user_id: target.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.profiles.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().unwrap().is_empty()
    }

    /// Ids of profiles that have no stored embedding yet, sorted.
    pub fn ids_without_embeddings(&self) -> Vec<String> {
        let profiles = self.profiles.read().unwrap();
        let mut ids: Vec<String> = profiles
            .values()
            .filter(|p| p.embedding.is_none())
            .map(|p| p.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn interaction_targets(&self, actor: &str) -> HashSet<String> {
        self.interactions
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == actor)
            .map(|r| r.liked_user_id.clone())
            .collect()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().unwrap().get(id).cloned())
    }

    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        if query.limit == 0 || query.sample == 0 {
            return Ok(vec![]);
        }

        let liked = self.interaction_targets(&query.exclude_interactions_of);

        let profiles = self.profiles.read().unwrap();
        // Stable iteration order before sampling keeps the stages themselves
        // deterministic; only the final sample shuffles.
        let mut ids: Vec<&String> = profiles.keys().collect();
        ids.sort();

        let mut pool: Vec<Candidate> = Vec::new();
        for id in ids {
            let profile = &profiles[id];

            if let Some(geo) = &query.geo {
                let Some(location) = &profile.location else {
                    continue;
                };
                if haversine_m(geo.center, location.coordinates) > geo.max_distance_m {
                    continue;
                }
            }
            if profile.status.as_deref() != Some(query.status.as_str()) {
                continue;
            }
            if profile.id == query.exclude_id {
                continue;
            }
            if let Some(gender) = &query.gender {
                if profile.gender.as_deref() != Some(gender.as_str()) {
                    continue;
                }
            }
            if liked.contains(&profile.id) {
                continue;
            }

            pool.push(Candidate::from(profile));
            if pool.len() >= query.limit {
                break;
            }
        }
        drop(profiles);

        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(query.sample);
        Ok(pool)
    }

    async fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<bool> {
        let mut profiles = self.profiles.write().unwrap();
        match profiles.get_mut(id) {
            Some(profile) => {
                profile.embedding = Some(embedding.to_vec());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Great-circle distance in meters between `[lon, lat]` points.
fn haversine_m(a: [f64; 2], b: [f64; 2]) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let (lon1, lat1) = (a[0].to_radians(), a[1].to_radians());
    let (lon2, lat2) = (b[0].to_radians(), b[1].to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::GeoPoint;

    fn active(id: &str, gender: &str) -> Profile {
        Profile {
            id: id.to_string(),
            gender: Some(gender.to_string()),
            status: Some("active".to_string()),
            ..Profile::default()
        }
    }

    fn query_for(requester: &Profile, pool: usize) -> CandidateQuery {
        CandidateQuery::for_requester(requester, pool)
    }

    fn requester() -> Profile {
        Profile {
            id: "me".to_string(),
            gender: Some("female".to_string()),
            gender_interest: Some("male".to_string()),
            status: Some("active".to_string()),
            ..Profile::default()
        }
    }

    #[tokio::test]
    async fn filters_inactive_self_and_wrong_gender() {
        let store = MemoryProfileStore::new();
        store.insert(requester());
        store.insert(active("m1", "male"));
        store.insert(active("f1", "female"));
        let mut paused = active("m2", "male");
        paused.status = Some("paused".to_string());
        store.insert(paused);

        let found = store
            .find_candidates(&query_for(&requester(), 10))
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["m1"]);
    }

    #[tokio::test]
    async fn no_gender_filter_when_interest_is_unset() {
        let store = MemoryProfileStore::new();
        let mut me = requester();
        me.gender_interest = None;
        store.insert(me.clone());
        store.insert(active("m1", "male"));
        store.insert(active("f1", "female"));

        let found = store.find_candidates(&query_for(&me, 10)).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn anti_join_excludes_already_liked_targets() {
        let store = MemoryProfileStore::new();
        store.insert(requester());
        store.insert(active("m1", "male"));
        store.insert(active("m2", "male"));
        store.record_interaction("me", "m1");
        // Interaction by someone else must not shrink the pool.
        store.record_interaction("other", "m2");

        let found = store
            .find_candidates(&query_for(&requester(), 10))
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["m2"]);
    }

    #[tokio::test]
    async fn working_set_limit_caps_the_pool() {
        let store = MemoryProfileStore::new();
        store.insert(requester());
        for i in 0..30 {
            store.insert(active(&format!("m{i:02}"), "male"));
        }

        let found = store
            .find_candidates(&query_for(&requester(), 15))
            .await
            .unwrap();

        assert_eq!(found.len(), 15);
    }

    #[tokio::test]
    async fn geo_filter_bounds_by_radius_and_requires_location() {
        let store = MemoryProfileStore::new();
        store.insert(requester());

        let mut near = active("near", "male");
        near.location = Some(GeoPoint::new(36.8219, -1.2921)); // Nairobi
        store.insert(near);

        let mut far = active("far", "male");
        far.location = Some(GeoPoint::new(39.6682, -4.0435)); // Mombasa
        store.insert(far);

        store.insert(active("nowhere", "male")); // no location at all

        let query = query_for(&requester(), 10).with_geo([36.8219, -1.2921], 50_000.0);
        let found = store.find_candidates(&query).await.unwrap();

        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
    }

    #[tokio::test]
    async fn set_embedding_touches_only_the_embedding_field() {
        let store = MemoryProfileStore::new();
        let mut profile = active("m1", "male");
        profile.first_name = Some("Ben".to_string());
        store.insert(profile);

        let updated = store.set_embedding("m1", &[0.5, 0.5]).await.unwrap();
        assert!(updated);

        let stored = store.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(stored.embedding.as_deref(), Some(&[0.5, 0.5][..]));
        assert_eq!(stored.first_name.as_deref(), Some("Ben"));
        assert!(stored.is_active());
    }

    #[tokio::test]
    async fn lists_profiles_missing_embeddings() {
        let store = MemoryProfileStore::new();
        let mut with = active("with", "male");
        with.embedding = Some(vec![0.1]);
        store.insert(with);
        store.insert(active("b", "male"));
        store.insert(active("a", "female"));

        assert_eq!(store.ids_without_embeddings(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn set_embedding_reports_missing_target() {
        let store = MemoryProfileStore::new();
        let updated = store.set_embedding("ghost", &[0.1]).await.unwrap();
        assert!(!updated);
    }

    #[test]
    fn haversine_distances_are_plausible() {
        // Nairobi to Mombasa is roughly 440 km.
        let d = haversine_m([36.8219, -1.2921], [39.6682, -4.0435]);
        assert!((400_000.0..500_000.0).contains(&d), "got {d}");
        assert_eq!(haversine_m([0.0, 0.0], [0.0, 0.0]), 0.0);
    }
}
