//! Data model for profiles, interactions, and change events.
//!
//! Profiles are owned by the document store; this crate never holds an
//! authoritative copy. Field names follow the stored document schema
//! (camelCase, `_id` identifier).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user profile as stored in the document store.
///
/// Every demographic attribute is optional; the summarizer treats a missing
/// field as an omitted clause, never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub gender_interest: Option<String>,
    /// ISO-ish date string; only the year component is ever used.
    pub date_of_birth: Option<String>,
    /// Height in centimetres.
    pub height: Option<f64>,
    pub religion: Option<String>,
    pub education: Option<String>,
    pub hobbies: Vec<String>,
    pub interests: Vec<String>,
    pub spoken_languages: Vec<String>,
    pub favorite_colors: Vec<String>,
    pub pets: Vec<String>,
    pub looking_for: Vec<String>,
    pub what_brings_you_here: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    /// Only `"active"` profiles are eligible for matching.
    pub status: Option<String>,
    pub photo: Option<String>,
    pub location: Option<GeoPoint>,
    /// Fixed-length similarity vector, absent until the pipeline computes it.
    pub embedding: Option<Vec<f32>>,
}

impl Profile {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

/// GeoJSON point: `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [longitude, latitude],
        }
    }
}

/// Records that `user_id` already expressed interest in `liked_user_id`.
/// Used purely for exclusion during retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub user_id: String,
    pub liked_user_id: String,
}

/// The projection of a profile returned by candidate retrieval: the fields
/// needed for summarization, ranking and display, nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub height: Option<f64>,
    pub photo: Option<String>,
    pub location: Option<GeoPoint>,
    pub hobbies: Vec<String>,
    pub interests: Vec<String>,
    pub pets: Vec<String>,
    pub favorite_colors: Vec<String>,
    pub spoken_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl From<&Profile> for Candidate {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            gender: profile.gender.clone(),
            date_of_birth: profile.date_of_birth.clone(),
            height: profile.height,
            photo: profile.photo.clone(),
            location: profile.location.clone(),
            hobbies: profile.hobbies.clone(),
            interests: profile.interests.clone(),
            pets: profile.pets.clone(),
            favorite_colors: profile.favorite_colors.clone(),
            spoken_languages: profile.spoken_languages.clone(),
            embedding: profile.embedding.clone(),
        }
    }
}

/// Envelope for profile-change messages: `event_type` selects a handler,
/// `payload` carries the mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: String,
    pub payload: Value,
}

impl ChangeEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}
