//! Process-wide type registry for dynamic dispatch over heterogeneous
//! activities and sources (spec §9, "Dynamic dispatch across heterogeneous
//! activities/sources").
//!
//! Each `TypedUid`'s first segment is the dispatch key. Hydration from the
//! store looks up a constructor here, then unmarshals the opaque
//! `raw_json`. Adding a provider requires only registering a constructor
//! pair, the same provider-dispatch shape as the teacher's
//! `create_embedder` factory function.

use crate::errors::AppError;
use crate::types::{Activity, Source};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::RwLock;

/// Reconstructs an `Activity` from its canonical `sourceUIDs` list (already
/// merged by the store) and the raw JSON payload written at upsert time.
///
/// Spec §4.1: "the row's canonical sourceUIDs list MUST be re-injected into
/// the JSON" before this constructor runs — callers are responsible for
/// that re-injection, this constructor only unmarshals.
pub type ActivityConstructor =
    fn(raw_json: &serde_json::Value) -> Result<Activity, AppError>;

/// Reconstructs a `Source` from its persisted raw JSON configuration.
pub type SourceConstructor = fn(raw_json: &serde_json::Value) -> Result<Source, AppError>;

static ACTIVITY_REGISTRY: Lazy<RwLock<HashMap<String, ActivityConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static SOURCE_REGISTRY: Lazy<RwLock<HashMap<String, SourceConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_activity_type(source_type: &str, constructor: ActivityConstructor) {
    ACTIVITY_REGISTRY.write().expect("activity registry poisoned").insert(source_type.to_string(), constructor);
}

pub fn register_source_type(source_type: &str, constructor: SourceConstructor) {
    SOURCE_REGISTRY.write().expect("source registry poisoned").insert(source_type.to_string(), constructor);
}

pub fn hydrate_activity(source_type: &str, raw_json: &serde_json::Value) -> Result<Activity, AppError> {
    let registry = ACTIVITY_REGISTRY.read().expect("activity registry poisoned");
    let constructor = registry.get(source_type).ok_or_else(|| AppError::Internal {
        message: format!("no activity constructor registered for source type '{source_type}'"),
    })?;
    constructor(raw_json)
}

pub fn reconstruct_source(source_type: &str, raw_json: &serde_json::Value) -> Result<Source, AppError> {
    let registry = SOURCE_REGISTRY.read().expect("source registry poisoned");
    let constructor = registry.get(source_type).ok_or_else(|| AppError::Internal {
        message: format!("no source constructor registered for source type '{source_type}'"),
    })?;
    constructor(raw_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Engagement, TypedUid};
    use chrono::Utc;

    fn mock_activity_ctor(raw: &serde_json::Value) -> Result<Activity, AppError> {
        let uid = raw["uid"].as_str().unwrap_or_default();
        Ok(Activity {
            uid: TypedUid::parse(uid)?,
            source_uids: vec![],
            title: "mock".into(),
            body: "mock body".into(),
            url: "https://example.com".into(),
            image_url: None,
            created_at: Utc::now(),
            engagement: Engagement::default(),
            social_score: -1.0,
            raw_json: raw.clone(),
        })
    }

    #[test]
    fn unregistered_type_errors_instead_of_panicking() {
        let err = hydrate_activity("never-registered", &serde_json::json!({}));
        assert!(err.is_err());
    }

    #[test]
    fn registered_constructor_is_dispatched_by_source_type() {
        register_activity_type("mocksource", mock_activity_ctor);
        let activity =
            hydrate_activity("mocksource", &serde_json::json!({"uid": "mocksource:1"})).unwrap();
        assert_eq!(activity.uid.as_str(), "mocksource:1");
    }
}
