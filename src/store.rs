//! User-record store.
//!
//! The store is an external collaborator: a key-value document store keyed
//! by email. The core only talks to it through [`UserStore`], so the backend
//! is swappable; [`InMemoryStore`] ships for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// User record as persisted. Owned by the store; the orchestrator only
/// mutates it through store operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
}

impl UserRecord {
    pub fn new(email: String, full_name: Option<String>, password_hash: String) -> Self {
        Self {
            email,
            full_name,
            password_hash,
            is_verified: false,
            created_at: OffsetDateTime::now_utc(),
            activity_log: Vec::new(),
        }
    }
}

/// Append-only activity log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub action: String,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Partial update applied to a record. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub full_name: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub is_verified: Option<bool>,
}

impl UserPatch {
    pub fn password_hash(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Self::default()
        }
    }

    pub fn verified() -> Self {
        Self {
            is_verified: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert hit the store's uniqueness constraint on email.
    #[error("email already registered")]
    UniqueViolation,
    #[error("user not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Record-store capability. Operations are atomic at the single-record
/// level; there are no multi-record transactions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn insert(&self, record: UserRecord) -> Result<(), StoreError>;
    async fn update(&self, email: &str, patch: UserPatch) -> Result<(), StoreError>;
    async fn delete(&self, email: &str) -> Result<(), StoreError>;
    /// Append to the record's activity log. Not elaborated beyond
    /// append-only ordering.
    async fn append_activity(&self, email: &str, action: &str) -> Result<(), StoreError>;
}

/// HashMap-backed store. Email keys are compared exactly, case-sensitively.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.records.read().await.get(email).cloned())
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.email) {
            return Err(StoreError::UniqueViolation);
        }
        records.insert(record.email.clone(), record);
        Ok(())
    }

    async fn update(&self, email: &str, patch: UserPatch) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(email).ok_or(StoreError::NotFound)?;
        if let Some(full_name) = patch.full_name {
            record.full_name = full_name;
        }
        if let Some(hash) = patch.password_hash {
            record.password_hash = hash;
        }
        if let Some(verified) = patch.is_verified {
            record.is_verified = verified;
        }
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(email)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn append_activity(&self, email: &str, action: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(email).ok_or(StoreError::NotFound)?;
        record.activity_log.push(ActivityEntry {
            action: action.to_string(),
            at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str) -> UserRecord {
        UserRecord::new(email.into(), None, "$argon2id$fake".into())
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = InMemoryStore::new();
        store.insert(record("a@x.com")).await.unwrap();
        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.email, "a@x.com");
        assert!(!found.is_verified);
    }

    #[tokio::test]
    async fn duplicate_insert_is_unique_violation() {
        let store = InMemoryStore::new();
        store.insert(record("a@x.com")).await.unwrap();
        let err = store.insert(record("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() {
        let store = InMemoryStore::new();
        store.insert(record("A@x.com")).await.unwrap();
        assert!(store.find("a@x.com").await.unwrap().is_none());
        assert!(store.find("A@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn patch_only_touches_set_fields() {
        let store = InMemoryStore::new();
        store.insert(record("a@x.com")).await.unwrap();

        store
            .update("a@x.com", UserPatch::verified())
            .await
            .unwrap();
        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert!(found.is_verified);
        assert_eq!(found.password_hash, "$argon2id$fake");

        store
            .update("a@x.com", UserPatch::password_hash("$argon2id$new".into()))
            .await
            .unwrap();
        let found = store.find("a@x.com").await.unwrap().unwrap();
        assert!(found.is_verified);
        assert_eq!(found.password_hash, "$argon2id$new");
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update("ghost@x.com", UserPatch::verified())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = InMemoryStore::new();
        store.insert(record("a@x.com")).await.unwrap();
        store.delete("a@x.com").await.unwrap();
        assert!(store.find("a@x.com").await.unwrap().is_none());
        assert!(matches!(
            store.delete("a@x.com").await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn activity_log_appends_in_order() {
        let store = InMemoryStore::new();
        store.insert(record("a@x.com")).await.unwrap();
        store.append_activity("a@x.com", "registered").await.unwrap();
        store.append_activity("a@x.com", "login").await.unwrap();
        let found = store.find("a@x.com").await.unwrap().unwrap();
        let actions: Vec<_> = found
            .activity_log
            .iter()
            .map(|e| e.action.as_str())
            .collect();
        assert_eq!(actions, vec!["registered", "login"]);
    }
}
