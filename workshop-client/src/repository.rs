//! Typed document repositories
//!
//! Every call goes through the retry wrapper. Records are stored as JSON
//! documents under `T::COLLECTION/{id}`.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use shared::{Attendance, Record, Workshop};

use crate::config::RetryPolicy;
use crate::error::{ClientError, ClientResult};
use crate::provider::{Document, DocumentPath, DocumentStore};
use crate::retry::with_retry;

/// CRUD access to one collection
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            _record: PhantomData,
        }
    }

    fn path(id: &str) -> DocumentPath {
        DocumentPath::new(T::COLLECTION, id)
    }

    /// Fetch a record, `ClientError::NotFound` if it does not exist
    pub async fn get(&self, id: &str) -> ClientResult<T> {
        let path = Self::path(id);
        self.find(id)
            .await?
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }

    pub async fn find(&self, id: &str) -> ClientResult<Option<T>> {
        let path = Self::path(id);
        let doc = with_retry(&self.policy, || self.store.get_document(&path)).await?;
        doc.map(decode).transpose()
    }

    /// Fetch several records concurrently, failing on the first error
    pub async fn get_many(&self, ids: &[&str]) -> ClientResult<Vec<T>> {
        futures::future::try_join_all(ids.iter().map(|id| self.get(id))).await
    }

    pub async fn list(&self) -> ClientResult<Vec<T>> {
        let docs = with_retry(&self.policy, || self.store.list_documents(T::COLLECTION)).await?;
        docs.into_iter().map(decode).collect()
    }

    /// Create or overwrite the record under its id
    pub async fn save(&self, record: &T) -> ClientResult<()> {
        let path = Self::path(record.id());
        let data = serde_json::to_value(record)?;
        with_retry(&self.policy, || self.store.set_document(&path, data.clone())).await?;
        tracing::debug!(path = %path, "Record saved");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        let path = Self::path(id);
        with_retry(&self.policy, || self.store.delete_document(&path)).await?;
        tracing::debug!(path = %path, "Record deleted");
        Ok(())
    }
}

/// Documents written by other clients may omit the id field.
fn decode<T: Record>(doc: Document) -> ClientResult<T> {
    let mut data = doc.data;
    if let Value::Object(map) = &mut data {
        map.entry("id").or_insert(Value::String(doc.id));
    }
    Ok(serde_json::from_value(data)?)
}

/// Workshop registration and attendance
#[derive(Clone)]
pub struct WorkshopRepository {
    workshops: Repository<Workshop>,
    attendance: Repository<Attendance>,
}

impl WorkshopRepository {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self {
            workshops: Repository::new(Arc::clone(&store), policy.clone()),
            attendance: Repository::new(store, policy),
        }
    }

    pub fn workshops(&self) -> &Repository<Workshop> {
        &self.workshops
    }

    /// Published workshops ordered by start time
    pub async fn published(&self) -> ClientResult<Vec<Workshop>> {
        let mut workshops: Vec<Workshop> = self
            .workshops
            .list()
            .await?
            .into_iter()
            .filter(|w| w.published)
            .collect();
        workshops.sort_by_key(|w| w.starts_at);
        Ok(workshops)
    }

    /// Register a user; saving is skipped when already registered
    pub async fn register(&self, workshop_id: &str, user_id: &str) -> ClientResult<Workshop> {
        let mut workshop = self.workshops.get(workshop_id).await?;
        if workshop.register(user_id)? {
            self.workshops.save(&workshop).await?;
            tracing::info!(workshop_id, user_id, "User registered for workshop");
        }
        Ok(workshop)
    }

    pub async fn unregister(&self, workshop_id: &str, user_id: &str) -> ClientResult<Workshop> {
        let mut workshop = self.workshops.get(workshop_id).await?;
        workshop.unregister(user_id)?;
        self.workshops.save(&workshop).await?;
        tracing::info!(workshop_id, user_id, "User unregistered from workshop");
        Ok(workshop)
    }

    /// Mark attendance for a registered user
    pub async fn mark_attendance(
        &self,
        workshop_id: &str,
        user_id: &str,
        present: bool,
    ) -> ClientResult<Attendance> {
        let workshop = self.workshops.get(workshop_id).await?;
        if !workshop.is_registered(user_id) {
            return Err(shared::RecordError::NotRegistered {
                workshop_id: workshop_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        let mark = Attendance::mark(workshop_id, user_id, present);
        self.attendance.save(&mark).await?;
        Ok(mark)
    }

    pub async fn attendance_for(&self, workshop_id: &str) -> ClientResult<Vec<Attendance>> {
        Ok(self
            .attendance
            .list()
            .await?
            .into_iter()
            .filter(|a| a.workshop_id == workshop_id)
            .collect())
    }
}
