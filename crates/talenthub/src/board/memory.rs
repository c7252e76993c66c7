//! In-process stores backing the demo binary and the tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{ApplicationId, ApplicationRecord, JobRecord, ResumeRef, UserRecord};
use super::repository::{
    ApplicationRepository, Entity, Repository, RepositoryError, ResumeStore, ResumeStoreError,
    ResumeUpload, Storage,
};
use super::status::ApplicationStatus;

pub struct MemoryRepository<R: Entity> {
    records: Arc<Mutex<BTreeMap<R::Id, R>>>,
    sequence: Arc<AtomicU64>,
}

impl<R: Entity> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<R: Entity> Clone for MemoryRepository<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            sequence: Arc::clone(&self.sequence),
        }
    }
}

impl<R: Entity> MemoryRepository<R> {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<R::Id, R>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|guard| guard.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Entity> Repository<R> for MemoryRepository<R> {
    fn find(&self, id: R::Id) -> Result<Option<R>, RepositoryError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn query(&self, predicate: &dyn Fn(&R) -> bool) -> Result<Vec<R>, RepositoryError> {
        Ok(self
            .lock()?
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect())
    }

    fn insert(&self, draft: R::Draft) -> Result<R, RepositoryError> {
        let mut guard = self.lock()?;
        let id = R::Id::from(self.sequence.fetch_add(1, Ordering::Relaxed));
        let record = R::materialize(id, draft);
        if guard.values().any(|existing| existing.conflicts_with(&record)) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, record: R) -> Result<R, RepositoryError> {
        let mut guard = self.lock()?;
        let id = record.id();
        if !guard.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if guard
            .values()
            .any(|existing| existing.id() != id && existing.conflicts_with(&record))
        {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(id, record.clone());
        Ok(record)
    }

    fn delete(&self, id: R::Id) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.remove(&id).is_some())
    }
}

impl ApplicationRepository for MemoryRepository<ApplicationRecord> {
    fn compare_and_set_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let record = guard.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Err(RepositoryError::Stale);
        }
        record.status = next;
        Ok(record.clone())
    }
}

#[derive(Default, Clone)]
pub struct MemoryStorage {
    users: MemoryRepository<UserRecord>,
    jobs: MemoryRepository<JobRecord>,
    applications: MemoryRepository<ApplicationRecord>,
}

impl Storage for MemoryStorage {
    type Users = MemoryRepository<UserRecord>;
    type Jobs = MemoryRepository<JobRecord>;
    type Applications = MemoryRepository<ApplicationRecord>;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn jobs(&self) -> &Self::Jobs {
        &self.jobs
    }

    fn applications(&self) -> &Self::Applications {
        &self.applications
    }
}

/// Keeps uploaded resumes in memory, keyed like the on-disk layout.
#[derive(Default, Clone)]
pub struct MemoryResumeStore {
    files: Arc<Mutex<BTreeMap<String, ResumeUpload>>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryResumeStore {
    pub fn files(&self) -> Vec<(String, ResumeUpload)> {
        match self.files.lock() {
            Ok(guard) => guard
                .iter()
                .map(|(key, upload)| (key.clone(), upload.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl ResumeStore for MemoryResumeStore {
    fn store(&self, upload: ResumeUpload) -> Result<ResumeRef, ResumeStoreError> {
        let mut guard = self
            .files
            .lock()
            .map_err(|_| ResumeStoreError::Unavailable("memory store poisoned".to_string()))?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = format!("resumes/{sequence:06}-{}", upload.file_name);
        let reference = ResumeRef {
            key: key.clone(),
            file_name: upload.file_name.clone(),
            content_type: upload.content_type.to_string(),
        };
        guard.insert(key, upload);
        Ok(reference)
    }
}
