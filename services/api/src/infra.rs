use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use mime_guess::mime::APPLICATION_OCTET_STREAM;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use talenthub::access::Role;
use talenthub::board::{
    JobBoardService, MemoryStorage, ResumeRef, ResumeStore, ResumeStoreError, ResumeUpload,
    UserDraft,
};
use talenthub::config::AppConfig;
use talenthub::error::AppError;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Writes resume uploads under a root directory, one file per upload.
pub(crate) struct DirectoryResumeStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DirectoryResumeStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

impl ResumeStore for DirectoryResumeStore {
    fn store(&self, upload: ResumeUpload) -> Result<ResumeRef, ResumeStoreError> {
        let file_name = safe_file_name(&upload.file_name);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = format!(
            "resumes/{}-{sequence:04}-{file_name}",
            Utc::now().format("%Y%m%d%H%M%S")
        );

        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &upload.bytes)?;

        // Untyped uploads fall back to the extension.
        let content_type = if upload.content_type == APPLICATION_OCTET_STREAM {
            mime_guess::from_path(&file_name).first_or_octet_stream()
        } else {
            upload.content_type
        };
        info!(key = %key, bytes = upload.bytes.len(), "resume stored");

        Ok(ResumeRef {
            key,
            file_name: upload.file_name,
            content_type: content_type.to_string(),
        })
    }
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced.
fn safe_file_name(raw: &str) -> String {
    let base = Path::new(raw)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "resume".to_string()
    } else {
        cleaned
    }
}

/// Builds the in-memory board from configuration, wiring the resume
/// directory and seeding the bootstrap superuser when configured.
pub(crate) fn build_board(
    config: &AppConfig,
) -> Result<Arc<JobBoardService<MemoryStorage>>, AppError> {
    let mut service = JobBoardService::new(Arc::new(MemoryStorage::default()), config.board);

    if let Some(dir) = &config.storage.resume_dir {
        info!(dir = %dir.display(), "resume uploads enabled");
        service = service.with_resume_store(Arc::new(DirectoryResumeStore::new(dir)));
    }

    if let Some(username) = &config.storage.bootstrap_admin {
        let admin = service.seed_user(UserDraft {
            username: username.clone(),
            email: String::new(),
            role: Role::NotAssigned,
            is_superuser: true,
        })?;
        info!(user = admin.id.0, username = %admin.username, "bootstrap superuser seeded");
    }

    Ok(Arc::new(service))
}
