//! Users, jobs, and applications: records, stores, the service, and its HTTP surface.

pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod salary;
pub mod service;
pub mod status;
pub mod throttle;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationInput, ApplicationRecord, ApplicationView, JobId, JobInput,
    JobPatch, JobRecord, JobView, ResumeRef, StatusInput, UserDraft, UserId, UserInput, UserPatch,
    UserRecord, UserView,
};
pub use memory::{MemoryResumeStore, MemoryStorage};
pub use repository::{
    ApplicationRepository, Repository, RepositoryError, ResumeStore, ResumeStoreError,
    ResumeUpload, Storage,
};
pub use router::{board_router, CurrentActor, ACTOR_HEADER};
pub use salary::{Salary, SalaryError, SalaryView};
pub use service::{ApplicationScope, BoardError, ConflictKind, JobBoardService, ValidationError};
pub use status::{transition, ApplicationStatus, InvalidStatus, StatusChange};
pub use throttle::{Caller, Throttle};
