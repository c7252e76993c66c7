//! Roles, actors, and the single policy every controller consults.

pub mod policy;
pub mod role;

pub use policy::{authorize, can, can_see_salary, AccessDenied, Action, Instance, ResourceKind};
pub use role::{Actor, Role, UnknownRole};
