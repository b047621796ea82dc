//! Core domain models.
//!
//! Tasks, projects and the dependency graph view used for diagnostics.

pub mod dag;
pub mod project;
pub mod task;

pub use dag::{DanglingDependency, TaskGraph};
pub use project::{Project, ProjectId};
pub use task::{Priority, Task, TaskId, TaskStatus, DEFAULT_CATEGORY, DEFAULT_ESTIMATED_HOURS};
