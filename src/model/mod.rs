pub mod common;
pub mod company;
pub mod project;
pub mod task;
pub mod user;

pub use company::{Company, CompanyDraft, CompanyPatch};
pub use project::{Assignment, Project, ProjectDraft, ProjectPatch, ProjectPhase, ProjectStatus};
pub use task::{ProgressPercentage, Task, TaskDraft, TaskPriority, TaskStatus};
pub use user::{Access, User, UserDraft, UserPatch, UserRole};
