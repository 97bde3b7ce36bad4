pub mod collection;
pub mod companies;
pub mod projects;
pub mod transfer;
pub mod users;

use crate::model::{Company, Project, User};

use self::collection::Collection;

/// All in-memory aggregates of one application instance. Owned by the sync
/// layer behind a lock; nothing in here is global.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub projects: Collection<Project>,
    pub users: Collection<User>,
    pub companies: Collection<Company>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }
}
