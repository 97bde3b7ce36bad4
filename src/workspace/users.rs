use crate::error::{AppError, AppResult};
use crate::model::{User, UserDraft, UserPatch};
use crate::workspace::projects::missing_user;
use crate::workspace::Workspace;

impl Workspace {
    pub fn list_users(&self) -> Vec<User> {
        self.users.to_vec()
    }

    pub fn find_user(&self, user_id: &str) -> AppResult<&User> {
        self.users.get(user_id).ok_or_else(|| missing_user(user_id))
    }

    pub fn create_user(&mut self, draft: UserDraft) -> AppResult<User> {
        let user = User::from_draft(draft);
        user.validate()?;
        if self.users.contains(&user.id) {
            return Err(AppError::Conflict(format!(
                "user '{}' already exists",
                user.id
            )));
        }

        self.users.upsert(user.clone());
        Ok(user)
    }

    pub fn update_user(&mut self, user_id: &str, patch: UserPatch) -> AppResult<User> {
        let mut user = self.find_user(user_id)?.clone();
        user.apply_patch(patch);
        user.validate()?;
        self.users.upsert(user.clone());
        Ok(user)
    }

    /// Removes the user and every reference to it. Returns the ids of the
    /// projects that changed as a result.
    pub fn delete_user(&mut self, user_id: &str) -> AppResult<(User, Vec<String>)> {
        let removed = self
            .users
            .remove(user_id)
            .ok_or_else(|| missing_user(user_id))?;

        let touched: Vec<String> = self
            .projects
            .iter_mut()
            .filter_map(|project| project.forget_user(user_id).then(|| project.id.clone()))
            .collect();

        tracing::info!(
            user_id,
            name = %removed.full_name(),
            affected_projects = touched.len(),
            "user deleted"
        );
        Ok((removed, touched))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::model::{ProjectDraft, TaskDraft, UserRole};

    use super::*;

    fn draft(name: &str) -> UserDraft {
        UserDraft {
            name: name.to_string(),
            ..UserDraft::default()
        }
    }

    #[test]
    fn update_is_a_partial_merge() {
        let mut workspace = Workspace::new();
        let user = workspace
            .create_user(UserDraft {
                email: Some("ada@example.com".to_string()),
                ..draft("Ada")
            })
            .expect("user should be created");

        let updated = workspace
            .update_user(
                &user.id,
                UserPatch {
                    phone: Some("555-0100".to_string()),
                    ..UserPatch::default()
                },
            )
            .expect("update should succeed");
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.phone, "555-0100");

        assert!(matches!(
            workspace.update_user("ghost", UserPatch::default()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn delete_cascades_into_projects() {
        let mut workspace = Workspace::new();
        let user = workspace.create_user(draft("Ada")).expect("user");
        let project = workspace
            .new_project(
                ProjectDraft {
                    name: "Harbor Bridge".to_string(),
                    ..ProjectDraft::default()
                },
                None,
                NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            )
            .expect("project");
        workspace
            .assign_user(&project.id, &user.id, UserRole::Developer, None)
            .expect("assign");
        let task = workspace
            .add_to_do(
                &project.id,
                TaskDraft {
                    title: "Survey".to_string(),
                    assigned_to: Some(user.id.clone()),
                    ..TaskDraft::default()
                },
                None,
            )
            .expect("task");

        let (_, touched) = workspace.delete_user(&user.id).expect("delete");
        assert_eq!(touched, vec![project.id.clone()]);

        let stored = workspace.find_project(&project.id).expect("project");
        assert!(stored.assigned_users.is_empty());
        assert!(stored
            .find_to_do(&task.id)
            .expect("task")
            .assigned_to
            .is_none());
    }
}
