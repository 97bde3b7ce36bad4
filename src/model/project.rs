use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::model::common::{
    derive_icon, new_id, non_empty, now_timestamp, one_year_after, random_color,
};
use crate::model::task::{Task, TaskDraft, TaskStatus};
use crate::model::user::UserRole;

pub const MIN_PROJECT_NAME_LEN: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Pending,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectPhase {
    #[default]
    Design,
    #[serde(rename = "Construction project")]
    ConstructionProject,
    Execution,
    Construction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub user_id: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_number: Option<String>,
    pub icon: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<UserRole>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub phase: ProjectPhase,
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    pub modified_at: String,
    #[serde(default)]
    pub to_dos: Vec<Task>,
    #[serde(default)]
    pub assigned_users: Vec<Assignment>,
}

/// Raw data bag: everything except the name may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub plot_number: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub user_role: Option<UserRole>,
    pub progress: Option<f64>,
    pub cost: Option<f64>,
    pub status: Option<ProjectStatus>,
    pub phase: Option<ProjectPhase>,
    pub start_date: Option<NaiveDate>,
    pub finish_date: Option<NaiveDate>,
    pub company_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub modified_by: Option<String>,
    pub modified_at: Option<String>,
    #[serde(default)]
    pub to_dos: Vec<TaskDraft>,
    #[serde(default)]
    pub assigned_users: Vec<Assignment>,
}

/// Partial merge applied by `update-by-id`. An empty string clears an
/// optional reference field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ProjectPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.plot_number.is_none()
            && self.color.is_none()
            && self.user_role.is_none()
            && self.progress.is_none()
            && self.cost.is_none()
            && self.status.is_none()
            && self.phase.is_none()
            && self.start_date.is_none()
            && self.finish_date.is_none()
            && self.company_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub on_hold: usize,
}

/// Stored progress is clamped so the Gantt header and the record agree.
pub fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

impl Project {
    pub fn from_draft(draft: ProjectDraft, today: NaiveDate) -> Self {
        let id = non_empty(draft.id).unwrap_or_else(new_id);
        let name = draft.name.trim().to_string();
        let start_date = draft.start_date.unwrap_or(today);
        let created_at = draft.created_at.unwrap_or_else(now_timestamp);
        let modified_at = draft.modified_at.unwrap_or_else(|| created_at.clone());
        let to_dos = draft
            .to_dos
            .into_iter()
            .map(|task| Task::from_draft(task, &id))
            .collect();

        Self {
            icon: non_empty(draft.icon).unwrap_or_else(|| derive_icon(&name)),
            color: non_empty(draft.color).unwrap_or_else(random_color),
            description: draft.description.unwrap_or_default(),
            location: draft.location.unwrap_or_default(),
            latitude: draft.latitude,
            longitude: draft.longitude,
            plot_number: non_empty(draft.plot_number),
            user_role: draft.user_role,
            progress: draft.progress.map(clamp_progress).unwrap_or(0),
            cost: draft.cost.unwrap_or(0.0),
            status: draft.status.unwrap_or_default(),
            phase: draft.phase.unwrap_or_default(),
            start_date,
            finish_date: draft.finish_date.unwrap_or_else(|| one_year_after(today)),
            company_id: non_empty(draft.company_id),
            created_by: non_empty(draft.created_by),
            created_at,
            modified_by: non_empty(draft.modified_by),
            modified_at,
            to_dos,
            assigned_users: draft.assigned_users,
            id,
            name,
        }
    }

    /// Re-hydrate from a stored record; lenient about omitted fields.
    pub fn from_json(value: Value, today: NaiveDate) -> AppResult<Self> {
        let draft: ProjectDraft = serde_json::from_value(value)?;
        Ok(Self::from_draft(draft, today))
    }

    pub fn to_json(&self) -> AppResult<Value> {
        serde_json::to_value(self)
            .map_err(|error| AppError::internal("project serialization failed", error))
    }

    pub fn touch(&mut self, actor: Option<&str>) {
        self.modified_at = now_timestamp();
        if let Some(actor) = actor {
            self.modified_by = Some(actor.to_string());
        }
    }

    pub fn apply_patch(&mut self, patch: ProjectPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
            self.icon = derive_icon(&self.name);
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = Some(latitude);
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = Some(longitude);
        }
        if let Some(plot_number) = patch.plot_number {
            self.plot_number = non_empty(Some(plot_number));
        }
        if let Some(color) = non_empty(patch.color) {
            self.color = color;
        }
        if let Some(user_role) = patch.user_role {
            self.user_role = Some(user_role);
        }
        if let Some(progress) = patch.progress {
            self.progress = clamp_progress(progress);
        }
        if let Some(cost) = patch.cost {
            self.cost = cost;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(finish_date) = patch.finish_date {
            self.finish_date = finish_date;
        }
        if let Some(company_id) = patch.company_id {
            self.company_id = non_empty(Some(company_id));
        }
    }

    pub fn find_to_do(&self, task_id: &str) -> AppResult<&Task> {
        self.to_dos
            .iter()
            .find(|task| task.id == task_id)
            .ok_or_else(|| self.missing_task(task_id))
    }

    pub fn find_to_do_mut(&mut self, task_id: &str) -> AppResult<&mut Task> {
        let missing = self.missing_task(task_id);
        self.to_dos
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or(missing)
    }

    pub fn add_to_do(&mut self, draft: TaskDraft, actor: Option<&str>) -> AppResult<Task> {
        let mut task = Task::from_draft(draft, &self.id);
        if task.created_by.is_none() {
            task.created_by = actor.map(str::to_string);
        }
        if self.to_dos.iter().any(|existing| existing.id == task.id) {
            return Err(AppError::Conflict(format!(
                "task '{}' already exists in project '{}'",
                task.id, self.id
            )));
        }
        task.validate()?;
        self.check_dependencies(&task)?;

        self.to_dos.push(task.clone());
        self.touch(actor);
        Ok(task)
    }

    /// Full replace-by-id; the stored task keeps its project and creation stamp.
    pub fn update_to_do(&mut self, mut task: Task, actor: Option<&str>) -> AppResult<Task> {
        self.find_to_do(&task.id)?;
        task.project_id = self.id.clone();
        task.dependencies = crate::model::task::unique_ids(task.dependencies);
        task.validate()?;
        self.check_dependencies(&task)?;

        let slot = self.find_to_do_mut(&task.id)?;
        task.created_at = slot.created_at.clone();
        if task.created_by.is_none() {
            task.created_by = slot.created_by.clone();
        }
        task.touch();
        *slot = task.clone();

        self.touch(actor);
        Ok(task)
    }

    /// Removes the task and every dependency edge pointing at it.
    pub fn delete_to_do_by_id(&mut self, task_id: &str, actor: Option<&str>) -> AppResult<Task> {
        let position = self
            .to_dos
            .iter()
            .position(|task| task.id == task_id)
            .ok_or_else(|| self.missing_task(task_id))?;
        let removed = self.to_dos.remove(position);

        for task in &mut self.to_dos {
            if task.depends_on(task_id) {
                task.dependencies.retain(|id| id != task_id);
                task.touch();
            }
        }

        self.touch(actor);
        Ok(removed)
    }

    /// No transition guard: any status may follow any other.
    pub fn set_task_status(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        today: NaiveDate,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        let task = self.find_to_do_mut(task_id)?;
        task.status = status;
        if status == TaskStatus::Completed && task.completion_date.is_none() {
            task.completion_date = Some(today);
        }
        task.touch();
        let updated = task.clone();
        self.touch(actor);
        Ok(updated)
    }

    pub fn add_comment(&mut self, task_id: &str, text: &str, actor: Option<&str>) -> AppResult<Task> {
        let comment = text.trim();
        if comment.is_empty() {
            return Err(AppError::Validation(
                "comment cannot be empty".to_string(),
            ));
        }

        let task = self.find_to_do_mut(task_id)?;
        task.comments.push(comment.to_string());
        task.touch();
        let updated = task.clone();
        self.touch(actor);
        Ok(updated)
    }

    pub fn assign_user(&mut self, user_id: &str, role: UserRole, actor: Option<&str>) {
        match self
            .assigned_users
            .iter_mut()
            .find(|assignment| assignment.user_id == user_id)
        {
            Some(existing) => existing.role = role,
            None => self.assigned_users.push(Assignment {
                user_id: user_id.to_string(),
                role,
            }),
        }
        self.touch(actor);
    }

    pub fn unassign_user(&mut self, user_id: &str, actor: Option<&str>) -> AppResult<()> {
        let before = self.assigned_users.len();
        self.assigned_users
            .retain(|assignment| assignment.user_id != user_id);
        if self.assigned_users.len() == before {
            return Err(AppError::NotFound(format!(
                "user '{user_id}' is not assigned to project '{}'",
                self.id
            )));
        }
        self.touch(actor);
        Ok(())
    }

    /// Drops every reference to `user_id`; returns whether anything changed.
    pub fn forget_user(&mut self, user_id: &str) -> bool {
        let before = self.assigned_users.len();
        self.assigned_users
            .retain(|assignment| assignment.user_id != user_id);
        let mut changed = self.assigned_users.len() != before;

        for task in &mut self.to_dos {
            if task.assigned_to.as_deref() == Some(user_id) {
                task.assigned_to = None;
                task.touch();
                changed = true;
            }
        }

        if changed {
            self.touch(None);
        }
        changed
    }

    pub fn status_counts(&self) -> TaskStatusCounts {
        let mut counts = TaskStatusCounts::default();
        for task in &self.to_dos {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::OnHold => counts.on_hold += 1,
            }
        }
        counts
    }

    fn check_dependencies(&self, task: &Task) -> AppResult<()> {
        for dependency in &task.dependencies {
            if !self.to_dos.iter().any(|existing| &existing.id == dependency) {
                return Err(AppError::Validation(format!(
                    "dependency '{dependency}' is not a task of project '{}'",
                    self.id
                )));
            }
        }
        Ok(())
    }

    fn missing_task(&self, task_id: &str) -> AppError {
        AppError::NotFound(format!(
            "task '{task_id}' not found in project '{}'",
            self.id
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn project() -> Project {
        Project::from_draft(
            ProjectDraft {
                id: Some("p1".to_string()),
                name: "Harbor Bridge".to_string(),
                ..ProjectDraft::default()
            },
            date(2024, 1, 1),
        )
    }

    fn draft(id: &str, dependencies: &[&str]) -> TaskDraft {
        TaskDraft {
            id: Some(id.to_string()),
            title: format!("task {id}"),
            dependencies: dependencies.iter().map(|id| id.to_string()).collect(),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn from_draft_fills_defaults() {
        let project = project();
        assert_eq!(project.icon, "HB");
        assert_eq!(project.status, ProjectStatus::Pending);
        assert_eq!(project.phase, ProjectPhase::Design);
        assert_eq!(project.start_date, date(2024, 1, 1));
        assert_eq!(project.finish_date, date(2025, 1, 1));
        assert_eq!(project.color.len(), 7);
        assert_eq!(project.progress, 0);
    }

    #[test]
    fn progress_is_clamped_on_write() {
        let mut project = project();
        project.apply_patch(ProjectPatch {
            progress: Some(140.0),
            ..ProjectPatch::default()
        });
        assert_eq!(project.progress, 100);

        project.apply_patch(ProjectPatch {
            progress: Some(-3.0),
            ..ProjectPatch::default()
        });
        assert_eq!(project.progress, 0);
    }

    #[test]
    fn json_round_trip_preserves_nested_tasks() {
        let mut original = project();
        original.latitude = Some(59.91);
        original
            .add_to_do(draft("a", &[]), Some("u1"))
            .expect("task a should be added");
        original
            .add_to_do(draft("b", &["a"]), Some("u1"))
            .expect("task b should be added");
        original.assign_user("u1", UserRole::Engineer, None);

        let value = original.to_json().expect("project should serialize");
        assert!(value.get("companyId").is_none());
        assert_eq!(value["toDos"][1]["dependencies"], json!(["a"]));

        let restored = Project::from_json(value, date(2030, 6, 1)).expect("project should parse");
        assert_eq!(restored, original);
    }

    #[test]
    fn phase_and_status_use_display_strings() {
        let value = json!({
            "name": "Office Park",
            "phase": "Construction project",
            "status": "Active",
        });
        let project = Project::from_json(value, date(2024, 1, 1)).expect("project should parse");
        assert_eq!(project.phase, ProjectPhase::ConstructionProject);
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[test]
    fn update_and_delete_missing_task_are_not_found() {
        let mut project = project();
        let stray = Task::from_draft(draft("ghost", &[]), "p1");

        assert!(matches!(
            project.update_to_do(stray, None),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            project.delete_to_do_by_id("ghost", None),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn add_to_do_rejects_unknown_dependency() {
        let mut project = project();
        let result = project.add_to_do(draft("b", &["missing"]), None);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(project.to_dos.is_empty());
    }

    #[test]
    fn update_to_do_replaces_whole_task_and_touches_project() {
        let mut project = project();
        project.modified_at = "2000-01-01T00:00:00Z".to_string();
        let task = project
            .add_to_do(draft("a", &[]), None)
            .expect("task should be added");
        project.modified_at = "2000-01-01T00:00:00Z".to_string();

        let mut replacement = task.clone();
        replacement.title = "Renamed".to_string();
        replacement.description = String::new();
        replacement.created_at = "ignored".to_string();

        let updated = project
            .update_to_do(replacement, Some("u2"))
            .expect("update should succeed");
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.created_at, task.created_at);
        assert_ne!(project.modified_at, "2000-01-01T00:00:00Z");
        assert_eq!(project.modified_by.as_deref(), Some("u2"));
    }

    #[test]
    fn update_of_missing_to_do_is_not_found_even_when_invalid() {
        let mut project = project();
        let mut stray = Task::from_draft(draft("ghost", &["nope"]), "p1");
        stray.title = String::new();

        assert!(matches!(
            project.update_to_do(stray, None),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn delete_to_do_drops_incoming_dependency_edges() {
        let mut project = project();
        project.add_to_do(draft("a", &[]), None).expect("a");
        project.add_to_do(draft("b", &["a"]), None).expect("b");

        project
            .delete_to_do_by_id("a", None)
            .expect("delete should succeed");
        assert!(project.find_to_do("b").expect("b remains").dependencies.is_empty());
    }

    #[test]
    fn completing_a_task_stamps_completion_date() {
        let mut project = project();
        project.add_to_do(draft("a", &[]), None).expect("a");

        let task = project
            .set_task_status("a", TaskStatus::Completed, date(2024, 2, 2), None)
            .expect("status change should succeed");
        assert_eq!(task.completion_date, Some(date(2024, 2, 2)));

        let reopened = project
            .set_task_status("a", TaskStatus::OnHold, date(2024, 2, 3), None)
            .expect("any transition is allowed");
        assert_eq!(reopened.status, TaskStatus::OnHold);
    }

    #[test]
    fn forget_user_clears_assignments_and_task_owners() {
        let mut project = project();
        project.assign_user("u1", UserRole::Architect, None);
        let mut task_draft = draft("a", &[]);
        task_draft.assigned_to = Some("u1".to_string());
        project.add_to_do(task_draft, None).expect("a");

        assert!(project.forget_user("u1"));
        assert!(project.assigned_users.is_empty());
        assert!(project.to_dos[0].assigned_to.is_none());
        assert!(!project.forget_user("u1"));
    }
}
