use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::common::{new_id, non_empty, now_timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPercentage {
    #[serde(rename = "25%")]
    Quarter,
    #[serde(rename = "50%")]
    Half,
    #[serde(rename = "75%")]
    ThreeQuarters,
    #[serde(rename = "100%")]
    Done,
}

/// A to-do embedded in its project. `project_id` keeps the snake_case key
/// because the flattened export format re-nests tasks by that key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(rename = "project_id", alias = "projectId")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<ProgressPercentage>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// Raw data bag accepted when creating or re-hydrating a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(rename = "project_id", alias = "projectId")]
    pub project_id: Option<String>,
    pub assigned_to: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub progress_percentage: Option<ProgressPercentage>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl Task {
    pub fn from_draft(draft: TaskDraft, project_id: &str) -> Self {
        let created_at = draft.created_at.unwrap_or_else(now_timestamp);
        let updated_at = draft.updated_at.unwrap_or_else(|| created_at.clone());

        Self {
            id: non_empty(draft.id).unwrap_or_else(new_id),
            title: draft.title.trim().to_string(),
            description: draft.description.unwrap_or_default(),
            status: draft.status.unwrap_or_default(),
            priority: draft.priority.unwrap_or_default(),
            project_id: project_id.to_string(),
            assigned_to: non_empty(draft.assigned_to),
            created_by: non_empty(draft.created_by),
            created_at,
            updated_at,
            start_date: draft.start_date,
            due_date: draft.due_date,
            completion_date: draft.completion_date,
            estimated_hours: draft.estimated_hours,
            actual_hours: draft.actual_hours,
            progress_percentage: draft.progress_percentage,
            dependencies: unique_ids(draft.dependencies),
            comments: draft.comments,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation(
                "task title cannot be empty".to_string(),
            ));
        }

        for (field, value) in [
            ("estimatedHours", self.estimated_hours),
            ("actualHours", self.actual_hours),
        ] {
            if value.is_some_and(|hours| !hours.is_finite() || hours < 0.0) {
                return Err(AppError::Validation(format!(
                    "{field} must be a non-negative number"
                )));
            }
        }

        if self.dependencies.iter().any(|id| id == &self.id) {
            return Err(AppError::Validation(format!(
                "task '{}' cannot depend on itself",
                self.id
            )));
        }

        Ok(())
    }

    pub fn depends_on(&self, task_id: &str) -> bool {
        self.dependencies.iter().any(|id| id == task_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = now_timestamp();
    }
}

/// Dependencies are a set; keep first occurrence order.
pub fn unique_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
