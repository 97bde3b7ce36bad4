//! JSON export/import of the whole workspace.
//!
//! Tasks travel flattened next to their projects and are re-nested on import
//! by `project_id`. Every id is reused as-is so cross references survive.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::model::common::now_timestamp;
use crate::model::project::MIN_PROJECT_NAME_LEN;
use crate::model::{Company, Project, Task, TaskDraft, User};
use crate::workspace::Workspace;

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: String,
    pub projects: Vec<Value>,
    pub tasks: Vec<Task>,
    pub users: Vec<User>,
    pub companies: Vec<Company>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub collection: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub projects: usize,
    pub tasks: usize,
    pub users: usize,
    pub companies: usize,
    pub failures: Vec<ImportFailure>,
    #[serde(skip)]
    pub changed_projects: BTreeSet<String>,
    #[serde(skip)]
    pub changed_users: Vec<String>,
    #[serde(skip)]
    pub changed_companies: Vec<String>,
}

impl ImportReport {
    fn fail(&mut self, collection: &str, index: usize, record: &Value, reason: String) {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        tracing::warn!(collection, index, id = ?id, reason = %reason, "skipping import record");
        self.failures.push(ImportFailure {
            collection: collection.to_string(),
            index,
            id,
            reason,
        });
    }
}

impl Workspace {
    pub fn export(&self) -> AppResult<ExportDocument> {
        let mut projects = Vec::with_capacity(self.projects.count());
        let mut tasks = Vec::new();

        for project in self.projects.iter() {
            let mut record = project.to_json()?;
            if let Some(object) = record.as_object_mut() {
                object.remove("toDos");
            }
            projects.push(record);
            tasks.extend(project.to_dos.iter().cloned());
        }

        Ok(ExportDocument {
            version: EXPORT_VERSION,
            exported_at: now_timestamp(),
            projects,
            tasks,
            users: self.users.to_vec(),
            companies: self.companies.to_vec(),
        })
    }

    /// Partial-failure import: malformed records are skipped and reported,
    /// everything else is applied. Only a payload without `projects` and
    /// `tasks` arrays is rejected outright.
    pub fn import(&mut self, payload: &Value, today: NaiveDate) -> AppResult<ImportReport> {
        let document = payload.as_object().ok_or_else(|| {
            AppError::Validation("import payload must be a JSON object".to_string())
        })?;
        let projects = required_array(document, "projects")?;
        let tasks = required_array(document, "tasks")?;

        let mut report = ImportReport::default();

        for (index, record) in optional_array(document, "companies").iter().enumerate() {
            match Company::from_json(record.clone()).and_then(|company| {
                company.validate()?;
                Ok(company)
            }) {
                Ok(company) => {
                    report.changed_companies.push(company.id.clone());
                    self.companies.upsert(company);
                    report.companies += 1;
                }
                Err(error) => report.fail("companies", index, record, error.to_string()),
            }
        }

        for (index, record) in optional_array(document, "users").iter().enumerate() {
            match User::from_json(record.clone()).and_then(|user| {
                user.validate()?;
                Ok(user)
            }) {
                Ok(user) => {
                    report.changed_users.push(user.id.clone());
                    self.users.upsert(user);
                    report.users += 1;
                }
                Err(error) => report.fail("users", index, record, error.to_string()),
            }
        }

        for (index, record) in projects.iter().enumerate() {
            match self.import_project(record, today) {
                Ok(project_id) => {
                    report.changed_projects.insert(project_id);
                    report.projects += 1;
                }
                Err(error) => report.fail("projects", index, record, error.to_string()),
            }
        }

        for (index, record) in tasks.iter().enumerate() {
            match self.import_task(record) {
                Ok(project_id) => {
                    report.changed_projects.insert(project_id);
                    report.tasks += 1;
                }
                Err(error) => report.fail("tasks", index, record, error.to_string()),
            }
        }

        for project_id in &report.changed_projects {
            if let Some(project) = self.projects.get_mut(project_id) {
                prune_dangling_dependencies(project);
            }
        }

        tracing::info!(
            projects = report.projects,
            tasks = report.tasks,
            users = report.users,
            companies = report.companies,
            failures = report.failures.len(),
            "import finished"
        );
        Ok(report)
    }

    fn import_project(&mut self, record: &Value, today: NaiveDate) -> AppResult<String> {
        let mut project = Project::from_json(record.clone(), today)?;

        if project.name.chars().count() < MIN_PROJECT_NAME_LEN {
            return Err(AppError::Validation(format!(
                "project name must be at least {MIN_PROJECT_NAME_LEN} characters"
            )));
        }
        if self
            .projects
            .iter()
            .any(|existing| existing.name == project.name && existing.id != project.id)
        {
            return Err(AppError::Conflict(format!(
                "a project named '{}' already exists",
                project.name
            )));
        }

        if let Some(company_id) = project.company_id.clone() {
            if !self.companies.contains(&company_id) {
                tracing::warn!(
                    project_id = %project.id,
                    company_id = %company_id,
                    "dropping unknown company reference"
                );
                project.company_id = None;
            }
        }
        project
            .assigned_users
            .retain(|assignment| self.users.contains(&assignment.user_id));

        let project_id = project.id.clone();
        self.projects.upsert(project);
        Ok(project_id)
    }

    fn import_task(&mut self, record: &Value) -> AppResult<String> {
        let draft: TaskDraft = serde_json::from_value(record.clone())?;
        let project_id = draft
            .project_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::Validation("task has no project_id".to_string()))?;

        let mut task = Task::from_draft(draft, &project_id);
        task.validate()?;
        if let Some(user_id) = task.assigned_to.as_deref() {
            if !self.users.contains(user_id) {
                task.assigned_to = None;
            }
        }

        let project = self.projects.get_mut(&project_id).ok_or_else(|| {
            AppError::NotFound(format!("project '{project_id}' not found"))
        })?;

        match project.to_dos.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => *existing = task,
            None => project.to_dos.push(task),
        }
        Ok(project_id)
    }
}

fn required_array<'a>(document: &'a Map<String, Value>, key: &str) -> AppResult<&'a Vec<Value>> {
    document
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Validation(format!("import payload must contain a '{key}' array")))
}

fn optional_array<'a>(document: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    document
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn prune_dangling_dependencies(project: &mut Project) {
    let known: BTreeSet<String> = project.to_dos.iter().map(|task| task.id.clone()).collect();
    for task in &mut project.to_dos {
        let before = task.dependencies.len();
        task.dependencies
            .retain(|id| known.contains(id) && id != &task.id);
        if task.dependencies.len() != before {
            tracing::warn!(task_id = %task.id, "dropped dependencies on unknown tasks");
        }
    }
}
