use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::model::project::{TaskStatusCounts, MIN_PROJECT_NAME_LEN};
use crate::model::{
    Assignment, Project, ProjectDraft, ProjectPatch, Task, TaskDraft, TaskStatus, User, UserRole,
};
use crate::schedule::graph::TaskGraph;
use crate::workspace::collection::Entity;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project: Project,
    pub task_counts: TaskStatusCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectMember {
    pub assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Tasks a to-do waits on and tasks waiting on it, in project order.
#[derive(Debug, Clone, Serialize)]
pub struct TaskLinks {
    pub predecessors: Vec<Task>,
    pub successors: Vec<Task>,
}

impl Workspace {
    pub fn list_projects(&self) -> Vec<ProjectSummary> {
        self.projects
            .iter()
            .map(|project| ProjectSummary {
                task_counts: project.status_counts(),
                project: project.clone(),
            })
            .collect()
    }

    pub fn find_project(&self, project_id: &str) -> AppResult<&Project> {
        self.projects
            .get(project_id)
            .ok_or_else(|| missing_project(project_id))
    }

    fn project_mut(&mut self, project_id: &str) -> AppResult<&mut Project> {
        self.projects
            .get_mut(project_id)
            .ok_or_else(|| missing_project(project_id))
    }

    /// Appends a new project. Names must be at least five characters long
    /// and unique within the collection.
    pub fn new_project(
        &mut self,
        draft: ProjectDraft,
        actor: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<Project> {
        let mut project = Project::from_draft(draft, today);
        if project.created_by.is_none() {
            project.created_by = actor.map(str::to_string);
            project.modified_by = project.created_by.clone();
        }

        if self.projects.contains(&project.id) {
            return Err(AppError::Conflict(format!(
                "project '{}' already exists",
                project.id
            )));
        }
        self.check_project_name(&project.name, None)?;
        self.check_project_references(&project)?;

        self.projects.upsert(project.clone());
        tracing::info!(project_id = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    pub fn update_project(
        &mut self,
        project_id: &str,
        patch: ProjectPatch,
        actor: Option<&str>,
    ) -> AppResult<Project> {
        if patch.is_empty() {
            return Err(AppError::Validation(
                "at least one field must be provided".to_string(),
            ));
        }
        self.find_project(project_id)?;

        if let Some(name) = patch.name.as_deref() {
            self.check_project_name(name, Some(project_id))?;
        }
        if let Some(company_id) = patch.company_id.as_deref() {
            let company_id = company_id.trim();
            if !company_id.is_empty() && !self.companies.contains(company_id) {
                return Err(missing_company(company_id));
            }
        }

        let project = self.project_mut(project_id)?;
        project.apply_patch(patch);
        project.touch(actor);
        Ok(project.clone())
    }

    pub fn delete_project(&mut self, project_id: &str) -> AppResult<Project> {
        let removed = self
            .projects
            .remove(project_id)
            .ok_or_else(|| missing_project(project_id))?;
        tracing::info!(project_id, "project deleted");
        Ok(removed)
    }

    pub fn project_members(&self, project_id: &str) -> AppResult<Vec<ProjectMember>> {
        let project = self.find_project(project_id)?;
        Ok(project
            .assigned_users
            .iter()
            .map(|assignment| ProjectMember {
                assignment: assignment.clone(),
                user: self.users.get(&assignment.user_id).cloned(),
            })
            .collect())
    }

    pub fn assign_user(
        &mut self,
        project_id: &str,
        user_id: &str,
        role: UserRole,
        actor: Option<&str>,
    ) -> AppResult<Project> {
        if !self.users.contains(user_id) {
            return Err(missing_user(user_id));
        }
        let project = self.project_mut(project_id)?;
        project.assign_user(user_id, role, actor);
        Ok(project.clone())
    }

    pub fn unassign_user(
        &mut self,
        project_id: &str,
        user_id: &str,
        actor: Option<&str>,
    ) -> AppResult<Project> {
        let project = self.project_mut(project_id)?;
        project.unassign_user(user_id, actor)?;
        Ok(project.clone())
    }

    pub fn find_to_do(&self, project_id: &str, task_id: &str) -> AppResult<&Task> {
        self.find_project(project_id)?.find_to_do(task_id)
    }

    pub fn task_links(&self, project_id: &str, task_id: &str) -> AppResult<TaskLinks> {
        let project = self.find_project(project_id)?;
        project.find_to_do(task_id)?;

        let graph = TaskGraph::new(&project.to_dos);
        Ok(TaskLinks {
            predecessors: graph.predecessors(task_id).into_iter().cloned().collect(),
            successors: graph.successors(task_id).into_iter().cloned().collect(),
        })
    }

    pub fn add_to_do(
        &mut self,
        project_id: &str,
        draft: TaskDraft,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.check_assignee(draft.assigned_to.as_deref())?;
        self.project_mut(project_id)?.add_to_do(draft, actor)
    }

    pub fn update_to_do(
        &mut self,
        project_id: &str,
        task: Task,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.check_assignee(task.assigned_to.as_deref())?;
        self.project_mut(project_id)?.update_to_do(task, actor)
    }

    pub fn delete_to_do(
        &mut self,
        project_id: &str,
        task_id: &str,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.project_mut(project_id)?
            .delete_to_do_by_id(task_id, actor)
    }

    pub fn set_task_status(
        &mut self,
        project_id: &str,
        task_id: &str,
        status: TaskStatus,
        today: NaiveDate,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.project_mut(project_id)?
            .set_task_status(task_id, status, today, actor)
    }

    pub fn add_comment(
        &mut self,
        project_id: &str,
        task_id: &str,
        text: &str,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.project_mut(project_id)?
            .add_comment(task_id, text, actor)
    }

    fn check_project_name(&self, name: &str, except_id: Option<&str>) -> AppResult<()> {
        let name = name.trim();
        if name.chars().count() < MIN_PROJECT_NAME_LEN {
            return Err(AppError::Validation(format!(
                "project name must be at least {MIN_PROJECT_NAME_LEN} characters"
            )));
        }

        let taken = self
            .projects
            .iter()
            .any(|project| project.name == name && Some(project.id.as_str()) != except_id);
        if taken {
            return Err(AppError::Conflict(format!(
                "a project named '{name}' already exists"
            )));
        }

        Ok(())
    }

    fn check_project_references(&self, project: &Project) -> AppResult<()> {
        if let Some(company_id) = project.company_id.as_deref() {
            if !self.companies.contains(company_id) {
                return Err(missing_company(company_id));
            }
        }

        for assignment in &project.assigned_users {
            if !self.users.contains(&assignment.user_id) {
                return Err(missing_user(&assignment.user_id));
            }
        }

        for task in &project.to_dos {
            task.validate()?;
            self.check_assignee(task.assigned_to.as_deref())?;
            if let Some(dependency) = task
                .dependencies
                .iter()
                .find(|id| project.find_to_do(id).is_err())
            {
                return Err(AppError::Validation(format!(
                    "dependency '{dependency}' is not a task of project '{}'",
                    project.id
                )));
            }
        }

        Ok(())
    }

    fn check_assignee(&self, user_id: Option<&str>) -> AppResult<()> {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(user_id) if !self.users.contains(user_id) => Err(missing_user(user_id)),
            _ => Ok(()),
        }
    }
}

fn missing<T: Entity>(id: &str) -> AppError {
    AppError::NotFound(format!("{} '{id}' not found", T::KIND))
}

pub(crate) fn missing_project(project_id: &str) -> AppError {
    missing::<Project>(project_id)
}

pub(crate) fn missing_user(user_id: &str) -> AppError {
    missing::<User>(user_id)
}

pub(crate) fn missing_company(company_id: &str) -> AppError {
    missing::<crate::model::Company>(company_id)
}
