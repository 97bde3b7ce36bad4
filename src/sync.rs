//! Keeps the in-memory [`Workspace`] and the remote document store in step.
//!
//! Reads are served from memory once the bulk load has happened. Every
//! mutation runs under the workspace write lock and is written through before
//! the lock is released, so remote writes reach the store in the same order
//! the mutations happened. A failed remote write never rolls back memory; it
//! leaves a [`Notice`] for the user and marks the entity as pending. Any later
//! write to a pending entity, and every retry, sends the whole in-memory
//! record so the store catches up.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{OnceCell, RwLock};

use crate::error::{AppError, AppResult};
use crate::model::common::{new_id, now_timestamp, today};
use crate::model::{
    Company, CompanyDraft, CompanyPatch, Project, ProjectDraft, ProjectPatch, Task, TaskDraft,
    TaskStatus, User, UserDraft, UserPatch, UserRole,
};
use crate::store::timestamps::normalize_record;
use crate::store::{changed_fields, CollectionPath, DocumentStore};
use crate::workspace::transfer::ImportReport;
use crate::workspace::Workspace;

const MAX_NOTICES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    QuotaExceeded,
    StoreFailure,
    LoadFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: String,
    pub kind: NoticeKind,
    pub operation: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    pub synced: usize,
    pub pending: usize,
}

type EntityKey = (CollectionPath, String);

#[derive(Debug)]
enum Write {
    Set(CollectionPath, String, Value),
    Merge(CollectionPath, String, Value),
    Delete(CollectionPath, String),
}

impl Write {
    fn key(&self) -> EntityKey {
        match self {
            Self::Set(collection, id, _)
            | Self::Merge(collection, id, _)
            | Self::Delete(collection, id) => (*collection, id.clone()),
        }
    }

    fn is_noop(&self) -> bool {
        match self {
            Self::Merge(_, _, fields) => fields.as_object().is_some_and(|fields| fields.is_empty()),
            Self::Set(..) | Self::Delete(..) => false,
        }
    }
}

#[derive(Clone)]
pub struct Synchronizer {
    workspace: Arc<RwLock<Workspace>>,
    store: Arc<dyn DocumentStore>,
    loaded: Arc<OnceCell<()>>,
    notices: Arc<Mutex<VecDeque<Notice>>>,
    pending: Arc<Mutex<BTreeSet<EntityKey>>>,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(Workspace::new())),
            store,
            loaded: Arc::new(OnceCell::new()),
            notices: Arc::new(Mutex::new(VecDeque::new())),
            pending: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Bulk-loads every collection the first time it is called. Concurrent
    /// callers wait for the same load. A failed load is not remembered, so
    /// the next call tries again.
    pub async fn ensure_loaded(&self) -> AppResult<()> {
        self.loaded
            .get_or_try_init(|| async {
                match self.load_all().await {
                    Ok(()) => Ok(()),
                    Err(error) => {
                        tracing::error!(error = %error, "bulk load from document store failed");
                        self.record_notice("load", &error, Some(NoticeKind::LoadFailure));
                        Err(error)
                    }
                }
            })
            .await
            .map(|_| ())
    }

    async fn load_all(&self) -> AppResult<()> {
        let today = today();
        let mut fresh = Workspace::new();

        for collection in CollectionPath::ALL {
            let records = self.store.get_all(collection).await?;
            let total = records.len();
            let mut skipped = 0;

            for mut record in records {
                normalize_record(&mut record);
                let loaded = match collection {
                    CollectionPath::Companies => Company::from_json(record)
                        .map(|company| fresh.companies.upsert(company)),
                    CollectionPath::Users => {
                        User::from_json(record).map(|user| fresh.users.upsert(user))
                    }
                    CollectionPath::Projects => Project::from_json(record, today)
                        .map(|project| fresh.projects.upsert(project)),
                };
                if let Err(error) = loaded {
                    skipped += 1;
                    tracing::warn!(
                        collection = collection.as_str(),
                        error = %error,
                        "skipping unreadable stored record"
                    );
                }
            }

            tracing::info!(collection = collection.as_str(), total, skipped, "collection loaded");
        }

        *self.workspace.write().await = fresh;
        Ok(())
    }

    pub async fn read<T>(&self, view: impl FnOnce(&Workspace) -> T) -> AppResult<T> {
        self.ensure_loaded().await?;
        let workspace = self.workspace.read().await;
        Ok(view(&workspace))
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock_or_recover(&self.notices).iter().cloned().collect()
    }

    pub fn dismiss_notice(&self, notice_id: &str) -> AppResult<Notice> {
        let mut notices = lock_or_recover(&self.notices);
        let position = notices
            .iter()
            .position(|notice| notice.id == notice_id)
            .ok_or_else(|| AppError::NotFound(format!("notice '{notice_id}' not found")))?;
        notices
            .remove(position)
            .ok_or_else(|| AppError::NotFound(format!("notice '{notice_id}' not found")))
    }

    fn record_notice(&self, operation: &str, error: &AppError, kind: Option<NoticeKind>) {
        let kind = kind.unwrap_or(match error {
            AppError::QuotaExceeded(_) => NoticeKind::QuotaExceeded,
            _ => NoticeKind::StoreFailure,
        });
        let mut notices = lock_or_recover(&self.notices);
        if notices.len() == MAX_NOTICES {
            notices.pop_front();
        }
        notices.push_back(Notice {
            id: new_id(),
            kind,
            operation: operation.to_string(),
            message: error.to_string(),
            created_at: now_timestamp(),
        });
    }

    /// Entities whose last remote write failed.
    pub fn pending_writes(&self) -> usize {
        lock_or_recover(&self.pending).len()
    }

    /// Sends the current in-memory state of every pending entity.
    pub async fn resync(&self) -> AppResult<ResyncReport> {
        self.ensure_loaded().await?;
        let workspace = self.workspace.write().await;
        let keys: Vec<EntityKey> = lock_or_recover(&self.pending).iter().cloned().collect();

        let mut writes = Vec::with_capacity(keys.len());
        for (collection, id) in &keys {
            writes.push(catch_up(&workspace, *collection, id)?);
        }
        self.flush(&workspace, "resync", writes).await;

        let pending = self.pending_writes();
        tracing::info!(attempted = keys.len(), pending, "pending writes resynced");
        Ok(ResyncReport {
            synced: keys.len().saturating_sub(pending),
            pending,
        })
    }

    /// User-initiated retry behind a notice: finishes the bulk load if it
    /// never succeeded, then resyncs pending writes. The notice is dismissed
    /// once nothing is left pending.
    pub async fn retry_notice(&self, notice_id: &str) -> AppResult<ResyncReport> {
        let exists = lock_or_recover(&self.notices)
            .iter()
            .any(|notice| notice.id == notice_id);
        if !exists {
            return Err(AppError::NotFound(format!("notice '{notice_id}' not found")));
        }

        let report = self.resync().await?;
        if report.pending == 0 {
            self.dismiss_notice(notice_id)?;
        }
        Ok(report)
    }

    fn is_pending(&self, key: &EntityKey) -> bool {
        lock_or_recover(&self.pending).contains(key)
    }

    fn set_pending(&self, key: EntityKey, pending: bool) {
        let mut keys = lock_or_recover(&self.pending);
        if pending {
            keys.insert(key);
        } else {
            keys.remove(&key);
        }
    }

    async fn send(&self, write: &Write) -> AppResult<()> {
        match write {
            Write::Set(collection, id, record) => {
                self.store.set_by_id(*collection, id, record).await
            }
            Write::Merge(collection, id, fields) => {
                self.store.update_by_id(*collection, id, fields).await
            }
            Write::Delete(collection, id) => self.store.delete_by_id(*collection, id).await,
        }
    }

    async fn flush(&self, workspace: &Workspace, operation: &str, writes: Vec<Write>) {
        for write in writes {
            let key = write.key();
            let write = if self.is_pending(&key) {
                match catch_up(workspace, key.0, &key.1) {
                    Ok(write) => write,
                    Err(error) => {
                        self.record_notice(operation, &error, None);
                        continue;
                    }
                }
            } else {
                write
            };
            if write.is_noop() {
                continue;
            }

            let result = match (self.send(&write).await, &write) {
                (Err(AppError::NotFound(_)), Write::Merge(..)) => {
                    tracing::warn!(
                        operation,
                        key = ?key,
                        "merge target missing in store, sending full record"
                    );
                    match catch_up(workspace, key.0, &key.1) {
                        Ok(full) => self.send(&full).await,
                        Err(error) => Err(error),
                    }
                }
                (Err(AppError::NotFound(_)), Write::Delete(..)) => Ok(()),
                (result, _) => result,
            };

            match result {
                Ok(()) => self.set_pending(key, false),
                Err(error) => {
                    tracing::error!(operation, write = ?write, error = %error, "remote write failed");
                    self.record_notice(operation, &error, None);
                    self.set_pending(key, true);
                }
            }
        }
    }

    async fn mutate_project<T>(
        &self,
        project_id: &str,
        operation: &str,
        apply: impl FnOnce(&mut Workspace) -> AppResult<T>,
    ) -> AppResult<T> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let before = workspace.find_project(project_id)?.to_json()?;
        let output = apply(&mut workspace)?;
        let after = workspace.find_project(project_id)?.to_json()?;

        self.flush(
            &workspace,
            operation,
            vec![Write::Merge(
                CollectionPath::Projects,
                project_id.to_string(),
                changed_fields(&before, &after),
            )],
        )
        .await;
        Ok(output)
    }

    pub async fn create_project(
        &self,
        draft: ProjectDraft,
        actor: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<Project> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let project = workspace.new_project(draft, actor, today)?;
        self.flush(
            &workspace,
            "create_project",
            vec![Write::Set(
                CollectionPath::Projects,
                project.id.clone(),
                project.to_json()?,
            )],
        )
        .await;
        Ok(project)
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        patch: ProjectPatch,
        actor: Option<&str>,
    ) -> AppResult<Project> {
        self.mutate_project(project_id, "update_project", |workspace| {
            workspace.update_project(project_id, patch, actor)
        })
        .await
    }

    pub async fn delete_project(&self, project_id: &str) -> AppResult<Project> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let project = workspace.delete_project(project_id)?;
        self.flush(
            &workspace,
            "delete_project",
            vec![Write::Delete(CollectionPath::Projects, project.id.clone())],
        )
        .await;
        Ok(project)
    }

    pub async fn assign_user(
        &self,
        project_id: &str,
        user_id: &str,
        role: UserRole,
        actor: Option<&str>,
    ) -> AppResult<Project> {
        self.mutate_project(project_id, "assign_user", |workspace| {
            workspace.assign_user(project_id, user_id, role, actor)
        })
        .await
    }

    pub async fn unassign_user(
        &self,
        project_id: &str,
        user_id: &str,
        actor: Option<&str>,
    ) -> AppResult<Project> {
        self.mutate_project(project_id, "unassign_user", |workspace| {
            workspace.unassign_user(project_id, user_id, actor)
        })
        .await
    }

    pub async fn add_to_do(
        &self,
        project_id: &str,
        draft: TaskDraft,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.mutate_project(project_id, "add_to_do", |workspace| {
            workspace.add_to_do(project_id, draft, actor)
        })
        .await
    }

    pub async fn update_to_do(
        &self,
        project_id: &str,
        task: Task,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.mutate_project(project_id, "update_to_do", |workspace| {
            workspace.update_to_do(project_id, task, actor)
        })
        .await
    }

    pub async fn delete_to_do(
        &self,
        project_id: &str,
        task_id: &str,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.mutate_project(project_id, "delete_to_do", |workspace| {
            workspace.delete_to_do(project_id, task_id, actor)
        })
        .await
    }

    pub async fn set_task_status(
        &self,
        project_id: &str,
        task_id: &str,
        status: TaskStatus,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        let today = today();
        self.mutate_project(project_id, "set_task_status", |workspace| {
            workspace.set_task_status(project_id, task_id, status, today, actor)
        })
        .await
    }

    pub async fn add_comment(
        &self,
        project_id: &str,
        task_id: &str,
        text: &str,
        actor: Option<&str>,
    ) -> AppResult<Task> {
        self.mutate_project(project_id, "add_comment", |workspace| {
            workspace.add_comment(project_id, task_id, text, actor)
        })
        .await
    }

    pub async fn create_user(&self, draft: UserDraft) -> AppResult<User> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let user = workspace.create_user(draft)?;
        self.flush(
            &workspace,
            "create_user",
            vec![Write::Set(
                CollectionPath::Users,
                user.id.clone(),
                encode(&user)?,
            )],
        )
        .await;
        Ok(user)
    }

    pub async fn update_user(&self, user_id: &str, patch: UserPatch) -> AppResult<User> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let before = encode(workspace.find_user(user_id)?)?;
        let user = workspace.update_user(user_id, patch)?;
        self.flush(
            &workspace,
            "update_user",
            vec![Write::Merge(
                CollectionPath::Users,
                user.id.clone(),
                changed_fields(&before, &encode(&user)?),
            )],
        )
        .await;
        Ok(user)
    }

    /// Also rewrites every project that referenced the user.
    pub async fn delete_user(&self, user_id: &str) -> AppResult<User> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let (user, touched) = workspace.delete_user(user_id)?;

        let mut writes = vec![Write::Delete(CollectionPath::Users, user.id.clone())];
        writes.extend(project_writes(&workspace, touched.iter())?);
        self.flush(&workspace, "delete_user", writes).await;
        Ok(user)
    }

    pub async fn create_company(&self, draft: CompanyDraft) -> AppResult<Company> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let company = workspace.create_company(draft)?;
        self.flush(
            &workspace,
            "create_company",
            vec![Write::Set(
                CollectionPath::Companies,
                company.id.clone(),
                encode(&company)?,
            )],
        )
        .await;
        Ok(company)
    }

    pub async fn update_company(
        &self,
        company_id: &str,
        patch: CompanyPatch,
    ) -> AppResult<Company> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let before = encode(workspace.find_company(company_id)?)?;
        let company = workspace.update_company(company_id, patch)?;
        self.flush(
            &workspace,
            "update_company",
            vec![Write::Merge(
                CollectionPath::Companies,
                company.id.clone(),
                changed_fields(&before, &encode(&company)?),
            )],
        )
        .await;
        Ok(company)
    }

    pub async fn delete_company(&self, company_id: &str) -> AppResult<Company> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let (company, touched) = workspace.delete_company(company_id)?;

        let mut writes = vec![Write::Delete(CollectionPath::Companies, company.id.clone())];
        writes.extend(project_writes(&workspace, touched.iter())?);
        self.flush(&workspace, "delete_company", writes).await;
        Ok(company)
    }

    pub async fn import(&self, payload: &Value) -> AppResult<ImportReport> {
        self.ensure_loaded().await?;
        let mut workspace = self.workspace.write().await;
        let report = workspace.import(payload, today())?;

        let mut writes = Vec::new();
        for company_id in &report.changed_companies {
            let company = workspace.find_company(company_id)?;
            writes.push(Write::Set(
                CollectionPath::Companies,
                company.id.clone(),
                encode(company)?,
            ));
        }
        for user_id in &report.changed_users {
            let user = workspace.find_user(user_id)?;
            writes.push(Write::Set(
                CollectionPath::Users,
                user.id.clone(),
                encode(user)?,
            ));
        }
        writes.extend(project_writes(&workspace, report.changed_projects.iter())?);

        self.flush(&workspace, "import", writes).await;
        Ok(report)
    }
}

fn encode<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value)
        .map_err(|error| AppError::internal("record serialization failed", error))
}

/// Full write that brings the store in line with memory for one entity.
fn catch_up(workspace: &Workspace, collection: CollectionPath, id: &str) -> AppResult<Write> {
    let record = match collection {
        CollectionPath::Projects => workspace
            .projects
            .get(id)
            .map(Project::to_json)
            .transpose()?,
        CollectionPath::Users => workspace.users.get(id).map(encode).transpose()?,
        CollectionPath::Companies => workspace.companies.get(id).map(encode).transpose()?,
    };

    Ok(match record {
        Some(record) => Write::Set(collection, id.to_string(), record),
        None => Write::Delete(collection, id.to_string()),
    })
}

fn project_writes<'a>(
    workspace: &Workspace,
    project_ids: impl Iterator<Item = &'a String>,
) -> AppResult<Vec<Write>> {
    project_ids
        .map(|project_id| {
            let project = workspace.find_project(project_id)?;
            Ok::<_, AppError>(Write::Set(
                CollectionPath::Projects,
                project.id.clone(),
                project.to_json()?,
            ))
        })
        .collect()
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
