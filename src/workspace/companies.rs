use crate::error::{AppError, AppResult};
use crate::model::{Company, CompanyDraft, CompanyPatch};
use crate::workspace::projects::missing_company;
use crate::workspace::Workspace;

impl Workspace {
    pub fn list_companies(&self) -> Vec<Company> {
        self.companies.to_vec()
    }

    pub fn find_company(&self, company_id: &str) -> AppResult<&Company> {
        self.companies
            .get(company_id)
            .ok_or_else(|| missing_company(company_id))
    }

    pub fn create_company(&mut self, draft: CompanyDraft) -> AppResult<Company> {
        let company = Company::from_draft(draft);
        company.validate()?;
        if self.companies.contains(&company.id) {
            return Err(AppError::Conflict(format!(
                "company '{}' already exists",
                company.id
            )));
        }

        self.companies.upsert(company.clone());
        Ok(company)
    }

    pub fn update_company(&mut self, company_id: &str, patch: CompanyPatch) -> AppResult<Company> {
        let mut company = self.find_company(company_id)?.clone();
        company.apply_patch(patch);
        company.validate()?;
        self.companies.upsert(company.clone());
        Ok(company)
    }

    /// Projects pointing at the company lose the reference.
    pub fn delete_company(&mut self, company_id: &str) -> AppResult<(Company, Vec<String>)> {
        let removed = self
            .companies
            .remove(company_id)
            .ok_or_else(|| missing_company(company_id))?;

        let mut touched = Vec::new();
        for project in self.projects.iter_mut() {
            if project.company_id.as_deref() == Some(company_id) {
                project.company_id = None;
                project.touch(None);
                touched.push(project.id.clone());
            }
        }

        Ok((removed, touched))
    }
}
