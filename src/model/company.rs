use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::model::common::{new_id, non_empty};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDraft {
    pub id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Company {
    pub fn from_draft(draft: CompanyDraft) -> Self {
        Self {
            id: non_empty(draft.id).unwrap_or_else(new_id),
            name: draft.name.trim().to_string(),
            address: draft.address.unwrap_or_default(),
            email: draft.email.unwrap_or_default().trim().to_string(),
            phone: draft.phone.unwrap_or_default(),
        }
    }

    pub fn from_json(value: Value) -> AppResult<Self> {
        let draft: CompanyDraft = serde_json::from_value(value)?;
        Ok(Self::from_draft(draft))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::Validation(
                "company name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: CompanyPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(email) = patch.email {
            self.email = email.trim().to_string();
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
    }
}
