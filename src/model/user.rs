use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::model::common::{initials_icon, new_id, non_empty, random_color};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[default]
    Architect,
    Engineer,
    Developer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    Administrator,
    Editor,
    #[default]
    Guest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub access: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub icon: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub id: Option<String>,
    pub name: String,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub access: Option<Access>,
    pub company: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl User {
    pub fn from_draft(draft: UserDraft) -> Self {
        let name = draft.name.trim().to_string();
        let surname = draft.surname.unwrap_or_default().trim().to_string();

        Self {
            id: non_empty(draft.id).unwrap_or_else(new_id),
            icon: non_empty(draft.icon).unwrap_or_else(|| initials_icon(&name, &surname)),
            color: non_empty(draft.color).unwrap_or_else(random_color),
            email: draft.email.unwrap_or_default().trim().to_string(),
            phone: draft.phone.unwrap_or_default(),
            role: draft.role.unwrap_or_default(),
            access: draft.access.unwrap_or_default(),
            company: non_empty(draft.company),
            name,
            surname,
        }
    }

    pub fn from_json(value: Value) -> AppResult<Self> {
        let draft: UserDraft = serde_json::from_value(value)?;
        Ok(Self::from_draft(draft))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::Validation("user name cannot be empty".to_string()));
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(AppError::Validation(format!(
                "invalid email address '{}'",
                self.email
            )));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        if self.surname.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.surname)
        }
    }

    pub fn apply_patch(&mut self, patch: UserPatch) {
        let mut renamed = false;
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
            renamed = true;
        }
        if let Some(surname) = patch.surname {
            self.surname = surname.trim().to_string();
            renamed = true;
        }
        if renamed {
            self.icon = initials_icon(&self.name, &self.surname);
        }
        if let Some(email) = patch.email {
            self.email = email.trim().to_string();
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(access) = patch.access {
            self.access = access;
        }
        if let Some(company) = patch.company {
            self.company = non_empty(Some(company));
        }
        if let Some(color) = non_empty(patch.color) {
            self.color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_draft_derives_icon_and_defaults() {
        let user = User::from_json(json!({ "name": "grace", "surname": "hopper" }))
            .expect("user should parse");
        assert_eq!(user.icon, "GH");
        assert_eq!(user.role, UserRole::Architect);
        assert_eq!(user.access, Access::Guest);
        assert_eq!(user.full_name(), "grace hopper");
        assert!(serde_json::to_value(&user)
            .expect("user should serialize")
            .get("company")
            .is_none());
    }

    #[test]
    fn round_trip_keeps_id_and_enums() {
        let user = User::from_draft(UserDraft {
            id: Some("u-7".to_string()),
            name: "Linus".to_string(),
            role: Some(UserRole::Developer),
            access: Some(Access::Administrator),
            company: Some("c-1".to_string()),
            ..UserDraft::default()
        });

        let value = serde_json::to_value(&user).expect("user should serialize");
        assert_eq!(value["access"], "Administrator");
        assert_eq!(User::from_json(value).expect("user should parse"), user);
    }

    #[test]
    fn rename_recomputes_icon() {
        let mut user = User::from_draft(UserDraft {
            name: "Ada".to_string(),
            surname: Some("Byron".to_string()),
            ..UserDraft::default()
        });
        user.apply_patch(UserPatch {
            surname: Some("Lovelace".to_string()),
            ..UserPatch::default()
        });
        assert_eq!(user.icon, "AL");
    }

    #[test]
    fn validate_rejects_malformed_email() {
        let user = User::from_draft(UserDraft {
            name: "Ada".to_string(),
            email: Some("not-an-email".to_string()),
            ..UserDraft::default()
        });
        assert!(matches!(user.validate(), Err(AppError::Validation(_))));
    }
}
