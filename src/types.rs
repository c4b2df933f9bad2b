use serde::{Deserialize, Serialize};

/// Access/refresh credential pair as issued by `/auth/login` and `/auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body for `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body for `POST /auth/refresh`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Account role, serialized by variant name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    User,
    QuickFiller,
    SyncManager,
    QuickBuilder,
    DocBuilder,
    SyncMaster,
    Admin,
}

impl Role {
    /// Whether this role may create and edit form templates
    pub fn can_manage_templates(&self) -> bool {
        matches!(self, Role::DocBuilder | Role::Admin)
    }
}

/// Response of `GET /auth/profile`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Error body returned by the backend; `message` is either a string or a list of strings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: ApiErrorMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorMessage {
    One(String),
    Many(Vec<String>),
}

impl ApiErrorBody {
    pub fn joined(&self) -> String {
        match &self.message {
            ApiErrorMessage::One(message) => message.clone(),
            ApiErrorMessage::Many(messages) => messages.join(", "),
        }
    }
}
