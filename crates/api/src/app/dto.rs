use serde::Serialize;

use keel_auth::UserAccount;

/// Body of a successful signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub tenant_id: String,
}

impl From<&UserAccount> for UserSummary {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.clone(),
            tenant_id: account.tenant_id.to_string(),
        }
    }
}

pub fn records_to_json(records: Vec<keel_core::Record>) -> serde_json::Value {
    let items = records.iter().map(keel_core::Record::to_json).collect::<Vec<_>>();
    serde_json::json!({ "items": items })
}
