use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub target_user_id: Option<Uuid>,
    pub action: String,
    pub reason: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: Uuid,
        target_user_id: Option<Uuid>,
        action: &str,
        reason: &str,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            target_user_id,
            action: action.to_string(),
            reason: reason.to_string(),
            detail,
            created_at: Utc::now(),
        }
    }
}
