use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::tasks::repo::Task;

/// Task as seen by the client: `{id, content, status, createdAt}`.
/// The owner is never serialized.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub content: String,
    pub status: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            content: t.content,
            status: t.status,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub content: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn task_response_wire_shape() {
        let response = TaskResponse {
            id: Uuid::nil(),
            content: "write the report".into(),
            status: "todo".into(),
            created_at: datetime!(2024-03-01 12:30:00 UTC),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""createdAt":"2024-03-01T12:30:00Z""#));
        assert!(json.contains(r#""status":"todo""#));
        assert!(!json.contains("user_id"));
        assert!(!json.contains("ownerId"));
    }

    #[test]
    fn delete_response_wire_shape() {
        let json = serde_json::to_string(&DeleteResponse { success: true }).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn delete_params_id_is_optional() {
        let p: DeleteParams = serde_json::from_str("{}").unwrap();
        assert!(p.id.is_none());
    }
}
