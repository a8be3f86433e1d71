use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Descriptor of an uploaded image, stored apart from the file itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: Uuid,
    pub original_name: String,
    /// Public URL; its last segment is the on-disk filename.
    pub path: String,
    pub size: u64,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// The writable subset of an `ImageRecord`. Unknown fields in a request body are dropped.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePatch {
    pub original_name: Option<String>,
}

/// A statically configured API user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub api_key: String,
    pub user: AuthUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub images: Vec<ImageRecord>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResizeQuery {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_uses_camel_case() {
        let record = ImageRecord {
            id: Uuid::new_v4(),
            original_name: "cat.png".to_string(),
            path: "/images/abc.png".to_string(),
            size: 100,
            mime_type: "image/png".to_string(),
            width: Some(10),
            height: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["originalName"], "cat.png");
        assert_eq!(value["mimeType"], "image/png");
        assert!(value["height"].is_null());
        assert!(value.get("createdAt").is_some());
        assert_eq!(record.file_name(), "abc.png");
    }

    #[test]
    fn test_patch_ignores_other_fields() {
        let patch: ImagePatch =
            serde_json::from_value(json!({ "originalName": "x", "size": 999 })).unwrap();
        assert_eq!(patch.original_name.as_deref(), Some("x"));
    }

    #[test]
    fn test_auth_user_hides_secrets() {
        let user = AuthUser {
            username: "admin".to_string(),
            password_hash: "hash".to_string(),
            api_key: "key".to_string(),
            email: None,
            fullname: None,
            role: Some("admin".to_string()),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("apiKey").is_none());
        assert_eq!(value["role"], "admin");
    }
}
