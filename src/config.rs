use crate::models::AuthUser;
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Image API configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub public_url_prefix: String,
    pub max_upload_bytes: usize,
    /// Largest width or height `/api/resize` will produce.
    pub max_resize_dimension: u32,
    pub users: Vec<AuthUser>,
    pub jwt: Option<JwtConfig>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_hours: i64,
}

/// Standalone upload microservice configuration.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let users_file = get_env_or_default("USERS_FILE", "users.json");
        let users = load_users(Path::new(&users_file))?;

        let jwt = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .map(|secret| JwtConfig {
                secret,
                expiry_hours: get_env_or_default("JWT_EXPIRY_HOURS", "24")
                    .parse()
                    .unwrap_or(24),
            });

        Ok(Self {
            host: get_env_or_default("HOST", "0.0.0.0"),
            port: get_env_or_default("PORT", "3000")
                .parse()
                .context("PORT must be a port number")?,
            upload_dir: PathBuf::from(get_env_or_default("UPLOAD_DIR", "public/images")),
            metadata_file: PathBuf::from(get_env_or_default("METADATA_FILE", "data/images.json")),
            public_url_prefix: get_env_or_default("PUBLIC_URL_PREFIX", "/images"),
            max_upload_bytes: max_upload_bytes()?,
            max_resize_dimension: get_env_or_default("MAX_RESIZE_DIMENSION", "4096")
                .parse()
                .context("MAX_RESIZE_DIMENSION must be a whole number")?,
            users,
            jwt,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: get_env_or_default("HOST", "0.0.0.0"),
            port: get_env_or_default("UPLOAD_SERVER_PORT", "3214")
                .parse()
                .context("UPLOAD_SERVER_PORT must be a port number")?,
            upload_dir: PathBuf::from(get_env_or_default("UPLOAD_SERVER_DIR", "uploads")),
            max_upload_bytes: max_upload_bytes()?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads the user list. A missing file yields no users, so every authenticated call is refused.
pub fn load_users(path: &Path) -> Result<Vec<AuthUser>> {
    if !path.exists() {
        tracing::warn!(
            "Users file {} not found; authenticated routes will reject all requests",
            path.display()
        );
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read users file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse users file: {}", path.display()))
}

fn max_upload_bytes() -> Result<usize> {
    let mb: usize = get_env_or_default("MAX_UPLOAD_MB", "10")
        .parse()
        .context("MAX_UPLOAD_MB must be a whole number")?;
    Ok(mb * 1024 * 1024)
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_users_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let users = load_users(&dir.path().join("nope.json")).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_load_users_parses_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"username":"admin","passwordHash":"$2b$04$x","apiKey":"k1","role":"admin"}}]"#
        )
        .unwrap();
        let users = load_users(file.path()).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "admin");
        assert_eq!(users[0].api_key, "k1");
        assert_eq!(users[0].role.as_deref(), Some("admin"));
        assert!(users[0].email.is_none());
    }

    #[test]
    fn test_load_users_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_users(file.path()).is_err());
    }
}
