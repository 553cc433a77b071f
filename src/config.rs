use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MEDIA_FOLDER: &str = "student-portal";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub max_upload_bytes: u64,
    pub media_folder: String,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            admin_username: "admin".to_string(),
            admin_password: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            media_folder: DEFAULT_MEDIA_FOLDER.to_string(),
            cloudinary: None,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let cloudinary = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => {
                info!("Cloudinary credentials incomplete, media stays in the workspace");
                None
            }
        };

        let admin_password = var("PORTAL_ADMIN_PASSWORD");
        if admin_password.is_none() {
            warn!("PORTAL_ADMIN_PASSWORD not set, admin login is disabled");
        }

        Ok(Self {
            workspace: var("PORTAL_WORKSPACE").map(PathBuf::from),
            admin_username: var("PORTAL_ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            admin_password,
            max_upload_bytes: try_load("PORTAL_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            media_folder: var("PORTAL_MEDIA_FOLDER")
                .unwrap_or_else(|| DEFAULT_MEDIA_FOLDER.to_string()),
            cloudinary,
        })
    }
}

fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn try_load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = var(key) else {
        info!("{key} not set, using default: {default}");
        return Ok(default);
    };
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}
