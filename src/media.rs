//! Binary asset hosting for uploaded study files.
//!
//! The daemon never serves file bytes itself. Uploads are handed to a
//! [`MediaHost`], which returns a public URL plus an opaque media id used
//! later for deletion.

use crate::config::CloudinaryConfig;
use crate::error::{PortalError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub const CLOUDINARY_HOST_MARKER: &str = "cloudinary.com";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    pub url: String,
    pub media_id: String,
}

pub trait MediaHost {
    fn backend(&self) -> &'static str;
    fn upload(&self, folder: &str, public_id: &str, bytes: &[u8]) -> Result<UploadedMedia>;
    fn destroy(&self, media_id: &str) -> Result<()>;
}

/// Replaces everything outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<millis>-<8 hex>-<sanitized name>`; the random segment keeps same-name
/// uploads within one millisecond apart.
pub fn public_id_for(file_name: &str, uploaded_at_millis: i64) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        uploaded_at_millis,
        &nonce[..8],
        sanitize_file_name(file_name)
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryLinks {
    pub view_url: String,
    pub download_url: String,
}

/// Builds the inline-view and attachment-download URLs for a stored file.
pub fn delivery_links(file_path: &str) -> DeliveryLinks {
    if !file_path.contains(CLOUDINARY_HOST_MARKER) {
        return DeliveryLinks {
            view_url: file_path.to_string(),
            download_url: file_path.to_string(),
        };
    }
    if file_path.contains("/raw/upload/") {
        DeliveryLinks {
            view_url: file_path.replacen("/raw/upload/", "/image/upload/fl_attachment/", 1),
            download_url: file_path.replacen("/raw/upload/", "/raw/upload/fl_attachment/", 1),
        }
    } else if file_path.contains("/upload/") {
        let rewritten = file_path.replacen("/upload/", "/upload/fl_attachment/", 1);
        DeliveryLinks {
            view_url: rewritten.clone(),
            download_url: rewritten,
        }
    } else {
        DeliveryLinks {
            view_url: file_path.to_string(),
            download_url: file_path.to_string(),
        }
    }
}

/// Stores media under a directory, addressed by `file://` URLs.
pub struct LocalMediaHost {
    root: PathBuf,
}

impl LocalMediaHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, media_id: &str) -> Result<PathBuf> {
        let rel = Path::new(media_id);
        let safe = !media_id.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PortalError::bad_params(format!(
                "invalid media id: {media_id}"
            )));
        }
        Ok(self.root.join(rel))
    }
}

impl MediaHost for LocalMediaHost {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn upload(&self, folder: &str, public_id: &str, bytes: &[u8]) -> Result<UploadedMedia> {
        let media_id = format!("{}/{}", folder.trim_matches('/'), public_id);
        let path = self.resolve(&media_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PortalError::Conflict(format!("media id already in use: {media_id}")))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes)?;
        let abs = path.canonicalize().unwrap_or(path);
        debug!(media_id = %media_id, "stored media locally");
        Ok(UploadedMedia {
            url: format!("file://{}", abs.to_string_lossy()),
            media_id,
        })
    }

    fn destroy(&self, media_id: &str) -> Result<()> {
        let path = self.resolve(media_id)?;
        if !path.is_file() {
            return Err(PortalError::NotFound("media"));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }
}

/// Cloudinary-compatible media host using signed requests.
pub struct CloudinaryHost {
    config: CloudinaryConfig,
    api_base: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUpload {
    secure_url: Option<String>,
    public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudinaryDestroy {
    result: String,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| PortalError::Media(format!("client build failed: {e}")))?;
        let api_base = format!(
            "https://api.{}/v1_1/{}",
            CLOUDINARY_HOST_MARKER, config.cloud_name
        );
        Ok(Self {
            config,
            api_base,
            client,
        })
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }
}

/// Signs request parameters: sorted `key=value` pairs joined by `&`, then the
/// API secret appended, hashed with SHA-256.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let digest = Sha256::digest(format!("{joined}{api_secret}").as_bytes());
    format!("{:x}", digest)
}

impl MediaHost for CloudinaryHost {
    fn backend(&self) -> &'static str {
        "cloudinary"
    }

    #[instrument(name = "cloudinary_upload", skip(self, bytes), fields(size = bytes.len()))]
    fn upload(&self, folder: &str, public_id: &str, bytes: &[u8]) -> Result<UploadedMedia> {
        let timestamp = Self::timestamp();
        let signature = sign_params(
            &[
                ("folder", folder),
                ("public_id", public_id),
                ("timestamp", &timestamp),
            ],
            &self.config.api_secret,
        );
        let part = reqwest::blocking::multipart::Part::bytes(bytes.to_vec())
            .file_name(public_id.to_string());
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("public_id", public_id.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let resp = self
            .client
            .post(format!("{}/raw/upload", self.api_base))
            .multipart(form)
            .send()
            .map_err(|e| PortalError::Media(format!("upload failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(PortalError::Media(format!(
                "upload rejected with status {}: {}",
                status.as_u16(),
                body
            )));
        }
        let payload: CloudinaryUpload = resp
            .json()
            .map_err(|e| PortalError::Media(format!("invalid upload response: {e}")))?;
        match (payload.secure_url, payload.public_id) {
            (Some(url), Some(media_id)) => {
                info!(media_id = %media_id, "uploaded media");
                Ok(UploadedMedia { url, media_id })
            }
            _ => Err(PortalError::Media(
                "upload response missing secure_url or public_id".to_string(),
            )),
        }
    }

    #[instrument(name = "cloudinary_destroy", skip(self))]
    fn destroy(&self, media_id: &str) -> Result<()> {
        let timestamp = Self::timestamp();
        let signature = sign_params(
            &[("public_id", media_id), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );
        let resp = self
            .client
            .post(format!("{}/raw/destroy", self.api_base))
            .form(&[
                ("public_id", media_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .map_err(|e| PortalError::Media(format!("destroy failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(PortalError::Media(format!(
                "destroy rejected with status {}",
                resp.status().as_u16()
            )));
        }
        let payload: CloudinaryDestroy = resp
            .json()
            .map_err(|e| PortalError::Media(format!("invalid destroy response: {e}")))?;
        match payload.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(PortalError::NotFound("media")),
            other => Err(PortalError::Media(format!("destroy returned {other}"))),
        }
    }
}
