use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::media::{CloudinaryHost, LocalMediaHost, MediaHost};
use crate::subscriptions::SubscriptionHub;
use crate::{backup, db};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub media: Option<Box<dyn MediaHost>>,
    pub admin: bool,
    pub hub: SubscriptionHub,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            media: None,
            admin: false,
            hub: SubscriptionHub::default(),
        }
    }

    /// Opens (or creates) the workspace database and the media host that goes
    /// with it. Live subscriptions belong to the previous workspace and are
    /// dropped.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        self.close_workspace();
        let conn = db::open_db(path)?;
        let media: Box<dyn MediaHost> = match self.config.cloudinary.clone() {
            Some(c) => Box::new(CloudinaryHost::new(c)?),
            None => Box::new(LocalMediaHost::new(path.join(backup::MEDIA_DIR))),
        };
        info!(
            workspace = %path.to_string_lossy(),
            media = media.backend(),
            "workspace opened"
        );
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
        self.media = Some(media);
        Ok(())
    }

    pub fn close_workspace(&mut self) {
        self.hub.clear();
        self.db = None;
        self.media = None;
        self.workspace = None;
    }
}
