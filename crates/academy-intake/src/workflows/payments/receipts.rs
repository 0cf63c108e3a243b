//! Payment receipt files on local disk, addressed publicly under
//! `/uploads/pagos/<file>`.

use std::io::ErrorKind;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::config::UploadConfig;

pub const RECEIPT_ROUTE_PREFIX: &str = "/uploads/pagos";

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("invalid receipt file name '{0}'")]
    InvalidName(String),
    #[error("receipt storage failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReceipt {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptStore {
    dir: PathBuf,
    public_prefix: String,
}

impl ReceiptStore {
    pub fn new(upload_root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: upload_root.into().join("pagos"),
            public_prefix: format!(
                "{}{RECEIPT_ROUTE_PREFIX}",
                public_base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.dir.clone(), &config.public_base_url)
    }

    pub fn dir(&self) -> &FsPath {
        &self.dir
    }

    /// Writes `bytes` under a fresh random name that keeps the original
    /// extension when it looks sane.
    pub async fn save(
        &self,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredReceipt, ReceiptError> {
        fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{}{}", Uuid::new_v4(), extension(original_name));
        fs::write(self.dir.join(&file_name), bytes).await?;
        debug!(file = %file_name, size = bytes.len(), "stored payment receipt");

        Ok(StoredReceipt {
            url: format!("{}/{file_name}", self.public_prefix),
            file_name,
        })
    }

    /// Removes the file a receipt URL points at. Only the last path segment
    /// is trusted.
    pub async fn remove_url(&self, url: &str) -> Result<(), ReceiptError> {
        let file_name = url.rsplit('/').next().unwrap_or_default();
        let path = self.path_for(file_name)?;
        fs::remove_file(path).await?;
        debug!(file = %file_name, "removed payment receipt");
        Ok(())
    }

    /// `None` when no such file exists.
    pub async fn read(&self, file_name: &str) -> Result<Option<Vec<u8>>, ReceiptError> {
        let path = self.path_for(file_name)?;
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn path_for(&self, file_name: &str) -> Result<PathBuf, ReceiptError> {
        let valid = !file_name.is_empty()
            && !file_name.starts_with('.')
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(ReceiptError::InvalidName(file_name.to_string()));
        }
        Ok(self.dir.join(file_name))
    }
}

fn extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| FsPath::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn receipt_router(store: Arc<ReceiptStore>) -> Router {
    Router::new()
        .route(
            &format!("{RECEIPT_ROUTE_PREFIX}/:file_name"),
            get(download_handler),
        )
        .with_state(store)
}

pub(crate) async fn download_handler(
    State(store): State<Arc<ReceiptStore>>,
    Path(file_name): Path<String>,
) -> Response {
    match store.read(&file_name).await {
        Ok(Some(bytes)) => {
            let mime = mime_guess::from_path(&file_name).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response()
        }
        Ok(None) | Err(ReceiptError::InvalidName(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!(error = %err, file = %file_name, "failed to read payment receipt");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
