//! Manifest resolution with a per-session cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lumen_types::Manifest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::decode_manifest;
use crate::error::{Result, RuntimeError};
use crate::invoker::ExtensionInvoker;

#[derive(Debug)]
pub struct ManifestResolver {
    invoker: Arc<ExtensionInvoker>,
    cache: Mutex<HashMap<PathBuf, Arc<Manifest>>>,
}

impl ManifestResolver {
    pub fn new(invoker: Arc<ExtensionInvoker>) -> Self {
        Self {
            invoker,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached manifest, querying the extension on first use.
    pub async fn resolve(&self, extension: &str, entrypoint: &Path) -> Result<Arc<Manifest>> {
        if let Some(manifest) = self.cache.lock().expect("manifest cache lock poisoned").get(entrypoint) {
            return Ok(manifest.clone());
        }
        self.query(extension, entrypoint).await
    }

    /// Drops the cached manifest and queries the extension again.
    pub async fn refresh(&self, extension: &str, entrypoint: &Path) -> Result<Arc<Manifest>> {
        self.invalidate(entrypoint);
        self.query(extension, entrypoint).await
    }

    pub fn invalidate(&self, entrypoint: &Path) {
        self.cache.lock().expect("manifest cache lock poisoned").remove(entrypoint);
    }

    async fn query(&self, extension: &str, entrypoint: &Path) -> Result<Arc<Manifest>> {
        let output = self.invoker.query_manifest(entrypoint, &CancellationToken::new()).await?;
        if !output.success() {
            let reason = match output.stderr.trim() {
                "" => format!("exited with code {}", output.exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())),
                stderr => stderr.to_string(),
            };
            return Err(RuntimeError::manifest(extension, reason));
        }

        let manifest = Arc::new(decode_manifest(extension, &output.stdout)?);
        info!(extension, commands = manifest.commands().len(), "resolved manifest");
        debug!(extension, title = %manifest.title, "caching manifest");
        self.cache
            .lock()
            .expect("manifest cache lock poisoned")
            .insert(entrypoint.to_path_buf(), manifest.clone());
        Ok(manifest)
    }
}
