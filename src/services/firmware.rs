//! OTA firmware distribution: version manifest, binary download, force
//! flag. The SHA256 digest is cached and recomputed only when the binary's
//! mtime changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::store::{entity, JsonStore};

/// Devices refuse OTA below this battery fraction unless charging.
const MIN_OTA_BATTERY: f32 = 3.5;
/// Sanity bounds for a plausible firmware image.
const MIN_FIRMWARE_SIZE: u64 = 100 * 1024;
const MAX_FIRMWARE_SIZE: u64 = 8 * 1024 * 1024;

/// `GET /firmware/version` response.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareManifest {
    pub version: String,
    pub build_date: String,
    pub size: u64,
    pub sha256: String,
    pub min_battery: f32,
    pub force_update: bool,
    pub deployed_at: DateTime<Utc>,
}

/// Sidecar entity carrying version info when the env vars are unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirmwareInfo {
    pub version: String,
    pub build_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ForceOta {
    enabled: bool,
}

struct DigestCache {
    mtime: SystemTime,
    sha256: String,
    size: u64,
}

pub struct FirmwareService {
    store: Arc<JsonStore>,
    path: PathBuf,
    version: String,
    build_date: String,
    digest: RwLock<Option<DigestCache>>,
}

impl FirmwareService {
    /// Version and build date resolve env-first, then the sidecar entity,
    /// then a placeholder.
    pub async fn new(
        store: Arc<JsonStore>,
        path: PathBuf,
        env_version: Option<String>,
        env_build_date: Option<String>,
    ) -> Result<Self, AppError> {
        let sidecar: FirmwareInfo = store.read_or_default(entity::FIRMWARE_INFO).await?;
        let version = env_version
            .or(non_empty(sidecar.version))
            .unwrap_or_else(|| "unknown".into());
        let build_date = env_build_date
            .or(non_empty(sidecar.build_date))
            .unwrap_or_else(|| "unknown".into());
        Ok(Self {
            store,
            path,
            version,
            build_date,
            digest: RwLock::new(None),
        })
    }

    /// Build the manifest, recomputing the digest when the binary changed.
    pub async fn manifest(&self) -> Result<FirmwareManifest, AppError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|_| AppError::NotFound("no firmware binary deployed".into()))?;
        let mtime = metadata.modified().map_err(|e| {
            AppError::Internal(format!("firmware mtime unavailable: {e}"))
        })?;

        let cached = {
            let digest = self.digest.read().await;
            digest
                .as_ref()
                .filter(|d| d.mtime == mtime)
                .map(|d| (d.sha256.clone(), d.size))
        };
        let (sha256, size) = match cached {
            Some(hit) => hit,
            None => {
                let path = self.path.clone();
                let (sha256, size) = tokio::task::spawn_blocking(move || {
                    let bytes = std::fs::read(&path)?;
                    let mut hasher = Sha256::new();
                    hasher.update(&bytes);
                    Ok::<_, std::io::Error>((hex::encode(hasher.finalize()), bytes.len() as u64))
                })
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
                .map_err(|e| AppError::Internal(format!("firmware read: {e}")))?;
                let mut digest = self.digest.write().await;
                *digest = Some(DigestCache {
                    mtime,
                    sha256: sha256.clone(),
                    size,
                });
                tracing::info!(size = size, sha256 = %sha256, "Firmware digest refreshed");
                (sha256, size)
            }
        };

        if !(MIN_FIRMWARE_SIZE..=MAX_FIRMWARE_SIZE).contains(&size) {
            tracing::warn!(
                size = size,
                "Firmware binary outside the size bounds devices will accept"
            );
        }

        let force: ForceOta = self.store.read_or_default(entity::FORCE_OTA).await?;
        Ok(FirmwareManifest {
            version: self.version.clone(),
            build_date: self.build_date.clone(),
            size,
            sha256,
            min_battery: MIN_OTA_BATTERY,
            force_update: force.enabled,
            deployed_at: DateTime::<Utc>::from(mtime),
        })
    }

    /// The firmware binary for streaming to a device.
    pub async fn binary(&self) -> Result<Vec<u8>, AppError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|_| AppError::NotFound("no firmware binary deployed".into()))
    }

    pub async fn set_force_update(&self, enabled: bool) -> Result<(), AppError> {
        self.store
            .update(entity::FORCE_OTA, |force: &mut ForceOta| {
                force.enabled = enabled;
            })
            .await?;
        tracing::info!(enabled = enabled, "Force-update flag changed");
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service_with_binary(bytes: &[u8]) -> (tempfile::TempDir, FirmwareService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path().join("data")).unwrap());
        let path = dir.path().join("firmware.bin");
        std::fs::write(&path, bytes).unwrap();
        let service = FirmwareService::new(store, path, Some("v3".into()), Some("2025-06-01".into()))
            .await
            .unwrap();
        (dir, service)
    }

    #[tokio::test]
    async fn test_manifest_digest_and_size() {
        let (_dir, fw) = service_with_binary(b"firmware-bytes").await;
        let manifest = fw.manifest().await.unwrap();
        assert_eq!(manifest.version, "v3");
        assert_eq!(manifest.size, 14);
        // SHA256 of the exact payload, hex encoded.
        let mut hasher = Sha256::new();
        hasher.update(b"firmware-bytes");
        assert_eq!(manifest.sha256, hex::encode(hasher.finalize()));
        assert!(!manifest.force_update);
        assert_eq!(manifest.min_battery, MIN_OTA_BATTERY);
    }

    #[tokio::test]
    async fn test_digest_cached_until_mtime_changes() {
        let (_dir, fw) = service_with_binary(b"one").await;
        let first = fw.manifest().await.unwrap();
        let second = fw.manifest().await.unwrap();
        assert_eq!(first.sha256, second.sha256);
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path().join("data")).unwrap());
        let fw = FirmwareService::new(store, dir.path().join("nope.bin"), None, None)
            .await
            .unwrap();
        assert!(matches!(
            fw.manifest().await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_force_flag_round_trip() {
        let (_dir, fw) = service_with_binary(b"fw").await;
        fw.set_force_update(true).await.unwrap();
        assert!(fw.manifest().await.unwrap().force_update);
        fw.set_force_update(false).await.unwrap();
        assert!(!fw.manifest().await.unwrap().force_update);
    }
}
