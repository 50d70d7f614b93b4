use crate::error::StoreError;
use crate::proxy::Proxy;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// On-disk form: `{ "timestamp": "...", "proxies": ["scheme://host:port", ...] }`.
#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    timestamp: String,
    proxies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub proxies: Vec<Proxy>,
}

impl Snapshot {
    pub fn now(proxies: Vec<Proxy>) -> Self {
        Self {
            captured_at: Utc::now(),
            proxies,
        }
    }
}

/// JSON file holding the last known pool, gated by age on read.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    max_age: Duration,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot, refusing it when older than the max age.
    pub async fn read(&self) -> Result<Snapshot, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: SnapshotFile = serde_json::from_str(&data)?;
        let captured_at = parse_timestamp(&file.timestamp)?;

        let age = Utc::now() - captured_at;
        // A timestamp in the future converts to an error and counts as fresh.
        if let Ok(age_std) = age.to_std() {
            if age_std > self.max_age {
                return Err(StoreError::Stale {
                    age_hours: age.num_hours(),
                });
            }
        }

        let proxies = file
            .proxies
            .iter()
            .filter_map(|raw| match raw.parse::<Proxy>() {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("skipping stored proxy {:?}: {}", raw, e);
                    None
                }
            })
            .collect();

        Ok(Snapshot {
            captured_at,
            proxies,
        })
    }

    pub async fn write(&self, proxies: &[Proxy]) -> Result<(), StoreError> {
        self.write_snapshot(&Snapshot::now(proxies.to_vec())).await
    }

    /// Writes to a sibling temp file first so a crash never leaves half a
    /// snapshot behind.
    pub async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let file = SnapshotFile {
            timestamp: snapshot.captured_at.to_rfc3339(),
            proxies: snapshot.proxies.iter().map(|p| p.to_string()).collect(),
        };
        let data = serde_json::to_string(&file)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// RFC 3339, or a naive ISO-8601 stamp taken as local time.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|ts| ts.with_timezone(&Utc))
        .ok_or_else(|| StoreError::Timestamp(raw.to_string()))
}
