pub mod douban;
pub mod titles;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// What the binary can crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    DoubanTop250,
    PageTitles,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::DoubanTop250, Target::PageTitles];
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::DoubanTop250 => write!(f, "Douban movie Top 250"),
            Target::PageTitles => write!(f, "Page titles from config.toml [titles].urls"),
        }
    }
}

/// Byte order mark so spreadsheet tools read the CSV as UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes crawl results as pretty JSON.
pub async fn save_json<T: Serialize>(path: impl AsRef<Path>, items: &[T]) -> Result<()> {
    let path = path.as_ref();
    let data = serde_json::to_vec_pretty(items)?;
    write_out(path, data, items.len()).await
}

/// Writes crawl results as CSV with a header row, prefixed by a UTF-8 BOM.
pub async fn save_csv<T: Serialize>(path: impl AsRef<Path>, items: &[T]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    for item in items {
        writer.serialize(item)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("cannot flush csv: {}", e.error()))?;
    write_out(path, data, items.len()).await
}

/// JSON when the file name ends in `.json`, CSV otherwise.
pub async fn save_records<T: Serialize>(path: impl AsRef<Path>, items: &[T]) -> Result<()> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        save_json(path, items).await
    } else {
        save_csv(path, items).await
    }
}

async fn write_out(path: &Path, data: Vec<u8>, count: usize) -> Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;
    log::info!("saved {} records to {}", count, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_json_writes_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        save_json(&path, &["a", "b"]).await.unwrap();
        let back: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec!["a", "b"]);
    }

    #[derive(Serialize)]
    struct Row {
        rank: String,
        title: String,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                rank: "1".into(),
                title: "肖申克的救赎".into(),
            },
            Row {
                rank: "2".into(),
                title: "Farewell, My Concubine".into(),
            },
        ]
    }

    #[tokio::test]
    async fn save_csv_writes_bom_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_csv(&path, &rows()).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(
            text,
            "rank,title\n1,肖申克的救赎\n2,\"Farewell, My Concubine\"\n"
        );
    }

    #[tokio::test]
    async fn save_records_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("out.json");
        let csv = dir.path().join("out.csv");
        save_records(&json, &rows()).await.unwrap();
        save_records(&csv, &rows()).await.unwrap();

        assert!(std::fs::read_to_string(&json).unwrap().trim_start().starts_with('['));
        assert!(std::fs::read(&csv).unwrap().starts_with(UTF8_BOM));
    }
}
