use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::AssignmentInput;

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load_day(&self, store_id: &str, date: NaiveDate) -> Result<AssignmentInput>;
}

/// Reads `<root>/<store_id>/<YYYY-MM-DD>.json`.
pub struct FileSnapshotSource {
    root: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn day_path(&self, store_id: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(store_id)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn load_day(&self, store_id: &str, date: NaiveDate) -> Result<AssignmentInput> {
        let path = self.day_path(store_id, date);
        let mut input = read_snapshot(&path).await?;
        input.date = date;
        Ok(input)
    }
}

pub async fn read_snapshot(path: &Path) -> Result<AssignmentInput> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed reading snapshot: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed parsing snapshot: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_day_from_store_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FileSnapshotSource::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
        let path = source.day_path("store-7", date);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(
            &path,
            r#"{
                "date": "2026-10-19",
                "gaps": [{"hour": 9, "minute": 0, "required": 2, "current": 1, "shortage": 1}],
                "availableStaff": [
                    {"id": "s1", "name": "Aoi", "employmentType": "part-time", "availableFrom": "08:00", "availableTo": "17:00"}
                ],
                "existingShifts": [{"staffName": "Ren", "from": "09:00", "to": "15:00"}]
            }"#,
        )
        .expect("write");

        let input = source.load_day("store-7", date).await.expect("load");
        assert_eq!(input.gaps.len(), 1);
        assert_eq!(input.available_staff[0].name, "Aoi");
        assert_eq!(input.existing_shifts[0].staff_name, "Ren");
        assert_eq!(input.resolved_day_label(), "Monday");
    }

    #[tokio::test]
    async fn missing_day_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FileSnapshotSource::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
        assert!(source.load_day("nowhere", date).await.is_err());
    }
}
