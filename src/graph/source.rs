//! Snapshot sources: where `GraphStore::load` fetches raw statistics from.

use std::future::Future;
use std::path::{Path, PathBuf};

use super::{RawFrequency, RawSnapshot, RawTransition};
use crate::config::Config;
use crate::db::Db;
use crate::error::{FlowkgError, Result};

/// Supplies complete raw snapshots on demand.
///
/// An unreachable or unreadable source must report
/// [`FlowkgError::DataUnavailable`].
pub trait SnapshotSource {
    fn fetch(&self) -> impl Future<Output = Result<RawSnapshot>> + Send;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Reads the tables written by [`crate::db::import_corpus`].
#[derive(Debug, Clone)]
pub struct SqliteSnapshotSource {
    db: Db,
}

impl SqliteSnapshotSource {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self { db: Db::new(db_path) }
    }
}

impl SnapshotSource for SqliteSnapshotSource {
    async fn fetch(&self) -> Result<RawSnapshot> {
        let path = self.db.path().to_path_buf();
        if !path.is_file() {
            return Err(FlowkgError::DataUnavailable(format!(
                "snapshot database not found: {}",
                path.display()
            )));
        }

        self.db
            .with_existing(read_snapshot)
            .await
            .map_err(|e| match e {
                FlowkgError::DataUnavailable(_) => e,
                other => FlowkgError::DataUnavailable(format!("{}: {}", path.display(), other)),
            })
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.db.path().display())
    }
}

fn read_snapshot(conn: &rusqlite::Connection) -> Result<RawSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT source_type, target_type, observed_count FROM transitions \
         ORDER BY source_type, target_type",
    )?;
    let transitions = stmt
        .query_map([], |row| {
            Ok(RawTransition {
                source: row.get(0)?,
                target: row.get(1)?,
                count: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut stmt = conn.prepare(
        "SELECT component_type, occurrence_count FROM component_frequencies \
         ORDER BY component_type",
    )?;
    let frequencies = stmt
        .query_map([], |row| {
            Ok(RawFrequency {
                component_type: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut stmt = conn.prepare(
        "SELECT flow_id, component_type FROM flow_steps ORDER BY flow_id, position",
    )?;
    let mut rows = stmt.query([])?;
    let mut flows: Vec<Vec<String>> = Vec::new();
    let mut current_flow: Option<String> = None;
    while let Some(row) = rows.next()? {
        let flow_id: String = row.get(0)?;
        let component: String = row.get(1)?;
        if current_flow.as_deref() != Some(flow_id.as_str()) {
            flows.push(Vec::new());
            current_flow = Some(flow_id);
        }
        if let Some(flow) = flows.last_mut() {
            flow.push(component);
        }
    }

    Ok(RawSnapshot { transitions, frequencies, flows })
}

/// Reads a [`RawSnapshot`] serialized as JSON.
#[derive(Debug, Clone)]
pub struct JsonSnapshotSource {
    path: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl SnapshotSource for JsonSnapshotSource {
    async fn fetch(&self) -> Result<RawSnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FlowkgError::DataUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let snapshot: RawSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// The snapshot source selected by configuration: `flowkg.snapshot_json`
/// when set, otherwise `flowkg.snapshot_db`.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Sqlite(SqliteSnapshotSource),
    Json(JsonSnapshotSource),
}

impl ConfiguredSource {
    pub fn from_config(config: &Config) -> Self {
        match &config.flowkg.snapshot_json {
            Some(path) => Self::Json(JsonSnapshotSource::new(path)),
            None => Self::Sqlite(SqliteSnapshotSource::new(config.snapshot_db())),
        }
    }
}

impl SnapshotSource for ConfiguredSource {
    async fn fetch(&self) -> Result<RawSnapshot> {
        match self {
            Self::Sqlite(source) => source.fetch().await,
            Self::Json(source) => source.fetch().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Sqlite(source) => source.describe(),
            Self::Json(source) => source.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{import_corpus, ObservedFlow};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sqlite_source_roundtrips_import() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("graph.db");
        import_corpus(
            &Db::new(&db_path),
            vec![
                ObservedFlow { flow_id: "f2".into(), components: vec!["A".into(), "C".into()] },
                ObservedFlow { flow_id: "f1".into(), components: vec!["A".into(), "B".into(), "C".into()] },
            ],
        )
        .await
        .unwrap();

        let raw = SqliteSnapshotSource::new(&db_path).fetch().await.unwrap();
        assert_eq!(raw.transitions.len(), 3);
        assert_eq!(raw.transitions[0], RawTransition { source: "A".into(), target: "B".into(), count: 1 });
        assert_eq!(raw.frequencies.len(), 3);
        assert_eq!(
            raw.flows,
            vec![vec!["A".to_string(), "B".to_string(), "C".to_string()], vec!["A".to_string(), "C".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_sqlite_source_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = SqliteSnapshotSource::new(temp_dir.path().join("missing.db"));
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FlowkgError::DataUnavailable(_)));
        assert!(source.describe().starts_with("sqlite:"));
    }

    #[tokio::test]
    async fn test_sqlite_source_without_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("empty.db");
        Db::new(&db_path).with_connection(|_conn| Ok(())).await.unwrap();

        let err = SqliteSnapshotSource::new(&db_path).fetch().await.unwrap_err();
        assert!(matches!(err, FlowkgError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_json_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(
            &path,
            r#"{"transitions":[{"source":"A","target":"B","count":4}],"flows":[["A","B"]]}"#,
        )
        .unwrap();

        let raw = JsonSnapshotSource::new(&path).fetch().await.unwrap();
        assert_eq!(raw.transitions[0].count, 4);
        assert!(raw.frequencies.is_empty());
        assert_eq!(raw.flows.len(), 1);
    }

    #[tokio::test]
    async fn test_json_source_missing_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let missing = JsonSnapshotSource::new(temp_dir.path().join("nope.json"));
        assert!(matches!(missing.fetch().await, Err(FlowkgError::DataUnavailable(_))));

        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonSnapshotSource::new(&path).fetch().await, Err(FlowkgError::Json(_))));
    }

    fn config(snapshot_json: Option<&str>) -> Config {
        let mut content = String::from("[flowkg]\nsnapshot_db = \"graph.db\"\n");
        if let Some(path) = snapshot_json {
            content.push_str(&format!("snapshot_json = \"{}\"\n", path));
        }
        toml::from_str(&content).unwrap()
    }

    #[test]
    fn test_configured_source_prefers_json() {
        let source = ConfiguredSource::from_config(&config(Some("snapshot.json")));
        assert!(matches!(source, ConfiguredSource::Json(_)));
        assert_eq!(source.describe(), "json:snapshot.json");

        let source = ConfiguredSource::from_config(&config(None));
        assert!(matches!(source, ConfiguredSource::Sqlite(_)));
        assert_eq!(source.describe(), "sqlite:graph.db");
    }

    #[tokio::test]
    async fn test_configured_source_reads_json_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, r#"{"transitions":[{"source":"A","target":"B","count":2}]}"#).unwrap();

        let source = ConfiguredSource::from_config(&config(Some(path.to_str().unwrap())));
        let raw = source.fetch().await.unwrap();
        assert_eq!(raw.transitions.len(), 1);
    }
}
