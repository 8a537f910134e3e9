use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::db::{migrate, Db};
use crate::error::{Result, FlowkgError};

/// One flow from the training corpus: its component types in execution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservedFlow {
    pub flow_id: String,
    pub components: Vec<String>,
}

/// Counts written by [`import_corpus`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub flows: usize,
    pub steps: usize,
    pub transitions: usize,
    pub component_types: usize,
}

/// Replace the snapshot tables with statistics derived from `flows`.
///
/// Transition counts come from consecutive component pairs, frequencies from
/// every occurrence of a type. Everything is rewritten in a single transaction
/// so a concurrent reader sees either the old snapshot or the new one.
pub async fn import_corpus(db: &Db, flows: Vec<ObservedFlow>) -> Result<ImportSummary> {
    let mut transitions: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut frequencies: BTreeMap<String, u64> = BTreeMap::new();
    let mut steps = 0usize;
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for flow in &flows {
        if flow.flow_id.trim().is_empty() {
            return Err(FlowkgError::InvalidInput("flow_id must not be empty".to_string()));
        }
        if !seen_ids.insert(flow.flow_id.as_str()) {
            return Err(FlowkgError::InvalidInput(format!("duplicate flow_id: {}", flow.flow_id)));
        }
        if flow.components.iter().any(|c| c.trim().is_empty()) {
            return Err(FlowkgError::InvalidInput(format!(
                "flow {} contains an empty component type",
                flow.flow_id
            )));
        }

        steps += flow.components.len();
        for component in &flow.components {
            *frequencies.entry(component.clone()).or_insert(0) += 1;
        }
        for pair in flow.components.windows(2) {
            *transitions
                .entry((pair[0].clone(), pair[1].clone()))
                .or_insert(0) += 1;
        }
    }

    let summary = ImportSummary {
        flows: flows.len(),
        steps,
        transitions: transitions.len(),
        component_types: frequencies.len(),
    };

    db.with_connection(move |conn| {
        migrate::run_migrations(conn)?;

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM transitions", [])?;
        tx.execute("DELETE FROM component_frequencies", [])?;
        tx.execute("DELETE FROM flow_steps", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO transitions (source_type, target_type, observed_count) VALUES (?1, ?2, ?3)",
            )?;
            for ((source, target), count) in &transitions {
                stmt.execute(params![source, target, *count as i64])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO component_frequencies (component_type, occurrence_count) VALUES (?1, ?2)",
            )?;
            for (component, count) in &frequencies {
                stmt.execute(params![component, *count as i64])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO flow_steps (flow_id, position, component_type) VALUES (?1, ?2, ?3)",
            )?;
            for flow in &flows {
                for (position, component) in flow.components.iter().enumerate() {
                    stmt.execute(params![flow.flow_id, position as i64, component])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    })
    .await?;

    log::info!(
        "Imported {} flows ({} steps, {} transitions, {} component types)",
        summary.flows,
        summary.steps,
        summary.transitions,
        summary.component_types
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn flow(id: &str, components: &[&str]) -> ObservedFlow {
        ObservedFlow {
            flow_id: id.to_string(),
            components: components.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_import_counts() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("graph.db"));

        let summary = import_corpus(
            &db,
            vec![
                flow("f1", &["Start", "Gate", "End"]),
                flow("f2", &["Start", "Gate", "End"]),
                flow("f3", &["Start", "Call", "End"]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(summary.flows, 3);
        assert_eq!(summary.steps, 9);
        assert_eq!(summary.transitions, 4);
        assert_eq!(summary.component_types, 4);

        let (gate_count, start_freq) = db
            .with_connection(|conn| {
                let gate: i64 = conn.query_row(
                    "SELECT observed_count FROM transitions WHERE source_type = 'Start' AND target_type = 'Gate'",
                    [],
                    |row| row.get(0),
                )?;
                let start: i64 = conn.query_row(
                    "SELECT occurrence_count FROM component_frequencies WHERE component_type = 'Start'",
                    [],
                    |row| row.get(0),
                )?;
                Ok((gate, start))
            })
            .await
            .unwrap();
        assert_eq!(gate_count, 2);
        assert_eq!(start_freq, 3);
    }

    #[tokio::test]
    async fn test_import_replaces_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("graph.db"));

        import_corpus(&db, vec![flow("old", &["A", "B"])]).await.unwrap();
        import_corpus(&db, vec![flow("new", &["C", "D"])]).await.unwrap();

        let sources: Vec<String> = db
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT source_type FROM transitions")?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .unwrap();
        assert_eq!(sources, vec!["C".to_string()]);
    }

    #[tokio::test]
    async fn test_import_rejects_blank_component() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("graph.db"));

        let result = import_corpus(&db, vec![flow("f1", &["A", " "])]).await;
        assert!(matches!(result, Err(FlowkgError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_import_rejects_duplicate_flow_id() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("graph.db"));
        import_corpus(&db, vec![flow("kept", &["S", "T"])]).await.unwrap();

        let result = import_corpus(
            &db,
            vec![flow("f1", &["A", "B", "C"]), flow("f1", &["X", "Y"])],
        )
        .await;
        assert!(matches!(result, Err(FlowkgError::InvalidInput(ref m)) if m.contains("f1")));

        // Nothing was written; the previous snapshot is intact
        let steps: Vec<String> = db
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT component_type FROM flow_steps ORDER BY flow_id, position")?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .unwrap();
        assert_eq!(steps, vec!["S".to_string(), "T".to_string()]);
    }
}
