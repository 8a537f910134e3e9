use rusqlite::{Connection, params};
use crate::error::{Result, FlowkgError};

/// Migration metadata
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Snapshot schema, applied in version order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "001_graph_snapshot",
        sql: r#"
            CREATE TABLE IF NOT EXISTS transitions (
                source_type TEXT NOT NULL,
                target_type TEXT NOT NULL,
                observed_count INTEGER NOT NULL CHECK (observed_count >= 0),
                PRIMARY KEY (source_type, target_type)
            );

            CREATE TABLE IF NOT EXISTS component_frequencies (
                component_type TEXT PRIMARY KEY,
                occurrence_count INTEGER NOT NULL CHECK (occurrence_count >= 0)
            );

            CREATE TABLE IF NOT EXISTS flow_steps (
                flow_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                component_type TEXT NOT NULL,
                PRIMARY KEY (flow_id, position)
            );
        "#,
    },
    Migration {
        version: 2,
        name: "002_snapshot_indexes",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_transitions_source ON transitions (source_type);
            CREATE INDEX IF NOT EXISTS idx_flow_steps_type ON flow_steps (component_type);
        "#,
    },
];

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
        .map_err(FlowkgError::Database)?;
    Ok(names)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if applied.iter().any(|name| name == migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    Ok(())
}
