//! `memory`: persistent key/value notes in SQLite.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Value, json};

use super::{Tool, ToolContext, ToolResult, str_arg};

/// Open the memory database, creating it and its table if needed.
pub fn open_db(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key TEXT UNIQUE NOT NULL,
            value TEXT NOT NULL,
            metadata TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memories_key ON memories(key);",
    )
    .context("Failed to initialize memory schema")?;

    Ok(conn)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Insert or replace `key`, keeping its original creation time.
pub fn store(conn: &Connection, key: &str, value: &Value, metadata: Option<&Value>) -> anyhow::Result<()> {
    let now = now();
    let value_json = serde_json::to_string(value)?;
    let metadata_json = metadata.map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO memories (key, value, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             metadata = excluded.metadata,
             updated_at = excluded.updated_at",
        params![key, value_json, metadata_json, now],
    )
    .context("Failed to store memory")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub key: String,
    pub value: Value,
    pub metadata: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn retrieve(conn: &Connection, key: &str) -> anyhow::Result<Option<MemoryRecord>> {
    let row = conn
        .query_row(
            "SELECT value, metadata, created_at, updated_at FROM memories WHERE key = ?1",
            params![key],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .context("Failed to query memory")?;

    let Some((value, metadata, created_at, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(MemoryRecord {
        key: key.to_string(),
        value: serde_json::from_str(&value)?,
        metadata: metadata.map(|m| serde_json::from_str(&m)).transpose()?,
        created_at,
        updated_at,
    }))
}

/// Returns whether a row was removed.
pub fn delete(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let removed = conn
        .execute("DELETE FROM memories WHERE key = ?1", params![key])
        .context("Failed to delete memory")?;
    Ok(removed > 0)
}

/// `(key, created_at, updated_at)`, most recently updated first.
pub fn list(conn: &Connection) -> anyhow::Result<Vec<(String, String, String)>> {
    let mut stmt = conn
        .prepare("SELECT key, created_at, updated_at FROM memories ORDER BY updated_at DESC, id DESC")
        .context("Failed to prepare query")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .context("Failed to list memories")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub struct MemoryTool;

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Persistent memory across sessions. Operations: store (key, value, optional metadata), \
         retrieve (key), delete (key), list."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["store", "retrieve", "delete", "list"], "description": "What to do"},
                "key": {"type": "string", "description": "Memory key"},
                "value": {"description": "Value to store (any JSON)"},
                "metadata": {"type": "object", "description": "Optional metadata to store with the value"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let db_path = ctx.memory_db.clone();
        tokio::task::spawn_blocking(move || run_operation(&db_path, &args))
            .await
            .unwrap_or_else(|e| ToolResult::err(format!("Memory task failed: {e}")))
    }
}

fn run_operation(db_path: &Path, args: &Value) -> ToolResult {
    let Some(operation) = str_arg(args, "operation") else {
        return ToolResult::missing("operation");
    };
    if !matches!(operation, "store" | "retrieve" | "delete" | "list") {
        return ToolResult::err(format!("Unknown operation: {operation}"));
    }

    let conn = match open_db(db_path) {
        Ok(c) => c,
        Err(e) => return ToolResult::err(format!("{e:#}")),
    };

    let key = str_arg(args, "key");
    let outcome = match (operation, key) {
        ("list", _) => list_memories(&conn),
        (_, None) => return ToolResult::missing("key"),
        ("store", Some(key)) => {
            let value = args.get("value").cloned().unwrap_or(Value::Null);
            let metadata = args.get("metadata").filter(|m| !m.is_null());
            store(&conn, key, &value, metadata).map(|()| {
                tracing::info!("Stored memory: {}", key);
                ToolResult::ok(format!("Stored memory with key: {key}"))
                    .with_meta("key", key)
                    .with_meta("operation", "store")
            })
        }
        ("retrieve", Some(key)) => retrieve(&conn, key).map(|record| match record {
            Some(record) => ToolResult::ok(
                serde_json::to_string_pretty(&record.value).unwrap_or_default(),
            )
            .with_meta("key", key)
            .with_meta("value", record.value)
            .with_meta("custom_metadata", record.metadata)
            .with_meta("created_at", record.created_at)
            .with_meta("updated_at", record.updated_at),
            None => ToolResult::err(format!("Memory not found: {key}")),
        }),
        (_, Some(key)) => delete(&conn, key).map(|removed| {
            if removed {
                tracing::info!("Deleted memory: {}", key);
                ToolResult::ok(format!("Deleted memory: {key}"))
                    .with_meta("key", key)
                    .with_meta("operation", "delete")
            } else {
                ToolResult::err(format!("Memory not found: {key}"))
            }
        }),
    };

    outcome.unwrap_or_else(|e| {
        tracing::error!("Memory operation failed: {:#}", e);
        ToolResult::err(format!("Memory operation failed: {e:#}"))
    })
}

fn list_memories(conn: &Connection) -> anyhow::Result<ToolResult> {
    let rows = list(conn)?;
    let output = rows
        .iter()
        .map(|(key, _, _)| format!("- {key}"))
        .collect::<Vec<_>>()
        .join("\n");
    let memories: Vec<Value> = rows
        .iter()
        .map(|(key, created, updated)| json!({"key": key, "created_at": created, "updated_at": updated}))
        .collect();

    Ok(ToolResult::ok(if output.is_empty() {
        "No memories stored".to_string()
    } else {
        output
    })
    .with_meta("count", rows.len())
    .with_meta("memories", memories))
}
