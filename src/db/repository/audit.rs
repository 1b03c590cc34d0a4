use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(
    conn: &Connection,
    entries: &[(String, Option<String>, String, String)], // (timestamp, identity_id, action, entity)
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, identity_id, action, entity) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (timestamp, identity_id, action, entity) in entries {
        stmt.execute(params![timestamp, identity_id, action, entity])?;
    }
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}

/// Audit entries for one identity within the last N days, newest first.
/// Returns (timestamp, action, entity) tuples.
pub fn query_audit_by_identity(
    conn: &Connection,
    identity_id: &str,
    days: i64,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, entity FROM audit_log
         WHERE identity_id = ?1 AND timestamp >= datetime('now', ?2)
         ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![identity_id, format!("-{days} days")], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn audit_entries_round_trip_and_prune() {
        let conn = open_memory_database().unwrap();
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        insert_audit_entries(
            &conn,
            &[
                ("2000-01-01 00:00:00".into(), Some("id-1".into()), "GET /api/billing".into(), "status:200".into()),
                (now, Some("id-1".into()), "POST /api/appointments".into(), "status:201".into()),
            ],
        )
        .unwrap();

        let recent = query_audit_by_identity(&conn, "id-1", 7).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].1, "POST /api/appointments");

        let pruned = prune_audit_log(&conn, 90).unwrap();
        assert_eq!(pruned, 1);
    }
}
