// Append-only search query log and usage analytics

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const SECONDS_PER_DAY: i64 = 86_400;

/// A query log entry about to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueryLogEntry {
    /// Query text as submitted
    pub query_text: String,

    /// "semantic" | "keyword" | "hybrid" | "autocomplete"
    pub mode: String,

    /// Number of results returned to the caller
    pub results_found: i64,

    /// End-to-end processing time in milliseconds
    pub response_time_ms: f64,

    /// Optional user correlation key
    pub user_id: Option<String>,

    /// Optional project correlation key
    pub project_id: Option<String>,
}

/// Daily invocation count for the analytics surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    /// Day in YYYY-MM-DD form
    pub day: String,

    /// Searches logged on that day
    pub count: i64,
}

/// Aggregated popular query for the analytics surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularQuery {
    /// Query text
    pub query_text: String,

    /// Times the query was logged inside the window
    pub count: i64,
}

/// Append one log entry. Entries are written exactly once and never mutated.
pub fn log_query(conn: &Connection, entry: &NewQueryLogEntry) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO search_query_log
            (query_text, mode, results_found, response_time_ms, user_id, project_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.query_text,
            entry.mode,
            entry.results_found,
            entry.response_time_ms,
            entry.user_id,
            entry.project_id,
            Utc::now().timestamp(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Distinct successful queries for a user or project inside the lookback
/// window, newest first, optionally restricted to a text prefix/substring.
///
/// Only queries that actually found results qualify as history suggestions.
pub fn history_queries(
    conn: &Connection,
    user_id: Option<&str>,
    project_id: Option<&str>,
    partial: &str,
    window_days: i64,
    limit: usize,
) -> Result<Vec<String>, StoreError> {
    if user_id.is_none() && project_id.is_none() {
        return Ok(Vec::new());
    }

    let cutoff = Utc::now().timestamp() - window_days * SECONDS_PER_DAY;
    let pattern = format!(
        "%{}%",
        crate::content::escape_like(&partial.trim().to_lowercase())
    );

    // Prefer the user scope when both identifiers are supplied.
    let (scope_column, scope_value) = match (user_id, project_id) {
        (Some(user), _) => ("user_id", user),
        (None, Some(project)) => ("project_id", project),
        (None, None) => unreachable!(),
    };

    let sql = format!(
        "SELECT query_text, MAX(created_at) as last_seen
         FROM search_query_log
         WHERE {scope_column} = ?1
           AND created_at >= ?2
           AND results_found > 0
           AND LOWER(query_text) LIKE ?3 ESCAPE '\\'
         GROUP BY LOWER(query_text)
         ORDER BY last_seen DESC
         LIMIT ?4"
    );

    let mut stmt = conn.prepare(&sql)?;
    let queries = stmt
        .query_map(params![scope_value, cutoff, pattern, limit as i64], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(queries)
}

/// Query texts by recent frequency. Texts seen fewer than `min_count`
/// times inside the window are not trending.
pub fn trending_queries(
    conn: &Connection,
    window_days: i64,
    min_count: i64,
    limit: usize,
) -> Result<Vec<PopularQuery>, StoreError> {
    let cutoff = Utc::now().timestamp() - window_days * SECONDS_PER_DAY;

    let mut stmt = conn.prepare(
        "SELECT LOWER(query_text) as q, COUNT(*) as count
         FROM search_query_log
         WHERE created_at >= ?1
         GROUP BY q
         HAVING count >= ?2
         ORDER BY count DESC, MAX(created_at) DESC
         LIMIT ?3",
    )?;

    let queries = stmt
        .query_map(params![cutoff, min_count, limit as i64], |row| {
            Ok(PopularQuery {
                query_text: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(queries)
}

/// Daily invocation counts for the last `days` days.
pub fn daily_counts(
    conn: &Connection,
    project_id: Option<&str>,
    days: i64,
) -> Result<Vec<DailyCount>, StoreError> {
    let cutoff = Utc::now().timestamp() - days * SECONDS_PER_DAY;

    let rows = match project_id {
        Some(project) => {
            let mut stmt = conn.prepare(
                "SELECT date(created_at, 'unixepoch') as day, COUNT(*) as count
                 FROM search_query_log
                 WHERE created_at >= ?1 AND project_id = ?2
                 GROUP BY day ORDER BY day DESC",
            )?;
            let rows = stmt.query_map(params![cutoff, project], |row| {
                Ok(DailyCount {
                    day: row.get(0)?,
                    count: row.get(1)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT date(created_at, 'unixepoch') as day, COUNT(*) as count
                 FROM search_query_log
                 WHERE created_at >= ?1
                 GROUP BY day ORDER BY day DESC",
            )?;
            let rows = stmt.query_map(params![cutoff], |row| {
                Ok(DailyCount {
                    day: row.get(0)?,
                    count: row.get(1)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };

    Ok(rows)
}

/// Most frequent queries inside the window, for the analytics endpoint.
pub fn popular_queries(
    conn: &Connection,
    project_id: Option<&str>,
    days: i64,
    limit: usize,
) -> Result<Vec<PopularQuery>, StoreError> {
    let cutoff = Utc::now().timestamp() - days * SECONDS_PER_DAY;

    let rows = match project_id {
        Some(project) => {
            let mut stmt = conn.prepare(
                "SELECT LOWER(query_text) as q, COUNT(*) as count
                 FROM search_query_log
                 WHERE created_at >= ?1 AND project_id = ?2
                 GROUP BY q ORDER BY count DESC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![cutoff, project, limit as i64], |row| {
                Ok(PopularQuery {
                    query_text: row.get(0)?,
                    count: row.get(1)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT LOWER(query_text) as q, COUNT(*) as count
                 FROM search_query_log
                 WHERE created_at >= ?1
                 GROUP BY q ORDER BY count DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![cutoff, limit as i64], |row| {
                Ok(PopularQuery {
                    query_text: row.get(0)?,
                    count: row.get(1)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };

    Ok(rows)
}

/// Total searches logged inside the window.
pub fn total_searches(
    conn: &Connection,
    project_id: Option<&str>,
    days: i64,
) -> Result<i64, StoreError> {
    let cutoff = Utc::now().timestamp() - days * SECONDS_PER_DAY;

    let count = match project_id {
        Some(project) => conn.query_row(
            "SELECT COUNT(*) FROM search_query_log WHERE created_at >= ?1 AND project_id = ?2",
            params![cutoff, project],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM search_query_log WHERE created_at >= ?1",
            params![cutoff],
            |row| row.get(0),
        )?,
    };

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Storage;
    use tempfile::NamedTempFile;

    fn entry(query: &str, results: i64, user: Option<&str>, project: Option<&str>) -> NewQueryLogEntry {
        NewQueryLogEntry {
            query_text: query.to_string(),
            mode: "hybrid".to_string(),
            results_found: results,
            response_time_ms: 12.5,
            user_id: user.map(String::from),
            project_id: project.map(String::from),
        }
    }

    #[test]
    fn test_log_query_returns_rowid() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        let first = log_query(storage.conn(), &entry("database", 3, None, None)).unwrap();
        let second = log_query(storage.conn(), &entry("caching", 1, None, None)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_history_requires_scope_and_results() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        log_query(storage.conn(), &entry("database migration", 4, Some("u1"), None)).unwrap();
        log_query(storage.conn(), &entry("dead end query", 0, Some("u1"), None)).unwrap();
        log_query(storage.conn(), &entry("other user query", 2, Some("u2"), None)).unwrap();

        // No scope identifier at all: empty
        let none = history_queries(storage.conn(), None, None, "d", 30, 10).unwrap();
        assert!(none.is_empty());

        let history = history_queries(storage.conn(), Some("u1"), None, "d", 30, 10).unwrap();
        assert_eq!(history, vec!["database migration".to_string()]);
    }

    #[test]
    fn test_history_treats_like_wildcards_literally() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        log_query(storage.conn(), &entry("100% rollout", 2, Some("u1"), None)).unwrap();
        log_query(storage.conn(), &entry("database migration", 2, Some("u1"), None)).unwrap();

        let history = history_queries(storage.conn(), Some("u1"), None, "%", 30, 10).unwrap();
        assert_eq!(history, vec!["100% rollout".to_string()]);
    }

    #[test]
    fn test_trending_requires_min_frequency() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        for _ in 0..3 {
            log_query(storage.conn(), &entry("database", 2, None, None)).unwrap();
        }
        log_query(storage.conn(), &entry("one-off", 2, None, None)).unwrap();

        let trending = trending_queries(storage.conn(), 7, 2, 10).unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].query_text, "database");
        assert_eq!(trending[0].count, 3);
    }

    #[test]
    fn test_daily_counts_and_totals() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        log_query(storage.conn(), &entry("a", 1, None, Some("p1"))).unwrap();
        log_query(storage.conn(), &entry("b", 1, None, Some("p1"))).unwrap();
        log_query(storage.conn(), &entry("c", 1, None, Some("p2"))).unwrap();

        let counts = daily_counts(storage.conn(), Some("p1"), 7).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 2);

        assert_eq!(total_searches(storage.conn(), Some("p1"), 7).unwrap(), 2);
        assert_eq!(total_searches(storage.conn(), None, 7).unwrap(), 3);
    }

    #[test]
    fn test_popular_queries_case_folded() {
        let temp_file = NamedTempFile::new().unwrap();
        let storage = Storage::open(temp_file.path()).unwrap();

        log_query(storage.conn(), &entry("Database", 1, None, None)).unwrap();
        log_query(storage.conn(), &entry("database", 1, None, None)).unwrap();

        let popular = popular_queries(storage.conn(), None, 7, 5).unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].count, 2);
    }
}
