// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Batch, Connection, Statement};
use tracing::{debug, info, trace};

use super::schema::{SQLITE_INIT, SQLITE_PRAGMAS};
use super::tuple::{render_tuple, render_value};
use crate::AppResult;

/// SQLite reports this for input that holds no statement at all
const EMPTY_STATEMENT_MESSAGE: &str = "incomplete input";
const MULTIPLE_STATEMENTS_MESSAGE: &str = "You can only execute one statement at a time.";

/// Result of one statement. Engine failures are folded in here and never escape the
/// storage layer as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbOutcome {
    /// succeeded, nothing to report
    Success,
    /// query succeeded with at least one row, each already rendered as a tuple
    Rows(Vec<String>),
    /// the engine's diagnostic text, verbatim
    Failed(String),
}

/// The relay's only database handle.
///
/// The connection is owned here and is reachable only through [`execute_command`] and
/// [`execute_query`], both of which hold the lock for the whole statement (and its
/// commit). At most one statement runs at a time in the process.
///
/// [`execute_command`]: SqlDatabase::execute_command
/// [`execute_query`]: SqlDatabase::execute_query
#[derive(Debug)]
pub struct SqlDatabase {
    conn: Mutex<Connection>,
}

impl SqlDatabase {
    /// Opens (creating if absent) the database file, enables foreign keys and applies
    /// the schema.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> AppResult<SqlDatabase> {
        let conn = Connection::open(path.as_ref())?;
        info!("opened database file {}", path.as_ref().display());
        Self::with_connection(conn, busy_timeout)
    }

    pub fn open_in_memory() -> AppResult<SqlDatabase> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, Duration::from_millis(0))
    }

    pub fn with_connection(conn: Connection, busy_timeout: Duration) -> AppResult<SqlDatabase> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SQLITE_PRAGMAS)?;
        conn.execute_batch(SQLITE_INIT)?;
        debug!("database schema initialized");
        Ok(SqlDatabase {
            conn: Mutex::new(conn),
        })
    }

    /// Runs a statement for its effect and commits it before the lock is released.
    ///
    /// Rows the statement may yield are stepped through and dropped. A transaction the
    /// statement leaves open is committed as well, so nothing spans two messages.
    pub fn execute_command(&self, sql: &str) -> DbOutcome {
        let conn = self.conn.lock();
        let stmt = match prepare_single(&conn, sql) {
            Ok(stmt) => stmt,
            Err(outcome) => return outcome,
        };
        match Self::run_command(&conn, stmt) {
            Ok(()) => DbOutcome::Success,
            Err(e) => {
                trace!("command failed: {}", e);
                DbOutcome::Failed(engine_message(&e))
            }
        }
    }

    /// Runs a row-returning statement. No rows is a bare success.
    pub fn execute_query(&self, sql: &str) -> DbOutcome {
        let conn = self.conn.lock();
        let stmt = match prepare_single(&conn, sql) {
            Ok(stmt) => stmt,
            Err(outcome) => return outcome,
        };
        match Self::run_query(stmt) {
            Ok(rows) if rows.is_empty() => DbOutcome::Success,
            Ok(rows) => DbOutcome::Rows(rows),
            Err(e) => {
                trace!("query failed: {}", e);
                DbOutcome::Failed(engine_message(&e))
            }
        }
    }

    fn run_command(conn: &Connection, mut stmt: Statement<'_>) -> rusqlite::Result<()> {
        {
            let mut rows = stmt.query([])?;
            while rows.next()?.is_some() {}
        }
        drop(stmt);
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn run_query(mut stmt: Statement<'_>) -> rusqlite::Result<Vec<String>> {
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut tuples = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|idx| row.get_ref(idx).map(render_value))
                .collect::<rusqlite::Result<Vec<String>>>()?;
            tuples.push(render_tuple(&values));
        }
        Ok(tuples)
    }
}

/// Compiles the single statement held in `sql` without running anything.
///
/// Text with no statement at all (blank, comments, bare `;`) and text with a second
/// statement after the first are refused. Trailing whitespace and comments are fine.
fn prepare_single<'conn>(
    conn: &'conn Connection,
    sql: &str,
) -> Result<Statement<'conn>, DbOutcome> {
    let mut batch = Batch::new(conn, sql);
    let stmt = match batch.next() {
        Ok(Some(stmt)) => stmt,
        Ok(None) => return Err(DbOutcome::Failed(EMPTY_STATEMENT_MESSAGE.to_string())),
        Err(e) => {
            trace!("prepare failed: {}", e);
            return Err(DbOutcome::Failed(engine_message(&e)));
        }
    };
    // a tail that does not even compile is still a second statement
    match batch.next() {
        Ok(None) => Ok(stmt),
        Ok(Some(_)) | Err(_) => Err(DbOutcome::Failed(
            MULTIPLE_STATEMENTS_MESSAGE.to_string(),
        )),
    }
}

/// The engine's own message where it gave one, the rusqlite description otherwise.
fn engine_message(error: &rusqlite::Error) -> String {
    match error {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn db() -> SqlDatabase {
        SqlDatabase::open_in_memory().unwrap()
    }

    fn insert_alice(db: &SqlDatabase) {
        assert_eq!(
            db.execute_command("INSERT INTO users VALUES ('alice','pw','2024-01-01')"),
            DbOutcome::Success
        );
    }

    #[rstest]
    fn test_insert_then_select(db: SqlDatabase) {
        insert_alice(&db);
        assert_eq!(
            db.execute_query("SELECT username FROM users"),
            DbOutcome::Rows(vec!["('alice',)".to_string()])
        );
        assert_eq!(
            db.execute_query("SELECT * FROM users"),
            DbOutcome::Rows(vec!["('alice', 'pw', '2024-01-01')".to_string()])
        );
    }

    #[rstest]
    fn test_empty_result_is_bare_success(db: SqlDatabase) {
        assert_eq!(db.execute_query("SELECT * FROM users"), DbOutcome::Success);
    }

    #[rstest]
    fn test_rows_keep_engine_order(db: SqlDatabase) {
        for name in ["carol", "alice", "bob"] {
            let sql = format!("INSERT INTO users VALUES ('{}','pw','2024-01-01')", name);
            assert_eq!(db.execute_command(&sql), DbOutcome::Success);
        }
        assert_eq!(
            db.execute_query("SELECT username FROM users ORDER BY username"),
            DbOutcome::Rows(vec![
                "('alice',)".to_string(),
                "('bob',)".to_string(),
                "('carol',)".to_string()
            ])
        );
    }

    #[rstest]
    fn test_mixed_column_types(db: SqlDatabase) {
        assert_eq!(
            db.execute_query("SELECT 1, 2.5, NULL, 'x', x'00ff'"),
            DbOutcome::Rows(vec!["(1, 2.5, None, 'x', b'\\x00\\xff')".to_string()])
        );
    }

    #[rstest]
    fn test_syntax_error_is_reported(db: SqlDatabase) {
        match db.execute_command("SELEC * FROM users") {
            DbOutcome::Failed(message) => {
                assert!(message.contains("syntax error"), "{}", message)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[rstest]
    fn test_empty_statement_fails(db: SqlDatabase) {
        assert_eq!(
            db.execute_command(""),
            DbOutcome::Failed(EMPTY_STATEMENT_MESSAGE.to_string())
        );
        assert_eq!(
            db.execute_command("   "),
            DbOutcome::Failed(EMPTY_STATEMENT_MESSAGE.to_string())
        );
    }

    #[rstest]
    #[case("-- nothing")]
    #[case(";")]
    #[case("  /* only a comment */  ")]
    fn test_statement_free_text_fails(db: SqlDatabase, #[case] sql: &str) {
        assert_eq!(
            db.execute_command(sql),
            DbOutcome::Failed(EMPTY_STATEMENT_MESSAGE.to_string())
        );
        assert_eq!(
            db.execute_query(sql),
            DbOutcome::Failed(EMPTY_STATEMENT_MESSAGE.to_string())
        );
    }

    #[rstest]
    fn test_multiple_commands_are_refused(db: SqlDatabase) {
        assert_eq!(
            db.execute_command(
                "INSERT INTO users VALUES ('a','pw','d'); INSERT INTO users VALUES ('b','pw','d')"
            ),
            DbOutcome::Failed(MULTIPLE_STATEMENTS_MESSAGE.to_string())
        );
        // nothing ran, not even the first insert
        assert_eq!(db.execute_query("SELECT username FROM users"), DbOutcome::Success);
    }

    #[rstest]
    fn test_query_followed_by_statement_is_refused(db: SqlDatabase) {
        insert_alice(&db);
        assert_eq!(
            db.execute_query("SELECT 1; DELETE FROM users"),
            DbOutcome::Failed(MULTIPLE_STATEMENTS_MESSAGE.to_string())
        );
        assert_eq!(
            db.execute_query("SELECT username FROM users"),
            DbOutcome::Rows(vec!["('alice',)".to_string()])
        );
    }

    #[rstest]
    fn test_unparsable_tail_is_refused(db: SqlDatabase) {
        assert_eq!(
            db.execute_query("SELECT 1; garbage"),
            DbOutcome::Failed(MULTIPLE_STATEMENTS_MESSAGE.to_string())
        );
    }

    #[rstest]
    #[case("INSERT INTO users VALUES ('alice','pw','2024-01-01'); -- done")]
    #[case("INSERT INTO users VALUES ('alice','pw','2024-01-01');  ")]
    #[case("INSERT INTO users VALUES ('alice','pw','2024-01-01') /* trailing */")]
    fn test_trailing_comment_is_allowed(db: SqlDatabase, #[case] sql: &str) {
        assert_eq!(db.execute_command(sql), DbOutcome::Success);
        assert_eq!(
            db.execute_query("SELECT username FROM users; -- who"),
            DbOutcome::Rows(vec!["('alice',)".to_string()])
        );
    }

    #[rstest]
    fn test_failed_command_has_no_effect(db: SqlDatabase) {
        insert_alice(&db);
        match db.execute_command("INSERT INTO users VALUES ('alice','other','2024-02-02')") {
            DbOutcome::Failed(message) => {
                assert!(message.contains("UNIQUE constraint failed"), "{}", message)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            db.execute_query("SELECT password FROM users"),
            DbOutcome::Rows(vec!["('pw',)".to_string()])
        );
    }

    #[rstest]
    fn test_foreign_keys_enforced(db: SqlDatabase) {
        match db.execute_command(
            "INSERT INTO login_history VALUES ('ghost','2024-01-01 10:00',NULL)",
        ) {
            DbOutcome::Failed(message) => {
                assert!(message.contains("FOREIGN KEY constraint failed"), "{}", message)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[rstest]
    fn test_delete_user_cascades(db: SqlDatabase) {
        insert_alice(&db);
        assert_eq!(
            db.execute_command(
                "INSERT INTO login_history VALUES ('alice','2024-01-01 10:00',NULL)"
            ),
            DbOutcome::Success
        );
        assert_eq!(
            db.execute_command(
                "INSERT INTO file_tracking (username, filename, upload_time, game_channel) \
                 VALUES ('alice','events.json','2024-01-01 10:05','germany_spain')"
            ),
            DbOutcome::Success
        );
        assert_eq!(
            db.execute_query("SELECT id, filename FROM file_tracking"),
            DbOutcome::Rows(vec!["(1, 'events.json')".to_string()])
        );

        assert_eq!(
            db.execute_command("DELETE FROM users WHERE username = 'alice'"),
            DbOutcome::Success
        );
        assert_eq!(db.execute_query("SELECT * FROM login_history"), DbOutcome::Success);
        assert_eq!(db.execute_query("SELECT * FROM file_tracking"), DbOutcome::Success);
    }

    #[rstest]
    fn test_open_transaction_is_committed(db: SqlDatabase) {
        assert_eq!(db.execute_command("BEGIN"), DbOutcome::Success);
        insert_alice(&db);
        assert!(db.conn.lock().is_autocommit());
    }

    #[rstest]
    fn test_row_returning_command_succeeds(db: SqlDatabase) {
        assert_eq!(db.execute_command("PRAGMA foreign_keys"), DbOutcome::Success);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relay.db");
        {
            let db = SqlDatabase::open(&path, Duration::from_secs(1)).unwrap();
            insert_alice(&db);
        }
        let db = SqlDatabase::open(&path, Duration::from_secs(1)).unwrap();
        assert_eq!(
            db.execute_query("SELECT username FROM users"),
            DbOutcome::Rows(vec!["('alice',)".to_string()])
        );
    }

    #[test]
    fn test_concurrent_commands_are_serialized() {
        let db = Arc::new(SqlDatabase::open_in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    for i in 0..25 {
                        let sql = format!(
                            "INSERT INTO users VALUES ('user_{}_{}','pw','2024-01-01')",
                            worker, i
                        );
                        assert_eq!(db.execute_command(&sql), DbOutcome::Success);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(
            db.execute_query("SELECT COUNT(*) FROM users"),
            DbOutcome::Rows(vec!["(200,)".to_string()])
        );
    }
}
