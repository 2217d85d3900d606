/// Session Module
///
/// `DatabaseSession` coordinates one connection, one pending command, and
/// one transaction at a time. Connections are scoped to a single logical
/// operation: each execute-style call opens its own connection and drops it
/// on the way out, success or failure, so no resource survives an
/// operation. Transactions likewise never outlive the call that began
/// them — an uncommitted transaction rolls back when dropped.
///
/// Sessions are not internally synchronized; a session instance assumes
/// exclusive, non-concurrent use.
use super::command::{Command, CommandKind, ParamDirection};
use super::mapping::{MapRow, ToParams};
use super::rowset::{format_value, RowSet};
use crate::config::{ConnMode, ConnectionProfile};
use crate::core::{Result, SessionError};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Statement};
use tracing::{debug, error};

pub struct DatabaseSession {
    profile: ConnectionProfile,
    command: Option<Command>,
}

impl DatabaseSession {
    /// Opens a session for a deployment mode using its built-in profile.
    ///
    /// No connection is made here; connections are opened per operation.
    pub fn open(mode: ConnMode) -> Self {
        DatabaseSession::with_profile(ConnectionProfile::for_mode(mode))
    }

    pub fn with_profile(profile: ConnectionProfile) -> Self {
        DatabaseSession {
            profile,
            command: None,
        }
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// True when no command is pending. Holds after every execute-style
    /// call, whether it succeeded or failed.
    pub fn is_idle(&self) -> bool {
        self.command.is_none()
    }

    /// Discards any pending command. Idempotent.
    pub fn close(&mut self) {
        self.command = None;
    }

    /// Assigns kind and text on the pending command, creating it if needed.
    /// Parameters already added are preserved. Fails on empty text before
    /// any driver call.
    pub fn set_command(&mut self, kind: CommandKind, text: &str) -> Result<()> {
        self.command
            .get_or_insert_with(Command::empty)
            .configure(kind, text)
    }

    /// Adds an input parameter named `@name` to the pending command.
    /// A `None` value is stored as the database null marker.
    pub fn add_param(&mut self, name: &str, value: Option<Value>) {
        self.add_param_with_direction(name, value, ParamDirection::Input);
    }

    pub fn add_param_with_direction(
        &mut self,
        name: &str,
        value: Option<Value>,
        direction: ParamDirection,
    ) {
        self.command
            .get_or_insert_with(Command::empty)
            .push_param(name, value, direction);
    }

    /// Adds one input parameter per (name, value) pair the object exposes.
    pub fn add_params<T: ToParams>(&mut self, obj: &T) {
        for (name, value) in obj.to_params() {
            self.add_param(&name, Some(value));
        }
    }

    /// Executes a query and loads the full result into a `RowSet`.
    pub fn run_query(&mut self, sql: &str) -> Result<RowSet> {
        let command = self.take_command(CommandKind::Text, sql)?;
        let conn = self.connect()?;
        Self::execute_reader(&conn, &command)
    }

    /// Executes a query and maps each row onto a `T` through its mapping
    /// table. Per-field coercion failures leave the field at its default;
    /// query failures surface as errors.
    pub fn run_query_as<T: MapRow>(&mut self, sql: &str) -> Result<Vec<T>> {
        let table = self.run_query(sql)?;
        Ok(T::mapping().map_rows(&table))
    }

    /// Executes a procedure-style object (a saved view on SQLite) and
    /// loads the full result into a `RowSet`.
    pub fn run_procedure(&mut self, name: &str) -> Result<RowSet> {
        let command = self.take_command(CommandKind::Procedure, name)?;
        let conn = self.connect()?;
        Self::execute_reader(&conn, &command)
    }

    /// Executes non-query SQL inside a transaction and returns the
    /// affected-row count. On failure the transaction is rolled back and a
    /// classified `Transaction` error is returned; no transaction is ever
    /// left open.
    pub fn run_transaction(&mut self, sql: &str) -> Result<usize> {
        let command = self.take_command(CommandKind::Text, sql)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        match Self::execute_non_query(&tx, &command) {
            Ok(affected) => {
                tx.commit()
                    .map_err(|e| SessionError::Transaction(format!("commit failed: {}", e)))?;
                debug!(affected, "transaction committed");
                Ok(affected)
            }
            Err(e) => {
                error!("transaction statement failed, rolling back: {}", e);
                drop(tx); // uncommitted transactions roll back on drop
                Err(SessionError::Transaction(format!(
                    "statement failed and was rolled back: {}",
                    e
                )))
            }
        }
    }

    /// Executes scalar SQL inside a transaction and returns the first
    /// column of the first row (`Value::Null` when no row is produced).
    /// On failure the transaction rolls back and the error propagates.
    pub fn run_scalar(&mut self, sql: &str) -> Result<Value> {
        let command = self.take_command(CommandKind::Text, sql)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let value = Self::execute_scalar(&tx, &command)?;
        tx.commit()?;
        debug!(value = %format_value(&value), "scalar committed");
        Ok(value)
    }

    /// Takes the pending command for an operation, configuring it with the
    /// given kind and text. The session holds no command afterwards, on
    /// the error path included.
    fn take_command(&mut self, kind: CommandKind, text: &str) -> Result<Command> {
        let mut command = self.command.take().unwrap_or_else(Command::empty);
        command.configure(kind, text)?;
        Ok(command)
    }

    /// Opens a connection for the current profile. Fails with a `Config`
    /// error before any driver call when the mode is not provisioned.
    fn connect(&self) -> Result<Connection> {
        if !self.profile.is_configured() {
            return Err(SessionError::Config(format!(
                "no data source provisioned for catalog '{}'",
                self.profile.catalog
            )));
        }

        let flags = if self.profile.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };

        let path = self.profile.database_path();
        let conn = Connection::open_with_flags(&path, flags)?;

        conn.pragma_update(None, "foreign_keys", self.profile.foreign_keys)?;
        if self.profile.wal {
            // journal_mode reports the resulting mode as a row
            let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        }

        debug!(path = %path.display(), "connection opened");
        Ok(conn)
    }

    fn execute_reader(conn: &Connection, command: &Command) -> Result<RowSet> {
        let sql = command.render();
        let mut stmt = conn.prepare(&sql)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();

        Self::bind_params(&mut stmt, command)?;

        let mut loaded = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, Value>(i)?);
            }
            loaded.push(values);
        }

        debug!(rows = loaded.len(), "query returned");
        Ok(RowSet::new(columns, loaded))
    }

    fn execute_non_query(conn: &Connection, command: &Command) -> Result<usize> {
        let mut stmt = conn.prepare(&command.render())?;
        Self::bind_params(&mut stmt, command)?;
        Ok(stmt.raw_execute()?)
    }

    fn execute_scalar(conn: &Connection, command: &Command) -> Result<Value> {
        let mut stmt = conn.prepare(&command.render())?;
        Self::bind_params(&mut stmt, command)?;

        let mut rows = stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(row.get::<_, Value>(0)?),
            None => Ok(Value::Null),
        }
    }

    /// Binds the command's parameters by name. Parameters the statement
    /// does not reference, and non-input parameters, are skipped.
    fn bind_params(stmt: &mut Statement<'_>, command: &Command) -> Result<()> {
        for param in &command.params {
            if param.direction != ParamDirection::Input {
                debug!(name = %param.name, "non-input parameter has no SQLite analog; skipping");
                continue;
            }

            match stmt.parameter_index(&param.name)? {
                Some(index) => stmt.raw_bind_parameter(index, &param.value)?,
                None => {
                    debug!(name = %param.name, "statement does not reference parameter; skipping")
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::mapping::{coerce, RowMapping};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_profile(dir: &TempDir) -> ConnectionProfile {
        ConnectionProfile {
            data_source: dir.path().to_str().unwrap().to_string(),
            catalog: format!("test_{}", Uuid::new_v4().simple()),
            read_only: false,
            foreign_keys: true,
            wal: false,
        }
    }

    fn session_with_table(dir: &TempDir) -> DatabaseSession {
        let mut session = DatabaseSession::with_profile(test_profile(dir));
        session
            .run_transaction("CREATE TABLE t (id INTEGER, name TEXT)")
            .unwrap();
        session.run_transaction("INSERT INTO t VALUES (1, 'a')").unwrap();
        session
    }

    #[test]
    fn test_query_returns_rows() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        let table = session.run_query("SELECT * FROM t").unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.get(0, "id"), Some(&Value::Integer(1)));
        assert_eq!(table.get(0, "name"), Some(&Value::Text("a".to_string())));
        assert!(session.is_idle());
    }

    #[test]
    fn test_empty_sql_fails_before_touching_connection() {
        // Production mode has no data source; any driver touch would
        // surface as a Config error instead.
        let mut session = DatabaseSession::open(ConnMode::Production);

        assert!(matches!(
            session.run_query("").unwrap_err(),
            SessionError::Command(_)
        ));
        assert!(matches!(
            session.run_procedure("").unwrap_err(),
            SessionError::Command(_)
        ));
        assert!(matches!(
            session.run_transaction("").unwrap_err(),
            SessionError::Command(_)
        ));
        assert!(matches!(
            session.run_scalar("").unwrap_err(),
            SessionError::Command(_)
        ));
        assert!(session.is_idle());
    }

    #[test]
    fn test_unprovisioned_mode_fails_with_config_error() {
        let mut session = DatabaseSession::open(ConnMode::Deploy);
        assert!(matches!(
            session.run_query("SELECT 1").unwrap_err(),
            SessionError::Config(_)
        ));
        assert!(session.is_idle());
    }

    #[test]
    fn test_parameter_binding() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        session.add_param("id", Some(Value::Integer(2)));
        session.add_param("name", Some(Value::Text("b".to_string())));
        let affected = session
            .run_transaction("INSERT INTO t VALUES (@id, @name)")
            .unwrap();
        assert_eq!(affected, 1);

        session.add_param("id", Some(Value::Integer(2)));
        let table = session.run_query("SELECT name FROM t WHERE id = @id").unwrap();
        assert_eq!(table.get(0, "name"), Some(&Value::Text("b".to_string())));
    }

    #[test]
    fn test_null_parameter_writes_sql_null() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        session.add_param("id", Some(Value::Integer(3)));
        session.add_param("name", None);
        session
            .run_transaction("INSERT INTO t VALUES (@id, @name)")
            .unwrap();

        let value = session.run_scalar("SELECT name FROM t WHERE id = 3").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_unreferenced_parameter_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        session.add_param("unused", Some(Value::Integer(9)));
        let table = session.run_query("SELECT * FROM t").unwrap();
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_output_parameter_is_never_bound() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        session.add_param_with_direction("id", Some(Value::Integer(1)), ParamDirection::Output);
        // @id stays unbound, so it compares as NULL and matches nothing
        let table = session.run_query("SELECT * FROM t WHERE id = @id").unwrap();
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_failing_transaction_rolls_back_and_classifies() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        let err = session
            .run_transaction("INSERT INTO missing VALUES (1)")
            .unwrap_err();
        assert!(matches!(err, SessionError::Transaction(_)));
        assert!(session.is_idle());

        // no transaction left open: the next operation proceeds normally
        let affected = session.run_transaction("INSERT INTO t VALUES (2, 'b')").unwrap();
        assert_eq!(affected, 1);
    }

    #[test]
    fn test_failing_scalar_propagates_and_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        let err = session.run_scalar("SELECT x FROM missing").unwrap_err();
        assert!(matches!(err, SessionError::Database(_)));
        assert!(session.is_idle());

        let count = session.run_scalar("SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(count, Value::Integer(1));
    }

    #[test]
    fn test_scalar_with_no_rows_is_null() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        let value = session.run_scalar("SELECT id FROM t WHERE id = 99").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_procedure_runs_saved_view() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);
        session
            .run_transaction("CREATE VIEW current_rows AS SELECT * FROM t")
            .unwrap();

        let table = session.run_procedure("current_rows").unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.get(0, "id"), Some(&Value::Integer(1)));
    }

    #[derive(Debug, Default, PartialEq)]
    struct Row {
        id: i64,
        name: String,
    }

    impl MapRow for Row {
        fn mapping() -> RowMapping<Self> {
            RowMapping::new()
                .column("id", |r: &mut Row, v| coerce::assign_i64(&mut r.id, v))
                .column("name", |r, v| coerce::assign_text(&mut r.name, v))
        }
    }

    impl ToParams for Row {
        fn to_params(&self) -> Vec<(String, Value)> {
            vec![
                ("id".to_string(), Value::Integer(self.id)),
                ("name".to_string(), Value::Text(self.name.clone())),
            ]
        }
    }

    #[test]
    fn test_mapped_query() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        let rows: Vec<Row> = session.run_query_as("SELECT * FROM t").unwrap();
        assert_eq!(
            rows,
            vec![Row {
                id: 1,
                name: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_add_params_from_object() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        let row = Row {
            id: 5,
            name: "e".to_string(),
        };
        session.add_params(&row);
        session
            .run_transaction("INSERT INTO t VALUES (@id, @name)")
            .unwrap();

        let rows: Vec<Row> = session
            .run_query_as("SELECT * FROM t WHERE id = 5")
            .unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_set_command_then_run_overrides_text() {
        let dir = TempDir::new().unwrap();
        let mut session = session_with_table(&dir);

        session
            .set_command(CommandKind::Text, "SELECT 'stale'")
            .unwrap();
        session.add_param("id", Some(Value::Integer(1)));
        let table = session.run_query("SELECT name FROM t WHERE id = @id").unwrap();
        assert_eq!(table.get(0, "name"), Some(&Value::Text("a".to_string())));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = DatabaseSession::open(ConnMode::Dev);
        session.add_param("x", None);
        assert!(!session.is_idle());

        session.close();
        assert!(session.is_idle());
        session.close();
        assert!(session.is_idle());
    }
}
