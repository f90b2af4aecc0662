//! Connections, SQL files, saved queries and session-level settings.

use std::io::Write;

use sql_stencil::prelude::*;
use sql_stencil::test_utils::ScriptedConnection;

fn sql_file(contents: &str) -> Result<tempfile::NamedTempFile, std::io::Error> {
    let mut file = tempfile::Builder::new().suffix(".sql").tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn run_file_executes_every_statement_atomically() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::with_connection(SqliteConnection::open_in_memory()?)?;
    let file = sql_file(
        "-- schema
        CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);
        /* seed data */
        INSERT INTO notes (body) VALUES ('first');
        INSERT INTO notes (body) VALUES ('second # not a comment');",
    )?;

    assert!(session.run_file(file.path())?);
    assert_eq!(session.log().len(), 1);
    assert!(!session.log()[0].rewritten.contains("schema"));

    let bodies = session.query_with(
        "SELECT body FROM notes ORDER BY id",
        &SettingsOverrides::new().set("omitSingleKey", true),
    )?;
    assert_eq!(
        bodies,
        QueryOutput::Scalars(vec![
            RowValues::Text("first".into()),
            RowValues::Text("second # not a comment".into()),
        ])
    );
    Ok(())
}

#[test]
fn failing_file_is_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::with_connection(SqliteConnection::open_in_memory()?)?;
    session.configure(&SettingsOverrides::new().set("throw_errors", false))?;
    let file = sql_file(
        "CREATE TABLE scratch (a INTEGER);
         INSERT INTO absent (a) VALUES (1);",
    )?;

    assert!(!session.run_file(file.path())?);
    assert!(session.log()[0].error.is_some());

    let tables = session.query("SELECT name FROM sqlite_master WHERE name = 'scratch'")?;
    assert_eq!(tables, QueryOutput::Rows(Vec::new()));
    Ok(())
}

#[test]
fn missing_file_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::with_connection(SqliteConnection::open_in_memory()?)?;
    let dir = tempfile::tempdir()?;
    let err = session.run_file(dir.path().join("absent.sql")).unwrap_err();
    assert!(matches!(err, SqlStencilError::NamedResourceNotFound(_)));
    Ok(())
}

#[test]
fn saved_queries_run_by_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::with_connection(SqliteConnection::open_in_memory()?)?;
    session.save_query("answer", "SELECT <%42%> AS answer");
    assert_eq!(session.saved_query("answer"), Some("SELECT <%42%> AS answer"));

    let out = session.run_saved(
        "answer",
        &SettingsOverrides::new().set("omitSingleKey", true),
    )?;
    assert_eq!(out, QueryOutput::Scalar(RowValues::Int(42)));

    let err = session
        .run_saved("question", &SettingsOverrides::new())
        .unwrap_err();
    assert!(matches!(err, SqlStencilError::NamedResourceNotFound(_)));
    Ok(())
}

#[test]
fn queries_need_a_connection() {
    let mut session = Session::new();
    let err = session.query("SELECT <%1%>").unwrap_err();
    assert!(matches!(err, SqlStencilError::NoActiveConnection));
    assert_eq!(session.last_error(), Some("No active database connection"));
    assert!(session.log().is_empty());
}

#[test]
fn disconnect_closes_the_driver_connection() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new();
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;
    assert!(session.is_connected());

    session.disconnect()?;
    assert!(!session.is_connected());
    assert_eq!(script.statements(), vec!["CLOSE"]);
    assert!(matches!(
        session.query("SELECT 1"),
        Err(SqlStencilError::NoActiveConnection)
    ));

    // A second disconnect is a no-op.
    session.disconnect()?;
    Ok(())
}

#[test]
fn reconnecting_replaces_the_previous_connection() -> Result<(), Box<dyn std::error::Error>> {
    let first = ScriptedConnection::new().with_database("first");
    let first_script = first.script_log();
    let mut session = Session::with_connection(first)?;

    session.connect(ScriptedConnection::new().with_database("second"))?;
    assert_eq!(first_script.statements(), vec!["CLOSE"]);

    session.query("SELECT 1")?;
    assert_eq!(session.log().last().map(|e| e.database.as_str()), Some("second"));
    Ok(())
}

#[test]
fn failed_teardown_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new().fail_on("CLOSE", DriverError::new(2013, "lost"));
    let mut session = Session::with_connection(conn)?;
    let err = session.disconnect().unwrap_err();
    assert!(matches!(err, SqlStencilError::ConnectionTeardownFailed(_)));
    assert!(!session.is_connected());
    Ok(())
}

#[test]
fn drivers_without_transactions_are_refused() {
    let conn = ScriptedConnection::new().with_capabilities(Capabilities {
        transactions: false,
        ..Capabilities::all()
    });
    let err = Session::with_connection(conn).unwrap_err();
    assert!(matches!(err, SqlStencilError::MissingCapability(_)));
}

#[test]
fn session_settings_layer_under_call_overrides() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new();
    let mut session = Session::with_connection(conn)?;
    session.configure(&SettingsOverrides::new().set("ROWS-INDEXED", true).set("bogus", 1))?;

    let effective = session.effective_settings(&SettingsOverrides::new().set("charset", "latin1"))?;
    assert!(effective.rows_indexed);
    assert_eq!(effective.charset, "latin1");
    assert_eq!(session.settings().charset, "utf8");

    let err = session
        .configure(&SettingsOverrides::new().set("maxInsertRows", "lots"))
        .unwrap_err();
    assert!(matches!(err, SqlStencilError::ConfigError(_)));
    assert!(session.settings().rows_indexed);

    session.reset_configuration();
    assert!(!session.settings().rows_indexed);
    Ok(())
}

#[test]
fn bound_parameters_reach_the_driver_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new();
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;

    session.query("UPDATE t SET a = <%x%>, b = <%NULL%>, c = <%-3%>, d = <%1e3%>")?;
    assert_eq!(
        script.statements(),
        vec!["UPDATE t SET a = ?, b = NULL, c = ?, d = ?"]
    );
    assert_eq!(
        script.bound(),
        vec![vec![
            TypedParameter::String("x".into()),
            TypedParameter::Integer(-3),
            TypedParameter::String("1e3".into()),
        ]]
    );
    Ok(())
}

#[test]
fn clearing_the_log_restarts_its_indices() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::with_connection(ScriptedConnection::new())?;
    session.query("SELECT <%1%>")?;
    session.query("SELECT <%2%>")?;
    assert_eq!(session.log().len(), 2);

    session.clear_log();
    assert!(session.log().is_empty());
    session.query("SELECT <%3%>")?;
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.log()[0].query, "SELECT <%3%>");
    Ok(())
}
