//! Transaction coordination: outermost transactions own BEGIN/COMMIT and the autocommit
//! flag, nested ones only ever use savepoints.

use sql_stencil::prelude::*;
use sql_stencil::test_utils::ScriptedConnection;

fn sqlite_session() -> Result<Session, SqlStencilError> {
    let mut session = Session::with_connection(SqliteConnection::open_in_memory()?)?;
    session.query("CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT, balance INTEGER)")?;
    session.query("INSERT INTO accounts (owner, balance) VALUES (<%ann%>, <%100%>)")?;
    Ok(session)
}

fn balance(session: &mut Session) -> Result<RowValues, SqlStencilError> {
    let out = session.query_with(
        "SELECT balance FROM accounts WHERE owner = <%ann%>",
        &SettingsOverrides::new().set("omitSingleKey", true),
    )?;
    Ok(out.as_scalar().cloned().unwrap_or(RowValues::Null))
}

fn count(session: &mut Session) -> Result<RowValues, SqlStencilError> {
    let out = session.query_with(
        "SELECT COUNT(*) FROM accounts",
        &SettingsOverrides::new().set("omitSingleKey", true),
    )?;
    Ok(out.as_scalar().cloned().unwrap_or(RowValues::Null))
}

#[test]
fn outer_transaction_commits_on_success() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    let out = session.transact(true, |tx| {
        tx.query("UPDATE accounts SET balance = balance - <%30%> WHERE owner = <%ann%>")?;
        tx.query("INSERT INTO accounts (owner, balance) VALUES (<%ben%>, <%30%>)")?;
        Ok("moved")
    })?;
    assert_eq!(out, Some("moved"));
    assert_eq!(balance(&mut session)?, RowValues::Int(70));
    assert_eq!(count(&mut session)?, RowValues::Int(2));
    assert!(!session.in_transaction());
    Ok(())
}

#[test]
fn outer_failure_leaves_no_trace() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    let err = session
        .transact(true, |tx| {
            tx.query("UPDATE accounts SET balance = <%0%>")?;
            tx.query("INSERT INTO missing_table (x) VALUES (<%1%>)")?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, SqlStencilError::StatementPreparationFailed(_)));
    assert_eq!(balance(&mut session)?, RowValues::Int(100));
    Ok(())
}

#[test]
fn swallowed_failure_returns_none() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    let out = session.transact(false, |tx| {
        tx.query("UPDATE accounts SET balance = <%0%>")?;
        Err::<(), _>(SqlStencilError::Other("insufficient funds".into()))
    })?;
    assert_eq!(out, None);
    assert_eq!(session.last_error(), Some("Other database error: insufficient funds"));
    assert_eq!(balance(&mut session)?, RowValues::Int(100));
    Ok(())
}

#[test]
fn nested_failure_rolls_back_to_its_savepoint_only() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    session.transact(true, |tx| {
        tx.query("UPDATE accounts SET balance = <%150%> WHERE owner = <%ann%>")?;
        let inner = tx.transact(false, |inner| {
            inner.query("UPDATE accounts SET balance = <%0%>")?;
            inner.query("INSERT INTO accounts (owner, balance) VALUES (<%cy%>, <%5%>)")?;
            Err::<(), _>(SqlStencilError::Other("abandon inner".into()))
        })?;
        assert!(inner.is_none());
        Ok(())
    })?;
    assert_eq!(balance(&mut session)?, RowValues::Int(150));
    assert_eq!(count(&mut session)?, RowValues::Int(1));
    Ok(())
}

#[test]
fn nested_success_is_committed_with_the_outer_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    session.transact(true, |tx| {
        tx.transact(true, |inner| {
            inner.query("INSERT INTO accounts (owner, balance) VALUES (<%dee%>, <%1%>)")?;
            inner.commit()
        })?;
        Ok(())
    })?;
    assert_eq!(count(&mut session)?, RowValues::Int(2));
    Ok(())
}

#[test]
fn nested_explicit_rollback_undoes_only_the_nested_work() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    session.transact(true, |tx| {
        tx.query("UPDATE accounts SET balance = <%120%> WHERE owner = <%ann%>")?;
        tx.transact(true, |inner| {
            inner.query("INSERT INTO accounts (owner, balance) VALUES (<%eve%>, <%9%>)")?;
            inner.rollback()
        })?;
        Ok(())
    })?;
    assert_eq!(balance(&mut session)?, RowValues::Int(120));
    assert_eq!(count(&mut session)?, RowValues::Int(1));
    assert!(!session.in_transaction());
    Ok(())
}

#[test]
fn rollback_to_named_savepoint_still_commits() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    session.transact(true, |tx| {
        tx.query("UPDATE accounts SET balance = <%80%> WHERE owner = <%ann%>")?;
        tx.savepoint("before_bonus")?;
        tx.query("UPDATE accounts SET balance = <%999%> WHERE owner = <%ann%>")?;
        tx.rollback_to("before_bonus")?;
        Ok(())
    })?;
    assert_eq!(balance(&mut session)?, RowValues::Int(80));
    assert!(!session.in_transaction());

    // The transaction was closed, so the session can start another one.
    session.transact(true, |tx| {
        tx.query("UPDATE accounts SET balance = <%81%> WHERE owner = <%ann%>")?;
        Ok(())
    })?;
    assert_eq!(balance(&mut session)?, RowValues::Int(81));
    Ok(())
}

#[test]
fn named_savepoint_rollback_issues_commit() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = ScriptedConnection::new();
    conn.set_autocommit(false)?;
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;

    session.transact(true, |tx| {
        tx.query("UPDATE t SET v = <%1%>")?;
        tx.savepoint("a")?;
        tx.query("UPDATE t SET v = <%2%>")?;
        tx.rollback_to("a")?;
        Ok(())
    })?;

    assert_eq!(
        script.statements(),
        [
            "SET autocommit = 0",
            "SET autocommit = 0",
            "BEGIN",
            "UPDATE t SET v = ?",
            "SAVEPOINT `a`",
            "UPDATE t SET v = ?",
            "ROLLBACK TO SAVEPOINT `a`",
            "COMMIT",
            "SET autocommit = 0",
        ]
    );
    Ok(())
}

#[test]
fn named_savepoints_work_inside_nested_units() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = sqlite_session()?;
    session.transact(true, |tx| {
        tx.transact(true, |inner| {
            inner.query("INSERT INTO accounts (owner, balance) VALUES (<%fay%>, <%3%>)")?;
            inner.savepoint("inner_mark")?;
            inner.query("INSERT INTO accounts (owner, balance) VALUES (<%gus%>, <%4%>)")?;
            inner.rollback_to("inner_mark")
        })?;
        Ok(())
    })?;
    assert_eq!(count(&mut session)?, RowValues::Int(2));
    let fay = session.query_with(
        "SELECT COUNT(*) FROM accounts WHERE owner = <%fay%>",
        &SettingsOverrides::new().set("omitSingleKey", true),
    )?;
    assert_eq!(fay, QueryOutput::Scalar(RowValues::Int(1)));
    Ok(())
}

#[test]
fn nested_transactions_use_savepoints_only() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new().fail_on("broken", DriverError::new(1146, "no such table"));
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;

    session.transact(true, |tx| {
        assert!(!tx.is_nested());
        tx.query("UPDATE t SET v = <%1%>")?;
        tx.transact(false, |inner| {
            assert!(inner.is_nested());
            inner.query("UPDATE broken SET v = 2")?;
            Ok(())
        })?;
        Ok(())
    })?;

    let statements = script.statements();
    let savepoint = statements
        .iter()
        .find_map(|s| s.strip_prefix("SAVEPOINT "))
        .expect("nested call created a savepoint")
        .to_string();
    assert!(savepoint.starts_with("`sp_") && savepoint.ends_with("_1`"));
    assert_eq!(
        statements,
        vec![
            "SET autocommit = 0".to_string(),
            "BEGIN".to_string(),
            "UPDATE t SET v = ?".to_string(),
            format!("SAVEPOINT {savepoint}"),
            "UPDATE broken SET v = 2".to_string(),
            format!("ROLLBACK TO SAVEPOINT {savepoint}"),
            "COMMIT".to_string(),
            "SET autocommit = 1".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn nested_rollback_reconnects_a_dropped_connection() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new();
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;

    let dropper = script.clone();
    session.transact(false, |tx| {
        tx.transact(false, |_inner| {
            dropper.drop_connection();
            Err::<(), _>(SqlStencilError::Other("lost".into()))
        })?;
        Ok(())
    })?;

    let statements = script.statements();
    let reconnect = statements
        .iter()
        .position(|s| s == "RECONNECT")
        .expect("dropped connection was reopened");
    assert!(statements[reconnect + 1].starts_with("ROLLBACK TO SAVEPOINT"));
    Ok(())
}

#[test]
fn failed_commit_rolls_back_and_reports() -> Result<(), Box<dyn std::error::Error>> {
    let conn = ScriptedConnection::new().fail_on("COMMIT", DriverError::new(1213, "deadlock"));
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;

    let err = session
        .transact(true, |tx| {
            tx.query("UPDATE t SET v = <%1%>")?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(
        err.driver_error().map(|e| e.code),
        Some(1213),
        "commit failure surfaces: {err}"
    );
    assert_eq!(
        script.statements()[3..],
        ["COMMIT", "ROLLBACK", "SET autocommit = 1"]
    );
    Ok(())
}

#[test]
fn autocommit_is_restored_to_its_prior_value() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = ScriptedConnection::new();
    conn.set_autocommit(false)?;
    let script = conn.script_log();
    let mut session = Session::with_connection(conn)?;

    session.transact(true, |_tx| Ok(()))?;
    assert_eq!(script.statements().last().map(String::as_str), Some("SET autocommit = 0"));
    Ok(())
}

#[test]
fn transact_needs_a_connection() {
    let mut session = Session::new();
    let err = session.transact(false, |_tx| Ok(())).unwrap_err();
    assert!(matches!(err, SqlStencilError::NoActiveConnection));
}
