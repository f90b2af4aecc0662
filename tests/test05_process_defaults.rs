//! Process-wide defaults are global state, so everything touching them lives in this one
//! test binary and runs as a single test.

use sql_stencil::prelude::*;
use sql_stencil::test_utils::{ScriptedConnection, result_set};

#[test]
fn process_defaults_feed_unconfigured_sessions() -> Result<(), Box<dyn std::error::Error>> {
    let rows = result_set(&["n"], vec![vec![RowValues::Int(7)]]);
    let mut plain = Session::with_connection(ScriptedConnection::new().returning("SELECT", rows.clone()))?;
    let mut pinned = Session::with_connection(ScriptedConnection::new().returning("SELECT", rows))?;
    pinned.configure(&SettingsOverrides::new().set("charset", "latin1"))?;

    let updated = configure_defaults(&SettingsOverrides::new().set("omitSingleKey", true))?;
    assert!(updated.omit_single_key);
    assert!(defaults().omit_single_key);

    // Unconfigured sessions read the defaults on every call.
    assert_eq!(plain.query("SELECT n")?, QueryOutput::Scalar(RowValues::Int(7)));
    // Configured sessions keep the snapshot they were configured from.
    assert!(pinned.query("SELECT n")?.as_row().is_some());

    // Per-call overrides still win.
    let out = plain.query_with(
        "SELECT n",
        &SettingsOverrides::new().set("omit_single_key", false),
    )?;
    assert!(out.as_row().is_some());

    let err = configure_defaults(&SettingsOverrides::new().set("delimiters", serde_json::json!(["%", "%"])))
        .unwrap_err();
    assert!(matches!(err, SqlStencilError::ConfigError(_)));
    assert!(defaults().omit_single_key);

    reset_defaults();
    assert_eq!(defaults(), QuerySettings::default());
    assert!(plain.query("SELECT n")?.as_row().is_some());
    Ok(())
}
