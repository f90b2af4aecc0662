use std::sync::LazyLock;

use regex::Regex;

static INSERT_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(insert|replace)\b").expect("insert pattern is valid")
});

/// Whether `sql` inserts rows (and therefore generates row ids).
pub(crate) fn is_insert_statement(sql: &str) -> bool {
    INSERT_STATEMENT.is_match(sql)
}

pub(crate) fn extract_column_names<I, T, F>(columns: I, name: F) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> &str,
{
    columns
        .into_iter()
        .map(|col| name(&col).to_string())
        .collect()
}
