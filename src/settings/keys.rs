/// Recognized setting names in canonical compact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Charset,
    MaxInsertRows,
    NoRowsAsArray,
    OmitSingleKey,
    RowsIndexed,
    Delimiters,
    RawFragment,
    ThrowErrors,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::Charset,
        SettingKey::MaxInsertRows,
        SettingKey::NoRowsAsArray,
        SettingKey::OmitSingleKey,
        SettingKey::RowsIndexed,
        SettingKey::Delimiters,
        SettingKey::RawFragment,
        SettingKey::ThrowErrors,
    ];

    #[must_use]
    pub fn canonical(self) -> &'static str {
        match self {
            SettingKey::Charset => "charset",
            SettingKey::MaxInsertRows => "maxinsertrows",
            SettingKey::NoRowsAsArray => "norowsasarray",
            SettingKey::OmitSingleKey => "omitsinglekey",
            SettingKey::RowsIndexed => "rowsindexed",
            SettingKey::Delimiters => "delimiters",
            SettingKey::RawFragment => "rawfragment",
            SettingKey::ThrowErrors => "throwerrors",
        }
    }

    /// Resolve any spelling (`rowsIndexed`, `rows_indexed`, `ROWS-INDEXED`) to a key.
    #[must_use]
    pub fn parse(name: &str) -> Option<SettingKey> {
        let canonical = canonicalize(name);
        Self::ALL
            .into_iter()
            .find(|key| key.canonical() == canonical)
    }
}

/// Case-fold and drop `_`, `-` and whitespace separators.
#[must_use]
pub fn canonicalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
