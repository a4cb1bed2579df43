//! Identifier quoting for the generated SQL.
//!
//! All names reaching these helpers have been checked by [`crate::parser`],
//! so none of them can contain a backtick.

/// Quote a single identifier with backticks.
pub fn ident(name: &str) -> String {
    debug_assert!(!name.contains('`'), "unvalidated identifier: {name}");
    format!("`{}`", name)
}

/// Fully qualified `` `project.dataset.table` `` reference.
pub fn table(project: &str, table: &str) -> String {
    ident(&format!("{}.{}", project, table))
}

/// `` alias.`column` `` reference.
pub fn column(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, ident(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting() {
        assert_eq!(ident("Water Temp"), "`Water Temp`");
        assert_eq!(table("proj", "ds.env"), "`proj.ds.env`");
        assert_eq!(column("t1", "lat"), "t1.`lat`");
    }
}
