//! Request validation.
//!
//! Turns a caller-supplied [`Request`] into a [`MergePlan`]: the main table
//! first, auxiliaries in request order, each with its role columns resolved.
//! Only a plan is ever rendered, so every name in the SQL has passed
//! through here.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{MergeError, MergeResult};
use crate::parser;
use crate::request::{ColumnDescriptor, ColumnRole, Request, TableColumns, TableKey};

/// A table with its role columns resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTable<'a> {
    pub key: TableKey,
    pub latitude: &'a str,
    pub longitude: &'a str,
    pub date: &'a str,
    /// Selected columns in declaration order.
    pub selected: Vec<&'a ColumnDescriptor>,
}

impl PlannedTable<'_> {
    pub fn alias(&self) -> String {
        self.key.alias()
    }

    /// Source column bound to a join role.
    pub fn column_for(&self, role: ColumnRole) -> Option<&str> {
        match role {
            ColumnRole::Latitude => Some(self.latitude),
            ColumnRole::Longitude => Some(self.longitude),
            ColumnRole::Date => Some(self.date),
            ColumnRole::Plain => None,
        }
    }
}

/// A validated merge, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan<'a> {
    pub project: &'a str,
    pub output_table: &'a str,
    pub main: PlannedTable<'a>,
    pub auxiliaries: Vec<PlannedTable<'a>>,
}

impl<'a> MergePlan<'a> {
    /// Main table first, then auxiliaries.
    pub fn tables(&self) -> impl Iterator<Item = &PlannedTable<'a>> {
        std::iter::once(&self.main).chain(self.auxiliaries.iter())
    }

    /// Output column names in emission order.
    pub fn output_columns(&self) -> Vec<&'a str> {
        self.tables()
            .flat_map(|t| t.selected.iter().copied().map(|c| c.new_name.as_str()))
            .collect()
    }
}

/// Validate `request` against a generation target.
pub fn plan<'a>(project: &'a str, output_table: &'a str, request: &'a Request) -> MergeResult<MergePlan<'a>> {
    let project = parser::parse_project_id(project)?;
    let output_table = parser::parse_output_table(output_table)?;

    let mut seen_indices = HashSet::new();
    let mut main = None;
    let mut auxiliaries = Vec::new();

    for entry in &request.tables {
        let key = TableKey::parse(&entry.key)?;
        if !seen_indices.insert(key.index) {
            return Err(MergeError::DuplicateTableIndex(key.index));
        }
        if key.is_main() {
            main = Some((key, entry));
        } else {
            auxiliaries.push((key, entry));
        }
    }

    let (main_key, main_entry) = main.ok_or(MergeError::MissingMainTable)?;
    let main = plan_table(main_key, main_entry)?;
    let auxiliaries = auxiliaries
        .into_iter()
        .map(|(key, entry)| plan_table(key, entry))
        .collect::<MergeResult<Vec<_>>>()?;

    let plan = MergePlan {
        project,
        output_table,
        main,
        auxiliaries,
    };
    check_output_names(&plan)?;

    debug!(
        main = %plan.main.key,
        auxiliaries = plan.auxiliaries.len(),
        columns = plan.output_columns().len(),
        "validated merge request"
    );
    Ok(plan)
}

// Errors name the table by the key as the caller wrote it.
fn plan_table<'a>(key: TableKey, entry: &'a TableColumns) -> MergeResult<PlannedTable<'a>> {
    let table = entry.key.clone();
    let selected: Vec<&'a ColumnDescriptor> = entry.columns.iter().filter(|c| c.selected).collect();

    for column in &selected {
        if !parser::is_identifier(&column.name) {
            return Err(MergeError::InvalidIdentifier {
                table,
                name: column.name.clone(),
            });
        }
        if !parser::is_output_name(&column.new_name) {
            return Err(MergeError::InvalidOutputName {
                table,
                new_name: column.new_name.clone(),
            });
        }
    }

    let mut roles: HashMap<ColumnRole, &'a str> = HashMap::new();
    for role in ColumnRole::REQUIRED {
        let mut matching = selected.iter().copied().filter(|c| c.role == role);
        let column = matching.next().ok_or_else(|| MergeError::missing(&table, role))?;
        if matching.next().is_some() {
            return Err(MergeError::ambiguous(&table, role));
        }
        roles.insert(role, column.name.as_str());
    }

    Ok(PlannedTable {
        latitude: roles[&ColumnRole::Latitude],
        longitude: roles[&ColumnRole::Longitude],
        date: roles[&ColumnRole::Date],
        key,
        selected,
    })
}

fn check_output_names(plan: &MergePlan<'_>) -> MergeResult<()> {
    let mut seen = HashSet::new();
    for name in plan.output_columns() {
        if !seen.insert(name.to_lowercase()) {
            return Err(MergeError::DuplicateOutputName(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ColumnDescriptor as Col;

    fn located(prefix: &str) -> Vec<Col> {
        vec![
            Col::new("lat", format!("{prefix}_lat"), ColumnRole::Latitude),
            Col::new("lon", format!("{prefix}_lon"), ColumnRole::Longitude),
            Col::new("day", format!("{prefix}_day"), ColumnRole::Date),
        ]
    }

    #[test]
    fn test_main_table_is_planned_first() {
        let request = Request::new()
            .table("ds.env|2", located("env"))
            .table("ds.obs|0", located("obs"))
            .table("ds.tide|1", located("tide"));
        let plan = plan("proj", "raw.out", &request).unwrap();
        assert_eq!(plan.main.key.table, "ds.obs");
        let order: Vec<u32> = plan.auxiliaries.iter().map(|t| t.key.index).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(plan.output_columns()[0], "obs_lat");
    }

    #[test]
    fn test_missing_main_table() {
        let request = Request::new().table("ds.env|1", located("env"));
        assert!(matches!(plan("proj", "raw.out", &request), Err(MergeError::MissingMainTable)));
        assert!(matches!(plan("proj", "raw.out", &Request::new()), Err(MergeError::MissingMainTable)));
    }

    #[test]
    fn test_main_table_needs_roles_too() {
        let mut main = located("obs");
        main.remove(2);
        let request = Request::new().table("ds.obs|0", main).table("ds.env|1", located("env"));
        let err = plan("proj", "raw.out", &request).unwrap_err();
        assert!(matches!(
            err,
            MergeError::MissingRoleColumn { ref table, role: ColumnRole::Date } if table == "ds.obs|0"
        ));
    }

    #[test]
    fn test_errors_use_the_key_as_written() {
        let mut env = located("env");
        env.remove(0);
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|01", env);
        let err = plan("proj", "raw.out", &request).unwrap_err();
        assert_eq!(err.to_string(), "No selected latitude column found for table ds.env|01");
    }

    #[test]
    fn test_deselected_role_column_is_missing() {
        let mut env = located("env");
        env[0] = env[0].clone().deselected();
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|1", env);
        let err = plan("proj", "raw.out", &request).unwrap_err();
        assert!(matches!(err, MergeError::MissingRoleColumn { role: ColumnRole::Latitude, .. }));
    }

    #[test]
    fn test_ambiguous_role() {
        let mut env = located("env");
        env.push(Col::new("latitude", "env_latitude", ColumnRole::Latitude));
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|1", env);
        let err = plan("proj", "raw.out", &request).unwrap_err();
        assert!(matches!(
            err,
            MergeError::AmbiguousRole { ref table, role: ColumnRole::Latitude } if table == "ds.env|1"
        ));
    }

    #[test]
    fn test_deselected_duplicate_role_is_ignored() {
        let mut env = located("env");
        env.push(Col::new("latitude", "env_latitude", ColumnRole::Latitude).deselected());
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|1", env);
        assert!(plan("proj", "raw.out", &request).is_ok());
    }

    #[test]
    fn test_duplicate_table_index() {
        let request = Request::new()
            .table("ds.obs|0", located("obs"))
            .table("ds.env|1", located("env"))
            .table("ds.tide|1", located("tide"));
        assert!(matches!(
            plan("proj", "raw.out", &request),
            Err(MergeError::DuplicateTableIndex(1))
        ));
    }

    #[test]
    fn test_duplicate_output_name_is_case_insensitive() {
        let mut env = located("env");
        env.push(Col::new("n", "Count", ColumnRole::Plain));
        let mut obs = located("obs");
        obs.push(Col::new("cnt", "count", ColumnRole::Plain));
        let request = Request::new().table("ds.obs|0", obs).table("ds.env|1", env);
        let err = plan("proj", "raw.out", &request).unwrap_err();
        assert!(matches!(err, MergeError::DuplicateOutputName(ref name) if name == "Count"));
    }

    #[test]
    fn test_unselected_duplicate_output_name_is_ignored() {
        let mut env = located("env");
        env.push(Col::new("n", "obs_lat", ColumnRole::Plain).deselected());
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|1", env);
        assert!(plan("proj", "raw.out", &request).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        let mut env = located("env");
        env.push(Col::new("temp; drop table x", "temp", ColumnRole::Plain));
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|1", env);
        assert!(matches!(
            plan("proj", "raw.out", &request),
            Err(MergeError::InvalidIdentifier { .. })
        ));

        let mut env = located("env");
        env.push(Col::new("temp", "te`mp", ColumnRole::Plain));
        let request = Request::new().table("ds.obs|0", located("obs")).table("ds.env|1", env);
        assert!(matches!(
            plan("proj", "raw.out", &request),
            Err(MergeError::InvalidOutputName { .. })
        ));
    }

    #[test]
    fn test_invalid_target() {
        let request = Request::new().table("ds.obs|0", located("obs"));
        assert!(matches!(plan("proj", "merged", &request), Err(MergeError::InvalidOutputTable(_))));
        assert!(matches!(plan("", "raw.out", &request), Err(MergeError::InvalidProjectId(_))));
    }
}
