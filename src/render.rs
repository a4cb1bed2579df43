//! SQL rendering for validated merge plans.
//!
//! Produces one BigQuery statement:
//!
//! ```text
//! create or replace table `project.output` as (
//!     with
//!     t0_locations as (...),       -- one per table
//!     t0_t1_min_dist as (...),     -- one per auxiliary table
//!     select ...
//!     from `project.main` t0
//!     left join t0_t1_min_dist t0t1 on (...)
//!     left join `project.aux` t1 on (...)
//! );
//! ```

use tracing::debug;

use crate::plan::{MergePlan, PlannedTable};
use crate::quote;

/// Trait for converting plans to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self) -> String;
}

impl ToSql for MergePlan<'_> {
    fn to_sql(&self) -> String {
        let mut ctes: Vec<String> = self.tables().map(|t| self.unique_locations(t)).collect();
        ctes.extend(self.auxiliaries.iter().map(|b| self.min_distance(b)));
        debug!(ctes = ctes.len(), "rendered common table expressions");

        let joins: Vec<String> = self.auxiliaries.iter().map(|b| self.left_joins(b)).collect();

        let mut body = vec![
            "    with".to_string(),
            ctes.join(",\n"),
            self.select_list(),
            format!(
                "    from {} {}",
                quote::table(self.project, &self.main.key.table),
                self.main.alias()
            ),
        ];
        body.extend(joins);

        [
            format!(
                "create or replace table {} as (",
                quote::table(self.project, self.output_table)
            ),
            body.join("\n"),
            ");".to_string(),
        ]
        .join("\n")
    }
}

impl MergePlan<'_> {
    /// Distinct (lat, lon) pairs of one table.
    fn unique_locations(&self, table: &PlannedTable<'_>) -> String {
        let t = table.alias();
        format!(
            "    {t}_locations as (
      select distinct
        {lat} as {t}_lat,
        {lon} as {t}_lon
      from {source}
    )",
            lat = quote::ident(table.latitude),
            lon = quote::ident(table.longitude),
            source = quote::table(self.project, &table.key.table),
        )
    }

    /// Nearest auxiliary location for every distinct main location.
    ///
    /// Equidistant candidates are not ordered further; the engine picks one.
    fn min_distance(&self, aux: &PlannedTable<'_>) -> String {
        let a = self.main.alias();
        let b = aux.alias();
        format!(
            "    {a}_{b}_min_dist as (
      select
        a.{a}_lat,
        a.{a}_lon,
        array_agg(
          struct(b.{b}_lat, b.{b}_lon)
          order by st_distance(
            st_geogpoint(a.{a}_lon, a.{a}_lat),
            st_geogpoint(b.{b}_lon, b.{b}_lat))
          limit 1
        )[offset(0)].*
      from {a}_locations a
      cross join {b}_locations b
      group by 1, 2
    )"
        )
    }

    fn select_list(&self) -> String {
        let columns: Vec<String> = self
            .tables()
            .flat_map(|table| {
                let alias = table.alias();
                table
                    .selected
                    .iter()
                    .map(move |c| {
                        format!(
                            "      {} as {}",
                            quote::column(&alias, &c.name),
                            quote::ident(&c.new_name)
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        format!("    select\n{}", columns.join(",\n"))
    }

    /// Bind each main row to its nearest auxiliary location, then to the
    /// auxiliary rows at that location on the same calendar date.
    fn left_joins(&self, aux: &PlannedTable<'_>) -> String {
        let a = self.main.alias();
        let b = aux.alias();
        let ab = format!("{a}{b}");
        format!(
            "    left join {a}_{b}_min_dist {ab} on (
      {main_lat} = {ab}.{a}_lat
      and {main_lon} = {ab}.{a}_lon
    )
    left join {source} {b} on (
      date({main_date}) = date({aux_date})
      and {ab}.{b}_lat = {aux_lat}
      and {ab}.{b}_lon = {aux_lon}
    )",
            main_lat = quote::column(&a, self.main.latitude),
            main_lon = quote::column(&a, self.main.longitude),
            main_date = quote::column(&a, self.main.date),
            source = quote::table(self.project, &aux.key.table),
            aux_date = quote::column(&b, aux.date),
            aux_lat = quote::column(&b, aux.latitude),
            aux_lon = quote::column(&b, aux.longitude),
        )
    }
}
