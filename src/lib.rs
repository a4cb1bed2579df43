//! # geomerge — nearest-location merge SQL
//!
//! Builds a single BigQuery statement that merges auxiliary tables into a
//! main table: every main row is matched to the geographically nearest
//! location of each auxiliary table, and to that table's rows on the same
//! calendar date.
//!
//! ## Quick Example
//!
//! ```
//! use geomerge::prelude::*;
//!
//! let request = Request::from_json(r#"{
//!     "ds.obs|0": [
//!         {"name": "lat", "newName": "lat", "type": "latitude", "selected": true},
//!         {"name": "lon", "newName": "lon", "type": "longitude", "selected": true},
//!         {"name": "ts", "newName": "ts", "type": "date", "selected": true}
//!     ],
//!     "ds.env|1": [
//!         {"name": "lat", "newName": "env_lat", "type": "latitude", "selected": true},
//!         {"name": "lon", "newName": "env_lon", "type": "longitude", "selected": true},
//!         {"name": "day", "newName": "day", "type": "date", "selected": true},
//!         {"name": "temp", "newName": "temp", "type": "", "selected": true}
//!     ]
//! }"#).unwrap();
//!
//! let sql = geomerge::generate("proj", "raw.merged", &request).unwrap();
//! assert!(sql.starts_with("create or replace table `proj.raw.merged` as ("));
//! ```
//!
//! ## Roles
//!
//! | Role        | Used for                                   |
//! |-------------|--------------------------------------------|
//! | `latitude`  | distinct locations, nearest-location match |
//! | `longitude` | distinct locations, nearest-location match |
//! | `date`      | same-day equality in the auxiliary join    |
//! | `""`        | plain output column                        |

pub mod config;
pub mod error;
pub mod parser;
pub mod plan;
pub mod quote;
pub mod render;
pub mod request;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::*;
    pub use crate::plan::{plan, MergePlan, PlannedTable};
    pub use crate::render::ToSql;
    pub use crate::request::*;
}

/// Output table used when the caller does not name one.
pub const DEFAULT_OUTPUT_TABLE: &str = "raw.results";

/// Generate the merge statement for `request`.
///
/// Validation runs completely before rendering; on error no SQL is produced.
///
/// # Example
///
/// ```
/// use geomerge::{generate, MergeError, Request};
///
/// let err = generate("proj", "raw.merged", &Request::new()).unwrap_err();
/// assert!(matches!(err, MergeError::MissingMainTable));
/// ```
pub fn generate(project_id: &str, output_table: &str, request: &request::Request) -> error::MergeResult<String> {
    use render::ToSql;

    let plan = plan::plan(project_id, output_table, request)?;
    Ok(plan.to_sql())
}

pub use error::{MergeError, MergeResult};
pub use request::Request;
