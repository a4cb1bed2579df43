//! Name grammars using nom.
//!
//! Everything that ends up inside the generated SQL as an identifier is
//! checked here first.
//!
//! # Table keys
//!
//! ```text
//! ds.observations|0
//! ─┬ ─────┬──── ┬
//!  │      │     └── Index (0 = main table)
//!  │      └── Table name
//!  └── Dataset
//! ```

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1, satisfy},
    combinator::{all_consuming, map_res, opt, recognize},
    multi::many0,
    sequence::{pair, separated_pair, tuple},
    IResult,
};

use crate::error::{MergeError, MergeResult};
use crate::request::TableKey;

/// Parse a `dataset.table|index` key.
pub fn parse_table_key(input: &str) -> MergeResult<TableKey> {
    let Some((_, index)) = input.rsplit_once('|') else {
        return Err(MergeError::table_key(input, "missing '|index' suffix"));
    };
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MergeError::table_key(input, "index must be a non-negative integer"));
    }

    match all_consuming(table_key)(input) {
        Ok((_, key)) => Ok(key),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) if e.code == nom::error::ErrorKind::MapRes => {
            Err(MergeError::table_key(input, "index out of range"))
        }
        Err(_) => Err(MergeError::table_key(
            input,
            "table must be 'dataset.table' using letters, digits, '_' or '-'",
        )),
    }
}

/// True if `name` is a plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    all_consuming(identifier)(name).is_ok()
}

/// True if `name` can be rendered inside backticks as an output alias.
pub fn is_output_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c == '`' || c == '\\' || c.is_control())
}

/// Validate an output table name (`dataset.table`, lowercase).
pub fn parse_output_table(input: &str) -> MergeResult<&str> {
    all_consuming(recognize(separated_pair(lower_identifier, char('.'), lower_identifier)))(input)
        .map(|(_, name)| name)
        .map_err(|_| MergeError::InvalidOutputTable(input.to_string()))
}

/// Validate a project id, optionally domain-scoped (`example.com:my-project`).
pub fn parse_project_id(input: &str) -> MergeResult<&str> {
    all_consuming(recognize(pair(opt(pair(domain, char(':'))), project_name)))(input)
        .map(|(_, id)| id)
        .map_err(|_| MergeError::InvalidProjectId(input.to_string()))
}

fn table_key(input: &str) -> IResult<&str, TableKey> {
    let (input, (table, index)) = separated_pair(
        recognize(separated_pair(dataset_name, char('.'), table_name)),
        char('|'),
        map_res(digit1, str::parse::<u32>),
    )(input)?;
    Ok((input, TableKey::new(table, index)))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        many0(satisfy(|c| c.is_ascii_alphanumeric() || c == '_')),
    ))(input)
}

fn lower_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_lowercase() || c == '_'),
        many0(satisfy(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')),
    ))(input)
}

fn dataset_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn table_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

fn project_name(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        satisfy(|c| c.is_ascii_lowercase()),
        many0(satisfy(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')),
    )))(input)
}

fn domain(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')(input)
}
