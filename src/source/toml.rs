//! TOML source parsing.
//!
//! TOML has no tags, so a reference is written as a string:
//! `port = "!REF app.defaults.port"`.

use indexmap::IndexMap;
use toml::{Table, Value as Toml};

use super::{REFERENCE_PREFIX, SourceNode};
use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::value::Value;

/// Parses a TOML document into an unfolded node tree.
pub(super) fn parse(text: &str) -> Result<SourceNode> {
    let table: Table = toml::from_str(text)?;
    table_to_node(table)
}

fn table_to_node(table: Table) -> Result<SourceNode> {
    let mut children = IndexMap::with_capacity(table.len());
    for (key, value) in table {
        children.insert(key, to_node(value)?);
    }
    Ok(SourceNode::Mapping(children))
}

fn to_node(toml: Toml) -> Result<SourceNode> {
    match toml {
        Toml::Table(table) => table_to_node(table),
        Toml::String(s) => match s.strip_prefix(REFERENCE_PREFIX) {
            Some(target) => FieldPath::parse(target).map(SourceNode::Reference),
            None => Ok(SourceNode::Value(Value::String(s))),
        },
        other => to_value(other).map(SourceNode::Value),
    }
}

fn to_value(toml: Toml) -> Result<Value> {
    match toml {
        Toml::String(s) if s.starts_with(REFERENCE_PREFIX) => Err(Error::malformed(format!(
            "'{s}': references are only supported as field values, not inside arrays"
        ))),
        Toml::String(s) => Ok(Value::String(s)),
        Toml::Integer(i) => Ok(Value::Integer(i)),
        Toml::Float(f) => Ok(Value::Float(f)),
        Toml::Boolean(b) => Ok(Value::Bool(b)),
        Toml::Datetime(datetime) => Ok(Value::String(datetime.to_string())),
        Toml::Array(items) => items
            .into_iter()
            .map(to_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Toml::Table(table) => {
            let mut map = IndexMap::with_capacity(table.len());
            for (key, value) in table {
                map.insert(key, to_value(value)?);
            }
            Ok(Value::Mapping(map))
        }
    }
}
