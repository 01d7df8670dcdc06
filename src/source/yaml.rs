//! YAML source parsing.

use indexmap::IndexMap;
use serde_yaml::Value as Yaml;

use super::SourceNode;
use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::value::Value;

/// Tag marking an attribute reference.
const REFERENCE_TAG: &str = "!REF";

/// Parses a YAML document into an unfolded node tree.
pub(super) fn parse(text: &str) -> Result<SourceNode> {
    if text.trim().is_empty() {
        return Ok(SourceNode::Value(Value::Null));
    }

    let mut document: Yaml = serde_yaml::from_str(text)?;
    // Expand `<<` merge keys before anything reads the mappings.
    document.apply_merge()?;
    to_node(document)
}

fn to_node(yaml: Yaml) -> Result<SourceNode> {
    match yaml {
        Yaml::Mapping(mapping) => {
            let mut children = IndexMap::with_capacity(mapping.len());
            for (key, value) in mapping {
                children.insert(key_to_string(key)?, to_node(value)?);
            }
            Ok(SourceNode::Mapping(children))
        }
        Yaml::Tagged(tagged) if tagged.tag == REFERENCE_TAG => match tagged.value {
            Yaml::String(target) => FieldPath::parse(&target).map(SourceNode::Reference),
            other => Err(Error::malformed(format!(
                "{REFERENCE_TAG} expects a string target, found {}",
                kind(&other)
            ))),
        },
        other => to_value(other).map(SourceNode::Value),
    }
}

fn to_value(yaml: Yaml) -> Result<Value> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Bool(b) => Ok(Value::Bool(b)),
        Yaml::Number(number) => number_to_value(&number),
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Sequence(items) => items
            .into_iter()
            .map(to_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Yaml::Mapping(mapping) => {
            let mut map = IndexMap::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(key_to_string(key)?, to_value(value)?);
            }
            Ok(Value::Mapping(map))
        }
        Yaml::Tagged(tagged) if tagged.tag == REFERENCE_TAG => Err(Error::malformed(format!(
            "{REFERENCE_TAG} is only supported as a field value, not inside a sequence"
        ))),
        Yaml::Tagged(tagged) => Err(Error::malformed(format!(
            "unsupported tag {}",
            tagged.tag
        ))),
    }
}

/// Mapping keys must be scalars; non-string scalars use their YAML spelling.
fn number_to_value(number: &serde_yaml::Number) -> Result<Value> {
    if let Some(i) = number.as_i64() {
        return Ok(Value::Integer(i));
    }
    if number.is_u64() {
        return Err(Error::malformed(format!(
            "integer {number} does not fit in a signed 64-bit value"
        )));
    }
    Ok(Value::Float(number.as_f64().unwrap_or(f64::NAN)))
}

fn key_to_string(key: Yaml) -> Result<String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        other => Err(Error::malformed(format!(
            "mapping keys must be scalars, found {}",
            kind(&other)
        ))),
    }
}

const fn kind(yaml: &Yaml) -> &'static str {
    match yaml {
        Yaml::Null => "null",
        Yaml::Bool(_) => "bool",
        Yaml::Number(_) => "number",
        Yaml::String(_) => "string",
        Yaml::Sequence(_) => "sequence",
        Yaml::Mapping(_) => "mapping",
        Yaml::Tagged(_) => "tagged value",
    }
}
