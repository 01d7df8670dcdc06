//! Tests for YAML source parsing.

use super::{Format, SourceNode, SourceTree};
use crate::error::Error;
use crate::path::FieldPath;
use crate::value::Value;

fn parse(yaml: &str) -> SourceTree {
    Format::Yaml.parse(yaml).unwrap()
}

/// Returns the node at a dotted key of a parsed tree.
fn node<'a>(tree: &'a SourceTree, key: &str) -> Option<&'a SourceNode> {
    let mut segments = key.split('.');
    let first = segments.next()?;
    let mut current = tree.iter().find(|(k, _)| k.as_str() == first)?.1;

    for segment in segments {
        let SourceNode::Mapping(children) = current else {
            return None;
        };
        current = children.get(segment)?;
    }

    Some(current)
}

mod scalars {
    use super::*;

    #[test]
    fn parses_every_scalar_kind() {
        let tree = parse("a:\n  int: 3\n  float: 1.5\n  flag: true\n  text: hello\n  nothing: ~\n");

        assert_eq!(node(&tree, "a.int"), Some(&SourceNode::Value(Value::Integer(3))));
        assert_eq!(node(&tree, "a.float"), Some(&SourceNode::Value(Value::Float(1.5))));
        assert_eq!(node(&tree, "a.flag"), Some(&SourceNode::Value(Value::Bool(true))));
        assert_eq!(
            node(&tree, "a.text"),
            Some(&SourceNode::Value(Value::from("hello")))
        );
        assert_eq!(node(&tree, "a.nothing"), Some(&SourceNode::Value(Value::Null)));
    }

    #[test]
    fn sequences_become_plain_values() {
        let tree = parse("a:\n  hosts: [x, y]\n");

        assert_eq!(
            node(&tree, "a.hosts"),
            Some(&SourceNode::Value(Value::from(vec!["x", "y"])))
        );
    }

    #[test]
    fn integers_keep_full_signed_range() {
        let tree = parse("a:\n  max: 9223372036854775807\n  min: -9223372036854775808\n");

        assert_eq!(node(&tree, "a.max"), Some(&SourceNode::Value(Value::Integer(i64::MAX))));
        assert_eq!(node(&tree, "a.min"), Some(&SourceNode::Value(Value::Integer(i64::MIN))));
    }

    #[test]
    fn integer_above_signed_range_is_malformed() {
        let result = Format::Yaml.parse("a:\n  big: 18446744073709551615\n");

        assert!(matches!(
            result,
            Err(Error::MalformedSource(reason)) if reason.contains("18446744073709551615")
        ));
    }

    #[test]
    fn numeric_keys_use_their_spelling() {
        let tree = parse("a:\n  1: one\n");
        assert_eq!(node(&tree, "a.1"), Some(&SourceNode::Value(Value::from("one"))));
    }
}

mod references {
    use super::*;

    #[test]
    fn ref_tag_becomes_reference_marker() {
        let tree = parse("b:\n  y: !REF a.x\n");

        assert_eq!(
            node(&tree, "b.y"),
            Some(&SourceNode::Reference(FieldPath::new("a", "x")))
        );
    }

    #[test]
    fn ref_target_may_have_nested_entry_path() {
        let tree = parse("b.y: !REF app.db.host\n");

        assert_eq!(
            node(&tree, "b.y"),
            Some(&SourceNode::Reference(FieldPath::new("app.db", "host")))
        );
    }

    #[test]
    fn ref_without_attribute_is_malformed() {
        let result = Format::Yaml.parse("b:\n  y: !REF a\n");
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn ref_with_non_string_target_is_malformed() {
        let result = Format::Yaml.parse("b:\n  y: !REF [a, x]\n");
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn ref_inside_sequence_is_malformed() {
        let result = Format::Yaml.parse("b:\n  y: [1, !REF a.x]\n");
        assert!(matches!(result, Err(Error::MalformedSource(_))));
    }

    #[test]
    fn unknown_tags_are_malformed() {
        let result = Format::Yaml.parse("b:\n  y: !ENV HOME\n");
        assert!(matches!(result, Err(Error::MalformedSource(reason)) if reason.contains("tag")));
    }
}

mod merge_keys {
    use super::*;

    #[test]
    fn merge_key_copies_anchored_fields() {
        let tree = parse("defaults: &d\n  x: 1\n  y: 0\na:\n  <<: *d\n  y: 2\n");

        assert_eq!(node(&tree, "a.x"), Some(&SourceNode::Value(Value::Integer(1))));
        assert_eq!(node(&tree, "a.y"), Some(&SourceNode::Value(Value::Integer(2))));
        assert_eq!(node(&tree, "a.<<"), None);
    }

    #[test]
    fn merge_key_accepts_a_list_of_anchors() {
        let tree = parse("one: &one\n  x: 1\ntwo: &two\n  z: 3\na:\n  <<: [*one, *two]\n");

        assert_eq!(node(&tree, "a.x"), Some(&SourceNode::Value(Value::Integer(1))));
        assert_eq!(node(&tree, "a.z"), Some(&SourceNode::Value(Value::Integer(3))));
    }

    #[test]
    fn merge_key_with_scalar_is_an_error() {
        let result = Format::Yaml.parse("a:\n  <<: 5\n");
        assert!(matches!(result, Err(Error::YamlParse(_))));
    }
}

mod documents {
    use super::*;

    #[test]
    fn empty_document_is_empty_tree() {
        assert!(parse("").is_empty());
        assert!(parse("   \n").is_empty());
    }

    #[test]
    fn scalar_document_is_empty_tree() {
        assert!(parse("just a string").is_empty());
    }

    #[test]
    fn syntax_error_is_reported() {
        let result = Format::Yaml.parse("a: [unclosed\n");
        assert!(matches!(result, Err(Error::YamlParse(_))));
    }

    #[test]
    fn parse_errors_are_configuration_errors() {
        let err = Format::Yaml.parse("a: [unclosed\n").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
