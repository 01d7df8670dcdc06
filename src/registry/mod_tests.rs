//! Tests for entry declaration and required-field validation.

use indexmap::IndexMap;
use serde::Deserialize;

use super::*;
use crate::error::ErrorKind;
use crate::value::Value;

fn load(registry: &mut Registry, yaml: &str) -> Result<LoadReport> {
    registry.load_stream(yaml.as_bytes())
}

mod declaration {
    use super::*;

    #[test]
    fn second_registration_at_same_path_conflicts() {
        let mut registry = Registry::new();
        EntryBuilder::new("a.b").field("f", 1).register(&mut registry).unwrap();

        let err = EntryBuilder::new("a.b").register(&mut registry).unwrap_err();

        assert!(matches!(&err, Error::PathConflict { path } if path == "a.b"));
        assert_eq!(err.kind(), ErrorKind::PathConflict);
        assert!(err.is_invalid_operation());
        // The first definition is untouched.
        assert_eq!(registry.lookup("a.b").unwrap().get("f"), Some(&Value::Integer(1)));
    }

    #[test]
    fn default_is_kept_without_overlay() {
        let mut registry = Registry::new();
        let handle = EntryBuilder::new("a.b").field("f", 1).register(&mut registry).unwrap();

        let entry = registry.lookup(&handle).unwrap();
        assert_eq!(entry.get("f"), Some(&Value::Integer(1)));
        assert_eq!(handle.path(), "a.b");
    }

    #[test]
    fn malformed_path_is_rejected() {
        let mut registry = Registry::new();
        let result = EntryBuilder::new("a..b").register(&mut registry);

        assert!(matches!(result, Err(Error::InvalidPath { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn explicit_path_avoids_module_path_conflict() {
        let mut registry = Registry::new();

        let first = crate::module_entry!().register(&mut registry).unwrap();
        let second = crate::module_entry!()
            .path("registry.other")
            .register(&mut registry)
            .unwrap();

        assert_eq!(first.path(), "aegir.registry.tests.declaration");
        assert_eq!(second.path(), "registry.other");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn lookup_of_unknown_path_is_configuration_error() {
        let registry = Registry::new();
        let err = registry.lookup("nowhere").unwrap_err();

        assert!(matches!(&err, Error::UnknownEntry { path } if path == "nowhere"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn entries_are_listed_in_path_order() {
        let mut registry = Registry::new();
        EntryBuilder::new("b").register(&mut registry).unwrap();
        EntryBuilder::new("a.z").register(&mut registry).unwrap();
        EntryBuilder::new("a").register(&mut registry).unwrap();

        let paths: Vec<_> = registry.entries().map(Entry::path).collect();
        assert_eq!(paths, vec!["a", "a.z", "b"]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = Registry::new();
        EntryBuilder::new("a").field("x", 1).register(&mut registry).unwrap();
        load(&mut registry, "later:\n  y: 2\n").unwrap();

        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.pending().is_empty());
        assert!(!registry.contains("a"));
    }
}

mod required_fields {
    use super::*;

    #[test]
    fn missing_required_field_fails_registration() {
        let mut registry = Registry::new();

        let err = EntryBuilder::new("svc")
            .required("g", TypeHint::String)
            .field("h", 1)
            .register(&mut registry)
            .unwrap_err();

        assert!(matches!(
            &err,
            Error::MissingAttributes { path, fields } if path == "svc" && fields == &["g"]
        ));
        assert_eq!(err.kind(), ErrorKind::ConfigurationKeyError);
        assert!(err.is_configuration_error());
    }

    #[test]
    fn failed_validation_leaves_entry_registered_and_unchecked() {
        let mut registry = Registry::new();
        let _ = EntryBuilder::new("svc")
            .required("g", TypeHint::String)
            .register(&mut registry);

        assert!(registry.contains("svc"));
        assert_eq!(registry.unchecked().collect::<Vec<_>>(), vec!["svc"]);

        load(&mut registry, "svc:\n  g: ok\n").unwrap();

        assert_eq!(registry.unchecked().count(), 0);
    }

    #[test]
    fn deferred_check_runs_on_demand() {
        let mut registry = Registry::new();
        let handle = EntryBuilder::new("svc")
            .required("g", TypeHint::Integer)
            .check_attributes(false)
            .register(&mut registry)
            .unwrap();

        assert!(matches!(
            registry.check_attributes(&handle),
            Err(Error::MissingAttributes { .. })
        ));

        load(&mut registry, "svc:\n  g: 7\n").unwrap();

        // Deferred entries are not validated by a load either.
        assert_eq!(registry.unchecked().collect::<Vec<_>>(), vec!["svc"]);
        registry.check_attributes(&handle).unwrap();
        assert_eq!(registry.unchecked().count(), 0);
    }

    #[test]
    fn check_is_idempotent() {
        let mut registry = Registry::new();
        let handle = EntryBuilder::new("svc").field("g", 1).register(&mut registry).unwrap();

        registry.check_attributes(&handle).unwrap();
        registry.check_attributes(&handle).unwrap();
    }

    #[test]
    fn check_of_unknown_entry_fails() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.check_attributes("missing"),
            Err(Error::UnknownEntry { .. })
        ));
    }

    #[test]
    fn check_all_drains_unchecked_entries() {
        let mut registry = Registry::new();
        for path in ["one", "two"] {
            EntryBuilder::new(path)
                .required("g", TypeHint::Any)
                .check_attributes(false)
                .register(&mut registry)
                .unwrap();
        }
        load(&mut registry, "one:\n  g: 1\n").unwrap();

        assert!(matches!(
            registry.check_all_attributes(),
            Err(Error::MissingAttributes { path, .. }) if path == "two"
        ));
        assert_eq!(registry.unchecked().collect::<Vec<_>>(), vec!["two"]);

        load(&mut registry, "two:\n  g: 2\n").unwrap();
        registry.check_all_attributes().unwrap();
        assert_eq!(registry.unchecked().count(), 0);
    }
}

mod declaration_order {
    use super::*;

    #[test]
    fn overlay_loaded_before_declaration_is_applied() {
        let mut registry = Registry::new();
        let report = load(&mut registry, "a.b:\n  f: 5\n").unwrap();
        assert_eq!(report.staged, 1);

        let handle = EntryBuilder::new("a.b")
            .required("f", TypeHint::Integer)
            .register(&mut registry)
            .unwrap();

        assert_eq!(registry.lookup(&handle).unwrap().get("f"), Some(&Value::Integer(5)));
        assert!(registry.pending().is_empty());
    }

    #[test]
    fn staged_mapping_is_folded_into_declared_field() {
        let mut registry = Registry::new();
        load(&mut registry, "svc:\n  opts:\n    retries: 3\n    backoff: 1.5\n").unwrap();

        EntryBuilder::new("svc")
            .field("opts", IndexMap::<String, Value>::new())
            .register(&mut registry)
            .unwrap();

        let mut expected = IndexMap::new();
        expected.insert("retries".to_string(), Value::Integer(3));
        expected.insert("backoff".to_string(), Value::Float(1.5));
        assert_eq!(
            registry.lookup("svc").unwrap().get("opts"),
            Some(&Value::Mapping(expected))
        );
        assert!(registry.pending().is_empty());
    }

    #[test]
    fn nested_entry_takes_precedence_over_field_fold() {
        let mut registry = Registry::new();
        load(&mut registry, "svc:\n  opts:\n    retries: 3\n").unwrap();

        EntryBuilder::new("svc.opts")
            .field("retries", 0)
            .register(&mut registry)
            .unwrap();
        EntryBuilder::new("svc")
            .field("opts", IndexMap::<String, Value>::new())
            .register(&mut registry)
            .unwrap();

        assert_eq!(
            registry.lookup("svc.opts").unwrap().get("retries"),
            Some(&Value::Integer(3))
        );
        assert_eq!(
            registry.lookup("svc").unwrap().get("opts"),
            Some(&Value::Mapping(IndexMap::new()))
        );
    }

    fn declare_with_opts(registry: &mut Registry) -> Result<EntryHandle> {
        EntryBuilder::new("a")
            .field("opts", IndexMap::<String, Value>::new())
            .register(registry)
    }

    const NESTED_REF: &str = "a:\n  opts:\n    x: !REF b.y\n";

    #[test]
    fn reference_in_field_mapping_fails_when_declared_first() {
        let mut registry = Registry::new();
        EntryBuilder::new("b").field("y", 7).register(&mut registry).unwrap();
        declare_with_opts(&mut registry).unwrap();

        let result = load(&mut registry, NESTED_REF);

        assert!(matches!(
            result,
            Err(Error::MalformedSource(reason)) if reason.contains("'a.opts'")
        ));
    }

    #[test]
    fn reference_in_field_mapping_fails_when_loaded_first() {
        let mut registry = Registry::new();
        EntryBuilder::new("b").field("y", 7).register(&mut registry).unwrap();
        load(&mut registry, NESTED_REF).unwrap();

        let result = declare_with_opts(&mut registry);

        assert!(matches!(
            result,
            Err(Error::MalformedSource(reason)) if reason.contains("'a.opts'")
        ));
        assert!(!registry.contains("a"));
        assert!(registry.pending().get("a.opts", "x").is_some());
    }

    #[test]
    fn reference_under_nested_entry_is_not_folded() {
        let mut registry = Registry::new();
        EntryBuilder::new("b").field("y", 7).register(&mut registry).unwrap();
        load(&mut registry, NESTED_REF).unwrap();
        EntryBuilder::new("a.opts").field("x", 0).register(&mut registry).unwrap();

        declare_with_opts(&mut registry).unwrap();

        assert_eq!(
            registry.lookup("a.opts").unwrap().get("x"),
            Some(&Value::Integer(7))
        );
    }

    #[test]
    fn staged_fields_for_other_paths_are_kept() {
        let mut registry = Registry::new();
        load(&mut registry, "a:\n  x: 1\nb:\n  y: 2\n").unwrap();

        EntryBuilder::new("a").field("x", 0).register(&mut registry).unwrap();

        assert_eq!(registry.pending().paths().collect::<Vec<_>>(), vec!["b"]);
    }
}

mod typed_access {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Database {
        host: String,
        port: u16,
        #[serde(default)]
        replicas: Vec<String>,
    }

    #[test]
    fn extract_converts_whole_entry() {
        let mut registry = Registry::new();
        load(&mut registry, "app.db:\n  host: db.internal\n  replicas: [r1, r2]\n").unwrap();

        let handle = EntryBuilder::new("app.db")
            .required("host", TypeHint::String)
            .field("port", 5432)
            .register(&mut registry)
            .unwrap();

        let db: Database = registry.lookup(&handle).unwrap().extract().unwrap();
        assert_eq!(
            db,
            Database {
                host: "db.internal".to_string(),
                port: 5432,
                replicas: vec!["r1".to_string(), "r2".to_string()],
            }
        );
    }

    #[test]
    fn extract_reports_conversion_failure() {
        let mut registry = Registry::new();
        EntryBuilder::new("app.db")
            .field("host", "h")
            .field("port", "not-a-port")
            .register(&mut registry)
            .unwrap();

        let result = registry.lookup("app.db").unwrap().extract::<Database>();
        assert!(matches!(result, Err(Error::Conversion { path, .. }) if path == "app.db"));
    }
}
