//! Aegir: a configuration entry registry with overlay resolution.
//!
//! Code declares configuration entries at dotted paths, each with typed
//! fields and defaults. Configuration sources (YAML or TOML) are loaded on
//! top of those defaults in any order relative to the declarations, and
//! `!REF path.attribute` markers copy one entry's value into another.
//!
//! ```
//! use aegir::{EntryBuilder, Registry, TypeHint, Value};
//!
//! let mut registry = Registry::new();
//! registry
//!     .load_stream("net:\n  port: 8080\nweb:\n  port: !REF net.port\n".as_bytes())
//!     .unwrap();
//!
//! EntryBuilder::new("net").field("port", 80).register(&mut registry).unwrap();
//! EntryBuilder::new("web")
//!     .required("port", TypeHint::Integer)
//!     .register(&mut registry)
//!     .unwrap();
//!
//! let web = registry.lookup("web").unwrap();
//! assert_eq!(web.get("port"), Some(&Value::Integer(8080)));
//! ```

pub mod error;
pub mod path;
pub mod registry;
pub mod source;
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use path::FieldPath;
pub use registry::{
    Entry, EntryBuilder, EntryHandle, Field, FieldDecl, LoadOptions, LoadReport, PendingStore,
    Registry, TypeHint,
};
pub use source::{Format, SourceNode, SourceTree};
pub use value::Value;
