//! Entry definitions and the declaration builder.

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::path::{self, FieldPath};
use crate::value::Value;

use super::Registry;

/// Declared type of a field.
///
/// Documentation only: values are never checked or coerced against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeHint {
    #[default]
    Any,
    Bool,
    Integer,
    Float,
    String,
    Sequence,
    Mapping,
}

impl TypeHint {
    /// Infers the hint matching a default value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Any,
            Value::Bool(_) => Self::Bool,
            Value::Integer(_) => Self::Integer,
            Value::Float(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Sequence(_) => Self::Sequence,
            Value::Mapping(_) => Self::Mapping,
        }
    }
}

/// Current content of a field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// Declared without a default and never overlaid.
    Unset,
    /// Holds a concrete value.
    Value(Value),
    /// Placeholder for a `!REF` marker awaiting resolution.
    Reference(FieldPath),
}

/// One field of an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    hint: TypeHint,
    default: Option<Value>,
    declared: bool,
    slot: Slot,
}

impl Field {
    fn from_decl(declaration: FieldDecl) -> Self {
        let slot = declaration
            .default
            .clone()
            .map_or(Slot::Unset, Slot::Value);

        Self {
            hint: declaration.hint,
            default: declaration.default,
            declared: true,
            slot,
        }
    }

    /// A field supplied by an overlay without being declared.
    const fn extra(slot: Slot) -> Self {
        Self {
            hint: TypeHint::Any,
            default: None,
            declared: false,
            slot,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> TypeHint {
        self.hint
    }

    /// The declared default, if the field has one.
    #[must_use]
    pub const fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// `false` for fields that only exist because an overlay supplied them.
    #[must_use]
    pub const fn is_declared(&self) -> bool {
        self.declared
    }

    /// The concrete value, or `None` if unset or awaiting a reference.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Value(value) => Some(value),
            Slot::Unset | Slot::Reference(_) => None,
        }
    }

    /// Target of the unresolved reference this field is waiting on.
    #[must_use]
    pub const fn pending_reference(&self) -> Option<&FieldPath> {
        match &self.slot {
            Slot::Reference(target) => Some(target),
            Slot::Unset | Slot::Value(_) => None,
        }
    }

    pub(crate) const fn slot(&self) -> &Slot {
        &self.slot
    }
}

/// A registered configuration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    path: String,
    fields: IndexMap<String, Field>,
    check_attributes: bool,
}

impl Entry {
    fn new(path: String, declarations: IndexMap<String, FieldDecl>, check_attributes: bool) -> Self {
        let fields = declarations
            .into_iter()
            .map(|(name, declaration)| (name, Field::from_decl(declaration)))
            .collect();

        Self {
            path,
            fields,
            check_attributes,
        }
    }

    /// Dotted path the entry is registered at.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether required fields are validated automatically.
    #[must_use]
    pub const fn check_attributes(&self) -> bool {
        self.check_attributes
    }

    /// Iterates over fields in declaration order, overlay-only fields last.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Returns `true` if `name` was declared on the entry.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(Field::is_declared)
    }

    /// Current concrete value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(Field::value)
    }

    /// Converts one field into a Rust type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingAttributes`] if the field has no concrete value,
    /// or [`Error::Conversion`] if the value does not fit `T`.
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| Error::MissingAttributes {
            path: self.path.clone(),
            fields: vec![name.to_string()],
        })?;

        value.deserialize_into().map_err(|source| Error::Conversion {
            path: path::join(&self.path, name),
            source,
        })
    }

    /// Converts the whole entry into a Rust type, field by field.
    ///
    /// Fields without a concrete value are left out, so `T` can fall back to
    /// its own `#[serde(default)]` handling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if the fields do not fit `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        let mapping: IndexMap<String, Value> = self
            .fields
            .iter()
            .filter_map(|(name, field)| field.value().map(|value| (name.clone(), value.clone())))
            .collect();

        Value::Mapping(mapping)
            .deserialize_into()
            .map_err(|source| Error::Conversion {
                path: self.path.clone(),
                source,
            })
    }

    /// Names of fields that lack a concrete value, in field order.
    ///
    /// Covers declared fields without a default that were never overlaid, and
    /// any field still holding an unresolved reference.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, field)| field.value().is_none())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Overwrites a field with a concrete value, adding it if undeclared.
    pub(crate) fn set_value(&mut self, name: &str, value: Value) {
        self.set_slot(name, Slot::Value(value));
    }

    /// Puts a reference placeholder in a field, adding it if undeclared.
    pub(crate) fn set_reference(&mut self, name: &str, target: FieldPath) {
        self.set_slot(name, Slot::Reference(target));
    }

    fn set_slot(&mut self, name: &str, slot: Slot) {
        match self.fields.get_mut(name) {
            Some(field) => field.slot = slot,
            None => {
                self.fields.insert(name.to_string(), Field::extra(slot));
            }
        }
    }
}

/// Lightweight handle to a registered entry.
///
/// Returned by registration; pass it back to [`Registry::lookup`] or
/// [`Registry::check_attributes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    path: String,
}

impl EntryHandle {
    pub(crate) const fn new(path: String) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl AsRef<str> for EntryHandle {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Declaration of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub hint: TypeHint,
    pub default: Option<Value>,
}

/// Builder that declares a configuration entry.
///
/// # Example
///
/// ```
/// use aegir::{EntryBuilder, Registry, TypeHint};
///
/// let mut registry = Registry::new();
/// registry.load_stream("app.db:\n  host: db.internal\n".as_bytes()).unwrap();
///
/// let db = EntryBuilder::new("app.db")
///     .required("host", TypeHint::String)
///     .field("port", 5432)
///     .register(&mut registry)
///     .unwrap();
///
/// let entry = registry.lookup(&db).unwrap();
/// assert_eq!(entry.value::<String>("host").unwrap(), "db.internal");
/// assert_eq!(entry.value::<u16>("port").unwrap(), 5432);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct EntryBuilder {
    path: String,
    fields: IndexMap<String, FieldDecl>,
    check_attributes: bool,
}

impl EntryBuilder {
    /// Starts a declaration at an explicit dotted path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: IndexMap::new(),
            check_attributes: true,
        }
    }

    /// Starts a declaration at the dotted form of a Rust module path.
    ///
    /// Usually called through [`module_entry!`](crate::module_entry).
    pub fn for_module(module_path: &str) -> Self {
        Self::new(path::from_module_path(module_path))
    }

    /// Replaces the path wholesale.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Declares a field with a default; the hint is inferred from the default.
    pub fn field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        let hint = TypeHint::of(&default);
        self.typed_field(name, hint, default)
    }

    /// Declares a field with an explicit hint and a default.
    pub fn typed_field(
        mut self,
        name: impl Into<String>,
        hint: TypeHint,
        default: impl Into<Value>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldDecl {
                hint,
                default: Some(default.into()),
            },
        );
        self
    }

    /// Declares a field without a default; a source must supply it.
    pub fn required(mut self, name: impl Into<String>, hint: TypeHint) -> Self {
        self.fields.insert(
            name.into(),
            FieldDecl {
                hint,
                default: None,
            },
        );
        self
    }

    /// Enables or defers required-field validation at registration time.
    pub fn check_attributes(mut self, enabled: bool) -> Self {
        self.check_attributes = enabled;
        self
    }

    /// Registers the entry; see [`Registry::register`].
    ///
    /// # Errors
    ///
    /// See [`Registry::register`].
    pub fn register(self, registry: &mut Registry) -> Result<EntryHandle> {
        registry.register(self)
    }

    /// The path the entry will be registered at.
    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.path
    }

    pub(crate) fn into_entry(self) -> Result<Entry> {
        path::validate(&self.path)?;
        for name in self.fields.keys() {
            path::validate_segment(name)?;
        }

        Ok(Entry::new(self.path, self.fields, self.check_attributes))
    }
}

/// Starts an [`EntryBuilder`] at the caller's module path.
///
/// ```
/// let builder = aegir::module_entry!();
/// assert!(!builder.target_path().contains("::"));
/// ```
#[macro_export]
macro_rules! module_entry {
    () => {
        $crate::EntryBuilder::for_module(::core::module_path!())
    };
}
