//! Normalized type and member descriptors consumed by the generation engine.
//!
//! Descriptors are plain data: the front end in [`crate::introspect`] builds them from
//! parsed Rust sources, and library users can build them directly with the constructor
//! helpers below. Declared types (records, enumerations, aliases) live in a
//! [`TypeCatalog`] keyed by identity, and descriptors refer to them by that identity.
//! This keeps self-referential and mutually recursive type graphs finite.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Built-in scalar kinds with a fixed JSON Schema mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    String,
    Uuid,
    Url,
    Date,
    Time,
    DateTime,
    Bytes,
}

/// Parameterized container shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericKind {
    List,
    Mapping,
    Optional,
    Union,
}

impl GenericKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenericKind::List => "list",
            GenericKind::Mapping => "mapping",
            GenericKind::Optional => "optional",
            GenericKind::Union => "union",
        }
    }
}

/// Describes the shape of a type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// A scalar such as a string or a 64-bit integer
    Primitive(PrimitiveKind),
    /// A declared type looked up in the [`TypeCatalog`] by identity
    Named(String),
    /// A container parameterized by other descriptors
    Generic {
        kind: GenericKind,
        args: Vec<TypeDescriptor>,
    },
    /// No payload at all
    Unit,
    /// Free-form JSON
    Any,
}

impl TypeDescriptor {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeDescriptor::Primitive(kind)
    }

    pub fn string() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::String)
    }

    pub fn named(identity: impl Into<String>) -> Self {
        TypeDescriptor::Named(identity.into())
    }

    pub fn list(item: TypeDescriptor) -> Self {
        TypeDescriptor::Generic {
            kind: GenericKind::List,
            args: vec![item],
        }
    }

    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Generic {
            kind: GenericKind::Mapping,
            args: vec![key, value],
        }
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Generic {
            kind: GenericKind::Optional,
            args: vec![inner],
        }
    }

    pub fn union(alternatives: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Generic {
            kind: GenericKind::Union,
            args: alternatives,
        }
    }

    /// Returns the wrapped type of an optional descriptor, or `self` otherwise
    pub fn unwrap_optional(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::Generic {
                kind: GenericKind::Optional,
                args,
            } if args.len() == 1 => &args[0],
            other => other,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Generic {
                kind: GenericKind::Optional,
                ..
            }
        )
    }

    /// Human-readable rendering used in log and error messages
    pub fn display_name(&self) -> String {
        match self {
            TypeDescriptor::Primitive(kind) => format!("{:?}", kind),
            TypeDescriptor::Named(identity) => identity.clone(),
            TypeDescriptor::Generic { kind, args } => {
                let args: Vec<String> = args.iter().map(|a| a.display_name()).collect();
                format!("{}<{}>", kind.as_str(), args.join(", "))
            }
            TypeDescriptor::Unit => "unit".to_string(),
            TypeDescriptor::Any => "any".to_string(),
        }
    }
}

/// Returns the component name for an identity: its last `::` segment
pub fn component_name(identity: &str) -> &str {
    identity.rsplit("::").next().unwrap_or(identity)
}

/// A field of a composite record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeDescriptor,
    /// Omitted from the `required` list when set
    pub optional: bool,
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A structured type with named fields
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub identity: String,
    pub description: Option<String>,
    pub fields: Vec<Field>,
}

impl CompositeType {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// A single member of an enumerated value set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    Integer(i64),
    String(String),
}

/// A type whose values come from a fixed set
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationType {
    pub identity: String,
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
}

impl EnumerationType {
    pub fn new(identity: impl Into<String>, values: Vec<EnumValue>) -> Self {
        Self {
            identity: identity.into(),
            description: None,
            values,
        }
    }

    /// Convenience constructor for string-valued sets
    pub fn of_strings<I, S>(identity: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            identity,
            values
                .into_iter()
                .map(|v| EnumValue::String(v.into()))
                .collect(),
        )
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_integer(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| matches!(v, EnumValue::Integer(_)))
    }
}

/// A named type that is schematically identical to another descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct AliasType {
    pub identity: String,
    pub description: Option<String>,
    pub target: TypeDescriptor,
}

impl AliasType {
    pub fn new(identity: impl Into<String>, target: TypeDescriptor) -> Self {
        Self {
            identity: identity.into(),
            description: None,
            target,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A declared type stored in the catalog
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Composite(CompositeType),
    Enumeration(EnumerationType),
    Alias(AliasType),
}

impl TypeDefinition {
    pub fn identity(&self) -> &str {
        match self {
            TypeDefinition::Composite(c) => &c.identity,
            TypeDefinition::Enumeration(e) => &e.identity,
            TypeDefinition::Alias(a) => &a.identity,
        }
    }

    pub fn name(&self) -> &str {
        component_name(self.identity())
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            TypeDefinition::Composite(c) => c.description.as_deref(),
            TypeDefinition::Enumeration(e) => e.description.as_deref(),
            TypeDefinition::Alias(a) => a.description.as_deref(),
        }
    }
}

impl From<CompositeType> for TypeDefinition {
    fn from(value: CompositeType) -> Self {
        TypeDefinition::Composite(value)
    }
}

impl From<EnumerationType> for TypeDefinition {
    fn from(value: EnumerationType) -> Self {
        TypeDefinition::Enumeration(value)
    }
}

impl From<AliasType> for TypeDefinition {
    fn from(value: AliasType) -> Self {
        TypeDefinition::Alias(value)
    }
}

/// Identity-keyed table of declared types
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    definitions: IndexMap<String, TypeDefinition>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition; a later definition with the same identity replaces the earlier one
    pub fn define(&mut self, definition: impl Into<TypeDefinition>) {
        let definition = definition.into();
        debug!("Defining type: {}", definition.identity());
        self.definitions
            .insert(definition.identity().to_string(), definition);
    }

    pub fn with(mut self, definition: impl Into<TypeDefinition>) -> Self {
        self.define(definition);
        self
    }

    pub fn get(&self, identity: &str) -> Option<&TypeDefinition> {
        self.definitions.get(identity)
    }

    /// Finds a definition by exact identity, falling back to the first one whose
    /// component name matches
    pub fn lookup(&self, name: &str) -> Option<&TypeDefinition> {
        self.get(name).or_else(|| {
            self.definitions
                .values()
                .find(|d| d.name() == component_name(name))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Calling-convention tag used to classify a parameter as path or query eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
}

/// One parameter of a member function
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    pub kind: ParameterKind,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
        }
    }

    pub fn path(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self::new(name, ty, ParameterKind::PositionalOnly)
    }

    pub fn keyword(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self::new(name, ty, ParameterKind::PositionalOrKeyword)
    }
}

/// A sample payload attached to a request or response
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub value: serde_json::Value,
    /// Identity or name of the type the payload is an instance of, when known
    pub type_name: Option<String>,
}

impl Example {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            type_name: None,
        }
    }

    pub fn of_type(value: serde_json::Value, type_name: impl Into<String>) -> Self {
        Self {
            value,
            type_name: Some(type_name.into()),
        }
    }
}

/// Per-member overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebMethod {
    /// Explicit route template with `{name}` placeholders
    pub route: Option<String>,
    /// True if the operation can be invoked without authentication
    pub public: bool,
    pub deprecated: bool,
    pub request_examples: Vec<Example>,
    pub response_examples: Vec<Example>,
}

/// One member function of an interface
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub returns: TypeDescriptor,
    /// Type of the events streamed out-of-band while the member runs; `returns` is
    /// then delivered through a callback once it completes
    pub event: Option<TypeDescriptor>,
    /// Error types declared in the signature itself
    pub declared_errors: Vec<String>,
    /// Raw documentation text
    pub documentation: Option<String>,
    pub web_method: WebMethod,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, returns: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns,
            event: None,
            declared_errors: Vec::new(),
            documentation: None,
            web_method: WebMethod::default(),
        }
    }

    pub fn param(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn document(mut self, text: impl Into<String>) -> Self {
        self.documentation = Some(text.into());
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.web_method.route = Some(route.into());
        self
    }

    pub fn error(mut self, type_name: impl Into<String>) -> Self {
        self.declared_errors.push(type_name.into());
        self
    }

    pub fn streams(mut self, event: TypeDescriptor) -> Self {
        self.event = Some(event);
        self
    }
}

/// A group of members, such as the methods of one trait
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub documentation: Option<String>,
    pub members: Vec<MemberDescriptor>,
    /// Types of the events the interface emits outside of any single operation
    pub events: Vec<TypeDescriptor>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documentation: None,
            members: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }

    pub fn event(mut self, event: TypeDescriptor) -> Self {
        self.events.push(event);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name_strips_module_path() {
        assert_eq!(component_name("jobs::Job"), "Job");
        assert_eq!(component_name("a::b::Job"), "Job");
        assert_eq!(component_name("Job"), "Job");
    }

    #[test]
    fn test_unwrap_optional() {
        let inner = TypeDescriptor::primitive(PrimitiveKind::Int32);
        let optional = TypeDescriptor::optional(inner.clone());

        assert!(optional.is_optional());
        assert_eq!(optional.unwrap_optional(), &inner);
        assert_eq!(inner.unwrap_optional(), &inner);
    }

    #[test]
    fn test_catalog_lookup_by_short_name() {
        let catalog = TypeCatalog::new()
            .with(CompositeType::new("jobs::Job"))
            .with(EnumerationType::of_strings("Status", ["created", "running"]));

        assert_eq!(catalog.lookup("jobs::Job").unwrap().identity(), "jobs::Job");
        assert_eq!(catalog.lookup("Job").unwrap().identity(), "jobs::Job");
        assert_eq!(catalog.lookup("Status").unwrap().name(), "Status");
        assert!(catalog.lookup("Missing").is_none());
    }

    #[test]
    fn test_integer_enumeration_detection() {
        let ints = EnumerationType::new("Priority", vec![EnumValue::Integer(1), EnumValue::Integer(2)]);
        let strings = EnumerationType::of_strings("Status", ["a"]);
        assert!(ints.is_integer());
        assert!(!strings.is_integer());
    }

    #[test]
    fn test_display_name_of_nested_generics() {
        let ty = TypeDescriptor::mapping(
            TypeDescriptor::string(),
            TypeDescriptor::list(TypeDescriptor::named("Job")),
        );
        assert_eq!(ty.display_name(), "mapping<String, list<Job>>");
    }
}
