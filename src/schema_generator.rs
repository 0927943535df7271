use crate::descriptor::{
    component_name, CompositeType, EnumValue, EnumerationType, GenericKind, PrimitiveKind,
    TypeCatalog, TypeDefinition, TypeDescriptor,
};
use crate::error::{Error, Result};
use crate::registry::{SchemaRegistry, COMPONENTS_PREFIX};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Schema generator - converts type descriptors to OpenAPI schemas
pub struct SchemaGenerator {
    /// Declared types looked up by identity
    catalog: TypeCatalog,
    /// Tracks every record and enumeration occurrence across the document
    registry: SchemaRegistry,
    /// Aliases currently being expanded, to reject aliases that contain themselves
    expanding_aliases: Vec<String>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format hint for primitive types (e.g., "int32", "uuid", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties for object types, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for string-keyed maps
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<Schema>>,
    /// Enum values for enumerated types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<EnumValue>>,
    /// Alternatives discriminated by shape
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl Schema {
    /// A schema with only `type` (and optionally `format`) set
    pub fn of_type(schema_type: &str, format: Option<&str>) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            format: format.map(|f| f.to_string()),
            ..Default::default()
        }
    }

    /// A `$ref` pointer to a component schema
    pub fn reference_to(name: &str) -> Self {
        Schema {
            reference: Some(format!("{}{}", COMPONENTS_PREFIX, name)),
            ..Default::default()
        }
    }

    /// Component name this schema points at, if it is a local component reference
    pub fn reference_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(COMPONENTS_PREFIX))
    }

    pub fn array_of(items: Schema) -> Self {
        Schema {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    /// Marks the schema as accepting `null`; references are wrapped in `allOf`
    /// because siblings of `$ref` are ignored
    pub fn into_nullable(mut self) -> Self {
        if self.reference.is_some() {
            return Schema {
                all_of: Some(vec![self]),
                nullable: Some(true),
                ..Default::default()
            };
        }
        self.nullable = Some(true);
        self
    }

    /// Calls `f` on every direct sub-schema
    pub fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Schema)) {
        if let Some(properties) = self.properties.as_mut() {
            properties.values_mut().for_each(|s| f(s));
        }
        if let Some(items) = self.items.as_mut() {
            f(items);
        }
        if let Some(additional) = self.additional_properties.as_mut() {
            f(additional);
        }
        if let Some(one_of) = self.one_of.as_mut() {
            one_of.iter_mut().for_each(|s| f(s));
        }
        if let Some(all_of) = self.all_of.as_mut() {
            all_of.iter_mut().for_each(|s| f(s));
        }
    }

    /// Calls `f` on every direct sub-schema
    pub fn for_each_child(&self, f: &mut dyn FnMut(&Schema)) {
        if let Some(properties) = self.properties.as_ref() {
            properties.values().for_each(|s| f(s));
        }
        if let Some(items) = self.items.as_ref() {
            f(items);
        }
        if let Some(additional) = self.additional_properties.as_ref() {
            f(additional);
        }
        if let Some(one_of) = self.one_of.as_ref() {
            one_of.iter().for_each(|s| f(s));
        }
        if let Some(all_of) = self.all_of.as_ref() {
            all_of.iter().for_each(|s| f(s));
        }
    }

    /// Collects every `$ref` string in this schema tree
    pub fn collect_references(&self, out: &mut Vec<String>) {
        if let Some(reference) = &self.reference {
            out.push(reference.clone());
        }
        self.for_each_child(&mut |child| child.collect_references(out));
    }
}

impl SchemaGenerator {
    /// Create a new SchemaGenerator over a catalog of declared types
    pub fn new(catalog: TypeCatalog) -> Self {
        debug!("Initializing SchemaGenerator with {} declared types", catalog.len());
        Self {
            catalog,
            registry: SchemaRegistry::new(),
            expanding_aliases: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Hands over the accumulated registry for finalization
    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    /// Generate a schema for a type descriptor
    pub fn generate_schema(&mut self, descriptor: &TypeDescriptor) -> Result<Schema> {
        match descriptor {
            TypeDescriptor::Primitive(kind) => Ok(Self::primitive_to_schema(*kind)),
            TypeDescriptor::Named(identity) => self.generate_named_schema(identity),
            TypeDescriptor::Generic { kind, args } => self.generate_generic_schema(*kind, args),
            TypeDescriptor::Any => Ok(Schema::default()),
            TypeDescriptor::Unit => Err(Error::schema(
                "unit",
                "a value without payload cannot be described by a schema",
            )),
        }
    }

    /// Generate the schema of a type that must appear among the components even if
    /// no operation references it
    pub fn generate_extra_type(&mut self, name: &str) -> Result<Schema> {
        let definition = self
            .catalog
            .lookup(name)
            .ok_or_else(|| Error::schema(name, "extra type has no type definition"))?;
        if let TypeDefinition::Alias(alias) = definition {
            return Err(Error::schema(
                &alias.identity,
                "an alias has no schema of its own and cannot be listed as an extra type",
            ));
        }
        let identity = definition.identity().to_string();
        debug!("Pre-registering extra type: {}", identity);

        let schema = self.generate_named_schema(&identity)?;
        self.registry.pin(component_name(&identity));
        Ok(schema)
    }

    /// Whether the type can travel in a path segment or query string
    pub fn is_simple(&self, descriptor: &TypeDescriptor) -> bool {
        self.classify(descriptor, &mut Vec::new(), |def| {
            matches!(def, TypeDefinition::Enumeration(_))
        }, |_| true)
    }

    /// Whether the type serializes to a JSON string (usable as a mapping key)
    fn is_string_like(&self, descriptor: &TypeDescriptor) -> bool {
        self.classify(
            descriptor,
            &mut Vec::new(),
            |def| matches!(def, TypeDefinition::Enumeration(e) if !e.is_integer()),
            |kind| Self::primitive_to_schema(kind).schema_type.as_deref() == Some("string"),
        )
    }

    fn classify(
        &self,
        descriptor: &TypeDescriptor,
        seen: &mut Vec<String>,
        named: impl Fn(&TypeDefinition) -> bool + Copy,
        primitive: impl Fn(PrimitiveKind) -> bool + Copy,
    ) -> bool {
        match descriptor.unwrap_optional() {
            TypeDescriptor::Primitive(kind) => primitive(*kind),
            TypeDescriptor::Named(identity) => match self.catalog.get(identity) {
                Some(TypeDefinition::Alias(alias)) => {
                    if seen.contains(identity) {
                        return false;
                    }
                    seen.push(identity.clone());
                    self.classify(&alias.target, seen, named, primitive)
                }
                Some(definition) => named(definition),
                None => false,
            },
            _ => false,
        }
    }

    /// Convert a primitive kind to an OpenAPI schema
    fn primitive_to_schema(kind: PrimitiveKind) -> Schema {
        let (schema_type, format) = match kind {
            PrimitiveKind::Boolean => ("boolean", None),
            PrimitiveKind::Int32 => ("integer", Some("int32")),
            PrimitiveKind::Int64 => ("integer", Some("int64")),
            PrimitiveKind::Float => ("number", Some("float")),
            PrimitiveKind::Double => ("number", Some("double")),
            PrimitiveKind::String => ("string", None),
            PrimitiveKind::Uuid => ("string", Some("uuid")),
            PrimitiveKind::Url => ("string", Some("uri")),
            PrimitiveKind::Date => ("string", Some("date")),
            PrimitiveKind::Time => ("string", Some("time")),
            PrimitiveKind::DateTime => ("string", Some("date-time")),
            PrimitiveKind::Bytes => ("string", Some("byte")),
        };
        Schema::of_type(schema_type, format)
    }

    fn generate_named_schema(&mut self, identity: &str) -> Result<Schema> {
        let definition = self
            .catalog
            .get(identity)
            .cloned()
            .ok_or_else(|| Error::schema(identity, "no type definition is available for this name"))?;

        match definition {
            TypeDefinition::Alias(alias) => {
                if self.expanding_aliases.iter().any(|a| a == identity) {
                    return Err(Error::schema(identity, "alias refers back to itself"));
                }
                self.expanding_aliases.push(identity.to_string());
                let result = self.generate_schema(&alias.target);
                self.expanding_aliases.pop();
                result
            }
            TypeDefinition::Composite(composite) => {
                self.generate_registered(identity, |generator| {
                    generator.generate_composite_schema(&composite)
                })
            }
            TypeDefinition::Enumeration(enumeration) => {
                self.generate_registered(identity, |_| Self::generate_enum_schema(&enumeration))
            }
        }
    }

    /// Every occurrence yields a reference; the body is built on first sight only.
    /// The registry decides later whether the body is shared or inlined.
    fn generate_registered(
        &mut self,
        identity: &str,
        build: impl FnOnce(&mut Self) -> Result<Schema>,
    ) -> Result<Schema> {
        let name = component_name(identity);
        if !self.registry.occurrence(name, identity)? {
            debug!("Schema for {} already tracked", identity);
            return Ok(Schema::reference_to(name));
        }

        debug!("Generating schema body for: {}", identity);
        let body = build(self)?;
        self.registry.register(name, identity, body)
    }

    fn generate_composite_schema(&mut self, composite: &CompositeType) -> Result<Schema> {
        let mut properties = IndexMap::new();
        let mut required = Vec::new();

        for field in &composite.fields {
            if properties.contains_key(&field.name) {
                return Err(Error::schema(
                    &composite.identity,
                    format!("field `{}` is declared more than once", field.name),
                ));
            }

            let optional = field.optional || field.ty.is_optional();
            let field_type = if optional {
                field.ty.unwrap_optional()
            } else {
                &field.ty
            };

            let mut property = self.generate_schema(field_type)?;
            if let Some(description) = &field.description {
                // kept next to a `$ref` until finalization: it moves onto the body when
                // the target is inlined and is dropped when the target stays shared
                property.description = Some(description.clone());
            }

            if !optional {
                required.push(field.name.clone());
            }
            properties.insert(field.name.clone(), property);
        }

        Ok(Schema {
            schema_type: Some("object".to_string()),
            description: composite.description.clone(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            ..Default::default()
        })
    }

    fn generate_enum_schema(enumeration: &EnumerationType) -> Result<Schema> {
        if enumeration.values.is_empty() {
            return Err(Error::schema(
                &enumeration.identity,
                "enumeration has no values",
            ));
        }
        let schema_type = if enumeration.is_integer() {
            "integer"
        } else if enumeration
            .values
            .iter()
            .all(|v| matches!(v, EnumValue::String(_)))
        {
            "string"
        } else {
            return Err(Error::schema(
                &enumeration.identity,
                "enumeration mixes integer and string values",
            ));
        };

        Ok(Schema {
            schema_type: Some(schema_type.to_string()),
            description: enumeration.description.clone(),
            enum_values: Some(enumeration.values.clone()),
            ..Default::default()
        })
    }

    fn generate_generic_schema(
        &mut self,
        kind: GenericKind,
        args: &[TypeDescriptor],
    ) -> Result<Schema> {
        let expected = match kind {
            GenericKind::List | GenericKind::Optional => Some(1),
            GenericKind::Mapping => Some(2),
            GenericKind::Union => None,
        };
        if let Some(expected) = expected {
            if args.len() != expected {
                return Err(Error::schema(
                    TypeDescriptor::Generic {
                        kind,
                        args: args.to_vec(),
                    }
                    .display_name(),
                    format!(
                        "{} takes {} type parameter(s) but {} were given",
                        kind.as_str(),
                        expected,
                        args.len()
                    ),
                ));
            }
        }

        match kind {
            GenericKind::List => Ok(Schema::array_of(self.generate_schema(&args[0])?)),
            GenericKind::Mapping => {
                if !self.is_string_like(&args[0]) {
                    return Err(Error::schema(
                        TypeDescriptor::mapping(args[0].clone(), args[1].clone()).display_name(),
                        format!(
                            "mapping keys must be string-representable, found `{}`",
                            args[0].display_name()
                        ),
                    ));
                }
                let values = self.generate_schema(&args[1])?;
                Ok(Schema {
                    schema_type: Some("object".to_string()),
                    additional_properties: Some(Box::new(values)),
                    ..Default::default()
                })
            }
            GenericKind::Optional => Ok(self.generate_schema(&args[0])?.into_nullable()),
            GenericKind::Union => self.generate_union_schema(args),
        }
    }

    fn generate_union_schema(&mut self, alternatives: &[TypeDescriptor]) -> Result<Schema> {
        let nullable = alternatives.iter().any(|a| *a == TypeDescriptor::Unit);
        let remaining: Vec<&TypeDescriptor> = alternatives
            .iter()
            .filter(|a| **a != TypeDescriptor::Unit)
            .collect();

        let schema = match remaining.as_slice() {
            [] => {
                return Err(Error::schema(
                    TypeDescriptor::union(alternatives.to_vec()).display_name(),
                    "union has no alternatives carrying a value",
                ))
            }
            [single] => self.generate_schema(single)?,
            _ => {
                let mut one_of = Vec::with_capacity(remaining.len());
                for alternative in remaining {
                    one_of.push(self.generate_schema(alternative)?);
                }
                Schema {
                    one_of: Some(one_of),
                    ..Default::default()
                }
            }
        };

        Ok(if nullable {
            schema.into_nullable()
        } else {
            schema
        })
    }
}
