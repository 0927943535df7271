//! Shapes example payloads by the descriptor they are an instance of, so that an
//! example object lists its fields in declaration order and carries only the fields
//! the schema declares.

use crate::descriptor::{
    EnumValue, GenericKind, PrimitiveKind, TypeCatalog, TypeDefinition, TypeDescriptor,
};
use log::warn;
use serde_json::{Map, Value};

const MAX_DEPTH: usize = 64;

/// Returns `value` reshaped according to `descriptor`.
///
/// Mismatches are reported as warnings and the offending part is kept unchanged.
pub fn shape_example(value: &Value, descriptor: &TypeDescriptor, catalog: &TypeCatalog) -> Value {
    shape(value, descriptor, catalog, 0)
}

fn shape(value: &Value, descriptor: &TypeDescriptor, catalog: &TypeCatalog, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return value.clone();
    }

    match descriptor {
        TypeDescriptor::Primitive(kind) => {
            if !primitive_matches(*kind, value) {
                warn!("Example value {} does not match {:?}", value, kind);
            }
            value.clone()
        }
        TypeDescriptor::Named(identity) => match catalog.get(identity) {
            Some(TypeDefinition::Composite(composite)) => {
                let Some(object) = value.as_object() else {
                    warn!("Example for {} is not an object", identity);
                    return value.clone();
                };

                let mut shaped = Map::new();
                for field in &composite.fields {
                    match object.get(&field.name) {
                        Some(field_value) => {
                            let field_type = if field.optional {
                                field.ty.unwrap_optional()
                            } else {
                                &field.ty
                            };
                            if !(field_value.is_null() && (field.optional || field.ty.is_optional())) {
                                shaped.insert(
                                    field.name.clone(),
                                    shape(field_value, field_type, catalog, depth + 1),
                                );
                            }
                        }
                        None if !field.optional && !field.ty.is_optional() => {
                            warn!("Example for {} is missing field `{}`", identity, field.name);
                        }
                        None => {}
                    }
                }
                for key in object.keys() {
                    if !composite.fields.iter().any(|f| &f.name == key) {
                        warn!("Dropping unknown field `{}` from example for {}", key, identity);
                    }
                }
                Value::Object(shaped)
            }
            Some(TypeDefinition::Enumeration(enumeration)) => {
                let known = enumeration.values.iter().any(|v| match (v, value) {
                    (EnumValue::String(s), Value::String(actual)) => s == actual,
                    (EnumValue::Integer(i), Value::Number(actual)) => actual.as_i64() == Some(*i),
                    _ => false,
                });
                if !known {
                    warn!("Example value {} is not a member of {}", value, identity);
                }
                value.clone()
            }
            Some(TypeDefinition::Alias(alias)) => shape(value, &alias.target, catalog, depth + 1),
            None => value.clone(),
        },
        TypeDescriptor::Generic { kind, args } => match (kind, value) {
            (GenericKind::List, Value::Array(items)) if args.len() == 1 => Value::Array(
                items
                    .iter()
                    .map(|item| shape(item, &args[0], catalog, depth + 1))
                    .collect(),
            ),
            (GenericKind::Mapping, Value::Object(entries)) if args.len() == 2 => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), shape(v, &args[1], catalog, depth + 1)))
                    .collect(),
            ),
            (GenericKind::Optional, Value::Null) => Value::Null,
            (GenericKind::Optional, _) if args.len() == 1 => {
                shape(value, &args[0], catalog, depth + 1)
            }
            (GenericKind::Union, _) => value.clone(),
            _ => {
                warn!(
                    "Example value {} does not match {}",
                    value,
                    descriptor.display_name()
                );
                value.clone()
            }
        },
        TypeDescriptor::Unit | TypeDescriptor::Any => value.clone(),
    }
}

fn primitive_matches(kind: PrimitiveKind, value: &Value) -> bool {
    match kind {
        PrimitiveKind::Boolean => value.is_boolean(),
        PrimitiveKind::Int32 | PrimitiveKind::Int64 => value.is_i64() || value.is_u64(),
        PrimitiveKind::Float | PrimitiveKind::Double => value.is_number(),
        _ => value.is_string(),
    }
}
