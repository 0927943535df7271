//! Mapping of Rust types and type declarations onto descriptors.

use super::TypeIndex;
use crate::descriptor::{
    AliasType, CompositeType, EnumValue, EnumerationType, Field, PrimitiveKind, TypeDefinition,
    TypeDescriptor,
};
use log::{debug, warn};

/// Converts `syn` types written inside one module into [`TypeDescriptor`]s
pub struct TypeMapper<'a> {
    index: &'a TypeIndex,
    module: &'a [String],
    type_params: Vec<String>,
}

impl<'a> TypeMapper<'a> {
    pub fn new(index: &'a TypeIndex, module: &'a [String], generics: &syn::Generics) -> Self {
        Self {
            index,
            module,
            type_params: generics.type_params().map(|p| p.ident.to_string()).collect(),
        }
    }

    pub fn map(&self, ty: &syn::Type) -> TypeDescriptor {
        match ty {
            syn::Type::Reference(reference) => self.map(&reference.elem),
            syn::Type::Paren(paren) => self.map(&paren.elem),
            syn::Type::Group(group) => self.map(&group.elem),
            syn::Type::Slice(slice) => self.map_sequence(&slice.elem),
            syn::Type::Array(array) => self.map_sequence(&array.elem),
            syn::Type::Tuple(tuple) if tuple.elems.is_empty() => TypeDescriptor::Unit,
            syn::Type::Tuple(tuple) => {
                warn!(
                    "Tuple of {} elements has no schema equivalent; treating as free-form",
                    tuple.elems.len()
                );
                TypeDescriptor::Any
            }
            syn::Type::Path(type_path) if type_path.qself.is_none() => self.map_path(&type_path.path),
            _ => {
                warn!("Unsupported type syntax; treating as free-form");
                TypeDescriptor::Any
            }
        }
    }

    fn map_sequence(&self, element: &syn::Type) -> TypeDescriptor {
        if is_byte(element) {
            TypeDescriptor::primitive(PrimitiveKind::Bytes)
        } else {
            TypeDescriptor::list(self.map(element))
        }
    }

    fn map_path(&self, path: &syn::Path) -> TypeDescriptor {
        let Some(last) = path.segments.last() else {
            return TypeDescriptor::Any;
        };
        let name = last.ident.to_string();
        let args = type_arguments(&last.arguments);

        match (name.as_str(), args.as_slice()) {
            ("Option", [inner]) => return TypeDescriptor::optional(self.map(inner)),
            ("Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" | "LinkedList", [inner]) => {
                return self.map_sequence(inner)
            }
            ("HashMap" | "BTreeMap" | "IndexMap", [key, value, ..]) => {
                return TypeDescriptor::mapping(self.map(key), self.map(value))
            }
            ("Box" | "Arc" | "Rc" | "Cow", [.., inner]) => return self.map(inner),
            _ => {}
        }

        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        if let Some(identity) = self.index.resolve(&segments, self.module) {
            return TypeDescriptor::named(identity);
        }

        if path.segments.len() == 1 && self.type_params.contains(&name) {
            debug!("Type parameter `{}` is treated as free-form", name);
            return TypeDescriptor::Any;
        }

        if let Some(kind) = primitive_kind(&name) {
            return TypeDescriptor::primitive(kind);
        }
        if name == "Value" {
            return TypeDescriptor::Any;
        }

        debug!("Type `{}` is not declared in the scanned sources", segments.join("::"));
        TypeDescriptor::named(segments.join("::"))
    }
}

fn type_arguments(arguments: &syn::PathArguments) -> Vec<&syn::Type> {
    match arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_byte(ty: &syn::Type) -> bool {
    matches!(ty, syn::Type::Path(p) if p.qself.is_none() && p.path.is_ident("u8"))
}

fn primitive_kind(name: &str) -> Option<PrimitiveKind> {
    let kind = match name {
        "String" | "str" | "char" => PrimitiveKind::String,
        "i8" | "i16" | "i32" | "u8" | "u16" => PrimitiveKind::Int32,
        "i64" | "u32" | "u64" | "i128" | "u128" | "isize" | "usize" => PrimitiveKind::Int64,
        "f32" => PrimitiveKind::Float,
        "f64" => PrimitiveKind::Double,
        "bool" => PrimitiveKind::Boolean,
        "Uuid" => PrimitiveKind::Uuid,
        "Url" | "Uri" => PrimitiveKind::Url,
        "NaiveDate" | "Date" => PrimitiveKind::Date,
        "NaiveTime" | "Time" => PrimitiveKind::Time,
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "SystemTime" => PrimitiveKind::DateTime,
        _ => return None,
    };
    Some(kind)
}

/// Joins `///` documentation lines into a single text block
pub fn doc_text(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(&line).trim_end().to_string())
        .collect();

    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Case conventions accepted by `#[serde(rename_all = "...")]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(rule: &str) -> Option<Self> {
        let rule = match rule {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            _ => return None,
        };
        Some(rule)
    }

    /// Renames a `PascalCase` variant
    fn apply_to_variant(self, variant: &str) -> String {
        match self {
            RenameRule::Pascal => variant.to_string(),
            RenameRule::Lower => variant.to_ascii_lowercase(),
            RenameRule::Upper => variant.to_ascii_uppercase(),
            RenameRule::Camel => {
                let mut chars = variant.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
            RenameRule::Snake | RenameRule::ScreamingSnake | RenameRule::Kebab | RenameRule::ScreamingKebab => {
                let mut snake = String::new();
                for (i, ch) in variant.char_indices() {
                    if i > 0 && ch.is_uppercase() {
                        snake.push('_');
                    }
                    snake.push(ch.to_ascii_lowercase());
                }
                self.apply_to_field(&snake)
            }
        }
    }

    /// Renames a `snake_case` field
    fn apply_to_field(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => field
                .split('_')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect(),
            RenameRule::Camel => {
                let pascal = RenameRule::Pascal.apply_to_field(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

/// Subset of serde attributes that affect the serialized shape
#[derive(Debug, Default)]
struct SerdeAttributes {
    rename: Option<String>,
    rename_all: Option<RenameRule>,
    skip: bool,
    default: bool,
    flatten: bool,
}

fn parse_serde_attributes(attrs: &[syn::Attribute]) -> SerdeAttributes {
    let mut serde_attrs = SerdeAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if meta.input.peek(syn::Token![=]) {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    serde_attrs.rename = Some(value.value());
                } else {
                    meta.parse_nested_meta(|inner| {
                        let value: syn::LitStr = inner.value()?.parse()?;
                        if inner.path.is_ident("serialize") {
                            serde_attrs.rename = Some(value.value());
                        }
                        Ok(())
                    })?;
                }
            } else if meta.path.is_ident("rename_all") {
                if meta.input.peek(syn::Token![=]) {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    serde_attrs.rename_all = RenameRule::parse(&value.value());
                    if serde_attrs.rename_all.is_none() {
                        warn!("Unknown rename_all rule `{}`", value.value());
                    }
                } else {
                    skip_meta(meta)?;
                }
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                serde_attrs.skip = true;
            } else if meta.path.is_ident("skip_serializing_if") || meta.path.is_ident("default") {
                serde_attrs.default = true;
                skip_meta(meta)?;
            } else if meta.path.is_ident("flatten") {
                serde_attrs.flatten = true;
            } else {
                skip_meta(meta)?;
            }
            Ok(())
        });

        if let Err(e) = result {
            debug!("Ignoring malformed serde attribute: {}", e);
        }
    }

    serde_attrs
}

/// Consumes the value of an attribute entry that carries no meaning here
fn skip_meta(meta: syn::meta::ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(skip_meta)?;
    }
    Ok(())
}

fn named_fields(
    owner: &str,
    fields: &syn::FieldsNamed,
    rename_all: Option<RenameRule>,
    mapper: &TypeMapper,
) -> Vec<Field> {
    let mut result = Vec::new();

    for field in &fields.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let attrs = parse_serde_attributes(&field.attrs);
        if attrs.skip {
            debug!("Skipping field {}.{}", owner, ident);
            continue;
        }

        let raw_name = ident.to_string();
        let raw_name = raw_name.strip_prefix("r#").unwrap_or(&raw_name);
        let name = match (&attrs.rename, rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => rule.apply_to_field(raw_name),
            (None, None) => raw_name.to_string(),
        };
        if attrs.flatten {
            warn!(
                "Field {}.{} is flattened; it is documented as a nested property",
                owner, raw_name
            );
        }

        let mut descriptor = Field::new(name, mapper.map(&field.ty));
        if attrs.default {
            descriptor = descriptor.optional();
        }
        if let Some(doc) = doc_text(&field.attrs) {
            descriptor = descriptor.describe(doc);
        }
        result.push(descriptor);
    }

    result
}

/// Definitions produced by a struct declaration
pub fn struct_definitions(item: &syn::ItemStruct, identity: &str, mapper: &TypeMapper) -> Vec<TypeDefinition> {
    let description = doc_text(&item.attrs);
    let serde_attrs = parse_serde_attributes(&item.attrs);

    match &item.fields {
        syn::Fields::Named(fields) => {
            let mut composite = CompositeType::new(identity);
            composite.description = description;
            composite.fields = named_fields(identity, fields, serde_attrs.rename_all, mapper);
            vec![composite.into()]
        }
        syn::Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
            let mut alias = AliasType::new(identity, mapper.map(&fields.unnamed[0].ty));
            alias.description = description;
            vec![alias.into()]
        }
        syn::Fields::Unnamed(_) => {
            let mut alias = AliasType::new(identity, TypeDescriptor::list(TypeDescriptor::Any));
            alias.description = description;
            vec![alias.into()]
        }
        syn::Fields::Unit => {
            debug!("Unit struct {} has no schema", identity);
            Vec::new()
        }
    }
}

fn discriminant(variant: &syn::Variant) -> Option<i64> {
    let (_, expr) = variant.discriminant.as_ref()?;
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Int(int),
            ..
        }) => int.base10_parse().ok(),
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => match expr.as_ref() {
            syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(int),
                ..
            }) => int.base10_parse::<i64>().ok().map(|v| -v),
            _ => None,
        },
        _ => None,
    }
}

/// Definitions produced by an enum declaration.
///
/// Fieldless enums are enumerations: integer-valued when every variant carries an
/// explicit discriminant, otherwise valued by their serialized names. Enums with data
/// become an alias of a union of their variant payloads; struct-like variants get a
/// composite of their own named `{Enum}{Variant}`.
pub fn enum_definitions(item: &syn::ItemEnum, identity: &str, mapper: &TypeMapper) -> Vec<TypeDefinition> {
    let description = doc_text(&item.attrs);
    let serde_attrs = parse_serde_attributes(&item.attrs);

    let fieldless = item
        .variants
        .iter()
        .all(|v| matches!(v.fields, syn::Fields::Unit));

    if fieldless {
        let discriminants: Option<Vec<i64>> = item.variants.iter().map(discriminant).collect();
        let values = match discriminants {
            Some(values) if !values.is_empty() => values.into_iter().map(EnumValue::Integer).collect(),
            _ => item
                .variants
                .iter()
                .filter(|v| !parse_serde_attributes(&v.attrs).skip)
                .map(|v| EnumValue::String(variant_name(v, serde_attrs.rename_all)))
                .collect(),
        };
        let mut enumeration = EnumerationType::new(identity, values);
        enumeration.description = description;
        return vec![enumeration.into()];
    }

    let mut definitions = Vec::new();
    let mut alternatives = Vec::new();

    for variant in &item.variants {
        if parse_serde_attributes(&variant.attrs).skip {
            continue;
        }
        match &variant.fields {
            syn::Fields::Unit => alternatives.push(TypeDescriptor::Unit),
            syn::Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                alternatives.push(mapper.map(&fields.unnamed[0].ty));
            }
            syn::Fields::Unnamed(_) => alternatives.push(TypeDescriptor::list(TypeDescriptor::Any)),
            syn::Fields::Named(fields) => {
                let variant_identity = format!("{}{}", identity, variant.ident);
                let variant_attrs = parse_serde_attributes(&variant.attrs);
                let mut composite = CompositeType::new(variant_identity.as_str());
                composite.description = doc_text(&variant.attrs);
                composite.fields = named_fields(&variant_identity, fields, variant_attrs.rename_all, mapper);
                definitions.push(composite.into());
                alternatives.push(TypeDescriptor::named(variant_identity));
            }
        }
    }

    let mut alias = AliasType::new(identity, TypeDescriptor::union(alternatives));
    alias.description = description;
    definitions.push(alias.into());
    definitions
}

fn variant_name(variant: &syn::Variant, rename_all: Option<RenameRule>) -> String {
    let attrs = parse_serde_attributes(&variant.attrs);
    match (attrs.rename, rename_all) {
        (Some(rename), _) => rename,
        (None, Some(rule)) => rule.apply_to_variant(&variant.ident.to_string()),
        (None, None) => variant.ident.to_string(),
    }
}

/// Definition produced by a `type X = Y;` declaration
pub fn alias_definition(item: &syn::ItemType, identity: &str, mapper: &TypeMapper) -> TypeDefinition {
    let mut alias = AliasType::new(identity, mapper.map(&item.ty));
    alias.description = doc_text(&item.attrs);
    alias.into()
}
