//! Component schema registry.
//!
//! Every occurrence of a record or enumeration is recorded here under its component
//! name and is represented by a `$ref` while operations are being synthesized. Once
//! all operations are known, [`SchemaRegistry::finalize`] decides which entries become
//! shared components (referenced more than once, or pinned as extra types) and inlines
//! the rest at their single use site.

use crate::error::{Error, Result};
use crate::schema_generator::Schema;
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::HashSet;

/// Prefix of every local component reference
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Bookkeeping for one component name
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub name: String,
    /// Full identity of the type that owns the name
    pub identity: String,
    /// Schema body; absent only while the body is being generated
    pub schema: Option<Schema>,
    /// Number of occurrences seen so far
    pub references: usize,
    /// Forced into the components section regardless of usage
    pub pinned: bool,
}

impl RegistryEntry {
    fn new(name: &str, identity: &str) -> Self {
        Self {
            name: name.to_string(),
            identity: identity.to_string(),
            schema: None,
            references: 1,
            pinned: false,
        }
    }

    /// Whether the entry is emitted under `components/schemas`
    pub fn is_promoted(&self) -> bool {
        self.pinned || self.references >= 2
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `identity` under `name`.
    ///
    /// Returns `true` the first time the name is seen, meaning the caller must build
    /// the body and hand it to [`SchemaRegistry::register`]. Fails if the name is
    /// already owned by a different identity.
    pub fn occurrence(&mut self, name: &str, identity: &str) -> Result<bool> {
        match self.entries.get_mut(name) {
            Some(entry) => {
                if entry.identity != identity {
                    return Err(Error::NamingCollision {
                        name: name.to_string(),
                        first: entry.identity.clone(),
                        second: identity.to_string(),
                    });
                }
                entry.references += 1;
                debug!("Schema {} now referenced {} times", name, entry.references);
                Ok(false)
            }
            None => {
                debug!("Tracking new schema: {} ({})", name, identity);
                self.entries
                    .insert(name.to_string(), RegistryEntry::new(name, identity));
                Ok(true)
            }
        }
    }

    /// Stores the body of `identity` under `name` and returns a reference to it.
    ///
    /// Registering a name that already carries a body keeps the first body and counts
    /// one more occurrence. Fails if the name is owned by a different identity.
    pub fn register(&mut self, name: &str, identity: &str, schema: Schema) -> Result<Schema> {
        match self.entries.get_mut(name) {
            Some(entry) if entry.identity != identity => {
                return Err(Error::NamingCollision {
                    name: name.to_string(),
                    first: entry.identity.clone(),
                    second: identity.to_string(),
                });
            }
            Some(entry) if entry.schema.is_some() => entry.references += 1,
            Some(entry) => entry.schema = Some(schema),
            None => {
                let mut entry = RegistryEntry::new(name, identity);
                entry.schema = Some(schema);
                self.entries.insert(name.to_string(), entry);
            }
        }
        Ok(Schema::reference_to(name))
    }

    /// Forces `name` into the components section. Returns `false` if it is unknown.
    pub fn pin(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.pinned = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn reference_count(&self, name: &str) -> usize {
        self.entries.get(name).map(|e| e.references).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decides promotion and expands every body
    pub fn finalize(self) -> Result<ComponentSchemas> {
        let mut bodies = IndexMap::new();
        let mut promoted = HashSet::new();

        for (name, entry) in self.entries {
            let schema = entry.schema.ok_or_else(|| {
                Error::Internal(format!(
                    "schema `{}` was referenced but its body was never registered",
                    name
                ))
            })?;
            if entry.pinned || entry.references >= 2 {
                promoted.insert(name.clone());
            }
            bodies.insert(name, schema);
        }

        promote_inline_cycles(&bodies, &mut promoted);

        let mut schemas = IndexMap::new();
        let mut inlined = IndexMap::new();
        for (name, body) in &bodies {
            let mut body = body.clone();
            body.for_each_child_mut(&mut |child| inline_references(child, &bodies, &promoted));
            if promoted.contains(name) {
                schemas.insert(name.clone(), body);
            } else {
                inlined.insert(name.clone(), body);
            }
        }

        debug!(
            "Finalized registry: {} shared schemas, {} inlined",
            schemas.len(),
            inlined.len()
        );
        Ok(ComponentSchemas { schemas, inlined })
    }
}

/// A single-use type whose body reaches itself through other single-use types cannot
/// be inlined; the first such entry found on each cycle is promoted instead.
fn promote_inline_cycles(bodies: &IndexMap<String, Schema>, promoted: &mut HashSet<String>) {
    let mut done = HashSet::new();
    for name in bodies.keys() {
        let mut stack = Vec::new();
        visit(name, bodies, promoted, &mut stack, &mut done);
    }
}

fn visit(
    name: &str,
    bodies: &IndexMap<String, Schema>,
    promoted: &mut HashSet<String>,
    stack: &mut Vec<String>,
    done: &mut HashSet<String>,
) {
    if promoted.contains(name) || done.contains(name) {
        return;
    }
    if stack.iter().any(|n| n == name) {
        warn!("Schema {} is recursive and will be kept as a shared component", name);
        promoted.insert(name.to_string());
        return;
    }

    stack.push(name.to_string());
    if let Some(body) = bodies.get(name) {
        let mut references = Vec::new();
        body.collect_references(&mut references);
        for reference in references {
            if let Some(child) = reference.strip_prefix(COMPONENTS_PREFIX) {
                visit(child, bodies, promoted, stack, done);
            }
        }
    }
    stack.pop();
    done.insert(name.to_string());
}

fn inline_references(
    schema: &mut Schema,
    bodies: &IndexMap<String, Schema>,
    promoted: &HashSet<String>,
) {
    if let Some(name) = schema.reference_name() {
        match bodies.get(name) {
            Some(body) if !promoted.contains(name) => {
                let mut body = body.clone();
                body.for_each_child_mut(&mut |child| inline_references(child, bodies, promoted));
                substitute(schema, body);
            }
            _ => schema.description = None,
        }
        return;
    }
    schema.for_each_child_mut(&mut |child| inline_references(child, bodies, promoted));
}

/// Replaces a reference with `body`; a description set next to the reference, such as
/// a field's documentation, takes precedence over the body's own
fn substitute(schema: &mut Schema, mut body: Schema) {
    if let Some(description) = schema.description.take() {
        body.description = Some(description);
    }
    *schema = body;
}

/// The outcome of registry finalization
#[derive(Debug, Clone, Default)]
pub struct ComponentSchemas {
    /// Shared schemas, in order of first appearance
    schemas: IndexMap<String, Schema>,
    /// Fully expanded bodies of single-use schemas
    inlined: IndexMap<String, Schema>,
}

impl ComponentSchemas {
    /// Replaces every reference to a single-use schema inside `schema` with its body
    pub fn expand(&self, schema: &mut Schema) {
        if let Some(name) = schema.reference_name() {
            match self.inlined.get(name) {
                Some(body) => substitute(schema, body.clone()),
                None => schema.description = None,
            }
            return;
        }
        schema.for_each_child_mut(&mut |child| self.expand(child));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn schemas(&self) -> &IndexMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> IndexMap<String, Schema> {
        self.schemas
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_with(properties: Vec<(&str, Schema)>) -> Schema {
        Schema {
            schema_type: Some("object".to_string()),
            properties: Some(
                properties
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn track(registry: &mut SchemaRegistry, name: &str, body: Schema) -> Schema {
        if registry.occurrence(name, name).unwrap() {
            registry.register(name, name, body).unwrap()
        } else {
            Schema::reference_to(name)
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        let body = Schema::of_type("string", None);

        let first = registry.register("Job", "Job", body.clone()).unwrap();
        let second = registry
            .register("Job", "Job", Schema::of_type("integer", None))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.reference.as_deref(), Some("#/components/schemas/Job"));
        assert_eq!(registry.get("Job").unwrap().schema, Some(body));
        assert_eq!(registry.reference_count("Job"), 2);
    }

    #[test]
    fn test_naming_collision() {
        let mut registry = SchemaRegistry::new();
        registry.occurrence("Job", "jobs::Job").unwrap();
        let result = registry.occurrence("Job", "legacy::Job");

        match result {
            Err(Error::NamingCollision { first, second, .. }) => {
                assert_eq!(first, "jobs::Job");
                assert_eq!(second, "legacy::Job");
            }
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[test]
    fn test_register_keeps_the_declared_identity() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("Job", "jobs::Job", Schema::of_type("string", None))
            .unwrap();

        assert!(!registry.occurrence("Job", "jobs::Job").unwrap());
        assert_eq!(registry.reference_count("Job"), 2);
        assert!(matches!(
            registry.register("Job", "legacy::Job", Schema::default()),
            Err(Error::NamingCollision { .. })
        ));
    }

    #[test]
    fn test_field_description_moves_onto_inlined_body() {
        let mut registry = SchemaRegistry::new();
        let mut field = track(&mut registry, "Description", object_with(vec![]));
        field.description = Some("Additional information.".to_string());
        let mut format = track(&mut registry, "Format", Schema::of_type("string", None));
        track(&mut registry, "Format", Schema::default());
        format.description = Some("The representation format.".to_string());
        let job = track(
            &mut registry,
            "Job",
            object_with(vec![("description", field), ("format", format)]),
        );

        let components = registry.finalize().unwrap();
        let mut expanded = job;
        components.expand(&mut expanded);

        let properties = expanded.properties.unwrap();
        assert_eq!(
            properties["description"].description.as_deref(),
            Some("Additional information.")
        );
        assert_eq!(properties["description"].schema_type, Some("object".to_string()));
        assert_eq!(properties["format"], Schema::reference_to("Format"));
    }

    #[test]
    fn test_single_use_schema_is_inlined() {
        let mut registry = SchemaRegistry::new();
        let reference = track(&mut registry, "Description", Schema::of_type("string", None));

        let components = registry.finalize().unwrap();
        assert!(components.is_empty());

        let mut schema = Schema::array_of(reference);
        components.expand(&mut schema);
        assert_eq!(schema.items.unwrap().schema_type, Some("string".to_string()));
    }

    #[test]
    fn test_shared_schema_is_promoted() {
        let mut registry = SchemaRegistry::new();
        let body = object_with(vec![("id", Schema::of_type("string", Some("uuid")))]);
        track(&mut registry, "Job", body.clone());
        let reference = track(&mut registry, "Job", body.clone());

        let components = registry.finalize().unwrap();
        assert!(components.contains("Job"));
        assert_eq!(components.schemas()["Job"], body);

        let mut expanded = reference.clone();
        components.expand(&mut expanded);
        assert_eq!(expanded, reference);
    }

    #[test]
    fn test_pinned_schema_is_promoted() {
        let mut registry = SchemaRegistry::new();
        track(&mut registry, "Status", Schema::of_type("string", None));
        assert!(registry.pin("Status"));
        assert!(!registry.pin("Missing"));

        let components = registry.finalize().unwrap();
        assert!(components.contains("Status"));
    }

    #[test]
    fn test_nested_single_use_bodies_are_expanded() {
        let mut registry = SchemaRegistry::new();
        registry.occurrence("Job", "Job").unwrap();
        let inner = track(&mut registry, "Description", Schema::of_type("string", None));
        let job = registry
            .register("Job", "Job", object_with(vec![("description", inner)]))
            .unwrap();
        // a second use of Job, so it is shared while Description stays inlined
        track(&mut registry, "Job", Schema::default());

        let components = registry.finalize().unwrap();
        let body = &components.schemas()["Job"];
        let description = &body.properties.as_ref().unwrap()["description"];
        assert_eq!(description.schema_type, Some("string".to_string()));
        assert_eq!(job.reference_name(), Some("Job"));
    }

    #[test]
    fn test_single_use_cycle_is_promoted() {
        let mut registry = SchemaRegistry::new();
        registry.occurrence("A", "A").unwrap();
        registry.occurrence("B", "B").unwrap();
        registry
            .register("B", "B", object_with(vec![("a", Schema::reference_to("A"))]))
            .unwrap();
        registry
            .register("A", "A", object_with(vec![("b", Schema::reference_to("B"))]))
            .unwrap();

        let components = registry.finalize().unwrap();
        let promoted: Vec<&String> = components.schemas().keys().collect();
        assert_eq!(promoted.len(), 1);

        // whichever entry was promoted, the remaining references resolve
        let mut refs = Vec::new();
        for schema in components.schemas().values() {
            schema.collect_references(&mut refs);
        }
        for reference in refs {
            let name = reference.strip_prefix(COMPONENTS_PREFIX).unwrap();
            assert!(components.contains(name));
        }
    }

    #[test]
    fn test_reserved_but_unregistered_is_internal_error() {
        let mut registry = SchemaRegistry::new();
        registry.occurrence("Job", "Job").unwrap();

        assert!(matches!(registry.finalize(), Err(Error::Internal(_))));
    }
}
