//! Static type introspection over parsed Rust sources.
//!
//! Traits declare interfaces and their methods declare members. Structs, enums and
//! type aliases become entries of the [`TypeCatalog`]. Everything is read from the
//! syntax tree; nothing is compiled or executed.
//!
//! Type identities are module-qualified (`jobs::model::Job`) so two types with the same
//! name in different modules stay distinct; the schema registry reports them as a
//! naming collision if both end up in one document.

pub mod members;
pub mod types;

use crate::descriptor::{InterfaceDescriptor, TypeCatalog};
use crate::parser::ParsedFile;
use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::{debug, info, warn};
use syn::visit::Visit;

pub use members::interface_from_trait;
pub use types::{doc_text, TypeMapper};

/// Interfaces and types found in a set of source files
#[derive(Debug, Default)]
pub struct Introspection {
    pub catalog: TypeCatalog,
    /// Interfaces in declaration order
    pub interfaces: Vec<InterfaceDescriptor>,
    /// Interface name → names of the traits it extends
    pub supertraits: IndexMap<String, Vec<String>>,
}

impl Introspection {
    /// Selects interfaces by name, expanding supertraits ahead of the trait itself.
    ///
    /// An empty selection returns every interface that declares at least one member.
    pub fn select(&self, names: &[String]) -> Result<Vec<InterfaceDescriptor>> {
        if names.is_empty() {
            return Ok(self
                .interfaces
                .iter()
                .filter(|i| !i.members.is_empty())
                .cloned()
                .collect());
        }

        let mut selected: Vec<InterfaceDescriptor> = Vec::new();
        for name in names {
            if !self.interfaces.iter().any(|i| &i.name == name) {
                bail!("Interface not found: {}", name);
            }
            self.collect(name, &mut selected, &mut Vec::new());
        }
        Ok(selected)
    }

    fn collect(&self, name: &str, selected: &mut Vec<InterfaceDescriptor>, visiting: &mut Vec<String>) {
        if visiting.iter().any(|v| v == name) || selected.iter().any(|i| i.name == name) {
            return;
        }
        visiting.push(name.to_string());
        if let Some(parents) = self.supertraits.get(name) {
            for parent in parents {
                self.collect(parent, selected, visiting);
            }
        }
        visiting.pop();

        if let Some(interface) = self.interfaces.iter().find(|i| i.name == name) {
            if !interface.members.is_empty() {
                selected.push(interface.clone());
            }
        }
    }
}

/// Declared type identities, used to resolve paths written in source
#[derive(Debug, Default)]
pub struct TypeIndex {
    identities: Vec<String>,
}

impl TypeIndex {
    pub fn new(identities: Vec<String>) -> Self {
        Self { identities }
    }

    fn contains(&self, identity: &str) -> bool {
        self.identities.iter().any(|i| i == identity)
    }

    /// Resolves a path as written inside `module` to a declared identity.
    ///
    /// `crate::`, `self::` and `super::` prefixes are honored. Other qualified paths
    /// match by suffix; bare names prefer the current module, then the first
    /// declaration with that name.
    pub fn resolve(&self, segments: &[String], module: &[String]) -> Option<String> {
        let (first, rest) = segments.split_first()?;

        match first.as_str() {
            "crate" => {
                let identity = rest.join("::");
                return self.contains(&identity).then_some(identity);
            }
            "self" | "super" => {
                let mut base = module.to_vec();
                let mut remaining = segments;
                while let Some((head, tail)) = remaining.split_first() {
                    match head.as_str() {
                        "self" => {}
                        "super" => {
                            base.pop();
                        }
                        _ => break,
                    }
                    remaining = tail;
                }
                base.extend(remaining.iter().cloned());
                let identity = base.join("::");
                return self.contains(&identity).then_some(identity);
            }
            _ => {}
        }

        let joined = segments.join("::");
        let local = if module.is_empty() {
            joined.clone()
        } else {
            format!("{}::{}", module.join("::"), joined)
        };
        if self.contains(&local) {
            return Some(local);
        }
        if self.contains(&joined) {
            return Some(joined);
        }

        let suffix = format!("::{}", joined);
        self.identities
            .iter()
            .find(|identity| identity.ends_with(&suffix))
            .cloned()
    }
}

/// Joins a module path and an item name into an identity
pub fn qualify(module: &[String], name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", module.join("::"), name)
    }
}

/// Declarations of one kind, each with the module it appears in
struct DeclarationCollector<'ast> {
    module: Vec<String>,
    structs: Vec<(Vec<String>, &'ast syn::ItemStruct)>,
    enums: Vec<(Vec<String>, &'ast syn::ItemEnum)>,
    aliases: Vec<(Vec<String>, &'ast syn::ItemType)>,
    traits: Vec<(Vec<String>, &'ast syn::ItemTrait)>,
}

impl<'ast> DeclarationCollector<'ast> {
    fn new() -> Self {
        Self {
            module: Vec::new(),
            structs: Vec::new(),
            enums: Vec::new(),
            aliases: Vec::new(),
            traits: Vec::new(),
        }
    }

    fn identities(&self) -> Vec<String> {
        let structs = self.structs.iter().map(|(m, i)| qualify(m, &i.ident.to_string()));
        let enums = self.enums.iter().map(|(m, i)| qualify(m, &i.ident.to_string()));
        let aliases = self.aliases.iter().map(|(m, i)| qualify(m, &i.ident.to_string()));
        structs.chain(enums).chain(aliases).collect()
    }
}

impl<'ast> Visit<'ast> for DeclarationCollector<'ast> {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if node.content.is_some() {
            self.module.push(node.ident.to_string());
            syn::visit::visit_item_mod(self, node);
            self.module.pop();
        }
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        debug!("Found struct: {}", node.ident);
        self.structs.push((self.module.clone(), node));
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        debug!("Found enum: {}", node.ident);
        self.enums.push((self.module.clone(), node));
    }

    fn visit_item_type(&mut self, node: &'ast syn::ItemType) {
        debug!("Found type alias: {}", node.ident);
        self.aliases.push((self.module.clone(), node));
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        debug!("Found trait: {}", node.ident);
        self.traits.push((self.module.clone(), node));
    }

    // items local to function bodies and impl blocks are not part of the API
    fn visit_item_fn(&mut self, _node: &'ast syn::ItemFn) {}

    fn visit_item_impl(&mut self, _node: &'ast syn::ItemImpl) {}
}

/// Builds the type catalog and interface list from parsed files
pub fn introspect(files: &[ParsedFile]) -> Result<Introspection> {
    let mut collector = DeclarationCollector::new();
    for file in files {
        collector.module = file.module_path.clone();
        collector.visit_file(&file.syntax_tree);
    }

    let index = TypeIndex::new(collector.identities());
    let mut introspection = Introspection::default();

    for (module, item) in &collector.structs {
        let mapper = TypeMapper::new(&index, module, &item.generics);
        for definition in types::struct_definitions(item, &qualify(module, &item.ident.to_string()), &mapper) {
            introspection.catalog.define(definition);
        }
    }
    for (module, item) in &collector.enums {
        let mapper = TypeMapper::new(&index, module, &item.generics);
        for definition in types::enum_definitions(item, &qualify(module, &item.ident.to_string()), &mapper) {
            introspection.catalog.define(definition);
        }
    }
    for (module, item) in &collector.aliases {
        let mapper = TypeMapper::new(&index, module, &item.generics);
        introspection
            .catalog
            .define(types::alias_definition(item, &qualify(module, &item.ident.to_string()), &mapper));
    }

    for (module, item) in &collector.traits {
        let name = item.ident.to_string();
        if introspection.interfaces.iter().any(|i| i.name == name) {
            warn!("Trait {} is declared more than once; keeping the first", name);
            continue;
        }
        let mapper = TypeMapper::new(&index, module, &item.generics);
        let interface = interface_from_trait(item, &mapper)?;

        let parents: Vec<String> = item
            .supertraits
            .iter()
            .filter_map(|bound| match bound {
                syn::TypeParamBound::Trait(t) => t.path.segments.last().map(|s| s.ident.to_string()),
                _ => None,
            })
            .collect();
        introspection.supertraits.insert(name, parents);
        introspection.interfaces.push(interface);
    }

    info!(
        "Introspected {} types and {} interfaces",
        introspection.catalog.len(),
        introspection.interfaces.len()
    );
    Ok(introspection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ParameterKind, TypeDefinition, TypeDescriptor};
    use std::path::Path;

    fn parse(path: &str, code: &str) -> ParsedFile {
        ParsedFile::from_source(Path::new(path), code).unwrap()
    }

    #[test]
    fn test_type_index_resolution() {
        let index = TypeIndex::new(vec![
            "jobs::Job".to_string(),
            "legacy::Job".to_string(),
            "model::Person".to_string(),
        ]);
        let path = |s: &str| s.split("::").map(String::from).collect::<Vec<_>>();
        let module = |s: &str| path(s);

        assert_eq!(index.resolve(&path("Job"), &module("legacy")), Some("legacy::Job".to_string()));
        assert_eq!(index.resolve(&path("Job"), &module("other")), Some("jobs::Job".to_string()));
        assert_eq!(
            index.resolve(&path("crate::model::Person"), &module("jobs")),
            Some("model::Person".to_string())
        );
        assert_eq!(
            index.resolve(&path("super::model::Person"), &module("jobs")),
            Some("model::Person".to_string())
        );
        assert_eq!(
            index.resolve(&path("legacy::Job"), &module("jobs")),
            Some("legacy::Job".to_string())
        );
        assert_eq!(index.resolve(&path("Missing"), &[]), None);
    }

    #[test]
    fn test_inline_modules_qualify_identities() {
        let file = parse(
            "src/lib.rs",
            r#"
            pub mod model {
                pub struct Job { pub id: String }
            }
            pub trait Jobs {
                fn get_job(&self, #[path] id: String) -> model::Job;
            }
            "#,
        );
        let result = introspect(&[file]).unwrap();

        assert!(matches!(
            result.catalog.get("model::Job"),
            Some(TypeDefinition::Composite(_))
        ));
        let member = &result.interfaces[0].members[0];
        assert_eq!(member.returns, TypeDescriptor::named("model::Job"));
        assert_eq!(member.parameters[0].kind, ParameterKind::PositionalOnly);
    }

    #[test]
    fn test_function_local_items_are_ignored() {
        let file = parse(
            "src/lib.rs",
            r#"
            fn helper() {
                struct Local { x: i32 }
            }
            impl Foo {
                fn new() -> Self { Foo }
            }
            pub struct Foo;
            "#,
        );
        let result = introspect(&[file]).unwrap();

        assert!(result.catalog.get("Local").is_none());
    }

    #[test]
    fn test_select_expands_supertraits() {
        let file = parse(
            "src/lib.rs",
            r#"
            pub trait JobManagement {
                fn get_job(&self, #[path] id: String) -> String;
            }
            pub trait PeopleCatalog {
                fn get_person(&self, #[path] id: String) -> String;
            }
            pub trait Endpoint: JobManagement + PeopleCatalog {}
            "#,
        );
        let result = introspect(&[file]).unwrap();

        let selected = result.select(&["Endpoint".to_string()]).unwrap();
        let names: Vec<&str> = selected.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["JobManagement", "PeopleCatalog"]);

        let all = result.select(&[]).unwrap();
        assert_eq!(all.len(), 2);

        assert!(result.select(&["Missing".to_string()]).is_err());
    }
}
