use crate::descriptor::{InterfaceDescriptor, MemberDescriptor, TypeCatalog, TypeDescriptor};
use crate::docstring;
use crate::error::{Error, Result};
use crate::operation::{HttpMethod, OperationDescriptor, OperationSynthesizer};
use crate::options::{Options, ResponseCodes};
use crate::registry::COMPONENTS_PREFIX;
use crate::schema_generator::SchemaGenerator;
use crate::specification::{Components, OpenApiDocument, PathItem, SecurityRequirement, Tag};
use indexmap::IndexMap;
use log::{debug, info, warn};

/// Name under which the default security scheme is published
pub const DEFAULT_SECURITY_SCHEME: &str = "Default";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    options: Options,
    /// Status code tables validated up front
    codes: ResponseCodes,
    /// Paths collection (URL path -> PathItem)
    paths: IndexMap<String, PathItem>,
    /// One tag per interface, in order of appearance
    tags: Vec<Tag>,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder; fails if a configured status code is malformed
    pub fn new(options: Options) -> Result<Self> {
        debug!("Initializing OpenApiBuilder");
        let codes = options.response_codes()?;
        Ok(Self {
            options,
            codes,
            paths: IndexMap::new(),
            tags: Vec::new(),
        })
    }

    /// Add every member of an interface, tagging the operations with the interface name
    pub fn add_interface(
        &mut self,
        interface: &InterfaceDescriptor,
        generator: &mut SchemaGenerator,
    ) -> Result<()> {
        debug!(
            "Adding interface {} with {} members",
            interface.name,
            interface.members.len()
        );

        if !self.tags.iter().any(|t| t.name == interface.name) {
            let doc = docstring::parse(interface.documentation.as_deref().unwrap_or(""));
            self.tags.push(Tag {
                name: interface.name.clone(),
                description: doc.description,
                display_name: doc.summary,
            });
        }

        for member in &interface.members {
            self.add_member(member, &interface.name, generator)?;
        }

        // events travel outside of any operation, so nothing else would reference them
        for event in &interface.events {
            match event {
                TypeDescriptor::Named(identity) => {
                    generator.generate_extra_type(identity)?;
                }
                other => warn!(
                    "Event {} of {} is not a declared type and is not documented",
                    other.display_name(),
                    interface.name
                ),
            }
        }
        Ok(())
    }

    /// Add a single member as an operation
    pub fn add_member(
        &mut self,
        member: &MemberDescriptor,
        interface: &str,
        generator: &mut SchemaGenerator,
    ) -> Result<()> {
        let synthesizer = OperationSynthesizer::new(
            &self.codes,
            self.options.error_wrapper,
            self.options.use_examples,
        );
        let descriptor = synthesizer.synthesize(member, interface, generator)?;
        self.insert_operation(descriptor)
    }

    fn insert_operation(&mut self, descriptor: OperationDescriptor) -> Result<()> {
        let OperationDescriptor {
            member,
            method,
            path,
            public,
            mut operation,
        } = descriptor;
        debug!("Adding operation: {} {}", method, path);

        if public && self.options.default_security_scheme.is_some() {
            operation.security = Some(Vec::new());
        }

        let path_item = self.paths.entry(path.clone()).or_default();
        let slot = match method {
            HttpMethod::Get => &mut path_item.get,
            HttpMethod::Put => &mut path_item.put,
            HttpMethod::Post => &mut path_item.post,
            HttpMethod::Delete => &mut path_item.delete,
            HttpMethod::Patch => &mut path_item.patch,
        };

        if let Some(existing) = slot {
            return Err(Error::signature(
                member,
                format!(
                    "`{} {}` is already defined by `{}`",
                    method,
                    path,
                    existing.operation_id.as_deref().unwrap_or("another member")
                ),
            ));
        }
        *slot = Some(operation);
        Ok(())
    }

    /// Build the final OpenAPI document
    pub fn build(self, mut generator: SchemaGenerator) -> Result<OpenApiDocument> {
        debug!("Building final OpenAPI document");

        for extra in &self.options.extra_types {
            generator.generate_extra_type(extra)?;
        }

        let component_schemas = generator.into_registry().finalize()?;

        let mut paths = self.paths;
        for item in paths.values_mut() {
            for operation in item.operations_mut() {
                for schema in operation.schemas_mut() {
                    component_schemas.expand(schema);
                }
            }
        }

        let mut security_schemes = IndexMap::new();
        let mut security: Vec<SecurityRequirement> = Vec::new();
        if let Some(scheme) = self.options.default_security_scheme {
            security_schemes.insert(DEFAULT_SECURITY_SCHEME.to_string(), scheme);
            security.push(IndexMap::from([(
                DEFAULT_SECURITY_SCHEME.to_string(),
                Vec::new(),
            )]));
        }

        let components = Components {
            schemas: component_schemas.into_schemas(),
            security_schemes,
        };

        let document = OpenApiDocument {
            openapi: self.options.openapi_version,
            info: self.options.info,
            servers: self.options.server.into_iter().collect(),
            paths,
            components: if components.is_empty() {
                None
            } else {
                Some(components)
            },
            security,
            tags: self.tags,
        };

        Self::verify_references(&document)?;
        info!(
            "Assembled document with {} paths and {} component schemas",
            document.paths.len(),
            document
                .components
                .as_ref()
                .map(|c| c.schemas.len())
                .unwrap_or(0)
        );
        Ok(document)
    }

    /// Every `$ref` must point at a schema in the components section
    fn verify_references(document: &OpenApiDocument) -> Result<()> {
        let schemas = document.components.as_ref().map(|c| &c.schemas);
        for reference in document.references() {
            let resolved = reference
                .strip_prefix(COMPONENTS_PREFIX)
                .zip(schemas)
                .map_or(false, |(name, schemas)| schemas.contains_key(name));
            if !resolved {
                return Err(Error::UnresolvedReference(reference));
            }
        }
        Ok(())
    }
}

/// Assembles a document from interfaces and the catalog of types they use
pub fn assemble(
    interfaces: &[InterfaceDescriptor],
    catalog: TypeCatalog,
    options: Options,
) -> Result<OpenApiDocument> {
    let mut builder = OpenApiBuilder::new(options)?;
    let mut generator = SchemaGenerator::new(catalog);
    for interface in interfaces {
        builder.add_interface(interface, &mut generator)?;
    }
    builder.build(generator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        CompositeType, EnumerationType, Field, ParameterDescriptor, PrimitiveKind,
    };
    use crate::options::StatusCodeValue;
    use crate::specification::{ApiKeyLocation, SecurityScheme, Server};
    use pretty_assertions::assert_eq;

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with(EnumerationType::of_strings("Status", ["created", "running", "stopped"]))
            .with(
                CompositeType::new("Job")
                    .field(Field::new("id", TypeDescriptor::primitive(PrimitiveKind::Uuid)))
                    .field(Field::new("status", TypeDescriptor::named("Status"))),
            )
            .with(
                CompositeType::new("Person")
                    .field(Field::new("family", TypeDescriptor::string()))
                    .field(Field::new("given", TypeDescriptor::string())),
            )
    }

    fn jobs() -> InterfaceDescriptor {
        let mut interface = InterfaceDescriptor::new("JobManagement")
            .member(
                MemberDescriptor::new("get_job", TypeDescriptor::named("Job"))
                    .param(ParameterDescriptor::path(
                        "job_id",
                        TypeDescriptor::primitive(PrimitiveKind::Uuid),
                    )),
            )
            .member(
                MemberDescriptor::new("update_job", TypeDescriptor::Unit)
                    .param(ParameterDescriptor::path(
                        "job_id",
                        TypeDescriptor::primitive(PrimitiveKind::Uuid),
                    ))
                    .param(ParameterDescriptor::keyword("job", TypeDescriptor::named("Job"))),
            )
            .member(
                MemberDescriptor::new("get_status", TypeDescriptor::named("Status"))
                    .param(ParameterDescriptor::path(
                        "job_id",
                        TypeDescriptor::primitive(PrimitiveKind::Uuid),
                    )),
            );
        interface.documentation = Some("Job management\n\nCreates, queries and removes jobs.".to_string());
        interface
    }

    #[test]
    fn test_new_builder_validates_codes() {
        let mut options = Options::default();
        options
            .error_responses
            .insert("NotFoundError".to_string(), StatusCodeValue::from("four"));

        assert!(matches!(
            OpenApiBuilder::new(options),
            Err(Error::StatusCodeFormat(_))
        ));
    }

    #[test]
    fn test_shared_and_single_use_schemas() {
        let document = assemble(&[jobs()], catalog(), Options::default()).unwrap();

        let components = document.components.unwrap();
        // Job is used twice, Status once inside Job and once as a return value
        let names: Vec<&String> = components.schemas.keys().collect();
        assert_eq!(names, vec!["Job", "Status"]);

        let path = &document.paths["/job/{job_id}"];
        assert!(path.get.is_some());
        assert!(path.patch.is_some());
    }

    #[test]
    fn test_single_use_schema_is_inlined_into_operation() {
        let interface = InterfaceDescriptor::new("PeopleCatalog").member(
            MemberDescriptor::new("get_person_by_name", TypeDescriptor::named("Person"))
                .param(ParameterDescriptor::path("family", TypeDescriptor::string()))
                .param(ParameterDescriptor::path("given", TypeDescriptor::string()))
                .route("/person/name/{family}/{given}"),
        );
        let document = assemble(&[interface], catalog(), Options::default()).unwrap();

        assert!(document.components.is_none());
        let operation = document.paths["/person/name/{family}/{given}"]
            .get
            .as_ref()
            .unwrap();
        let schema = operation.responses["200"].content.as_ref().unwrap()["application/json"]
            .schema
            .as_ref()
            .unwrap();
        assert_eq!(schema.schema_type, Some("object".to_string()));
        assert!(schema.properties.as_ref().unwrap().contains_key("family"));
    }

    #[test]
    fn test_events_and_callbacks() {
        let interface = InterfaceDescriptor::new("Jobs")
            .member(
                MemberDescriptor::new("run_job", TypeDescriptor::named("Job"))
                    .streams(TypeDescriptor::named("Person")),
            )
            .event(TypeDescriptor::named("Status"))
            .event(TypeDescriptor::string());
        let document = assemble(&[interface], catalog(), Options::default()).unwrap();

        // Status is declared as an event; Person and Job are used once each
        let components = document.components.as_ref().unwrap();
        let names: Vec<&String> = components.schemas.keys().collect();
        assert_eq!(names, vec!["Status"]);

        let operation = document.paths["/run_job"].post.as_ref().unwrap();
        let streamed = operation.responses["200"].content.as_ref().unwrap()["application/json"]
            .schema
            .as_ref()
            .unwrap();
        assert!(streamed.properties.as_ref().unwrap().contains_key("family"));

        let delivery = operation.callbacks["run_job_callback"]["{$request.query.url}"]
            .post
            .as_ref()
            .unwrap();
        let body = delivery.request_body.as_ref().unwrap().content["application/json"]
            .schema
            .as_ref()
            .unwrap();
        assert_eq!(body.schema_type, Some("object".to_string()));
        assert_eq!(
            body.properties.as_ref().unwrap()["status"].reference_name(),
            Some("Status")
        );
    }

    #[test]
    fn test_extra_types_are_promoted() {
        let options = Options {
            extra_types: vec!["Person".to_string()],
            ..Default::default()
        };
        let document = assemble(&[], catalog(), options).unwrap();

        let components = document.components.unwrap();
        assert!(components.schemas.contains_key("Person"));
        assert!(document.paths.is_empty());
    }

    #[test]
    fn test_duplicate_path_and_verb_fails() {
        let interface = InterfaceDescriptor::new("Jobs")
            .member(MemberDescriptor::new("get_job", TypeDescriptor::named("Job")))
            .member(MemberDescriptor::new("do_job", TypeDescriptor::named("Job")));

        match assemble(&[interface], catalog(), Options::default()) {
            Err(Error::Signature { member, message }) => {
                assert_eq!(member, "do_job");
                assert!(message.contains("get_job"));
            }
            other => panic!("expected signature error, got {:?}", other),
        }
    }

    #[test]
    fn test_naming_collision_across_modules() {
        let catalog = TypeCatalog::new()
            .with(CompositeType::new("jobs::Job").field(Field::new("id", TypeDescriptor::string())))
            .with(CompositeType::new("legacy::Job").field(Field::new("name", TypeDescriptor::string())));
        let interface = InterfaceDescriptor::new("Jobs")
            .member(MemberDescriptor::new("get_job", TypeDescriptor::named("jobs::Job")))
            .member(MemberDescriptor::new("get_legacy_job", TypeDescriptor::named("legacy::Job")));

        assert!(matches!(
            assemble(&[interface], catalog, Options::default()),
            Err(Error::NamingCollision { .. })
        ));
    }

    #[test]
    fn test_security_server_and_tags() {
        let options = Options {
            server: Some(Server {
                url: "http://example.com/api".to_string(),
                description: None,
            }),
            default_security_scheme: Some(SecurityScheme::ApiKey {
                description: None,
                name: "X-API-Key".to_string(),
                location: ApiKeyLocation::Header,
            }),
            ..Default::default()
        };
        let mut interface = jobs();
        interface.members[2].web_method.public = true;
        let document = assemble(&[interface], catalog(), options).unwrap();

        assert_eq!(document.openapi, "3.0.3");
        assert_eq!(document.servers[0].url, "http://example.com/api");
        assert_eq!(document.security.len(), 1);
        assert!(document.security[0].contains_key("Default"));
        assert!(document
            .components
            .as_ref()
            .unwrap()
            .security_schemes
            .contains_key("Default"));

        let public = document.paths["/status/{job_id}"].get.as_ref().unwrap();
        assert_eq!(public.security, Some(vec![]));
        let private = document.paths["/job/{job_id}"].get.as_ref().unwrap();
        assert!(private.security.is_none());

        assert_eq!(document.tags.len(), 1);
        assert_eq!(document.tags[0].name, "JobManagement");
        assert_eq!(document.tags[0].display_name.as_deref(), Some("Job management"));
        assert_eq!(
            document.tags[0].description.as_deref(),
            Some("Creates, queries and removes jobs.")
        );
    }

    #[test]
    fn test_every_reference_resolves() {
        let catalog = catalog().with(
            CompositeType::new("Node")
                .field(Field::new("value", TypeDescriptor::string()))
                .field(Field::new(
                    "next",
                    TypeDescriptor::optional(TypeDescriptor::named("Node")),
                )
                .optional()),
        );
        let interface = jobs().member(MemberDescriptor::new("get_node", TypeDescriptor::named("Node")));
        let document = assemble(&[interface], catalog, Options::default()).unwrap();

        let schemas = &document.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key("Node"));
        for reference in document.references() {
            let name = reference.strip_prefix(COMPONENTS_PREFIX).unwrap();
            assert!(schemas.contains_key(name), "{} does not resolve", reference);
        }
    }

    #[test]
    fn test_body_never_travels_with_get() {
        let document = assemble(&[jobs()], catalog(), Options::default()).unwrap();
        for item in document.paths.values() {
            if let Some(get) = &item.get {
                assert!(get.request_body.is_none());
            }
        }
    }
}
