//! Maps one interface member onto one HTTP operation.
//!
//! The verb comes from the member name prefix, simple-typed parameters become path or
//! query parameters, the single composite parameter becomes the request body and the
//! return type plus documented error types become the responses.

use crate::descriptor::{
    Example, MemberDescriptor, ParameterDescriptor, ParameterKind, TypeDescriptor,
};
use crate::docstring::{self, DocumentationRecord};
use crate::error::{Error, Result};
use crate::example::shape_example;
use crate::options::{ResponseCodes, StatusCode};
use crate::schema_generator::{Schema, SchemaGenerator};
use crate::specification::{
    Callback, ExampleObject, MediaType, Operation, Parameter, ParameterLocation, PathItem,
    RequestBody, Response,
};
use indexmap::IndexMap;
use log::{debug, warn};
use std::fmt;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Runtime expression naming the URL a callback is delivered to
const CALLBACK_URL: &str = "{$request.query.url}";

/// HTTP method used to invoke an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Whether requests with this method conventionally carry a body
    pub fn carries_body(&self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name prefixes and the verbs they imply, matched in this order
const VERB_PREFIXES: &[(&str, HttpMethod)] = &[
    ("create", HttpMethod::Post),
    ("get", HttpMethod::Get),
    ("update", HttpMethod::Patch),
    ("remove", HttpMethod::Delete),
    ("delete", HttpMethod::Delete),
    ("set", HttpMethod::Put),
    ("post", HttpMethod::Post),
    ("put", HttpMethod::Post),
    ("do", HttpMethod::Get),
];

/// Splits a member name into its verb and the path identifier segment.
///
/// A prefix only counts when followed by `_`; names without a recognized prefix map
/// to POST with the whole name as identifier.
pub fn infer_verb(name: &str) -> (HttpMethod, &str) {
    for (prefix, method) in VERB_PREFIXES {
        if let Some(identifier) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return (*method, identifier);
        }
    }
    (HttpMethod::Post, name)
}

/// Extracts `{name}` placeholders from a route template, in order
pub fn route_placeholders(member: &str, route: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = route;

    while let Some(start) = rest.find(|c: char| c == '{' || c == '}') {
        if rest[start..].starts_with('}') {
            return Err(Error::signature(
                member,
                format!("unbalanced `}}` in route `{}`", route),
            ));
        }
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            Error::signature(member, format!("unterminated placeholder in route `{}`", route))
        })?;
        let name = &after[..end];
        if name.is_empty() || name.contains('{') {
            return Err(Error::signature(
                member,
                format!("malformed placeholder in route `{}`", route),
            ));
        }
        if names.iter().any(|n| n == name) {
            return Err(Error::signature(
                member,
                format!("placeholder `{{{}}}` appears twice in route `{}`", name, route),
            ));
        }
        names.push(name.to_string());
        rest = &after[end + 1..];
    }
    Ok(names)
}

/// One synthesized endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// Name of the member the operation was built from
    pub member: String,
    pub method: HttpMethod,
    pub path: String,
    /// Invocable without authentication
    pub public: bool,
    pub operation: Operation,
}

/// An error type bound to a member, keyed by catalog identity when known
struct ErrorBinding {
    type_name: String,
    identity: Option<String>,
    key: String,
    text: Option<String>,
}

/// Per-status accumulator; several error types may share a status code
#[derive(Default)]
struct PendingResponse {
    descriptions: Vec<String>,
    schemas: Vec<Schema>,
    /// (name, payload) pairs
    examples: Vec<(String, serde_json::Value)>,
    /// Descriptor used to shape examples
    shape: Option<TypeDescriptor>,
    wrapped: bool,
}

impl PendingResponse {
    fn describe(&mut self, description: String) {
        if !self.descriptions.contains(&description) {
            self.descriptions.push(description);
        }
    }
}

/// Operation Synthesizer
pub struct OperationSynthesizer<'a> {
    codes: &'a ResponseCodes,
    error_wrapper: bool,
    use_examples: bool,
}

impl<'a> OperationSynthesizer<'a> {
    /// Create a new OperationSynthesizer
    pub fn new(codes: &'a ResponseCodes, error_wrapper: bool, use_examples: bool) -> Self {
        Self {
            codes,
            error_wrapper,
            use_examples,
        }
    }

    /// Build the operation for one member of `interface`
    pub fn synthesize(
        &self,
        member: &MemberDescriptor,
        interface: &str,
        generator: &mut SchemaGenerator,
    ) -> Result<OperationDescriptor> {
        let doc = docstring::parse(member.documentation.as_deref().unwrap_or(""));
        let (verb, identifier) = infer_verb(&member.name);
        debug!("Synthesizing {}::{} as {}", interface, member.name, verb);

        let route_params = match &member.web_method.route {
            Some(route) => Some(route_placeholders(&member.name, route)?),
            None => None,
        };

        let (path_params, query_params, body_param) =
            Self::classify_parameters(member, generator, route_params.as_deref())?;

        let path = match &member.web_method.route {
            Some(route) => {
                Self::check_route(member, route, route_params.as_deref().unwrap_or(&[]), &path_params)?;
                route.clone()
            }
            None => {
                let mut path = format!("/{}", identifier);
                for param in &path_params {
                    path.push_str(&format!("/{{{}}}", param.name));
                }
                path
            }
        };

        let method = if body_param.is_some() && !verb.carries_body() {
            debug!("{} carries a body, escalating {} to POST", member.name, verb);
            HttpMethod::Post
        } else {
            verb
        };

        let mut parameters = Vec::new();
        for param in &path_params {
            parameters.push(Parameter {
                name: param.name.clone(),
                location: ParameterLocation::Path,
                description: doc.param(&param.name).map(String::from),
                required: true,
                schema: generator.generate_schema(param.ty.unwrap_optional())?,
            });
        }
        for param in &query_params {
            parameters.push(Parameter {
                name: param.name.clone(),
                location: ParameterLocation::Query,
                description: doc.param(&param.name).map(String::from),
                required: !param.ty.is_optional(),
                schema: generator.generate_schema(param.ty.unwrap_optional())?,
            });
        }

        let request_body = match body_param {
            Some(param) => Some(self.build_request_body(member, param, &doc, generator)?),
            None => None,
        };

        let responses = self.build_responses(member, &doc, generator)?;
        let callbacks = match &member.event {
            Some(_) => Self::build_callbacks(member, generator)?,
            None => IndexMap::new(),
        };

        let operation = Operation {
            tags: vec![interface.to_string()],
            summary: doc.summary.clone(),
            description: doc.description.clone(),
            operation_id: Some(member.name.clone()),
            parameters,
            request_body,
            responses,
            security: None,
            deprecated: member.web_method.deprecated.then_some(true),
            callbacks,
        };

        Ok(OperationDescriptor {
            member: member.name.clone(),
            method,
            path,
            public: member.web_method.public,
            operation,
        })
    }

    /// Splits parameters into (path, query, body)
    fn classify_parameters<'m>(
        member: &'m MemberDescriptor,
        generator: &SchemaGenerator,
        route_params: Option<&[String]>,
    ) -> Result<(
        Vec<&'m ParameterDescriptor>,
        Vec<&'m ParameterDescriptor>,
        Option<&'m ParameterDescriptor>,
    )> {
        let in_route = |name: &str| route_params.map_or(false, |r| r.iter().any(|p| p == name));

        let mut path_params = Vec::new();
        let mut query_params = Vec::new();
        let mut body_param: Option<&ParameterDescriptor> = None;

        for param in &member.parameters {
            if generator.is_simple(&param.ty) {
                if param.kind == ParameterKind::PositionalOnly {
                    path_params.push(param);
                } else {
                    if in_route(&param.name) {
                        return Err(Error::signature(
                            &member.name,
                            format!("query parameter `{}` appears in the route", param.name),
                        ));
                    }
                    query_params.push(param);
                }
            } else {
                if in_route(&param.name) {
                    return Err(Error::signature(
                        &member.name,
                        format!(
                            "parameter `{}` of composite type `{}` appears in the route",
                            param.name,
                            param.ty.display_name()
                        ),
                    ));
                }
                if let Some(existing) = body_param {
                    return Err(Error::signature(
                        &member.name,
                        format!(
                            "only one composite parameter is permitted but found `{}` and `{}`",
                            existing.name, param.name
                        ),
                    ));
                }
                body_param = Some(param);
            }
        }

        Ok((path_params, query_params, body_param))
    }

    /// Placeholders must name exactly the path parameters, in declaration order
    fn check_route(
        member: &MemberDescriptor,
        route: &str,
        placeholders: &[String],
        path_params: &[&ParameterDescriptor],
    ) -> Result<()> {
        for param in path_params {
            if !placeholders.contains(&param.name) {
                return Err(Error::signature(
                    &member.name,
                    format!(
                        "path parameter `{}` is absent from route `{}`",
                        param.name, route
                    ),
                ));
            }
        }
        for placeholder in placeholders {
            if !path_params.iter().any(|p| &p.name == placeholder) {
                return Err(Error::signature(
                    &member.name,
                    format!(
                        "route placeholder `{{{}}}` matches no path parameter",
                        placeholder
                    ),
                ));
            }
        }
        let in_order = placeholders
            .iter()
            .zip(path_params.iter())
            .all(|(placeholder, param)| placeholder == &param.name);
        if !in_order {
            return Err(Error::signature(
                &member.name,
                format!(
                    "route `{}` lists path parameters in a different order than the signature",
                    route
                ),
            ));
        }
        Ok(())
    }

    fn build_request_body(
        &self,
        member: &MemberDescriptor,
        param: &ParameterDescriptor,
        doc: &DocumentationRecord,
        generator: &mut SchemaGenerator,
    ) -> Result<RequestBody> {
        let body_type = param.ty.unwrap_optional();
        let mut media = MediaType {
            schema: Some(generator.generate_schema(body_type)?),
            ..Default::default()
        };

        if self.use_examples {
            let examples: Vec<(String, serde_json::Value)> = member
                .web_method
                .request_examples
                .iter()
                .enumerate()
                .map(|(i, example)| {
                    (
                        example_name(example, i),
                        shape_example(&example.value, body_type, generator.catalog()),
                    )
                })
                .collect();
            attach_examples(&mut media, examples);
        }

        Ok(RequestBody {
            description: doc.param(&param.name).map(String::from),
            required: !param.ty.is_optional(),
            content: IndexMap::from([(JSON_CONTENT_TYPE.to_string(), media)]),
        })
    }

    /// The final result of a streaming member is posted back to the URL the client
    /// supplied with the request
    fn build_callbacks(
        member: &MemberDescriptor,
        generator: &mut SchemaGenerator,
    ) -> Result<IndexMap<String, Callback>> {
        let request_body = match &member.returns {
            TypeDescriptor::Unit => None,
            returns => Some(RequestBody {
                description: None,
                required: true,
                content: IndexMap::from([(
                    JSON_CONTENT_TYPE.to_string(),
                    MediaType {
                        schema: Some(generator.generate_schema(returns)?),
                        ..Default::default()
                    },
                )]),
            }),
        };
        let delivery = Operation {
            tags: Vec::new(),
            summary: None,
            description: None,
            operation_id: None,
            parameters: Vec::new(),
            request_body,
            responses: IndexMap::from([(
                StatusCode::OK.to_string(),
                Response {
                    description: StatusCode::OK.reason().to_string(),
                    content: None,
                },
            )]),
            security: None,
            deprecated: None,
            callbacks: IndexMap::new(),
        };

        let callback = IndexMap::from([(
            CALLBACK_URL.to_string(),
            PathItem {
                post: Some(delivery),
                ..Default::default()
            },
        )]);
        Ok(IndexMap::from([(format!("{}_callback", member.name), callback)]))
    }

    fn build_responses(
        &self,
        member: &MemberDescriptor,
        doc: &DocumentationRecord,
        generator: &mut SchemaGenerator,
    ) -> Result<IndexMap<String, Response>> {
        let mut pending: IndexMap<String, PendingResponse> = IndexMap::new();

        // success; a streaming member answers with its events
        let payload = member.event.as_ref().unwrap_or(&member.returns);
        let success_code = match payload {
            TypeDescriptor::Unit => StatusCode::NO_CONTENT,
            TypeDescriptor::Named(identity) => self
                .codes
                .success_for(identity)
                .unwrap_or(StatusCode::OK),
            _ => StatusCode::OK,
        };
        let success_key = success_code.to_string();
        {
            let success = pending.entry(success_key.clone()).or_default();
            success.describe(
                doc.returns
                    .clone()
                    .unwrap_or_else(|| success_code.reason().to_string()),
            );
            if *payload != TypeDescriptor::Unit {
                success.schemas.push(generator.generate_schema(payload)?);
                success.shape = Some(payload.clone());
            }
        }

        // errors, documented first, then declared in the signature; the same type named
        // bare in documentation and qualified in the signature is one binding
        let mut bindings: Vec<ErrorBinding> = Vec::new();
        let documented = doc.raises.iter().map(|(name, text)| (name, Some(text)));
        let declared = member.declared_errors.iter().map(|name| (name, None));
        for (type_name, text) in documented.chain(declared) {
            let identity = generator
                .catalog()
                .lookup(type_name)
                .map(|definition| definition.identity().to_string());
            let key = identity.clone().unwrap_or_else(|| type_name.clone());
            let text = text.filter(|text| !text.is_empty()).cloned();
            match bindings.iter_mut().find(|binding| binding.key == key) {
                Some(binding) => {
                    if binding.text.is_none() {
                        binding.text = text;
                    }
                }
                None => bindings.push(ErrorBinding {
                    type_name: type_name.clone(),
                    identity,
                    key,
                    text,
                }),
            }
        }

        let mut error_keys: Vec<(String, String)> = Vec::new();
        for binding in bindings {
            let ErrorBinding {
                type_name,
                identity,
                text,
                ..
            } = binding;
            let type_name = type_name.as_str();
            let code = self
                .codes
                .error_for(identity.as_deref().unwrap_or(type_name))
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let key = code.to_string();
            if key == success_key {
                return Err(Error::signature(
                    &member.name,
                    format!(
                        "error type `{}` maps to status {} which is already the success response",
                        type_name, key
                    ),
                ));
            }

            let description = text.unwrap_or_else(|| code.reason().to_string());

            let schema = match &identity {
                Some(identity) => {
                    let schema = generator.generate_schema(&TypeDescriptor::named(identity.clone()))?;
                    Some(if self.error_wrapper {
                        wrap_error(schema)
                    } else {
                        schema
                    })
                }
                None => {
                    warn!(
                        "Error type {} of {} has no type definition; response will have no content",
                        type_name, member.name
                    );
                    None
                }
            };

            let response = pending.entry(key.clone()).or_default();
            response.describe(description);
            if let Some(schema) = schema {
                if !response.schemas.contains(&schema) {
                    response.schemas.push(schema);
                }
                if response.shape.is_none() {
                    response.shape = identity.clone().map(TypeDescriptor::named);
                    response.wrapped = self.error_wrapper;
                }
            }
            error_keys.push((component_key(type_name), key));
        }

        if self.use_examples {
            for (i, example) in member.web_method.response_examples.iter().enumerate() {
                let target = example
                    .type_name
                    .as_deref()
                    .and_then(|name| {
                        let name = component_key(name);
                        error_keys.iter().find(|(error, _)| *error == name)
                    })
                    .map(|(_, key)| key.clone())
                    .unwrap_or_else(|| success_key.clone());

                let Some(response) = pending.get_mut(&target) else {
                    continue;
                };
                let Some(shape) = response.shape.clone() else {
                    warn!(
                        "Dropping response example of {}: status {} has no content",
                        member.name, target
                    );
                    continue;
                };
                let mut value = shape_example(&example.value, &shape, generator.catalog());
                if response.wrapped {
                    value = serde_json::json!({ "error": value });
                }
                response.examples.push((example_name(example, i), value));
            }
        }

        Ok(pending
            .into_iter()
            .map(|(code, pending)| (code, finish_response(pending)))
            .collect())
    }
}

fn component_key(name: &str) -> String {
    crate::descriptor::component_name(name).to_string()
}

fn example_name(example: &Example, index: usize) -> String {
    match &example.type_name {
        Some(name) => format!("{}{}", component_key(name), index + 1),
        None => format!("example{}", index + 1),
    }
}

/// `{error: <schema>}` envelope
fn wrap_error(schema: Schema) -> Schema {
    Schema {
        schema_type: Some("object".to_string()),
        properties: Some(IndexMap::from([("error".to_string(), schema)])),
        required: Some(vec!["error".to_string()]),
        ..Default::default()
    }
}

/// One example is emitted inline, several as named examples
fn attach_examples(media: &mut MediaType, mut examples: Vec<(String, serde_json::Value)>) {
    match examples.len() {
        0 => {}
        1 => media.example = examples.pop().map(|(_, value)| value),
        _ => {
            media.examples = Some(
                examples
                    .into_iter()
                    .map(|(name, value)| (name, ExampleObject { value }))
                    .collect(),
            )
        }
    }
}

fn finish_response(mut pending: PendingResponse) -> Response {
    let schema = match pending.schemas.len() {
        0 => None,
        1 => pending.schemas.pop(),
        _ => Some(Schema {
            one_of: Some(pending.schemas),
            ..Default::default()
        }),
    };

    let content = schema.map(|schema| {
        let mut media = MediaType {
            schema: Some(schema),
            ..Default::default()
        };
        attach_examples(&mut media, pending.examples);
        IndexMap::from([(JSON_CONTENT_TYPE.to_string(), media)])
    });

    Response {
        description: pending.descriptions.join("\n\n"),
        content,
    }
}
