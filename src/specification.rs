//! OpenAPI document model.
//!
//! Plain serde types mirroring the parts of the OpenAPI 3 object model the generator
//! emits. Maps are insertion-ordered so output is deterministic.

use crate::schema_generator::Schema;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// OpenAPI Server object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Base URL of the API
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Location of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

/// OpenAPI Security Scheme object, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "apiKey")]
    ApiKey {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
    },
    #[serde(rename = "http")]
    Http {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        scheme: String,
        #[serde(
            rename = "bearerFormat",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        bearer_format: Option<String>,
    },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "openIdConnectUrl")]
        open_id_connect_url: String,
    },
}

/// Scheme name → required scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    /// GET operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    /// PUT operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    /// POST operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    /// DELETE operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    /// PATCH operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
}

impl PathItem {
    /// Iterates the operations present on this path in serialization order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [&self.get, &self.put, &self.post, &self.delete, &self.patch]
            .into_iter()
            .flatten()
    }

    pub fn operations_mut(&mut self) -> impl Iterator<Item = &mut Operation> {
        [
            &mut self.get,
            &mut self.put,
            &mut self.post,
            &mut self.delete,
            &mut self.patch,
        ]
        .into_iter()
        .flatten()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Operation summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Operation description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Operation ID
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body
    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: IndexMap<String, Response>,
    /// Overrides the document-level requirement; empty means no authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    /// Out-of-band requests the server makes to the client, keyed by callback name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub callbacks: IndexMap<String, Callback>,
}

/// OpenAPI Callback object: runtime expression → path item
pub type Callback = IndexMap<String, PathItem>;

impl Operation {
    /// Mutable access to every schema reachable from this operation, callbacks included
    pub fn schemas_mut(&mut self) -> Vec<&mut Schema> {
        let mut schemas: Vec<&mut Schema> = self.parameters.iter_mut().map(|p| &mut p.schema).collect();
        if let Some(body) = self.request_body.as_mut() {
            schemas.extend(body.content.values_mut().filter_map(|m| m.schema.as_mut()));
        }
        for response in self.responses.values_mut() {
            if let Some(content) = response.content.as_mut() {
                schemas.extend(content.values_mut().filter_map(|m| m.schema.as_mut()));
            }
        }
        for item in self.callbacks.values_mut().flat_map(|c| c.values_mut()) {
            for operation in item.operations_mut() {
                schemas.extend(operation.schemas_mut());
            }
        }
        schemas
    }

    /// Every schema reachable from this operation, callbacks included
    pub fn schemas(&self) -> Vec<&Schema> {
        let mut schemas: Vec<&Schema> = self.parameters.iter().map(|p| &p.schema).collect();
        if let Some(body) = self.request_body.as_ref() {
            schemas.extend(body.content.values().filter_map(|m| m.schema.as_ref()));
        }
        for response in self.responses.values() {
            if let Some(content) = response.content.as_ref() {
                schemas.extend(content.values().filter_map(|m| m.schema.as_ref()));
            }
        }
        for item in self.callbacks.values().flat_map(|c| c.values()) {
            for operation in item.operations() {
                schemas.extend(operation.schemas());
            }
        }
        schemas
    }
}

/// Where a parameter is carried in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Parameter description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the parameter is required
    pub required: bool,
    /// Parameter schema
    pub schema: Schema,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Request body description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the request body is required
    pub required: bool,
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    /// Schema for this media type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Single example payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    /// Named example payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<IndexMap<String, ExampleObject>>,
}

/// OpenAPI Example object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleObject {
    pub value: serde_json::Value,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response description
    pub description: String,
    /// Response content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Schema definitions
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Schema>,
    #[serde(
        rename = "securitySchemes",
        default,
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.security_schemes.is_empty()
    }
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Human-readable caption shown by documentation viewers
    #[serde(rename = "x-displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// API paths
    pub paths: IndexMap<String, PathItem>,
    /// Components (schemas, security schemes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl OpenApiDocument {
    /// Every `$ref` string in the document
    pub fn references(&self) -> Vec<String> {
        let mut references = Vec::new();
        for item in self.paths.values() {
            for operation in item.operations() {
                for schema in operation.schemas() {
                    schema.collect_references(&mut references);
                }
            }
        }
        if let Some(components) = &self.components {
            for schema in components.schemas.values() {
                schema.collect_references(&mut references);
            }
        }
        references
    }
}
