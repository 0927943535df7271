use crate::descriptor::component_name;
use crate::error::{Error, Result};
use crate::specification::{Info, SecurityScheme, Server};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

fn default_openapi_version() -> String {
    "3.0.3".to_string()
}

/// Generation options
///
/// Can be built in code or loaded from YAML:
///
/// ```yaml
/// server:
///   url: http://example.com/api
/// info:
///   title: Example API
///   version: 1.0.0
/// error_responses:
///   NotFoundError: 404
///   ValidationError: 4XX
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Base URL for the API endpoint
    pub server: Option<Server>,
    /// Meta-information for the document
    pub info: Info,
    /// Value of the top-level `openapi` field
    pub openapi_version: String,
    /// Security scheme applied to every operation that is not public
    pub default_security_scheme: Option<SecurityScheme>,
    /// Types emitted as components even if no operation references them
    pub extra_types: Vec<String>,
    /// Emit request and response examples
    pub use_examples: bool,
    /// Type name → status code of the success response
    pub success_responses: IndexMap<String, StatusCodeValue>,
    /// Type name → status code of the error response
    pub error_responses: IndexMap<String, StatusCodeValue>,
    /// Nest every error schema in an `{error: ...}` envelope
    pub error_wrapper: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            server: None,
            info: Info::default(),
            openapi_version: default_openapi_version(),
            default_security_scheme: None,
            extra_types: Vec::new(),
            use_examples: true,
            success_responses: IndexMap::new(),
            error_responses: IndexMap::new(),
            error_wrapper: false,
        }
    }
}

/// A status code as written by the user: `404`, `"404"`, `"4XX"` or `"default"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCodeValue {
    Number(i64),
    Text(String),
}

impl From<u16> for StatusCodeValue {
    fn from(code: u16) -> Self {
        StatusCodeValue::Number(i64::from(code))
    }
}

impl From<&str> for StatusCodeValue {
    fn from(code: &str) -> Self {
        StatusCodeValue::Text(code.to_string())
    }
}

impl StatusCodeValue {
    pub fn parse(&self) -> Result<StatusCode> {
        match self {
            StatusCodeValue::Number(n) => match u16::try_from(*n) {
                Ok(code) if (100..=599).contains(&code) => Ok(StatusCode::Exact(code)),
                _ => Err(Error::StatusCodeFormat(n.to_string())),
            },
            StatusCodeValue::Text(text) => text.parse(),
        }
    }
}

/// A validated response status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Exact(u16),
    /// A class pattern such as `4XX`; holds the leading digit
    Class(u8),
    Default,
}

impl StatusCode {
    pub const OK: StatusCode = StatusCode::Exact(200);
    pub const NO_CONTENT: StatusCode = StatusCode::Exact(204);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode::Exact(500);

    /// Standard reason phrase used as the default response description
    pub fn reason(&self) -> &'static str {
        match self {
            StatusCode::Exact(200) => "OK",
            StatusCode::Exact(201) => "Created",
            StatusCode::Exact(202) => "Accepted",
            StatusCode::Exact(204) => "No Content",
            StatusCode::Exact(400) => "Bad Request",
            StatusCode::Exact(401) => "Unauthorized",
            StatusCode::Exact(403) => "Forbidden",
            StatusCode::Exact(404) => "Not Found",
            StatusCode::Exact(409) => "Conflict",
            StatusCode::Exact(422) => "Unprocessable Entity",
            StatusCode::Exact(500) => "Internal Server Error",
            StatusCode::Exact(503) => "Service Unavailable",
            StatusCode::Exact(code) if *code < 400 => "Success",
            StatusCode::Exact(_) => "Error",
            StatusCode::Class(2) => "Success",
            StatusCode::Class(_) => "Error",
            StatusCode::Default => "Unexpected error",
        }
    }
}

impl FromStr for StatusCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("default") {
            return Ok(StatusCode::Default);
        }

        let bytes = trimmed.as_bytes();
        if bytes.len() == 3 && (b'1'..=b'5').contains(&bytes[0]) {
            let class = bytes[0] - b'0';
            if bytes[1..].iter().all(|b| b.eq_ignore_ascii_case(&b'x')) {
                return Ok(StatusCode::Class(class));
            }
            if bytes[1..].iter().all(u8::is_ascii_digit) {
                if let Ok(code) = trimmed.parse::<u16>() {
                    return Ok(StatusCode::Exact(code));
                }
            }
        }
        Err(Error::StatusCodeFormat(s.to_string()))
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Exact(code) => write!(f, "{}", code),
            StatusCode::Class(class) => write!(f, "{}XX", class),
            StatusCode::Default => f.write_str("default"),
        }
    }
}

/// Validated status code tables
#[derive(Debug, Clone, Default)]
pub struct ResponseCodes {
    pub success: IndexMap<String, StatusCode>,
    pub error: IndexMap<String, StatusCode>,
}

impl ResponseCodes {
    /// Status code for a type, matched by identity or by its last path segment
    pub fn success_for(&self, identity: &str) -> Option<StatusCode> {
        Self::find(&self.success, identity)
    }

    pub fn error_for(&self, identity: &str) -> Option<StatusCode> {
        Self::find(&self.error, identity)
    }

    fn find(table: &IndexMap<String, StatusCode>, identity: &str) -> Option<StatusCode> {
        if let Some(code) = table.get(identity) {
            return Some(*code);
        }
        let short = component_name(identity);
        table
            .iter()
            .find(|(type_name, _)| component_name(type_name) == short)
            .map(|(_, code)| *code)
    }
}

impl Options {
    /// Parse options from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let options: Options = serde_yaml::from_str(text)?;
        debug!("Loaded options for '{}'", options.info.title);
        Ok(options)
    }

    /// Load options from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Validate every configured status code
    pub fn response_codes(&self) -> Result<ResponseCodes> {
        let parse_table = |table: &IndexMap<String, StatusCodeValue>| -> Result<IndexMap<String, StatusCode>> {
            table
                .iter()
                .map(|(type_name, value)| Ok((type_name.clone(), value.parse()?)))
                .collect()
        };
        Ok(ResponseCodes {
            success: parse_table(&self.success_responses)?,
            error: parse_table(&self.error_responses)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::ApiKeyLocation;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_status_code_parsing() {
        assert_eq!("404".parse::<StatusCode>().unwrap(), StatusCode::Exact(404));
        assert_eq!("4XX".parse::<StatusCode>().unwrap(), StatusCode::Class(4));
        assert_eq!("5xx".parse::<StatusCode>().unwrap(), StatusCode::Class(5));
        assert_eq!("default".parse::<StatusCode>().unwrap(), StatusCode::Default);

        for invalid in ["4x", "600", "6XX", "abc", "40X", "", "0200"] {
            assert!(
                matches!(invalid.parse::<StatusCode>(), Err(Error::StatusCodeFormat(_))),
                "{} should be rejected",
                invalid
            );
        }
    }

    #[test]
    fn test_status_code_display() {
        assert_eq!(StatusCode::Exact(201).to_string(), "201");
        assert_eq!(StatusCode::Class(4).to_string(), "4XX");
        assert_eq!(StatusCode::Default.to_string(), "default");
    }

    #[test]
    fn test_numeric_status_code_range() {
        assert!(StatusCodeValue::Number(99).parse().is_err());
        assert!(StatusCodeValue::Number(600).parse().is_err());
        assert_eq!(
            StatusCodeValue::Number(201).parse().unwrap(),
            StatusCode::Exact(201)
        );
    }

    #[test]
    fn test_options_from_yaml() {
        let options = Options::from_yaml_str(
            r#"
server:
  url: http://example.com/api
info:
  title: Example API
  version: 2.0.0
default_security_scheme:
  type: apiKey
  name: X-API-Key
  in: header
extra_types: [Person]
success_responses:
  JobId: 201
error_responses:
  NotFoundError: "404"
  ValidationError: 4XX
error_wrapper: true
"#,
        )
        .unwrap();

        assert_eq!(options.server.as_ref().unwrap().url, "http://example.com/api");
        assert_eq!(options.info.title, "Example API");
        assert_eq!(options.openapi_version, "3.0.3");
        assert!(options.use_examples);
        assert!(options.error_wrapper);
        assert_eq!(options.extra_types, vec!["Person".to_string()]);
        assert!(matches!(
            options.default_security_scheme,
            Some(SecurityScheme::ApiKey {
                location: ApiKeyLocation::Header,
                ..
            })
        ));

        let codes = options.response_codes().unwrap();
        assert_eq!(codes.success_for("JobId"), Some(StatusCode::Exact(201)));
        assert_eq!(codes.error_for("errors::NotFoundError"), Some(StatusCode::Exact(404)));
        assert_eq!(codes.error_for("ValidationError"), Some(StatusCode::Class(4)));
        assert_eq!(codes.error_for("Other"), None);
    }

    #[test]
    fn test_invalid_status_code_is_rejected_up_front() {
        let mut options = Options::default();
        options
            .error_responses
            .insert("NotFoundError".to_string(), StatusCodeValue::from("4O4"));

        match options.response_codes() {
            Err(Error::StatusCodeFormat(code)) => assert_eq!(code, "4O4"),
            other => panic!("expected status code error, got {:?}", other),
        }
    }

    #[test]
    fn test_options_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "info:\n  title: From File\n  version: '1'\nuse_examples: false").unwrap();

        let options = Options::from_file(file.path()).unwrap();
        assert_eq!(options.info.title, "From File");
        assert!(!options.use_examples);
    }
}
