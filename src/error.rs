use thiserror::Error;

/// Result type alias for the generation engine
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a document build
#[derive(Debug, Error)]
pub enum Error {
    /// A type descriptor cannot be converted into a schema
    #[error("cannot generate schema for type `{type_name}`: {message}")]
    SchemaGeneration { type_name: String, message: String },

    /// Two distinct types claim the same component name
    #[error("component name `{name}` is claimed by both `{first}` and `{second}`")]
    NamingCollision {
        name: String,
        first: String,
        second: String,
    },

    /// A member function cannot be mapped onto an HTTP operation
    #[error("invalid signature for `{member}`: {message}")]
    Signature { member: String, message: String },

    /// A caller-supplied status code is neither numeric nor a class pattern
    #[error("invalid status code `{0}`: expected 100-599, a class pattern such as `4XX`, or `default`")]
    StatusCodeFormat(String),

    /// A `$ref` in the assembled document has no matching component
    #[error("unresolved reference `{0}` in assembled document")]
    UnresolvedReference(String),

    /// The registry was left in an inconsistent state
    #[error("internal error: {0}")]
    Internal(String),

    /// Reading a configuration file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be deserialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn schema<T: ToString, M: ToString>(type_name: T, message: M) -> Self {
        Self::SchemaGeneration {
            type_name: type_name.to_string(),
            message: message.to_string(),
        }
    }

    pub fn signature<T: ToString, M: ToString>(member: T, message: M) -> Self {
        Self::Signature {
            member: member.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}
