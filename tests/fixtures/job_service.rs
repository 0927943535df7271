//! A job scheduling service described by interface traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Running,
    Stopped,
}

/// Possible representation formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "text/markdown")]
    Markdown,
}

/// A textual description as plain text or a well-known markup format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Description {
    /// The representation format for the text.
    pub format: Format,
    /// The text string.
    pub text: String,
}

/// A unit of execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: Uuid,
    /// Current job status.
    pub status: Status,
    /// The timestamp (in UTC) when the job was started.
    pub started_at: DateTime<Utc>,
    /// Additional information associated with the job.
    pub description: Description,
}

/// Acknowledges an asynchronous operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Uniquely identifies the job which the response corresponds to.
    pub id: Uuid,
    /// Textual description associated with the response.
    pub description: String,
}

/// Represents a real person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    /// The person's family name (typically last name).
    pub family_name: String,
    /// The person's given name (typically first name).
    pub given_name: String,
}

/// Raised when a referenced object does not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotFoundError {
    /// Identifier that was looked up.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Job management.
///
/// Operations to create, inspect, update and terminate jobs.
pub trait JobManagement {
    /// Creates a new job with the given data as input.
    ///
    /// :param items: A set of URLs to resources used to initiate the job.
    /// :returns: The unique identifier of the newly created job.
    fn create_job(&self, items: Vec<url::Url>) -> Uuid;

    /// Query status information about a job.
    ///
    /// :param job_id: Unique identifier for the job to query.
    /// :param format: Representation format of the job description.
    /// :returns: Status information about the job.
    /// :raises NotFoundError: The job does not exist.
    fn get_job(&self, #[path] job_id: Uuid, format: Format) -> Job;

    /// Terminates a job.
    ///
    /// :param job_id: Unique identifier for the job to terminate.
    fn remove_job(&mut self, #[path] job_id: Uuid);

    /// Updates information related to a job.
    ///
    /// May cause the job to be stopped and restarted.
    ///
    /// :param job_id: Unique identifier for the job to update.
    /// :param job: Data to update the job with.
    fn update_job(&mut self, #[path] job_id: Uuid, job: Job) -> Result<(), NotFoundError>;

    /// Provides status information about a job.
    fn get_status(&self, #[path] job_id: Uuid) -> StatusResponse;
}

/// Operations related to people.
pub trait PeopleCatalog {
    /// Find a person by their identifier.
    ///
    /// This operation has a custom route associated with it.
    #[webmethod(route = "/person/id/{id}")]
    fn get_person_by_id(&self, #[path] id: String) -> Person;

    /// Find a person by their name.
    ///
    /// This operation has a custom route associated with it.
    #[webmethod(
        route = "/person/name/{family}/{given}",
        public,
        response_example = r#"{"given_name": "Levente", "family_name": "Hunyadi", "age": 42}"#,
    )]
    fn get_person_by_name(&self, #[path] family: String, #[path] given: String) -> Person;
}

pub trait Endpoint: JobManagement + PeopleCatalog {}
