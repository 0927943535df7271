//! Structured documentation extraction.
//!
//! Member documentation follows the reStructuredText field-list convention:
//!
//! ```text
//! Fetches a job.
//!
//! Jobs are looked up by identifier.
//!
//! :param job_id: Identifier of the job.
//! :returns: The job with all its items.
//! :raises NotFoundError: No job with the identifier exists.
//! ```
//!
//! Parsing never fails. Lines that look like markers but are not recognized are kept
//! as running text.

use indexmap::IndexMap;
use log::debug;

const PARAM_MARKERS: &[&str] = &["param", "parameter", "arg", "argument", "key", "keyword"];
const RETURN_MARKERS: &[&str] = &["returns", "return"];
const RAISE_MARKERS: &[&str] = &["raises", "raise", "except", "exception", "throws"];

/// Parsed documentation of a member or interface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentationRecord {
    /// First paragraph of the leading text
    pub summary: Option<String>,
    /// Remaining paragraphs of the leading text
    pub description: Option<String>,
    /// Parameter name → description
    pub params: IndexMap<String, String>,
    pub returns: Option<String>,
    /// Error type name → description
    pub raises: IndexMap<String, String>,
}

impl DocumentationRecord {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.params.is_empty()
            && self.returns.is_none()
            && self.raises.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Param(String),
    Returns,
    Raises(String),
}

/// Parses raw documentation text into a [`DocumentationRecord`]
pub fn parse(raw: &str) -> DocumentationRecord {
    let mut record = DocumentationRecord::default();
    let mut leading: Vec<&str> = Vec::new();
    let mut current: Option<(Field, String)> = None;

    for line in raw.lines().map(str::trim) {
        if let Some((field, rest)) = parse_marker(line) {
            if let Some((field, text)) = current.take() {
                store(&mut record, field, text);
            }
            current = Some((field, rest.to_string()));
            continue;
        }

        match current.as_mut() {
            Some((_, text)) => {
                if !line.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(line);
                }
            }
            None => leading.push(line),
        }
    }
    if let Some((field, text)) = current.take() {
        store(&mut record, field, text);
    }

    let mut paragraphs = split_paragraphs(&leading).into_iter();
    record.summary = paragraphs.next();
    let rest: Vec<String> = paragraphs.collect();
    if !rest.is_empty() {
        record.description = Some(rest.join("\n\n"));
    }

    debug!(
        "Parsed documentation: {} params, {} errors",
        record.params.len(),
        record.raises.len()
    );
    record
}

/// Recognizes `:kind [arg...]: rest`
fn parse_marker(line: &str) -> Option<(Field, &str)> {
    let body = line.strip_prefix(':')?;
    let end = header_end(body)?;
    let header: Vec<&str> = body[..end].split_whitespace().collect();
    let rest = body[end + 1..].trim();

    let (kind, args) = header.split_first()?;
    let field = if PARAM_MARKERS.contains(kind) && (1..=2).contains(&args.len()) {
        // `:param <type> <name>:` binds to the name
        Field::Param(args[args.len() - 1].to_string())
    } else if RETURN_MARKERS.contains(kind) && args.is_empty() {
        Field::Returns
    } else if RAISE_MARKERS.contains(kind) && args.len() == 1 {
        Field::Raises(args[0].to_string())
    } else {
        return None;
    };
    Some((field, rest))
}

/// Position of the `:` closing a marker header; `::` belongs to a type path
fn header_end(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            if bytes.get(i + 1) == Some(&b':') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn store(record: &mut DocumentationRecord, field: Field, text: String) {
    match field {
        Field::Param(name) => {
            record.params.insert(name, text);
        }
        Field::Returns => {
            if !text.is_empty() {
                record.returns = Some(text);
            }
        }
        Field::Raises(type_name) => {
            record.raises.insert(type_name, text);
        }
    }
}

fn split_paragraphs(lines: &[&str]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}
