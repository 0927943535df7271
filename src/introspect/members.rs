//! Conversion of trait declarations into interface descriptors.
//!
//! Each method with a `self` receiver is a member. Parameters are positional (path
//! eligible) when marked `#[path]`, keyword-only (query) when marked `#[query]`, and
//! positional-or-keyword otherwise. A `Result<T, E>` return documents `T` as the
//! success payload and `E` as a declared error.
//!
//! Per-member overrides come from a `#[webmethod(...)]` attribute:
//!
//! ```text
//! #[webmethod(
//!     route = "/person/name/{family}/{given}",
//!     public,
//!     deprecated,
//!     request_example = r#"{"name": "x"}"#,
//!     response_example = r#"{"id": 1}"#,
//!     response_example_type = "NotFoundError",
//! )]
//! ```
//!
//! `response_example_type` applies to the response example declared just before it.
//!
//! A member returning `EventStream<E, R>` streams `E` events while it runs and delivers
//! `R` through a callback when done. Events the interface emits on its own are declared
//! as associated types bounded by a unary `Fn`:
//!
//! ```text
//! trait JobManagement {
//!     type JobProgress: Fn(JobProgressEvent);
//!     fn run_job(&self, #[path] job_id: Uuid) -> EventStream<JobProgressEvent, JobResult>;
//! }
//! ```

use super::types::{doc_text, TypeMapper};
use crate::descriptor::{
    Example, InterfaceDescriptor, MemberDescriptor, ParameterDescriptor, ParameterKind,
    TypeDescriptor, WebMethod,
};
use anyhow::{Context, Result};
use log::debug;

/// Builds an interface descriptor from a trait declaration
pub fn interface_from_trait(item: &syn::ItemTrait, mapper: &TypeMapper) -> Result<InterfaceDescriptor> {
    let mut interface = InterfaceDescriptor::new(item.ident.to_string());
    interface.documentation = doc_text(&item.attrs);

    for trait_item in &item.items {
        if let syn::TraitItem::Type(associated) = trait_item {
            if let Some(event) = event_type(associated) {
                debug!("Interface {} emits {}", item.ident, associated.ident);
                interface.events.push(mapper.map(event));
            }
            continue;
        }
        let syn::TraitItem::Fn(method) = trait_item else {
            continue;
        };
        if method.sig.receiver().is_none() {
            debug!(
                "Skipping associated function {}::{} without receiver",
                item.ident, method.sig.ident
            );
            continue;
        }

        let member = member_from_method(method, mapper)
            .with_context(|| format!("Invalid member {}::{}", item.ident, method.sig.ident))?;
        interface.members.push(member);
    }

    debug!(
        "Interface {} has {} members",
        interface.name,
        interface.members.len()
    );
    Ok(interface)
}

fn member_from_method(method: &syn::TraitItemFn, mapper: &TypeMapper) -> Result<MemberDescriptor> {
    let name = method.sig.ident.to_string();
    let name = name.strip_prefix("r#").unwrap_or(&name).to_string();

    let (event, returns, declared_error) = match &method.sig.output {
        syn::ReturnType::Default => (None, TypeDescriptor::Unit, None),
        syn::ReturnType::Type(_, ty) => map_return(ty, mapper),
    };

    let mut member = MemberDescriptor::new(name, returns);
    member.event = event;
    member.documentation = doc_text(&method.attrs);
    if let Some(TypeDescriptor::Named(identity)) = declared_error {
        member.declared_errors.push(identity);
    }

    for (position, input) in method.sig.inputs.iter().enumerate() {
        let syn::FnArg::Typed(pat_type) = input else {
            continue;
        };
        let param_name = match pat_type.pat.as_ref() {
            syn::Pat::Ident(pat) => pat.ident.to_string(),
            _ => format!("arg{}", position),
        };
        let kind = if has_attribute(&pat_type.attrs, "path") {
            ParameterKind::PositionalOnly
        } else if has_attribute(&pat_type.attrs, "query") {
            ParameterKind::KeywordOnly
        } else {
            ParameterKind::PositionalOrKeyword
        };
        member
            .parameters
            .push(ParameterDescriptor::new(param_name, mapper.map(&pat_type.ty), kind));
    }

    member.web_method = parse_web_method(&method.attrs)?;
    if has_attribute(&method.attrs, "deprecated") {
        member.web_method.deprecated = true;
    }

    Ok(member)
}

/// Splits a return type into the streamed event, the success payload and the declared
/// error
fn map_return(
    ty: &syn::Type,
    mapper: &TypeMapper,
) -> (Option<TypeDescriptor>, TypeDescriptor, Option<TypeDescriptor>) {
    let (ok, error) = match type_arguments(ty, "Result").as_deref() {
        Some([ok, error]) => (*ok, Some(mapper.map(error))),
        Some([ok]) => (*ok, None),
        _ => (ty, None),
    };
    match type_arguments(ok, "EventStream").as_deref() {
        Some([event, payload]) => (Some(mapper.map(event)), mapper.map(payload), error),
        _ => (None, mapper.map(ok), error),
    }
}

/// Type arguments of `ty` if its last path segment is `name`
fn type_arguments<'t>(ty: &'t syn::Type, name: &str) -> Option<Vec<&'t syn::Type>> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let last = type_path.path.segments.last()?;
    if last.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    Some(
        args.args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
    )
}

/// The argument of an associated type bounded by `Fn(E)`, `FnMut(E)` or `FnOnce(E)`
fn event_type(associated: &syn::TraitItemType) -> Option<&syn::Type> {
    associated.bounds.iter().find_map(|bound| {
        let syn::TypeParamBound::Trait(bound) = bound else {
            return None;
        };
        let last = bound.path.segments.last()?;
        if !matches!(last.ident.to_string().as_str(), "Fn" | "FnMut" | "FnOnce") {
            return None;
        }
        let syn::PathArguments::Parenthesized(args) = &last.arguments else {
            return None;
        };
        let returns_unit = match &args.output {
            syn::ReturnType::Default => true,
            syn::ReturnType::Type(_, ty) => matches!(ty.as_ref(), syn::Type::Tuple(t) if t.elems.is_empty()),
        };
        if args.inputs.len() == 1 && returns_unit {
            args.inputs.first()
        } else {
            None
        }
    })
}

fn has_attribute(attrs: &[syn::Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn parse_web_method(attrs: &[syn::Attribute]) -> Result<WebMethod> {
    let mut web_method = WebMethod::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("webmethod")) {
        if matches!(attr.meta, syn::Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("route") {
                let value: syn::LitStr = meta.value()?.parse()?;
                web_method.route = Some(value.value());
            } else if meta.path.is_ident("public") {
                web_method.public = true;
            } else if meta.path.is_ident("deprecated") {
                web_method.deprecated = true;
            } else if meta.path.is_ident("request_example") {
                let value: syn::LitStr = meta.value()?.parse()?;
                let json = serde_json::from_str(&value.value())
                    .map_err(|e| meta.error(format!("request_example is not valid JSON: {}", e)))?;
                web_method.request_examples.push(Example::new(json));
            } else if meta.path.is_ident("response_example") {
                let value: syn::LitStr = meta.value()?.parse()?;
                let json = serde_json::from_str(&value.value())
                    .map_err(|e| meta.error(format!("response_example is not valid JSON: {}", e)))?;
                web_method.response_examples.push(Example::new(json));
            } else if meta.path.is_ident("response_example_type") {
                let value: syn::LitStr = meta.value()?.parse()?;
                match web_method.response_examples.last_mut() {
                    Some(example) => example.type_name = Some(value.value()),
                    None => return Err(meta.error("response_example_type must follow a response_example")),
                }
            } else {
                return Err(meta.error("unsupported webmethod property"));
            }
            Ok(())
        })
        .context("Malformed #[webmethod] attribute")?;
    }

    Ok(web_method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::TypeIndex;
    use serde_json::json;

    fn interface(code: &str) -> Result<InterfaceDescriptor> {
        let item: syn::ItemTrait = syn::parse_str(code).unwrap();
        let index = TypeIndex::new(vec!["Job".to_string(), "NotFoundError".to_string()]);
        let module: Vec<String> = Vec::new();
        let mapper = TypeMapper::new(&index, &module, &item.generics);
        interface_from_trait(&item, &mapper)
    }

    #[test]
    fn test_members_and_parameter_kinds() {
        let result = interface(
            r#"
            /// Job management.
            pub trait JobManagement {
                /// Returns a job.
                fn get_job(&self, #[path] job_id: uuid::Uuid, #[query] verbose: bool, format: String) -> Job;
                fn new() -> Self;
                fn remove_job(&mut self, #[path] job_id: uuid::Uuid);
            }
            "#,
        )
        .unwrap();

        assert_eq!(result.name, "JobManagement");
        assert_eq!(result.documentation.as_deref(), Some("Job management."));
        assert_eq!(result.members.len(), 2);

        let get_job = &result.members[0];
        assert_eq!(get_job.name, "get_job");
        assert_eq!(get_job.documentation.as_deref(), Some("Returns a job."));
        assert_eq!(get_job.returns, TypeDescriptor::named("Job"));
        let kinds: Vec<ParameterKind> = get_job.parameters.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParameterKind::PositionalOnly,
                ParameterKind::KeywordOnly,
                ParameterKind::PositionalOrKeyword
            ]
        );

        assert_eq!(result.members[1].returns, TypeDescriptor::Unit);
    }

    #[test]
    fn test_result_return_declares_error() {
        let result = interface(
            r#"
            trait People {
                fn get_person(&self, #[path] id: String) -> Result<Job, NotFoundError>;
                fn list_people(&self) -> anyhow::Result<Vec<Job>>;
            }
            "#,
        )
        .unwrap();

        assert_eq!(result.members[0].returns, TypeDescriptor::named("Job"));
        assert_eq!(result.members[0].declared_errors, vec!["NotFoundError".to_string()]);
        assert_eq!(
            result.members[1].returns,
            TypeDescriptor::list(TypeDescriptor::named("Job"))
        );
        assert!(result.members[1].declared_errors.is_empty());
    }

    #[test]
    fn test_webmethod_attribute() {
        let result = interface(
            r##"
            trait People {
                #[webmethod(
                    route = "/person/name/{family}/{given}",
                    public,
                    response_example = r#"{"family": "Doe"}"#,
                    response_example = r#"{"id": "x"}"#,
                    response_example_type = "NotFoundError",
                )]
                #[deprecated]
                fn get_person_by_name(&self, #[path] family: String, #[path] given: String) -> Job;
            }
            "##,
        )
        .unwrap();

        let web_method = &result.members[0].web_method;
        assert_eq!(web_method.route.as_deref(), Some("/person/name/{family}/{given}"));
        assert!(web_method.public);
        assert!(web_method.deprecated);
        assert_eq!(
            web_method.response_examples,
            vec![
                Example::new(json!({"family": "Doe"})),
                Example::of_type(json!({"id": "x"}), "NotFoundError"),
            ]
        );
    }

    #[test]
    fn test_webmethod_rejects_invalid_json() {
        let result = interface(
            r#"
            trait Jobs {
                #[webmethod(request_example = "{not json")]
                fn create_job(&self, job: Job) -> Job;
            }
            "#,
        );

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Jobs::create_job"));
        assert!(message.contains("not valid JSON"));
    }

    #[test]
    fn test_webmethod_rejects_unknown_property() {
        let result = interface(
            r#"
            trait Jobs {
                #[webmethod(verb = "GET")]
                fn get_job(&self) -> Job;
            }
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_event_stream_and_declared_events() {
        let result = interface(
            r#"
            trait Jobs {
                type JobProgress: Fn(Job);
                type Unrelated: Clone;
                type Handler: Fn(Job, Job);

                fn run_job(&self, #[path] job_id: String) -> EventStream<Job, NotFoundError>;
                fn run_checked(&self) -> Result<streams::EventStream<String, Job>, NotFoundError>;
            }
            "#,
        )
        .unwrap();

        assert_eq!(result.events, vec![TypeDescriptor::named("Job")]);

        let run_job = &result.members[0];
        assert_eq!(run_job.event, Some(TypeDescriptor::named("Job")));
        assert_eq!(run_job.returns, TypeDescriptor::named("NotFoundError"));

        let run_checked = &result.members[1];
        assert_eq!(run_checked.event, Some(TypeDescriptor::string()));
        assert_eq!(run_checked.returns, TypeDescriptor::named("Job"));
        assert_eq!(run_checked.declared_errors, vec!["NotFoundError".to_string()]);
    }
}
