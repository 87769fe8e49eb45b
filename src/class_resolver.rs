//! Class construction orchestration
//!
//! Resolving a type runs, in order: interface redirection, the singleton
//! cache gate, the instantiability check, constructor resolution, record
//! storage, property injection, and optional post-construction method
//! invocation. Nested dependencies recurse through the parameter
//! resolver; built-in injection descriptors funnel through
//! [`resolve_infuse`].

use crate::attributes::{InfuseSpec, named_as_string};
use crate::blueprint::{ClassSpec, MethodSpec};
use crate::container::Container;
use crate::definition::{Args, Definition, Value};
use crate::error::{DiError, Result};
use crate::parameter_resolver::{self, Pass};
use crate::repository::ClassRecord;
use crate::{definition_resolver, property_resolver};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Outcome of a class resolution
#[derive(Clone)]
pub struct Resolved {
    /// The constructed (or cached) instance
    pub instance: Value,
    /// Result of the selected post-construction method, if one ran
    pub returned: Option<Value>,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("returned", &self.returned.is_some())
            .finish()
    }
}

/// Which method, if any, runs after construction
#[derive(Clone, Copy)]
pub(crate) enum MethodPolicy<'a> {
    /// Invoke nothing
    Skip,
    /// Select from registered metadata, the class default, or the
    /// container default
    Auto,
    /// Invoke this method with these arguments
    Named(&'a str, Option<&'a Args>),
}

/// Resolve a registered type to an instance (and optionally a method
/// result). `fresh` bypasses the singleton record both ways: nothing is
/// reused and nothing is stored.
pub(crate) fn resolve(
    container: &Container,
    type_name: &str,
    supplied_ctor: Option<&Args>,
    method: MethodPolicy<'_>,
    fresh: bool,
) -> Result<Resolved> {
    let repo = container.repository();
    let _flight = repo.begin_resolution(format!("class:{type_name}"))?;
    let _frame = repo.trace_push(format!("class:{type_name}"), false);

    let requested = repo
        .class(type_name)
        .ok_or_else(|| DiError::not_found(type_name))?;

    let class = redirect_interface(container, requested, supplied_ctor)?;

    // Singleton cache gate
    let mut record = match (!fresh).then(|| repo.class_record(&class.name)).flatten() {
        Some(record) => {
            #[cfg(feature = "logging")]
            trace!(target: "syringa", class = %class.name, "instance reused from resolved cache");
            record
        }
        None => {
            let instance = construct(container, &class, supplied_ctor)?;
            let record = ClassRecord {
                instance,
                returned: None,
                property_done: false,
            };
            if !fresh {
                repo.set_class_record(&class.name, record.clone());
            }
            record
        }
    };

    // Property injection strictly after construction, at most once
    if !record.property_done {
        property_resolver::resolve(container, &class, &record.instance)?;
        record.property_done = true;
        if !fresh {
            repo.set_class_record(&class.name, record.clone());
        }
    }

    // Optional method invocation strictly after property injection
    match method {
        MethodPolicy::Skip => {}
        MethodPolicy::Named(name, args) => {
            if let Some((owner, spec)) = find_method(container, &class, name) {
                record.returned =
                    Some(invoke_method(container, &class, &owner, &spec, &record.instance, args)?);
                if !fresh {
                    repo.set_class_record(&class.name, record.clone());
                }
            }
        }
        MethodPolicy::Auto => {
            if record.returned.is_none()
                && let Some(name) = select_method(container, &class)
                && let Some((owner, spec)) = find_method(container, &class, &name)
            {
                // registered method supplies are merged inside invoke_method
                record.returned = Some(invoke_method(
                    container,
                    &class,
                    &owner,
                    &spec,
                    &record.instance,
                    None,
                )?);
                if !fresh {
                    repo.set_class_record(&class.name, record.clone());
                }
            }
        }
    }

    Ok(Resolved {
        instance: record.instance,
        returned: record.returned,
    })
}

/// Swap an interface spec for its concrete, validating conformance.
fn redirect_interface(
    container: &Container,
    requested: Arc<ClassSpec>,
    supplied: Option<&Args>,
) -> Result<Arc<ClassSpec>> {
    if !requested.is_interface {
        return Ok(requested);
    }
    let repo = container.repository();
    let interface = requested.name.clone();

    let concrete_name = repo
        .env_concrete(&interface)
        .or_else(|| match repo.definition(&interface).map(|e| e.definition) {
            Some(Definition::ClassRef(c)) | Some(Definition::ClassMethodRef(c, _)) => Some(c),
            _ => None,
        })
        .or_else(|| {
            supplied
                .and_then(|args| args.named("concrete"))
                .and_then(named_as_string)
        })
        .ok_or(DiError::InterfaceResolutionFailure {
            interface: interface.clone(),
        })?;

    let concrete = repo
        .class(&concrete_name)
        .ok_or_else(|| DiError::not_found(concrete_name.clone()))?;
    if !implements(container, &concrete, &interface) {
        return Err(DiError::InterfaceImplementationMismatch {
            interface,
            concrete: concrete_name,
        });
    }

    #[cfg(feature = "logging")]
    debug!(
        target: "syringa",
        interface = %interface,
        concrete = %concrete_name,
        "interface redirected to concrete"
    );

    Ok(concrete)
}

/// Whether `class` (or an ancestor) declares the interface.
fn implements(container: &Container, class: &ClassSpec, interface: &str) -> bool {
    if class.interfaces.iter().any(|i| i == interface) {
        return true;
    }
    let mut parent = class.parent.clone();
    while let Some(name) = parent {
        match container.repository().class(&name) {
            Some(spec) => {
                if spec.interfaces.iter().any(|i| i == interface) {
                    return true;
                }
                parent = spec.parent.clone();
            }
            None => return false,
        }
    }
    false
}

/// Run the constructor with resolved parameters.
fn construct(container: &Container, class: &ClassSpec, supplied: Option<&Args>) -> Result<Value> {
    if !class.instantiable() {
        return Err(DiError::not_instantiable(&class.name));
    }

    let registered = container
        .repository()
        .overrides_for(&class.name)
        .constructor
        .unwrap_or_default();
    let supplies = match supplied {
        Some(explicit) => explicit.over(&registered),
        None => registered,
    };

    if let Some(ctor) = &class.constructor {
        let args = parameter_resolver::resolve(
            container,
            &ctor.name,
            Some(&class.name),
            &ctor.params,
            &supplies,
            Pass::Constructor,
            &[],
        )?;

        #[cfg(feature = "logging")]
        trace!(target: "syringa", class = %class.name, args = args.len(), "invoking constructor");

        return (ctor.invoke)(args);
    }

    if let Some(instantiate) = &class.instantiate {
        return instantiate(Vec::new());
    }

    Err(DiError::not_instantiable(&class.name))
}

/// Method selection for the `Auto` policy: registered metadata first,
/// then the class-level default, then the container-wide default.
fn select_method(container: &Container, class: &ClassSpec) -> Option<String> {
    let repo = container.repository();
    if let Some((name, _)) = repo.overrides_for(&class.name).method {
        return Some(name);
    }
    if let Some(name) = &class.call_on {
        return Some(name.clone());
    }
    repo.options().default_method
}

/// Find a method on the class or its ancestors.
fn find_method(
    container: &Container,
    class: &ClassSpec,
    name: &str,
) -> Option<(String, MethodSpec)> {
    if let Some(m) = class.find_method(name) {
        return Some((class.name.clone(), m.clone()));
    }
    let mut parent = class.parent.clone();
    while let Some(parent_name) = parent {
        let spec = container.repository().class(&parent_name)?;
        if let Some(m) = spec.find_method(name) {
            return Some((parent_name, m.clone()));
        }
        parent = spec.parent.clone();
    }
    None
}

/// Resolve a method's parameters and invoke it against the instance.
fn invoke_method(
    container: &Container,
    class: &ClassSpec,
    owner: &str,
    method: &MethodSpec,
    instance: &Value,
    supplied: Option<&Args>,
) -> Result<Value> {
    let repo = container.repository();
    let _frame = repo.trace_push(format!("method:{owner}::{}", method.name), false);

    // Registered method supplies apply when they target this method.
    let registered = match repo.overrides_for(&class.name).method {
        Some((name, args)) if name == method.name => args,
        _ => Args::default(),
    };
    let supplies = match supplied {
        Some(explicit) => explicit.over(&registered),
        None => registered,
    };

    let args = parameter_resolver::resolve(
        container,
        &format!("{owner}::{}", method.name),
        Some(&class.name),
        &method.params,
        &supplies,
        Pass::Method,
        &method.attributes,
    )?;

    (method.invoke)(instance, args)
}

/// Translate a built-in injection descriptor into a value.
///
/// Positional descriptors probe, in order: a bound definition, a
/// registered callable, a registered class. Named descriptors forward
/// their value as the callable's primary argument or the class's first
/// constructor argument.
pub(crate) fn resolve_infuse(
    container: &Container,
    spec: &InfuseSpec,
    type_hint: Option<&str>,
    target: &str,
) -> Result<Value> {
    let repo = container.repository();

    match spec {
        InfuseSpec::ByType => {
            let type_name = type_hint.ok_or_else(|| {
                DiError::attribute(target, "no declared type to inject by")
            })?;
            resolve(container, type_name, None, MethodPolicy::Auto, false).map(|r| r.instance)
        }

        InfuseSpec::Target(descriptor) => {
            if repo.has_definition(descriptor) {
                return definition_resolver::resolve(container, descriptor);
            }
            if let Some(function) = repo.function(descriptor) {
                return definition_resolver::invoke_function(container, &function, &Args::default());
            }
            if repo.has_class(descriptor) {
                return resolve(container, descriptor, None, MethodPolicy::Auto, false)
                    .map(|r| r.instance);
            }
            Err(DiError::not_found(descriptor.clone()))
        }

        InfuseSpec::Call { target: name, arg } => {
            let primary = Args::new().push_value(Arc::clone(arg));

            if let Some(function) = repo.function(name) {
                return definition_resolver::invoke_function(container, &function, &primary);
            }
            if let Some(entry) = repo.definition(name) {
                return match entry.definition {
                    Definition::ClassRef(c) => {
                        resolve(container, &c, Some(&primary), MethodPolicy::Auto, false)
                            .map(|r| r.instance)
                    }
                    Definition::ClassMethodRef(c, m) => {
                        let policy = match m.as_deref() {
                            Some(m) => MethodPolicy::Named(m, None),
                            None => MethodPolicy::Auto,
                        };
                        resolve(container, &c, Some(&primary), policy, false)
                            .map(|r| r.returned.unwrap_or(r.instance))
                    }
                    Definition::Factory(f) => {
                        definition_resolver::invoke_function(container, &f, &primary)
                    }
                    Definition::Value(_) => definition_resolver::resolve(container, name),
                };
            }
            if repo.has_class(name) {
                return resolve(container, name, Some(&primary), MethodPolicy::Auto, false)
                    .map(|r| r.instance);
            }
            Err(DiError::not_found(name.clone()))
        }
    }
}
