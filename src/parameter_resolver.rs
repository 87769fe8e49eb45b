//! Parameter-list resolution
//!
//! Resolves a declared parameter list against supplied values, bound
//! definitions, registered classes, attributes and defaults. Runs in two
//! phases plus a variadic tail: an associative pass over every declared
//! parameter, a positional/default pass over whatever that left open,
//! and a gather step for a trailing variadic parameter.
//!
//! Precedence per parameter: user-supplied, then definition (by name,
//! then by type), then registered class, then method-level descriptor,
//! then parameter-level descriptor, then declared default, then null for
//! nullable types, then failure.

use crate::attributes::{Attribute, AttributeTarget, InfuseSpec, PipelineOutcome, named_as_string};
use crate::blueprint::ParamSpec;
use crate::container::Container;
use crate::definition::{Null, Value, VariadicArgs, value};
use crate::error::{DiError, Result};
use crate::{class_resolver, definition_resolver};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Which kind of signature is being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    Constructor,
    Method,
}

/// Working state shared by the phases
struct Resolution<'a> {
    container: &'a Container,
    owner: &'a str,
    declaring_class: Option<&'a str>,
    pass: Pass,
    named: BTreeMap<String, Value>,
    positional: VecDeque<Value>,
    injected_types: HashSet<String>,
}

/// Resolve an ordered argument list for a declared signature.
///
/// `supplied` carries user values; `method_attributes` carries the
/// method-level attributes when `pass` is [`Pass::Method`].
pub(crate) fn resolve(
    container: &Container,
    owner: &str,
    declaring_class: Option<&str>,
    params: &[ParamSpec],
    supplied: &crate::definition::Args,
    pass: Pass,
    method_attributes: &[Attribute],
) -> Result<Vec<Value>> {
    let options = container.repository().options();

    let mut state = Resolution {
        container,
        owner,
        declaring_class,
        pass,
        named: supplied
            .named_entries()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect(),
        positional: supplied.positional().iter().cloned().collect(),
        injected_types: HashSet::new(),
    };

    let variadic_at = params.iter().position(|p| p.variadic);
    let head = &params[..variadic_at.unwrap_or(params.len())];

    let mut slots: Vec<Option<Value>> = vec![None; head.len()];
    let mut deferred: Vec<usize> = Vec::new();

    // Phase A: associative pass in declaration order
    for (i, param) in head.iter().enumerate() {
        let _frame = container
            .repository()
            .trace_push(format!("param:{owner}(${})", param.name), true);

        match state.associative(param, options.injection, method_attributes, &options)? {
            Some(v) => slots[i] = Some(v),
            None => deferred.push(i),
        }
    }

    // Phase B: positional/default pass over deferred parameters
    for i in deferred {
        let param = &head[i];
        slots[i] = Some(state.positional_or_default(param, options.injection)?);
    }

    let mut resolved: Vec<Value> = slots
        .into_iter()
        .map(|s| s.expect("every head slot is filled by phase A or B"))
        .collect();

    // Phase C: gather the variadic tail
    if variadic_at.is_some() {
        let tail = VariadicArgs {
            items: state.positional.drain(..).collect(),
            keyed: state.named.into_iter().collect(),
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "syringa",
            owner = owner,
            gathered = tail.len(),
            "variadic tail gathered"
        );

        resolved.push(value(tail));
    }

    Ok(resolved)
}

impl<'a> Resolution<'a> {
    /// Phase A for one parameter. `Ok(None)` defers to Phase B.
    fn associative(
        &mut self,
        param: &ParamSpec,
        injection: bool,
        method_attributes: &[Attribute],
        options: &crate::repository::ContainerOptions,
    ) -> Result<Option<Value>> {
        let repo = self.container.repository();

        // Autowiring disabled: only supplied values and defaults apply.
        if !injection {
            return Ok(self.named.remove(&param.name));
        }

        let class_type = self.resolvable_class_type(param)?;

        // User-supplied values outrank everything. A supplied value for a
        // resolvable class parameter forwards into its construction below.
        if self.named.contains_key(&param.name) && class_type.is_none() {
            return Ok(self.named.remove(&param.name));
        }

        // Definition lookup, by parameter name then by declared type.
        if repo.has_definition(&param.name) {
            return definition_resolver::resolve(self.container, &param.name).map(Some);
        }
        if let Some(type_name) = param.type_name.as_deref()
            && repo.has_definition(type_name)
        {
            return definition_resolver::resolve(self.container, type_name).map(Some);
        }

        // Registered class: construct it, forwarding any supplied value
        // as the first constructor argument.
        if let Some(type_name) = class_type {
            return self.inject_class(param, &type_name).map(Some);
        }

        // Method-level descriptor entries keyed by parameter name.
        if self.pass == Pass::Method && options.method_attributes {
            for attribute in method_attributes {
                if !attribute.is_infuse() {
                    continue;
                }
                if let Some(v) = attribute.named(&param.name) {
                    return self.method_descriptor(param, v).map(Some);
                }
            }
        }

        // Remaining supplied-by-name cases (unregistered class types).
        if let Some(v) = self.named.remove(&param.name) {
            return Ok(Some(v));
        }

        Ok(None)
    }

    /// Phase B for one deferred parameter.
    fn positional_or_default(&mut self, param: &ParamSpec, injection: bool) -> Result<Value> {
        // Consume the numeric overflow list in order.
        if let Some(v) = self.positional.pop_front() {
            return Ok(v);
        }

        if injection {
            // Parameter-level built-in descriptor.
            if let Some(v) = self.parameter_descriptor(param)? {
                return Ok(v);
            }

            // Custom attribute pipeline; a handled-but-non-injecting
            // outcome suppresses default fall-through.
            let custom: Vec<&Attribute> =
                param.attributes.iter().filter(|a| !a.is_infuse()).collect();
            if !custom.is_empty() {
                let target = AttributeTarget::Parameter {
                    owner: self.owner,
                    name: &param.name,
                    type_name: param.type_name.as_deref(),
                };
                let attrs: Vec<Attribute> = custom.into_iter().cloned().collect();
                match repo_dispatch(self.container, &attrs, &target)? {
                    PipelineOutcome::Handled(Some(v)) => return Ok(v),
                    PipelineOutcome::Handled(None) => return Ok(value(Null)),
                    PipelineOutcome::Unhandled => {}
                }
            }
        }

        if let Some(default) = &param.default {
            return Ok(Arc::clone(default));
        }
        if param.nullable {
            return Ok(value(Null));
        }

        Err(DiError::parameter(
            self.owner,
            &param.name,
            "no supplied value, definition, attribute or default",
        ))
    }

    /// The class type this parameter can inject, after `self`/`parent`
    /// normalization and environment override. `None` when the parameter
    /// is builtin, untyped, or its type is not registered.
    fn resolvable_class_type(&self, param: &ParamSpec) -> Result<Option<String>> {
        let repo = self.container.repository();
        let Some(declared) = param.type_name.as_deref() else {
            return Ok(None);
        };
        if param.builtin {
            return Ok(None);
        }

        let normalized = match declared {
            "self" => self
                .declaring_class
                .map(str::to_string)
                .ok_or_else(|| {
                    DiError::parameter(self.owner, &param.name, "'self' type outside a class")
                })?,
            "parent" => {
                let declaring = self.declaring_class.ok_or_else(|| {
                    DiError::parameter(self.owner, &param.name, "'parent' type outside a class")
                })?;
                let spec = repo
                    .class(declaring)
                    .ok_or_else(|| DiError::not_found(declaring))?;
                spec.parent.clone().ok_or_else(|| {
                    DiError::parameter(
                        self.owner,
                        &param.name,
                        format!("'parent' type but {declaring} has no parent class"),
                    )
                })?
            }
            other => other.to_string(),
        };

        // Interface parameters redirect through the environment table.
        if let Some(spec) = repo.class(&normalized)
            && spec.is_interface
            && let Some(concrete) = repo.env_concrete(&normalized)
        {
            return Ok(Some(concrete));
        }

        if repo.has_class(&normalized) {
            Ok(Some(normalized))
        } else {
            Ok(None)
        }
    }

    /// Inject a registered class parameter, guarding recursion and
    /// duplicate injection within one signature.
    fn inject_class(&mut self, param: &ParamSpec, type_name: &str) -> Result<Value> {
        let repo = self.container.repository();

        // A constructor depending on the class it belongs to cannot make
        // progress.
        if self.pass == Pass::Constructor && self.declaring_class == Some(type_name) {
            let mut chain = repo.in_flight();
            chain.push(type_name.to_string());
            return Err(DiError::circular(type_name, chain));
        }

        if !self.injected_types.insert(type_name.to_string()) {
            return Err(DiError::MultipleInstancesForType {
                owner: self.owner.to_string(),
                type_name: type_name.to_string(),
            });
        }

        let forwarded = self.named.remove(&param.name);
        let ctor_args = forwarded.map(|v| crate::definition::Args::new().push_value(v));

        let resolved = class_resolver::resolve(
            self.container,
            type_name,
            ctor_args.as_ref(),
            class_resolver::MethodPolicy::Auto,
            false,
        )?;
        Ok(resolved.instance)
    }

    /// Resolve a method-level descriptor entry for one parameter.
    fn method_descriptor(&self, param: &ParamSpec, entry: &Value) -> Result<Value> {
        let target = format!("{}(${})", self.owner, param.name);
        match named_as_string(entry) {
            // String entries name a definition, callable or class.
            Some(descriptor) => class_resolver::resolve_infuse(
                self.container,
                &InfuseSpec::Target(descriptor),
                param.type_name.as_deref(),
                &target,
            ),
            // Anything else injects verbatim.
            None => Ok(Arc::clone(entry)),
        }
    }

    /// Resolve a parameter-level built-in descriptor, if one is present.
    fn parameter_descriptor(&self, param: &ParamSpec) -> Result<Option<Value>> {
        let Some(attribute) = param.attributes.iter().find(|a| a.is_infuse()) else {
            return Ok(None);
        };
        let target = format!("{}(${})", self.owner, param.name);
        let spec = attribute.infuse_spec(&target)?;

        match &spec {
            // Inject by declared type; builtin and untyped parameters
            // fall through to defaults.
            InfuseSpec::ByType => {
                if param.builtin || param.type_name.is_none() {
                    return Ok(None);
                }
                class_resolver::resolve_infuse(
                    self.container,
                    &spec,
                    param.type_name.as_deref(),
                    &target,
                )
                .map(Some)
            }
            _ => class_resolver::resolve_infuse(
                self.container,
                &spec,
                param.type_name.as_deref(),
                &target,
            )
            .map(Some),
        }
    }
}

/// Run the custom-attribute pipeline for a target
fn repo_dispatch(
    container: &Container,
    attributes: &[Attribute],
    target: &AttributeTarget<'_>,
) -> Result<PipelineOutcome> {
    container
        .repository()
        .attributes()
        .dispatch(attributes, target, container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{ClassSpec, FnSpec};
    use crate::definition::{Args, Definition, Lifetime, cast};

    fn demo_container() -> Container {
        let container = Container::new();
        container
            .bind_with(
                "cfg.host",
                Definition::literal("smtp.example.org".to_string()),
                Lifetime::Singleton,
                vec![],
            )
            .unwrap();
        container
    }

    fn params_of(spec: &FnSpec) -> &[ParamSpec] {
        &spec.params
    }

    #[test]
    fn test_supplied_outranks_definition() {
        let container = demo_container();
        // parameter named like a bound definition
        let spec = FnSpec::new("probe", |args| Ok(args.into_iter().next().unwrap()))
            .param(ParamSpec::builtin("cfg.host", "String"));

        let supplied = Args::new().with("cfg.host", "override".to_string());
        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &supplied,
            Pass::Constructor,
            &[],
        )
        .unwrap();

        assert_eq!(*cast::<String>(&resolved[0]).unwrap(), "override");
    }

    #[test]
    fn test_by_name_definition_lookup() {
        let container = demo_container();
        let spec = FnSpec::new("probe", |args| Ok(args.into_iter().next().unwrap()))
            .param(ParamSpec::builtin("cfg.host", "String"));

        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &Args::new(),
            Pass::Constructor,
            &[],
        )
        .unwrap();

        assert_eq!(*cast::<String>(&resolved[0]).unwrap(), "smtp.example.org");
    }

    #[test]
    fn test_positional_then_default_then_null() {
        let container = Container::new();
        let spec = FnSpec::new("probe", |args| Ok(value(args.len())))
            .param(ParamSpec::builtin("a", "i64"))
            .param(ParamSpec::builtin("b", "i64").default_value(7_i64))
            .param(ParamSpec::builtin("c", "i64").nullable());

        let supplied = Args::new().push(1_i64);
        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &supplied,
            Pass::Constructor,
            &[],
        )
        .unwrap();

        assert_eq!(*cast::<i64>(&resolved[0]).unwrap(), 1);
        assert_eq!(*cast::<i64>(&resolved[1]).unwrap(), 7);
        assert!(crate::definition::is_null(&resolved[2]));
    }

    #[test]
    fn test_unresolvable_parameter_fails_with_owner() {
        let container = Container::new();
        let spec = FnSpec::new("Job::run", |_| Ok(value(())))
            .param(ParamSpec::builtin("token", "String"));

        let err = resolve(
            &container,
            "Job::run",
            None,
            params_of(&spec),
            &Args::new(),
            Pass::Constructor,
            &[],
        )
        .unwrap_err();

        match err {
            DiError::ParameterResolutionFailure { owner, parameter, .. } => {
                assert_eq!(owner, "Job::run");
                assert_eq!(parameter, "token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_class_injection_rejected() {
        let container = Container::new();
        container
            .register_class(ClassSpec::new("Dep").instantiate_with(|| Ok(value(0_u8))))
            .unwrap();

        let spec = FnSpec::new("probe", |_| Ok(value(())))
            .param(ParamSpec::class("first", "Dep"))
            .param(ParamSpec::class("second", "Dep"));

        let err = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &Args::new(),
            Pass::Constructor,
            &[],
        )
        .unwrap_err();

        assert!(matches!(err, DiError::MultipleInstancesForType { .. }));
    }

    #[test]
    fn test_variadic_gathers_remaining_positional() {
        let container = Container::new();
        let spec = FnSpec::new("probe", |args| Ok(args.into_iter().last().unwrap()))
            .param(ParamSpec::builtin("first", "i64"))
            .param(ParamSpec::new("rest").variadic());

        let supplied = Args::new().push(1_i64).push(2_i64).push(3_i64);
        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &supplied,
            Pass::Constructor,
            &[],
        )
        .unwrap();

        assert_eq!(resolved.len(), 2);
        let tail = cast::<VariadicArgs>(&resolved[1]).unwrap();
        assert_eq!(tail.items.len(), 2);
        assert!(tail.keyed.is_empty());
    }

    #[test]
    fn test_variadic_empty_and_keyed() {
        let container = Container::new();
        let spec =
            FnSpec::new("probe", |args| Ok(args.into_iter().next().unwrap()))
                .param(ParamSpec::new("rest").variadic());

        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &Args::new(),
            Pass::Constructor,
            &[],
        )
        .unwrap();
        let tail = cast::<VariadicArgs>(&resolved[0]).unwrap();
        assert!(tail.is_empty());

        let supplied = Args::new().with("extra", 5_i64).push(1_i64);
        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &supplied,
            Pass::Constructor,
            &[],
        )
        .unwrap();
        let tail = cast::<VariadicArgs>(&resolved[0]).unwrap();
        assert_eq!(tail.items.len(), 1);
        assert_eq!(tail.keyed.len(), 1);
        assert_eq!(tail.keyed[0].0, "extra");
    }

    #[test]
    fn test_injection_disabled_uses_only_supplies() {
        let container = demo_container();
        let mut options = container.repository().options();
        options.injection = false;
        container.repository().set_options(options).unwrap();

        let spec = FnSpec::new("probe", |args| Ok(args.into_iter().next().unwrap()))
            .param(ParamSpec::builtin("cfg.host", "String").default_value("fallback".to_string()));

        let resolved = resolve(
            &container,
            "probe",
            None,
            params_of(&spec),
            &Args::new(),
            Pass::Constructor,
            &[],
        )
        .unwrap();

        // definition lookup is skipped; declared default applies
        assert_eq!(*cast::<String>(&resolved[0]).unwrap(), "fallback");
    }
}
