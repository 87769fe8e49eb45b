//! Attribute metadata and the custom-resolver pipeline
//!
//! Three built-in attribute names are behaviorally equivalent and accepted
//! on parameters, methods and properties: `Infuse`, `Autowire` and
//! `Inject`. Their payload parses into an [`InfuseSpec`] handled directly
//! by the resolvers. Everything else dispatches through the
//! [`AttributeRegistry`], an ordered map of attribute type to user
//! resolver.

use crate::container::Container;
use crate::definition::{Value, cast};
use crate::error::{DiError, Result};
use std::sync::{Arc, Mutex};

/// Built-in injection attribute names, all equivalent
pub const INFUSE_NAMES: [&str; 3] = ["Infuse", "Autowire", "Inject"];

/// An attribute attached to a parameter, method or property.
///
/// # Examples
///
/// ```rust
/// use syringa::Attribute;
///
/// // `Infuse("cfg.host")`: inject the definition bound under cfg.host
/// let by_id = Attribute::new("Infuse").arg("cfg.host");
/// assert!(by_id.is_infuse());
///
/// // `Cached(ttl: 60)`: a custom attribute with a named argument
/// let custom = Attribute::new("Cached").named_arg("ttl", 60_i64);
/// assert!(!custom.is_infuse());
/// ```
#[derive(Clone)]
pub struct Attribute {
    /// Attribute type name
    pub name: String,
    /// Positional string arguments
    pub positional: Vec<String>,
    /// Named arguments, in declaration order
    pub named: Vec<(String, Value)>,
}

impl Attribute {
    /// Create an attribute with no arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            positional: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Append a positional string argument
    #[inline]
    pub fn arg(mut self, v: impl Into<String>) -> Self {
        self.positional.push(v.into());
        self
    }

    /// Append a named argument
    #[inline]
    pub fn named_arg<T: Send + Sync + 'static>(mut self, k: impl Into<String>, v: T) -> Self {
        self.named.push((k.into(), crate::definition::value(v)));
        self
    }

    /// Append a named argument that is already type-erased
    #[inline]
    pub fn named_value(mut self, k: impl Into<String>, v: Value) -> Self {
        self.named.push((k.into(), v));
        self
    }

    /// Whether this is one of the built-in injection attributes
    #[inline]
    pub fn is_infuse(&self) -> bool {
        INFUSE_NAMES.contains(&self.name.as_str())
    }

    /// Parse the built-in payload into a descriptor.
    ///
    /// Fails with `AttributeMalformed` when the shape is neither empty, a
    /// single positional string, nor a single named pair.
    pub fn infuse_spec(&self, target: &str) -> Result<InfuseSpec> {
        match (self.positional.len(), self.named.len()) {
            (0, 0) => Ok(InfuseSpec::ByType),
            (1, 0) => Ok(InfuseSpec::Target(self.positional[0].clone())),
            (0, 1) => {
                let (key, v) = &self.named[0];
                Ok(InfuseSpec::Call {
                    target: key.clone(),
                    arg: Arc::clone(v),
                })
            }
            _ => Err(DiError::attribute(
                target,
                "expected no arguments, one positional string, or one named pair",
            )),
        }
    }

    /// Look up a named argument
    #[inline]
    pub fn named(&self, key: &str) -> Option<&Value> {
        self.named.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("positional", &self.positional)
            .field("named", &self.named.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

/// Parsed payload of a built-in injection attribute
#[derive(Clone)]
pub enum InfuseSpec {
    /// No arguments: inject by the target's declared type
    ByType,
    /// One positional string: a definition id, registered callable, or class
    Target(String),
    /// One named pair: callable/id plus its primary argument
    Call { target: String, arg: Value },
}

impl std::fmt::Debug for InfuseSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfuseSpec::ByType => f.write_str("InfuseSpec::ByType"),
            InfuseSpec::Target(t) => write!(f, "InfuseSpec::Target({t})"),
            InfuseSpec::Call { target, .. } => write!(f, "InfuseSpec::Call({target})"),
        }
    }
}

/// Where an attribute pipeline is running
#[derive(Clone, Copy, Debug)]
pub enum AttributeTarget<'a> {
    /// A declared parameter of `owner`
    Parameter {
        owner: &'a str,
        name: &'a str,
        type_name: Option<&'a str>,
    },
    /// A declared field of `owner`
    Property {
        owner: &'a str,
        name: &'a str,
        type_name: Option<&'a str>,
    },
}

impl AttributeTarget<'_> {
    /// Qualified location for error messages
    pub fn describe(&self) -> String {
        match self {
            AttributeTarget::Parameter { owner, name, .. } => format!("{owner}(${name})"),
            AttributeTarget::Property { owner, name, .. } => format!("{owner}::{name}"),
        }
    }

    /// The target's declared type name, if any
    pub fn type_name(&self) -> Option<&str> {
        match self {
            AttributeTarget::Parameter { type_name, .. }
            | AttributeTarget::Property { type_name, .. } => *type_name,
        }
    }
}

/// What a custom resolver produced for one attribute
pub enum AttributeOutcome {
    /// A value to inject; the first one wins
    Inject(Value),
    /// Explicitly nothing; the attribute is handled but injects no value
    Null,
    /// The non-injecting sentinel: this resolver has no opinion
    Skip,
}

/// User-registered resolver for one attribute type
pub trait AttributeResolver: Send + Sync {
    /// Resolve one attribute occurrence on a target.
    ///
    /// Runs for its side effects even after another resolver already won
    /// the injection for this target.
    fn resolve(
        &self,
        attribute: &Attribute,
        target: &AttributeTarget<'_>,
        container: &Container,
    ) -> Result<AttributeOutcome>;
}

impl<F> AttributeResolver for F
where
    F: Fn(&Attribute, &AttributeTarget<'_>, &Container) -> Result<AttributeOutcome> + Send + Sync,
{
    fn resolve(
        &self,
        attribute: &Attribute,
        target: &AttributeTarget<'_>,
        container: &Container,
    ) -> Result<AttributeOutcome> {
        self(attribute, target, container)
    }
}

/// Result of running the full pipeline over a target's attributes
pub enum PipelineOutcome {
    /// No registered resolver matched any attribute
    Unhandled,
    /// At least one resolver ran; `Some` carries the winning value
    Handled(Option<Value>),
}

/// Ordered registry of custom attribute resolvers.
///
/// Insertion order is dispatch order. Re-registering an attribute type
/// replaces its resolver in place, keeping its position.
#[derive(Default)]
pub struct AttributeRegistry {
    resolvers: Mutex<Vec<(String, Arc<dyn AttributeResolver>)>>,
}

impl AttributeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for an attribute type
    pub fn register(&self, attribute_type: impl Into<String>, resolver: Arc<dyn AttributeResolver>) {
        let attribute_type = attribute_type.into();
        let mut resolvers = self.resolvers.lock().expect("attribute registry poisoned");
        if let Some(slot) = resolvers.iter_mut().find(|(t, _)| *t == attribute_type) {
            slot.1 = resolver;
        } else {
            resolvers.push((attribute_type, resolver));
        }
    }

    /// Number of registered attribute types
    pub fn len(&self) -> usize {
        self.resolvers.lock().expect("attribute registry poisoned").len()
    }

    /// True when no resolver is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the pipeline over a target's attributes.
    ///
    /// Resolvers run in registration order over matching attributes in
    /// discovery order. The first `Inject` value wins; the remaining
    /// resolvers still run for their side effects. Built-in injection
    /// attributes never enter the pipeline.
    pub fn dispatch(
        &self,
        attributes: &[Attribute],
        target: &AttributeTarget<'_>,
        container: &Container,
    ) -> Result<PipelineOutcome> {
        let resolvers: Vec<(String, Arc<dyn AttributeResolver>)> = self
            .resolvers
            .lock()
            .expect("attribute registry poisoned")
            .clone();
        if resolvers.is_empty() {
            return Ok(PipelineOutcome::Unhandled);
        }

        let mut handled = false;
        let mut winner: Option<Value> = None;

        for (attribute_type, resolver) in &resolvers {
            for attribute in attributes {
                if attribute.is_infuse() || attribute.name != *attribute_type {
                    continue;
                }
                handled = true;
                match resolver.resolve(attribute, target, container)? {
                    AttributeOutcome::Inject(v) => {
                        if winner.is_none() {
                            winner = Some(v);
                        }
                    }
                    AttributeOutcome::Null | AttributeOutcome::Skip => {}
                }
            }
        }

        if handled {
            Ok(PipelineOutcome::Handled(winner))
        } else {
            Ok(PipelineOutcome::Unhandled)
        }
    }
}

impl std::fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("resolvers", &self.len())
            .finish()
    }
}

/// Convenience: read a named attribute argument as a string
pub(crate) fn named_as_string(v: &Value) -> Option<String> {
    cast::<String>(v).ok().map(|s| (*s).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::value;

    #[test]
    fn test_infuse_spec_parse() {
        let target = "Demo::field";

        assert!(matches!(
            Attribute::new("Infuse").infuse_spec(target).unwrap(),
            InfuseSpec::ByType
        ));
        assert!(matches!(
            Attribute::new("Autowire").arg("cfg.x").infuse_spec(target).unwrap(),
            InfuseSpec::Target(t) if t == "cfg.x"
        ));
        assert!(matches!(
            Attribute::new("Inject")
                .named_arg("make_report", 3_i64)
                .infuse_spec(target)
                .unwrap(),
            InfuseSpec::Call { target: t, .. } if t == "make_report"
        ));
    }

    #[test]
    fn test_infuse_spec_malformed() {
        let attr = Attribute::new("Infuse").arg("a").arg("b");
        assert!(matches!(
            attr.infuse_spec("x"),
            Err(crate::DiError::AttributeMalformed { .. })
        ));

        let mixed = Attribute::new("Infuse").arg("a").named_arg("k", 1_i64);
        assert!(mixed.infuse_spec("x").is_err());
    }

    fn noop_resolver(
        _: &Attribute,
        _: &AttributeTarget<'_>,
        _: &Container,
    ) -> Result<AttributeOutcome> {
        Ok(AttributeOutcome::Skip)
    }

    #[test]
    fn test_registry_insertion_order_and_replacement() {
        let registry = AttributeRegistry::new();
        let noop: Arc<dyn AttributeResolver> = Arc::new(noop_resolver);

        registry.register("First", Arc::clone(&noop));
        registry.register("Second", Arc::clone(&noop));
        registry.register("First", noop);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_named_as_string() {
        assert_eq!(
            named_as_string(&value("x".to_string())).as_deref(),
            Some("x")
        );
        assert!(named_as_string(&value(1_i64)).is_none());
    }
}
