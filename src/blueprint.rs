//! Registration metadata for classes, callables and their members
//!
//! There is no runtime reflection in Rust, so everything a resolver would
//! normally introspect is declared at bind time: parameter lists, declared
//! types, defaults, attributes, and the closures that actually construct
//! instances, invoke methods and write properties.
//!
//! # Example
//!
//! ```rust
//! use syringa::{ClassSpec, FnSpec, ParamSpec, cast, value};
//!
//! struct Mailer { transport: String }
//!
//! let spec = ClassSpec::new("Mailer").constructor(
//!     FnSpec::new("Mailer::new", |args| {
//!         let transport = cast::<String>(&args[0])?;
//!         Ok(value(Mailer { transport: (*transport).clone() }))
//!     })
//!     .param(ParamSpec::builtin("transport", "String")),
//! );
//!
//! assert_eq!(spec.name, "Mailer");
//! ```

use crate::attributes::Attribute;
use crate::definition::Value;
use crate::error::Result;
use std::sync::Arc;

/// Closure constructing a value from an ordered argument list
pub type InvokeFn = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// Closure invoking a method against an instance
pub type MethodFn = Arc<dyn Fn(&Value, Vec<Value>) -> Result<Value> + Send + Sync>;

/// Closure writing a property of an instance
pub type SetterFn = Arc<dyn Fn(&Value, Value) -> Result<()> + Send + Sync>;

/// A declared parameter of a constructor, method or factory.
#[derive(Clone)]
pub struct ParamSpec {
    /// Parameter name, used for by-name lookups and supplied values
    pub name: String,
    /// Declared type name, if any
    pub type_name: Option<String>,
    /// True for builtin (non-class) types like `String` or `i64`
    pub builtin: bool,
    /// Whether the declared type admits null
    pub nullable: bool,
    /// Declared default value
    pub default: Option<Value>,
    /// Whether this parameter gathers the remaining arguments
    pub variadic: bool,
    /// Parameter-level attributes
    pub attributes: Vec<Attribute>,
}

impl ParamSpec {
    /// An untyped parameter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            builtin: true,
            nullable: false,
            default: None,
            variadic: false,
            attributes: Vec::new(),
        }
    }

    /// A parameter with a builtin (non-injectable) type
    pub fn builtin(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::new(name)
        }
    }

    /// A parameter declared with a class or interface type
    pub fn class(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            builtin: false,
            ..Self::new(name)
        }
    }

    /// Mark the declared type as nullable
    #[inline]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Attach a declared default value
    #[inline]
    pub fn default_value<T: Send + Sync + 'static>(mut self, v: T) -> Self {
        self.default = Some(crate::definition::value(v));
        self
    }

    /// Mark the parameter as variadic; only meaningful on the last one
    #[inline]
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Attach an attribute
    #[inline]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl std::fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("builtin", &self.builtin)
            .field("nullable", &self.nullable)
            .field("variadic", &self.variadic)
            .finish()
    }
}

/// A registered callable: factory, global function or constructor.
#[derive(Clone)]
pub struct FnSpec {
    /// Owner-qualified name used in diagnostics, e.g. `Mailer::new`
    pub name: String,
    /// Declared parameters, in order
    pub params: Vec<ParamSpec>,
    /// The closure that runs once every parameter is resolved
    pub invoke: InvokeFn,
}

impl FnSpec {
    /// Create a spec from a name and an invoke closure
    pub fn new<F>(name: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            invoke: Arc::new(invoke),
        }
    }

    /// Append a declared parameter
    #[inline]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

impl std::fmt::Debug for FnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSpec")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}

/// A method of a registered class.
#[derive(Clone)]
pub struct MethodSpec {
    /// Method name
    pub name: String,
    /// Declared parameters, in order
    pub params: Vec<ParamSpec>,
    /// Method-level attributes; named built-in entries key parameters
    pub attributes: Vec<Attribute>,
    /// The closure invoked against the instance
    pub invoke: MethodFn,
}

impl MethodSpec {
    /// Create a method spec from a name and an invoke closure
    pub fn new<F>(name: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(&Value, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            attributes: Vec::new(),
            invoke: Arc::new(invoke),
        }
    }

    /// Append a declared parameter
    #[inline]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Attach a method-level attribute
    #[inline]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl std::fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}

/// A declared field of a registered class.
#[derive(Clone)]
pub struct PropertySpec {
    /// Field name
    pub name: String,
    /// Declared type name, if any
    pub type_name: Option<String>,
    /// Constructor-promoted fields are skipped unless explicitly targeted
    pub promoted: bool,
    /// Static fields; the setter ignores the instance
    pub is_static: bool,
    /// Property-level attributes
    pub attributes: Vec<Attribute>,
    /// The closure that writes the field
    pub set: SetterFn,
}

impl PropertySpec {
    /// Create a property spec from a name and a setter closure
    pub fn new<F>(name: impl Into<String>, set: F) -> Self
    where
        F: Fn(&Value, Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_name: None,
            promoted: false,
            is_static: false,
            attributes: Vec::new(),
            set: Arc::new(set),
        }
    }

    /// Declare the field's type
    #[inline]
    pub fn typed(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Mark as constructor-promoted
    #[inline]
    pub fn promoted(mut self) -> Self {
        self.promoted = true;
        self
    }

    /// Mark as static
    #[inline]
    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attach an attribute
    #[inline]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl std::fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("promoted", &self.promoted)
            .finish()
    }
}

/// Bind-time description of a type: the reflection surrogate.
///
/// Interfaces register as specs with [`ClassSpec::interface`]; abstract
/// bases with [`ClassSpec::abstract_base`]. Neither is instantiable.
#[derive(Clone)]
pub struct ClassSpec {
    /// Type name; the identifier classes resolve under
    pub name: String,
    /// Parent class name, if any
    pub parent: Option<String>,
    /// Interface names this type implements
    pub interfaces: Vec<String>,
    /// True for interface specs
    pub is_interface: bool,
    /// True for abstract bases
    pub is_abstract: bool,
    /// Constructor; types without one construct via [`ClassSpec::instantiate`]
    pub constructor: Option<FnSpec>,
    /// Declared methods, in declaration order
    pub methods: Vec<MethodSpec>,
    /// Declared fields, in declaration order
    pub properties: Vec<PropertySpec>,
    /// Class-level default method to invoke after construction
    pub call_on: Option<String>,
    /// Zero-argument instantiation for constructor-less types
    pub instantiate: Option<InvokeFn>,
}

impl std::fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassSpec")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("interfaces", &self.interfaces)
            .field("is_interface", &self.is_interface)
            .field("is_abstract", &self.is_abstract)
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}

impl ClassSpec {
    /// Start a spec for a concrete class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            constructor: None,
            methods: Vec::new(),
            properties: Vec::new(),
            call_on: None,
            instantiate: None,
        }
    }

    /// Start a spec for an interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            is_interface: true,
            ..Self::new(name)
        }
    }

    /// Start a spec for an abstract base
    pub fn abstract_base(name: impl Into<String>) -> Self {
        Self {
            is_abstract: true,
            ..Self::new(name)
        }
    }

    /// Set the parent class
    #[inline]
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare an implemented interface
    #[inline]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Attach the constructor
    #[inline]
    pub fn constructor(mut self, spec: FnSpec) -> Self {
        self.constructor = Some(spec);
        self
    }

    /// Attach a zero-argument instantiation for constructor-less types
    pub fn instantiate_with<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        self.instantiate = Some(Arc::new(move |_| f()));
        self
    }

    /// Declare a method
    #[inline]
    pub fn method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    /// Declare a field
    #[inline]
    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    /// Set the class-level default method
    #[inline]
    pub fn call_on(mut self, method: impl Into<String>) -> Self {
        self.call_on = Some(method.into());
        self
    }

    /// Find a declared method by name
    #[inline]
    pub fn find_method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Whether this spec can be constructed at all
    #[inline]
    pub fn instantiable(&self) -> bool {
        !self.is_interface && !self.is_abstract
    }
}
