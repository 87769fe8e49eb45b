//! # Syringa - Definition-Based Dependency Resolution for Rust
//!
//! A string-identifier dependency injection core: bind definitions,
//! register class blueprints, and resolve fully constructed values with
//! every dependency satisfied.
//!
//! ## Features
//!
//! - 🗂 **Heterogeneous definitions** - literal values, factories, class
//!   references and `(class, method)` pairs behind one identifier space
//! - 🔩 **Blueprint autowiring** - constructors, methods and properties
//!   resolve from bind-time metadata instead of reflection
//! - 🏷 **Attribute pipeline** - built-in injection descriptors plus
//!   user-registered attribute resolvers, dispatched in order
//! - ♻️ **Lifetimes** - Singleton, Transient and Scoped with a
//!   label-partitioned scope cache
//! - 🌱 **Environment bindings** - interface-to-concrete overrides active
//!   only under a matching environment label
//! - 📦 **Definition cache** - optional pluggable pool memoizing
//!   Singleton artifacts across resolutions
//! - 🧭 **Cycle detection** - an explicit in-flight chain turns re-entry
//!   into a diagnosable error
//! - 📊 **Observable** - structured tracing plus a per-resolution frame
//!   recorder
//!
//! ## Quick Start
//!
//! ```rust
//! use syringa::{Container, Definition, ClassSpec, FnSpec, ParamSpec, cast, value};
//!
//! struct Mailer {
//!     host: String,
//! }
//!
//! let container = Container::new();
//!
//! // Bind configuration under free-form ids
//! container
//!     .bind("mail.host", Definition::literal("smtp.example.org".to_string()))
//!     .unwrap();
//!
//! // Register a class blueprint; the parameter name matches the id
//! container
//!     .register_class(ClassSpec::new("Mailer").constructor(
//!         FnSpec::new("Mailer::new", |args| {
//!             let host = cast::<String>(&args[0])?;
//!             Ok(value(Mailer { host: (*host).clone() }))
//!         })
//!         .param(ParamSpec::builtin("mail.host", "String")),
//!     ))
//!     .unwrap();
//!
//! // Resolve: the constructor argument comes from the definition
//! let mailer = container.get_as::<Mailer>("Mailer").unwrap();
//! assert_eq!(mailer.host, "smtp.example.org");
//! ```
//!
//! ## Lifetimes
//!
//! ```rust
//! use syringa::{Container, Definition, FnSpec, Lifetime, value};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! static COUNTER: AtomicU64 = AtomicU64::new(0);
//!
//! let container = Container::new();
//!
//! // Singleton: one artifact for the container's lifetime
//! container.bind("config", Definition::literal(true)).unwrap();
//!
//! // Transient: the factory re-runs on every get
//! container
//!     .bind_with(
//!         "request.id",
//!         Definition::factory(FnSpec::new("request.id", |_| {
//!             Ok(value(COUNTER.fetch_add(1, Ordering::SeqCst)))
//!         })),
//!         Lifetime::Transient,
//!         vec![],
//!     )
//!     .unwrap();
//!
//! let a = container.get("request.id").unwrap();
//! let b = container.get("request.id").unwrap();
//! assert!(!Arc::ptr_eq(&a, &b));
//! ```
//!
//! ## Scoped services
//!
//! ```rust
//! use syringa::{Container, Definition, FnSpec, Lifetime, value};
//! use std::sync::Arc;
//!
//! let container = Container::new();
//! container
//!     .bind_with(
//!         "unit.of.work",
//!         Definition::factory(FnSpec::new("unit.of.work", |_| Ok(value(())))),
//!         Lifetime::Scoped,
//!         vec![],
//!     )
//!     .unwrap();
//!
//! let root = container.get("unit.of.work").unwrap();
//!
//! container.set_scope("job-7");
//! let job = container.get("unit.of.work").unwrap();
//! assert!(!Arc::ptr_eq(&root, &job));
//! assert!(Arc::ptr_eq(&job, &container.get("unit.of.work").unwrap()));
//!
//! container.clear_scope();
//! assert_eq!(container.get_scope(), "root");
//! ```

mod attributes;
mod blueprint;
mod cache;
mod class_resolver;
mod container;
mod definition;
mod definition_resolver;
mod error;
#[cfg(feature = "logging")]
pub mod logging;
mod parameter_resolver;
mod property_resolver;
mod provider;
mod repository;
mod tracer;

pub use attributes::{
    Attribute, AttributeOutcome, AttributeRegistry, AttributeResolver, AttributeTarget,
    INFUSE_NAMES, InfuseSpec, PipelineOutcome,
};
pub use blueprint::{
    ClassSpec, FnSpec, InvokeFn, MethodFn, MethodSpec, ParamSpec, PropertySpec, SetterFn,
};
pub use cache::{CachePool, MemoryPool};
pub use class_resolver::Resolved;
pub use container::{Container, DefinitionBatch, TaggedService};
pub use definition::{Args, Definition, Lifetime, Null, Value, VariadicArgs, cast, is_null, value};
pub use error::{DiError, Result};
pub use provider::Provider;
pub use repository::{
    ClassOverrides, ClassRecord, ContainerOptions, DefinitionEntry, ROOT_SCOPE, Repository,
};
pub use tracer::{TraceLevel, Tracer};

// Re-export tracing macros for convenience when logging is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Attribute, CachePool, ClassSpec, Container, Definition, DiError, FnSpec, Lifetime,
        MethodSpec, ParamSpec, PropertySpec, Provider, Result, TraceLevel, Value, cast, value,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database {
        url: String,
    }

    fn bind_database(container: &Container) {
        container
            .bind("db.url", Definition::literal("postgres://localhost".to_string()))
            .unwrap();
        container
            .register_class(ClassSpec::new("Database").constructor(
                FnSpec::new("Database::new", |args| {
                    let url = cast::<String>(&args[0])?;
                    Ok(value(Database { url: (*url).clone() }))
                })
                .param(ParamSpec::builtin("db.url", "String")),
            ))
            .unwrap();
    }

    #[test]
    fn test_class_resolution_pulls_definitions() {
        let container = Container::new();
        bind_database(&container);

        let db = container.get_as::<Database>("Database").unwrap();
        assert_eq!(db.url, "postgres://localhost");
    }

    #[test]
    fn test_singleton_identity_across_gets() {
        let container = Container::new();
        bind_database(&container);

        let a = container.get("Database").unwrap();
        let b = container.get("Database").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_clear_resets_singletons() {
        let container = Container::new();
        bind_database(&container);

        let a = container.get("Database").unwrap();
        container.clear();
        let b = container.get("Database").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_make_always_fresh() {
        let container = Container::new();
        bind_database(&container);

        let shared = container.get("Database").unwrap();
        let fresh = container.make("Database", None, Args::new()).unwrap();
        assert!(!Arc::ptr_eq(&shared, &fresh.instance));
    }

    #[test]
    fn test_trace_recording() {
        let container = Container::new();
        container.set_trace_level(TraceLevel::Compact);
        bind_database(&container);

        container.get("Database").unwrap();
        let frames = container.trace_for("Database").unwrap();
        assert!(frames.iter().any(|f| f.contains("class:Database")));
        assert!(frames.iter().any(|f| f.contains("def:db.url")));
    }
}
