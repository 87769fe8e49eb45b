//! Definition materialization with lifetime-aware caching
//!
//! Entry point for identifier resolution. Singleton artifacts memoize in
//! the per-container definition cache and, when configured, in the
//! external cache pool; Transient and Scoped lifetimes bypass both, the
//! latter landing in the scope-keyed cache instead.

use crate::blueprint::FnSpec;
use crate::class_resolver::{self, MethodPolicy};
use crate::container::Container;
use crate::definition::{Args, Definition, Lifetime, Value};
use crate::error::{DiError, Result};
use crate::parameter_resolver::{self, Pass};
use crate::repository::DefinitionEntry;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Cache-pool suffix for a definition id
pub(crate) fn cache_suffix(id: &str) -> String {
    format!("def:{}", URL_SAFE_NO_PAD.encode(id))
}

/// Resolve a bound identifier to its value.
pub(crate) fn resolve(container: &Container, id: &str) -> Result<Value> {
    let repo = container.repository();
    let _flight = repo.begin_resolution(format!("def:{id}"))?;
    let _frame = repo.trace_push(format!("def:{id}"), false);

    let entry = repo.definition(id).ok_or_else(|| DiError::not_found(id))?;

    match entry.lifetime {
        Lifetime::Singleton => {
            if let Some(hit) = repo.resolved_definition(id) {
                #[cfg(feature = "logging")]
                trace!(target: "syringa", id = id, "definition resolved from cache");
                return Ok(hit);
            }

            let produced = match repo.cache_pool() {
                Some(pool) => {
                    let key = repo.make_cache_key(&cache_suffix(id));
                    pool.get(&key, &mut || materialize(container, id, &entry))?
                }
                None => materialize(container, id, &entry)?,
            };
            repo.set_resolved_definition(id, Arc::clone(&produced));
            Ok(produced)
        }

        Lifetime::Transient => materialize(container, id, &entry),

        Lifetime::Scoped => {
            let key = repo.scoped_key(id);
            if let Some(hit) = repo.scoped(&key) {
                #[cfg(feature = "logging")]
                trace!(target: "syringa", id = id, key = %key, "definition resolved from scope");
                return Ok(hit);
            }
            let produced = materialize(container, id, &entry)?;
            repo.set_scoped(key, Arc::clone(&produced));
            Ok(produced)
        }
    }
}

/// Produce a value from the definition variant.
fn materialize(container: &Container, id: &str, entry: &DefinitionEntry) -> Result<Value> {
    #[cfg(feature = "logging")]
    trace!(
        target: "syringa",
        id = id,
        kind = entry.definition.kind(),
        lifetime = %entry.lifetime,
        "materializing definition"
    );

    // Non-singleton class constructions must not touch the per-type
    // singleton record.
    let fresh = entry.lifetime != Lifetime::Singleton;

    match &entry.definition {
        Definition::Value(v) => Ok(Arc::clone(v)),

        Definition::Factory(spec) => invoke_function(container, spec, &Args::default()),

        Definition::ClassRef(type_name) => {
            class_resolver::resolve(container, type_name, None, MethodPolicy::Auto, fresh)
                .map(|r| r.instance)
        }

        Definition::ClassMethodRef(type_name, method) => {
            let policy = match method.as_deref() {
                Some(m) => MethodPolicy::Named(m, None),
                None => MethodPolicy::Auto,
            };
            let resolved = class_resolver::resolve(container, type_name, None, policy, fresh)?;
            match method {
                Some(_) => Ok(resolved.returned.unwrap_or(resolved.instance)),
                None => Ok(resolved.instance),
            }
        }
    }
}

/// Resolve a registered callable's parameters and invoke it.
pub(crate) fn invoke_function(
    container: &Container,
    spec: &FnSpec,
    supplied: &Args,
) -> Result<Value> {
    let _frame = container
        .repository()
        .trace_push(format!("fn:{}", spec.name), false);

    let args = parameter_resolver::resolve(
        container,
        &spec.name,
        None,
        &spec.params,
        supplied,
        Pass::Constructor,
        &[],
    )?;
    (spec.invoke)(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::ParamSpec;
    use crate::cache::{CachePool, MemoryPool};
    use crate::definition::{cast, value};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_singleton_memoizes() {
        let container = Container::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);

        container
            .bind_with(
                "stamp",
                Definition::factory(FnSpec::new("stamp", move |_| {
                    Ok(value(counter.fetch_add(1, Ordering::SeqCst)))
                })),
                Lifetime::Singleton,
                vec![],
            )
            .unwrap();

        let a = resolve(&container, "stamp").unwrap();
        let b = resolve(&container, "stamp").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_reexecutes() {
        let container = Container::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);

        container
            .bind_with(
                "stamp",
                Definition::factory(FnSpec::new("stamp", move |_| {
                    Ok(value(counter.fetch_add(1, Ordering::SeqCst)))
                })),
                Lifetime::Transient,
                vec![],
            )
            .unwrap();

        let a = resolve(&container, "stamp").unwrap();
        let b = resolve(&container, "stamp").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scoped_partitions_by_label() {
        let container = Container::new();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);

        container
            .bind_with(
                "stamp",
                Definition::factory(FnSpec::new("stamp", move |_| {
                    Ok(value(counter.fetch_add(1, Ordering::SeqCst)))
                })),
                Lifetime::Scoped,
                vec![],
            )
            .unwrap();

        let root_a = resolve(&container, "stamp").unwrap();
        let root_b = resolve(&container, "stamp").unwrap();
        assert!(Arc::ptr_eq(&root_a, &root_b));

        container.set_scope("job-1");
        let job = resolve(&container, "stamp").unwrap();
        assert!(!Arc::ptr_eq(&root_a, &job));

        container.clear_scope();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_parameters_resolve_through_container() {
        let container = Container::new();
        container.bind("port", Definition::literal(2525_i64)).unwrap();
        container
            .bind(
                "endpoint",
                Definition::factory(
                    FnSpec::new("endpoint", |args| {
                        let port = cast::<i64>(&args[0])?;
                        Ok(value(format!("0.0.0.0:{port}")))
                    })
                    .param(ParamSpec::builtin("port", "i64")),
                ),
            )
            .unwrap();

        let v = resolve(&container, "endpoint").unwrap();
        assert_eq!(*cast::<String>(&v).unwrap(), "0.0.0.0:2525");
    }

    #[test]
    fn test_pool_is_consulted_for_singletons_only() {
        let container = Container::new();
        let pool = Arc::new(MemoryPool::new());
        container.enable_definition_cache(Arc::clone(&pool) as Arc<dyn CachePool>).unwrap();

        container.bind("kept", Definition::literal(1_i64)).unwrap();
        container
            .bind_with(
                "fleeting",
                Definition::factory(FnSpec::new("fleeting", |_| Ok(value(2_i64)))),
                Lifetime::Transient,
                vec![],
            )
            .unwrap();

        resolve(&container, "kept").unwrap();
        resolve(&container, "fleeting").unwrap();

        assert_eq!(pool.len(), 1);
        let key = container.repository().make_cache_key(&cache_suffix("kept"));
        assert!(pool.contains(&key));
    }

    #[test]
    fn test_cycle_unwinds_in_flight() {
        let container = Container::new();
        container
            .bind(
                "a",
                Definition::factory(
                    FnSpec::new("a", |args| Ok(args.into_iter().next().unwrap()))
                        .param(ParamSpec::builtin("b", "i64")),
                ),
            )
            .unwrap();
        container
            .bind(
                "b",
                Definition::factory(
                    FnSpec::new("b", |args| Ok(args.into_iter().next().unwrap()))
                        .param(ParamSpec::builtin("a", "i64")),
                ),
            )
            .unwrap();

        let err = resolve(&container, "a").unwrap_err();
        assert!(matches!(err, DiError::CircularDependency { .. }));
        assert!(container.repository().in_flight().is_empty());
    }
}
