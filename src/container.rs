//! The container: registration surface and resolution entry points
//!
//! A [`Container`] is a cheap-to-clone handle over one repository. All
//! registration happens through it until [`Container::lock`] latches the
//! mutation gate; resolution entry points stay functional afterwards.

use crate::blueprint::{ClassSpec, FnSpec};
use crate::cache::CachePool;
use crate::class_resolver::{self, MethodPolicy, Resolved};
use crate::definition::{Args, Definition, Lifetime, Value, cast};
use crate::definition_resolver;
use crate::error::{DiError, Result};
use crate::provider::Provider;
use crate::repository::{ContainerOptions, Repository};
use crate::tracer::TraceLevel;
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Process-wide alias registry; the only global state in the crate
static ALIASED: Lazy<DashMap<String, Container, RandomState>> =
    Lazy::new(|| DashMap::with_hasher(RandomState::new()));

/// Definition-based dependency resolution container.
///
/// # Examples
///
/// ```rust
/// use syringa::{Container, Definition, cast};
///
/// let container = Container::new();
/// container.bind("answer", Definition::literal(42_i64)).unwrap();
///
/// let v = container.get("answer").unwrap();
/// assert_eq!(*cast::<i64>(&v).unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct Container {
    repo: Arc<Repository>,
}

impl Container {
    /// Create a container with the default alias.
    #[inline]
    pub fn new() -> Self {
        Self::with_alias("default")
    }

    /// Create a container with an explicit alias; the alias namespaces
    /// cache-pool keys.
    pub fn with_alias(alias: impl Into<String>) -> Self {
        let alias = alias.into();

        #[cfg(feature = "logging")]
        debug!(target: "syringa", alias = %alias, "creating container");

        Self {
            repo: Arc::new(Repository::new(alias)),
        }
    }

    /// Fetch (or create) the shared container registered under `alias`.
    ///
    /// Containers obtained this way share state with every other handle
    /// for the same alias; containers from [`Container::new`] stay
    /// independent.
    pub fn instance(alias: &str) -> Container {
        ALIASED
            .entry(alias.to_string())
            .or_insert_with(|| Container::with_alias(alias))
            .clone()
    }

    /// The backing repository.
    #[inline]
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// This container's alias.
    #[inline]
    pub fn alias(&self) -> String {
        self.repo.alias()
    }

    // =========================================================================
    // Definition API
    // =========================================================================

    /// Bind a definition with Singleton lifetime and no tags.
    #[inline]
    pub fn bind(&self, id: impl Into<String>, definition: Definition) -> Result<()> {
        self.bind_with(id, definition, Lifetime::Singleton, Vec::new())
    }

    /// Bind a definition with an explicit lifetime and tags.
    pub fn bind_with(
        &self,
        id: impl Into<String>,
        definition: Definition,
        lifetime: Lifetime,
        tags: Vec<String>,
    ) -> Result<()> {
        self.repo.set_definition(id, definition, lifetime, tags)
    }

    /// Register several definitions through a batch registrar.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syringa::{Container, Definition, Lifetime};
    ///
    /// let container = Container::new();
    /// container
    ///     .add_definitions(|batch| {
    ///         batch.bind("cfg.host", Definition::literal("localhost".to_string()));
    ///         batch.bind_with(
    ///             "request.id",
    ///             Definition::literal(7_u64),
    ///             Lifetime::Scoped,
    ///             vec!["http".into()],
    ///         );
    ///     })
    ///     .unwrap();
    ///
    /// assert!(container.has("cfg.host"));
    /// ```
    pub fn add_definitions<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut DefinitionBatch),
    {
        self.repo.ensure_unlocked()?;

        let mut batch = DefinitionBatch {
            pending: Vec::new(),
        };
        f(&mut batch);

        #[cfg(feature = "logging")]
        debug!(
            target: "syringa",
            definitions = batch.pending.len(),
            "batch registration"
        );

        for (id, definition, lifetime, tags) in batch.pending {
            self.repo.set_definition(id, definition, lifetime, tags)?;
        }
        Ok(())
    }

    /// Register a class blueprint.
    #[inline]
    pub fn register_class(&self, spec: ClassSpec) -> Result<()> {
        self.repo.register_class(spec)
    }

    /// Register a global callable.
    #[inline]
    pub fn register_function(&self, spec: FnSpec) -> Result<()> {
        self.repo.register_function(spec)
    }

    /// Supply constructor arguments for a registered class.
    #[inline]
    pub fn register_ctor_args(&self, type_name: &str, args: Args) -> Result<()> {
        self.repo.set_ctor_supplies(type_name, args)
    }

    /// Select the method invoked after constructing a class, with its
    /// supplied arguments.
    #[inline]
    pub fn register_method(&self, type_name: &str, method: &str, args: Args) -> Result<()> {
        self.repo.set_method_override(type_name, method, args)
    }

    /// Supply property values for a registered class.
    #[inline]
    pub fn register_properties(
        &self,
        type_name: &str,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<()> {
        self.repo.set_property_overrides(type_name, values)
    }

    /// Let a provider register its services.
    #[inline]
    pub fn import(&self, provider: &dyn Provider) -> Result<()> {
        provider.register(self)
    }

    /// Replace the behavior toggles.
    #[inline]
    pub fn set_options(&self, options: ContainerOptions) -> Result<()> {
        self.repo.set_options(options)
    }

    /// Current behavior toggles.
    #[inline]
    pub fn options(&self) -> ContainerOptions {
        self.repo.options()
    }

    /// Toggle deferred materialization. When disabled, every Singleton
    /// definition materializes eagerly at [`Container::lock`].
    #[inline]
    pub fn enable_lazy_loading(&self, enabled: bool) -> Result<()> {
        self.repo.set_lazy_loading(enabled)
    }

    /// Set the environment label consulted by interface bindings.
    #[inline]
    pub fn set_environment(&self, env: impl Into<String>) -> Result<()> {
        self.repo.set_environment(env)
    }

    /// Bind an interface to a concrete for one environment.
    #[inline]
    pub fn bind_interface_for_env(
        &self,
        env: impl Into<String>,
        interface: impl Into<String>,
        concrete: impl Into<String>,
    ) -> Result<()> {
        self.repo.bind_interface_for_env(env, interface, concrete)
    }

    /// Configure the cache pool memoizing Singleton definition artifacts.
    #[inline]
    pub fn enable_definition_cache(&self, pool: Arc<dyn CachePool>) -> Result<()> {
        self.repo.set_cache_pool(pool)
    }

    /// Register a custom attribute resolver; registration order is
    /// dispatch order.
    #[inline]
    pub fn register_custom_attribute(
        &self,
        attribute_type: impl Into<String>,
        resolver: Arc<dyn crate::attributes::AttributeResolver>,
    ) -> Result<()> {
        self.repo.register_custom_attribute(attribute_type, resolver)
    }

    // =========================================================================
    // Resolution API
    // =========================================================================

    /// Resolve an identifier: a bound definition, or a registered class.
    pub fn get(&self, id: &str) -> Result<Value> {
        if self.repo.has_definition(id) {
            definition_resolver::resolve(self, id)
        } else if self.repo.has_class(id) {
            class_resolver::resolve(self, id, None, MethodPolicy::Auto, false).map(|r| r.instance)
        } else {
            Err(DiError::not_found(id))
        }
    }

    /// Resolve and downcast in one step.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syringa::{Container, Definition};
    ///
    /// let container = Container::new();
    /// container.bind("retries", Definition::literal(3_u32)).unwrap();
    ///
    /// let retries = container.get_as::<u32>("retries").unwrap();
    /// assert_eq!(*retries, 3);
    /// ```
    #[inline]
    pub fn get_as<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        cast::<T>(&self.get(id)?)
    }

    /// Like [`Container::get`], but yields the configured method's return
    /// value for class-backed identifiers.
    pub fn get_return(&self, id: &str) -> Result<Value> {
        if let Some(entry) = self.repo.definition(id) {
            return match entry.definition {
                Definition::ClassRef(class) => {
                    definition_resolver::resolve(self, id)?;
                    let resolved =
                        class_resolver::resolve(self, &class, None, MethodPolicy::Auto, false)?;
                    Ok(resolved.returned.unwrap_or(resolved.instance))
                }
                // already yields the method result
                _ => definition_resolver::resolve(self, id),
            };
        }
        if self.repo.has_class(id) {
            let resolved = class_resolver::resolve(self, id, None, MethodPolicy::Auto, false)?;
            return Ok(resolved.returned.unwrap_or(resolved.instance));
        }
        Err(DiError::not_found(id))
    }

    /// [`Container::get_return`] with a downcast.
    #[inline]
    pub fn get_return_as<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        cast::<T>(&self.get_return(id)?)
    }

    /// Invoke a registered callable, a `(class, method)` pair, or a
    /// factory definition with resolved parameters. The result is never
    /// cached.
    pub fn call(&self, target: &str, method: Option<&str>, args: Args) -> Result<Value> {
        if let Some(function) = self.repo.function(target) {
            return definition_resolver::invoke_function(self, &function, &args);
        }
        if self.repo.has_class(target) {
            let resolved = match method {
                Some(m) => class_resolver::resolve(
                    self,
                    target,
                    None,
                    MethodPolicy::Named(m, Some(&args)),
                    false,
                )?,
                None => class_resolver::resolve(self, target, None, MethodPolicy::Auto, false)?,
            };
            return Ok(resolved.returned.unwrap_or(resolved.instance));
        }
        if let Some(entry) = self.repo.definition(target) {
            if let Definition::Factory(f) = entry.definition {
                return definition_resolver::invoke_function(self, &f, &args);
            }
            return definition_resolver::resolve(self, target);
        }
        Err(DiError::not_found(target))
    }

    /// Construct a fresh instance, bypassing the singleton record both
    /// ways, and optionally invoke a method on it.
    pub fn make(&self, type_name: &str, method: Option<&str>, args: Args) -> Result<Resolved> {
        let policy = match method {
            Some(m) => MethodPolicy::Named(m, None),
            None => MethodPolicy::Skip,
        };
        class_resolver::resolve(self, type_name, Some(&args), policy, true)
    }

    /// Lazy handles for every definition bearing the tag.
    pub fn find_by_tag(&self, tag: &str) -> BTreeMap<String, TaggedService> {
        self.repo
            .tagged(tag)
            .into_iter()
            .map(|id| {
                (
                    id.clone(),
                    TaggedService {
                        container: self.clone(),
                        id,
                    },
                )
            })
            .collect()
    }

    /// Membership across definitions, classes and resolved caches.
    pub fn has(&self, id: &str) -> bool {
        self.repo.has_definition(id) || self.repo.has_class(id) || self.repo.is_resolved(id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Latch the mutation gate. With lazy loading disabled, every
    /// Singleton definition materializes here.
    pub fn lock(&self) -> Result<()> {
        self.repo.lock();

        if !self.repo.lazy_loading() {
            let _warmed = self.warm_definitions()?;

            #[cfg(feature = "logging")]
            debug!(target: "syringa", warmed = _warmed, "eager materialization at lock");
        }
        Ok(())
    }

    /// Whether the mutation gate is latched.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.repo.is_locked()
    }

    /// Materialize every Singleton definition now, through the cache
    /// pool when one is configured. Returns how many were produced.
    pub fn warm_definitions(&self) -> Result<usize> {
        let mut warmed = 0;
        for id in self.repo.definition_ids() {
            let singleton = self
                .repo
                .definition(&id)
                .is_some_and(|e| e.lifetime == Lifetime::Singleton);
            if singleton {
                definition_resolver::resolve(self, &id)?;
                warmed += 1;
            }
        }
        Ok(warmed)
    }

    /// Evict one definition artifact from the pool and the local cache.
    pub fn purge_definition(&self, id: &str) -> Result<()> {
        if let Some(pool) = self.repo.cache_pool() {
            pool.delete(&self.repo.make_cache_key(&definition_resolver::cache_suffix(id)))?;
        }
        self.repo.clear_resolved_definition(id);
        Ok(())
    }

    /// Evict every definition artifact namespaced to this container.
    pub fn purge_definitions(&self) -> Result<()> {
        if let Some(pool) = self.repo.cache_pool() {
            pool.clear(Some(&self.repo.make_cache_key("def:")))?;
        }
        self.repo.clear_resolved();
        Ok(())
    }

    /// Drop every resolved artifact and retained trace; definitions and
    /// classes stay registered.
    pub fn clear(&self) {
        self.repo.clear_resolved();
        self.repo.clear_traces();
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    /// Current scope label.
    #[inline]
    pub fn get_scope(&self) -> String {
        self.repo.scope()
    }

    /// Switch the scope label, returning the previous one.
    #[inline]
    pub fn set_scope(&self, label: impl Into<String>) -> String {
        self.repo.set_scope(label)
    }

    /// Evict the current label's scoped instances and reset to root.
    #[inline]
    pub fn clear_scope(&self) {
        self.repo.clear_scope()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Set the trace detail level.
    #[inline]
    pub fn set_trace_level(&self, level: TraceLevel) {
        self.repo.set_trace_level(level)
    }

    /// Preserved frames for the last resolution rooted at `id`.
    pub fn trace_for(&self, id: &str) -> Option<Vec<String>> {
        self.repo
            .trace_for(&format!("def:{id}"))
            .or_else(|| self.repo.trace_for(&format!("class:{id}")))
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("repository", &self.repo)
            .finish()
    }
}

/// Batch registrar collecting definitions before a single commit.
pub struct DefinitionBatch {
    pending: Vec<(String, Definition, Lifetime, Vec<String>)>,
}

impl DefinitionBatch {
    /// Queue a Singleton definition without tags
    #[inline]
    pub fn bind(&mut self, id: impl Into<String>, definition: Definition) {
        self.bind_with(id, definition, Lifetime::Singleton, Vec::new());
    }

    /// Queue a definition with lifetime and tags
    #[inline]
    pub fn bind_with(
        &mut self,
        id: impl Into<String>,
        definition: Definition,
        lifetime: Lifetime,
        tags: Vec<String>,
    ) {
        self.pending.push((id.into(), definition, lifetime, tags));
    }
}

/// A lazy handle produced by [`Container::find_by_tag`].
#[derive(Clone)]
pub struct TaggedService {
    container: Container,
    id: String,
}

impl TaggedService {
    /// The bound identifier
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolve the underlying definition now
    #[inline]
    pub fn resolve(&self) -> Result<Value> {
        self.container.get(&self.id)
    }
}

impl std::fmt::Debug for TaggedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedService").field("id", &self.id).finish()
    }
}
