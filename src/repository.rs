//! Central mutable state for one container
//!
//! The repository owns the definition table, the class and function
//! registries, every resolved cache, the toggles, the environment map,
//! the scope cursor, the tag index and the tracer. Resolvers never hold
//! references into the concurrent maps; every accessor hands out owned
//! clones so recursive resolution cannot re-enter a shard lock.

use crate::attributes::AttributeRegistry;
use crate::blueprint::{ClassSpec, FnSpec};
use crate::cache::CachePool;
use crate::definition::{Args, Definition, Lifetime, Value};
use crate::error::{DiError, Result};
use crate::tracer::{TraceLevel, Tracer};
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Scope label every container starts in and resets to
pub const ROOT_SCOPE: &str = "root";

/// A stored definition with its caching policy and tags
#[derive(Clone, Debug)]
pub struct DefinitionEntry {
    pub definition: Definition,
    pub lifetime: Lifetime,
    pub tags: Vec<String>,
}

/// Per-type resolution record
#[derive(Clone)]
pub struct ClassRecord {
    /// The constructed instance
    pub instance: Value,
    /// Result of the selected post-construction method, if one ran
    pub returned: Option<Value>,
    /// Whether property injection has completed for this record
    pub property_done: bool,
}

impl std::fmt::Debug for ClassRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRecord")
            .field("returned", &self.returned.is_some())
            .field("property_done", &self.property_done)
            .finish()
    }
}

/// User-registered per-type metadata: constructor supplies, the method to
/// invoke after construction, and property overrides.
#[derive(Clone, Default)]
pub struct ClassOverrides {
    pub constructor: Option<Args>,
    pub method: Option<(String, Args)>,
    pub properties: BTreeMap<String, Value>,
}

impl std::fmt::Debug for ClassOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassOverrides")
            .field("constructor", &self.constructor)
            .field("method", &self.method.as_ref().map(|(name, _)| name))
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Behavior toggles stored on the repository
#[derive(Clone, Debug)]
pub struct ContainerOptions {
    /// Master switch for autowiring; off leaves only supplies and defaults
    pub injection: bool,
    /// Whether method-level attributes participate in parameter resolution
    pub method_attributes: bool,
    /// Whether property attributes participate in field injection
    pub property_attributes: bool,
    /// Container-wide default method invoked after construction
    pub default_method: Option<String>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            injection: true,
            method_attributes: true,
            property_attributes: true,
            default_method: None,
        }
    }
}

/// Authoritative state store for one container.
pub struct Repository {
    definitions: DashMap<String, DefinitionEntry, RandomState>,
    classes: DashMap<String, Arc<ClassSpec>, RandomState>,
    functions: DashMap<String, Arc<FnSpec>, RandomState>,
    overrides: DashMap<String, ClassOverrides, RandomState>,

    resolved_definitions: DashMap<String, Value, RandomState>,
    resolved_classes: DashMap<String, ClassRecord, RandomState>,
    scoped: DashMap<String, Value, RandomState>,

    tag_index: DashMap<String, Vec<String>, RandomState>,
    env_bindings: DashMap<String, BTreeMap<String, String>, RandomState>,

    environment: Mutex<Option<String>>,
    scope_label: Mutex<String>,
    alias: Mutex<String>,
    options: Mutex<ContainerOptions>,
    lazy_loading: AtomicBool,
    locked: AtomicBool,
    cache_pool: Mutex<Option<Arc<dyn CachePool>>>,

    in_flight: Mutex<Vec<String>>,
    tracer: Mutex<Tracer>,
    attributes: AttributeRegistry,
}

impl Repository {
    /// Create a repository with the given alias
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            definitions: DashMap::with_hasher(RandomState::new()),
            classes: DashMap::with_hasher(RandomState::new()),
            functions: DashMap::with_hasher(RandomState::new()),
            overrides: DashMap::with_hasher(RandomState::new()),
            resolved_definitions: DashMap::with_hasher(RandomState::new()),
            resolved_classes: DashMap::with_hasher(RandomState::new()),
            scoped: DashMap::with_hasher(RandomState::new()),
            tag_index: DashMap::with_hasher(RandomState::new()),
            env_bindings: DashMap::with_hasher(RandomState::new()),
            environment: Mutex::new(None),
            scope_label: Mutex::new(ROOT_SCOPE.to_string()),
            alias: Mutex::new(alias.into()),
            options: Mutex::new(ContainerOptions::default()),
            lazy_loading: AtomicBool::new(true),
            locked: AtomicBool::new(false),
            cache_pool: Mutex::new(None),
            in_flight: Mutex::new(Vec::new()),
            tracer: Mutex::new(Tracer::new(TraceLevel::Off)),
            attributes: AttributeRegistry::new(),
        }
    }

    // =========================================================================
    // Lock gate
    // =========================================================================

    /// Latch the mutation gate; read paths stay functional
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(
            target: "syringa",
            definitions = self.definitions.len(),
            classes = self.classes.len(),
            "container locked - definitions can no longer change"
        );
    }

    /// Whether the gate is latched
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Fail with `Locked` once the gate is latched
    #[inline]
    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            Err(DiError::Locked)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Definitions and tags
    // =========================================================================

    /// Store a definition and index its tags
    pub fn set_definition(
        &self,
        id: impl Into<String>,
        definition: Definition,
        lifetime: Lifetime,
        tags: Vec<String>,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        let id = id.into();

        #[cfg(feature = "logging")]
        debug!(
            target: "syringa",
            id = %id,
            kind = definition.kind(),
            lifetime = %lifetime,
            tags = tags.len(),
            "registering definition"
        );

        for tag in &tags {
            let mut ids = self.tag_index.entry(tag.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id.clone());
            }
        }
        self.definitions.insert(
            id,
            DefinitionEntry {
                definition,
                lifetime,
                tags,
            },
        );
        Ok(())
    }

    #[inline]
    pub fn has_definition(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Fetch a definition entry as an owned clone
    pub fn definition(&self, id: &str) -> Option<DefinitionEntry> {
        self.definitions.get(id).map(|e| e.value().clone())
    }

    /// All ids bound with the given tag and still present
    pub fn tagged(&self, tag: &str) -> Vec<String> {
        self.tag_index
            .get(tag)
            .map(|ids| {
                ids.iter()
                    .filter(|id| self.definitions.contains_key(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every bound definition id
    pub fn definition_ids(&self) -> Vec<String> {
        self.definitions.iter().map(|e| e.key().clone()).collect()
    }

    // =========================================================================
    // Class and function registries
    // =========================================================================

    pub fn register_class(&self, spec: ClassSpec) -> Result<()> {
        self.ensure_unlocked()?;

        #[cfg(feature = "logging")]
        debug!(
            target: "syringa",
            class = %spec.name,
            interface = spec.is_interface,
            methods = spec.methods.len(),
            properties = spec.properties.len(),
            "registering class blueprint"
        );

        self.classes.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    #[inline]
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn class(&self, name: &str) -> Option<Arc<ClassSpec>> {
        self.classes.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn register_function(&self, spec: FnSpec) -> Result<()> {
        self.ensure_unlocked()?;
        self.functions.insert(spec.name.clone(), Arc::new(spec));
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<Arc<FnSpec>> {
        self.functions.get(name).map(|e| Arc::clone(e.value()))
    }

    // =========================================================================
    // Per-type user metadata
    // =========================================================================

    pub fn set_ctor_supplies(&self, type_name: &str, args: Args) -> Result<()> {
        self.ensure_unlocked()?;
        self.overrides.entry(type_name.to_string()).or_default().constructor = Some(args);
        Ok(())
    }

    pub fn set_method_override(&self, type_name: &str, method: &str, args: Args) -> Result<()> {
        self.ensure_unlocked()?;
        self.overrides.entry(type_name.to_string()).or_default().method =
            Some((method.to_string(), args));
        Ok(())
    }

    pub fn set_property_overrides(
        &self,
        type_name: &str,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        let mut entry = self.overrides.entry(type_name.to_string()).or_default();
        for (name, v) in values {
            entry.properties.insert(name, v);
        }
        Ok(())
    }

    pub fn overrides_for(&self, type_name: &str) -> ClassOverrides {
        self.overrides
            .get(type_name)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Resolved caches
    // =========================================================================

    pub fn resolved_definition(&self, id: &str) -> Option<Value> {
        self.resolved_definitions.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn set_resolved_definition(&self, id: &str, v: Value) {
        self.resolved_definitions.insert(id.to_string(), v);
    }

    pub fn clear_resolved_definition(&self, id: &str) {
        self.resolved_definitions.remove(id);
    }

    pub fn class_record(&self, type_name: &str) -> Option<ClassRecord> {
        self.resolved_classes.get(type_name).map(|e| e.value().clone())
    }

    pub fn set_class_record(&self, type_name: &str, record: ClassRecord) {
        self.resolved_classes.insert(type_name.to_string(), record);
    }

    /// Whether any resolved artifact exists for the identifier
    pub fn is_resolved(&self, id: &str) -> bool {
        self.resolved_definitions.contains_key(id)
            || self.resolved_classes.contains_key(id)
            || self.scoped.contains_key(&self.scoped_key(id))
    }

    /// Drop every resolved artifact; definitions stay
    pub fn clear_resolved(&self) {
        self.resolved_definitions.clear();
        self.resolved_classes.clear();
        self.scoped.clear();

        #[cfg(feature = "logging")]
        debug!(target: "syringa", "resolved caches cleared");
    }

    // =========================================================================
    // Scope cursor and scoped cache
    // =========================================================================

    /// Current scope label
    pub fn scope(&self) -> String {
        self.scope_label.lock().expect("scope cursor poisoned").clone()
    }

    /// Switch the scope label, returning the previous one
    pub fn set_scope(&self, label: impl Into<String>) -> String {
        let mut cursor = self.scope_label.lock().expect("scope cursor poisoned");
        std::mem::replace(&mut *cursor, label.into())
    }

    /// Cache key for a scoped instance under the current label
    pub fn scoped_key(&self, id: &str) -> String {
        format!("{id}@{}", self.scope())
    }

    pub fn scoped(&self, key: &str) -> Option<Value> {
        self.scoped.get(key).map(|e| Arc::clone(e.value()))
    }

    pub fn set_scoped(&self, key: String, v: Value) {
        self.scoped.insert(key, v);
    }

    /// Evict every scoped instance of the current label and reset to root
    pub fn clear_scope(&self) {
        let label = self.set_scope(ROOT_SCOPE);
        let suffix = format!("@{label}");
        self.scoped.retain(|k, _| !k.ends_with(&suffix));

        #[cfg(feature = "logging")]
        debug!(target: "syringa", scope = %label, "scope cleared");
    }

    // =========================================================================
    // Environment bindings
    // =========================================================================

    pub fn set_environment(&self, env: impl Into<String>) -> Result<()> {
        self.ensure_unlocked()?;
        *self.environment.lock().expect("environment poisoned") = Some(env.into());
        Ok(())
    }

    pub fn environment(&self) -> Option<String> {
        self.environment.lock().expect("environment poisoned").clone()
    }

    pub fn bind_interface_for_env(
        &self,
        env: impl Into<String>,
        interface: impl Into<String>,
        concrete: impl Into<String>,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        self.env_bindings
            .entry(env.into())
            .or_default()
            .insert(interface.into(), concrete.into());
        Ok(())
    }

    /// The concrete bound to `interface` under the current environment
    pub fn env_concrete(&self, interface: &str) -> Option<String> {
        let env = self.environment()?;
        self.env_bindings
            .get(&env)
            .and_then(|m| m.get(interface).cloned())
    }

    // =========================================================================
    // Toggles, alias, cache pool
    // =========================================================================

    pub fn set_options(&self, options: ContainerOptions) -> Result<()> {
        self.ensure_unlocked()?;
        *self.options.lock().expect("options poisoned") = options;
        Ok(())
    }

    pub fn options(&self) -> ContainerOptions {
        self.options.lock().expect("options poisoned").clone()
    }

    pub fn set_lazy_loading(&self, enabled: bool) -> Result<()> {
        self.ensure_unlocked()?;
        self.lazy_loading.store(enabled, Ordering::Release);
        Ok(())
    }

    #[inline]
    pub fn lazy_loading(&self) -> bool {
        self.lazy_loading.load(Ordering::Acquire)
    }

    pub fn alias(&self) -> String {
        self.alias.lock().expect("alias poisoned").clone()
    }

    /// Prefix a cache suffix with the container alias
    pub fn make_cache_key(&self, suffix: &str) -> String {
        format!("{}:{}", self.alias(), suffix)
    }

    pub fn set_cache_pool(&self, pool: Arc<dyn CachePool>) -> Result<()> {
        self.ensure_unlocked()?;
        *self.cache_pool.lock().expect("cache pool poisoned") = Some(pool);
        Ok(())
    }

    pub fn cache_pool(&self) -> Option<Arc<dyn CachePool>> {
        self.cache_pool.lock().expect("cache pool poisoned").clone()
    }

    // =========================================================================
    // Attribute registry
    // =========================================================================

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn register_custom_attribute(
        &self,
        attribute_type: impl Into<String>,
        resolver: Arc<dyn crate::attributes::AttributeResolver>,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        self.attributes.register(attribute_type, resolver);
        Ok(())
    }

    // =========================================================================
    // In-flight chain
    // =========================================================================

    /// Enter a resolution frame, failing on re-entry with the full chain.
    ///
    /// The returned guard pops the frame on drop, on success and error
    /// paths alike.
    pub fn begin_resolution(&self, key: impl Into<String>) -> Result<InFlightGuard<'_>> {
        let key = key.into();
        let mut chain = self.in_flight.lock().expect("in-flight chain poisoned");
        if chain.contains(&key) {
            let mut cycle = chain.clone();
            cycle.push(key.clone());

            #[cfg(feature = "logging")]
            debug!(target: "syringa", id = %key, "circular dependency detected");

            return Err(DiError::circular(key, cycle));
        }
        chain.push(key.clone());
        drop(chain);

        #[cfg(feature = "logging")]
        trace!(target: "syringa", id = %key, "resolution frame entered");

        Ok(InFlightGuard { repo: self, key })
    }

    /// Snapshot of the in-flight chain; used by diagnostics and tests
    pub fn in_flight(&self) -> Vec<String> {
        self.in_flight.lock().expect("in-flight chain poisoned").clone()
    }

    // =========================================================================
    // Tracer
    // =========================================================================

    pub fn set_trace_level(&self, level: TraceLevel) {
        self.tracer.lock().expect("tracer poisoned").set_level(level);
    }

    /// Push a trace frame; returns a guard popping it on drop
    pub fn trace_push(&self, label: impl Into<String>, detail: bool) -> TraceFrame<'_> {
        self.tracer.lock().expect("tracer poisoned").push(label, detail);
        TraceFrame { repo: self }
    }

    /// Preserved frames for the last chain rooted at `root`
    pub fn trace_for(&self, root: &str) -> Option<Vec<String>> {
        self.tracer
            .lock()
            .expect("tracer poisoned")
            .trace_for(root)
            .map(|s| s.to_vec())
    }

    pub fn clear_traces(&self) {
        self.tracer.lock().expect("tracer poisoned").clear();
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("alias", &self.alias())
            .field("definitions", &self.definitions.len())
            .field("classes", &self.classes.len())
            .field("scope", &self.scope())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Guard for one entry of the in-flight chain
pub struct InFlightGuard<'a> {
    repo: &'a Repository,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut chain = self.repo.in_flight.lock().expect("in-flight chain poisoned");
        if let Some(pos) = chain.iter().rposition(|k| *k == self.key) {
            chain.remove(pos);
        }
    }
}

/// Guard for one pushed trace frame
pub struct TraceFrame<'a> {
    repo: &'a Repository,
}

impl Drop for TraceFrame<'_> {
    fn drop(&mut self) {
        self.repo.tracer.lock().expect("tracer poisoned").pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::value;

    #[test]
    fn test_locked_rejects_mutation() {
        let repo = Repository::new("test");
        repo.lock();

        let err = repo.set_definition("x", Definition::literal(1_i64), Lifetime::Singleton, vec![]);
        assert!(matches!(err, Err(DiError::Locked)));
        assert!(repo.set_environment("prod").is_err());
        assert!(repo.set_lazy_loading(false).is_err());
    }

    #[test]
    fn test_locked_read_paths_work() {
        let repo = Repository::new("test");
        repo.set_definition("x", Definition::literal(1_i64), Lifetime::Singleton, vec![])
            .unwrap();
        repo.lock();

        assert!(repo.has_definition("x"));
        assert!(repo.definition("x").is_some());
    }

    #[test]
    fn test_tag_index_tracks_membership() {
        let repo = Repository::new("test");
        repo.set_definition(
            "a",
            Definition::literal(1_i64),
            Lifetime::Singleton,
            vec!["io".into()],
        )
        .unwrap();
        repo.set_definition(
            "b",
            Definition::literal(2_i64),
            Lifetime::Singleton,
            vec!["io".into(), "net".into()],
        )
        .unwrap();

        let mut io = repo.tagged("io");
        io.sort();
        assert_eq!(io, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(repo.tagged("net"), vec!["b".to_string()]);
        assert!(repo.tagged("missing").is_empty());
    }

    #[test]
    fn test_scope_cursor_and_eviction() {
        let repo = Repository::new("test");
        assert_eq!(repo.scope(), ROOT_SCOPE);

        repo.set_scope("job-1");
        repo.set_scoped(repo.scoped_key("svc"), value(1_i64));
        repo.set_scoped("svc@root".to_string(), value(2_i64));
        assert!(repo.scoped("svc@job-1").is_some());

        repo.clear_scope();
        assert_eq!(repo.scope(), ROOT_SCOPE);
        assert!(repo.scoped("svc@job-1").is_none());
        // other labels survive
        assert!(repo.scoped("svc@root").is_some());
    }

    #[test]
    fn test_env_concrete_requires_environment() {
        let repo = Repository::new("test");
        repo.bind_interface_for_env("prod", "Clock", "SystemClock").unwrap();

        assert!(repo.env_concrete("Clock").is_none());

        repo.set_environment("prod").unwrap();
        assert_eq!(repo.env_concrete("Clock").as_deref(), Some("SystemClock"));

        repo.set_environment("dev").unwrap();
        assert!(repo.env_concrete("Clock").is_none());
    }

    #[test]
    fn test_in_flight_guard_pops_on_drop() {
        let repo = Repository::new("test");
        {
            let _a = repo.begin_resolution("def:a").unwrap();
            let _b = repo.begin_resolution("def:b").unwrap();
            assert_eq!(repo.in_flight().len(), 2);

            let cycle = repo.begin_resolution("def:a");
            assert!(matches!(cycle, Err(DiError::CircularDependency { .. })));
        }
        assert!(repo.in_flight().is_empty());
    }

    #[test]
    fn test_cache_key_prefixes_alias() {
        let repo = Repository::new("mail");
        assert_eq!(repo.make_cache_key("def:abc"), "mail:def:abc");
    }
}
