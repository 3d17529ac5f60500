//! Schema registry: one independent engine per registered schema.
//!
//! Engines live in an arena indexed by [`EngineId`]; routes refer to engines
//! by id only. The registry is built once and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use dynaschema_core::RegistryError;
use dynaschema_engine::{Engine, PersistedQueries, ResolverMap};
use tracing::info;

/// Index of an engine in its [`SchemaRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(usize);

impl EngineId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A schema to register: SDL, resolvers and where to serve it.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub name: String,
    pub sdl: String,
    pub resolvers: ResolverMap,
    /// Serving path; the builder's default path when `None`.
    pub path: Option<String>,
    pub persisted_queries: PersistedQueries,
}

impl SchemaEntry {
    pub fn new(name: impl Into<String>, sdl: impl Into<String>, resolvers: ResolverMap) -> Self {
        Self {
            name: name.into(),
            sdl: sdl.into(),
            resolvers,
            path: None,
            persisted_queries: PersistedQueries::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_persisted_queries(mut self, queries: PersistedQueries) -> Self {
        self.persisted_queries = queries;
        self
    }
}

struct Slot {
    engine: Arc<Engine>,
    path: String,
}

/// All engines, in registration order.
pub struct SchemaRegistry {
    slots: Vec<Slot>,
    by_name: HashMap<String, EngineId>,
}

impl SchemaRegistry {
    /// Build every entry in order. The first failure aborts the whole build.
    pub fn build(entries: Vec<SchemaEntry>, default_path: &str) -> Result<Self, RegistryError> {
        if entries.is_empty() {
            return Err(RegistryError::NoSchemas);
        }

        let mut slots = Vec::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len());

        for entry in entries {
            if by_name.contains_key(&entry.name) {
                return Err(RegistryError::DuplicateSchema(entry.name));
            }
            let path = entry.path.unwrap_or_else(|| default_path.to_string());
            if !is_valid_path(&path) {
                return Err(RegistryError::InvalidPath {
                    schema: entry.name,
                    path,
                });
            }

            let engine = Engine::build(entry.name.clone(), &entry.sdl, entry.resolvers)?
                .with_persisted_queries(entry.persisted_queries);

            info!(schema = %entry.name, path = %path, "Registered schema");
            by_name.insert(entry.name, EngineId(slots.len()));
            slots.push(Slot {
                engine: Arc::new(engine),
                path,
            });
        }

        Ok(Self { slots, by_name })
    }

    /// The engine behind `id`. Ids are only minted by this registry.
    pub fn engine(&self, id: EngineId) -> &Arc<Engine> {
        &self.slots[id.0].engine
    }

    /// Serving path of `id`.
    pub fn path(&self, id: EngineId) -> &str {
        &self.slots[id.0].path
    }

    pub fn id_of(&self, name: &str) -> Option<EngineId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Engine>> {
        self.id_of(name).map(|id| self.engine(id))
    }

    /// `(id, engine)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (EngineId, &Arc<Engine>)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (EngineId(index), &slot.engine))
    }

    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.engine.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.names())
            .finish()
    }
}

/// Whether `path` can be served as a route.
///
/// Paths start with `/`. Segments may not start with `:` or `*`, and `{}`
/// captures must be balanced and not nested.
pub fn is_valid_path(path: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    path.split('/').all(|segment| {
        if segment.starts_with(':') || segment.starts_with('*') {
            return false;
        }
        let mut open = false;
        for c in segment.chars() {
            match c {
                '{' if open => return false,
                '{' => open = true,
                '}' if !open => return false,
                '}' => open = false,
                _ => {}
            }
        }
        !open
    })
}
