//! Named, statically compiled hooks that models reference from their
//! `build`, `pre_build`, `post_build`, `pre_run` and `post_run` slots.

mod lookup;
mod primitives;
mod text;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use rand::RngCore;
use serde_json::{Map, Value};
use synthdoc_core::{HookRef, Model};

use crate::document::{Document, get_path};
use crate::errors::GenerationError;
use crate::faker::Faker;
use crate::inputs::Inputs;
use crate::store::DocumentStore;

/// Everything a hook can see while it runs.
pub struct HookContext<'a> {
    pub model: &'a str,
    /// Dotted document path of the field being built; empty for
    /// document- and model-level hooks.
    pub field: &'a str,
    /// The in-progress document (or sub-document for object array items).
    pub document: &'a mut Map<String, Value>,
    /// The field's working value before this hook ran.
    pub current: Option<Value>,
    pub globals: &'a Globals,
    pub inputs: &'a Inputs,
    pub faker: &'a Faker,
    pub rng: &'a mut dyn RngCore,
    /// Zero-based generation index of the root document.
    pub index: u64,
    /// Completed documents of dependency models.
    pub store: &'a DocumentStore,
    pub registry: &'a HookRegistry,
}

impl HookContext<'_> {
    /// Run another registered hook with this context.
    pub fn invoke(&mut self, reference: &HookRef) -> Result<Option<Value>, GenerationError> {
        let registry = self.registry;
        registry.call(self, reference)
    }

    /// Dotted path lookup into the in-progress document.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        get_path(self.document, path.split('.'))
    }

    pub fn dependency(&self, model: &str) -> Option<Arc<Vec<Document>>> {
        self.store.get(model)
    }

    pub(crate) fn error(&self, hook: &str, message: impl Into<String>) -> GenerationError {
        GenerationError::Hook {
            model: self.model.to_string(),
            field: self.field.to_string(),
            hook: hook.to_string(),
            message: message.into(),
        }
    }
}

/// A computed-field extension point.
///
/// `Ok(None)` means "undefined": the field keeps its working value and an
/// array item is skipped. `Ok(Some(Value::Null))` is an explicit null.
pub trait Hook: Send + Sync {
    fn id(&self) -> &'static str;

    /// Check params before generation starts.
    fn validate(&self, _params: Option<&Value>) -> Result<(), GenerationError> {
        Ok(())
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError>;
}

type HookFn = dyn Fn(&mut HookContext<'_>, Option<&Value>) -> Result<Option<Value>, GenerationError>
    + Send
    + Sync;

/// Adapter so plain closures can be registered as hooks.
pub struct FnHook {
    id: &'static str,
    func: Box<HookFn>,
}

impl FnHook {
    pub fn new<F>(id: &'static str, func: F) -> Self
    where
        F: Fn(&mut HookContext<'_>, Option<&Value>) -> Result<Option<Value>, GenerationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id,
            func: Box::new(func),
        }
    }
}

impl Hook for FnHook {
    fn id(&self) -> &'static str {
        self.id
    }

    fn call(
        &self,
        ctx: &mut HookContext<'_>,
        params: Option<&Value>,
    ) -> Result<Option<Value>, GenerationError> {
        (self.func)(ctx, params)
    }
}

/// Hook lookup by name.
pub struct HookRegistry {
    hooks: BTreeMap<&'static str, Box<dyn Hook>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Registry preloaded with the built-in hooks.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        primitives::register(&mut registry);
        text::register(&mut registry);
        lookup::register(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            hooks: BTreeMap::new(),
        }
    }

    /// Add or replace a hook under its id.
    pub fn register(&mut self, hook: Box<dyn Hook>) {
        self.hooks.insert(hook.id(), hook);
    }

    pub fn register_fn<F>(&mut self, id: &'static str, func: F)
    where
        F: Fn(&mut HookContext<'_>, Option<&Value>) -> Result<Option<Value>, GenerationError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Box::new(FnHook::new(id, func)));
    }

    pub fn get(&self, id: &str) -> Option<&dyn Hook> {
        self.hooks.get(id).map(|hook| hook.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hooks.keys().copied()
    }

    pub fn call(
        &self,
        ctx: &mut HookContext<'_>,
        reference: &HookRef,
    ) -> Result<Option<Value>, GenerationError> {
        let hook = self.get(reference.name()).ok_or_else(|| GenerationError::UnknownHook {
            model: ctx.model.to_string(),
            location: ctx.field.to_string(),
            hook: reference.name().to_string(),
        })?;
        hook.call(ctx, reference.params())
    }

    /// Resolve every hook a model references and validate its params.
    pub fn check_model(&self, model: &Model) -> Result<(), GenerationError> {
        for (location, reference) in model.hook_refs() {
            let hook = self.get(reference.name()).ok_or_else(|| GenerationError::UnknownHook {
                model: model.name.clone(),
                location: location.clone(),
                hook: reference.name().to_string(),
            })?;
            hook.validate(reference.params()).map_err(|err| {
                GenerationError::InvalidParams(format!("{}: {location}: {err}", model.name))
            })?;
        }
        Ok(())
    }
}

/// Model-scoped mutable state shared by every hook of one model run.
///
/// Builds of the same model run concurrently, so read-modify-write sequences
/// should go through [`Globals::update`] to stay atomic.
#[derive(Debug, Clone, Default)]
pub struct Globals(Arc<Mutex<Map<String, Value>>>);

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value);
    }

    /// Apply `update` to the current value under the lock and store the result.
    pub fn update(&self, key: &str, update: impl FnOnce(Option<&Value>) -> Value) -> Value {
        let mut map = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let next = update(map.get(key));
        map.insert(key.to_string(), next.clone());
        next
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
