use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use synthdoc_core::{HookRef, KeySpec, Model, Property, PropertyData};
use tracing::{debug, warn};

use crate::coerce::{transform_value_to_type, zero_value};
use crate::document::{Document, get_path, set_path};
use crate::errors::GenerationError;
use crate::hooks::{Globals, HookContext, HookRegistry};
use crate::index::{FieldEntry, FieldPathIndex};
use crate::inputs::Inputs;
use crate::random::SeededRandomContext;
use crate::store::DocumentStore;

const KEY_FIELD: &str = "key";
const FAKE_SLOT: &str = "fake";

/// Builds documents of one model.
///
/// A builder is shared by every in-flight build of its model; the only
/// per-document state is the RNG stream derived from the generation index.
pub struct DocumentBuilder {
    model: Arc<Model>,
    fields: FieldPathIndex,
    hooks: Arc<HookRegistry>,
    random: SeededRandomContext,
    globals: Globals,
    inputs: Arc<Inputs>,
    store: DocumentStore,
    strict: bool,
    generated: AtomicU64,
    hook_errors: AtomicU64,
}

impl DocumentBuilder {
    pub fn new(model: Arc<Model>, hooks: Arc<HookRegistry>, random: SeededRandomContext) -> Self {
        let fields = FieldPathIndex::build(&model);
        Self {
            model,
            fields,
            hooks,
            random,
            globals: Globals::new(),
            inputs: Arc::new(Inputs::new()),
            store: DocumentStore::new(),
            strict: false,
            generated: AtomicU64::new(0),
            hook_errors: AtomicU64::new(0),
        }
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = Arc::new(inputs);
        self
    }

    /// Store holding the documents of this model's dependencies.
    pub fn with_store(mut self, store: DocumentStore) -> Self {
        self.store = store;
        self
    }

    /// Fail the build on the first hook error instead of recovering.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn fields(&self) -> &FieldPathIndex {
        &self.fields
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Root documents built so far.
    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    /// Hook errors recovered (or escalated) so far.
    pub fn hook_errors(&self) -> u64 {
        self.hook_errors.load(Ordering::Relaxed)
    }

    /// Build the root document for generation `index`.
    pub fn build(&self, index: u64) -> Result<Document, GenerationError> {
        let mut pass = Pass::new(self, self.random.document_rng(index), index);
        let mut body = pass.document(
            &self.fields,
            self.model.data.pre_build.as_ref(),
            self.model.data.post_build.as_ref(),
        )?;
        let key = pass.resolve_key(&mut body)?;
        self.generated.fetch_add(1, Ordering::Relaxed);
        debug!(model = %self.model.name, index, key = %key, "document built");
        Ok(Document::new(key, self.model.name.clone(), body))
    }

    /// Run a model-level hook (`pre_run`, `post_run`) once.
    pub fn run_model_hook(
        &self,
        slot: &str,
        hook: Option<&HookRef>,
    ) -> Result<Option<Value>, GenerationError> {
        let Some(hook) = hook else {
            return Ok(None);
        };
        let mut pass = Pass::new(self, self.random.model_rng(), 0);
        let mut body = Map::new();
        pass.hook(&mut body, slot, None, hook)
    }
}

/// One build pass: the builder plus the RNG stream of a single document.
struct Pass<'b> {
    builder: &'b DocumentBuilder,
    rng: ChaCha8Rng,
    index: u64,
}

impl<'b> Pass<'b> {
    fn new(builder: &'b DocumentBuilder, rng: ChaCha8Rng, index: u64) -> Self {
        Self {
            builder,
            rng,
            index,
        }
    }

    /// The four phases over one (sub-)document index.
    fn document(
        &mut self,
        fields: &FieldPathIndex,
        pre_build: Option<&HookRef>,
        post_build: Option<&HookRef>,
    ) -> Result<Map<String, Value>, GenerationError> {
        let mut body = Map::new();
        for entry in fields.entries() {
            set_path(&mut body, &entry.doc_path, zero_value(entry.property.ty));
        }

        if let Some(hook) = pre_build {
            self.hook(&mut body, "", None, hook)?;
        }

        for entry in fields.entries() {
            self.build_field(fields, entry, &mut body)?;
        }

        for entry in fields.entries().iter().rev() {
            self.post_field(entry, &mut body)?;
        }

        if let Some(hook) = post_build
            && let Some(Value::Object(replaced)) = self.hook(&mut body, "", None, hook)?
        {
            body = replaced;
        }
        Ok(body)
    }

    fn build_field(
        &mut self,
        fields: &FieldPathIndex,
        entry: &FieldEntry,
        body: &mut Map<String, Value>,
    ) -> Result<(), GenerationError> {
        let property = &entry.property;
        let field = entry.dotted();
        if let Some(hook) = &property.data.pre_build {
            let current = get_path(body, &entry.doc_path).cloned();
            if let Some(value) = self.hook(body, &field, current, hook)? {
                set_path(body, &entry.doc_path, value);
            }
        }
        if entry.container {
            return Ok(());
        }

        let current = get_path(body, &entry.doc_path).cloned();
        if let Some(value) = self.resolve(fields, &entry.schema_path, property, body, &field, current)? {
            set_path(body, &entry.doc_path, value);
        }
        Ok(())
    }

    /// Build-phase value of a single property: literal, build hook, fake
    /// template or generated array, in that order. `None` is undefined.
    fn resolve(
        &mut self,
        fields: &FieldPathIndex,
        schema_path: &str,
        property: &Property,
        body: &mut Map<String, Value>,
        field: &str,
        current: Option<Value>,
    ) -> Result<Option<Value>, GenerationError> {
        let data = &property.data;
        if let Some(value) = &data.value {
            return Ok(Some(value.clone()));
        }
        if let Some(hook) = &data.build {
            return self.hook(body, field, current, hook);
        }
        if let Some(template) = &data.fake {
            let faker = self.builder.random.faker();
            return match faker.expand(template, &mut self.rng) {
                Ok(value) => Ok(Some(Value::String(value))),
                Err(err) => self.recover(field, FAKE_SLOT, err),
            };
        }
        if property.ty.is_array() {
            return self.array(fields, schema_path, property, body, field).map(Some);
        }
        Ok(None)
    }

    fn array(
        &mut self,
        fields: &FieldPathIndex,
        schema_path: &str,
        property: &Property,
        body: &mut Map<String, Value>,
        field: &str,
    ) -> Result<Value, GenerationError> {
        let Some(items) = property.items.as_deref() else {
            return Ok(Value::Array(Vec::new()));
        };
        let cardinality = if property.data.has_cardinality() {
            &property.data
        } else {
            &items.data
        };
        let count = self.item_count(cardinality);
        let items_path = format!("{schema_path}.items");

        let fallback;
        let sub_fields = if items.is_container() {
            match fields.items(&items_path) {
                Some(sub) => Some(sub),
                None => {
                    fallback = FieldPathIndex::from_properties(&items.properties, &items_path);
                    Some(&fallback)
                }
            }
        } else {
            None
        };

        let mut values = Vec::new();
        for position in 0..count {
            let item_field = format!("{field}.{position}");
            let item = if let Some(sub_fields) = sub_fields {
                let sub = self.document(
                    sub_fields,
                    items.data.pre_build.as_ref(),
                    items.data.post_build.as_ref(),
                )?;
                Some(Value::Object(sub))
            } else {
                self.resolve(fields, &items_path, items, body, &item_field, None)?
            };
            if let Some(item) = item {
                values.push(item);
            }
        }
        Ok(Value::Array(values))
    }

    fn item_count(&mut self, data: &PropertyData) -> usize {
        let count = if data.count > 0 {
            data.count
        } else if data.max > 0 {
            self.rng.random_range(data.min.min(data.max)..=data.max)
        } else {
            0
        };
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    fn post_field(
        &mut self,
        entry: &FieldEntry,
        body: &mut Map<String, Value>,
    ) -> Result<(), GenerationError> {
        let property = &entry.property;
        let field = entry.dotted();
        let Some(mut value) = get_path(body, &entry.doc_path).cloned() else {
            return Ok(());
        };

        if let Some(hook) = &property.data.post_build
            && let Some(next) = self.hook(body, &field, Some(value.clone()), hook)?
            && !next.is_null()
        {
            value = next;
        }

        if let (Value::Array(values), Some(items)) = (&mut value, property.items.as_deref()) {
            self.post_items(items, values, body, &field)?;
        }

        let value = transform_value_to_type(Some(property.ty), value);
        set_path(body, &entry.doc_path, value);
        Ok(())
    }

    /// Element-level `post_build` and coercion for array items. Container
    /// items were built as sub-documents and already ran their own
    /// `post_build`; generated items run it here whatever their shape.
    fn post_items(
        &mut self,
        items: &Property,
        values: &mut [Value],
        body: &mut Map<String, Value>,
        field: &str,
    ) -> Result<(), GenerationError> {
        if items.is_container() {
            return Ok(());
        }
        for (position, value) in values.iter_mut().enumerate() {
            let item_field = format!("{field}.{position}");
            if let (Value::Array(inner), Some(inner_items)) = (&mut *value, items.items.as_deref()) {
                self.post_items(inner_items, inner, body, &item_field)?;
            }
            if let Some(hook) = &items.data.post_build
                && let Some(next) = self.hook(body, &item_field, Some(value.clone()), hook)?
                && !next.is_null()
            {
                *value = next;
            }
            *value = transform_value_to_type(Some(items.ty), value.take());
        }
        Ok(())
    }

    fn resolve_key(&mut self, body: &mut Map<String, Value>) -> Result<String, GenerationError> {
        let builder = self.builder;
        let resolved = match &builder.model.key {
            Some(KeySpec::Path(path)) => get_path(body, path.split('.')).cloned(),
            Some(KeySpec::Built(property)) => {
                self.resolve(&builder.fields, KEY_FIELD, property, body, KEY_FIELD, None)?
            }
            None => None,
        };
        Ok(resolved
            .and_then(key_string)
            .unwrap_or_else(|| format!("{}_{}", builder.model.name, self.index)))
    }

    /// Invoke a hook, converting errors and panics per the failure policy.
    fn hook(
        &mut self,
        body: &mut Map<String, Value>,
        field: &str,
        current: Option<Value>,
        reference: &HookRef,
    ) -> Result<Option<Value>, GenerationError> {
        let builder = self.builder;
        let rng = &mut self.rng;
        let index = self.index;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = HookContext {
                model: &builder.model.name,
                field,
                document: body,
                current,
                globals: &builder.globals,
                inputs: &*builder.inputs,
                faker: builder.random.faker(),
                rng,
                index,
                store: &builder.store,
                registry: &*builder.hooks,
            };
            builder.hooks.call(&mut ctx, reference)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(GenerationError::Hook {
                model: builder.model.name.clone(),
                field: field.to_string(),
                hook: reference.name().to_string(),
                message: panic_message(panic),
            }),
        };
        match result {
            Ok(value) => Ok(value),
            Err(err) => self.recover(field, reference.name(), err),
        }
    }

    fn recover(
        &self,
        field: &str,
        hook: &str,
        err: GenerationError,
    ) -> Result<Option<Value>, GenerationError> {
        let builder = self.builder;
        builder.hook_errors.fetch_add(1, Ordering::Relaxed);
        let message = match err {
            GenerationError::Hook { message, .. } => message,
            other => other.to_string(),
        };
        warn!(
            model = %builder.model.name,
            field,
            hook,
            index = self.index,
            error = %message,
            "hook failed"
        );
        if builder.strict {
            return Err(GenerationError::Hook {
                model: builder.model.name.clone(),
                field: field.to_string(),
                hook: hook.to_string(),
                message,
            });
        }
        Ok(None)
    }
}

fn key_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "hook panicked".to_string()
    }
}
