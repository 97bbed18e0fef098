use std::sync::Arc;

use serde_json::{Value, json};

use synthdoc_core::{Model, NormalizeOptions, normalize_model};
use synthdoc_generate::errors::GenerationError;
use synthdoc_generate::{DocumentBuilder, HookRegistry, LocaleKey, SeededRandomContext};

fn builder_with(value: Value, hooks: HookRegistry) -> DocumentBuilder {
    let mut model = Model::from_value(value).expect("parse model");
    normalize_model(&mut model, &NormalizeOptions::default()).expect("normalize");
    let random = SeededRandomContext::new(model.seed_value(), LocaleKey::EnUs).expect("random");
    DocumentBuilder::new(Arc::new(model), Arc::new(hooks), random)
}

fn builder(value: Value) -> DocumentBuilder {
    builder_with(value, HookRegistry::new())
}

#[test]
fn document_pre_build_sees_zero_values_and_can_seed_fields() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("stage", |ctx, _| {
        assert_eq!(ctx.lookup("name"), Some(&json!("")));
        ctx.document.insert("stage".to_string(), json!("pre"));
        Ok(Some(json!("ignored")))
    });
    let users = builder_with(
        json!({
            "name": "users",
            "type": "object",
            "data": { "pre_build": "stage" },
            "properties": {
                "name": { "type": "string" },
                "copied": { "type": "string", "data": { "build": { "hook": "field.copy", "params": { "field": "stage" } } } }
            }
        }),
        hooks,
    );

    let document = users.build(0).expect("build");
    assert_eq!(document.get("copied"), Some(&json!("pre")));
    assert_eq!(document.get("name"), Some(&json!("")));
}

#[test]
fn post_build_null_keeps_the_built_value() {
    let users = builder(json!({
        "name": "users",
        "type": "object",
        "properties": {
            "kept": { "type": "integer", "data": { "value": 5, "post_build": "null" } },
            "shout": {
                "type": "string",
                "data": { "value": "ada", "post_build": { "hook": "case", "params": { "mode": "upper" } } }
            }
        }
    }));

    let document = users.build(0).expect("build");
    assert_eq!(document.get("kept"), Some(&json!(5)));
    assert_eq!(document.get("shout"), Some(&json!("ADA")));
}

#[test]
fn values_are_coerced_to_their_declared_type() {
    let users = builder(json!({
        "name": "users",
        "type": "object",
        "properties": {
            "label": { "type": "string", "data": { "value": 42 } },
            "age": { "type": "integer", "data": { "value": " 7 " } },
            "ratio": { "type": "double", "data": { "value": "0.25" } },
            "active": { "type": "boolean", "data": { "value": "false" } },
            "loose": { "type": "integer", "data": { "value": "n/a" } }
        }
    }));

    let document = users.build(0).expect("build");
    assert_eq!(document.get("label"), Some(&json!("42")));
    assert_eq!(document.get("age"), Some(&json!(7)));
    assert_eq!(document.get("ratio"), Some(&json!(0.25)));
    assert_eq!(document.get("active"), Some(&json!(false)));
    assert_eq!(document.get("loose"), Some(&json!("n/a")));
}

#[test]
fn children_finish_post_build_before_their_parent() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("snapshot", |ctx, _| {
        Ok(Some(json!({ "seen": ctx.lookup("profile.name").cloned() })))
    });
    let users = builder_with(
        json!({
            "name": "users",
            "type": "object",
            "properties": {
                "profile": {
                    "type": "object",
                    "data": { "post_build": "snapshot" },
                    "properties": {
                        "name": {
                            "type": "string",
                            "data": { "value": "ada", "post_build": { "hook": "case", "params": { "mode": "upper" } } }
                        }
                    }
                }
            }
        }),
        hooks,
    );

    let document = users.build(0).expect("build");
    assert_eq!(document.get("profile"), Some(&json!({ "seen": "ADA" })));
}

#[test]
fn document_post_build_object_replaces_the_body() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("wrap", |ctx, _| {
        let inner = Value::Object(ctx.document.clone());
        Ok(Some(json!({ "wrapped": inner })))
    });
    let users = builder_with(
        json!({
            "name": "users",
            "type": "object",
            "data": { "post_build": "wrap" },
            "properties": { "id": { "type": "integer", "data": { "build": "sequence" } } }
        }),
        hooks,
    );

    let document = users.build(4).expect("build");
    assert_eq!(document.into_value(), json!({ "wrapped": { "id": 4 } }));
}

#[test]
fn keys_resolve_from_paths_built_properties_or_fallback() {
    let by_path = builder(json!({
        "name": "users",
        "type": "object",
        "key": "profile.id",
        "properties": {
            "profile": {
                "type": "object",
                "properties": { "id": { "type": "integer", "data": { "build": { "hook": "sequence", "params": { "start": 100 } } } } }
            }
        }
    }));
    assert_eq!(by_path.build(2).expect("build").key, "102");

    let built = builder(json!({
        "name": "users",
        "type": "object",
        "key": { "type": "string", "data": { "build": { "hook": "template", "params": { "template": "U-{{index}}" } } } },
        "properties": {}
    }));
    assert_eq!(built.build(2).expect("build").key, "U-2");

    let fallback = builder(json!({
        "name": "users",
        "type": "object",
        "key": "missing",
        "properties": { "id": { "type": "integer" } }
    }));
    assert_eq!(fallback.build(3).expect("build").key, "users_3");
}

#[test]
fn seeded_arrays_stay_within_their_range() {
    let users = builder(json!({
        "name": "users",
        "type": "object",
        "seed": 11,
        "properties": {
            "tags": {
                "type": "array",
                "data": { "min": 2, "max": 10 },
                "items": { "type": "string", "data": { "fake": "{{lorem.word}}" } }
            },
            "fixed": {
                "type": "array",
                "items": { "type": "integer", "data": { "count": 3, "build": "sequence" } }
            },
            "skipped": {
                "type": "array",
                "data": { "count": 4 },
                "items": { "type": "string", "data": { "build": "omit" } }
            }
        }
    }));

    for index in 0..20 {
        let document = users.build(index).expect("build");
        let tags = document.get("tags").and_then(Value::as_array).expect("tags");
        assert!((2..=10).contains(&tags.len()), "length {}", tags.len());
        assert!(tags.iter().all(Value::is_string));
        assert_eq!(document.get("fixed"), Some(&json!([index, index, index])));
        assert_eq!(document.get("skipped"), Some(&json!([])));
    }
}

#[test]
fn unseeded_array_lengths_vary() {
    let users = builder(json!({
        "name": "users",
        "type": "object",
        "properties": {
            "tags": {
                "type": "array",
                "data": { "min": 0, "max": 50 },
                "items": { "type": "integer", "data": { "value": 1 } }
            }
        }
    }));

    let lengths: std::collections::BTreeSet<usize> = (0..20)
        .map(|index| {
            let document = users.build(index).expect("build");
            document.get("tags").and_then(Value::as_array).map_or(0, Vec::len)
        })
        .collect();
    assert!(lengths.len() > 1);
}

#[test]
fn object_items_are_built_as_sub_documents() {
    let orders = builder(json!({
        "name": "orders",
        "type": "object",
        "seed": 3,
        "properties": {
            "lines": {
                "type": "array",
                "data": { "count": 3 },
                "items": {
                    "type": "object",
                    "data": { "post_build": { "hook": "field.copy", "params": { "field": "sku" } } },
                    "properties": {
                        "sku": { "type": "string", "data": { "build": { "hook": "pick", "params": { "values": ["A", "B"] } } } },
                        "qty": { "type": "integer", "data": { "build": { "hook": "int.range", "params": { "min": 1, "max": 9 } } } }
                    }
                }
            }
        }
    }));

    let document = orders.build(0).expect("build");
    let lines = document.get("lines").and_then(Value::as_array).expect("lines");
    assert_eq!(lines.len(), 3);
    for line in lines {
        let sku = line.get("sku").and_then(Value::as_str).expect("sku");
        assert!(sku == "A" || sku == "B");
        let qty = line.get("qty").and_then(Value::as_i64).expect("qty");
        assert!((1..=9).contains(&qty));
    }
}

#[test]
fn scalar_items_run_element_post_build() {
    let users = builder(json!({
        "name": "users",
        "type": "object",
        "properties": {
            "codes": {
                "type": "array",
                "data": { "count": 2 },
                "items": {
                    "type": "string",
                    "data": { "value": "ab", "post_build": { "hook": "case", "params": { "mode": "upper" } } }
                }
            }
        }
    }));

    let document = users.build(0).expect("build");
    assert_eq!(document.get("codes"), Some(&json!(["AB", "AB"])));
}

#[test]
fn same_seed_same_documents() {
    let model = json!({
        "name": "users",
        "type": "object",
        "seed": 42,
        "properties": {
            "id": { "type": "string", "data": { "build": "uuid" } },
            "name": { "type": "string", "data": { "fake": "{{name.first_name}} {{name.last_name}}" } },
            "score": { "type": "double", "data": { "build": { "hook": "float.range", "params": { "min": 0.0, "max": 1.0 } } } }
        }
    });

    let first = builder(model.clone());
    let second = builder(model.clone());
    for index in [0, 1, 7] {
        assert_eq!(first.build(index).expect("build"), second.build(index).expect("build"));
    }
    assert_ne!(first.build(0).expect("build"), first.build(1).expect("build"));

    let mut reseeded = model;
    reseeded["seed"] = json!(43);
    let other = builder(reseeded);
    assert_ne!(first.build(0).expect("build").get("id"), other.build(0).expect("build").get("id"));
}

fn failing_hooks() -> HookRegistry {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("boom", |ctx, _| Err(GenerationError::InvalidParams(format!("{} exploded", ctx.field))));
    hooks.register_fn("panics", |_, _| panic!("hook panicked"));
    hooks
}

fn failing_model() -> Value {
    json!({
        "name": "users",
        "type": "object",
        "properties": {
            "name": { "type": "string", "data": { "build": "boom" } },
            "age": { "type": "integer", "data": { "value": 30, "post_build": "panics" } },
            "ok": { "type": "boolean", "data": { "value": true } }
        }
    })
}

#[test]
fn hook_failures_are_recovered_by_default() {
    let users = builder_with(failing_model(), failing_hooks());

    let document = users.build(0).expect("build");
    assert_eq!(document.get("name"), Some(&json!("")));
    assert_eq!(document.get("age"), Some(&json!(30)));
    assert_eq!(document.get("ok"), Some(&json!(true)));
    assert_eq!(users.hook_errors(), 2);
    assert_eq!(users.generated(), 1);
}

#[test]
fn strict_builders_fail_on_the_first_hook_error() {
    let users = builder_with(failing_model(), failing_hooks()).strict(true);

    let err = users.build(0).unwrap_err();
    match err {
        GenerationError::Hook { field, hook, message, .. } => {
            assert_eq!(field, "name");
            assert_eq!(hook, "boom");
            assert!(message.contains("exploded"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(users.generated(), 0);
}

#[test]
fn model_hooks_share_globals_with_builds() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("prepare", |ctx, _| {
        ctx.globals.set("prefix", json!("run-"));
        Ok(None)
    });
    hooks.register_fn("prefixed", |ctx, _| {
        let prefix = ctx.globals.get("prefix").and_then(|v| v.as_str().map(str::to_string));
        Ok(prefix.map(|prefix| json!(format!("{prefix}{}", ctx.index))))
    });
    let users = builder_with(
        json!({
            "name": "users",
            "type": "object",
            "data": { "pre_run": "prepare" },
            "properties": { "tag": { "type": "string", "data": { "build": "prefixed" } } }
        }),
        hooks,
    );

    let pre_run = users.model().data.pre_run.clone();
    users.run_model_hook("data.pre_run", pre_run.as_ref()).expect("pre_run");
    assert_eq!(users.build(8).expect("build").get("tag"), Some(&json!("run-8")));
}

#[test]
fn negative_and_fractional_seeds_are_deterministic() {
    for seed in [json!(-5), json!(1.5)] {
        let model = json!({
            "name": "users",
            "type": "object",
            "seed": seed,
            "properties": { "id": { "type": "string", "data": { "build": "uuid" } } }
        });

        let first = builder(model.clone());
        let second = builder(model);
        assert_eq!(first.build(0).expect("build"), second.build(0).expect("build"));
        assert_eq!(first.build(3).expect("build"), second.build(3).expect("build"));
    }
}

#[test]
fn generated_object_items_run_element_post_build() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("obj", |_, _| Ok(Some(json!({ "x": 1 }))));
    hooks.register_fn("mark", |ctx, _| {
        let mut item = ctx.current.clone().unwrap_or_else(|| json!({}));
        if let Some(map) = item.as_object_mut() {
            map.insert("marked".to_string(), json!(true));
        }
        Ok(Some(item))
    });
    let users = builder_with(
        json!({
            "name": "users",
            "type": "object",
            "properties": {
                "list": {
                    "type": "array",
                    "items": { "type": "object", "data": { "build": "obj", "post_build": "mark", "count": 2 } }
                }
            }
        }),
        hooks,
    );

    let document = users.build(0).expect("build");
    assert_eq!(
        document.get("list"),
        Some(&json!([{ "x": 1, "marked": true }, { "x": 1, "marked": true }]))
    );
    assert_eq!(users.hook_errors(), 0);
}

#[test]
fn field_pre_build_is_kept_only_without_a_later_generator() {
    let mut hooks = HookRegistry::new();
    hooks.register_fn("early", |_, _| Ok(Some(json!("from-pre"))));
    let users = builder_with(
        json!({
            "name": "users",
            "type": "object",
            "properties": {
                "a": { "type": "string", "data": { "pre_build": "early" } },
                "b": { "type": "string", "data": { "pre_build": "early", "value": "lit" } }
            }
        }),
        hooks,
    );

    let document = users.build(0).expect("build");
    assert_eq!(document.into_value(), json!({ "a": "from-pre", "b": "lit" }));
}
