//! Structured-output schemas derived from Rust types.
//!
//! `schemars` produces a draft-07 schema with `definitions` and `$ref`s; model
//! APIs want a single self-contained object, so references are inlined here.
//! Provider-specific keyword filtering happens in the provider.

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A type the model can be asked to produce as JSON.
///
/// Blanket-implemented for every `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Fully inlined JSON schema for this type.
    fn response_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        if let Some(defs) = definitions {
            inline_refs(&mut value, &defs);
        }

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
            map.remove("title");
        }
        value
    }

    /// Name reported in schema validation errors.
    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(def) = ref_path
                    .strip_prefix("#/definitions/")
                    .and_then(|name| definitions.get(name))
                {
                    let description = map.get("description").cloned();
                    *value = def.clone();
                    keep_description(value, description);
                    inline_refs(value, definitions);
                    return;
                }
            }

            // schemars wraps a described `$ref` as `{ description, allOf: [ { $ref } ] }`.
            if let Some(Value::Array(all_of)) = map.get("allOf").cloned() {
                if let [single] = all_of.as_slice() {
                    let description = map.get("description").cloned();
                    *value = single.clone();
                    inline_refs(value, definitions);
                    keep_description(value, description);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

fn keep_description(value: &mut Value, description: Option<Value>) {
    if let (Value::Object(map), Some(description)) = (value, description) {
        map.insert("description".to_string(), description);
    }
}
