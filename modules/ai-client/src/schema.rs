use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Types the model can be forced to return through a tool's `input_schema`.
///
/// Blanket-implemented for anything that is `JsonSchema + DeserializeOwned`.
/// The generated schema is flattened for tool use:
/// - every object gets `additionalProperties: false`
/// - every property is listed in `required`, nullable or not
/// - `$ref`s are inlined and `definitions` / `$schema` are dropped
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn tool_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        if let Some(defs) = definitions {
            inline_refs(&mut value, &defs);
        }
        close_objects(&mut value);

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }
        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                let keys: Option<Vec<Value>> = map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| props.keys().cloned().map(Value::String).collect());
                if let Some(keys) = keys {
                    map.insert("required".to_string(), Value::Array(keys));
                }
            }
            map.values_mut().for_each(close_objects);
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .cloned();
            if let Some(def) = target {
                *value = def;
                inline_refs(value, definitions);
                return;
            }

            // schemars wraps single refs with metadata in a one-element allOf
            let single = match map.get("allOf") {
                Some(Value::Array(all_of)) if all_of.len() == 1 => all_of.first().cloned(),
                _ => None,
            };
            if let Some(inner) = single {
                *value = inner;
                inline_refs(value, definitions);
                return;
            }

            for v in map.values_mut() {
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
