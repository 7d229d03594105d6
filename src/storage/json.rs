//! Hierarchical JSON and YAML documents
//!
//! Mappings become objects, arrays of structures become arrays of objects
//! and leaves become plain numbers, strings or nested arrays. Empty
//! positions of a sequence are written as `null`; NaN is written as `null`
//! too and read back as NaN.

use serde_json::{Map, Value as JsonValue};

use crate::error::{OdsError, OdsResult};
use crate::ods::Ods;
use crate::path::{Path, Token};
use crate::value::Value;

use super::{LoadOptions, enumerate_filled_paths, import_leaves, read_leaf};

fn shape_error(tokens: &[Token], reason: &str) -> OdsError {
    let location = tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".");
    OdsError::Serialization(format!("`{}` {}", location, reason))
}

fn insert(slot: &mut JsonValue, tokens: &[Token], all: &[Token], leaf: JsonValue) -> OdsResult<()> {
    let Some((first, rest)) = tokens.split_first() else {
        *slot = leaf;
        return Ok(());
    };
    let here = &all[..all.len() - tokens.len()];
    match first {
        Token::Name(name) => {
            if slot.is_null() {
                *slot = JsonValue::Object(Map::new());
            }
            let map = slot
                .as_object_mut()
                .ok_or_else(|| shape_error(here, "is not an object"))?;
            insert(map.entry(name.clone()).or_insert(JsonValue::Null), rest, all, leaf)
        }
        Token::Index(index) if *index >= 0 => {
            if slot.is_null() {
                *slot = JsonValue::Array(Vec::new());
            }
            let items = slot
                .as_array_mut()
                .ok_or_else(|| shape_error(here, "is not an array"))?;
            let index = *index as usize;
            if items.len() <= index {
                items.resize(index + 1, JsonValue::Null);
            }
            insert(&mut items[index], rest, all, leaf)
        }
        _ => Err(shape_error(all, "is not a concrete path")),
    }
}

/// Document form of a tree
pub fn to_json_value(ods: &Ods) -> OdsResult<JsonValue> {
    let mut document = JsonValue::Object(Map::new());
    for path in enumerate_filled_paths(ods) {
        let value = read_leaf(ods, &path)?;
        insert(&mut document, path.tokens(), path.tokens(), value.to_json())?;
    }
    Ok(document)
}

fn collect(json: &JsonValue, prefix: &mut Vec<Token>, out: &mut Vec<(Path, Value)>) -> OdsResult<()> {
    match json {
        JsonValue::Object(map) => {
            for (name, child) in map {
                prefix.push(Token::Name(name.clone()));
                collect(child, prefix, out)?;
                prefix.pop();
            }
        }
        JsonValue::Array(items) if items.iter().any(JsonValue::is_object) => {
            for (index, item) in items.iter().enumerate() {
                match item {
                    JsonValue::Null => continue,
                    JsonValue::Object(_) => {
                        prefix.push(Token::Index(index as i64));
                        collect(item, prefix, out)?;
                        prefix.pop();
                    }
                    _ => return Err(shape_error(prefix, "mixes structures and data")),
                }
            }
        }
        leaf => {
            let value = Value::from_json(leaf)
                .ok_or_else(|| shape_error(prefix, "does not hold numbers or strings"))?;
            out.push((Path::from_tokens(prefix.iter().cloned())?, value));
        }
    }
    Ok(())
}

/// Load a document into `ods`; returns the number of leaves loaded
pub fn from_json_value(ods: &mut Ods, json: &JsonValue, options: &LoadOptions) -> OdsResult<usize> {
    if !json.is_object() {
        return Err(OdsError::Serialization(
            "document root must be an object".to_string(),
        ));
    }
    let mut leaves = Vec::new();
    collect(json, &mut Vec::new(), &mut leaves)?;
    leaves.retain(|(path, _)| options.wants(path));
    import_leaves(ods, leaves, options)
}

pub fn to_json_string(ods: &Ods) -> OdsResult<String> {
    Ok(serde_json::to_string_pretty(&to_json_value(ods)?)?)
}

pub fn from_json_str(ods: &mut Ods, content: &str, options: &LoadOptions) -> OdsResult<usize> {
    let json: JsonValue = serde_json::from_str(content)?;
    from_json_value(ods, &json, options)
}

pub fn to_yaml_string(ods: &Ods) -> OdsResult<String> {
    Ok(serde_yaml::to_string(&to_json_value(ods)?)?)
}

pub fn from_yaml_str(ods: &mut Ods, content: &str, options: &LoadOptions) -> OdsResult<usize> {
    let json: JsonValue = serde_yaml::from_str(content)?;
    from_json_value(ods, &json, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_placeholders_become_null() {
        let mut ods = Ods::new().unwrap();
        ods.set("pf_active.coil.0.name", "PF1").unwrap();
        ods.set("pf_active.coil.1.name", "PF2").unwrap();
        ods.set("pf_active.coil.2.name", "PF3").unwrap();
        ods.delete("pf_active.coil.1").unwrap();

        let document = to_json_value(&ods).unwrap();
        assert_eq!(
            document,
            json!({"pf_active": {"coil": [{"name": "PF1"}, null, {"name": "PF3"}]}})
        );

        let mut back = Ods::new().unwrap();
        from_json_value(&mut back, &document, &LoadOptions::new()).unwrap();
        assert_eq!(back.get("pf_active.coil.2.name").unwrap(), Value::from("PF3"));
        assert!(!back.contains("pf_active.coil.1.name"));
    }

    #[test]
    fn test_mixed_arrays_are_rejected() {
        let mut ods = Ods::new().unwrap();
        let document = json!({"pf_active": {"coil": [{"name": "PF1"}, 3]}});
        assert!(matches!(
            from_json_value(&mut ods, &document, &LoadOptions::new()),
            Err(OdsError::Serialization(_))
        ));
        assert!(from_json_value(&mut ods, &json!([1, 2]), &LoadOptions::new()).is_err());
    }
}
