//! Structural checks against each kind's OpenAPI schema.
//!
//! Runs before any business rule. Unknown properties and missing required
//! properties each produce one cause; a request with any structural cause
//! is denied without reaching its kind's policy.

use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    JSONSchemaProps, JSONSchemaPropsOrArray, JSONSchemaPropsOrBool,
};
use serde_json::Value;

use super::cause::{Cause, FieldPath};
use super::kind::ResourceKind;

/// Root fields the API server owns; generated schemas omit them.
const ROOT_FIELDS: [&str; 3] = ["apiVersion", "kind", "metadata"];

/// Shape check consumed by the router.
pub trait SchemaValidator: Send + Sync {
    fn check_shape(&self, kind: ResourceKind, object: &Value) -> Vec<Cause>;
}

/// Validator using the schemas generated for the typed resources.
pub struct CrdSchemaValidator {
    schemas: BTreeMap<ResourceKind, JSONSchemaProps>,
}

impl Default for CrdSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CrdSchemaValidator {
    pub fn new() -> Self {
        let schemas = ResourceKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let crd = kind.crd();
                let schema = crd
                    .spec
                    .versions
                    .into_iter()
                    .find(|v| v.storage)
                    .and_then(|v| v.schema)
                    .and_then(|s| s.open_api_v3_schema)?;
                Some((kind, schema))
            })
            .collect();
        Self { schemas }
    }
}

impl SchemaValidator for CrdSchemaValidator {
    fn check_shape(&self, kind: ResourceKind, object: &Value) -> Vec<Cause> {
        let mut causes = Vec::new();
        if let Some(schema) = self.schemas.get(&kind) {
            walk(schema, object, &FieldPath::default(), &mut causes);
        }
        causes
    }
}

fn walk(schema: &JSONSchemaProps, value: &Value, path: &FieldPath, causes: &mut Vec<Cause>) {
    match value {
        Value::Object(map) => {
            if let Some(required) = schema.required.as_ref() {
                for name in required {
                    if !map.contains_key(name) {
                        let field = path.child(name);
                        let message = format!("{field} is a required field");
                        causes.push(Cause::required(&field, message));
                    }
                }
            }

            let preserve_unknown = schema.x_kubernetes_preserve_unknown_fields == Some(true);
            match schema.properties.as_ref() {
                Some(properties) => {
                    for (name, child) in map {
                        if path.is_root() && ROOT_FIELDS.contains(&name.as_str()) {
                            continue;
                        }
                        match properties.get(name) {
                            Some(child_schema) => {
                                walk(child_schema, child, &path.child(name), causes)
                            }
                            None if preserve_unknown => {}
                            None => {
                                causes.push(Cause::invalid(
                                    path.child(name),
                                    format!("unknown field \"{}\"", path.child(name)),
                                ));
                            }
                        }
                    }
                }
                None => {
                    if let Some(JSONSchemaPropsOrBool::Schema(values)) =
                        schema.additional_properties.as_ref()
                    {
                        for (key, child) in map {
                            walk(values, child, &path.key(key), causes);
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(JSONSchemaPropsOrArray::Schema(item_schema)) = schema.items.as_ref() {
                for (idx, item) in items.iter().enumerate() {
                    walk(item_schema, item, &path.index(idx), causes);
                }
            }
        }
        _ => {}
    }
}
