//! Declarative tool input/output shapes
//!
//! Tools describe their arguments and results with plain [`Schema`] /
//! [`ObjectSchema`] values attached at registration time. [`ObjectSchema::export`]
//! turns a description into the JSON Schema document advertised by
//! `tools/list`. Export is a pure function of the description, so repeated
//! exports are identical.
//!
//! # Type Mapping
//!
//! | Kind            | JSON Schema                                   |
//! |-----------------|-----------------------------------------------|
//! | String          | `{"type":"string"}` + format/enum/minLength   |
//! | Integer         | `{"type":"integer"}` + minimum/maximum        |
//! | Number          | `{"type":"number"}`                           |
//! | Boolean         | `{"type":"boolean"}`                          |
//! | Array(item)     | `{"type":"array","items":<item>}`             |
//! | Object(fields)  | `{"type":"object","properties":..,"required":..}` |
//! | Any             | `{}`                                          |

use serde_json::{json, Map, Value};

pub const JSON_SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String {
        format: Option<&'static str>,
        min_length: Option<u64>,
        one_of: Vec<&'static str>,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Number,
    Boolean,
    Array(Box<Schema>),
    Object(ObjectSchema),
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    kind: SchemaKind,
    description: Option<&'static str>,
    default: Option<Value>,
    nullable: bool,
}

impl Schema {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
            default: None,
            nullable: false,
        }
    }

    pub fn string() -> Self {
        Self::of(SchemaKind::String {
            format: None,
            min_length: None,
            one_of: Vec::new(),
        })
    }

    pub fn integer() -> Self {
        Self::of(SchemaKind::Integer {
            minimum: None,
            maximum: None,
        })
    }

    pub fn number() -> Self {
        Self::of(SchemaKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaKind::Boolean)
    }

    pub fn array(items: Schema) -> Self {
        Self::of(SchemaKind::Array(Box::new(items)))
    }

    pub fn object(fields: ObjectSchema) -> Self {
        Self::of(SchemaKind::Object(fields))
    }

    pub fn any() -> Self {
        Self::of(SchemaKind::Any)
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets `format` on a string schema; ignored for other kinds
    pub fn format(mut self, value: &'static str) -> Self {
        if let SchemaKind::String { format, .. } = &mut self.kind {
            *format = Some(value);
        }
        self
    }

    pub fn min_length(mut self, value: u64) -> Self {
        if let SchemaKind::String { min_length, .. } = &mut self.kind {
            *min_length = Some(value);
        }
        self
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        if let SchemaKind::String { one_of, .. } = &mut self.kind {
            *one_of = values.to_vec();
        }
        self
    }

    pub fn range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        if let SchemaKind::Integer { minimum, maximum } = &mut self.kind {
            *minimum = min;
            *maximum = max;
        }
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = match &self.kind {
            SchemaKind::String {
                format,
                min_length,
                one_of,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("string"));
                if let Some(format) = format {
                    map.insert("format".into(), json!(format));
                }
                if let Some(min) = min_length {
                    map.insert("minLength".into(), json!(min));
                }
                if !one_of.is_empty() {
                    map.insert("enum".into(), json!(one_of));
                }
                map
            }
            SchemaKind::Integer { minimum, maximum } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("integer"));
                if let Some(min) = minimum {
                    map.insert("minimum".into(), json!(min));
                }
                if let Some(max) = maximum {
                    map.insert("maximum".into(), json!(max));
                }
                map
            }
            SchemaKind::Number => object_of("number"),
            SchemaKind::Boolean => object_of("boolean"),
            SchemaKind::Array(items) => {
                let mut map = object_of("array");
                map.insert("items".into(), items.to_json());
                map
            }
            SchemaKind::Object(fields) => fields.to_map(),
            SchemaKind::Any => Map::new(),
        };

        if self.nullable {
            if let Some(Value::String(ty)) = out.get("type").cloned() {
                out.insert("type".into(), json!([ty, "null"]));
            }
        }
        if let Some(description) = self.description {
            out.insert("description".into(), json!(description));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }

        Value::Object(out)
    }
}

fn object_of(ty: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("type".into(), json!(ty));
    map
}

#[derive(Debug, Clone, PartialEq)]
struct Field {
    name: &'static str,
    schema: Schema,
    required: bool,
}

/// Ordered set of named fields; field order is preserved in the export
///
/// Undeclared properties are always rejected (`additionalProperties: false`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, schema: Schema) -> Self {
        self.fields.push(Field {
            name,
            schema,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, schema: Schema) -> Self {
        self.fields.push(Field {
            name,
            schema,
            required: false,
        });
        self
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            properties.insert(field.name.to_string(), field.schema.to_json());
            if field.required {
                required.push(json!(field.name));
            }
        }

        let mut map = object_of("object");
        map.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            map.insert("required".into(), Value::Array(required));
        }
        map.insert("additionalProperties".into(), Value::Bool(false));
        map
    }

    /// Top-level JSON Schema document for advertisement to clients
    pub fn export(&self) -> Map<String, Value> {
        let mut map = self.to_map();
        map.insert("$schema".into(), json!(JSON_SCHEMA_DIALECT));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_object_with_required_and_optional() {
        let schema = ObjectSchema::new()
            .required("userId", Schema::integer().range(Some(1), None))
            .optional(
                "limit",
                Schema::integer()
                    .range(Some(1), Some(100))
                    .default_value(json!(20)),
            );

        let exported = Value::Object(schema.export());
        assert_eq!(exported["type"], "object");
        assert_eq!(exported["$schema"], JSON_SCHEMA_DIALECT);
        assert_eq!(exported["properties"]["userId"]["type"], "integer");
        assert_eq!(exported["properties"]["userId"]["minimum"], 1);
        assert_eq!(exported["properties"]["limit"]["default"], 20);
        assert_eq!(exported["properties"]["limit"]["maximum"], 100);
        assert_eq!(exported["required"], json!(["userId"]));
        assert_eq!(exported["additionalProperties"], false);
    }

    #[test]
    fn test_export_preserves_field_order() {
        let schema = ObjectSchema::new()
            .required("zeta", Schema::string())
            .required("alpha", Schema::string())
            .required("mid", Schema::boolean());

        let exported = schema.export();
        let keys: Vec<&String> = exported["properties"]
            .as_object()
            .expect("properties object")
            .keys()
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_string_modifiers_and_nested_shapes() {
        let item = ObjectSchema::new()
            .required("url", Schema::string().format("uri"))
            .optional("kind", Schema::string().one_of(&["web", "news"]));
        let schema = Schema::array(Schema::object(item))
            .describe("Search hits")
            .nullable();

        let value = schema.to_json();
        assert_eq!(value["type"], json!(["array", "null"]));
        assert_eq!(value["description"], "Search hits");
        assert_eq!(value["items"]["type"], "object");
        assert_eq!(value["items"]["properties"]["url"]["format"], "uri");
        assert_eq!(
            value["items"]["properties"]["kind"]["enum"],
            json!(["web", "news"])
        );
        // nested objects carry no $schema marker
        assert!(value["items"].get("$schema").is_none());
    }

    #[test]
    fn test_modifiers_ignored_on_other_kinds() {
        let schema = Schema::boolean().format("uri").range(Some(1), Some(2));
        assert_eq!(schema.to_json(), json!({"type": "boolean"}));
        assert_eq!(Schema::any().to_json(), json!({}));
    }

    #[test]
    fn test_export_is_deterministic() {
        let schema = ObjectSchema::new()
            .required("query", Schema::string().min_length(1))
            .optional("saveHistory", Schema::boolean().default_value(json!(true)));
        assert_eq!(
            serde_json::to_string(&schema.export()).expect("serialize"),
            serde_json::to_string(&schema.export()).expect("serialize")
        );
    }
}
