//! Tool input schemas and argument validation.
//!
//! A schema is an ordered list of named parameters with primitive types.
//! Validation walks the parameters in declaration order and stops at the
//! first violation, so the reported field is deterministic.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::ToolDescriptor;
use crate::types::{Error, Result, ToolError};

// =============================================================================
// Parameter types
// =============================================================================

/// Primitive parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Object,
    Array,
    /// GitLab resource id: numeric id or URL-encoded path (`group/project`).
    Id,
}

impl ParamType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Id => value.is_string() || value.is_i64() || value.is_u64(),
        }
    }

    /// Name used in validation messages.
    pub fn display_name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Id => "integer|string",
        }
    }

    fn json_schema_type(self) -> Value {
        match self {
            ParamType::Id => json!(["integer", "string"]),
            other => Value::String(other.display_name().to_string()),
        }
    }

    fn from_json_schema_type(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.as_str() {
                "string" => Some(ParamType::String),
                "integer" => Some(ParamType::Integer),
                "boolean" => Some(ParamType::Boolean),
                "object" => Some(ParamType::Object),
                "array" => Some(ParamType::Array),
                _ => None,
            },
            Value::Array(types) => {
                let mut names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                names.sort_unstable();
                (names == ["integer", "string"]).then_some(ParamType::Id)
            }
            _ => None,
        }
    }
}

pub(crate) fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

// =============================================================================
// Input schema
// =============================================================================

/// Declared input of a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    pub params: Vec<ParamDef>,
    /// Accept arguments that are not declared.
    #[serde(default)]
    pub additional_properties: bool,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.params.push(ParamDef {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.params.push(ParamDef {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: false,
        });
        self
    }

    pub fn allow_additional(mut self) -> Self {
        self.additional_properties = true;
        self
    }

    /// Append the standard `page` / `per_page` parameters.
    pub fn paginated(self) -> Self {
        self.optional("page", ParamType::Integer, "Page number (starting at 1)")
            .optional("per_page", ParamType::Integer, "Items per page (1-100, default 20)")
    }

    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Build from a raw JSON Schema object (`properties`, `required`,
    /// `additionalProperties`). Properties keep the order of the parsed map.
    pub fn from_json_schema(schema: &Value) -> Result<Self> {
        let empty = Map::new();
        let properties = match schema.get("properties") {
            None => &empty,
            Some(Value::Object(props)) => props,
            Some(_) => return Err(Error::configuration("schema 'properties' must be an object")),
        };

        let required: Vec<&str> = match schema.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str()
                        .ok_or_else(|| Error::configuration("schema 'required' must list strings"))
                })
                .collect::<Result<_>>()?,
            Some(_) => return Err(Error::configuration("schema 'required' must be an array")),
        };

        if let Some(missing) = required.iter().find(|r| !properties.contains_key(**r)) {
            return Err(Error::configuration(format!(
                "required field '{}' is not declared in properties",
                missing
            )));
        }

        let mut params = Vec::with_capacity(properties.len());
        for (name, prop) in properties {
            let is_required = required.contains(&name.as_str());
            let param_type = prop
                .get("type")
                .and_then(ParamType::from_json_schema_type)
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "{} field '{}' has no supported declared type",
                        if is_required { "required" } else { "optional" },
                        name
                    ))
                })?;
            params.push(ParamDef {
                name: name.clone(),
                param_type,
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                required: is_required,
            });
        }

        Ok(Self {
            params,
            additional_properties: schema
                .get("additionalProperties")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Render as a JSON Schema object for `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({
                    "type": p.param_type.json_schema_type(),
                    "description": p.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": self.additional_properties,
        })
    }

    /// Structural checks performed once at registration.
    pub fn check(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for p in &self.params {
            if p.name.trim().is_empty() {
                return Err(Error::configuration("parameter name cannot be empty"));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(Error::configuration(format!(
                    "parameter '{}' declared twice",
                    p.name
                )));
            }
        }
        if !jsonschema::meta::is_valid(&self.to_json_schema()) {
            return Err(Error::configuration("input schema is not a valid JSON Schema"));
        }
        Ok(())
    }

    /// Validate call arguments. `null` counts as an empty object.
    ///
    /// Returns the argument object on success. Optional parameters passed as
    /// `null` are treated as absent.
    pub fn validate(&self, arguments: &Value) -> std::result::Result<Map<String, Value>, SchemaViolation> {
        let args = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(SchemaViolation::NotAnObject {
                    actual: value_type_name(other),
                })
            }
        };

        for p in &self.params {
            match args.get(&p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(SchemaViolation::Missing {
                        field: p.name.clone(),
                        expected: p.param_type.display_name(),
                    })
                }
                None | Some(Value::Null) => {}
                Some(value) if !p.param_type.matches(value) => {
                    return Err(SchemaViolation::WrongType {
                        field: p.name.clone(),
                        expected: p.param_type.display_name(),
                        actual: value_type_name(value),
                    })
                }
                Some(_) => {}
            }
        }

        if !self.additional_properties {
            if let Some(extra) = args.keys().filter(|k| self.param(k).is_none()).min() {
                return Err(SchemaViolation::Undeclared {
                    field: extra.clone(),
                });
            }
        }

        Ok(args)
    }
}

// =============================================================================
// Violations
// =============================================================================

/// First schema violation found in a set of arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    NotAnObject { actual: &'static str },
    Missing { field: String, expected: &'static str },
    WrongType { field: String, expected: &'static str, actual: &'static str },
    Undeclared { field: String },
}

impl SchemaViolation {
    pub fn field(&self) -> Option<&str> {
        match self {
            SchemaViolation::NotAnObject { .. } => None,
            SchemaViolation::Missing { field, .. }
            | SchemaViolation::WrongType { field, .. }
            | SchemaViolation::Undeclared { field } => Some(field),
        }
    }
}

impl From<SchemaViolation> for ToolError {
    fn from(v: SchemaViolation) -> Self {
        match v {
            SchemaViolation::NotAnObject { actual } => {
                ToolError::validation(format!("arguments must be an object, got {}", actual))
                    .with_detail("expected", "object")
            }
            SchemaViolation::Missing { field, expected } => {
                ToolError::validation(format!("missing required field '{}' ({})", field, expected))
                    .with_detail("field", field)
                    .with_detail("expected", expected)
            }
            SchemaViolation::WrongType {
                field,
                expected,
                actual,
            } => ToolError::validation(format!(
                "field '{}' must be {}, got {}",
                field, expected, actual
            ))
            .with_detail("field", field)
            .with_detail("expected", expected)
            .with_detail("actual", actual),
            SchemaViolation::Undeclared { field } => {
                ToolError::validation(format!("unknown field '{}'", field))
                    .with_detail("field", field)
                    .with_detail("expected", "no such parameter")
            }
        }
    }
}

/// Validate `arguments` against a descriptor's declared input.
pub fn validate(
    descriptor: &ToolDescriptor,
    arguments: &Value,
) -> std::result::Result<Map<String, Value>, ToolError> {
    descriptor.input_schema.validate(arguments).map_err(ToolError::from)
}
