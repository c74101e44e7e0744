//! Tool schema model — declarative descriptions of tool parameters.
//!
//! A [`ToolSchema`] serves two masters: it renders into the JSON-Schema
//! object the LLM sees in its tool catalog, and it validates argument maps
//! before any handler runs. Invariants (unique parameter names, enum values
//! matching their declared type) are enforced at construction, so a schema
//! that exists is a schema that is well-formed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::SchemaError;

/// The fixed set of parameter types a tool may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// The JSON-Schema type keyword for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Whether a JSON value inhabits this type.
    ///
    /// Integers are accepted where numbers are declared, matching JSON-Schema
    /// semantics. The reverse is not true.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// A short description of a value's actual JSON type, for error messages.
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name, unique within its schema.
    pub name: String,

    /// Declared type from the fixed primitive set.
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human/model-readable description.
    pub description: String,

    /// Whether the parameter must be present.
    pub required: bool,

    /// If non-empty, the value must be one of these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<Value>,
}

impl ToolParameter {
    /// A required parameter with no enum constraint.
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            allowed_values: Vec::new(),
        }
    }

    /// An optional parameter with no enum constraint.
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Constrain this parameter to an enumerated set of values.
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = values;
        self
    }
}

/// A validation failure for one argument, with enough detail for the model
/// to self-correct on the next turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgViolation {
    MissingRequired {
        parameter: String,
    },
    TypeMismatch {
        parameter: String,
        expected: String,
        actual: String,
    },
    NotAllowed {
        parameter: String,
        value: String,
        allowed: String,
    },
}

impl std::fmt::Display for ArgViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { parameter } => {
                write!(f, "missing required parameter '{parameter}'")
            }
            Self::TypeMismatch {
                parameter,
                expected,
                actual,
            } => write!(
                f,
                "parameter '{parameter}' expected {expected}, got {actual}"
            ),
            Self::NotAllowed {
                parameter,
                value,
                allowed,
            } => write!(
                f,
                "parameter '{parameter}' value {value} not in allowed set [{allowed}]"
            ),
        }
    }
}

/// The declarative description of a tool: name, purpose, parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name, unique within a registry.
    pub name: String,

    /// Description of what the tool does (sent to the LLM).
    pub description: String,

    /// Ordered parameter declarations.
    pub parameters: Vec<ToolParameter>,
}

impl ToolSchema {
    /// Construct a schema, enforcing its invariants.
    ///
    /// Fails if the name is empty, a parameter name repeats, or an enum
    /// value does not match its parameter's declared type.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }

        let mut seen = std::collections::HashSet::new();
        for param in &parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(SchemaError::DuplicateParameter {
                    schema: name,
                    parameter: param.name.clone(),
                });
            }
            for value in &param.allowed_values {
                if !param.param_type.matches(value) {
                    return Err(SchemaError::EnumTypeMismatch {
                        parameter: param.name.clone(),
                        expected: param.param_type.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            name,
            description: description.into(),
            parameters,
        })
    }

    /// Render the JSON-Schema object the LLM receives in its tool catalog.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type.as_str()));
            prop.insert("description".into(), json!(param.description));
            if !param.allowed_values.is_empty() {
                prop.insert("enum".into(), Value::Array(param.allowed_values.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate an argument map against this schema.
    ///
    /// Checks, in order: every required parameter present, every present
    /// parameter type-correct, every enum-constrained parameter allowed.
    /// Collects all violations rather than stopping at the first, so the
    /// model gets the full picture in one observation.
    pub fn validate_args(&self, args: &Map<String, Value>) -> Result<(), Vec<ArgViolation>> {
        let mut violations = Vec::new();

        for param in &self.parameters {
            let value = match args.get(&param.name) {
                Some(v) => v,
                None => {
                    if param.required {
                        violations.push(ArgViolation::MissingRequired {
                            parameter: param.name.clone(),
                        });
                    }
                    continue;
                }
            };

            if !param.param_type.matches(value) {
                violations.push(ArgViolation::TypeMismatch {
                    parameter: param.name.clone(),
                    expected: param.param_type.to_string(),
                    actual: ParamType::describe(value).to_string(),
                });
                continue;
            }

            if !param.allowed_values.is_empty() && !param.allowed_values.contains(value) {
                violations.push(ArgViolation::NotAllowed {
                    parameter: param.name.clone(),
                    value: value.to_string(),
                    allowed: param
                        .allowed_values
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
