//! Signature-based tool registration.
//!
//! Rust has no runtime view of a function's parameter list, so the caller
//! declares it with [`FunctionTool::builder`]: name, doc text, and ordered
//! parameters with their types and defaults. The [`ToolSpec`] and the
//! argument validator are derived from that declaration once, at build time.
//!
//! ```
//! use omnichat_agent::tools::{FunctionTool, ParamType};
//!
//! let tool = FunctionTool::builder("get_current_temperature")
//!     .doc("Gets temperature.\n\nArgs:\n    location: City name.")
//!     .param("location", ParamType::String)
//!     .param_with_default("unit", ParamType::String, "Celsius")
//!     .sync_handler(|args| Ok(format!("21 degrees in {}", args.require_str("location")?)))
//!     .unwrap();
//!
//! assert_eq!(tool.spec().parameters.required, vec!["location"]);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::debug;

use omnichat_core::{ParametersSchema, PropertySchema, SchemaError, ToolSpec};

use super::base::{Args, Tool};
use super::docs::parse_doc;

// ─────────────────────────────────────────────
// Parameter types
// ─────────────────────────────────────────────

/// Declared type of one parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// Homogeneous list.
    Array(Box<ParamType>),
    /// Free-form JSON object.
    Object,
    /// One of a fixed set of string values.
    Enum(Vec<String>),
}

impl ParamType {
    /// Enum over the serialized values of `variants`.
    ///
    /// Each variant is turned into its serde representation, so
    /// `#[serde(rename = "...")]` is honored.
    pub fn enum_of<E: Serialize>(variants: &[E]) -> Self {
        ParamType::Enum(
            variants
                .iter()
                .map(|v| match serde_json::to_value(v) {
                    Ok(Value::String(s)) => s,
                    Ok(other) => other.to_string(),
                    Err(_) => String::new(),
                })
                .collect(),
        )
    }

    /// JSON-Schema primitive name.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Enum(_) => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array(_) => "array",
            ParamType::Object => "object",
        }
    }

    fn item_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String(self.json_type().into()));
        match self {
            ParamType::Enum(values) => {
                schema.insert("enum".into(), values.iter().cloned().map(Value::String).collect());
            }
            ParamType::Array(inner) => {
                schema.insert("items".into(), inner.item_schema());
            }
            _ => {}
        }
        Value::Object(schema)
    }

    fn property(&self) -> PropertySchema {
        let mut prop = PropertySchema::new(self.json_type());
        match self {
            ParamType::Enum(values) => {
                prop.enum_values = Some(values.iter().cloned().map(Value::String).collect());
            }
            ParamType::Array(inner) => prop.items = Some(inner.item_schema()),
            _ => {}
        }
        prop
    }

    /// Check `value` against this type with lax coercion.
    ///
    /// Integral floats and numeric strings become integers; integers and
    /// numeric strings become numbers; `"true"`/`"false"` become booleans.
    /// Strings are never produced from other types.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (ParamType::String, v @ Value::String(_)) => Ok(v),

            (ParamType::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Ok(Value::Number(n))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                            Ok(Value::from(f as i64))
                        }
                        _ => Err(format!("expected integer, got {n}")),
                    }
                }
            }
            (ParamType::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected integer, got \"{s}\"")),

            (ParamType::Number, v @ Value::Number(_)) => Ok(v),
            (ParamType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("expected number, got \"{s}\"")),

            (ParamType::Boolean, v @ Value::Bool(_)) => Ok(v),
            (ParamType::Boolean, Value::String(s)) if s == "true" => Ok(Value::Bool(true)),
            (ParamType::Boolean, Value::String(s)) if s == "false" => Ok(Value::Bool(false)),

            (ParamType::Array(inner), Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| inner.coerce(item).map_err(|e| format!("[{i}] {e}")))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),

            (ParamType::Object, v @ Value::Object(_)) => Ok(v),

            (ParamType::Enum(values), Value::String(s)) => {
                if values.contains(&s) {
                    Ok(Value::String(s))
                } else {
                    Err(format!("expected one of {}, got \"{s}\"", values.join(", ")))
                }
            }

            (kind, other) => Err(format!(
                "expected {}, got {}",
                kind.json_type(),
                json_kind(&other)
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────
// Declared signature
// ─────────────────────────────────────────────

/// One declared parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    /// `None` when declared without a type, which fails registration.
    pub kind: Option<ParamType>,
    pub default: Option<Value>,
    /// Overrides the description parsed from the doc text.
    pub description: Option<String>,
}

/// A parameter that survived inference: typed, with its final default.
#[derive(Clone, Debug, PartialEq)]
struct TypedParam {
    name: String,
    kind: ParamType,
    default: Option<Value>,
}

/// Derive the tool spec and the typed parameter list from a declared signature.
fn infer(name: &str, doc: &str, params: &[Param]) -> Result<(ToolSpec, Vec<TypedParam>), SchemaError> {
    let parsed = parse_doc(doc);
    let mut parameters = ParametersSchema::default();
    let mut typed = Vec::with_capacity(params.len());

    for param in params {
        let kind = param
            .kind
            .clone()
            .ok_or_else(|| SchemaError::MissingAnnotation {
                function: name.to_string(),
                parameter: param.name.clone(),
            })?;

        let default = match (&kind, &param.default) {
            // Enum defaults must name one of the members.
            (ParamType::Enum(_), Some(value)) => Some(kind.coerce(value.clone()).map_err(|detail| {
                SchemaError::InvalidModel {
                    function: name.to_string(),
                    detail: format!("default for '{}': {detail}", param.name),
                }
            })?),
            (_, default) => default.clone(),
        };

        let mut prop = kind.property();
        prop.description = param
            .description
            .clone()
            .unwrap_or_else(|| parsed.param(&param.name).to_string());
        prop.default = default.clone();

        if default.is_none() {
            parameters.required.push(param.name.clone());
        }
        parameters.properties.insert(param.name.clone(), prop);
        typed.push(TypedParam {
            name: param.name.clone(),
            kind,
            default,
        });
    }

    let spec = ToolSpec {
        name: name.to_string(),
        description: parsed.description(),
        parameters,
    };
    Ok((spec, typed))
}

/// Infer a tool spec from a declared signature without building a tool.
pub fn infer_spec(name: &str, doc: &str, params: &[Param]) -> Result<ToolSpec, SchemaError> {
    infer(name, doc, params).map(|(spec, _)| spec)
}

/// Validate raw arguments against typed parameters.
///
/// Unknown keys are dropped, defaults filled in, and every problem is
/// reported (`"location: expected string, got integer; unit: ..."`).
fn validate_args(params: &[TypedParam], mut raw: Map<String, Value>) -> Result<Map<String, Value>, String> {
    let mut validated = Map::new();
    let mut errors = Vec::new();

    for param in params {
        match (raw.remove(&param.name), &param.default) {
            (Some(value), _) => match param.kind.coerce(value) {
                Ok(v) => {
                    validated.insert(param.name.clone(), v);
                }
                Err(e) => errors.push(format!("{}: {e}", param.name)),
            },
            (None, Some(default)) => {
                validated.insert(param.name.clone(), default.clone());
            }
            (None, None) => errors.push(format!("{}: field required", param.name)),
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors.join("; "))
    }
}

// ─────────────────────────────────────────────
// FunctionTool
// ─────────────────────────────────────────────

type Handler = Arc<dyn Fn(Args) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A tool registered from a declared signature.
pub struct FunctionTool {
    spec: ToolSpec,
    params: Vec<TypedParam>,
    handler: Handler,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool").field("spec", &self.spec).finish()
    }
}

impl FunctionTool {
    pub fn builder(name: impl Into<String>) -> FunctionToolBuilder {
        FunctionToolBuilder {
            name: name.into(),
            doc: String::new(),
            params: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn validate(&self, args: Map<String, Value>) -> Result<Map<String, Value>, String> {
        validate_args(&self.params, args)
    }

    async fn call(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        (self.handler)(Args::new(args)).await
    }
}

/// Declares a tool's signature. See the [module docs](self).
#[derive(Debug)]
pub struct FunctionToolBuilder {
    name: String,
    doc: String,
    params: Vec<Param>,
    errors: Vec<SchemaError>,
}

impl FunctionToolBuilder {
    /// Doc text: description plus an optional `Args:` / `:param:` / `# Arguments` section.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Required parameter.
    pub fn param(mut self, name: impl Into<String>, kind: ParamType) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: Some(kind),
            default: None,
            description: None,
        });
        self
    }

    /// Optional parameter. The default is serialized with serde, so an enum
    /// default becomes its underlying string value.
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        default: impl Serialize,
    ) -> Self {
        let name = name.into();
        let default = self.serialize_default(&name, default);
        self.params.push(Param {
            name,
            kind: Some(kind),
            default,
            description: None,
        });
        self
    }

    /// Parameter declared without a type. Building the tool will fail.
    pub fn untyped(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind: None,
            default: None,
            description: None,
        });
        self
    }

    /// Set the description of an already declared parameter, overriding the doc text.
    pub fn describe(mut self, name: &str, description: impl Into<String>) -> Self {
        if let Some(param) = self.params.iter_mut().find(|p| p.name == name) {
            param.description = Some(description.into());
        }
        self
    }

    fn serialize_default(&mut self, name: &str, default: impl Serialize) -> Option<Value> {
        match serde_json::to_value(default) {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(SchemaError::InvalidModel {
                    function: self.name.clone(),
                    detail: format!("default for '{name}' is not serializable: {e}"),
                });
                None
            }
        }
    }

    /// The tool spec this declaration produces.
    pub fn spec(&self) -> Result<ToolSpec, SchemaError> {
        if let Some(err) = self.errors.first() {
            return Err(err.clone());
        }
        infer_spec(&self.name, &self.doc, &self.params)
    }

    /// Finish with an async handler.
    pub fn handler<F, Fut, R>(self, f: F) -> Result<FunctionTool, SchemaError>
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args: Args| {
            let fut = f(args);
            async move {
                let out = fut.await?;
                Ok(serde_json::to_value(out)?)
            }
            .boxed()
        });
        self.build(handler)
    }

    /// Finish with a synchronous handler.
    pub fn sync_handler<F, R>(self, f: F) -> Result<FunctionTool, SchemaError>
    where
        F: Fn(Args) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args: Args| {
            let result = f(args).and_then(|out| Ok(serde_json::to_value(out)?));
            futures::future::ready(result).boxed()
        });
        self.build(handler)
    }

    fn build(self, handler: Handler) -> Result<FunctionTool, SchemaError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let (spec, params) = infer(&self.name, &self.doc, &self.params)?;
        debug!(tool = %spec.name, params = params.len(), "Inferred tool spec");
        Ok(FunctionTool {
            spec,
            params,
            handler,
        })
    }
}
