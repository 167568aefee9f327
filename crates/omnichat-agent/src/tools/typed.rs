//! Model-based tool registration.
//!
//! The parameter model is a `serde` + `schemars` struct. Its JSON Schema is
//! flattened into a [`ToolSpec`], and validation is plain deserialization.
//!
//! ```
//! use omnichat_agent::tools::TypedTool;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct StockArgs {
//!     /// Ticker symbol.
//!     symbol: String,
//! }
//!
//! let tool = TypedTool::new("get_stock_price", "Look up a stock price.", |args: StockArgs| async move {
//!     Ok(format!("{} is at 100", args.symbol))
//! })
//! .unwrap();
//! assert_eq!(tool.spec().parameters.required, vec!["symbol"]);
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use omnichat_core::{ParametersSchema, PropertySchema, SchemaError, ToolSpec};

use super::base::Tool;
use super::docs::parse_doc;

type TypedHandler<A> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A tool whose arguments deserialize into `A`.
pub struct TypedTool<A> {
    spec: ToolSpec,
    handler: TypedHandler<A>,
    _args: PhantomData<fn() -> A>,
}

impl<A> std::fmt::Debug for TypedTool<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedTool").field("spec", &self.spec).finish()
    }
}

impl<A> TypedTool<A>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
{
    /// Build a tool from a parameter model and an async handler.
    ///
    /// `doc` supplies the tool description; its parameter section, if any,
    /// fills descriptions the model's own doc comments leave empty.
    pub fn new<H, Fut, R>(name: impl Into<String>, doc: &str, handler: H) -> Result<Self, SchemaError>
    where
        H: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let name = name.into();
        let schema = serde_json::to_value(schemars::schema_for!(A)).map_err(|e| {
            SchemaError::InvalidModel {
                function: name.clone(),
                detail: e.to_string(),
            }
        })?;
        let spec = spec_from_schema(&name, doc, &schema)?;
        debug!(tool = %spec.name, params = spec.parameters.properties.len(), "Converted parameter model");

        let handler: TypedHandler<A> = Arc::new(move |args: A| {
            let fut = handler(args);
            async move {
                let out = fut.await?;
                Ok(serde_json::to_value(out)?)
            }
            .boxed()
        });

        Ok(TypedTool {
            spec,
            handler,
            _args: PhantomData,
        })
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }
}

#[async_trait]
impl<A> Tool for TypedTool<A>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
{
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn validate(&self, args: Map<String, Value>) -> Result<Map<String, Value>, String> {
        serde_json::from_value::<A>(Value::Object(args.clone()))
            .map(|_| args)
            .map_err(|e| e.to_string())
    }

    async fn call(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        let parsed: A = serde_json::from_value(Value::Object(args))?;
        (self.handler)(parsed).await
    }
}

// ─────────────────────────────────────────────
// JSON Schema → ToolSpec
// ─────────────────────────────────────────────

/// Flatten a model's JSON Schema into a [`ToolSpec`].
///
/// References into `$defs` / `definitions` are inlined, nullable unions are
/// reduced to their non-null member, and `oneOf`/`anyOf` lists of constants
/// become an `enum`.
pub fn spec_from_schema(name: &str, doc: &str, schema: &Value) -> Result<ToolSpec, SchemaError> {
    let invalid = |detail: String| SchemaError::InvalidModel {
        function: name.to_string(),
        detail,
    };
    let defs = schema
        .get("$defs")
        .or_else(|| schema.get("definitions"))
        .and_then(Value::as_object);

    let root = resolve(schema, defs);
    if root.get("type").and_then(Value::as_str) != Some("object") {
        return Err(invalid("parameter model must be an object".into()));
    }

    let parsed = parse_doc(doc);
    let mut parameters = ParametersSchema::default();

    if let Some(props) = root.get("properties").and_then(Value::as_object) {
        for (prop_name, raw) in props {
            let prop_schema = normalize(raw, defs);
            let kind = prop_schema
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("property '{prop_name}' has no usable type")))?;

            let mut prop = PropertySchema::new(kind);
            prop.enum_values = prop_schema.get("enum").and_then(Value::as_array).cloned();
            prop.items = prop_schema
                .get("items")
                .map(|items| inline(items, defs, &mut Vec::new()));
            prop.default = raw.get("default").or_else(|| prop_schema.get("default")).cloned();
            prop.description = raw
                .get("description")
                .or_else(|| prop_schema.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| parsed.param(prop_name).to_string());
            parameters.properties.insert(prop_name.clone(), prop);
        }
    }

    if let Some(required) = root.get("required").and_then(Value::as_array) {
        parameters.required = required
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }

    let description = match parsed.description() {
        d if d.is_empty() => root
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        d => d,
    };

    Ok(ToolSpec {
        name: name.to_string(),
        description,
        parameters,
    })
}

/// Follow a `$ref` or a single-element `allOf` to the schema it names.
///
/// A chain that returns to a definition already visited stops there.
fn resolve<'a>(schema: &'a Value, defs: Option<&'a Map<String, Value>>) -> &'a Value {
    let mut current = schema;
    let mut seen: Vec<&str> = Vec::new();
    loop {
        if let Some(key) = ref_key(current).filter(|key| !seen.contains(key)) {
            if let Some(target) = defs.and_then(|d| d.get(key)) {
                seen.push(key);
                current = target;
                continue;
            }
        }
        match current.get("allOf").and_then(Value::as_array) {
            Some(all) if all.len() == 1 => current = &all[0],
            _ => return current,
        }
    }
}

fn ref_key(schema: &Value) -> Option<&str> {
    schema
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.rsplit('/').next())
}

/// The definition a property schema expands to, looking through single-member
/// `allOf` and nullable `anyOf`/`oneOf` wrappers.
fn expands_to(schema: &Value) -> Option<&str> {
    if let Some(key) = ref_key(schema) {
        return Some(key);
    }
    ["allOf", "anyOf", "oneOf"].iter().find_map(|key| {
        let variants = schema.get(*key).and_then(Value::as_array)?;
        let mut non_null = variants
            .iter()
            .filter(|v| v.get("type").and_then(Value::as_str) != Some("null"));
        match (non_null.next(), non_null.next()) {
            (Some(only), None) => expands_to(only),
            _ => None,
        }
    })
}

/// Reduce one property schema to a single concrete type.
fn normalize(schema: &Value, defs: Option<&Map<String, Value>>) -> Map<String, Value> {
    let resolved = resolve(schema, defs);
    let mut out = resolved.as_object().cloned().unwrap_or_default();

    // `"type": ["string", "null"]`
    if let Some(types) = out.get("type").and_then(Value::as_array) {
        let non_null: Vec<&Value> = types.iter().filter(|t| t.as_str() != Some("null")).collect();
        if let [only] = non_null.as_slice() {
            let only = (*only).clone();
            out.insert("type".into(), only);
        }
    }

    for key in ["oneOf", "anyOf"] {
        let Some(variants) = out.get(key).and_then(Value::as_array).cloned() else {
            continue;
        };
        let variants: Vec<&Value> = variants
            .iter()
            .filter(|v| v.get("type").and_then(Value::as_str) != Some("null"))
            .collect();

        let consts: Option<Vec<Value>> = variants
            .iter()
            .map(|v| {
                let v = resolve(v, defs);
                v.get("const")
                    .cloned()
                    .or_else(|| v.get("enum").and_then(Value::as_array).and_then(|e| (e.len() == 1).then(|| e[0].clone())))
            })
            .collect();

        out.remove(key);
        match consts {
            Some(values) if !values.is_empty() => {
                let kind = json_kind(&values[0]);
                out.entry("type").or_insert_with(|| Value::String(kind.into()));
                out.insert("enum".into(), Value::Array(values));
            }
            _ => {
                if let [only] = variants.as_slice() {
                    for (k, v) in normalize(only, defs) {
                        out.entry(k).or_insert(v);
                    }
                }
            }
        }
    }

    if let Some(value) = out.remove("const") {
        out.entry("type").or_insert_with(|| Value::String(json_kind(&value).into()));
        out.insert("enum".into(), Value::Array(vec![value]));
    }

    out
}

/// Inline references inside an `items` schema.
///
/// `expanding` holds the definitions currently being inlined. A recursive
/// reference back into one of them becomes a plain `{"type": "object"}`.
fn inline(schema: &Value, defs: Option<&Map<String, Value>>, expanding: &mut Vec<String>) -> Value {
    let key = expands_to(schema).map(str::to_string);
    if let Some(key) = &key {
        if expanding.contains(key) {
            return json!({"type": "object"});
        }
        expanding.push(key.clone());
    }

    let mut out = normalize(schema, defs);
    if let Some(items) = out.get("items").cloned() {
        out.insert("items".into(), inline(&items, defs, expanding));
    }
    if let Some(props) = out.get("properties").and_then(Value::as_object).cloned() {
        let props = props
            .iter()
            .map(|(k, v)| (k.clone(), inline(v, defs, expanding)))
            .collect();
        out.insert("properties".into(), Value::Object(props));
    }

    if key.is_some() {
        expanding.pop();
    }
    Value::Object(out)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => "string",
    }
}
