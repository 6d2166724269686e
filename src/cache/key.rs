//! Cache key derivation
//!
//! Two key shapes are derived from the same call:
//!
//! - [`DurableKey`] keeps positional and keyword arguments as separate fields
//!   plus a name-sorted view of the keyword arguments, so the document store
//!   can match on parts of it.
//! - [`FastKey`] is a flat record used by the in-process tier. Each argument
//!   is kept as its own canonical JSON text, so values containing `$`, `&`,
//!   `:`, `~` or `,` never collide, and `3` never matches `"3"`.
//!
//! Keyword arguments whose value is `null` are dropped before either key is
//! built; an optional parameter left unset must not fragment the cache.

use crate::backend::KeyFilter;
use crate::cache::types::CallArgs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name under which joined positional arguments appear in rendered fast keys
pub const ARGS_FIELD: &str = "#args";

/// Structured key stored alongside durable entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableKey {
    /// Qualified function identity
    pub function: String,

    /// Positional arguments, order preserved
    pub args: Vec<Value>,

    /// Keyword arguments sorted by name
    pub ordered_kwargs: Vec<(String, Value)>,

    /// Keyword arguments as a map. Stored but not part of lookup equality.
    pub kwargs: Map<String, Value>,
}

impl DurableKey {
    /// Filter used for lookups: `function`, `args` and `ordered_kwargs`.
    ///
    /// The raw `kwargs` map is left out on purpose. Existing invalidation
    /// callers rely on lookups tolerating it.
    pub fn lookup_filter(&self) -> KeyFilter {
        KeyFilter::new()
            .function(self.function.clone())
            .args(self.args.clone())
            .ordered_kwargs(self.ordered_kwargs.clone())
    }

    /// Filter over every key field, used as the upsert match
    pub fn full_filter(&self) -> KeyFilter {
        self.lookup_filter().kwargs(self.kwargs.clone())
    }
}

/// Key for the in-process tier
///
/// Positional and keyword arguments are held as canonical JSON text, one
/// entry per value, so neither separators inside a value nor a change of
/// JSON type can make two calls share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FastKey {
    function: String,
    args: Vec<String>,
    fields: Vec<(String, String)>,
}

impl FastKey {
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Positional arguments as canonical JSON, order preserved
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Name-sorted `(name, canonical JSON)` keyword pairs
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Renders the historical `function$#args:a,b&k:v` form with spaces as `~`.
/// Only used for logs; distinct keys may render the same.
impl fmt::Display for FastKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<(&str, String)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), legacy_text(v)))
            .collect();
        if !self.args.is_empty() {
            let joined: Vec<String> = self.args.iter().map(|a| legacy_text(a)).collect();
            pairs.push((ARGS_FIELD, joined.join(",")));
        }
        pairs.sort();

        let pairs: Vec<String> = pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
        let flat = format!("{}${}", self.function, pairs.join("&"));
        write!(f, "{}", flat.replace(' ', "~"))
    }
}

/// Derive the structured key for the durable tier
pub fn derive_durable(function: &str, call: &CallArgs) -> DurableKey {
    let mut ordered_kwargs: Vec<(String, Value)> = call
        .present_kwargs()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    ordered_kwargs.sort_by(|a, b| a.0.cmp(&b.0));

    let kwargs: Map<String, Value> = ordered_kwargs.iter().cloned().collect();

    DurableKey {
        function: function.to_string(),
        args: call.args().to_vec(),
        ordered_kwargs,
        kwargs,
    }
}

/// Derive the key for the fast tier
pub fn derive_fast(function: &str, call: &CallArgs) -> FastKey {
    let mut fields: Vec<(String, String)> = call
        .present_kwargs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    fields.sort();

    FastKey {
        function: function.to_string(),
        args: call.args().iter().map(Value::to_string).collect(),
        fields,
    }
}

/// Strings print bare, every other value as its JSON text
fn legacy_text(json: &str) -> String {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::String(s)) => s,
        _ => json.to_string(),
    }
}
