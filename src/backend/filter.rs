//! Partial-key filters understood by every document store

use crate::cache::entry::CacheDocument;
use crate::cache::types::CallArgs;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Equality filter over the key fields of a [`CacheDocument`]
///
/// Every field that is set must match; unset fields match anything. An empty
/// filter therefore matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyFilter {
    pub function: Option<String>,
    pub args: Option<Vec<Value>>,
    pub ordered_kwargs: Option<Vec<(String, Value)>>,

    /// Whole-map equality on the stored raw kwargs
    pub kwargs: Option<Map<String, Value>>,

    /// Per-field equality on `kwargs.<name>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kwarg_fields: Vec<(String, Value)>,
}

impl KeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter for one exact argument combination (`args` + `ordered_kwargs`)
    pub fn for_call(call: &CallArgs) -> Self {
        let mut ordered: Vec<(String, Value)> = call
            .present_kwargs()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        Self::new().args(call.args().to_vec()).ordered_kwargs(ordered)
    }

    /// Filter on a single stored keyword argument
    pub fn kwarg(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with_kwarg(name, value)
    }

    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn ordered_kwargs(mut self, ordered_kwargs: Vec<(String, Value)>) -> Self {
        self.ordered_kwargs = Some(ordered_kwargs);
        self
    }

    pub fn kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = Some(kwargs);
        self
    }

    /// Add a `kwargs.<name> == value` condition
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwarg_fields.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.function.is_none()
            && self.args.is_none()
            && self.ordered_kwargs.is_none()
            && self.kwargs.is_none()
            && self.kwarg_fields.is_empty()
    }

    /// Whether `doc` satisfies every condition of this filter
    pub fn matches(&self, doc: &CacheDocument) -> bool {
        if let Some(function) = &self.function {
            if *function != doc.function {
                return false;
            }
        }
        if let Some(args) = &self.args {
            if *args != doc.args {
                return false;
            }
        }
        if let Some(ordered) = &self.ordered_kwargs {
            if *ordered != doc.ordered_kwargs {
                return false;
            }
        }
        if let Some(kwargs) = &self.kwargs {
            if *kwargs != doc.kwargs {
                return false;
            }
        }
        self.kwarg_fields
            .iter()
            .all(|(name, value)| doc.kwargs.get(name) == Some(value))
    }

    /// Parse the JSON filter syntax used by the admin CLI
    ///
    /// Accepted keys: `function`, `args` (array), `ordered_kwargs` (array of
    /// `[name, value]` pairs), `kwargs` (object) and `kwargs.<name>`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            CacheError::ConfigError(format!("filter must be a JSON object, got {}", value))
        })?;

        let mut filter = KeyFilter::new();
        for (field, v) in object {
            match field.as_str() {
                "function" => {
                    let name = v.as_str().ok_or_else(|| {
                        CacheError::ConfigError("filter field `function` must be a string".into())
                    })?;
                    filter = filter.function(name);
                }
                "args" => {
                    filter = filter.args(serde_json::from_value(v.clone())?);
                }
                "ordered_kwargs" => {
                    filter = filter.ordered_kwargs(serde_json::from_value(v.clone())?);
                }
                "kwargs" => {
                    filter = filter.kwargs(serde_json::from_value(v.clone())?);
                }
                other => match other.strip_prefix("kwargs.") {
                    Some(name) if !name.is_empty() => {
                        filter = filter.with_kwarg(name, v.clone());
                    }
                    _ => {
                        return Err(CacheError::ConfigError(format!(
                            "unknown filter field: {}",
                            other
                        )))
                    }
                },
            }
        }

        Ok(filter)
    }
}

/// Selection for bulk deletes
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteFilter {
    /// Every document in the store
    All,

    /// Documents of `function` matching at least one filter in `any_of`
    Function {
        function: String,
        any_of: Vec<KeyFilter>,
    },
}

impl DeleteFilter {
    pub fn matches(&self, doc: &CacheDocument) -> bool {
        match self {
            DeleteFilter::All => true,
            DeleteFilter::Function { function, any_of } => {
                doc.function == *function && any_of.iter().any(|f| f.matches(doc))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::derive_durable;
    use serde_json::json;

    fn doc(call: &CallArgs) -> CacheDocument {
        CacheDocument::new(&derive_durable("stats::group_scores", call), json!([]), None)
    }

    #[test]
    fn test_lookup_filter_matches_document() {
        let call = CallArgs::new().kwarg("gid", 3).kwarg("show_ineligible", true);
        let key = derive_durable("stats::group_scores", &call);

        assert!(key.lookup_filter().matches(&doc(&call)));
        assert!(key.full_filter().matches(&doc(&call)));

        let other = CallArgs::new().kwarg("gid", 4).kwarg("show_ineligible", true);
        assert!(!key.lookup_filter().matches(&doc(&other)));
    }

    #[test]
    fn test_kwarg_field_filter() {
        let a = doc(&CallArgs::new().kwarg("tid", 1).kwarg("uid", 10));
        let b = doc(&CallArgs::new().kwarg("tid", 2).kwarg("uid", 10));

        let filter = KeyFilter::kwarg("tid", 1);
        assert!(filter.matches(&a));
        assert!(!filter.matches(&b));

        let filter = KeyFilter::kwarg("uid", 10);
        assert!(filter.matches(&a) && filter.matches(&b));
    }

    #[test]
    fn test_for_call_filter() {
        let call = CallArgs::new().arg("x").kwarg("b", 2).kwarg("a", 1);
        let filter = KeyFilter::for_call(&call);
        assert!(filter.matches(&doc(&call)));
        assert!(!filter.matches(&doc(&CallArgs::new().kwarg("b", 2).kwarg("a", 1))));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = KeyFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&doc(&CallArgs::new().arg(1))));
    }

    #[test]
    fn test_delete_filter_is_function_scoped() {
        let d = doc(&CallArgs::new().kwarg("gid", 3));
        let same_fn = DeleteFilter::Function {
            function: "stats::group_scores".to_string(),
            any_of: vec![KeyFilter::kwarg("gid", 9), KeyFilter::kwarg("gid", 3)],
        };
        let other_fn = DeleteFilter::Function {
            function: "stats::team_scores".to_string(),
            any_of: vec![KeyFilter::kwarg("gid", 3)],
        };
        let no_filters = DeleteFilter::Function {
            function: "stats::group_scores".to_string(),
            any_of: vec![],
        };

        assert!(same_fn.matches(&d));
        assert!(!other_fn.matches(&d));
        assert!(!no_filters.matches(&d));
        assert!(DeleteFilter::All.matches(&d));
    }

    #[test]
    fn test_filter_from_json() {
        let filter = KeyFilter::from_json(&json!({
            "args": [1, "two"],
            "ordered_kwargs": [["eligible", true]],
            "kwargs.tid": 7
        }))
        .unwrap();

        assert_eq!(filter.args, Some(vec![json!(1), json!("two")]));
        assert_eq!(
            filter.ordered_kwargs,
            Some(vec![("eligible".to_string(), json!(true))])
        );
        assert_eq!(filter.kwarg_fields, vec![("tid".to_string(), json!(7))]);

        assert!(KeyFilter::from_json(&json!({"bogus": 1})).is_err());
        assert!(KeyFilter::from_json(&json!([1, 2])).is_err());
    }
}
