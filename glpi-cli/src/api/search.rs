//! Search request building and defensive response normalization
//!
//! The GLPI search endpoint answers with shapes that vary by resource type
//! and server configuration: the documented `{totalcount, data: [...]}`
//! envelope, a bare list of positionally-keyed records, or an envelope whose
//! rows use positional keys (`"1"` = name, `"2"` = id). Everything is
//! normalized into [`SearchReply`] here so the rest of the crate never
//! branches on raw response shape.

use serde_json::{Map, Value};

/// Search-option index for the name column. GLPI assigns `1` to the name
/// of every itemtype.
pub const FIELD_NAME: &str = "1";

/// Search-option index for the parent entity on the primary search.
pub const FIELD_SCOPE_PRIMARY: &str = "80";

/// Search-option index for the parent entity on duplicate-recovery
/// searches. The two indices differ on purpose: they mirror what the
/// target servers actually answer on each path, and live here so a
/// live-server correction is a one-line change.
pub const FIELD_SCOPE_RECOVERY: &str = "4";

/// Candidate criterion fields tried in order during duplicate recovery.
pub const RECOVERY_FIELDS: [&str; 4] = ["name", "1", "2", "completename"];

/// One `criteria[N][...]` block of an indexed search query.
#[derive(Debug, Clone)]
pub struct Criterion {
    pub link: Option<&'static str>,
    pub field: String,
    pub searchtype: &'static str,
    pub value: String,
}

impl Criterion {
    /// Equality criterion with no boolean link.
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            link: None,
            field: field.into(),
            searchtype: "equals",
            value: value.into(),
        }
    }

    /// Equality criterion AND-composed with the previous one.
    pub fn and(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            link: Some("AND"),
            ..Self::equals(field, value)
        }
    }

    /// Expand into `criteria[idx][...]` query pairs.
    pub fn to_params(&self, idx: usize) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(4);
        if let Some(link) = self.link {
            params.push((format!("criteria[{idx}][link]"), link.to_string()));
        }
        params.push((format!("criteria[{idx}][field]"), self.field.clone()));
        params.push((format!("criteria[{idx}][searchtype]"), self.searchtype.to_string()));
        params.push((format!("criteria[{idx}][value]"), self.value.clone()));
        params
    }
}

/// Flatten a criteria list into query pairs.
pub fn criteria_params(criteria: &[Criterion]) -> Vec<(String, String)> {
    criteria
        .iter()
        .enumerate()
        .flat_map(|(idx, c)| c.to_params(idx))
        .collect()
}

/// Coerce a JSON value to an integer id.
///
/// A non-numeric or missing id is "not found", never a fake id.
pub fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One record of a search reply, in whatever key convention the server
/// chose to answer with.
#[derive(Debug, Clone)]
pub struct SearchHit(Map<String, Value>);

impl SearchHit {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Extract the record id: named `id` key first, positional `"2"` as
    /// fallback.
    pub fn id(&self) -> Option<i64> {
        self.0
            .get("id")
            .and_then(coerce_id)
            .or_else(|| self.0.get("2").and_then(coerce_id))
    }

    /// Exact name match against the positional `"1"` or named `name` key.
    pub fn name_equals(&self, value: &str) -> bool {
        let by_key = |key: &str| {
            self.0
                .get(key)
                .map(|v| coerced_string(v) == value)
                .unwrap_or(false)
        };
        by_key("1") || by_key("name")
    }

    /// Name match extended with the `completename` suffix convention
    /// (`Root > Child > value`).
    pub fn name_matches(&self, value: &str) -> bool {
        if self.name_equals(value) {
            return true;
        }
        self.0
            .get("completename")
            .and_then(|v| v.as_str())
            .map(|full| full.ends_with(value))
            .unwrap_or(false)
    }

    /// String-coerced equality on an arbitrary key.
    pub fn field_equals(&self, key: &str, value: &str) -> bool {
        self.0
            .get(key)
            .map(|v| coerced_string(v) == value)
            .unwrap_or(false)
    }

    /// Parent/scope attribute as a string, from whichever key is present.
    pub fn scope(&self) -> Option<String> {
        ["entities_id", "4", "parent_id"]
            .iter()
            .find_map(|key| self.0.get(*key))
            .map(coerced_string)
    }

    /// String-coerced scope comparison; an absent expected scope accepts
    /// any record.
    pub fn scope_matches(&self, expected: Option<i64>) -> bool {
        match expected {
            None => true,
            Some(want) => self.scope().map(|s| s == want.to_string()).unwrap_or(false),
        }
    }
}

/// Normalized search response.
#[derive(Debug, Clone)]
pub enum SearchReply {
    /// The documented `{totalcount, data}` envelope
    Envelope { total: u64, hits: Vec<SearchHit> },
    /// The undocumented bare-list shape some servers answer with
    Rows(Vec<SearchHit>),
}

impl SearchReply {
    /// Normalize a raw JSON body. Unparseable shapes normalize to an
    /// empty envelope rather than an error: a garbled search reply means
    /// "not found here", and the caller falls through to its next strategy.
    pub fn parse(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let total = map.get("totalcount").and_then(Value::as_u64).unwrap_or(0);
                let hits = map
                    .get("data")
                    .and_then(Value::as_array)
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|row| row.as_object().cloned().map(SearchHit::new))
                            .collect()
                    })
                    .unwrap_or_default();
                Self::Envelope { total, hits }
            }
            Value::Array(rows) => Self::Rows(
                rows.into_iter()
                    .filter_map(|row| match row {
                        Value::Object(map) => Some(SearchHit::new(map)),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => Self::Envelope {
                total: 0,
                hits: Vec::new(),
            },
        }
    }

    /// Primary-search extraction: an envelope with a positive count yields
    /// its first row's id; a bare list is scanned for an exact name match.
    pub fn locate(&self, name: &str) -> Option<i64> {
        match self {
            Self::Envelope { total, hits } if *total > 0 => hits.first().and_then(SearchHit::id),
            Self::Envelope { .. } => None,
            Self::Rows(hits) => hits.iter().find(|h| h.name_equals(name)).and_then(SearchHit::id),
        }
    }

    /// Recovery-search extraction: scan both shapes for a name match
    /// (including `completename` suffix) under the expected scope.
    pub fn find_matching(&self, name: &str, scope: Option<i64>) -> Option<i64> {
        self.hits()
            .iter()
            .find(|h| h.name_matches(name) && h.scope_matches(scope))
            .and_then(SearchHit::id)
    }

    fn hits(&self) -> &[SearchHit] {
        match self {
            Self::Envelope { hits, .. } => hits,
            Self::Rows(hits) => hits,
        }
    }
}

/// String coercion for loose comparisons: numbers and strings compare by
/// their decimal text.
fn coerced_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_id() {
        assert_eq!(coerce_id(&json!(12)), Some(12));
        assert_eq!(coerce_id(&json!("34")), Some(34));
        assert_eq!(coerce_id(&json!(" 5 ")), Some(5));
        assert_eq!(coerce_id(&json!("Acme")), None);
        assert_eq!(coerce_id(&Value::Null), None);
    }

    #[test]
    fn test_criterion_params() {
        let params = Criterion::equals(FIELD_NAME, "Acme").to_params(0);
        assert_eq!(
            params,
            vec![
                ("criteria[0][field]".to_string(), "1".to_string()),
                ("criteria[0][searchtype]".to_string(), "equals".to_string()),
                ("criteria[0][value]".to_string(), "Acme".to_string()),
            ]
        );

        let params = Criterion::and("entities_id", "3").to_params(1);
        assert_eq!(params[0], ("criteria[1][link]".to_string(), "AND".to_string()));
    }

    #[test]
    fn test_parse_envelope() {
        let reply = SearchReply::parse(json!({
            "totalcount": 1,
            "data": [{"1": "Acme", "2": 17, "80": "Root"}]
        }));
        assert_eq!(reply.locate("Acme"), Some(17));
    }

    #[test]
    fn test_parse_envelope_empty() {
        let reply = SearchReply::parse(json!({"totalcount": 0, "data": []}));
        assert_eq!(reply.locate("Acme"), None);
    }

    #[test]
    fn test_parse_bare_list() {
        let reply = SearchReply::parse(json!([
            {"name": "Other", "id": 4},
            {"1": "Acme", "id": "9"}
        ]));
        assert_eq!(reply.locate("Acme"), Some(9));
        assert_eq!(reply.locate("Missing"), None);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        let reply = SearchReply::parse(json!("unexpected"));
        assert_eq!(reply.locate("Acme"), None);
    }

    #[test]
    fn test_hit_id_fallback_chain() {
        let hit = SearchHit::new(json!({"2": "21"}).as_object().unwrap().clone());
        assert_eq!(hit.id(), Some(21));
        let hit = SearchHit::new(json!({"id": 3, "2": 99}).as_object().unwrap().clone());
        assert_eq!(hit.id(), Some(3));
        let hit = SearchHit::new(json!({"id": "n/a"}).as_object().unwrap().clone());
        assert_eq!(hit.id(), None);
    }

    #[test]
    fn test_find_matching_completename_and_scope() {
        let reply = SearchReply::parse(json!({
            "totalcount": 2,
            "data": [
                {"completename": "Root > Acme > Finance", "id": 30, "entities_id": 12},
                {"completename": "Root > Other > Finance", "id": 31, "entities_id": 99}
            ]
        }));
        assert_eq!(reply.find_matching("Finance", Some(12)), Some(30));
        assert_eq!(reply.find_matching("Finance", Some(99)), Some(31));
        assert_eq!(reply.find_matching("Finance", Some(1)), None);
        // scope absent: first name match wins
        assert_eq!(reply.find_matching("Finance", None), Some(30));
    }

    #[test]
    fn test_scope_string_coercion() {
        let hit = SearchHit::new(json!({"entities_id": "7", "id": 1}).as_object().unwrap().clone());
        assert!(hit.scope_matches(Some(7)));
        let hit = SearchHit::new(json!({"4": 7, "id": 1}).as_object().unwrap().clone());
        assert!(hit.scope_matches(Some(7)));
        assert!(!hit.scope_matches(Some(8)));
    }
}
