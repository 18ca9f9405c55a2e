//! Document filters, evaluated in process by every driver.
//!
//! Paths are dotted (`rfidTag.uid`). A path that crosses an array looks into
//! every element, so `callsigns.callsign` matches any entry of the list.
//! Equality against an array field means "contains".

use std::cmp::Ordering;

use serde_json::{Map, Value};

pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone)]
pub enum Condition {
    /// Equal, or contained in an array field. `Eq(path, Null)` also matches a missing field.
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    /// Case-insensitive substring match on string values.
    Contains(String, String),
    Exists(String, bool),
    Gte(String, Value),
    Lte(String, Value),
    /// Matches when any of the nested filters matches.
    Any(Vec<Filter>),
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn eq(self, path: &str, value: impl Into<Value>) -> Self {
        self.with(Condition::Eq(path.to_string(), value.into()))
    }

    pub fn ne(self, path: &str, value: impl Into<Value>) -> Self {
        self.with(Condition::Ne(path.to_string(), value.into()))
    }

    pub fn one_of(self, path: &str, values: Vec<Value>) -> Self {
        self.with(Condition::In(path.to_string(), values))
    }

    pub fn exists(self, path: &str, present: bool) -> Self {
        self.with(Condition::Exists(path.to_string(), present))
    }

    pub fn gte(self, path: &str, value: impl Into<Value>) -> Self {
        self.with(Condition::Gte(path.to_string(), value.into()))
    }

    pub fn lte(self, path: &str, value: impl Into<Value>) -> Self {
        self.with(Condition::Lte(path.to_string(), value.into()))
    }

    /// Case-insensitive search of `needle` across `paths`.
    pub fn search(self, paths: &[&str], needle: &str) -> Self {
        let needle = needle.trim();
        if needle.is_empty() {
            return self;
        }
        let any = paths
            .iter()
            .map(|p| Filter::new().with(Condition::Contains(p.to_string(), needle.to_string())))
            .collect();
        self.with(Condition::Any(any))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| condition_matches(c, doc))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// `createdAt` descending, ties broken by id descending.
    pub fn newest_first(filter: Filter) -> Self {
        Self::new(filter)
            .sort_by("createdAt", SortOrder::Desc)
            .sort_by(ID_FIELD, SortOrder::Desc)
    }

    pub fn sort_by(mut self, path: &str, order: SortOrder) -> Self {
        self.sort.push((path.to_string(), order));
        self
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }

    /// Filter, sort and slice `docs`.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.filter.matches(d)).collect();

        if !self.sort.is_empty() {
            out.sort_by(|a, b| {
                for (path, order) in &self.sort {
                    let ord = compare_values(first_value(a, path), first_value(b, path));
                    let ord = match order {
                        SortOrder::Asc => ord,
                        SortOrder::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let iter = out.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Every value reachable through `path`, descending into arrays.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut parts = path.split('.');
    let Some(head) = parts.next() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = doc.get(head).into_iter().collect();

    for part in parts {
        let mut next = Vec::new();
        for v in current {
            match v {
                Value::Object(map) => next.extend(map.get(part)),
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(map) = item {
                            next.extend(map.get(part));
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

pub fn first_value<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    lookup(doc, path).into_iter().next()
}

/// Shallow merge: top-level keys of `changes` replace those of `target`.
pub fn merge_top_level(target: &mut Document, changes: Document) {
    for (k, v) in changes {
        target.insert(k, v);
    }
}

fn value_eq(field: &Value, expected: &Value) -> bool {
    if field == expected {
        return true;
    }
    match (field, expected) {
        (Value::Array(items), e) if !e.is_array() => items.iter().any(|i| i == e),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => false,
    }
}

fn eq_matches(doc: &Document, path: &str, expected: &Value) -> bool {
    let found = lookup(doc, path);
    if found.is_empty() {
        return expected.is_null();
    }
    found.iter().any(|v| value_eq(v, expected))
}

fn condition_matches(condition: &Condition, doc: &Document) -> bool {
    match condition {
        Condition::Eq(path, v) => eq_matches(doc, path, v),
        Condition::Ne(path, v) => !eq_matches(doc, path, v),
        Condition::In(path, values) => values.iter().any(|v| eq_matches(doc, path, v)),
        Condition::Contains(path, needle) => {
            let needle = needle.to_lowercase();
            lookup(doc, path).iter().any(|v| match v {
                Value::String(s) => s.to_lowercase().contains(&needle),
                Value::Array(items) => items
                    .iter()
                    .any(|i| i.as_str().is_some_and(|s| s.to_lowercase().contains(&needle))),
                _ => false,
            })
        }
        Condition::Exists(path, present) => {
            let has = lookup(doc, path).iter().any(|v| !v.is_null());
            has == *present
        }
        Condition::Gte(path, v) => lookup(doc, path)
            .iter()
            .any(|f| comparable(f, v) && compare_values(Some(f), Some(v)) != Ordering::Less),
        Condition::Lte(path, v) => lookup(doc, path)
            .iter()
            .any(|f| comparable(f, v) && compare_values(Some(f), Some(v)) != Ordering::Greater),
        Condition::Any(filters) => filters.iter().any(|f| f.matches(doc)),
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
    )
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order used for sorting: null < bool < number < string < array < object.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn eq_looks_into_arrays_and_nested_paths() {
        let d = doc(json!({
            "callsign": "BG7XYZ",
            "tags": ["t1", "t2"],
            "rfidTag": {"uid": "04A1"},
            "callsigns": [{"callsign": "BD7AA"}, {"callsign": "BG7XYZ"}]
        }));
        assert!(Filter::new().eq("tags", "t2").matches(&d));
        assert!(Filter::new().eq("rfidTag.uid", "04A1").matches(&d));
        assert!(Filter::new().eq("callsigns.callsign", "BD7AA").matches(&d));
        assert!(Filter::new().eq("sentCard", Value::Null).matches(&d));
        assert!(!Filter::new().eq("tags", "t3").matches(&d));
        assert!(Filter::new().ne("callsign", "BA1AA").matches(&d));
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let d = doc(json!({"callsign": "BG7XYZ", "name": "Li Wei"}));
        assert!(Filter::new().search(&["callsign", "name"], "wei").matches(&d));
        assert!(Filter::new().search(&["callsign"], "g7x").matches(&d));
        assert!(!Filter::new().search(&["callsign"], "wei").matches(&d));
        assert!(Filter::new().search(&["callsign"], "  ").matches(&d));
    }

    #[test]
    fn range_and_in() {
        let d = doc(json!({"frequency": 14.074, "createdAt": "2024-05-01T00:00:00Z", "mode": "FT8"}));
        assert!(Filter::new().gte("frequency", 14).lte("frequency", 14.35).matches(&d));
        assert!(!Filter::new().gte("createdAt", "2024-06-01").matches(&d));
        assert!(Filter::new()
            .one_of("mode", vec![json!("SSB"), json!("FT8")])
            .matches(&d));
    }

    #[test]
    fn newest_first_sorts_and_pages() {
        let docs = vec![
            doc(json!({"_id": "a", "createdAt": "2024-01-01T00:00:00Z"})),
            doc(json!({"_id": "c", "createdAt": "2024-03-01T00:00:00Z"})),
            doc(json!({"_id": "b", "createdAt": "2024-03-01T00:00:00Z"})),
        ];
        let out = Query::newest_first(Filter::new()).page(1, 5).apply(docs);
        let ids: Vec<_> = out.iter().map(|d| d["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
