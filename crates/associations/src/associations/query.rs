//! Relation queries - descriptions of the storage operation an accessor stands for
//!
//! Accessors never talk to a database. They return a [`RelationQuery`] that the
//! query layer turns into SQL and executes.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryKind {
    FindOne,
    FindAll,
    Count,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

/// Inner join through a link table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub table: String,
    /// Column on the queried table
    pub left_column: String,
    /// Column on the joined table
    pub right_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationQuery {
    pub kind: QueryKind,
    pub table: String,
    pub filters: Vec<Filter>,
    pub join: Option<Join>,
    /// Values written by inserts and updates
    pub values: Map<String, Value>,
}

impl RelationQuery {
    fn new(kind: QueryKind, table: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            filters: Vec::new(),
            join: None,
            values: Map::new(),
        }
    }

    pub fn find_one(table: &str) -> Self {
        Self::new(QueryKind::FindOne, table)
    }

    pub fn find_all(table: &str) -> Self {
        Self::new(QueryKind::FindAll, table)
    }

    pub fn count(table: &str) -> Self {
        Self::new(QueryKind::Count, table)
    }

    pub fn insert(table: &str, values: Map<String, Value>) -> Self {
        let mut query = Self::new(QueryKind::Insert, table);
        query.values = values;
        query
    }

    pub fn update(table: &str, values: Map<String, Value>) -> Self {
        let mut query = Self::new(QueryKind::Update, table);
        query.values = values;
        query
    }

    pub fn delete(table: &str) -> Self {
        Self::new(QueryKind::Delete, table)
    }

    pub fn filter_eq(mut self, column: &str, value: Value) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value,
        });
        self
    }

    pub fn filter_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In {
            column: column.to_string(),
            values,
        });
        self
    }

    /// Add an equality filter for every scope entry
    pub fn with_scope(mut self, scope: &IndexMap<String, Value>) -> Self {
        for (column, value) in scope {
            self = self.filter_eq(column, value.clone());
        }
        self
    }

    pub fn join(mut self, table: &str, left_column: &str, right_column: &str) -> Self {
        self.join = Some(Join {
            table: table.to_string(),
            left_column: left_column.to_string(),
            right_column: right_column.to_string(),
        });
        self
    }
}

/// Result of calling a generated accessor
#[derive(Debug, Clone, PartialEq)]
pub enum AccessorOutput {
    /// The call only touched the instance, or there is nothing to load
    Nothing,
    Value(Value),
    Query(RelationQuery),
    /// Operations to run in order
    Queries(Vec<RelationQuery>),
}

impl AccessorOutput {
    pub fn as_query(&self) -> Option<&RelationQuery> {
        match self {
            AccessorOutput::Query(query) => Some(query),
            _ => None,
        }
    }

    pub fn into_queries(self) -> Vec<RelationQuery> {
        match self {
            AccessorOutput::Query(query) => vec![query],
            AccessorOutput::Queries(queries) => queries,
            AccessorOutput::Nothing | AccessorOutput::Value(_) => Vec::new(),
        }
    }
}

/// Key value of an associated argument: the key attribute of an object, or the value itself
pub(crate) fn key_of(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Flatten accessor arguments (single values or arrays) into key values
pub(crate) fn collect_keys(args: Vec<Value>, key: &str) -> Vec<Value> {
    let mut keys = Vec::new();
    for arg in args {
        match arg {
            Value::Array(items) => keys.extend(items.iter().map(|item| key_of(item, key))),
            other => keys.push(key_of(&other, key)),
        }
    }
    keys
}

/// First argument as an object; anything else yields an empty map
pub(crate) fn values_arg(args: Vec<Value>) -> Map<String, Value> {
    match args.into_iter().next() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let query = RelationQuery::find_all("Posts")
            .filter_eq("userId", json!(1))
            .filter_in("id", vec![json!(2), json!(3)]);

        assert_eq!(query.kind, QueryKind::FindAll);
        assert_eq!(query.filters.len(), 2);
        assert!(query.join.is_none());
    }

    #[test]
    fn test_scope_filters() {
        let mut scope = IndexMap::new();
        scope.insert("commentable".to_string(), json!("post"));
        let query = RelationQuery::count("Comments").with_scope(&scope);

        assert_eq!(
            query.filters,
            vec![Filter::Eq {
                column: "commentable".to_string(),
                value: json!("post")
            }]
        );
    }

    #[test]
    fn test_key_extraction() {
        assert_eq!(key_of(&json!({"id": 4, "name": "x"}), "id"), json!(4));
        assert_eq!(key_of(&json!(7), "id"), json!(7));
        assert_eq!(key_of(&json!({"name": "x"}), "id"), Value::Null);

        let keys = collect_keys(vec![json!([1, {"id": 2}]), json!(3)], "id");
        assert_eq!(keys, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_output_helpers() {
        let query = RelationQuery::delete("Tags");
        let output = AccessorOutput::Query(query.clone());
        assert_eq!(output.as_query(), Some(&query));
        assert_eq!(output.into_queries(), vec![query]);
        assert!(AccessorOutput::Nothing.into_queries().is_empty());
    }
}
