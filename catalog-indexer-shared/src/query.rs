//! Backend-agnostic query model.
//!
//! Queries are expressed as a tree of [`AbstractQuery`] nodes and wrapped in a
//! [`SearchQuery`] envelope that carries sorting and paging. The repository
//! layer compiles them into the search engine's native query language.

use serde::{Deserialize, Serialize};

/// A scalar value a field can be compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for TermValue {
    fn from(value: &str) -> Self {
        TermValue::String(value.to_string())
    }
}

impl From<String> for TermValue {
    fn from(value: String) -> Self {
        TermValue::String(value)
    }
}

impl From<i64> for TermValue {
    fn from(value: i64) -> Self {
        TermValue::Integer(value)
    }
}

impl From<bool> for TermValue {
    fn from(value: bool) -> Self {
        TermValue::Bool(value)
    }
}

/// Bounds of a range query. Unset bounds are open.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<TermValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<TermValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<TermValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<TermValue>,
}

/// Boolean combination of sub-queries.
///
/// `must` is a conjunction, `should` a disjunction, `must_not` a negation and
/// `filter` a non-scoring conjunction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoolQuery {
    #[serde(default)]
    pub must: Vec<AbstractQuery>,
    #[serde(default)]
    pub should: Vec<AbstractQuery>,
    #[serde(default)]
    pub filter: Vec<AbstractQuery>,
    #[serde(default)]
    pub must_not: Vec<AbstractQuery>,
}

/// How the terms of a text query are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOperator {
    #[default]
    And,
    Or,
}

/// One node of an abstract query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbstractQuery {
    /// Matches every document.
    MatchAll {},
    /// Exact match of one field against one value.
    Term { field: String, value: TermValue },
    /// Exact match of one field against any of several values.
    Terms { field: String, values: Vec<TermValue> },
    /// Full text match over one or more fields.
    Text {
        text: String,
        fields: Vec<String>,
        #[serde(default)]
        operator: TextOperator,
    },
    /// Lookup by document identity.
    Ids { ids: Vec<String> },
    /// Range comparison on a field.
    Range(RangeQuery),
    /// Boolean combination of sub-queries.
    Bool(BoolQuery),
}

impl AbstractQuery {
    /// Term match on a field.
    pub fn term(field: impl Into<String>, value: impl Into<TermValue>) -> Self {
        AbstractQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjunction of the given queries.
    pub fn and(queries: Vec<AbstractQuery>) -> Self {
        AbstractQuery::Bool(BoolQuery {
            must: queries,
            ..Default::default()
        })
    }

    /// Disjunction of the given queries.
    pub fn or(queries: Vec<AbstractQuery>) -> Self {
        AbstractQuery::Bool(BoolQuery {
            should: queries,
            ..Default::default()
        })
    }

    /// Negation of the given query.
    pub fn not(query: AbstractQuery) -> Self {
        AbstractQuery::Bool(BoolQuery {
            must_not: vec![query],
            ..Default::default()
        })
    }

    /// Node kind name, as used in the JSON representation.
    pub fn kind(&self) -> &'static str {
        match self {
            AbstractQuery::MatchAll {} => "matchAll",
            AbstractQuery::Term { .. } => "term",
            AbstractQuery::Terms { .. } => "terms",
            AbstractQuery::Text { .. } => "text",
            AbstractQuery::Ids { .. } => "ids",
            AbstractQuery::Range(_) => "range",
            AbstractQuery::Bool(_) => "bool",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl Sort {
    /// Ascending sort on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// A search request: query tree plus sorting and paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: AbstractQuery,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Sort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl SearchQuery {
    /// A request for the given query with default sorting and paging.
    pub fn new(query: AbstractQuery) -> Self {
        Self {
            query,
            sort: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    /// Replace the sort order.
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Skip the first `skip` hits.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Return at most `limit` hits.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
