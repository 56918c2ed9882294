//! Row queries against the hosted data API
//!
//! [`Select`] and [`Update`] describe a request independently of the
//! service behind it. The HTTP service renders them to query parameters,
//! the in-memory service evaluates them directly against its tables.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::ClientResult;

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
}

/// Column condition, all filters of a query must hold
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq(value.into()),
        }
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Query parameter, e.g. `("order_status", "in.(PENDING,ACCEPTED)")`
    pub fn to_param(&self) -> (String, String) {
        let value = match &self.op {
            FilterOp::Eq(v) => format!("eq.{}", literal(v)),
            FilterOp::In(values) => format!(
                "in.({})",
                values.iter().map(quoted).collect::<Vec<_>>().join(",")
            ),
        };
        (self.column.clone(), value)
    }

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let Some(cell) = row.get(&self.column).filter(|v| !v.is_null()) else {
            return false;
        };
        let cell = literal(cell);
        match &self.op {
            FilterOp::Eq(v) => literal(v) == cell,
            FilterOp::In(values) => values.iter().any(|v| literal(v) == cell),
        }
    }
}

/// Plain text form of a scalar, as the data API compares it
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// List members containing reserved characters must be double-quoted
fn quoted(value: &Value) -> String {
    let text = literal(value);
    if text.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", text.replace('"', "\\\""))
    } else {
        text
    }
}

// ============================================================================
// Embeds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Parent holds the foreign key (`orders.user_id -> users.id`)
    ToOne,
    /// Child rows hold the foreign key (`order_items.order_id -> orders.id`)
    ToMany,
}

/// Related rows joined into each result row under `alias`
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    pub relation: Relation,
    /// Foreign key column: on the parent for `ToOne`, on the child for `ToMany`
    pub column: String,
    /// `None` selects every column
    pub columns: Option<Vec<String>>,
    pub embeds: Vec<Embed>,
}

impl Embed {
    pub fn one(alias: &str, table: &str, column: &str) -> Self {
        Self::new(alias, table, Relation::ToOne, column)
    }

    pub fn many(alias: &str, table: &str, column: &str) -> Self {
        Self::new(alias, table, Relation::ToMany, column)
    }

    fn new(alias: &str, table: &str, relation: Relation, column: &str) -> Self {
        Self {
            alias: alias.to_string(),
            table: table.to_string(),
            relation,
            column: column.to_string(),
            columns: None,
            embeds: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    fn render(&self, parent_table: &str) -> String {
        let inner = render_columns(self.columns.as_deref(), &self.embeds, &self.table);
        match self.relation {
            // Disambiguate by constraint name: `users` is referenced twice by `orders`
            Relation::ToOne => format!(
                "{}:{}!{}_{}_fkey({})",
                self.alias, self.table, parent_table, self.column, inner
            ),
            Relation::ToMany => format!("{}:{}({})", self.alias, self.table, inner),
        }
    }
}

fn render_columns(columns: Option<&[String]>, embeds: &[Embed], table: &str) -> String {
    let mut parts = match columns {
        Some(cols) if !cols.is_empty() => cols.to_vec(),
        _ => vec!["*".to_string()],
    };
    parts.extend(embeds.iter().map(|e| e.render(table)));
    parts.join(",")
}

// ============================================================================
// Select
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub ascending: bool,
}

/// Read request for one table
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Option<Sort>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: None,
            embeds: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn is_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filter(Filter::is_in(column, values))
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Sort {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Value of the `select` parameter
    pub fn select_param(&self) -> String {
        render_columns(self.columns.as_deref(), &self.embeds, &self.table)
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select_param())];
        pairs.extend(self.filters.iter().map(Filter::to_param));
        if let Some(sort) = &self.order {
            let dir = if sort.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", sort.column, dir)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

/// Ordering used by the in-memory service: numbers numerically, RFC 3339
/// timestamps by instant, everything else by text, missing values last
pub fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.filter(|v| !v.is_null()), b.filter(|v| !v.is_null())) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                chrono::DateTime::parse_from_rfc3339(x),
                chrono::DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => literal(x).cmp(&literal(y)),
    }
}

// ============================================================================
// Update
// ============================================================================

/// Conditional write: `values` are applied to every row matching `filters`
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub values: Map<String, Value>,
    pub filters: Vec<Filter>,
}

impl Update {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            values: Map::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }

    pub fn values(mut self, values: Map<String, Value>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::is_in(column, values));
        self
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.filters.iter().map(Filter::to_param).collect()
    }

    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

/// Decode raw rows into typed records
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> ClientResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}
