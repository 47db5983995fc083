//! Expression layer for WHERE conditions.
//!
//! `Expr::build()` renders `?N` placeholders whose indices are assigned as parameters
//! are pushed, so fragments compose without any string renumbering. Column names are
//! entity field names and are rendered quoted.

use crate::ident::quote_identifier;
use crate::qb::param::ParamList;
use crate::value::Value;

/// Expression node for building WHERE clauses.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// AND group: all conditions must be true.
    And(Vec<Expr>),

    /// OR group: at least one condition must be true.
    Or(Vec<Expr>),

    /// NOT: negate the inner expression.
    Not(Box<Expr>),

    /// Simple comparison: "column" op ?n
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },

    /// NULL check: "column" IS NULL or "column" IS NOT NULL
    NullCheck { column: String, is_null: bool },

    /// IN list: "column" IN (?1, ?2, ...) or "column" NOT IN (...)
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// BETWEEN: "column" BETWEEN ?n AND ?m
    Between {
        column: String,
        from: Value,
        to: Value,
        negated: bool,
    },

    /// Template with `?` placeholders that get numbered.
    /// Example: `a = ? OR b = ?` with `[1, 2]` -> `a = ?1 OR b = ?2`
    Template { sql: String, params: Vec<Value> },

    /// Raw SQL fragment without parameters.
    Raw(String),

    /// Always true (used for empty NOT IN lists).
    True,

    /// Always false (used for empty IN lists).
    False,
}

fn compare(column: impl Into<String>, op: &'static str, value: impl Into<Value>) -> Expr {
    Expr::Compare {
        column: column.into(),
        op,
        value: value.into(),
    }
}

impl Expr {
    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        compare(column, "=", value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        compare(column, "!=", value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        compare(column, ">", value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        compare(column, ">=", value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        compare(column, "<", value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        compare(column, "<=", value)
    }

    /// SQLite `LIKE` is case-insensitive for ASCII.
    pub fn like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        compare(column, "LIKE", pattern)
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        compare(column, "NOT LIKE", pattern)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: true,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: false,
        }
    }

    /// `"column" IN (...)`; an empty list matches nothing.
    pub fn in_list<T: Into<Value>>(column: impl Into<String>, values: Vec<T>) -> Self {
        if values.is_empty() {
            return Expr::False;
        }
        Expr::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// `"column" NOT IN (...)`; an empty list matches everything.
    pub fn not_in<T: Into<Value>>(column: impl Into<String>, values: Vec<T>) -> Self {
        if values.is_empty() {
            return Expr::True;
        }
        Expr::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn between(column: impl Into<String>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Expr::Between {
            column: column.into(),
            from: from.into(),
            to: to.into(),
            negated: false,
        }
    }

    pub fn not_between(
        column: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Expr::Between {
            column: column.into(),
            from: from.into(),
            to: to.into(),
            negated: true,
        }
    }

    /// A raw fragment with `?` placeholders, numbered at build time.
    pub fn template<T: Into<Value>>(sql: impl Into<String>, values: Vec<T>) -> Self {
        Expr::Template {
            sql: sql.into(),
            params: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Check if this expression is empty (contains no conditions).
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().all(Expr::is_empty),
            Expr::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    /// Field names this expression compares against. Template and raw fragments are opaque.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => {
                for e in exprs {
                    e.collect_columns(out);
                }
            }
            Expr::Not(inner) => inner.collect_columns(out),
            Expr::Compare { column, .. }
            | Expr::NullCheck { column, .. }
            | Expr::InList { column, .. }
            | Expr::Between { column, .. } => out.push(column),
            Expr::Template { .. } | Expr::Raw(_) | Expr::True | Expr::False => {}
        }
    }

    /// Build the SQL fragment, pushing parameters into `params`.
    pub fn build(&self, params: &mut ParamList) -> String {
        match self {
            Expr::And(exprs) => join_group(exprs, " AND ", params),
            Expr::Or(exprs) => join_group(exprs, " OR ", params),
            Expr::Not(inner) => {
                let sql = inner.build(params);
                if sql.is_empty() {
                    String::new()
                } else {
                    format!("NOT ({sql})")
                }
            }
            Expr::Compare { column, op, value } => {
                let p = params.placeholder(value.to_storage());
                format!("{} {} {}", quote_identifier(column), op, p)
            }
            Expr::NullCheck { column, is_null } => {
                let check = if *is_null { "IS NULL" } else { "IS NOT NULL" };
                format!("{} {}", quote_identifier(column), check)
            }
            Expr::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return if *negated { "1=1" } else { "1=0" }.to_string();
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| params.placeholder(v.to_storage()))
                    .collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!(
                    "{} {} ({})",
                    quote_identifier(column),
                    op,
                    placeholders.join(", ")
                )
            }
            Expr::Between {
                column,
                from,
                to,
                negated,
            } => {
                let from = params.placeholder(from.to_storage());
                let to = params.placeholder(to.to_storage());
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {} {} AND {}", quote_identifier(column), op, from, to)
            }
            Expr::Template {
                sql,
                params: template_params,
            } => {
                let mut result = String::with_capacity(sql.len());
                let mut values = template_params.iter().peekable();
                for ch in sql.chars() {
                    match values.next_if(|_| ch == '?') {
                        Some(v) => result.push_str(&params.placeholder(v.to_storage())),
                        None => result.push(ch),
                    }
                }
                result
            }
            Expr::Raw(sql) => sql.clone(),
            Expr::True => "1=1".to_string(),
            Expr::False => "1=0".to_string(),
        }
    }
}

fn join_group(exprs: &[Expr], sep: &str, params: &mut ParamList) -> String {
    let parts: Vec<String> = exprs
        .iter()
        .filter(|e| !e.is_empty())
        .map(|e| {
            let sql = e.build(params);
            // Nested groups keep their own precedence.
            if matches!(e, Expr::And(_) | Expr::Or(_)) && !sql.is_empty() {
                format!("({sql})")
            } else {
                sql
            }
        })
        .filter(|s| !s.is_empty())
        .collect();
    parts.join(sep)
}

/// Conditions ANDed together, built incrementally.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExprGroup {
    exprs: Vec<Expr>,
}

impl ExprGroup {
    pub fn new() -> Self {
        Self { exprs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.iter().all(Expr::is_empty)
    }

    pub fn and_expr(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Build the condition without the `WHERE` keyword; empty when there is nothing to filter.
    pub fn build(&self, params: &mut ParamList) -> String {
        join_group(&self.exprs, " AND ", params)
    }
}
