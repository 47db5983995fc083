//! Filter model: WHERE conditions plus ordering and paging.

use crate::qb::expr::{Expr, ExprGroup};
use crate::value::Value;

/// Sort direction for [`Filter::order_by_asc`] / [`Filter::order_by_desc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Selects the rows a query-scoped patch, delete, count or find applies to.
///
/// An empty filter matches every row.
///
/// # Example
/// ```ignore
/// let filter = Filter::new().gte("count", 10).is_null("note").limit(50);
/// ```
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    where_group: ExprGroup,
    order: Vec<(String, Order)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// AND an arbitrary expression.
    pub fn and_expr(mut self, expr: Expr) -> Self {
        self.where_group.and_expr(expr);
        self
    }

    /// AND a group of alternatives.
    pub fn or(self, exprs: Vec<Expr>) -> Self {
        self.and_expr(Expr::Or(exprs))
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_expr(Expr::eq(column, value))
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_expr(Expr::ne(column, value))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_expr(Expr::gt(column, value))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_expr(Expr::gte(column, value))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_expr(Expr::lt(column, value))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.and_expr(Expr::lte(column, value))
    }

    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.and_expr(Expr::like(column, pattern))
    }

    pub fn not_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.and_expr(Expr::not_like(column, pattern))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.and_expr(Expr::is_null(column))
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.and_expr(Expr::is_not_null(column))
    }

    pub fn in_list<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.and_expr(Expr::in_list(column, values))
    }

    pub fn not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.and_expr(Expr::not_in(column, values))
    }

    pub fn between(self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.and_expr(Expr::between(column, from, to))
    }

    /// AND a raw fragment with `?` placeholders.
    pub fn template<T: Into<Value>>(self, sql: &str, values: Vec<T>) -> Self {
        self.and_expr(Expr::template(sql, values))
    }

    /// AND a raw fragment without parameters.
    pub fn raw(self, sql: &str) -> Self {
        self.and_expr(Expr::raw(sql))
    }

    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.order.push((column.to_string(), Order::Asc));
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order.push((column.to_string(), Order::Desc));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn conditions(&self) -> &ExprGroup {
        &self.where_group
    }

    pub fn ordering(&self) -> &[(String, Order)] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Field names referenced by conditions and ordering.
    pub fn columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .where_group
            .exprs()
            .iter()
            .flat_map(Expr::columns)
            .collect();
        out.extend(self.order.iter().map(|(c, _)| c.as_str()));
        out
    }
}
