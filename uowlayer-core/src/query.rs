//! Filter and sort construction for repository queries.
//!
//! Filters are backend-agnostic expression trees ([`Expr`]) built with the
//! [`Filter`] helpers. Each backend walks them with a [`FilterVisitor`]: the
//! MongoDB backend translates them into a filter document, the in-memory
//! backend evaluates them directly against stored documents.
//!
//! ```ignore
//! use uowlayer::query::{Filter, Sort};
//!
//! let filter = Filter::eq("status", "active").and(Filter::gt("total", 100));
//! let sort = Sort::descending("created_at").then_ascending("_id");
//! ```
//!
//! The available helpers:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Array: `any_of`, `none_of`
//! - Logical: `and`, `or`, and `all` which matches every document

use bson::Bson;

use crate::error::UnitOfWorkError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// An ordered list of sort keys. Earlier keys take precedence.
///
/// # Example
///
/// ```ignore
/// use uowlayer::query::Sort;
///
/// let sort = Sort::ascending("customer").then_descending("total");
/// assert_eq!(sort.keys().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    keys: Vec<SortKey>,
}

impl Sort {
    /// Creates a sort on a single field in ascending order.
    pub fn ascending(field: impl Into<String>) -> Self {
        Sort::default().then(field, SortDirection::Asc)
    }

    /// Creates a sort on a single field in descending order.
    pub fn descending(field: impl Into<String>) -> Self {
        Sort::default().then(field, SortDirection::Desc)
    }

    /// Appends a key sorting by `field` in `direction`.
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey { field: field.into(), direction });
        self
    }

    /// Appends an ascending key.
    pub fn then_ascending(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Asc)
    }

    /// Appends a descending key.
    pub fn then_descending(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Desc)
    }

    /// Returns the keys in precedence order.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Returns `true` if no key was added.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Comparison applied by an [`Expr::Field`] node.
///
/// String operators are case-sensitive and match the operand literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match on strings, membership on arrays.
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    /// The field equals, or the array field holds, one of the listed values.
    AnyOf,
    NoneOf,
}

/// A filter expression tree.
///
/// An empty `And` matches every document and an empty `Or` matches none.
/// Build trees with [`Filter`] rather than by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// `true` requires the field to be present, `false` requires it absent.
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Conjunction with `other`. Chained calls extend one flat `And`.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Disjunction with `other`. Chained calls extend one flat `Or`.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

macro_rules! field_filters {
    ($($(#[$doc:meta])* $name:ident => $op:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
                Expr::field(field.into(), FieldOp::$op, value.into())
            }
        )*
    };
}

/// Constructors for [`Expr`].
///
/// ```ignore
/// use uowlayer::query::Filter;
///
/// let unpaid = Filter::eq("status", "open").and(Filter::gte("total", 100));
/// let everything = Filter::all();
/// ```
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    field_filters! {
        eq => Eq;
        ne => Ne;
        gt => Gt;
        gte => Gte;
        lt => Lt;
        lte => Lte;
        starts_with => StartsWith;
        ends_with => EndsWith;
        contains => Contains;
        not_contains => NotContains;
        /// `value` is usually an array of candidates.
        any_of => AnyOf;
        none_of => NoneOf;
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// Walks a filter expression, producing a backend-specific output.
///
/// Implementors handle each node kind; [`FilterVisitor::visit_expr`] dispatches.
pub trait FilterVisitor {
    type Output;
    type Error: Into<UnitOfWorkError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_keep_precedence() {
        let sort = Sort::descending("total").then_ascending("_id");

        assert_eq!(
            sort.keys(),
            &[
                SortKey { field: "total".to_string(), direction: SortDirection::Desc },
                SortKey { field: "_id".to_string(), direction: SortDirection::Asc },
            ]
        );
        assert!(Sort::default().is_empty());
    }

    #[test]
    fn chained_and_flattens() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("expected a flat AND, got {:?}", other),
        }
    }

    #[test]
    fn all_is_an_empty_conjunction() {
        assert_eq!(Filter::all(), Expr::And(Vec::new()));
    }
}
