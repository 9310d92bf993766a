//! Store-agnostic filter and ordering AST.
//!
//! Handlers and services build `Filter` values; storage adapters consume them.
//! Nothing in here knows how documents are laid out or evaluated.

pub mod ast {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq)]
    pub enum Expr {
        And(Vec<Expr>),
        Or(Vec<Expr>),
        Not(Box<Expr>),
        /// `field <op> value`
        Compare(String, CompareOperator, Value),
        /// `field IN (values...)`; an empty list never matches.
        In(String, Vec<Value>),
        /// Field presence test. `Exists(f, false)` matches documents without `f`.
        Exists(String, bool),
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum CompareOperator {
        Eq,
        Ne,
        Gt,
        Ge,
        Lt,
        Le,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum Value {
        Null,
        Bool(bool),
        Int(i64),
        String(String),
    }

    impl From<i64> for Value {
        fn from(v: i64) -> Self {
            Value::Int(v)
        }
    }

    impl From<bool> for Value {
        fn from(v: bool) -> Self {
            Value::Bool(v)
        }
    }

    impl From<&str> for Value {
        fn from(v: &str) -> Self {
            Value::String(v.to_string())
        }
    }

    impl From<String> for Value {
        fn from(v: String) -> Self {
            Value::String(v)
        }
    }

    impl From<Value> for serde_json::Value {
        fn from(v: Value) -> Self {
            match v {
                Value::Null => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(b),
                Value::Int(i) => serde_json::Value::from(i),
                Value::String(s) => serde_json::Value::String(s),
            }
        }
    }

    impl Expr {
        pub fn eq(field: impl Into<String>, v: impl Into<Value>) -> Self {
            Expr::Compare(field.into(), CompareOperator::Eq, v.into())
        }
        pub fn ne(field: impl Into<String>, v: impl Into<Value>) -> Self {
            Expr::Compare(field.into(), CompareOperator::Ne, v.into())
        }
        pub fn gt(field: impl Into<String>, v: impl Into<Value>) -> Self {
            Expr::Compare(field.into(), CompareOperator::Gt, v.into())
        }
        pub fn ge(field: impl Into<String>, v: impl Into<Value>) -> Self {
            Expr::Compare(field.into(), CompareOperator::Ge, v.into())
        }
        pub fn lt(field: impl Into<String>, v: impl Into<Value>) -> Self {
            Expr::Compare(field.into(), CompareOperator::Lt, v.into())
        }
        pub fn le(field: impl Into<String>, v: impl Into<Value>) -> Self {
            Expr::Compare(field.into(), CompareOperator::Le, v.into())
        }
        pub fn exists(field: impl Into<String>, present: bool) -> Self {
            Expr::Exists(field.into(), present)
        }
        pub fn is_in<V: Into<Value>>(field: impl Into<String>, vs: impl IntoIterator<Item = V>) -> Self {
            Expr::In(field.into(), vs.into_iter().map(Into::into).collect())
        }
    }
}

pub mod range;

mod order;
pub use order::{Order, OrderKey, SortDir};

/// Optional filter expression. `Filter::none()` matches every document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter(pub Option<Box<ast::Expr>>);

impl Filter {
    pub fn none() -> Self {
        Self(None)
    }
    pub fn some(expr: ast::Expr) -> Self {
        Self(Some(Box::new(expr)))
    }
    pub fn as_ast(&self) -> Option<&ast::Expr> {
        self.0.as_deref()
    }
    pub fn into_ast(self) -> Option<ast::Expr> {
        self.0.map(|b| *b)
    }
    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Conjunction of this filter with `expr`, flattening nested `And`s.
    pub fn and(self, expr: ast::Expr) -> Self {
        match self.into_ast() {
            None => Filter::some(expr),
            Some(ast::Expr::And(mut terms)) => {
                terms.push(expr);
                Filter::some(ast::Expr::And(terms))
            }
            Some(other) => Filter::some(ast::Expr::And(vec![other, expr])),
        }
    }

    /// Conjunction with another optional filter.
    pub fn and_filter(self, other: Filter) -> Self {
        match other.into_ast() {
            None => self,
            Some(expr) => self.and(expr),
        }
    }

    /// Build a conjunction out of any number of terms.
    pub fn all(terms: impl IntoIterator<Item = ast::Expr>) -> Self {
        terms.into_iter().fold(Filter::none(), Filter::and)
    }
}

impl From<Option<ast::Expr>> for Filter {
    fn from(opt: Option<ast::Expr>) -> Self {
        match opt {
            Some(e) => Filter::some(e),
            None => Filter::none(),
        }
    }
}

impl From<ast::Expr> for Filter {
    fn from(e: ast::Expr) -> Self {
        Filter::some(e)
    }
}

#[cfg(test)]
mod tests;
