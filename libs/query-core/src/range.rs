//! Compiles a set of integer ids into a compact membership predicate.
//!
//! Consecutive ids collapse into intervals, so a collection of ten thousand
//! sequential images becomes one range term.

use crate::ast::Expr;
use crate::Filter;

/// Closed interval of ids, `lo..=last`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdRange {
    pub lo: i64,
    pub last: i64,
}

impl IdRange {
    pub fn is_singleton(&self) -> bool {
        self.lo == self.last
    }

    /// `lo <= x < last + 1`, or `lo <= x <= last` when `last` is `i64::MAX`.
    fn into_expr(self, field: &str) -> Expr {
        if self.is_singleton() {
            return Expr::eq(field, self.lo);
        }
        let upper = match self.last.checked_add(1) {
            Some(hi) => Expr::lt(field, hi),
            None => Expr::le(field, self.last),
        };
        Expr::And(vec![Expr::ge(field, self.lo), upper])
    }
}

/// Coalesce ids into sorted, non-overlapping, non-adjacent intervals.
/// Duplicates collapse; input order does not matter.
pub fn coalesce(ids: impl IntoIterator<Item = i64>) -> Vec<IdRange> {
    let mut sorted: Vec<i64> = ids.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return out;
    };

    let mut current = IdRange {
        lo: first,
        last: first,
    };
    for id in iter {
        if current.last.checked_add(1) == Some(id) {
            current.last = id;
        } else {
            out.push(current);
            current = IdRange { lo: id, last: id };
        }
    }
    out.push(current);
    out
}

/// Build a predicate equivalent to `field IN ids`.
///
/// Zero ids yield `Filter::none()`, which matches everything: callers that
/// filter by an empty collection must short-circuit before calling this.
/// A single interval is returned bare, without an `Or` wrapper.
pub fn compile_range(field: &str, ids: impl IntoIterator<Item = i64>) -> Filter {
    let mut terms: Vec<Expr> = coalesce(ids)
        .into_iter()
        .map(|r| r.into_expr(field))
        .collect();

    match terms.len() {
        0 => Filter::none(),
        1 => Filter::some(terms.remove(0)),
        _ => Filter::some(Expr::Or(terms)),
    }
}
