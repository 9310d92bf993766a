//! Filter AST evaluation against in-memory documents (AST in, bool out).

use std::cmp::Ordering;

use query_core::ast::{CompareOperator, Expr, Value};
use query_core::{Filter, Order, SortDir};
use serde_json::Value as Json;

use crate::Document;

/// `Filter::none()` matches every document.
pub fn matches_filter(filter: &Filter, doc: &Document) -> bool {
    filter.as_ast().map_or(true, |e| matches(e, doc))
}

pub fn matches(expr: &Expr, doc: &Document) -> bool {
    match expr {
        Expr::And(terms) => terms.iter().all(|t| matches(t, doc)),
        Expr::Or(terms) => terms.iter().any(|t| matches(t, doc)),
        Expr::Not(inner) => !matches(inner, doc),
        Expr::Compare(field, op, rhs) => compare_field(doc.get(field), *op, rhs),
        Expr::In(field, list) => {
            let lhs = doc.get(field);
            list.iter().any(|v| equals(lhs, v))
        }
        Expr::Exists(field, present) => doc.contains_key(field) == *present,
    }
}

fn equals(lhs: Option<&Json>, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (None | Some(Json::Null), Value::Null) => true,
        (None, _) => false,
        (Some(l), r) => {
            let r: Json = r.clone().into();
            compare_same_kind(l, &r) == Some(Ordering::Equal)
        }
    }
}

fn compare_field(lhs: Option<&Json>, op: CompareOperator, rhs: &Value) -> bool {
    use CompareOperator as Op;

    match op {
        Op::Eq => equals(lhs, rhs),
        Op::Ne => !equals(lhs, rhs),
        Op::Gt | Op::Ge | Op::Lt | Op::Le => {
            let Some(l) = lhs else {
                return false;
            };
            let r: Json = rhs.clone().into();
            // Range operators only compare values of the same kind.
            let Some(ord) = compare_same_kind(l, &r) else {
                return false;
            };
            match op {
                Op::Gt => ord == Ordering::Greater,
                Op::Ge => ord != Ordering::Less,
                Op::Lt => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            }
        }
    }
}

fn compare_same_kind(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Null, Json::Null) => Some(Ordering::Equal),
        (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
        (Json::Number(_), Json::Number(_)) => Some(compare_numbers(a, b)),
        (Json::String(x), Json::String(y)) => Some(x.cmp(y)),
        (Json::Array(_), Json::Array(_)) | (Json::Object(_), Json::Object(_)) => {
            (a == b).then_some(Ordering::Equal)
        }
        _ => None,
    }
}

fn compare_numbers(a: &Json, b: &Json) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

fn kind_rank(v: Option<&Json>) -> u8 {
    match v {
        None | Some(Json::Null) => 0,
        Some(Json::Number(_)) => 1,
        Some(Json::String(_)) => 2,
        Some(Json::Object(_)) => 3,
        Some(Json::Array(_)) => 4,
        Some(Json::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values: missing/null first, then numbers,
/// strings, objects, arrays, booleans.
pub fn compare_json(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    let (ra, rb) = (kind_rank(a), kind_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_kind(x, y).unwrap_or_else(|| x.to_string().cmp(&y.to_string())),
        _ => Ordering::Equal,
    }
}

pub fn compare_documents(a: &Document, b: &Document, order: &Order) -> Ordering {
    for key in order.keys() {
        let ord = compare_json(a.get(&key.field), b.get(&key.field));
        let ord = match key.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable sort: documents equal under `order` keep their relative position.
pub fn sort_documents(docs: &mut [Document], order: &Order) {
    if order.is_empty() {
        return;
    }
    docs.sort_by(|a, b| compare_documents(a, b, order));
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_core::OrderKey;
    use serde_json::json;

    fn doc(v: Json) -> Document {
        match v {
            Json::Object(m) => m,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn compare_on_missing_field_only_matches_null_equality() {
        let d = doc(json!({"_id": 1}));
        assert!(matches(&Expr::eq("completed_at", Value::Null), &d));
        assert!(!matches(&Expr::gt("count", 0), &d));
        assert!(matches(&Expr::ne("count", 0), &d));
    }

    #[test]
    fn range_operators_do_not_cross_kinds() {
        let d = doc(json!({"tag": "7"}));
        assert!(!matches(&Expr::gt("tag", 1), &d));
        assert!(matches(&Expr::gt("tag", "10"), &d));
    }

    #[test]
    fn exists_checks_presence() {
        let d = doc(json!({"tag": null}));
        assert!(matches(&Expr::exists("tag", true), &d));
        assert!(matches(&Expr::exists("other", false), &d));
    }

    #[test]
    fn in_with_empty_list_never_matches() {
        let d = doc(json!({"image": 3}));
        assert!(!matches(&Expr::In("image".into(), vec![]), &d));
        assert!(matches(&Expr::is_in("image", [1, 3]), &d));
    }

    #[test]
    fn sort_breaks_ties_with_later_keys() {
        let mut docs = vec![
            doc(json!({"count": 2, "image": 9})),
            doc(json!({"count": 1, "image": 5})),
            doc(json!({"count": 2, "image": 3})),
        ];
        let order = Order::by(OrderKey::desc("count")).then(OrderKey::asc("image"));
        sort_documents(&mut docs, &order);
        let images: Vec<i64> = docs.iter().map(|d| d["image"].as_i64().unwrap()).collect();
        assert_eq!(images, vec![3, 9, 5]);
    }
}
