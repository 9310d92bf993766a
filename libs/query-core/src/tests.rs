use crate::ast::{CompareOperator, Expr, Value};
use crate::{Filter, Order, OrderKey};

#[test]
fn filter_and_starts_from_none() {
    let f = Filter::none().and(Expr::gt("_id", 10));
    assert_eq!(
        f.as_ast(),
        Some(&Expr::Compare("_id".into(), CompareOperator::Gt, Value::Int(10)))
    );
}

#[test]
fn filter_and_flattens_conjunctions() {
    let f = Filter::all([Expr::gt("_id", 1), Expr::le("_id", 9), Expr::exists("tag", true)]);
    match f.into_ast() {
        Some(Expr::And(terms)) => assert_eq!(terms.len(), 3),
        other => panic!("expected flat And, got {other:?}"),
    }
}

#[test]
fn and_filter_with_none_is_identity() {
    let base = Filter::some(Expr::eq("type", "tagging"));
    assert_eq!(base.clone().and_filter(Filter::none()), base);
}

#[test]
fn order_displays_signed_tokens() {
    let o = Order::by(OrderKey::asc("count")).then(OrderKey::desc("image"));
    assert_eq!(o.to_string(), "+count,-image");
}

#[test]
fn value_converts_to_json() {
    assert_eq!(serde_json::Value::from(Value::Int(3)), serde_json::json!(3));
    assert_eq!(serde_json::Value::from(Value::from("x")), serde_json::json!("x"));
    assert_eq!(serde_json::Value::from(Value::Null), serde_json::Value::Null);
}
