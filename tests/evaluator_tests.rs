use std::collections::HashMap;
use std::sync::Arc;

use sharpscript::{ScriptContext, ScriptError, ScriptObject, Value};

fn eval(source: &str) -> Value {
    ScriptContext::new()
        .evaluate(source, HashMap::new())
        .unwrap()
}

fn eval_err(source: &str) -> ScriptError {
    ScriptContext::new()
        .evaluate(source, HashMap::new())
        .unwrap_err()
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
}

#[test]
fn mixed_arithmetic_stays_exact() {
    assert_eq!(eval("1 + 2 * 3 - 4 / 5"), Value::Float(6.2));
    assert_eq!(eval("0.1 + 0.2"), Value::Float(0.3));
}

#[test]
fn integer_division_keeps_exact_quotients_integral() {
    assert_eq!(eval("4 / 2"), Value::Int(2));
    assert_eq!(eval("1 / 2"), Value::Float(0.5));
    assert!(matches!(eval_err("1 / 0"), ScriptError::Evaluation(_)));
}

#[test]
fn bitwise_and_shift() {
    assert_eq!(eval("1 & 2"), Value::Int(0));
    assert_eq!(eval("1 | 2"), Value::Int(3));
    assert_eq!(eval("5 ^ 3"), Value::Int(6));
    assert_eq!(eval("1 << 2"), Value::Int(4));
    assert_eq!(eval("8 >> 2"), Value::Int(2));
}

#[test]
fn string_concatenation() {
    assert_eq!(eval("'a' + 'b'"), Value::str("ab"));
    assert_eq!(eval("'n = ' + 3"), Value::str("n = 3"));
}

#[test]
fn pipe_chains() {
    assert_eq!(eval("1 + 2 * 3 |> add(3)"), Value::Int(10));
    assert_eq!(eval("add(1 + 2 * 3, 4) |> add(-5)"), Value::Int(6));
}

#[test]
fn coalescing_takes_fallback_for_every_falsy_left() {
    for falsy in ["null", "''", "false", "0", "{}", "[]"] {
        let source = format!("{} ?? 1", falsy);
        assert_eq!(eval(&source), Value::Int(1), "{}", source);
    }
}

#[test]
fn coalescing_keeps_truthy_left() {
    assert_eq!(eval("true ?? 1"), Value::Bool(true));
    assert_eq!(eval("5 ?? 1"), Value::Int(5));
    assert_eq!(eval("'x' ?? 1"), Value::str("x"));
    assert_eq!(eval("[2] ?? 1"), Value::Array(vec![Value::Int(2)]));
}

#[test]
fn logical_operators_return_the_last_evaluated_operand() {
    assert_eq!(eval("0 || 'a'"), Value::str("a"));
    assert_eq!(eval("'a' || 'b'"), Value::str("a"));
    assert_eq!(eval("1 && 2"), Value::Int(2));
    assert_eq!(eval("0 && 2"), Value::Int(0));
}

#[test]
fn map_key_miss_is_null() {
    let ctx = ScriptContext::builder().build();
    let mut map = HashMap::new();
    map.insert("name".to_string(), Value::str("ada"));
    let mut args = HashMap::new();
    args.insert("m".to_string(), Value::Map(map));

    assert_eq!(
        ctx.evaluate("m['missing']", args.clone()).unwrap(),
        Value::Null
    );
    assert_eq!(ctx.evaluate("m.missing", args.clone()).unwrap(), Value::Null);
    assert_eq!(ctx.evaluate("m.name", args).unwrap(), Value::str("ada"));
}

struct Point {
    x: i64,
    y: i64,
}

impl ScriptObject for Point {
    fn type_name(&self) -> &str {
        "Point"
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::Int(self.x)),
            "y" => Some(Value::Int(self.y)),
            _ => None,
        }
    }
}

#[test]
fn typed_object_property_miss_is_an_error() {
    let ctx = ScriptContext::builder()
        .global("p", Value::Object(Arc::new(Point { x: 1, y: 2 })))
        .build();

    assert_eq!(ctx.evaluate("p.x", HashMap::new()).unwrap(), Value::Int(1));
    let err = ctx.evaluate("p.missing", HashMap::new()).unwrap_err();
    assert!(matches!(err, ScriptError::Evaluation(_)));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn array_indexing() {
    assert_eq!(eval("[1,2,3][1]"), Value::Int(2));
    assert_eq!(eval("[1,2,3][-1]"), Value::Int(3));
    assert!(matches!(eval_err("[1,2][5]"), ScriptError::Evaluation(_)));
}

#[test]
fn member_access_on_null_stays_null() {
    assert_eq!(eval("null.anything ?? 'gone'"), Value::str("gone"));
}

#[test]
fn spread_expands_positionally() {
    assert_eq!(
        eval("((a, b, c) => [a, b, c])(...[20, 10], 1)"),
        Value::Array(vec![Value::Int(20), Value::Int(10), Value::Int(1)])
    );
}

#[test]
fn method_call_falls_back_to_filters() {
    assert_eq!(eval("2.square()"), Value::Int(4));
    assert_eq!(eval("'text'.upper()"), Value::str("TEXT"));
    assert_eq!(eval("[1,2,3].count()"), Value::Int(3));
}

#[test]
fn collection_filters_compose() {
    assert_eq!(eval("[1,2,3] |> where(x => x > 1) |> sum"), Value::Int(5));
    assert_eq!(
        eval("range(4) |> map(x => x * x)"),
        Value::Array(vec![
            Value::Int(0),
            Value::Int(1),
            Value::Int(4),
            Value::Int(9),
        ])
    );
    assert_eq!(eval("[1, 2, 3] |> avg"), Value::Int(2));
    assert_eq!(eval("[1, 2] |> avg"), Value::Float(1.5));
}

#[test]
fn string_filters() {
    assert_eq!(eval("' hi ' |> trim |> padLeft(4, '.')"), Value::str("..hi"));
    assert_eq!(eval("'a-b-c' |> split('-') |> join(',')"), Value::str("a,b,c"));
    assert_eq!(eval("'abc123' |> matches('^[a-z]+\\\\d+$')"), Value::Bool(true));
    assert_eq!(
        eval("'a1b2' |> replaceRegex('\\\\d', '#')"),
        Value::str("a#b#")
    );
}

#[test]
fn template_literals_interpolate() {
    assert_eq!(eval("`sum is ${1 + 2}!`"), Value::str("sum is 3!"));
}

#[test]
fn conditional_and_comparisons() {
    assert_eq!(eval("2 > 1 ? 'yes' : 'no'"), Value::str("yes"));
    assert_eq!(eval("1 == 1.0"), Value::Bool(true));
    assert_eq!(eval("'a' < 'b'"), Value::Bool(true));
}

#[test]
fn unknown_filter_is_an_error_in_direct_evaluation() {
    let err = eval_err("1 |> nosuchfilter");
    assert!(matches!(err, ScriptError::Evaluation(_)));
    assert!(err.to_string().contains("nosuchfilter"));
}

#[test]
fn wrong_arity_is_an_argument_error() {
    assert!(matches!(eval_err("add(1, 2, 3)"), ScriptError::Argument(_)));
}

#[test]
fn step_budget_aborts_runaway_evaluation() {
    let ctx = ScriptContext::builder().max_steps(10).build();
    let err = ctx
        .evaluate("1+2+3+4+5+6+7+8+9+10+11+12", HashMap::new())
        .unwrap_err();
    assert!(matches!(err, ScriptError::BudgetExceeded { steps: 10 }));
}

#[test]
fn recursion_depth_is_capped() {
    let ctx = ScriptContext::builder().max_call_depth(16).build();
    let err = ctx
        .evaluate("(loop = (x => loop(x))) && loop(1)", HashMap::new())
        .unwrap_err();
    assert!(matches!(err, ScriptError::StackOverflow { depth: 16 }));
}

#[test]
fn assignment_evaluates_to_the_assigned_value() {
    assert_eq!(eval("x = 41 + 1"), Value::Int(42));
}

#[test]
fn undeclared_assignment_lands_in_context_globals() {
    let ctx = ScriptContext::new();
    ctx.evaluate("counter = 5", HashMap::new()).unwrap();
    assert_eq!(
        ctx.evaluate("counter", HashMap::new()).unwrap(),
        Value::Int(5)
    );
}

#[test]
fn member_assignment_writes_through_paths() {
    let ctx = ScriptContext::new();
    let mut map = HashMap::new();
    map.insert("a".to_string(), Value::Int(1));
    let mut args = HashMap::new();
    args.insert("m".to_string(), Value::Map(map));

    assert_eq!(ctx.evaluate("m.a = 7", args.clone()).unwrap(), Value::Int(7));
}

#[test]
fn host_filter_failures_are_wrapped() {
    let ctx = ScriptContext::builder()
        .filter("boom", 1, |_, _| {
            Err(ScriptError::Evaluation("kaput".to_string()))
        })
        .build();
    let err = ctx.evaluate("1 |> boom", HashMap::new()).unwrap_err();
    match err {
        ScriptError::Host { filter, cause } => {
            assert_eq!(filter, "boom");
            assert!(cause.to_string().contains("kaput"));
        }
        other => panic!("expected host error, got {:?}", other),
    }
}

#[test]
fn value_filters() {
    assert_eq!(eval("null |> default('d')"), Value::str("d"));
    assert_eq!(eval("0 |> default('d')"), Value::Int(0));
    assert_eq!(eval("0 |> otherwise('d')"), Value::str("d"));
    assert_eq!(eval("[] |> isEmpty"), Value::Bool(true));
    assert_eq!(eval("3.5 |> typeName"), Value::str("float"));
    assert_eq!(eval("[1, 'a'] |> json"), Value::str(r#"[1,"a"]"#));
}
