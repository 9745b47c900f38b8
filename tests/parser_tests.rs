use sharpscript::ast::{BinaryOp, DeclarationKind, Expr, LogicOp, ObjectProperty, UnaryOp};
use sharpscript::{Parser, ParserOptions, ScriptError};

fn parse(source: &str) -> Expr {
    Parser::parse_source(source).unwrap()
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(
        parse("1 + 2 * 3"),
        Expr::binary(
            BinaryOp::Add,
            Expr::int(1),
            Expr::binary(BinaryOp::Multiply, Expr::int(2), Expr::int(3)),
        )
    );
}

#[test]
fn parentheses_override_precedence() {
    assert_eq!(
        parse("(1 + 2) * 3"),
        Expr::binary(
            BinaryOp::Multiply,
            Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2)),
            Expr::int(3),
        )
    );
}

#[test]
fn binary_operators_are_left_associative() {
    assert_eq!(
        parse("1 - 2 - 3"),
        Expr::binary(
            BinaryOp::Subtract,
            Expr::binary(BinaryOp::Subtract, Expr::int(1), Expr::int(2)),
            Expr::int(3),
        )
    );
}

#[test]
fn conditional_is_right_associative() {
    assert_eq!(
        parse("a ? b : c ? d : e"),
        Expr::Conditional {
            test: Box::new(Expr::ident("a")),
            consequent: Box::new(Expr::ident("b")),
            alternate: Box::new(Expr::Conditional {
                test: Box::new(Expr::ident("c")),
                consequent: Box::new(Expr::ident("d")),
                alternate: Box::new(Expr::ident("e")),
            }),
        }
    );
}

#[test]
fn coalesce_sits_below_logical_or() {
    assert_eq!(
        parse("a || b ?? c"),
        Expr::Logical {
            op: LogicOp::Coalesce,
            left: Box::new(Expr::Logical {
                op: LogicOp::Or,
                left: Box::new(Expr::ident("a")),
                right: Box::new(Expr::ident("b")),
            }),
            right: Box::new(Expr::ident("c")),
        }
    );
}

#[test]
fn unary_chains() {
    assert_eq!(
        parse("!-a"),
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(Expr::Unary {
                op: UnaryOp::Minus,
                expr: Box::new(Expr::ident("a")),
            }),
        }
    );
}

#[test]
fn call_on_literal_primary() {
    assert_eq!(
        parse("1.add(2)"),
        Expr::Call {
            callee: Box::new(Expr::Member {
                object: Box::new(Expr::int(1)),
                property: Box::new(Expr::ident("add")),
                computed: false,
            }),
            args: vec![Expr::int(2)],
        }
    );
}

#[test]
fn member_chains_with_computed_access() {
    assert_eq!(
        parse("a.b[c]"),
        Expr::Member {
            object: Box::new(Expr::Member {
                object: Box::new(Expr::ident("a")),
                property: Box::new(Expr::ident("b")),
                computed: false,
            }),
            property: Box::new(Expr::ident("c")),
            computed: true,
        }
    );
}

#[test]
fn arrow_function_forms() {
    let bare = parse("x => x * 2");
    let parenthesized = parse("(x) => x * 2");
    assert_eq!(bare, parenthesized);

    assert_eq!(
        parse("(a, b) => a + b"),
        Expr::ArrowFunction {
            params: vec!["a".to_string(), "b".to_string()],
            body: Box::new(Expr::binary(
                BinaryOp::Add,
                Expr::ident("a"),
                Expr::ident("b"),
            )),
        }
    );

    assert_eq!(
        parse("() => 1"),
        Expr::ArrowFunction {
            params: vec![],
            body: Box::new(Expr::int(1)),
        }
    );
}

#[test]
fn equality_is_structural_not_semantic() {
    // same sugar, different whitespace: identical trees
    assert_eq!(parse("a.b(x=>x*2)"), parse("a . b ( x => x * 2 )"));
    // a different but equivalent phrasing is a different tree
    assert_ne!(parse("a.b(x=>x*2)"), parse("a.b(x=>2*x)"));
}

#[test]
fn object_literal_shorthand_and_spread() {
    assert_eq!(
        parse("{a, b: 2, ...rest}"),
        Expr::Object(vec![
            ObjectProperty::Pair {
                key: "a".to_string(),
                value: Expr::ident("a"),
                shorthand: true,
            },
            ObjectProperty::Pair {
                key: "b".to_string(),
                value: Expr::int(2),
                shorthand: false,
            },
            ObjectProperty::Spread(Expr::ident("rest")),
        ])
    );
}

#[test]
fn spread_in_call_arguments() {
    assert_eq!(
        parse("f(...xs, 1)"),
        Expr::Call {
            callee: Box::new(Expr::ident("f")),
            args: vec![Expr::Spread(Box::new(Expr::ident("xs"))), Expr::int(1)],
        }
    );
}

#[test]
fn assignment_requires_valid_target() {
    assert_eq!(
        parse("a = 1"),
        Expr::Assignment {
            target: Box::new(Expr::ident("a")),
            value: Box::new(Expr::int(1)),
        }
    );
    assert!(matches!(
        Parser::parse_source("1 = 2"),
        Err(ScriptError::Syntax { .. })
    ));
}

#[test]
fn declarations_bind_multiple_names() {
    assert_eq!(
        parse("var a = 2, b"),
        Expr::VariableDeclaration {
            kind: DeclarationKind::Var,
            declarations: vec![
                ("a".to_string(), Some(Expr::int(2))),
                ("b".to_string(), None),
            ],
        }
    );
}

#[test]
fn disabled_assignments_turn_equals_into_equality() {
    let options = ParserOptions {
        allow_assignments: false,
    };
    assert_eq!(
        Parser::parse_source_with("a = 1", options).unwrap(),
        Expr::binary(BinaryOp::Equal, Expr::ident("a"), Expr::int(1))
    );
    assert!(Parser::parse_source_with("var a = 1", options).is_err());
}

#[test]
fn template_literal_holes_parse_recursively() {
    assert_eq!(
        parse("`n = ${1 + 2}`"),
        Expr::TemplateLiteral {
            parts: vec!["n = ".to_string(), String::new()],
            exprs: vec![Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2))],
        }
    );
}

#[test]
fn syntax_errors_carry_a_position() {
    match Parser::parse_source("1 + ") {
        Err(ScriptError::Syntax { position, .. }) => assert!(position >= 3),
        other => panic!("expected syntax error, got {:?}", other),
    }
}
