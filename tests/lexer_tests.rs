use sharpscript::{tokenize, ScriptError, Token};

#[test]
fn tokenizes_arithmetic() {
    let tokens = tokenize("1 + 2 * 3").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Integer(1),
            Token::Plus,
            Token::Integer(2),
            Token::Star,
            Token::Integer(3),
            Token::Eof,
        ]
    );
}

#[test]
fn number_forms() {
    assert_eq!(
        tokenize("3.14").unwrap(),
        vec![Token::Float(3.14), Token::Eof]
    );
    assert_eq!(
        tokenize("2.5e-3").unwrap(),
        vec![Token::Float(2.5e-3), Token::Eof]
    );
    assert_eq!(tokenize("1e5").unwrap(), vec![Token::Float(1e5), Token::Eof]);
}

#[test]
fn decimal_then_method_call() {
    // the second dot starts a member access, not a decimal point
    let tokens = tokenize("1.2.add(3)").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Float(1.2),
            Token::Dot,
            Token::Identifier("add".to_string()),
            Token::LParen,
            Token::Integer(3),
            Token::RParen,
            Token::Eof,
        ]
    );
}

#[test]
fn second_decimal_point_is_an_error() {
    let err = tokenize("1.2.3").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { .. }));
}

#[test]
fn missing_exponent_is_an_error() {
    assert!(matches!(
        tokenize("1e+").unwrap_err(),
        ScriptError::Syntax { .. }
    ));
}

#[test]
fn string_escapes() {
    assert_eq!(
        tokenize(r"'it\'s'").unwrap(),
        vec![Token::String("it's".to_string()), Token::Eof]
    );
    assert_eq!(
        tokenize(r#""a\tb\n""#).unwrap(),
        vec![Token::String("a\tb\n".to_string()), Token::Eof]
    );
}

#[test]
fn unterminated_string_is_an_error() {
    assert!(matches!(
        tokenize("'never ends").unwrap_err(),
        ScriptError::Syntax { .. }
    ));
}

#[test]
fn template_literal_with_holes() {
    let tokens = tokenize("`sum is ${a + b}!`").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Template {
                parts: vec!["sum is ".to_string(), "!".to_string()],
                holes: vec!["a + b".to_string()],
            },
            Token::Eof,
        ]
    );
}

#[test]
fn template_hole_braces_must_balance() {
    let tokens = tokenize("`v: ${ {a: 1}.a }`").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Template {
                parts: vec!["v: ".to_string(), String::new()],
                holes: vec![" {a: 1}.a ".to_string()],
            },
            Token::Eof,
        ]
    );
}

#[test]
fn comments_are_skipped() {
    let tokens = tokenize("1 // one\n + /* two */ 2").unwrap();
    assert_eq!(
        tokens,
        vec![Token::Integer(1), Token::Plus, Token::Integer(2), Token::Eof]
    );
}

#[test]
fn keywords() {
    let tokens = tokenize("true false null undefined var let const").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::Boolean(true),
            Token::Boolean(false),
            Token::Null,
            Token::Null,
            Token::Var,
            Token::Let,
            Token::Const,
            Token::Eof,
        ]
    );
}

#[test]
fn multi_char_operators() {
    let tokens = tokenize("== != <= >= && || ?? << >> => ... |>").unwrap();
    assert_eq!(
        tokens,
        vec![
            Token::EqEq,
            Token::NotEq,
            Token::LtEq,
            Token::GtEq,
            Token::AndAnd,
            Token::OrOr,
            Token::Coalesce,
            Token::Shl,
            Token::Shr,
            Token::Arrow,
            Token::Ellipsis,
            Token::PipeGt,
            Token::Eof,
        ]
    );
}
