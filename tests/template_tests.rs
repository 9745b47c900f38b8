use sharpscript::ast::{BinaryOp, BlockArgs, Expr, FilterCall, PageFragment};
use sharpscript::{parse_template, ScriptError};

#[test]
fn plain_text_is_one_string_fragment() {
    let fragments = parse_template("just text").unwrap();
    assert_eq!(fragments, vec![PageFragment::Str("just text".to_string())]);
}

#[test]
fn variable_fragment_with_filters() {
    let fragments = parse_template("hi {{ name |> upper |> padLeft(5) }}!").unwrap();
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0], PageFragment::Str("hi ".to_string()));
    assert_eq!(fragments[2], PageFragment::Str("!".to_string()));

    let PageFragment::Var(var) = &fragments[1] else {
        panic!("expected variable fragment");
    };
    assert_eq!(var.expr, Some(Expr::ident("name")));
    assert_eq!(
        var.filters,
        vec![
            FilterCall {
                name: "upper".to_string(),
                args: vec![],
            },
            FilterCall {
                name: "padLeft".to_string(),
                args: vec![Expr::int(5)],
            },
        ]
    );
    assert_eq!(var.original, "{{ name |> upper |> padLeft(5) }}");
}

#[test]
fn legacy_single_pipe_separates_filters() {
    let fragments = parse_template("{{ name | upper }}").unwrap();
    let PageFragment::Var(var) = &fragments[0] else {
        panic!("expected variable fragment");
    };
    assert_eq!(var.filters.len(), 1);
    assert_eq!(var.filters[0].name, "upper");
}

#[test]
fn logical_or_survives_inside_a_fragment() {
    let fragments = parse_template("{{ a || b }}").unwrap();
    let PageFragment::Var(var) = &fragments[0] else {
        panic!("expected variable fragment");
    };
    assert!(var.filters.is_empty());
    assert!(matches!(var.expr, Some(Expr::Logical { .. })));
}

#[test]
fn clean_string_shorthand_becomes_a_string_argument() {
    let fragments = parse_template("{{ 'x' |> appendTo: target name }}").unwrap();
    let PageFragment::Var(var) = &fragments[0] else {
        panic!("expected variable fragment");
    };
    assert_eq!(
        var.filters,
        vec![FilterCall {
            name: "appendTo".to_string(),
            args: vec![Expr::string("target name")],
        }]
    );
}

#[test]
fn if_block_with_else_branches() {
    let fragments =
        parse_template("{{#if x > 1}}big{{else if x == 1}}one{{else}}small{{/if}}").unwrap();
    let PageFragment::Block(block) = &fragments[0] else {
        panic!("expected block fragment");
    };
    assert_eq!(block.name, "if");
    assert_eq!(
        block.args,
        BlockArgs::If(Expr::binary(
            BinaryOp::GreaterThan,
            Expr::ident("x"),
            Expr::int(1),
        ))
    );
    assert_eq!(block.body, vec![PageFragment::Str("big".to_string())]);
    assert_eq!(block.else_blocks.len(), 2);
    assert_eq!(
        block.else_blocks[0].condition,
        Some(Expr::binary(BinaryOp::Equal, Expr::ident("x"), Expr::int(1)))
    );
    assert_eq!(block.else_blocks[1].condition, None);
    assert_eq!(
        block.else_blocks[1].body,
        vec![PageFragment::Str("small".to_string())]
    );
}

#[test]
fn each_block_binding_forms() {
    let fragments = parse_template("{{#each x in items}}{{ x }}{{/each}}").unwrap();
    let PageFragment::Block(block) = &fragments[0] else {
        panic!("expected block fragment");
    };
    assert_eq!(
        block.args,
        BlockArgs::Each {
            binding: "x".to_string(),
            seq: Expr::ident("items"),
        }
    );

    let fragments = parse_template("{{#each items}}{{ it }}{{/each}}").unwrap();
    let PageFragment::Block(block) = &fragments[0] else {
        panic!("expected block fragment");
    };
    assert_eq!(
        block.args,
        BlockArgs::Each {
            binding: "it".to_string(),
            seq: Expr::ident("items"),
        }
    );
}

#[test]
fn raw_block_body_is_never_parsed() {
    let fragments = parse_template("{{#raw}}{{ not an expr |>}}{{/raw}}").unwrap();
    let PageFragment::Block(block) = &fragments[0] else {
        panic!("expected block fragment");
    };
    assert_eq!(block.args, BlockArgs::Raw);
    assert_eq!(
        block.body,
        vec![PageFragment::Str("{{ not an expr |>}}".to_string())]
    );
}

#[test]
fn blocks_nest_recursively() {
    let fragments =
        parse_template("{{#if a}}{{#each x in xs}}{{ x }}{{/each}}{{/if}}").unwrap();
    let PageFragment::Block(outer) = &fragments[0] else {
        panic!("expected block fragment");
    };
    assert_eq!(outer.name, "if");
    let PageFragment::Block(inner) = &outer.body[0] else {
        panic!("expected nested block");
    };
    assert_eq!(inner.name, "each");
}

#[test]
fn custom_blocks_keep_their_raw_header() {
    let fragments = parse_template("{{#with user}}{{ name }}{{/with}}").unwrap();
    let PageFragment::Block(block) = &fragments[0] else {
        panic!("expected block fragment");
    };
    assert_eq!(block.name, "with");
    assert_eq!(
        block.args,
        BlockArgs::Custom {
            raw: "user".to_string(),
            expr: Some(Expr::ident("user")),
        }
    );
}

#[test]
fn unterminated_expression_is_a_syntax_error() {
    assert!(matches!(
        parse_template("before {{ name"),
        Err(ScriptError::Syntax { .. })
    ));
}

#[test]
fn mismatched_close_tag_is_a_syntax_error() {
    assert!(matches!(
        parse_template("{{#if a}}body{{/each}}"),
        Err(ScriptError::Syntax { .. })
    ));
}

#[test]
fn missing_terminator_is_a_syntax_error() {
    assert!(matches!(
        parse_template("{{#each x in xs}}body"),
        Err(ScriptError::Syntax { .. })
    ));
}

#[test]
fn unbalanced_filter_arguments_are_an_error() {
    assert!(parse_template("{{ x |> take(1 }}").is_err());
}
