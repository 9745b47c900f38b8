use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use sharpscript::{PageResult, ScriptContext, ScriptError, Value};

fn render(source: &str) -> String {
    ScriptContext::new().render(source, HashMap::new()).unwrap()
}

fn args(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn arithmetic_scenarios() {
    assert_eq!(render("{{ 1 + 2 * 3 - 4 / 5 }}"), "6.2");
    assert_eq!(render("{{ 1 & 2 }}"), "0");
    assert_eq!(render("{{ 1 << 2 }}"), "4");
}

#[test]
fn null_renders_empty() {
    assert_eq!(render("a{{ null }}b{{ missing }}c"), "abc");
}

#[test]
fn variables_and_filters() {
    let ctx = ScriptContext::new();
    let out = ctx
        .render("hi {{ name |> upper }}!", args(&[("name", Value::str("ada"))]))
        .unwrap();
    assert_eq!(out, "hi ADA!");
}

#[test]
fn if_blocks_choose_a_branch() {
    let ctx = ScriptContext::new();
    let page = "{{#if n > 1}}many{{else if n == 1}}one{{else}}none{{/if}}";
    assert_eq!(ctx.render(page, args(&[("n", Value::Int(3))])).unwrap(), "many");
    assert_eq!(ctx.render(page, args(&[("n", Value::Int(1))])).unwrap(), "one");
    assert_eq!(ctx.render(page, args(&[("n", Value::Int(0))])).unwrap(), "none");
}

#[test]
fn each_binds_item_and_index() {
    assert_eq!(
        render("{{#each x in [10, 20]}}{{ index }}:{{ x }};{{/each}}"),
        "0:10;1:20;"
    );
}

#[test]
fn each_over_empty_sequence_takes_else() {
    assert_eq!(render("{{#each x in []}}{{ x }}{{else}}empty{{/each}}"), "empty");
}

#[test]
fn each_over_map_iterates_sorted_entries() {
    let ctx = ScriptContext::new();
    let mut map = HashMap::new();
    map.insert("b".to_string(), Value::Int(2));
    map.insert("a".to_string(), Value::Int(1));
    let out = ctx
        .render(
            "{{#each e in m}}{{ e.key }}={{ e.value }},{{/each}}",
            args(&[("m", Value::Map(map))]),
        )
        .unwrap();
    assert_eq!(out, "a=1,b=2,");
}

#[test]
fn with_block_spreads_map_entries() {
    let ctx = ScriptContext::new();
    let mut user = HashMap::new();
    user.insert("name".to_string(), Value::str("ada"));
    let out = ctx
        .render(
            "{{#with user}}{{ name }}{{/with}}{{#with missing}}x{{else}}-{{/with}}",
            args(&[("user", Value::Map(user))]),
        )
        .unwrap();
    assert_eq!(out, "ada-");
}

#[test]
fn raw_blocks_emit_verbatim() {
    assert_eq!(render("{{#raw}}{{ name |> upper }}{{/raw}}"), "{{ name |> upper }}");
}

#[test]
fn unknown_filter_emits_the_original_source() {
    assert_eq!(
        render("a {{ x |> nosuchfilter }} b"),
        "a {{ x |> nosuchfilter }} b"
    );
}

#[test]
fn faults_fail_the_render_by_default() {
    let ctx = ScriptContext::new();
    let err = ctx.render("A{{ 1 / 0 }}B", HashMap::new()).unwrap_err();
    assert!(matches!(err.error, ScriptError::Evaluation(_)));
    assert!(err.stack_trace().contains("{{ 1 / 0 }}"));
}

#[test]
fn skip_filters_policy_keeps_sibling_fragments() {
    let ctx = ScriptContext::builder()
        .skip_executing_filters_on_error(true)
        .build();
    let out = ctx.render("A{{ 1 / 0 }}B", HashMap::new()).unwrap();
    assert_eq!(out, "AB");
}

#[test]
fn skip_page_policy_halts_remaining_fragments() {
    let ctx = ScriptContext::builder()
        .skip_executing_page_on_error(true)
        .build();
    let out = ctx.render("A{{ 1 / 0 }}B", HashMap::new()).unwrap();
    assert_eq!(out, "A");
}

#[test]
fn debug_mode_renders_faults_inline() {
    let ctx = ScriptContext::builder().debug(true).build();
    let out = ctx.render("A{{ 1 / 0 }}B", HashMap::new()).unwrap();
    assert!(out.starts_with('A') && out.ends_with('B'));
    assert!(out.contains("division by zero"));
}

#[test]
fn assigned_exceptions_are_visible_to_later_fragments() {
    let ctx = ScriptContext::builder()
        .assign_exceptions_to("err")
        .skip_executing_filters_on_error(true)
        .build();
    let out = ctx
        .render("{{ 1 / 0 }}[{{ err.message }}]", HashMap::new())
        .unwrap();
    assert_eq!(out, "[division by zero]");
}

#[test]
fn if_error_filter_reacts_to_captured_faults() {
    let ctx = ScriptContext::builder()
        .assign_exceptions_to("err")
        .skip_executing_filters_on_error(true)
        .build();
    let out = ctx
        .render("{{ 1 / 0 }}{{ 'failed' |> ifError }}", HashMap::new())
        .unwrap();
    assert_eq!(out, "failed");

    let clean = ctx
        .render("{{ 'failed' |> ifError }}ok", HashMap::new())
        .unwrap();
    assert_eq!(clean, "ok");
}

#[test]
fn assign_to_binds_and_renders_nothing() {
    assert_eq!(render("{{ 6 * 7 |> assignTo('x') }}{{ x }}"), "42");
    assert_eq!(render("{{ 'v' |> to('y') }}{{ y }}"), "v");
}

#[test]
fn metadata_feeds_the_scope_and_is_stripped() {
    let out = render("<!--\ntitle: Home\nlayout: none\n-->\n<h1>{{ title }}</h1>");
    assert_eq!(out, "<h1>Home</h1>");
}

#[test]
fn render_args_override_globals() {
    let ctx = ScriptContext::builder().global("name", "global").build();
    assert_eq!(ctx.render("{{ name }}", HashMap::new()).unwrap(), "global");
    assert_eq!(
        ctx.render("{{ name }}", args(&[("name", Value::str("local"))]))
            .unwrap(),
        "local"
    );
}

#[test]
fn explicit_layout_wraps_the_page() {
    let ctx = ScriptContext::builder()
        .file("main", "<html>{{ page }}</html>")
        .file("home", "<!--\nlayout: main\ntitle: Home\n-->\n{{ title }}!")
        .build();
    let out = ctx.render_page("home", HashMap::new()).unwrap();
    assert_eq!(out, "<html>Home!</html>");
}

#[test]
fn default_layout_applies_when_present() {
    let ctx = ScriptContext::builder()
        .file("_layout", "[{{ page }}]")
        .build();
    assert_eq!(ctx.render("body", HashMap::new()).unwrap(), "[body]");
}

#[test]
fn layout_none_disables_the_default_layout() {
    let ctx = ScriptContext::builder()
        .file("_layout", "[{{ page }}]")
        .build();
    let out = ctx
        .render("<!--\nlayout: none\n-->\nbody", HashMap::new())
        .unwrap();
    assert_eq!(out, "body");
}

#[test]
fn layouts_resolve_relative_to_the_page_directory() {
    let ctx = ScriptContext::builder()
        .file("docs/_layout", "docs[{{ page }}]")
        .file("docs/guide", "guide body")
        .build();
    let out = ctx.render_page("docs/guide", HashMap::new()).unwrap();
    assert_eq!(out, "docs[guide body]");
}

#[test]
fn missing_explicit_layout_is_an_error() {
    let ctx = ScriptContext::new();
    let err = ctx
        .render("<!--\nlayout: nope\n-->\nbody", HashMap::new())
        .unwrap_err();
    assert!(err.error.to_string().contains("nope"));
}

#[test]
fn partials_render_inline_with_their_own_args() {
    let ctx = ScriptContext::builder()
        .file("greeting", "hi {{ who }}")
        .build();
    let out = ctx
        .render("<{{ 'greeting' |> partial({who: 'bob'}) }}>", HashMap::new())
        .unwrap();
    assert_eq!(out, "<hi bob>");
}

#[test]
fn partials_resolve_relative_to_the_page_directory() {
    let ctx = ScriptContext::builder()
        .file("docs/header", "DOCS HEADER")
        .file("docs/page", "{{ 'header' |> partial }} body")
        .build();
    let out = ctx.render_page("docs/page", HashMap::new()).unwrap();
    assert_eq!(out, "DOCS HEADER body");
}

#[test]
fn cache_compiles_each_source_at_most_once() {
    let ctx = ScriptContext::new();
    let source = "{{#each x in [1,2,3]}}{{ x }}{{/each}}";
    for _ in 0..10_000 {
        assert_eq!(ctx.render(source, HashMap::new()).unwrap(), "123");
    }
    assert_eq!(ctx.cache().len(), 1);
}

#[test]
fn concurrent_renders_share_one_compiled_page() {
    let ctx = ScriptContext::new();
    let source = "{{ 1 + 2 * 3 - 4 / 5 }}";
    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..100 {
                    assert_eq!(ctx.render(source, HashMap::new()).unwrap(), "6.2");
                }
            });
        }
    });
    assert_eq!(ctx.cache().len(), 1);
}

#[test]
fn concurrent_renders_do_not_share_locals() {
    let ctx = ScriptContext::new();
    let source = "{{ n |> assignTo('local') }}{{ local }}";
    thread::scope(|scope| {
        for i in 0..4i64 {
            let ctx = &ctx;
            scope.spawn(move || {
                for _ in 0..50 {
                    let out = ctx
                        .render(source, args(&[("n", Value::Int(i))]))
                        .unwrap();
                    assert_eq!(out, i.to_string());
                }
            });
        }
    });
}

#[test]
fn cancellation_stops_the_render() {
    let ctx = ScriptContext::new();
    let page = ctx.compile("{{ 1 }}{{ 2 }}").unwrap();
    let cancel = Arc::new(AtomicBool::new(true));
    let err = PageResult::new(&ctx, page)
        .with_cancel(cancel)
        .render()
        .unwrap_err();
    assert!(matches!(err.error, ScriptError::Cancelled));
}

#[test]
fn cancellation_flag_clear_lets_the_render_finish() {
    let ctx = ScriptContext::new();
    let page = ctx.compile("{{ 1 }}{{ 2 }}").unwrap();
    let cancel = Arc::new(AtomicBool::new(false));
    let out = PageResult::new(&ctx, page)
        .with_cancel(Arc::clone(&cancel))
        .render()
        .unwrap();
    assert_eq!(out, "12");
    cancel.store(true, Ordering::Relaxed);
}

#[test]
fn run_detects_templates_versus_expressions() {
    let ctx = ScriptContext::new();
    assert_eq!(
        ctx.run("{{ 1 + 2 }}", HashMap::new()).unwrap(),
        Value::str("3")
    );
    assert_eq!(ctx.run("1 + 2", HashMap::new()).unwrap(), Value::Int(3));
}
