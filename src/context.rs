use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::ast::Expr;
use crate::error::{ScriptError, ScriptException};
use crate::evaluator::Evaluator;
use crate::filters::{FilterFn, FilterInvocation, FilterRegistry};
use crate::page::{PageCache, SharpPage};
use crate::parser::{Parser, ParserOptions};
use crate::render::{BlockHandler, PageResult, WithBlock};
use crate::scope::{ScopeChain, ScopeLayer};
use crate::scripts::register_defaults;
use crate::template::parse_pipeline;
use crate::value::Value;

/// Engine configuration knobs, frozen at context build time.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// Permit `=` assignment and `var`/`let`/`const` declarations. When
    /// disabled the parser reads a bare `=` as `==`.
    pub allow_assignments: bool,
    /// Evaluation step budget per top-level call.
    pub max_steps: usize,
    /// Arrow-function recursion limit.
    pub max_call_depth: usize,
    /// Debug mode: render faults inline instead of failing the page.
    pub render_expression_exceptions: bool,
    /// A fault in one `{{ }}` halts that expression only; siblings render.
    pub skip_executing_filters_on_error: bool,
    /// A fault halts the remaining page fragments; the layout still
    /// renders.
    pub skip_executing_page_on_error: bool,
    /// Bind faults into this scope variable for `ifError`/`lastError`
    /// handling in templates.
    pub assign_exceptions_to: Option<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            allow_assignments: true,
            max_steps: 100_000,
            max_call_depth: 64,
            render_expression_exceptions: false,
            skip_executing_filters_on_error: false,
            skip_executing_page_on_error: false,
            assign_exceptions_to: None,
        }
    }
}

/// A parsed script in one of the registered languages.
pub enum CompiledScript {
    Template(Arc<SharpPage>),
    Expression(Expr),
}

/// A script front-end the context can host alongside the default template
/// language. `detect` picks the language for a source; `parse` and
/// `evaluate` drive it.
pub trait ScriptLanguage: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, source: &str) -> bool;

    fn parse(&self, ctx: &ScriptContext, source: &str) -> Result<CompiledScript, ScriptError>;

    fn evaluate(
        &self,
        ctx: &ScriptContext,
        compiled: &CompiledScript,
        args: &HashMap<String, Value>,
    ) -> Result<Value, ScriptError>;
}

/// The default page-template language: `{{ }}` pipelines interleaved with
/// literal text, rendered to a string value.
struct TemplateLanguage;

impl ScriptLanguage for TemplateLanguage {
    fn name(&self) -> &'static str {
        "template"
    }

    fn detect(&self, source: &str) -> bool {
        source.contains("{{")
    }

    fn parse(&self, ctx: &ScriptContext, source: &str) -> Result<CompiledScript, ScriptError> {
        Ok(CompiledScript::Template(ctx.compile(source)?))
    }

    fn evaluate(
        &self,
        ctx: &ScriptContext,
        compiled: &CompiledScript,
        args: &HashMap<String, Value>,
    ) -> Result<Value, ScriptError> {
        let CompiledScript::Template(page) = compiled else {
            return Err(ScriptError::Argument(
                "template language cannot evaluate a foreign script".to_string(),
            ));
        };
        let output = PageResult::new(ctx, Arc::clone(page))
            .with_args(args.clone())
            .render()
            .map_err(|e| e.error)?;
        Ok(Value::Str(output))
    }
}

/// The bare expression language, used when a source has no `{{ }}`
/// delimiters.
struct ExpressionLanguage;

impl ScriptLanguage for ExpressionLanguage {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn detect(&self, _source: &str) -> bool {
        true
    }

    fn parse(&self, ctx: &ScriptContext, source: &str) -> Result<CompiledScript, ScriptError> {
        Ok(CompiledScript::Expression(Parser::parse_source_with(
            source,
            ctx.parser_options(),
        )?))
    }

    fn evaluate(
        &self,
        ctx: &ScriptContext,
        compiled: &CompiledScript,
        args: &HashMap<String, Value>,
    ) -> Result<Value, ScriptError> {
        let CompiledScript::Expression(expr) = compiled else {
            return Err(ScriptError::Argument(
                "expression language cannot evaluate a foreign script".to_string(),
            ));
        };
        let scope = ctx.scope_for(args.clone());
        Evaluator::new(ctx).eval(expr, &scope)
    }
}

/// The sealed engine state: filter and block registries, context globals,
/// virtual files, registered languages, the compiled-page cache, and
/// configuration. Built once through [`ScriptContext::builder`], then
/// shared read-only across renders.
pub struct ScriptContext {
    config: ScriptConfig,
    filters: FilterRegistry,
    blocks: HashMap<String, Arc<dyn BlockHandler>>,
    globals: ScopeLayer,
    files: HashMap<String, String>,
    languages: Vec<Arc<dyn ScriptLanguage>>,
    cache: PageCache,
}

impl ScriptContext {
    pub fn builder() -> ScriptContextBuilder {
        ScriptContextBuilder::default()
    }

    /// A context with default filters and configuration only.
    pub fn new() -> ScriptContext {
        ScriptContext::builder().build()
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn globals(&self) -> &ScopeLayer {
        &self.globals
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn block(&self, name: &str) -> Option<&dyn BlockHandler> {
        self.blocks.get(name).map(Arc::as_ref)
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            allow_assignments: self.config.allow_assignments,
        }
    }

    /// Compile a page source through the shared cache.
    pub fn compile(&self, source: &str) -> Result<Arc<SharpPage>, ScriptError> {
        self.cache.get_or_compile(source, self.parser_options())
    }

    pub(crate) fn scope_for(&self, args: HashMap<String, Value>) -> ScopeChain {
        ScopeChain::stacked(vec![self.globals.clone(), ScopeLayer::from_map(args)])
    }

    /// Evaluate a bare expression, optionally followed by a `|>` filter
    /// pipeline, against the context globals and the given arguments.
    /// Unlike in page renders, an unknown filter here is an error.
    pub fn evaluate(
        &self,
        source: &str,
        args: HashMap<String, Value>,
    ) -> Result<Value, ScriptError> {
        let pipeline = parse_pipeline(source, self.parser_options())?;
        let scope = self.scope_for(args);
        let evaluator = Evaluator::new(self);

        let mut value = match &pipeline.expr {
            Some(expr) => evaluator.eval(expr, &scope)?,
            None => Value::Null,
        };
        for filter in &pipeline.filters {
            let mut filter_args = vec![value];
            filter_args.extend(evaluator.eval_args(&filter.args, &scope)?);
            value = evaluator.apply_filter(&filter.name, filter_args, &scope)?;
        }
        Ok(value)
    }

    /// Render a template source to a string.
    pub fn render(
        &self,
        source: &str,
        args: HashMap<String, Value>,
    ) -> Result<String, ScriptException> {
        let page = self.compile(source)?;
        PageResult::new(self, page).with_args(args).render()
    }

    /// Render a registered virtual file by name.
    pub fn render_page(
        &self,
        name: &str,
        args: HashMap<String, Value>,
    ) -> Result<String, ScriptException> {
        let Some(source) = self.file(name) else {
            return Err(ScriptException::new(ScriptError::Argument(format!(
                "page '{}' not found",
                name
            ))));
        };
        let page = self.compile(source)?;
        PageResult::new(self, page)
            .with_name(name)
            .with_args(args)
            .render()
    }

    /// Render a template source into any `fmt::Write` sink.
    pub fn render_to(
        &self,
        source: &str,
        args: HashMap<String, Value>,
        out: &mut impl fmt::Write,
    ) -> Result<(), ScriptException> {
        let rendered = self.render(source, args)?;
        out.write_str(&rendered)
            .map_err(|e| ScriptException::new(ScriptError::Evaluation(e.to_string())))
    }

    /// Run a source through language detection: registered languages are
    /// consulted in registration order, then the template and expression
    /// defaults.
    pub fn run(
        &self,
        source: &str,
        args: HashMap<String, Value>,
    ) -> Result<Value, ScriptException> {
        for language in &self.languages {
            if language.detect(source) {
                let compiled = language.parse(self, source)?;
                return Ok(language.evaluate(self, &compiled, &args)?);
            }
        }
        unreachable!("the expression language detects every source")
    }
}

impl Default for ScriptContext {
    fn default() -> Self {
        ScriptContext::new()
    }
}

/// Collects filters, blocks, globals, virtual files, languages and config
/// before sealing them into a [`ScriptContext`].
#[derive(Default)]
pub struct ScriptContextBuilder {
    config: ScriptConfig,
    filters: Vec<(String, Option<usize>, FilterFn)>,
    blocks: HashMap<String, Arc<dyn BlockHandler>>,
    globals: HashMap<String, Value>,
    files: HashMap<String, String>,
    languages: Vec<Arc<dyn ScriptLanguage>>,
}

impl ScriptContextBuilder {
    pub fn config(mut self, config: ScriptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn allow_assignments(mut self, allow: bool) -> Self {
        self.config.allow_assignments = allow;
        self
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.config.max_steps = steps;
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    /// Debug mode: faults render inline as `error + source` instead of
    /// failing the page.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.render_expression_exceptions = debug;
        self
    }

    pub fn skip_executing_filters_on_error(mut self, skip: bool) -> Self {
        self.config.skip_executing_filters_on_error = skip;
        self
    }

    pub fn skip_executing_page_on_error(mut self, skip: bool) -> Self {
        self.config.skip_executing_page_on_error = skip;
        self
    }

    pub fn assign_exceptions_to(mut self, name: impl Into<String>) -> Self {
        self.config.assign_exceptions_to = Some(name.into());
        self
    }

    /// Register a host filter with a fixed arity (including the piped
    /// value). Failures escaping it are wrapped as host errors naming it.
    pub fn filter<F>(mut self, name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&FilterInvocation<'_, '_>, Vec<Value>) -> Result<Value, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        self.filters.push((name.into(), Some(arity), Arc::new(func)));
        self
    }

    /// Register a host filter accepting any number of arguments.
    pub fn filter_variadic<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&FilterInvocation<'_, '_>, Vec<Value>) -> Result<Value, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        self.filters.push((name.into(), None, Arc::new(func)));
        self
    }

    pub fn block(mut self, name: impl Into<String>, handler: impl BlockHandler + 'static) -> Self {
        self.blocks.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    /// Register a named virtual file, available to partials, layouts and
    /// [`ScriptContext::render_page`].
    pub fn file(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.files.insert(name.into(), source.into());
        self
    }

    pub fn language(mut self, language: impl ScriptLanguage + 'static) -> Self {
        self.languages.push(Arc::new(language));
        self
    }

    pub fn build(self) -> ScriptContext {
        let mut filters = FilterRegistry::new();
        register_defaults(&mut filters);
        for (name, arity, func) in self.filters {
            filters.register(&name, arity, true, func);
        }

        let mut blocks = self.blocks;
        blocks
            .entry("with".to_string())
            .or_insert_with(|| Arc::new(WithBlock));

        let mut languages = self.languages;
        languages.push(Arc::new(TemplateLanguage));
        languages.push(Arc::new(ExpressionLanguage));

        debug!(
            "built script context: {} files, {} globals, {} languages",
            self.files.len(),
            self.globals.len(),
            languages.len()
        );

        ScriptContext {
            config: self.config,
            filters,
            blocks,
            globals: ScopeLayer::from_map(self.globals),
            files: self.files,
            languages,
            cache: PageCache::new(),
        }
    }
}
