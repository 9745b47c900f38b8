use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::ast::{
    BlockArgs, Expr, PageBlockFragment, PageFragment, PageVariableFragment,
};
use crate::context::ScriptContext;
use crate::error::{ScriptError, ScriptException};
use crate::evaluator::Evaluator;
use crate::filters::FilterInvocation;
use crate::output::stringify;
use crate::page::SharpPage;
use crate::scope::{ScopeChain, ScopeLayer};
use crate::value::Value;

/// Phases of a page render. Faults that no error policy recovers leave
/// the machine early with a [`ScriptException`].
#[derive(Debug, Clone, Copy, PartialEq)]
enum RenderState {
    Init,
    RenderFragments,
    ResolveLayout,
    Flush,
    Done,
}

/// A single render of a compiled page against a context.
///
/// Configure with the builder-style methods, then call [`render`].
///
/// [`render`]: PageResult::render
pub struct PageResult<'c> {
    ctx: &'c ScriptContext,
    page: Arc<SharpPage>,
    page_name: String,
    page_dir: String,
    args: HashMap<String, Value>,
    layout: Option<String>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'c> PageResult<'c> {
    pub fn new(ctx: &'c ScriptContext, page: Arc<SharpPage>) -> Self {
        PageResult {
            ctx,
            page,
            page_name: "<anonymous>".to_string(),
            page_dir: String::new(),
            args: HashMap::new(),
            layout: None,
            cancel: None,
        }
    }

    /// Name the page for trace frames and derive its directory for
    /// partial/layout resolution.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.page_dir = dir_of(&name).to_string();
        self.page_name = name;
        self
    }

    pub fn with_args(mut self, args: HashMap<String, Value>) -> Self {
        self.args = args;
        self
    }

    /// Override the layout, bypassing page metadata. `"none"` disables
    /// layouts entirely.
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn render(self) -> Result<String, ScriptException> {
        let evaluator = Evaluator::new(self.ctx).with_page_dir(self.page_dir.clone());
        let mut state = RenderState::Init;
        let mut output = String::new();

        // layout resolution state, carried across iterations
        let mut current_page = Arc::clone(&self.page);
        let mut current_dir = self.page_dir.clone();
        let mut layout_override = self.layout.clone();
        let mut visited: HashSet<String> = HashSet::new();

        loop {
            match state {
                RenderState::Init => {
                    evaluator.reset_budget();
                    debug!("rendering page '{}'", self.page_name);
                    state = RenderState::RenderFragments;
                }

                RenderState::RenderFragments => {
                    output = self.render_page(&evaluator, &current_page, &self.args, None)?;
                    state = RenderState::ResolveLayout;
                }

                RenderState::ResolveLayout => {
                    let requested = layout_override
                        .take()
                        .or_else(|| current_page.metadata_value("layout").map(String::from));
                    let explicit = requested.is_some();
                    let wanted = requested.unwrap_or_else(|| "_layout".to_string());
                    if wanted == "none" {
                        state = RenderState::Flush;
                        continue;
                    }

                    let Some((path, source)) = resolve_file(self.ctx, &current_dir, &wanted)
                    else {
                        if explicit {
                            return Err(ScriptException::new(ScriptError::Evaluation(
                                format!("layout '{}' not found", wanted),
                            ))
                            .with_frame(&self.page_name, format!("layout: {}", wanted)));
                        }
                        state = RenderState::Flush;
                        continue;
                    };
                    if !visited.insert(path.clone()) {
                        // an explicit layout chain looping back is an
                        // error; the implicit fallback re-resolving to an
                        // already-applied layout just ends the chain
                        if explicit {
                            return Err(ScriptException::new(ScriptError::Evaluation(
                                format!("layout cycle through '{}'", path),
                            ))
                            .with_frame(&self.page_name, format!("layout: {}", wanted)));
                        }
                        state = RenderState::Flush;
                        continue;
                    }
                    trace!("applying layout '{}'", path);

                    let layout_page = self
                        .ctx
                        .compile(source)
                        .map_err(|e| ScriptException::new(e).with_frame(&path, source))?;

                    // the inner result is bound as `page`, alongside the
                    // inner page's metadata, in the layout's scope
                    let mut layout_args = self.args.clone();
                    for (key, value) in &current_page.metadata {
                        layout_args.insert(key.clone(), Value::str(value.clone()));
                    }
                    layout_args.insert("page".to_string(), Value::Str(output.clone()));

                    let layout_dir = dir_of(&path).to_string();
                    let saved = evaluator.swap_page_dir(layout_dir.clone());
                    let rendered =
                        self.render_page(&evaluator, &layout_page, &layout_args, Some(&path));
                    evaluator.swap_page_dir(saved);
                    output = rendered?;

                    current_page = layout_page;
                    current_dir = layout_dir;
                    // a layout may itself declare a layout; loop again
                }

                RenderState::Flush => {
                    state = RenderState::Done;
                }

                RenderState::Done => return Ok(output),
            }
        }
    }

    fn render_page(
        &self,
        evaluator: &Evaluator<'c>,
        page: &SharpPage,
        args: &HashMap<String, Value>,
        name: Option<&str>,
    ) -> Result<String, ScriptException> {
        let name = name.unwrap_or(&self.page_name);
        let metadata_layer = ScopeLayer::from_map(
            page.metadata
                .iter()
                .map(|(k, v)| (k.clone(), Value::str(v.clone())))
                .collect(),
        );
        let args_layer = ScopeLayer::from_map(args.clone());
        let scope = ScopeChain::stacked(vec![
            self.ctx.globals().clone(),
            metadata_layer,
            args_layer.clone(),
        ]);

        let mut out = String::new();
        let mut frame = RenderFrame {
            evaluator,
            scope,
            out: &mut out,
            cancel: self.cancel.as_deref(),
            error_layer: args_layer,
            halted: false,
            fault_source: None,
        };
        match frame.render_fragments(&page.fragments) {
            Ok(()) => Ok(out),
            Err(err) => {
                let source = frame
                    .fault_source
                    .unwrap_or_else(|| page.source.clone());
                Err(ScriptException::new(err).with_frame(name, source))
            }
        }
    }
}

/// A registered handler for `{{#name ...}}` blocks the engine does not
/// implement natively.
pub trait BlockHandler: Send + Sync {
    fn render(
        &self,
        frame: &mut RenderFrame<'_, '_>,
        block: &PageBlockFragment,
    ) -> Result<(), ScriptError>;
}

/// Mutable render state threaded through fragment execution and block
/// handlers.
pub struct RenderFrame<'e, 'c> {
    pub evaluator: &'e Evaluator<'c>,
    pub scope: ScopeChain,
    pub out: &'e mut String,
    cancel: Option<&'e AtomicBool>,
    error_layer: ScopeLayer,
    halted: bool,
    fault_source: Option<String>,
}

impl<'e, 'c> RenderFrame<'e, 'c> {
    pub fn ctx(&self) -> &'c ScriptContext {
        self.evaluator.ctx()
    }

    pub fn render_fragments(&mut self, fragments: &[PageFragment]) -> Result<(), ScriptError> {
        for fragment in fragments {
            if self.halted {
                return Ok(());
            }
            if let Some(cancel) = self.cancel
                && cancel.load(Ordering::Relaxed)
            {
                return Err(ScriptError::Cancelled);
            }
            match fragment {
                PageFragment::Str(text) => self.out.push_str(text),
                PageFragment::Var(var) => self.render_var(var)?,
                PageFragment::Block(block) => self.render_block(block)?,
            }
        }
        Ok(())
    }

    /// Render fragments under a replacement scope, restoring the previous
    /// scope afterwards.
    pub fn render_scoped(
        &mut self,
        fragments: &[PageFragment],
        scope: ScopeChain,
    ) -> Result<(), ScriptError> {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = self.render_fragments(fragments);
        self.scope = saved;
        result
    }

    fn render_var(&mut self, var: &PageVariableFragment) -> Result<(), ScriptError> {
        // a pipeline naming a filter this context does not know is left
        // for an outer system: emit its source verbatim
        for filter in &var.filters {
            if !self.ctx().filters().contains(&filter.name) {
                trace!("unknown filter '{}', emitting source", filter.name);
                self.out.push_str(&var.original);
                return Ok(());
            }
        }

        match self.eval_pipeline(var) {
            Ok(value) => {
                self.out.push_str(&stringify(&value));
                Ok(())
            }
            Err(err) => self.recover(err, &var.original),
        }
    }

    fn eval_pipeline(&self, var: &PageVariableFragment) -> Result<Value, ScriptError> {
        let evaluator = self.evaluator;
        let mut value = match &var.expr {
            // a bare leading identifier that is not in scope but names a
            // registered filter is a zero-argument filter call
            Some(Expr::Identifier(name))
                if self.scope.lookup(name).is_none()
                    && self.ctx().filters().contains(name) =>
            {
                evaluator.apply_filter(name, Vec::new(), &self.scope)?
            }
            Some(expr) => evaluator.eval(expr, &self.scope)?,
            None => Value::Null,
        };
        for filter in &var.filters {
            let mut args = vec![value];
            args.extend(evaluator.eval_args(&filter.args, &self.scope)?);
            value = evaluator.apply_filter(&filter.name, args, &self.scope)?;
        }
        Ok(value)
    }

    /// Apply the context's error policies to a faulted fragment. Returns
    /// `Ok` when a policy recovered the fault.
    fn recover(&mut self, err: ScriptError, source: &str) -> Result<(), ScriptError> {
        if matches!(err, ScriptError::Cancelled) {
            return Err(err);
        }
        let config = self.ctx().config();

        if let Some(name) = &config.assign_exceptions_to {
            self.error_layer.set(name, error_value(&err));
        }
        if config.render_expression_exceptions {
            self.out.push_str(&format!("{} in {}", err, source));
            return Ok(());
        }
        if config.skip_executing_page_on_error {
            debug!("fault halted page: {}", err);
            self.halted = true;
            return Ok(());
        }
        if config.skip_executing_filters_on_error {
            debug!("fault skipped fragment: {}", err);
            return Ok(());
        }
        if self.fault_source.is_none() {
            self.fault_source = Some(source.to_string());
        }
        Err(err)
    }

    fn render_block(&mut self, block: &PageBlockFragment) -> Result<(), ScriptError> {
        match &block.args {
            BlockArgs::Raw => {
                for fragment in &block.body {
                    if let PageFragment::Str(text) = fragment {
                        self.out.push_str(text);
                    }
                }
                Ok(())
            }

            BlockArgs::If(condition) => {
                if self.evaluator.eval(condition, &self.scope)?.is_truthy() {
                    return self.render_scoped(&block.body, self.scope.child());
                }
                for branch in &block.else_blocks {
                    let taken = match &branch.condition {
                        Some(cond) => self.evaluator.eval(cond, &self.scope)?.is_truthy(),
                        None => true,
                    };
                    if taken {
                        return self.render_scoped(&branch.body, self.scope.child());
                    }
                }
                Ok(())
            }

            BlockArgs::Each { binding, seq } => {
                let seq = self.evaluator.eval(seq, &self.scope)?;
                let items = each_items(&seq)?;
                if items.is_empty() {
                    for branch in &block.else_blocks {
                        if branch.condition.is_none() {
                            return self.render_scoped(&branch.body, self.scope.child());
                        }
                    }
                    return Ok(());
                }
                for (index, item) in items.into_iter().enumerate() {
                    let scope = self.scope.child();
                    scope.declare(binding, item);
                    scope.declare("index", Value::Int(index as i64));
                    self.render_scoped(&block.body, scope)?;
                }
                Ok(())
            }

            BlockArgs::Custom { .. } => {
                let Some(handler) = self.ctx().block(&block.name) else {
                    return Err(ScriptError::Evaluation(format!(
                        "unknown block '{}'",
                        block.name
                    )));
                };
                handler.render(self, block)
            }
        }
    }
}

/// The `{{#with expr}}` block: binds the evaluated value as `it`, spreads
/// map entries into the child scope, and skips the body when the value is
/// falsy.
pub struct WithBlock;

impl BlockHandler for WithBlock {
    fn render(
        &self,
        frame: &mut RenderFrame<'_, '_>,
        block: &PageBlockFragment,
    ) -> Result<(), ScriptError> {
        let BlockArgs::Custom { expr: Some(expr), .. } = &block.args else {
            return Err(ScriptError::Argument(
                "#with requires an expression".to_string(),
            ));
        };
        let value = frame.evaluator.eval(expr, &frame.scope)?;
        if !value.is_truthy() {
            for branch in &block.else_blocks {
                if branch.condition.is_none() {
                    return frame.render_scoped(&branch.body, frame.scope.child());
                }
            }
            return Ok(());
        }

        let scope = frame.scope.child();
        if let Value::Map(map) = &value {
            for (key, entry) in map {
                scope.declare(key, entry.clone());
            }
        }
        scope.declare("it", value);
        frame.render_scoped(&block.body, scope)
    }
}

/// Materialize an `#each` sequence. Maps iterate as `{key, value}` entries
/// sorted by key so output is deterministic.
fn each_items(seq: &Value) -> Result<Vec<Value>, ScriptError> {
    match seq {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Ok(keys
                .into_iter()
                .map(|key| {
                    let mut entry = HashMap::new();
                    entry.insert("key".to_string(), Value::str(key.clone()));
                    entry.insert("value".to_string(), map[key].clone());
                    Value::Map(entry)
                })
                .collect())
        }
        other => Err(ScriptError::Argument(format!(
            "#each: cannot iterate {}",
            other.type_name()
        ))),
    }
}

fn error_value(err: &ScriptError) -> Value {
    let mut map = HashMap::new();
    map.insert("message".to_string(), Value::str(err.to_string()));
    map.insert("kind".to_string(), Value::str(err.kind()));
    Value::Map(map)
}

/// Render a named partial inline: resolve the virtual file relative to the
/// current page directory, compile it through the page cache, and render
/// its fragments with a child scope holding the partial arguments.
pub(crate) fn render_partial(
    inv: &FilterInvocation<'_, '_>,
    name: &str,
    args: Option<HashMap<String, Value>>,
) -> Result<Value, ScriptError> {
    let ctx = inv.ctx();
    let Some((path, source)) = resolve_file(ctx, &inv.page_dir, name) else {
        return Err(ScriptError::Argument(format!(
            "partial '{}' not found",
            name
        )));
    };
    let page = ctx.compile(source)?;

    let scope = inv.scope.child();
    if let Some(args) = args {
        for (key, value) in args {
            scope.declare(&key, value);
        }
    }

    let partial_dir = dir_of(&path).to_string();
    let saved = inv.evaluator.swap_page_dir(partial_dir);
    let mut out = String::new();
    let mut frame = RenderFrame {
        evaluator: inv.evaluator,
        scope,
        out: &mut out,
        cancel: None,
        error_layer: ScopeLayer::new(),
        halted: false,
        fault_source: None,
    };
    let result = frame.render_fragments(&page.fragments);
    inv.evaluator.swap_page_dir(saved);
    result?;
    Ok(Value::Str(out))
}

/// Resolve a virtual-file name relative to a page directory: the directory
/// itself, then each parent, then the bare name.
pub(crate) fn resolve_file<'c>(
    ctx: &'c ScriptContext,
    dir: &str,
    name: &str,
) -> Option<(String, &'c str)> {
    let mut current = dir;
    loop {
        let candidate = if current.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", current, name)
        };
        if let Some(source) = ctx.file(&candidate) {
            return Some((candidate, source));
        }
        if current.is_empty() {
            return None;
        }
        current = dir_of(current);
    }
}

fn dir_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}
