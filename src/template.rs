use crate::ast::{
    BlockArgs, Expr, FilterCall, PageBlockFragment, PageElseBlock, PageFragment,
    PageVariableFragment,
};
use crate::error::ScriptError;
use crate::parser::{Parser, ParserOptions};

/// Parse a page's raw text into an ordered fragment sequence.
///
/// Text outside `{{ }}` delimiters becomes string fragments verbatim.
/// `{{ expr |> filter }}` pipelines become variable fragments, and
/// `{{#name ...}} ... {{/name}}` blocks become block fragments with
/// recursively parsed bodies.
pub fn parse_template(text: &str) -> Result<Vec<PageFragment>, ScriptError> {
    parse_template_with(text, ParserOptions::default())
}

pub fn parse_template_with(
    text: &str,
    options: ParserOptions,
) -> Result<Vec<PageFragment>, ScriptError> {
    TemplateParser {
        text,
        options,
        legacy_pipes: true,
    }
    .parse_fragments(0, text.len())
}

/// Parse a bare `expr |> f1 |> f2(...)` pipeline outside a template, for
/// direct evaluation. A single `|` stays the bitwise-or operator here; only
/// `|>` separates stages.
pub(crate) fn parse_pipeline(
    source: &str,
    options: ParserOptions,
) -> Result<PageVariableFragment, ScriptError> {
    TemplateParser {
        text: source,
        options,
        legacy_pipes: false,
    }
    .parse_variable(source, source, 0)
}

struct TemplateParser<'t> {
    text: &'t str,
    options: ParserOptions,
    /// Inside `{{ }}` a single `|` is a legacy pipe separator.
    legacy_pipes: bool,
}

impl<'t> TemplateParser<'t> {
    fn parse_fragments(&self, start: usize, end: usize) -> Result<Vec<PageFragment>, ScriptError> {
        let mut fragments = Vec::new();
        let mut pos = start;

        while pos < end {
            let Some(open) = find_at(self.text, "{{", pos, end) else {
                fragments.push(PageFragment::Str(self.text[pos..end].to_string()));
                break;
            };
            if open > pos {
                fragments.push(PageFragment::Str(self.text[pos..open].to_string()));
            }

            if self.text[open..].starts_with("{{#") {
                let (block, next) = self.parse_block(open, end)?;
                fragments.push(PageFragment::Block(block));
                pos = next;
            } else {
                let close = find_expression_end(self.text, open + 2, end).ok_or_else(|| {
                    ScriptError::syntax("unterminated '{{' expression", open)
                })?;
                let body = &self.text[open + 2..close];
                let original = &self.text[open..close + 2];
                fragments.push(PageFragment::Var(self.parse_variable(body, original, open)?));
                pos = close + 2;
            }
        }
        Ok(fragments)
    }

    /// Parse `{{ expr |> f1 |> f2(...) }}` into a variable fragment.
    /// The body splits at top-level `|>` (or legacy `|`) boundaries; the
    /// first segment is the optional bound expression, the rest are filter
    /// invocations.
    fn parse_variable(
        &self,
        body: &str,
        original: &str,
        offset: usize,
    ) -> Result<PageVariableFragment, ScriptError> {
        let segments = split_pipeline(body, offset, self.legacy_pipes)?;

        let mut expr = None;
        let mut filters = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            let trimmed = segment.trim();
            if i == 0 {
                if !trimmed.is_empty() {
                    expr = Some(Parser::parse_source_with(trimmed, self.options)?);
                }
                continue;
            }
            filters.push(self.parse_filter_segment(trimmed, offset)?);
        }

        Ok(PageVariableFragment {
            expr,
            filters,
            original: original.to_string(),
        })
    }

    fn parse_filter_segment(&self, segment: &str, offset: usize) -> Result<FilterCall, ScriptError> {
        if segment.is_empty() {
            return Err(ScriptError::Argument(format!(
                "empty filter segment at position {}",
                offset
            )));
        }

        // clean-string shorthand: `name: raw text` => name('raw text')
        if let Some((name, raw)) = split_clean_string(segment) {
            return Ok(FilterCall {
                name: name.to_string(),
                args: vec![Expr::string(raw)],
            });
        }

        match Parser::parse_source_with(segment, self.options)? {
            Expr::Identifier(name) => Ok(FilterCall {
                name,
                args: Vec::new(),
            }),
            Expr::Call { callee, args } => match *callee {
                Expr::Identifier(name) => Ok(FilterCall { name, args }),
                other => Err(ScriptError::Argument(format!(
                    "filter segment must be a named call, found {:?}",
                    other
                ))),
            },
            other => Err(ScriptError::Argument(format!(
                "expected filter name or call, found {:?}",
                other
            ))),
        }
    }

    /// Parse a `{{#name args}} ... {{/name}}` block starting at `open`.
    /// Returns the block and the offset just past its close tag.
    fn parse_block(
        &self,
        open: usize,
        end: usize,
    ) -> Result<(PageBlockFragment, usize), ScriptError> {
        let header_end = find_expression_end(self.text, open + 2, end)
            .ok_or_else(|| ScriptError::syntax("unterminated block header", open))?;
        let header = self.text[open + 3..header_end].trim();

        let (name, argument) = match header.find(char::is_whitespace) {
            Some(idx) => (&header[..idx], header[idx..].trim()),
            None => (header, ""),
        };
        if name.is_empty() {
            return Err(ScriptError::syntax("missing block name after '{{#'", open));
        }

        let body_start = header_end + 2;
        let close_tag = format!("{{{{/{}}}}}", name);

        if name == "raw" {
            // raw bodies are captured as literal text, never parsed
            let close = find_at(self.text, &close_tag, body_start, end).ok_or_else(|| {
                ScriptError::syntax("missing {{/raw}} terminator", open)
            })?;
            let block = PageBlockFragment {
                name: name.to_string(),
                args: BlockArgs::Raw,
                body: vec![PageFragment::Str(self.text[body_start..close].to_string())],
                else_blocks: Vec::new(),
            };
            return Ok((block, close + close_tag.len()));
        }

        let (sections, close_pos) = self.scan_block_body(name, body_start, end, open)?;
        let args = self.parse_block_args(name, argument, open)?;

        let mut body = Vec::new();
        let mut else_blocks = Vec::new();
        for (i, section) in sections.iter().enumerate() {
            let fragments = self.parse_fragments(section.start, section.end)?;
            if i == 0 {
                body = fragments;
            } else {
                let condition = match &section.condition {
                    Some(cond) => Some(Parser::parse_source_with(cond, self.options)?),
                    None => None,
                };
                else_blocks.push(PageElseBlock {
                    condition,
                    body: fragments,
                });
            }
        }

        let block = PageBlockFragment {
            name: name.to_string(),
            args,
            body,
            else_blocks,
        };
        Ok((block, close_pos + close_tag.len()))
    }

    fn parse_block_args(
        &self,
        name: &str,
        argument: &str,
        open: usize,
    ) -> Result<BlockArgs, ScriptError> {
        match name {
            "if" => {
                if argument.is_empty() {
                    return Err(ScriptError::syntax("#if requires a condition", open));
                }
                Ok(BlockArgs::If(Parser::parse_source_with(
                    argument,
                    self.options,
                )?))
            }
            "each" => {
                if argument.is_empty() {
                    return Err(ScriptError::syntax("#each requires a sequence", open));
                }
                match split_each_header(argument) {
                    Some((binding, seq)) => Ok(BlockArgs::Each {
                        binding: binding.to_string(),
                        seq: Parser::parse_source_with(seq, self.options)?,
                    }),
                    None => Ok(BlockArgs::Each {
                        binding: "it".to_string(),
                        seq: Parser::parse_source_with(argument, self.options)?,
                    }),
                }
            }
            _ => {
                let expr = Parser::parse_source_with(argument, self.options).ok();
                Ok(BlockArgs::Custom {
                    raw: argument.to_string(),
                    expr,
                })
            }
        }
    }

    /// Scan a block body for its matching close tag, collecting top-level
    /// `{{else}}` / `{{else if cond}}` section boundaries on the way.
    fn scan_block_body(
        &self,
        name: &str,
        body_start: usize,
        end: usize,
        open: usize,
    ) -> Result<(Vec<Section>, usize), ScriptError> {
        let mut sections = vec![Section {
            start: body_start,
            end: body_start,
            condition: None,
        }];
        let mut depth = 0usize;
        let mut pos = body_start;

        while let Some(tag) = find_at(self.text, "{{", pos, end) {
            let rest = &self.text[tag..];
            if rest.starts_with("{{#raw}}") {
                let after = tag + "{{#raw}}".len();
                let close = find_at(self.text, "{{/raw}}", after, end).ok_or_else(|| {
                    ScriptError::syntax("missing {{/raw}} terminator", tag)
                })?;
                pos = close + "{{/raw}}".len();
                continue;
            }
            if rest.starts_with("{{#") {
                depth += 1;
                pos = tag + 3;
                continue;
            }
            if rest.starts_with("{{/") {
                let tag_end = find_at(self.text, "}}", tag, end).ok_or_else(|| {
                    ScriptError::syntax("unterminated close tag", tag)
                })?;
                let close_name = self.text[tag + 3..tag_end].trim();
                if depth == 0 {
                    if close_name != name {
                        return Err(ScriptError::syntax(
                            format!("expected {{{{/{}}}}}, found {{{{/{}}}}}", name, close_name),
                            tag,
                        ));
                    }
                    if let Some(last) = sections.last_mut() {
                        last.end = tag;
                    }
                    return Ok((sections, tag));
                }
                depth -= 1;
                pos = tag_end + 2;
                continue;
            }
            if depth == 0 && (rest.starts_with("{{else}}") || rest.starts_with("{{else ")) {
                let tag_end = find_expression_end(self.text, tag + 2, end).ok_or_else(|| {
                    ScriptError::syntax("unterminated {{else}} tag", tag)
                })?;
                let inner = self.text[tag + 2..tag_end].trim();
                let condition = inner
                    .strip_prefix("else")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| match s.strip_prefix("if") {
                        // only treat a leading `if` as the keyword form
                        Some(rest) if rest.starts_with(char::is_whitespace) => {
                            rest.trim().to_string()
                        }
                        _ => s.to_string(),
                    });
                if let Some(last) = sections.last_mut() {
                    last.end = tag;
                }
                sections.push(Section {
                    start: tag_end + 2,
                    end: tag_end + 2,
                    condition,
                });
                pos = tag_end + 2;
                continue;
            }
            // ordinary expression tag; skip over it wholesale
            let tag_end = find_expression_end(self.text, tag + 2, end)
                .ok_or_else(|| ScriptError::syntax("unterminated '{{' expression", tag))?;
            pos = tag_end + 2;
        }

        Err(ScriptError::syntax(
            format!("missing {{{{/{}}}}} terminator", name),
            open,
        ))
    }
}

struct Section {
    start: usize,
    end: usize,
    condition: Option<String>,
}

fn find_at(text: &str, needle: &str, start: usize, end: usize) -> Option<usize> {
    text.get(start..end)
        .and_then(|slice| slice.find(needle))
        .map(|idx| start + idx)
}

/// Find the `}}` closing an expression opened at `start`, respecting string
/// quotes, back-ticks and nested braces.
fn find_expression_end(text: &str, start: usize, end: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < end {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                i = skip_string(bytes, i, end)?;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                if depth == 0 && i + 1 < end && bytes[i + 1] == b'}' {
                    return Some(i);
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Skip a quoted string starting at `i`, returning the index just past the
/// closing quote.
fn skip_string(bytes: &[u8], i: usize, end: usize) -> Option<usize> {
    let quote = bytes[i];
    let mut j = i + 1;
    while j < end {
        match bytes[j] {
            b'\\' => j += 2,
            c if c == quote => return Some(j + 1),
            _ => j += 1,
        }
    }
    None
}

/// Split a `{{ }}` body at top-level pipe boundaries (`|>`, and with
/// `legacy` also a single `|`), respecting quotes and bracket nesting.
/// `||` is never a boundary.
fn split_pipeline(body: &str, offset: usize, legacy: bool) -> Result<Vec<String>, ScriptError> {
    let bytes = body.as_bytes();
    let mut segments = Vec::new();
    let mut seg_start = 0usize;
    let mut depth = 0i32;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' | b'`' => {
                i = skip_string(bytes, i, bytes.len())
                    .ok_or_else(|| ScriptError::syntax("unterminated string", offset + i))?;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(ScriptError::syntax("unbalanced brackets", offset + i));
                }
                i += 1;
            }
            b'|' if depth == 0 => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'|' {
                    i += 2;
                } else if i + 1 < bytes.len() && bytes[i + 1] == b'>' {
                    segments.push(body[seg_start..i].to_string());
                    i += 2;
                    seg_start = i;
                } else if legacy {
                    segments.push(body[seg_start..i].to_string());
                    i += 1;
                    seg_start = i;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    if depth != 0 {
        return Err(ScriptError::syntax("unbalanced brackets", offset));
    }
    segments.push(body[seg_start..].to_string());
    Ok(segments)
}

/// Detect the clean-string filter shorthand `name: raw text`, which is
/// rewritten to `name('raw text')`. The colon must be the first character
/// after the filter name. Inner `{{ }}` and literal `\n` sequences are
/// preserved verbatim.
fn split_clean_string(segment: &str) -> Option<(&str, &str)> {
    let mut chars = segment.char_indices();
    let (_, first) = chars.next()?;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }
    let mut name_end = first.len_utf8();
    for (idx, ch) in chars {
        if ch.is_alphanumeric() || ch == '_' {
            name_end = idx + ch.len_utf8();
            continue;
        }
        if ch == ':' {
            let raw = segment[idx + 1..].trim();
            return Some((&segment[..name_end], raw));
        }
        return None;
    }
    None
}

/// Split an `#each` header of the form `binding in seq`. Returns `None`
/// when there is no top-level `in`, in which case the whole header is the
/// sequence expression.
fn split_each_header(header: &str) -> Option<(&str, &str)> {
    let binding_end = header.find(char::is_whitespace)?;
    let binding = &header[..binding_end];
    if !binding.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let rest = header[binding_end..].trim_start();
    let seq = rest.strip_prefix("in")?;
    if !seq.starts_with(char::is_whitespace) {
        return None;
    }
    Some((binding, seq.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_legacy_and_modern_pipes() {
        let segs = split_pipeline("a |> b | c", 0, true).unwrap();
        assert_eq!(segs, vec!["a ", " b ", " c"]);
    }

    #[test]
    fn logical_or_is_not_a_pipe() {
        let segs = split_pipeline("a || b |> f", 0, true).unwrap();
        assert_eq!(segs, vec!["a || b ", " f"]);
    }

    #[test]
    fn single_pipe_kept_outside_templates() {
        let segs = split_pipeline("1 | 2 |> add(3)", 0, false).unwrap();
        assert_eq!(segs, vec!["1 | 2 ", " add(3)"]);
    }

    #[test]
    fn clean_string_shorthand() {
        assert_eq!(
            split_clean_string("markdown: # Title"),
            Some(("markdown", "# Title"))
        );
        assert_eq!(split_clean_string("cond ? a : b"), None);
    }

    #[test]
    fn each_header_forms() {
        assert_eq!(split_each_header("x in items"), Some(("x", "items")));
        assert_eq!(split_each_header("items"), None);
    }
}
