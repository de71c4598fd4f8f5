//! Minimal placeholder templates.
//!
//! - `${key}` is replaced with the HTML-escaped value (missing keys render empty;
//!   an unclosed `${` is kept literally)
//! - `<!--#if key-->...<!--/if-->` keeps its body when `key` is truthy
//! - `<!--#unless key-->...<!--/unless-->` keeps its body when it is not
//!
//! Sections nest. Any other `<!-- ... -->` comment passes through untouched.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

const PLACEHOLDER_OPEN: &str = "${";
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const IF_OPEN: &str = "<!--#if ";
const UNLESS_OPEN: &str = "<!--#unless ";
const IF_CLOSE: &str = "<!--/if-->";
const UNLESS_CLOSE: &str = "<!--/unless-->";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("section {0:?} is never closed")]
    UnclosedSection(String),
    #[error("unexpected {0} without a matching opening tag")]
    UnexpectedClose(&'static str),
    #[error("section tag at byte {0} is missing '-->'")]
    UnterminatedTag(usize),
}

/// Flattened template variables. Nested objects become dotted keys.
#[derive(Debug, Clone, Default)]
pub struct Context(BTreeMap<String, Value>);

impl Context {
    /// Flatten a JSON object (typically a serialized view model).
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let mut vars = BTreeMap::new();
        flatten("", value, &mut vars);
        Self(vars)
    }

    fn truthy(&self, key: &str) -> bool {
        match self.0.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Number(_) | Value::Object(_)) => true,
        }
    }

    fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), value.clone());
            }
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, out);
            }
        }
        _ => {
            out.insert(prefix.to_string(), value.clone());
        }
    }
}

pub fn render(template: &str, context: &Context) -> Result<String, TemplateError> {
    let mut renderer = Renderer {
        src: template,
        pos: 0,
        context,
    };
    let mut out = String::with_capacity(template.len());
    renderer.block(&mut out, true, None)?;
    Ok(out)
}

struct Renderer<'a> {
    src: &'a str,
    pos: usize,
    context: &'a Context,
}

impl Renderer<'_> {
    /// Render until `closing` (or end of input at top level). Output is only
    /// written when `emit` is set; skipped sections are still parsed.
    fn block(
        &mut self,
        out: &mut String,
        emit: bool,
        closing: Option<(&'static str, &str)>,
    ) -> Result<(), TemplateError> {
        let src = self.src;
        loop {
            let rest = &src[self.pos..];
            let next = [rest.find(PLACEHOLDER_OPEN), rest.find(COMMENT_OPEN)]
                .into_iter()
                .flatten()
                .min();

            let Some(offset) = next else {
                if let Some((_, key)) = closing {
                    return Err(TemplateError::UnclosedSection(key.to_string()));
                }
                if emit {
                    out.push_str(rest);
                }
                self.pos = src.len();
                return Ok(());
            };

            if emit {
                out.push_str(&rest[..offset]);
            }
            self.pos += offset;
            let rest = &src[self.pos..];

            if rest.starts_with(PLACEHOLDER_OPEN) {
                self.placeholder(out, emit);
            } else if let Some(inverted) = section_kind(rest) {
                let (open, close) = if inverted {
                    (UNLESS_OPEN, UNLESS_CLOSE)
                } else {
                    (IF_OPEN, IF_CLOSE)
                };
                let tag_start = self.pos;
                let body = &rest[open.len()..];
                let end = body
                    .find(COMMENT_CLOSE)
                    .ok_or(TemplateError::UnterminatedTag(tag_start))?;
                let key = body[..end].trim();
                self.pos += open.len() + end + COMMENT_CLOSE.len();
                let keep = self.context.truthy(key) != inverted;
                self.block(out, emit && keep, Some((close, key)))?;
            } else if let Some(tag) = [IF_CLOSE, UNLESS_CLOSE]
                .into_iter()
                .find(|tag| rest.starts_with(tag))
            {
                return match closing {
                    Some((expected, _)) if expected == tag => {
                        self.pos += tag.len();
                        Ok(())
                    }
                    _ => Err(TemplateError::UnexpectedClose(tag)),
                };
            } else {
                if emit {
                    out.push_str(COMMENT_OPEN);
                }
                self.pos += COMMENT_OPEN.len();
            }
        }
    }

    fn placeholder(&mut self, out: &mut String, emit: bool) {
        let start = self.pos + PLACEHOLDER_OPEN.len();
        match self.src[start..].find('}') {
            Some(end_rel) => {
                if emit {
                    let key = self.src[start..start + end_rel].trim();
                    out.push_str(&escape_html(&self.context.text(key)));
                }
                self.pos = start + end_rel + 1;
            }
            None => {
                if emit {
                    out.push_str(PLACEHOLDER_OPEN);
                }
                self.pos = start;
            }
        }
    }
}

/// `Some(false)` for `#if`, `Some(true)` for `#unless`.
fn section_kind(rest: &str) -> Option<bool> {
    if rest.starts_with(IF_OPEN) {
        Some(false)
    } else if rest.starts_with(UNLESS_OPEN) {
        Some(true)
    } else {
        None
    }
}

#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
