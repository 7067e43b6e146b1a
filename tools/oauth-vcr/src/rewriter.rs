//! Source rewriting that redirects construction and subtyping of the native
//! signed-request client to the proxy client type.

use crate::errors::VcrError;
use crate::loader::{CodeTransform, SourceLoader};
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;

pub const TRANSFORM_NAME: &str = "vcr_oauth";
pub const DEFAULT_NATIVE_TYPE: &str = "OAuth";
pub const DEFAULT_ADAPTER_TYPE: &str = r"\VCR\Util\OAuth";

/// One match/replace pair. Replacements may reference capture groups with
/// `${n}`.
#[derive(Debug, Clone)]
pub struct TransformRule {
    pub pattern: Regex,
    pub replacement: String,
}

impl TransformRule {
    fn new(pattern: &str, replacement: String) -> Result<Self, VcrError> {
        let pattern = Regex::new(pattern).map_err(|e| VcrError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            pattern,
            replacement,
        })
    }

    fn apply<'a>(&self, code: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(code, self.replacement.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PatternRewriter {
    native_type: String,
    adapter_type: String,
    rules: Vec<TransformRule>,
}

impl PatternRewriter {
    /// Rewriter for the stock `OAuth` client.
    pub fn oauth() -> Result<Self, VcrError> {
        Self::new(DEFAULT_NATIVE_TYPE, DEFAULT_ADAPTER_TYPE)
    }

    pub fn new(native_type: &str, adapter_type: &str) -> Result<Self, VcrError> {
        if native_type.trim().is_empty() || adapter_type.trim().is_empty() {
            return Err(VcrError::InvalidPattern(
                "native and adapter type names must be non-empty".to_string(),
            ));
        }
        if !is_type_path(adapter_type) {
            return Err(VcrError::InvalidPattern(format!(
                "adapter type `{adapter_type}` is not a `\\`-separated identifier path"
            )));
        }
        let native = regex::escape(native_type);
        let rules = vec![
            // construction, optionally namespace-qualified: `new \OAuth (`
            TransformRule::new(
                &format!(r"(?i)\bnew\s+\\?{native}\s*\("),
                format!("new {adapter_type}("),
            )?,
            // subtype declaration: `extends OAuth {`
            TransformRule::new(
                &format!(r"(?i)\bextends\s+\\?{native}(\s+)"),
                format!("extends {adapter_type}${{1}}"),
            )?,
        ];
        let rewriter = Self {
            native_type: native_type.to_string(),
            adapter_type: adapter_type.to_string(),
            rules,
        };
        rewriter.ensure_stable()?;
        Ok(rewriter)
    }

    pub fn native_type(&self) -> &str {
        &self.native_type
    }

    pub fn adapter_type(&self) -> &str {
        &self.adapter_type
    }

    pub fn rules(&self) -> &[TransformRule] {
        &self.rules
    }

    /// Applies every rule in order. Running it on its own output changes
    /// nothing.
    pub fn transform(&self, code: &str) -> String {
        let mut current = Cow::Borrowed(code);
        for rule in &self.rules {
            let rewritten = match rule.apply(&current) {
                Cow::Borrowed(_) => None,
                Cow::Owned(text) => Some(text),
            };
            if let Some(text) = rewritten {
                current = Cow::Owned(text);
            }
        }
        current.into_owned()
    }

    /// Hands this rewriter to `loader`. Loaders key transformers by name, so
    /// repeated registration is a no-op.
    pub fn register(self: &Arc<Self>, loader: &dyn SourceLoader) {
        loader.register_transformer(Arc::clone(self) as Arc<dyn CodeTransform>);
    }

    // An adapter literal that itself matches a rule would be rewritten on
    // every pass.
    fn ensure_stable(&self) -> Result<(), VcrError> {
        let probes = [
            format!("new {}(", self.adapter_type),
            format!("extends {} ", self.adapter_type),
        ];
        for probe in &probes {
            if self.rules.iter().any(|rule| rule.pattern.is_match(probe)) {
                return Err(VcrError::InvalidPattern(format!(
                    "adapter type `{}` is matched by the rewrite rules for `{}`",
                    self.adapter_type, self.native_type
                )));
            }
        }
        Ok(())
    }
}

/// `Name`, `\\Name` or `\\Vendor\\Name`: identifiers joined by single
/// backslashes, optionally rooted.
fn is_type_path(name: &str) -> bool {
    let relative = name.strip_prefix('\\').unwrap_or(name);
    !relative.is_empty()
        && relative.split('\\').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        })
}

impl CodeTransform for PatternRewriter {
    fn name(&self) -> &str {
        TRANSFORM_NAME
    }

    fn transform(&self, code: &str) -> String {
        PatternRewriter::transform(self, code)
    }
}
