//! Two-pass conversion around an external markup renderer.
//!
//! Directives embedded in MJML attributes must be translated before the
//! renderer runs; the rendered HTML is then translated once more to catch
//! anything the renderer emitted as text. Translation is idempotent, so the
//! second pass leaves already-converted directives alone.

use tracing::debug;

use crate::error::{Diagnostic, RenderError, Result};
use crate::extract::{extract_variables, Preview};
use crate::options::Options;
use crate::translate::translate;

/// Compiles markup (e.g. MJML) to final HTML. Directives are opaque text to it.
pub trait MarkupRenderer {
    fn render(&self, markup: &str) -> std::result::Result<String, RenderError>;
}

impl<F> MarkupRenderer for F
where
    F: Fn(&str) -> std::result::Result<String, RenderError>,
{
    fn render(&self, markup: &str) -> std::result::Result<String, RenderError> {
        self(markup)
    }
}

/// Identity renderer, for input that is already HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl MarkupRenderer for Passthrough {
    fn render(&self, markup: &str) -> std::result::Result<String, RenderError> {
        Ok(markup.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub html: String,
    /// Extracted from the source before any translation.
    pub preview: Preview,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Converter<R> {
    options: Options,
    renderer: R,
}

impl<R: MarkupRenderer> Converter<R> {
    pub fn new(renderer: R, options: Options) -> Self {
        Self { options, renderer }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn convert(&self, source: &str) -> Result<Conversion> {
        let preview = extract_variables(source);
        debug!(variables = preview.len(), "extracted preview data");

        debug!("translating source markup");
        let pre = translate(source, &self.options)?;

        let html = self.renderer.render(&pre.output)?;
        debug!(bytes = html.len(), "rendered markup");

        debug!("translating rendered html");
        let post = translate(&html, &self.options)?;

        let mut diagnostics = pre.diagnostics;
        for diagnostic in post.diagnostics {
            if !diagnostics.iter().any(|d| d.snippet == diagnostic.snippet) {
                diagnostics.push(diagnostic);
            }
        }

        Ok(Conversion {
            html: post.output,
            preview,
            diagnostics,
        })
    }
}

impl Converter<Passthrough> {
    pub fn passthrough(options: Options) -> Self {
        Self::new(Passthrough, options)
    }
}
