//! mailjet2brevo: translate Mailjet template directives into Brevo syntax.
//!
//! The input is HTML or MJML markup with Mailjet directives embedded in it.
//! Everything outside `{{ }}`, `{% %}` and `{# #}` is copied through byte for
//! byte; directives are lexed, parsed into a small AST and re-emitted in
//! Brevo form.
//!
//! Supported subset:
//! - `{{var:name}}`, `{{name}}`, `{{var:name:"default"}}`, dotted paths and
//!   `|filter` chains.
//! - `{% if %}` / `{% elseif %}` / `{% else if %}` / `{% else %}` /
//!   `{% endif %}` with comparisons, `and`, `or`, `not` and parentheses.
//! - `{% for x in collection %}` and `{% for n in range(a, b, step) %}`.
//!   Collections and condition operands may carry filters too.
//! - `{# comments #}`, passed through untouched.
//!
//! Template parameters are qualified with a namespace (`params.` by
//! default). Loop variables, the `loop` helper inside a loop body and
//! already-qualified references are left alone, which makes translation
//! idempotent.
//!
//! Recognized but unsupported (reported as [`Diagnostic`]s and left as-is):
//! tags `set`, `include`, `extends`, `block`, `macro`, `import`, `from`,
//! `autoescape`, `spaceless`; filters `date_modify`, `trans`, `raw`, `batch`.
//! A filter is reported wherever it appears, including inside `if` and
//! `for` tags.
//! With [`Options::strict`] any of them fails the conversion.
//!
//! ```
//! use mailjet2brevo::{translate, Options};
//!
//! let out = translate(
//!     r#"<p>Hi {{var:firstName:"there"}}</p>"#,
//!     &Options::default(),
//! )
//! .unwrap();
//! assert_eq!(out.output, r#"<p>Hi {{params.firstName|default:"there"}}</p>"#);
//! ```

pub mod ast;
pub mod error;
pub mod extract;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod translate;

pub use error::{Diagnostic, Error, LexError, ParseError, RenderError, Result};
pub use error::UnconvertibleConstructError;
pub use extract::{extract_variables, preview_json, Preview};
pub use options::Options;
pub use pipeline::{Conversion, Converter, MarkupRenderer, Passthrough};
pub use translate::{translate, Translation};

/// Lex and parse `source` without translating it.
pub fn parse_template(source: &str, namespace: &str) -> Result<ast::Template> {
    let tokens = lexer::tokenize(source)?;
    Ok(parser::parse(source, tokens, namespace)?)
}
