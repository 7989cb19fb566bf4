//! Brevo emission.
//!
//! One function per node kind. Scope decisions were already made by the
//! parser, so emission never inspects identifier names; it only renders.

use tracing::{debug, warn};

use crate::ast::*;
use crate::error::{Diagnostic, Result, UnconvertibleConstructError};
use crate::lexer::tokenize;
use crate::options::Options;
use crate::parser::parse;

/// Output of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub output: String,
    /// Unsupported directives left untranslated in `output`. Always empty in
    /// strict mode.
    pub diagnostics: Vec<Diagnostic>,
}

impl Translation {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Translate Mailjet template source into Brevo syntax.
///
/// Lex and parse errors abort the conversion. Unsupported directives are
/// reported as diagnostics, or fail the whole call when `options.strict`
/// is set.
pub fn translate(source: &str, options: &Options) -> Result<Translation> {
    options.validate()?;

    let tokens = tokenize(source)?;
    debug!(tokens = tokens.len(), "tokenized template");
    let template = parse(source, tokens, &options.namespace)?;
    debug!(nodes = template.len(), "parsed template");

    let mut diagnostics = Vec::new();
    let output = emit(&template, &options.namespace, &mut diagnostics);

    if !diagnostics.is_empty() {
        if options.strict {
            return Err(UnconvertibleConstructError { diagnostics }.into());
        }
        for diagnostic in &diagnostics {
            warn!(
                offset = diagnostic.offset,
                snippet = %diagnostic.snippet,
                "{}",
                diagnostic.message
            );
        }
    }

    Ok(Translation {
        output,
        diagnostics,
    })
}

/// Render a parsed template, appending a diagnostic for every unsupported
/// directive encountered.
pub fn emit(template: &Template, namespace: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
    let mut emitter = Emitter {
        namespace,
        out: String::new(),
        diagnostics,
    };
    emitter.nodes(template);
    emitter.out
}

struct Emitter<'a> {
    namespace: &'a str,
    out: String,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Emitter<'_> {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(raw) | Node::Comment(raw) => self.out.push_str(raw),
                Node::Variable(var) => self.variable(var),
                Node::If(block) => self.if_block(block),
                Node::For(block) => self.for_block(block),
                Node::Unsupported(tag) => self.unsupported(tag),
            }
        }
    }

    /// Reports every unsupported filter against the directive it appears
    /// in. Returns true when the directive must be passed through as is.
    fn report_filters<'f>(
        &mut self,
        filters: impl IntoIterator<Item = &'f Filter>,
        snippet: &str,
        offset: usize,
    ) -> bool {
        let mut blocked = false;
        for filter in filters {
            if UNSUPPORTED_FILTERS.contains(&filter.name.as_str()) {
                self.diagnostics.push(Diagnostic {
                    snippet: snippet.to_string(),
                    message: format!("Filter '{}' is not supported in Brevo", filter.name),
                    offset,
                });
                blocked = true;
            }
        }
        blocked
    }

    fn variable(&mut self, var: &Variable) {
        let blocked = self.report_filters(&var.filters, &var.raw, var.offset);

        // Loop-locals and namespaced references are already valid Brevo
        // unless they use the Mailjet-only `var:` or `:"default"` forms.
        let rewrite = var.path.scope == Scope::Param || var.prefixed || var.default.is_some();
        if blocked || !rewrite {
            self.out.push_str(&var.raw);
            return;
        }

        let path = self.path(&var.path);
        self.out.push_str("{{");
        self.out.push_str(&path);
        // Empty Mailjet defaults carry no value and are dropped.
        if let Some(default) = var.default.as_ref().filter(|d| !is_empty_str(d)) {
            self.out.push_str("|default:");
            self.out.push_str(&literal(default));
        }
        for filter in &var.filters {
            self.out.push('|');
            self.out.push_str(&render_filter(filter));
        }
        self.out.push_str("}}");
    }

    /// Writes a conditional tag, or its source text when a filter in the
    /// condition has no Brevo counterpart.
    fn condition_tag(&mut self, keyword: &str, condition: &Expr, tag: &RawTag) {
        if self.report_filters(condition.filters(), &tag.raw, tag.offset) {
            self.out.push_str(&tag.raw);
            return;
        }
        let condition = self.expr(condition);
        self.out
            .push_str(&format!("{{% {keyword} {condition} %}}"));
    }

    fn if_block(&mut self, block: &IfBlock) {
        self.condition_tag("if", &block.condition, &block.tag);
        self.nodes(&block.then);

        for branch in &block.elseifs {
            self.condition_tag("elif", &branch.condition, &branch.tag);
            self.nodes(&branch.body);
        }

        if let Some(body) = &block.otherwise {
            self.out.push_str("{% else %}");
            self.nodes(body);
        }
        self.out.push_str("{% endif %}");
    }

    fn for_block(&mut self, block: &ForBlock) {
        match &block.source {
            LoopSource::Collection { path, filters } => {
                if self.report_filters(filters, &block.tag.raw, block.tag.offset) {
                    self.out.push_str(&block.tag.raw);
                } else {
                    let mut collection = self.path(path);
                    for filter in filters {
                        collection.push('|');
                        collection.push_str(&render_filter(filter));
                    }
                    self.out
                        .push_str(&format!("{{% for {} in {collection} %}}", block.var));
                }
            }
            LoopSource::Range(_) => self.out.push_str(&block.tag.raw),
        }
        self.nodes(&block.body);
        self.out.push_str("{% endfor %}");
    }

    fn unsupported(&mut self, tag: &Unsupported) {
        if !tag.closing {
            self.diagnostics.push(Diagnostic {
                snippet: tag.raw.clone(),
                message: format!("Tag '{}' is not supported in Brevo", tag.name),
                offset: tag.offset,
            });
        }
        self.out.push_str(&tag.raw);
    }

    fn path(&self, path: &IdentPath) -> String {
        match path.scope {
            Scope::Param => format!("{}.{}", self.namespace, path.dotted()),
            Scope::LoopLocal | Scope::Namespaced => path.dotted(),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Ident(path) => self.path(path),
            Expr::Literal(lit) => literal(lit),
            Expr::Comparison(lhs, op, rhs) => {
                format!("{} {} {}", self.expr(lhs), op.as_str(), self.expr(rhs))
            }
            Expr::Logical(lhs, op, rhs) => {
                let op = match op {
                    LogicOp::And => "and",
                    LogicOp::Or => "or",
                };
                format!("{} {op} {}", self.expr(lhs), self.expr(rhs))
            }
            Expr::Not(inner) => format!("not {}", self.expr(inner)),
            Expr::Group(inner) => format!("({})", self.expr(inner)),
            Expr::Filtered(inner, filters) => {
                let mut rendered = self.expr(inner);
                for filter in filters {
                    rendered.push('|');
                    rendered.push_str(&render_filter(filter));
                }
                rendered
            }
        }
    }
}

fn render_filter(filter: &Filter) -> String {
    let args = filter.args.iter().map(literal);
    match filter.style {
        FilterStyle::Bare => filter.name.clone(),
        FilterStyle::Colon => format!("{}:{}", filter.name, args.collect::<Vec<_>>().join(",")),
        FilterStyle::Call => format!("{}({})", filter.name, args.collect::<Vec<_>>().join(", ")),
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Str(value) => quote(value),
        Literal::Number(text) => text.clone(),
        Literal::Bool(value) => value.to_string(),
    }
}

fn is_empty_str(lit: &Literal) -> bool {
    matches!(lit, Literal::Str(value) if value.is_empty())
}

/// Characters that would turn a preceding backslash into an escape sequence,
/// in decoded form or as written.
const ESCAPE_SENSITIVE: &[char] = &['n', 't', '\\', '"', '\'', '\n', '\t'];

/// Double quotes unless the value itself holds a double quote and can be
/// written with single quotes instead.
///
/// Inverse of the lexer's string decoding: a backslash the lexer kept as is
/// (`C:\dir`) is written back unchanged, so defaults survive byte for byte.
fn quote(value: &str) -> String {
    let delim = if value.contains('"') && !value.contains('\'') {
        '\''
    } else {
        '"'
    };
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push(delim);
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\\' => {
                if chars.peek().map_or(true, |next| ESCAPE_SENSITIVE.contains(next)) {
                    quoted.push('\\');
                }
                quoted.push('\\');
            }
            c if c == delim => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(delim);
    quoted
}
