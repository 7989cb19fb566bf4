use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

/// Recursive-descent parser over a token stream.
///
/// Alongside the tree it tracks which loop variables are in scope, so every
/// identifier path leaves the parser already tagged with its [`Scope`].
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    namespace: &'a str,
    loop_vars: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Elseif,  // {% elseif %} / {% elif %}
    ElseIf,  // {% else if %}
    Else,
    EndIf,
    Other,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token<'a>>, namespace: &'a str) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            namespace,
            loop_vars: Vec::new(),
        }
    }

    fn peek(&self, n: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + n)
    }

    fn peek_kind(&self, n: usize) -> Option<&TokenKind> {
        self.peek(n).map(|t| &t.kind)
    }

    fn consume(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: impl Into<String>) -> ParseError {
        match self.peek(0) {
            Some(token) => ParseError {
                offset: token.offset,
                expected: expected.into(),
                found: describe(token),
            },
            None => self.eof_error(expected),
        }
    }

    fn eof_error(&self, expected: impl Into<String>) -> ParseError {
        ParseError {
            offset: self.source.len(),
            expected: expected.into(),
            found: "end of input".to_string(),
        }
    }

    /// Error for a `{% ... %}` tag that is not the one expected: reported at
    /// the tag opener, naming the keyword inside it.
    fn tag_error(&self, expected: impl Into<String>) -> ParseError {
        match (self.peek(0), self.peek(1)) {
            (Some(open), Some(keyword)) if open.kind == TokenKind::TagOpen => ParseError {
                offset: open.offset,
                expected: expected.into(),
                found: describe(keyword),
            },
            _ => self.error(expected),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token<'a>, ParseError> {
        match self.tokens.get(self.pos) {
            Some(token) if token.kind == kind => {
                let token = token.clone();
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.source[start..end].to_string()
    }

    pub fn parse(&mut self) -> Result<Template, ParseError> {
        let nodes = self.parse_elements()?;

        // parse_elements only stops early at a block terminator.
        if self.peek(0).is_some() {
            let expected = match self.peek_kind(1) {
                Some(TokenKind::EndFor) => "an enclosing `{% for %}` block",
                _ => "an enclosing `{% if %}` block",
            };
            return Err(self.tag_error(expected));
        }
        Ok(nodes)
    }

    fn parse_elements(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            let kind = match self.peek_kind(0) {
                Some(kind) => kind.clone(),
                None => break,
            };

            match kind {
                TokenKind::Text => {
                    if let Some(token) = self.consume() {
                        nodes.push(Node::Text(token.text.to_string()));
                    }
                }
                TokenKind::CommentOpen => nodes.push(self.parse_comment()?),
                TokenKind::VarOpen => nodes.push(Node::Variable(self.parse_variable()?)),
                TokenKind::TagOpen => match self.peek_kind(1) {
                    Some(TokenKind::If) => nodes.push(Node::If(self.parse_if()?)),
                    Some(TokenKind::For) => nodes.push(Node::For(self.parse_for()?)),
                    // Terminators belong to the enclosing block.
                    Some(
                        TokenKind::Elseif | TokenKind::Else | TokenKind::EndIf | TokenKind::EndFor,
                    ) => break,
                    Some(TokenKind::Ident) => {
                        nodes.push(Node::Unsupported(self.parse_unsupported()?))
                    }
                    _ => {
                        self.pos += 1;
                        return Err(self.error("a tag name"));
                    }
                },
                _ => return Err(self.error("text or a directive")),
            }
        }
        Ok(nodes)
    }

    fn parse_comment(&mut self) -> Result<Node, ParseError> {
        let open = self.expect(TokenKind::CommentOpen, "`{#`")?;
        if self.peek_kind(0) == Some(&TokenKind::Text) {
            self.pos += 1;
        }
        let close = self.expect(TokenKind::CommentClose, "`#}`")?;
        Ok(Node::Comment(self.slice(open.offset, close.end())))
    }

    fn parse_unsupported(&mut self) -> Result<Unsupported, ParseError> {
        let open = self.expect(TokenKind::TagOpen, "`{%`")?;
        let name_token = self.expect(TokenKind::Ident, "a tag name")?;
        let name = name_token.text;

        let (name, closing) = if UNSUPPORTED_TAGS.contains(&name) {
            (name, false)
        } else if let Some(base) = name
            .strip_prefix("end")
            .filter(|base| UNSUPPORTED_TAGS.contains(base))
        {
            (base, true)
        } else {
            return Err(ParseError {
                offset: name_token.offset,
                expected: "`if`, `for` or a closing tag".to_string(),
                found: describe(&name_token),
            });
        };

        // The arguments are kept verbatim, so they are skipped, not parsed.
        while !matches!(self.peek_kind(0), Some(TokenKind::TagClose) | None) {
            self.pos += 1;
        }
        let close = self.expect(TokenKind::TagClose, "`%}`")?;

        Ok(Unsupported {
            name: name.to_string(),
            raw: self.slice(open.offset, close.end()),
            offset: open.offset,
            closing,
        })
    }

    fn parse_variable(&mut self) -> Result<Variable, ParseError> {
        let open = self.expect(TokenKind::VarOpen, "`{{`")?;
        let (path, prefixed) = self.ident_path("a variable name")?;

        let default = if self.peek_kind(0) == Some(&TokenKind::Colon) {
            self.pos += 1;
            match self.peek_kind(0) {
                Some(TokenKind::Str(value)) => {
                    let value = value.clone();
                    self.pos += 1;
                    Some(Literal::Str(value))
                }
                _ => return Err(self.error("a quoted default value")),
            }
        } else {
            None
        };

        let filters = self.parse_filters()?;

        let close = self.expect(TokenKind::VarClose, "`}}`")?;
        Ok(Variable {
            path,
            default,
            filters,
            prefixed,
            raw: self.slice(open.offset, close.end()),
            offset: open.offset,
        })
    }

    fn parse_filters(&mut self) -> Result<Vec<Filter>, ParseError> {
        let mut filters = Vec::new();
        while self.peek_kind(0) == Some(&TokenKind::Pipe) {
            self.pos += 1;
            filters.push(self.parse_filter()?);
        }
        Ok(filters)
    }

    fn parse_filter(&mut self) -> Result<Filter, ParseError> {
        let name = self.expect(TokenKind::Ident, "a filter name")?.text.to_string();
        let mut args = Vec::new();

        let style = match self.peek_kind(0) {
            Some(TokenKind::Colon) => {
                self.pos += 1;
                args.push(self.parse_literal()?);
                while self.peek_kind(0) == Some(&TokenKind::Comma) {
                    self.pos += 1;
                    args.push(self.parse_literal()?);
                }
                FilterStyle::Colon
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                if self.peek_kind(0) != Some(&TokenKind::RParen) {
                    args.push(self.parse_literal()?);
                    while self.peek_kind(0) == Some(&TokenKind::Comma) {
                        self.pos += 1;
                        args.push(self.parse_literal()?);
                    }
                }
                self.expect(TokenKind::RParen, "`)`")?;
                FilterStyle::Call
            }
            _ => FilterStyle::Bare,
        };

        Ok(Filter { name, args, style })
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let literal = match (self.peek_kind(0), self.peek_kind(1)) {
            (Some(TokenKind::Str(value)), _) => Literal::Str(value.clone()),
            (Some(TokenKind::Number), _) => {
                Literal::Number(self.peek(0).map_or(String::new(), |t| t.text.to_string()))
            }
            (Some(TokenKind::True), _) => Literal::Bool(true),
            (Some(TokenKind::False), _) => Literal::Bool(false),
            (Some(TokenKind::Minus), Some(TokenKind::Number)) => {
                let digits = self.peek(1).map_or("", |t| t.text);
                let literal = Literal::Number(format!("-{digits}"));
                self.pos += 2;
                return Ok(literal);
            }
            _ => return Err(self.error("a literal")),
        };
        self.pos += 1;
        Ok(literal)
    }

    /// Consumes a `var:` marker if one precedes an identifier.
    fn var_prefix(&mut self) -> bool {
        let marked = matches!(self.peek(0), Some(t) if t.kind == TokenKind::Ident && t.text == "var")
            && self.peek_kind(1) == Some(&TokenKind::Colon)
            && self.peek(2).is_some_and(is_word);
        if marked {
            self.pos += 2;
        }
        marked
    }

    fn ident_path(&mut self, expected: &str) -> Result<(IdentPath, bool), ParseError> {
        let prefixed = self.var_prefix();
        let base = self.expect(TokenKind::Ident, expected)?;
        let mut segments = vec![base.text.to_string()];

        while self.peek_kind(0) == Some(&TokenKind::Dot) {
            match self.peek(1) {
                Some(token) if is_word(token) || token.kind == TokenKind::Number => {
                    segments.push(token.text.to_string());
                    self.pos += 2;
                }
                _ => {
                    self.pos += 1;
                    return Err(self.error("a property name after `.`"));
                }
            }
        }

        Ok((self.resolve(segments), prefixed))
    }

    fn resolve(&self, segments: Vec<String>) -> IdentPath {
        let base = segments[0].as_str();
        let in_loop = !self.loop_vars.is_empty();
        let scope = if self.loop_vars.iter().any(|v| v == base) || (in_loop && base == LOOP_HELPER)
        {
            Scope::LoopLocal
        } else if base == self.namespace {
            Scope::Namespaced
        } else {
            Scope::Param
        };
        IdentPath { segments, scope }
    }

    fn clause(&self) -> Clause {
        if self.peek_kind(0) != Some(&TokenKind::TagOpen) {
            return Clause::Other;
        }
        match (self.peek_kind(1), self.peek_kind(2)) {
            (Some(TokenKind::Elseif), _) => Clause::Elseif,
            (Some(TokenKind::Else), Some(TokenKind::If)) => Clause::ElseIf,
            (Some(TokenKind::Else), _) => Clause::Else,
            (Some(TokenKind::EndIf), _) => Clause::EndIf,
            _ => Clause::Other,
        }
    }

    fn raw_tag(&self, open: &Token, close: &Token) -> RawTag {
        RawTag {
            raw: self.slice(open.offset, close.end()),
            offset: open.offset,
        }
    }

    fn parse_if(&mut self) -> Result<IfBlock, ParseError> {
        let open = self.expect(TokenKind::TagOpen, "`{%`")?;
        self.expect(TokenKind::If, "`if`")?;
        let condition = self.parse_condition()?;
        let close = self.expect(TokenKind::TagClose, "`%}`")?;
        let tag = self.raw_tag(&open, &close);

        let then = self.parse_elements()?;
        let mut elseifs = Vec::new();
        let mut otherwise = None;

        loop {
            match self.clause() {
                Clause::Elseif | Clause::ElseIf if otherwise.is_some() => {
                    return Err(self.tag_error("`{% endif %}` after `{% else %}`"));
                }
                Clause::Else if otherwise.is_some() => {
                    return Err(self.tag_error("`{% endif %}` after `{% else %}`"));
                }
                clause @ (Clause::Elseif | Clause::ElseIf) => {
                    let open = self.peek(0).cloned();
                    self.pos += if clause == Clause::ElseIf { 3 } else { 2 };
                    let condition = self.parse_condition()?;
                    let close = self.expect(TokenKind::TagClose, "`%}`")?;
                    let tag = match &open {
                        Some(open) => self.raw_tag(open, &close),
                        None => return Err(self.eof_error("`{% elseif %}`")),
                    };
                    let body = self.parse_elements()?;
                    elseifs.push(ElseIf {
                        condition,
                        body,
                        tag,
                    });
                }
                Clause::Else => {
                    self.pos += 2;
                    self.expect(TokenKind::TagClose, "`%}`")?;
                    otherwise = Some(self.parse_elements()?);
                }
                Clause::EndIf => {
                    self.pos += 2;
                    self.expect(TokenKind::TagClose, "`%}`")?;
                    break;
                }
                Clause::Other => {
                    return Err(match self.peek(0) {
                        None => self.eof_error("`{% endif %}`"),
                        Some(_) => self.tag_error("`{% elseif %}`, `{% else %}` or `{% endif %}`"),
                    });
                }
            }
        }

        Ok(IfBlock {
            condition,
            tag,
            then,
            elseifs,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> Result<ForBlock, ParseError> {
        let open = self.expect(TokenKind::TagOpen, "`{%`")?;
        self.expect(TokenKind::For, "`for`")?;
        let var = self.expect(TokenKind::Ident, "a loop variable")?.text.to_string();
        self.expect(TokenKind::In, "`in`")?;

        let source = if self.peek_kind(0) == Some(&TokenKind::Range) {
            self.pos += 1;
            self.expect(TokenKind::LParen, "`(` after `range`")?;
            let args = self.parse_range_args()?;
            self.expect(TokenKind::RParen, "`)`")?;
            LoopSource::Range(args)
        } else {
            // Resolved before `var` is bound: `{% for items in items %}`
            // iterates the parameter.
            let (path, _) = self.ident_path("a collection name or `range(...)`")?;
            let filters = self.parse_filters()?;
            LoopSource::Collection { path, filters }
        };
        let close = self.expect(TokenKind::TagClose, "`%}`")?;
        let tag = self.raw_tag(&open, &close);

        self.loop_vars.push(var.clone());
        let body = self.parse_elements();
        self.loop_vars.pop();
        let body = body?;

        match (self.peek_kind(0), self.peek_kind(1)) {
            (Some(TokenKind::TagOpen), Some(TokenKind::EndFor)) => {
                self.pos += 2;
                self.expect(TokenKind::TagClose, "`%}`")?;
            }
            (None, _) => return Err(self.eof_error("`{% endfor %}`")),
            _ => return Err(self.tag_error("`{% endfor %}`")),
        }

        Ok(ForBlock {
            var,
            source,
            tag,
            body,
        })
    }

    fn parse_range_args(&mut self) -> Result<Vec<RangeArg>, ParseError> {
        const EXPECTED: &str = "1 to 3 range arguments";
        let start = self.peek(0).map_or(self.source.len(), |t| t.offset);

        if self.peek_kind(0) == Some(&TokenKind::RParen) {
            return Err(self.error(EXPECTED));
        }

        let mut args = Vec::new();
        loop {
            // Bounds are never qualified, so the path's scope is irrelevant.
            let arg = if self.peek_kind(0) == Some(&TokenKind::Ident) {
                RangeArg::Ident(self.ident_path("a range bound")?.0.dotted())
            } else {
                RangeArg::Literal(self.parse_literal()?)
            };
            args.push(arg);

            if self.peek_kind(0) != Some(&TokenKind::Comma) {
                break;
            }
            self.pos += 1;
        }

        if args.len() > 3 {
            return Err(ParseError {
                offset: start,
                expected: EXPECTED.to_string(),
                found: format!("{} arguments", args.len()),
            });
        }
        Ok(args)
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.peek_kind(0) == Some(&TokenKind::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Logical(Box::new(lhs), LogicOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.peek_kind(0) == Some(&TokenKind::And) {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::Logical(Box::new(lhs), LogicOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.peek_kind(0) == Some(&TokenKind::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_value()?;
        if let Some(TokenKind::Cmp(op)) = self.peek_kind(0) {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_value()?;
            return Ok(Expr::Comparison(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_value(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind(0) {
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let inner = self.parse_condition()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr::Group(Box::new(inner)))
            }
            Some(TokenKind::Ident) => {
                let operand = Expr::Ident(self.ident_path("an operand")?.0);
                let filters = self.parse_filters()?;
                if filters.is_empty() {
                    Ok(operand)
                } else {
                    Ok(Expr::Filtered(Box::new(operand), filters))
                }
            }
            Some(
                TokenKind::Str(_)
                | TokenKind::Number
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Minus,
            ) => Ok(Expr::Literal(self.parse_literal()?)),
            _ => Err(self.error("an operand")),
        }
    }
}

fn is_word(token: &Token) -> bool {
    token
        .text
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Text => "text".to_string(),
        TokenKind::Str(_) => format!("string literal {}", token.text),
        _ => format!("`{}`", token.text),
    }
}

/// Parse a token stream into a template, resolving identifier scopes
/// against `namespace`.
pub fn parse<'a>(
    source: &'a str,
    tokens: Vec<Token<'a>>,
    namespace: &'a str,
) -> Result<Template, ParseError> {
    Parser::new(source, tokens, namespace).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_str(source: &str) -> Result<Template, ParseError> {
        parse(source, tokenize(source).unwrap(), "params")
    }

    fn path(segments: &[&str], scope: Scope) -> IdentPath {
        IdentPath {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            scope,
        }
    }

    #[test]
    fn variable_with_prefix_default_and_filters() {
        let template = parse_str("{{var:user.name:\"Ann\"|upper|truncate(10)}}").unwrap();
        let Node::Variable(var) = &template[0] else {
            panic!("expected variable, got {:?}", template[0]);
        };
        assert!(var.prefixed);
        assert_eq!(var.path, path(&["user", "name"], Scope::Param));
        assert_eq!(var.default, Some(Literal::Str("Ann".into())));
        assert_eq!(var.filters.len(), 2);
        assert_eq!(var.filters[1].name, "truncate");
        assert_eq!(var.filters[1].style, FilterStyle::Call);
        assert_eq!(var.filters[1].args, vec![Literal::Number("10".into())]);
    }

    #[test]
    fn variable_named_var_is_not_a_prefix() {
        let template = parse_str("{{ var }}").unwrap();
        let Node::Variable(var) = &template[0] else {
            panic!("expected variable");
        };
        assert!(!var.prefixed);
        assert_eq!(var.path.base(), "var");
    }

    #[test]
    fn if_with_elseif_chain_and_else() {
        let source = "{% if a %}1{% elseif b %}2{% else if c %}3{% elif d %}4{% else %}5{% endif %}";
        let template = parse_str(source).unwrap();
        let Node::If(block) = &template[0] else {
            panic!("expected if");
        };
        assert_eq!(block.elseifs.len(), 3);
        assert_eq!(block.tag.raw, "{% if a %}");
        assert_eq!(block.elseifs[1].tag.raw, "{% else if c %}");
        assert_eq!(block.elseifs[1].tag.offset, 26);
        assert_eq!(block.otherwise, Some(vec![Node::Text("5".into())]));
    }

    #[test]
    fn loop_variables_are_scoped_to_the_body() {
        let source = "{% for item in items %}{{ item.name }}{% endfor %}{{ item }}";
        let template = parse_str(source).unwrap();
        let Node::For(block) = &template[0] else {
            panic!("expected for");
        };
        assert_eq!(
            block.source,
            LoopSource::Collection {
                path: path(&["items"], Scope::Param),
                filters: Vec::new(),
            }
        );
        assert_eq!(block.tag.raw, "{% for item in items %}");
        let Node::Variable(inner) = &block.body[0] else {
            panic!("expected variable");
        };
        assert_eq!(inner.path.scope, Scope::LoopLocal);
        let Node::Variable(outer) = &template[1] else {
            panic!("expected variable");
        };
        assert_eq!(outer.path.scope, Scope::Param);
    }

    #[test]
    fn nested_loops_see_outer_variables() {
        let source = "{% for row in rows %}{% for cell in row.cells %}{% if row.id == cell.id %}x{% endif %}{% endfor %}{% endfor %}";
        let template = parse_str(source).unwrap();
        let Node::For(outer) = &template[0] else {
            panic!("expected for");
        };
        let Node::For(inner) = &outer.body[0] else {
            panic!("expected nested for");
        };
        assert_eq!(
            inner.source,
            LoopSource::Collection {
                path: path(&["row", "cells"], Scope::LoopLocal),
                filters: Vec::new(),
            }
        );
        let Node::If(block) = &inner.body[0] else {
            panic!("expected if");
        };
        assert_eq!(
            block.condition,
            Expr::Comparison(
                Box::new(Expr::Ident(path(&["row", "id"], Scope::LoopLocal))),
                CmpOp::Eq,
                Box::new(Expr::Ident(path(&["cell", "id"], Scope::LoopLocal))),
            )
        );
    }

    #[test]
    fn loop_helper_is_local_only_inside_loops() {
        let template = parse_str("{{ loop.index }}").unwrap();
        let Node::Variable(var) = &template[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.path.scope, Scope::Param);

        let template = parse_str("{% for x in xs %}{{ loop.index }}{% endfor %}").unwrap();
        let Node::For(block) = &template[0] else {
            panic!("expected for");
        };
        let Node::Variable(var) = &block.body[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.path.scope, Scope::LoopLocal);
    }

    #[test]
    fn namespaced_paths_are_detected() {
        let template = parse_str("{% if params.plan == \"pro\" %}{% endif %}").unwrap();
        let Node::If(block) = &template[0] else {
            panic!("expected if");
        };
        let Expr::Comparison(lhs, _, _) = &block.condition else {
            panic!("expected comparison");
        };
        assert_eq!(**lhs, Expr::Ident(path(&["params", "plan"], Scope::Namespaced)));
    }

    #[test]
    fn range_loops_keep_their_tag() {
        let template = parse_str("{% for n in range(10, 0, -2) %}{{ n }}{% endfor %}").unwrap();
        let Node::For(block) = &template[0] else {
            panic!("expected for");
        };
        let LoopSource::Range(args) = &block.source else {
            panic!("expected range");
        };
        assert_eq!(block.tag.raw, "{% for n in range(10, 0, -2) %}");
        assert_eq!(
            args,
            &vec![
                RangeArg::Literal(Literal::Number("10".into())),
                RangeArg::Literal(Literal::Number("0".into())),
                RangeArg::Literal(Literal::Number("-2".into())),
            ]
        );
    }

    #[test]
    fn range_argument_count_is_checked() {
        let err = parse_str("{% for n in range() %}{% endfor %}").unwrap_err();
        assert_eq!(err.expected, "1 to 3 range arguments");

        let err = parse_str("{% for n in range(1, 2, 3, 4) %}{% endfor %}").unwrap_err();
        assert_eq!(err.found, "4 arguments");
        assert_eq!(err.offset, 18);

        assert!(parse_str("{% for n in range(1, ) %}{% endfor %}").is_err());
        assert!(parse_str("{% for n in range(count) %}{% endfor %}").is_ok());
    }

    #[test]
    fn logical_operators_and_groups() {
        let template = parse_str("{% if not (a or b) and c > 1 %}{% endif %}").unwrap();
        let Node::If(block) = &template[0] else {
            panic!("expected if");
        };
        assert!(matches!(
            &block.condition,
            Expr::Logical(lhs, LogicOp::And, _) if matches!(**lhs, Expr::Not(_))
        ));
    }

    #[test]
    fn unsupported_tags_are_kept_verbatim() {
        let template =
            parse_str("{% block body %}hi{% endblock %}{% set x = [1, 2] %}").unwrap();
        assert_eq!(template.len(), 4);
        let Node::Unsupported(block) = &template[0] else {
            panic!("expected unsupported");
        };
        assert_eq!(block.name, "block");
        assert!(!block.closing);
        let Node::Unsupported(end) = &template[2] else {
            panic!("expected unsupported");
        };
        assert!(end.closing);
        let Node::Unsupported(set) = &template[3] else {
            panic!("expected unsupported");
        };
        assert_eq!(set.raw, "{% set x = [1, 2] %}");
        assert_eq!(set.offset, 32);
    }

    #[test]
    fn loop_collections_take_filters() {
        let template =
            parse_str("{% for row in items|batch(3) %}{{ row }}{% endfor %}").unwrap();
        let Node::For(block) = &template[0] else {
            panic!("expected for");
        };
        let LoopSource::Collection { path: items, filters } = &block.source else {
            panic!("expected collection");
        };
        assert_eq!(items, &path(&["items"], Scope::Param));
        assert_eq!(filters[0].name, "batch");
        assert_eq!(filters[0].args, vec![Literal::Number("3".into())]);
        assert_eq!(block.tag.raw, "{% for row in items|batch(3) %}");
    }

    #[test]
    fn condition_operands_take_filters() {
        let template =
            parse_str("{% if d|date_modify(\"+1 day\") > now and name|length %}{% endif %}")
                .unwrap();
        let Node::If(block) = &template[0] else {
            panic!("expected if");
        };
        let names: Vec<_> = block
            .condition
            .filters()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["date_modify", "length"]);
    }

    #[test]
    fn numeric_path_segments() {
        let template = parse_str("{{ items.0.name }}{{ items.1.5 }}").unwrap();
        let Node::Variable(first) = &template[0] else {
            panic!("expected variable");
        };
        assert_eq!(first.path, path(&["items", "0", "name"], Scope::Param));
        let Node::Variable(second) = &template[1] else {
            panic!("expected variable");
        };
        assert_eq!(second.path, path(&["items", "1", "5"], Scope::Param));
    }

    #[test]
    fn comments_are_kept() {
        let template = parse_str("a{# note #}b").unwrap();
        assert_eq!(template[1], Node::Comment("{# note #}".into()));
    }

    #[test]
    fn unmatched_terminators_fail() {
        let err = parse_str("text {% endif %}").unwrap_err();
        assert_eq!(err.offset, 5);
        assert_eq!(err.found, "`endif`");

        let err = parse_str("{% endfor %}").unwrap_err();
        assert!(err.expected.contains("for"));

        assert!(parse_str("{% else %}").is_err());
        assert!(parse_str("{% elseif x %}").is_err());
    }

    #[test]
    fn unclosed_blocks_fail() {
        let err = parse_str("{% if a %}never closed").unwrap_err();
        assert_eq!(err.found, "end of input");
        assert_eq!(err.expected, "`{% endif %}`");

        let err = parse_str("{% for a in b %}{% endif %}").unwrap_err();
        assert_eq!(err.expected, "`{% endfor %}`");
        assert_eq!(err.found, "`endif`");
    }

    #[test]
    fn else_must_be_last() {
        let err = parse_str("{% if a %}{% else %}{% elseif b %}{% endif %}").unwrap_err();
        assert_eq!(err.offset, 20);
        assert!(parse_str("{% if a %}{% else %}{% else %}{% endif %}").is_err());
    }

    #[test]
    fn dangling_operator_fails() {
        let err = parse_str("{% if a == %}{% endif %}").unwrap_err();
        assert_eq!(err.expected, "an operand");
        assert_eq!(err.found, "`%}`");
        assert!(parse_str("{% if >= 3 %}{% endif %}").is_err());
    }

    #[test]
    fn unknown_tags_fail() {
        let err = parse_str("{% cycle a b %}").unwrap_err();
        assert_eq!(err.found, "`cycle`");
        assert!(parse_str("{% endcycle %}").is_err());
    }
}
