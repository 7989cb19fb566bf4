pub use crate::lexer::CmpOp;

/// How an identifier path is rendered in Brevo output. Decided by the
/// parser from the loops enclosing the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// A template parameter; gets the namespace prefix.
    Param,
    /// Bound by an enclosing `for`, including its `loop` helper.
    LoopLocal,
    /// Already written as `<namespace>.name`.
    Namespaced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentPath {
    pub segments: Vec<String>, // first segment is the base
    pub scope: Scope,
}

impl IdentPath {
    pub fn base(&self) -> &str {
        &self.segments[0]
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(String), // source text, e.g. "-1" or "10.5"
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(IdentPath),
    Literal(Literal),
    Comparison(Box<Expr>, CmpOp, Box<Expr>),
    Logical(Box<Expr>, LogicOp, Box<Expr>),
    Not(Box<Expr>),
    Group(Box<Expr>), // ( expr )
    Filtered(Box<Expr>, Vec<Filter>),
}

impl Expr {
    /// Every filter applied anywhere in this expression, outermost first.
    pub fn filters(&self) -> Vec<&Filter> {
        let mut found = Vec::new();
        self.collect_filters(&mut found);
        found
    }

    fn collect_filters<'e>(&'e self, found: &mut Vec<&'e Filter>) {
        match self {
            Expr::Ident(_) | Expr::Literal(_) => {}
            Expr::Comparison(lhs, _, rhs) | Expr::Logical(lhs, _, rhs) => {
                lhs.collect_filters(found);
                rhs.collect_filters(found);
            }
            Expr::Not(inner) | Expr::Group(inner) => inner.collect_filters(found),
            Expr::Filtered(inner, filters) => {
                inner.collect_filters(found);
                found.extend(filters);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStyle {
    Bare,  // |upper
    Colon, // |default:"x"
    Call,  // |date("Y")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub args: Vec<Literal>,
    pub style: FilterStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub path: IdentPath,
    pub default: Option<Literal>,
    pub filters: Vec<Filter>,
    pub prefixed: bool, // written as `var:name`
    pub raw: String,
    pub offset: usize,
}

/// The source text of a block's opening or intermediate tag, kept so the
/// tag can be passed through when its contents cannot be translated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    pub raw: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub condition: Expr,
    pub body: Vec<Node>,
    pub tag: RawTag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub condition: Expr,
    pub tag: RawTag,
    pub then: Vec<Node>,
    pub elseifs: Vec<ElseIf>,
    pub otherwise: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeArg {
    Literal(Literal),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopSource {
    Collection { path: IdentPath, filters: Vec<Filter> },
    Range(Vec<RangeArg>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForBlock {
    pub var: String,
    pub source: LoopSource,
    pub tag: RawTag, // the opening `{% for ... %}` as written
    pub body: Vec<Node>,
}

/// A directive from the fixed set Brevo cannot express.
#[derive(Debug, Clone, PartialEq)]
pub struct Unsupported {
    pub name: String,
    pub raw: String,
    pub offset: usize,
    /// `{% endblock %}` and friends. Passed through without a diagnostic of
    /// their own since the opening tag already reported the construct.
    pub closing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Comment(String), // includes the `{#` `#}` delimiters
    Variable(Variable),
    If(IfBlock),
    For(ForBlock),
    Unsupported(Unsupported),
}

pub type Template = Vec<Node>;

/// Tags recognized only so they can be reported.
pub const UNSUPPORTED_TAGS: &[&str] = &[
    "set",
    "include",
    "extends",
    "block",
    "macro",
    "import",
    "from",
    "autoescape",
    "spaceless",
];

/// Filters with no Brevo counterpart.
pub const UNSUPPORTED_FILTERS: &[&str] = &["date_modify", "trans", "raw", "batch"];

/// Name bound implicitly inside every loop body (`loop.index`, `loop.last`).
pub const LOOP_HELPER: &str = "loop";
