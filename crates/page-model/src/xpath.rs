//! XPath 1.0 subset evaluator over [`Document`].
//!
//! Supported: absolute and relative location paths, `//`, `.`/`..`, `@attr`,
//! the axes `child`, `descendant`, `descendant-or-self`, `parent`,
//! `ancestor`, `ancestor-or-self`, `following`, `following-sibling`,
//! `preceding-sibling`, `self` and `attribute`, node tests `name`, `*`,
//! `text()` and `node()`, predicates, union, `or`/`and`, comparisons and
//! `+`/`-`, and the string/node-set functions forms are usually matched with
//! (`contains`, `starts-with`, `translate`, `normalize-space`, ...).

use std::collections::{HashMap, HashSet};

use crate::dom::{collapse_whitespace, Document, NodeId, ROOT};
use crate::errors::PageError;

/// Node addressed by an expression: a tree node or an attribute of one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum XNode {
    Node(NodeId),
    Attr(NodeId, String),
}

impl XNode {
    pub fn node_id(&self) -> NodeId {
        match self {
            XNode::Node(id) | XNode::Attr(id, _) => *id,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Nodes(Vec<XNode>),
    Str(String),
    Num(f64),
    Bool(bool),
}

/// Parsed expression, reusable across documents.
#[derive(Clone, Debug)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    pub fn parse(source: &str) -> Result<Self, PageError> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing tokens"));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, doc: &Document, context: NodeId) -> Result<Value, PageError> {
        let eval = Evaluator {
            doc,
            order: doc.order_map(),
            source: &self.source,
        };
        let ctx = Ctx {
            node: XNode::Node(context),
            position: 1,
            size: 1,
        };
        eval.eval(&self.expr, &ctx)
    }

    /// Element results in document order; other result kinds are an error.
    pub fn select_elements(&self, doc: &Document, context: NodeId) -> Result<Vec<NodeId>, PageError> {
        match self.evaluate(doc, context)? {
            Value::Nodes(nodes) => Ok(nodes
                .into_iter()
                .filter_map(|n| match n {
                    XNode::Node(id) if doc.is_element(id) => Some(id),
                    _ => None,
                })
                .collect()),
            _ => Err(PageError::InvalidPath {
                expr: self.source.clone(),
                reason: "expression does not select nodes".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------- lexer

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Dot,
    DotDot,
    Comma,
    Pipe,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    ColonColon,
    Literal(String),
    Number(f64),
    Name(String),
}

fn lex(source: &str) -> Result<Vec<Token>, PageError> {
    let err = |reason: String| PageError::InvalidPath {
        expr: source.to_string(),
        reason,
    };
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            _ if c.is_whitespace() => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Neq);
                i += 2;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::ColonColon);
                i += 2;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DotDot);
                i += 2;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| err(format!("unterminated literal at {i}")))?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| err(format!("bad number '{text}'")))?;
                tokens.push(Token::Number(num));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric()
                        || chars[i] == '_'
                        || chars[i] == '-'
                        || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            other => return Err(err(format!("unexpected character '{other}' at {i}"))),
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------- AST

#[derive(Clone, Debug)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(LocationPath),
    /// Filter expression optionally followed by a relative path.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Call(String, Vec<Expr>),
}

#[derive(Clone, Copy, Debug)]
enum CmpOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Clone, Debug)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Clone, Debug)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Following,
    FollowingSibling,
    PrecedingSibling,
    SelfAxis,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following" => Axis::Following,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "self" => Axis::SelfAxis,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }

    fn is_reverse(&self) -> bool {
        matches!(
            self,
            Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling
        )
    }
}

#[derive(Clone, Debug)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Node,
}

// ---------------------------------------------------------------- parser

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> PageError {
        PageError::InvalidPath {
            expr: self.source.to_string(),
            reason: format!("{reason} (token {})", self.pos),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), PageError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == word)
    }

    fn expr(&mut self) -> Result<Expr, PageError> {
        let mut left = self.and_expr()?;
        while self.is_keyword("or") {
            self.pos += 1;
            left = Expr::Or(Box::new(left), Box::new(self.and_expr()?));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, PageError> {
        let mut left = self.equality()?;
        while self.is_keyword("and") {
            self.pos += 1;
            left = Expr::And(Box::new(left), Box::new(self.equality()?));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, PageError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::Neq) => CmpOp::Neq,
                _ => break,
            };
            self.pos += 1;
            left = Expr::Compare(op, Box::new(left), Box::new(self.relational()?));
        }
        Ok(left)
    }

    fn relational(&mut self) -> Result<Expr, PageError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Le) => CmpOp::Le,
                Some(Token::Ge) => CmpOp::Ge,
                _ => break,
            };
            self.pos += 1;
            left = Expr::Compare(op, Box::new(left), Box::new(self.additive()?));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, PageError> {
        let mut left = self.unary()?;
        loop {
            if self.eat(&Token::Plus) {
                left = Expr::Add(Box::new(left), Box::new(self.unary()?));
            } else if self.eat(&Token::Minus) {
                left = Expr::Sub(Box::new(left), Box::new(self.unary()?));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, PageError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.union()
    }

    fn union(&mut self) -> Result<Expr, PageError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            left = Expr::Union(Box::new(left), Box::new(self.path_expr()?));
        }
        Ok(left)
    }

    fn starts_primary(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_)) | Some(Token::Number(_)) | Some(Token::LParen) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen)
                    && !matches!(name.as_str(), "text" | "node" | "comment")
            }
            _ => false,
        }
    }

    fn path_expr(&mut self) -> Result<Expr, PageError> {
        if !self.starts_primary() {
            return Ok(Expr::Path(self.location_path()?));
        }
        let primary = self.primary()?;
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.predicate()?);
        }
        let mut steps = Vec::new();
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else {
                break;
            }
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary(&mut self) -> Result<Expr, PageError> {
        match self.peek().cloned() {
            Some(Token::Literal(text)) => {
                self.pos += 1;
                Ok(Expr::Literal(text))
            }
            Some(Token::Number(num)) => {
                self.pos += 1;
                Ok(Expr::Number(num))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                self.pos += 2;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen)?;
                        break;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            _ => Err(self.error("expected primary expression")),
        }
    }

    fn location_path(&mut self) -> Result<LocationPath, PageError> {
        let mut steps = Vec::new();
        let absolute;
        if self.eat(&Token::DoubleSlash) {
            absolute = true;
            steps.push(descendant_or_self());
            steps.push(self.step()?);
        } else if self.eat(&Token::Slash) {
            absolute = true;
            if self.starts_step() {
                steps.push(self.step()?);
            } else {
                return Ok(LocationPath { absolute, steps });
            }
        } else {
            absolute = false;
            steps.push(self.step()?);
        }
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else {
                break;
            }
        }
        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_))
                | Some(Token::Star)
                | Some(Token::At)
                | Some(Token::Dot)
                | Some(Token::DotDot)
        )
    }

    fn step(&mut self) -> Result<Step, PageError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if let (Some(Token::Name(name)), Some(Token::ColonColon)) =
            (self.peek(), self.peek_at(1))
        {
            axis = Axis::from_name(name)
                .ok_or_else(|| self.error(&format!("unsupported axis '{name}'")))?;
            self.pos += 2;
        }
        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::Any
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    self.expect(&Token::RParen)?;
                    match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::Node,
                        other => return Err(self.error(&format!("unsupported node test {other}()"))),
                    }
                } else {
                    NodeTest::Name(name.to_ascii_lowercase())
                }
            }
            _ => return Err(self.error("expected node test")),
        };
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicate(&mut self) -> Result<Expr, PageError> {
        self.expect(&Token::LBracket)?;
        let expr = self.expr()?;
        self.expect(&Token::RBracket)?;
        Ok(expr)
    }
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

// ---------------------------------------------------------------- evaluator

struct Ctx {
    node: XNode,
    position: usize,
    size: usize,
}

struct Evaluator<'d> {
    doc: &'d Document,
    order: HashMap<NodeId, usize>,
    source: &'d str,
}

impl<'d> Evaluator<'d> {
    fn error(&self, reason: String) -> PageError {
        PageError::InvalidPath {
            expr: self.source.to_string(),
            reason,
        }
    }

    fn eval(&self, expr: &Expr, ctx: &Ctx) -> Result<Value, PageError> {
        Ok(match expr {
            Expr::Or(a, b) => {
                Value::Bool(self.boolean(&self.eval(a, ctx)?) || self.boolean(&self.eval(b, ctx)?))
            }
            Expr::And(a, b) => {
                Value::Bool(self.boolean(&self.eval(a, ctx)?) && self.boolean(&self.eval(b, ctx)?))
            }
            Expr::Compare(op, a, b) => {
                let left = self.eval(a, ctx)?;
                let right = self.eval(b, ctx)?;
                Value::Bool(self.compare(*op, &left, &right))
            }
            Expr::Add(a, b) => Value::Num(
                self.number(&self.eval(a, ctx)?) + self.number(&self.eval(b, ctx)?),
            ),
            Expr::Sub(a, b) => Value::Num(
                self.number(&self.eval(a, ctx)?) - self.number(&self.eval(b, ctx)?),
            ),
            Expr::Neg(a) => Value::Num(-self.number(&self.eval(a, ctx)?)),
            Expr::Union(a, b) => {
                let mut nodes = self.node_set(self.eval(a, ctx)?)?;
                nodes.extend(self.node_set(self.eval(b, ctx)?)?);
                Value::Nodes(self.sorted_unique(nodes))
            }
            Expr::Path(path) => {
                let start = if path.absolute {
                    XNode::Node(ROOT)
                } else {
                    ctx.node.clone()
                };
                Value::Nodes(self.apply_steps(vec![start], &path.steps)?)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.node_set(self.eval(primary, ctx)?)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Value::Nodes(self.apply_steps(nodes, steps)?)
            }
            Expr::Literal(text) => Value::Str(text.clone()),
            Expr::Number(num) => Value::Num(*num),
            Expr::Call(name, args) => self.call(name, args, ctx)?,
        })
    }

    fn node_set(&self, value: Value) -> Result<Vec<XNode>, PageError> {
        match value {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(self.error("expected a node-set".to_string())),
        }
    }

    fn apply_steps(&self, start: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>, PageError> {
        let mut current = start;
        for step in steps {
            let mut next = Vec::new();
            for node in &current {
                let mut selected: Vec<XNode> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|n| self.test(n, &step.test, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            current = self.sorted_unique(next);
        }
        Ok(current)
    }

    /// Apply a predicate; positions follow the order of `nodes`.
    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>, PageError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (idx, node) in nodes.into_iter().enumerate() {
            let ctx = Ctx {
                node: node.clone(),
                position: idx + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Num(n) => (n - ctx.position as f64).abs() < f64::EPSILON,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis` in axis order (reverse axes nearest first).
    fn axis(&self, node: &XNode, axis: Axis) -> Vec<XNode> {
        let doc = self.doc;
        let wrap = |ids: Vec<NodeId>| ids.into_iter().map(XNode::Node).collect::<Vec<_>>();
        let id = match node {
            XNode::Node(id) => *id,
            XNode::Attr(owner, _) => {
                return match axis {
                    Axis::Parent => vec![XNode::Node(*owner)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(node.clone());
                        }
                        out.push(XNode::Node(*owner));
                        out.extend(wrap(doc.ancestors(*owner)));
                        out
                    }
                    Axis::SelfAxis => vec![node.clone()],
                    _ => Vec::new(),
                };
            }
        };
        match axis {
            Axis::Child => wrap(doc.children(id).to_vec()),
            Axis::Descendant => wrap(doc.descendants(id)),
            Axis::DescendantOrSelf => {
                let mut out = vec![id];
                out.extend(doc.descendants(id));
                wrap(out)
            }
            Axis::Parent => wrap(doc.parent(id).into_iter().collect()),
            Axis::Ancestor => wrap(doc.ancestors(id)),
            Axis::AncestorOrSelf => {
                let mut out = vec![id];
                out.extend(doc.ancestors(id));
                wrap(out)
            }
            Axis::FollowingSibling => wrap(doc.following_siblings(id)),
            Axis::PrecedingSibling => wrap(doc.preceding_siblings(id)),
            Axis::Following => {
                let Some(&pos) = self.order.get(&id) else {
                    return Vec::new();
                };
                let inside: HashSet<NodeId> = doc.descendants(id).into_iter().collect();
                let mut out: Vec<(usize, NodeId)> = self
                    .order
                    .iter()
                    .filter(|(n, p)| **p > pos && !inside.contains(*n))
                    .map(|(n, p)| (*p, *n))
                    .collect();
                out.sort_unstable();
                wrap(out.into_iter().map(|(_, n)| n).collect())
            }
            Axis::SelfAxis => vec![node.clone()],
            Axis::Attribute => doc
                .attrs(id)
                .iter()
                .map(|(name, _)| XNode::Attr(id, name.clone()))
                .collect(),
        }
    }

    fn test(&self, node: &XNode, test: &NodeTest, axis: Axis) -> bool {
        match (node, test) {
            (_, NodeTest::Node) => true,
            (XNode::Attr(_, name), NodeTest::Name(expected)) => {
                axis == Axis::Attribute && name.eq_ignore_ascii_case(expected)
            }
            (XNode::Attr(..), NodeTest::Any) => axis == Axis::Attribute,
            (XNode::Attr(..), NodeTest::Text) => false,
            (XNode::Node(id), NodeTest::Name(expected)) => self
                .doc
                .tag(*id)
                .is_some_and(|tag| tag.eq_ignore_ascii_case(expected)),
            (XNode::Node(id), NodeTest::Any) => self.doc.is_element(*id),
            (XNode::Node(id), NodeTest::Text) => self.doc.text(*id).is_some(),
        }
    }

    fn sort_key(&self, node: &XNode) -> (usize, usize) {
        match node {
            XNode::Node(id) => (self.order.get(id).copied().unwrap_or(usize::MAX), 0),
            XNode::Attr(owner, name) => {
                let idx = self
                    .doc
                    .attrs(*owner)
                    .iter()
                    .position(|(k, _)| k == name)
                    .unwrap_or(0);
                (
                    self.order.get(owner).copied().unwrap_or(usize::MAX),
                    idx + 1,
                )
            }
        }
    }

    fn sorted_unique(&self, nodes: Vec<XNode>) -> Vec<XNode> {
        let mut seen = HashSet::new();
        let mut unique: Vec<XNode> = nodes.into_iter().filter(|n| seen.insert(n.clone())).collect();
        unique.sort_by_key(|n| self.sort_key(n));
        unique
    }

    fn node_string(&self, node: &XNode) -> String {
        match node {
            XNode::Node(id) => self.doc.string_value(*id),
            XNode::Attr(owner, name) => self.doc.attr(*owner, name).unwrap_or_default().to_string(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|n| self.node_string(n))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => self.string(other).trim().parse().unwrap_or(f64::NAN),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn compare(&self, op: CmpOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(a), Value::Nodes(b)) => a.iter().any(|x| {
                let xs = Value::Str(self.node_string(x));
                b.iter()
                    .any(|y| self.compare_atomic(op, &xs, &Value::Str(self.node_string(y))))
            }),
            (Value::Nodes(a), Value::Bool(_)) => {
                self.compare_atomic(op, &Value::Bool(!a.is_empty()), right)
            }
            (Value::Bool(_), Value::Nodes(b)) => {
                self.compare_atomic(op, left, &Value::Bool(!b.is_empty()))
            }
            (Value::Nodes(a), other) => a
                .iter()
                .any(|x| self.compare_atomic(op, &Value::Str(self.node_string(x)), other)),
            (other, Value::Nodes(b)) => b
                .iter()
                .any(|y| self.compare_atomic(op, other, &Value::Str(self.node_string(y)))),
            _ => self.compare_atomic(op, left, right),
        }
    }

    fn compare_atomic(&self, op: CmpOp, left: &Value, right: &Value) -> bool {
        match op {
            CmpOp::Eq | CmpOp::Neq => {
                let equal = match (left, right) {
                    (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                        self.boolean(left) == self.boolean(right)
                    }
                    (Value::Num(_), _) | (_, Value::Num(_)) => {
                        self.number(left) == self.number(right)
                    }
                    _ => self.string(left) == self.string(right),
                };
                if matches!(op, CmpOp::Eq) {
                    equal
                } else {
                    !equal
                }
            }
            CmpOp::Lt => self.number(left) < self.number(right),
            CmpOp::Gt => self.number(left) > self.number(right),
            CmpOp::Le => self.number(left) <= self.number(right),
            CmpOp::Ge => self.number(left) >= self.number(right),
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Ctx) -> Result<Value, PageError> {
        let arity = |min: usize, max: usize| -> Result<(), PageError> {
            if args.len() < min || args.len() > max {
                Err(self.error(format!("{name}() takes {min}..={max} arguments")))
            } else {
                Ok(())
            }
        };
        let string_arg = |idx: usize| -> Result<String, PageError> {
            match args.get(idx) {
                Some(expr) => Ok(self.string(&self.eval(expr, ctx)?)),
                None => Ok(self.node_string(&ctx.node)),
            }
        };
        Ok(match name {
            "contains" => {
                arity(2, 2)?;
                Value::Bool(string_arg(0)?.contains(&string_arg(1)?))
            }
            "starts-with" => {
                arity(2, 2)?;
                Value::Bool(string_arg(0)?.starts_with(&string_arg(1)?))
            }
            "ends-with" => {
                arity(2, 2)?;
                Value::Bool(string_arg(0)?.ends_with(&string_arg(1)?))
            }
            "translate" => {
                arity(3, 3)?;
                let source = string_arg(0)?;
                let from: Vec<char> = string_arg(1)?.chars().collect();
                let to: Vec<char> = string_arg(2)?.chars().collect();
                Value::Str(
                    source
                        .chars()
                        .filter_map(|c| match from.iter().position(|f| *f == c) {
                            Some(idx) => to.get(idx).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "normalize-space" => {
                arity(0, 1)?;
                Value::Str(collapse_whitespace(&string_arg(0)?))
            }
            "string" => {
                arity(0, 1)?;
                Value::Str(string_arg(0)?)
            }
            "lower-case" => {
                arity(1, 1)?;
                Value::Str(string_arg(0)?.to_lowercase())
            }
            "string-length" => {
                arity(0, 1)?;
                Value::Num(string_arg(0)?.chars().count() as f64)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(self.error("concat() takes at least 2 arguments".to_string()));
                }
                let mut out = String::new();
                for idx in 0..args.len() {
                    out.push_str(&string_arg(idx)?);
                }
                Value::Str(out)
            }
            "not" => {
                arity(1, 1)?;
                Value::Bool(!self.boolean(&self.eval(&args[0], ctx)?))
            }
            "boolean" => {
                arity(1, 1)?;
                Value::Bool(self.boolean(&self.eval(&args[0], ctx)?))
            }
            "number" => {
                arity(0, 1)?;
                Value::Num(self.number(&Value::Str(string_arg(0)?)))
            }
            "true" => {
                arity(0, 0)?;
                Value::Bool(true)
            }
            "false" => {
                arity(0, 0)?;
                Value::Bool(false)
            }
            "position" => {
                arity(0, 0)?;
                Value::Num(ctx.position as f64)
            }
            "last" => {
                arity(0, 0)?;
                Value::Num(ctx.size as f64)
            }
            "count" => {
                arity(1, 1)?;
                Value::Num(self.node_set(self.eval(&args[0], ctx)?)?.len() as f64)
            }
            "name" | "local-name" => {
                arity(0, 1)?;
                let node = match args.first() {
                    Some(expr) => self.node_set(self.eval(expr, ctx)?)?.into_iter().next(),
                    None => Some(ctx.node.clone()),
                };
                Value::Str(match node {
                    Some(XNode::Node(id)) => self.doc.tag(id).unwrap_or_default().to_string(),
                    Some(XNode::Attr(_, name)) => name,
                    None => String::new(),
                })
            }
            other => return Err(self.error(format!("unsupported function {other}()"))),
        })
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_document;

    fn doc() -> Document {
        parse_document(
            r#"<form id="app">
                 <div class="field"><label for="e">Email Address</label>
                   <input id="e" name="candidate_email" type="email"></div>
                 <div class="field"><span>Phone</span><input id="p" name="Phone_Number"></div>
                 <button type="submit">Submit Application</button>
               </form>"#,
        )
        .unwrap()
    }

    fn select_ids(doc: &Document, expr: &str) -> Vec<String> {
        XPath::parse(expr)
            .unwrap()
            .select_elements(doc, ROOT)
            .unwrap()
            .into_iter()
            .map(|n| doc.attr(n, "id").unwrap_or("?").to_string())
            .collect()
    }

    #[test]
    fn case_insensitive_translate_pattern() {
        let doc = doc();
        let expr = "//input[contains(translate(@name,'ABCDEFGHIJKLMNOPQRSTUVWXYZ','abcdefghijklmnopqrstuvwxyz'),'phone')]";
        assert_eq!(select_ids(&doc, expr), vec!["p"]);
    }

    #[test]
    fn label_following_and_sibling_axes() {
        let doc = doc();
        assert_eq!(
            select_ids(&doc, "//label[contains(., 'Email')]/following::input[1]"),
            vec!["e"]
        );
        assert_eq!(
            select_ids(&doc, "//span[normalize-space()='Phone']/following-sibling::input"),
            vec!["p"]
        );
        assert_eq!(
            select_ids(&doc, "//input[@id='p']/ancestor::form"),
            vec!["app"]
        );
    }

    #[test]
    fn union_keeps_document_order() {
        let doc = doc();
        assert_eq!(select_ids(&doc, "//input[@id='p'] | //input[@id='e']"), vec!["e", "p"]);
        assert_eq!(select_ids(&doc, "(//input)[last()]"), vec!["p"]);
        assert_eq!(select_ids(&doc, "//div[2]/input"), vec!["p"]);
    }

    #[test]
    fn scalar_results() {
        let doc = doc();
        let count = XPath::parse("count(//input) + 1").unwrap().evaluate(&doc, ROOT).unwrap();
        assert!(matches!(count, Value::Num(n) if n == 3.0));
        let button = XPath::parse("//button[starts-with(normalize-space(.), 'Submit')]")
            .unwrap()
            .select_elements(&doc, ROOT)
            .unwrap();
        assert_eq!(button.len(), 1);
        assert!(XPath::parse("count(//input)")
            .unwrap()
            .select_elements(&doc, ROOT)
            .is_err());
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(XPath::parse("//input[").is_err());
        assert!(XPath::parse("namespace::x").is_err());
        assert!(XPath::parse("//input[foo()]").is_ok());
        assert!(XPath::parse("//input[foo()]")
            .unwrap()
            .evaluate(&doc(), ROOT)
            .is_err());
    }
}
