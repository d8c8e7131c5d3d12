//! CSS selector subset.
//!
//! Selector lists of compound selectors joined by descendant, child (`>`),
//! adjacent (`+`) and general sibling (`~`) combinators. Compounds support
//! type, `#id`, `.class`, `[attr]`, `[attr op "v" i]` with the operators
//! `= ~= |= ^= $= *=`, plus `:not(..)`, `:checked`, `:disabled`,
//! `:first-child`.

use crate::dom::{Document, NodeId};
use crate::errors::PageError;

/// Element state the document attributes cannot express.
pub trait ElementStates {
    fn is_checked(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_attr(node, "checked")
    }
}

/// Attribute-only view of element state.
pub struct AttributeStates;

impl ElementStates for AttributeStates {}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectorList(Vec<Complex>);

#[derive(Clone, Debug, PartialEq)]
struct Complex {
    /// Rightmost compound last; combinator joins it to the previous one.
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Combinator {
    None,
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Clone, Debug, PartialEq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
    case_insensitive: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Clone, Debug, PartialEq)]
enum Pseudo {
    Not(Box<SelectorList>),
    Checked,
    Disabled,
    FirstChild,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, PageError> {
        let mut cursor = Cursor {
            src: selector,
            pos: 0,
        };
        let list = cursor.selector_list()?;
        cursor.skip_ws();
        if cursor.pos < selector.len() {
            return Err(cursor.error("unexpected trailing input"));
        }
        Ok(list)
    }

    pub fn matches(&self, doc: &Document, node: NodeId, states: &dyn ElementStates) -> bool {
        doc.is_element(node) && self.0.iter().any(|c| c.matches(doc, node, states))
    }

    /// Matching elements below `scope` in document order.
    pub fn select(&self, doc: &Document, scope: NodeId, states: &dyn ElementStates) -> Vec<NodeId> {
        doc.descendant_elements(scope)
            .into_iter()
            .filter(|n| self.matches(doc, *n, states))
            .collect()
    }
}

impl Complex {
    fn matches(&self, doc: &Document, node: NodeId, states: &dyn ElementStates) -> bool {
        match_from(&self.parts, self.parts.len(), doc, node, states)
    }
}

/// Match `parts[..end]` with its last compound anchored at `node`.
fn match_from(
    parts: &[(Combinator, Compound)],
    end: usize,
    doc: &Document,
    node: NodeId,
    states: &dyn ElementStates,
) -> bool {
    let Some((combinator, compound)) = end.checked_sub(1).and_then(|i| parts.get(i)) else {
        return true;
    };
    if !compound.matches(doc, node, states) {
        return false;
    }
    let rest = end - 1;
    if rest == 0 {
        return true;
    }
    match combinator {
        Combinator::None => true,
        Combinator::Child => doc
            .parent(node)
            .filter(|p| doc.is_element(*p))
            .is_some_and(|p| match_from(parts, rest, doc, p, states)),
        Combinator::Descendant => doc
            .ancestors(node)
            .into_iter()
            .filter(|a| doc.is_element(*a))
            .any(|a| match_from(parts, rest, doc, a, states)),
        Combinator::Adjacent => doc
            .preceding_siblings(node)
            .into_iter()
            .find(|s| doc.is_element(*s))
            .is_some_and(|s| match_from(parts, rest, doc, s, states)),
        Combinator::Sibling => doc
            .preceding_siblings(node)
            .into_iter()
            .filter(|s| doc.is_element(*s))
            .any(|s| match_from(parts, rest, doc, s, states)),
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId, states: &dyn ElementStates) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if expected != "*" && !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| doc.has_class(node, c)) {
            return false;
        }
        if !self.attrs.iter().all(|a| a.matches(doc, node)) {
            return false;
        }
        self.pseudos.iter().all(|p| match p {
            Pseudo::Not(inner) => !inner.matches(doc, node, states),
            Pseudo::Checked => states.is_checked(doc, node),
            Pseudo::Disabled => doc.has_attr(node, "disabled"),
            Pseudo::FirstChild => doc
                .parent(node)
                .map(|p| doc.element_children(p).first() == Some(&node))
                .unwrap_or(false),
        })
    }
}

impl AttrSelector {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(actual) = doc.attr(node, &self.name) else {
            return false;
        };
        let Some((op, expected)) = &self.op else {
            return true;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual.to_string(), expected.clone())
        };
        match op {
            AttrOp::Equals => actual == expected,
            AttrOp::Includes => actual.split_whitespace().any(|w| w == expected),
            AttrOp::DashMatch => actual == expected || actual.starts_with(&format!("{expected}-")),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn error(&self, reason: &str) -> PageError {
        PageError::InvalidSelector {
            selector: self.src.to_string(),
            reason: format!("{reason} at {}", self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn ident(&mut self) -> Result<String, PageError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn selector_list(&mut self) -> Result<SelectorList, PageError> {
        let mut list = vec![self.complex()?];
        loop {
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
                list.push(self.complex()?);
            } else {
                break;
            }
        }
        Ok(SelectorList(list))
    }

    fn complex(&mut self) -> Result<Complex, PageError> {
        self.skip_ws();
        let mut parts = vec![(Combinator::None, self.compound()?)];
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::Adjacent,
                Some('~') => Combinator::Sibling,
                Some(',') | Some(')') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(_) => return Err(self.error("unexpected character")),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_ws();
            }
            parts.push((combinator, self.compound()?));
        }
        Ok(Complex { parts })
    }

    fn compound(&mut self) -> Result<Compound, PageError> {
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.bump();
                compound.tag = Some("*".to_string());
            }
            Some(c) if c.is_alphabetic() => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error("empty compound selector"));
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrSelector, PageError> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => None,
            Some('=') => Some(AttrOp::Equals),
            Some('~') => Some(AttrOp::Includes),
            Some('|') => Some(AttrOp::DashMatch),
            Some('^') => Some(AttrOp::Prefix),
            Some('$') => Some(AttrOp::Suffix),
            Some('*') => Some(AttrOp::Substring),
            _ => return Err(self.error("expected attribute operator")),
        };
        let Some(op) = op else {
            self.bump();
            return Ok(AttrSelector {
                name,
                op: None,
                case_insensitive: false,
            });
        };
        self.bump();
        if op != AttrOp::Equals {
            if self.bump() != Some('=') {
                return Err(self.error("expected '='"));
            }
        }
        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while self.peek().is_some_and(|c| c != q) {
                    self.bump();
                }
                let value = self.src[start..self.pos].to_string();
                if self.bump() != Some(q) {
                    return Err(self.error("unterminated string"));
                }
                value
            }
            _ => self.ident()?,
        };
        self.skip_ws();
        let mut case_insensitive = false;
        if matches!(self.peek(), Some('i' | 'I')) {
            self.bump();
            case_insensitive = true;
            self.skip_ws();
        }
        if self.bump() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(AttrSelector {
            name,
            op: Some((op, value)),
            case_insensitive,
        })
    }

    fn pseudo(&mut self) -> Result<Pseudo, PageError> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "checked" => Ok(Pseudo::Checked),
            "disabled" => Ok(Pseudo::Disabled),
            "first-child" => Ok(Pseudo::FirstChild),
            "not" => {
                if self.bump() != Some('(') {
                    return Err(self.error("expected '('"));
                }
                let inner = self.selector_list()?;
                self.skip_ws();
                if self.bump() != Some(')') {
                    return Err(self.error("expected ')'"));
                }
                Ok(Pseudo::Not(Box::new(inner)))
            }
            other => Err(self.error(&format!("unsupported pseudo-class :{other}"))),
        }
    }
}
