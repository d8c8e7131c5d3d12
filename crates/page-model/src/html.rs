//! Forgiving loader for the HTML subset application forms use.
//!
//! Handles void elements, quoted/unquoted attributes, character references,
//! comments, doctype, and skips `script`/`style` bodies. Unmatched end tags
//! are ignored; an end tag closes every element opened after its match.

use crate::dom::{collapse_whitespace, Document, NodeId, ROOT};
use crate::errors::PageError;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parse a full document.
pub fn parse_document(markup: &str) -> Result<Document, PageError> {
    let mut doc = Document::new();
    parse_fragment(&mut doc, ROOT, markup)?;
    Ok(doc)
}

/// Parse `markup` and append the resulting nodes under `parent`. Returns the
/// top-level nodes created.
pub fn parse_fragment(
    doc: &mut Document,
    parent: NodeId,
    markup: &str,
) -> Result<Vec<NodeId>, PageError> {
    let mut parser = Parser {
        src: markup,
        pos: 0,
        stack: vec![parent],
        top_level: Vec::new(),
    };
    parser.run(doc)?;
    Ok(parser.top_level)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<NodeId>,
    top_level: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn current(&self) -> NodeId {
        *self.stack.last().unwrap_or(&ROOT)
    }

    fn attach(&mut self, doc: &mut Document, node: NodeId) {
        let parent = self.current();
        doc.append_child(parent, node);
        if self.stack.len() == 1 {
            self.top_level.push(node);
        }
    }

    fn run(&mut self, doc: &mut Document) -> Result<(), PageError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.pos += match rest.find("-->") {
                    Some(end) => end + 3,
                    None => rest.len(),
                };
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos += match rest.find('>') {
                    Some(end) => end + 1,
                    None => rest.len(),
                };
            } else if rest.starts_with("</") {
                self.end_tag(doc)?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.start_tag(doc)?;
            } else {
                self.text(doc);
            }
        }
        Ok(())
    }

    fn text(&mut self, doc: &mut Document) {
        let rest = self.rest();
        // A bare '<' that does not open a tag is text.
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..].find('<').map(|i| i + skip).unwrap_or(rest.len());
        let raw = &rest[..end];
        self.pos += end;
        if raw.trim().is_empty() {
            return;
        }
        let node = doc.create_text(&decode_entities(raw));
        self.attach(doc, node);
    }

    fn end_tag(&mut self, doc: &Document) -> Result<(), PageError> {
        let rest = self.rest();
        let close = rest
            .find('>')
            .ok_or_else(|| PageError::Markup(format!("unterminated end tag at {}", self.pos)))?;
        let name = rest[2..close].trim().to_ascii_lowercase();
        self.pos += close + 1;
        // Never pop the fragment parent itself.
        if let Some(depth) = self
            .stack
            .iter()
            .skip(1)
            .rposition(|n| doc.tag(*n) == Some(name.as_str()))
        {
            self.stack.truncate(depth + 1);
        }
        Ok(())
    }

    fn start_tag(&mut self, doc: &mut Document) -> Result<(), PageError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let name = name.to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(PageError::Markup(format!(
                    "unterminated start tag <{name}> at {start}"
                )));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            let attr_name = self
                .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_ascii_lowercase();
            if attr_name.is_empty() {
                self.pos += self.rest().chars().next().map(char::len_utf8).unwrap_or(1);
                continue;
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attr_value()?
            } else {
                String::new()
            };
            if !attrs.iter().any(|(k, _)| *k == attr_name) {
                attrs.push((attr_name, value));
            }
        }

        // An open option/li closes on the next sibling of the same kind.
        if matches!(name.as_str(), "option" | "li")
            && doc.tag(self.current()) == Some(name.as_str())
            && self.stack.len() > 1
        {
            self.stack.pop();
        }

        let node = doc.create_element(&name, attrs);
        self.attach(doc, node);

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let close = format!("</{name}");
            let rest = self.rest();
            let lower = rest.to_ascii_lowercase();
            let end = lower.find(&close).unwrap_or(rest.len());
            self.pos += end;
            if let Some(gt) = self.rest().find('>') {
                self.pos += gt + 1;
            }
            return Ok(());
        }

        if !self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
            self.stack.push(node);
        }
        Ok(())
    }

    fn attr_value(&mut self) -> Result<String, PageError> {
        let rest = self.rest();
        let quote = rest.chars().next();
        match quote {
            Some(q @ ('"' | '\'')) => {
                let end = rest[1..].find(q).ok_or_else(|| {
                    PageError::Markup(format!("unterminated attribute value at {}", self.pos))
                })?;
                let raw = &rest[1..1 + end];
                self.pos += end + 2;
                Ok(decode_entities(raw))
            }
            _ => {
                let raw = self.take_while(|c| !c.is_whitespace() && c != '>');
                Ok(decode_entities(raw))
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }
}

/// Decode the character references forms commonly carry.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';').filter(|i| *i <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
            }
            _ if entity.starts_with('#') => {
                entity[1..].parse::<u32>().ok().and_then(char::from_u32)
            }
            _ => None,
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Normalised text of a markup snippet, used for quick assertions.
pub fn text_of(markup: &str) -> Result<String, PageError> {
    let doc = parse_document(markup)?;
    Ok(collapse_whitespace(&doc.text_content(ROOT)))
}
