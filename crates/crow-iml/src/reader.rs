//! Pull-style structural reader for `.iml` markup.
//!
//! The reader only knows about tags, attributes and text. It tracks
//! line/column for every event, checks that tags nest properly, and can hand
//! back the raw text of an element's content so that fragments such as item
//! templates can be compiled on their own.

use crate::error::{ImlError, Position, Result};

// ── Events ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Entity-decoded value, without the surrounding quotes.
    pub value: String,
    pub at: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `<Name attr="..">` or `<Name attr=".." />`. A self-closing tag is
    /// always followed by a matching [`Event::End`].
    Start {
        name: String,
        attributes: Vec<Attribute>,
        empty: bool,
        at: Position,
    },
    End { name: String, at: Position },
    /// Non-blank character data, entity-decoded.
    Text { text: String, at: Position },
    Eof,
}

// ── Reader ────────────────────────────────────────────────────────────────

pub struct Reader<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
    open: Vec<String>,
    pending_end: Option<(String, Position)>,
    seen_root: bool,
    /// Byte offset of the `<` that began the most recent tag.
    tag_start: usize,
}

impl<'s> Reader<'s> {
    pub fn new(src: &'s str) -> Self {
        Self::with_origin(src, Position::default())
    }

    /// A reader whose reported positions start at `origin` instead of 1:1.
    /// Used for fragments cut out of a larger document.
    pub fn with_origin(src: &'s str, origin: Position) -> Self {
        Self {
            src,
            pos: 0,
            line: origin.line,
            col: origin.col,
            open: Vec::new(),
            pending_end: None,
            seen_root: false,
            tag_start: 0,
        }
    }

    /// Current position.
    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn next_event(&mut self) -> Result<Event> {
        if let Some((name, at)) = self.pending_end.take() {
            self.open.pop();
            return Ok(Event::End { name, at });
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                if let Some(name) = self.open.last() {
                    return Err(ImlError::lexical(
                        format!("unterminated element <{name}>"),
                        self.position(),
                    ));
                }
                return Ok(Event::Eof);
            }

            if rest.starts_with("<!--") {
                self.skip_past("-->", "unterminated comment")?;
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "unterminated processing instruction")?;
            } else if rest.starts_with("<![CDATA[") {
                let at = self.position();
                self.advance_by("<![CDATA[".len());
                let text = self.take_until("]]>", "unterminated CDATA section")?;
                if self.open.is_empty() {
                    return Err(ImlError::lexical("character data outside the root element", at));
                }
                return Ok(Event::Text { text, at });
            } else if rest.starts_with("<!") {
                self.skip_past(">", "unterminated declaration")?;
            } else if rest.starts_with("</") {
                return self.end_tag();
            } else if rest.starts_with('<') {
                return self.start_tag();
            } else {
                let at = self.position();
                let start = self.pos;
                while !matches!(self.peek(), None | Some('<')) {
                    self.advance();
                }
                let raw = &self.src[start..self.pos];
                if raw.trim().is_empty() {
                    continue;
                }
                if self.open.is_empty() {
                    return Err(ImlError::lexical("text outside the root element", at));
                }
                return Ok(Event::Text { text: decode_entities(raw.trim(), at)?, at });
            }
        }
    }

    /// Consumes the content of the element whose `Start` event was just
    /// returned, up to and including its end tag, and returns the raw markup
    /// between the two tags together with the position it starts at.
    pub fn read_inner_markup(&mut self) -> Result<(String, Position)> {
        if let Some((_, at)) = self.pending_end.take() {
            self.open.pop();
            return Ok((String::new(), at));
        }
        let start = self.pos;
        let origin = self.position();
        let depth = self.open.len();
        loop {
            match self.next_event()? {
                Event::End { .. } if self.open.len() < depth => {
                    return Ok((self.src[start..self.tag_start].to_string(), origin));
                }
                Event::Eof => {
                    return Err(ImlError::lexical("unexpected end of document", self.position()));
                }
                _ => {}
            }
        }
    }

    // ── Tags ──────────────────────────────────────────────────────────────

    fn start_tag(&mut self) -> Result<Event> {
        let at = self.position();
        self.tag_start = self.pos;
        self.advance(); // consume `<`
        let name = self
            .name()
            .ok_or_else(|| ImlError::lexical("expected element name after `<`", self.position()))?;
        if self.open.is_empty() && self.seen_root {
            return Err(ImlError::lexical(
                format!("unexpected second root element <{name}>"),
                at,
            ));
        }

        let mut attributes: Vec<Attribute> = Vec::new();
        let empty = loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ImlError::lexical(format!("unterminated start tag <{name}>"), at));
                }
                Some('>') => {
                    self.advance();
                    break false;
                }
                Some('/') => {
                    self.advance();
                    if self.advance() != Some('>') {
                        return Err(ImlError::lexical("expected `>` after `/`", self.position()));
                    }
                    break true;
                }
                Some(c) => {
                    let attr_at = self.position();
                    let attr = self.name().ok_or_else(|| {
                        ImlError::lexical(format!("unexpected character {c:?} in <{name}>"), attr_at)
                    })?;
                    self.skip_whitespace();
                    if self.advance() != Some('=') {
                        return Err(ImlError::lexical(
                            format!("expected `=` after attribute `{attr}`"),
                            self.position(),
                        ));
                    }
                    self.skip_whitespace();
                    let quote = match self.advance() {
                        Some(q @ ('"' | '\'')) => q,
                        _ => {
                            return Err(ImlError::lexical(
                                format!("value of attribute `{attr}` must be quoted"),
                                attr_at,
                            ));
                        }
                    };
                    let value_start = self.pos;
                    loop {
                        match self.advance() {
                            None => {
                                return Err(ImlError::lexical(
                                    format!("unterminated value for attribute `{attr}`"),
                                    attr_at,
                                ));
                            }
                            Some(c) if c == quote => break,
                            Some(_) => {}
                        }
                    }
                    let raw = &self.src[value_start..self.pos - quote.len_utf8()];
                    if raw.contains('<') {
                        return Err(ImlError::lexical(
                            format!("`<` is not allowed in the value of `{attr}`"),
                            attr_at,
                        ));
                    }
                    if attributes.iter().any(|a| a.name == attr) {
                        return Err(ImlError::lexical(format!("duplicate attribute `{attr}`"), attr_at));
                    }
                    let value = decode_entities(raw, attr_at)?;
                    attributes.push(Attribute { name: attr, value, at: attr_at });
                }
            }
        };

        self.seen_root = true;
        self.open.push(name.clone());
        if empty {
            self.pending_end = Some((name.clone(), at));
        }
        Ok(Event::Start { name, attributes, empty, at })
    }

    fn end_tag(&mut self) -> Result<Event> {
        let at = self.position();
        self.tag_start = self.pos;
        self.advance_by(2); // consume `</`
        let name = self
            .name()
            .ok_or_else(|| ImlError::lexical("expected element name after `</`", self.position()))?;
        self.skip_whitespace();
        if self.advance() != Some('>') {
            return Err(ImlError::lexical(format!("expected `>` to close </{name}>"), self.position()));
        }
        match self.open.last() {
            Some(open) if *open == name => {
                self.open.pop();
                Ok(Event::End { name, at })
            }
            Some(open) => Err(ImlError::lexical(
                format!("mismatched closing tag </{name}>, expected </{open}>"),
                at,
            )),
            None => Err(ImlError::lexical(
                format!("closing tag </{name}> has no matching start tag"),
                at,
            )),
        }
    }

    // ── Scanning ──────────────────────────────────────────────────────────

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn advance_by(&mut self, chars: usize) {
        for _ in 0..chars {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn name(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.advance();
            }
            _ => return None,
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')) {
            self.advance();
        }
        Some(self.src[start..self.pos].to_string())
    }

    fn take_until(&mut self, terminator: &str, message: &str) -> Result<String> {
        let at = self.position();
        let start = self.pos;
        while !self.rest().starts_with(terminator) {
            if self.advance().is_none() {
                return Err(ImlError::lexical(message, at));
            }
        }
        let text = self.src[start..self.pos].to_string();
        self.advance_by(terminator.chars().count());
        Ok(text)
    }

    fn skip_past(&mut self, terminator: &str, message: &str) -> Result<()> {
        self.take_until(terminator, message).map(drop)
    }
}

fn decode_entities(raw: &str, at: Position) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let semi = tail
            .find(';')
            .ok_or_else(|| ImlError::lexical("unterminated entity reference", at))?;
        let entity = &tail[..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>().ok()))
                .flatten()
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => return Err(ImlError::lexical(format!("unknown entity `&{entity};`"), at)),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
