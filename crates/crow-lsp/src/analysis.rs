//! Heuristic source analysis for completion and hover.
//!
//! The compiler is not used here: documents are incomplete at the cursor.
//! Instead the text before the cursor is scanned for the innermost open tag.

use tower_lsp::lsp_types::Position;

/// What the cursor is positioned inside, used to drive completions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// Right after `<`: an element name is expected.
    Element,
    /// Inside a start tag, between attributes.
    Attribute { element: String },
    /// Inside the quotes of `attr="..."`.
    Value { element: String, attribute: String },
    /// Text content, comments, end tags.
    Unknown,
}

/// The identifier containing or immediately preceding the cursor.
pub fn word_at<'t>(text: &'t str, pos: &Position) -> Option<&'t str> {
    let line = text.lines().nth(pos.line as usize)?;
    let col = byte_col(line, pos.character);
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let start = line[..col].rfind(|c: char| !is_word(c)).map(|i| i + 1).unwrap_or(0);
    let end = col + line[col..].find(|c: char| !is_word(c)).unwrap_or(line.len() - col);

    (start < end).then(|| &line[start..end])
}

/// Source text from the beginning of the file up to `pos`.
pub fn text_before(text: &str, pos: &Position) -> String {
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        if i < pos.line as usize {
            out.push_str(line);
            out.push('\n');
        } else {
            out.push_str(&line[..byte_col(line, pos.character)]);
            break;
        }
    }
    out
}

/// Start tag the text ends inside, if any: everything after its `<`.
fn open_tag(before: &str) -> Option<&str> {
    if let Some(comment) = before.rfind("<!--") {
        if !before[comment..].contains("-->") {
            return None;
        }
    }
    let lt = before.rfind('<')?;
    if before[lt..].contains('>') {
        return None;
    }
    let tag = &before[lt + 1..];
    (!tag.starts_with(['/', '!', '?'])).then_some(tag)
}

/// Element whose start tag contains the cursor.
pub fn enclosing_element(before: &str) -> Option<String> {
    let name = open_tag(before)?.split_whitespace().next()?;
    Some(name.to_string())
}

pub fn completion_context(text: &str, pos: &Position) -> Context {
    let before = text_before(text, pos);
    let Some(tag) = open_tag(&before) else {
        return Context::Unknown;
    };
    let Some((element, attributes)) = tag.split_once(char::is_whitespace) else {
        return Context::Element;
    };
    let element = element.to_string();

    if attributes.matches('"').count() % 2 == 1 {
        let Some(quote) = attributes.rfind('"') else { return Context::Unknown };
        let attribute = attributes[..quote]
            .trim_end()
            .trim_end_matches('=')
            .trim_end()
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .to_string();
        return Context::Value { element, attribute };
    }
    Context::Attribute { element }
}

fn byte_col(line: &str, character: u32) -> usize {
    line.char_indices().nth(character as usize).map(|(i, _)| i).unwrap_or(line.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> (String, Position) {
        let cursor = text.find('|').unwrap();
        let before = &text[..cursor];
        let line = before.matches('\n').count() as u32;
        let col = before.rsplit('\n').next().unwrap().chars().count() as u32;
        (text.replacen('|', "", 1), Position::new(line, col))
    }

    fn ctx(text: &str) -> Context {
        let (text, pos) = at(text);
        completion_context(&text, &pos)
    }

    #[test]
    fn element_after_angle_bracket() {
        assert_eq!(ctx("<Column>\n  <La|"), Context::Element);
        assert_eq!(ctx("<|"), Context::Element);
    }

    #[test]
    fn attribute_inside_start_tag() {
        assert_eq!(ctx(r#"<Label Text="a" |"#), Context::Attribute { element: "Label".into() });
    }

    #[test]
    fn value_inside_quotes() {
        assert_eq!(
            ctx(r#"<Slider Name="S" HorizontalAlignment="Ce|"#),
            Context::Value { element: "Slider".into(), attribute: "HorizontalAlignment".into() }
        );
    }

    #[test]
    fn outside_tags() {
        assert_eq!(ctx("<Label>hel|"), Context::Unknown);
        assert_eq!(ctx("<Column></Col|"), Context::Unknown);
        assert_eq!(ctx("<!-- <La|"), Context::Unknown);
    }

    #[test]
    fn words() {
        let (text, pos) = at("<Column>\n  <La|bel/>");
        assert_eq!(word_at(&text, &pos), Some("Label"));
        assert_eq!(enclosing_element(&text_before(&text, &pos)), Some("La".into()));
    }
}
