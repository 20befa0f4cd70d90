use std::fmt;
use std::sync::Arc;

// ── Value ─────────────────────────────────────────────────────────────────

/// A member value as it flows through literal sets and bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// `[r, g, b, a]` straight-alpha bytes, parsed from `#rrggbb` or `#rrggbbaa`.
    Color([u8; 4]),
    /// One variant of an enumerated property.
    Enum(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Converts a propagated value to what a member of `kind` accepts.
    ///
    /// Returns `None` when no sensible conversion exists; the caller then
    /// leaves the destination untouched.
    pub fn coerce(&self, kind: &ValueKind) -> Option<Value> {
        match (kind, self) {
            (ValueKind::Any, v) => Some(v.clone()),
            (_, Value::Null) => Some(kind.default_value()),
            (ValueKind::Bool, Value::Bool(_))
            | (ValueKind::Int, Value::Int(_))
            | (ValueKind::Float, Value::Float(_))
            | (ValueKind::Str, Value::Str(_))
            | (ValueKind::Color, Value::Color(_)) => Some(self.clone()),
            (ValueKind::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (ValueKind::Int, Value::Float(f)) => Some(Value::Int(f.round() as i64)),
            (ValueKind::Bool, Value::Int(i)) => Some(Value::Bool(*i != 0)),
            (ValueKind::Str, v) => Some(Value::Str(v.to_string())),
            (ValueKind::Enum(variants), Value::Enum(s) | Value::Str(s)) => {
                variants.iter().any(|v| v.as_ref() == s).then(|| Value::Enum(s.clone()))
            }
            (kind, Value::Str(s)) => kind.parse_literal(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) | Value::Enum(s) => f.write_str(s),
            Value::Color([r, g, b, a]) => write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}"),
        }
    }
}

// ── ValueKind ─────────────────────────────────────────────────────────────

/// The declared kind of a property; drives literal parsing and coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    Color,
    Enum(Arc<[Arc<str>]>),
    /// Object-valued member: reachable as an interior path segment, never set
    /// from a literal.
    Object,
    /// Untyped: accepts whatever the literal looks like.
    Any,
}

impl ValueKind {
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        ValueKind::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Str => Value::Str(String::new()),
            ValueKind::Color => Value::Color([0, 0, 0, 0]),
            ValueKind::Enum(variants) => variants
                .first()
                .map(|v| Value::Enum(v.to_string()))
                .unwrap_or(Value::Null),
            ValueKind::Object | ValueKind::Any => Value::Null,
        }
    }

    /// Parses attribute text as a value of this kind.
    pub fn parse_literal(&self, text: &str) -> Option<Value> {
        let t = text.trim();
        match self {
            ValueKind::Bool => parse_bool(t).map(Value::Bool),
            ValueKind::Int => t.parse::<i64>().ok().map(Value::Int),
            ValueKind::Float => t.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::Float),
            ValueKind::Str => Some(Value::Str(text.to_string())),
            ValueKind::Color => parse_color(t).map(Value::Color),
            ValueKind::Enum(variants) => variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(t))
                .map(|v| Value::Enum(v.to_string())),
            ValueKind::Object => None,
            ValueKind::Any => Some(infer(text)),
        }
    }

    /// Human name used in diagnostics and editor tooling.
    pub fn label(&self) -> String {
        match self {
            ValueKind::Bool => "bool".into(),
            ValueKind::Int => "integer".into(),
            ValueKind::Float => "number".into(),
            ValueKind::Str => "string".into(),
            ValueKind::Color => "color (#rrggbb or #rrggbbaa)".into(),
            ValueKind::Enum(variants) => {
                let names: Vec<&str> = variants.iter().map(|v| v.as_ref()).collect();
                format!("one of {}", names.join(" | "))
            }
            ValueKind::Object => "object".into(),
            ValueKind::Any => "value".into(),
        }
    }
}

fn parse_bool(t: &str) -> Option<bool> {
    if t.eq_ignore_ascii_case("true") || t == "1" {
        Some(true)
    } else if t.eq_ignore_ascii_case("false") || t == "0" {
        Some(false)
    } else {
        None
    }
}

fn parse_color(t: &str) -> Option<[u8; 4]> {
    let hex = t.strip_prefix('#')?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let a = if hex.len() == 8 { byte(6)? } else { 255 };
    Some([byte(0)?, byte(2)?, byte(4)?, a])
}

fn infer(text: &str) -> Value {
    let t = text.trim();
    if let Some(b) = parse_bool(t).filter(|_| !t.chars().all(|c| c.is_ascii_digit())) {
        Value::Bool(b)
    } else if let Ok(i) = t.parse::<i64>() {
        Value::Int(i)
    } else if let Some(f) = t.parse::<f64>().ok().filter(|f| f.is_finite()) {
        Value::Float(f)
    } else if let Some(c) = parse_color(t) {
        Value::Color(c)
    } else {
        Value::Str(text.to_string())
    }
}
