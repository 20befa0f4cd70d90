//! Binding and navigation expressions.
//!
//! ```text
//! expr       := '²'? ( quoted | path )
//! path       := hop-prefix? dotted-name
//! hop-prefix := '/' | './' | ('../')+
//! ```
//!
//! | Form | Meaning |
//! |------|---------|
//! | `Title` | member of the invocation's data source |
//! | `.Text` | member of the declaring node itself |
//! | `/L.Text`, `./L.Text` | `L` found under the enclosing template root |
//! | `../../Tag` | two logical-parent hops up |
//! | `'hello'` | string constant |
//!
//! After a hop prefix, a dotted name with more than one segment starts with
//! the name of a descendant to look up (an empty first segment skips the
//! lookup); the remaining segments are member accesses.

use std::fmt;

// ── Parsed forms ──────────────────────────────────────────────────────────

/// Where navigation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hops {
    /// The data source handed to the instantiator.
    DataSource,
    /// Ascend until the enclosing templated control.
    TemplateRoot,
    /// Exactly this many logical-parent hops. `Up(0)` is the node itself.
    Up(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingPath {
    pub hops: Hops,
    /// Descendant looked up by name from the hop destination.
    pub name: Option<String>,
    /// Interior member segments followed by the terminal member.
    pub members: Vec<String>,
}

impl BindingPath {
    pub fn terminal(&self) -> Option<&str> {
        self.members.last().map(String::as_str)
    }

    pub fn interior(&self) -> &[String] {
        &self.members[..self.members.len().saturating_sub(1)]
    }
}

impl fmt::Display for BindingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hops {
            Hops::DataSource => {}
            Hops::TemplateRoot => f.write_str("/")?,
            Hops::Up(0) => f.write_str(".")?,
            Hops::Up(n) => {
                for _ in 0..n {
                    f.write_str("../")?;
                }
            }
        }
        let mut segments: Vec<&str> = Vec::new();
        if let Some(name) = &self.name {
            segments.push(name);
        } else if self.members.len() > 1 && !matches!(self.hops, Hops::DataSource | Hops::Up(0)) {
            segments.push("");
        }
        segments.extend(self.members.iter().map(String::as_str));
        f.write_str(&segments.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Constant(String),
    Path(BindingPath),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingExpr {
    pub expression: Expression,
    pub two_way: bool,
}

/// One `lhs = rhs` of an assignment handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Member to set, navigated from the event sender.
    pub target: BindingPath,
    pub value: AssignValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignValue {
    /// `'text'`
    Constant(String),
    /// Bare text, parsed against the target member's kind when the handler runs.
    Literal(String),
    /// Current value read through a path from the sender.
    Read(BindingPath),
}

// ── Parsing ───────────────────────────────────────────────────────────────

/// Inner text of a `{...}` attribute value.
pub fn braced(value: &str) -> Option<&str> {
    let v = value.trim();
    v.strip_prefix('{')?.strip_suffix('}')
}

pub fn parse_binding(text: &str) -> Result<BindingExpr, String> {
    let t = text.trim();
    let (two_way, t) = match t.strip_prefix('²') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, t),
    };
    if t.starts_with('\'') {
        if two_way {
            return Err("a constant cannot be bound two-way".into());
        }
        return quoted(t).map(|s| BindingExpr { expression: Expression::Constant(s.to_string()), two_way });
    }
    Ok(BindingExpr { expression: Expression::Path(parse_path(t)?), two_way })
}

pub fn parse_path(text: &str) -> Result<BindingPath, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty path".into());
    }
    let segments: Vec<&str> = text.split('/').collect();
    let (hops, dotted) = match segments.as_slice() {
        ["."] => (Hops::TemplateRoot, ""),
        [single] => match single.strip_prefix('.') {
            Some(rest) => (Hops::Up(0), rest),
            None => (Hops::DataSource, *single),
        },
        ["" | ".", rest] => (Hops::TemplateRoot, *rest),
        parts => {
            let ups = parts.iter().take_while(|s| **s == "..").count();
            if ups == 0 || ups != parts.len() - 1 {
                return Err(format!("unexpected `/` in `{text}`"));
            }
            (Hops::Up(ups), parts[ups])
        }
    };

    if dotted.is_empty() {
        return Ok(BindingPath { hops, name: None, members: Vec::new() });
    }
    let tokens: Vec<&str> = dotted.split('.').collect();
    let (name, members) = match hops {
        Hops::DataSource | Hops::Up(0) => (None, &tokens[..]),
        _ if tokens.len() == 1 => (None, &tokens[..]),
        _ => ((!tokens[0].is_empty()).then(|| tokens[0]), &tokens[1..]),
    };
    for segment in name.iter().chain(members) {
        if !is_identifier(segment) {
            return Err(if segment.is_empty() {
                format!("empty segment in `{text}`")
            } else {
                format!("`{segment}` is not a valid name")
            });
        }
    }
    Ok(BindingPath {
        hops,
        name: name.map(str::to_string),
        members: members.iter().map(|s| s.to_string()).collect(),
    })
}

/// Inner text of a `{lhs = rhs; ...}` handler.
pub fn parse_assignments(text: &str) -> Result<Vec<Assignment>, String> {
    let mut out = Vec::new();
    for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (lhs, rhs) = part
            .split_once('=')
            .ok_or_else(|| format!("expected `target = value` in `{part}`"))?;
        let mut target = parse_path(lhs)?;
        if target.hops == Hops::DataSource {
            // a bare name on the left is a member of the sender
            target.hops = Hops::Up(0);
        }
        if target.members.is_empty() {
            return Err(format!("`{}` does not name a member", lhs.trim()));
        }
        let rhs = rhs.trim();
        let value = if rhs.starts_with('\'') {
            AssignValue::Constant(quoted(rhs)?.to_string())
        } else if rhs.contains('/') || rhs.starts_with('.') {
            AssignValue::Read(parse_path(rhs)?)
        } else if rhs.is_empty() {
            return Err(format!("missing value in `{part}`"));
        } else {
            AssignValue::Literal(rhs.to_string())
        };
        out.push(Assignment { target, value });
    }
    if out.is_empty() {
        return Err("empty assignment list".into());
    }
    Ok(out)
}

fn quoted(t: &str) -> Result<&str, String> {
    t.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| format!("unterminated quoted constant `{t}`"))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}
