//! SQL identifier handling.
//!
//! [`Ident`] represents a table or column name, optionally schema-qualified
//! (`main.users`, `temp."_staging"`).
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//!
//! Generated statements always render identifiers quoted (see [`Ident::to_quoted_sql`]
//! and [`quote_identifier`]) so that column names which collide with SQLite keywords
//! keep working.

use crate::error::{OrmError, OrmResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

impl IdentPart {
    /// The raw name without quotes or escapes.
    pub fn name(&self) -> &str {
        match self {
            IdentPart::Unquoted(s) | IdentPart::Quoted(s) => s,
        }
    }
}

/// A SQL identifier (column, table, or schema-qualified table).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Create a single-part quoted identifier from a raw name.
    pub fn quoted(name: &str) -> OrmResult<Self> {
        if name.is_empty() {
            return Err(OrmError::validation("Empty quoted identifier"));
        }
        if name.contains('\0') {
            return Err(OrmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }
        Ok(Self {
            parts: vec![IdentPart::Quoted(name.to_string())],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `main.users`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `main."UserTable"`
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut rest = s;
        loop {
            let (part, tail) = parse_part(rest)?;
            parts.push(part);
            match tail.strip_prefix('.') {
                Some("") => return Err(OrmError::validation("Trailing '.' in identifier")),
                Some(next) => rest = next,
                None if tail.is_empty() => break,
                None => {
                    let c = tail.chars().next().unwrap_or('?');
                    return Err(OrmError::validation(format!(
                        "Expected '.' between identifier parts, got '{c}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Identifier parts in order.
    pub fn parts(&self) -> &[IdentPart] {
        &self.parts
    }

    /// The unqualified name (last part), without quotes.
    pub fn name(&self) -> &str {
        self.parts.last().map(IdentPart::name).unwrap_or_default()
    }

    /// Render the identifier as written: unquoted parts stay bare.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => push_quoted(&mut out, s),
            }
        }
        out
    }

    /// Render every part double-quoted.
    pub fn to_quoted_sql(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            push_quoted(&mut out, part.name());
        }
        out
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Quote a single raw name as an identifier: `count` -> `"count"`, `a"b` -> `"a""b"`.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    push_quoted(&mut out, name);
    out
}

fn push_quoted(out: &mut String, name: &str) {
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}

/// Parse one identifier part from the front of `s`, returning it and the unparsed tail.
fn parse_part(s: &str) -> OrmResult<(IdentPart, &str)> {
    if let Some(body) = s.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = body.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '"' {
                name.push(c);
                continue;
            }
            // Escaped quote: ""
            if matches!(chars.peek(), Some((_, '"'))) {
                chars.next();
                name.push('"');
                continue;
            }
            if name.is_empty() {
                return Err(OrmError::validation("Empty quoted identifier"));
            }
            return Ok((IdentPart::Quoted(name), &body[i + 1..]));
        }
        return Err(OrmError::validation("Unclosed quoted identifier"));
    }

    let end = s.find('.').unwrap_or(s.len());
    let name = &s[..end];
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(OrmError::validation("Empty identifier segment")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => {
            return Err(OrmError::validation(format!(
                "Invalid identifier start character: '{c}'"
            )));
        }
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(OrmError::validation(format!(
            "Invalid character in identifier: '{c}'"
        )));
    }
    Ok((IdentPart::Unquoted(name.to_string()), &s[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("users").unwrap();
        assert_eq!(ident.to_sql(), "users");
        assert_eq!(ident.to_quoted_sql(), r#""users""#);
        assert_eq!(ident.name(), "users");
    }

    #[test]
    fn ident_schema_qualified() {
        let ident = Ident::parse("main.users").unwrap();
        assert_eq!(ident.to_sql(), "main.users");
        assert_eq!(ident.to_quoted_sql(), r#""main"."users""#);
        assert_eq!(ident.name(), "users");
    }

    #[test]
    fn ident_quoted_with_escape() {
        let ident = Ident::parse(r#""has""quote""#).unwrap();
        assert_eq!(ident.name(), r#"has"quote"#);
        assert_eq!(ident.to_sql(), r#""has""quote""#);
    }

    #[test]
    fn ident_mixed_quoted_unquoted() {
        let ident = Ident::parse(r#"temp."_Staging".x"#).unwrap();
        assert_eq!(ident.parts().len(), 3);
        assert_eq!(ident.to_sql(), r#"temp."_Staging".x"#);
    }

    #[test]
    fn ident_with_dollar() {
        assert_eq!(Ident::parse("my_var$1").unwrap().to_sql(), "my_var$1");
    }

    #[test]
    fn quote_identifier_escapes() {
        assert_eq!(quote_identifier("count"), r#""count""#);
        assert_eq!(quote_identifier(r#"a"b"#), r#""a""b""#);
    }

    #[test]
    fn ident_rejects_bad_input() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("1table").is_err());
        assert!(Ident::parse("my table").is_err());
        assert!(Ident::parse("schema..table").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse(r#""unclosed"#).is_err());
        assert!(Ident::parse(r#""""#).is_err());
        assert!(Ident::parse(r#""a"b"#).is_err());
        assert!(Ident::quoted("").is_err());
    }
}
