//! Placeholder rewriting between bindvar styles
//!
//! Queries are written with `?` placeholders and rewritten for drivers that
//! expect something else. Placeholders inside quoted literals or identifiers
//! are left alone.

/// Placeholder style understood by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindStyle {
    /// `?` (SQLite, MySQL)
    #[default]
    Question,
    /// `$1`, `$2`, … (PostgreSQL)
    Dollar,
    /// `:arg1`, `:arg2`, … (Oracle)
    Named,
    /// `@p1`, `@p2`, … (SQL Server)
    At,
}

/// Rewrite every `?` placeholder in `query` into `style`.
pub fn rebind(style: BindStyle, query: &str) -> String {
    if style == BindStyle::Question {
        return query.to_string();
    }

    let mut out = String::with_capacity(query.len() + 8);
    let mut position = 0_usize;
    let mut quote: Option<char> = None;

    for c in query.chars() {
        match (quote, c) {
            (Some(open), c) if c == open => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '\'' | '"' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '?') => {
                position += 1;
                match style {
                    BindStyle::Dollar => out.push('$'),
                    BindStyle::Named => out.push_str(":arg"),
                    BindStyle::At => out.push_str("@p"),
                    BindStyle::Question => out.push('?'),
                }
                out.push_str(&position.to_string());
            }
            (None, c) => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = "SELECT * FROM users WHERE id = ? AND name = ?";

    #[test]
    fn test_rebind_styles() {
        assert_eq!(rebind(BindStyle::Question, QUERY), QUERY);
        assert_eq!(rebind(BindStyle::Dollar, QUERY), "SELECT * FROM users WHERE id = $1 AND name = $2");
        assert_eq!(
            rebind(BindStyle::Named, QUERY),
            "SELECT * FROM users WHERE id = :arg1 AND name = :arg2"
        );
        assert_eq!(rebind(BindStyle::At, QUERY), "SELECT * FROM users WHERE id = @p1 AND name = @p2");
    }

    #[test]
    fn test_rebind_skips_quoted_literals() {
        let query = "SELECT '?' AS q, \"a?b\" FROM t WHERE x = ?";
        assert_eq!(rebind(BindStyle::Dollar, query), "SELECT '?' AS q, \"a?b\" FROM t WHERE x = $1");
    }

    #[test]
    fn test_rebind_escaped_quote_stays_literal() {
        // '' inside a literal closes and reopens the quote, leaving the ? quoted.
        let query = "SELECT 'it''s ?' WHERE id = ?";
        assert_eq!(rebind(BindStyle::Dollar, query), "SELECT 'it''s ?' WHERE id = $1");
    }
}
