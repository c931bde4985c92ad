//! Rewriting of positional placeholders between `$N` and `?N`.
//!
//! Segments are written with numbered placeholders. SQLite binds `$1` as a *named* parameter
//! whose position is the order of first appearance, so `SET name = $2 WHERE id = $1` would bind
//! the arguments swapped; the SQLite driver therefore rewrites `$N` to `?N` before preparing.

use std::borrow::Cow;

mod scanner;

use scanner::{Region, Scanner};

/// Placeholder dialect to rewrite into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ...
    Postgres,
    /// `?1`, `?2`, ...
    Sqlite,
}

impl PlaceholderStyle {
    fn sigil(self) -> u8 {
        match self {
            PlaceholderStyle::Postgres => b'$',
            PlaceholderStyle::Sqlite => b'?',
        }
    }

    fn source_sigil(self) -> u8 {
        match self {
            PlaceholderStyle::Postgres => b'?',
            PlaceholderStyle::Sqlite => b'$',
        }
    }
}

/// Rewrite numbered placeholders into `target` style.
///
/// Quoted strings, identifiers, comments and dollar-quoted bodies are copied untouched.
/// Returns the input borrowed when nothing changed.
///
/// ```rust
/// use octobe::translation::{PlaceholderStyle, translate_placeholders};
///
/// let sql = "UPDATE products SET name = $2 WHERE id = $1 AND note <> '$3'";
/// assert_eq!(
///     translate_placeholders(sql, PlaceholderStyle::Sqlite),
///     "UPDATE products SET name = ?2 WHERE id = ?1 AND note <> '$3'"
/// );
/// ```
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let mut out: Option<String> = None;
    let mut copied_to = 0;

    for (start, end, region) in Scanner::new(sql) {
        if region != Region::Code {
            continue;
        }
        let bytes = &sql.as_bytes()[start..end];
        let mut idx = 0;
        while idx < bytes.len() {
            if bytes[idx] == target.source_sigil() {
                let digits = bytes[idx + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits > 0 {
                    let at = start + idx;
                    let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                    buf.push_str(&sql[copied_to..at]);
                    buf.push(char::from(target.sigil()));
                    copied_to = at + 1;
                    idx += digits;
                }
            }
            idx += 1;
        }
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_to_sqlite() {
        let res = translate_placeholders("insert into t values($1, $2)", PlaceholderStyle::Sqlite);
        assert_eq!(res, "insert into t values(?1, ?2)");
    }

    #[test]
    fn sqlite_to_postgres() {
        let res = translate_placeholders(
            "select * from t where a = ?1 and b = ?12",
            PlaceholderStyle::Postgres,
        );
        assert_eq!(res, "select * from t where a = $1 and b = $12");
    }

    #[test]
    fn leaves_literals_and_comments_alone() {
        let sql = "select '$1', \"$2\", $1 -- $2\n/* $3 /* $4 */ $5 */ from t where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(
            res,
            "select '$1', \"$2\", ?1 -- $2\n/* $3 /* $4 */ $5 */ from t where a = ?1"
        );
    }

    #[test]
    fn leaves_dollar_quoted_bodies_alone() {
        let sql = "$body$ select $1 from t $body$ where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "$body$ select $1 from t $body$ where a = ?1");
    }

    #[test]
    fn escaped_quotes_stay_inside_literal() {
        let sql = "select 'it''s $1' where id = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite);
        assert_eq!(res, "select 'it''s $1' where id = ?1");
    }

    #[test]
    fn borrows_when_unchanged() {
        let sql = "select 1";
        assert!(matches!(
            translate_placeholders(sql, PlaceholderStyle::Sqlite),
            Cow::Borrowed(_)
        ));
        let bare = "select $ from t";
        assert_eq!(translate_placeholders(bare, PlaceholderStyle::Sqlite), bare);
    }
}
