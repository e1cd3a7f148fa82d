//! Post-render sanitization of generated query text
//!
//! Rendered templates can carry HTML entities (settings typed into a web form) and
//! statement terminators inside string literals. The warehouse CLI splits statements
//! on `;` and treats `--` as a comment even inside quotes, so both are escaped there.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Single-quoted literal; a backslash escapes the next character, so `\'` does not close it
static QUOTED_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(?:[^'\\]|\\.)*'").unwrap());

const ENTITIES: [(&str, &str); 5] =
    [("&lt;", "<"), ("&gt;", ">"), ("&amp;", "&"), ("&quot;", "\""), ("&apos;", "'")];

const ENTITY_PASSES: usize = 2;

/// Sanitize rendered query text
pub fn sanitize(text: &str) -> String {
    let unescaped = unescape_entities(text);
    let escaped = QUOTED_LITERAL
        .replace_all(&unescaped, |caps: &Captures| escape_literal(&caps[0]))
        .into_owned();
    escaped.replace("RCFILE\n\\;", "RCFILE\n;")
}

fn unescape_entities(text: &str) -> String {
    let mut out = text.to_string();
    for _ in 0..ENTITY_PASSES {
        for (entity, plain) in ENTITIES {
            out = out.replace(entity, plain);
        }
    }
    out
}

/// Escape `;` and `--` inside one literal, quotes included. Sequences already
/// preceded by a backslash are copied as they are.
fn escape_literal(literal: &str) -> String {
    let chars: Vec<char> = literal.chars().collect();
    let mut out = String::with_capacity(literal.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                out.push('\\');
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    // An escaped `-` still escapes the dash pair it starts
                    if next == '-' && chars.get(i + 2) == Some(&'-') {
                        out.push('-');
                        i += 1;
                    }
                }
                i += 2;
            },
            ';' => {
                out.push_str("\\;");
                i += 1;
            },
            '-' if chars.get(i + 1) == Some(&'-') => {
                out.push_str("\\--");
                i += 2;
            },
            c => {
                out.push(c);
                i += 1;
            },
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_semicolon_inside_literal() {
        let sql = "AND path IN ('/test/page;rd=https://www.rakuten.ne.jp/gold/');";
        assert_eq!(
            sanitize(sql),
            "AND path IN ('/test/page\\;rd=https://www.rakuten.ne.jp/gold/');"
        );
    }

    #[test]
    fn test_escapes_double_dash_inside_literal() {
        let sql = "WHERE url = '/fashion/yukata/--&amp;rt=amp;rd=x' -- trailing comment";
        assert_eq!(
            sanitize(sql),
            "WHERE url = '/fashion/yukata/\\--&rt=amp\\;rd=x' -- trailing comment"
        );
    }

    #[test]
    fn test_statement_terminators_outside_literals_untouched() {
        let sql = "SET a=1;\nSELECT 'x' AS y;";
        assert_eq!(sanitize(sql), sql);
    }

    #[test]
    fn test_rcfile_terminator_restored() {
        let sql = "FIELDS TERMINATED BY '\nSTORED AS RCFILE\n;\n'";
        assert!(sanitize(sql).contains("RCFILE\n;"));
        assert!(!sanitize(sql).contains("RCFILE\n\\;"));
    }

    #[test]
    fn test_entities_unescaped_twice() {
        assert_eq!(sanitize("a &amp;lt; b"), "a < b");
        assert_eq!(sanitize("&quot;x&quot; &gt; &apos;y&apos;"), "\"x\" > 'y'");
    }

    #[test]
    fn test_escaped_quote_does_not_close_literal() {
        let sql = r"SELECT 'it\'s;here' ; 'next'";
        assert_eq!(sanitize(sql), r"SELECT 'it\'s\;here' ; 'next'");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "SELECT 'a;b--c' FROM t;",
            "x = '\\;already' AND y = '\\--done'",
            "STORED AS RCFILE\n;\nINSERT 'p;q'",
            "'---' and '----;'",
            "no literals at all; -- comment",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }
}
