use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    /// Body of a `/** ... */` comment, delimiters stripped.
    Doc(String),
    Punct(char),
    Arrow,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

const PUNCT: &[char] = &[
    '{', '}', '(', ')', '[', ']', '<', '>', '=', '|', '&', '?', ':', ';', ',', '.', '*',
];

/// Tokenize a declaration module. Plain comments are dropped, doc comments are kept.
pub fn tokenize(module: &str, src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut line = 1;

    let err = |line: usize, message: String| CompileError::Syntax {
        module: module.to_string(),
        line,
        message,
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start_line = line;
                let is_doc = chars.get(i + 2) == Some(&'*') && chars.get(i + 3) != Some(&'/');
                let body_start = if is_doc { i + 3 } else { i + 2 };
                let mut j = body_start;
                loop {
                    if j + 1 >= chars.len() {
                        return Err(err(start_line, "unterminated comment".into()));
                    }
                    if chars[j] == '*' && chars[j + 1] == '/' {
                        break;
                    }
                    if chars[j] == '\n' {
                        line += 1;
                    }
                    j += 1;
                }
                if is_doc {
                    let body: String = chars[body_start..j].iter().collect();
                    out.push(Token { tok: Tok::Doc(body), line: start_line });
                }
                i = j + 2;
            }
            '"' | '\'' | '`' => {
                let quote = c;
                let mut j = i + 1;
                let mut s = String::new();
                loop {
                    match chars.get(j) {
                        None | Some('\n') => {
                            return Err(err(line, "unterminated string literal".into()));
                        }
                        Some(&ch) if ch == quote => break,
                        Some('\\') => {
                            let escaped = chars.get(j + 1).copied().unwrap_or('\\');
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                            j += 2;
                        }
                        Some(&ch) => {
                            if quote == '`' && ch == '$' && chars.get(j + 1) == Some(&'{') {
                                return Err(err(line, "template literal types are not supported".into()));
                            }
                            s.push(ch);
                            j += 1;
                        }
                    }
                }
                out.push(Token { tok: Tok::Str(s), line });
                i = j + 1;
            }
            '=' if chars.get(i + 1) == Some(&'>') => {
                out.push(Token { tok: Tok::Arrow, line });
                i += 2;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.' || chars[j] == '_') {
                    j += 1;
                }
                let text: String = chars[i..j].iter().filter(|ch| **ch != '_').collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| err(line, format!("invalid numeric literal `{text}`")))?;
                out.push(Token { tok: Tok::Num(n), line });
                i = j;
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '$') {
                    j += 1;
                }
                out.push(Token { tok: Tok::Ident(chars[i..j].iter().collect()), line });
                i = j;
            }
            c if PUNCT.contains(&c) => {
                out.push(Token { tok: Tok::Punct(c), line });
                i += 1;
            }
            other => return Err(err(line, format!("unexpected character `{other}`"))),
        }
    }
    out.push(Token { tok: Tok::Eof, line });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize("m.ts", src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn keeps_doc_comments_and_drops_plain_ones() {
        let got = toks("/** @format uuid */ // trailing\n/* plain */ type A = string");
        assert_eq!(got[0], Tok::Doc(" @format uuid ".into()));
        assert_eq!(got[1], Tok::Ident("type".into()));
        assert_eq!(got.len(), 6);
    }

    #[test]
    fn negative_numbers_and_generic_closers() {
        let got = toks("-1 Array<Array<T>>");
        assert_eq!(got[0], Tok::Num(-1.0));
        assert_eq!(got[got.len() - 3], Tok::Punct('>'));
        assert_eq!(got[got.len() - 2], Tok::Punct('>'));
    }

    #[test]
    fn tracks_lines_across_doc_comments() {
        let tokens = tokenize("m.ts", "/**\n * a\n */\ntype X = 1").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 4);
    }

    #[test]
    fn rejects_template_literal_types() {
        let err = tokenize("m.ts", "type A = `x-${string}`").unwrap_err();
        assert_eq!(err.kind(), "SyntaxError");
    }
}
