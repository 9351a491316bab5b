use super::decode_entities;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

/// Split markup into tags and decoded text. Tag and attribute names are lowercased, comments dropped.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];

        if rest.starts_with("<!--") {
            let end = rest
                .find("-->")
                .ok_or_else(|| syntax(pos, "unterminated comment"))?;
            pos += end + 3;
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').ok_or_else(|| syntax(pos, "unterminated closing tag"))?;
            let name = after[..end].trim().to_ascii_lowercase();
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
                return Err(syntax(pos, format!("invalid closing tag `</{}>`", name)));
            }
            tokens.push(Token::End { name });
            pos += end + 3;
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (token, consumed) = start_tag(rest).map_err(|reason| syntax(pos, reason))?;
            tokens.push(token);
            pos += consumed;
        } else if rest.starts_with('<') {
            return Err(syntax(pos, "unescaped `<`"));
        } else {
            let end = rest.find('<').unwrap_or(rest.len());
            tokens.push(Token::Text(decode_entities(&rest[..end])));
            pos += end;
        }
    }

    Ok(tokens)
}

fn start_tag(s: &str) -> std::result::Result<(Token, usize), String> {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    let name = s[1..i].to_ascii_lowercase();
    let mut attrs = Vec::new();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            None => return Err(format!("unterminated tag <{}>", name)),
            Some(b'>') => {
                let token = Token::Start {
                    name,
                    attrs,
                    self_closing: false,
                };
                return Ok((token, i + 1));
            }
            Some(b'/') if bytes.get(i + 1) == Some(&b'>') => {
                let token = Token::Start {
                    name,
                    attrs,
                    self_closing: true,
                };
                return Ok((token, i + 2));
            }
            Some(_) => {}
        }

        let start = i;
        while i < bytes.len() && !matches!(bytes[i], b'=' | b'>' | b'/' | b'"' | b'\'') && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if start == i {
            return Err(format!("invalid attribute in <{}>", name));
        }
        let attr = s[start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let close = s[i + 1..]
                        .find(quote as char)
                        .ok_or_else(|| format!("unterminated value for `{}`", attr))?;
                    value = decode_entities(&s[i + 1..i + 1 + close]);
                    i += close + 2;
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && bytes[i] != b'>' && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    value = decode_entities(&s[start..i]);
                }
            }
        }
        attrs.push((attr, value));
    }
}

fn syntax(offset: usize, reason: impl Into<String>) -> Error {
    Error::malformed(&[], "#markup", format!("{} at byte {}", reason.into(), offset))
}
