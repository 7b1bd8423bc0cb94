//! Object parser
//!
//! Builds [`Object`] values from the token stream, including indirect
//! object wrappers (`n g obj ... endobj`) and streams.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId, Stream};
use crate::parser::lexer::{Lexer, Token};

/// Parse one object at the lexer's current position.
pub fn parse_object(lexer: &mut Lexer<'_>) -> Result<Object> {
    let token = lexer.next_token()?;
    parse_object_from(lexer, token)
}

fn parse_object_from(lexer: &mut Lexer<'_>, token: Token) -> Result<Object> {
    match token {
        Token::Integer(value) => try_parse_reference(lexer, value),
        Token::Real(value) => Ok(Object::Real(value)),
        Token::String(bytes) => Ok(Object::String(bytes)),
        Token::Name(name) => Ok(Object::Name(name)),
        Token::ArrayStart => parse_array(lexer),
        Token::DictStart => parse_dictionary_or_stream(lexer),
        Token::Keyword(keyword) => match keyword.as_str() {
            "true" => Ok(Object::Boolean(true)),
            "false" => Ok(Object::Boolean(false)),
            "null" => Ok(Object::Null),
            other => Err(PdfError::Format(format!(
                "Unexpected keyword '{other}' where an object was expected"
            ))),
        },
        other => Err(PdfError::Format(format!(
            "Unexpected token {other:?} where an object was expected"
        ))),
    }
}

/// An integer may begin an indirect reference (`n g R`). Look ahead for
/// the generation number and `R` keyword and fall back to the plain
/// integer when the pattern does not match.
fn try_parse_reference(lexer: &mut Lexer<'_>, value: i64) -> Result<Object> {
    let saved = lexer.pos();
    if value >= 0 {
        if let Ok(Token::Integer(generation)) = lexer.next_token() {
            if (0..=u16::MAX as i64).contains(&generation)
                && matches!(lexer.next_token(), Ok(Token::Keyword(ref k)) if k == "R")
            {
                return Ok(Object::Reference(ObjectId::new(
                    value as u32,
                    generation as u16,
                )));
            }
        }
    }
    lexer.seek(saved);
    Ok(Object::Integer(value))
}

fn parse_array(lexer: &mut Lexer<'_>) -> Result<Object> {
    let mut elements = Vec::new();
    loop {
        let token = lexer.next_token()?;
        match token {
            Token::ArrayEnd => break,
            Token::Eof => return Err(PdfError::Format("Unterminated array".to_string())),
            other => elements.push(parse_object_from(lexer, other)?),
        }
    }
    Ok(Object::Array(elements))
}

fn parse_dictionary_or_stream(lexer: &mut Lexer<'_>) -> Result<Object> {
    let mut dict = Dictionary::new();
    loop {
        let token = lexer.next_token()?;
        match token {
            Token::DictEnd => break,
            Token::Name(key) => {
                let value = parse_object(lexer)?;
                dict.set(key, value);
            }
            Token::Eof => return Err(PdfError::Format("Unterminated dictionary".to_string())),
            other => {
                return Err(PdfError::Format(format!(
                    "Expected name key in dictionary, found {other:?}"
                )))
            }
        }
    }

    // A stream keyword directly after the dictionary makes this a stream.
    if matches!(lexer.peek_token(), Ok(Token::Keyword(ref k)) if k == "stream") {
        lexer.expect_keyword("stream")?;
        let data = match dict.get_integer("Length") {
            Some(length) if length >= 0 => lexer.read_stream_data(length as usize)?.to_vec(),
            // Indirect or missing /Length: recover by scanning.
            _ => {
                let data = lexer.read_until_sequence(b"endstream")?;
                strip_trailing_eol(data).to_vec()
            }
        };
        // Tolerate an EOL before the endstream keyword.
        lexer.expect_keyword("endstream")?;
        return Ok(Object::Stream(Stream::with_dictionary(dict, data)));
    }

    Ok(Object::Dictionary(dict))
}

fn strip_trailing_eol(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && data[end - 1] == b'\r' {
        end -= 1;
    }
    &data[..end]
}

/// Parse an indirect object wrapper: `n g obj <object> endobj`.
pub fn parse_indirect_object(lexer: &mut Lexer<'_>) -> Result<(ObjectId, Object)> {
    let number = match lexer.next_token()? {
        Token::Integer(n) if n > 0 => n as u32,
        other => {
            return Err(PdfError::Format(format!(
                "Expected object number, found {other:?}"
            )))
        }
    };
    let generation = match lexer.next_token()? {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        other => {
            return Err(PdfError::Format(format!(
                "Expected generation number, found {other:?}"
            )))
        }
    };
    lexer.expect_keyword("obj")?;
    let object = parse_object(lexer)?;
    lexer.expect_keyword("endobj")?;
    Ok((ObjectId::new(number, generation), object))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Object {
        parse_object(&mut Lexer::new(input)).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse(b"42"), Object::Integer(42));
        assert_eq!(parse(b"3.5"), Object::Real(3.5));
        assert_eq!(parse(b"true"), Object::Boolean(true));
        assert_eq!(parse(b"null"), Object::Null);
        assert_eq!(parse(b"/Pages"), Object::name("Pages"));
        assert_eq!(parse(b"(text)"), Object::string("text"));
    }

    #[test]
    fn test_reference() {
        assert_eq!(
            parse(b"12 0 R"),
            Object::Reference(ObjectId::new(12, 0))
        );
    }

    #[test]
    fn test_integer_not_mistaken_for_reference() {
        // Three integers in an array: only a trailing R makes a reference.
        assert_eq!(
            parse(b"[1 2 3]"),
            Object::Array(vec![
                Object::Integer(1),
                Object::Integer(2),
                Object::Integer(3)
            ])
        );
    }

    #[test]
    fn test_mixed_array_with_references() {
        assert_eq!(
            parse(b"[1 0 R 5 2 0 R]"),
            Object::Array(vec![
                Object::Reference(ObjectId::new(1, 0)),
                Object::Integer(5),
                Object::Reference(ObjectId::new(2, 0)),
            ])
        );
    }

    #[test]
    fn test_nested_dictionary() {
        let obj = parse(b"<< /A << /B 1 >> /C [2] >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(
            dict.get_dict("A").and_then(|d| d.get_integer("B")),
            Some(1)
        );
    }

    #[test]
    fn test_stream_with_length() {
        let obj = parse(b"<< /Length 5 >>\nstream\nHELLO\nendstream");
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data(), b"HELLO");
    }

    #[test]
    fn test_stream_with_indirect_length_recovers() {
        let obj = parse(b"<< /Length 9 0 R >>\nstream\nDATA\nendstream");
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data(), b"DATA");
    }

    #[test]
    fn test_indirect_object() {
        let mut lexer = Lexer::new(b"7 0 obj\n<< /Type /Page >>\nendobj");
        let (id, object) = parse_indirect_object(&mut lexer).unwrap();
        assert_eq!(id, ObjectId::new(7, 0));
        assert_eq!(
            object.as_dict().and_then(|d| d.get_name("Type")),
            Some("Page")
        );
    }

    #[test]
    fn test_missing_endobj_is_error() {
        let mut lexer = Lexer::new(b"7 0 obj 42");
        assert!(parse_indirect_object(&mut lexer).is_err());
    }
}
