//! Best-effort parsing of a JSON document that is still being generated.
//!
//! The provider streams one JSON object a few tokens at a time, so the
//! accumulated text is almost always a truncated prefix. [`parse_partial`]
//! reads such a prefix and closes whatever is still open: strings, arrays,
//! objects and `true`/`false`/`null` literals. Pieces that cannot be closed
//! meaningfully (an object key without its value, a number tail like `1.`,
//! a half-written escape sequence) are dropped.

use serde_json::{Map, Number, Value};

/// Outcome of parsing an accumulated prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialParse {
    /// The text is a complete JSON document.
    Complete(Value),
    /// The text was a truncated prefix; this is its best-effort completion.
    Repaired(Value),
    /// Nothing usable: empty input or a syntax error.
    Failed,
}

impl PartialParse {
    pub fn value(self) -> Option<Value> {
        match self {
            PartialParse::Complete(v) | PartialParse::Repaired(v) => Some(v),
            PartialParse::Failed => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, PartialParse::Complete(_))
    }
}

/// Nesting deeper than this is treated as a syntax error, like serde_json.
pub const MAX_DEPTH: usize = 128;

/// Parse `text` as a possibly truncated JSON document.
pub fn parse_partial(text: &str) -> PartialParse {
    let mut parser = Parser {
        src: text,
        bytes: text.as_bytes(),
        pos: 0,
        depth: 0,
    };
    match parser.value() {
        Ok(Step::Done(value)) => {
            parser.skip_ws();
            if parser.pos == parser.bytes.len() {
                PartialParse::Complete(value)
            } else {
                PartialParse::Failed
            }
        }
        Ok(Step::Truncated(Some(value))) => PartialParse::Repaired(value),
        Ok(Step::Truncated(None)) | Err(SyntaxError) => PartialParse::Failed,
    }
}

/// A value was either read to its closing token, or input ran out first.
enum Step<T> {
    Done(T),
    Truncated(Option<T>),
}

#[derive(Debug)]
struct SyntaxError;

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Step<Value>, SyntaxError> {
        self.skip_ws();
        match self.peek() {
            None => Ok(Step::Truncated(None)),
            Some(open @ (b'{' | b'[')) => {
                if self.depth == MAX_DEPTH {
                    return Err(SyntaxError);
                }
                self.depth += 1;
                let step = if open == b'{' {
                    self.object()
                } else {
                    self.array()
                };
                self.depth -= 1;
                step
            }
            Some(b'"') => Ok(match self.string()? {
                Step::Done(s) => Step::Done(Value::String(s)),
                Step::Truncated(s) => Step::Truncated(s.map(Value::String)),
            }),
            Some(b't') => self.literal("true", Value::Bool(true)),
            Some(b'f') => self.literal("false", Value::Bool(false)),
            Some(b'n') => self.literal("null", Value::Null),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(_) => Err(SyntaxError),
        }
    }

    fn object(&mut self) -> Result<Step<Value>, SyntaxError> {
        self.pos += 1;
        let mut map = Map::new();
        let mut after_comma = false;

        loop {
            self.skip_ws();
            match self.peek() {
                None => return Ok(Step::Truncated(Some(Value::Object(map)))),
                Some(b'}') if !after_comma => {
                    self.pos += 1;
                    return Ok(Step::Done(Value::Object(map)));
                }
                Some(b'"') => {}
                Some(_) => return Err(SyntaxError),
            }

            // A key cut off mid-way carries no value yet.
            let key = match self.string()? {
                Step::Done(key) => key,
                Step::Truncated(_) => return Ok(Step::Truncated(Some(Value::Object(map)))),
            };

            self.skip_ws();
            match self.peek() {
                None => return Ok(Step::Truncated(Some(Value::Object(map)))),
                Some(b':') => self.pos += 1,
                Some(_) => return Err(SyntaxError),
            }

            match self.value()? {
                Step::Done(value) => {
                    map.insert(key, value);
                }
                Step::Truncated(value) => {
                    if let Some(value) = value {
                        map.insert(key, value);
                    }
                    return Ok(Step::Truncated(Some(Value::Object(map))));
                }
            }

            self.skip_ws();
            match self.peek() {
                None => return Ok(Step::Truncated(Some(Value::Object(map)))),
                Some(b',') => {
                    self.pos += 1;
                    after_comma = true;
                }
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Step::Done(Value::Object(map)));
                }
                Some(_) => return Err(SyntaxError),
            }
        }
    }

    fn array(&mut self) -> Result<Step<Value>, SyntaxError> {
        self.pos += 1;
        let mut items = Vec::new();

        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Step::Done(Value::Array(items)));
        }

        loop {
            match self.value()? {
                Step::Done(value) => items.push(value),
                Step::Truncated(value) => {
                    items.extend(value);
                    return Ok(Step::Truncated(Some(Value::Array(items))));
                }
            }

            self.skip_ws();
            match self.peek() {
                None => return Ok(Step::Truncated(Some(Value::Array(items)))),
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(b']') {
                        return Err(SyntaxError);
                    }
                }
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Step::Done(Value::Array(items)));
                }
                Some(_) => return Err(SyntaxError),
            }
        }
    }

    fn string(&mut self) -> Result<Step<String>, SyntaxError> {
        let open = self.pos;
        let mut i = open + 1;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' => {
                    let decoded: String =
                        serde_json::from_str(&self.src[open..=i]).map_err(|_| SyntaxError)?;
                    self.pos = i + 1;
                    return Ok(Step::Done(decoded));
                }
                b'\\' => i += 2,
                _ => i += 1,
            }
        }
        self.pos = self.bytes.len();
        Ok(Step::Truncated(close_truncated_string(&self.src[open + 1..])))
    }

    fn literal(&mut self, word: &str, value: Value) -> Result<Step<Value>, SyntaxError> {
        let rest = &self.bytes[self.pos..];
        let word = word.as_bytes();
        if rest.starts_with(word) {
            self.pos += word.len();
            Ok(Step::Done(value))
        } else if word.starts_with(rest) {
            self.pos = self.bytes.len();
            Ok(Step::Truncated(Some(value)))
        } else {
            Err(SyntaxError)
        }
    }

    fn number(&mut self) -> Result<Step<Value>, SyntaxError> {
        let start = self.pos;
        while let Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') = self.peek() {
            self.pos += 1;
        }
        let at_end = self.pos == self.bytes.len();
        match serde_json::from_str::<Number>(&self.src[start..self.pos]) {
            Ok(n) => Ok(Step::Done(Value::Number(n))),
            Err(_) if at_end => Ok(Step::Truncated(None)),
            Err(_) => Err(SyntaxError),
        }
    }
}

/// Decode the body of a string whose closing quote has not arrived yet.
///
/// An escape sequence cut off at the end (`\`, `\u00`) is dropped, as is a
/// high surrogate still waiting for its pair.
fn close_truncated_string(body: &str) -> Option<String> {
    let bytes = body.as_bytes();
    let mut i = 0;
    let mut safe = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            match bytes.get(i + 1) {
                None => break,
                Some(b'u') if i + 6 > bytes.len() => break,
                Some(b'u') => i += 6,
                Some(_) => i += 2,
            }
        } else {
            i += 1;
        }
        // An escaped or hex position may land inside a multi-byte char.
        while !body.is_char_boundary(i) {
            i += 1;
        }
        safe = i;
    }

    let decode = |s: &str| serde_json::from_str::<String>(&format!("\"{s}\"")).ok();
    let body = &body[..safe];
    decode(body).or_else(|| decode(&body[..trailing_high_surrogate(body)?]))
}

/// Byte offset of a `\uD800`..`\uDBFF` escape ending `body`, if there is one.
fn trailing_high_surrogate(body: &str) -> Option<usize> {
    let cut = body.len().checked_sub(6)?;
    let tail = body.get(cut..)?;
    let hex = tail.strip_prefix("\\u")?;
    let unit = u16::from_str_radix(hex, 16).ok()?;
    (0xD800..=0xDBFF).contains(&unit).then_some(cut)
}
