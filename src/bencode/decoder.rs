use anyhow::Result;
use std::collections::BTreeMap;
use tracing::error;

use super::bvalue::BValue;

/// Byte-oriented bencode decoder. Byte strings are kept verbatim so binary
/// fields such as `pieces` survive a decode.
pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Parses exactly one value; trailing bytes are an error.
    pub fn parse(&mut self) -> Result<BValue> {
        let value = self.parse_value()?;
        if self.position != self.input.len() {
            return Err(anyhow::anyhow!(
                "Trailing data after value at position {}",
                self.position
            ));
        }
        Ok(value)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn consume(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.position += 1;
        Some(b)
    }

    fn consume_until(&mut self, delimiter: u8) -> Result<&'a [u8]> {
        let start = self.position;
        while let Some(b) = self.consume() {
            if b == delimiter {
                return Ok(&self.input[start..self.position - 1]);
            }
        }
        Err(anyhow::anyhow!("Unexpected end of input"))
    }

    fn parse_value(&mut self) -> Result<BValue> {
        match self.peek() {
            Some(b'i') => Ok(BValue::Integer(self.parse_integer()?)),
            Some(b'l') => self.parse_list(),
            Some(b'd') => self.parse_dict(),
            Some(c) if c.is_ascii_digit() => Ok(BValue::String(self.parse_string()?)),
            Some(c) => {
                error!(
                    "Unhandled encoded value at position {}: {:?}",
                    self.position, c as char
                );
                Err(anyhow::anyhow!("Unhandled encoded value: {:?}", c as char))
            }
            None => Err(anyhow::anyhow!("Unexpected end of input")),
        }
    }

    fn parse_integer(&mut self) -> Result<i64> {
        self.consume(); // consume 'i'
        let digits = self.consume_until(b'e')?;
        Ok(std::str::from_utf8(digits)?.parse::<i64>()?)
    }

    fn parse_string(&mut self) -> Result<Vec<u8>> {
        let len_digits = self.consume_until(b':')?;
        let len = std::str::from_utf8(len_digits)?.parse::<usize>()?;

        let end = self
            .position
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| anyhow::anyhow!("String too short"))?;
        let bytes = self.input[self.position..end].to_vec();
        self.position = end;
        Ok(bytes)
    }

    fn parse_list(&mut self) -> Result<BValue> {
        self.consume(); // consume 'l'
        let mut values = Vec::new();

        while let Some(c) = self.peek() {
            if c == b'e' {
                self.consume();
                return Ok(BValue::List(values));
            }
            values.push(self.parse_value()?);
        }
        Err(anyhow::anyhow!("Unterminated list"))
    }

    fn parse_dict(&mut self) -> Result<BValue> {
        self.consume(); // consume 'd'
        let mut map = BTreeMap::new();

        while let Some(c) = self.peek() {
            if c == b'e' {
                self.consume();
                return Ok(BValue::Dict(map));
            }
            let key = match self.parse_value()? {
                BValue::String(s) => String::from_utf8_lossy(&s).into_owned(),
                _ => return Err(anyhow::anyhow!("Dictionary key must be a string")),
            };
            let value = self.parse_value()?;
            map.insert(key, value);
        }
        Err(anyhow::anyhow!("Unterminated dictionary"))
    }
}
