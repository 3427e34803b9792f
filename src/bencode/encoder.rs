//! Serializes a [`BValue`] back to bytes.
//!
//! Output is canonical: integers without leading zeros, dictionary keys in
//! byte order. Re-encoding a decoded descriptor therefore reproduces the
//! exact bytes its info hash was computed over.

use crate::bencode::bvalue::BValue;
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::trace;

pub struct Encoder {
    output: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { output: Vec::new() }
    }

    /// Encodes a value and returns the accumulated bytes.
    pub fn encode(&mut self, value: &BValue) -> Result<Vec<u8>> {
        self.encode_value(value)?;
        Ok(std::mem::take(&mut self.output))
    }

    fn encode_value(&mut self, value: &BValue) -> Result<()> {
        match value {
            BValue::Integer(n) => self.encode_integer(*n),
            BValue::String(s) => self.encode_string(s),
            BValue::List(list) => self.encode_list(list),
            BValue::Dict(dict) => self.encode_dict(dict),
        }
    }

    /// Encodes an integer in the format: i<number>e
    fn encode_integer(&mut self, n: i64) -> Result<()> {
        self.output.push(b'i');
        self.output.extend_from_slice(n.to_string().as_bytes());
        self.output.push(b'e');
        Ok(())
    }

    /// Encodes a string in the format: <length>:<string>
    fn encode_string(&mut self, s: &[u8]) -> Result<()> {
        self.output.extend_from_slice(s.len().to_string().as_bytes());
        self.output.push(b':');
        self.output.extend_from_slice(s);
        Ok(())
    }

    /// Encodes a list in the format: l<bencoded values>e
    fn encode_list(&mut self, list: &[BValue]) -> Result<()> {
        self.output.push(b'l');
        for item in list {
            self.encode_value(item)?;
        }
        self.output.push(b'e');
        Ok(())
    }

    /// Encodes a dictionary in the format: d<bencoded string><bencoded value>e
    ///
    /// `BTreeMap` iteration keeps keys in the sorted order bencode requires.
    fn encode_dict(&mut self, dict: &BTreeMap<String, BValue>) -> Result<()> {
        trace!("encoding dict: {} keys", dict.len());
        self.output.push(b'd');
        for (key, value) in dict {
            self.encode_string(key.as_bytes())?;
            self.encode_value(value)?;
        }
        self.output.push(b'e');
        Ok(())
    }
}
