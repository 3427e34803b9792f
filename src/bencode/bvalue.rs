use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Display;

/// An untyped bencode value. Strings are raw bytes; descriptors carry
/// binary data (piece hashes) in them.
#[derive(Debug, Clone, PartialEq)]
pub enum BValue {
    /// `i42e`
    Integer(i64),
    /// `4:spam`
    String(Vec<u8>),
    List(Vec<BValue>),
    /// Keys are kept sorted, which is also the required encoding order.
    Dict(BTreeMap<String, BValue>),
}

impl BValue {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self)
    }

    pub fn get_dict(&self) -> Result<&BTreeMap<String, BValue>> {
        match self {
            BValue::Dict(dict) => Ok(dict),
            other => Err(anyhow::anyhow!("Expected dictionary, found {}", other.kind())),
        }
    }

    pub fn get_bytes(&self) -> Result<&[u8]> {
        match self {
            BValue::String(bytes) => Ok(bytes),
            other => Err(anyhow::anyhow!("Expected byte string, found {}", other.kind())),
        }
    }

    pub fn get_integer(&self) -> Result<i64> {
        match self {
            BValue::Integer(n) => Ok(*n),
            other => Err(anyhow::anyhow!("Expected integer, found {}", other.kind())),
        }
    }

    /// Looks up `key` when this value is a dictionary.
    pub fn get(&self, key: &str) -> Option<&BValue> {
        match self {
            BValue::Dict(dict) => dict.get(key),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            BValue::Integer(_) => "integer",
            BValue::String(_) => "string",
            BValue::List(_) => "list",
            BValue::Dict(_) => "dictionary",
        }
    }
}

fn is_printable(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (32..=126).contains(&b))
}

impl Display for BValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BValue::Integer(n) => write!(f, "{}", n),
            BValue::String(s) => {
                if is_printable(s) {
                    write!(f, "\"{}\"", String::from_utf8_lossy(s))
                } else {
                    write!(f, "\"{}\"", hex::encode(s))
                }
            }
            BValue::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            BValue::Dict(dict) => {
                write!(f, "{{")?;
                for (i, (key, value)) in dict.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\":{}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&BValue> for serde_json::Value {
    fn from(value: &BValue) -> Self {
        match value {
            BValue::Integer(n) => serde_json::Value::Number((*n).into()),
            BValue::String(s) => {
                if is_printable(s) {
                    serde_json::Value::String(String::from_utf8_lossy(s).into_owned())
                } else {
                    serde_json::Value::String(hex::encode(s))
                }
            }
            BValue::List(arr) => serde_json::Value::Array(arr.iter().map(|v| v.into()).collect()),
            BValue::Dict(map) => {
                let obj = map.iter().map(|(k, v)| (k.clone(), v.into())).collect();
                serde_json::Value::Object(obj)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let value = BValue::Dict(BTreeMap::from([
            ("n".to_string(), BValue::Integer(7)),
            ("s".to_string(), BValue::String(b"abc".to_vec())),
        ]));

        assert_eq!(value.get("n").unwrap().get_integer().unwrap(), 7);
        assert_eq!(value.get("s").unwrap().get_bytes().unwrap(), b"abc");
        assert!(value.get("missing").is_none());
        assert!(value.get("n").unwrap().get_bytes().is_err());
        assert!(BValue::Integer(1).get_dict().is_err());
    }

    #[test]
    fn test_binary_strings_render_as_hex() {
        let value = BValue::List(vec![
            BValue::String(vec![0x00, 0xff]),
            BValue::String(b"ok".to_vec()),
        ]);
        assert_eq!(value.to_string(), "[\"00ff\",\"ok\"]");
        assert_eq!(value.to_json(), serde_json::json!(["00ff", "ok"]));
    }
}
