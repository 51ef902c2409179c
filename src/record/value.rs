use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{RecordError, RecordResult};

/// Fixed-width field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Int,         // 4 bytes
    Float,       // 8 bytes
    Char(usize), // n bytes, zero padded
}

impl FieldType {
    /// Get the size in bytes for this field type
    pub fn size(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Float => 8,
            FieldType::Char(n) => *n,
        }
    }

    /// Decode a single field from its packed bytes
    pub fn decode(&self, bytes: &[u8]) -> RecordResult<Value> {
        if bytes.len() != self.size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes for {}, got {}",
                self.size(),
                self,
                bytes.len()
            )));
        }

        match self {
            FieldType::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Value::Int(i32::from_le_bytes(buf)))
            }
            FieldType::Float => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(Value::Float(f64::from_le_bytes(buf)))
            }
            FieldType::Char(_) => {
                // Trailing zero bytes are padding
                let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                let s = std::str::from_utf8(&bytes[..end])
                    .map_err(|e| RecordError::Deserialization(e.to_string()))?;
                Ok(Value::Char(s.to_string()))
            }
        }
    }

    /// Encode a value into `out`, which must be exactly `size()` bytes
    pub fn encode(&self, value: &Value, out: &mut [u8]) -> RecordResult<()> {
        match (self, value) {
            (FieldType::Int, Value::Int(i)) => out.copy_from_slice(&i.to_le_bytes()),
            (FieldType::Float, Value::Float(f)) => out.copy_from_slice(&f.to_le_bytes()),
            (FieldType::Char(max_len), Value::Char(s)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len {
                    return Err(RecordError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        max_len
                    )));
                }
                out[..bytes.len()].copy_from_slice(bytes);
                out[bytes.len()..].fill(0);
            }
            _ => {
                return Err(RecordError::TypeMismatch {
                    expected: self.to_string(),
                    actual: format!("{:?}", value),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Float => write!(f, "float"),
            FieldType::Char(n) => write!(f, "char({})", n),
        }
    }
}

impl FromStr for FieldType {
    type Err = RecordError;

    fn from_str(s: &str) -> RecordResult<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "int" => return Ok(FieldType::Int),
            "float" => return Ok(FieldType::Float),
            _ => {}
        }

        let width = lowered
            .strip_prefix("char(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| RecordError::InvalidFieldType(s.to_string()))?;
        let width: usize = width
            .trim()
            .parse()
            .map_err(|_| RecordError::InvalidFieldType(s.to_string()))?;
        if width == 0 {
            return Err(RecordError::InvalidFieldType(s.to_string()));
        }
        Ok(FieldType::Char(width))
    }
}

impl TryFrom<String> for FieldType {
    type Error = RecordError;

    fn try_from(s: String) -> RecordResult<Self> {
        s.parse()
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> String {
        t.to_string()
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    Char(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Char(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_size() {
        assert_eq!(FieldType::Int.size(), 4);
        assert_eq!(FieldType::Float.size(), 8);
        assert_eq!(FieldType::Char(10).size(), 10);
    }

    #[test]
    fn test_parse_field_type() {
        assert_eq!("int".parse::<FieldType>().unwrap(), FieldType::Int);
        assert_eq!("FLOAT".parse::<FieldType>().unwrap(), FieldType::Float);
        assert_eq!("char(10)".parse::<FieldType>().unwrap(), FieldType::Char(10));
        assert!("char(0)".parse::<FieldType>().is_err());
        assert!("varchar".parse::<FieldType>().is_err());
        assert!("char(x)".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_char_padding() {
        let ty = FieldType::Char(8);
        let mut buf = [0xffu8; 8];
        ty.encode(&Value::Char("abc".to_string()), &mut buf).unwrap();
        assert_eq!(&buf, b"abc\0\0\0\0\0");
        assert_eq!(ty.decode(&buf).unwrap(), Value::Char("abc".to_string()));
    }

    #[test]
    fn test_char_too_long() {
        let mut buf = [0u8; 2];
        let result = FieldType::Char(2).encode(&Value::Char("abc".to_string()), &mut buf);
        assert!(matches!(result, Err(RecordError::Serialization(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let mut buf = [0u8; 4];
        let result = FieldType::Int.encode(&Value::Float(1.0), &mut buf);
        assert!(matches!(result, Err(RecordError::TypeMismatch { .. })));
    }

    #[test]
    fn test_decode_wrong_width() {
        let result = FieldType::Float.decode(&[0u8; 4]);
        assert!(matches!(result, Err(RecordError::Deserialization(_))));
    }
}
