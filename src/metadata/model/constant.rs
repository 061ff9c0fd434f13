//! Default values, the `Constant` table (ECMA-335 II.22.9).

use crate::{
    file::parser::Parser,
    metadata::signatures::ELEMENT_TYPE,
    Result,
};

/// A decoded default value
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// bool
    Boolean(bool),
    /// UTF-16 code unit
    Char(u16),
    /// signed 8bit integer
    I1(i8),
    /// unsigned 8bit integer
    U1(u8),
    /// signed 16bit integer
    I2(i16),
    /// unsigned 16bit integer
    U2(u16),
    /// signed 32bit integer
    I4(i32),
    /// unsigned 32bit integer
    U4(u32),
    /// signed 64bit integer
    I8(i64),
    /// unsigned 64bit integer
    U8(u64),
    /// 32bit floating-point
    R4(f32),
    /// 64bit floating-point
    R8(f64),
    /// A string, stored as UTF-16
    String(String),
    /// The null reference
    Null,
}

/// A default value as stored in the tables: element type plus little-endian payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    /// Element type of the value, `CLASS` for null
    pub element_type: u8,
    /// The raw payload from the blob heap
    pub value: Vec<u8>,
}

impl Constant {
    /// Encode a value
    #[must_use]
    pub fn new(value: &ConstantValue) -> Self {
        let (element_type, value) = match value {
            ConstantValue::Boolean(value) => (ELEMENT_TYPE::BOOLEAN, vec![u8::from(*value)]),
            ConstantValue::Char(value) => (ELEMENT_TYPE::CHAR, value.to_le_bytes().to_vec()),
            ConstantValue::I1(value) => (ELEMENT_TYPE::I1, value.to_le_bytes().to_vec()),
            ConstantValue::U1(value) => (ELEMENT_TYPE::U1, vec![*value]),
            ConstantValue::I2(value) => (ELEMENT_TYPE::I2, value.to_le_bytes().to_vec()),
            ConstantValue::U2(value) => (ELEMENT_TYPE::U2, value.to_le_bytes().to_vec()),
            ConstantValue::I4(value) => (ELEMENT_TYPE::I4, value.to_le_bytes().to_vec()),
            ConstantValue::U4(value) => (ELEMENT_TYPE::U4, value.to_le_bytes().to_vec()),
            ConstantValue::I8(value) => (ELEMENT_TYPE::I8, value.to_le_bytes().to_vec()),
            ConstantValue::U8(value) => (ELEMENT_TYPE::U8, value.to_le_bytes().to_vec()),
            ConstantValue::R4(value) => (ELEMENT_TYPE::R4, value.to_le_bytes().to_vec()),
            ConstantValue::R8(value) => (ELEMENT_TYPE::R8, value.to_le_bytes().to_vec()),
            ConstantValue::String(value) => (
                ELEMENT_TYPE::STRING,
                value.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            ),
            ConstantValue::Null => (ELEMENT_TYPE::CLASS, vec![0, 0, 0, 0]),
        };

        Constant {
            element_type,
            value,
        }
    }

    /// Decode the payload
    ///
    /// # Errors
    /// Returns an error if the payload is too short or the element type is not valid for
    /// a constant
    pub fn value(&self) -> Result<ConstantValue> {
        let mut parser = Parser::new(&self.value);
        Ok(match self.element_type {
            ELEMENT_TYPE::BOOLEAN => ConstantValue::Boolean(parser.read_le::<u8>()? != 0),
            ELEMENT_TYPE::CHAR => ConstantValue::Char(parser.read_le::<u16>()?),
            ELEMENT_TYPE::I1 => ConstantValue::I1(parser.read_le::<i8>()?),
            ELEMENT_TYPE::U1 => ConstantValue::U1(parser.read_le::<u8>()?),
            ELEMENT_TYPE::I2 => ConstantValue::I2(parser.read_le::<i16>()?),
            ELEMENT_TYPE::U2 => ConstantValue::U2(parser.read_le::<u16>()?),
            ELEMENT_TYPE::I4 => ConstantValue::I4(parser.read_le::<i32>()?),
            ELEMENT_TYPE::U4 => ConstantValue::U4(parser.read_le::<u32>()?),
            ELEMENT_TYPE::I8 => ConstantValue::I8(parser.read_le::<i64>()?),
            ELEMENT_TYPE::U8 => ConstantValue::U8(parser.read_le::<u64>()?),
            ELEMENT_TYPE::R4 => ConstantValue::R4(parser.read_le::<f32>()?),
            ELEMENT_TYPE::R8 => ConstantValue::R8(parser.read_le::<f64>()?),
            ELEMENT_TYPE::STRING => {
                if self.value.len() % 2 != 0 {
                    return Err(malformed_error!(
                        "String constant of odd length - {}",
                        self.value.len()
                    ));
                }

                let units: Vec<u16> = self
                    .value
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                ConstantValue::String(String::from_utf16_lossy(&units))
            }
            ELEMENT_TYPE::CLASS => ConstantValue::Null,
            _ => {
                return Err(malformed_error!(
                    "Invalid constant type - 0x{:02X}",
                    self.element_type
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let constant = Constant {
            element_type: ELEMENT_TYPE::I4,
            value: vec![0xFE, 0xFF, 0xFF, 0xFF],
        };
        assert_eq!(constant.value().unwrap(), ConstantValue::I4(-2));

        let text = Constant::new(&ConstantValue::String("hi".to_string()));
        assert_eq!(text.value, vec![b'h', 0x00, b'i', 0x00]);
        assert_eq!(text.value().unwrap(), ConstantValue::String("hi".to_string()));

        let null = Constant::new(&ConstantValue::Null);
        assert_eq!(null.element_type, ELEMENT_TYPE::CLASS);
        assert_eq!(null.value().unwrap(), ConstantValue::Null);
    }

    #[test]
    fn invalid() {
        let short = Constant {
            element_type: ELEMENT_TYPE::I8,
            value: vec![0x01, 0x02],
        };
        assert!(short.value().is_err());

        let odd = Constant {
            element_type: ELEMENT_TYPE::STRING,
            value: vec![0x41],
        };
        assert!(odd.value().is_err());

        let bad = Constant {
            element_type: ELEMENT_TYPE::OBJECT,
            value: vec![],
        };
        assert!(bad.value().is_err());
    }
}
