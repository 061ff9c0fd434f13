use crate::{
    file::parser::Parser,
    metadata::customattributes::{
        ArgumentType, CustomAttributeArgument, CustomAttributeNamedArgument, CustomAttributeValue,
        NamedArgumentKind, SERIALIZATION_TYPE,
    },
    Result,
};

/// Decoder for custom attribute blobs
///
/// Fixed arguments decode positionally against the constructor parameter types, named
/// arguments carry their own types. Enum names that only show up in the blob (named
/// arguments, boxed values) are mapped onto their underlying primitive type by the
/// `resolve_enum` callback; a failure there is a hard error since the value width is
/// unknown without it.
pub struct CustomAttributeParser<'a, F>
where
    F: FnMut(&str) -> Result<ArgumentType>,
{
    parser: Parser<'a>,
    resolve_enum: F,
}

impl<'a, F> CustomAttributeParser<'a, F>
where
    F: FnMut(&str) -> Result<ArgumentType>,
{
    /// Create a parser over a blob
    pub fn new(data: &'a [u8], resolve_enum: F) -> Self {
        CustomAttributeParser {
            parser: Parser::new(data),
            resolve_enum,
        }
    }

    /// Parse a complete attribute value
    ///
    /// ## Arguments
    /// * 'fixed_types' - Parameter types of the constructor
    ///
    /// # Errors
    /// Returns an error for a missing prolog, truncated data or an unresolvable enum
    pub fn parse(mut self, fixed_types: &[ArgumentType]) -> Result<CustomAttributeValue> {
        let prolog = self.parser.read_le::<u16>()?;
        if prolog != 0x0001 {
            return Err(malformed_error!(
                "Invalid custom attribute prolog - 0x{:04X}",
                prolog
            ));
        }

        let mut fixed_args = Vec::with_capacity(fixed_types.len());
        for arg_type in fixed_types {
            fixed_args.push(self.parse_value(arg_type)?);
        }

        let named_count = self.parser.read_le::<u16>()?;
        let mut named_args = Vec::with_capacity(usize::from(named_count));
        for _ in 0..named_count {
            named_args.push(self.parse_named_argument()?);
        }

        Ok(CustomAttributeValue {
            fixed_args,
            named_args,
        })
    }

    /// Parse a permission set blob in the binary `.` format
    pub(crate) fn parse_permission_set(
        mut self,
    ) -> Result<Vec<(String, Vec<CustomAttributeNamedArgument>)>> {
        let marker = self.parser.read_le::<u8>()?;
        if marker != b'.' {
            return Err(malformed_error!(
                "Invalid permission set marker - 0x{:02X}",
                marker
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut attributes = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            let Some(type_name) = self.parser.read_ser_string()? else {
                return Err(malformed_error!("Permission without a type name"));
            };

            let blob_length = self.parser.read_compressed_uint()? as usize;
            let end = self.parser.pos() + blob_length;

            let named_count = self.parser.read_compressed_uint()?;
            let mut named_args = Vec::with_capacity(named_count.min(64) as usize);
            for _ in 0..named_count {
                named_args.push(self.parse_named_argument()?);
            }

            if self.parser.pos() != end {
                return Err(malformed_error!(
                    "Permission {} - blob length mismatch",
                    type_name
                ));
            }
            attributes.push((type_name, named_args));
        }

        Ok(attributes)
    }

    fn parse_named_argument(&mut self) -> Result<CustomAttributeNamedArgument> {
        let kind = match self.parser.read_le::<u8>()? {
            SERIALIZATION_TYPE::FIELD => NamedArgumentKind::Field,
            SERIALIZATION_TYPE::PROPERTY => NamedArgumentKind::Property,
            other => {
                return Err(malformed_error!(
                    "Invalid named argument kind - 0x{:02X}",
                    other
                ))
            }
        };

        let arg_type = self.parse_ser_type()?;
        let Some(name) = self.parser.read_ser_string()? else {
            return Err(malformed_error!("Named argument without a name"));
        };
        let value = self.parse_value(&arg_type)?;

        Ok(CustomAttributeNamedArgument {
            kind,
            arg_type,
            name,
            value,
        })
    }

    fn parse_ser_type(&mut self) -> Result<ArgumentType> {
        let tag = self.parser.read_le::<u8>()?;
        Ok(match tag {
            SERIALIZATION_TYPE::BOOLEAN => ArgumentType::Boolean,
            SERIALIZATION_TYPE::CHAR => ArgumentType::Char,
            SERIALIZATION_TYPE::I1 => ArgumentType::I1,
            SERIALIZATION_TYPE::U1 => ArgumentType::U1,
            SERIALIZATION_TYPE::I2 => ArgumentType::I2,
            SERIALIZATION_TYPE::U2 => ArgumentType::U2,
            SERIALIZATION_TYPE::I4 => ArgumentType::I4,
            SERIALIZATION_TYPE::U4 => ArgumentType::U4,
            SERIALIZATION_TYPE::I8 => ArgumentType::I8,
            SERIALIZATION_TYPE::U8 => ArgumentType::U8,
            SERIALIZATION_TYPE::R4 => ArgumentType::R4,
            SERIALIZATION_TYPE::R8 => ArgumentType::R8,
            SERIALIZATION_TYPE::STRING => ArgumentType::String,
            SERIALIZATION_TYPE::TYPE => ArgumentType::Type,
            SERIALIZATION_TYPE::TAGGED_OBJECT => ArgumentType::Object,
            SERIALIZATION_TYPE::SZARRAY => ArgumentType::SzArray(Box::new(self.parse_ser_type()?)),
            SERIALIZATION_TYPE::ENUM => {
                let Some(type_name) = self.parser.read_ser_string()? else {
                    return Err(malformed_error!("Enum argument without a type name"));
                };
                let underlying = (self.resolve_enum)(&type_name)?;
                ArgumentType::Enum {
                    type_name,
                    underlying: Box::new(underlying),
                }
            }
            _ => {
                return Err(malformed_error!(
                    "Invalid serialization type - 0x{:02X}",
                    tag
                ))
            }
        })
    }

    fn parse_value(&mut self, arg_type: &ArgumentType) -> Result<CustomAttributeArgument> {
        Ok(match arg_type {
            ArgumentType::Boolean => {
                CustomAttributeArgument::Bool(self.parser.read_le::<u8>()? != 0)
            }
            ArgumentType::Char => CustomAttributeArgument::Char(self.parser.read_le::<u16>()?),
            ArgumentType::I1 => CustomAttributeArgument::I1(self.parser.read_le::<i8>()?),
            ArgumentType::U1 => CustomAttributeArgument::U1(self.parser.read_le::<u8>()?),
            ArgumentType::I2 => CustomAttributeArgument::I2(self.parser.read_le::<i16>()?),
            ArgumentType::U2 => CustomAttributeArgument::U2(self.parser.read_le::<u16>()?),
            ArgumentType::I4 => CustomAttributeArgument::I4(self.parser.read_le::<i32>()?),
            ArgumentType::U4 => CustomAttributeArgument::U4(self.parser.read_le::<u32>()?),
            ArgumentType::I8 => CustomAttributeArgument::I8(self.parser.read_le::<i64>()?),
            ArgumentType::U8 => CustomAttributeArgument::U8(self.parser.read_le::<u64>()?),
            ArgumentType::R4 => CustomAttributeArgument::R4(self.parser.read_le::<f32>()?),
            ArgumentType::R8 => CustomAttributeArgument::R8(self.parser.read_le::<f64>()?),
            ArgumentType::String => CustomAttributeArgument::String(self.parser.read_ser_string()?),
            ArgumentType::Type => CustomAttributeArgument::Type(self.parser.read_ser_string()?),
            ArgumentType::Object => {
                let boxed_type = self.parse_ser_type()?;
                if boxed_type == ArgumentType::Object {
                    return Err(malformed_error!("Boxed value of type object"));
                }
                CustomAttributeArgument::Boxed(Box::new(self.parse_value(&boxed_type)?))
            }
            ArgumentType::Enum {
                type_name,
                underlying,
            } => CustomAttributeArgument::Enum {
                type_name: type_name.clone(),
                value: Box::new(self.parse_value(underlying)?),
            },
            ArgumentType::SzArray(element_type) => {
                let count = self.parser.read_le::<u32>()?;
                let values = if count == u32::MAX {
                    None
                } else {
                    if count as usize > self.parser.remaining() {
                        return Err(malformed_error!(
                            "Array of {} elements exceeds the blob",
                            count
                        ));
                    }

                    let mut values = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        values.push(self.parse_value(element_type)?);
                    }
                    Some(values)
                };

                CustomAttributeArgument::Array {
                    element_type: (**element_type).clone(),
                    values,
                }
            }
        })
    }
}

/// Decode a custom attribute blob
///
/// # Errors
/// Returns an error if the blob is malformed or an enum type cannot be resolved
pub fn parse_custom_attribute<F>(
    data: &[u8],
    fixed_types: &[ArgumentType],
    resolve_enum: F,
) -> Result<CustomAttributeValue>
where
    F: FnMut(&str) -> Result<ArgumentType>,
{
    CustomAttributeParser::new(data, resolve_enum).parse(fixed_types)
}
