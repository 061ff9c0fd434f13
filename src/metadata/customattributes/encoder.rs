use crate::{
    file::writer::Writer,
    metadata::customattributes::{
        ArgumentType, CustomAttributeArgument, CustomAttributeNamedArgument, CustomAttributeValue,
        NamedArgumentKind, SERIALIZATION_TYPE,
    },
    Result,
};

/// Encode a custom attribute value
///
/// Fixed arguments are written as their values; the constructor signature is not needed.
///
/// # Errors
/// Returns an error if a string or array does not fit the blob encoding
pub fn encode_custom_attribute(value: &CustomAttributeValue) -> Result<Vec<u8>> {
    let mut writer = Writer::with_capacity(16);
    writer.write_le::<u16>(0x0001);

    for argument in &value.fixed_args {
        write_value(&mut writer, argument)?;
    }

    let Ok(named_count) = u16::try_from(value.named_args.len()) else {
        return Err(invalid_operation!(
            "too many named arguments - {}",
            value.named_args.len()
        ));
    };
    writer.write_le::<u16>(named_count);
    for named in &value.named_args {
        write_named_argument(&mut writer, named)?;
    }

    Ok(writer.into_inner())
}

pub(crate) fn write_named_argument(
    writer: &mut Writer,
    named: &CustomAttributeNamedArgument,
) -> Result<()> {
    writer.write_le::<u8>(match named.kind {
        NamedArgumentKind::Field => SERIALIZATION_TYPE::FIELD,
        NamedArgumentKind::Property => SERIALIZATION_TYPE::PROPERTY,
    });
    write_ser_type(writer, &named.arg_type)?;
    writer.write_ser_string(Some(named.name.as_str()))?;
    write_value(writer, &named.value)
}

fn write_ser_type(writer: &mut Writer, arg_type: &ArgumentType) -> Result<()> {
    let tag = match arg_type {
        ArgumentType::Boolean => SERIALIZATION_TYPE::BOOLEAN,
        ArgumentType::Char => SERIALIZATION_TYPE::CHAR,
        ArgumentType::I1 => SERIALIZATION_TYPE::I1,
        ArgumentType::U1 => SERIALIZATION_TYPE::U1,
        ArgumentType::I2 => SERIALIZATION_TYPE::I2,
        ArgumentType::U2 => SERIALIZATION_TYPE::U2,
        ArgumentType::I4 => SERIALIZATION_TYPE::I4,
        ArgumentType::U4 => SERIALIZATION_TYPE::U4,
        ArgumentType::I8 => SERIALIZATION_TYPE::I8,
        ArgumentType::U8 => SERIALIZATION_TYPE::U8,
        ArgumentType::R4 => SERIALIZATION_TYPE::R4,
        ArgumentType::R8 => SERIALIZATION_TYPE::R8,
        ArgumentType::String => SERIALIZATION_TYPE::STRING,
        ArgumentType::Type => SERIALIZATION_TYPE::TYPE,
        ArgumentType::Object => SERIALIZATION_TYPE::TAGGED_OBJECT,
        ArgumentType::SzArray(element) => {
            writer.write_le::<u8>(SERIALIZATION_TYPE::SZARRAY);
            return write_ser_type(writer, element);
        }
        ArgumentType::Enum { type_name, .. } => {
            writer.write_le::<u8>(SERIALIZATION_TYPE::ENUM);
            return writer.write_ser_string(Some(type_name.as_str()));
        }
    };

    writer.write_le::<u8>(tag);
    Ok(())
}

fn write_value(writer: &mut Writer, argument: &CustomAttributeArgument) -> Result<()> {
    match argument {
        CustomAttributeArgument::Bool(value) => writer.write_le::<u8>(u8::from(*value)),
        CustomAttributeArgument::Char(value) => writer.write_le::<u16>(*value),
        CustomAttributeArgument::I1(value) => writer.write_le::<i8>(*value),
        CustomAttributeArgument::U1(value) => writer.write_le::<u8>(*value),
        CustomAttributeArgument::I2(value) => writer.write_le::<i16>(*value),
        CustomAttributeArgument::U2(value) => writer.write_le::<u16>(*value),
        CustomAttributeArgument::I4(value) => writer.write_le::<i32>(*value),
        CustomAttributeArgument::U4(value) => writer.write_le::<u32>(*value),
        CustomAttributeArgument::I8(value) => writer.write_le::<i64>(*value),
        CustomAttributeArgument::U8(value) => writer.write_le::<u64>(*value),
        CustomAttributeArgument::R4(value) => writer.write_le::<f32>(*value),
        CustomAttributeArgument::R8(value) => writer.write_le::<f64>(*value),
        CustomAttributeArgument::String(value) | CustomAttributeArgument::Type(value) => {
            writer.write_ser_string(value.as_deref())?;
        }
        CustomAttributeArgument::Enum { value, .. } => write_value(writer, value)?,
        CustomAttributeArgument::Array { values, .. } => match values {
            None => writer.write_le::<u32>(u32::MAX),
            Some(values) => {
                let Ok(count) = u32::try_from(values.len()) else {
                    return Err(invalid_operation!("array too large - {}", values.len()));
                };
                writer.write_le::<u32>(count);
                for value in values {
                    write_value(writer, value)?;
                }
            }
        },
        CustomAttributeArgument::Boxed(value) => {
            write_ser_type(writer, &value.arg_type())?;
            write_value(writer, value)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::customattributes::parse_custom_attribute;

    #[test]
    fn crafted() {
        let value = CustomAttributeValue {
            fixed_args: vec![
                CustomAttributeArgument::String(Some("hi".to_string())),
                CustomAttributeArgument::I4(7),
            ],
            named_args: vec![CustomAttributeNamedArgument {
                kind: NamedArgumentKind::Property,
                arg_type: ArgumentType::Boolean,
                name: "Flag".to_string(),
                value: CustomAttributeArgument::Bool(true),
            }],
        };

        #[rustfmt::skip]
        let expected = vec![
            0x01, 0x00,
            0x02, b'h', b'i',
            0x07, 0x00, 0x00, 0x00,
            0x01, 0x00,
            0x54, 0x02, 0x04, b'F', b'l', b'a', b'g', 0x01,
        ];
        assert_eq!(encode_custom_attribute(&value).unwrap(), expected);
    }

    #[test]
    fn boxed_enum_survives() {
        let value = CustomAttributeValue {
            fixed_args: vec![CustomAttributeArgument::Boxed(Box::new(
                CustomAttributeArgument::Enum {
                    type_name: "N.Color".to_string(),
                    value: Box::new(CustomAttributeArgument::U1(3)),
                },
            ))],
            named_args: vec![],
        };

        let blob = encode_custom_attribute(&value).unwrap();
        assert_eq!(&blob[2..5], &[0x55, 0x07, b'N']);

        let decoded = parse_custom_attribute(&blob, &[ArgumentType::Object], |name: &str| {
            assert_eq!(name, "N.Color");
            Ok(ArgumentType::U1)
        })
        .unwrap();
        assert_eq!(decoded, value);
    }
}
