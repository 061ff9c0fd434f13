use crate::{
    file::writer::Writer,
    metadata::{
        model::TypeHandle,
        signatures::{
            LocalVarSig, MethodSig, PropertySig, RowTokens, TypeSig, CALLING_CONVENTION,
        },
        tables::TableId,
        token::Token,
    },
    Result,
};

/// Turns handles embedded in a signature into tokens of the module being written
pub trait TokenEncoder {
    /// Build-time `TypeDef` or `TypeRef` token of `handle`
    ///
    /// # Errors
    /// Returns an error if the handle cannot be expressed in the target module
    fn encode_type(&mut self, handle: TypeHandle) -> Result<Token>;
}

impl TokenEncoder for RowTokens {
    fn encode_type(&mut self, handle: TypeHandle) -> Result<Token> {
        Ok(match handle {
            TypeHandle::Definition(id) => {
                Token::from_parts(TableId::TypeDef, id.index() as u32 + 1)
            }
            TypeHandle::Reference(id) => {
                Token::from_parts(TableId::TypeRef, id.index() as u32 + 1)
            }
        })
    }
}

/// Structural mirror of [`crate::metadata::signatures::SignatureParser`]
pub struct SignatureEncoder<'e, E: TokenEncoder + ?Sized> {
    writer: Writer,
    tokens: &'e mut E,
}

impl<'e, E: TokenEncoder + ?Sized> SignatureEncoder<'e, E> {
    /// Create an encoder writing into a fresh buffer
    pub fn new(tokens: &'e mut E) -> Self {
        SignatureEncoder {
            writer: Writer::with_capacity(16),
            tokens,
        }
    }

    /// The encoded blob
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }

    fn write_handle(&mut self, handle: TypeHandle) -> Result<()> {
        let token = self.tokens.encode_type(handle)?;
        self.writer.write_compressed_token(token)
    }

    /// Encode a single type
    ///
    /// # Errors
    /// Returns an error if a handle cannot be encoded or a value does not fit the
    /// compressed integer range
    pub fn encode_type(&mut self, sig: &TypeSig) -> Result<()> {
        self.writer.write_le::<u8>(sig.element_type());
        match sig {
            TypeSig::Class(handle) | TypeSig::ValueType(handle) => self.write_handle(*handle),
            TypeSig::Ptr(inner)
            | TypeSig::ByRef(inner)
            | TypeSig::Pinned(inner)
            | TypeSig::SzArray(inner)
            | TypeSig::Sentinel(inner) => self.encode_type(inner),
            TypeSig::Array(shape) => {
                if shape.sizes.len() > shape.rank as usize
                    || shape.lower_bounds.len() > shape.rank as usize
                {
                    return Err(invalid_operation!(
                        "array of rank {} carries {} sizes and {} lower bounds",
                        shape.rank,
                        shape.sizes.len(),
                        shape.lower_bounds.len()
                    ));
                }

                self.encode_type(&shape.element)?;
                self.writer.write_compressed_uint(shape.rank)?;
                self.writer.write_compressed_uint(shape.sizes.len() as u32)?;
                for size in &shape.sizes {
                    self.writer.write_compressed_uint(*size)?;
                }
                self.writer
                    .write_compressed_uint(shape.lower_bounds.len() as u32)?;
                for bound in &shape.lower_bounds {
                    self.writer.write_compressed_int(*bound)?;
                }
                Ok(())
            }
            TypeSig::GenericInst { generic, arguments } => {
                if !matches!(**generic, TypeSig::Class(_) | TypeSig::ValueType(_)) {
                    return Err(invalid_operation!(
                        "generic instance over a non-named type - {:?}",
                        generic
                    ));
                }

                self.encode_type(generic)?;
                self.writer.write_compressed_uint(arguments.len() as u32)?;
                for argument in arguments {
                    self.encode_type(argument)?;
                }
                Ok(())
            }
            TypeSig::Var(param) | TypeSig::MVar(param) => {
                self.writer.write_compressed_uint(param.position)
            }
            TypeSig::FnPtr(method) => self.encode_method(method),
            TypeSig::RequiredModifier { modifier, element }
            | TypeSig::OptionalModifier { modifier, element } => {
                self.write_handle(*modifier)?;
                self.encode_type(element)
            }
            _ => Ok(()),
        }
    }

    /// Encode a method signature
    ///
    /// # Errors
    /// Returns an error if a parameter cannot be encoded
    pub fn encode_method(&mut self, sig: &MethodSig) -> Result<()> {
        let mut head = sig.calling_convention & CALLING_CONVENTION::MASK;
        if sig.has_this {
            head |= CALLING_CONVENTION::HAS_THIS;
        }
        if sig.explicit_this {
            head |= CALLING_CONVENTION::EXPLICIT_THIS;
        }
        if sig.generic_arity > 0 {
            head |= CALLING_CONVENTION::GENERIC;
        }

        self.writer.write_le::<u8>(head);
        if sig.generic_arity > 0 {
            self.writer.write_compressed_uint(sig.generic_arity)?;
        }

        self.writer.write_compressed_uint(sig.params.len() as u32)?;
        self.encode_type(&sig.return_type)?;
        for param in &sig.params {
            self.encode_type(param)?;
        }
        Ok(())
    }
}

fn encode_with<E, F>(tokens: &mut E, f: F) -> Result<Vec<u8>>
where
    E: TokenEncoder + ?Sized,
    F: FnOnce(&mut SignatureEncoder<'_, E>) -> Result<()>,
{
    let mut encoder = SignatureEncoder::new(tokens);
    f(&mut encoder)?;
    Ok(encoder.into_bytes())
}

/// Encode a `TypeSpec` blob
///
/// # Errors
/// Returns an error if a handle cannot be encoded
pub fn encode_type_signature<E: TokenEncoder + ?Sized>(
    sig: &TypeSig,
    tokens: &mut E,
) -> Result<Vec<u8>> {
    encode_with(tokens, |encoder| encoder.encode_type(sig))
}

/// Encode a `FieldSig` blob
///
/// # Errors
/// Returns an error if a handle cannot be encoded
pub fn encode_field_signature<E: TokenEncoder + ?Sized>(
    sig: &TypeSig,
    tokens: &mut E,
) -> Result<Vec<u8>> {
    encode_with(tokens, |encoder| {
        encoder.writer.write_le::<u8>(CALLING_CONVENTION::FIELD);
        encoder.encode_type(sig)
    })
}

/// Encode a `MethodDefSig` or `MethodRefSig` blob
///
/// # Errors
/// Returns an error if a handle cannot be encoded
pub fn encode_method_signature<E: TokenEncoder + ?Sized>(
    sig: &MethodSig,
    tokens: &mut E,
) -> Result<Vec<u8>> {
    encode_with(tokens, |encoder| encoder.encode_method(sig))
}

/// Encode a `PropertySig` blob
///
/// # Errors
/// Returns an error if a handle cannot be encoded
pub fn encode_property_signature<E: TokenEncoder + ?Sized>(
    sig: &PropertySig,
    tokens: &mut E,
) -> Result<Vec<u8>> {
    encode_with(tokens, |encoder| {
        let mut head = CALLING_CONVENTION::PROPERTY;
        if sig.has_this {
            head |= CALLING_CONVENTION::HAS_THIS;
        }
        encoder.writer.write_le::<u8>(head);
        encoder
            .writer
            .write_compressed_uint(sig.params.len() as u32)?;
        encoder.encode_type(&sig.property_type)?;
        for param in &sig.params {
            encoder.encode_type(param)?;
        }
        Ok(())
    })
}

/// Encode a `LocalVarSig` blob
///
/// # Errors
/// Returns an error if a handle cannot be encoded
pub fn encode_local_var_signature<E: TokenEncoder + ?Sized>(
    sig: &LocalVarSig,
    tokens: &mut E,
) -> Result<Vec<u8>> {
    encode_with(tokens, |encoder| {
        encoder.writer.write_le::<u8>(CALLING_CONVENTION::LOCAL_SIG);
        encoder
            .writer
            .write_compressed_uint(sig.locals.len() as u32)?;
        for local in &sig.locals {
            encoder.encode_type(local)?;
        }
        Ok(())
    })
}

/// Encode the instantiation blob of a `MethodSpec`
///
/// # Errors
/// Returns an error if a handle cannot be encoded or no argument is given
pub fn encode_method_spec_signature<E: TokenEncoder + ?Sized>(
    arguments: &[TypeSig],
    tokens: &mut E,
) -> Result<Vec<u8>> {
    if arguments.is_empty() {
        return Err(invalid_operation!("generic method instance without arguments"));
    }

    encode_with(tokens, |encoder| {
        encoder.writer.write_le::<u8>(CALLING_CONVENTION::GENERIC_INST);
        encoder
            .writer
            .write_compressed_uint(arguments.len() as u32)?;
        for argument in arguments {
            encoder.encode_type(argument)?;
        }
        Ok(())
    })
}
