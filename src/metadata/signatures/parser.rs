use crate::{
    file::parser::Parser,
    metadata::{
        model::{GenericParamId, TypeHandle, TypeDefId, TypeRefId},
        signatures::{
            ArrayShape, GenericParamSig, LocalVarSig, MethodSig, PropertySig, TypeSig,
            CALLING_CONVENTION, ELEMENT_TYPE,
        },
        tables::TableId,
        token::Token,
    },
    Error::RecursionLimit,
    Result,
};

/// Default nesting limit for signature decoding
pub const MAX_RECURSION_DEPTH: usize = 50;

/// Binds the tokens and placeholders embedded in a signature blob.
///
/// Implementations may materialize other entities while resolving, which is why every
/// method takes `&mut self`.
pub trait SignatureResolver {
    /// Turn a `TypeDefOrRef` token found after `CLASS`, `VALUETYPE` or a custom modifier
    /// into a handle
    ///
    /// # Errors
    /// Returns an error if the token does not point at an existing row
    fn resolve_type(&mut self, token: Token) -> Result<TypeHandle>;

    /// Bind `!position` against the innermost type frame, `None` if there is none
    ///
    /// # Errors
    /// Returns an error if loading the generic parameters of the frame fails, or if the
    /// frame owner has no parameter at `position`
    fn bind_type_parameter(&mut self, position: u32) -> Result<Option<GenericParamId>>;

    /// Bind `!!position` against the innermost method frame, `None` if there is none
    ///
    /// # Errors
    /// Returns an error if loading the generic parameters of the frame fails, or if the
    /// frame owner has no parameter at `position`
    fn bind_method_parameter(&mut self, position: u32) -> Result<Option<GenericParamId>>;
}

/// Maps `TypeDef` and `TypeRef` rows straight onto arena positions (row - 1) and leaves
/// every placeholder unbound.
///
/// Useful for working with signature blobs outside of a module.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowTokens;

impl SignatureResolver for RowTokens {
    fn resolve_type(&mut self, token: Token) -> Result<TypeHandle> {
        if token.is_null() {
            return Err(malformed_error!("Null type token in signature"));
        }

        let index = token.row() as usize - 1;
        match token.table_id() {
            Some(TableId::TypeDef) => Ok(TypeHandle::Definition(TypeDefId::from_index(index))),
            Some(TableId::TypeRef) => Ok(TypeHandle::Reference(TypeRefId::from_index(index))),
            _ => Err(malformed_error!("Invalid type token in signature - {}", token)),
        }
    }

    fn bind_type_parameter(&mut self, _position: u32) -> Result<Option<GenericParamId>> {
        Ok(None)
    }

    fn bind_method_parameter(&mut self, _position: u32) -> Result<Option<GenericParamId>> {
        Ok(None)
    }
}

/// Recursive-descent decoder for signature blobs
///
/// # Example
///
/// ```rust
/// use dotmeta::metadata::signatures::{RowTokens, SignatureParser, TypeSig};
///
/// let data = &[0x20, 0x01, 0x01, 0x0E];
/// let mut resolver = RowTokens;
/// let mut parser = SignatureParser::new(data, &mut resolver);
/// let sig = parser.parse_method_signature().unwrap();
/// assert!(sig.has_this);
/// assert_eq!(sig.params, vec![TypeSig::String]);
/// ```
pub struct SignatureParser<'a, 'r, R: SignatureResolver + ?Sized> {
    parser: Parser<'a>,
    resolver: &'r mut R,
    depth: usize,
    max_depth: usize,
}

impl<'a, 'r, R: SignatureResolver + ?Sized> SignatureParser<'a, 'r, R> {
    /// Create a parser over one signature blob
    ///
    /// ## Arguments
    /// * 'data'     - The blob, without its length prefix
    /// * 'resolver' - Binds tokens and placeholders
    pub fn new(data: &'a [u8], resolver: &'r mut R) -> Self {
        SignatureParser {
            parser: Parser::new(data),
            resolver,
            depth: 0,
            max_depth: MAX_RECURSION_DEPTH,
        }
    }

    /// Replace the nesting limit
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Run `parse` and require it to consume the whole blob
    ///
    /// # Errors
    /// Returns whatever `parse` returns, or [`crate::Error::Malformed`] if bytes are left over
    pub fn parse_whole<T, F>(mut self, parse: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let value = parse(&mut self)?;
        if self.parser.has_more_data() {
            return Err(malformed_error!(
                "Signature has {} trailing bytes",
                self.parser.remaining()
            ));
        }
        Ok(value)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(RecursionLimit(self.max_depth));
        }
        Ok(())
    }

    /// Parse a single type
    ///
    /// # Errors
    /// Returns an error for unknown element types, truncated data or nesting beyond the limit
    pub fn parse_type(&mut self) -> Result<TypeSig> {
        self.enter()?;
        let result = self.parse_type_inner();
        self.depth -= 1;
        result
    }

    fn parse_type_inner(&mut self) -> Result<TypeSig> {
        let current_byte = self.parser.read_le::<u8>()?;
        match current_byte {
            ELEMENT_TYPE::VOID => Ok(TypeSig::Void),
            ELEMENT_TYPE::BOOLEAN => Ok(TypeSig::Boolean),
            ELEMENT_TYPE::CHAR => Ok(TypeSig::Char),
            ELEMENT_TYPE::I1 => Ok(TypeSig::I1),
            ELEMENT_TYPE::U1 => Ok(TypeSig::U1),
            ELEMENT_TYPE::I2 => Ok(TypeSig::I2),
            ELEMENT_TYPE::U2 => Ok(TypeSig::U2),
            ELEMENT_TYPE::I4 => Ok(TypeSig::I4),
            ELEMENT_TYPE::U4 => Ok(TypeSig::U4),
            ELEMENT_TYPE::I8 => Ok(TypeSig::I8),
            ELEMENT_TYPE::U8 => Ok(TypeSig::U8),
            ELEMENT_TYPE::R4 => Ok(TypeSig::R4),
            ELEMENT_TYPE::R8 => Ok(TypeSig::R8),
            ELEMENT_TYPE::STRING => Ok(TypeSig::String),
            ELEMENT_TYPE::TYPEDBYREF => Ok(TypeSig::TypedByRef),
            ELEMENT_TYPE::I => Ok(TypeSig::I),
            ELEMENT_TYPE::U => Ok(TypeSig::U),
            ELEMENT_TYPE::OBJECT => Ok(TypeSig::Object),
            ELEMENT_TYPE::PTR => Ok(TypeSig::Ptr(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::BYREF => Ok(TypeSig::ByRef(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::PINNED => Ok(TypeSig::Pinned(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::SZARRAY => Ok(TypeSig::SzArray(Box::new(self.parse_type()?))),
            ELEMENT_TYPE::CLASS => {
                let token = self.parser.read_compressed_token()?;
                Ok(TypeSig::Class(self.resolver.resolve_type(token)?))
            }
            ELEMENT_TYPE::VALUETYPE => {
                let token = self.parser.read_compressed_token()?;
                Ok(TypeSig::ValueType(self.resolver.resolve_type(token)?))
            }
            ELEMENT_TYPE::VAR => {
                let position = self.parser.read_compressed_uint()?;
                Ok(TypeSig::Var(GenericParamSig {
                    position,
                    owner: self.resolver.bind_type_parameter(position)?,
                }))
            }
            ELEMENT_TYPE::MVAR => {
                let position = self.parser.read_compressed_uint()?;
                Ok(TypeSig::MVar(GenericParamSig {
                    position,
                    owner: self.resolver.bind_method_parameter(position)?,
                }))
            }
            ELEMENT_TYPE::ARRAY => {
                let element = self.parse_type()?;
                let rank = self.parser.read_compressed_uint()?;

                let num_sizes = self.parser.read_compressed_uint()?;
                if num_sizes > rank {
                    return Err(malformed_error!(
                        "ARRAY - More sizes than dimensions - {} > {}",
                        num_sizes,
                        rank
                    ));
                }
                let mut sizes = Vec::with_capacity(num_sizes.min(64) as usize);
                for _ in 0..num_sizes {
                    sizes.push(self.parser.read_compressed_uint()?);
                }

                let num_lo_bounds = self.parser.read_compressed_uint()?;
                if num_lo_bounds > rank {
                    return Err(malformed_error!(
                        "ARRAY - More lower bounds than dimensions - {} > {}",
                        num_lo_bounds,
                        rank
                    ));
                }
                let mut lower_bounds = Vec::with_capacity(num_lo_bounds.min(64) as usize);
                for _ in 0..num_lo_bounds {
                    lower_bounds.push(self.parser.read_compressed_int()?);
                }

                Ok(TypeSig::Array(ArrayShape {
                    element: Box::new(element),
                    rank,
                    sizes,
                    lower_bounds,
                }))
            }
            ELEMENT_TYPE::GENERICINST => {
                let peek_byte = self.parser.peek_byte()?;
                if peek_byte != ELEMENT_TYPE::CLASS && peek_byte != ELEMENT_TYPE::VALUETYPE {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        peek_byte
                    ));
                }

                let generic = self.parse_type()?;
                let arg_count = self.parser.read_compressed_uint()?;
                if arg_count == 0 {
                    return Err(malformed_error!("GENERICINST - No type arguments"));
                }

                let mut arguments = Vec::with_capacity(arg_count.min(64) as usize);
                for _ in 0..arg_count {
                    arguments.push(self.parse_type()?);
                }

                Ok(TypeSig::GenericInst {
                    generic: Box::new(generic),
                    arguments,
                })
            }
            ELEMENT_TYPE::FNPTR => Ok(TypeSig::FnPtr(Box::new(self.parse_method_signature()?))),
            ELEMENT_TYPE::CMOD_REQD => {
                let token = self.parser.read_compressed_token()?;
                let modifier = self.resolver.resolve_type(token)?;
                Ok(TypeSig::RequiredModifier {
                    modifier,
                    element: Box::new(self.parse_type()?),
                })
            }
            ELEMENT_TYPE::CMOD_OPT => {
                let token = self.parser.read_compressed_token()?;
                let modifier = self.resolver.resolve_type(token)?;
                Ok(TypeSig::OptionalModifier {
                    modifier,
                    element: Box::new(self.parse_type()?),
                })
            }
            _ => Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            )),
        }
    }

    /// Parse a method signature - `MethodDefSig`, `MethodRefSig`, `StandAloneMethodSig`
    ///
    /// # Errors
    /// Returns an error for a misplaced sentinel or a malformed parameter
    pub fn parse_method_signature(&mut self) -> Result<MethodSig> {
        self.enter()?;
        let result = self.parse_method_inner();
        self.depth -= 1;
        result
    }

    fn parse_method_inner(&mut self) -> Result<MethodSig> {
        let convention_byte = self.parser.read_le::<u8>()?;
        let calling_convention = convention_byte & CALLING_CONVENTION::MASK;
        if calling_convention > CALLING_CONVENTION::NATIVE_VARARG
            || matches!(
                calling_convention,
                CALLING_CONVENTION::FIELD
                    | CALLING_CONVENTION::LOCAL_SIG
                    | CALLING_CONVENTION::PROPERTY
                    | CALLING_CONVENTION::GENERIC_INST
            )
        {
            return Err(malformed_error!(
                "Not a method signature - 0x{:02X}",
                convention_byte
            ));
        }

        let generic_arity = if convention_byte & CALLING_CONVENTION::GENERIC != 0 {
            self.parser.read_compressed_uint()?
        } else {
            0
        };

        let param_count = self.parser.read_compressed_uint()?;
        let return_type = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count.min(256) as usize);
        let mut seen_sentinel = false;
        for _ in 0..param_count {
            if self.parser.peek_byte()? == ELEMENT_TYPE::SENTINEL {
                if seen_sentinel {
                    return Err(malformed_error!("Method signature has two sentinels"));
                }
                self.parser.advance_by(1)?;
                seen_sentinel = true;
                params.push(TypeSig::Sentinel(Box::new(self.parse_type()?)));
            } else {
                params.push(self.parse_type()?);
            }
        }

        Ok(MethodSig {
            calling_convention,
            has_this: convention_byte & CALLING_CONVENTION::HAS_THIS != 0,
            explicit_this: convention_byte & CALLING_CONVENTION::EXPLICIT_THIS != 0,
            generic_arity,
            return_type,
            params,
        })
    }

    /// Parse a field signature - `FieldSig`
    ///
    /// # Errors
    /// Returns an error if the blob does not start with the `FIELD` marker
    pub fn parse_field_signature(&mut self) -> Result<TypeSig> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != CALLING_CONVENTION::FIELD {
            return Err(malformed_error!(
                "SignatureField - invalid start - {}",
                head_byte
            ));
        }

        self.parse_type()
    }

    /// Parse a property signature - `PropertySig`
    ///
    /// # Errors
    /// Returns an error if the blob does not start with the `PROPERTY` marker
    pub fn parse_property_signature(&mut self) -> Result<PropertySig> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte & CALLING_CONVENTION::MASK != CALLING_CONVENTION::PROPERTY {
            return Err(malformed_error!(
                "SignatureProperty - invalid start - {}",
                head_byte
            ));
        }

        let param_count = self.parser.read_compressed_uint()?;
        let property_type = self.parse_type()?;

        let mut params = Vec::with_capacity(param_count.min(256) as usize);
        for _ in 0..param_count {
            params.push(self.parse_type()?);
        }

        Ok(PropertySig {
            has_this: head_byte & CALLING_CONVENTION::HAS_THIS != 0,
            property_type,
            params,
        })
    }

    /// Parse a local variable signature - `LocalVarSig`
    ///
    /// # Errors
    /// Returns an error if the blob does not start with the `LOCAL_SIG` marker
    pub fn parse_local_var_signature(&mut self) -> Result<LocalVarSig> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != CALLING_CONVENTION::LOCAL_SIG {
            return Err(malformed_error!(
                "SignatureLocalVar - invalid start - {}",
                head_byte
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        let mut locals = Vec::with_capacity(count.min(256) as usize);
        for _ in 0..count {
            locals.push(self.parse_type()?);
        }

        Ok(LocalVarSig { locals })
    }

    /// Parse the instantiation of a generic method - `MethodSpec`
    ///
    /// # Errors
    /// Returns an error if the blob does not start with the `GENERIC_INST` marker
    pub fn parse_method_spec_signature(&mut self) -> Result<Vec<TypeSig>> {
        let head_byte = self.parser.read_le::<u8>()?;
        if head_byte != CALLING_CONVENTION::GENERIC_INST {
            return Err(malformed_error!(
                "SignatureMethodSpec - invalid start - {}",
                head_byte
            ));
        }

        let count = self.parser.read_compressed_uint()?;
        if count == 0 {
            return Err(malformed_error!("SignatureMethodSpec - no type arguments"));
        }

        let mut arguments = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            arguments.push(self.parse_type()?);
        }

        Ok(arguments)
    }

    /// Parse a `TypeSpec` blob, which is a bare type
    ///
    /// # Errors
    /// Returns an error if the type is malformed
    pub fn parse_type_spec_signature(&mut self) -> Result<TypeSig> {
        self.parse_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::signatures::{
            parse_field_signature, parse_method_signature, parse_type_spec_signature,
        },
        Error::Malformed,
    };

    fn parse_type(data: &[u8]) -> Result<TypeSig> {
        let mut resolver = RowTokens;
        SignatureParser::new(data, &mut resolver).parse_type()
    }

    #[test]
    fn primitives() {
        assert_eq!(parse_type(&[0x08]).unwrap(), TypeSig::I4);
        assert_eq!(parse_type(&[0x0E]).unwrap(), TypeSig::String);
        assert_eq!(parse_type(&[0x1C]).unwrap(), TypeSig::Object);
        assert!(parse_type(&[0x17]).is_err());
        assert!(parse_type(&[]).is_err());
    }

    #[test]
    fn class_tokens() {
        // CLASS TypeRef 2, VALUETYPE TypeDef 1
        assert_eq!(
            parse_type(&[0x12, 0x09]).unwrap(),
            TypeSig::Class(TypeHandle::Reference(TypeRefId::from_index(1)))
        );
        assert_eq!(
            parse_type(&[0x11, 0x04]).unwrap(),
            TypeSig::ValueType(TypeHandle::Definition(TypeDefId::from_index(0)))
        );
        // TypeSpec tokens are not types
        assert!(parse_type(&[0x12, 0x06]).is_err());
    }

    #[test]
    fn array_with_bounds() {
        // int32[0...3, -2...]
        #[rustfmt::skip]
        let data = [
            0x14, 0x08,
            0x02,
            0x01, 0x04,
            0x02, 0x00, 0x7D,
        ];

        let TypeSig::Array(shape) = parse_type(&data).unwrap() else {
            panic!("not an array");
        };
        assert_eq!(*shape.element, TypeSig::I4);
        assert_eq!(shape.rank, 2);
        assert_eq!(shape.sizes, vec![4]);
        assert_eq!(shape.lower_bounds, vec![0, -2]);
    }

    #[test]
    fn generic_instance() {
        // List`1<!0> where List`1 is TypeRef 1
        let sig = parse_type(&[0x15, 0x12, 0x05, 0x01, 0x13, 0x00]).unwrap();
        assert_eq!(
            sig,
            TypeSig::GenericInst {
                generic: Box::new(TypeSig::Class(TypeHandle::Reference(TypeRefId::from_index(0)))),
                arguments: vec![TypeSig::Var(GenericParamSig::unbound(0))],
            }
        );

        assert!(parse_type(&[0x15, 0x08, 0x01, 0x08]).is_err());
        assert!(parse_type(&[0x15, 0x12, 0x05, 0x00]).is_err());
    }

    #[test]
    fn method_with_sentinel() {
        // vararg void (int32, ..., string)
        let data = [0x05, 0x02, 0x01, 0x08, 0x41, 0x0E];
        let mut resolver = RowTokens;
        let sig = SignatureParser::new(&data, &mut resolver)
            .parse_method_signature()
            .unwrap();

        assert!(sig.is_vararg());
        assert_eq!(sig.sentinel_position(), Some(1));
        assert_eq!(
            sig.params,
            vec![TypeSig::I4, TypeSig::Sentinel(Box::new(TypeSig::String))]
        );
    }

    #[test]
    fn generic_method() {
        // instance !!0 M<T>(!!0)
        let data = [0x30, 0x01, 0x01, 0x1E, 0x00, 0x1E, 0x00];
        let mut resolver = RowTokens;
        let sig = SignatureParser::new(&data, &mut resolver)
            .parse_method_signature()
            .unwrap();

        assert!(sig.has_this);
        assert!(!sig.explicit_this);
        assert_eq!(sig.calling_convention, CALLING_CONVENTION::DEFAULT);
        assert_eq!(sig.generic_arity, 1);
        assert_eq!(sig.return_type, TypeSig::MVar(GenericParamSig::unbound(0)));
    }

    #[test]
    fn array_counts_bounded_by_data() {
        // rank and size count of 0x1FFFFFFF with no sizes behind them
        let data = [0x14, 0x08, 0xDF, 0xFF, 0xFF, 0xFF, 0xDF, 0xFF, 0xFF, 0xFF];
        assert!(parse_type(&data).is_err());
    }

    #[test]
    fn trailing_bytes() {
        let mut resolver = RowTokens;
        assert_eq!(parse_field_signature(&[0x06, 0x08], &mut resolver).unwrap(), TypeSig::I4);
        assert!(matches!(
            parse_field_signature(&[0x06, 0x08, 0xFF, 0xFF], &mut resolver),
            Err(Malformed { .. })
        ));
        assert!(matches!(
            parse_type_spec_signature(&[0x08, 0x08, 0x08], &mut resolver),
            Err(Malformed { .. })
        ));
        assert!(parse_method_signature(&[0x00, 0x00, 0x01, 0x08], &mut resolver).is_err());

        // the bare parser stops after one type
        assert_eq!(parse_type(&[0x08, 0x08, 0x08]).unwrap(), TypeSig::I4);
    }

    #[test]
    fn recursion_limit() {
        let mut data = vec![0x0F; 80];
        data.push(0x08);

        assert!(matches!(parse_type(&data), Err(RecursionLimit(MAX_RECURSION_DEPTH))));

        let mut resolver = RowTokens;
        let sig = SignatureParser::new(&data, &mut resolver)
            .with_max_depth(100)
            .parse_type();
        assert!(sig.is_ok());
    }

    #[test]
    fn field_property_locals() {
        let mut resolver = RowTokens;
        assert_eq!(
            SignatureParser::new(&[0x06, 0x0E], &mut resolver)
                .parse_field_signature()
                .unwrap(),
            TypeSig::String
        );
        assert!(SignatureParser::new(&[0x07, 0x0E], &mut resolver)
            .parse_field_signature()
            .is_err());

        let property = SignatureParser::new(&[0x28, 0x01, 0x0E, 0x08], &mut resolver)
            .parse_property_signature()
            .unwrap();
        assert!(property.has_this);
        assert_eq!(property.property_type, TypeSig::String);
        assert_eq!(property.params, vec![TypeSig::I4]);

        let locals = SignatureParser::new(&[0x07, 0x02, 0x45, 0x10, 0x08, 0x16], &mut resolver)
            .parse_local_var_signature()
            .unwrap();
        assert_eq!(
            locals.locals,
            vec![
                TypeSig::Pinned(Box::new(TypeSig::ByRef(Box::new(TypeSig::I4)))),
                TypeSig::TypedByRef
            ]
        );
    }
}
