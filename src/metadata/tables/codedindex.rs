//! Coded indexes (ECMA-335 II.24.2.6).
//!
//! A coded index packs a token into a column that may reference one of several tables. The low
//! `tag_bits` select the table from a fixed, ordered candidate list, the remaining bits hold the
//! row id: `raw = (rid << tag_bits) | tag`. Whether the column is 2 or 4 bytes wide depends on
//! the largest row count among *all* candidates, so it is a property of the whole module and is
//! computed once by [`crate::metadata::tables::TableInfo`].

use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{tables::TableId, token::Token},
    Result,
};

/// The 13 coded index kinds of ECMA-335.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef`, `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param`, `Property`
    HasConstant,
    /// Everything that can carry a custom attribute
    HasCustomAttribute,
    /// `Field`, `Param`
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef`, `Assembly`
    HasDeclSecurity,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, `TypeSpec`
    MemberRefParent,
    /// `Event`, `Property`
    HasSemantics,
    /// `MethodDef`, `MemberRef`
    MethodDefOrRef,
    /// `Field`, `MethodDef`
    MemberForwarded,
    /// `File`, `AssemblyRef`, `ExportedType`
    Implementation,
    /// `MethodDef` and `MemberRef` on tags 2 and 3; tags 0, 1 and 4 are unused
    CustomAttributeType,
    /// `Module`, `ModuleRef`, `AssemblyRef`, `TypeRef`
    ResolutionScope,
    /// `TypeDef`, `MethodDef`
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The candidate tables indexed by tag. Unused tags are `None`.
    #[must_use]
    pub fn slots(self) -> &'static [Option<TableId>] {
        use TableId as T;

        match self {
            CodedIndexType::TypeDefOrRef => {
                &[Some(T::TypeDef), Some(T::TypeRef), Some(T::TypeSpec)]
            }
            CodedIndexType::HasConstant => &[Some(T::Field), Some(T::Param), Some(T::Property)],
            CodedIndexType::HasCustomAttribute => &[
                Some(T::MethodDef),
                Some(T::Field),
                Some(T::TypeRef),
                Some(T::TypeDef),
                Some(T::Param),
                Some(T::InterfaceImpl),
                Some(T::MemberRef),
                Some(T::Module),
                Some(T::DeclSecurity),
                Some(T::Property),
                Some(T::Event),
                Some(T::StandAloneSig),
                Some(T::ModuleRef),
                Some(T::TypeSpec),
                Some(T::Assembly),
                Some(T::AssemblyRef),
                Some(T::File),
                Some(T::ExportedType),
                Some(T::ManifestResource),
                Some(T::GenericParam),
                Some(T::GenericParamConstraint),
                Some(T::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(T::Field), Some(T::Param)],
            CodedIndexType::HasDeclSecurity => {
                &[Some(T::TypeDef), Some(T::MethodDef), Some(T::Assembly)]
            }
            CodedIndexType::MemberRefParent => &[
                Some(T::TypeDef),
                Some(T::TypeRef),
                Some(T::ModuleRef),
                Some(T::MethodDef),
                Some(T::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(T::Event), Some(T::Property)],
            CodedIndexType::MethodDefOrRef => &[Some(T::MethodDef), Some(T::MemberRef)],
            CodedIndexType::MemberForwarded => &[Some(T::Field), Some(T::MethodDef)],
            CodedIndexType::Implementation => {
                &[Some(T::File), Some(T::AssemblyRef), Some(T::ExportedType)]
            }
            CodedIndexType::CustomAttributeType => {
                &[None, None, Some(T::MethodDef), Some(T::MemberRef), None]
            }
            CodedIndexType::ResolutionScope => &[
                Some(T::Module),
                Some(T::ModuleRef),
                Some(T::AssemblyRef),
                Some(T::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(T::TypeDef), Some(T::MethodDef)],
        }
    }

    /// The tables this coded index can reference
    pub fn tables(self) -> impl Iterator<Item = TableId> {
        self.slots().iter().filter_map(|slot| *slot)
    }

    /// Number of low bits used for the tag
    #[must_use]
    pub fn tag_bits(self) -> u32 {
        let slots = self.slots().len() as u32;
        u32::BITS - (slots - 1).leading_zeros()
    }

    /// The tag of `table` within this coded index, if it is a candidate
    #[must_use]
    pub fn tag_of(self, table: TableId) -> Option<u32> {
        self.slots()
            .iter()
            .position(|slot| *slot == Some(table))
            .map(|tag| tag as u32)
    }

    /// Turn a raw column value back into a token
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the tag does not name a candidate table or the
    /// row does not fit the 24 bits of a token
    pub fn decompress(self, raw: u32) -> Result<Token> {
        let tag_bits = self.tag_bits();
        let tag = raw & ((1 << tag_bits) - 1);
        let row = raw >> tag_bits;
        if row > 0x00FF_FFFF {
            return Err(malformed_error!(
                "Row {} of coded index {:?} exceeds 24 bits - 0x{:X}",
                row,
                self,
                raw
            ));
        }

        match self.slots().get(tag as usize) {
            Some(Some(table)) => Ok(Token::from_parts(*table, row)),
            _ => Err(malformed_error!(
                "Invalid tag {} for coded index {:?} - 0x{:X}",
                tag,
                self,
                raw
            )),
        }
    }

    /// Pack a token into a raw column value. Row id 0 always compresses to 0.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the token's table is not a candidate
    pub fn compress(self, token: Token) -> Result<u32> {
        if token.is_null() {
            return Ok(0);
        }

        let tag = token
            .table_id()
            .and_then(|table| self.tag_of(table))
            .ok_or_else(|| {
                invalid_operation!("{} cannot be stored in a {:?} coded index", token, self)
            })?;

        let tag_bits = self.tag_bits();
        if token.row() >= (1 << (32 - tag_bits)) {
            return Err(invalid_operation!(
                "row {} is too large for a {:?} coded index",
                token.row(),
                self
            ));
        }

        Ok((token.row() << tag_bits) | tag)
    }

    /// Column width in bytes given a row count lookup: 4 iff any candidate table holds at
    /// least `2^(16 - tag_bits)` rows
    pub fn width_for(self, row_count: impl Fn(TableId) -> u32) -> u8 {
        let limit = 1u32 << (16 - self.tag_bits());
        if self.tables().any(|table| row_count(table) >= limit) {
            4
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::Error;

    #[test]
    fn tag_bits() {
        assert_eq!(CodedIndexType::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedIndexType::HasFieldMarshal.tag_bits(), 1);
        assert_eq!(CodedIndexType::MemberRefParent.tag_bits(), 3);
        assert_eq!(CodedIndexType::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedIndexType::ResolutionScope.tag_bits(), 2);
        assert_eq!(CodedIndexType::COUNT, 13);
    }

    #[test]
    fn compress_decompress_all_kinds() {
        for kind in CodedIndexType::iter() {
            for table in kind.tables() {
                for row in [1u32, 2, 0x7F, 0x3FFF, 0xFF_FFFF >> kind.tag_bits()] {
                    let token = Token::from_parts(table, row);
                    let raw = kind.compress(token).unwrap();
                    assert_eq!(kind.decompress(raw).unwrap(), token, "{kind:?} {table:?}");
                }
            }
        }
    }

    #[test]
    fn known_values() {
        // TypeRef row 3 inside TypeDefOrRef: (3 << 2) | 1
        let raw = CodedIndexType::TypeDefOrRef
            .compress(Token::from_parts(TableId::TypeRef, 3))
            .unwrap();
        assert_eq!(raw, 0x0D);

        // MemberRef row 1 inside CustomAttributeType: (1 << 3) | 3
        let raw = CodedIndexType::CustomAttributeType
            .compress(Token::from_parts(TableId::MemberRef, 1))
            .unwrap();
        assert_eq!(raw, 0x0B);

        assert_eq!(
            CodedIndexType::HasCustomAttribute.decompress(0x27).unwrap(),
            Token::from_parts(TableId::Module, 1)
        );
    }

    #[test]
    fn null_rows() {
        let null = Token::from_parts(TableId::Event, 0);
        assert_eq!(CodedIndexType::TypeDefOrRef.compress(null).unwrap(), 0);
        assert!(CodedIndexType::TypeDefOrRef.decompress(0).unwrap().is_null());
    }

    #[test]
    fn invalid_tags() {
        // Tag 3 is not used by TypeDefOrRef
        assert!(matches!(
            CodedIndexType::TypeDefOrRef.decompress(0x07),
            Err(Error::Malformed { .. })
        ));
        // Tag 0 and 4 are unused by CustomAttributeType
        assert!(CodedIndexType::CustomAttributeType.decompress(0x08).is_err());
        assert!(CodedIndexType::CustomAttributeType.decompress(0x0C).is_err());

        assert!(matches!(
            CodedIndexType::TypeDefOrRef.compress(Token::from_parts(TableId::MethodDef, 1)),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn rows_beyond_token_range() {
        let largest = CodedIndexType::TypeDefOrRef.decompress((0x00FF_FFFF << 2) | 1).unwrap();
        assert_eq!(largest, Token::from_parts(TableId::TypeRef, 0x00FF_FFFF));

        assert!(matches!(
            CodedIndexType::TypeDefOrRef.decompress((0x0100_0000 << 2) | 1),
            Err(Error::Malformed { .. })
        ));
        assert!(CodedIndexType::HasConstant.decompress(u32::MAX - 1).is_err());
    }

    #[test]
    fn width_threshold() {
        let kind = CodedIndexType::TypeDefOrRef;
        // 2 tag bits leave 14 bits for the row: 0x3FFF rows still fit
        assert_eq!(kind.width_for(|table| if table == TableId::TypeSpec { 0x3FFF } else { 0 }), 2);
        assert_eq!(kind.width_for(|table| if table == TableId::TypeSpec { 0x4000 } else { 0 }), 4);
        // Non-candidate tables never widen the column
        assert_eq!(kind.width_for(|table| if table == TableId::Field { 0xFFFF } else { 0 }), 2);

        let kind = CodedIndexType::HasCustomAttribute;
        assert_eq!(kind.width_for(|table| if table == TableId::MethodSpec { 0x7FF } else { 0 }), 2);
        assert_eq!(kind.width_for(|table| if table == TableId::MethodSpec { 0x800 } else { 0 }), 4);
    }
}
