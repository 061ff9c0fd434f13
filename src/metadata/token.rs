//! Metadata tokens.
//!
//! A token identifies one row of one metadata table: the table id sits in the top byte and the
//! 1-based row id in the lower 24 bits (ECMA-335 II.22). Row id 0 never names a row; it is the
//! "absent" value for every table.

use std::fmt;

use crate::metadata::tables::TableId;

/// A `(table, row)` pair packed into 32 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Wrap a raw token value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Build a token from its table and row id
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw 32-bit value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table byte
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The table as [`TableId`], if the byte names a known table
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        TableId::from_u8(self.table())
    }

    /// The 1-based row id
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Row id 0 means "absent", whatever the table byte says
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parts() {
        let token = Token::new(0x0600_0001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.table_id(), Some(TableId::MethodDef));
        assert_eq!(token.row(), 1);

        let token = Token::from_parts(TableId::TypeDef, 5);
        assert_eq!(token.value(), 0x0200_0005);

        let token = Token(0x06FF_FFFF);
        assert_eq!(token.row(), 0x00FF_FFFF);

        assert_eq!(Token(0x7000_0001).table_id(), None);
    }

    #[test]
    fn null_rows() {
        assert!(Token(0).is_null());
        assert!(Token(0x0200_0000).is_null());
        assert!(!Token(0x0200_0001).is_null());
    }

    #[test]
    fn conversion_and_format() {
        let token: Token = 0x0600_0001u32.into();
        assert_eq!(u32::from(token), 0x0600_0001);
        assert_eq!(format!("{}", token), "0x06000001");
        assert_eq!(
            format!("{:?}", token),
            "Token(0x06000001, table: 0x06, row: 1)"
        );
    }

    #[test]
    fn as_map_key() {
        let mut map = HashMap::new();
        map.insert(Token(0x0200_0001), "Program");
        map.insert(Token(0x0200_0002), "Helper");
        assert_eq!(map.get(&Token(0x0200_0001)), Some(&"Program"));
        assert!(Token(0x0200_0001) < Token(0x0600_0001));
    }
}
