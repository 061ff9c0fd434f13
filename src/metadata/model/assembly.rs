//! Assembly identity and the manifest tables.

use std::fmt;

use sha1::{Digest, Sha1};

use crate::metadata::{
    model::{
        AssemblyFlags, AssemblyRefId, FileAttributes, ManifestResourceAttributes, TypeAttributes,
    },
    token::Token,
};

/// Four part assembly version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// Create a version
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}

/// Public key token of a full public key: the last 8 bytes of its SHA-1, reversed
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let digest = Sha1::digest(public_key);
    let mut token = [0u8; 8];
    for (target, source) in token.iter_mut().zip(digest.iter().rev()) {
        *target = *source;
    }
    token
}

/// The assembly manifest of this module, the `Assembly` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyDefinition {
    /// Simple name
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Assembly flags
    pub flags: AssemblyFlags,
    /// Full public key, empty for unsigned assemblies
    pub public_key: Vec<u8>,
    /// Culture, empty for neutral
    pub culture: String,
    /// Hash algorithm id, `0x8004` for SHA-1
    pub hash_algorithm: u32,
}

impl AssemblyDefinition {
    /// Create a culture neutral, unsigned assembly
    #[must_use]
    pub fn new(name: &str, version: AssemblyVersion) -> Self {
        AssemblyDefinition {
            name: name.to_string(),
            version,
            flags: AssemblyFlags::empty(),
            public_key: Vec::new(),
            culture: String::new(),
            hash_algorithm: 0x8004,
        }
    }

    /// A reference to this assembly, carrying the public key token instead of the key
    #[must_use]
    pub fn to_reference(&self) -> AssemblyNameReference {
        let public_key_or_token = if self.public_key.is_empty() {
            Vec::new()
        } else {
            public_key_token(&self.public_key).to_vec()
        };

        AssemblyNameReference {
            token: Token::default(),
            name: self.name.clone(),
            version: self.version,
            flags: self.flags & !AssemblyFlags::PUBLIC_KEY,
            public_key_or_token,
            culture: self.culture.clone(),
            hash_value: Vec::new(),
        }
    }
}

/// A referenced assembly, the `AssemblyRef` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyNameReference {
    /// Read-time token
    pub token: Token,
    /// Simple name
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Assembly flags; `PUBLIC_KEY` marks a full key in `public_key_or_token`
    pub flags: AssemblyFlags,
    /// Full public key or its 8 byte token
    pub public_key_or_token: Vec<u8>,
    /// Culture, empty for neutral
    pub culture: String,
    /// Hash of the referenced assembly
    pub hash_value: Vec<u8>,
}

impl AssemblyNameReference {
    /// Create a culture neutral reference without a public key token
    #[must_use]
    pub fn new(name: &str, version: AssemblyVersion) -> Self {
        AssemblyNameReference {
            token: Token::default(),
            name: name.to_string(),
            version,
            flags: AssemblyFlags::empty(),
            public_key_or_token: Vec::new(),
            culture: String::new(),
            hash_value: Vec::new(),
        }
    }

    /// The public key token, computed if the reference carries a full key
    #[must_use]
    pub fn public_key_token(&self) -> Option<[u8; 8]> {
        if self.public_key_or_token.is_empty() {
            return None;
        }

        if self.flags.contains(AssemblyFlags::PUBLIC_KEY) {
            return Some(public_key_token(&self.public_key_or_token));
        }

        self.public_key_or_token.as_slice().try_into().ok()
    }

    /// Returns `true` if both references name the same assembly
    ///
    /// Compares name (case-insensitive), version, culture and public key token.
    #[must_use]
    pub fn same_identity(&self, other: &AssemblyNameReference) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.version == other.version
            && self.culture.eq_ignore_ascii_case(&other.culture)
            && self.public_key_token() == other.public_key_token()
    }
}

impl fmt::Display for AssemblyNameReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let culture = if self.culture.is_empty() {
            "neutral"
        } else {
            &self.culture
        };
        write!(f, "{}, Version={}, Culture={}", self.name, self.version, culture)?;
        match self.public_key_token() {
            Some(token) => {
                f.write_str(", PublicKeyToken=")?;
                for byte in token {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            None => f.write_str(", PublicKeyToken=null"),
        }
    }
}

/// A referenced module of the same assembly, the `ModuleRef` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    /// Read-time token
    pub token: Token,
    /// File name of the module
    pub name: String,
}

/// A file of a multi-file assembly, the `File` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Read-time token
    pub token: Token,
    /// File attributes
    pub flags: FileAttributes,
    /// File name
    pub name: String,
    /// Hash of the file contents
    pub hash_value: Vec<u8>,
}

/// Where an exported type or manifest resource is implemented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implementation {
    /// Index into the file list of the module
    File(usize),
    /// Another assembly; for exported types this is a type forwarder
    AssemblyRef(AssemblyRefId),
    /// Index into the exported type list, for nested exported types
    ExportedType(usize),
}

/// A type exported or forwarded by the assembly, the `ExportedType` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedType {
    /// Read-time token
    pub token: Token,
    /// Type attributes
    pub flags: TypeAttributes,
    /// Hint into the `TypeDef` table of the implementing module
    pub type_def_id: u32,
    /// The type name
    pub name: String,
    /// The namespace
    pub namespace: String,
    /// Where the type lives
    pub implementation: Implementation,
}

impl ExportedType {
    /// Create a forwarder to `assembly`
    #[must_use]
    pub fn forwarder(namespace: &str, name: &str, assembly: AssemblyRefId) -> Self {
        ExportedType {
            token: Token::default(),
            flags: TypeAttributes::FORWARDER,
            type_def_id: 0,
            name: name.to_string(),
            namespace: namespace.to_string(),
            implementation: Implementation::AssemblyRef(assembly),
        }
    }
}

/// A manifest resource, the `ManifestResource` row
///
/// Embedded resource data lives outside of metadata, only the row is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResource {
    /// Read-time token
    pub token: Token,
    /// Offset of the resource inside the resource section or file
    pub offset: u32,
    /// Visibility
    pub flags: ManifestResourceAttributes,
    /// Resource name
    pub name: String,
    /// `None` for resources embedded in this module
    pub implementation: Option<Implementation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_tokens() {
        // ECMA standard public key, token b77a5c561934e089
        let ecma_key = [0u8, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            public_key_token(&ecma_key),
            [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]
        );

        let mut with_key = AssemblyNameReference::new("mscorlib", AssemblyVersion::new(4, 0, 0, 0));
        with_key.flags = AssemblyFlags::PUBLIC_KEY;
        with_key.public_key_or_token = ecma_key.to_vec();

        let mut with_token =
            AssemblyNameReference::new("MSCORLIB", AssemblyVersion::new(4, 0, 0, 0));
        with_token.public_key_or_token = vec![0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

        assert!(with_key.same_identity(&with_token));
        assert_eq!(
            with_token.to_string(),
            "MSCORLIB, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );

        let other_version =
            AssemblyNameReference::new("mscorlib", AssemblyVersion::new(2, 0, 0, 0));
        assert!(!with_key.same_identity(&other_version));
    }

    #[test]
    fn definition_to_reference() {
        let mut definition = AssemblyDefinition::new("Lib", AssemblyVersion::new(1, 2, 3, 4));
        assert!(definition.to_reference().public_key_or_token.is_empty());

        definition.public_key = vec![0u8, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        definition.flags = AssemblyFlags::PUBLIC_KEY;
        let reference = definition.to_reference();
        assert_eq!(reference.public_key_or_token.len(), 8);
        assert!(!reference.flags.contains(AssemblyFlags::PUBLIC_KEY));
        assert_eq!(reference.version.to_string(), "1.2.3.4");
    }
}
