//! Custom attribute and security declaration escrows.

use crate::{
    metadata::{
        customattributes::CustomAttribute,
        model::{AttributeOwner, SecurityOwner},
        reader::{cache::EscrowKind, ReadContext},
        security::{SecurityAction, SecurityDeclaration},
        tables::{CustomAttributeRaw, DeclSecurityRaw, RowDefinition, TableId},
        token::Token,
    },
    Result,
};

impl ReadContext<'_> {
    /// The read-time token of an attribute owner, null for entities created in memory
    ///
    /// Owners that live in the module's own lists are null here, the module passes their
    /// tokens to [`ReadContext::load_custom_attributes_at`].
    pub(crate) fn attribute_owner_token(&self, owner: AttributeOwner) -> Token {
        match owner {
            AttributeOwner::Module => Token::from_parts(TableId::Module, 1),
            AttributeOwner::Assembly => {
                if self.row_count(TableId::Assembly) == 0 {
                    Token::default()
                } else {
                    Token::from_parts(TableId::Assembly, 1)
                }
            }
            AttributeOwner::Type(id) => self.graph.type_def(id).token,
            AttributeOwner::Field(id) => self.graph.field(id).token,
            AttributeOwner::Method(id) => self.graph.method(id).token,
            AttributeOwner::Parameter(id) => self.graph.parameter(id).token,
            AttributeOwner::Property(id) => self.graph.property(id).token,
            AttributeOwner::Event(id) => self.graph.event(id).token,
            AttributeOwner::GenericParameter(id) => self.graph.generic_parameter(id).token,
            AttributeOwner::InterfaceImplementation(id, index) => self
                .graph
                .type_def(id)
                .interfaces
                .as_deref()
                .and_then(|interfaces| interfaces.get(index))
                .map(|implementation| implementation.token)
                .unwrap_or_default(),
            AttributeOwner::GenericParameterConstraint(id, index) => self
                .graph
                .generic_parameter(id)
                .constraints
                .as_deref()
                .and_then(|constraints| constraints.get(index))
                .map(|constraint| constraint.token)
                .unwrap_or_default(),
            AttributeOwner::SecurityDeclaration(owner, index) => self
                .graph
                .security_declarations
                .get(&owner)
                .and_then(|declarations| declarations.get(index))
                .map(|declaration| declaration.token)
                .unwrap_or_default(),
            AttributeOwner::TypeReference(id) => self.graph.type_ref(id).token,
            AttributeOwner::MemberReference(id) => self.graph.member_ref(id).token,
            AttributeOwner::MethodSpecification(id) => self.graph.method_spec(id).token,
            AttributeOwner::AssemblyReference(id) => self.graph.assembly_ref(id).token,
            AttributeOwner::ModuleReference(id) => self.graph.module_ref(id).token,
            AttributeOwner::TypeSpecification(_)
            | AttributeOwner::StandAloneSignature(_)
            | AttributeOwner::File(_)
            | AttributeOwner::ExportedType(_)
            | AttributeOwner::ManifestResource(_) => Token::default(),
        }
    }

    fn security_owner_token(&self, owner: SecurityOwner) -> Token {
        match owner {
            SecurityOwner::Assembly => self.attribute_owner_token(AttributeOwner::Assembly),
            SecurityOwner::Type(id) => self.graph.type_def(id).token,
            SecurityOwner::Method(id) => self.graph.method(id).token,
        }
    }

    /// Move the attributes parked for `owner` into the graph
    ///
    /// With [`crate::ReaderOptions::skip_invalid_attributes`] an attribute whose constructor
    /// cannot be read is dropped instead of failing the whole list.
    pub(crate) fn load_custom_attributes(&mut self, owner: AttributeOwner) -> Result<()> {
        let token = self.attribute_owner_token(owner);
        self.load_custom_attributes_at(owner, token)
    }

    /// Move the attributes parked for the row `token` into the graph under `owner`
    pub(crate) fn load_custom_attributes_at(
        &mut self,
        owner: AttributeOwner,
        token: Token,
    ) -> Result<()> {
        if self.graph.custom_attributes.contains_key(&owner) {
            return Ok(());
        }

        let mut attributes = Vec::new();
        for rid in self.take_escrow(EscrowKind::CustomAttribute, token)? {
            let row = self.row::<CustomAttributeRaw>(rid)?;
            let attribute = self
                .with_frames(Vec::new(), |ctx| ctx.method_handle(row.constructor))
                .and_then(|constructor| {
                    Ok(CustomAttribute {
                        token: row.token(),
                        constructor,
                        blob: self.blob(row.value)?.to_vec(),
                    })
                });

            match attribute {
                Ok(attribute) => attributes.push(attribute),
                Err(error) if self.options.skip_invalid_attributes => {
                    tracing::warn!(
                        token = %row.token(),
                        %error,
                        "skipping invalid custom attribute"
                    );
                }
                Err(error) => return Err(error),
            }
        }

        self.graph.custom_attributes.insert(owner, attributes);
        Ok(())
    }

    /// Returns `true` if `owner` carries custom attributes, without decoding them
    pub(crate) fn has_custom_attributes(
        &mut self,
        owner: AttributeOwner,
        token: Token,
    ) -> Result<bool> {
        if let Some(attributes) = self.graph.custom_attributes.get(&owner) {
            return Ok(!attributes.is_empty());
        }

        self.in_escrow(EscrowKind::CustomAttribute, token)
    }

    /// Move the security declarations parked for `owner` into the graph
    pub(crate) fn load_security_declarations(&mut self, owner: SecurityOwner) -> Result<()> {
        if self.graph.security_declarations.contains_key(&owner) {
            return Ok(());
        }

        let token = self.security_owner_token(owner);
        let mut declarations = Vec::new();
        for rid in self.take_escrow(EscrowKind::DeclSecurity, token)? {
            let row = self.row::<DeclSecurityRaw>(rid)?;
            declarations.push(SecurityDeclaration {
                token: row.token(),
                action: SecurityAction::from(row.action),
                permission_set: self.blob(row.permission_set)?.to_vec(),
            });
        }

        self.graph.security_declarations.insert(owner, declarations);
        Ok(())
    }

    /// Returns `true` if `owner` carries security declarations
    pub(crate) fn has_security_declarations(&mut self, owner: SecurityOwner) -> Result<bool> {
        if let Some(declarations) = self.graph.security_declarations.get(&owner) {
            return Ok(!declarations.is_empty());
        }

        let token = self.security_owner_token(owner);
        self.in_escrow(EscrowKind::DeclSecurity, token)
    }
}
