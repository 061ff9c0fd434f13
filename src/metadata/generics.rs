//! Generic import context.
//!
//! When a member is imported from another module, its signature may mention the generic
//! placeholders of an enclosing type or method (`!0`, `!!1`). Those placeholders are rebound
//! against the generic parameters owned by the *target* module, which the importer pushes as
//! frames before it walks a signature and pops afterwards.
//!
//! Frames are matched by the full name of their owner. A nested owner that reuses the name of
//! an outer one shadows it.

use crate::{
    metadata::model::GenericParamId,
    Error::Resolution,
    Result,
};

/// Kind of a generic owner frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A generic type
    Type,
    /// A generic method
    Method,
}

/// One owner on the context stack
#[derive(Debug, Clone)]
pub struct GenericFrame {
    /// Whether `!n` or `!!n` placeholders bind against this frame
    pub kind: FrameKind,
    /// Full name of the owner, nested types joined with `/`, methods as `Type::Method`
    pub owner_name: String,
    /// Generic parameters of the owner, by position
    pub parameters: Vec<GenericParamId>,
}

/// Stack of generic owners, innermost last
#[derive(Debug, Clone, Default)]
pub struct GenericContext {
    frames: Vec<GenericFrame>,
}

impl GenericContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        GenericContext::default()
    }

    /// Push a type owner
    pub fn push_type(&mut self, owner_name: impl Into<String>, parameters: Vec<GenericParamId>) {
        self.frames.push(GenericFrame {
            kind: FrameKind::Type,
            owner_name: owner_name.into(),
            parameters,
        });
    }

    /// Push a method owner
    pub fn push_method(&mut self, owner_name: impl Into<String>, parameters: Vec<GenericParamId>) {
        self.frames.push(GenericFrame {
            kind: FrameKind::Method,
            owner_name: owner_name.into(),
            parameters,
        });
    }

    /// Pop the innermost frame
    pub fn pop(&mut self) -> Option<GenericFrame> {
        self.frames.pop()
    }

    /// Number of active frames
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no owner is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost frame of the given kind
    #[must_use]
    pub fn innermost(&self, kind: FrameKind) -> Option<&GenericFrame> {
        self.frames.iter().rev().find(|frame| frame.kind == kind)
    }

    /// Bind `!position` of the type named `owner_name`
    ///
    /// # Errors
    /// Returns [`crate::Error::Resolution`] if no frame matches or the position is out of range
    pub fn type_parameter(&self, owner_name: &str, position: u32) -> Result<GenericParamId> {
        self.lookup(FrameKind::Type, owner_name, position)
    }

    /// Bind `!!position` of the method named `owner_name`
    ///
    /// # Errors
    /// Returns [`crate::Error::Resolution`] if no frame matches or the position is out of range
    pub fn method_parameter(&self, owner_name: &str, position: u32) -> Result<GenericParamId> {
        self.lookup(FrameKind::Method, owner_name, position)
    }

    fn lookup(&self, kind: FrameKind, owner_name: &str, position: u32) -> Result<GenericParamId> {
        let Some(frame) = self
            .frames
            .iter()
            .rev()
            .find(|frame| frame.kind == kind && frame.owner_name == owner_name)
        else {
            return Err(Resolution(format!(
                "no generic context for {} while binding position {}",
                owner_name, position
            )));
        };

        frame
            .parameters
            .get(position as usize)
            .copied()
            .ok_or_else(|| {
                Resolution(format!(
                    "{} has {} generic parameters, position {} is out of range",
                    owner_name,
                    frame.parameters.len(),
                    position
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(range: std::ops::Range<usize>) -> Vec<GenericParamId> {
        range.map(GenericParamId::from_index).collect()
    }

    #[test]
    fn innermost_first() {
        let mut context = GenericContext::new();
        context.push_type("N.Outer`1", ids(0..1));
        context.push_type("N.Outer`1/Inner`2", ids(1..3));
        context.push_method("N.Outer`1/Inner`2::Map", ids(3..4));

        assert_eq!(
            context.type_parameter("N.Outer`1", 0).unwrap(),
            GenericParamId::from_index(0)
        );
        assert_eq!(
            context.type_parameter("N.Outer`1/Inner`2", 1).unwrap(),
            GenericParamId::from_index(2)
        );
        assert_eq!(
            context.method_parameter("N.Outer`1/Inner`2::Map", 0).unwrap(),
            GenericParamId::from_index(3)
        );

        assert!(matches!(
            context.type_parameter("N.Outer`1/Inner`2::Map", 0),
            Err(Resolution(_))
        ));
        assert!(matches!(
            context.type_parameter("N.Outer`1", 1),
            Err(Resolution(_))
        ));

        assert_eq!(context.depth(), 3);
        context.pop();
        assert!(context.method_parameter("N.Outer`1/Inner`2::Map", 0).is_err());
    }

    #[test]
    fn shadowed_owner_binds_innermost() {
        let mut context = GenericContext::new();
        context.push_type("Box`1", ids(0..1));
        context.push_type("Box`1", ids(5..6));

        assert_eq!(
            context.type_parameter("Box`1", 0).unwrap(),
            GenericParamId::from_index(5)
        );

        context.pop();
        assert_eq!(
            context.type_parameter("Box`1", 0).unwrap(),
            GenericParamId::from_index(0)
        );
    }

    #[test]
    fn empty() {
        let context = GenericContext::new();
        assert!(context.is_empty());
        assert!(context.innermost(FrameKind::Type).is_none());
        assert!(matches!(context.type_parameter("T", 0), Err(Resolution(_))));
    }
}
