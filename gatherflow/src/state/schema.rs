//! Declared field sets for pipeline states.

use super::FieldKind;
use crate::errors::SchemaError;

/// A single declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name.
    pub name: &'static str,
    /// Field kind.
    pub kind: FieldKind,
}

impl FieldDecl {
    /// Declares a field.
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// The fixed set of fields a pipeline state can hold.
#[derive(Debug, Clone, Copy)]
pub struct StateSchema {
    name: &'static str,
    fields: &'static [FieldDecl],
}

impl StateSchema {
    /// Creates a schema.
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [FieldDecl]) -> Self {
        Self { name, fields }
    }

    /// Returns the schema name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared fields in declaration order.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldDecl] {
        self.fields
    }

    /// Looks up a field declaration.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldDecl> {
        self.fields.iter().find(|decl| decl.name == name)
    }

    /// Returns true if the field is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Returns the declared field names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|decl| decl.name)
    }

    /// Fails with [`SchemaError::UndeclaredField`] if the field is not declared.
    pub fn check(&self, name: &str) -> Result<&'static FieldDecl, SchemaError> {
        self.field(name)
            .ok_or_else(|| SchemaError::undeclared(self.name, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SCHEMA: StateSchema = StateSchema::new(
        "sample",
        &[
            FieldDecl::new("question", FieldKind::Text),
            FieldDecl::new("docs", FieldKind::TextList),
        ],
    );

    #[test]
    fn test_lookup() {
        assert_eq!(SCHEMA.name(), "sample");
        assert!(SCHEMA.contains("docs"));
        assert_eq!(SCHEMA.field("question").map(|d| d.kind), Some(FieldKind::Text));
        assert_eq!(SCHEMA.names().collect::<Vec<_>>(), vec!["question", "docs"]);
    }

    #[test]
    fn test_check_undeclared() {
        let err = SCHEMA.check("answer").unwrap_err();
        assert_eq!(err, SchemaError::undeclared("sample", "answer"));
    }
}
