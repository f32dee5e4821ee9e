//! Fixed-schema pipeline state.
//!
//! Each pipeline owns a concrete state struct whose fields start unset and are
//! filled in additively as steps run. The [`pipeline_state!`](crate::pipeline_state)
//! macro generates the struct, its partial-update companion and the
//! [`PipelineState`] implementation from a single field list.
//!
//! ```rust,ignore
//! gatherflow::pipeline_state! {
//!     /// State for a two-step lookup.
//!     pub struct LookupState / LookupUpdate: "lookup" {
//!         /// The caller's question.
//!         question: String,
//!         /// Answer text.
//!         answer: String,
//!     }
//! }
//! ```

mod schema;
mod value;

pub use schema::{FieldDecl, StateSchema};
pub use value::{decode_structured, FieldKind, FieldType, FieldValue};

use crate::errors::SchemaError;
use std::fmt::Debug;

/// A partial update produced by a step.
pub trait StateUpdate: Debug + Default + Send + 'static {
    /// Names of the fields this update sets.
    fn fields(&self) -> Vec<&'static str>;
}

/// A fixed-schema state record.
pub trait PipelineState: Debug + Default + Clone + Send + Sync + 'static {
    /// The partial update type steps return.
    type Update: StateUpdate;

    /// The declared schema.
    fn schema() -> &'static StateSchema;

    /// Returns true if the field holds a value.
    fn is_set(&self, field: &str) -> bool;

    /// Sets a field from a dynamically typed value.
    fn assign(&mut self, field: &str, value: FieldValue) -> Result<(), SchemaError>;

    /// Merges an update, overwriting fields the update sets.
    fn merge(&mut self, update: Self::Update);

    /// Names of the fields currently set, in declaration order.
    fn set_fields(&self) -> Vec<&'static str> {
        Self::schema().names().filter(|name| self.is_set(name)).collect()
    }

    /// Returns true if every declared field is set.
    fn is_complete(&self) -> bool {
        Self::schema().names().all(|name| self.is_set(name))
    }
}

/// Builds a state with only the given fields set.
pub fn initialize<S, I, K>(initial_values: I) -> Result<S, SchemaError>
where
    S: PipelineState,
    I: IntoIterator<Item = (K, FieldValue)>,
    K: AsRef<str>,
{
    apply_values(S::default(), initial_values)
}

/// Merges a typed update into the state.
pub fn apply_update<S: PipelineState>(mut state: S, update: S::Update) -> Result<S, SchemaError> {
    let schema = S::schema();
    for field in update.fields() {
        schema.check(field)?;
    }
    state.merge(update);
    Ok(state)
}

/// Merges name-keyed values into the state.
///
/// Every name and kind is checked against the schema before anything is
/// written.
pub fn apply_values<S, I, K>(mut state: S, values: I) -> Result<S, SchemaError>
where
    S: PipelineState,
    I: IntoIterator<Item = (K, FieldValue)>,
    K: AsRef<str>,
{
    let schema = S::schema();
    let values: Vec<(K, FieldValue)> = values.into_iter().collect();
    for (name, value) in &values {
        let decl = schema.check(name.as_ref())?;
        if decl.kind != value.kind() {
            return Err(SchemaError::KindMismatch {
                field: decl.name.to_string(),
                expected: decl.kind,
                actual: value.kind(),
            });
        }
    }
    for (name, value) in values {
        state.assign(name.as_ref(), value)?;
    }
    Ok(state)
}

/// Reads a field a step requires, failing if it is unset.
pub fn require<'a, T>(
    value: &'a Option<T>,
    step: &str,
    field: &str,
) -> Result<&'a T, SchemaError> {
    value.as_ref().ok_or_else(|| SchemaError::missing(step, field))
}

/// Declares a pipeline state struct, its update struct and the
/// [`PipelineState`] implementation.
///
/// Every field becomes `Option<T>` where `T` implements [`FieldType`].
#[macro_export]
macro_rules! pipeline_state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $state:ident / $update:ident : $schema_name:literal {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        $vis struct $state {
            $(
                $(#[$field_meta])*
                pub $field: ::std::option::Option<$ty>,
            )+
        }

        #[doc = concat!("Partial update for [`", stringify!($state), "`].")]
        #[derive(Debug, Clone, Default)]
        $vis struct $update {
            $(
                $(#[$field_meta])*
                pub $field: ::std::option::Option<$ty>,
            )+
        }

        impl $crate::state::StateUpdate for $update {
            fn fields(&self) -> ::std::vec::Vec<&'static str> {
                let mut fields = ::std::vec::Vec::new();
                $(
                    if self.$field.is_some() {
                        fields.push(stringify!($field));
                    }
                )+
                fields
            }
        }

        impl $crate::state::PipelineState for $state {
            type Update = $update;

            fn schema() -> &'static $crate::state::StateSchema {
                static SCHEMA: $crate::state::StateSchema = $crate::state::StateSchema::new(
                    $schema_name,
                    &[
                        $(
                            $crate::state::FieldDecl::new(
                                stringify!($field),
                                <$ty as $crate::state::FieldType>::KIND,
                            ),
                        )+
                    ],
                );
                &SCHEMA
            }

            fn is_set(&self, field: &str) -> bool {
                match field {
                    $( stringify!($field) => self.$field.is_some(), )+
                    _ => false,
                }
            }

            fn assign(
                &mut self,
                field: &str,
                value: $crate::state::FieldValue,
            ) -> ::std::result::Result<(), $crate::errors::SchemaError> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = Some(
                                <$ty as $crate::state::FieldType>::from_field_value(field, value)?,
                            );
                            Ok(())
                        }
                    )+
                    _ => Err($crate::errors::SchemaError::undeclared(
                        <Self as $crate::state::PipelineState>::schema().name(),
                        field,
                    )),
                }
            }

            fn merge(&mut self, update: Self::Update) {
                $(
                    if let Some(value) = update.$field {
                        self.$field = Some(value);
                    }
                )+
            }
        }
    };
}
