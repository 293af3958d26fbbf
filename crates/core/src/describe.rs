//! Static field descriptions for stored record types.

/// One field of a stored record, as presented to the plan generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: &'static str,
    pub meaning: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: &'static str, meaning: &'static str) -> Self {
        Self { name, ty, meaning }
    }
}

/// Record types that can describe their own shape.
pub trait Described {
    /// Collection name the records live in (e.g. `inventory`).
    const COLLECTION: &'static str;

    /// Fields in serialization order.
    fn fields() -> &'static [FieldSpec];
}
