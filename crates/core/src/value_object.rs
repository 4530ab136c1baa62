//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (e.g. a `Quantity` of 5 equals any other `Quantity` of 5). Contrast with
/// [`crate::Entity`], where identity matters.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
