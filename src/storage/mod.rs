//! Byte storage primitives backing the transport layer.
mod ring;

pub use self::ring::Ring;
