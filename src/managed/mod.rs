//! Non-owning containers over caller-provided storage.
//!
//! Nothing in this crate allocates. Every table (ARP cache, routes, UDP
//! binds, TCP connections) is built over a slice that the caller hands in
//! at setup time. The types here give those slices a container interface.
mod partial;
mod slice;

pub use self::partial::Partial;
pub use self::slice::Slice;

/// A `Vec`-like view on initialized caller storage.
pub type List<'a, T> = Partial<Slice<'a, T>>;
