//! A minimal, heapless TCP/IP stack.
//!
//! `nanonet` answers ARP and neighbor discovery, replies to pings,
//! dispatches UDP to bound handlers, and speaks enough client-side TCP
//! to open a connection, exchange data and close it again. Everything
//! runs over caller-provided storage: the stack neither allocates nor
//! spawns, it only reacts to the frames and poll calls it is handed.
//!
//! The layering is conventional:
//!
//! * [`wire`] contains zero-copy views over the protocol headers.
//! * [`nic`] abstracts the device that frames come from and go to.
//! * [`layer`] implements the per-protocol receive and send logic.
//! * [`stack`] ties one device and all protocol tables together.
//!
//! Incoming frames are processed strictly in place; wherever a reply
//! fits into the buffer the request arrived in, that buffer is
//! rewritten and handed straight back to the device.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

#[macro_use]
mod macros;

pub mod layer;
pub mod managed;
pub mod nic;
pub mod stack;
pub mod storage;
pub mod wire;

pub use self::stack::{Stack, Tables};
