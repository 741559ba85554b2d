#![cfg_attr(not(test), no_std)]
#![allow(dead_code)]

//! Wire representation of a decrypted Access-layer PDU.
//!
//! Encryption, segmentation-and-reassembly and network/lower-transport
//! framing belong to the Upper Transport, an external collaborator with
//! respect to this crate (see the Access Dispatcher and Publication Engine
//! in `btmesh-driver`). This crate owns only the opcode + parameter framing
//! that the Access layer itself is responsible for.

pub mod access;

pub use access::AccessPdu;
