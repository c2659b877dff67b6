#![deny(missing_debug_implementations)]
#![forbid(unsafe_code)]

//! Misuse-resistant data structures for OBEX and its Bluetooth profiles.
//!
//! This crate contains the plain data vocabulary shared by OBEX client and
//! server implementations: operation codes, response codes, header ids with
//! their length encodings, Single Response Mode values, the PBAP
//! application-parameter tags, and the phonebook object classification used
//! by the Phonebook Access Profile.
//!
//! The wire formats are defined by IrDA OBEX 1.5 and the Bluetooth Phonebook
//! Access Profile 1.2; the constants here follow those documents.

pub mod app_params;
pub mod error;
pub mod header;
pub mod opcode;
pub mod phonebook;
