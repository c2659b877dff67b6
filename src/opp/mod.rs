//! Object Push Profile: pushing objects to a peer and pulling its default
//! business card.

pub mod client;
pub mod server;

pub use client::{OppClient, OppClientEvent};
pub use server::{OppServer, OppServerEvent};

/// SDP service class of the OBEX Object Push service.
pub const SERVICE_CLASS_OBEX_OBJECT_PUSH: u16 = 0x1105;

/// Maximum decoded `Name` header length, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum `Type` header length, in bytes.
pub const MAX_TYPE_LEN: usize = 20;

/// Object type of the default business card.
pub(crate) const DEFAULT_OBJECT_TYPE: &str = "text/x-vcard";

/// OBEX service UUID carried in the CONNECT Target header.
pub(crate) const OPP_UUID: [u8; 16] = [
    0x79, 0x61, 0x35, 0xf0, 0xf0, 0xc5, 0x11, 0xd8, 0x09, 0x66, 0x08, 0x00, 0x20, 0x0c, 0x9a, 0x66,
];
