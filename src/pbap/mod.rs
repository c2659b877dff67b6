//! Phonebook Access Profile: structured phonebook browsing and download.

pub mod server;

pub use server::{PbapServer, PbapServerEvent};

/// SDP service class of the Phonebook Access server role (PSE).
pub const SERVICE_CLASS_PHONEBOOK_ACCESS_PSE: u16 = 0x112f;

/// SDP service class of the Phonebook Access profile.
pub const SERVICE_CLASS_PHONEBOOK_ACCESS: u16 = 0x1130;

/// Maximum decoded `Name` header length, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum `Type` header length, in bytes.
pub const MAX_TYPE_LEN: usize = 20;

/// Maximum `SearchValue` parameter length, in bytes.
pub const MAX_SEARCH_VALUE_LEN: usize = 32;

/// PBAP service UUID, sent as CONNECT Target by clients and echoed in the
/// Who header of the server's CONNECT response.
///
/// 796135f0-f0c5-11d8-0966-0800200c9a66
pub const PBAP_UUID: [u8; 16] = [
    0x79, 0x61, 0x35, 0xf0, 0xf0, 0xc5, 0x11, 0xd8, 0x09, 0x66, 0x08, 0x00, 0x20, 0x0c, 0x9a, 0x66,
];
