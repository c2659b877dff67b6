//! OBEX operation codes and response codes.

#[cfg(feature = "arbitrary")]
use arbitrary::Arbitrary;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The final bit of an OBEX operation code.
///
/// "The high order bit of the opcode is called the Final bit. [...] it
/// indicates the last packet of a request." (OBEX 1.5, 3.3)
pub const FINAL_BIT: u8 = 0x80;

/// OBEX protocol version carried in CONNECT operations (1.4).
pub const OBEX_VERSION: u8 = 0x14;

/// Default maximum OBEX packet length offered in CONNECT operations.
pub const MAX_PACKET_LENGTH_DEFAULT: u16 = 0xffff;

/// An OBEX operation code.
///
/// `Connect`, `Disconnect`, `SetPath`, and `Abort` always carry the final
/// bit on the wire; `Put` and `Get` carry it only on the last packet of a
/// request. The final bit is tracked separately, see
/// [`Opcode::parse`].
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Opcode {
    Connect,
    Disconnect,
    Put,
    Get,
    SetPath,
    Action,
    Session,
    Abort,
    /// An opcode this crate doesn't know, with the final bit stripped.
    Other(u8),
}

impl Opcode {
    /// Parses an opcode byte into the operation and its final bit.
    pub fn parse(byte: u8) -> (Self, bool) {
        let opcode = match byte & !FINAL_BIT {
            0x00 => Self::Connect,
            0x01 => Self::Disconnect,
            0x02 => Self::Put,
            0x03 => Self::Get,
            0x05 => Self::SetPath,
            0x06 => Self::Action,
            0x07 => Self::Session,
            0x7f => Self::Abort,
            other => Self::Other(other),
        };
        (opcode, byte & FINAL_BIT != 0)
    }

    /// Returns the canonical wire value, including the inherent final bit
    /// of single-packet operations.
    pub fn value(&self) -> u8 {
        match self {
            Self::Connect => 0x80,
            Self::Disconnect => 0x81,
            Self::Put => 0x02,
            Self::Get => 0x03,
            Self::SetPath => 0x85,
            Self::Action => 0x06,
            Self::Session => 0x07,
            Self::Abort => 0xff,
            Self::Other(other) => *other,
        }
    }
}

/// An OBEX response code.
///
/// The encoding mirrors HTTP status classes; the final bit is always set on
/// responses to single-packet operations and on the last response of a
/// request chain. `Continue` signals that the peer should issue the next
/// request packet of the same operation.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResponseCode {
    Continue,
    Success,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    PreconditionFailed,
    EntityTooLarge,
    UnsupportedMediaType,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
    Other(u8),
}

impl ResponseCode {
    pub fn parse(byte: u8) -> Self {
        match byte | FINAL_BIT {
            0x90 => Self::Continue,
            0xa0 => Self::Success,
            0xc0 => Self::BadRequest,
            0xc1 => Self::Unauthorized,
            0xc3 => Self::Forbidden,
            0xc4 => Self::NotFound,
            0xc6 => Self::NotAcceptable,
            0xcc => Self::PreconditionFailed,
            0xcd => Self::EntityTooLarge,
            0xcf => Self::UnsupportedMediaType,
            0xd0 => Self::InternalServerError,
            0xd1 => Self::NotImplemented,
            0xd3 => Self::ServiceUnavailable,
            _ => Self::Other(byte),
        }
    }

    /// Wire value with the final bit set.
    pub fn value(&self) -> u8 {
        match self {
            Self::Continue => 0x90,
            Self::Success => 0xa0,
            Self::BadRequest => 0xc0,
            Self::Unauthorized => 0xc1,
            Self::Forbidden => 0xc3,
            Self::NotFound => 0xc4,
            Self::NotAcceptable => 0xc6,
            Self::PreconditionFailed => 0xcc,
            Self::EntityTooLarge => 0xcd,
            Self::UnsupportedMediaType => 0xcf,
            Self::InternalServerError => 0xd0,
            Self::NotImplemented => 0xd1,
            Self::ServiceUnavailable => 0xd3,
            Self::Other(other) => *other,
        }
    }
}
