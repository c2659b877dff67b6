//! OBEX header ids, their length encodings, and Single Response Mode values.

#[cfg(feature = "arbitrary")]
use arbitrary::Arbitrary;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An OBEX header id.
///
/// The top two bits of the id select the payload framing, see
/// [`HeaderId::encoding`]. Ids not defined by OBEX 1.5 are passed through
/// as [`HeaderId::Other`]; policy for unknown headers belongs to the
/// operation state machines, not the parser.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HeaderId {
    /// Object name, UTF-16 big-endian on the wire.
    Name,
    /// Object type, ASCII with terminating NUL.
    Type,
    /// Object length in bytes.
    Length,
    /// Service UUID the client wants to reach (CONNECT request).
    Target,
    /// Service UUID answering a directed CONNECT (CONNECT response).
    Who,
    /// Connection id assigned by the server on CONNECT.
    ConnectionId,
    /// Nested TLV parameters, used by PBAP.
    ApplicationParameters,
    AuthenticationChallenge,
    AuthenticationResponse,
    /// A chunk of the object.
    Body,
    /// The last chunk of the object.
    EndOfBody,
    SingleResponseMode,
    SingleResponseModeParameter,
    Other(u8),
}

/// Payload framing of a header, from the top two bits of its id.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HeaderEncoding {
    /// `0b00`: 2-byte big-endian length (including the 3 prefix bytes),
    /// then UTF-16 text.
    UnicodeText,
    /// `0b01`: 2-byte big-endian length (including the 3 prefix bytes),
    /// then raw bytes.
    ByteSequence,
    /// `0b10`: exactly one payload byte.
    SingleByte,
    /// `0b11`: exactly four payload bytes, big-endian.
    FourBytes,
}

impl HeaderId {
    pub fn parse(byte: u8) -> Self {
        match byte {
            0x01 => Self::Name,
            0x42 => Self::Type,
            0xc3 => Self::Length,
            0x46 => Self::Target,
            0x4a => Self::Who,
            0xcb => Self::ConnectionId,
            0x4c => Self::ApplicationParameters,
            0x4d => Self::AuthenticationChallenge,
            0x4e => Self::AuthenticationResponse,
            0x48 => Self::Body,
            0x49 => Self::EndOfBody,
            0x97 => Self::SingleResponseMode,
            0x98 => Self::SingleResponseModeParameter,
            other => Self::Other(other),
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Name => 0x01,
            Self::Type => 0x42,
            Self::Length => 0xc3,
            Self::Target => 0x46,
            Self::Who => 0x4a,
            Self::ConnectionId => 0xcb,
            Self::ApplicationParameters => 0x4c,
            Self::AuthenticationChallenge => 0x4d,
            Self::AuthenticationResponse => 0x4e,
            Self::Body => 0x48,
            Self::EndOfBody => 0x49,
            Self::SingleResponseMode => 0x97,
            Self::SingleResponseModeParameter => 0x98,
            Self::Other(other) => *other,
        }
    }

    pub fn encoding(&self) -> HeaderEncoding {
        match self.value() >> 6 {
            0b00 => HeaderEncoding::UnicodeText,
            0b01 => HeaderEncoding::ByteSequence,
            0b10 => HeaderEncoding::SingleByte,
            _ => HeaderEncoding::FourBytes,
        }
    }
}

/// Value of the `SingleResponseMode` header.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SrmValue {
    Disable,
    Enable,
    Indicate,
    Other(u8),
}

impl SrmValue {
    pub fn parse(byte: u8) -> Self {
        match byte {
            0x00 => Self::Disable,
            0x01 => Self::Enable,
            0x02 => Self::Indicate,
            other => Self::Other(other),
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Disable => 0x00,
            Self::Enable => 0x01,
            Self::Indicate => 0x02,
            Self::Other(other) => *other,
        }
    }
}

/// Value of the `SingleResponseModeParameter` header.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SrmpValue {
    Next,
    Wait,
    NextWait,
    Other(u8),
}

impl SrmpValue {
    pub fn parse(byte: u8) -> Self {
        match byte {
            0x00 => Self::Next,
            0x01 => Self::Wait,
            0x02 => Self::NextWait,
            other => Self::Other(other),
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Next => 0x00,
            Self::Wait => 0x01,
            Self::NextWait => 0x02,
            Self::Other(other) => *other,
        }
    }
}
