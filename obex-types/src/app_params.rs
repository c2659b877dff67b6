//! PBAP application-parameter tags and the bitmasks they carry.
//!
//! Application parameters are a nested TLV format (1-byte tag, 1-byte
//! length, value) transported inside the `ApplicationParameters` OBEX
//! header. The tags here are the closed set defined by PBAP 1.2, 6.2.1.

#[cfg(feature = "arbitrary")]
use arbitrary::Arbitrary;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Length of the `DatabaseIdentifier` value.
pub const DATABASE_IDENTIFIER_LEN: usize = 16;

/// Length of the `PrimaryFolderVersion` / `SecondaryFolderVersion` values.
pub const FOLDER_VERSION_LEN: usize = 16;

/// A PBAP application-parameter tag.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AppParamTag {
    /// u8: 0 = indexed, 1 = alphanumerical, 2 = phonetical.
    Order,
    /// UTF-8 text to match against the search property.
    SearchValue,
    /// u8: 0 = name, 1 = number, 2 = sound.
    SearchProperty,
    /// u16; 0 turns the request into a size query.
    MaxListCount,
    /// u16 offset into the listing.
    ListStartOffset,
    /// u64 property mask; only the low 32 bits are defined.
    PropertySelector,
    /// u8 vCard format, see [`VCardFormat`].
    Format,
    /// u16, response only.
    PhonebookSize,
    /// u16, response only.
    NewMissedCalls,
    /// 16 bytes, response only.
    PrimaryFolderVersion,
    /// 16 bytes, response only.
    SecondaryFolderVersion,
    /// u64 selector mask; only the low 32 bits are defined.
    VCardSelector,
    /// 16 bytes, response only.
    DatabaseIdentifier,
    /// u8: 0 = OR, 1 = AND.
    VCardSelectorOperator,
    /// u8: 1 requests the new-missed-calls counter be reset.
    ResetNewMissedCalls,
    /// u32 feature bitmask, CONNECT request only.
    PbapSupportedFeatures,
    Other(u8),
}

impl AppParamTag {
    pub fn parse(byte: u8) -> Self {
        match byte {
            0x01 => Self::Order,
            0x02 => Self::SearchValue,
            0x03 => Self::SearchProperty,
            0x04 => Self::MaxListCount,
            0x05 => Self::ListStartOffset,
            0x06 => Self::PropertySelector,
            0x07 => Self::Format,
            0x08 => Self::PhonebookSize,
            0x09 => Self::NewMissedCalls,
            0x0a => Self::PrimaryFolderVersion,
            0x0b => Self::SecondaryFolderVersion,
            0x0c => Self::VCardSelector,
            0x0d => Self::DatabaseIdentifier,
            0x0e => Self::VCardSelectorOperator,
            0x0f => Self::ResetNewMissedCalls,
            0x10 => Self::PbapSupportedFeatures,
            other => Self::Other(other),
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Order => 0x01,
            Self::SearchValue => 0x02,
            Self::SearchProperty => 0x03,
            Self::MaxListCount => 0x04,
            Self::ListStartOffset => 0x05,
            Self::PropertySelector => 0x06,
            Self::Format => 0x07,
            Self::PhonebookSize => 0x08,
            Self::NewMissedCalls => 0x09,
            Self::PrimaryFolderVersion => 0x0a,
            Self::SecondaryFolderVersion => 0x0b,
            Self::VCardSelector => 0x0c,
            Self::DatabaseIdentifier => 0x0d,
            Self::VCardSelectorOperator => 0x0e,
            Self::ResetNewMissedCalls => 0x0f,
            Self::PbapSupportedFeatures => 0x10,
            Self::Other(other) => *other,
        }
    }
}

/// Requested vCard format.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum VCardFormat {
    #[default]
    V21,
    V30,
    Other(u8),
}

impl VCardFormat {
    pub fn parse(byte: u8) -> Self {
        match byte {
            0x00 => Self::V21,
            0x01 => Self::V30,
            other => Self::Other(other),
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::V21 => 0x00,
            Self::V30 => 0x01,
            Self::Other(other) => *other,
        }
    }
}

/// PBAP supported-features bits (SDP attribute and CONNECT parameter).
pub mod supported_features {
    pub const DOWNLOAD: u32 = 1 << 0;
    pub const BROWSING: u32 = 1 << 1;
    pub const DATABASE_IDENTIFIER: u32 = 1 << 2;
    pub const FOLDER_VERSION_COUNTERS: u32 = 1 << 3;
    pub const VCARD_SELECTING: u32 = 1 << 4;
    pub const ENHANCED_MISSED_CALLS: u32 = 1 << 5;
    pub const X_BT_UCI_VCARD_PROPERTY: u32 = 1 << 6;
    pub const X_BT_UID_VCARD_PROPERTY: u32 = 1 << 7;
    pub const CONTACT_REFERENCING: u32 = 1 << 8;
    pub const DEFAULT_CONTACT_IMAGE_FORMAT: u32 = 1 << 9;
}

/// vCard property bits, used by `PropertySelector` and `VCardSelector`.
pub mod property_mask {
    pub const VERSION: u32 = 1 << 0;
    pub const FN: u32 = 1 << 1;
    pub const N: u32 = 1 << 2;
    pub const PHOTO: u32 = 1 << 3;
    pub const BDAY: u32 = 1 << 4;
    pub const ADR: u32 = 1 << 5;
    pub const LABEL: u32 = 1 << 6;
    pub const TEL: u32 = 1 << 7;
    pub const EMAIL: u32 = 1 << 8;
    pub const MAILER: u32 = 1 << 9;
    pub const TZ: u32 = 1 << 10;
    pub const GEO: u32 = 1 << 11;
    pub const TITLE: u32 = 1 << 12;
    pub const ROLE: u32 = 1 << 13;
    pub const LOGO: u32 = 1 << 14;
    pub const AGENT: u32 = 1 << 15;
    pub const ORG: u32 = 1 << 16;
    pub const NOTE: u32 = 1 << 17;
    pub const REV: u32 = 1 << 18;
    pub const SOUND: u32 = 1 << 19;
    pub const URL: u32 = 1 << 20;
    pub const UID: u32 = 1 << 21;
    pub const KEY: u32 = 1 << 22;
    pub const NICKNAME: u32 = 1 << 23;
    pub const CATEGORIES: u32 = 1 << 24;
    pub const PROID: u32 = 1 << 25;
    pub const CLASS: u32 = 1 << 26;
    pub const SORT_STRING: u32 = 1 << 27;
    pub const X_IRMC_CALL_DATETIME: u32 = 1 << 28;
    pub const X_BT_SPEEDDIALKEY: u32 = 1 << 29;
    pub const X_BT_UCI: u32 = 1 << 30;
    pub const X_BT_UID: u32 = 1 << 31;
}
