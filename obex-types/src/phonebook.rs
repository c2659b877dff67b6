//! Phonebook object classification for the Phonebook Access Profile.

#[cfg(feature = "arbitrary")]
use arbitrary::Arbitrary;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of object a PBAP GET request asks for, derived from the `Type`
/// OBEX header.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ObjectType {
    #[default]
    Invalid,
    Phonebook,
    VCardListing,
    VCardEntry,
}

impl ObjectType {
    /// Classifies the value of the `Type` header.
    pub fn from_type_header(type_header: &str) -> Self {
        match type_header {
            "x-bt/phonebook" => Self::Phonebook,
            "x-bt/vcard-listing" => Self::VCardListing,
            "x-bt/vcard" => Self::VCardEntry,
            _ => Self::Invalid,
        }
    }
}

/// The phonebook a request addresses, derived from the `Name` OBEX header.
///
/// Phonebook pulls name the object ("telecom/pb.vcf"), listings name the
/// folder ("pb"), both may carry the `SIM1/` repository prefix. The local
/// SIM repository has no speed-dial or favourites folder.
#[cfg_attr(feature = "arbitrary", derive(Arbitrary))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Phonebook {
    #[default]
    Invalid,
    /// Combined call history.
    Cch,
    /// Favourite contacts.
    Fav,
    /// Incoming call history.
    Ich,
    /// Missed call history.
    Mch,
    /// Outgoing call history.
    Och,
    /// Main phonebook.
    Pb,
    /// Speed-dial entries.
    Spd,
    SimCch,
    SimIch,
    SimMch,
    SimOch,
    SimPb,
}

impl Phonebook {
    /// Classifies a `Name` header value.
    ///
    /// Accepts the object form ("telecom/pb.vcf", "SIM1/telecom/mch.vcf")
    /// and the bare folder form used while browsing ("pb", "telecom/pb").
    pub fn from_name(name: &str) -> Self {
        let (sim, rest) = match name.strip_prefix("SIM1/") {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        let rest = rest.strip_prefix("telecom/").unwrap_or(rest);
        let base = rest.strip_suffix(".vcf").unwrap_or(rest);
        match (base, sim) {
            ("cch", false) => Self::Cch,
            ("fav", false) => Self::Fav,
            ("ich", false) => Self::Ich,
            ("mch", false) => Self::Mch,
            ("och", false) => Self::Och,
            ("pb", false) => Self::Pb,
            ("spd", false) => Self::Spd,
            ("cch", true) => Self::SimCch,
            ("ich", true) => Self::SimIch,
            ("mch", true) => Self::SimMch,
            ("och", true) => Self::SimOch,
            ("pb", true) => Self::SimPb,
            _ => Self::Invalid,
        }
    }
}
