//! SDP service records for the profile servers.
//!
//! Records are built as SDP data-element sequences: each element carries a
//! descriptor byte (type and size index) and, for variable-size elements, an
//! explicit length. The profile records follow the Bluetooth assigned
//! numbers: service class list, protocol descriptor list (L2CAP, RFCOMM
//! with channel, OBEX), profile descriptor with version, service name, the
//! optional GOEP L2CAP PSM, and the profile-specific attributes.

use crate::opp::SERVICE_CLASS_OBEX_OBJECT_PUSH;
use crate::pbap::{SERVICE_CLASS_PHONEBOOK_ACCESS, SERVICE_CLASS_PHONEBOOK_ACCESS_PSE};

const ATTRIBUTE_SERVICE_RECORD_HANDLE: u16 = 0x0000;
const ATTRIBUTE_SERVICE_CLASS_ID_LIST: u16 = 0x0001;
const ATTRIBUTE_PROTOCOL_DESCRIPTOR_LIST: u16 = 0x0004;
const ATTRIBUTE_PROFILE_DESCRIPTOR_LIST: u16 = 0x0009;
const ATTRIBUTE_SERVICE_NAME: u16 = 0x0100;
const ATTRIBUTE_GOEP_L2CAP_PSM: u16 = 0x0200;
const ATTRIBUTE_SUPPORTED_FORMATS_LIST: u16 = 0x0303;
const ATTRIBUTE_SUPPORTED_REPOSITORIES: u16 = 0x0314;
const ATTRIBUTE_PBAP_SUPPORTED_FEATURES: u16 = 0x0317;

const PROTOCOL_L2CAP: u16 = 0x0100;
const PROTOCOL_RFCOMM: u16 = 0x0003;
const PROTOCOL_OBEX: u16 = 0x0008;

/// Profile version 1.2, used by both OPP and PBAP records.
const PROFILE_VERSION: u16 = 0x0102;

// Descriptor bytes: data-element type in the high five bits, size index in
// the low three.
const DE_UINT8: u8 = 0x08;
const DE_UINT16: u8 = 0x09;
const DE_UINT32: u8 = 0x0a;
const DE_UUID16: u8 = 0x19;
const DE_STRING_LEN8: u8 = 0x25;
const DE_SEQUENCE_LEN16: u8 = 0x36;

/// A data-element sequence under construction.
#[derive(Debug, Default)]
pub struct DataElementSequence {
    buf: Vec<u8>,
}

impl DataElementSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_uint8(&mut self, value: u8) {
        self.buf.push(DE_UINT8);
        self.buf.push(value);
    }

    pub fn add_uint16(&mut self, value: u16) {
        self.buf.push(DE_UINT16);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn add_uint32(&mut self, value: u32) {
        self.buf.push(DE_UINT32);
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn add_uuid16(&mut self, uuid: u16) {
        self.buf.push(DE_UUID16);
        self.buf.extend_from_slice(&uuid.to_be_bytes());
    }

    pub fn add_string(&mut self, value: &str) {
        debug_assert!(value.len() <= usize::from(u8::MAX));
        self.buf.push(DE_STRING_LEN8);
        self.buf.push(value.len() as u8);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Appends a nested sequence built by `f`.
    pub fn add_sequence(&mut self, f: impl FnOnce(&mut DataElementSequence)) {
        let mut inner = DataElementSequence::new();
        f(&mut inner);
        self.buf.push(DE_SEQUENCE_LEN16);
        self.buf
            .extend_from_slice(&(inner.buf.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(&inner.buf);
    }

    /// Wraps the accumulated elements into a top-level sequence.
    pub fn into_record(self) -> Vec<u8> {
        let mut record = Vec::with_capacity(self.buf.len() + 3);
        record.push(DE_SEQUENCE_LEN16);
        record.extend_from_slice(&(self.buf.len() as u16).to_be_bytes());
        record.extend_from_slice(&self.buf);
        record
    }
}

/// The attributes every OBEX profile record shares.
fn add_common_attributes(
    record: &mut DataElementSequence,
    service_record_handle: u32,
    service_class: u16,
    profile: u16,
    rfcomm_channel: u8,
) {
    record.add_uint16(ATTRIBUTE_SERVICE_RECORD_HANDLE);
    record.add_uint32(service_record_handle);

    record.add_uint16(ATTRIBUTE_SERVICE_CLASS_ID_LIST);
    record.add_sequence(|classes| {
        classes.add_uuid16(service_class);
    });

    record.add_uint16(ATTRIBUTE_PROTOCOL_DESCRIPTOR_LIST);
    record.add_sequence(|protocols| {
        protocols.add_sequence(|l2cap| {
            l2cap.add_uuid16(PROTOCOL_L2CAP);
        });
        protocols.add_sequence(|rfcomm| {
            rfcomm.add_uuid16(PROTOCOL_RFCOMM);
            rfcomm.add_uint8(rfcomm_channel);
        });
        protocols.add_sequence(|obex| {
            obex.add_uuid16(PROTOCOL_OBEX);
        });
    });

    record.add_uint16(ATTRIBUTE_PROFILE_DESCRIPTOR_LIST);
    record.add_sequence(|profiles| {
        profiles.add_sequence(|descriptor| {
            descriptor.add_uuid16(profile);
            descriptor.add_uint16(PROFILE_VERSION);
        });
    });
}

fn add_name_and_psm(record: &mut DataElementSequence, name: &str, l2cap_psm: Option<u16>) {
    record.add_uint16(ATTRIBUTE_SERVICE_NAME);
    record.add_string(name);

    if let Some(psm) = l2cap_psm {
        record.add_uint16(ATTRIBUTE_GOEP_L2CAP_PSM);
        record.add_uint16(psm);
    }
}

/// Builds the SDP record of an Object Push server.
pub fn opp_create_sdp_record(
    service_record_handle: u32,
    rfcomm_channel: u8,
    l2cap_psm: Option<u16>,
    name: &str,
    supported_formats: &[u8],
) -> Vec<u8> {
    let mut record = DataElementSequence::new();
    add_common_attributes(
        &mut record,
        service_record_handle,
        SERVICE_CLASS_OBEX_OBJECT_PUSH,
        SERVICE_CLASS_OBEX_OBJECT_PUSH,
        rfcomm_channel,
    );
    add_name_and_psm(&mut record, name, l2cap_psm);

    record.add_uint16(ATTRIBUTE_SUPPORTED_FORMATS_LIST);
    record.add_sequence(|formats| {
        for format in supported_formats {
            formats.add_uint8(*format);
        }
    });

    record.into_record()
}

/// Builds the SDP record of a Phonebook Access server (PSE role).
pub fn pbap_create_sdp_record(
    service_record_handle: u32,
    rfcomm_channel: u8,
    l2cap_psm: Option<u16>,
    name: &str,
    supported_repositories: u8,
    supported_features: u32,
) -> Vec<u8> {
    let mut record = DataElementSequence::new();
    add_common_attributes(
        &mut record,
        service_record_handle,
        SERVICE_CLASS_PHONEBOOK_ACCESS_PSE,
        SERVICE_CLASS_PHONEBOOK_ACCESS,
        rfcomm_channel,
    );
    add_name_and_psm(&mut record, name, l2cap_psm);

    record.add_uint16(ATTRIBUTE_SUPPORTED_REPOSITORIES);
    record.add_uint8(supported_repositories);

    record.add_uint16(ATTRIBUTE_PBAP_SUPPORTED_FEATURES);
    record.add_uint32(supported_features);

    record.into_record()
}
