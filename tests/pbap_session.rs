//! End-to-end PBAP server sessions, driven with literal client packets.

mod common;

use common::{drain_sent, take_can_send, MockGoep, SharedGoep, PEER};
use hex_literal::hex;
use obex_codec::{
    app_param_parser::encode_param,
    frame::Frame,
    goep::{ConnectionStatus, SessionHandle},
    obex_types::{
        app_params::{AppParamTag, VCardFormat},
        error::{CommandError, OperationStatus},
        opcode::{Opcode, ResponseCode},
        phonebook::Phonebook,
    },
    pbap::{PbapServer, PbapServerEvent, PBAP_UUID},
};

struct Harness {
    server: PbapServer<MockGoep>,
    goep: SharedGoep,
    session: SessionHandle,
}

impl Harness {
    /// Brings the server up to the OBEX-connected state, announcing the
    /// given peer supported features.
    fn connected(supported_features: u32) -> Self {
        let (goep_session, goep) = MockGoep::new(0xffff, true);
        let mut server = PbapServer::new(goep_session);
        let events =
            server.handle_connection_opened(ConnectionStatus::Success, PEER, 0x0007, true);
        let session = match &events[0] {
            PbapServerEvent::ConnectionOpened { session, .. } => *session,
            other => panic!("unexpected event {other:?}"),
        };

        let mut connect = Frame::connect_request(0x14, 0x00, 0xffff, 0xffff);
        connect.add_target(&PBAP_UUID);
        let mut params = Vec::new();
        encode_param(
            &mut params,
            AppParamTag::PbapSupportedFeatures,
            &supported_features.to_be_bytes(),
        );
        connect.add_application_parameters(&params);
        let events = server.handle_data(&connect.finish_request());
        assert!(events.is_empty());

        let mut harness = Self { server, goep, session };
        let (sent, events) = harness.pump();
        assert!(events.is_empty());
        assert_eq!(sent.len(), 1);
        // Success, CONNECT fields, then the Who header with the PBAP UUID.
        assert_eq!(sent[0][0], 0xa0);
        assert_eq!(sent[0][7], 0x4a);
        assert_eq!(&sent[0][10..26], &PBAP_UUID);
        harness
    }

    fn pump(&mut self) -> (Vec<Vec<u8>>, Vec<PbapServerEvent>) {
        let mut sent = Vec::new();
        let mut events = Vec::new();
        while take_can_send(&self.goep) {
            events.extend(self.server.handle_can_send_now());
            sent.extend(drain_sent(&self.goep));
        }
        (sent, events)
    }

    fn deliver(&mut self, packet: &[u8]) -> Vec<PbapServerEvent> {
        self.server.handle_data(packet)
    }
}

fn get_request(
    type_header: &str,
    name: &str,
    params: &[(AppParamTag, Vec<u8>)],
    srm: bool,
) -> Vec<u8> {
    let mut frame = Frame::request(Opcode::Get, true, 0xffff);
    if srm {
        frame.add_srm_enable();
    }
    frame.add_type(type_header);
    if !name.is_empty() {
        frame.add_name(name);
    }
    if !params.is_empty() {
        let mut encoded = Vec::new();
        for (tag, value) in params {
            encode_param(&mut encoded, *tag, value);
        }
        frame.add_application_parameters(&encoded);
    }
    frame.finish_request()
}

#[test]
fn connect_records_supported_features() {
    let harness = Harness::connected(0x0000_001b);
    assert_eq!(harness.server.peer_supported_features(), 0x1b);
}

#[test]
fn phonebook_size_query() {
    let mut harness = Harness::connected(0x0000_001b);
    let session = harness.session;

    let packet = get_request(
        "x-bt/phonebook",
        "telecom/pb.vcf",
        &[(AppParamTag::MaxListCount, vec![0x00, 0x00])],
        false,
    );
    let events = harness.deliver(&packet);
    assert_eq!(
        events[..],
        [PbapServerEvent::QueryPhonebookSize {
            session,
            phonebook: Phonebook::Pb,
            vcard_selector: 0xffff_ffff,
            vcard_selector_operator: 0,
            name: "telecom/pb.vcf".into(),
        }]
    );

    harness
        .server
        .send_phonebook_size(session, ResponseCode::Success, 42)
        .unwrap();
    let (sent, _) = harness.pump();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0], 0xa0);
    // ApplicationParameters header carrying PhonebookSize = 0x002a
    let needle = hex!("4c 0007 08 02 002a");
    assert!(sent[0].windows(needle.len()).any(|window| window == needle));
}

#[test]
fn size_query_for_vcard_entry_is_bad_request() {
    let mut harness = Harness::connected(0);

    let packet = get_request(
        "x-bt/vcard",
        "0.vcf",
        &[(AppParamTag::MaxListCount, vec![0x00, 0x00])],
        false,
    );
    let events = harness.deliver(&packet);
    assert!(events.is_empty());
    let (sent, _) = harness.pump();
    assert_eq!(sent[..], [hex!("c0 0003").to_vec()]);
}

#[test]
fn pull_phonebook_with_srm_streams_without_further_requests() {
    let mut harness = Harness::connected(0x0000_001b);
    let session = harness.session;

    let packet = get_request("x-bt/phonebook", "telecom/pb.vcf", &[], true);
    let events = harness.deliver(&packet);
    assert_eq!(
        events[..],
        [PbapServerEvent::PullPhonebook {
            session,
            phonebook: Phonebook::Pb,
            continuation: 0,
            property_selector: 0xffff_ffff,
            format: VCardFormat::V21,
            max_list_count: 0xffff,
            list_start_offset: 0,
            vcard_selector: 0xffff_ffff,
            vcard_selector_operator: 0,
            name: "telecom/pb.vcf".into(),
        }]
    );

    // First fragment confirms SRM; the next pull event arrives without any
    // further GET from the peer.
    harness
        .server
        .send_pull_response(session, ResponseCode::Continue, 1, b"BEGIN:VCARD one")
        .unwrap();
    let (sent, events) = harness.pump();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0], 0x90);
    // SingleResponseMode = Enable on the first fragment only
    assert_eq!(&sent[0][3..5], &[0x97, 0x01]);
    assert!(matches!(
        events.as_slice(),
        [PbapServerEvent::PullPhonebook { continuation: 1, .. }]
    ));

    harness
        .server
        .send_pull_response(session, ResponseCode::Continue, 2, b"BEGIN:VCARD two")
        .unwrap();
    let (sent, events) = harness.pump();
    assert_eq!(sent[0][0], 0x90);
    assert_ne!(&sent[0][3..5], &[0x97, 0x01]);
    assert!(matches!(
        events.as_slice(),
        [PbapServerEvent::PullPhonebook { continuation: 2, .. }]
    ));

    harness
        .server
        .send_pull_response(session, ResponseCode::Success, 0, b"END:VCARD")
        .unwrap();
    let (sent, events) = harness.pump();
    assert_eq!(sent[0][0], 0xa0);
    assert!(events.is_empty());
}

#[test]
fn pull_without_srm_waits_for_next_get() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let packet = get_request("x-bt/phonebook", "telecom/pb.vcf", &[], false);
    harness.deliver(&packet);
    harness
        .server
        .send_pull_response(session, ResponseCode::Continue, 9, b"fragment")
        .unwrap();
    let (sent, events) = harness.pump();
    assert_eq!(sent[0][0], 0x90);
    // no SRM confirmation, no self-triggered next event
    assert!(events.is_empty());

    // The next GET of the chain brings the echoed continuation.
    let packet = get_request("x-bt/phonebook", "", &[], false);
    let events = harness.deliver(&packet);
    assert!(matches!(
        events.as_slice(),
        [PbapServerEvent::PullPhonebook { continuation: 9, .. }]
    ));
}

#[test]
fn vcard_listing_carries_search_parameters() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let packet = get_request(
        "x-bt/vcard-listing",
        "pb",
        &[
            (AppParamTag::Order, vec![0x01]),
            (AppParamTag::MaxListCount, vec![0x00, 0x10]),
            (AppParamTag::ListStartOffset, vec![0x00, 0x02]),
            (AppParamTag::SearchProperty, vec![0x00]),
            (AppParamTag::SearchValue, b"alice".to_vec()),
        ],
        false,
    );
    let events = harness.deliver(&packet);
    assert_eq!(
        events[..],
        [PbapServerEvent::PullVCardListing {
            session,
            phonebook: Phonebook::Pb,
            continuation: 0,
            order: 0x01,
            max_list_count: 0x10,
            list_start_offset: 0x02,
            vcard_selector: 0xffff_ffff,
            vcard_selector_operator: 0,
            search_property: 0,
            search_value: "alice".into(),
            name: "pb".into(),
        }]
    );
}

#[test]
fn vcard_entry_pull() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let packet = get_request(
        "x-bt/vcard",
        "3.vcf",
        &[
            (AppParamTag::PropertySelector, 0x85u64.to_be_bytes().to_vec()),
            (AppParamTag::Format, vec![0x01]),
        ],
        false,
    );
    let events = harness.deliver(&packet);
    assert_eq!(
        events[..],
        [PbapServerEvent::PullVCardEntry {
            session,
            phonebook: Phonebook::Invalid,
            property_selector: 0x85,
            format: VCardFormat::V30,
            name: "3.vcf".into(),
        }]
    );
}

#[test]
fn reset_missed_calls_precedes_the_pull_event() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let packet = get_request(
        "x-bt/phonebook",
        "telecom/mch.vcf",
        &[(AppParamTag::ResetNewMissedCalls, vec![0x01])],
        false,
    );
    let events = harness.deliver(&packet);
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        PbapServerEvent::ResetMissedCalls {
            session,
            phonebook: Phonebook::Mch,
            name: "telecom/mch.vcf".into(),
        }
    );
    assert!(matches!(
        &events[1],
        PbapServerEvent::PullPhonebook { phonebook: Phonebook::Mch, .. }
    ));
}

#[test]
fn response_metadata_goes_out_with_the_first_fragment_only() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    harness.deliver(&get_request("x-bt/phonebook", "telecom/mch.vcf", &[], false));
    harness.server.set_new_missed_calls(session, 3).unwrap();
    harness
        .server
        .set_primary_folder_version(session, [0x11; 16])
        .unwrap();
    harness
        .server
        .send_pull_response(session, ResponseCode::Continue, 1, b"card")
        .unwrap();
    let (sent, _) = harness.pump();
    // NewMissedCalls = 3 inside the ApplicationParameters header
    let needle = hex!("09 02 0003");
    assert!(sent[0].windows(needle.len()).any(|window| window == needle));
    let version_needle = hex!("0a 10 1111");
    assert!(sent[0]
        .windows(version_needle.len())
        .any(|window| window == version_needle));

    // Continuation GET; the next fragment must not repeat the parameters.
    harness.deliver(&get_request("x-bt/phonebook", "", &[], false));
    harness
        .server
        .send_pull_response(session, ResponseCode::Success, 0, b"done")
        .unwrap();
    let (sent, _) = harness.pump();
    assert!(!sent[0].windows(needle.len()).any(|window| window == needle));
}

#[test]
fn set_path_descend_then_up() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let mut frame = Frame::set_path_request(0x00, 0xffff);
    frame.add_name("telecom");
    let events = harness.deliver(&frame.finish_request());
    assert_eq!(
        events[..],
        [PbapServerEvent::SetPhonebookDown {
            session,
            name: "telecom".into(),
        }]
    );
    harness
        .server
        .send_set_phonebook_result(session, ResponseCode::Success)
        .unwrap();
    let (sent, _) = harness.pump();
    assert_eq!(sent[..], [hex!("a0 0003").to_vec()]);

    let mut frame = Frame::set_path_request(0x01, 0xffff);
    frame.add_name("");
    let events = harness.deliver(&frame.finish_request());
    assert_eq!(events[..], [PbapServerEvent::SetPhonebookUp { session }]);
    harness
        .server
        .send_set_phonebook_result(session, ResponseCode::Success)
        .unwrap();
    let (sent, _) = harness.pump();
    assert_eq!(sent[..], [hex!("a0 0003").to_vec()]);

    // Root: flags clear, empty name.
    let mut frame = Frame::set_path_request(0x00, 0xffff);
    frame.add_name("");
    let events = harness.deliver(&frame.finish_request());
    assert_eq!(events[..], [PbapServerEvent::SetPhonebookRoot { session }]);
    harness
        .server
        .send_set_phonebook_result(session, ResponseCode::Forbidden)
        .unwrap();
    let (sent, _) = harness.pump();
    assert_eq!(sent[..], [vec![0xc3, 0x00, 0x03]]);
}

#[test]
fn late_set_path_result_is_rejected() {
    let mut harness = Harness::connected(0);
    let session = harness.session;
    assert_eq!(
        harness
            .server
            .send_set_phonebook_result(session, ResponseCode::Success),
        Err(CommandError::Disallowed)
    );
}

#[test]
fn put_is_not_part_of_the_profile() {
    let mut harness = Harness::connected(0);

    let mut frame = Frame::request(Opcode::Put, true, 0xffff);
    frame.add_name("push.vcf");
    let events = harness.deliver(&frame.finish_request());
    assert!(events.is_empty());
    let (sent, _) = harness.pump();
    assert_eq!(sent[..], [hex!("c0 0003").to_vec()]);
}

#[test]
fn transport_loss_mid_pull_unwinds() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    harness.deliver(&get_request("x-bt/phonebook", "telecom/pb.vcf", &[], false));
    let events = harness.server.handle_connection_closed();
    assert_eq!(
        events[..],
        [
            PbapServerEvent::OperationCompleted {
                session,
                status: OperationStatus::Disconnected,
            },
            PbapServerEvent::ConnectionClosed { session },
        ]
    );
}

#[test]
fn disconnect_closes_the_session() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let frame = Frame::request(Opcode::Disconnect, true, 0xffff);
    let events = harness.deliver(&frame.finish_request());
    assert!(events.is_empty());
    let (sent, events) = harness.pump();
    assert_eq!(sent[..], [hex!("a0 0003").to_vec()]);
    assert_eq!(events[..], [PbapServerEvent::ConnectionClosed { session }]);
}

#[test]
fn request_split_across_goep_packets_is_reassembled() {
    let mut harness = Harness::connected(0);
    let session = harness.session;

    let packet = get_request("x-bt/phonebook", "telecom/ich.vcf", &[], false);
    for split in 1..packet.len() - 1 {
        // only the final split triggers the event; earlier ones are partial
        let events = harness.deliver(&packet[..split]);
        assert!(events.is_empty());
        let events = harness.deliver(&packet[split..]);
        assert!(matches!(
            events.as_slice(),
            [PbapServerEvent::PullPhonebook { phonebook: Phonebook::Ich, .. }]
        ));
        // finish the operation to reset for the next split position
        harness
            .server
            .send_pull_response(session, ResponseCode::Success, 0, b"x")
            .unwrap();
        harness.pump();
    }
}
