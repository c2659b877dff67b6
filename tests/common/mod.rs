//! Scripted GOEP transport double for session tests.
//!
//! The double records everything the profile asks of the transport; tests
//! pump the recorded can-send-now requests back into the profile and route
//! sent packets to the peer (another state machine or literal expectations).

use std::{cell::RefCell, rc::Rc};

use obex_codec::goep::{BdAddr, GoepSession};

#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct GoepState {
    pub sent: Vec<Vec<u8>>,
    pub can_send_pending: bool,
    pub accepted: bool,
    pub created: Option<(BdAddr, u16)>,
    pub closed: bool,
}

/// Handle shared between the profile (owning the `MockGoep`) and the test.
pub type SharedGoep = Rc<RefCell<GoepState>>;

#[derive(Debug)]
pub struct MockGoep {
    state: SharedGoep,
    max_packet_size: u16,
    srm_supported: bool,
}

impl MockGoep {
    pub fn new(max_packet_size: u16, srm_supported: bool) -> (Self, SharedGoep) {
        let state: SharedGoep = Rc::new(RefCell::new(GoepState::default()));
        (
            Self {
                state: Rc::clone(&state),
                max_packet_size,
                srm_supported,
            },
            state,
        )
    }
}

impl GoepSession for MockGoep {
    fn create_connection(&mut self, address: BdAddr, service_class_uuid: u16) {
        self.state.borrow_mut().created = Some((address, service_class_uuid));
    }

    fn accept_connection(&mut self) {
        self.state.borrow_mut().accepted = true;
    }

    fn request_can_send_now(&mut self) {
        self.state.borrow_mut().can_send_pending = true;
    }

    fn max_packet_size(&self) -> u16 {
        self.max_packet_size
    }

    fn supports_single_response_mode(&self) -> bool {
        self.srm_supported
    }

    fn send(&mut self, packet: &[u8]) {
        self.state.borrow_mut().sent.push(packet.to_vec());
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

/// Takes a pending can-send-now request, if any.
pub fn take_can_send(state: &SharedGoep) -> bool {
    let mut state = state.borrow_mut();
    std::mem::take(&mut state.can_send_pending)
}

/// Drains the packets the profile handed to the transport.
pub fn drain_sent(state: &SharedGoep) -> Vec<Vec<u8>> {
    std::mem::take(&mut state.borrow_mut().sent)
}

pub const PEER: BdAddr = [0x58, 0xd9, 0xc3, 0x2b, 0xfb, 0xa7];
