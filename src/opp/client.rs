//! Object Push Profile client.
//!
//! Drives the outbound OBEX session: CONNECT after the GOEP transport is
//! up, then user-initiated operations (push an object, pull the default
//! business card), ABORT, and DISCONNECT. Responses are parsed with a
//! resumable [`ObexParser`] armed before every request goes out; pulled
//! object bytes are forwarded verbatim as [`OppClientEvent::ObjectData`].

use obex_types::{
    error::{CommandError, OperationStatus},
    header::{HeaderId, SrmValue, SrmpValue},
    opcode::{Opcode, ResponseCode, MAX_PACKET_LENGTH_DEFAULT, OBEX_VERSION},
};

use crate::{
    frame::Frame,
    goep::{BdAddr, ConnectionStatus, GoepSession, SessionHandle},
    parser::{store_header_chunk, ObexParser, ObjectState, StoreState},
    srm::{ClientSrmState, SrmHeaders},
};

use super::{DEFAULT_OBJECT_TYPE, OPP_UUID, SERVICE_CLASS_OBEX_OBJECT_PUSH};

/// Events reported to the owning application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OppClientEvent {
    ConnectionOpened {
        session: SessionHandle,
        status: ConnectionStatus,
        address: BdAddr,
        connection_handle: u16,
        incoming: bool,
    },
    ConnectionClosed {
        session: SessionHandle,
    },
    OperationCompleted {
        session: SessionHandle,
        status: OperationStatus,
    },
    /// A piece of the pulled default object, in order.
    ObjectData {
        session: SessionHandle,
        data: Vec<u8>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Init,
    W4GoepConnection,
    W2SendConnect,
    W4ConnectResponse,
    Connected,
    W2SendGet,
    W4GetResponse,
    W2SendPut,
    W4PutResponse,
    W2SendDisconnect,
    W4DisconnectResponse,
    W4AbortComplete,
}

/// An object push in progress.
#[derive(Debug)]
struct PushOperation {
    name: String,
    object_type: String,
    data: Vec<u8>,
    offset: usize,
}

/// The OPP client session (one slot).
#[derive(Debug)]
pub struct OppClient<G: GoepSession> {
    goep: G,
    state: State,
    session: SessionHandle,
    next_session_id: u16,
    address: BdAddr,
    connection_handle: u16,
    incoming: bool,
    connection_id: Option<u32>,
    abort_requested: bool,
    waiting_for_response: bool,
    parser: ObexParser,
    header_buf: [u8; 4],
    srm_headers: SrmHeaders,
    srm_state: ClientSrmState,
    push: Option<PushOperation>,
    pull_active: bool,
    /// SRM is offered on the first request of an operation only.
    first_get_sent: bool,
}

impl<G: GoepSession> OppClient<G> {
    pub fn new(goep: G) -> Self {
        Self {
            goep,
            state: State::Init,
            session: SessionHandle(0),
            next_session_id: 1,
            address: [0; 6],
            connection_handle: 0,
            incoming: false,
            connection_id: None,
            abort_requested: false,
            waiting_for_response: false,
            parser: ObexParser::for_request(),
            header_buf: [0; 4],
            srm_headers: SrmHeaders::new(),
            srm_state: ClientSrmState::Disabled,
            push: None,
            pull_active: false,
            first_get_sent: false,
        }
    }

    /// Opens a GOEP connection to the peer's Object Push service and runs
    /// the OBEX CONNECT exchange once the transport reports up.
    pub fn connect(&mut self, address: BdAddr) -> Result<SessionHandle, CommandError> {
        if self.state != State::Init {
            return Err(CommandError::Busy);
        }
        self.session = SessionHandle(self.next_session_id);
        self.next_session_id = self.next_session_id.checked_add(1).unwrap_or(1);
        self.address = address;
        self.connection_id = None;
        self.state = State::W4GoepConnection;
        self.goep
            .create_connection(address, SERVICE_CLASS_OBEX_OBJECT_PUSH);
        Ok(self.session)
    }

    /// Posts a DISCONNECT; only valid once connected.
    pub fn disconnect(&mut self, session: SessionHandle) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if !self.is_obex_connected() {
            return Err(CommandError::Busy);
        }
        self.state = State::W2SendDisconnect;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// Flags the running operation for abort; the ABORT request goes out at
    /// the next send opportunity.
    pub fn abort(&mut self, session: SessionHandle) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if !self.is_obex_connected() || self.abort_requested {
            return Err(CommandError::Disallowed);
        }
        log::info!("opp client: abort requested in {:?}", self.state);
        self.abort_requested = true;
        Ok(())
    }

    /// Pushes an object to the peer's inbox.
    pub fn push_object(
        &mut self,
        session: SessionHandle,
        name: &str,
        object_type: &str,
        data: &[u8],
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if self.state != State::Connected {
            return Err(CommandError::Busy);
        }
        self.push = Some(PushOperation {
            name: name.to_owned(),
            object_type: object_type.to_owned(),
            data: data.to_vec(),
            offset: 0,
        });
        self.state = State::W2SendPut;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// Pulls the peer's default business card; bytes arrive as
    /// [`OppClientEvent::ObjectData`], completion as `OperationCompleted`.
    pub fn pull_default_object(&mut self, session: SessionHandle) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if self.state != State::Connected {
            return Err(CommandError::Busy);
        }
        self.pull_active = true;
        self.first_get_sent = false;
        self.srm_state = ClientSrmState::Disabled;
        self.state = State::W2SendGet;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// GOEP reports the connection attempt's outcome.
    pub fn handle_connection_opened(
        &mut self,
        status: ConnectionStatus,
        address: BdAddr,
        connection_handle: u16,
        incoming: bool,
    ) -> Vec<OppClientEvent> {
        let mut events = Vec::new();
        self.address = address;
        self.connection_handle = connection_handle;
        self.incoming = incoming;
        if status.is_success() {
            log::info!("opp client: connection established");
            self.state = State::W2SendConnect;
            self.goep.request_can_send_now();
        } else {
            log::info!("opp client: connection failed");
            self.state = State::Init;
            events.push(self.connection_opened_event(status));
        }
        events
    }

    /// GOEP reports the transport as gone.
    pub fn handle_connection_closed(&mut self) -> Vec<OppClientEvent> {
        let mut events = Vec::new();
        if self.operation_in_flight() {
            events.push(OppClientEvent::OperationCompleted {
                session: self.session,
                status: OperationStatus::Disconnected,
            });
        }
        self.reset_session();
        events.push(OppClientEvent::ConnectionClosed {
            session: self.session,
        });
        events
    }

    /// GOEP grants the send slot requested earlier.
    pub fn handle_can_send_now(&mut self) -> Vec<OppClientEvent> {
        let events = Vec::new();
        if self.abort_requested {
            self.abort_requested = false;
            let mut frame = Frame::request(Opcode::Abort, true, self.goep.max_packet_size());
            if let Some(connection_id) = self.connection_id {
                frame.add_connection_id(connection_id);
            }
            self.state = State::W4AbortComplete;
            self.arm_response_parser(Opcode::Abort);
            self.goep.send(&frame.finish_request());
            return events;
        }
        match self.state {
            State::W2SendConnect => {
                let mut frame = Frame::connect_request(
                    OBEX_VERSION,
                    0,
                    MAX_PACKET_LENGTH_DEFAULT,
                    self.goep.max_packet_size(),
                );
                frame.add_target(&OPP_UUID);
                self.state = State::W4ConnectResponse;
                self.arm_response_parser(Opcode::Connect);
                self.goep.send(&frame.finish_request());
            }
            State::W2SendDisconnect => {
                let mut frame = Frame::request(Opcode::Disconnect, true, self.goep.max_packet_size());
                if let Some(connection_id) = self.connection_id {
                    frame.add_connection_id(connection_id);
                }
                self.state = State::W4DisconnectResponse;
                self.arm_response_parser(Opcode::Disconnect);
                self.goep.send(&frame.finish_request());
            }
            State::W2SendGet => {
                let mut frame = Frame::request(Opcode::Get, true, self.goep.max_packet_size());
                if let Some(connection_id) = self.connection_id {
                    frame.add_connection_id(connection_id);
                }
                if !self.first_get_sent {
                    self.first_get_sent = true;
                    frame.add_type(DEFAULT_OBJECT_TYPE);
                    if self.goep.supports_single_response_mode() {
                        frame.add_srm_enable();
                        self.srm_state.offered();
                    }
                }
                self.state = State::W4GetResponse;
                self.arm_response_parser(Opcode::Get);
                self.goep.send(&frame.finish_request());
            }
            State::W2SendPut => self.send_put_packet(),
            _ => {}
        }
        events
    }

    /// GOEP delivers a data packet (a response, possibly partial).
    pub fn handle_data(&mut self, packet: &[u8]) -> Vec<OppClientEvent> {
        let mut events = Vec::new();
        if !self.waiting_for_response {
            return events;
        }
        let parser_state = self.run_parser(packet, &mut events);
        if parser_state == ObjectState::Error {
            // A malformed response cannot be recovered; abort the operation.
            log::warn!("opp client: malformed response, aborting");
            self.waiting_for_response = false;
            self.abort_requested = true;
            self.goep.request_can_send_now();
            return events;
        }
        if parser_state != ObjectState::Complete {
            return events;
        }
        self.waiting_for_response = false;
        let info = self.parser.operation_info();
        match self.state {
            State::W4ConnectResponse => match info.response_code {
                ResponseCode::Success => {
                    self.state = State::Connected;
                    events.push(self.connection_opened_event(ConnectionStatus::Success));
                }
                other => {
                    log::info!("opp client: obex connect failed ({:?})", other);
                    self.state = State::Init;
                    events.push(self.connection_opened_event(ConnectionStatus::Failed(other.value())));
                }
            },
            State::W4DisconnectResponse => {
                self.goep.close();
            }
            State::W4AbortComplete => {
                self.state = State::Connected;
                self.finish_operation(OperationStatus::Aborted, &mut events);
            }
            State::W4GetResponse => {
                self.srm_state.handle_headers(&self.srm_headers);
                match info.response_code {
                    ResponseCode::Continue => {
                        if self.srm_state.is_enabled() {
                            // Server streams on its own; just re-arm.
                            self.arm_response_parser(Opcode::Get);
                        } else {
                            self.state = State::W2SendGet;
                            self.goep.request_can_send_now();
                        }
                    }
                    ResponseCode::Success => {
                        self.state = State::Connected;
                        self.finish_operation(OperationStatus::Success, &mut events);
                    }
                    other => {
                        self.state = State::Connected;
                        self.finish_operation(OperationStatus::Rejected(other), &mut events);
                    }
                }
            }
            State::W4PutResponse => match info.response_code {
                ResponseCode::Continue => {
                    if self.push.as_ref().is_some_and(|push| push.offset < push.data.len()) {
                        self.state = State::W2SendPut;
                        self.goep.request_can_send_now();
                    } else {
                        // Continue after the final packet; treat as done.
                        self.state = State::Connected;
                        self.finish_operation(OperationStatus::Success, &mut events);
                    }
                }
                ResponseCode::Success => {
                    self.state = State::Connected;
                    self.finish_operation(OperationStatus::Success, &mut events);
                }
                other => {
                    self.state = State::Connected;
                    self.finish_operation(OperationStatus::Rejected(other), &mut events);
                }
            },
            _ => {
                log::warn!("opp client: unexpected response in {:?}", self.state);
            }
        }
        events
    }

    fn send_put_packet(&mut self) {
        let max_packet_size = self.goep.max_packet_size();
        let connection_id = self.connection_id;
        let push = match &mut self.push {
            Some(push) => push,
            None => return,
        };
        let mut frame = Frame::request(Opcode::Put, false, max_packet_size);
        if let Some(connection_id) = connection_id {
            frame.add_connection_id(connection_id);
        }
        if push.offset == 0 {
            frame.add_name(&push.name);
            frame.add_type(&push.object_type);
            frame.add_length(push.data.len() as u32);
        }
        let room = usize::from(frame.max_body_size());
        let remaining = push.data.len() - push.offset;
        let chunk_len = remaining.min(room);
        let chunk = &push.data[push.offset..push.offset + chunk_len];
        if chunk_len == remaining {
            frame.set_final_bit();
            frame.add_end_of_body(chunk);
        } else {
            frame.add_body(chunk);
        }
        push.offset += chunk_len;
        self.state = State::W4PutResponse;
        self.arm_response_parser(Opcode::Put);
        self.goep.send(&frame.finish_request());
    }

    fn run_parser(&mut self, packet: &[u8], events: &mut Vec<OppClientEvent>) -> ObjectState {
        let Self {
            parser,
            state,
            srm_headers,
            header_buf,
            connection_id,
            pull_active,
            session,
            ..
        } = self;
        let session = *session;
        let in_get = *state == State::W4GetResponse && *pull_active;
        let in_connect = *state == State::W4ConnectResponse;
        parser.process_data(packet, &mut |chunk| match chunk.id {
            HeaderId::ConnectionId if in_connect => {
                if store_header_chunk(header_buf, &chunk) == StoreState::Complete {
                    *connection_id = Some(u32::from_be_bytes(*header_buf));
                }
            }
            HeaderId::SingleResponseMode => {
                let mut value = [0u8; 1];
                if store_header_chunk(&mut value, &chunk) == StoreState::Complete {
                    srm_headers.srm = SrmValue::parse(value[0]);
                }
            }
            HeaderId::SingleResponseModeParameter => {
                let mut value = [0u8; 1];
                if store_header_chunk(&mut value, &chunk) == StoreState::Complete {
                    srm_headers.srmp = SrmpValue::parse(value[0]);
                }
            }
            HeaderId::Body | HeaderId::EndOfBody => {
                // Only a running pull delivers object bytes; anything else
                // is a protocol violation and is dropped.
                if in_get {
                    events.push(OppClientEvent::ObjectData {
                        session,
                        data: chunk.data.to_vec(),
                    });
                } else {
                    log::warn!("opp client: unexpected body bytes dropped");
                }
            }
            _ => {}
        })
    }

    fn arm_response_parser(&mut self, opcode: Opcode) {
        self.parser = ObexParser::for_response(opcode);
        self.srm_headers.reset();
        self.waiting_for_response = true;
    }

    fn finish_operation(&mut self, status: OperationStatus, events: &mut Vec<OppClientEvent>) {
        self.push = None;
        self.pull_active = false;
        self.first_get_sent = false;
        self.srm_state = ClientSrmState::Disabled;
        events.push(OppClientEvent::OperationCompleted {
            session: self.session,
            status,
        });
    }

    fn connection_opened_event(&self, status: ConnectionStatus) -> OppClientEvent {
        OppClientEvent::ConnectionOpened {
            session: self.session,
            status,
            address: self.address,
            connection_handle: self.connection_handle,
            incoming: self.incoming,
        }
    }

    fn is_obex_connected(&self) -> bool {
        !matches!(
            self.state,
            State::Init | State::W4GoepConnection | State::W2SendConnect | State::W4ConnectResponse
        )
    }

    fn operation_in_flight(&self) -> bool {
        !matches!(
            self.state,
            State::Init
                | State::W4GoepConnection
                | State::W2SendConnect
                | State::W4ConnectResponse
                | State::Connected
        )
    }

    fn reset_session(&mut self) {
        self.state = State::Init;
        self.connection_id = None;
        self.abort_requested = false;
        self.waiting_for_response = false;
        self.push = None;
        self.pull_active = false;
        self.first_get_sent = false;
        self.srm_state = ClientSrmState::Disabled;
    }
}
