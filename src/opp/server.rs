//! Object Push Profile server.
//!
//! Accepts one GOEP connection, answers the OBEX CONNECT exchange, receives
//! pushed objects (PUT) and serves the default business card (GET with
//! `Type = "text/x-vcard"` and no name). Object bytes flow to the owning
//! application as [`OppServerEvent::ObjectData`]; the default-object pull
//! parks the session in a wait-for-user-data state until the application
//! answers with [`OppServer::send_pull_response`].

use obex_types::{
    error::{CommandError, OperationStatus},
    header::{HeaderId, SrmValue, SrmpValue},
    opcode::{Opcode, ResponseCode, MAX_PACKET_LENGTH_DEFAULT, OBEX_VERSION},
};

use crate::{
    frame::Frame,
    goep::{BdAddr, ConnectionStatus, GoepSession, SessionHandle},
    parser::{store_header_chunk, ObexParser, ObjectState, StoreState, StringHeader},
    srm::{ServerSrmState, SrmHeaders},
};

use super::{DEFAULT_OBJECT_TYPE, MAX_NAME_LEN, MAX_TYPE_LEN};

/// Events reported to the owning application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OppServerEvent {
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
    /// A peer starts pushing an object; its bytes follow as `ObjectData`.
    PushObject {
        session: SessionHandle,
        name: String,
        object_type: String,
        size: u32,
    },
    /// A piece of the pushed object, in order.
    ObjectData {
        session: SessionHandle,
        data: Vec<u8>,
    },
    /// The peer requests the default business card; answer with
    /// [`OppServer::send_pull_response`].
    PullDefaultObject {
        session: SessionHandle,
        continuation: u32,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    W4Open,
    W4ConnectOpcode,
    W4ConnectRequest,
    SendConnectResponseError,
    SendConnectResponseSuccess,
    Connected,
    W4Request,
    W4UserData,
    W4GetOpcode,
    W4GetRequest,
    W4PutOpcode,
    W4PutRequest,
    SendPutResponse,
    SendInternalResponse,
    SendUserResponse,
    SendDisconnectResponse,
    AboutToSend,
}

/// Which headers the parser callback acts on for the current object.
#[derive(Clone, Copy, Debug)]
enum ParserContext {
    /// CONNECT request: OPP carries nothing of interest.
    Connect,
    /// GET/PUT request; `put` selects push-object event emission.
    Operation { put: bool },
    /// DISCONNECT/ABORT and unknown operations.
    Ignore,
}

#[derive(Debug, Default)]
struct Request {
    name: StringHeader,
    object_type: StringHeader,
    length_buf: [u8; 4],
    length: u32,
    continuation: u32,
    push_event_emitted: bool,
}

#[derive(Debug, Default)]
struct Response {
    code: Option<ResponseCode>,
    frame: Option<Frame>,
}

/// The OPP server session (one slot).
#[derive(Debug)]
pub struct OppServer<G: GoepSession> {
    goep: G,
    state: State,
    session: SessionHandle,
    next_session_id: u16,
    address: BdAddr,
    connection_handle: u16,
    incoming: bool,
    parser: ObexParser,
    parser_context: ParserContext,
    srm_headers: SrmHeaders,
    srm_state: ServerSrmState,
    request: Request,
    response: Response,
    abort_code: Option<ResponseCode>,
}

impl<G: GoepSession> OppServer<G> {
    pub fn new(goep: G) -> Self {
        Self {
            goep,
            state: State::W4Open,
            session: SessionHandle(0),
            next_session_id: 1,
            address: [0; 6],
            connection_handle: 0,
            incoming: false,
            parser: ObexParser::for_request(),
            parser_context: ParserContext::Ignore,
            srm_headers: SrmHeaders::new(),
            srm_state: ServerSrmState::Disabled,
            request: Request::default(),
            response: Response::default(),
            abort_code: None,
        }
    }

    /// GOEP reports an incoming connection attempt.
    pub fn handle_incoming_connection(&mut self) {
        self.goep.accept_connection();
    }

    /// GOEP reports the connection as established (or failed).
    pub fn handle_connection_opened(
        &mut self,
        status: ConnectionStatus,
        address: BdAddr,
        connection_handle: u16,
        incoming: bool,
    ) -> Vec<OppServerEvent> {
        let mut events = Vec::new();
        if status.is_success() {
            self.session = SessionHandle(self.next_session_id);
            self.next_session_id = self.next_session_id.checked_add(1).unwrap_or(1);
            self.address = address;
            self.connection_handle = connection_handle;
            self.incoming = incoming;
            self.state = State::W4ConnectOpcode;
            log::info!("opp server: connection established");
        } else {
            log::info!("opp server: connection failed");
        }
        events.push(OppServerEvent::ConnectionOpened {
            session: self.session,
            status,
            address,
            connection_handle,
            incoming,
        });
        events
    }

    /// GOEP reports the transport as gone.
    pub fn handle_connection_closed(&mut self) -> Vec<OppServerEvent> {
        let mut events = Vec::new();
        let operation_in_flight = !matches!(
            self.state,
            State::W4Open | State::W4ConnectOpcode | State::W4ConnectRequest | State::Connected
        );
        if operation_in_flight {
            events.push(OppServerEvent::OperationCompleted {
                session: self.session,
                status: OperationStatus::Disconnected,
            });
        }
        if !matches!(self.state, State::W4Open) {
            events.push(OppServerEvent::ConnectionClosed {
                session: self.session,
            });
        }
        self.finalize_connection();
        events
    }

    /// GOEP grants the send slot requested earlier.
    pub fn handle_can_send_now(&mut self) -> Vec<OppServerEvent> {
        let mut events = Vec::new();
        let max = self.goep.max_packet_size();
        log::debug!("opp server: can send now in {:?}", self.state);
        match self.state {
            State::SendConnectResponseError => {
                self.state = State::W4ConnectOpcode;
                let packet = Frame::response(max).finish_response(ResponseCode::BadRequest);
                self.goep.send(&packet);
            }
            State::SendConnectResponseSuccess => {
                let frame =
                    Frame::connect_response(OBEX_VERSION, 0, MAX_PACKET_LENGTH_DEFAULT, max);
                self.operation_complete();
                self.goep.send(&frame.finish_response(ResponseCode::Success));
            }
            State::SendInternalResponse => {
                let code = self.response.code.unwrap_or(ResponseCode::BadRequest);
                self.operation_complete();
                self.goep.send(&Frame::response(max).finish_response(code));
            }
            State::SendUserResponse => {
                let code = self.response.code.unwrap_or(ResponseCode::InternalServerError);
                let frame = self.response.frame.take().unwrap_or_else(|| Frame::response(max));
                if code == ResponseCode::Continue {
                    self.response = Response::default();
                    self.state = if self.srm_state.is_enabled() {
                        State::AboutToSend
                    } else {
                        State::W4GetOpcode
                    };
                } else {
                    self.operation_complete();
                }
                self.goep.send(&frame.finish_response(code));
                // Under SRM the next fragment is requested right away.
                if self.srm_state.is_enabled() {
                    self.handle_get_request(&mut events);
                }
            }
            State::SendPutResponse => {
                let code = self.response.code.unwrap_or(ResponseCode::Success);
                if code == ResponseCode::Continue {
                    self.response = Response::default();
                    self.state = State::W4PutOpcode;
                } else {
                    self.operation_complete();
                }
                self.goep.send(&Frame::response(max).finish_response(code));
            }
            State::SendDisconnectResponse => {
                let session = self.session;
                self.finalize_connection();
                self.goep
                    .send(&Frame::response(max).finish_response(ResponseCode::Success));
                events.push(OppServerEvent::ConnectionClosed { session });
            }
            _ => {}
        }
        events
    }

    /// GOEP delivers a data packet.
    pub fn handle_data(&mut self, packet: &[u8]) -> Vec<OppServerEvent> {
        let mut events = Vec::new();
        if packet.is_empty() {
            return events;
        }
        match self.state {
            State::W4ConnectOpcode => {
                self.parser = ObexParser::for_request();
                self.parser_context = ParserContext::Connect;
                self.state = State::W4ConnectRequest;
                self.process_connect(packet, &mut events);
            }
            State::W4ConnectRequest => self.process_connect(packet, &mut events),
            State::Connected => {
                let (opcode, _) = Opcode::parse(packet[0]);
                self.start_operation(opcode);
                self.state = State::W4Request;
                self.process_request(packet, &mut events);
            }
            State::W4Request => self.process_request(packet, &mut events),
            State::W4GetOpcode => {
                self.parser = ObexParser::for_request();
                self.parser_context = ParserContext::Operation { put: false };
                self.state = State::W4GetRequest;
                self.process_get_continuation(packet, &mut events);
            }
            State::W4GetRequest => self.process_get_continuation(packet, &mut events),
            State::W4PutOpcode => {
                self.parser = ObexParser::for_request();
                self.parser_context = ParserContext::Operation { put: true };
                self.state = State::W4PutRequest;
                self.process_put_continuation(packet, &mut events);
            }
            State::W4PutRequest => self.process_put_continuation(packet, &mut events),
            _ => {
                log::warn!("opp server: data ignored in {:?}", self.state);
            }
        }
        events
    }

    /// Remaining room for the next pull-response body, given the headers
    /// already scheduled for it.
    pub fn get_max_body_size(&mut self, session: SessionHandle) -> u16 {
        if session != self.session || self.state != State::W4UserData {
            return 0;
        }
        self.build_response();
        match &self.response.frame {
            Some(frame) => frame.max_body_size(),
            None => 0,
        }
    }

    /// Answers a [`OppServerEvent::PullDefaultObject`] event.
    ///
    /// `continuation` is opaque to the stack and echoed on the next pull
    /// event of this operation.
    pub fn send_pull_response(
        &mut self,
        session: SessionHandle,
        code: ResponseCode,
        continuation: u32,
        body: &[u8],
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if self.state != State::W4UserData {
            return Err(CommandError::Disallowed);
        }
        self.build_response();
        let frame = match &mut self.response.frame {
            Some(frame) => frame,
            None => return Err(CommandError::Disallowed),
        };
        if body.len() > usize::from(frame.max_body_size()) {
            return Err(CommandError::CapacityExceeded);
        }
        frame.add_end_of_body(body);
        self.response.code = Some(code);
        self.request.continuation = continuation;
        self.state = State::SendUserResponse;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// Rejects an object push in progress; the next PUT response carries
    /// `code` instead of `Continue`/`Success`.
    pub fn abort_request(
        &mut self,
        session: SessionHandle,
        code: ResponseCode,
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        match self.state {
            State::W4Request | State::W4PutOpcode | State::W4PutRequest | State::SendPutResponse => {
                self.abort_code = Some(code);
                Ok(())
            }
            _ => Err(CommandError::Disallowed),
        }
    }

    fn start_operation(&mut self, opcode: Opcode) {
        self.request = Request::default();
        self.abort_code = None;
        self.parser = ObexParser::for_request();
        self.parser_context = match opcode {
            Opcode::Get => ParserContext::Operation { put: false },
            Opcode::Put => ParserContext::Operation { put: true },
            _ => ParserContext::Ignore,
        };
    }

    fn process_connect(&mut self, packet: &[u8], events: &mut Vec<OppServerEvent>) {
        match self.run_parser(packet, events) {
            ObjectState::Complete => {
                let info = self.parser.operation_info();
                self.state = if info.opcode == Opcode::Connect {
                    State::SendConnectResponseSuccess
                } else {
                    State::SendConnectResponseError
                };
                self.goep.request_can_send_now();
            }
            ObjectState::Error => {
                self.state = State::SendConnectResponseError;
                self.goep.request_can_send_now();
            }
            ObjectState::InProgress => {}
        }
    }

    fn process_request(&mut self, packet: &[u8], events: &mut Vec<OppServerEvent>) {
        self.srm_headers.reset();
        match self.run_parser(packet, events) {
            ObjectState::Complete => {
                let info = self.parser.operation_info();
                match info.opcode {
                    Opcode::Get => self.handle_get_request(events),
                    Opcode::Put => self.handle_put_request(info.final_bit),
                    Opcode::Disconnect => {
                        self.state = State::SendDisconnectResponse;
                        self.goep.request_can_send_now();
                    }
                    _ => self.send_internal(ResponseCode::BadRequest),
                }
            }
            ObjectState::Error => self.send_internal(ResponseCode::BadRequest),
            ObjectState::InProgress => {}
        }
    }

    fn process_get_continuation(&mut self, packet: &[u8], events: &mut Vec<OppServerEvent>) {
        self.srm_headers.reset();
        match self.run_parser(packet, events) {
            ObjectState::Complete => {
                let info = self.parser.operation_info();
                match info.opcode {
                    Opcode::Get => self.handle_get_request(events),
                    Opcode::Abort => self.send_internal(ResponseCode::Success),
                    _ => self.send_internal(ResponseCode::BadRequest),
                }
            }
            ObjectState::Error => self.send_internal(ResponseCode::BadRequest),
            ObjectState::InProgress => {}
        }
    }

    fn process_put_continuation(&mut self, packet: &[u8], events: &mut Vec<OppServerEvent>) {
        self.srm_headers.reset();
        match self.run_parser(packet, events) {
            ObjectState::Complete => {
                let info = self.parser.operation_info();
                match info.opcode {
                    Opcode::Put => self.handle_put_request(info.final_bit),
                    Opcode::Abort => self.send_internal(ResponseCode::Success),
                    _ => self.send_internal(ResponseCode::BadRequest),
                }
            }
            ObjectState::Error => self.send_internal(ResponseCode::BadRequest),
            ObjectState::InProgress => {}
        }
    }

    fn run_parser(&mut self, packet: &[u8], events: &mut Vec<OppServerEvent>) -> ObjectState {
        let Self {
            parser,
            parser_context,
            srm_headers,
            request,
            session,
            ..
        } = self;
        let session = *session;
        parser.process_data(packet, &mut |chunk| {
            let put = match parser_context {
                ParserContext::Operation { put } => *put,
                ParserContext::Connect | ParserContext::Ignore => return,
            };
            match chunk.id {
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
                HeaderId::ConnectionId => {}
                HeaderId::Name => request.name.push_unicode(
                    chunk.total_len.into(),
                    chunk.offset.into(),
                    chunk.data,
                    MAX_NAME_LEN,
                ),
                HeaderId::Type => request.object_type.push_ascii(
                    chunk.total_len.into(),
                    chunk.offset.into(),
                    chunk.data,
                    MAX_TYPE_LEN,
                ),
                HeaderId::Length => {
                    if store_header_chunk(&mut request.length_buf, &chunk) == StoreState::Complete {
                        request.length = u32::from_be_bytes(request.length_buf);
                    }
                }
                HeaderId::Body | HeaderId::EndOfBody => {
                    if put && !request.push_event_emitted {
                        request.push_event_emitted = true;
                        events.push(OppServerEvent::PushObject {
                            session,
                            name: request.name.as_str().to_owned(),
                            object_type: request.object_type.as_str().to_owned(),
                            size: request.length,
                        });
                    }
                    events.push(OppServerEvent::ObjectData {
                        session,
                        data: chunk.data.to_vec(),
                    });
                }
                other => {
                    log::debug!("opp server: unhandled header {:?}", other);
                }
            }
        })
    }

    fn handle_get_request(&mut self, events: &mut Vec<OppServerEvent>) {
        self.srm_state.handle_headers(&self.srm_headers);
        if self.request.object_type.as_str() != DEFAULT_OBJECT_TYPE || !self.request.name.is_empty()
        {
            let code = if self.request.name.is_empty() {
                ResponseCode::BadRequest
            } else {
                ResponseCode::Forbidden
            };
            self.send_internal(code);
            return;
        }
        events.push(OppServerEvent::PullDefaultObject {
            session: self.session,
            continuation: self.request.continuation,
        });
        self.state = State::W4UserData;
    }

    fn handle_put_request(&mut self, final_bit: bool) {
        self.srm_state.handle_headers(&self.srm_headers);
        self.response.code = Some(match self.abort_code {
            Some(code) => code,
            None if final_bit => ResponseCode::Success,
            None => ResponseCode::Continue,
        });
        self.state = State::SendPutResponse;
        self.goep.request_can_send_now();
    }

    /// Lazily starts the outgoing response: interim code, SRM confirmation.
    fn build_response(&mut self) {
        if self.response.code.is_some() {
            return;
        }
        self.response.code = Some(ResponseCode::Success);
        let mut frame = Frame::response(self.goep.max_packet_size());
        if self.srm_state.confirm() {
            frame.add_srm_enable();
        }
        self.response.frame = Some(frame);
    }

    fn send_internal(&mut self, code: ResponseCode) {
        self.response.code = Some(code);
        self.state = State::SendInternalResponse;
        self.goep.request_can_send_now();
    }

    fn operation_complete(&mut self) {
        self.state = State::Connected;
        self.srm_state = ServerSrmState::Disabled;
        self.response = Response::default();
        self.abort_code = None;
    }

    fn finalize_connection(&mut self) {
        self.state = State::W4Open;
        self.srm_state = ServerSrmState::Disabled;
        self.request = Request::default();
        self.response = Response::default();
        self.abort_code = None;
    }
}
