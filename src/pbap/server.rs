//! Phonebook Access Profile server.
//!
//! Shares the outer shape of the OPP server (CONNECT, request parsing,
//! wait-for-user-data, response streaming with SRM) but classifies GET
//! requests into phonebook / vCard-listing / vCard-entry pulls, interprets
//! SetPath folder navigation, decodes the request application parameters,
//! and assembles response application parameters (PhonebookSize,
//! NewMissedCalls, DatabaseIdentifier, folder versions) on the first
//! response packet of an operation.

use obex_types::{
    app_params::{AppParamTag, VCardFormat, DATABASE_IDENTIFIER_LEN, FOLDER_VERSION_LEN},
    error::{CommandError, OperationStatus},
    header::{HeaderId, SrmValue, SrmpValue},
    opcode::{Opcode, ResponseCode, MAX_PACKET_LENGTH_DEFAULT, OBEX_VERSION},
    phonebook::{ObjectType, Phonebook},
};

use crate::{
    app_param_parser::{encode_param, store_tag_chunk, AppParamParser},
    frame::Frame,
    goep::{BdAddr, ConnectionStatus, GoepSession, SessionHandle},
    parser::{store_header_chunk, ObexParser, ObjectState, StoreState, StringHeader},
    srm::{ServerSrmState, SrmHeaders},
};

use super::{MAX_NAME_LEN, MAX_SEARCH_VALUE_LEN, MAX_TYPE_LEN, PBAP_UUID};

/// Events reported to the owning application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PbapServerEvent {
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
    /// Reserved: OBEX authentication is not implemented.
    AuthenticationRequest {
        session: SessionHandle,
    },
    /// SetPath to the root folder; answer with
    /// [`PbapServer::send_set_phonebook_result`].
    SetPhonebookRoot {
        session: SessionHandle,
    },
    /// SetPath one level up.
    SetPhonebookUp {
        session: SessionHandle,
    },
    /// SetPath into a child folder.
    SetPhonebookDown {
        session: SessionHandle,
        name: String,
    },
    /// `MaxListCount = 0`: the peer asks for the object count only; answer
    /// with [`PbapServer::send_phonebook_size`].
    QueryPhonebookSize {
        session: SessionHandle,
        phonebook: Phonebook,
        vcard_selector: u32,
        vcard_selector_operator: u8,
        name: String,
    },
    /// The peer asked for the new-missed-calls counter to be reset; emitted
    /// before the pull or size-query event of the same request.
    ResetMissedCalls {
        session: SessionHandle,
        phonebook: Phonebook,
        name: String,
    },
    /// Pull of a whole phonebook; answer with
    /// [`PbapServer::send_pull_response`], chunked to
    /// [`PbapServer::get_max_body_size`].
    PullPhonebook {
        session: SessionHandle,
        phonebook: Phonebook,
        continuation: u32,
        property_selector: u32,
        format: VCardFormat,
        max_list_count: u16,
        list_start_offset: u16,
        vcard_selector: u32,
        vcard_selector_operator: u8,
        name: String,
    },
    /// Pull of a folder listing.
    PullVCardListing {
        session: SessionHandle,
        phonebook: Phonebook,
        continuation: u32,
        order: u8,
        max_list_count: u16,
        list_start_offset: u16,
        vcard_selector: u32,
        vcard_selector_operator: u8,
        search_property: u8,
        search_value: String,
        name: String,
    },
    /// Pull of a single vCard.
    PullVCardEntry {
        session: SessionHandle,
        phonebook: Phonebook,
        property_selector: u32,
        format: VCardFormat,
        name: String,
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
    W4SetPathResponse,
    SendResponse,
    SendPreparedResponse,
    SendDisconnectResponse,
    AboutToSend,
}

#[derive(Clone, Copy, Debug)]
enum ParserContext {
    /// CONNECT request: Target and the supported-features parameter.
    Connect,
    /// GET and SETPATH requests.
    Operation,
    /// DISCONNECT/ABORT and unknown operations.
    Ignore,
}

/// Decoded request application parameters, reset to their defaults at every
/// operation boundary.
#[derive(Debug)]
struct AppParams {
    property_selector: u32,
    vcard_selector: u32,
    format: VCardFormat,
    max_list_count: u16,
    list_start_offset: u16,
    reset_new_missed_calls: bool,
    vcard_selector_operator: u8,
    order: u8,
    search_property: u8,
}

impl Default for AppParams {
    fn default() -> Self {
        Self {
            property_selector: 0xffff_ffff,
            vcard_selector: 0xffff_ffff,
            format: VCardFormat::V21,
            max_list_count: 0xffff,
            list_start_offset: 0,
            reset_new_missed_calls: false,
            vcard_selector_operator: 0,
            order: 0,
            search_property: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Request {
    name: StringHeader,
    type_header: StringHeader,
    object_type: ObjectType,
    continuation: u32,
    app_param_parser: Option<AppParamParser>,
    tag_buf: [u8; 8],
    search_value: StringHeader,
    app_params: AppParams,
}

#[derive(Debug, Default)]
struct Response {
    code: Option<ResponseCode>,
    frame: Option<Frame>,
    phonebook_size: Option<u16>,
    new_missed_calls: Option<u16>,
    primary_folder_version: Option<[u8; FOLDER_VERSION_LEN]>,
    secondary_folder_version: Option<[u8; FOLDER_VERSION_LEN]>,
    database_identifier: Option<[u8; DATABASE_IDENTIFIER_LEN]>,
}

/// The PBAP server session (one slot).
#[derive(Debug)]
pub struct PbapServer<G: GoepSession> {
    goep: G,
    state: State,
    session: SessionHandle,
    next_session_id: u16,
    address: BdAddr,
    connection_handle: u16,
    incoming: bool,
    parser: ObexParser,
    parser_context: ParserContext,
    supported_features: u32,
    srm_headers: SrmHeaders,
    srm_state: ServerSrmState,
    request: Request,
    response: Response,
    abort_code: Option<ResponseCode>,
}

impl<G: GoepSession> PbapServer<G> {
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
            supported_features: 0,
            srm_headers: SrmHeaders::new(),
            srm_state: ServerSrmState::Disabled,
            request: Request::default(),
            response: Response::default(),
            abort_code: None,
        }
    }

    /// Peer capabilities from the CONNECT `PbapSupportedFeatures` parameter.
    pub fn peer_supported_features(&self) -> u32 {
        self.supported_features
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
    ) -> Vec<PbapServerEvent> {
        let mut events = Vec::new();
        if status.is_success() {
            self.session = SessionHandle(self.next_session_id);
            self.next_session_id = self.next_session_id.checked_add(1).unwrap_or(1);
            self.address = address;
            self.connection_handle = connection_handle;
            self.incoming = incoming;
            self.supported_features = 0;
            self.state = State::W4ConnectOpcode;
            log::info!("pbap server: connection established");
        }
        events.push(PbapServerEvent::ConnectionOpened {
            session: self.session,
            status,
            address,
            connection_handle,
            incoming,
        });
        events
    }

    /// GOEP reports the transport as gone.
    pub fn handle_connection_closed(&mut self) -> Vec<PbapServerEvent> {
        let mut events = Vec::new();
        let operation_in_flight = !matches!(
            self.state,
            State::W4Open | State::W4ConnectOpcode | State::W4ConnectRequest | State::Connected
        );
        if operation_in_flight {
            events.push(PbapServerEvent::OperationCompleted {
                session: self.session,
                status: OperationStatus::Disconnected,
            });
        }
        if !matches!(self.state, State::W4Open) {
            events.push(PbapServerEvent::ConnectionClosed {
                session: self.session,
            });
        }
        self.finalize_connection();
        events
    }

    /// GOEP grants the send slot requested earlier.
    pub fn handle_can_send_now(&mut self) -> Vec<PbapServerEvent> {
        let mut events = Vec::new();
        let max = self.goep.max_packet_size();
        log::debug!("pbap server: can send now in {:?}", self.state);
        match self.state {
            State::SendConnectResponseError => {
                self.state = State::W4ConnectOpcode;
                let packet = Frame::response(max).finish_response(ResponseCode::BadRequest);
                self.goep.send(&packet);
            }
            State::SendConnectResponseSuccess => {
                let mut frame =
                    Frame::connect_response(OBEX_VERSION, 0, MAX_PACKET_LENGTH_DEFAULT, max);
                frame.add_who(&PBAP_UUID);
                self.operation_complete();
                self.goep.send(&frame.finish_response(ResponseCode::Success));
            }
            State::SendResponse => {
                let code = self.response.code.unwrap_or(ResponseCode::BadRequest);
                self.operation_complete();
                self.goep.send(&Frame::response(max).finish_response(code));
            }
            State::SendPreparedResponse => {
                let code = self.response.code.unwrap_or(ResponseCode::InternalServerError);
                let frame = self.response.frame.take().unwrap_or_else(|| Frame::response(max));
                if code == ResponseCode::Continue {
                    self.reset_response();
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
            State::SendDisconnectResponse => {
                let session = self.session;
                self.finalize_connection();
                self.goep
                    .send(&Frame::response(max).finish_response(ResponseCode::Success));
                events.push(PbapServerEvent::ConnectionClosed { session });
            }
            _ => {}
        }
        events
    }

    /// GOEP delivers a data packet.
    pub fn handle_data(&mut self, packet: &[u8]) -> Vec<PbapServerEvent> {
        let mut events = Vec::new();
        if packet.is_empty() {
            return events;
        }
        match self.state {
            State::W4ConnectOpcode => {
                self.request = Request::default();
                self.parser = ObexParser::for_request();
                self.parser_context = ParserContext::Connect;
                self.state = State::W4ConnectRequest;
                self.process_connect(packet);
            }
            State::W4ConnectRequest => self.process_connect(packet),
            State::Connected => {
                let (opcode, _) = Opcode::parse(packet[0]);
                self.parser = ObexParser::for_request();
                self.parser_context = match opcode {
                    Opcode::Get | Opcode::SetPath => ParserContext::Operation,
                    _ => ParserContext::Ignore,
                };
                self.state = State::W4Request;
                self.process_request(packet, &mut events);
            }
            State::W4Request => self.process_request(packet, &mut events),
            State::W4GetOpcode => {
                self.parser = ObexParser::for_request();
                self.parser_context = ParserContext::Operation;
                self.state = State::W4GetRequest;
                self.process_get_continuation(packet, &mut events);
            }
            State::W4GetRequest => self.process_get_continuation(packet, &mut events),
            _ => {
                log::warn!("pbap server: data ignored in {:?}", self.state);
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

    /// Answers a pull event with the next body fragment.
    ///
    /// `continuation` is opaque to the stack and echoed on the next pull
    /// event of this operation; `ResponseCode::Continue` keeps the
    /// operation open.
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
        self.state = State::SendPreparedResponse;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// Answers a [`PbapServerEvent::QueryPhonebookSize`] event.
    pub fn send_phonebook_size(
        &mut self,
        session: SessionHandle,
        code: ResponseCode,
        phonebook_size: u16,
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if !self.listing_response_allowed() {
            return Err(CommandError::Disallowed);
        }
        self.response.phonebook_size = Some(phonebook_size);
        self.build_response();
        self.response.code = Some(code);
        self.state = State::SendPreparedResponse;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// Answers a SetPath event.
    pub fn send_set_phonebook_result(
        &mut self,
        session: SessionHandle,
        code: ResponseCode,
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if self.state != State::W4SetPathResponse {
            return Err(CommandError::Disallowed);
        }
        self.response.code = Some(code);
        self.state = State::SendResponse;
        self.goep.request_can_send_now();
        Ok(())
    }

    /// Schedules the `NewMissedCalls` response parameter for the first
    /// response packet of the running pull.
    pub fn set_new_missed_calls(
        &mut self,
        session: SessionHandle,
        new_missed_calls: u16,
    ) -> Result<(), CommandError> {
        self.check_listing_response(session)?;
        self.response.new_missed_calls = Some(new_missed_calls);
        Ok(())
    }

    /// Schedules the `PrimaryFolderVersion` response parameter.
    pub fn set_primary_folder_version(
        &mut self,
        session: SessionHandle,
        version: [u8; FOLDER_VERSION_LEN],
    ) -> Result<(), CommandError> {
        self.check_listing_response(session)?;
        self.response.primary_folder_version = Some(version);
        Ok(())
    }

    /// Schedules the `SecondaryFolderVersion` response parameter.
    pub fn set_secondary_folder_version(
        &mut self,
        session: SessionHandle,
        version: [u8; FOLDER_VERSION_LEN],
    ) -> Result<(), CommandError> {
        self.check_listing_response(session)?;
        self.response.secondary_folder_version = Some(version);
        Ok(())
    }

    /// Schedules the `DatabaseIdentifier` response parameter; valid for any
    /// object pull.
    pub fn set_database_identifier(
        &mut self,
        session: SessionHandle,
        identifier: [u8; DATABASE_IDENTIFIER_LEN],
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if self.state != State::W4UserData || self.request.object_type == ObjectType::Invalid {
            return Err(CommandError::Disallowed);
        }
        self.response.database_identifier = Some(identifier);
        Ok(())
    }

    /// Rejects the running pull; instead of the next pull event, a response
    /// with `code` terminates the operation.
    pub fn abort_request(
        &mut self,
        session: SessionHandle,
        code: ResponseCode,
    ) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        match self.state {
            State::W4GetOpcode
            | State::W4GetRequest
            | State::W4UserData
            | State::SendPreparedResponse
            | State::AboutToSend => {
                self.abort_code = Some(code);
                Ok(())
            }
            _ => Err(CommandError::Disallowed),
        }
    }

    fn process_connect(&mut self, packet: &[u8]) {
        match self.run_parser(packet) {
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

    fn process_request(&mut self, packet: &[u8], events: &mut Vec<PbapServerEvent>) {
        self.srm_headers.reset();
        match self.run_parser(packet) {
            ObjectState::Complete => {
                let info = self.parser.operation_info();
                match info.opcode {
                    Opcode::Get => self.handle_get_request(events),
                    Opcode::SetPath => {
                        self.state = State::W4SetPathResponse;
                        self.emit_set_path_event(info.set_path_flags, events);
                    }
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

    fn process_get_continuation(&mut self, packet: &[u8], events: &mut Vec<PbapServerEvent>) {
        self.srm_headers.reset();
        match self.run_parser(packet) {
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

    fn run_parser(&mut self, packet: &[u8]) -> ObjectState {
        let Self {
            parser,
            parser_context,
            srm_headers,
            request,
            supported_features,
            ..
        } = self;
        let Request {
            name,
            type_header,
            app_param_parser,
            tag_buf,
            search_value,
            app_params,
            ..
        } = request;
        let connect = matches!(parser_context, ParserContext::Connect);
        parser.process_data(packet, &mut |chunk| {
            if matches!(parser_context, ParserContext::Ignore) {
                return;
            }
            match chunk.id {
                HeaderId::Target => {
                    // Target verification is the registrar's job; GOEP
                    // already routed the connection here.
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
                HeaderId::ConnectionId => {}
                HeaderId::Name => name.push_unicode(
                    chunk.total_len.into(),
                    chunk.offset.into(),
                    chunk.data,
                    MAX_NAME_LEN,
                ),
                HeaderId::Type => type_header.push_ascii(
                    chunk.total_len.into(),
                    chunk.offset.into(),
                    chunk.data,
                    MAX_TYPE_LEN,
                ),
                HeaderId::ApplicationParameters => {
                    if chunk.offset == 0 {
                        *app_param_parser = Some(AppParamParser::new(chunk.total_len));
                    }
                    let tlv_parser = match app_param_parser {
                        Some(tlv_parser) => tlv_parser,
                        None => return,
                    };
                    tlv_parser.process_data(chunk.data, &mut |tag_chunk| {
                        if tag_chunk.tag == AppParamTag::SearchValue {
                            search_value.push_ascii(
                                tag_chunk.total_len.into(),
                                tag_chunk.offset.into(),
                                tag_chunk.data,
                                MAX_SEARCH_VALUE_LEN,
                            );
                            return;
                        }
                        if store_tag_chunk(tag_buf, &tag_chunk) != StoreState::Complete {
                            return;
                        }
                        let total = usize::from(tag_chunk.total_len);
                        match tag_chunk.tag {
                            AppParamTag::PbapSupportedFeatures if connect && total == 4 => {
                                *supported_features =
                                    u32::from_be_bytes([tag_buf[0], tag_buf[1], tag_buf[2], tag_buf[3]]);
                            }
                            AppParamTag::PropertySelector if total == 8 => {
                                // only the low 32 bit are defined
                                app_params.property_selector =
                                    u32::from_be_bytes([tag_buf[4], tag_buf[5], tag_buf[6], tag_buf[7]]);
                            }
                            AppParamTag::VCardSelector if total == 8 => {
                                app_params.vcard_selector =
                                    u32::from_be_bytes([tag_buf[4], tag_buf[5], tag_buf[6], tag_buf[7]]);
                            }
                            AppParamTag::Format if total == 1 => {
                                app_params.format = VCardFormat::parse(tag_buf[0]);
                            }
                            AppParamTag::MaxListCount if total == 2 => {
                                app_params.max_list_count =
                                    u16::from_be_bytes([tag_buf[0], tag_buf[1]]);
                            }
                            AppParamTag::ListStartOffset if total == 2 => {
                                app_params.list_start_offset =
                                    u16::from_be_bytes([tag_buf[0], tag_buf[1]]);
                            }
                            AppParamTag::ResetNewMissedCalls if total == 1 => {
                                app_params.reset_new_missed_calls = tag_buf[0] == 1;
                            }
                            AppParamTag::VCardSelectorOperator if total == 1 => {
                                app_params.vcard_selector_operator = tag_buf[0];
                            }
                            AppParamTag::Order if total == 1 => {
                                app_params.order = tag_buf[0];
                            }
                            AppParamTag::SearchProperty if total == 1 => {
                                app_params.search_property = tag_buf[0];
                            }
                            other => {
                                log::debug!("pbap server: unhandled app param {:?}", other);
                            }
                        }
                    });
                }
                other => {
                    log::debug!("pbap server: unhandled header {:?}", other);
                }
            }
        })
    }

    fn emit_set_path_event(&mut self, flags: u8, events: &mut Vec<PbapServerEvent>) {
        let name = self.request.name.as_str();
        let event = if name.is_empty() {
            if flags & 0x01 != 0 {
                PbapServerEvent::SetPhonebookUp {
                    session: self.session,
                }
            } else {
                PbapServerEvent::SetPhonebookRoot {
                    session: self.session,
                }
            }
        } else {
            PbapServerEvent::SetPhonebookDown {
                session: self.session,
                name: name.to_owned(),
            }
        };
        events.push(event);
    }

    fn handle_get_request(&mut self, events: &mut Vec<PbapServerEvent>) {
        self.srm_state.handle_headers(&self.srm_headers);
        if let Some(code) = self.abort_code.take() {
            self.send_internal(code);
            return;
        }
        self.request.object_type = ObjectType::from_type_header(self.request.type_header.as_str());
        if self.request.object_type == ObjectType::Invalid {
            self.send_internal(ResponseCode::BadRequest);
            return;
        }
        let name = self.request.name.as_str().to_owned();
        let phonebook = Phonebook::from_name(&name);
        if self.request.app_params.reset_new_missed_calls {
            events.push(PbapServerEvent::ResetMissedCalls {
                session: self.session,
                phonebook,
                name: name.clone(),
            });
        }
        if self.request.app_params.max_list_count == 0 {
            // a size query; meaningless for a single vCard
            if self.request.object_type == ObjectType::VCardEntry {
                self.send_internal(ResponseCode::BadRequest);
                return;
            }
            self.state = State::W4UserData;
            events.push(PbapServerEvent::QueryPhonebookSize {
                session: self.session,
                phonebook,
                vcard_selector: self.request.app_params.vcard_selector,
                vcard_selector_operator: self.request.app_params.vcard_selector_operator,
                name,
            });
            return;
        }
        let params = &self.request.app_params;
        let event = match self.request.object_type {
            ObjectType::Phonebook => PbapServerEvent::PullPhonebook {
                session: self.session,
                phonebook,
                continuation: self.request.continuation,
                property_selector: params.property_selector,
                format: params.format,
                max_list_count: params.max_list_count,
                list_start_offset: params.list_start_offset,
                vcard_selector: params.vcard_selector,
                vcard_selector_operator: params.vcard_selector_operator,
                name,
            },
            ObjectType::VCardListing => PbapServerEvent::PullVCardListing {
                session: self.session,
                phonebook,
                continuation: self.request.continuation,
                order: params.order,
                max_list_count: params.max_list_count,
                list_start_offset: params.list_start_offset,
                vcard_selector: params.vcard_selector,
                vcard_selector_operator: params.vcard_selector_operator,
                search_property: params.search_property,
                search_value: self.request.search_value.as_str().to_owned(),
                name,
            },
            ObjectType::VCardEntry => PbapServerEvent::PullVCardEntry {
                session: self.session,
                phonebook,
                property_selector: params.property_selector,
                format: params.format,
                name,
            },
            ObjectType::Invalid => return,
        };
        self.state = State::W4UserData;
        events.push(event);
    }

    /// Lazily starts the outgoing response: interim code, SRM confirmation,
    /// pending response application parameters. Each parameter is
    /// serialized once and its slot cleared.
    fn build_response(&mut self) {
        if self.response.code.is_some() {
            return;
        }
        self.response.code = Some(ResponseCode::Success);
        let mut frame = Frame::response(self.goep.max_packet_size());
        if self.srm_state.confirm() {
            frame.add_srm_enable();
        }
        let mut params = Vec::new();
        if let Some(size) = self.response.phonebook_size.take() {
            encode_param(&mut params, AppParamTag::PhonebookSize, &size.to_be_bytes());
        }
        if let Some(count) = self.response.new_missed_calls.take() {
            encode_param(&mut params, AppParamTag::NewMissedCalls, &count.to_be_bytes());
        }
        if let Some(version) = self.response.primary_folder_version.take() {
            encode_param(&mut params, AppParamTag::PrimaryFolderVersion, &version);
        }
        if let Some(version) = self.response.secondary_folder_version.take() {
            encode_param(&mut params, AppParamTag::SecondaryFolderVersion, &version);
        }
        if let Some(identifier) = self.response.database_identifier.take() {
            encode_param(&mut params, AppParamTag::DatabaseIdentifier, &identifier);
        }
        if !params.is_empty() {
            frame.add_application_parameters(&params);
        }
        self.response.frame = Some(frame);
    }

    fn send_internal(&mut self, code: ResponseCode) {
        self.response.code = Some(code);
        self.state = State::SendResponse;
        self.goep.request_can_send_now();
    }

    fn check_listing_response(&self, session: SessionHandle) -> Result<(), CommandError> {
        if session != self.session {
            return Err(CommandError::UnknownConnectionIdentifier);
        }
        if !self.listing_response_allowed() {
            return Err(CommandError::Disallowed);
        }
        Ok(())
    }

    /// Response metadata is defined for phonebook and listing pulls only.
    fn listing_response_allowed(&self) -> bool {
        self.state == State::W4UserData
            && matches!(
                self.request.object_type,
                ObjectType::Phonebook | ObjectType::VCardListing
            )
    }

    fn reset_response(&mut self) {
        self.response = Response::default();
    }

    fn operation_complete(&mut self) {
        self.state = State::Connected;
        self.srm_state = ServerSrmState::Disabled;
        self.request = Request::default();
        self.reset_response();
        self.abort_code = None;
    }

    fn finalize_connection(&mut self) {
        self.state = State::W4Open;
        self.srm_state = ServerSrmState::Disabled;
        self.request = Request::default();
        self.reset_response();
        self.abort_code = None;
        self.supported_features = 0;
    }
}
