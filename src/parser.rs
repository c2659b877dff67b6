//! Resumable parser for OBEX objects (requests and responses).
//!
//! OBEX objects are length-prefixed and may be delivered by the transport in
//! arbitrarily small pieces; a single header can straddle several GOEP data
//! packets. The parser is therefore a byte-driven automaton that is fed
//! successive slices via [`ObexParser::process_data`] and reports header
//! payloads through a callback as they arrive, without buffering them.
//!
//! The callback receives [`HeaderChunk`]s: the header id, the total payload
//! length, the offset of this chunk within the payload, and the chunk bytes.
//! A header with an empty payload triggers exactly one callback with an
//! empty chunk. Callers that need a contiguous value reassemble it with
//! [`store_header_chunk`] and act once it reports [`StoreState::Complete`].
//!
//! # Example
//!
//! ```rust
//! use obex_codec::parser::{ObexParser, ObjectState};
//!
//! let mut parser = ObexParser::for_request();
//! // CONNECT, length 7, version 1.4, flags 0, max packet length 0xffff
//! let packet = [0x80, 0x00, 0x07, 0x14, 0x00, 0xff, 0xff];
//! let state = parser.process_data(&packet, &mut |_chunk| {});
//! assert_eq!(state, ObjectState::Complete);
//! ```

use obex_types::{
    header::{HeaderEncoding, HeaderId},
    opcode::{Opcode, ResponseCode},
};

/// Smallest possible OBEX object: code byte plus 2-byte length.
const PREFIX_LEN: usize = 3;

/// A piece of one header's payload.
#[derive(Clone, Copy, Debug)]
pub struct HeaderChunk<'a> {
    pub id: HeaderId,
    /// Total payload length of this header.
    pub total_len: u16,
    /// Offset of `data` within the payload.
    pub offset: u16,
    pub data: &'a [u8],
}

impl HeaderChunk<'_> {
    /// Whether this chunk completes the header's payload.
    pub fn is_last(&self) -> bool {
        usize::from(self.offset) + self.data.len() == usize::from(self.total_len)
    }
}

/// Progress of the object currently being parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObjectState {
    /// More bytes are needed.
    InProgress,
    /// The object is complete; see [`ObexParser::operation_info`].
    Complete,
    /// A length inconsistency was detected. The parser stays in this state
    /// until re-initialized.
    Error,
}

/// Summary of a completely parsed object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OperationInfo {
    /// Request opcode. For responses, the opcode the parser was initialized
    /// with.
    pub opcode: Opcode,
    /// Final bit of the request opcode byte.
    pub final_bit: bool,
    /// Response code. Only meaningful when parsing a response.
    pub response_code: ResponseCode,
    /// Declared object length, including the 3-byte prefix.
    pub total_length: u16,
    /// Flags byte of a SetPath request, 0 otherwise.
    pub set_path_flags: u8,
    /// Maximum packet length from CONNECT fields, 0 otherwise.
    pub max_packet_length: u16,
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    /// Opcode (request) or response code (response).
    Code,
    /// 2-byte big-endian object length.
    Length { received: u8 },
    /// CONNECT carries version/flags/max-packet-length, SetPath
    /// flags/constants, directly after the length.
    Fields { received: u8, expected: u8 },
    HeaderId,
    /// 2-byte header length of the string/byte-sequence encodings.
    HeaderLength { received: u8 },
    HeaderPayload,
    Complete,
    Error,
}

/// Resumable parser for one OBEX object.
#[derive(Debug)]
pub struct ObexParser {
    /// `None` when parsing a request; the request opcode when parsing the
    /// matching response (CONNECT responses carry extra fields).
    response_to: Option<Opcode>,
    phase: Phase,
    code_byte: u8,
    object_length: usize,
    consumed: usize,
    fields: [u8; 4],
    header_id: HeaderId,
    header_total: usize,
    header_offset: usize,
    header_length_high: u8,
}

impl ObexParser {
    /// Parser for a request: the first byte is an opcode.
    pub fn for_request() -> Self {
        Self::new(None)
    }

    /// Parser for the response to `request_opcode`: the first byte is a
    /// response code.
    pub fn for_response(request_opcode: Opcode) -> Self {
        Self::new(Some(request_opcode))
    }

    fn new(response_to: Option<Opcode>) -> Self {
        Self {
            response_to,
            phase: Phase::Code,
            code_byte: 0,
            object_length: 0,
            consumed: 0,
            fields: [0; 4],
            header_id: HeaderId::Other(0),
            header_total: 0,
            header_offset: 0,
            header_length_high: 0,
        }
    }

    /// Feeds the next slice of transport bytes.
    ///
    /// The callback may be invoked several times per call, once per header
    /// payload piece contained in `data`. Trailing bytes after the end of
    /// the object are an error.
    pub fn process_data(
        &mut self,
        data: &[u8],
        callback: &mut dyn FnMut(HeaderChunk<'_>),
    ) -> ObjectState {
        let mut pos = 0;
        while pos < data.len() {
            match self.phase {
                Phase::Code => {
                    self.code_byte = data[pos];
                    pos += 1;
                    self.consumed += 1;
                    self.phase = Phase::Length { received: 0 };
                }
                Phase::Length { received } => {
                    if received == 0 {
                        self.object_length = usize::from(data[pos]) << 8;
                        self.phase = Phase::Length { received: 1 };
                    } else {
                        self.object_length |= usize::from(data[pos]);
                        let expected = self.field_count();
                        if self.object_length < PREFIX_LEN + usize::from(expected) {
                            self.phase = Phase::Error;
                            pos += 1;
                            continue;
                        }
                        self.phase = if expected > 0 {
                            Phase::Fields {
                                received: 0,
                                expected,
                            }
                        } else {
                            Phase::HeaderId
                        };
                    }
                    pos += 1;
                    self.consumed += 1;
                    self.check_object_end();
                }
                Phase::Fields { received, expected } => {
                    self.fields[usize::from(received)] = data[pos];
                    pos += 1;
                    self.consumed += 1;
                    if received + 1 == expected {
                        self.phase = Phase::HeaderId;
                        self.check_object_end();
                    } else {
                        self.phase = Phase::Fields {
                            received: received + 1,
                            expected,
                        };
                    }
                }
                Phase::HeaderId => {
                    self.header_id = HeaderId::parse(data[pos]);
                    pos += 1;
                    self.consumed += 1;
                    self.header_offset = 0;
                    match self.header_id.encoding() {
                        HeaderEncoding::UnicodeText | HeaderEncoding::ByteSequence => {
                            self.phase = Phase::HeaderLength { received: 0 };
                        }
                        HeaderEncoding::SingleByte => {
                            self.header_total = 1;
                            self.start_payload(callback);
                        }
                        HeaderEncoding::FourBytes => {
                            self.header_total = 4;
                            self.start_payload(callback);
                        }
                    }
                }
                Phase::HeaderLength { received } => {
                    if received == 0 {
                        self.header_length_high = data[pos];
                        self.phase = Phase::HeaderLength { received: 1 };
                        pos += 1;
                        self.consumed += 1;
                    } else {
                        let header_len =
                            usize::from(self.header_length_high) << 8 | usize::from(data[pos]);
                        pos += 1;
                        self.consumed += 1;
                        // The encoded length covers id and length bytes.
                        if header_len < PREFIX_LEN {
                            self.phase = Phase::Error;
                            continue;
                        }
                        self.header_total = header_len - PREFIX_LEN;
                        self.start_payload(callback);
                    }
                }
                Phase::HeaderPayload => {
                    let remaining_header = self.header_total - self.header_offset;
                    let take = remaining_header.min(data.len() - pos);
                    callback(HeaderChunk {
                        id: self.header_id,
                        total_len: self.header_total as u16,
                        offset: self.header_offset as u16,
                        data: &data[pos..pos + take],
                    });
                    self.header_offset += take;
                    pos += take;
                    self.consumed += take;
                    if self.header_offset == self.header_total {
                        self.phase = Phase::HeaderId;
                        self.check_object_end();
                    }
                }
                Phase::Complete => {
                    log::warn!("trailing byte 0x{:02x} after complete object", data[pos]);
                    self.phase = Phase::Error;
                }
                Phase::Error => return ObjectState::Error,
            }
            // A header or its payload may not extend past the object.
            if self.consumed > self.object_length && !matches!(self.phase, Phase::Code | Phase::Length { .. }) {
                self.phase = Phase::Error;
            }
        }
        self.state()
    }

    /// Information about the parsed object. Valid once
    /// [`ObexParser::process_data`] returned [`ObjectState::Complete`].
    pub fn operation_info(&self) -> OperationInfo {
        let (opcode, final_bit) = match self.response_to {
            Some(opcode) => (opcode, true),
            None => Opcode::parse(self.code_byte),
        };
        let is_connect = matches!(opcode, Opcode::Connect);
        OperationInfo {
            opcode,
            final_bit,
            response_code: ResponseCode::parse(self.code_byte),
            total_length: self.object_length as u16,
            set_path_flags: if matches!(opcode, Opcode::SetPath) {
                self.fields[0]
            } else {
                0
            },
            max_packet_length: if is_connect {
                u16::from_be_bytes([self.fields[2], self.fields[3]])
            } else {
                0
            },
        }
    }

    fn state(&self) -> ObjectState {
        match self.phase {
            Phase::Complete => ObjectState::Complete,
            Phase::Error => ObjectState::Error,
            _ => ObjectState::InProgress,
        }
    }

    /// Extra fixed fields between the length and the first header.
    fn field_count(&self) -> u8 {
        match self.response_to {
            // CONNECT responses mirror the request fields.
            Some(Opcode::Connect) => 4,
            Some(_) => 0,
            None => match Opcode::parse(self.code_byte).0 {
                Opcode::Connect => 4,
                Opcode::SetPath => 2,
                _ => 0,
            },
        }
    }

    /// Enters the payload phase; empty payloads report one empty chunk.
    fn start_payload(&mut self, callback: &mut dyn FnMut(HeaderChunk<'_>)) {
        if self.consumed + self.header_total > self.object_length {
            self.phase = Phase::Error;
            return;
        }
        if self.header_total == 0 {
            callback(HeaderChunk {
                id: self.header_id,
                total_len: 0,
                offset: 0,
                data: &[],
            });
            self.phase = Phase::HeaderId;
            self.check_object_end();
        } else {
            self.phase = Phase::HeaderPayload;
        }
    }

    fn check_object_end(&mut self) {
        if self.consumed == self.object_length {
            self.phase = Phase::Complete;
        }
    }
}

/// Progress of assembling one header payload into a scratch buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreState {
    InProgress,
    Complete,
    /// The payload does not fit the buffer; the stored prefix is truncated.
    Overrun,
}

/// Reassembles chunked header payloads that must be read as one value, such
/// as the 1-byte SRM headers or the 4-byte connection id.
pub fn store_header_chunk(buffer: &mut [u8], chunk: &HeaderChunk<'_>) -> StoreState {
    store_chunk(
        buffer,
        usize::from(chunk.total_len),
        usize::from(chunk.offset),
        chunk.data,
    )
}

pub(crate) fn store_chunk(
    buffer: &mut [u8],
    total_len: usize,
    offset: usize,
    data: &[u8],
) -> StoreState {
    if total_len > buffer.len() || offset + data.len() > total_len {
        let keep = buffer.len().saturating_sub(offset).min(data.len());
        let start = offset.min(buffer.len());
        buffer[start..][..keep].copy_from_slice(&data[..keep]);
        return StoreState::Overrun;
    }
    buffer[offset..offset + data.len()].copy_from_slice(data);
    if offset + data.len() == total_len {
        StoreState::Complete
    } else {
        StoreState::InProgress
    }
}

/// Accumulates a bounded string header across callback chunks.
///
/// `Name` headers are UTF-16 big-endian on the wire; only the low byte of
/// each code unit is kept, a byte-truncated down-conversion that is good
/// enough for equality checks and logging. `Type` headers are stored
/// verbatim. Payloads longer than the configured bound are discarded
/// entirely, not truncated.
#[derive(Debug, Default)]
pub(crate) struct StringHeader {
    bytes: Vec<u8>,
}

impl StringHeader {
    pub(crate) fn reset(&mut self) {
        self.bytes.clear();
    }

    /// Feeds a chunk of a UTF-16 payload; `max_chars` bounds the decoded
    /// length.
    pub(crate) fn push_unicode(
        &mut self,
        total_len: usize,
        offset: usize,
        data: &[u8],
        max_chars: usize,
    ) {
        if total_len >= max_chars * 2 {
            return;
        }
        if offset == 0 {
            self.bytes.clear();
        }
        for (i, byte) in data.iter().enumerate() {
            if (offset + i) & 1 == 1 {
                self.bytes.push(*byte);
            }
        }
    }

    /// Feeds a chunk of a byte-string payload; `max_len` bounds the length.
    pub(crate) fn push_ascii(&mut self, total_len: usize, offset: usize, data: &[u8], max_len: usize) {
        if total_len >= max_len {
            return;
        }
        if offset == 0 {
            self.bytes.clear();
        }
        self.bytes.extend_from_slice(data);
    }

    /// The accumulated value with the trailing NUL stripped.
    pub(crate) fn as_str(&self) -> &str {
        let bytes = match self.bytes.split_last() {
            Some((0, rest)) => rest,
            _ => &self.bytes,
        };
        core::str::from_utf8(bytes).unwrap_or("")
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn collect(parser: &mut ObexParser, data: &[u8]) -> (ObjectState, Vec<(HeaderId, u16, u16, Vec<u8>)>) {
        let mut chunks = Vec::new();
        let state = parser.process_data(data, &mut |chunk| {
            chunks.push((chunk.id, chunk.total_len, chunk.offset, chunk.data.to_vec()));
        });
        (state, chunks)
    }

    /// GET final, type "text/x-vcard\0", empty name.
    fn sample_get() -> Vec<u8> {
        let mut packet = vec![0x83, 0x00, 0x00];
        packet.push(0x01); // Name, empty
        packet.extend_from_slice(&[0x00, 0x03]);
        packet.push(0x42); // Type
        let type_value = b"text/x-vcard\0";
        packet.extend_from_slice(&(type_value.len() as u16 + 3).to_be_bytes());
        packet.extend_from_slice(type_value);
        let len = packet.len() as u16;
        packet[1..3].copy_from_slice(&len.to_be_bytes());
        packet
    }

    #[test]
    fn connect_request_without_headers() {
        let mut parser = ObexParser::for_request();
        let (state, chunks) = collect(&mut parser, &[0x80, 0x00, 0x07, 0x14, 0x00, 0x20, 0x00]);
        assert_eq!(state, ObjectState::Complete);
        assert!(chunks.is_empty());
        let info = parser.operation_info();
        assert_eq!(info.opcode, Opcode::Connect);
        assert!(info.final_bit);
        assert_eq!(info.max_packet_length, 0x2000);
    }

    #[test]
    fn get_request_headers_in_one_packet() {
        let packet = sample_get();
        let mut parser = ObexParser::for_request();
        let (state, chunks) = collect(&mut parser, &packet);
        assert_eq!(state, ObjectState::Complete);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].0, HeaderId::Name);
        assert_eq!(chunks[0].1, 0);
        assert!(chunks[0].3.is_empty());
        assert_eq!(chunks[1].0, HeaderId::Type);
        assert_eq!(chunks[1].3, b"text/x-vcard\0");
    }

    #[test]
    fn single_byte_and_four_byte_headers() {
        // SRM enable + ConnectionId 0x00000007
        let packet = [
            0x83, 0x00, 0x0a, 0x97, 0x01, 0xcb, 0x00, 0x00, 0x00, 0x07,
        ];
        let mut parser = ObexParser::for_request();
        let (state, chunks) = collect(&mut parser, &packet);
        assert_eq!(state, ObjectState::Complete);
        assert_eq!(chunks[0].0, HeaderId::SingleResponseMode);
        assert_eq!(chunks[0].3, [0x01]);
        assert_eq!(chunks[1].0, HeaderId::ConnectionId);
        assert_eq!(chunks[1].1, 4);
        assert_eq!(chunks[1].3, [0x00, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn header_longer_than_object_is_an_error() {
        // Object claims 30 bytes total, sole header claims 40.
        let mut packet = vec![0x83, 0x00, 30];
        packet.push(0x42);
        packet.extend_from_slice(&40u16.to_be_bytes());
        packet.extend_from_slice(&[0u8; 26]);
        let mut parser = ObexParser::for_request();
        let (state, _) = collect(&mut parser, &packet);
        assert_eq!(state, ObjectState::Error);
    }

    #[test]
    fn string_header_length_below_prefix_is_an_error() {
        let packet = [0x83, 0x00, 0x06, 0x01, 0x00, 0x02];
        let mut parser = ObexParser::for_request();
        let (state, _) = collect(&mut parser, &packet);
        assert_eq!(state, ObjectState::Error);
    }

    #[test]
    fn object_length_below_prefix_is_an_error() {
        let mut parser = ObexParser::for_request();
        let (state, _) = collect(&mut parser, &[0x83, 0x00, 0x02]);
        assert_eq!(state, ObjectState::Error);
    }

    #[test]
    fn trailing_bytes_are_an_error() {
        let mut packet = sample_get();
        packet.push(0x00);
        let mut parser = ObexParser::for_request();
        let (state, _) = collect(&mut parser, &packet);
        assert_eq!(state, ObjectState::Error);
    }

    #[test]
    fn response_to_connect_carries_fields() {
        let packet = [0xa0, 0x00, 0x0c, 0x14, 0x00, 0xff, 0xff, 0xcb, 0x00, 0x00, 0x12, 0x34];
        let mut parser = ObexParser::for_response(Opcode::Connect);
        let (state, chunks) = collect(&mut parser, &packet);
        assert_eq!(state, ObjectState::Complete);
        let info = parser.operation_info();
        assert_eq!(info.response_code, ResponseCode::Success);
        assert_eq!(info.max_packet_length, 0xffff);
        assert_eq!(chunks[0].0, HeaderId::ConnectionId);
        assert_eq!(chunks[0].3, [0x00, 0x00, 0x12, 0x34]);
    }

    #[test]
    fn resumes_across_every_split_point() {
        let packet = sample_get();
        for split in 0..packet.len() {
            let mut parser = ObexParser::for_request();
            let mut chunks: Vec<(HeaderId, u16, u16, Vec<u8>)> = Vec::new();
            let mut push = |chunk: HeaderChunk<'_>| {
                chunks.push((chunk.id, chunk.total_len, chunk.offset, chunk.data.to_vec()));
            };
            let first = parser.process_data(&packet[..split], &mut push);
            assert_ne!(first, ObjectState::Error);
            let second = parser.process_data(&packet[split..], &mut push);
            assert_eq!(second, ObjectState::Complete);

            // Chunk coverage: per header, offsets are contiguous from 0 and
            // the chunks sum to the declared payload length.
            let mut type_payload = Vec::new();
            for (id, total, offset, data) in &chunks {
                if *id == HeaderId::Type {
                    assert_eq!(usize::from(*offset), type_payload.len());
                    type_payload.extend_from_slice(data);
                    assert_eq!(*total, 16 - 3);
                }
            }
            assert_eq!(type_payload, b"text/x-vcard\0");
        }
    }

    #[test]
    fn store_header_chunks() {
        let mut buffer = [0u8; 4];
        assert_eq!(
            store_chunk(&mut buffer, 4, 0, &[0xde, 0xad]),
            StoreState::InProgress
        );
        assert_eq!(
            store_chunk(&mut buffer, 4, 2, &[0xbe, 0xef]),
            StoreState::Complete
        );
        assert_eq!(buffer, [0xde, 0xad, 0xbe, 0xef]);

        let mut small = [0u8; 2];
        assert_eq!(store_chunk(&mut small, 4, 0, &[1, 2, 3, 4]), StoreState::Overrun);
    }

    proptest! {
        /// Frame conservation: payload lengths reported by the callbacks
        /// plus prefix and header framing bytes equal the declared length.
        #[test]
        fn frame_conservation(body in proptest::collection::vec(any::<u8>(), 0..64), split in 0usize..128) {
            let mut packet = vec![0x02, 0x00, 0x00];
            packet.push(0x48); // Body
            packet.extend_from_slice(&(body.len() as u16 + 3).to_be_bytes());
            packet.extend_from_slice(&body);
            packet.push(0xc3); // Length
            packet.extend_from_slice(&(body.len() as u32).to_be_bytes());
            let total = packet.len() as u16;
            packet[1..3].copy_from_slice(&total.to_be_bytes());

            let split = split.min(packet.len());
            let mut parser = ObexParser::for_request();
            let mut payload_sum = 0usize;
            let mut framing = 0usize;
            let mut seen = std::collections::HashSet::new();
            let mut cb = |chunk: HeaderChunk<'_>| {
                payload_sum += chunk.data.len();
                if seen.insert(chunk.id.value()) {
                    framing += match chunk.id.encoding() {
                        HeaderEncoding::UnicodeText | HeaderEncoding::ByteSequence => 3,
                        HeaderEncoding::SingleByte | HeaderEncoding::FourBytes => 1,
                    };
                }
            };
            prop_assert_ne!(parser.process_data(&packet[..split], &mut cb), ObjectState::Error);
            prop_assert_eq!(parser.process_data(&packet[split..], &mut cb), ObjectState::Complete);
            prop_assert_eq!(PREFIX_LEN + framing + payload_sum, usize::from(total));
        }
    }
}
