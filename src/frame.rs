//! Wire-exact composition of outgoing OBEX packets.
//!
//! A [`Frame`] accumulates one request or response: the code byte, the
//! operation-specific fixed fields, and a sequence of typed headers. The
//! 2-byte object length is patched in when the frame is finished. Header
//! append order is the caller's wire order; the profile state machines rely
//! on this to keep `ConnectionId` first and `EndOfBody` last.

use obex_types::{
    header::HeaderId,
    opcode::{Opcode, ResponseCode, FINAL_BIT},
};

/// Space taken by the body header prefix when estimating remaining room.
const BODY_HEADER_PREFIX: u16 = 3;

/// One outgoing OBEX packet under construction.
#[derive(Clone, Debug)]
pub struct Frame {
    buf: Vec<u8>,
    max_packet_length: u16,
}

impl Frame {
    /// A request packet for `opcode`.
    pub fn request(opcode: Opcode, final_bit: bool, max_packet_length: u16) -> Self {
        let mut code = opcode.value();
        if final_bit {
            code |= FINAL_BIT;
        }
        Self {
            buf: vec![code, 0, 0],
            max_packet_length,
        }
    }

    /// A CONNECT request with its fixed fields.
    pub fn connect_request(
        version: u8,
        flags: u8,
        max_obex_packet_length: u16,
        max_packet_length: u16,
    ) -> Self {
        let mut frame = Self::request(Opcode::Connect, true, max_packet_length);
        frame.buf.push(version);
        frame.buf.push(flags);
        frame
            .buf
            .extend_from_slice(&max_obex_packet_length.to_be_bytes());
        frame
    }

    /// A SETPATH request with its flags and constants bytes.
    pub fn set_path_request(flags: u8, max_packet_length: u16) -> Self {
        let mut frame = Self::request(Opcode::SetPath, true, max_packet_length);
        frame.buf.push(flags);
        frame.buf.push(0x00); // constants, reserved
        frame
    }

    /// A response packet; the code byte is set by [`Frame::finish`].
    pub fn response(max_packet_length: u16) -> Self {
        Self {
            buf: vec![0, 0, 0],
            max_packet_length,
        }
    }

    /// A CONNECT response with its fixed fields.
    pub fn connect_response(
        version: u8,
        flags: u8,
        max_obex_packet_length: u16,
        max_packet_length: u16,
    ) -> Self {
        let mut frame = Self::response(max_packet_length);
        frame.buf.push(version);
        frame.buf.push(flags);
        frame
            .buf
            .extend_from_slice(&max_obex_packet_length.to_be_bytes());
        frame
    }

    /// Adds a `Name` header, UTF-16 big-endian with terminating NUL.
    ///
    /// An empty name is encoded as a header without payload, as GOEP
    /// implementations commonly do.
    pub fn add_name(&mut self, name: &str) {
        if name.is_empty() {
            self.add_sequence(HeaderId::Name, &[]);
            return;
        }
        let mut payload = Vec::with_capacity(name.len() * 2 + 2);
        for unit in name.encode_utf16() {
            payload.extend_from_slice(&unit.to_be_bytes());
        }
        payload.extend_from_slice(&[0x00, 0x00]);
        self.add_sequence(HeaderId::Name, &payload);
    }

    /// Adds a `Type` header, ASCII with terminating NUL.
    pub fn add_type(&mut self, type_header: &str) {
        let mut payload = Vec::with_capacity(type_header.len() + 1);
        payload.extend_from_slice(type_header.as_bytes());
        payload.push(0x00);
        self.add_sequence(HeaderId::Type, &payload);
    }

    /// Adds a `Length` header with the total object length.
    pub fn add_length(&mut self, length: u32) {
        self.add_four_bytes(HeaderId::Length, length);
    }

    pub fn add_target(&mut self, uuid: &[u8]) {
        self.add_sequence(HeaderId::Target, uuid);
    }

    pub fn add_who(&mut self, uuid: &[u8]) {
        self.add_sequence(HeaderId::Who, uuid);
    }

    pub fn add_connection_id(&mut self, connection_id: u32) {
        self.add_four_bytes(HeaderId::ConnectionId, connection_id);
    }

    pub fn add_application_parameters(&mut self, params: &[u8]) {
        self.add_sequence(HeaderId::ApplicationParameters, params);
    }

    pub fn add_srm_enable(&mut self) {
        self.add_single_byte(HeaderId::SingleResponseMode, 0x01);
    }

    pub fn add_srmp_wait(&mut self) {
        self.add_single_byte(HeaderId::SingleResponseModeParameter, 0x01);
    }

    pub fn add_body(&mut self, data: &[u8]) {
        self.add_sequence(HeaderId::Body, data);
    }

    pub fn add_end_of_body(&mut self, data: &[u8]) {
        self.add_sequence(HeaderId::EndOfBody, data);
    }

    /// Sets the final bit on a request whose last body chunk turned out to
    /// fit into this packet.
    pub fn set_final_bit(&mut self) {
        self.buf[0] |= FINAL_BIT;
    }

    /// Remaining room for a body payload in this frame, accounting for the
    /// body header prefix.
    pub fn max_body_size(&self) -> u16 {
        self.max_packet_length
            .saturating_sub(self.buf.len() as u16)
            .saturating_sub(BODY_HEADER_PREFIX)
    }

    /// Finishes a request: patches the object length.
    pub fn finish_request(mut self) -> Vec<u8> {
        self.patch_length();
        self.buf
    }

    /// Finishes a response: stamps the response code and patches the length.
    pub fn finish_response(mut self, code: ResponseCode) -> Vec<u8> {
        self.buf[0] = code.value();
        self.patch_length();
        self.buf
    }

    fn patch_length(&mut self) {
        debug_assert!(self.buf.len() <= usize::from(self.max_packet_length));
        let len = self.buf.len() as u16;
        self.buf[1..3].copy_from_slice(&len.to_be_bytes());
    }

    fn add_sequence(&mut self, id: HeaderId, payload: &[u8]) {
        self.buf.push(id.value());
        self.buf
            .extend_from_slice(&(payload.len() as u16 + 3).to_be_bytes());
        self.buf.extend_from_slice(payload);
    }

    fn add_single_byte(&mut self, id: HeaderId, value: u8) {
        self.buf.push(id.value());
        self.buf.push(value);
    }

    fn add_four_bytes(&mut self, id: HeaderId, value: u32) {
        self.buf.push(id.value());
        self.buf.extend_from_slice(&value.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use obex_types::{
        header::HeaderId,
        opcode::{Opcode, ResponseCode},
    };

    use crate::parser::{ObexParser, ObjectState};

    use super::*;

    #[test]
    fn connect_request_layout() {
        let mut frame = Frame::connect_request(0x14, 0x00, 0xffff, 0xffff);
        frame.add_target(&[0xaa; 16]);
        let packet = frame.finish_request();
        assert_eq!(packet[0], 0x80);
        assert_eq!(u16::from_be_bytes([packet[1], packet[2]]), packet.len() as u16);
        assert_eq!(&packet[3..7], &[0x14, 0x00, 0xff, 0xff]);
        assert_eq!(packet[7], HeaderId::Target.value());
    }

    #[test]
    fn response_code_is_stamped() {
        let frame = Frame::response(0xffff);
        let packet = frame.finish_response(ResponseCode::Continue);
        assert_eq!(packet, [0x90, 0x00, 0x03]);
    }

    #[test]
    fn name_is_utf16_with_terminator() {
        let mut frame = Frame::request(Opcode::Get, true, 0xffff);
        frame.add_name("pb");
        let packet = frame.finish_request();
        // id, length (3 + 6), 'p', 'b', NUL in UTF-16BE
        assert_eq!(
            &packet[3..],
            &[0x01, 0x00, 0x09, 0x00, b'p', 0x00, b'b', 0x00, 0x00]
        );
    }

    #[test]
    fn empty_name_has_no_payload() {
        let mut frame = Frame::request(Opcode::Get, true, 0xffff);
        frame.add_name("");
        let packet = frame.finish_request();
        assert_eq!(&packet[3..], &[0x01, 0x00, 0x03]);
    }

    #[test]
    fn max_body_size_accounts_for_prefix() {
        let frame = Frame::response(100);
        assert_eq!(frame.max_body_size(), 100 - 3 - 3);
        let frame = Frame::response(3);
        assert_eq!(frame.max_body_size(), 0);
    }

    /// Encoder output must parse back to the same headers (round-trip law).
    #[test]
    fn encoded_request_parses_back() {
        let mut frame = Frame::request(Opcode::Get, true, 0xffff);
        frame.add_connection_id(0x1234);
        frame.add_name("telecom/pb.vcf");
        frame.add_type("x-bt/phonebook");
        frame.add_length(62);
        frame.add_target(&[0xaa; 16]);
        frame.add_srm_enable();
        frame.add_srmp_wait();
        frame.add_application_parameters(&[0x04, 0x02, 0x00, 0x00]);
        frame.add_body(b"BEGIN:");
        frame.add_end_of_body(b"VCARD");
        let packet = frame.finish_request();

        let mut parser = ObexParser::for_request();
        let mut headers = Vec::new();
        let state = parser.process_data(&packet, &mut |chunk| {
            if chunk.offset == 0 {
                headers.push((chunk.id, chunk.data.to_vec()));
            }
        });
        assert_eq!(state, ObjectState::Complete);
        let ids: Vec<HeaderId> = headers.iter().map(|(id, _)| *id).collect();
        assert_eq!(
            ids,
            [
                HeaderId::ConnectionId,
                HeaderId::Name,
                HeaderId::Type,
                HeaderId::Length,
                HeaderId::Target,
                HeaderId::SingleResponseMode,
                HeaderId::SingleResponseModeParameter,
                HeaderId::ApplicationParameters,
                HeaderId::Body,
                HeaderId::EndOfBody,
            ]
        );
        assert_eq!(headers[0].1, 0x1234u32.to_be_bytes());
        assert_eq!(headers[3].1, 62u32.to_be_bytes());
        assert_eq!(headers[5].1, [0x01]);
        assert_eq!(headers[6].1, [0x01]);
        assert_eq!(headers[8].1, b"BEGIN:");
        assert_eq!(headers[9].1, b"VCARD");
        let info = parser.operation_info();
        assert_eq!(info.opcode, Opcode::Get);
        assert!(info.final_bit);
    }

    #[test]
    fn encoded_response_parses_back() {
        let mut frame = Frame::connect_response(0x14, 0x00, 0xffff, 0xffff);
        frame.add_who(&[0xbb; 16]);
        frame.add_connection_id(7);
        let packet = frame.finish_response(ResponseCode::Success);

        let mut parser = ObexParser::for_response(Opcode::Connect);
        let mut ids = Vec::new();
        let state = parser.process_data(&packet, &mut |chunk| ids.push(chunk.id));
        assert_eq!(state, ObjectState::Complete);
        assert_eq!(ids, [HeaderId::Who, HeaderId::ConnectionId]);
        let info = parser.operation_info();
        assert_eq!(info.response_code, ResponseCode::Success);
        assert_eq!(info.max_packet_length, 0xffff);
    }
}
