//! Resumable parser for application-parameter TLVs.
//!
//! Application parameters are nested inside the `ApplicationParameters`
//! OBEX header: 1-byte tag, 1-byte length, value. Because the enclosing
//! header is itself delivered in chunks, a TLV may be cut anywhere,
//! including inside its tag/length prefix; this parser carries the same
//! chunk-callback contract as [`crate::parser::ObexParser`], one level down.
//!
//! The parser is created per `ApplicationParameters` header (on the chunk
//! with offset 0) with the header's total payload length, and fed every
//! chunk of that header.

use obex_types::app_params::AppParamTag;

use crate::parser::{store_chunk, StoreState};

/// A piece of one parameter's value.
#[derive(Clone, Copy, Debug)]
pub struct TagChunk<'a> {
    pub tag: AppParamTag,
    /// Total value length of this parameter.
    pub total_len: u8,
    /// Offset of `data` within the value.
    pub offset: u8,
    pub data: &'a [u8],
}

/// Progress of the parameter list being parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamState {
    InProgress,
    Complete,
    /// A TLV extends past the enclosing header payload.
    Error,
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Tag,
    Length,
    Value,
    Complete,
    Error,
}

/// Resumable parser for the TLV list of one `ApplicationParameters` header.
#[derive(Debug)]
pub struct AppParamParser {
    total_len: usize,
    consumed: usize,
    phase: Phase,
    tag: AppParamTag,
    value_total: usize,
    value_offset: usize,
}

impl AppParamParser {
    /// `total_len` is the payload length of the enclosing OBEX header.
    pub fn new(total_len: u16) -> Self {
        Self {
            total_len: usize::from(total_len),
            consumed: 0,
            phase: if total_len == 0 { Phase::Complete } else { Phase::Tag },
            tag: AppParamTag::Other(0),
            value_total: 0,
            value_offset: 0,
        }
    }

    /// Feeds the next chunk of the enclosing header's payload.
    pub fn process_data(
        &mut self,
        data: &[u8],
        callback: &mut dyn FnMut(TagChunk<'_>),
    ) -> ParamState {
        let mut pos = 0;
        while pos < data.len() {
            match self.phase {
                Phase::Tag => {
                    self.tag = AppParamTag::parse(data[pos]);
                    pos += 1;
                    self.consumed += 1;
                    self.phase = Phase::Length;
                }
                Phase::Length => {
                    self.value_total = usize::from(data[pos]);
                    self.value_offset = 0;
                    pos += 1;
                    self.consumed += 1;
                    if self.consumed + self.value_total > self.total_len {
                        self.phase = Phase::Error;
                        continue;
                    }
                    if self.value_total == 0 {
                        callback(TagChunk {
                            tag: self.tag,
                            total_len: 0,
                            offset: 0,
                            data: &[],
                        });
                        self.advance_tag();
                    } else {
                        self.phase = Phase::Value;
                    }
                }
                Phase::Value => {
                    let remaining = self.value_total - self.value_offset;
                    let take = remaining.min(data.len() - pos);
                    callback(TagChunk {
                        tag: self.tag,
                        total_len: self.value_total as u8,
                        offset: self.value_offset as u8,
                        data: &data[pos..pos + take],
                    });
                    self.value_offset += take;
                    pos += take;
                    self.consumed += take;
                    if self.value_offset == self.value_total {
                        self.advance_tag();
                    }
                }
                Phase::Complete | Phase::Error => {
                    self.phase = Phase::Error;
                    return ParamState::Error;
                }
            }
            // A tag/length prefix may not start past the declared end.
            if self.consumed > self.total_len {
                self.phase = Phase::Error;
            }
        }
        self.state()
    }

    fn advance_tag(&mut self) {
        self.phase = if self.consumed == self.total_len {
            Phase::Complete
        } else {
            Phase::Tag
        };
    }

    fn state(&self) -> ParamState {
        match self.phase {
            Phase::Complete => ParamState::Complete,
            Phase::Error => ParamState::Error,
            _ => ParamState::InProgress,
        }
    }
}

/// Reassembles chunked tag values that must be read as one integer.
pub fn store_tag_chunk(buffer: &mut [u8], chunk: &TagChunk<'_>) -> StoreState {
    store_chunk(
        buffer,
        usize::from(chunk.total_len),
        usize::from(chunk.offset),
        chunk.data,
    )
}

/// Serializes one parameter into `out`, returning the encoded length.
pub fn encode_param(out: &mut Vec<u8>, tag: AppParamTag, value: &[u8]) -> usize {
    debug_assert!(value.len() <= usize::from(u8::MAX));
    out.push(tag.value());
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    2 + value.len()
}

#[cfg(test)]
mod tests {
    use obex_types::app_params::AppParamTag;
    use proptest::prelude::*;

    use super::*;

    fn sample_params() -> Vec<u8> {
        let mut buf = Vec::new();
        encode_param(&mut buf, AppParamTag::MaxListCount, &0x1234u16.to_be_bytes());
        encode_param(&mut buf, AppParamTag::SearchValue, b"alice");
        encode_param(
            &mut buf,
            AppParamTag::PropertySelector,
            &0x0000_0000_0000_0085u64.to_be_bytes(),
        );
        buf
    }

    #[test]
    fn parses_parameter_list() {
        let buf = sample_params();
        let mut parser = AppParamParser::new(buf.len() as u16);
        let mut seen = Vec::new();
        let state = parser.process_data(&buf, &mut |chunk| {
            seen.push((chunk.tag, chunk.total_len, chunk.data.to_vec()));
        });
        assert_eq!(state, ParamState::Complete);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0, AppParamTag::MaxListCount);
        assert_eq!(seen[0].2, [0x12, 0x34]);
        assert_eq!(seen[1].0, AppParamTag::SearchValue);
        assert_eq!(seen[1].2, b"alice");
        assert_eq!(seen[2].0, AppParamTag::PropertySelector);
        assert_eq!(seen[2].1, 8);
    }

    #[test]
    fn empty_value_reports_one_chunk() {
        let buf = [AppParamTag::SearchValue.value(), 0x00];
        let mut parser = AppParamParser::new(2);
        let mut calls = 0;
        let state = parser.process_data(&buf, &mut |chunk| {
            calls += 1;
            assert_eq!(chunk.total_len, 0);
            assert!(chunk.data.is_empty());
        });
        assert_eq!(state, ParamState::Complete);
        assert_eq!(calls, 1);
    }

    #[test]
    fn value_past_declared_end_is_an_error() {
        // Header claims 4 bytes of parameters, the TLV wants 2+5.
        let buf = [AppParamTag::SearchValue.value(), 0x05, b'a', b'b'];
        let mut parser = AppParamParser::new(4);
        let state = parser.process_data(&buf, &mut |_| {});
        assert_eq!(state, ParamState::Error);
    }

    proptest! {
        /// Round-trip with a split at every offset: encoder output parses
        /// back to the same values, regardless of chunk boundaries.
        #[test]
        fn round_trip_any_split(
            count in proptest::collection::vec((0x01u8..0x11, proptest::collection::vec(any::<u8>(), 0..16)), 0..5),
            split in 0usize..128,
        ) {
            let mut buf = Vec::new();
            for (tag, value) in &count {
                encode_param(&mut buf, AppParamTag::parse(*tag), value);
            }
            let split = split.min(buf.len());

            let mut parser = AppParamParser::new(buf.len() as u16);
            let mut values: Vec<(u8, Vec<u8>)> = Vec::new();
            let mut cb = |chunk: TagChunk<'_>| {
                if chunk.offset == 0 {
                    values.push((chunk.tag.value(), chunk.data.to_vec()));
                } else {
                    values.last_mut().unwrap().1.extend_from_slice(chunk.data);
                }
            };
            prop_assert_ne!(parser.process_data(&buf[..split], &mut cb), ParamState::Error);
            let final_state = parser.process_data(&buf[split..], &mut cb);
            prop_assert_eq!(final_state, ParamState::Complete);

            let expected: Vec<(u8, Vec<u8>)> = count
                .iter()
                .map(|(tag, value)| (*tag, value.clone()))
                .collect();
            prop_assert_eq!(values, expected);
        }
    }
}
