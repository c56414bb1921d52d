/*
 * This file is a part of the cp-profiler server
 * Copyright (c) 2024, contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The framed binary wire protocol: message kinds, a cursor-based parser and an encoder.
//!
//! Frame length prefixes are handled one layer up, by [`crate::net::receiver`]; this module
//! only deals with one already-delimited payload at a time.

use super::error::{WireError, WireResult};
use crate::tree::node_id::SolverUID;
use crate::tree::status::NodeStatus;

/// The current wire protocol version, sent inside every START message's VERSION tag.
pub const PROTOCOL_VERSION: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgKind {
    Node = 0,
    Done = 1,
    Start = 2,
    Restart = 3,
}

impl MsgKind {
    fn from_byte(b: u8) -> WireResult<Self> {
        match b {
            0 => Ok(Self::Node),
            1 => Ok(Self::Done),
            2 => Ok(Self::Start),
            3 => Ok(Self::Restart),
            other => Err(WireError::UnknownMsgKind(other)),
        }
    }
}

const TAG_LABEL: u8 = 0;
const TAG_NOGOOD: u8 = 1;
const TAG_INFO: u8 = 2;
const TAG_VERSION: u8 = 3;

/// The nine-integer header carried by every NODE message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub uid: SolverUID,
    pub parent_uid: SolverUID,
    pub alt: i32,
    pub kids: i32,
    pub status: NodeStatus,
}

/// The optional fields that may trail any message kind. Fields are populated only from
/// tags actually observed in the current frame -- there is no carry-over between frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalFields {
    pub version: Option<i32>,
    pub label: Option<String>,
    pub nogood: Option<String>,
    pub info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Node(NodeHeader, OptionalFields),
    Done(OptionalFields),
    Start(OptionalFields),
    Restart(OptionalFields),
}

impl Message {
    pub fn optional(&self) -> &OptionalFields {
        match self {
            Message::Node(_, o) | Message::Done(o) | Message::Start(o) | Message::Restart(o) => o,
        }
    }
}

/// A cursor over one message payload, reading big-endian fixed-width fields.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self) -> WireResult<u8> {
        let b = *self.buf.get(self.pos).ok_or(WireError::ShortFrame)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_i32(&mut self) -> WireResult<i32> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or(WireError::ShortFrame)?;
        self.pos += 4;
        Ok(i32::from_be_bytes(bytes.try_into().unwrap()))
    }

    fn read_string(&mut self) -> WireResult<String> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(WireError::MalformedFrame);
        }
        let len = len as usize;
        let bytes = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or(WireError::ShortFrame)?;
        self.pos += len;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::MalformedFrame)
    }

    fn read_uid(&mut self) -> WireResult<SolverUID> {
        let nid = self.read_i32()?;
        let rid = self.read_i32()?;
        let tid = self.read_i32()?;
        Ok(SolverUID::new(nid, rid, tid))
    }

    fn at_end(&self) -> bool {
        self.pos == self.buf.len()
    }
}

/// Parse one already-delimited payload (the frame length prefix must already be stripped).
/// Consumes the whole payload; trailing or missing bytes are an error.
pub fn parse(payload: &[u8]) -> WireResult<Message> {
    let mut c = Cursor::new(payload);
    let kind = MsgKind::from_byte(c.read_u8()?)?;

    let header = if kind == MsgKind::Node {
        let uid = c.read_uid()?;
        let parent_uid = c.read_uid()?;
        let alt = c.read_i32()?;
        let kids = c.read_i32()?;
        let status =
            NodeStatus::from_wire(c.read_u8()?).ok_or(WireError::MalformedFrame)?;
        Some(NodeHeader {
            uid,
            parent_uid,
            alt,
            kids,
            status,
        })
    } else {
        None
    };

    // The original marshaller resets the message's optional fields right here, before
    // scanning tags: only tags observed in *this* frame populate the output below.
    let mut opt = OptionalFields::default();
    while c.remaining() > 0 {
        let tag = c.read_u8()?;
        match tag {
            TAG_LABEL => opt.label = Some(c.read_string()?),
            TAG_NOGOOD => opt.nogood = Some(c.read_string()?),
            TAG_INFO => opt.info = Some(c.read_string()?),
            TAG_VERSION => opt.version = Some(c.read_i32()?),
            _ => return Err(WireError::MalformedFrame),
        }
    }
    debug_assert!(c.at_end());

    Ok(match kind {
        MsgKind::Node => Message::Node(header.unwrap(), opt),
        MsgKind::Done => Message::Done(opt),
        MsgKind::Start => Message::Start(opt),
        MsgKind::Restart => Message::Restart(opt),
    })
}

fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn write_uid(out: &mut Vec<u8>, uid: SolverUID) {
    write_i32(out, uid.nid);
    write_i32(out, uid.rid);
    write_i32(out, uid.tid);
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_i32(out, s.len() as i32);
    out.extend_from_slice(s.as_bytes());
}

fn write_optional(out: &mut Vec<u8>, opt: &OptionalFields) {
    // VERSION, LABEL, NOGOOD, INFO -- fixed emission order per the wire contract.
    if let Some(v) = opt.version {
        out.push(TAG_VERSION);
        write_i32(out, v);
    }
    if let Some(l) = &opt.label {
        out.push(TAG_LABEL);
        write_string(out, l);
    }
    if let Some(n) = &opt.nogood {
        out.push(TAG_NOGOOD);
        write_string(out, n);
    }
    if let Some(i) = &opt.info {
        out.push(TAG_INFO);
        write_string(out, i);
    }
}

/// Encode one message's payload (without the outer 4-byte frame-length prefix).
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    match msg {
        Message::Node(h, opt) => {
            out.push(MsgKind::Node as u8);
            write_uid(&mut out, h.uid);
            write_uid(&mut out, h.parent_uid);
            write_i32(&mut out, h.alt);
            write_i32(&mut out, h.kids);
            out.push(h.status.to_wire());
            write_optional(&mut out, opt);
        }
        Message::Done(opt) => {
            out.push(MsgKind::Done as u8);
            write_optional(&mut out, opt);
        }
        Message::Start(opt) => {
            out.push(MsgKind::Start as u8);
            write_optional(&mut out, opt);
        }
        Message::Restart(opt) => {
            out.push(MsgKind::Restart as u8);
            write_optional(&mut out, opt);
        }
    }
    out
}

/// Prefix an encoded payload with its 4-byte big-endian frame length.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    write_i32(&mut out, payload.len() as i32);
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node() -> Message {
        Message::Node(
            NodeHeader {
                uid: SolverUID::new(1, 0, 0),
                parent_uid: SolverUID::new(-1, -1, -1),
                alt: -1,
                kids: 0,
                status: NodeStatus::Failed,
            },
            OptionalFields {
                version: None,
                label: Some("x = 1".into()),
                nogood: Some("x != 1".into()),
                info: None,
            },
        )
    }

    #[test]
    fn roundtrip_node_message() {
        let msg = sample_node();
        let payload = encode(&msg);
        assert_eq!(parse(&payload).unwrap(), msg);
    }

    #[test]
    fn roundtrip_start_with_version() {
        let msg = Message::Start(OptionalFields {
            version: Some(PROTOCOL_VERSION),
            ..Default::default()
        });
        let payload = encode(&msg);
        assert_eq!(parse(&payload).unwrap(), msg);
    }

    #[test]
    fn short_frame_is_an_error_not_a_panic() {
        let payload = encode(&sample_node());
        let truncated = &payload[..payload.len() - 2];
        assert_eq!(parse(truncated), Err(WireError::ShortFrame));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let mut payload = vec![MsgKind::Done as u8];
        payload.push(0xAA); // not a defined tag
        assert_eq!(parse(&payload), Err(WireError::MalformedFrame));
    }

    #[test]
    fn unknown_kind_byte() {
        assert_eq!(parse(&[0xFF]), Err(WireError::UnknownMsgKind(0xFF)));
    }

    #[test]
    fn frame_prefixes_length() {
        let payload = encode(&Message::Done(OptionalFields::default()));
        let framed = frame(&payload);
        let len = i32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, payload.len());
        assert_eq!(&framed[4..], &payload[..]);
    }
}
