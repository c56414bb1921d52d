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

//! A push-based framing state machine: feed it arbitrary-sized byte chunks as they arrive
//! off a socket, and it yields one complete frame payload at a time.
//!
//! Two states: *awaiting length* (needs 4 bytes) and *awaiting body* (needs the declared N
//! bytes). A frame whose declared size exceeds what's buffered so far just waits for more
//! bytes rather than failing -- the boundary case called out in the testable properties.

const COMPACT_EVERY: usize = 10_000;

#[derive(Debug)]
enum State {
    AwaitingLength,
    AwaitingBody { len: usize },
}

/// Owns an accumulating byte buffer and hands back complete frame payloads as they become
/// available. Frame-length prefixes are consumed here and never handed to the caller.
pub struct FrameDecoder {
    buf: Vec<u8>,
    pos: usize,
    state: State,
    messages_since_compact: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: State::AwaitingLength,
            messages_since_compact: 0,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn compact_if_due(&mut self) {
        self.messages_since_compact += 1;
        if self.messages_since_compact >= COMPACT_EVERY {
            self.buf.drain(0..self.pos);
            self.pos = 0;
            self.messages_since_compact = 0;
        }
    }

    /// Pull out the next complete frame payload, if one has fully arrived. Returns `None`
    /// (without consuming anything) when more bytes are needed; call again after the next
    /// `feed`.
    pub fn try_next(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.state {
                State::AwaitingLength => {
                    if self.available() < 4 {
                        return None;
                    }
                    let len_bytes = &self.buf[self.pos..self.pos + 4];
                    let len = i32::from_be_bytes(len_bytes.try_into().unwrap()).max(0) as usize;
                    self.pos += 4;
                    self.state = State::AwaitingBody { len };
                }
                State::AwaitingBody { len } => {
                    if self.available() < len {
                        return None;
                    }
                    let payload = self.buf[self.pos..self.pos + len].to_vec();
                    self.pos += len;
                    self.state = State::AwaitingLength;
                    self.compact_if_due();
                    return Some(payload);
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::{frame, Message, OptionalFields};

    #[test]
    fn yields_nothing_until_length_prefix_complete() {
        let mut d = FrameDecoder::new();
        d.feed(&[0, 0]);
        assert!(d.try_next().is_none());
    }

    #[test]
    fn oversized_declared_length_waits_instead_of_erroring() {
        let payload = crate::wire::message::encode(&Message::Done(OptionalFields::default()));
        let framed = frame(&payload);
        let mut d = FrameDecoder::new();
        d.feed(&framed[..framed.len() - 1]);
        assert!(d.try_next().is_none());
        d.feed(&framed[framed.len() - 1..]);
        assert_eq!(d.try_next(), Some(payload));
    }

    #[test]
    fn handles_multiple_frames_fed_as_one_chunk() {
        let p1 = crate::wire::message::encode(&Message::Done(OptionalFields::default()));
        let p2 = crate::wire::message::encode(&Message::Start(OptionalFields::default()));
        let mut combined = frame(&p1);
        combined.extend_from_slice(&frame(&p2));
        let mut d = FrameDecoder::new();
        d.feed(&combined);
        assert_eq!(d.try_next(), Some(p1));
        assert_eq!(d.try_next(), Some(p2));
        assert_eq!(d.try_next(), None);
    }

    #[test]
    fn handles_byte_at_a_time_feeding() {
        let payload = crate::wire::message::encode(&Message::Done(OptionalFields::default()));
        let framed = frame(&payload);
        let mut d = FrameDecoder::new();
        let mut got = None;
        for b in framed {
            d.feed(&[b]);
            if let Some(p) = d.try_next() {
                got = Some(p);
            }
        }
        assert_eq!(got, Some(payload));
    }
}
