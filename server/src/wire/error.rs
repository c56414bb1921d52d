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

use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum WireError {
    /// The frame ended mid-field; the caller should wait for more bytes rather than fail,
    /// except at the top level where it means the declared frame length was a lie.
    ShortFrame,
    UnknownMsgKind(u8),
    /// An optional tag was encountered whose payload shape is not known, so the remaining
    /// frame bytes cannot be skipped safely.
    MalformedFrame,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortFrame => write!(f, "frame ended before a field could be fully read"),
            Self::UnknownMsgKind(k) => write!(f, "unknown message kind byte: {k}"),
            Self::MalformedFrame => write!(f, "frame contains an unrecognized optional tag"),
        }
    }
}

impl std::error::Error for WireError {}

pub type WireResult<T> = Result<T, WireError>;
