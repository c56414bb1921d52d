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

//! The framed binary wire protocol spoken between a CP solver and the profiler.

pub mod error;
pub mod message;

pub use error::{WireError, WireResult};
pub use message::{encode, frame, parse, Message, MsgKind, NodeHeader, OptionalFields, PROTOCOL_VERSION};
