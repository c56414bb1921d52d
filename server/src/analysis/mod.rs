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

//! Long-running tree analyses: identical-subtree detection, shape clustering, and merging
//! two trees into one with divergence markers. Intended to run on the background analysis
//! thread, not inline with ingestion.

pub mod identical;
pub mod merge;
pub mod shapes;

pub use identical::{identical_subtrees, IdenticalClass};
pub use merge::{merge, PentagonItem};
pub use shapes::{similar_shapes, ShapeClass};
