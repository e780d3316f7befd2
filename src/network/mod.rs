// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Network Module Implementation
//!
//! Message framing for the relay's wire protocol. A message is UTF-8 text terminated by
//! a single NUL byte, in both directions. There is no length prefix.
//!
//! # Components
//!
//! - `Connection`: owns one TCP stream and its read buffer. Bytes that arrive after
//!   a delimiter stay in the buffer for the next read.
//! - `RequestFrame`: locates the delimiter and decodes one message
//! - `ResponseFrame`: appends the delimiter to an outgoing response

pub use connection::Connection;
pub use frame::{RequestFrame, ResponseFrame, MESSAGE_DELIMITER};
mod connection;
mod frame;
