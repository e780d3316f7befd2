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

use bytes::{Buf, BufMut, BytesMut};

use crate::AppError::Incomplete;
use crate::{AppError, AppResult};

pub const MESSAGE_DELIMITER: u8 = b'\0';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub message: String,
}

impl RequestFrame {
    /// Returns the position of the first delimiter in `buffer`.
    pub fn check(buffer: &BytesMut, max_message_size: usize) -> AppResult<usize> {
        match buffer.iter().position(|b| *b == MESSAGE_DELIMITER) {
            Some(pos) if pos > max_message_size => Err(AppError::MalformedProtocol(format!(
                "message of length {} is too large.",
                pos
            ))),
            Some(pos) => Ok(pos),
            None if buffer.len() > max_message_size => Err(AppError::MalformedProtocol(format!(
                "no delimiter within {} bytes",
                buffer.len()
            ))),
            None => Err(Incomplete),
        }
    }

    /// Cuts one message off the front of `buffer`.
    ///
    /// The delimiter is consumed, everything after it stays in `buffer`. Invalid UTF-8
    /// is replaced with U+FFFD rather than rejected.
    pub(crate) fn parse(
        buffer: &mut BytesMut,
        max_message_size: usize,
    ) -> AppResult<Option<RequestFrame>> {
        match RequestFrame::check(buffer, max_message_size) {
            Ok(pos) => {
                let body = buffer.split_to(pos);
                buffer.advance(1);
                let frame = RequestFrame {
                    message: String::from_utf8_lossy(&body).into_owned(),
                };
                Ok(Some(frame))
            }
            Err(AppError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug)]
pub struct ResponseFrame;

impl ResponseFrame {
    /// The response body followed by exactly one delimiter.
    pub fn encode(response: &str) -> BytesMut {
        let mut buf = BytesMut::with_capacity(response.len() + 1);
        buf.put_slice(response.as_bytes());
        buf.put_u8(MESSAGE_DELIMITER);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    #[test]
    fn test_incomplete_message() {
        let mut buffer = BytesMut::from(&b"SELECT 1"[..]);
        assert_eq!(RequestFrame::parse(&mut buffer, MAX).unwrap(), None);
        assert_eq!(&buffer[..], b"SELECT 1");
    }

    #[test]
    fn test_residual_bytes_are_kept() {
        let mut buffer = BytesMut::from(&b"SELECT 1\0SELECT 2\0SELE"[..]);
        let first = RequestFrame::parse(&mut buffer, MAX).unwrap().unwrap();
        assert_eq!(first.message, "SELECT 1");
        let second = RequestFrame::parse(&mut buffer, MAX).unwrap().unwrap();
        assert_eq!(second.message, "SELECT 2");
        assert_eq!(RequestFrame::parse(&mut buffer, MAX).unwrap(), None);
        assert_eq!(&buffer[..], b"SELE");
    }

    #[test]
    fn test_empty_message() {
        let mut buffer = BytesMut::from(&b"\0"[..]);
        let frame = RequestFrame::parse(&mut buffer, MAX).unwrap().unwrap();
        assert_eq!(frame.message, "");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buffer = BytesMut::from(&b"ab\xffcd\0"[..]);
        let frame = RequestFrame::parse(&mut buffer, MAX).unwrap().unwrap();
        assert_eq!(frame.message, "ab\u{fffd}cd");
    }

    #[test]
    fn test_oversized_message() {
        let mut buffer = BytesMut::from(&[b'a'; 16][..]);
        assert!(matches!(
            RequestFrame::parse(&mut buffer, 8),
            Err(AppError::MalformedProtocol(_))
        ));

        let mut buffer = BytesMut::from(&b"0123456789\0"[..]);
        assert!(matches!(
            RequestFrame::parse(&mut buffer, 8),
            Err(AppError::MalformedProtocol(_))
        ));
    }

    #[test]
    fn test_encode_response() {
        assert_eq!(&ResponseFrame::encode("SUCCESS")[..], b"SUCCESS\0");
        assert_eq!(&ResponseFrame::encode("")[..], b"\0");
    }
}
