//! HDM wire framing
//!
//! Every request is a fixed 12-byte header followed by the encrypted JSON body.
//! Responses carry an 11-byte header with the result code and body length.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Protocol revision spoken by the terminal firmware
pub const PROTOCOL_VERSION: u8 = 0x05;

/// Magic prefix: the string "ՀԴՄ" encoded as UTF-8
pub const INDICATOR: [u8; 6] = [0xD5, 0x80, 0xD4, 0xB4, 0xD5, 0x84];

pub const REQUEST_HEADER_LEN: usize = 12;
pub const RESPONSE_HEADER_LEN: usize = 11;

/// Largest body the u16 length field can describe
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Framing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Request body of {len} bytes exceeds the {max} byte frame limit")]
    BodyTooLarge { len: usize, max: usize },
    #[error("Response header must be {expected} bytes, got {actual}")]
    ShortHeader { expected: usize, actual: usize },
}

/// Build the request header for a function code and encrypted body length
pub fn request_header(function: u8, body_len: usize) -> Result<[u8; REQUEST_HEADER_LEN], FrameError> {
    if body_len > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLarge {
            len: body_len,
            max: MAX_BODY_LEN,
        });
    }

    let mut header = [0u8; REQUEST_HEADER_LEN];
    header[..6].copy_from_slice(&INDICATOR);
    header[6] = 0;
    header[7] = PROTOCOL_VERSION;
    header[8] = function;
    header[9] = 0;
    header[10..12].copy_from_slice(&(body_len as u16).to_be_bytes());
    Ok(header)
}

/// Encode a complete request frame (header + encrypted body)
pub fn encode_request(function: u8, body: &[u8]) -> Result<Bytes, FrameError> {
    let header = request_header(function, body.len())?;
    let mut frame = BytesMut::with_capacity(REQUEST_HEADER_LEN + body.len());
    frame.put_slice(&header);
    frame.put_slice(body);
    Ok(frame.freeze())
}

/// Decoded response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub code: u8,
    pub body_len: usize,
}

impl ResponseHeader {
    /// Parse the 11-byte response header. Only the code (byte 2) and the
    /// body length (bytes 7..9, big-endian) are meaningful.
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() != RESPONSE_HEADER_LEN {
            return Err(FrameError::ShortHeader {
                expected: RESPONSE_HEADER_LEN,
                actual: raw.len(),
            });
        }

        Ok(Self {
            code: raw[2],
            body_len: u16::from_be_bytes([raw[7], raw[8]]) as usize,
        })
    }

    pub fn is_success(&self) -> bool {
        ResponseCode::is_success(self.code)
    }
}

/// Known response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    LoginAccepted,
    Ok,
    Success,
    Device(u8),
}

impl ResponseCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => ResponseCode::LoginAccepted,
            0x02 => ResponseCode::Ok,
            0x10 => ResponseCode::Success,
            other => ResponseCode::Device(other),
        }
    }

    /// Anything above 0x10 is a device-reported failure
    pub fn is_success(code: u8) -> bool {
        code <= 0x10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_is_utf8_hdm() {
        assert_eq!(&INDICATOR[..], "ՀԴՄ".as_bytes());
    }

    #[test]
    fn test_request_header_layout() {
        let header = request_header(0x04, 0x0130).unwrap();

        assert_eq!(&header[..6], &INDICATOR);
        assert_eq!(header[6], 0x00);
        assert_eq!(header[7], PROTOCOL_VERSION);
        assert_eq!(header[8], 0x04);
        assert_eq!(header[9], 0x00);
        assert_eq!(&header[10..12], &[0x01, 0x30]);
    }

    #[test]
    fn test_encode_request_appends_body() {
        let frame = encode_request(0x02, &[0xAA; 16]).unwrap();

        assert_eq!(frame.len(), REQUEST_HEADER_LEN + 16);
        assert_eq!(frame[8], 0x02);
        assert_eq!(&frame[10..12], &[0x00, 0x10]);
        assert!(frame[REQUEST_HEADER_LEN..].iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn test_oversized_body_rejected() {
        let result = request_header(0x04, MAX_BODY_LEN + 1);
        assert_eq!(
            result,
            Err(FrameError::BodyTooLarge {
                len: MAX_BODY_LEN + 1,
                max: MAX_BODY_LEN
            })
        );

        assert!(request_header(0x04, MAX_BODY_LEN).is_ok());
    }

    #[test]
    fn test_response_header_parse() {
        let raw = [0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00];
        let header = ResponseHeader::parse(&raw).unwrap();

        assert_eq!(header.code, 0x02);
        assert_eq!(header.body_len, 40);
        assert!(header.is_success());
    }

    #[test]
    fn test_response_header_wrong_length() {
        let err = ResponseHeader::parse(&[0u8; 5]).unwrap_err();
        assert_eq!(
            err,
            FrameError::ShortHeader {
                expected: RESPONSE_HEADER_LEN,
                actual: 5
            }
        );
    }

    #[test]
    fn test_response_code_classification() {
        assert!(ResponseCode::is_success(0x00));
        assert!(ResponseCode::is_success(0x01));
        assert!(ResponseCode::is_success(0x02));
        assert!(ResponseCode::is_success(0x0F));
        assert!(ResponseCode::is_success(0x10));
        assert!(!ResponseCode::is_success(0x11));
        assert!(!ResponseCode::is_success(0xC8));

        assert_eq!(ResponseCode::from_u8(0x01), ResponseCode::LoginAccepted);
        assert_eq!(ResponseCode::from_u8(0x10), ResponseCode::Success);
        assert_eq!(ResponseCode::from_u8(0xC8), ResponseCode::Device(0xC8));
    }
}
