//! Tokio codec for framed protocol messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, MAX_PAYLOAD_SIZE};
use crate::message::Message;
use crate::request::RequestId;

/// A complete frame with header and payload
#[derive(Debug, Clone)]
pub struct Frame {
    /// Request this frame belongs to
    pub request_id: RequestId,
    /// The message payload
    pub message: Message,
}

impl Frame {
    /// Create a new frame
    pub fn new(request_id: RequestId, message: Message) -> Self {
        Self {
            request_id,
            message,
        }
    }
}

/// Codec for encoding/decoding protocol frames
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Try to decode header if we don't have one
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None), // Need more data
            },
        };

        // Check payload length
        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Check if we have enough data for the payload
        if src.len() < payload_len {
            // Save header and wait for more data
            self.pending_header = Some(header);
            return Ok(None);
        }

        // Extract payload
        let payload_bytes = src.split_to(payload_len).freeze();

        // Deserialize message
        let message: Message = bincode::deserialize(&payload_bytes)?;

        Ok(Some(Frame {
            request_id: header.request_id,
            message,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Serialize the message
        let payload = bincode::serialize(&frame.message)?;
        let payload_len = payload.len();

        // Check payload size
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // Encode header
        let header = FrameHeader::new(
            frame.request_id,
            frame.message.message_type(),
            payload_len as u32,
        );
        header.encode(dst);

        // Append payload
        dst.extend_from_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HEADER_SIZE;
    use crate::message::{ObjectOp, Reply, Value};

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = FrameCodec::new();

        let frame = Frame::new(
            RequestId::new(1),
            Message::Invoke {
                accessor: "get_ports".to_string(),
                op: ObjectOp::Put {
                    value: Value::Int(3001),
                    times: 1,
                },
            },
        );

        // Encode
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();

        // Decode
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.request_id, frame.request_id);
        assert_eq!(decoded.message, frame.message);
    }

    #[test]
    fn test_codec_reply_message() {
        let mut codec = FrameCodec::new();

        let frame = Frame::new(
            RequestId::new(42),
            Message::Reply(Reply::Items(vec![
                Value::Int(9000),
                Value::Int(9001),
                Value::Int(9002),
            ])),
        );

        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.request_id, RequestId::new(42));

        if let Message::Reply(Reply::Items(items)) = decoded.message {
            assert_eq!(items.len(), 3);
            assert_eq!(items[0], Value::Int(9000));
        } else {
            panic!("Expected Reply::Items message");
        }
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = FrameCodec::new();

        let frame = Frame::new(
            RequestId::HANDSHAKE,
            Message::Hello {
                token: "deadbeef".to_string(),
            },
        );

        let mut full_buf = BytesMut::new();
        codec.encode(frame, &mut full_buf).unwrap();

        // Split the buffer to simulate partial read
        let mut partial = full_buf.split_to(HEADER_SIZE - 1);

        // Should return None (need more data)
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Add the rest
        partial.extend_from_slice(&full_buf);

        // Now it should decode
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        if let Message::Hello { token } = decoded.message {
            assert_eq!(token, "deadbeef");
        } else {
            panic!("Expected Hello message");
        }
    }

    #[test]
    fn test_codec_two_frames_in_one_buffer() {
        let mut codec = FrameCodec::new();

        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(RequestId::new(1), Message::ListAccessors), &mut buf)
            .unwrap();
        codec
            .encode(
                Frame::new(RequestId::new(2), Message::Reply(Reply::Unit)),
                &mut buf,
            )
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.request_id, RequestId::new(1));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.request_id, RequestId::new(2));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
