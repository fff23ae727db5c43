use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::Vec2;

pub const POSITION_SCALE: f32 = 10.0;
pub const VELOCITY_SCALE: f32 = 100.0;
pub const MAX_WIRE_VELOCITY: f32 = i16::MAX as f32 / VELOCITY_SCALE;

const SEQUENCE_WRAP_THRESHOLD: u16 = u16::MAX / 2;
const BODY_LEN: usize = 8;

#[inline]
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    Connect = 0x01,
    ConnectReply = 0x02,
    Ping = 0x03,
    Pong = 0x04,
    State = 0x05,
    StateWithBody = 0x06,
    Paddle = 0x07,
    Launch = 0x08,
    Bounce = 0x09,
    Collision = 0x0A,
    Miss = 0x0B,
    Lives = 0x0C,
    Restart = 0x0D,
    Disconnect = 0x0E,
}

impl MessageTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let tag = match byte {
            0x01 => Self::Connect,
            0x02 => Self::ConnectReply,
            0x03 => Self::Ping,
            0x04 => Self::Pong,
            0x05 => Self::State,
            0x06 => Self::StateWithBody,
            0x07 => Self::Paddle,
            0x08 => Self::Launch,
            0x09 => Self::Bounce,
            0x0A => Self::Collision,
            0x0B => Self::Miss,
            0x0C => Self::Lives,
            0x0D => Self::Restart,
            0x0E => Self::Disconnect,
            _ => return None,
        };
        Some(tag)
    }

    /// Full payload size including the tag byte.
    pub const fn encoded_len(self) -> usize {
        match self {
            Self::Connect | Self::ConnectReply => 9,
            Self::Ping => 5,
            Self::Pong => 9,
            Self::State => 9,
            Self::StateWithBody => 9 + BODY_LEN,
            Self::Paddle => 5,
            Self::Launch | Self::Bounce | Self::Collision => 5 + BODY_LEN,
            Self::Miss => 3,
            Self::Lives | Self::Restart | Self::Disconnect => 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    #[error("{tag:?} needs {expected} bytes, got {actual}")]
    Truncated {
        tag: MessageTag,
        expected: usize,
        actual: usize,
    },
    #[error("{tag:?} is {expected} bytes, got {actual}")]
    Trailing {
        tag: MessageTag,
        expected: usize,
        actual: usize,
    },
    #[error("{tag:?} carries invalid field value {value}")]
    InvalidValue { tag: MessageTag, value: u8 },
    #[error("text framing: {0}")]
    Text(#[from] base64::DecodeError),
}

/// Position and velocity of the shared ball as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl BodyState {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    /// The value a peer will see after the body crosses the wire.
    pub fn quantized(&self) -> Self {
        Self {
            position: Vec2::new(
                decode_position(encode_position(self.position.x)),
                decode_position(encode_position(self.position.y)),
            ),
            velocity: Vec2::new(
                decode_velocity(encode_velocity(self.velocity.x)),
                decode_velocity(encode_velocity(self.velocity.y)),
            ),
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_i16(encode_position(self.position.x));
        buf.put_i16(encode_position(self.position.y));
        buf.put_i16(encode_velocity(self.velocity.x));
        buf.put_i16(encode_velocity(self.velocity.y));
    }

    fn read(buf: &mut &[u8]) -> Self {
        let x = decode_position(buf.get_i16());
        let y = decode_position(buf.get_i16());
        let vx = decode_velocity(buf.get_i16());
        let vy = decode_velocity(buf.get_i16());
        Self::new(Vec2::new(x, y), Vec2::new(vx, vy))
    }
}

pub fn encode_position(value: f32) -> i16 {
    (value * POSITION_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn decode_position(value: i16) -> f32 {
    value as f32 / POSITION_SCALE
}

pub fn encode_velocity(value: f32) -> i16 {
    (value.clamp(-MAX_WIRE_VELOCITY, MAX_WIRE_VELOCITY) * VELOCITY_SCALE).round() as i16
}

pub fn decode_velocity(value: i16) -> f32 {
    value as f32 / VELOCITY_SCALE
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatePacket {
    pub frame: u16,
    pub paddle: f32,
    pub input_seq: u16,
    pub last_ack: u16,
    pub body: Option<BodyState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEventKind {
    Launch,
    Bounce,
    Collision,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyEvent {
    pub kind: BodyEventKind,
    /// Sender's local clock, milliseconds.
    pub timestamp_ms: u32,
    pub body: BodyState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Quit,
    Timeout,
    MatchOver,
}

impl DisconnectReason {
    fn to_byte(self) -> u8 {
        match self {
            Self::Quit => 0,
            Self::Timeout => 1,
            Self::MatchOver => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Quit),
            1 => Some(Self::Timeout),
            2 => Some(Self::MatchOver),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::Timeout => "timed out",
            Self::MatchOver => "match over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Connect { random: u32, peer_id: u32 },
    ConnectReply { random: u32, peer_id: u32 },
    Ping { origin_ms: u32 },
    Pong { origin_ms: u32, reply_ms: u32 },
    State(StatePacket),
    Paddle { position: f32, input_seq: u16 },
    BodyEvent(BodyEvent),
    Miss { frame: u16 },
    Lives { lives: u8 },
    Restart { epoch: u8 },
    Disconnect { reason: DisconnectReason },
}

impl Message {
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::Connect { .. } => MessageTag::Connect,
            Self::ConnectReply { .. } => MessageTag::ConnectReply,
            Self::Ping { .. } => MessageTag::Ping,
            Self::Pong { .. } => MessageTag::Pong,
            Self::State(state) if state.body.is_some() => MessageTag::StateWithBody,
            Self::State(_) => MessageTag::State,
            Self::Paddle { .. } => MessageTag::Paddle,
            Self::BodyEvent(event) => match event.kind {
                BodyEventKind::Launch => MessageTag::Launch,
                BodyEventKind::Bounce => MessageTag::Bounce,
                BodyEventKind::Collision => MessageTag::Collision,
            },
            Self::Miss { .. } => MessageTag::Miss,
            Self::Lives { .. } => MessageTag::Lives,
            Self::Restart { .. } => MessageTag::Restart,
            Self::Disconnect { .. } => MessageTag::Disconnect,
        }
    }

    pub fn encode(&self) -> Bytes {
        let tag = self.tag();
        let mut buf = BytesMut::with_capacity(tag.encoded_len());
        buf.put_u8(tag as u8);

        match self {
            Self::Connect { random, peer_id } | Self::ConnectReply { random, peer_id } => {
                buf.put_u32(*random);
                buf.put_u32(*peer_id);
            }
            Self::Ping { origin_ms } => buf.put_u32(*origin_ms),
            Self::Pong {
                origin_ms,
                reply_ms,
            } => {
                buf.put_u32(*origin_ms);
                buf.put_u32(*reply_ms);
            }
            Self::State(state) => {
                buf.put_u16(state.frame);
                buf.put_i16(encode_position(state.paddle));
                buf.put_u16(state.input_seq);
                buf.put_u16(state.last_ack);
                if let Some(body) = &state.body {
                    body.write(&mut buf);
                }
            }
            Self::Paddle {
                position,
                input_seq,
            } => {
                buf.put_i16(encode_position(*position));
                buf.put_u16(*input_seq);
            }
            Self::BodyEvent(event) => {
                buf.put_u32(event.timestamp_ms);
                event.body.write(&mut buf);
            }
            Self::Miss { frame } => buf.put_u16(*frame),
            Self::Lives { lives } => buf.put_u8(*lives),
            Self::Restart { epoch } => buf.put_u8(*epoch),
            Self::Disconnect { reason } => buf.put_u8(reason.to_byte()),
        }

        debug_assert_eq!(buf.len(), tag.encoded_len());
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (&first, _) = data.split_first().ok_or(DecodeError::Empty)?;
        let tag = MessageTag::from_byte(first).ok_or(DecodeError::UnknownTag(first))?;

        let expected = tag.encoded_len();
        if data.len() < expected {
            return Err(DecodeError::Truncated {
                tag,
                expected,
                actual: data.len(),
            });
        }
        if data.len() > expected {
            return Err(DecodeError::Trailing {
                tag,
                expected,
                actual: data.len(),
            });
        }

        let mut buf = &data[1..];
        let message = match tag {
            MessageTag::Connect => Self::Connect {
                random: buf.get_u32(),
                peer_id: buf.get_u32(),
            },
            MessageTag::ConnectReply => Self::ConnectReply {
                random: buf.get_u32(),
                peer_id: buf.get_u32(),
            },
            MessageTag::Ping => Self::Ping {
                origin_ms: buf.get_u32(),
            },
            MessageTag::Pong => Self::Pong {
                origin_ms: buf.get_u32(),
                reply_ms: buf.get_u32(),
            },
            MessageTag::State | MessageTag::StateWithBody => {
                let frame = buf.get_u16();
                let paddle = decode_position(buf.get_i16());
                let input_seq = buf.get_u16();
                let last_ack = buf.get_u16();
                let body = (tag == MessageTag::StateWithBody).then(|| BodyState::read(&mut buf));
                Self::State(StatePacket {
                    frame,
                    paddle,
                    input_seq,
                    last_ack,
                    body,
                })
            }
            MessageTag::Paddle => Self::Paddle {
                position: decode_position(buf.get_i16()),
                input_seq: buf.get_u16(),
            },
            MessageTag::Launch | MessageTag::Bounce | MessageTag::Collision => {
                let kind = match tag {
                    MessageTag::Launch => BodyEventKind::Launch,
                    MessageTag::Bounce => BodyEventKind::Bounce,
                    _ => BodyEventKind::Collision,
                };
                let timestamp_ms = buf.get_u32();
                Self::BodyEvent(BodyEvent {
                    kind,
                    timestamp_ms,
                    body: BodyState::read(&mut buf),
                })
            }
            MessageTag::Miss => Self::Miss {
                frame: buf.get_u16(),
            },
            MessageTag::Lives => Self::Lives { lives: buf.get_u8() },
            MessageTag::Restart => Self::Restart { epoch: buf.get_u8() },
            MessageTag::Disconnect => {
                let value = buf.get_u8();
                let reason = DisconnectReason::from_byte(value)
                    .ok_or(DecodeError::InvalidValue { tag, value })?;
                Self::Disconnect { reason }
            }
        };

        Ok(message)
    }
}

/// Wraps a binary payload for transports that only carry text.
pub fn encode_text(payload: &[u8]) -> String {
    STANDARD.encode(payload)
}

pub fn decode_text(text: &[u8]) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> BodyState {
        BodyState::new(Vec2::new(412.3, 87.6), Vec2::new(-7.0, 1.4))
    }

    #[test]
    fn test_sequence_comparison() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(1, 1));
        assert!(sequence_greater_than(0, u16::MAX));
        assert!(!sequence_greater_than(u16::MAX, 0));
    }

    #[test]
    fn test_every_message_round_trips() {
        let messages = [
            Message::Connect {
                random: 42,
                peer_id: 7,
            },
            Message::ConnectReply {
                random: u32::MAX,
                peer_id: 1,
            },
            Message::Ping { origin_ms: 123_456 },
            Message::Pong {
                origin_ms: 1,
                reply_ms: 2_000_000,
            },
            Message::State(StatePacket {
                frame: 900,
                paddle: 250.5,
                input_seq: 31,
                last_ack: 12,
                body: None,
            }),
            Message::State(StatePacket {
                frame: u16::MAX,
                paddle: 0.0,
                input_seq: 0,
                last_ack: 65_000,
                body: Some(body()),
            }),
            Message::Paddle {
                position: 300.0,
                input_seq: 4,
            },
            Message::BodyEvent(BodyEvent {
                kind: BodyEventKind::Launch,
                timestamp_ms: 1000,
                body: body(),
            }),
            Message::BodyEvent(BodyEvent {
                kind: BodyEventKind::Bounce,
                timestamp_ms: 1016,
                body: body(),
            }),
            Message::BodyEvent(BodyEvent {
                kind: BodyEventKind::Collision,
                timestamp_ms: 1033,
                body: body(),
            }),
            Message::Miss { frame: 77 },
            Message::Lives { lives: 3 },
            Message::Restart { epoch: 2 },
            Message::Disconnect {
                reason: DisconnectReason::Timeout,
            },
        ];

        for message in messages {
            let bytes = message.encode();
            assert_eq!(bytes.len(), message.tag().encoded_len(), "{message:?}");
            let decoded = Message::decode(&bytes).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_velocity_fixed_point_rounding() {
        let state = BodyState::new(Vec2::new(10.04, 20.0), Vec2::new(3.14159, -2.71828));
        let quantized = state.quantized();
        assert!((quantized.velocity.x - 3.14).abs() < 0.005);
        assert!((quantized.velocity.y - -2.72).abs() < 0.005);
        assert!((quantized.position.x - 10.0).abs() < 0.05);
    }

    #[test]
    fn test_velocity_saturates() {
        assert_eq!(encode_velocity(10_000.0), i16::MAX);
        assert_eq!(encode_velocity(-10_000.0), -i16::MAX);
    }

    #[test]
    fn test_truncated_payloads_fail() {
        let full = Message::State(StatePacket {
            frame: 1,
            paddle: 1.0,
            input_seq: 1,
            last_ack: 1,
            body: Some(body()),
        })
        .encode();

        for len in 1..full.len() {
            match Message::decode(&full[..len]) {
                Err(DecodeError::Truncated { expected, .. }) => assert_eq!(expected, 17),
                other => panic!("expected truncation at {len}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_payloads_fail() {
        assert!(matches!(Message::decode(&[]), Err(DecodeError::Empty)));
        assert!(matches!(
            Message::decode(&[0xFF, 0, 0]),
            Err(DecodeError::UnknownTag(0xFF))
        ));
        assert!(matches!(
            Message::decode(&[MessageTag::Lives as u8, 1, 2]),
            Err(DecodeError::Trailing { .. })
        ));
        assert!(matches!(
            Message::decode(&[MessageTag::Disconnect as u8, 9]),
            Err(DecodeError::InvalidValue { value: 9, .. })
        ));
    }

    #[test]
    fn test_text_framing() {
        let payload = Message::Ping { origin_ms: 99 }.encode();
        let text = encode_text(&payload);
        assert!(text.is_ascii());
        let raw = decode_text(text.as_bytes()).unwrap();
        assert_eq!(Message::decode(&raw).unwrap(), Message::Ping { origin_ms: 99 });
        assert!(decode_text(b"not base64!").is_err());
    }
}
