use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of payload bytes carried by every packet and message.
pub const MESSAGE_LENGTH: usize = 20;

/// Acknowledgment flag values carried in [`Packet::ack`].
pub mod ack_flag {
    pub const NEGATIVE: u32 = 0;
    pub const POSITIVE: u32 = 1;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("message of {0} bytes does not fit in a packet payload")]
    MessageTooLong(usize),
    #[error("wire buffer is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
}

/// A unit of upper-layer data. Always exactly [`MESSAGE_LENGTH`] bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub data: [u8; MESSAGE_LENGTH],
}

impl Message {
    /// Copy `data` into a message, zero-padding the tail.
    pub fn new(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() > MESSAGE_LENGTH {
            return Err(PacketError::MessageTooLong(data.len()));
        }
        let mut buf = [0u8; MESSAGE_LENGTH];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self { data: buf })
    }

    /// A message made of `MESSAGE_LENGTH` copies of `byte`.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; MESSAGE_LENGTH],
        }
    }

    /// Payload rendered as text with the zero padding trimmed.
    pub fn text(&self) -> String {
        let end = self
            .data
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |pos| pos + 1);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message").field(&self.text()).finish()
    }
}

impl From<[u8; MESSAGE_LENGTH]> for Message {
    fn from(data: [u8; MESSAGE_LENGTH]) -> Self {
        Self { data }
    }
}

/// The value passed over the channel.
///
/// Data packets and control packets share this shape. On data packets `ack`
/// carries no meaning and is always sent as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub seq_num: u32,
    /// Raw acknowledgment flag. 1 is positive, 0 is negative; a corrupted
    /// packet may carry anything.
    pub ack: u32,
    pub checksum: u32,
    pub payload: [u8; MESSAGE_LENGTH],
}

impl Packet {
    /// Data packet carrying `message`. The checksum is left at zero for the
    /// protocol to stamp.
    pub fn data(seq_num: u32, message: &Message) -> Self {
        Self {
            seq_num,
            ack: ack_flag::NEGATIVE,
            checksum: 0,
            payload: message.data,
        }
    }

    pub fn is_positive_ack(&self) -> bool {
        self.ack == ack_flag::POSITIVE
    }

    pub fn message(&self) -> Message {
        Message::from(self.payload)
    }
}

/// Tagged view of a control packet.
///
/// On the wire `Ack(s)` is `seq_num = s, ack = 1` and `Nack(s)` is
/// `seq_num = s, ack = 0`. Any other flag value reads back as `Nack`, since
/// only an exact positive flag may advance a sender. Control packets carry
/// an all-zero payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Ack(u32),
    Nack(u32),
}

impl Control {
    pub fn seq_num(&self) -> u32 {
        match self {
            Control::Ack(seq) | Control::Nack(seq) => *seq,
        }
    }

    /// Unstamped packet for this control value.
    pub fn to_packet(&self) -> Packet {
        let ack = match self {
            Control::Ack(_) => ack_flag::POSITIVE,
            Control::Nack(_) => ack_flag::NEGATIVE,
        };
        Packet {
            seq_num: self.seq_num(),
            ack,
            checksum: 0,
            payload: [0; MESSAGE_LENGTH],
        }
    }
}

impl From<&Packet> for Control {
    fn from(packet: &Packet) -> Self {
        if packet.is_positive_ack() {
            Control::Ack(packet.seq_num)
        } else {
            Control::Nack(packet.seq_num)
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Ack(seq) => write!(f, "ACK{seq}"),
            Control::Nack(seq) => write!(f, "NACK{seq}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_zero_padded() {
        let msg = Message::new(b"hello").unwrap();
        assert_eq!(&msg.data[..5], b"hello");
        assert!(msg.data[5..].iter().all(|b| *b == 0));
        assert_eq!(msg.text(), "hello");
    }

    #[test]
    fn oversized_message_is_rejected() {
        let err = Message::new(&[b'x'; MESSAGE_LENGTH + 1]).unwrap_err();
        assert_eq!(err, PacketError::MessageTooLong(MESSAGE_LENGTH + 1));
    }

    #[test]
    fn control_mapping_matches_flag_values() {
        let ack = Control::Ack(7).to_packet();
        assert_eq!((ack.seq_num, ack.ack), (7, 1));
        let nack = Control::Nack(7).to_packet();
        assert_eq!((nack.seq_num, nack.ack), (7, 0));

        assert_eq!(Control::from(&ack), Control::Ack(7));
        assert_eq!(Control::from(&nack), Control::Nack(7));
    }

    #[test]
    fn unknown_flag_reads_as_nack() {
        let mut packet = Control::Ack(3).to_packet();
        packet.ack = 999_999;
        assert_eq!(Control::from(&packet), Control::Nack(3));
    }
}
