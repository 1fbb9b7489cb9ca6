//! Fixed-size wire layout for [`Packet`].
//!
//! All integers are big-endian.
//!
//! ```text
//! +----------------+----------------+----------------+---------------------+
//! | seq_num (u32)  | ack (u32)      | checksum (u32) | payload (20 bytes)  |
//! +----------------+----------------+----------------+---------------------+
//! ```
//!
//! The acknowledgment word is written as-is, so a [`Control`](crate::Control)
//! value round-trips through its flag mapping: `Ack` is 1, `Nack` is 0.
//! Checksums are copied, not verified.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::packet::{MESSAGE_LENGTH, Packet, PacketError};

pub const HEADER_LEN: usize = 12;
pub const WIRE_LEN: usize = HEADER_LEN + MESSAGE_LENGTH;

pub fn encode(packet: &Packet) -> Bytes {
    let mut buf = BytesMut::with_capacity(WIRE_LEN);
    buf.put_u32(packet.seq_num);
    buf.put_u32(packet.ack);
    buf.put_u32(packet.checksum);
    buf.put_slice(&packet.payload);
    buf.freeze()
}

pub fn decode(mut buf: &[u8]) -> Result<Packet, PacketError> {
    if buf.len() != WIRE_LEN {
        return Err(PacketError::Length {
            expected: WIRE_LEN,
            actual: buf.len(),
        });
    }
    let seq_num = buf.get_u32();
    let ack = buf.get_u32();
    let checksum = buf.get_u32();
    let mut payload = [0u8; MESSAGE_LENGTH];
    buf.copy_to_slice(&mut payload);
    Ok(Packet {
        seq_num,
        ack,
        checksum,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Control, Message};

    #[test]
    fn layout_is_big_endian_header_then_payload() {
        let mut packet = Packet::data(0x0102_0304, &Message::new(b"xyz").unwrap());
        packet.checksum = 0xAABB_CCDD;
        let bytes = encode(&packet);

        assert_eq!(bytes.len(), WIRE_LEN);
        assert_eq!(&bytes[0..4], &[1, 2, 3, 4]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&bytes[12..15], b"xyz");
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn control_packets_keep_their_variant() {
        let bytes = encode(&Control::Ack(5).to_packet());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(Control::from(&decoded), Control::Ack(5));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = decode(&[0u8; WIRE_LEN - 1]).unwrap_err();
        assert_eq!(
            err,
            PacketError::Length {
                expected: WIRE_LEN,
                actual: WIRE_LEN - 1
            }
        );
    }
}
