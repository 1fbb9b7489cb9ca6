//! Integrity and ordering checks. Pure functions, no state.

use arq_lab_abstract::Packet;

/// Sum of the sequence number, the acknowledgment flag and every payload
/// byte weighted by its 1-based position. Position weighting makes the sum
/// sensitive to reordered payload bytes, not just changed values.
pub fn compute_checksum(packet: &Packet) -> u32 {
    let header = packet.seq_num.wrapping_add(packet.ack);
    packet
        .payload
        .iter()
        .zip(1u32..)
        .fold(header, |sum, (byte, weight)| {
            sum.wrapping_add(u32::from(*byte) * weight)
        })
}

pub fn is_checksum_valid(packet: &Packet) -> bool {
    compute_checksum(packet) == packet.checksum
}

pub fn is_sequence_expected(given: u32, expected: u32) -> bool {
    given == expected
}

/// Return `packet` with its checksum field filled in.
pub fn stamp(mut packet: Packet) -> Packet {
    packet.checksum = compute_checksum(&packet);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_lab_abstract::{Control, MESSAGE_LENGTH, Message};

    fn sample() -> Packet {
        stamp(Packet::data(3, &Message::new(b"stop and wait").unwrap()))
    }

    #[test]
    fn weights_bytes_by_position() {
        let mut packet = Packet::data(2, &Message::new(&[1, 2]).unwrap());
        packet.ack = 1;
        // 2 + 1 + 1*1 + 2*2
        assert_eq!(compute_checksum(&packet), 8);
    }

    #[test]
    fn stamped_packets_validate() {
        assert!(is_checksum_valid(&sample()));
        assert!(is_checksum_valid(&stamp(Control::Ack(0).to_packet())));
    }

    #[test]
    fn any_single_payload_byte_change_is_detected() {
        let packet = sample();
        for idx in 0..MESSAGE_LENGTH {
            for delta in [1u8, 0x80, 0xFF] {
                let mut corrupted = packet;
                corrupted.payload[idx] = corrupted.payload[idx].wrapping_add(delta);
                assert!(
                    !is_checksum_valid(&corrupted),
                    "byte {idx} changed by {delta} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn header_field_changes_are_detected() {
        let packet = sample();

        let mut seq = packet;
        seq.seq_num = 999_999;
        assert!(!is_checksum_valid(&seq));

        let mut ack = packet;
        ack.ack = 1;
        assert!(!is_checksum_valid(&ack));
    }

    #[test]
    fn swapped_payload_bytes_are_detected() {
        let packet = stamp(Packet::data(1, &Message::new(b"ab").unwrap()));
        let mut swapped = packet;
        swapped.payload.swap(0, 1);
        assert!(!is_checksum_valid(&swapped));
    }

    #[test]
    fn sequence_check_is_equality() {
        assert!(is_sequence_expected(4, 4));
        assert!(!is_sequence_expected(3, 4));
        assert!(!is_sequence_expected(5, 4));
    }
}
