//! Translation between [`CanFrame`] and the controller's register layout
//!
//! Both directions are pure. Values wider than their hardware field are
//! truncated by masking, never rejected: the register words have fixed widths
//! and [`CanFrame`]'s constructors already keep every field in range.

use super::CanFrame;
use crate::reg::{payload, MsgId};

/// Raw register values describing one frame
///
/// The same image is written to the TX registers when sending and read from
/// the RX registers when receiving.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterImage {
    /// `*_MSG_ID`
    pub msg_id: u32,
    /// `*_PAYLOAD_LENGTH`
    pub payload_length: u32,
    /// `*_PAYLOAD_0` and `*_PAYLOAD_1`
    pub payload: [u32; 2],
}

/// Converts a frame to the register values the controller expects.
///
/// The length register carries the declared length even for remote frames.
pub fn encode(frame: &CanFrame) -> RegisterImage {
    let mut id = MsgId::default();
    id.set_arb_id_a(frame.base_id());
    id.set_arb_id_b(frame.extension_id());
    id.set_ext_id_en(frame.is_extended());
    id.set_rtr_en(frame.is_remote());

    let bytes = frame.payload();
    let mut words = [0_u32; 2];
    for (i, byte) in bytes.iter().enumerate() {
        let word = &mut words[payload::word_of(i)];
        *word = payload::PAYLOAD_BYTE[i].insert(*word, u32::from(*byte));
    }

    RegisterImage {
        msg_id: id.into(),
        payload_length: u32::from(frame.len()),
        payload: words,
    }
}

/// Reconstructs a frame from the register values latched by the controller.
///
/// The identifier extension is only taken for extended frames, the payload
/// is cleared for remote frames and zero-padded past the declared length.
/// Only the low eight bits of the length register are significant.
pub fn decode(image: &RegisterImage) -> CanFrame {
    let id = MsgId::from(image.msg_id);

    let mut bytes = [0_u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let word = image.payload[payload::word_of(i)];
        *byte = payload::PAYLOAD_BYTE[i].extract(word) as u8;
    }

    CanFrame::normalized(
        id.arb_id_a(),
        id.arb_id_b(),
        id.ext_id_en(),
        id.rtr_en(),
        bytes,
        image.payload_length as u8,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reg::msg_id::{ARB_ID_A, ARB_ID_B, EXT_ID_EN, RTR_EN};

    #[test]
    fn standard_frame_layout() {
        let frame =
            CanFrame::from_parts(0x7ff, 0, false, false, [0xaa, 0xbb, 0, 0, 0, 0, 0, 0], 2)
                .unwrap();
        let image = encode(&frame);
        assert_eq!(ARB_ID_A.extract(image.msg_id), 0x7ff);
        assert_eq!(image.msg_id & (EXT_ID_EN.mask() | RTR_EN.mask()), 0);
        assert_eq!(image.msg_id, 0x7ff0_0000);
        assert_eq!(image.payload[0] & 0xffff, 0xbbaa);
        assert_eq!(image.payload[1], 0);
        assert_eq!(image.payload_length, 2);

        let decoded = decode(&image);
        assert_eq!(decoded.base_id(), 0x7ff);
        assert_eq!(decoded.extension_id(), 0);
        assert_eq!(decoded.payload(), &[0xaa, 0xbb, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decoded, frame);
    }

    #[test]
    fn extended_frame_layout() {
        let frame = CanFrame::from_parts(
            0x123,
            0x3_abcd,
            true,
            false,
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
            8,
        )
        .unwrap();
        let image = encode(&frame);
        assert_eq!(
            image.msg_id,
            (0x123 << 20) | (0x3_abcd << 2) | EXT_ID_EN.mask()
        );
        assert_eq!(image.payload, [0x4433_2211, 0x8877_6655]);
        assert_eq!(decode(&image), frame);
    }

    #[test]
    fn remote_frame_keeps_length_and_drops_payload() {
        let a = CanFrame::from_parts(0x42, 7, true, true, [1, 2, 3, 4, 5, 6, 7, 8], 4).unwrap();
        let b = CanFrame::from_parts(0x42, 7, true, true, [9; 8], 6).unwrap();
        let (ia, ib) = (encode(&a), encode(&b));
        assert_eq!(ia.msg_id, ib.msg_id);
        assert_eq!(ia.payload, ib.payload);
        assert_eq!(ia.payload_length, 4);
        assert_eq!(ib.payload_length, 6);
        assert_ne!(ia.msg_id & RTR_EN.mask(), 0);

        // Hardware may latch stale payload words next to a remote frame
        let stale = RegisterImage {
            payload: [0xdead_beef, 0xcafe_f00d],
            ..ia
        };
        assert_eq!(decode(&stale).payload(), &[0; 8]);
        assert_eq!(decode(&stale), a);
    }

    #[test]
    fn decode_zeroes_extension_of_standard_frame() {
        let image = RegisterImage {
            msg_id: (0x155 << 20) | ARB_ID_B.mask(),
            payload_length: 0,
            payload: [0; 2],
        };
        let frame = decode(&image);
        assert!(!frame.is_extended());
        assert_eq!(frame.extension_id(), 0);
        assert_eq!(frame.base_id(), 0x155);
    }

    #[test]
    fn decode_zero_pads_past_length() {
        let image = RegisterImage {
            msg_id: 0,
            payload_length: 3,
            payload: [0x4433_2211, 0x8877_6655],
        };
        assert_eq!(decode(&image).payload(), &[0x11, 0x22, 0x33, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn decode_is_idempotent() {
        let image = RegisterImage {
            msg_id: 0xffff_ffff,
            payload_length: 5,
            payload: [0x0102_0304, 0x0506_0708],
        };
        let once = decode(&image);
        assert_eq!(decode(&image), once);
        assert_eq!(decode(&encode(&once)), once);
    }

    #[test]
    fn decode_keeps_oversized_length() {
        let image = RegisterImage {
            msg_id: 0,
            payload_length: 12,
            payload: [u32::MAX; 2],
        };
        let frame = decode(&image);
        assert_eq!(frame.len(), 12);
        assert_eq!(frame.payload(), &[0xff; 8]);
    }
}
