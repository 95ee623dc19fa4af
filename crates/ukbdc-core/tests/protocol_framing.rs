//! Integration tests for message chunking and reassembly over the packet layer.

use ukbdc_core::protocol::{
    chunk_message, paginate, Message, PacketKind, ProtocolError, Reassembler,
};

#[test]
fn test_every_message_survives_chunking_at_common_packet_sizes() {
    let messages = vec![
        Message::Dfu,
        Message::ActivateLayout,
        Message::DeactivateLayout,
        Message::write_page(0, &[0xA5; 128]).unwrap(),
        Message::write_page(254, &[1, 2, 3]).unwrap(),
    ];

    for size in [8usize, 16, 32, 64] {
        let mut reassembler = Reassembler::new();
        for msg in &messages {
            let packets = chunk_message(msg, size).expect("fits");
            assert!(packets.iter().all(|p| p.len() <= size));
            assert_eq!(packets[0].kind, PacketKind::Start);

            let mut decoded = None;
            for packet in &packets {
                decoded = reassembler.push_message(packet).expect("valid stream");
            }
            assert_eq!(decoded.as_ref(), Some(msg), "packet size {size}");
        }
    }
}

#[test]
fn test_paginated_binary_reassembles_to_original_bytes() {
    let binary: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();

    let mut rebuilt = Vec::new();
    let mut reassembler = Reassembler::new();
    for (expected_index, msg) in paginate(&binary).unwrap().iter().enumerate() {
        for packet in chunk_message(msg, 64).unwrap() {
            if let Some(Message::WritePage { index, page }) =
                reassembler.push_message(&packet).unwrap()
            {
                assert_eq!(index as usize, expected_index);
                rebuilt.extend_from_slice(page.as_slice());
            }
        }
    }

    assert_eq!(rebuilt.len(), 3 * 128);
    assert_eq!(&rebuilt[..300], binary.as_slice());
    assert!(rebuilt[300..].iter().all(|&b| b == 0));
}

#[test]
fn test_oversize_binary_is_rejected_before_chunking() {
    let result = paginate(&vec![0u8; 256 * 128]);
    assert!(matches!(result, Err(ProtocolError::PageOverflow { pages: 256, .. })));
}
