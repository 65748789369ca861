use rstest::rstest;
use strum::IntoEnumIterator;

use crate::{BinaryOp, CompareOp, Opcode, UnaryOp};

#[test]
fn opcode_byte_roundtrip() {
    for op in Opcode::iter() {
        let byte = u8::from(op);
        assert_eq!(Opcode::try_from(byte), Ok(op));
    }
}

#[test]
fn unknown_bytes_are_rejected() {
    let known: Vec<u8> = Opcode::iter().map(u8::from).collect();
    for byte in 0..=u8::MAX {
        if !known.contains(&byte) {
            assert!(Opcode::try_from(byte).is_err(), "byte 0x{byte:02x}");
        }
    }
}

#[rstest]
#[case(Opcode::Halt, 0)]
#[case(Opcode::Call, 1)]
#[case(Opcode::PushRange, 1)]
#[case(Opcode::LoadConst, 2)]
#[case(Opcode::PushClosure, 2)]
#[case(Opcode::Loop, 2)]
fn operand_widths(#[case] op: Opcode, #[case] width: usize) {
    assert_eq!(op.operand_bytes(), width);
}

#[test]
fn branch_opcodes_take_offsets() {
    for op in Opcode::iter().filter(Opcode::is_branch) {
        assert_eq!(op.operand_bytes(), 2);
    }
}

#[test]
fn operator_tables_are_index_stable() {
    for (i, op) in BinaryOp::iter().enumerate() {
        assert_eq!(op as u8, i as u8);
        assert_eq!(BinaryOp::try_from(i as u8), Ok(op));
    }
    for (i, op) in CompareOp::iter().enumerate() {
        assert_eq!(op as u8, i as u8);
        assert_eq!(CompareOp::try_from(i as u8), Ok(op));
    }
    for (i, op) in UnaryOp::iter().enumerate() {
        assert_eq!(op as u8, i as u8);
        assert_eq!(UnaryOp::try_from(i as u8), Ok(op));
    }
}

#[test]
fn operator_symbols() {
    assert_eq!(BinaryOp::Dot.to_string(), "@");
    assert_eq!(BinaryOp::UShr.to_string(), ">>>");
    assert_eq!(CompareOp::In.to_string(), "in");
    assert_eq!(UnaryOp::Len.to_string(), "#");
}
