//! Bytecode disassembler, for the `dis` host surface and the tests.

use pi_asm::{BinaryOp, CompareOp, Opcode, UnaryOp};

use crate::heap::Heap;
use crate::object::CodeObject;
use crate::value::Value;

/// Render a code object one instruction per line:
/// `offset  OPCODE  operand  ; detail`.
pub fn disassemble(code: &CodeObject, constants: &[Value], heap: &Heap) -> String {
    let mut out = String::new();
    let bytes = &code.code;
    let mut pc = 0usize;

    while pc < bytes.len() {
        let at = pc;
        let Ok(op) = Opcode::try_from(bytes[pc]) else {
            out.push_str(&format!("{at:04}  ??? 0x{:02x}\n", bytes[pc]));
            pc += 1;
            continue;
        };
        pc += 1;

        match op.operand_bytes() {
            0 => out.push_str(&format!("{at:04}  {op}\n")),
            1 => {
                let operand = bytes.get(pc).copied().unwrap_or(0);
                pc += 1;
                let detail = detail_8(op, operand);
                out.push_str(&format!("{at:04}  {op} {operand}{detail}\n"));
            }
            _ => {
                let high = bytes.get(pc).copied().unwrap_or(0);
                let low = bytes.get(pc + 1).copied().unwrap_or(0);
                pc += 2;
                let operand = u16::from_be_bytes([high, low]);
                if op.is_branch() {
                    let offset = operand as i16;
                    let target = at as isize + offset as isize;
                    out.push_str(&format!("{at:04}  {op} {offset} ; -> {target}\n"));
                } else {
                    let detail = detail_16(op, operand, constants, heap);
                    out.push_str(&format!("{at:04}  {op} {operand}{detail}\n"));
                }
            }
        }
    }
    out
}

fn detail_8(op: Opcode, operand: u8) -> String {
    match op {
        Opcode::Binary => BinaryOp::try_from(operand)
            .map(|b| format!(" ; {b}"))
            .unwrap_or_default(),
        Opcode::Compare => CompareOp::try_from(operand)
            .map(|c| format!(" ; {c}"))
            .unwrap_or_default(),
        Opcode::Unary => UnaryOp::try_from(operand)
            .map(|u| format!(" ; {u}"))
            .unwrap_or_default(),
        Opcode::PushFunction => {
            format!(" ; {} params", operand & 0x7f)
        }
        _ => String::new(),
    }
}

fn detail_16(op: Opcode, operand: u16, constants: &[Value], heap: &Heap) -> String {
    match op {
        Opcode::LoadConst => constants
            .get(operand as usize)
            .map(|v| format!(" ; {}", heap.display(*v)))
            .unwrap_or_else(|| " ; <bad const>".into()),
        Opcode::PushClosure => format!(
            " ; {} params, {} upvalues",
            (operand >> 8) & 0x7f,
            operand & 0xff
        ),
        _ => String::new(),
    }
}
