//! Textual SPIR-V, round-trippable with the binary form.
//!
//! One instruction per line: `%<id> = OpName(operands...)::%<type_id>` when
//! a result id is present, `OpName(operands...)` otherwise. Enum operands
//! render by symbolic name with a hex fallback, literals as fixed-width hex,
//! strings quoted. Header fields travel in leading `;` comment lines.

mod asm;
mod dis;

pub use asm::assemble;
pub use dis::disassemble;

use crate::{FastHashMap, Id, Operand, RawModule};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("line {line}: expected {expected}")]
    Expected { line: usize, expected: &'static str },
    #[error("line {line}: unknown instruction {name:?}")]
    UnknownInstruction { line: usize, name: String },
    #[error("line {line}: {name:?} does not name a {kind:?} value")]
    UnknownEnumerant {
        line: usize,
        kind: crate::grammar::OperandKind,
        name: String,
    },
    #[error("line {line}: malformed literal {text:?}")]
    MalformedLiteral { line: usize, text: String },
    #[error("line {line}: missing operand")]
    MissingOperand { line: usize },
    #[error("line {line}: extra operands past the instruction grammar")]
    TrailingOperands { line: usize },
}

/// Whether two flat modules are equal up to a bijective renaming of ids.
///
/// Instruction sequences must match in opcode and non-id operands, and there
/// must be a single one-to-one id mapping consistent across the whole
/// stream. Header fields are not compared; `bound` in particular moves under
/// renumbering.
pub fn semantically_equal(left: &RawModule, right: &RawModule) -> bool {
    if left.instructions.len() != right.instructions.len() {
        return false;
    }
    let mut forward = FastHashMap::<Id, Id>::default();
    let mut backward = FastHashMap::<Id, Id>::default();
    let mut bind = move |a: Id, b: Id| -> bool {
        match (forward.get(&a).copied(), backward.get(&b).copied()) {
            (None, None) => {
                forward.insert(a, b);
                backward.insert(b, a);
                true
            }
            (Some(mapped), Some(back)) => mapped == b && back == a,
            _ => false,
        }
    };
    for (l, r) in left.instructions.iter().zip(&right.instructions) {
        if l.op != r.op || l.operands.len() != r.operands.len() {
            return false;
        }
        match (l.result_type, r.result_type) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                if !bind(a, b) {
                    return false;
                }
            }
            _ => return false,
        }
        match (l.result_id, r.result_id) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                if !bind(a, b) {
                    return false;
                }
            }
            _ => return false,
        }
        for (lo, ro) in l.operands.iter().zip(&r.operands) {
            let ok = match (lo, ro) {
                (&Operand::Id(a), &Operand::Id(b)) => bind(a, b),
                _ => lo == ro,
            };
            if !ok {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Instruction, ModuleHeader};

    fn raw(instructions: Vec<Instruction>) -> RawModule {
        RawModule {
            header: ModuleHeader::new(0x0001_0000, 0, 100),
            instructions,
        }
    }

    fn add(result: Id, ty: Id, a: Id, b: Id) -> Instruction {
        let mut inst = Instruction::new(spirv::Op::IAdd);
        inst.set_type(ty);
        inst.set_result(result);
        inst.add_id(a);
        inst.add_id(b);
        inst
    }

    #[test]
    fn renumbering_is_semantic_equality() {
        let left = raw(vec![add(3, 1, 2, 2), add(4, 1, 3, 2)]);
        let right = raw(vec![add(30, 10, 20, 20), add(40, 10, 30, 20)]);
        assert!(semantically_equal(&left, &right));
    }

    #[test]
    fn inconsistent_mapping_is_rejected() {
        let left = raw(vec![add(3, 1, 2, 2)]);
        // %2 would have to map to both 20 and 21.
        let right = raw(vec![add(30, 10, 20, 21)]);
        assert!(!semantically_equal(&left, &right));
    }

    #[test]
    fn non_injective_mapping_is_rejected() {
        let left = raw(vec![add(3, 1, 2, 7)]);
        // Distinct ids 2 and 7 collapsing onto 20 is not a bijection.
        let right = raw(vec![add(30, 10, 20, 20)]);
        assert!(!semantically_equal(&left, &right));
    }

    #[test]
    fn differing_opcodes_are_unequal() {
        let mut sub = add(3, 1, 2, 2);
        sub.op = spirv::Op::ISub;
        assert!(!semantically_equal(&raw(vec![add(3, 1, 2, 2)]), &raw(vec![sub])));
    }
}
