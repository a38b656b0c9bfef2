//! Disassembler: flat module to line-oriented text.

use crate::{grammar, FastHashMap, Id, Operand, RawModule};
use std::fmt::Write as _;

fn push_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn push_operand(out: &mut String, operand: &Operand, ext_set: Option<&str>) {
    match *operand {
        Operand::Id(id) => {
            let _ = write!(out, "%{}", id);
        }
        Operand::Literal(word) => {
            // Named extended-set opcodes render symbolically when the
            // position and import are known.
            if let Some(name) = ext_set
                .and_then(grammar::ext_inst_set)
                .and_then(|set| grammar::ext_inst_name(set, word))
            {
                out.push_str(name);
            } else {
                let _ = write!(out, "{:#010x}", word);
            }
        }
        Operand::String(ref s) => push_escaped(out, s),
        Operand::Enum(kind, word) => match grammar::enum_name(kind, word) {
            Some(name) => out.push_str(name),
            None => {
                let _ = write!(out, "{:#010x}", word);
            }
        },
    }
}

/// Renders a module, one instruction per line, preceded by header comments.
pub fn disassemble(module: &RawModule) -> String {
    let mut imports = FastHashMap::<Id, String>::default();
    for inst in &module.instructions {
        if inst.op == spirv::Op::ExtInstImport {
            if let (Some(id), Some(name)) = (
                inst.result_id,
                inst.operands.first().and_then(Operand::as_str),
            ) {
                imports.insert(id, name.to_string());
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "; SPIR-V");
    let _ = writeln!(out, "; Version: {:#010x}", module.header.version);
    let _ = writeln!(out, "; Generator: {:#010x}", module.header.generator);
    let _ = writeln!(out, "; Bound: {}", module.header.bound);
    let _ = writeln!(out, "; Schema: {}", module.header.schema);

    for inst in &module.instructions {
        if let Some(id) = inst.result_id {
            let _ = write!(out, "%{} = ", id);
        }
        let opname = grammar::lookup(inst.op).map_or("Unknown", |def| def.opname);
        let _ = write!(out, "Op{}(", opname);

        // The instruction number of an OpExtInst follows its set id.
        let ext_set = if inst.op == spirv::Op::ExtInst {
            inst.operands
                .first()
                .and_then(Operand::as_id)
                .and_then(|id| imports.get(&id))
                .map(String::as_str)
        } else {
            None
        };
        for (i, operand) in inst.operands.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let position_is_ext_number = i == 1 && inst.op == spirv::Op::ExtInst;
            push_operand(
                &mut out,
                operand,
                if position_is_ext_number { ext_set } else { None },
            );
        }
        out.push(')');
        if inst.result_id.is_some() {
            if let Some(ty) = inst.result_type {
                let _ = write!(out, "::%{}", ty);
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::OperandKind, Instruction, ModuleHeader};

    fn raw(instructions: Vec<Instruction>) -> RawModule {
        RawModule {
            header: ModuleHeader::new(0x0001_0300, 0x8, 20),
            instructions,
        }
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().filter(|l| !l.starts_with(';')).collect()
    }

    #[test]
    fn renders_results_and_types() {
        let mut ty = Instruction::new(spirv::Op::TypeFloat);
        ty.set_result(2);
        ty.add_literal(32);
        let mut add = Instruction::new(spirv::Op::FAdd);
        add.set_type(2);
        add.set_result(5);
        add.add_id(3);
        add.add_id(4);
        let text = disassemble(&raw(vec![ty, add]));
        assert_eq!(
            lines(&text),
            vec![
                "%2 = OpTypeFloat(0x00000020)",
                "%5 = OpFAdd(%3, %4)::%2",
            ]
        );
    }

    #[test]
    fn renders_enums_symbolically() {
        let mut mm = Instruction::new(spirv::Op::MemoryModel);
        mm.add_enum(OperandKind::AddressingModel, 0);
        mm.add_enum(OperandKind::MemoryModel, 3);
        let text = disassemble(&raw(vec![mm]));
        assert_eq!(lines(&text), vec!["OpMemoryModel(Logical, Vulkan)"]);
    }

    #[test]
    fn renders_unknown_enum_as_hex() {
        let mut cap = Instruction::new(spirv::Op::Capability);
        cap.add_enum(OperandKind::Capability, 0xbeef);
        let text = disassemble(&raw(vec![cap]));
        assert_eq!(lines(&text), vec!["OpCapability(0x0000beef)"]);
    }

    #[test]
    fn renders_strings_quoted() {
        let mut name = Instruction::new(spirv::Op::Name);
        name.add_id(4);
        name.add_operand(Operand::String("a \"b\" \\ c".to_string()));
        let text = disassemble(&raw(vec![name]));
        assert_eq!(lines(&text), vec![r#"OpName(%4, "a \"b\" \\ c")"#]);
    }

    #[test]
    fn renders_ext_inst_by_name() {
        let mut import = Instruction::new(spirv::Op::ExtInstImport);
        import.set_result(1);
        import.add_string("GLSL.std.450");
        let mut ext = Instruction::new(spirv::Op::ExtInst);
        ext.set_type(6);
        ext.set_result(9);
        ext.add_id(1);
        ext.add_literal(40);
        ext.add_id(7);
        ext.add_id(8);
        let text = disassemble(&raw(vec![import, ext]));
        assert_eq!(
            lines(&text),
            vec![
                r#"%1 = OpExtInstImport("GLSL.std.450")"#,
                "%9 = OpExtInst(%1, FMax, %7, %8)::%6",
            ]
        );
    }
}
