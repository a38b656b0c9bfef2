//! Word-stream writer.

use super::string_to_words;
use crate::{Instruction, Operand, RawModule, Word};

impl Operand {
    pub(crate) fn write_words(&self, sink: &mut Vec<Word>) {
        match *self {
            Operand::Id(id) => sink.push(id),
            Operand::Literal(word) | Operand::Enum(_, word) => sink.push(word),
            Operand::String(ref s) => sink.extend(string_to_words(s)),
        }
    }
}

impl Instruction {
    /// Appends the encoded form, leading packed word included.
    pub fn write_words(&self, sink: &mut Vec<Word>) {
        sink.push((self.word_count() << 16) | self.op as Word);
        if let Some(id) = self.result_type {
            sink.push(id);
        }
        if let Some(id) = self.result_id {
            sink.push(id);
        }
        for operand in &self.operands {
            operand.write_words(sink);
        }
    }
}

/// Encodes a module in host order with the canonical magic.
pub fn write_words(module: &RawModule) -> Vec<Word> {
    let mut words = Vec::with_capacity(
        super::HEADER_WORDS
            + module
                .instructions
                .iter()
                .map(|i| i.word_count() as usize)
                .sum::<usize>(),
    );
    words.push(spirv::MAGIC_NUMBER);
    words.push(module.header.version);
    words.push(module.header.generator);
    words.push(module.header.bound);
    words.push(module.header.schema);
    for inst in &module.instructions {
        inst.write_words(&mut words);
    }
    words
}

/// Encodes a module as bytes holding little-endian words.
pub fn write_bytes(module: &RawModule) -> Vec<u8> {
    write_words(module)
        .iter()
        .flat_map(|w| w.to_le_bytes().to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::parse_words;
    use crate::grammar::OperandKind;

    fn minimal_shader_words() -> Vec<Word> {
        let mut words = vec![spirv::MAGIC_NUMBER, 0x0001_0500, 0, 6, 0];
        for &(op, operands) in &[
            (spirv::Op::Capability, &[spirv::Capability::VulkanMemoryModel as Word][..]),
            (spirv::Op::MemoryModel, &[0, 3][..]),
            (spirv::Op::TypeFloat, &[2, 32][..]),
            (spirv::Op::TypeFunction, &[3, 2, 2][..]),
            (spirv::Op::Function, &[2, 4, 0, 3][..]),
            (spirv::Op::FunctionParameter, &[2, 5][..]),
            (spirv::Op::Label, &[1][..]),
            (spirv::Op::ReturnValue, &[5][..]),
            (spirv::Op::FunctionEnd, &[][..]),
        ] {
            words.push(((operands.len() as Word + 1) << 16) | op as Word);
            words.extend_from_slice(operands);
        }
        words
    }

    #[test]
    fn encode_inverts_decode() {
        let words = minimal_shader_words();
        let module = parse_words(&words).unwrap();
        assert_eq!(write_words(&module), words);
    }

    #[test]
    fn string_operand_padding() {
        let mut inst = Instruction::new(spirv::Op::Name);
        inst.add_id(7);
        inst.add_string("main");
        let mut words = Vec::new();
        inst.write_words(&mut words);
        // "main" occupies two words: four bytes plus a lone terminator.
        assert_eq!(
            words,
            vec![
                (4 << 16) | spirv::Op::Name as Word,
                7,
                0x6e69_616d,
                0,
            ]
        );
    }

    #[test]
    fn enum_operand_is_one_word() {
        let mut inst = Instruction::new(spirv::Op::Capability);
        inst.add_enum(OperandKind::Capability, spirv::Capability::Shader as Word);
        assert_eq!(inst.word_count(), 2);
    }

    #[test]
    fn bytes_are_little_endian_words() {
        let module = parse_words(&minimal_shader_words()).unwrap();
        let bytes = write_bytes(&module);
        assert_eq!(&bytes[..4], &spirv::MAGIC_NUMBER.to_le_bytes());
        assert_eq!(bytes.len() % 4, 0);
    }
}
