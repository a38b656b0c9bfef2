//! Word-stream reader.

use super::{Error, HEADER_WORDS};
use crate::{
    grammar::{self, OperandKind, Quantifier},
    Instruction, ModuleHeader, Operand, RawModule, Word,
};

struct Decoder<'a> {
    words: &'a [Word],
    cursor: usize,
    swap: bool,
}

impl<'a> Decoder<'a> {
    fn remaining(&self) -> usize {
        self.words.len() - self.cursor
    }

    fn word(&mut self) -> Result<Word, Error> {
        let word = *self
            .words
            .get(self.cursor)
            .ok_or(Error::TruncatedStream { at: self.cursor })?;
        self.cursor += 1;
        Ok(if self.swap { word.swap_bytes() } else { word })
    }
}

/// Reads the operand words of one instruction.
struct OperandReader<'a> {
    words: &'a [Word],
    position: usize,
    index: usize,
}

impl<'a> OperandReader<'a> {
    fn is_exhausted(&self) -> bool {
        self.position == self.words.len()
    }

    fn word(&mut self) -> Result<Word, Error> {
        let word = *self.words.get(self.position).ok_or(Error::TruncatedStream {
            at: self.position,
        })?;
        self.position += 1;
        Ok(word)
    }

    fn string(&mut self) -> Result<String, Error> {
        let mut bytes = Vec::new();
        loop {
            let word = self.word()?;
            let quad = word.to_le_bytes();
            if let Some(end) = quad.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&quad[..end]);
                break;
            }
            bytes.extend_from_slice(&quad);
        }
        String::from_utf8(bytes).map_err(|_| Error::MalformedString { index: self.index })
    }

    fn operand(&mut self, kind: OperandKind, inst: &mut Instruction) -> Result<(), Error> {
        match kind {
            OperandKind::IdResultType => inst.set_type(self.word()?),
            OperandKind::IdResult => inst.set_result(self.word()?),
            OperandKind::IdRef => {
                let id = self.word()?;
                inst.add_id(id);
            }
            OperandKind::LiteralString => {
                let s = self.string()?;
                inst.add_operand(Operand::String(s));
            }
            OperandKind::LiteralContextDependentNumber => {
                // Sized by the result type; kept as raw words so the codec
                // stays exact without resolving types.
                while !self.is_exhausted() {
                    let word = self.word()?;
                    inst.add_literal(word);
                }
            }
            OperandKind::LiteralInteger | OperandKind::LiteralExtInstInteger => {
                let word = self.word()?;
                inst.add_literal(word);
            }
            OperandKind::PairLiteralIntegerIdRef => {
                let literal = self.word()?;
                let id = self.word()?;
                inst.add_literal(literal);
                inst.add_id(id);
            }
            OperandKind::PairIdRefIdRef => {
                let first = self.word()?;
                let second = self.word()?;
                inst.add_id(first);
                inst.add_id(second);
            }
            _ => {
                let word = self.word()?;
                inst.add_enum(kind, word);
            }
        }
        Ok(())
    }
}

fn parse_instruction(operand_words: &[Word], opcode: u16, index: usize) -> Result<Instruction, Error> {
    let def = grammar::lookup_u16(opcode).ok_or(Error::UnknownOpcode { opcode, index })?;
    let mut inst = Instruction::new(def.op);
    let mut reader = OperandReader {
        words: operand_words,
        position: 0,
        index,
    };
    for operand in def.operands {
        match operand.quantifier {
            Quantifier::One => reader.operand(operand.kind, &mut inst)?,
            Quantifier::ZeroOrOne => {
                if !reader.is_exhausted() {
                    reader.operand(operand.kind, &mut inst)?;
                }
            }
            Quantifier::ZeroOrMore => {
                while !reader.is_exhausted() {
                    reader.operand(operand.kind, &mut inst)?;
                }
            }
        }
    }
    if !reader.is_exhausted() {
        return Err(Error::TrailingOperands { index });
    }
    Ok(inst)
}

/// Parses a module from its word stream, byte-swapping when the magic word
/// arrives in the foreign order.
pub fn parse_words(words: &[Word]) -> Result<RawModule, Error> {
    if words.len() < HEADER_WORDS {
        return Err(Error::MalformedHeader);
    }
    let swap = if words[0] == spirv::MAGIC_NUMBER {
        false
    } else if words[0] == spirv::MAGIC_NUMBER.swap_bytes() {
        true
    } else {
        return Err(Error::MalformedHeader);
    };
    let mut decoder = Decoder {
        words,
        cursor: 1,
        swap,
    };
    let header = ModuleHeader {
        magic: spirv::MAGIC_NUMBER,
        version: decoder.word()?,
        generator: decoder.word()?,
        bound: decoder.word()?,
        schema: decoder.word()?,
    };

    let mut instructions = Vec::new();
    let mut index = 0;
    while decoder.remaining() != 0 {
        index += 1;
        let at = decoder.cursor;
        let packed = decoder.word()?;
        let word_count = (packed >> 16) as usize;
        let opcode = (packed & 0xffff) as u16;
        if word_count == 0 {
            return Err(Error::WordCountZero { index });
        }
        if decoder.remaining() < word_count - 1 {
            return Err(Error::TruncatedStream { at });
        }
        let mut operand_words = Vec::with_capacity(word_count - 1);
        for _ in 0..word_count - 1 {
            operand_words.push(decoder.word()?);
        }
        instructions.push(parse_instruction(&operand_words, opcode, index)?);
    }
    Ok(RawModule {
        header,
        instructions,
    })
}

/// Parses a module from bytes holding little-endian words.
pub fn parse_bytes(bytes: &[u8]) -> Result<RawModule, Error> {
    if bytes.len() % 4 != 0 {
        return Err(Error::TruncatedStream { at: bytes.len() / 4 });
    }
    let words: Vec<Word> = bytes
        .chunks_exact(4)
        .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    parse_words(&words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write_words;

    /// A simple word-level module builder for testing.
    pub(crate) struct ModuleBuilder {
        words: Vec<Word>,
    }

    impl ModuleBuilder {
        pub fn new() -> Self {
            ModuleBuilder {
                words: vec![spirv::MAGIC_NUMBER, 0x0001_0000, 0, 0, 0],
            }
        }

        pub fn inst(&mut self, op: spirv::Op, operands: &[Word]) -> &mut Self {
            self.words
                .push(((operands.len() as u32 + 1) << 16) | op as u32);
            self.words.extend_from_slice(operands);
            self
        }

        pub fn get(&self) -> Vec<Word> {
            self.words.clone()
        }
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse_words(&[]), Err(Error::MalformedHeader));
    }

    #[test]
    fn wrong_magic() {
        let mut words = ModuleBuilder::new().get();
        words[0] = 0xdead_beef;
        assert_eq!(parse_words(&words), Err(Error::MalformedHeader));
    }

    #[test]
    fn header_only() {
        let module = parse_words(&ModuleBuilder::new().get()).unwrap();
        assert_eq!(module.header.version, 0x0001_0000);
        assert!(module.instructions.is_empty());
    }

    #[test]
    fn zero_word_count() {
        let mut words = ModuleBuilder::new().get();
        words.push(0);
        assert_eq!(parse_words(&words), Err(Error::WordCountZero { index: 1 }));
    }

    #[test]
    fn truncated_instruction() {
        let mut words = ModuleBuilder::new().get();
        // OpMemoryModel claiming three words but supplying one operand.
        words.push((3 << 16) | spirv::Op::MemoryModel as u32);
        words.push(0);
        assert_eq!(parse_words(&words), Err(Error::TruncatedStream { at: 5 }));
    }

    #[test]
    fn unknown_opcode() {
        let mut words = ModuleBuilder::new().get();
        words.push((1 << 16) | 0xfffe);
        assert_eq!(
            parse_words(&words),
            Err(Error::UnknownOpcode {
                opcode: 0xfffe,
                index: 1
            })
        );
    }

    #[test]
    fn memory_model_operands() {
        let words = ModuleBuilder::new()
            .inst(spirv::Op::MemoryModel, &[0, 1])
            .get();
        let module = parse_words(&words).unwrap();
        let inst = &module.instructions[0];
        assert_eq!(inst.op, spirv::Op::MemoryModel);
        assert_eq!(inst.result_id, None);
        assert_eq!(
            inst.operands,
            vec![
                Operand::Enum(OperandKind::AddressingModel, 0),
                Operand::Enum(OperandKind::MemoryModel, 1),
            ]
        );
    }

    #[test]
    fn source_optional_operands() {
        // OpSource with language and version only.
        let words = ModuleBuilder::new()
            .inst(spirv::Op::Source, &[2, 450])
            .get();
        let module = parse_words(&words).unwrap();
        assert_eq!(module.instructions[0].operands.len(), 2);

        // With file id and inline source text "wow".
        let words = ModuleBuilder::new()
            .inst(spirv::Op::Source, &[2, 450, 6, 0x0077_6f77])
            .get();
        let module = parse_words(&words).unwrap();
        let inst = &module.instructions[0];
        assert_eq!(inst.operands.len(), 4);
        assert_eq!(inst.operands[3], Operand::String("wow".to_string()));
    }

    #[test]
    fn constant_context_dependent_words() {
        let words = ModuleBuilder::new()
            .inst(spirv::Op::TypeInt, &[1, 64, 1])
            .inst(spirv::Op::Constant, &[1, 2, 0x7856_3412, 0xefcd_ab90])
            .get();
        let module = parse_words(&words).unwrap();
        let inst = &module.instructions[1];
        assert_eq!(inst.result_type, Some(1));
        assert_eq!(inst.result_id, Some(2));
        assert_eq!(
            inst.operands,
            vec![Operand::Literal(0x7856_3412), Operand::Literal(0xefcd_ab90)]
        );
    }

    #[test]
    fn switch_pairs() {
        let words = ModuleBuilder::new()
            .inst(spirv::Op::Switch, &[1, 2, 10, 3, 20, 4])
            .get();
        let module = parse_words(&words).unwrap();
        let inst = &module.instructions[0];
        assert_eq!(
            inst.operands,
            vec![
                Operand::Id(1),
                Operand::Id(2),
                Operand::Literal(10),
                Operand::Id(3),
                Operand::Literal(20),
                Operand::Id(4),
            ]
        );
    }

    #[test]
    fn byte_swapped_input() {
        let host = ModuleBuilder::new()
            .inst(spirv::Op::Capability, &[spirv::Capability::Shader as Word])
            .inst(spirv::Op::MemoryModel, &[0, 1])
            .get();
        let swapped: Vec<Word> = host.iter().map(|w| w.swap_bytes()).collect();
        let from_host = parse_words(&host).unwrap();
        let from_swapped = parse_words(&swapped).unwrap();
        assert_eq!(from_host, from_swapped);
        // Re-encoding a swapped module lands in host order.
        assert_eq!(write_words(&from_swapped), host);
    }

    #[test]
    fn bytes_round_trip() {
        let words = ModuleBuilder::new()
            .inst(spirv::Op::MemoryModel, &[0, 1])
            .get();
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert_eq!(parse_bytes(&bytes).unwrap(), parse_words(&words).unwrap());
        assert_eq!(
            parse_bytes(&bytes[..bytes.len() - 1]),
            Err(Error::TruncatedStream { at: 6 })
        );
    }
}
