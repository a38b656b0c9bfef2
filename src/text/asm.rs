//! Assembler: line-oriented text to flat module.

use super::Error;
use crate::{
    grammar::{self, OperandKind, Quantifier},
    FastHashMap, Id, Instruction, ModuleHeader, Operand, RawModule, Word,
};

struct Cursor<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Cursor { rest: text, line }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn consume(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest.starts_with(c) {
            self.rest = &self.rest[c.len_utf8()..];
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char, expected: &'static str) -> Result<(), Error> {
        if self.consume(c) {
            Ok(())
        } else {
            Err(Error::Expected {
                line: self.line,
                expected,
            })
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest.is_empty()
    }

    fn word(&mut self) -> &'a str {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or_else(|| self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        word
    }

    fn id(&mut self) -> Result<Id, Error> {
        let word = self.word();
        word.parse().map_err(|_| Error::Expected {
            line: self.line,
            expected: "id number",
        })
    }

    /// Reads a quoted string body; the opening quote is already consumed.
    fn string(&mut self) -> Result<String, Error> {
        let mut out = String::new();
        let mut chars = self.rest.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.rest = &self.rest[i + 1..];
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                _ => out.push(c),
            }
        }
        Err(Error::Expected {
            line: self.line,
            expected: "closing quote",
        })
    }
}

enum ArgToken<'a> {
    Id(Id),
    Str(String),
    Atom(&'a str),
}

fn parse_word_literal(atom: &str) -> Option<Word> {
    if let Some(hex) = atom.strip_prefix("0x").or_else(|| atom.strip_prefix("0X")) {
        Word::from_str_radix(hex, 16).ok()
    } else if atom.bytes().all(|b| b.is_ascii_digit()) && !atom.is_empty() {
        atom.parse().ok()
    } else {
        None
    }
}

struct Assembler<'a> {
    line: usize,
    args: std::vec::IntoIter<ArgToken<'a>>,
    imports: &'a FastHashMap<Id, String>,
}

impl<'a> Assembler<'a> {
    fn next_arg(&mut self) -> Result<ArgToken<'a>, Error> {
        self.args
            .next()
            .ok_or(Error::MissingOperand { line: self.line })
    }

    fn id_arg(&mut self) -> Result<Id, Error> {
        match self.next_arg()? {
            ArgToken::Id(id) => Ok(id),
            _ => Err(Error::Expected {
                line: self.line,
                expected: "%id operand",
            }),
        }
    }

    fn literal_arg(&mut self) -> Result<Word, Error> {
        match self.next_arg()? {
            ArgToken::Atom(atom) => parse_word_literal(atom).ok_or(Error::MalformedLiteral {
                line: self.line,
                text: atom.to_string(),
            }),
            _ => Err(Error::Expected {
                line: self.line,
                expected: "literal operand",
            }),
        }
    }

    fn operand(&mut self, kind: OperandKind, inst: &mut Instruction) -> Result<(), Error> {
        match kind {
            OperandKind::IdResultType | OperandKind::IdResult => {
                // Already consumed from the line prefix and suffix.
            }
            OperandKind::IdRef => {
                let id = self.id_arg()?;
                inst.add_id(id);
            }
            OperandKind::LiteralString => match self.next_arg()? {
                ArgToken::Str(s) => inst.add_operand(Operand::String(s)),
                _ => {
                    return Err(Error::Expected {
                        line: self.line,
                        expected: "string operand",
                    })
                }
            },
            OperandKind::LiteralInteger => {
                let word = self.literal_arg()?;
                inst.add_literal(word);
            }
            OperandKind::LiteralContextDependentNumber => {
                while self.args.len() != 0 {
                    let word = self.literal_arg()?;
                    inst.add_literal(word);
                }
            }
            OperandKind::LiteralExtInstInteger => match self.next_arg()? {
                ArgToken::Atom(atom) => {
                    let number = parse_word_literal(atom).or_else(|| {
                        let set = inst.operands.first().and_then(Operand::as_id)?;
                        let set = grammar::ext_inst_set(self.imports.get(&set)?)?;
                        grammar::ext_inst_number(set, atom)
                    });
                    match number {
                        Some(word) => inst.add_literal(word),
                        None => {
                            return Err(Error::UnknownEnumerant {
                                line: self.line,
                                kind,
                                name: atom.to_string(),
                            })
                        }
                    }
                }
                _ => {
                    return Err(Error::Expected {
                        line: self.line,
                        expected: "extended instruction number",
                    })
                }
            },
            OperandKind::PairLiteralIntegerIdRef => {
                let literal = self.literal_arg()?;
                let id = self.id_arg()?;
                inst.add_literal(literal);
                inst.add_id(id);
            }
            OperandKind::PairIdRefIdRef => {
                let first = self.id_arg()?;
                let second = self.id_arg()?;
                inst.add_id(first);
                inst.add_id(second);
            }
            _ => match self.next_arg()? {
                ArgToken::Atom(atom) => {
                    let value = parse_word_literal(atom)
                        .or_else(|| grammar::enum_value(kind, atom))
                        .ok_or_else(|| Error::UnknownEnumerant {
                            line: self.line,
                            kind,
                            name: atom.to_string(),
                        })?;
                    inst.add_enum(kind, value);
                }
                _ => {
                    return Err(Error::Expected {
                        line: self.line,
                        expected: "enum operand",
                    })
                }
            },
        }
        Ok(())
    }
}

fn parse_line(
    text: &str,
    line: usize,
    imports: &FastHashMap<Id, String>,
) -> Result<Instruction, Error> {
    let mut cur = Cursor::new(text, line);

    let result_id = if cur.consume('%') {
        let id = cur.id()?;
        cur.expect('=', "= after result id")?;
        Some(id)
    } else {
        None
    };

    let opname = cur.word();
    let def = opname
        .strip_prefix("Op")
        .and_then(grammar::lookup_name)
        .ok_or_else(|| Error::UnknownInstruction {
            line,
            name: opname.to_string(),
        })?;

    cur.expect('(', "opening parenthesis")?;
    let mut args = Vec::new();
    if !cur.consume(')') {
        loop {
            cur.skip_ws();
            let token = if cur.consume('%') {
                ArgToken::Id(cur.id()?)
            } else if cur.consume('"') {
                ArgToken::Str(cur.string()?)
            } else {
                let word = cur.word();
                if word.is_empty() {
                    return Err(Error::Expected {
                        line,
                        expected: "operand",
                    });
                }
                ArgToken::Atom(word)
            };
            args.push(token);
            if cur.consume(',') {
                continue;
            }
            cur.expect(')', "closing parenthesis")?;
            break;
        }
    }

    let result_type = if cur.consume(':') {
        cur.expect(':', "::%type suffix")?;
        cur.expect('%', "::%type suffix")?;
        Some(cur.id()?)
    } else {
        None
    };
    if !cur.at_end() {
        return Err(Error::Expected {
            line,
            expected: "end of line",
        });
    }

    let mut inst = Instruction::new(def.op);
    inst.result_type = result_type;
    inst.result_id = result_id;
    let mut assembler = Assembler {
        line,
        args: args.into_iter(),
        imports,
    };
    for operand in def.operands {
        match operand.quantifier {
            Quantifier::One => {
                let required_in_args =
                    operand.kind != OperandKind::IdResultType && operand.kind != OperandKind::IdResult;
                if required_in_args && assembler.args.len() == 0 {
                    return Err(Error::MissingOperand { line });
                }
                assembler.operand(operand.kind, &mut inst)?;
            }
            Quantifier::ZeroOrOne => {
                if assembler.args.len() != 0 {
                    assembler.operand(operand.kind, &mut inst)?;
                }
            }
            Quantifier::ZeroOrMore => {
                while assembler.args.len() != 0 {
                    assembler.operand(operand.kind, &mut inst)?;
                }
            }
        }
    }
    if assembler.args.len() != 0 {
        return Err(Error::TrailingOperands { line });
    }

    // Grammar-required result slots must have come from the line shape.
    for operand in def.operands {
        let missing = match (operand.kind, operand.quantifier) {
            (OperandKind::IdResult, Quantifier::One) => inst.result_id.is_none(),
            (OperandKind::IdResultType, Quantifier::One) => inst.result_type.is_none(),
            _ => false,
        };
        if missing {
            return Err(Error::MissingOperand { line });
        }
    }
    Ok(inst)
}

fn header_value(line: &str, key: &str) -> Option<Word> {
    let rest = line.trim_start_matches(';').trim_start();
    let rest = rest.strip_prefix(key)?.trim_start().strip_prefix(':')?;
    parse_word_literal(rest.trim())
}

/// Parses the textual form back into a flat module.
///
/// `;` lines are comments; the header comments the disassembler emits are
/// recognized and restored, and `bound` falls back to one past the highest
/// id in the stream.
pub fn assemble(source: &str) -> Result<RawModule, Error> {
    let mut header = ModuleHeader::new(0x0001_0000, 0, 0);
    let mut explicit_bound = false;
    let mut imports = FastHashMap::<Id, String>::default();
    let mut instructions = Vec::new();
    let mut max_id = 0;

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw_line.trim();
        if text.is_empty() {
            continue;
        }
        if text.starts_with(';') {
            if let Some(value) = header_value(text, "Version") {
                header.version = value;
            } else if let Some(value) = header_value(text, "Generator") {
                header.generator = value;
            } else if let Some(value) = header_value(text, "Bound") {
                header.bound = value;
                explicit_bound = true;
            } else if let Some(value) = header_value(text, "Schema") {
                header.schema = value;
            }
            continue;
        }

        let inst = parse_line(text, line, &imports)?;
        if inst.op == spirv::Op::ExtInstImport {
            if let (Some(id), Some(name)) = (
                inst.result_id,
                inst.operands.first().and_then(Operand::as_str),
            ) {
                imports.insert(id, name.to_string());
            }
        }
        for id in inst
            .result_id
            .into_iter()
            .chain(inst.result_type)
            .chain(inst.operand_ids())
        {
            max_id = max_id.max(id);
        }
        instructions.push(inst);
    }
    if !explicit_bound {
        header.bound = max_id + 1;
    }
    Ok(RawModule {
        header,
        instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::disassemble;

    #[test]
    fn parses_plain_instruction() {
        let module = assemble("OpMemoryModel(Logical, GLSL450)").unwrap();
        let inst = &module.instructions[0];
        assert_eq!(inst.op, spirv::Op::MemoryModel);
        assert_eq!(
            inst.operands,
            vec![
                Operand::Enum(OperandKind::AddressingModel, 0),
                Operand::Enum(OperandKind::MemoryModel, 1),
            ]
        );
    }

    #[test]
    fn parses_result_and_type() {
        let module = assemble("%5 = OpFAdd(%3, %4)::%2").unwrap();
        let inst = &module.instructions[0];
        assert_eq!(inst.result_id, Some(5));
        assert_eq!(inst.result_type, Some(2));
        assert_eq!(inst.operands, vec![Operand::Id(3), Operand::Id(4)]);
        assert_eq!(module.header.bound, 6);
    }

    #[test]
    fn parses_strings_and_escapes() {
        let module = assemble(r#"OpName(%4, "a \"b\" \\ c")"#).unwrap();
        assert_eq!(
            module.instructions[0].operands[1],
            Operand::String("a \"b\" \\ c".to_string())
        );
    }

    #[test]
    fn parses_hex_and_decimal_literals() {
        let module = assemble("%2 = OpTypeInt(0x00000020, 1)").unwrap();
        assert_eq!(
            module.instructions[0].operands,
            vec![Operand::Literal(32), Operand::Literal(1)]
        );
    }

    #[test]
    fn rejects_unknown_instruction() {
        assert_eq!(
            assemble("OpFrobnicate()"),
            Err(Error::UnknownInstruction {
                line: 1,
                name: "OpFrobnicate".to_string()
            })
        );
    }

    #[test]
    fn rejects_unknown_enumerant() {
        assert_eq!(
            assemble("OpCapability(Telepathy)"),
            Err(Error::UnknownEnumerant {
                line: 1,
                kind: OperandKind::Capability,
                name: "Telepathy".to_string()
            })
        );
    }

    #[test]
    fn resolves_ext_inst_names() {
        let source = "\
%1 = OpExtInstImport(\"GLSL.std.450\")
%9 = OpExtInst(%1, FMax, %7, %8)::%6";
        let module = assemble(source).unwrap();
        assert_eq!(module.instructions[1].operands[1], Operand::Literal(40));
    }

    #[test]
    fn round_trips_through_text() {
        let source = "\
; Version: 0x00010300
; Generator: 0x00000008
OpCapability(Shader)
%1 = OpExtInstImport(\"GLSL.std.450\")
OpMemoryModel(Logical, GLSL450)
%2 = OpTypeFloat(0x00000020)
%3 = OpTypeFunction(%2, %2)
%4 = OpFunction(0x00000000, %3)::%2
%5 = OpFunctionParameter()::%2
%6 = OpLabel()
%7 = OpExtInst(%1, Sqrt, %5)::%2
OpReturnValue(%7)
OpFunctionEnd()";
        let module = assemble(source).unwrap();
        assert_eq!(module.header.version, 0x0001_0300);
        let text = disassemble(&module);
        let again = assemble(&text).unwrap();
        assert_eq!(module, again);
    }
}
