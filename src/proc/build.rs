//! Single-pass construction of the structured module.

use super::Error;
use crate::{
    binary,
    grammar::{self, Class, OperandKind},
    BasicBlock, FunctionDef, GlobalVariable, Id, Instruction, Module, Operand, RawModule,
    SourceInfo, SourceLocation, Type, Word,
};
use num_traits::FromPrimitive;

fn operand_at(inst: &Instruction, index: usize) -> Result<&Operand, Error> {
    inst.operands.get(index).ok_or_else(|| {
        Error::InvariantViolation(format!("{:?} is missing operand {}", inst.op, index))
    })
}

fn id_at(inst: &Instruction, index: usize) -> Result<Id, Error> {
    operand_at(inst, index)?.as_id().ok_or_else(|| {
        Error::InvariantViolation(format!("{:?} operand {} is not an id", inst.op, index))
    })
}

fn literal_at(inst: &Instruction, index: usize) -> Result<Word, Error> {
    operand_at(inst, index)?.as_literal().ok_or_else(|| {
        Error::InvariantViolation(format!("{:?} operand {} is not a literal", inst.op, index))
    })
}

fn string_at<'a>(inst: &'a Instruction, index: usize) -> Result<&'a str, Error> {
    operand_at(inst, index)?.as_str().ok_or_else(|| {
        Error::InvariantViolation(format!("{:?} operand {} is not a string", inst.op, index))
    })
}

fn enum_at<E: FromPrimitive>(
    inst: &Instruction,
    index: usize,
    kind: OperandKind,
) -> Result<E, Error> {
    let value = literal_at(inst, index)?;
    E::from_u32(value)
        .ok_or_else(|| Error::Codec(binary::Error::UnknownOperandKind { kind, value }))
}

fn result_of(inst: &Instruction) -> Result<Id, Error> {
    inst.result_id
        .ok_or_else(|| Error::InvariantViolation(format!("{:?} carries no result id", inst.op)))
}

fn type_term(inst: &Instruction) -> Result<Type, Error> {
    use spirv::Op;
    Ok(match inst.op {
        Op::TypeVoid => Type::Void,
        Op::TypeBool => Type::Bool,
        Op::TypeInt => Type::Int {
            width: literal_at(inst, 0)?,
            signed: literal_at(inst, 1)? == 1,
        },
        Op::TypeFloat => Type::Float {
            width: literal_at(inst, 0)?,
        },
        Op::TypeVector => Type::Vector {
            element: id_at(inst, 0)?,
            count: literal_at(inst, 1)?,
        },
        Op::TypeMatrix => Type::Matrix {
            column: id_at(inst, 0)?,
            count: literal_at(inst, 1)?,
        },
        Op::TypeArray => Type::Array {
            element: id_at(inst, 0)?,
            length: Some(id_at(inst, 1)?),
        },
        Op::TypeRuntimeArray => Type::Array {
            element: id_at(inst, 0)?,
            length: None,
        },
        Op::TypeStruct => Type::Struct {
            members: inst.operand_ids().collect(),
        },
        Op::TypeOpaque => Type::Opaque {
            name: string_at(inst, 0)?.to_string(),
        },
        Op::TypePointer => Type::Pointer {
            class: enum_at(inst, 0, OperandKind::StorageClass)?,
            pointee: id_at(inst, 1)?,
        },
        Op::TypeImage => Type::Image {
            sampled_type: id_at(inst, 0)?,
            dim: enum_at(inst, 1, OperandKind::Dim)?,
            depth: literal_at(inst, 2)?,
            arrayed: literal_at(inst, 3)?,
            multisampled: literal_at(inst, 4)?,
            sampled: literal_at(inst, 5)?,
            format: enum_at(inst, 6, OperandKind::ImageFormat)?,
            access: match inst.operands.get(7) {
                Some(_) => Some(enum_at(inst, 7, OperandKind::AccessQualifier)?),
                None => None,
            },
        },
        Op::TypeSampler => Type::Sampler,
        Op::TypeSampledImage => Type::SampledImage {
            image: id_at(inst, 0)?,
        },
        Op::TypeFunction => Type::Function {
            ret: id_at(inst, 0)?,
            params: inst.operand_ids().skip(1).collect(),
        },
        _ => {
            return Err(Error::InvariantViolation(format!(
                "{:?} is not a type declaration",
                inst.op
            )))
        }
    })
}

fn register_loaded_type(module: &mut Module, id: Id, ty: Type, inst: &Instruction) {
    module.type_lookup.entry(ty.clone()).or_insert(id);
    module.types.insert(id, ty);
    module.globals.insert(id, inst.clone());
}

fn build_source(module: &mut Module, inst: &Instruction) {
    let mut source = SourceInfo::default();
    source.language = inst
        .operands
        .get(0)
        .and_then(Operand::as_literal)
        .and_then(spirv::SourceLanguage::from_u32);
    source.version = inst.operands.get(1).and_then(Operand::as_literal).unwrap_or(0);
    source.file = inst.operands.get(2).and_then(Operand::as_id);
    source.text = inst
        .operands
        .get(3)
        .and_then(Operand::as_str)
        .map(str::to_string);
    module.debug_info_mut().source = Some(source);
}

/// Builds the structured module from a flat instruction stream.
///
/// Dispatch follows the grammar class of each opcode; a cursor tracks the
/// currently open function and block for body instructions. Module-level
/// extension instructions are tolerated and recorded, never fatal.
pub fn build(raw: &RawModule) -> Result<Module, Error> {
    use spirv::Op;

    let mut module = Module::new();
    module.meta = raw.header;
    let mut current_function: Option<(Id, FunctionDef)> = None;
    let mut current_block: Option<BasicBlock> = None;

    for inst in &raw.instructions {
        module.track_result(inst);
        match inst.op {
            Op::Function => {
                if current_function.is_some() {
                    return Err(Error::InvariantViolation(
                        "OpFunction inside an open function".to_string(),
                    ));
                }
                let id = result_of(inst)?;
                let control =
                    spirv::FunctionControl::from_bits_truncate(literal_at(inst, 0)?);
                current_function = Some((
                    id,
                    FunctionDef {
                        type_id: id_at(inst, 1)?,
                        control,
                        parameters: Vec::new(),
                        blocks: Vec::new(),
                    },
                ));
            }
            Op::FunctionParameter => {
                let (_, def) = current_function.as_mut().ok_or_else(|| {
                    Error::InvariantViolation("OpFunctionParameter outside a function".to_string())
                })?;
                if current_block.is_some() {
                    return Err(Error::InvariantViolation(
                        "OpFunctionParameter after the first block".to_string(),
                    ));
                }
                def.parameters.push(result_of(inst)?);
            }
            Op::Label => {
                let (_, def) = current_function.as_mut().ok_or_else(|| {
                    Error::InvariantViolation("OpLabel outside a function".to_string())
                })?;
                if let Some(block) = current_block.take() {
                    def.blocks.push(block);
                }
                current_block = Some(BasicBlock::new(result_of(inst)?));
            }
            Op::FunctionEnd => {
                let (id, mut def) = current_function.take().ok_or_else(|| {
                    Error::InvariantViolation("OpFunctionEnd outside a function".to_string())
                })?;
                if let Some(block) = current_block.take() {
                    def.blocks.push(block);
                }
                module.function_defs.insert(id, def);
            }
            _ if current_block.is_some() => {
                if let Some(block) = current_block.as_mut() {
                    block.instructions.push(inst.clone());
                }
            }
            _ => build_module_level(&mut module, inst, current_function.is_some())?,
        }
    }
    if current_function.is_some() {
        return Err(Error::InvariantViolation(
            "stream ends inside an open function".to_string(),
        ));
    }
    Ok(module)
}

fn build_module_level(
    module: &mut Module,
    inst: &Instruction,
    in_function: bool,
) -> Result<(), Error> {
    use spirv::Op;

    let class = grammar::lookup(inst.op).map_or(Class::Other, |def| def.class);
    if in_function && class != Class::Debug {
        return Err(Error::InvariantViolation(format!(
            "{:?} between OpFunction and the first block",
            inst.op
        )));
    }
    match class {
        Class::ModeSetting => match inst.op {
            Op::Capability => {
                let capability: spirv::Capability =
                    enum_at(inst, 0, OperandKind::Capability)?;
                module.capabilities.insert(capability);
            }
            Op::MemoryModel => {
                module.addressing_model = enum_at(inst, 0, OperandKind::AddressingModel)?;
                module.memory_model = enum_at(inst, 1, OperandKind::MemoryModel)?;
            }
            Op::EntryPoint => {
                let function_id = id_at(inst, 1)?;
                let execution_model = enum_at(inst, 0, OperandKind::ExecutionModel)?;
                let name = string_at(inst, 2)?.to_string();
                let interface = inst.operand_ids().skip(1).collect();
                module.entry_points.insert(
                    function_id,
                    crate::EntryPoint {
                        name,
                        function_id,
                        execution_model,
                        execution_modes: Vec::new(),
                        interface,
                    },
                );
            }
            Op::ExecutionMode => {
                let target = id_at(inst, 0)?;
                let entry = module.entry_points.get_mut(&target).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "execution mode names unknown entry point %{}",
                        target
                    ))
                })?;
                entry.execution_modes.push(inst.clone());
            }
            _ => module.unmodeled.push(inst.clone()),
        },
        Class::Extension => match inst.op {
            Op::Extension => {
                let name = string_at(inst, 0)?;
                if !module.extensions.iter().any(|e| e == name) {
                    module.extensions.push(name.to_string());
                }
            }
            Op::ExtInstImport => {
                let id = result_of(inst)?;
                module
                    .ext_inst_imports
                    .insert(id, string_at(inst, 0)?.to_string());
            }
            _ => module.unmodeled.push(inst.clone()),
        },
        Class::Debug => match inst.op {
            Op::Source => build_source(module, inst),
            Op::SourceContinued => {
                let text = string_at(inst, 0)?;
                match module.debug.as_mut().and_then(|d| d.source.as_mut()) {
                    Some(source) => {
                        source.text.get_or_insert_with(String::new).push_str(text)
                    }
                    None => {
                        log::warn!("OpSourceContinued without a preceding OpSource");
                        module.unmodeled.push(inst.clone());
                    }
                }
            }
            Op::SourceExtension => {
                let text = string_at(inst, 0)?;
                match module.debug.as_mut().and_then(|d| d.source.as_mut()) {
                    Some(source) => source.extensions.push(text.to_string()),
                    None => {
                        log::warn!("OpSourceExtension without a preceding OpSource");
                        module.unmodeled.push(inst.clone());
                    }
                }
            }
            Op::String => {
                let id = result_of(inst)?;
                module
                    .debug_info_mut()
                    .files
                    .insert(id, string_at(inst, 0)?.to_string());
            }
            Op::Name => {
                let target = id_at(inst, 0)?;
                module
                    .debug_info_mut()
                    .names
                    .insert(target, string_at(inst, 1)?.to_string());
            }
            Op::MemberName => {
                let target = id_at(inst, 0)?;
                let member = literal_at(inst, 1)?;
                module
                    .debug_info_mut()
                    .member_names
                    .entry(target)
                    .or_default()
                    .insert(member, string_at(inst, 2)?.to_string());
            }
            Op::Line => {
                let location = SourceLocation {
                    file: id_at(inst, 0)?,
                    line: literal_at(inst, 1)?,
                    column: literal_at(inst, 2)?,
                };
                module.debug_info_mut().lines.push(location);
            }
            Op::NoLine => {}
            Op::ModuleProcessed => {
                let text = string_at(inst, 0)?.to_string();
                module.debug_info_mut().processes.push(text);
            }
            _ => {
                log::debug!("unmodeled debug instruction {:?}", inst.op);
                module.unmodeled.push(inst.clone());
            }
        },
        Class::Annotation => match inst.op {
            Op::Decorate => {
                let target = id_at(inst, 0)?;
                let decoration = enum_at(inst, 1, OperandKind::Decoration)?;
                module.decorate(target, decoration, inst.operands[2..].to_vec());
            }
            Op::MemberDecorate => {
                let target = id_at(inst, 0)?;
                let member = literal_at(inst, 1)?;
                let decoration = enum_at(inst, 2, OperandKind::Decoration)?;
                module.decorate_member(target, member, decoration, inst.operands[3..].to_vec());
            }
            _ => module.unmodeled.push(inst.clone()),
        },
        Class::TypeDeclaration => match inst.op {
            Op::TypeForwardPointer => {
                let pointer = id_at(inst, 0)?;
                let class = enum_at(inst, 1, OperandKind::StorageClass)?;
                module.types.insert(pointer, Type::Pointer { class, pointee: 0 });
                module.forward_pointers.insert(pointer);
            }
            _ => {
                let id = result_of(inst)?;
                let ty = type_term(inst)?;
                register_loaded_type(module, id, ty, inst);
            }
        },
        Class::ConstantCreation => {
            let id = result_of(inst)?;
            module.constants.insert(id, inst.clone());
            module.globals.insert(id, inst.clone());
        }
        Class::Memory => match inst.op {
            Op::Variable => {
                let id = result_of(inst)?;
                let storage_class: spirv::StorageClass =
                    enum_at(inst, 0, OperandKind::StorageClass)?;
                if storage_class == spirv::StorageClass::Function {
                    return Err(Error::InvariantViolation(format!(
                        "variable %{} uses Function storage at module scope",
                        id
                    )));
                }
                let type_id = inst.result_type.ok_or_else(|| {
                    Error::InvariantViolation(format!("variable %{} carries no type", id))
                })?;
                let pointee_type = match module.types.get(&type_id) {
                    Some(&Type::Pointer { pointee, .. }) => pointee,
                    _ => {
                        return Err(Error::InvariantViolation(format!(
                            "variable %{} type %{} is not a pointer",
                            id, type_id
                        )))
                    }
                };
                let decorations = module
                    .decorations
                    .get(&id)
                    .map(|map| map.iter().map(|(&d, a)| (d, a.clone())).collect())
                    .unwrap_or_default();
                module.globals.insert(id, inst.clone());
                module.global_vars.insert(
                    id,
                    GlobalVariable {
                        id,
                        type_id,
                        pointee_type,
                        storage_class,
                        initializer: inst.operands.get(1).and_then(Operand::as_id),
                        decorations,
                    },
                );
            }
            _ => {
                return Err(Error::InvariantViolation(format!(
                    "{:?} outside of a function body",
                    inst.op
                )))
            }
        },
        Class::ExtensionInstruction => {
            log::warn!("module-level extension instruction recorded but not modeled");
            module.unmodeled.push(inst.clone());
        }
        Class::Function | Class::ControlFlow => {
            return Err(Error::InvariantViolation(format!(
                "{:?} outside of a function body",
                inst.op
            )))
        }
        Class::Other => match inst.op {
            Op::Nop => {}
            _ if inst.result_id.is_some() => {
                let id = result_of(inst)?;
                module.globals.insert(id, inst.clone());
            }
            _ => {
                log::debug!("unmodeled module-level instruction {:?}", inst.op);
                module.unmodeled.push(inst.clone());
            }
        },
    }
    Ok(())
}
