//! Lowering the structured module back to a flat stream.
//!
//! Emission follows the canonical section order: capabilities, extensions,
//! extended-set imports, memory model, entry points, execution modes, debug
//! source, debug strings, debug names, annotations, module-scope
//! declarations in ascending id order, then functions. `bound` is
//! regenerated from the id watermark.

use super::Error;
use crate::{
    grammar::OperandKind, DecorationMap, Id, IdSet, Instruction, Module, Operand, RawModule, Type,
    Word,
};

/// Canonical declaration instruction for a type term.
pub(crate) fn type_declaration(id: Id, ty: &Type) -> Instruction {
    use spirv::Op;
    let mut inst;
    match *ty {
        Type::Void => inst = Instruction::new(Op::TypeVoid),
        Type::Bool => inst = Instruction::new(Op::TypeBool),
        Type::Int { width, signed } => {
            inst = Instruction::new(Op::TypeInt);
            inst.add_literal(width);
            inst.add_literal(signed as Word);
        }
        Type::Float { width } => {
            inst = Instruction::new(Op::TypeFloat);
            inst.add_literal(width);
        }
        Type::Vector { element, count } => {
            inst = Instruction::new(Op::TypeVector);
            inst.add_id(element);
            inst.add_literal(count);
        }
        Type::Matrix { column, count } => {
            inst = Instruction::new(Op::TypeMatrix);
            inst.add_id(column);
            inst.add_literal(count);
        }
        Type::Array { element, length } => match length {
            Some(length) => {
                inst = Instruction::new(Op::TypeArray);
                inst.add_id(element);
                inst.add_id(length);
            }
            None => {
                inst = Instruction::new(Op::TypeRuntimeArray);
                inst.add_id(element);
            }
        },
        Type::Struct { ref members } => {
            inst = Instruction::new(Op::TypeStruct);
            for &member in members {
                inst.add_id(member);
            }
        }
        Type::Pointer { class, pointee } => {
            inst = Instruction::new(Op::TypePointer);
            inst.add_enum(OperandKind::StorageClass, class as Word);
            inst.add_id(pointee);
        }
        Type::Image {
            sampled_type,
            dim,
            depth,
            arrayed,
            multisampled,
            sampled,
            format,
            access,
        } => {
            inst = Instruction::new(Op::TypeImage);
            inst.add_id(sampled_type);
            inst.add_enum(OperandKind::Dim, dim as Word);
            inst.add_literal(depth);
            inst.add_literal(arrayed);
            inst.add_literal(multisampled);
            inst.add_literal(sampled);
            inst.add_enum(OperandKind::ImageFormat, format as Word);
            if let Some(access) = access {
                inst.add_enum(OperandKind::AccessQualifier, access as Word);
            }
        }
        Type::Sampler => inst = Instruction::new(Op::TypeSampler),
        Type::SampledImage { image } => {
            inst = Instruction::new(Op::TypeSampledImage);
            inst.add_id(image);
        }
        Type::Opaque { ref name } => {
            inst = Instruction::new(Op::TypeOpaque);
            inst.add_string(name);
        }
        Type::Function { ret, ref params } => {
            inst = Instruction::new(Op::TypeFunction);
            inst.add_id(ret);
            for &param in params {
                inst.add_id(param);
            }
        }
    }
    inst.set_result(id);
    inst
}

fn decoration_instructions(
    target: Id,
    member: Option<Word>,
    map: &DecorationMap,
    sink: &mut Vec<Instruction>,
) {
    let mut kinds: Vec<_> = map.keys().copied().collect();
    kinds.sort_by_key(|&d| d as Word);
    for decoration in kinds {
        let mut inst = Instruction::new(match member {
            Some(_) => spirv::Op::MemberDecorate,
            None => spirv::Op::Decorate,
        });
        inst.add_id(target);
        if let Some(member) = member {
            inst.add_literal(member);
        }
        inst.add_enum(OperandKind::Decoration, decoration as Word);
        for operand in &map[&decoration] {
            inst.add_operand(operand.clone());
        }
        sink.push(inst);
    }
}

fn emit_debug(module: &Module, sink: &mut Vec<Instruction>) {
    let debug = match module.debug {
        Some(ref debug) => debug,
        None => return,
    };
    if let Some(ref source) = debug.source {
        let mut inst = Instruction::new(spirv::Op::Source);
        inst.add_enum(
            OperandKind::SourceLanguage,
            source.language.map_or(0, |l| l as Word),
        );
        inst.add_literal(source.version);
        if let Some(file) = source.file {
            inst.add_id(file);
        }
        if let Some(ref text) = source.text {
            inst.add_operand(Operand::String(text.clone()));
        }
        sink.push(inst);
        for extension in &source.extensions {
            let mut inst = Instruction::new(spirv::Op::SourceExtension);
            inst.add_string(extension);
            sink.push(inst);
        }
    }
    for (&id, file) in &debug.files {
        let mut inst = Instruction::new(spirv::Op::String);
        inst.set_result(id);
        inst.add_string(file);
        sink.push(inst);
    }
    for (&target, name) in &debug.names {
        let mut inst = Instruction::new(spirv::Op::Name);
        inst.add_id(target);
        inst.add_string(name);
        sink.push(inst);
    }
    for (&target, members) in &debug.member_names {
        for (&member, name) in members {
            let mut inst = Instruction::new(spirv::Op::MemberName);
            inst.add_id(target);
            inst.add_literal(member);
            inst.add_string(name);
            sink.push(inst);
        }
    }
    for location in &debug.lines {
        let mut inst = Instruction::new(spirv::Op::Line);
        inst.add_id(location.file);
        inst.add_literal(location.line);
        inst.add_literal(location.column);
        sink.push(inst);
    }
    for process in &debug.processes {
        let mut inst = Instruction::new(spirv::Op::ModuleProcessed);
        inst.add_string(process);
        sink.push(inst);
    }
}

fn function_signature(module: &Module, type_id: Id) -> Result<(Id, &[Id]), Error> {
    match module.types.get(&type_id) {
        Some(&Type::Function { ret, ref params }) => Ok((ret, params)),
        _ => Err(Error::InvariantViolation(format!(
            "%{} is not a function type",
            type_id
        ))),
    }
}

/// Lowers the module to its flat form.
pub fn emit(module: &Module) -> Result<RawModule, Error> {
    let mut instructions = Vec::new();

    let mut capabilities: Vec<Word> =
        module.capabilities.iter().map(|&c| c as Word).collect();
    capabilities.sort_unstable();
    for capability in capabilities {
        let mut inst = Instruction::new(spirv::Op::Capability);
        inst.add_enum(OperandKind::Capability, capability);
        instructions.push(inst);
    }

    for extension in &module.extensions {
        let mut inst = Instruction::new(spirv::Op::Extension);
        inst.add_string(extension);
        instructions.push(inst);
    }

    for (&id, name) in &module.ext_inst_imports {
        let mut inst = Instruction::new(spirv::Op::ExtInstImport);
        inst.set_result(id);
        inst.add_string(name);
        instructions.push(inst);
    }

    let mut memory_model = Instruction::new(spirv::Op::MemoryModel);
    memory_model.add_enum(OperandKind::AddressingModel, module.addressing_model as Word);
    memory_model.add_enum(OperandKind::MemoryModel, module.memory_model as Word);
    instructions.push(memory_model);

    for entry in module.entry_points.values() {
        let mut inst = Instruction::new(spirv::Op::EntryPoint);
        inst.add_enum(OperandKind::ExecutionModel, entry.execution_model as Word);
        inst.add_id(entry.function_id);
        inst.add_string(&entry.name);
        for &interface in &entry.interface {
            inst.add_id(interface);
        }
        instructions.push(inst);
    }
    for entry in module.entry_points.values() {
        instructions.extend(entry.execution_modes.iter().cloned());
    }

    emit_debug(module, &mut instructions);

    for (&target, map) in &module.decorations {
        decoration_instructions(target, None, map, &mut instructions);
    }
    for (&target, members) in &module.member_decorations {
        for (&member, map) in members {
            decoration_instructions(target, Some(member), map, &mut instructions);
        }
    }

    // Module-scope declarations in ascending id order, with forward pointer
    // declarations surfacing before their first use.
    let mut forward_pending: IdSet = module.forward_pointers.clone();
    for (&id, inst) in &module.globals {
        let mut wanted: Vec<Id> = inst
            .operand_ids()
            .filter(|referenced| forward_pending.contains(referenced))
            .collect();
        if forward_pending.contains(&id) {
            wanted.push(id);
        }
        for pointer in wanted {
            if !forward_pending.remove(&pointer) {
                continue;
            }
            let class = match module.types.get(&pointer) {
                Some(&Type::Pointer { class, .. }) => class,
                _ => {
                    return Err(Error::InvariantViolation(format!(
                        "forward pointer %{} has no pointer type",
                        pointer
                    )))
                }
            };
            let mut forward = Instruction::new(spirv::Op::TypeForwardPointer);
            forward.add_id(pointer);
            forward.add_enum(OperandKind::StorageClass, class as Word);
            instructions.push(forward);
        }
        instructions.push(inst.clone());
    }

    for (&id, def) in &module.function_defs {
        let (ret, params) = function_signature(module, def.type_id)?;
        if params.len() != def.parameters.len() {
            return Err(Error::InvariantViolation(format!(
                "function %{} declares {} parameters for a type with {}",
                id,
                def.parameters.len(),
                params.len()
            )));
        }
        let mut inst = Instruction::new(spirv::Op::Function);
        inst.set_type(ret);
        inst.set_result(id);
        inst.add_enum(OperandKind::FunctionControl, def.control.bits());
        inst.add_id(def.type_id);
        instructions.push(inst);

        for (&param, &param_type) in def.parameters.iter().zip(params) {
            let mut inst = Instruction::new(spirv::Op::FunctionParameter);
            inst.set_type(param_type);
            inst.set_result(param);
            instructions.push(inst);
        }
        for block in &def.blocks {
            let mut label = Instruction::new(spirv::Op::Label);
            label.set_result(block.id);
            instructions.push(label);
            instructions.extend(block.instructions.iter().cloned());
        }
        instructions.push(Instruction::new(spirv::Op::FunctionEnd));
    }

    let mut header = module.meta;
    header.bound = module.max_id + 1;
    Ok(RawModule {
        header,
        instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_section_order() {
        let mut module = Module::new();
        module.capabilities.insert(spirv::Capability::Shader);
        module.memory_model = spirv::MemoryModel::GLSL450;
        let float = module.type_id(Type::Float { width: 32 });
        let var = module.declare_global_variable(float, spirv::StorageClass::Uniform, None);
        module.decorate(var, spirv::Decoration::Binding, vec![Operand::Literal(1)]);
        module.decorate(
            var,
            spirv::Decoration::DescriptorSet,
            vec![Operand::Literal(0)],
        );

        let raw = emit(&module).unwrap();
        let ops: Vec<spirv::Op> = raw.instructions.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                spirv::Op::Capability,
                spirv::Op::MemoryModel,
                spirv::Op::Decorate,
                spirv::Op::Decorate,
                spirv::Op::TypeFloat,
                spirv::Op::TypePointer,
                spirv::Op::Variable,
            ]
        );
        // Decorations sort by decoration value: Binding (33) then
        // DescriptorSet (34).
        assert_eq!(
            raw.instructions[2].operands[1],
            Operand::Enum(OperandKind::Decoration, 33)
        );
        assert_eq!(raw.header.bound, module.max_id + 1);
    }

    #[test]
    fn type_dedup_is_structural() {
        let mut module = Module::new();
        let a = module.type_id(Type::Float { width: 32 });
        let b = module.type_id(Type::Float { width: 32 });
        let c = module.type_id(Type::Float { width: 64 });
        assert_eq!(a, b);
        assert_ne!(a, c);
        let vec_a = module.type_id(Type::Vector { element: a, count: 4 });
        let vec_b = module.type_id(Type::Vector { element: b, count: 4 });
        assert_eq!(vec_a, vec_b);
    }

    #[test]
    fn function_signature_mismatch_fails() {
        let mut module = Module::new();
        let float = module.type_id(Type::Float { width: 32 });
        let fn_type = module.type_id(Type::Function {
            ret: float,
            params: vec![float],
        });
        let id = module.allocate_id();
        module.declare_function(
            id,
            crate::FunctionDef {
                type_id: fn_type,
                control: spirv::FunctionControl::empty(),
                parameters: Vec::new(),
                blocks: Vec::new(),
            },
        );
        match emit(&module) {
            Err(Error::InvariantViolation(_)) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
