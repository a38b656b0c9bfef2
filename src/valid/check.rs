//! Interior invariant checks over the structured module.

use super::Error;
use crate::{grammar, FastHashSet, Id, Module, Type};

fn fail(detail: String) -> Result<(), Error> {
    Err(Error::InvariantViolation(detail))
}

/// Checks the structural invariants the rest of the crate relies on:
/// the id watermark, operand definedness, variable pointer types, block
/// shape, and member-decoration targets.
pub fn check(module: &Module) -> Result<(), Error> {
    let highest = module.results.keys().next_back().copied().unwrap_or(0);
    if module.max_id < highest {
        return fail(format!(
            "id watermark {} is below the highest result id {}",
            module.max_id, highest
        ));
    }

    let mut defined: FastHashSet<Id> = module.results.keys().copied().collect();
    defined.extend(module.types.keys());
    for def in module.function_defs.values() {
        defined.extend(def.parameters.iter().copied());
        defined.extend(def.blocks.iter().map(|b| b.id));
    }

    let check_uses = |inst: &crate::Instruction| -> Result<(), Error> {
        for id in inst.operand_ids().chain(inst.result_type) {
            if id == 0 {
                return fail(format!("{:?} references the reserved id 0", inst.op));
            }
            if !defined.contains(&id) {
                return fail(format!("{:?} references undefined id %{}", inst.op, id));
            }
        }
        Ok(())
    };

    for inst in module.globals.values() {
        check_uses(inst)?;
    }

    for (&id, var) in &module.global_vars {
        match module.types.get(&var.type_id) {
            Some(&Type::Pointer { pointee, .. }) => {
                if pointee != var.pointee_type {
                    return fail(format!(
                        "variable %{} records pointee %{} but its type points to %{}",
                        id, var.pointee_type, pointee
                    ));
                }
            }
            _ => {
                return fail(format!(
                    "variable %{} has non-pointer type %{}",
                    id, var.type_id
                ))
            }
        }
    }

    for (&id, def) in &module.function_defs {
        if def.blocks.is_empty() {
            return fail(format!("function %{} has no blocks", id));
        }
        let mut labels = FastHashSet::default();
        for block in &def.blocks {
            if !labels.insert(block.id) {
                return fail(format!(
                    "function %{} repeats block label %{}",
                    id, block.id
                ));
            }
        }
        for block in &def.blocks {
            let terminator = match block.terminator() {
                Some(t) => t,
                None => return fail(format!("block %{} is empty", block.id)),
            };
            if !grammar::is_terminator(terminator.op) {
                return fail(format!(
                    "block %{} ends in {:?} instead of a terminator",
                    block.id, terminator.op
                ));
            }
            for inst in &block.instructions[..block.instructions.len() - 1] {
                if grammar::is_terminator(inst.op) || inst.op == spirv::Op::Label {
                    return fail(format!(
                        "{:?} in the middle of block %{}",
                        inst.op, block.id
                    ));
                }
                check_uses(inst)?;
            }
        }
    }

    for &target in module.member_decorations.keys() {
        match module.types.get(&target) {
            Some(ty) if ty.is_struct() => {}
            _ => {
                return fail(format!(
                    "member decoration targets non-struct id %{}",
                    target
                ))
            }
        }
    }

    for (&id, entry) in &module.entry_points {
        if !module.function_defs.contains_key(&entry.function_id) {
            return fail(format!(
                "entry point %{} names undefined function %{}",
                id, entry.function_id
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicBlock, FunctionDef, Instruction};

    fn module_with_function() -> (Module, Id) {
        let mut module = Module::new();
        let void = module.type_id(Type::Void);
        let fn_type = module.type_id(Type::Function {
            ret: void,
            params: Vec::new(),
        });
        let id = module.allocate_id();
        let label = module.allocate_id();
        let mut block = BasicBlock::new(label);
        block.instructions.push(Instruction::new(spirv::Op::Return));
        module.declare_function(
            id,
            FunctionDef {
                type_id: fn_type,
                control: spirv::FunctionControl::empty(),
                parameters: Vec::new(),
                blocks: vec![block],
            },
        );
        (module, id)
    }

    #[test]
    fn well_formed_module_passes() {
        let (module, _) = module_with_function();
        assert!(check(&module).is_ok());
    }

    #[test]
    fn missing_terminator_is_flagged() {
        let (mut module, id) = module_with_function();
        module
            .function_defs
            .get_mut(&id)
            .unwrap()
            .blocks[0]
            .instructions
            .clear();
        assert!(matches!(check(&module), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn non_pointer_variable_is_flagged() {
        let (mut module, _) = module_with_function();
        let float = module.type_id(Type::Float { width: 32 });
        let var = module.declare_global_variable(float, spirv::StorageClass::Private, None);
        module.global_vars.get_mut(&var).unwrap().type_id = float;
        assert!(matches!(check(&module), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn member_decorations_require_structs() {
        let (mut module, _) = module_with_function();
        let float = module.type_id(Type::Float { width: 32 });
        module.decorate_member(float, 0, spirv::Decoration::Offset, vec![]);
        assert!(matches!(check(&module), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn undefined_operand_is_flagged() {
        let (mut module, _) = module_with_function();
        let mut rogue = Instruction::new(spirv::Op::Name);
        rogue.add_id(999);
        rogue.add_string("ghost");
        let id = module.allocate_id();
        rogue.set_result(id);
        module.globals.insert(id, rogue);
        assert!(matches!(check(&module), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn entry_point_must_name_a_function() {
        let (mut module, _) = module_with_function();
        module.declare_entry_point(777, "main", spirv::ExecutionModel::Fragment, vec![]);
        assert!(matches!(check(&module), Err(Error::InvariantViolation(_))));
    }
}
