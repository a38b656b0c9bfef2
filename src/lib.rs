//! SPIR-V compiler core.
//!
//! The central structure of the crate is [`Module`], a structured view of a
//! SPIR-V module: deduplicated types, constants, global variables, entry
//! points and function definitions, all keyed by SSA [`Id`].
//!
//! A module is built from a flat instruction stream ([`RawModule`]) decoded
//! by [`binary`], and lowers back to one through [`proc`]. Per-function
//! control flow is recovered by [`cfg`], which reduces an arbitrary branch
//! graph to a single control tree.
#![allow(clippy::new_without_default)]
#![deny(clippy::panic)]

pub mod binary;
pub mod cfg;
pub mod grammar;
pub mod proc;
pub mod text;
pub mod valid;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hash::BuildHasherDefault,
};

#[cfg(feature = "deserialize")]
use serde::Deserialize;
#[cfg(feature = "serialize")]
use serde::Serialize;
use thiserror::Error;

/// Hash map that is faster but not resilient to DoS attacks.
pub type FastHashMap<K, T> = HashMap<K, T, BuildHasherDefault<fxhash::FxHasher>>;
/// Hash set that is faster but not resilient to DoS attacks.
pub type FastHashSet<K> = HashSet<K, BuildHasherDefault<fxhash::FxHasher>>;

/// A single 32-bit unit of the binary encoding.
pub type Word = spirv::Word;

/// SSA identifier naming a value in the module.
///
/// Valid identifiers are non-zero; zero is reserved as an absent reference
/// inside placeholder type terms.
pub type Id = Word;

/// Map keyed by [`Id`], iterated in ascending id order.
pub type IdMap<T> = BTreeMap<Id, T>;
/// Set of [`Id`]s, iterated in ascending id order.
pub type IdSet = BTreeSet<Id>;

/// A decoded instruction operand.
///
/// The shape of an instruction's operand list is defined by the grammar for
/// its opcode. Enum operands keep the [`grammar::OperandKind`] they were
/// decoded through so the textual form can render them symbolically;
/// context-dependent literals are carried as raw words.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub enum Operand {
    /// Reference to another result id.
    Id(Id),
    /// A single literal word.
    Literal(Word),
    /// Null-terminated UTF-8 string, packed four bytes per word.
    String(String),
    /// A value of one of the SPIR-V enums.
    Enum(grammar::OperandKind, Word),
}

impl Operand {
    /// Number of words this operand occupies in the encoding.
    pub fn word_count(&self) -> u32 {
        match *self {
            Operand::String(ref s) => (s.len() as u32 / 4) + 1,
            _ => 1,
        }
    }

    pub fn as_id(&self) -> Option<Id> {
        match *self {
            Operand::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<Word> {
        match *self {
            Operand::Literal(w) | Operand::Enum(_, w) => Some(w),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Operand::String(ref s) => Some(s),
            _ => None,
        }
    }
}

/// An instruction: the atomic unit of the binary encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct Instruction {
    pub op: spirv::Op,
    pub result_type: Option<Id>,
    pub result_id: Option<Id>,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(op: spirv::Op) -> Self {
        Instruction {
            op,
            result_type: None,
            result_id: None,
            operands: Vec::new(),
        }
    }

    pub fn set_type(&mut self, id: Id) {
        self.result_type = Some(id);
    }

    pub fn set_result(&mut self, id: Id) {
        self.result_id = Some(id);
    }

    pub fn add_operand(&mut self, operand: Operand) {
        self.operands.push(operand);
    }

    pub fn add_id(&mut self, id: Id) {
        self.operands.push(Operand::Id(id));
    }

    pub fn add_literal(&mut self, word: Word) {
        self.operands.push(Operand::Literal(word));
    }

    pub fn add_string(&mut self, s: &str) {
        self.operands.push(Operand::String(s.to_string()));
    }

    pub fn add_enum(&mut self, kind: grammar::OperandKind, value: Word) {
        self.operands.push(Operand::Enum(kind, value));
    }

    /// Total encoded size, including the leading packed word.
    pub fn word_count(&self) -> u32 {
        1 + self.result_type.map_or(0, |_| 1)
            + self.result_id.map_or(0, |_| 1)
            + self.operands.iter().map(Operand::word_count).sum::<u32>()
    }

    /// Ids referenced by the operand list, in operand order.
    pub fn operand_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.operands.iter().filter_map(Operand::as_id)
    }
}

/// The five-word module header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct ModuleHeader {
    pub magic: Word,
    pub version: Word,
    pub generator: Word,
    pub bound: Word,
    pub schema: Word,
}

impl ModuleHeader {
    pub fn new(version: Word, generator: Word, bound: Word) -> Self {
        ModuleHeader {
            magic: spirv::MAGIC_NUMBER,
            version,
            generator,
            bound,
            schema: 0,
        }
    }

    /// Major and minor version encoded in the header.
    pub fn version_tuple(&self) -> (u8, u8) {
        (((self.version >> 16) & 0xff) as u8, ((self.version >> 8) & 0xff) as u8)
    }
}

/// A module as a flat instruction stream, the direct image of the binary.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct RawModule {
    pub header: ModuleHeader,
    pub instructions: Vec<Instruction>,
}

/// A SPIR-V type term.
///
/// Terms reference other types by id, never by ownership, so the type table
/// is cycle-tolerant: a forward-declared pointer holds a zero pointee until
/// the declaration arrives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub enum Type {
    Void,
    Bool,
    Int {
        width: Word,
        signed: bool,
    },
    Float {
        width: Word,
    },
    Vector {
        element: Id,
        count: Word,
    },
    Matrix {
        column: Id,
        count: Word,
    },
    /// Fixed-length when `length` names a constant, runtime-sized otherwise.
    Array {
        element: Id,
        length: Option<Id>,
    },
    Struct {
        members: Vec<Id>,
    },
    Pointer {
        class: spirv::StorageClass,
        pointee: Id,
    },
    Image {
        sampled_type: Id,
        dim: spirv::Dim,
        depth: Word,
        arrayed: Word,
        multisampled: Word,
        sampled: Word,
        format: spirv::ImageFormat,
        access: Option<spirv::AccessQualifier>,
    },
    Sampler,
    SampledImage {
        image: Id,
    },
    Opaque {
        name: String,
    },
    Function {
        ret: Id,
        params: Vec<Id>,
    },
}

impl Type {
    pub fn is_pointer(&self) -> bool {
        match *self {
            Type::Pointer { .. } => true,
            _ => false,
        }
    }

    pub fn is_struct(&self) -> bool {
        match *self {
            Type::Struct { .. } => true,
            _ => false,
        }
    }
}

/// Decoration arguments keyed by decoration kind.
pub type DecorationMap = FastHashMap<spirv::Decoration, Vec<Operand>>;

/// Function designated as a pipeline stage entry.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct EntryPoint {
    pub name: String,
    pub function_id: Id,
    pub execution_model: spirv::ExecutionModel,
    /// `OpExecutionMode` instructions naming this entry point, stream order.
    pub execution_modes: Vec<Instruction>,
    /// Interface variables visible to the stage.
    pub interface: Vec<Id>,
}

/// Variable defined at module level.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct GlobalVariable {
    pub id: Id,
    /// The pointer type of the variable itself.
    pub type_id: Id,
    /// What the pointer type points to.
    pub pointee_type: Id,
    pub storage_class: spirv::StorageClass,
    pub initializer: Option<Id>,
    /// Convenience copy of the decorations attached to `id`.
    pub decorations: Vec<(spirv::Decoration, Vec<Operand>)>,
}

/// A label-delimited run of instructions ending in a terminator.
///
/// The leading `OpLabel` is implied by `id` and not stored in the body.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct BasicBlock {
    pub id: Id,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(id: Id) -> Self {
        BasicBlock {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last()
    }
}

/// A function defined in the module.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct FunctionDef {
    /// The `OpTypeFunction` id of the signature.
    pub type_id: Id,
    pub control: spirv::FunctionControl,
    pub parameters: Vec<Id>,
    /// Blocks in declaration order; the first is the unique entry.
    pub blocks: Vec<BasicBlock>,
}

impl FunctionDef {
    pub fn block(&self, id: Id) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

/// `OpSource` and its trailing continuations and extensions.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct SourceInfo {
    pub language: Option<spirv::SourceLanguage>,
    pub version: Word,
    pub file: Option<Id>,
    pub text: Option<String>,
    pub extensions: Vec<String>,
}

/// A single `OpLine` location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct SourceLocation {
    pub file: Id,
    pub line: Word,
    pub column: Word,
}

/// Non-semantic debug information collected from the stream.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct DebugInfo {
    pub source: Option<SourceInfo>,
    /// `OpString` file names.
    pub files: IdMap<String>,
    /// `OpName` symbols.
    pub names: IdMap<String>,
    /// `OpMemberName` symbols, by struct id then member index.
    pub member_names: IdMap<BTreeMap<Word, String>>,
    /// Module-level `OpLine` locations.
    pub lines: Vec<SourceLocation>,
    /// `OpModuleProcessed` notes.
    pub processes: Vec<String>,
}

impl DebugInfo {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.files.is_empty()
            && self.names.is_empty()
            && self.member_names.is_empty()
            && self.lines.is_empty()
            && self.processes.is_empty()
    }
}

/// Structured SPIR-V module.
///
/// Every projection is keyed by [`Id`]; `results` shortcuts from any result
/// id to its defining instruction. Construction is monotonic: the front end
/// and the flat-module builder only ever add, and lowering back to a
/// [`RawModule`] regenerates the `bound` from the id watermark.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub struct Module {
    /// Codec header fields, kept for faithful re-emission.
    pub meta: ModuleHeader,
    pub capabilities: FastHashSet<spirv::Capability>,
    pub extensions: Vec<String>,
    /// Imported extended instruction sets, id to set name.
    pub ext_inst_imports: IdMap<String>,
    pub addressing_model: spirv::AddressingModel,
    pub memory_model: spirv::MemoryModel,
    pub entry_points: IdMap<EntryPoint>,
    pub decorations: IdMap<DecorationMap>,
    /// Struct member decorations, by struct id then member index.
    pub member_decorations: IdMap<BTreeMap<Word, DecorationMap>>,
    pub types: IdMap<Type>,
    /// Constant-creation instructions by result id.
    pub constants: IdMap<Instruction>,
    /// All module-scope declarations (types, constants, global variables)
    /// in the id order required for emission.
    pub globals: IdMap<Instruction>,
    pub global_vars: IdMap<GlobalVariable>,
    pub function_defs: IdMap<FunctionDef>,
    /// Defining instruction of every result id, first sight wins.
    pub results: IdMap<Instruction>,
    pub debug: Option<DebugInfo>,
    /// Pointer ids declared ahead of their `OpTypePointer` to close
    /// pointer/struct cycles.
    pub forward_pointers: IdSet,
    /// Module-level instructions the builder does not model further.
    pub unmodeled: Vec<Instruction>,
    pub max_id: Id,
    #[cfg_attr(any(feature = "serialize", feature = "deserialize"), serde(skip))]
    type_lookup: FastHashMap<Type, Id>,
}

impl Module {
    pub fn new() -> Self {
        Module {
            meta: ModuleHeader::new(0x0001_0000, 0, 1),
            capabilities: FastHashSet::default(),
            extensions: Vec::new(),
            ext_inst_imports: IdMap::new(),
            addressing_model: spirv::AddressingModel::Logical,
            memory_model: spirv::MemoryModel::Simple,
            entry_points: IdMap::new(),
            decorations: IdMap::new(),
            member_decorations: IdMap::new(),
            types: IdMap::new(),
            constants: IdMap::new(),
            globals: IdMap::new(),
            global_vars: IdMap::new(),
            function_defs: IdMap::new(),
            results: IdMap::new(),
            debug: None,
            forward_pointers: IdSet::new(),
            unmodeled: Vec::new(),
            max_id: 0,
            type_lookup: FastHashMap::default(),
        }
    }

    /// Allocates a fresh id above every id seen so far.
    pub fn allocate_id(&mut self) -> Id {
        self.max_id += 1;
        self.max_id
    }

    /// Records `inst` as the definition of its result id, first sight wins.
    pub fn track_result(&mut self, inst: &Instruction) {
        if let Some(id) = inst.result_id {
            self.results.entry(id).or_insert_with(|| inst.clone());
            if id > self.max_id {
                self.max_id = id;
            }
        }
    }

    /// Id of `ty`, materializing a declaration if no structurally equal type
    /// exists yet.
    pub fn type_id(&mut self, ty: Type) -> Id {
        if let Some(&id) = self.type_lookup.get(&ty) {
            return id;
        }
        let id = self.allocate_id();
        self.register_type(id, ty);
        id
    }

    /// Binds `id` to `ty`, preserving an existing id assignment from a
    /// loaded module.
    pub fn register_type(&mut self, id: Id, ty: Type) {
        let inst = proc::type_declaration(id, &ty);
        self.track_result(&inst);
        self.globals.insert(id, inst);
        self.type_lookup.entry(ty.clone()).or_insert(id);
        self.types.insert(id, ty);
    }

    /// Registers a constant-creation instruction under its result id.
    pub fn declare_constant(&mut self, inst: Instruction) -> Id {
        let id = inst.result_id.unwrap_or(0);
        self.track_result(&inst);
        self.constants.insert(id, inst.clone());
        self.globals.insert(id, inst);
        id
    }

    /// Declares a module-scope variable of the given pointee type.
    pub fn declare_global_variable(
        &mut self,
        pointee_type: Id,
        storage_class: spirv::StorageClass,
        initializer: Option<Id>,
    ) -> Id {
        let type_id = self.type_id(Type::Pointer {
            class: storage_class,
            pointee: pointee_type,
        });
        let id = self.allocate_id();
        let mut inst = Instruction::new(spirv::Op::Variable);
        inst.set_type(type_id);
        inst.set_result(id);
        inst.add_enum(grammar::OperandKind::StorageClass, storage_class as Word);
        if let Some(init) = initializer {
            inst.add_id(init);
        }
        self.track_result(&inst);
        self.globals.insert(id, inst);
        self.global_vars.insert(
            id,
            GlobalVariable {
                id,
                type_id,
                pointee_type,
                storage_class,
                initializer,
                decorations: Vec::new(),
            },
        );
        id
    }

    /// Attaches a decoration to `id`.
    pub fn decorate(&mut self, id: Id, decoration: spirv::Decoration, args: Vec<Operand>) {
        if let Some(var) = self.global_vars.get_mut(&id) {
            var.decorations.push((decoration, args.clone()));
        }
        self.decorations
            .entry(id)
            .or_insert_with(FastHashMap::default)
            .insert(decoration, args);
    }

    /// Attaches a decoration to a struct member.
    pub fn decorate_member(
        &mut self,
        struct_id: Id,
        member: Word,
        decoration: spirv::Decoration,
        args: Vec<Operand>,
    ) {
        self.member_decorations
            .entry(struct_id)
            .or_insert_with(BTreeMap::new)
            .entry(member)
            .or_insert_with(FastHashMap::default)
            .insert(decoration, args);
    }

    /// Registers a pre-lowered function definition under `id`.
    pub fn declare_function(&mut self, id: Id, def: FunctionDef) {
        let mut inst = Instruction::new(spirv::Op::Function);
        if let Some(&Type::Function { ret, .. }) = self.types.get(&def.type_id) {
            inst.set_type(ret);
        }
        inst.set_result(id);
        inst.add_enum(grammar::OperandKind::FunctionControl, def.control.bits());
        inst.add_id(def.type_id);
        self.track_result(&inst);
        for &param in &def.parameters {
            if param > self.max_id {
                self.max_id = param;
            }
        }
        for block in &def.blocks {
            if block.id > self.max_id {
                self.max_id = block.id;
            }
            for inst in &block.instructions {
                self.track_result(inst);
            }
        }
        self.function_defs.insert(id, def);
    }

    /// Marks `function_id` as a pipeline entry point.
    pub fn declare_entry_point(
        &mut self,
        function_id: Id,
        name: &str,
        execution_model: spirv::ExecutionModel,
        interface: Vec<Id>,
    ) {
        self.entry_points.insert(
            function_id,
            EntryPoint {
                name: name.to_string(),
                function_id,
                execution_model,
                execution_modes: Vec::new(),
                interface,
            },
        );
    }

    pub fn debug_info_mut(&mut self) -> &mut DebugInfo {
        self.debug.get_or_insert_with(DebugInfo::default)
    }
}

/// Any failure the core can surface.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Binary(#[from] binary::Error),
    #[error(transparent)]
    Proc(#[from] proc::Error),
    #[error(transparent)]
    Text(#[from] text::Error),
    #[error(transparent)]
    Flow(#[from] cfg::Error),
    #[error(transparent)]
    Valid(#[from] valid::Error),
}

impl Error {
    /// Process exit code conventionally associated with this error:
    /// 1 validation failure, 2 malformed input, 3 invariant violation.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Error::Valid(valid::Error::Validation { .. }) => 1,
            Error::Binary(_) | Error::Text(_) | Error::Proc(proc::Error::Codec(_)) => 2,
            Error::Proc(_) | Error::Flow(_) | Error::Valid(_) => 3,
        }
    }
}
