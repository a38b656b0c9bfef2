//! Static SPIR-V grammar tables.
//!
//! Distilled from the machine-readable SPIR-V grammar: for each supported
//! opcode an ordered list of logical operand descriptors plus a class tag
//! driving the module builder, and for each value enum a name table used by
//! the textual form. Rows are sorted by opcode so lookup is a binary search.

use crate::Word;

#[cfg(feature = "deserialize")]
use serde::Deserialize;
#[cfg(feature = "serialize")]
use serde::Serialize;

/// The kind of a logical operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
#[cfg_attr(feature = "deserialize", derive(Deserialize))]
pub enum OperandKind {
    IdResultType,
    IdResult,
    IdRef,
    LiteralInteger,
    LiteralString,
    /// Sized by the result type; only constant-creation opcodes use it.
    LiteralContextDependentNumber,
    LiteralExtInstInteger,
    PairLiteralIntegerIdRef,
    PairIdRefIdRef,
    SourceLanguage,
    ExecutionModel,
    AddressingModel,
    MemoryModel,
    ExecutionMode,
    StorageClass,
    Dim,
    SamplerAddressingMode,
    SamplerFilterMode,
    ImageFormat,
    ImageOperands,
    AccessQualifier,
    Decoration,
    SelectionControl,
    LoopControl,
    FunctionControl,
    MemoryAccess,
    Capability,
}

impl OperandKind {
    /// Kinds that reference an id.
    pub fn is_id(self) -> bool {
        match self {
            OperandKind::IdResultType | OperandKind::IdResult | OperandKind::IdRef => true,
            _ => false,
        }
    }

    /// Kinds whose word is a combination of flag bits rather than a single
    /// enumerant; these render as hex in the textual form.
    pub fn is_bit_enum(self) -> bool {
        match self {
            OperandKind::ImageOperands
            | OperandKind::SelectionControl
            | OperandKind::LoopControl
            | OperandKind::FunctionControl
            | OperandKind::MemoryAccess => true,
            _ => false,
        }
    }

    pub fn is_value_enum(self) -> bool {
        match self {
            OperandKind::SourceLanguage
            | OperandKind::ExecutionModel
            | OperandKind::AddressingModel
            | OperandKind::MemoryModel
            | OperandKind::ExecutionMode
            | OperandKind::StorageClass
            | OperandKind::Dim
            | OperandKind::SamplerAddressingMode
            | OperandKind::SamplerFilterMode
            | OperandKind::ImageFormat
            | OperandKind::AccessQualifier
            | OperandKind::Decoration
            | OperandKind::Capability => true,
            _ => false,
        }
    }
}

/// How many times a logical operand may appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantifier {
    One,
    ZeroOrOne,
    ZeroOrMore,
}

/// Classification tag steering the module builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    ModeSetting,
    Extension,
    Debug,
    Annotation,
    TypeDeclaration,
    ConstantCreation,
    Memory,
    Function,
    ControlFlow,
    ExtensionInstruction,
    Other,
}

#[derive(Clone, Copy, Debug)]
pub struct LogicalOperand {
    pub kind: OperandKind,
    pub quantifier: Quantifier,
}

/// One grammar row.
#[derive(Clone, Copy, Debug)]
pub struct InstructionDef {
    pub op: spirv::Op,
    pub opname: &'static str,
    pub class: Class,
    pub operands: &'static [LogicalOperand],
}

macro_rules! operands {
    ($(($kind:ident, $quant:ident)),* $(,)?) => {
        &[$(LogicalOperand {
            kind: OperandKind::$kind,
            quantifier: Quantifier::$quant,
        }),*]
    };
}

macro_rules! inst {
    ($op:ident, $class:ident, $operands:expr) => {
        InstructionDef {
            op: spirv::Op::$op,
            opname: stringify!($op),
            class: Class::$class,
            operands: $operands,
        }
    };
}

#[rustfmt::skip]
static INSTRUCTION_TABLE: &[InstructionDef] = &[
    inst!(Nop, Other, operands![]),
    inst!(Undef, Other, operands![(IdResultType, One), (IdResult, One)]),
    inst!(SourceContinued, Debug, operands![(LiteralString, One)]),
    inst!(Source, Debug, operands![
        (SourceLanguage, One), (LiteralInteger, One),
        (IdRef, ZeroOrOne), (LiteralString, ZeroOrOne),
    ]),
    inst!(SourceExtension, Debug, operands![(LiteralString, One)]),
    inst!(Name, Debug, operands![(IdRef, One), (LiteralString, One)]),
    inst!(MemberName, Debug, operands![
        (IdRef, One), (LiteralInteger, One), (LiteralString, One),
    ]),
    inst!(String, Debug, operands![(IdResult, One), (LiteralString, One)]),
    inst!(Line, Debug, operands![
        (IdRef, One), (LiteralInteger, One), (LiteralInteger, One),
    ]),
    inst!(Extension, Extension, operands![(LiteralString, One)]),
    inst!(ExtInstImport, Extension, operands![(IdResult, One), (LiteralString, One)]),
    inst!(ExtInst, ExtensionInstruction, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One),
        (LiteralExtInstInteger, One), (IdRef, ZeroOrMore),
    ]),
    inst!(MemoryModel, ModeSetting, operands![(AddressingModel, One), (MemoryModel, One)]),
    inst!(EntryPoint, ModeSetting, operands![
        (ExecutionModel, One), (IdRef, One), (LiteralString, One), (IdRef, ZeroOrMore),
    ]),
    inst!(ExecutionMode, ModeSetting, operands![
        (IdRef, One), (ExecutionMode, One), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(Capability, ModeSetting, operands![(Capability, One)]),
    inst!(TypeVoid, TypeDeclaration, operands![(IdResult, One)]),
    inst!(TypeBool, TypeDeclaration, operands![(IdResult, One)]),
    inst!(TypeInt, TypeDeclaration, operands![
        (IdResult, One), (LiteralInteger, One), (LiteralInteger, One),
    ]),
    inst!(TypeFloat, TypeDeclaration, operands![(IdResult, One), (LiteralInteger, One)]),
    inst!(TypeVector, TypeDeclaration, operands![
        (IdResult, One), (IdRef, One), (LiteralInteger, One),
    ]),
    inst!(TypeMatrix, TypeDeclaration, operands![
        (IdResult, One), (IdRef, One), (LiteralInteger, One),
    ]),
    inst!(TypeImage, TypeDeclaration, operands![
        (IdResult, One), (IdRef, One), (Dim, One), (LiteralInteger, One),
        (LiteralInteger, One), (LiteralInteger, One), (LiteralInteger, One),
        (ImageFormat, One), (AccessQualifier, ZeroOrOne),
    ]),
    inst!(TypeSampler, TypeDeclaration, operands![(IdResult, One)]),
    inst!(TypeSampledImage, TypeDeclaration, operands![(IdResult, One), (IdRef, One)]),
    inst!(TypeArray, TypeDeclaration, operands![
        (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(TypeRuntimeArray, TypeDeclaration, operands![(IdResult, One), (IdRef, One)]),
    inst!(TypeStruct, TypeDeclaration, operands![(IdResult, One), (IdRef, ZeroOrMore)]),
    inst!(TypeOpaque, TypeDeclaration, operands![(IdResult, One), (LiteralString, One)]),
    inst!(TypePointer, TypeDeclaration, operands![
        (IdResult, One), (StorageClass, One), (IdRef, One),
    ]),
    inst!(TypeFunction, TypeDeclaration, operands![
        (IdResult, One), (IdRef, One), (IdRef, ZeroOrMore),
    ]),
    inst!(TypeForwardPointer, TypeDeclaration, operands![(IdRef, One), (StorageClass, One)]),
    inst!(ConstantTrue, ConstantCreation, operands![(IdResultType, One), (IdResult, One)]),
    inst!(ConstantFalse, ConstantCreation, operands![(IdResultType, One), (IdResult, One)]),
    inst!(Constant, ConstantCreation, operands![
        (IdResultType, One), (IdResult, One), (LiteralContextDependentNumber, One),
    ]),
    inst!(ConstantComposite, ConstantCreation, operands![
        (IdResultType, One), (IdResult, One), (IdRef, ZeroOrMore),
    ]),
    inst!(ConstantSampler, ConstantCreation, operands![
        (IdResultType, One), (IdResult, One), (SamplerAddressingMode, One),
        (LiteralInteger, One), (SamplerFilterMode, One),
    ]),
    inst!(ConstantNull, ConstantCreation, operands![(IdResultType, One), (IdResult, One)]),
    inst!(SpecConstantTrue, ConstantCreation, operands![(IdResultType, One), (IdResult, One)]),
    inst!(SpecConstantFalse, ConstantCreation, operands![(IdResultType, One), (IdResult, One)]),
    inst!(SpecConstant, ConstantCreation, operands![
        (IdResultType, One), (IdResult, One), (LiteralContextDependentNumber, One),
    ]),
    inst!(SpecConstantComposite, ConstantCreation, operands![
        (IdResultType, One), (IdResult, One), (IdRef, ZeroOrMore),
    ]),
    inst!(Function, Function, operands![
        (IdResultType, One), (IdResult, One), (FunctionControl, One), (IdRef, One),
    ]),
    inst!(FunctionParameter, Function, operands![(IdResultType, One), (IdResult, One)]),
    inst!(FunctionEnd, Function, operands![]),
    inst!(FunctionCall, Function, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, ZeroOrMore),
    ]),
    inst!(Variable, Memory, operands![
        (IdResultType, One), (IdResult, One), (StorageClass, One), (IdRef, ZeroOrOne),
    ]),
    inst!(Load, Memory, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One),
        (MemoryAccess, ZeroOrOne), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(Store, Memory, operands![
        (IdRef, One), (IdRef, One), (MemoryAccess, ZeroOrOne), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(CopyMemory, Memory, operands![
        (IdRef, One), (IdRef, One), (MemoryAccess, ZeroOrOne), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(AccessChain, Memory, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, ZeroOrMore),
    ]),
    inst!(InBoundsAccessChain, Memory, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, ZeroOrMore),
    ]),
    inst!(PtrAccessChain, Memory, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One), (IdRef, ZeroOrMore),
    ]),
    inst!(ArrayLength, Memory, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (LiteralInteger, One),
    ]),
    inst!(Decorate, Annotation, operands![
        (IdRef, One), (Decoration, One), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(MemberDecorate, Annotation, operands![
        (IdRef, One), (LiteralInteger, One), (Decoration, One), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(VectorExtractDynamic, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(VectorInsertDynamic, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(VectorShuffle, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
        (LiteralInteger, ZeroOrMore),
    ]),
    inst!(CompositeConstruct, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, ZeroOrMore),
    ]),
    inst!(CompositeExtract, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(CompositeInsert, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
        (LiteralInteger, ZeroOrMore),
    ]),
    inst!(CopyObject, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(Transpose, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(SampledImage, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ImageSampleImplicitLod, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
        (ImageOperands, ZeroOrOne), (IdRef, ZeroOrMore),
    ]),
    inst!(ImageSampleExplicitLod, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
        (ImageOperands, One), (IdRef, ZeroOrMore),
    ]),
    inst!(ImageSampleDrefImplicitLod, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One), (IdRef, One),
        (ImageOperands, ZeroOrOne), (IdRef, ZeroOrMore),
    ]),
    inst!(ImageFetch, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
        (ImageOperands, ZeroOrOne), (IdRef, ZeroOrMore),
    ]),
    inst!(Image, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(ImageQuerySizeLod, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ImageQuerySize, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(ConvertFToU, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(ConvertFToS, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(ConvertSToF, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(ConvertUToF, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(UConvert, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(SConvert, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(FConvert, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(QuantizeToF16, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(Bitcast, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(SNegate, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(FNegate, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(IAdd, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(FAdd, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(ISub, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(FSub, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(IMul, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(FMul, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(UDiv, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(SDiv, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(FDiv, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(UMod, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(SRem, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(SMod, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(FRem, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(FMod, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(VectorTimesScalar, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(MatrixTimesScalar, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(VectorTimesMatrix, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(MatrixTimesVector, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(MatrixTimesMatrix, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(OuterProduct, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(Dot, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One)]),
    inst!(Any, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(All, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(IsNan, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(IsInf, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(LogicalEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(LogicalNotEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(LogicalOr, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(LogicalAnd, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(LogicalNot, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(Select, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(IEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(INotEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(UGreaterThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(SGreaterThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(UGreaterThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(SGreaterThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ULessThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(SLessThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ULessThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(SLessThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FOrdEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FUnordEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FOrdNotEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FUnordNotEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FOrdLessThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FUnordLessThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FOrdGreaterThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FUnordGreaterThan, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FOrdLessThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FUnordLessThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FOrdGreaterThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(FUnordGreaterThanEqual, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ShiftRightLogical, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ShiftRightArithmetic, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(ShiftLeftLogical, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(BitwiseOr, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(BitwiseXor, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(BitwiseAnd, Other, operands![
        (IdResultType, One), (IdResult, One), (IdRef, One), (IdRef, One),
    ]),
    inst!(Not, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(BitCount, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(DPdx, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(DPdy, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(Fwidth, Other, operands![(IdResultType, One), (IdResult, One), (IdRef, One)]),
    inst!(Phi, ControlFlow, operands![
        (IdResultType, One), (IdResult, One), (PairIdRefIdRef, ZeroOrMore),
    ]),
    inst!(LoopMerge, ControlFlow, operands![
        (IdRef, One), (IdRef, One), (LoopControl, One), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(SelectionMerge, ControlFlow, operands![(IdRef, One), (SelectionControl, One)]),
    inst!(Label, ControlFlow, operands![(IdResult, One)]),
    inst!(Branch, ControlFlow, operands![(IdRef, One)]),
    inst!(BranchConditional, ControlFlow, operands![
        (IdRef, One), (IdRef, One), (IdRef, One), (LiteralInteger, ZeroOrMore),
    ]),
    inst!(Switch, ControlFlow, operands![
        (IdRef, One), (IdRef, One), (PairLiteralIntegerIdRef, ZeroOrMore),
    ]),
    inst!(Kill, ControlFlow, operands![]),
    inst!(Return, ControlFlow, operands![]),
    inst!(ReturnValue, ControlFlow, operands![(IdRef, One)]),
    inst!(Unreachable, ControlFlow, operands![]),
    inst!(NoLine, Debug, operands![]),
    inst!(ModuleProcessed, Debug, operands![(LiteralString, One)]),
];

/// Grammar row for `opcode`, if the opcode is known.
pub fn lookup_u16(opcode: u16) -> Option<&'static InstructionDef> {
    INSTRUCTION_TABLE
        .binary_search_by_key(&opcode, |def| def.op as u16)
        .ok()
        .map(|index| &INSTRUCTION_TABLE[index])
}

pub fn lookup(op: spirv::Op) -> Option<&'static InstructionDef> {
    lookup_u16(op as u16)
}

/// Grammar row for an opcode name without its `Op` prefix.
pub fn lookup_name(opname: &str) -> Option<&'static InstructionDef> {
    INSTRUCTION_TABLE.iter().find(|def| def.opname == opname)
}

/// True for the opcodes that end a basic block.
pub fn is_terminator(op: spirv::Op) -> bool {
    match op {
        spirv::Op::Branch
        | spirv::Op::BranchConditional
        | spirv::Op::Switch
        | spirv::Op::Kill
        | spirv::Op::Return
        | spirv::Op::ReturnValue
        | spirv::Op::Unreachable => true,
        _ => false,
    }
}

//
// Enum value tables
//

type EnumTable = &'static [(Word, &'static str)];

#[rustfmt::skip]
static SOURCE_LANGUAGE: EnumTable = &[
    (0, "Unknown"), (1, "ESSL"), (2, "GLSL"), (3, "OpenCL_C"), (4, "OpenCL_CPP"), (5, "HLSL"),
];

#[rustfmt::skip]
static EXECUTION_MODEL: EnumTable = &[
    (0, "Vertex"), (1, "TessellationControl"), (2, "TessellationEvaluation"),
    (3, "Geometry"), (4, "Fragment"), (5, "GLCompute"), (6, "Kernel"),
];

#[rustfmt::skip]
static ADDRESSING_MODEL: EnumTable = &[
    (0, "Logical"), (1, "Physical32"), (2, "Physical64"), (5348, "PhysicalStorageBuffer64"),
];

#[rustfmt::skip]
static MEMORY_MODEL: EnumTable = &[
    (0, "Simple"), (1, "GLSL450"), (2, "OpenCL"), (3, "Vulkan"),
];

#[rustfmt::skip]
static EXECUTION_MODE: EnumTable = &[
    (0, "Invocations"), (1, "SpacingEqual"), (2, "SpacingFractionalEven"),
    (3, "SpacingFractionalOdd"), (4, "VertexOrderCw"), (5, "VertexOrderCcw"),
    (6, "PixelCenterInteger"), (7, "OriginUpperLeft"), (8, "OriginLowerLeft"),
    (9, "EarlyFragmentTests"), (10, "PointMode"), (11, "Xfb"), (12, "DepthReplacing"),
    (14, "DepthGreater"), (15, "DepthLess"), (16, "DepthUnchanged"),
    (17, "LocalSize"), (18, "LocalSizeHint"), (19, "InputPoints"), (20, "InputLines"),
    (21, "InputLinesAdjacency"), (22, "Triangles"), (23, "InputTrianglesAdjacency"),
    (24, "Quads"), (25, "Isolines"), (26, "OutputVertices"), (27, "OutputPoints"),
    (28, "OutputLineStrip"), (29, "OutputTriangleStrip"),
];

#[rustfmt::skip]
static STORAGE_CLASS: EnumTable = &[
    (0, "UniformConstant"), (1, "Input"), (2, "Uniform"), (3, "Output"),
    (4, "Workgroup"), (5, "CrossWorkgroup"), (6, "Private"), (7, "Function"),
    (8, "Generic"), (9, "PushConstant"), (10, "AtomicCounter"), (11, "Image"),
    (12, "StorageBuffer"),
];

#[rustfmt::skip]
static DIM: EnumTable = &[
    (0, "1D"), (1, "2D"), (2, "3D"), (3, "Cube"), (4, "Rect"),
    (5, "Buffer"), (6, "SubpassData"),
];

#[rustfmt::skip]
static SAMPLER_ADDRESSING_MODE: EnumTable = &[
    (0, "None"), (1, "ClampToEdge"), (2, "Clamp"), (3, "Repeat"), (4, "RepeatMirrored"),
];

#[rustfmt::skip]
static SAMPLER_FILTER_MODE: EnumTable = &[(0, "Nearest"), (1, "Linear")];

#[rustfmt::skip]
static IMAGE_FORMAT: EnumTable = &[
    (0, "Unknown"), (1, "Rgba32f"), (2, "Rgba16f"), (3, "R32f"), (4, "Rgba8"),
    (5, "Rgba8Snorm"), (6, "Rg32f"), (7, "Rg16f"), (8, "R11fG11fB10f"), (9, "R16f"),
    (10, "Rgba16"), (11, "Rgb10A2"), (12, "Rg16"), (13, "Rg8"), (14, "R16"), (15, "R8"),
    (16, "Rgba16Snorm"), (17, "Rg16Snorm"), (18, "Rg8Snorm"), (19, "R16Snorm"),
    (20, "R8Snorm"), (21, "Rgba32i"), (22, "Rgba16i"), (23, "Rgba8i"), (24, "R32i"),
    (25, "Rg32i"), (26, "Rg16i"), (27, "Rg8i"), (28, "R16i"), (29, "R8i"),
    (30, "Rgba32ui"), (31, "Rgba16ui"), (32, "Rgba8ui"), (33, "R32ui"), (34, "Rgb10a2ui"),
    (35, "Rg32ui"), (36, "Rg16ui"), (37, "Rg8ui"), (38, "R16ui"), (39, "R8ui"),
];

#[rustfmt::skip]
static ACCESS_QUALIFIER: EnumTable = &[
    (0, "ReadOnly"), (1, "WriteOnly"), (2, "ReadWrite"),
];

#[rustfmt::skip]
static DECORATION: EnumTable = &[
    (0, "RelaxedPrecision"), (1, "SpecId"), (2, "Block"), (3, "BufferBlock"),
    (4, "RowMajor"), (5, "ColMajor"), (6, "ArrayStride"), (7, "MatrixStride"),
    (8, "GLSLShared"), (9, "GLSLPacked"), (10, "CPacked"), (11, "BuiltIn"),
    (13, "NoPerspective"), (14, "Flat"), (15, "Patch"), (16, "Centroid"),
    (17, "Sample"), (18, "Invariant"), (19, "Restrict"), (20, "Aliased"),
    (21, "Volatile"), (22, "Constant"), (23, "Coherent"), (24, "NonWritable"),
    (25, "NonReadable"), (26, "Uniform"), (28, "SaturatedConversion"), (29, "Stream"),
    (30, "Location"), (31, "Component"), (32, "Index"), (33, "Binding"),
    (34, "DescriptorSet"), (35, "Offset"), (36, "XfbBuffer"), (37, "XfbStride"),
    (38, "FuncParamAttr"), (39, "FPRoundingMode"), (40, "FPFastMathMode"),
    (41, "LinkageAttributes"), (42, "NoContraction"), (43, "InputAttachmentIndex"),
    (44, "Alignment"),
];

#[rustfmt::skip]
static CAPABILITY: EnumTable = &[
    (0, "Matrix"), (1, "Shader"), (2, "Geometry"), (3, "Tessellation"),
    (4, "Addresses"), (5, "Linkage"), (6, "Kernel"), (7, "Vector16"),
    (8, "Float16Buffer"), (9, "Float16"), (10, "Float64"), (11, "Int64"),
    (12, "Int64Atomics"), (13, "ImageBasic"), (14, "ImageReadWrite"),
    (15, "ImageMipmap"), (17, "Pipes"), (18, "Groups"), (19, "DeviceEnqueue"),
    (20, "LiteralSampler"), (21, "AtomicStorage"), (22, "Int16"),
    (23, "TessellationPointSize"), (24, "GeometryPointSize"), (25, "ImageGatherExtended"),
    (27, "StorageImageMultisample"), (28, "UniformBufferArrayDynamicIndexing"),
    (29, "SampledImageArrayDynamicIndexing"), (30, "StorageBufferArrayDynamicIndexing"),
    (31, "StorageImageArrayDynamicIndexing"), (32, "ClipDistance"), (33, "CullDistance"),
    (34, "ImageCubeArray"), (35, "SampleRateShading"), (36, "ImageRect"),
    (37, "SampledRect"), (38, "GenericPointer"), (39, "Int8"), (40, "InputAttachment"),
    (41, "SparseResidency"), (42, "MinLod"), (43, "Sampled1D"), (44, "Image1D"),
    (45, "SampledCubeArray"), (46, "SampledBuffer"), (47, "ImageBuffer"),
    (48, "ImageMSArray"), (49, "StorageImageExtendedFormats"), (50, "ImageQuery"),
    (51, "DerivativeControl"), (52, "InterpolationFunction"), (53, "TransformFeedback"),
    (54, "GeometryStreams"), (55, "StorageImageReadWithoutFormat"),
    (56, "StorageImageWriteWithoutFormat"), (57, "MultiViewport"),
    (4423, "GroupNonUniform"), (5345, "VulkanMemoryModel"),
    (5346, "VulkanMemoryModelDeviceScope"),
];

fn enum_table(kind: OperandKind) -> Option<EnumTable> {
    Some(match kind {
        OperandKind::SourceLanguage => SOURCE_LANGUAGE,
        OperandKind::ExecutionModel => EXECUTION_MODEL,
        OperandKind::AddressingModel => ADDRESSING_MODEL,
        OperandKind::MemoryModel => MEMORY_MODEL,
        OperandKind::ExecutionMode => EXECUTION_MODE,
        OperandKind::StorageClass => STORAGE_CLASS,
        OperandKind::Dim => DIM,
        OperandKind::SamplerAddressingMode => SAMPLER_ADDRESSING_MODE,
        OperandKind::SamplerFilterMode => SAMPLER_FILTER_MODE,
        OperandKind::ImageFormat => IMAGE_FORMAT,
        OperandKind::AccessQualifier => ACCESS_QUALIFIER,
        OperandKind::Decoration => DECORATION,
        OperandKind::Capability => CAPABILITY,
        _ => return None,
    })
}

/// Symbolic name of an enum value, when the table knows it.
pub fn enum_name(kind: OperandKind, value: Word) -> Option<&'static str> {
    enum_table(kind)?
        .iter()
        .find(|&&(v, _)| v == value)
        .map(|&(_, name)| name)
}

/// Value of a symbolic enum name, when the table knows it.
pub fn enum_value(kind: OperandKind, name: &str) -> Option<Word> {
    enum_table(kind)?
        .iter()
        .find(|&&(_, n)| n == name)
        .map(|&(v, _)| v)
}

//
// Extended instruction sets
//

pub struct ExtInstSet {
    pub name: &'static str,
    pub instructions: EnumTable,
}

#[rustfmt::skip]
static GLSL_STD_450: ExtInstSet = ExtInstSet {
    name: "GLSL.std.450",
    instructions: &[
        (1, "Round"), (2, "RoundEven"), (3, "Trunc"), (4, "FAbs"), (5, "SAbs"),
        (6, "FSign"), (7, "SSign"), (8, "Floor"), (9, "Ceil"), (10, "Fract"),
        (11, "Radians"), (12, "Degrees"), (13, "Sin"), (14, "Cos"), (15, "Tan"),
        (16, "Asin"), (17, "Acos"), (18, "Atan"), (19, "Sinh"), (20, "Cosh"),
        (21, "Tanh"), (22, "Asinh"), (23, "Acosh"), (24, "Atanh"), (25, "Atan2"),
        (26, "Pow"), (27, "Exp"), (28, "Log"), (29, "Exp2"), (30, "Log2"),
        (31, "Sqrt"), (32, "InverseSqrt"), (33, "Determinant"), (34, "MatrixInverse"),
        (35, "Modf"), (36, "ModfStruct"), (37, "FMin"), (38, "UMin"), (39, "SMin"),
        (40, "FMax"), (41, "UMax"), (42, "SMax"), (43, "FClamp"), (44, "UClamp"),
        (45, "SClamp"), (46, "FMix"), (48, "Step"), (49, "SmoothStep"), (50, "Fma"),
        (51, "Frexp"), (52, "FrexpStruct"), (53, "Ldexp"), (66, "Length"),
        (67, "Distance"), (68, "Cross"), (69, "Normalize"), (70, "FaceForward"),
        (71, "Reflect"), (72, "Refract"), (73, "FindILsb"), (74, "FindSMsb"),
        (75, "FindUMsb"), (76, "InterpolateAtCentroid"), (77, "InterpolateAtSample"),
        (78, "InterpolateAtOffset"), (79, "NMin"), (80, "NMax"), (81, "NClamp"),
    ],
};

/// Per-set grammar for an imported extended instruction set.
pub fn ext_inst_set(name: &str) -> Option<&'static ExtInstSet> {
    if name == GLSL_STD_450.name {
        Some(&GLSL_STD_450)
    } else {
        None
    }
}

pub fn ext_inst_name(set: &ExtInstSet, number: Word) -> Option<&'static str> {
    set.instructions
        .iter()
        .find(|&&(n, _)| n == number)
        .map(|&(_, name)| name)
}

pub fn ext_inst_number(set: &ExtInstSet, name: &str) -> Option<Word> {
    set.instructions
        .iter()
        .find(|&&(_, n)| n == name)
        .map(|&(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_by_opcode() {
        for pair in INSTRUCTION_TABLE.windows(2) {
            assert!(
                (pair[0].op as u16) < (pair[1].op as u16),
                "{} must precede {}",
                pair[0].opname,
                pair[1].opname
            );
        }
    }

    #[test]
    fn lookup_known_and_unknown() {
        let def = lookup(spirv::Op::FAdd).unwrap();
        assert_eq!(def.opname, "FAdd");
        assert_eq!(def.operands.len(), 4);
        assert!(lookup_u16(0xfffe).is_none());
    }

    #[test]
    fn enum_names_round_trip() {
        for &(kind, value, name) in &[
            (OperandKind::StorageClass, 7, "Function"),
            (OperandKind::MemoryModel, 3, "Vulkan"),
            (OperandKind::Capability, 5345, "VulkanMemoryModel"),
            (OperandKind::Decoration, 34, "DescriptorSet"),
        ] {
            assert_eq!(enum_name(kind, value), Some(name));
            assert_eq!(enum_value(kind, name), Some(value));
        }
        assert_eq!(enum_name(OperandKind::StorageClass, 0xdead), None);
    }

    #[test]
    fn glsl_ext_set() {
        let set = ext_inst_set("GLSL.std.450").unwrap();
        assert_eq!(ext_inst_name(set, 40), Some("FMax"));
        assert_eq!(ext_inst_number(set, "Sqrt"), Some(31));
        assert!(ext_inst_set("OpenCL.std").is_none());
    }
}
