//! Control-flow recovery: graph construction, dominators, edge
//! classification, and structural analysis.

pub mod dfs;
pub mod dom;
pub mod structurize;

pub use structurize::{structurize, ControlTree, RegionKind};

use crate::{FastHashMap, FunctionDef, Id, Operand};
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;

/// A vertex of the flow graph: the index of a block in function order.
pub type Vertex = u32;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("control-flow graph has no entry vertex")]
    NoEntry,
    #[error("control-flow graph has multiple entry vertices")]
    MultipleEntries,
    #[error("branch to unknown label %{0}")]
    UnknownLabel(Id),
    #[error("block %{0} does not end in a terminator")]
    MissingTerminator(Id),
    #[error("region reduction stalled; residual graph:\n{0}")]
    UnreducibleRegion(String),
}

/// Directed graph over a function's basic blocks.
#[derive(Clone, Debug)]
pub struct FlowGraph {
    graph: DiGraphMap<Vertex, ()>,
    entry: Option<Vertex>,
    /// Block label per vertex; empty for synthetic graphs.
    labels: Vec<Id>,
}

impl FlowGraph {
    /// Builds the graph of a function from its block terminators.
    pub fn from_function(def: &FunctionDef) -> Result<Self, Error> {
        use spirv::Op;

        if def.blocks.is_empty() {
            return Err(Error::NoEntry);
        }
        let mut graph = DiGraphMap::new();
        let mut labels = Vec::with_capacity(def.blocks.len());
        let mut by_label = FastHashMap::<Id, Vertex>::default();
        for (index, block) in def.blocks.iter().enumerate() {
            let vertex = index as Vertex;
            graph.add_node(vertex);
            by_label.insert(block.id, vertex);
            labels.push(block.id);
        }

        for (index, block) in def.blocks.iter().enumerate() {
            let vertex = index as Vertex;
            let terminator = block
                .terminator()
                .ok_or(Error::MissingTerminator(block.id))?;
            let mut targets = Vec::new();
            match terminator.op {
                Op::Branch => targets.extend(terminator.operands.get(0).and_then(Operand::as_id)),
                Op::BranchConditional => {
                    targets.extend(terminator.operands.get(1).and_then(Operand::as_id));
                    targets.extend(terminator.operands.get(2).and_then(Operand::as_id));
                }
                Op::Switch => {
                    // Default target, then the id of every (literal, label)
                    // case pair; the selector id is skipped.
                    targets.extend(terminator.operands[1..].iter().filter_map(Operand::as_id));
                }
                Op::Return | Op::ReturnValue | Op::Kill | Op::Unreachable => {}
                _ => return Err(Error::MissingTerminator(block.id)),
            }
            for target in targets {
                let succ = *by_label
                    .get(&target)
                    .ok_or(Error::UnknownLabel(target))?;
                graph.add_edge(vertex, succ, ());
            }
        }
        Ok(FlowGraph {
            graph,
            entry: Some(0),
            labels,
        })
    }

    /// Builds a synthetic graph from an edge list; the entry is derived
    /// from the in-degrees on demand.
    pub fn from_edges(edges: &[(Vertex, Vertex)]) -> Self {
        let mut graph = DiGraphMap::new();
        for &(from, to) in edges {
            graph.add_node(from);
            graph.add_node(to);
            graph.add_edge(from, to, ());
        }
        FlowGraph {
            graph,
            entry: None,
            labels: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, vertex: Vertex) {
        self.graph.add_node(vertex);
    }

    /// The unique entry vertex.
    pub fn entry(&self) -> Result<Vertex, Error> {
        if let Some(entry) = self.entry {
            return Ok(entry);
        }
        let mut roots = self
            .graph
            .nodes()
            .filter(|&v| self.predecessors(v).next().is_none());
        let entry = roots.next().ok_or(Error::NoEntry)?;
        if roots.next().is_some() {
            return Err(Error::MultipleEntries);
        }
        Ok(entry)
    }

    pub fn graph(&self) -> &DiGraphMap<Vertex, ()> {
        &self.graph
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Label of the block behind `vertex`, when the graph came from a
    /// function.
    pub fn label(&self, vertex: Vertex) -> Option<Id> {
        self.labels.get(vertex as usize).copied()
    }

    pub fn successors(&self, vertex: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.graph
            .neighbors_directed(vertex, petgraph::Direction::Outgoing)
    }

    pub fn predecessors(&self, vertex: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.graph
            .neighbors_directed(vertex, petgraph::Direction::Incoming)
    }

    /// Strongly connected components, in reverse topological order.
    pub fn strongly_connected_components(&self) -> Vec<Vec<Vertex>> {
        petgraph::algo::tarjan_scc(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicBlock, Instruction};

    fn block(id: Id, terminator: Instruction) -> BasicBlock {
        BasicBlock {
            id,
            instructions: vec![terminator],
        }
    }

    fn branch(target: Id) -> Instruction {
        let mut inst = Instruction::new(spirv::Op::Branch);
        inst.add_id(target);
        inst
    }

    fn branch_conditional(condition: Id, then: Id, or_else: Id) -> Instruction {
        let mut inst = Instruction::new(spirv::Op::BranchConditional);
        inst.add_id(condition);
        inst.add_id(then);
        inst.add_id(or_else);
        inst
    }

    fn function(blocks: Vec<BasicBlock>) -> FunctionDef {
        FunctionDef {
            type_id: 0,
            control: spirv::FunctionControl::empty(),
            parameters: Vec::new(),
            blocks,
        }
    }

    #[test]
    fn builds_diamond_from_terminators() {
        let def = function(vec![
            block(10, branch_conditional(99, 20, 30)),
            block(20, branch(40)),
            block(30, branch(40)),
            block(40, Instruction::new(spirv::Op::Return)),
        ]);
        let fg = FlowGraph::from_function(&def).unwrap();
        assert_eq!(fg.entry().unwrap(), 0);
        assert_eq!(fg.vertex_count(), 4);
        let succs: Vec<_> = fg.successors(0).collect();
        assert_eq!(succs, vec![1, 2]);
        assert_eq!(fg.successors(3).count(), 0);
        assert_eq!(fg.label(1), Some(20));
    }

    #[test]
    fn switch_targets_fan_out() {
        let mut switch = Instruction::new(spirv::Op::Switch);
        switch.add_id(99); // selector
        switch.add_id(2); // default
        switch.add_literal(0);
        switch.add_id(3);
        switch.add_literal(1);
        switch.add_id(4);
        let def = function(vec![
            block(1, switch),
            block(2, Instruction::new(spirv::Op::Return)),
            block(3, Instruction::new(spirv::Op::Return)),
            block(4, Instruction::new(spirv::Op::Kill)),
        ]);
        let fg = FlowGraph::from_function(&def).unwrap();
        let succs: Vec<_> = fg.successors(0).collect();
        assert_eq!(succs, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_branch_target_fails() {
        let def = function(vec![block(1, branch(42))]);
        assert!(matches!(
            FlowGraph::from_function(&def),
            Err(Error::UnknownLabel(42))
        ));
    }

    #[test]
    fn missing_terminator_fails() {
        let def = function(vec![block(1, Instruction::new(spirv::Op::FAdd))]);
        assert!(matches!(
            FlowGraph::from_function(&def),
            Err(Error::MissingTerminator(1))
        ));
    }

    #[test]
    fn loop_body_forms_a_component() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let mut components: Vec<Vec<Vertex>> = fg
            .strongly_connected_components()
            .into_iter()
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .filter(|c| c.len() > 1)
            .collect();
        components.sort();
        assert_eq!(components, vec![vec![1, 2]]);
    }

    #[test]
    fn entry_derivation() {
        let fg = FlowGraph::from_edges(&[(1, 2), (2, 3)]);
        assert_eq!(fg.entry().unwrap(), 1);

        let cycle = FlowGraph::from_edges(&[(1, 2), (2, 1)]);
        assert_eq!(cycle.entry(), Err(Error::NoEntry));

        let forest = FlowGraph::from_edges(&[(1, 3), (2, 3)]);
        assert_eq!(forest.entry(), Err(Error::MultipleEntries));
    }
}
