//! Dominator sets, the dominator tree, and back-edge detection.

use super::{dfs, Error, FlowGraph, Vertex};
use crate::FastHashMap;
use bit_set::BitSet;
use petgraph::graphmap::DiGraphMap;

/// Dominator sets over the vertices reachable from the entry.
#[derive(Clone, Debug)]
pub struct Dominators {
    entry: Vertex,
    /// Dense index per reachable vertex, in reverse post-order.
    order: Vec<Vertex>,
    index: FastHashMap<Vertex, usize>,
    sets: Vec<BitSet>,
    idom: FastHashMap<Vertex, Vertex>,
}

/// Computes dominator sets by the classical iterative fixed-point:
/// `dom(entry) = {entry}`, `dom(v) = {v} ∪ ⋂ dom(preds)` until stable.
pub fn compute(graph: &DiGraphMap<Vertex, ()>, entry: Vertex) -> Dominators {
    let order = dfs::compute(graph, entry).post_order;
    let index: FastHashMap<Vertex, usize> = order
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();
    let n = order.len();

    let mut everything = BitSet::with_capacity(n);
    for i in 0..n {
        everything.insert(i);
    }
    let mut sets = vec![everything; n];
    sets[0].clear();
    sets[0].insert(0);

    let mut changed = true;
    while changed {
        changed = false;
        for i in 1..n {
            let vertex = order[i];
            let mut new = None;
            for pred in graph.neighbors_directed(vertex, petgraph::Direction::Incoming) {
                let p = match index.get(&pred) {
                    Some(&p) => p,
                    None => continue,
                };
                match new {
                    None => new = Some(sets[p].clone()),
                    Some(ref mut set) => set.intersect_with(&sets[p]),
                }
            }
            let mut new = new.unwrap_or_else(BitSet::new);
            new.insert(i);
            if new != sets[i] {
                sets[i] = new;
                changed = true;
            }
        }
    }

    // The immediate dominator is the strict dominator dominated by every
    // other strict dominator, i.e. the one with the largest dominator set.
    let mut idom = FastHashMap::default();
    for i in 1..n {
        let mut best: Option<usize> = None;
        for j in sets[i].iter() {
            if j == i {
                continue;
            }
            best = match best {
                Some(b) if sets[b].len() >= sets[j].len() => Some(b),
                _ => Some(j),
            };
        }
        if let Some(b) = best {
            idom.insert(order[i], order[b]);
        }
    }

    Dominators {
        entry,
        order,
        index,
        sets,
        idom,
    }
}

/// Dominators of a flow graph, rooted at its unique entry.
pub fn dominators(fg: &FlowGraph) -> Result<Dominators, Error> {
    Ok(compute(fg.graph(), fg.entry()?))
}

impl Dominators {
    pub fn entry(&self) -> Vertex {
        self.entry
    }

    /// Whether `vertex` was reachable from the entry.
    pub fn contains(&self, vertex: Vertex) -> bool {
        self.index.contains_key(&vertex)
    }

    /// Whether `a` dominates `b`.
    pub fn dominates(&self, a: Vertex, b: Vertex) -> bool {
        match (self.index.get(&a), self.index.get(&b)) {
            (Some(&a), Some(&b)) => self.sets[b].contains(a),
            _ => false,
        }
    }

    /// The dominator set of `vertex`, in reverse post-order.
    pub fn set(&self, vertex: Vertex) -> Vec<Vertex> {
        match self.index.get(&vertex) {
            Some(&i) => self.sets[i].iter().map(|j| self.order[j]).collect(),
            None => Vec::new(),
        }
    }

    /// Immediate dominator; `None` for the entry and unreachable vertices.
    pub fn immediate(&self, vertex: Vertex) -> Option<Vertex> {
        self.idom.get(&vertex).copied()
    }

    /// Deepest vertex dominating every vertex of the iterator.
    pub fn least_common<I>(&self, vertices: I) -> Option<Vertex>
    where
        I: IntoIterator<Item = Vertex>,
    {
        let mut common: Option<BitSet> = None;
        for vertex in vertices {
            let i = *self.index.get(&vertex)?;
            match common {
                None => common = Some(self.sets[i].clone()),
                Some(ref mut set) => set.intersect_with(&self.sets[i]),
            }
        }
        let common = common?;
        let mut best: Option<usize> = None;
        for j in common.iter() {
            best = match best {
                Some(b) if self.sets[b].len() >= self.sets[j].len() => Some(b),
                _ => Some(j),
            };
        }
        best.map(|b| self.order[b])
    }
}

/// Post-dominators, computed as dominators of the reversed graph with a
/// synthetic exit joined to every sink. Returns the analysis and the
/// synthetic exit vertex.
pub fn post_compute(graph: &DiGraphMap<Vertex, ()>) -> (Dominators, Vertex) {
    let exit = graph.nodes().max().map_or(0, |v| v + 1);
    let mut reversed = DiGraphMap::new();
    reversed.add_node(exit);
    for vertex in graph.nodes() {
        reversed.add_node(vertex);
    }
    for (from, to, _) in graph.all_edges() {
        reversed.add_edge(to, from, ());
    }
    for vertex in graph.nodes() {
        if graph
            .neighbors_directed(vertex, petgraph::Direction::Outgoing)
            .next()
            .is_none()
        {
            reversed.add_edge(exit, vertex, ());
        }
    }
    (compute(&reversed, exit), exit)
}

pub fn post_dominators(fg: &FlowGraph) -> Result<(Dominators, Vertex), Error> {
    fg.entry()?;
    Ok(post_compute(fg.graph()))
}

/// Retreating edges whose target dominates their source. Equal to the
/// retreating-edge set exactly when the graph is reducible.
pub fn back_edges(fg: &FlowGraph) -> Result<Vec<(Vertex, Vertex)>, Error> {
    let tree = dfs::spanning_tree(fg)?;
    let doms = dominators(fg)?;
    Ok(tree
        .retreating_edges()
        .into_iter()
        .filter(|&(from, to)| doms.dominates(to, from))
        .collect())
}

/// A graph is reducible exactly when removing its back-edges leaves it
/// acyclic.
pub fn is_reducible(fg: &FlowGraph) -> Result<bool, Error> {
    let back: Vec<_> = back_edges(fg)?;
    let mut stripped = fg.graph().clone();
    for (from, to) in back {
        stripped.remove_edge(from, to);
    }
    Ok(!petgraph::algo::is_cyclic_directed(&stripped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond_with_tail() -> FlowGraph {
        FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)])
    }

    #[test]
    fn dominator_sets_of_diamond_with_tail() {
        let doms = dominators(&diamond_with_tail()).unwrap();
        assert_eq!(doms.set(0), vec![0]);
        assert_eq!(doms.set(1), vec![0, 1]);
        assert_eq!(doms.set(2), vec![0, 2]);
        let mut join = doms.set(3);
        join.sort_unstable();
        assert_eq!(join, vec![0, 3]);
        let mut tail = doms.set(4);
        tail.sort_unstable();
        assert_eq!(tail, vec![0, 3, 4]);
    }

    #[test]
    fn every_vertex_dominates_itself() {
        let doms = dominators(&diamond_with_tail()).unwrap();
        for v in 0..5 {
            assert!(doms.dominates(v, v));
        }
        assert!(doms.dominates(0, 4));
        assert!(!doms.dominates(1, 3));
    }

    #[test]
    fn immediate_dominators() {
        let doms = dominators(&diamond_with_tail()).unwrap();
        assert_eq!(doms.immediate(0), None);
        assert_eq!(doms.immediate(1), Some(0));
        assert_eq!(doms.immediate(2), Some(0));
        assert_eq!(doms.immediate(3), Some(0));
        assert_eq!(doms.immediate(4), Some(3));
    }

    #[test]
    fn least_common_dominator() {
        let doms = dominators(&diamond_with_tail()).unwrap();
        assert_eq!(doms.least_common(vec![1, 2]), Some(0));
        assert_eq!(doms.least_common(vec![3, 4]), Some(3));
        assert_eq!(doms.least_common(vec![4]), Some(4));
    }

    #[test]
    fn post_dominators_of_diamond() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let (pdoms, exit) = post_dominators(&fg).unwrap();
        assert_eq!(pdoms.immediate(0), Some(3));
        assert_eq!(pdoms.immediate(3), Some(exit));
    }

    #[test]
    fn while_loop_back_edge() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 2), (2, 1), (1, 3)]);
        assert_eq!(back_edges(&fg).unwrap(), vec![(2, 1)]);
        assert!(is_reducible(&fg).unwrap());
    }

    #[test]
    fn two_entry_cycle_is_irreducible() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 2), (2, 1)]);
        let tree = dfs::spanning_tree(&fg).unwrap();
        assert_eq!(tree.retreating_edges().len(), 1);
        assert!(back_edges(&fg).unwrap().is_empty());
        assert!(!is_reducible(&fg).unwrap());
    }
}
