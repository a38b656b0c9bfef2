//! Spanning depth-first search and edge classification.

use super::{Error, FlowGraph, Vertex};
use crate::{FastHashMap, FastHashSet};
use petgraph::graphmap::DiGraphMap;

/// Classification of a graph edge against the spanning tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Tree,
    /// Target is a proper descendant of the source.
    Forward,
    /// Target is an ancestor of the source; loops produce these.
    Retreating,
    Cross,
}

/// Discovery and finish times of a depth-first traversal from the entry.
#[derive(Clone, Debug)]
pub struct SpanningTree {
    pub discovery: FastHashMap<Vertex, u32>,
    pub finish: FastHashMap<Vertex, u32>,
    /// Every graph edge with its classification.
    pub edges: Vec<(Vertex, Vertex, EdgeKind)>,
    /// Reachable vertices in reverse post-order.
    pub post_order: Vec<Vertex>,
}

struct Walk<'a> {
    graph: &'a DiGraphMap<Vertex, ()>,
    discovery: FastHashMap<Vertex, u32>,
    finish: FastHashMap<Vertex, u32>,
    tree_edges: FastHashSet<(Vertex, Vertex)>,
    post_order: Vec<Vertex>,
    clock: u32,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, vertex: Vertex) {
        self.discovery.insert(vertex, self.clock);
        self.clock += 1;
        // Successors are walked in reverse insertion order so that the
        // reverse post-order lists early successors first.
        let successors: Vec<Vertex> = self
            .graph
            .neighbors_directed(vertex, petgraph::Direction::Outgoing)
            .collect();
        for &succ in successors.iter().rev() {
            if !self.discovery.contains_key(&succ) {
                self.tree_edges.insert((vertex, succ));
                self.visit(succ);
            }
        }
        self.finish.insert(vertex, self.clock);
        self.clock += 1;
        self.post_order.push(vertex);
    }
}

/// Runs the spanning DFS over `graph` from `entry`.
pub fn compute(graph: &DiGraphMap<Vertex, ()>, entry: Vertex) -> SpanningTree {
    let mut walk = Walk {
        graph,
        discovery: FastHashMap::default(),
        finish: FastHashMap::default(),
        tree_edges: FastHashSet::default(),
        post_order: Vec::new(),
        clock: 0,
    };
    walk.visit(entry);

    let mut post_order = walk.post_order;
    post_order.reverse();
    let mut tree = SpanningTree {
        discovery: walk.discovery,
        finish: walk.finish,
        edges: Vec::new(),
        post_order,
    };
    for (from, to, _) in graph.all_edges() {
        if !tree.discovery.contains_key(&from) {
            continue;
        }
        let kind = if walk.tree_edges.contains(&(from, to)) {
            EdgeKind::Tree
        } else if tree.is_ancestor(to, from) {
            EdgeKind::Retreating
        } else if tree.is_ancestor(from, to) {
            EdgeKind::Forward
        } else {
            EdgeKind::Cross
        };
        tree.edges.push((from, to, kind));
    }
    tree
}

/// Spanning tree of a flow graph, rooted at its unique entry.
pub fn spanning_tree(fg: &FlowGraph) -> Result<SpanningTree, Error> {
    Ok(compute(fg.graph(), fg.entry()?))
}

/// Reachable vertices in reverse post-order.
pub fn reverse_post_order(fg: &FlowGraph) -> Result<Vec<Vertex>, Error> {
    Ok(spanning_tree(fg)?.post_order)
}

impl SpanningTree {
    pub fn retreating_edges(&self) -> Vec<(Vertex, Vertex)> {
        self.edges
            .iter()
            .filter(|&&(_, _, kind)| kind == EdgeKind::Retreating)
            .map(|&(from, to, _)| (from, to))
            .collect()
    }

    /// Whether `ancestor` is an ancestor of `vertex` in the spanning tree.
    pub fn is_ancestor(&self, ancestor: Vertex, vertex: Vertex) -> bool {
        match (
            self.discovery.get(&ancestor),
            self.discovery.get(&vertex),
            self.finish.get(&ancestor),
            self.finish.get(&vertex),
        ) {
            (Some(da), Some(db), Some(fa), Some(fb)) => da <= db && fb <= fa,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(fg: &FlowGraph) -> FastHashMap<(Vertex, Vertex), EdgeKind> {
        spanning_tree(fg)
            .unwrap()
            .edges
            .into_iter()
            .map(|(from, to, kind)| ((from, to), kind))
            .collect()
    }

    #[test]
    fn diamond_reverse_post_order() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert_eq!(reverse_post_order(&fg).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn loop_edges_classify_as_retreating() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let kinds = kinds(&fg);
        assert_eq!(kinds[&(0, 1)], EdgeKind::Tree);
        assert_eq!(kinds[&(1, 2)], EdgeKind::Tree);
        assert_eq!(kinds[&(2, 1)], EdgeKind::Retreating);
        assert_eq!(kinds[&(1, 3)], EdgeKind::Tree);
    }

    #[test]
    fn shortcut_edge_is_forward() {
        // 0 -> 1 -> 2 plus the shortcut 0 -> 2; the walk takes the long
        // path first, leaving the shortcut as a non-tree descendant edge.
        let fg = FlowGraph::from_edges(&[(0, 2), (0, 1), (1, 2)]);
        let kinds = kinds(&fg);
        assert_eq!(kinds[&(0, 1)], EdgeKind::Tree);
        assert_eq!(kinds[&(1, 2)], EdgeKind::Tree);
        assert_eq!(kinds[&(0, 2)], EdgeKind::Forward);
    }

    #[test]
    fn diamond_join_is_cross() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let kinds = kinds(&fg);
        // The walk reaches 3 through 2 first, so the join edge from the
        // other arm lands between finished subtrees.
        assert_eq!(kinds[&(2, 3)], EdgeKind::Tree);
        assert_eq!(kinds[&(1, 3)], EdgeKind::Cross);
    }

    #[test]
    fn self_loop_is_retreating() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 1), (1, 2)]);
        let kinds = kinds(&fg);
        assert_eq!(kinds[&(1, 1)], EdgeKind::Retreating);
    }
}
