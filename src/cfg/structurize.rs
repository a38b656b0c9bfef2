//! Structural analysis: reduction of a CFG to a control tree.
//!
//! The reducer contracts region patterns into single vertices until one
//! remains, recording the hierarchy as it goes. Patterns are pure
//! predicates over the current graph snapshot, tried in a fixed priority
//! order at each worklist vertex; innermost regions collapse first because
//! the worklist follows reverse post-order.

use super::{dfs, dom, Error, FlowGraph, Vertex};
use crate::{FastHashMap, FastHashSet};
use petgraph::graphmap::DiGraphMap;
use std::collections::VecDeque;
use std::fmt::Write as _;

type Graph = DiGraphMap<Vertex, ()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// A straight-line chain; also the kind of every leaf.
    Block,
    IfThen,
    IfThenElse,
    Case,
    /// A branch where some arms terminate the invocation.
    Termination,
    SelfLoop,
    WhileLoop,
    NaturalLoop,
    /// Multi-entry cyclic region, entered through the least common
    /// dominator of its entries.
    Improper,
    /// Acyclic region with no more specific shape.
    Proper,
}

/// Hierarchical decomposition of a CFG; leaves carry the original
/// vertices, interior nodes the region kinds.
#[derive(Clone, Debug)]
pub struct ControlTree {
    pub kind: RegionKind,
    pub vertex: Vertex,
    pub children: Vec<ControlTree>,
}

impl ControlTree {
    pub fn leaf(vertex: Vertex) -> Self {
        ControlTree {
            kind: RegionKind::Block,
            vertex,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Every node of the tree in preorder.
    pub fn regions(&self) -> Vec<&ControlTree> {
        fn walk<'a>(tree: &'a ControlTree, out: &mut Vec<&'a ControlTree>) {
            out.push(tree);
            for child in &tree.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    pub fn leaf_count(&self) -> usize {
        self.regions().iter().filter(|r| r.is_leaf()).count()
    }

    /// A tree is structured when no region required one of the fallback
    /// shapes.
    pub fn is_structured(&self) -> bool {
        self.regions().iter().all(|r| {
            !matches!(
                r.kind,
                RegionKind::Proper | RegionKind::Improper | RegionKind::SelfLoop
            )
        })
    }
}

fn succs(g: &Graph, v: Vertex) -> Vec<Vertex> {
    g.neighbors_directed(v, petgraph::Direction::Outgoing).collect()
}

fn preds(g: &Graph, v: Vertex) -> Vec<Vertex> {
    g.neighbors_directed(v, petgraph::Direction::Incoming).collect()
}

fn reaches(g: &Graph, from: Vertex, targets: &FastHashSet<Vertex>) -> bool {
    let mut seen = FastHashSet::default();
    let mut queue = vec![from];
    while let Some(v) = queue.pop() {
        for s in succs(g, v) {
            if targets.contains(&s) {
                return true;
            }
            if seen.insert(s) {
                queue.push(s);
            }
        }
    }
    false
}

/// Longest chain through `v` whose non-first members have one predecessor
/// and non-last members one successor.
fn match_block(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let mut chain = VecDeque::new();
    chain.push_back(v);
    loop {
        let head = *chain.front().unwrap();
        let p = preds(g, head);
        if p.len() != 1 || succs(g, p[0]).len() != 1 || chain.contains(&p[0]) {
            break;
        }
        chain.push_front(p[0]);
    }
    loop {
        let tail = *chain.back().unwrap();
        let s = succs(g, tail);
        if s.len() != 1 || preds(g, s[0]).len() != 1 || chain.contains(&s[0]) {
            break;
        }
        chain.push_back(s[0]);
    }
    if chain.len() < 2 {
        return None;
    }
    // A ring of single-entry single-exit vertices is a loop, not a chain.
    if g.contains_edge(*chain.back().unwrap(), *chain.front().unwrap()) {
        return None;
    }
    Some(chain.into_iter().collect())
}

fn match_if_then(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let out = succs(g, v);
    if out.len() != 2 {
        return None;
    }
    for &(then, merge) in &[(out[0], out[1]), (out[1], out[0])] {
        if then == v || merge == v {
            continue;
        }
        if preds(g, then) != vec![v] || succs(g, then) != vec![merge] {
            continue;
        }
        let mut region = vec![v, then];
        if preds(g, merge).iter().all(|&p| p == v || p == then) {
            region.push(merge);
        }
        return Some(region);
    }
    None
}

fn match_if_then_else(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let out = succs(g, v);
    if out.len() != 2 {
        return None;
    }
    let (then, or_else) = (out[0], out[1]);
    if then == v || or_else == v {
        return None;
    }
    if preds(g, then) != vec![v] || preds(g, or_else) != vec![v] {
        return None;
    }
    let then_succs = succs(g, then);
    let else_succs = succs(g, or_else);
    if then_succs.len() != 1 || else_succs != then_succs {
        return None;
    }
    let merge = then_succs[0];
    if merge == v {
        return None;
    }
    let mut region = vec![v, then, or_else];
    if preds(g, merge).iter().all(|&p| p == then || p == or_else) {
        region.push(merge);
    }
    Some(region)
}

fn match_case(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let out = succs(g, v);
    if out.len() < 2 {
        return None;
    }
    let mut merge = None;
    for &arm in &out {
        if arm == v || preds(g, arm) != vec![v] {
            return None;
        }
        let arm_succs = succs(g, arm);
        if arm_succs.len() != 1 {
            return None;
        }
        match merge {
            None => merge = Some(arm_succs[0]),
            Some(m) if m == arm_succs[0] => {}
            _ => return None,
        }
    }
    let merge = merge?;
    if merge == v || out.contains(&merge) {
        return None;
    }
    let mut region = vec![v];
    region.extend(&out);
    if preds(g, merge).iter().all(|p| out.contains(p)) {
        region.push(merge);
    }
    Some(region)
}

#[cfg(feature = "termination-regions")]
fn match_termination(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let out = succs(g, v);
    if out.len() < 2 {
        return None;
    }
    let sinks: Vec<Vertex> = out
        .iter()
        .copied()
        .filter(|&s| s != v && succs(g, s).is_empty() && preds(g, s) == vec![v])
        .collect();
    if sinks.is_empty() {
        return None;
    }
    let mut region = vec![v];
    region.extend(sinks);
    Some(region)
}

fn match_while_loop(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let out = succs(g, v);
    let ins = preds(g, v);
    if out.len() != 2 || ins.len() != 2 {
        return None;
    }
    for &body in &out {
        if body == v || !ins.contains(&body) {
            continue;
        }
        if preds(g, body) == vec![v] && succs(g, body) == vec![v] {
            return Some(vec![v, body]);
        }
    }
    None
}

fn scc_of(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    petgraph::algo::tarjan_scc(g)
        .into_iter()
        .find(|scc| scc.contains(&v))
}

fn match_natural_loop(g: &Graph, v: Vertex) -> Option<Vec<Vertex>> {
    let scc = scc_of(g, v)?;
    if scc.len() < 2 {
        return None;
    }
    let set: FastHashSet<Vertex> = scc.iter().copied().collect();
    for &w in &scc {
        for p in preds(g, w) {
            if !set.contains(&p) && w != v {
                return None;
            }
        }
    }
    Some(scc)
}

fn match_improper(g: &Graph, v: Vertex, entry: Vertex) -> Option<Vec<Vertex>> {
    let scc = scc_of(g, v)?;
    if scc.len() < 2 {
        return None;
    }
    let set: FastHashSet<Vertex> = scc.iter().copied().collect();
    let entries: Vec<Vertex> = scc
        .iter()
        .copied()
        .filter(|&w| preds(g, w).iter().any(|p| !set.contains(p)))
        .collect();
    if entries.len() < 2 {
        return None;
    }
    let doms = dom::compute(g, entry);
    let lcd = doms.least_common(entries)?;
    // The region is the cycle plus anything strictly between its synthetic
    // entry and the cycle; the synthetic entry itself stays outside unless
    // it belongs to the cycle.
    let mut region = scc;
    for w in g.nodes() {
        if w != lcd && !set.contains(&w) && doms.dominates(lcd, w) && reaches(g, w, &set) {
            region.push(w);
        }
    }
    Some(region)
}

fn match_proper(g: &Graph, v: Vertex, entry: Vertex) -> Option<Vec<Vertex>> {
    let doms = dom::compute(g, entry);
    let (pdoms, exit) = dom::post_compute(g);
    let ipdom = pdoms.immediate(v)?;
    let boundary = if ipdom == exit { None } else { Some(ipdom) };

    let mut region = FastHashSet::default();
    region.insert(v);
    let mut queue = vec![v];
    while let Some(w) = queue.pop() {
        for s in succs(g, w) {
            if Some(s) == boundary || region.contains(&s) || !doms.dominates(v, s) {
                continue;
            }
            region.insert(s);
            queue.push(s);
        }
    }
    if region.len() < 2 {
        return None;
    }
    // Only acyclic leftovers reduce here; cycles belong to the loop
    // patterns.
    for scc in petgraph::algo::tarjan_scc(g) {
        if scc.len() > 1 && scc.iter().any(|w| region.contains(w)) {
            return None;
        }
    }
    for &w in &region {
        if g.contains_edge(w, w) {
            return None;
        }
    }
    let mut region: Vec<Vertex> = region.into_iter().collect();
    region.sort_unstable();
    Some(region)
}

fn match_region(g: &Graph, v: Vertex, entry: Vertex) -> Option<(RegionKind, Vec<Vertex>)> {
    if let Some(region) = match_block(g, v) {
        return Some((RegionKind::Block, region));
    }
    if let Some(region) = match_if_then(g, v) {
        return Some((RegionKind::IfThen, region));
    }
    if let Some(region) = match_if_then_else(g, v) {
        return Some((RegionKind::IfThenElse, region));
    }
    if let Some(region) = match_case(g, v) {
        return Some((RegionKind::Case, region));
    }
    #[cfg(feature = "termination-regions")]
    {
        if let Some(region) = match_termination(g, v) {
            return Some((RegionKind::Termination, region));
        }
    }
    if g.contains_edge(v, v) {
        return Some((RegionKind::SelfLoop, vec![v]));
    }
    if let Some(region) = match_while_loop(g, v) {
        return Some((RegionKind::WhileLoop, region));
    }
    if let Some(region) = match_natural_loop(g, v) {
        return Some((RegionKind::NaturalLoop, region));
    }
    if let Some(region) = match_improper(g, v, entry) {
        return Some((RegionKind::Improper, region));
    }
    if let Some(region) = match_proper(g, v, entry) {
        return Some((RegionKind::Proper, region));
    }
    None
}

/// Merges the adjacency of `vertices` onto `v` and removes the rest,
/// dropping any self-loop the contraction produces.
fn contract(g: &mut Graph, v: Vertex, vertices: &[Vertex]) {
    let set: FastHashSet<Vertex> = vertices.iter().copied().collect();
    for &w in vertices {
        if w == v {
            continue;
        }
        let ins = preds(g, w);
        let outs = succs(g, w);
        for p in ins {
            if !set.contains(&p) {
                g.add_edge(p, v, ());
            }
        }
        for s in outs {
            if !set.contains(&s) {
                g.add_edge(v, s, ());
            }
        }
        g.remove_node(w);
    }
    g.remove_edge(v, v);
}

fn dump(g: &Graph) -> String {
    let mut nodes: Vec<Vertex> = g.nodes().collect();
    nodes.sort_unstable();
    let mut out = String::new();
    for v in nodes {
        let mut targets = succs(g, v);
        targets.sort_unstable();
        let _ = writeln!(out, "  {} -> {:?}", v, targets);
    }
    out
}

/// Reduces the CFG to a single control tree.
///
/// The worklist is seeded with the reverse post-order of the CFG and
/// reseeded with the surviving vertices, in that same order, whenever it
/// drains after progress. Draining without progress reports the residual
/// graph.
pub fn structurize(fg: &FlowGraph) -> Result<ControlTree, Error> {
    let mut entry = fg.entry()?;
    let rpo = dfs::compute(fg.graph(), entry).post_order;
    let mut position: FastHashMap<Vertex, usize> = rpo
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();
    let mut seed = rpo;
    let mut unreached: Vec<Vertex> = fg
        .graph()
        .nodes()
        .filter(|v| !position.contains_key(v))
        .collect();
    unreached.sort_unstable();
    for v in unreached {
        position.insert(v, position.len());
        seed.push(v);
    }

    let mut graph = fg.graph().clone();
    let mut trees: FastHashMap<Vertex, ControlTree> = graph
        .nodes()
        .map(|v| (v, ControlTree::leaf(v)))
        .collect();
    let mut worklist: VecDeque<Vertex> = seed.into_iter().collect();
    let mut progress = false;

    while graph.node_count() > 1 {
        let v = match worklist.pop_front() {
            Some(v) => v,
            None => {
                if !progress {
                    return Err(Error::UnreducibleRegion(dump(&graph)));
                }
                progress = false;
                let mut survivors: Vec<Vertex> = graph.nodes().collect();
                survivors.sort_unstable_by_key(|v| position[v]);
                worklist.extend(survivors);
                continue;
            }
        };
        if !graph.contains_node(v) {
            continue;
        }
        if let Some((kind, vertices)) = match_region(&graph, v, entry) {
            log::trace!("{:?} region of {} vertices at {}", kind, vertices.len(), v);
            let mut ordered = vertices.clone();
            ordered.sort_unstable_by_key(|w| position[w]);
            let children = ordered
                .iter()
                .map(|&w| trees.remove(&w).unwrap_or_else(|| ControlTree::leaf(w)))
                .collect();
            contract(&mut graph, v, &vertices);
            if vertices.contains(&entry) {
                entry = v;
            }
            trees.insert(
                v,
                ControlTree {
                    kind,
                    vertex: v,
                    children,
                },
            );
            worklist.push_front(v);
            progress = true;
        }
    }

    let root = graph
        .nodes()
        .next()
        .ok_or_else(|| Error::UnreducibleRegion("graph has no vertices".to_string()))?;
    Ok(trees
        .remove(&root)
        .unwrap_or_else(|| ControlTree::leaf(root)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_vertices(tree: &ControlTree) -> Vec<Vertex> {
        tree.children.iter().map(|c| c.vertex).collect()
    }

    #[test]
    fn if_then_else_absorbs_merge() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::IfThenElse);
        assert_eq!(child_vertices(&tree), vec![0, 1, 2, 3]);
        assert!(tree.children.iter().all(ControlTree::is_leaf));
        assert!(tree.is_structured());
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn if_then_region() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 2)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::IfThen);
        assert_eq!(child_vertices(&tree), vec![0, 1, 2]);
        assert!(tree.is_structured());
    }

    #[test]
    fn case_region() {
        let fg = FlowGraph::from_edges(&[
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 4),
            (2, 4),
            (3, 4),
        ]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::Case);
        assert_eq!(child_vertices(&tree), vec![0, 1, 2, 3, 4]);
        assert!(tree.is_structured());
    }

    #[test]
    fn while_loop_region() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::Block);
        assert_eq!(tree.children.len(), 3);
        assert_eq!(tree.children[0].vertex, 0);
        let header = &tree.children[1];
        assert_eq!(header.kind, RegionKind::WhileLoop);
        assert_eq!(child_vertices(header), vec![1, 2]);
        assert_eq!(tree.children[2].vertex, 3);
        assert!(tree.is_structured());
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn natural_loop_region() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 2), (2, 3), (3, 1), (1, 4)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::Block);
        let header = &tree.children[1];
        assert_eq!(header.kind, RegionKind::NaturalLoop);
        assert_eq!(child_vertices(header), vec![1, 2, 3]);
        assert!(tree.is_structured());
        assert_eq!(tree.leaf_count(), 5);
    }

    #[test]
    fn self_loop_region() {
        let fg = FlowGraph::from_edges(&[(0, 1), (1, 1), (1, 2)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::Block);
        let looped = &tree.children[1];
        assert_eq!(looped.kind, RegionKind::SelfLoop);
        assert_eq!(child_vertices(looped), vec![1]);
        assert!(!tree.is_structured());
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn irreducible_cycle_is_improper() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 2), (2, 1)]);
        let tree = structurize(&fg).unwrap();
        // The branch vertex stays outside: only the two-entry cycle
        // collapses into the Improper region.
        assert_eq!(tree.kind, RegionKind::Block);
        assert_eq!(tree.children[0].vertex, 0);
        let improper = &tree.children[1];
        assert_eq!(improper.kind, RegionKind::Improper);
        let mut members = child_vertices(improper);
        members.sort_unstable();
        assert_eq!(members, vec![1, 2]);
        assert!(!tree.is_structured());
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn branchy_acyclic_region_is_proper() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (1, 2), (1, 3), (2, 3)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::Block);
        let inner = &tree.children[0];
        assert_eq!(inner.kind, RegionKind::Proper);
        assert_eq!(child_vertices(inner), vec![0, 1, 2]);
        assert_eq!(tree.children[1].vertex, 3);
        assert!(!tree.is_structured());
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn multi_sink_branch_reduces() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (2, 3)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.leaf_count(), 4);
        #[cfg(not(feature = "termination-regions"))]
        assert_eq!(tree.kind, RegionKind::Proper);
    }

    #[cfg(feature = "termination-regions")]
    #[test]
    fn termination_region_matches_sink_arm() {
        let fg = FlowGraph::from_edges(&[(0, 1), (0, 2), (2, 3)]);
        let tree = structurize(&fg).unwrap();
        assert_eq!(tree.kind, RegionKind::Block);
        let head = &tree.children[0];
        assert_eq!(head.kind, RegionKind::Termination);
        assert_eq!(child_vertices(head), vec![0, 1]);
    }

    #[test]
    fn nested_regions_collapse_inside_out() {
        // 0 -> 1 -> {2, 3} -> 4 -> 5, a diamond behind a chain.
        let fg = FlowGraph::from_edges(&[
            (0, 1),
            (1, 2),
            (1, 3),
            (2, 4),
            (3, 4),
            (4, 5),
        ]);
        let tree = structurize(&fg).unwrap();
        assert!(tree.is_structured());
        assert_eq!(tree.leaf_count(), 6);
        let kinds: Vec<RegionKind> = tree.regions().iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&RegionKind::IfThenElse));
    }

    #[test]
    fn unreachable_component_is_unreducible() {
        // A cycle nothing branches into can never merge with the entry
        // component; the reducer reports the residual graph.
        let fg = FlowGraph::from_edges(&[(0, 1), (2, 3), (3, 2)]);
        match structurize(&fg) {
            Err(Error::UnreducibleRegion(dump)) => assert!(dump.contains("2 -> []")),
            other => panic!("unexpected result: {:?}", other.map(|t| t.kind)),
        }
    }
}
