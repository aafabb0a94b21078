//! Восстановление топологии после роста
//!
//! Узел недопустим, если у него рёбер больше, чем полигонов (висячие линии,
//! «воздушные шары» на перемычках, оторванные островки рёбер). Проходы:
//!
//! 1. удалить узлы без полигонов вместе с их рёбрами;
//! 2. удалить кластеры полигонов вокруг недопустимых узлов, не связанные
//!    через соседство с рамкой карты;
//! 3. если два первых прохода ничего не удалили, оставить только двусвязный
//!    блок, содержащий рамку. В двусвязном плоском графе каждая грань — простой
//!    цикл, поэтому после этого недопустимых узлов не остаётся.
//!
//! После каждого прохода полигоны извлекаются заново.

use log::{debug, info};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::error::{MapGenError, Result};
use crate::faces;
use crate::generator::GenerationContext;
use crate::graph::{EdgeId, FaceId, FrameRole, NodeId, PlanarGraph};

/// Сколько раз применять эвристические проходы до обрезки по блоку.
const MAX_HEURISTIC_PASSES: usize = 6;

/// Итог восстановления.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub passes: usize,
    pub removed_nodes: usize,
    pub removed_faces: usize,
    pub pruned_to_block: bool,
}

/// Удаляет узлы без полигонов (узлы рамки не трогаются).
fn remove_faceless(graph: &mut PlanarGraph) -> usize {
    let doomed: Vec<NodeId> = graph
        .node_ids()
        .filter(|&n| {
            let node = graph.node(n);
            node.faces.is_empty() && node.frame == FrameRole::None
        })
        .collect();
    for &n in &doomed {
        graph.remove_node(n);
    }
    doomed.len()
}

fn is_anchored(graph: &PlanarGraph, f: FaceId) -> bool {
    graph
        .face(f)
        .edges
        .iter()
        .any(|&e| graph.edge(e).frame != FrameRole::None)
}

/// Удаляет «плавающие» кластеры: компоненты соседства полигонов, касающиеся
/// недопустимых узлов и не достигающие рамки.
fn remove_floating(graph: &mut PlanarGraph, invalid: &[NodeId]) -> (usize, usize) {
    let touching: BTreeSet<FaceId> = invalid
        .iter()
        .filter(|&&n| graph.has_node(n))
        .flat_map(|&n| graph.node(n).faces.clone())
        .collect();

    let mut seen: BTreeSet<FaceId> = BTreeSet::new();
    let mut doomed: Vec<FaceId> = Vec::new();
    for &start in &touching {
        if seen.contains(&start) {
            continue;
        }
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(f) = queue.pop_front() {
            for g in graph.neighbor_faces(f) {
                if seen.insert(g) {
                    component.push(g);
                    queue.push_back(g);
                }
            }
        }
        if !component.iter().any(|&f| is_anchored(graph, f)) {
            doomed.extend(component);
        }
    }

    let mut edges: BTreeSet<EdgeId> = BTreeSet::new();
    for &f in &doomed {
        edges.extend(graph.face(f).edges.iter().copied());
        graph.remove_face(f);
    }
    let mut nodes: BTreeSet<NodeId> = BTreeSet::new();
    for e in edges {
        let edge = graph.edge(e);
        if edge.faces.is_empty() && edge.frame == FrameRole::None {
            nodes.insert(edge.a);
            nodes.insert(edge.b);
            graph.remove_edge(e);
        }
    }
    let mut removed_nodes = 0;
    for n in nodes {
        let node = graph.node(n);
        if node.degree() == 0 && node.frame == FrameRole::None {
            graph.remove_node(n);
            removed_nodes += 1;
        }
    }
    (removed_nodes, doomed.len())
}

/// Рёбра двусвязного блока, содержащего рамку (итеративный алгоритм Тарьяна со стеком рёбер).
fn frame_block(graph: &PlanarGraph) -> BTreeSet<EdgeId> {
    let Some(&root) = graph.corners.first() else {
        return BTreeSet::new();
    };
    let anchor = graph
        .node(root)
        .edges
        .iter()
        .copied()
        .find(|&e| graph.edge(e).frame == FrameRole::Outer);

    let mut disc: HashMap<NodeId, usize> = HashMap::new();
    let mut low: HashMap<NodeId, usize> = HashMap::new();
    let mut stack: Vec<(NodeId, Option<EdgeId>, usize)> = vec![(root, None, 0)];
    let mut edge_stack: Vec<EdgeId> = Vec::new();
    disc.insert(root, 0);
    low.insert(root, 0);
    let mut time = 1;

    while let Some(top) = stack.last_mut() {
        let (v, parent_edge, i) = (top.0, top.1, top.2);
        let edges = &graph.node(v).edges;
        if i < edges.len() {
            top.2 += 1;
            let e = edges[i];
            if Some(e) == parent_edge {
                continue;
            }
            let w = graph.edge(e).other(v);
            if let Some(&dw) = disc.get(&w) {
                if dw < disc[&v] {
                    edge_stack.push(e);
                    let lv = low[&v].min(dw);
                    low.insert(v, lv);
                }
            } else {
                edge_stack.push(e);
                disc.insert(w, time);
                low.insert(w, time);
                time += 1;
                stack.push((w, Some(e), 0));
            }
            continue;
        }

        stack.pop();
        let Some(&(u, _, _)) = stack.last() else {
            break;
        };
        let lu = low[&u].min(low[&v]);
        low.insert(u, lu);
        if low[&v] >= disc[&u] {
            let mut block = BTreeSet::new();
            while let Some(e) = edge_stack.pop() {
                block.insert(e);
                if Some(e) == parent_edge {
                    break;
                }
            }
            if anchor.is_some_and(|a| block.contains(&a)) {
                return block;
            }
        }
    }
    BTreeSet::new()
}

/// Оставляет только двусвязный блок рамки. Возвращает число удалённых узлов.
fn prune_to_frame_block(graph: &mut PlanarGraph) -> usize {
    let block = frame_block(graph);
    let doomed_edges: Vec<EdgeId> = graph.edge_ids().filter(|e| !block.contains(e)).collect();
    for e in doomed_edges {
        graph.remove_edge(e);
    }
    let doomed_nodes: Vec<NodeId> = graph
        .node_ids()
        .filter(|&n| graph.node(n).degree() == 0)
        .collect();
    for &n in &doomed_nodes {
        graph.remove_node(n);
    }
    doomed_nodes.len()
}

/// Чинит граф до отсутствия недопустимых узлов и оставляет актуальные полигоны.
pub fn repair(graph: &mut PlanarGraph, ctx: &mut GenerationContext) -> Result<RepairReport> {
    let mut report = RepairReport::default();
    loop {
        faces::extract_all(graph, ctx)?;
        let invalid = graph.invalid_nodes();
        if invalid.is_empty() {
            info!(
                "Топология восстановлена за {} проход(ов): удалено узлов {}, полигонов {}",
                report.passes, report.removed_nodes, report.removed_faces
            );
            return Ok(report);
        }
        if report.pruned_to_block {
            return Err(MapGenError::Invariant(format!(
                "{} invalid nodes remain after pruning to the frame block",
                invalid.len()
            )));
        }
        report.passes += 1;
        debug!("Проход восстановления {}: недопустимых узлов {}", report.passes, invalid.len());

        let mut removed = 0;
        if report.passes <= MAX_HEURISTIC_PASSES {
            let faceless = remove_faceless(graph);
            let (floating_nodes, floating_faces) = remove_floating(graph, &invalid);
            report.removed_nodes += faceless + floating_nodes;
            report.removed_faces += floating_faces;
            removed = faceless + floating_nodes + floating_faces;
        }
        if removed == 0 {
            debug!("Эвристики исчерпаны, обрезка до блока рамки");
            report.removed_nodes += prune_to_frame_block(graph);
            report.pruned_to_block = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationSettings;
    use crate::graph::NodeKind;
    use crate::graph::geometry::Point;

    /// Квадрат 4×4, разделённый крестом на четыре квадранта.
    fn quartered() -> (PlanarGraph, NodeId) {
        let mut g = PlanarGraph::new(4.0, 4.0, 1.0);
        let ring = [
            (0.0, 0.0),
            (2.0, 0.0),
            (4.0, 0.0),
            (4.0, 2.0),
            (4.0, 4.0),
            (2.0, 4.0),
            (0.0, 4.0),
            (0.0, 2.0),
        ];
        let ids: Vec<NodeId> = ring
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let kind = if i % 2 == 0 { NodeKind::Corner } else { NodeKind::Edge };
                g.add_node(Point::new(x, y), kind, FrameRole::Outer)
            })
            .collect();
        for i in 0..ids.len() {
            g.add_edge(ids[i], ids[(i + 1) % ids.len()], FrameRole::Outer);
        }
        g.corners = vec![ids[0], ids[2], ids[4], ids[6]];
        let center = g.add_node(Point::new(2.0, 2.0), NodeKind::Interior, FrameRole::None);
        for &mid in &[ids[1], ids[3], ids[5], ids[7]] {
            g.add_edge(center, mid, FrameRole::None);
        }
        (g, center)
    }

    fn interior(g: &mut PlanarGraph, x: f64, y: f64) -> NodeId {
        g.add_node(Point::new(x, y), NodeKind::Interior, FrameRole::None)
    }

    #[test]
    fn clean_graph_needs_no_passes() {
        let (mut g, _) = quartered();
        let mut ctx = GenerationContext::new(&GenerationSettings::default());
        let report = repair(&mut g, &mut ctx).unwrap();
        assert_eq!(report.passes, 0);
        assert_eq!(g.face_count(), 4);
    }

    #[test]
    fn removes_dangling_and_floating_structure() {
        let (mut g, center) = quartered();
        let tip = interior(&mut g, 2.6, 2.5);
        g.add_edge(center, tip, FrameRole::None);
        let t: Vec<NodeId> = [(0.5, 0.5), (1.5, 0.5), (0.5, 1.5)]
            .iter()
            .map(|&(x, y)| interior(&mut g, x, y))
            .collect();
        for i in 0..3 {
            g.add_edge(t[i], t[(i + 1) % 3], FrameRole::None);
        }

        let mut ctx = GenerationContext::new(&GenerationSettings::default());
        let report = repair(&mut g, &mut ctx).unwrap();

        assert!(g.invalid_nodes().is_empty());
        assert!(!g.has_node(tip));
        assert!(t.iter().all(|&n| !g.has_node(n)));
        assert_eq!(g.face_count(), 4);
        assert_eq!(g.node_count(), 9);
        assert!(!report.pruned_to_block);
    }

    #[test]
    fn balloon_on_a_bridge_is_cut_off() {
        let (mut g, center) = quartered();
        // перемычка из центра к треугольнику внутри квадранта
        let bridge = interior(&mut g, 2.8, 2.8);
        g.add_edge(center, bridge, FrameRole::None);
        let a = interior(&mut g, 3.2, 3.0);
        let b = interior(&mut g, 3.0, 3.4);
        g.add_edge(bridge, a, FrameRole::None);
        g.add_edge(a, b, FrameRole::None);
        g.add_edge(b, bridge, FrameRole::None);

        let mut ctx = GenerationContext::new(&GenerationSettings::default());
        repair(&mut g, &mut ctx).unwrap();

        assert!(g.invalid_nodes().is_empty());
        assert_eq!(g.face_count(), 4);
        assert!(!g.has_node(bridge));
    }

    #[test]
    fn block_pruning_keeps_the_frame() {
        let (mut g, center) = quartered();
        let tip = interior(&mut g, 2.6, 2.5);
        g.add_edge(center, tip, FrameRole::None);
        let removed = prune_to_frame_block(&mut g);
        assert_eq!(removed, 1);
        assert_eq!(g.node_count(), 9);
        assert_eq!(g.edge_count(), 12);
    }
}
