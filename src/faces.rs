//! Извлечение полигонов из плоского графа
//!
//! Обход по системе вращений: придя в узел `cur` из `prev`, идём к соседу, первому
//! по часовой стрелке от направления `cur → prev`. Такой обход описывает грань,
//! лежащую слева, поэтому ограниченные грани получаются против часовой стрелки
//! (положительная площадь), а внешняя грань — по часовой (отбрасывается).
//!
//! Кольцо принимается, только если оно простое, замыкается в стартовом полуребре,
//! имеет положительную площадь и не совпадает с уже найденным. Неограниченная
//! область обходится по часовой стрелке, её площадь отрицательна.

use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::f64::consts::TAU;

use crate::error::{MapGenError, Result};
use crate::generator::GenerationContext;
use crate::graph::geometry::{Point, normalize_angle};
use crate::graph::{EdgeId, Face, FaceId, FrameRole, NodeId, PlanarGraph};

/// Площадь, ниже которой кольцо считается вырожденным.
pub const AREA_EPS: f64 = 1e-9;

/// Следующий узел обхода: первый по часовой стрелке сосед `at` от направления на `from`.
///
/// У висячего узла единственный путь — назад.
#[must_use]
pub fn next_clockwise(graph: &PlanarGraph, from: NodeId, at: NodeId) -> Option<NodeId> {
    let origin = graph.pos(at);
    let base = origin.angle_to(graph.pos(from));
    let mut best: Option<(f64, NodeId)> = None;
    for n in graph.neighbors(at) {
        if n == from {
            continue;
        }
        let mut sweep = normalize_angle(base - origin.angle_to(graph.pos(n)));
        if sweep <= 0.0 {
            sweep = TAU;
        }
        if best.is_none_or(|(s, id)| sweep < s || (sweep == s && n < id)) {
            best = Some((sweep, n));
        }
    }
    match best {
        Some((_, n)) => Some(n),
        None if graph.edge_between(at, from).is_some() => Some(from),
        None => None,
    }
}

/// Обходит грань слева от полуребра `start → second`.
///
/// Возвращает кольцо, если оно простое и замыкается в том же полуребре.
/// Пройденные полурёбра добавляются в `visited`.
pub fn trace_ring(
    graph: &PlanarGraph,
    start: NodeId,
    second: NodeId,
    visited: &mut HashSet<(NodeId, NodeId)>,
) -> Result<Option<Vec<NodeId>>> {
    let limit = 2 * graph.edge_capacity() + 2;
    let mut ring = vec![start];
    let mut seen = BTreeSet::from([start]);
    let mut simple = true;
    let (mut prev, mut cur) = (start, second);
    visited.insert((start, second));

    while cur != start {
        if !seen.insert(cur) {
            simple = false;
        }
        ring.push(cur);
        if ring.len() > limit {
            return Err(MapGenError::FaceExtraction { node: start });
        }
        let next = next_clockwise(graph, prev, cur).ok_or(MapGenError::FaceExtraction { node: cur })?;
        prev = cur;
        cur = next;
        visited.insert((prev, cur));
    }

    // обход обязан продолжиться тем же полуребром, иначе старт — узел-перемычка
    let closes = next_clockwise(graph, prev, start) == Some(second);
    Ok((simple && closes && ring.len() >= 3).then_some(ring))
}

/// Собирает полигон по кольцу узлов. `None` — кольцо не может быть гранью.
#[must_use]
pub fn build_face(graph: &PlanarGraph, ring: Vec<NodeId>) -> Option<Face> {
    let n = ring.len();
    let edges: Vec<EdgeId> = (0..n)
        .map(|i| graph.edge_between(ring[i], ring[(i + 1) % n]))
        .collect::<Option<_>>()?;
    let points: Vec<Point> = ring.iter().map(|&id| graph.pos(id)).collect();
    let outer = graph.inset && ring.iter().any(|&id| graph.node(id).frame == FrameRole::Outer);
    let face = Face::new(ring, edges, &points, outer);
    (face.area > AREA_EPS).then_some(face)
}

fn ring_key(ring: &[NodeId]) -> Vec<NodeId> {
    let mut key = ring.to_vec();
    key.sort_unstable();
    key
}

/// Порядок стартовых узлов: сначала внутренние развилки, затем остальные.
fn start_order(graph: &PlanarGraph) -> Vec<NodeId> {
    let (mut forks, mut rest): (Vec<NodeId>, Vec<NodeId>) = graph.node_ids().partition(|&n| {
        let node = graph.node(n);
        node.degree() > 2 && node.frame == FrameRole::None
    });
    forks.append(&mut rest);
    forks
}

/// Полностью переизвлекает все полигоны графа. Возвращает их число.
pub fn extract_all(graph: &mut PlanarGraph, ctx: &mut GenerationContext) -> Result<usize> {
    graph.clear_faces();
    ctx.visited.clear();
    let mut known: BTreeSet<Vec<NodeId>> = BTreeSet::new();
    let mut rejected = 0usize;

    for start in start_order(graph) {
        for second in graph.neighbors(start) {
            if ctx.visited.contains(&(start, second)) {
                continue;
            }
            let Some(ring) = trace_ring(graph, start, second, &mut ctx.visited)? else {
                rejected += 1;
                continue;
            };
            let key = ring_key(&ring);
            if known.contains(&key) {
                continue;
            }
            match build_face(graph, ring) {
                Some(face) => {
                    known.insert(key);
                    graph.add_face(face);
                }
                None => rejected += 1,
            }
        }
    }
    graph.refresh_adjacency();
    debug!("Извлечено полигонов: {}, отброшено колец: {rejected}", graph.face_count());
    Ok(graph.face_count())
}

/// Находит и добавляет грань слева от полуребра `a → b` (локальное извлечение).
pub fn extract_local(graph: &mut PlanarGraph, a: NodeId, b: NodeId) -> Result<Option<FaceId>> {
    let mut visited = HashSet::new();
    let Some(ring) = trace_ring(graph, a, b, &mut visited)? else {
        return Ok(None);
    };
    let key = ring_key(&ring);
    let duplicate = graph
        .node(a)
        .faces
        .iter()
        .any(|&f| ring_key(&graph.face(f).nodes) == key);
    if duplicate {
        return Ok(None);
    }
    Ok(build_face(graph, ring).map(|face| graph.add_face(face)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationSettings;
    use crate::graph::NodeKind;

    fn node(g: &mut PlanarGraph, x: f64, y: f64) -> NodeId {
        g.add_node(Point::new(x, y), NodeKind::Interior, FrameRole::None)
    }

    /// Квадрат 2×2 с диагональю: два треугольника.
    fn split_square() -> (PlanarGraph, [NodeId; 4]) {
        let mut g = PlanarGraph::new(4.0, 4.0, 1.0);
        let a = node(&mut g, 0.0, 0.0);
        let b = node(&mut g, 2.0, 0.0);
        let c = node(&mut g, 2.0, 2.0);
        let d = node(&mut g, 0.0, 2.0);
        for (p, q) in [(a, b), (b, c), (c, d), (d, a), (a, c)] {
            g.add_edge(p, q, FrameRole::None);
        }
        (g, [a, b, c, d])
    }

    fn context() -> GenerationContext {
        GenerationContext::new(&GenerationSettings::default())
    }

    #[test]
    fn extracts_two_triangles_counter_clockwise() {
        let (mut g, [a, _, c, _]) = split_square();
        let count = extract_all(&mut g, &mut context()).unwrap();
        assert_eq!(count, 2);
        for f in g.face_ids() {
            let face = g.face(f);
            assert!((face.area - 2.0).abs() < 1e-12);
            assert_eq!(face.nodes.len(), 3);
            assert_eq!(face.edges.len(), 3);
        }
        let diagonal = g.edge_between(a, c).unwrap();
        assert_eq!(g.edge(diagonal).faces.len(), 2);
    }

    #[test]
    fn dangling_edge_marks_node_invalid() {
        let (mut g, [_, _, c, _]) = split_square();
        let tip = node(&mut g, 3.0, 3.0);
        g.add_edge(c, tip, FrameRole::None);
        extract_all(&mut g, &mut context()).unwrap();
        assert_eq!(g.face_count(), 2);
        assert!(g.node(tip).faces.is_empty());
        assert!(g.invalid_nodes().contains(&tip));
    }

    #[test]
    fn bare_frame_is_a_single_face() {
        let g = crate::testutil::grid(1, 1, 2.0);
        assert_eq!(g.face_count(), 1);
        let face = g.face(g.face_ids().next().unwrap());
        assert!((face.area - 4.0).abs() < 1e-12);
        assert!(g.corners.iter().all(|c| face.nodes.contains(c)));
        assert!(g.invalid_nodes().is_empty());
    }

    #[test]
    fn frame_around_a_loose_triangle_keeps_its_face() {
        let mut g = crate::testutil::grid(1, 1, 4.0);
        let a = node(&mut g, 1.0, 1.0);
        let b = node(&mut g, 2.0, 1.0);
        let c = node(&mut g, 1.5, 2.0);
        for (p, q) in [(a, b), (b, c), (c, a)] {
            g.add_edge(p, q, FrameRole::None);
        }
        extract_all(&mut g, &mut context()).unwrap();
        assert_eq!(g.face_count(), 2);
        let mut areas: Vec<f64> = g.face_ids().map(|f| g.face(f).area).collect();
        areas.sort_by(f64::total_cmp);
        assert!((areas[0] - 0.5).abs() < 1e-12);
        assert!((areas[1] - 16.0).abs() < 1e-12);
    }

    #[test]
    fn dead_end_turns_back() {
        let mut g = PlanarGraph::new(4.0, 4.0, 1.0);
        let a = node(&mut g, 0.0, 0.0);
        let b = node(&mut g, 1.0, 0.0);
        g.add_edge(a, b, FrameRole::None);
        assert_eq!(next_clockwise(&g, a, b), Some(a));
    }

    #[test]
    fn local_extraction_skips_known_faces() {
        let (mut g, [a, b, ..]) = split_square();
        let first = extract_local(&mut g, a, b).unwrap();
        assert!(first.is_some());
        assert!(extract_local(&mut g, a, b).unwrap().is_none());
        // обход по часовой стрелке даёт внешнюю грань
        assert!(extract_local(&mut g, b, a).unwrap().is_none());
    }
}
