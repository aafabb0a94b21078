//! Балансировка площадей полигонов
//!
//! Сначала слияния: самый маленький полигон меньше минимума сливается с соседом
//! (соседи перебираются по возрастанию площади). Затем разрезания: самый большой
//! полигон больше максимума режется линией роста из случайной вершины.
//!
//! Каждая операция идёт в транзакции графа. Результат проверяется локальным
//! повторным обходом граней; при любой несогласованности транзакция откатывается.
//! Разрезание никогда не создаёт кусков меньше минимума, поэтому слияния после
//! разрезаний не нужны.

use log::{debug, info};
use rand::Rng;
use std::collections::BTreeSet;

use crate::config::{GenerationSettings, SPLIT_ELIGIBILITY_FACTOR};
use crate::error::{MapGenError, Result};
use crate::faces;
use crate::generator::GenerationContext;
use crate::graph::geometry::{
    Point, angle_between, centroid, normalize_angle, point_in_polygon, point_segment_distance,
    signed_area,
};
use crate::graph::{EdgeId, FaceId, FrameRole, NodeId, NodeKind, PlanarGraph};
use crate::growth::{self, GrowthProfile, angle_is_clear, can_connect, segment_is_clear};

/// Попыток разрезать полигон линией роста.
const WALK_ATTEMPTS: usize = 24;
/// Сколько лучших запасных разрезов пробовать.
const FALLBACK_CUTS: usize = 6;
/// Относительный допуск сравнения площадей.
const AREA_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceReport {
    pub merges: usize,
    pub splits: usize,
}

/// Запасной разрез полигона.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cut {
    /// Диагональ между двумя вершинами
    Chord(NodeId, NodeId),
    /// Две стороны через новый узел (центроид)
    Bend(NodeId, Point, NodeId),
}

fn areas_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= AREA_TOLERANCE * a.abs().max(1.0)
}

/// Выполняет `op` в транзакции: `Some` фиксирует изменения, `None` и ошибка откатывают.
fn transactional<T>(
    graph: &mut PlanarGraph,
    op: impl FnOnce(&mut PlanarGraph) -> Result<Option<T>>,
) -> Result<Option<T>> {
    graph.begin();
    match op(graph) {
        Ok(Some(value)) => {
            graph.commit();
            Ok(Some(value))
        }
        Ok(None) => {
            graph.rollback();
            Ok(None)
        }
        Err(err) => {
            graph.rollback();
            Err(err)
        }
    }
}

/// Участок кольца от `from` до `to` включительно (с переходом через конец).
fn cyclic<T: Copy>(ring: &[T], from: usize, to: usize) -> Vec<T> {
    let n = ring.len();
    let mut out = Vec::with_capacity(n);
    let mut i = from;
    loop {
        out.push(ring[i]);
        if i == to {
            break;
        }
        i = (i + 1) % n;
    }
    out
}

/// Сливает полигон `f` с соседом `g`. `None` — слияние откатилось.
pub fn try_merge(graph: &mut PlanarGraph, f: FaceId, g: FaceId) -> Result<Option<FaceId>> {
    let (face, other) = (graph.face(f), graph.face(g));
    let shared: Vec<EdgeId> = face
        .edges
        .iter()
        .copied()
        .filter(|e| other.edges.contains(e))
        .collect();
    let n = face.nodes.len();
    let Some(k) = (0..n).find(|&k| !shared.contains(&face.edges[k])) else {
        return Ok(None);
    };
    if shared.is_empty() {
        return Ok(None);
    }
    let (a, b) = (face.nodes[k], face.nodes[(k + 1) % n]);
    let expected = face.area + other.area;
    let water = face.water;

    transactional(graph, |graph| {
        graph.remove_face(f);
        graph.remove_face(g);
        let mut touched = BTreeSet::new();
        for e in shared {
            let edge = graph.edge(e);
            touched.insert(edge.a);
            touched.insert(edge.b);
            graph.remove_edge(e);
        }
        for n in touched {
            if graph.node(n).degree() == 0 {
                graph.remove_node(n);
            }
        }
        let Some(h) = faces::extract_local(graph, a, b)? else {
            return Ok(None);
        };
        let merged = graph.face(h);
        if !areas_match(merged.area, expected) || merged.nodes.iter().any(|&n| !graph.is_node_valid(n)) {
            return Ok(None);
        }
        graph.face_mut(h).water = water;
        Ok(Some(h))
    })
}

/// Сливает полигоны меньше минимума, пока это возможно.
pub fn merge_undersized(graph: &mut PlanarGraph, settings: &GenerationSettings) -> Result<usize> {
    let mut stuck: BTreeSet<FaceId> = BTreeSet::new();
    let mut merges = 0;
    loop {
        let smallest = graph
            .face_ids()
            .filter(|f| !stuck.contains(f))
            .filter(|&f| {
                let face = graph.face(f);
                !face.outer && face.area < settings.min_face_area
            })
            .min_by(|&a, &b| graph.face(a).area.total_cmp(&graph.face(b).area).then(a.cmp(&b)));
        let Some(f) = smallest else {
            break;
        };

        let mut neighbors: Vec<FaceId> = graph
            .neighbor_faces(f)
            .into_iter()
            .filter(|&g| !graph.face(g).outer)
            .collect();
        neighbors.sort_by(|&a, &b| graph.face(a).area.total_cmp(&graph.face(b).area).then(a.cmp(&b)));

        let mut merged = false;
        for g in neighbors {
            if let Some(h) = try_merge(graph, f, g)? {
                debug!("Слияние {f} + {g} → {h} (площадь {:.3})", graph.face(h).area);
                merged = true;
                merges += 1;
                break;
            }
        }
        if !merged {
            debug!("Полигон {f} не удалось слить ни с одним соседом");
            stuck.insert(f);
        }
    }
    Ok(merges)
}

/// Углы раскрытия вершин полигона: `(индекс, начальное направление, ширина)`.
///
/// Направление отсчитывается от ребра к следующей вершине с отступом `clearance`
/// от обеих сторон.
fn vertex_openings(graph: &PlanarGraph, ring: &[NodeId], clearance: f64) -> Vec<(usize, f64, f64)> {
    let n = ring.len();
    (0..n)
        .filter_map(|i| {
            let v = graph.pos(ring[i]);
            let next = v.angle_to(graph.pos(ring[(i + 1) % n]));
            let prev = v.angle_to(graph.pos(ring[(i + n - 1) % n]));
            let sweep = normalize_angle(prev - next);
            let width = sweep - 2.0 * clearance;
            (width > 0.0).then_some((i, next + clearance, width))
        })
        .collect()
}

/// Проверяет разрез, начатый полуребром `v → first`, и заменяет `f` двумя кусками.
fn finish_split(
    graph: &mut PlanarGraph,
    settings: &GenerationSettings,
    f: FaceId,
    v: NodeId,
    first: NodeId,
) -> Result<Option<(FaceId, FaceId)>> {
    if graph.created_nodes().iter().any(|&n| graph.node(n).degree() != 2) {
        return Ok(None);
    }
    let (original, water) = {
        let face = graph.face(f);
        (face.area, face.water)
    };
    graph.remove_face(f);

    let Some(p) = faces::extract_local(graph, v, first)? else {
        return Ok(None);
    };
    let Some(q) = faces::extract_local(graph, first, v)? else {
        return Ok(None);
    };
    let (pa, qa) = (graph.face(p).area, graph.face(q).area);
    if pa < settings.min_face_area || qa < settings.min_face_area || !areas_match(pa + qa, original) {
        return Ok(None);
    }
    let all_valid = [p, q]
        .iter()
        .flat_map(|&h| graph.face(h).nodes.iter())
        .all(|&n| graph.is_node_valid(n));
    if !all_valid {
        return Ok(None);
    }
    graph.face_mut(p).water = water;
    graph.face_mut(q).water = water;
    Ok(Some((p, q)))
}

/// Запасные разрезы, упорядоченные по сбалансированности (минимальный кусок — больше).
fn fallback_cuts(
    graph: &PlanarGraph,
    profile: &GrowthProfile,
    settings: &GenerationSettings,
    f: FaceId,
) -> Vec<Cut> {
    let ring = graph.face(f).nodes.clone();
    let pts = graph.ring_points(f);
    let n = ring.len();
    let min = settings.min_face_area;
    let mut cuts: Vec<(f64, Cut)> = Vec::new();

    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let mid = pts[i].lerp(pts[j], 0.5);
            if !point_in_polygon(mid, &pts) || !can_connect(graph, profile, ring[i], ring[j]) {
                continue;
            }
            let a1 = signed_area(&cyclic(&pts, i, j));
            let a2 = signed_area(&cyclic(&pts, j, i));
            if a1 >= min && a2 >= min {
                cuts.push((a1.min(a2), Cut::Chord(ring[i], ring[j])));
            }
        }
    }

    let c = centroid(&pts);
    let roomy = point_in_polygon(c, &pts)
        && (0..n).all(|i| point_segment_distance(c, pts[i], pts[(i + 1) % n]) >= profile.snap_distance);
    if roomy {
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let clear = segment_is_clear(graph, profile, pts[i], c, &[ring[i]])
                    && segment_is_clear(graph, profile, c, pts[j], &[ring[j]])
                    && angle_is_clear(graph, profile, ring[i], pts[i].angle_to(c))
                    && angle_is_clear(graph, profile, ring[j], pts[j].angle_to(c))
                    && angle_between(c.angle_to(pts[i]), c.angle_to(pts[j])) >= profile.min_edge_angle;
                if !clear {
                    continue;
                }
                let mut p1 = cyclic(&pts, i, j);
                p1.push(c);
                let mut p2 = cyclic(&pts, j, i);
                p2.push(c);
                let (a1, a2) = (signed_area(&p1), signed_area(&p2));
                if a1 >= min && a2 >= min {
                    cuts.push((a1.min(a2), Cut::Bend(ring[i], c, ring[j])));
                }
            }
        }
    }

    cuts.sort_by(|a, b| b.0.total_cmp(&a.0));
    cuts.into_iter().take(FALLBACK_CUTS).map(|(_, cut)| cut).collect()
}

/// Разрезает полигон на два куска не меньше минимума.
pub fn split_face(
    graph: &mut PlanarGraph,
    ctx: &mut GenerationContext,
    settings: &GenerationSettings,
    f: FaceId,
) -> Result<Option<(FaceId, FaceId)>> {
    let profile = ctx.profile;
    let walk_profile = GrowthProfile {
        max_turn: profile.max_turn * 0.5,
        ..profile
    };
    let ring = graph.face(f).nodes.clone();
    let openings = vertex_openings(graph, &ring, profile.min_edge_angle);

    if !openings.is_empty() {
        for _ in 0..WALK_ATTEMPTS {
            let (i, from, width) = openings[ctx.rng.gen_range(0..openings.len())];
            let heading = from + ctx.rng.gen_range(0.0..width);
            let v = ring[i];
            let rng = &mut ctx.rng;
            let parts = transactional(graph, |graph| {
                let path = growth::straight_walk(graph, rng, &walk_profile, v, heading);
                match path.nodes.first() {
                    Some(&first) if path.snapped => finish_split(graph, settings, f, v, first),
                    _ => Ok(None),
                }
            })?;
            if parts.is_some() {
                return Ok(parts);
            }
        }
    }

    for cut in fallback_cuts(graph, &profile, settings, f) {
        let parts = transactional(graph, |graph| match cut {
            Cut::Chord(u, w) => {
                graph.add_edge(u, w, FrameRole::None);
                finish_split(graph, settings, f, u, w)
            }
            Cut::Bend(u, c, w) => {
                let mid = graph.add_node(c, NodeKind::Interior, FrameRole::None);
                graph.add_edge(u, mid, FrameRole::None);
                graph.add_edge(mid, w, FrameRole::None);
                finish_split(graph, settings, f, u, mid)
            }
        })?;
        if parts.is_some() {
            debug!("Полигон {f} разрезан запасным способом: {cut:?}");
            return Ok(parts);
        }
    }
    Ok(None)
}

/// Разрезает полигоны больше максимума, начиная с самого большого.
pub fn split_oversized(
    graph: &mut PlanarGraph,
    ctx: &mut GenerationContext,
    settings: &GenerationSettings,
) -> Result<usize> {
    let eligible = SPLIT_ELIGIBILITY_FACTOR * settings.min_face_area;
    let mut stuck: BTreeSet<FaceId> = BTreeSet::new();
    let mut splits = 0;
    loop {
        let largest = graph
            .face_ids()
            .filter(|f| !stuck.contains(f))
            .filter(|&f| {
                let face = graph.face(f);
                !face.outer && face.area > settings.max_face_area && face.area > eligible
            })
            .max_by(|&a, &b| graph.face(a).area.total_cmp(&graph.face(b).area).then(b.cmp(&a)));
        let Some(f) = largest else {
            break;
        };
        match split_face(graph, ctx, settings, f)? {
            Some((p, q)) => {
                splits += 1;
                debug!(
                    "Разрез {f} → {p} ({:.3}) + {q} ({:.3})",
                    graph.face(p).area,
                    graph.face(q).area
                );
            }
            None => {
                debug!("Полигон {f} не удалось разрезать");
                stuck.insert(f);
            }
        }
    }
    Ok(splits)
}

/// Проверяет, что площади всех полигонов (кроме внешнего кольца) в допустимых пределах.
pub fn check_area_bounds(graph: &PlanarGraph, settings: &GenerationSettings) -> Result<()> {
    let (min, max) = (settings.min_face_area, settings.max_face_area);
    for f in graph.face_ids() {
        let face = graph.face(f);
        if face.outer {
            continue;
        }
        if face.area < min * (1.0 - AREA_TOLERANCE) || face.area > max * (1.0 + AREA_TOLERANCE) {
            return Err(MapGenError::Invariant(format!(
                "face {f} has area {:.4} outside [{min}, {max}]",
                face.area
            )));
        }
    }
    Ok(())
}

/// Приводит площади всех полигонов к `[min_face_area, max_face_area]`.
pub fn balance(
    graph: &mut PlanarGraph,
    ctx: &mut GenerationContext,
    settings: &GenerationSettings,
) -> Result<BalanceReport> {
    let merges = merge_undersized(graph, settings)?;
    let splits = split_oversized(graph, ctx, settings)?;
    graph.refresh_adjacency();
    check_area_bounds(graph, settings)?;
    info!(
        "Площади выровнены: слияний {merges}, разрезов {splits}, полигонов {}",
        graph.face_count()
    );
    Ok(BalanceReport { merges, splits })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_node(g: &mut PlanarGraph, x: f64, y: f64, corner: bool) -> NodeId {
        let kind = if corner { NodeKind::Corner } else { NodeKind::Edge };
        g.add_node(Point::new(x, y), kind, FrameRole::Outer)
    }

    /// Прямоугольник `w × h` с узлами рамки через единицу.
    fn rectangle(w: u32, h: u32) -> PlanarGraph {
        let mut g = PlanarGraph::new(f64::from(w), f64::from(h), 1.0);
        let mut ring = Vec::new();
        for x in 0..w {
            ring.push((f64::from(x), 0.0));
        }
        for y in 0..h {
            ring.push((f64::from(w), f64::from(y)));
        }
        for x in (1..=w).rev() {
            ring.push((f64::from(x), f64::from(h)));
        }
        for y in (1..=h).rev() {
            ring.push((0.0, f64::from(y)));
        }
        let corners = [
            (0.0, 0.0),
            (f64::from(w), 0.0),
            (f64::from(w), f64::from(h)),
            (0.0, f64::from(h)),
        ];
        let ids: Vec<NodeId> = ring
            .iter()
            .map(|&(x, y)| frame_node(&mut g, x, y, corners.contains(&(x, y))))
            .collect();
        for i in 0..ids.len() {
            g.add_edge(ids[i], ids[(i + 1) % ids.len()], FrameRole::Outer);
        }
        g.corners = ids
            .iter()
            .copied()
            .filter(|&n| g.node(n).kind == NodeKind::Corner)
            .collect();
        g
    }

    /// Квадрат 4×4, разделённый крестом на четыре квадранта площади 4.
    fn quartered() -> PlanarGraph {
        let mut g = rectangle(4, 4);
        let center = g.add_node(Point::new(2.0, 2.0), NodeKind::Interior, FrameRole::None);
        for mid in [(2.0, 0.0), (4.0, 2.0), (2.0, 4.0), (0.0, 2.0)] {
            let m = g.nodes_near(Point::new(mid.0, mid.1), 0.01)[0];
            g.add_edge(center, m, FrameRole::None);
        }
        g
    }

    fn settings(min: f64, max: f64) -> GenerationSettings {
        GenerationSettings {
            width: 4,
            height: 4,
            min_face_area: min,
            max_face_area: max,
            ..GenerationSettings::default()
        }
    }

    #[test]
    fn merge_yields_union_area() {
        let mut g = quartered();
        let settings = settings(1.0, 8.0);
        let mut ctx = GenerationContext::new(&settings);
        faces::extract_all(&mut g, &mut ctx).unwrap();
        assert_eq!(g.face_count(), 4);

        let f = g.face_ids().next().unwrap();
        let neighbor = g.neighbor_faces(f)[0];
        let before: BTreeSet<EdgeId> = g.face(f).edges.iter().copied().collect();
        let other: BTreeSet<EdgeId> = g.face(neighbor).edges.iter().copied().collect();
        let nodes: BTreeSet<NodeId> = g
            .face(f)
            .nodes
            .iter()
            .chain(&g.face(neighbor).nodes)
            .copied()
            .collect();
        let merged = try_merge(&mut g, f, neighbor).unwrap().expect("merge must succeed");

        // граница слияния — обе границы без общих рёбер
        let boundary: BTreeSet<EdgeId> = g.face(merged).edges.iter().copied().collect();
        let expected: BTreeSet<EdgeId> = before.symmetric_difference(&other).copied().collect();
        assert_eq!(boundary, expected);
        assert_eq!(g.face(merged).edges.len(), expected.len());
        assert!(g.face(merged).nodes.iter().all(|n| nodes.contains(n)));
        assert!((g.face(merged).area - 8.0).abs() < 1e-9);
        assert_eq!(g.face_count(), 3);
        assert!(g.invalid_nodes().is_empty());
        assert!(!g.in_transaction());
    }

    #[test]
    fn undersized_faces_are_merged_pairwise() {
        let mut g = quartered();
        let settings = settings(5.0, 16.0);
        let mut ctx = GenerationContext::new(&settings);
        faces::extract_all(&mut g, &mut ctx).unwrap();

        let merges = merge_undersized(&mut g, &settings).unwrap();
        assert_eq!(merges, 2);
        assert_eq!(g.face_count(), 2);
        for f in g.face_ids() {
            assert!((g.face(f).area - 8.0).abs() < 1e-9);
        }
        assert!(g.invalid_nodes().is_empty());
    }

    #[test]
    fn oversized_face_is_split_into_bounded_parts() {
        let mut g = rectangle(4, 2);
        let settings = settings(1.0, 4.0);
        let mut ctx = GenerationContext::new(&settings);
        faces::extract_all(&mut g, &mut ctx).unwrap();
        assert_eq!(g.face_count(), 1);

        let splits = split_oversized(&mut g, &mut ctx, &settings).unwrap();
        assert!(splits >= 1);
        let total: f64 = g.face_ids().map(|f| g.face(f).area).sum();
        assert!((total - 8.0).abs() < 1e-6);
        check_area_bounds(&g, &settings).unwrap();
        assert!(g.invalid_nodes().is_empty());
    }

    #[test]
    fn failed_merge_leaves_graph_untouched() {
        let mut g = quartered();
        let settings = settings(1.0, 8.0);
        let mut ctx = GenerationContext::new(&settings);
        faces::extract_all(&mut g, &mut ctx).unwrap();
        let ids: Vec<FaceId> = g.face_ids().collect();
        // противоположные квадранты не имеют общих рёбер
        let opposite = ids
            .iter()
            .copied()
            .find(|&h| h != ids[0] && !g.neighbor_faces(ids[0]).contains(&h))
            .unwrap();
        assert!(try_merge(&mut g, ids[0], opposite).unwrap().is_none());
        assert_eq!(g.face_ids().collect::<Vec<_>>(), ids);
    }

    #[test]
    fn cyclic_slices_wrap() {
        assert_eq!(cyclic(&[0, 1, 2, 3, 4], 3, 1), vec![3, 4, 0, 1]);
        assert_eq!(cyclic(&[0, 1, 2], 0, 2), vec![0, 1, 2]);
    }
}
