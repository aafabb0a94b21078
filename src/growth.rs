//! Рост линий
//!
//! Линии стартуют из сетки затравок и растут короткими шагами со случайным поворотом.
//! Каждый шаг разрешается в одном порядке:
//!
//! 1. рядом с концом шага есть узел — прилипаем к нему;
//! 2. шаг пересекает ребро — соединяемся с ближайшим концом пересечённого ребра;
//! 3. конец шага слишком близко к ребру — соединяемся с концом этого ребра;
//! 4. иначе ставим новый узел.
//!
//! Любое соединение проходит проверку допустимости: без пересечений, без узлов вплотную
//! к отрезку и без слишком острых углов с уже существующими рёбрами. Поэтому граф
//! остаётся плоским на всём протяжении роста.
//!
//! Очередь линий строго FIFO: все линии продвигаются по очереди, по шагу за раз.

use log::{debug, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::{PI, TAU};

use crate::config::GenerationSettings;
use crate::generator::GenerationContext;
use crate::graph::geometry::{Point, angle_between, point_segment_distance, segment_crossing};
use crate::graph::{FrameRole, NodeId, NodeKind, PlanarGraph};

/// Сколько раз пытаться найти направление ответвления.
const FORK_ATTEMPTS: usize = 8;

/// Геометрические параметры роста, выведенные из масштаба длины `L`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthProfile {
    pub step_min: f64,
    pub step_max: f64,
    /// Максимальный случайный поворот за шаг (радианы)
    pub max_turn: f64,
    /// Радиус прилипания к существующему узлу
    pub snap_distance: f64,
    /// Минимальное расстояние от чужого узла до нового отрезка
    pub clearance: f64,
    /// Минимальное расстояние от нового узла до чужого ребра
    pub edge_proximity: f64,
    /// Минимальный угол между рёбрами одного узла
    pub min_edge_angle: f64,
    /// Минимальный угол ответвления от существующих направлений
    pub min_fork_angle: f64,
    pub split_chance: f64,
    pub max_walk_steps: u32,
    pub seed_spacing: f64,
    pub frame_segment_min: f64,
    pub frame_segment_max: f64,
    pub inset_margin: f64,
    /// Предохранитель от неконтролируемого роста
    pub max_nodes: usize,
}

impl GrowthProfile {
    #[must_use]
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        let l = settings.length_scale();
        let expected_nodes = settings.map_area() / (l * l);
        Self {
            step_min: 0.35 * l,
            step_max: 0.7 * l,
            max_turn: 0.45,
            snap_distance: 0.3 * l,
            clearance: 0.08 * l,
            edge_proximity: 0.15 * l,
            min_edge_angle: 0.3,
            min_fork_angle: 0.9,
            split_chance: 0.08,
            max_walk_steps: 200,
            seed_spacing: 1.6 * l / settings.map_type.seed_density().sqrt(),
            frame_segment_min: 0.5 * l,
            frame_segment_max: 0.9 * l,
            inset_margin: settings.inset_margin(),
            max_nodes: (expected_nodes * 12.0) as usize + 2000,
        }
    }
}

/// Растущая линия в очереди.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walk {
    pub from: NodeId,
    pub heading: f64,
    pub steps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Поставлен новый узел, линия продолжается
    Extended(NodeId, f64),
    /// Линия прилипла к существующему узлу и завершилась
    Snapped(NodeId),
    /// Шаг невозможен
    Stopped,
}

enum Target {
    Existing(NodeId),
    New,
    Blocked,
}

/// Путь одиночной линии (без ответвлений).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkPath {
    /// Узлы после стартового, последний — точка прилипания, если она есть
    pub nodes: Vec<NodeId>,
    pub snapped: bool,
}

/// Отрезок `a`–`b` не пересекает рёбра и не проходит вплотную к узлам.
///
/// Рёбра, инцидентные узлам из `ends`, и сами эти узлы не проверяются.
#[must_use]
pub fn segment_is_clear(
    graph: &PlanarGraph,
    profile: &GrowthProfile,
    a: Point,
    b: Point,
    ends: &[NodeId],
) -> bool {
    for e in graph.edges_in_box(a, b, 0.0) {
        let edge = graph.edge(e);
        if ends.contains(&edge.a) || ends.contains(&edge.b) {
            continue;
        }
        let (c, d) = graph.segment(e);
        if segment_crossing(a, b, c, d).is_some() {
            return false;
        }
    }
    graph
        .nodes_in_box(a, b, profile.clearance)
        .into_iter()
        .filter(|n| !ends.contains(n))
        .all(|n| point_segment_distance(graph.pos(n), a, b) >= profile.clearance)
}

/// Направление `direction` из узла не ближе `min_edge_angle` к его рёбрам.
#[must_use]
pub fn angle_is_clear(graph: &PlanarGraph, profile: &GrowthProfile, node: NodeId, direction: f64) -> bool {
    let origin = graph.pos(node);
    graph
        .neighbors(node)
        .into_iter()
        .all(|n| angle_between(direction, origin.angle_to(graph.pos(n))) >= profile.min_edge_angle)
}

/// Можно ли соединить два существующих узла новым ребром.
#[must_use]
pub fn can_connect(graph: &PlanarGraph, profile: &GrowthProfile, from: NodeId, to: NodeId) -> bool {
    if from == to || graph.edge_between(from, to).is_some() {
        return false;
    }
    let (a, b) = (graph.pos(from), graph.pos(to));
    if a.distance(b) <= f64::EPSILON {
        return false;
    }
    segment_is_clear(graph, profile, a, b, &[from, to])
        && angle_is_clear(graph, profile, from, a.angle_to(b))
        && angle_is_clear(graph, profile, to, b.angle_to(a))
}

fn try_endpoints(
    graph: &PlanarGraph,
    profile: &GrowthProfile,
    from: NodeId,
    mut endpoints: Vec<NodeId>,
    anchor: Point,
) -> Target {
    endpoints.sort_by(|&a, &b| {
        graph
            .pos(a)
            .distance(anchor)
            .total_cmp(&graph.pos(b).distance(anchor))
            .then(a.cmp(&b))
    });
    endpoints
        .into_iter()
        .find(|&n| can_connect(graph, profile, from, n))
        .map_or(Target::Blocked, Target::Existing)
}

fn resolve_target(graph: &PlanarGraph, profile: &GrowthProfile, from: NodeId, candidate: Point) -> Target {
    let origin = graph.pos(from);

    // 1. прилипание к узлу
    let near: Vec<NodeId> = graph
        .nodes_near(candidate, profile.snap_distance)
        .into_iter()
        .filter(|&n| n != from)
        .collect();
    if !near.is_empty() {
        return near
            .into_iter()
            .find(|&n| can_connect(graph, profile, from, n))
            .map_or(Target::Blocked, Target::Existing);
    }

    // 2. ближайшее пересечение
    let crossing = graph
        .edges_in_box(origin, candidate, 0.0)
        .into_iter()
        .filter(|&e| {
            let edge = graph.edge(e);
            edge.a != from && edge.b != from
        })
        .filter_map(|e| {
            let (c, d) = graph.segment(e);
            segment_crossing(origin, candidate, c, d).map(|t| (t, e))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    if let Some((t, e)) = crossing {
        let edge = graph.edge(e);
        return try_endpoints(graph, profile, from, vec![edge.a, edge.b], origin.lerp(candidate, t));
    }

    // 3. конец шага вплотную к ребру
    let close_edge = graph
        .edges_in_box(candidate, candidate, profile.edge_proximity)
        .into_iter()
        .filter(|&e| {
            let edge = graph.edge(e);
            edge.a != from && edge.b != from
        })
        .map(|e| {
            let (c, d) = graph.segment(e);
            (point_segment_distance(candidate, c, d), e)
        })
        .filter(|(d, _)| *d < profile.edge_proximity)
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    if let Some((_, e)) = close_edge {
        let edge = graph.edge(e);
        return try_endpoints(graph, profile, from, vec![edge.a, edge.b], candidate);
    }

    // 4. новый узел
    let inside = (0.0..=graph.width).contains(&candidate.x) && (0.0..=graph.height).contains(&candidate.y);
    if inside
        && segment_is_clear(graph, profile, origin, candidate, &[from])
        && angle_is_clear(graph, profile, from, origin.angle_to(candidate))
    {
        return Target::New;
    }
    // узел вплотную к отрезку: пробуем соединиться с ним
    let beside: Vec<NodeId> = graph
        .nodes_in_box(origin, candidate, profile.clearance)
        .into_iter()
        .filter(|&n| n != from && point_segment_distance(graph.pos(n), origin, candidate) < profile.clearance)
        .collect();
    try_endpoints(graph, profile, from, beside, candidate)
}

/// Один шаг линии из `from` в направлении `heading`.
pub fn step(
    graph: &mut PlanarGraph,
    rng: &mut ChaCha8Rng,
    profile: &GrowthProfile,
    from: NodeId,
    heading: f64,
) -> StepOutcome {
    let heading = heading + rng.gen_range(-profile.max_turn..=profile.max_turn);
    let length = rng.gen_range(profile.step_min..=profile.step_max);
    let candidate = graph.pos(from) + Point::from_angle(heading) * length;

    match resolve_target(graph, profile, from, candidate) {
        Target::Existing(n) => {
            graph.add_edge(from, n, FrameRole::None);
            StepOutcome::Snapped(n)
        }
        Target::New => {
            let n = graph.add_node(candidate, NodeKind::Interior, FrameRole::None);
            graph.add_edge(from, n, FrameRole::None);
            StepOutcome::Extended(n, heading)
        }
        Target::Blocked => StepOutcome::Stopped,
    }
}

/// Направление ответвления, достаточно далёкое от рёбер узла и от продолжения линии.
fn fork_heading(
    graph: &PlanarGraph,
    rng: &mut ChaCha8Rng,
    profile: &GrowthProfile,
    node: NodeId,
    continuation: f64,
) -> Option<f64> {
    let origin = graph.pos(node);
    let mut taken: Vec<f64> = graph
        .neighbors(node)
        .into_iter()
        .map(|n| origin.angle_to(graph.pos(n)))
        .collect();
    taken.push(continuation);
    (0..FORK_ATTEMPTS)
        .map(|_| rng.gen_range(0.0..TAU))
        .find(|&h| taken.iter().all(|&t| angle_between(h, t) >= profile.min_fork_angle))
}

/// Засевает сетку стартовых точек внутри области роста; из каждой — две линии навстречу друг другу.
pub fn seed_walks(graph: &mut PlanarGraph, ctx: &mut GenerationContext) -> usize {
    let profile = ctx.profile;
    let bounds = ctx.bounds;
    let spacing = profile.seed_spacing;
    let cols = ((bounds.width() / spacing).floor() as usize).max(1);
    let rows = ((bounds.height() / spacing).floor() as usize).max(1);
    let (sx, sy) = (bounds.width() / cols as f64, bounds.height() / rows as f64);
    let margin = profile.snap_distance + profile.clearance;

    let mut seeded = 0;
    for row in 0..rows {
        for col in 0..cols {
            let jx = ctx.rng.gen_range(-0.3..=0.3);
            let jy = ctx.rng.gen_range(-0.3..=0.3);
            let p = Point::new(
                bounds.min.x + (col as f64 + 0.5 + jx) * sx,
                bounds.min.y + (row as f64 + 0.5 + jy) * sy,
            );
            let inside = p.x - bounds.min.x >= margin
                && bounds.max.x - p.x >= margin
                && p.y - bounds.min.y >= margin
                && bounds.max.y - p.y >= margin;
            if !inside || !graph.nodes_near(p, profile.snap_distance).is_empty() {
                continue;
            }
            let node = graph.add_node(p, NodeKind::Interior, FrameRole::None);
            let heading = ctx.rng.gen_range(0.0..TAU);
            ctx.queue.push_back(Walk { from: node, heading, steps: 0 });
            ctx.queue.push_back(Walk {
                from: node,
                heading: heading + PI,
                steps: 0,
            });
            seeded += 1;
        }
    }
    debug!("Затравок роста: {seeded} ({cols}×{rows})");
    seeded
}

/// Продвигает линии из очереди, пока она не опустеет. Возвращает число шагов.
pub fn grow(graph: &mut PlanarGraph, ctx: &mut GenerationContext) -> usize {
    let profile = ctx.profile;
    let mut steps = 0;
    let mut capped = 0;
    while let Some(walk) = ctx.queue.pop_front() {
        if graph.node_count() >= profile.max_nodes {
            warn!(
                "Рост остановлен: достигнут предел в {} узлов, в очереди {} линий",
                profile.max_nodes,
                ctx.queue.len() + 1
            );
            ctx.queue.clear();
            break;
        }
        steps += 1;
        let StepOutcome::Extended(node, heading) = step(graph, &mut ctx.rng, &profile, walk.from, walk.heading)
        else {
            continue;
        };
        if walk.steps + 1 >= profile.max_walk_steps {
            capped += 1;
            continue;
        }
        ctx.queue.push_back(Walk {
            from: node,
            heading,
            steps: walk.steps + 1,
        });
        if !ctx.rng.gen_bool(profile.split_chance) {
            continue;
        }
        if let Some(fork) = fork_heading(graph, &mut ctx.rng, &profile, node, heading) {
            ctx.queue.push_back(Walk {
                from: node,
                heading: fork,
                steps: walk.steps + 1,
            });
        }
    }
    if capped > 0 {
        warn!("{capped} линий остановлено по лимиту шагов");
    }
    steps
}

/// Одиночная линия без ответвлений (для разрезания полигона).
pub fn straight_walk(
    graph: &mut PlanarGraph,
    rng: &mut ChaCha8Rng,
    profile: &GrowthProfile,
    start: NodeId,
    heading: f64,
) -> WalkPath {
    let mut path = WalkPath::default();
    let (mut cur, mut heading) = (start, heading);
    for _ in 0..profile.max_walk_steps {
        match step(graph, rng, profile, cur, heading) {
            StepOutcome::Extended(n, h) => {
                path.nodes.push(n);
                cur = n;
                heading = h;
            }
            StepOutcome::Snapped(n) => {
                path.nodes.push(n);
                path.snapped = true;
                break;
            }
            StepOutcome::Stopped => break,
        }
    }
    path
}
