//! Реки: пути по рёбрам графа, стекающие к берегу
//!
//! Река начинается на внутреннем ребре суши вдали от берега и шагает к соседним
//! узлам с не большей удалённостью от океана, предпочитая строго меньшую.
//! Ширина растёт с каждым шагом до собственного предела реки.
//!
//! Встретив узел другой реки, путь вливается в неё, если та не уже текущей
//! ширины; иначе переход закрывается и ищется другой. Тупик — шаг назад,
//! тупик у истока — попытка отменяется.

use log::{debug, info, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

use crate::graph::{EdgeId, EdgeKind, FaceId, FrameRole, NodeId, NodeKind, PlanarGraph, RiverPath};

/// Ширина реки у истока
pub const SOURCE_WIDTH: f64 = 0.1;
/// Исток должен быть не ближе к океану, чем это число рёбер
pub const MIN_SOURCE_DISTANCE: u32 = 2;
/// Одна река на столько полигонов суши
const LAND_FACES_PER_RIVER: usize = 10;
const ATTEMPTS_PER_RIVER: usize = 4;

fn on_land(graph: &PlanarGraph, n: NodeId) -> bool {
    graph.node(n).faces.iter().any(|&f| graph.face(f).is_land())
}

/// Рёбра, с которых может начаться новая река.
#[must_use]
pub fn source_edges(graph: &PlanarGraph) -> Vec<EdgeId> {
    graph
        .edge_ids()
        .filter(|&e| {
            let edge = graph.edge(e);
            if edge.kind != EdgeKind::Inland || edge.frame == FrameRole::Outer || edge.river.is_some() {
                return false;
            }
            let (a, b) = (graph.node(edge.a), graph.node(edge.b));
            let coastal = |k: NodeKind| matches!(k, NodeKind::Shore | NodeKind::Water);
            !coastal(a.kind)
                && !coastal(b.kind)
                && a.river.is_none()
                && b.river.is_none()
                && a.ocean_distance.max(b.ocean_distance) >= MIN_SOURCE_DISTANCE
        })
        .collect()
}

struct Course<'a> {
    graph: &'a mut PlanarGraph,
    id: u32,
    rate: f64,
    cap: f64,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    widths: Vec<f64>,
    visited: BTreeSet<NodeId>,
    dead: BTreeSet<(NodeId, NodeId)>,
}

impl Course<'_> {
    fn claim_node(&mut self, n: NodeId, width: f64) {
        let node = self.graph.node_mut(n);
        node.river = Some(self.id);
        node.river_width = width;
        self.nodes.push(n);
        self.widths.push(width);
        self.visited.insert(n);
    }

    fn claim_edge(&mut self, e: EdgeId, width: f64) {
        let edge = self.graph.edge_mut(e);
        edge.river = Some(self.id);
        edge.river_width = width;
        self.edges.push(e);
    }

    fn release_node(&mut self, n: NodeId) {
        let node = self.graph.node_mut(n);
        if node.river == Some(self.id) {
            node.river = None;
            node.river_width = 0.0;
        }
    }

    fn release_edge(&mut self, e: EdgeId) {
        let edge = self.graph.edge_mut(e);
        if edge.river == Some(self.id) {
            edge.river = None;
            edge.river_width = 0.0;
        }
    }

    fn abandon(&mut self) {
        for n in std::mem::take(&mut self.nodes) {
            self.release_node(n);
        }
        for e in std::mem::take(&mut self.edges) {
            self.release_edge(e);
        }
    }

    /// Отступает на узел назад; `false`, если отступать некуда.
    fn backtrack(&mut self) -> bool {
        if self.nodes.len() <= 2 {
            return false;
        }
        let (Some(n), Some(e)) = (self.nodes.pop(), self.edges.pop()) else {
            return false;
        };
        self.widths.pop();
        self.release_node(n);
        self.release_edge(e);
        if let Some(&prev) = self.nodes.last() {
            self.dead.insert((prev, n));
        }
        true
    }

    fn candidates(&self, current: NodeId) -> Vec<(NodeId, EdgeId)> {
        let g = &*self.graph;
        let level = g.node(current).ocean_distance;
        g.node(current)
            .edges
            .iter()
            .filter_map(|&e| {
                let edge = g.edge(e);
                let m = edge.other(current);
                let open = edge.river.is_none()
                    && edge.frame != FrameRole::Outer
                    && !matches!(edge.kind, EdgeKind::Water | EdgeKind::Boundary)
                    && !self.visited.contains(&m)
                    && !self.dead.contains(&(current, m))
                    && on_land(g, m)
                    && g.node(m).ocean_distance <= level;
                open.then_some((m, e))
            })
            .collect()
    }

    /// Наименьшая ширина рёбер реки `other`, сходящихся в узле.
    fn joint_width(&self, n: NodeId, other: u32) -> f64 {
        let g = &*self.graph;
        g.node(n)
            .edges
            .iter()
            .map(|&e| g.edge(e))
            .filter(|edge| edge.river == Some(other))
            .map(|edge| edge.river_width)
            .reduce(f64::min)
            .unwrap_or(g.node(n).river_width)
    }

    /// Вливается в реку `other` в узле `joint` и дописывает её низовье.
    fn join(&mut self, edge: EdgeId, joint: NodeId, other: u32, width: f64) -> bool {
        let Some(river) = self.graph.rivers.iter().find(|r| r.id == other) else {
            return false;
        };
        let Some(k) = river.nodes.iter().position(|&n| n == joint) else {
            return false;
        };
        let nodes = river.nodes[k..].to_vec();
        let edges = river.edges[k..].to_vec();
        let widths = river.widths[k..].to_vec();

        self.claim_edge(edge, width);
        let mut last = width;
        for (n, w) in nodes.into_iter().zip(widths) {
            last = last.max(w);
            self.nodes.push(n);
            self.widths.push(last);
        }
        self.edges.extend(edges);
        true
    }

    fn run(&mut self, rng: &mut ChaCha8Rng) -> bool {
        loop {
            let Some(&current) = self.nodes.last() else {
                return false;
            };
            if self.graph.node(current).kind == NodeKind::Shore {
                return true;
            }

            let options = self.candidates(current);
            let level = self.graph.node(current).ocean_distance;
            let lower: Vec<(NodeId, EdgeId)> = options
                .iter()
                .copied()
                .filter(|&(m, _)| self.graph.node(m).ocean_distance < level)
                .collect();
            let pool = if lower.is_empty() { options } else { lower };
            if pool.is_empty() {
                if self.backtrack() {
                    continue;
                }
                return false;
            }

            let (next, edge) = pool[rng.gen_range(0..pool.len())];
            let width = self
                .widths
                .last()
                .map_or(SOURCE_WIDTH, |&w| (w + self.rate).min(self.cap.max(w)));

            match self.graph.node(next).river {
                Some(other) if other != self.id => {
                    if self.joint_width(next, other) >= width && self.join(edge, next, other, width) {
                        debug!("Река {} впадает в реку {other} в узле {next}", self.id);
                        return true;
                    }
                    self.dead.insert((current, next));
                }
                _ => {
                    self.claim_edge(edge, width);
                    self.claim_node(next, width);
                }
            }
        }
    }
}

/// Пытается провести реку от ребра `start`; при успехе она добавляется в граф.
pub fn grow_river(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, start: EdgeId) -> bool {
    let id = graph.rivers.iter().map(|r| r.id + 1).max().unwrap_or(0);
    let (a, b) = (graph.edge(start).a, graph.edge(start).b);
    let (source, next) = if graph.node(b).ocean_distance > graph.node(a).ocean_distance {
        (b, a)
    } else {
        (a, b)
    };
    let rate = rng.gen_range(0.05..0.2);
    let cap = rng.gen_range(1.0..3.0);

    let mut course = Course {
        graph,
        id,
        rate,
        cap,
        nodes: Vec::new(),
        edges: Vec::new(),
        widths: Vec::new(),
        visited: BTreeSet::new(),
        dead: BTreeSet::new(),
    };
    course.claim_node(source, SOURCE_WIDTH);
    let width = (SOURCE_WIDTH + rate).min(cap);
    course.claim_edge(start, width);
    course.claim_node(next, width);

    if !course.run(rng) {
        course.abandon();
        warn!("Река от ребра {start} не дошла до берега");
        return false;
    }

    let Course {
        graph, nodes, edges, widths, ..
    } = course;
    let mut seen = BTreeSet::new();
    let faces: Vec<FaceId> = edges
        .iter()
        .flat_map(|&e| graph.edge(e).faces.clone())
        .filter(|&f| seen.insert(f))
        .collect();
    debug!("Река {id}: {} узлов", nodes.len());
    graph.rivers.push(RiverPath {
        id,
        nodes,
        edges,
        faces,
        widths,
    });
    true
}

/// Проводит реки: одна на десять полигонов суши, попыток вчетверо больше.
pub fn grow_rivers(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng) -> usize {
    let land = graph.face_ids().filter(|&f| graph.face(f).is_land()).count();
    let budget = land / LAND_FACES_PER_RIVER;
    let mut grown = 0;
    for _ in 0..budget * ATTEMPTS_PER_RIVER {
        if grown >= budget {
            break;
        }
        let sources = source_edges(graph);
        if sources.is_empty() {
            break;
        }
        let start = sources[rng.gen_range(0..sources.len())];
        if grow_river(graph, rng, start) {
            grown += 1;
        }
    }
    info!("Рек: {grown} из {budget}");
    grown
}
