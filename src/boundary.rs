//! Рамка карты
//!
//! Прямоугольная рамка: каждая сторона проходится от угла до угла, узлы ставятся
//! со случайным шагом в пределах `[segment_min, segment_max]`.
//!
//! Островная рамка: дополнительно строится внутреннее кольцо с дрожанием узлов,
//! его углы соединяются радиальными рёбрами с настоящими углами. Земля растёт только
//! внутри кольца, полосы между кольцом и прямоугольником становятся постоянным океаном.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::graph::geometry::Point;
use crate::graph::{FrameRole, NodeId, NodeKind, PlanarGraph};

/// Прямоугольная область, внутри которой растут линии.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Параметры рамки.
#[derive(Debug, Clone, Copy)]
pub struct FrameSpec {
    pub segment_min: f64,
    pub segment_max: f64,
    /// Отступ внутреннего кольца; `None` — прямоугольная рамка
    pub inset: Option<f64>,
}

/// Строит рамку и возвращает область роста.
pub fn build_frame(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, spec: &FrameSpec) -> Bounds {
    let (w, h) = (graph.width, graph.height);
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    let corner_ids: Vec<NodeId> = corners
        .iter()
        .map(|&p| graph.add_node(p, NodeKind::Corner, FrameRole::Outer))
        .collect();
    for i in 0..4 {
        walk_side(
            graph,
            rng,
            corner_ids[i],
            corner_ids[(i + 1) % 4],
            spec,
            0.0,
            FrameRole::Outer,
        );
    }
    graph.corners.clone_from(&corner_ids);

    let Some(margin) = spec.inset else {
        return Bounds {
            min: corners[0],
            max: corners[2],
        };
    };

    graph.inset = true;
    let inner = [
        Point::new(margin, margin),
        Point::new(w - margin, margin),
        Point::new(w - margin, h - margin),
        Point::new(margin, h - margin),
    ];
    let inner_ids: Vec<NodeId> = inner
        .iter()
        .map(|&p| graph.add_node(p, NodeKind::Edge, FrameRole::Inset))
        .collect();
    let jitter = (spec.segment_min * 0.3).min(margin * 0.3);
    for i in 0..4 {
        walk_side(
            graph,
            rng,
            inner_ids[i],
            inner_ids[(i + 1) % 4],
            spec,
            jitter,
            FrameRole::Inset,
        );
        graph.add_edge(corner_ids[i], inner_ids[i], FrameRole::Inset);
    }
    Bounds {
        min: inner[0],
        max: inner[2],
    }
}

/// Ставит узлы вдоль стороны `from → to` и соединяет их по порядку.
fn walk_side(
    graph: &mut PlanarGraph,
    rng: &mut ChaCha8Rng,
    from: NodeId,
    to: NodeId,
    spec: &FrameSpec,
    jitter: f64,
    frame: FrameRole,
) {
    let (a, b) = (graph.pos(from), graph.pos(to));
    let length = a.distance(b);
    let dir = (b - a) * (1.0 / length);
    let normal = Point::new(-dir.y, dir.x);

    let mut prev = from;
    let mut t = rng.gen_range(spec.segment_min..=spec.segment_max);
    while length - t > spec.segment_min {
        let offset = if jitter > 0.0 {
            rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        let p = a + dir * t + normal * offset;
        let node = graph.add_node(p, NodeKind::Edge, frame);
        graph.add_edge(prev, node, frame);
        prev = node;
        t += rng.gen_range(spec.segment_min..=spec.segment_max);
    }
    graph.add_edge(prev, to, frame);
}
