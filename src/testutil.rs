//! Вспомогательные графы для модульных тестов.

use crate::config::GenerationSettings;
use crate::faces;
use crate::generator::GenerationContext;
use crate::graph::geometry::Point;
use crate::graph::{FaceId, FrameRole, NodeId, NodeKind, PlanarGraph};

/// Решётка `cols × rows` квадратов со стороной `cell` в прямоугольной рамке,
/// полигоны уже извлечены.
pub(crate) fn grid(cols: u32, rows: u32, cell: f64) -> PlanarGraph {
    let (w, h) = (f64::from(cols) * cell, f64::from(rows) * cell);
    let mut g = PlanarGraph::new(w, h, cell);
    let mut ids: Vec<Vec<NodeId>> = Vec::new();
    for j in 0..=rows {
        let mut row = Vec::new();
        for i in 0..=cols {
            let border = i == 0 || j == 0 || i == cols || j == rows;
            let corner = (i == 0 || i == cols) && (j == 0 || j == rows);
            let kind = if corner {
                NodeKind::Corner
            } else if border {
                NodeKind::Edge
            } else {
                NodeKind::Interior
            };
            let frame = if border { FrameRole::Outer } else { FrameRole::None };
            row.push(g.add_node(
                Point::new(f64::from(i) * cell, f64::from(j) * cell),
                kind,
                frame,
            ));
        }
        ids.push(row);
    }
    for j in 0..=rows as usize {
        for i in 0..=cols as usize {
            if i < cols as usize {
                let outer = j == 0 || j == rows as usize;
                let frame = if outer { FrameRole::Outer } else { FrameRole::None };
                g.add_edge(ids[j][i], ids[j][i + 1], frame);
            }
            if j < rows as usize {
                let outer = i == 0 || i == cols as usize;
                let frame = if outer { FrameRole::Outer } else { FrameRole::None };
                g.add_edge(ids[j][i], ids[j + 1][i], frame);
            }
        }
    }
    let (c, r) = (cols as usize, rows as usize);
    g.corners = vec![ids[0][0], ids[0][c], ids[r][c], ids[r][0]];
    let mut ctx = GenerationContext::new(&GenerationSettings::default());
    faces::extract_all(&mut g, &mut ctx).expect("grid faces");
    g
}

/// Полигон решётки, содержащий точку.
pub(crate) fn face_at(g: &PlanarGraph, x: f64, y: f64) -> FaceId {
    let p = Point::new(x, y);
    g.face_ids()
        .find(|&f| crate::graph::geometry::point_in_polygon(p, &g.ring_points(f)))
        .expect("point inside the grid")
}

/// Делает водой полигоны, содержащие перечисленные центры клеток.
pub(crate) fn flood(g: &mut PlanarGraph, cells: &[(f64, f64)]) {
    for &(x, y) in cells {
        let f = face_at(g, x, y);
        g.set_water(f, true);
    }
}
