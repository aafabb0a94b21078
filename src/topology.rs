//! Рельеф полигонов и удалённость узлов от океана
//!
//! Высота считается многоисточниковым обходом в ширину по соседству полигонов:
//! суша у воды получает `+1`, дальше растёт на единицу за шаг; вода у суши — `-1`
//! и убывает вглубь. Полигоны без противоположной стихии (вся карта — вода или
//! вся — суша) получают `±1`.

use log::info;
use std::collections::VecDeque;

use crate::graph::{FaceId, NodeId, NodeKind, PlanarGraph};

/// Проставляет `Face::altitude` всем полигонам.
pub fn assign_altitude(graph: &mut PlanarGraph) {
    let ids: Vec<FaceId> = graph.face_ids().collect();
    let mut depth: Vec<Option<i32>> = vec![None; graph.face_ids().map(|f| f.index() + 1).max().unwrap_or(0)];
    let mut queue = VecDeque::new();

    for &f in &ids {
        let face = graph.face(f);
        let touches_other = face.adjacent.iter().any(|&g| graph.face(g).water != face.water);
        if touches_other {
            depth[f.index()] = Some(1);
            queue.push_back(f);
        }
    }

    while let Some(f) = queue.pop_front() {
        let (water, level) = (graph.face(f).water, depth[f.index()].unwrap_or(1));
        for &g in &graph.face(f).adjacent {
            if graph.face(g).water == water && depth[g.index()].is_none() {
                depth[g.index()] = Some(level + 1);
                queue.push_back(g);
            }
        }
    }

    let mut peak = 0;
    let mut trench = 0;
    for f in ids {
        let level = depth[f.index()].unwrap_or(1);
        let face = graph.face_mut(f);
        face.altitude = if face.water { -level } else { level };
        peak = peak.max(face.altitude);
        trench = trench.min(face.altitude);
    }
    info!("Рельеф: от {trench} до {peak}");
}

/// Проставляет `Node::ocean_distance`: ноль на берегу, дальше по суше
/// на единицу за ребро. Узлы, недостижимые по суше, остаются с нулём.
pub fn assign_ocean_distance(graph: &mut PlanarGraph) {
    let ids: Vec<NodeId> = graph.node_ids().collect();
    let size = ids.last().map_or(0, |n| n.index() + 1);
    let mut distance: Vec<Option<u32>> = vec![None; size];
    let mut queue = VecDeque::new();

    for &n in &ids {
        if graph.node(n).kind == NodeKind::Shore {
            distance[n.index()] = Some(0);
            queue.push_back(n);
        }
    }

    let on_land = |graph: &PlanarGraph, n: NodeId| graph.node(n).faces.iter().any(|&f| graph.face(f).is_land());
    while let Some(n) = queue.pop_front() {
        let next = distance[n.index()].unwrap_or(0) + 1;
        for m in graph.neighbors(n) {
            if distance[m.index()].is_none() && on_land(graph, m) {
                distance[m.index()] = Some(next);
                queue.push_back(m);
            }
        }
    }

    let mut deepest = 0;
    for n in ids {
        let d = distance[n.index()].unwrap_or(0);
        deepest = deepest.max(d);
        graph.node_mut(n).ocean_distance = d;
    }
    info!("Наибольшая удалённость от океана: {deepest}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::geometry::Point;
    use crate::testutil::{face_at, flood, grid};

    #[test]
    fn altitude_grows_away_from_the_coast() {
        let mut g = grid(5, 1, 1.0);
        flood(&mut g, &[(0.5, 0.5), (1.5, 0.5)]);
        assign_altitude(&mut g);
        let alt = |x| g.face(face_at(&g, x, 0.5)).altitude;
        assert_eq!(alt(0.5), -2);
        assert_eq!(alt(1.5), -1);
        assert_eq!(alt(2.5), 1);
        assert_eq!(alt(3.5), 2);
        assert_eq!(alt(4.5), 3);
    }

    #[test]
    fn uniform_map_gets_unit_altitude() {
        let mut g = grid(2, 2, 1.0);
        assign_altitude(&mut g);
        for f in g.face_ids() {
            assert_eq!(g.face(f).altitude, 1);
        }
    }

    #[test]
    fn ocean_distance_counts_land_edges() {
        let mut g = grid(4, 1, 1.0);
        flood(&mut g, &[(0.5, 0.5)]);
        assign_ocean_distance(&mut g);
        let at = |x: f64| {
            let n = g.nodes_near(Point::new(x, 0.0), 0.01)[0];
            g.node(n).ocean_distance
        };
        assert_eq!(at(0.0), 0);
        assert_eq!(at(1.0), 0);
        assert_eq!(at(2.0), 1);
        assert_eq!(at(3.0), 2);
        assert_eq!(at(4.0), 3);
    }
}
