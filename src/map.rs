//! Готовая карта: плотные идентификаторы, сериализация
//!
//! Слоты арены, освобождённые при починке и балансировке, выбрасываются;
//! узлы, рёбра и полигоны перенумеровываются подряд в порядке исходных
//! идентификаторов.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::biome::Biome;
use crate::config::GenerationSettings;
use crate::error::Result;
use crate::graph::{EdgeId, EdgeKind, FaceId, NodeId, NodeKind, PlanarGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
    pub ocean_distance: u32,
    pub river: Option<u32>,
    pub river_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEdge {
    pub id: u32,
    pub a: u32,
    pub b: u32,
    pub kind: EdgeKind,
    pub river: Option<u32>,
    pub width: f64,
    pub faces: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapFace {
    pub id: u32,
    pub nodes: Vec<u32>,
    pub edges: Vec<u32>,
    pub water: bool,
    pub outer: bool,
    pub area: f64,
    pub centroid: [f64; 2],
    pub altitude: i32,
    pub biome: Option<Biome>,
    pub temperature: f64,
    pub precipitation: f64,
    pub landmass: Option<u32>,
    pub water_body: Option<u32>,
    pub continent: Option<u32>,
    pub adjacent: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRiver {
    pub id: u32,
    pub nodes: Vec<u32>,
    pub edges: Vec<u32>,
    pub faces: Vec<u32>,
    pub widths: Vec<f64>,
}

/// Переправа через воду и концы отрезка для отрисовки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConnection {
    pub a: u32,
    pub b: u32,
    pub from: [f64; 2],
    pub to: [f64; 2],
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub settings: GenerationSettings,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<MapNode>,
    pub edges: Vec<MapEdge>,
    pub faces: Vec<MapFace>,
    pub rivers: Vec<MapRiver>,
    pub landmasses: Vec<Vec<u32>>,
    pub water_bodies: Vec<Vec<u32>>,
    pub continents: Vec<Vec<u32>>,
    pub water_connections: Vec<MapConnection>,
}

/// Отображение разреженных идентификаторов арены в плотные.
struct Dense(Vec<Option<u32>>);

impl Dense {
    fn new(ids: impl Iterator<Item = usize>) -> Self {
        let mut table = Vec::new();
        for (next, index) in ids.enumerate() {
            if table.len() <= index {
                table.resize(index + 1, None);
            }
            table[index] = Some(next as u32);
        }
        Self(table)
    }

    fn get(&self, index: usize) -> u32 {
        self.0.get(index).copied().flatten().unwrap_or(u32::MAX)
    }
}

impl Map {
    #[must_use]
    pub fn from_graph(graph: &PlanarGraph, settings: &GenerationSettings) -> Self {
        let node_ids = Dense::new(graph.node_ids().map(NodeId::index));
        let edge_ids = Dense::new(graph.edge_ids().map(EdgeId::index));
        let face_ids = Dense::new(graph.face_ids().map(FaceId::index));
        let n = |id: &NodeId| node_ids.get(id.index());
        let e = |id: &EdgeId| edge_ids.get(id.index());
        let f = |id: &FaceId| face_ids.get(id.index());
        let faces_of = |list: &[FaceId]| list.iter().map(f).collect::<Vec<u32>>();

        let nodes = graph
            .node_ids()
            .map(|id| {
                let node = graph.node(id);
                MapNode {
                    id: n(&id),
                    x: node.pos.x,
                    y: node.pos.y,
                    kind: node.kind,
                    ocean_distance: node.ocean_distance,
                    river: node.river,
                    river_width: node.river_width,
                }
            })
            .collect();
        let edges = graph
            .edge_ids()
            .map(|id| {
                let edge = graph.edge(id);
                MapEdge {
                    id: e(&id),
                    a: n(&edge.a),
                    b: n(&edge.b),
                    kind: edge.kind,
                    river: edge.river,
                    width: edge.river_width,
                    faces: faces_of(&edge.faces),
                }
            })
            .collect();
        let faces = graph
            .face_ids()
            .map(|id| {
                let face = graph.face(id);
                MapFace {
                    id: f(&id),
                    nodes: face.nodes.iter().map(n).collect(),
                    edges: face.edges.iter().map(e).collect(),
                    water: face.water,
                    outer: face.outer,
                    area: face.area,
                    centroid: [face.centroid.x, face.centroid.y],
                    altitude: face.altitude,
                    biome: face.biome,
                    temperature: face.temperature,
                    precipitation: face.precipitation,
                    landmass: face.landmass,
                    water_body: face.water_body,
                    continent: face.continent,
                    adjacent: faces_of(&face.adjacent),
                }
            })
            .collect();
        let rivers = graph
            .rivers
            .iter()
            .map(|r| MapRiver {
                id: r.id,
                nodes: r.nodes.iter().map(n).collect(),
                edges: r.edges.iter().map(e).collect(),
                faces: faces_of(&r.faces),
                widths: r.widths.clone(),
            })
            .collect();
        let water_connections = graph
            .water_connections
            .iter()
            .map(|c| MapConnection {
                a: f(&c.a),
                b: f(&c.b),
                from: [c.point_a.x, c.point_a.y],
                to: [c.point_b.x, c.point_b.y],
                distance: c.distance,
            })
            .collect();

        Self {
            settings: settings.clone(),
            width: graph.width,
            height: graph.height,
            nodes,
            edges,
            faces,
            rivers,
            landmasses: graph.landmasses.iter().map(|g| faces_of(g)).collect(),
            water_bodies: graph.water_bodies.iter().map(|g| faces_of(g)).collect(),
            continents: graph.continents.iter().map(|g| faces_of(g)).collect(),
            water_connections,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Доля площади суши среди полигонов без внешнего кольца.
    #[must_use]
    pub fn land_ratio(&self) -> f64 {
        let playable = self.faces.iter().filter(|f| !f.outer);
        let (land, total) = playable.fold((0.0, 0.0), |(land, total), f| {
            (if f.water { land } else { land + f.area }, total + f.area)
        });
        if total > 0.0 { land / total } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{flood, grid};

    #[test]
    fn ids_are_dense_after_removals() {
        let mut g = grid(3, 1, 1.0);
        let dropped = g.node_ids().find(|&n| g.node(n).degree() == 3).unwrap();
        g.remove_node(dropped);
        g.clear_faces();
        let map = Map::from_graph(&g, &GenerationSettings::default());
        for (i, node) in map.nodes.iter().enumerate() {
            assert_eq!(node.id as usize, i);
        }
        for edge in &map.edges {
            assert!((edge.a as usize) < map.nodes.len());
            assert!((edge.b as usize) < map.nodes.len());
        }
    }

    #[test]
    fn json_round_trip_through_a_file() {
        let mut g = grid(2, 2, 1.0);
        flood(&mut g, &[(0.5, 0.5)]);
        let map = Map::from_graph(&g, &GenerationSettings::default());
        assert!((map.land_ratio() - 0.75).abs() < 1e-9);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        map.save_json(&path).unwrap();
        let loaded = Map::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, map);
    }
}
