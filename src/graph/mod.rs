//! Плоский граф карты: узлы, рёбра, полигоны
//!
//! ## Архитектура
//!
//! Взаимные ссылки узел ↔ ребро ↔ полигон хранятся как идентификаторы в аренах
//! (`Vec<Option<_>>`). Удалённый слот остаётся `None`, идентификаторы никогда не
//! переиспользуются, поэтому откат восстанавливает в точности прежнее состояние.
//!
//! ## Журнал
//!
//! Пока открыта транзакция ([`PlanarGraph::begin`]), каждое структурное изменение
//! (добавление или удаление узла, ребра, полигона) записывается в журнал.
//! [`PlanarGraph::rollback`] отменяет их в обратном порядке. Атрибуты (вода, реки,
//! биомы) журналом не покрываются.
//!
//! Списки инцидентности (`Node::edges`, `Node::faces`, `Edge::faces`) всегда отсортированы.

pub mod geometry;
pub mod spatial;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::biome::Biome;
use geometry::{Point, centroid, signed_area};
use spatial::SpatialGrid;

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

id_type!(NodeId, "n");
id_type!(EdgeId, "e");
id_type!(FaceId, "f");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Interior,
    Edge,
    Corner,
    Shore,
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Boundary,
    Inland,
    Shore,
    Water,
}

/// Принадлежность к рамке карты
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRole {
    None,
    /// Внешний прямоугольник
    Outer,
    /// Внутреннее кольцо островной рамки и радиальные рёбра к углам
    Inset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub pos: Point,
    pub kind: NodeKind,
    pub frame: FrameRole,
    pub edges: Vec<EdgeId>,
    pub faces: Vec<FaceId>,
    pub river: Option<u32>,
    pub river_width: f64,
    pub ocean_distance: u32,
}

impl Node {
    #[must_use]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    pub kind: EdgeKind,
    pub frame: FrameRole,
    pub faces: Vec<FaceId>,
    pub river: Option<u32>,
    pub river_width: f64,
}

impl Edge {
    /// Второй конец ребра.
    #[must_use]
    pub fn other(&self, n: NodeId) -> NodeId {
        if self.a == n { self.b } else { self.a }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Вершины в порядке обхода против часовой стрелки
    pub nodes: Vec<NodeId>,
    /// `edges[i]` соединяет `nodes[i]` и `nodes[i + 1]`
    pub edges: Vec<EdgeId>,
    pub area: f64,
    pub centroid: Point,
    pub water: bool,
    /// Постоянное кольцо океана, не подчиняется ограничениям площади
    pub outer: bool,
    pub altitude: i32,
    pub biome: Option<Biome>,
    pub temperature: f64,
    pub precipitation: f64,
    pub landmass: Option<u32>,
    pub water_body: Option<u32>,
    pub continent: Option<u32>,
    pub adjacent: Vec<FaceId>,
}

impl Face {
    #[must_use]
    pub fn new(nodes: Vec<NodeId>, edges: Vec<EdgeId>, points: &[Point], outer: bool) -> Self {
        Self {
            nodes,
            edges,
            area: signed_area(points),
            centroid: centroid(points),
            water: outer,
            outer,
            altitude: 0,
            biome: None,
            temperature: 0.0,
            precipitation: 0.0,
            landmass: None,
            water_body: None,
            continent: None,
            adjacent: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_land(&self) -> bool {
        !self.water
    }
}

/// Связь через воду между двумя полигонами суши
#[derive(Debug, Clone, PartialEq)]
pub struct WaterConnection {
    pub a: FaceId,
    pub b: FaceId,
    pub point_a: Point,
    pub point_b: Point,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiverPath {
    pub id: u32,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub faces: Vec<FaceId>,
    /// Ширина в каждом узле пути
    pub widths: Vec<f64>,
}

#[derive(Debug, Clone)]
enum Change {
    AddNode(NodeId),
    AddEdge(EdgeId),
    AddFace(FaceId),
    RemoveNode(NodeId, Node),
    RemoveEdge(EdgeId, Edge),
    RemoveFace(FaceId, Face),
}

fn insert_sorted<T: Ord>(list: &mut Vec<T>, item: T) {
    if let Err(pos) = list.binary_search(&item) {
        list.insert(pos, item);
    }
}

fn remove_sorted<T: Ord>(list: &mut Vec<T>, item: &T) {
    if let Ok(pos) = list.binary_search(item) {
        list.remove(pos);
    }
}

#[derive(Debug, Clone)]
pub struct PlanarGraph {
    pub width: f64,
    pub height: f64,
    /// Четыре угла внешнего прямоугольника
    pub corners: Vec<NodeId>,
    /// Островная рамка: внешнее кольцо полигонов — постоянный океан
    pub inset: bool,
    pub landmasses: Vec<Vec<FaceId>>,
    pub water_bodies: Vec<Vec<FaceId>>,
    pub continents: Vec<Vec<FaceId>>,
    pub water_connections: Vec<WaterConnection>,
    pub rivers: Vec<RiverPath>,
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    faces: Vec<Option<Face>>,
    node_grid: SpatialGrid<NodeId>,
    edge_grid: SpatialGrid<EdgeId>,
    journal: Option<Vec<Change>>,
}

impl PlanarGraph {
    /// Пустой граф; `cell` — размер клетки пространственного индекса.
    #[must_use]
    pub fn new(width: f64, height: f64, cell: f64) -> Self {
        Self {
            width,
            height,
            corners: Vec::new(),
            inset: false,
            landmasses: Vec::new(),
            water_bodies: Vec::new(),
            continents: Vec::new(),
            water_connections: Vec::new(),
            rivers: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            node_grid: SpatialGrid::new(cell),
            edge_grid: SpatialGrid::new(cell),
            journal: None,
        }
    }

    // --- доступ ---------------------------------------------------------------

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("node {id} was removed"))
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("node {id} was removed"))
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        self.edges[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("edge {id} was removed"))
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.edges[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("edge {id} was removed"))
    }

    #[must_use]
    pub fn face(&self, id: FaceId) -> &Face {
        self.faces[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("face {id} was removed"))
    }

    pub fn face_mut(&mut self, id: FaceId) -> &mut Face {
        self.faces[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("face {id} was removed"))
    }

    #[must_use]
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn has_edge(&self, id: EdgeId) -> bool {
        self.edges.get(id.index()).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn has_face(&self, id: FaceId) -> bool {
        self.faces.get(id.index()).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn pos(&self, id: NodeId) -> Point {
        self.node(id).pos
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| EdgeId(i as u32))
    }

    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_some())
            .map(|(i, _)| FaceId(i as u32))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_some()).count()
    }

    /// Верхняя граница идентификаторов рёбер (для ограничения обходов).
    #[must_use]
    pub fn edge_capacity(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.node(a)
            .edges
            .iter()
            .copied()
            .find(|&e| self.edge(e).other(a) == b)
    }

    #[must_use]
    pub fn neighbors(&self, n: NodeId) -> Vec<NodeId> {
        self.node(n)
            .edges
            .iter()
            .map(|&e| self.edge(e).other(n))
            .collect()
    }

    #[must_use]
    pub fn segment(&self, e: EdgeId) -> (Point, Point) {
        let edge = self.edge(e);
        (self.pos(edge.a), self.pos(edge.b))
    }

    #[must_use]
    pub fn ring_points(&self, f: FaceId) -> Vec<Point> {
        self.face(f).nodes.iter().map(|&n| self.pos(n)).collect()
    }

    /// Узлы в радиусе `radius` от `p`, по возрастанию расстояния.
    #[must_use]
    pub fn nodes_near(&self, p: Point, radius: f64) -> Vec<NodeId> {
        let mut hits: Vec<(f64, NodeId)> = self
            .node_grid
            .query(p, p, radius)
            .into_iter()
            .map(|n| (self.pos(n).distance(p), n))
            .filter(|(d, _)| *d <= radius)
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, n)| n).collect()
    }

    /// Кандидаты-узлы в прямоугольнике отрезка `a`–`b`, расширенном на `margin`.
    #[must_use]
    pub fn nodes_in_box(&self, a: Point, b: Point, margin: f64) -> Vec<NodeId> {
        self.node_grid.query(a, b, margin)
    }

    /// Кандидаты-рёбра в прямоугольнике отрезка `a`–`b`, расширенном на `margin`.
    #[must_use]
    pub fn edges_in_box(&self, a: Point, b: Point, margin: f64) -> Vec<EdgeId> {
        self.edge_grid.query(a, b, margin)
    }

    /// Узел допустим, если у него полигонов не меньше, чем рёбер
    /// (у узлов внешнего прямоугольника — на один меньше: снаружи нет полигона).
    #[must_use]
    pub fn is_node_valid(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.faces.is_empty() {
            return false;
        }
        let on_outer = node
            .edges
            .iter()
            .any(|&e| self.edge(e).frame == FrameRole::Outer);
        let expected = node.degree().saturating_sub(usize::from(on_outer));
        node.faces.len() >= expected
    }

    #[must_use]
    pub fn invalid_nodes(&self) -> Vec<NodeId> {
        self.node_ids().filter(|&n| !self.is_node_valid(n)).collect()
    }

    // --- изменение ------------------------------------------------------------

    fn record(&mut self, change: Change) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(change);
        }
    }

    pub fn add_node(&mut self, pos: Point, kind: NodeKind, frame: FrameRole) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            pos,
            kind,
            frame,
            edges: Vec::new(),
            faces: Vec::new(),
            river: None,
            river_width: 0.0,
            ocean_distance: 0,
        }));
        self.node_grid.insert_point(id, pos);
        self.record(Change::AddNode(id));
        id
    }

    pub fn add_edge(&mut self, a: NodeId, b: NodeId, frame: FrameRole) -> EdgeId {
        debug_assert!(a != b, "self-loop at {a}");
        let id = EdgeId(self.edges.len() as u32);
        let kind = if frame == FrameRole::Outer {
            EdgeKind::Boundary
        } else {
            EdgeKind::Inland
        };
        self.edges.push(Some(Edge {
            a,
            b,
            kind,
            frame,
            faces: Vec::new(),
            river: None,
            river_width: 0.0,
        }));
        let (pa, pb) = (self.pos(a), self.pos(b));
        self.edge_grid.insert_segment(id, pa, pb);
        insert_sorted(&mut self.node_mut(a).edges, id);
        insert_sorted(&mut self.node_mut(b).edges, id);
        self.record(Change::AddEdge(id));
        id
    }

    pub fn add_face(&mut self, face: Face) -> FaceId {
        let id = FaceId(self.faces.len() as u32);
        self.faces.push(Some(face));
        self.attach_face(id);
        self.record(Change::AddFace(id));
        id
    }

    fn attach_face(&mut self, id: FaceId) {
        let face = self.face(id);
        let (nodes, edges) = (face.nodes.clone(), face.edges.clone());
        for n in nodes {
            insert_sorted(&mut self.node_mut(n).faces, id);
        }
        for e in edges {
            insert_sorted(&mut self.edge_mut(e).faces, id);
        }
    }

    fn detach_face(&mut self, id: FaceId) -> Face {
        let face = self.faces[id.index()]
            .take()
            .unwrap_or_else(|| panic!("face {id} was removed"));
        for &n in &face.nodes {
            remove_sorted(&mut self.node_mut(n).faces, &id);
        }
        for &e in &face.edges {
            remove_sorted(&mut self.edge_mut(e).faces, &id);
        }
        face
    }

    fn detach_edge(&mut self, id: EdgeId) -> Edge {
        let (pa, pb) = self.segment(id);
        let edge = self.edges[id.index()]
            .take()
            .unwrap_or_else(|| panic!("edge {id} was removed"));
        self.edge_grid.remove_segment(id, pa, pb);
        remove_sorted(&mut self.node_mut(edge.a).edges, &id);
        remove_sorted(&mut self.node_mut(edge.b).edges, &id);
        edge
    }

    fn detach_node(&mut self, id: NodeId) -> Node {
        let node = self.nodes[id.index()]
            .take()
            .unwrap_or_else(|| panic!("node {id} was removed"));
        self.node_grid.remove_point(id, node.pos);
        node
    }

    pub fn remove_face(&mut self, id: FaceId) -> Face {
        let face = self.detach_face(id);
        self.record(Change::RemoveFace(id, face.clone()));
        face
    }

    /// Удаляет ребро вместе с прилегающими полигонами.
    pub fn remove_edge(&mut self, id: EdgeId) {
        for f in self.edge(id).faces.clone() {
            self.remove_face(f);
        }
        let edge = self.detach_edge(id);
        self.record(Change::RemoveEdge(id, edge));
    }

    /// Удаляет узел вместе с инцидентными рёбрами и полигонами.
    pub fn remove_node(&mut self, id: NodeId) {
        for f in self.node(id).faces.clone() {
            self.remove_face(f);
        }
        for e in self.node(id).edges.clone() {
            self.remove_edge(e);
        }
        let node = self.detach_node(id);
        self.record(Change::RemoveNode(id, node));
    }

    /// Удаляет все полигоны (перед глобальным повторным извлечением).
    pub fn clear_faces(&mut self) {
        let ids: Vec<FaceId> = self.face_ids().collect();
        for f in ids {
            self.remove_face(f);
        }
    }

    // --- транзакции -----------------------------------------------------------

    /// Открывает транзакцию. Вложенные транзакции не поддерживаются.
    pub fn begin(&mut self) {
        debug_assert!(self.journal.is_none(), "nested transaction");
        self.journal = Some(Vec::new());
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    /// Узлы, созданные в текущей транзакции.
    #[must_use]
    pub fn created_nodes(&self) -> Vec<NodeId> {
        self.journal
            .iter()
            .flatten()
            .filter_map(|c| match c {
                Change::AddNode(n) => Some(*n),
                _ => None,
            })
            .filter(|&n| self.has_node(n))
            .collect()
    }

    /// Полигоны, созданные в текущей транзакции и ещё существующие.
    #[must_use]
    pub fn created_faces(&self) -> Vec<FaceId> {
        self.journal
            .iter()
            .flatten()
            .filter_map(|c| match c {
                Change::AddFace(f) => Some(*f),
                _ => None,
            })
            .filter(|&f| self.has_face(f))
            .collect()
    }

    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Отменяет все изменения текущей транзакции в обратном порядке.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for change in journal.into_iter().rev() {
            match change {
                Change::AddFace(id) => {
                    self.detach_face(id);
                }
                Change::AddEdge(id) => {
                    self.detach_edge(id);
                }
                Change::AddNode(id) => {
                    self.detach_node(id);
                }
                Change::RemoveNode(id, node) => {
                    self.node_grid.insert_point(id, node.pos);
                    self.nodes[id.index()] = Some(node);
                }
                Change::RemoveEdge(id, edge) => {
                    let (a, b) = (edge.a, edge.b);
                    self.edges[id.index()] = Some(edge);
                    let (pa, pb) = (self.pos(a), self.pos(b));
                    self.edge_grid.insert_segment(id, pa, pb);
                    insert_sorted(&mut self.node_mut(a).edges, id);
                    insert_sorted(&mut self.node_mut(b).edges, id);
                }
                Change::RemoveFace(id, face) => {
                    self.faces[id.index()] = Some(face);
                    self.attach_face(id);
                }
            }
        }
    }

    // --- производные атрибуты -------------------------------------------------

    /// Пересчитывает списки соседних полигонов (через общие рёбра).
    pub fn refresh_adjacency(&mut self) {
        let ids: Vec<FaceId> = self.face_ids().collect();
        for f in ids {
            let adjacent = self.neighbor_faces(f);
            self.face_mut(f).adjacent = adjacent;
        }
    }

    /// Соседи полигона по общим рёбрам, вычисленные по текущей структуре.
    #[must_use]
    pub fn neighbor_faces(&self, f: FaceId) -> Vec<FaceId> {
        let mut adjacent: Vec<FaceId> = self
            .face(f)
            .edges
            .iter()
            .flat_map(|&e| self.edge(e).faces.iter().copied())
            .filter(|&g| g != f)
            .collect();
        adjacent.sort_unstable();
        adjacent.dedup();
        adjacent
    }

    pub fn refresh_node_kind(&mut self, id: NodeId) {
        let node = self.node(id);
        let water = node.faces.iter().filter(|&&f| self.face(f).water).count();
        let land = node.faces.len() - water;
        let kind = if water > 0 && land > 0 {
            NodeKind::Shore
        } else if water > 0 {
            NodeKind::Water
        } else if self.corners.contains(&id) {
            NodeKind::Corner
        } else if node.frame == FrameRole::None {
            NodeKind::Interior
        } else {
            NodeKind::Edge
        };
        self.node_mut(id).kind = kind;
    }

    pub fn refresh_edge_kind(&mut self, id: EdgeId) {
        let edge = self.edge(id);
        let water = edge.faces.iter().filter(|&&f| self.face(f).water).count();
        let kind = if edge.frame == FrameRole::Outer && edge.faces.len() <= 1 {
            EdgeKind::Boundary
        } else if water > 0 && water < edge.faces.len() {
            EdgeKind::Shore
        } else if water > 0 {
            EdgeKind::Water
        } else {
            EdgeKind::Inland
        };
        self.edge_mut(id).kind = kind;
    }

    /// Обновляет типы узлов и рёбер одного полигона после смены флага воды.
    pub fn refresh_face_kinds(&mut self, f: FaceId) {
        let face = self.face(f);
        let (nodes, edges) = (face.nodes.clone(), face.edges.clone());
        for n in nodes {
            self.refresh_node_kind(n);
        }
        for e in edges {
            self.refresh_edge_kind(e);
        }
    }

    pub fn refresh_kinds(&mut self) {
        let nodes: Vec<NodeId> = self.node_ids().collect();
        for n in nodes {
            self.refresh_node_kind(n);
        }
        let edges: Vec<EdgeId> = self.edge_ids().collect();
        for e in edges {
            self.refresh_edge_kind(e);
        }
    }

    /// Меняет флаг воды полигона и типы его узлов и рёбер.
    pub fn set_water(&mut self, f: FaceId, water: bool) {
        if self.face(f).water == water {
            return;
        }
        self.face_mut(f).water = water;
        self.refresh_face_kinds(f);
    }

    /// Суммарная площадь полигонов без внешнего кольца.
    #[must_use]
    pub fn playable_area(&self) -> f64 {
        self.face_ids()
            .map(|f| self.face(f))
            .filter(|face| !face.outer)
            .map(|face| face.area)
            .sum()
    }

    /// Доля площади суши среди полигонов без внешнего кольца.
    #[must_use]
    pub fn land_ratio(&self) -> f64 {
        let total = self.playable_area();
        if total <= 0.0 {
            return 0.0;
        }
        let land: f64 = self
            .face_ids()
            .map(|f| self.face(f))
            .filter(|face| !face.outer && face.is_land())
            .map(|face| face.area)
            .sum();
        land / total
    }
}
