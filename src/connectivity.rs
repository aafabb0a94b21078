//! Связность суши через воду
//!
//! Три фазы:
//! 1. для каждой пары массивов суши — кратчайшая переправа между береговыми
//!    полигонами плюс почти такие же короткие, если в графе они далеко друг от друга;
//! 2. короткие пути внутри одного массива: близкие по геометрии, но далёкие по графу
//!    береговые полигоны, если середина переправы лежит в воде;
//! 3. пока кластеров суши больше одного — соединить ближайшую пару кластеров.
//!
//! Кандидаты сначала ранжируются по расстоянию между центроидами, затем лучшие
//! уточняются точным расстоянием между контурами.
//!
//! Граф суши для проверки числа переходов и кластеров строится на `petgraph`.

use log::{debug, info};
use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::GenerationSettings;
use crate::error::{MapGenError, Result};
use crate::graph::geometry::{Point, point_in_polygon, ring_distance};
use crate::graph::{FaceId, PlanarGraph, WaterConnection};

/// Граф полигонов суши: рёбра — общие стороны и переправы.
pub struct LandGraph {
    graph: UnGraph<FaceId, ()>,
    index: BTreeMap<FaceId, NodeIndex>,
}

impl LandGraph {
    #[must_use]
    pub fn build(graph: &PlanarGraph) -> Self {
        let mut land = UnGraph::new_undirected();
        let mut index = BTreeMap::new();
        for f in graph.face_ids().filter(|&f| graph.face(f).is_land()) {
            index.insert(f, land.add_node(f));
        }
        for (&f, &nf) in &index {
            for g in graph.face(f).adjacent.iter().filter(|&&g| f < g) {
                if let Some(&ng) = index.get(g) {
                    land.add_edge(nf, ng, ());
                }
            }
        }
        let mut this = Self { graph: land, index };
        for conn in &graph.water_connections {
            this.connect(conn.a, conn.b);
        }
        this
    }

    pub fn connect(&mut self, a: FaceId, b: FaceId) {
        if let (Some(&na), Some(&nb)) = (self.index.get(&a), self.index.get(&b)) {
            self.graph.add_edge(na, nb, ());
        }
    }

    /// Число переходов между полигонами; `None` — недостижимы.
    #[must_use]
    pub fn hops(&self, a: FaceId, b: FaceId) -> Option<usize> {
        let (&na, &nb) = (self.index.get(&a)?, self.index.get(&b)?);
        dijkstra(&self.graph, na, Some(nb), |_| 1usize).get(&nb).copied()
    }

    /// Кластеры суши, каждый отсортирован; порядок — по наименьшему полигону.
    #[must_use]
    pub fn clusters(&self) -> Vec<Vec<FaceId>> {
        let mut uf = UnionFind::<usize>::new(self.graph.node_count());
        for e in self.graph.edge_indices() {
            if let Some((x, y)) = self.graph.edge_endpoints(e) {
                uf.union(x.index(), y.index());
            }
        }
        let mut groups: BTreeMap<usize, Vec<FaceId>> = BTreeMap::new();
        for (&f, &n) in &self.index {
            groups.entry(uf.find(n.index())).or_default().push(f);
        }
        let mut clusters: Vec<Vec<FaceId>> = groups.into_values().collect();
        clusters.sort_by_key(|c| c[0]);
        clusters
    }
}

/// Число кластеров суши с учётом переправ.
#[must_use]
pub fn land_clusters(graph: &PlanarGraph) -> usize {
    LandGraph::build(graph).clusters().len()
}

fn shore_faces(graph: &PlanarGraph, faces: &[FaceId]) -> Vec<FaceId> {
    faces
        .iter()
        .copied()
        .filter(|&f| graph.face(f).adjacent.iter().any(|&g| graph.face(g).water))
        .collect()
}

fn water_at(graph: &PlanarGraph, p: Point) -> bool {
    graph
        .face_ids()
        .find(|&f| point_in_polygon(p, &graph.ring_points(f)))
        .is_some_and(|f| graph.face(f).water)
}

fn measure(graph: &PlanarGraph, a: FaceId, b: FaceId) -> WaterConnection {
    let (distance, point_a, point_b) = ring_distance(&graph.ring_points(a), &graph.ring_points(b));
    WaterConnection {
        a,
        b,
        point_a,
        point_b,
        distance,
    }
}

/// `k` ближайших по центроидам пар, уточнённых расстоянием между контурами.
fn refined_pairs(graph: &PlanarGraph, from: &[FaceId], to: &[FaceId], k: usize) -> Vec<WaterConnection> {
    let mut pairs: Vec<(f64, FaceId, FaceId)> = from
        .iter()
        .flat_map(|&a| {
            to.iter().map(move |&b| {
                let d = graph.face(a).centroid.distance(graph.face(b).centroid);
                (d, a, b)
            })
        })
        .collect();
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));
    pairs.truncate(k);
    let mut refined: Vec<WaterConnection> = pairs.into_iter().map(|(_, a, b)| measure(graph, a, b)).collect();
    refined.sort_by(|x, y| {
        x.distance
            .total_cmp(&y.distance)
            .then(x.a.cmp(&y.a))
            .then(x.b.cmp(&y.b))
    });
    refined
}

struct Resolver<'a> {
    graph: &'a PlanarGraph,
    settings: &'a GenerationSettings,
    land: LandGraph,
    added: Vec<WaterConnection>,
    known: BTreeSet<(FaceId, FaceId)>,
}

impl Resolver<'_> {
    fn add(&mut self, conn: WaterConnection) -> bool {
        let key = (conn.a.min(conn.b), conn.a.max(conn.b));
        if !self.known.insert(key) {
            return false;
        }
        self.land.connect(conn.a, conn.b);
        debug!(
            "Переправа {} ↔ {}: {:.3}",
            conn.a, conn.b, conn.distance
        );
        self.added.push(conn);
        true
    }

    /// Фаза 1: переправы между массивами суши.
    fn bridge_landmasses(&mut self) {
        let tuning = &self.settings.connectivity;
        let max_distance = tuning.max_bridge_distance * self.settings.length_scale();
        let shores: Vec<Vec<FaceId>> = self
            .graph
            .landmasses
            .iter()
            .map(|m| shore_faces(self.graph, m))
            .collect();

        for i in 0..shores.len() {
            for j in (i + 1)..shores.len() {
                let refined = refined_pairs(self.graph, &shores[i], &shores[j], tuning.candidate_pairs);
                let Some(best) = refined.first().cloned() else {
                    continue;
                };
                if best.distance > max_distance {
                    continue;
                }
                let limit = best.distance * (1.0 + tuning.real_distance_margin) + 1e-9;
                self.add(best);
                for cand in refined.into_iter().skip(1) {
                    if cand.distance > limit {
                        break;
                    }
                    let far = self
                        .land
                        .hops(cand.a, cand.b)
                        .is_none_or(|h| h >= tuning.min_bridge_hops);
                    if far {
                        self.add(cand);
                    }
                }
            }
        }
    }

    /// Фаза 2: короткие пути вдоль берега одного массива.
    fn shortcut_coasts(&mut self) {
        let tuning = &self.settings.connectivity;
        let reach = tuning.shortcut_distance * self.settings.length_scale();
        let coarse = reach + 2.0 * self.settings.max_face_area.sqrt();
        let shores: Vec<Vec<FaceId>> = self
            .graph
            .landmasses
            .iter()
            .map(|m| shore_faces(self.graph, m))
            .collect();

        for shore in &shores {
            for (i, &a) in shore.iter().enumerate() {
                for &b in &shore[i + 1..] {
                    let (fa, fb) = (self.graph.face(a), self.graph.face(b));
                    if fa.adjacent.contains(&b) || fa.centroid.distance(fb.centroid) > coarse {
                        continue;
                    }
                    let conn = measure(self.graph, a, b);
                    if conn.distance <= 1e-9 || conn.distance > reach {
                        continue;
                    }
                    if !water_at(self.graph, conn.point_a.lerp(conn.point_b, 0.5)) {
                        continue;
                    }
                    let far = self
                        .land
                        .hops(a, b)
                        .is_none_or(|h| h >= tuning.shortcut_min_hops);
                    if far {
                        self.add(conn);
                    }
                }
            }
        }
    }

    /// Фаза 3: соединяет ближайшие кластеры, пока их больше одного.
    fn join_clusters(&mut self) -> Result<()> {
        loop {
            let clusters = self.land.clusters();
            if clusters.len() <= 1 {
                return Ok(());
            }
            let coasts: Vec<Vec<FaceId>> = clusters
                .iter()
                .map(|c| {
                    let shore = shore_faces(self.graph, c);
                    if shore.is_empty() { c.clone() } else { shore }
                })
                .collect();

            let mut closest: Option<(f64, usize, usize)> = None;
            for i in 0..coasts.len() {
                for j in (i + 1)..coasts.len() {
                    for &a in &coasts[i] {
                        for &b in &coasts[j] {
                            let d = self.graph.face(a).centroid.distance(self.graph.face(b).centroid);
                            if closest.is_none_or(|(best, _, _)| d < best) {
                                closest = Some((d, i, j));
                            }
                        }
                    }
                }
            }
            let Some((_, i, j)) = closest else {
                return Ok(());
            };
            let k = self.settings.connectivity.candidate_pairs;
            let refined = refined_pairs(self.graph, &coasts[i], &coasts[j], k);
            let Some(best) = refined.into_iter().next() else {
                return Err(MapGenError::NoBridge {
                    from: clusters[i][0],
                    to: clusters[j][0],
                });
            };
            if !self.add(best) {
                return Err(MapGenError::NoBridge {
                    from: clusters[i][0],
                    to: clusters[j][0],
                });
            }
        }
    }
}

/// Добавляет переправы, пока вся суша не станет одним кластером.
pub fn resolve(graph: &mut PlanarGraph, settings: &GenerationSettings) -> Result<usize> {
    let view: &PlanarGraph = graph;
    let mut resolver = Resolver {
        graph: view,
        settings,
        land: LandGraph::build(view),
        added: Vec::new(),
        known: view
            .water_connections
            .iter()
            .map(|c| (c.a.min(c.b), c.a.max(c.b)))
            .collect(),
    };
    resolver.bridge_landmasses();
    let after_bridges = resolver.added.len();
    resolver.shortcut_coasts();
    let after_shortcuts = resolver.added.len();
    resolver.join_clusters()?;
    let added = resolver.added;

    info!(
        "Переправы: между массивами {after_bridges}, вдоль берега {}, между кластерами {}",
        after_shortcuts - after_bridges,
        added.len() - after_shortcuts
    );
    let count = added.len();
    graph.water_connections.extend(added);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectivityTuning;
    use crate::testutil::{face_at, flood, grid};
    use crate::water::compute_groups;

    #[test]
    fn nearby_landmasses_are_bridged() {
        let mut g = grid(7, 1, 1.0);
        flood(&mut g, &[(3.5, 0.5)]);
        let settings = GenerationSettings::default();
        compute_groups(&mut g, &settings);
        assert_eq!(g.landmasses.len(), 2);

        resolve(&mut g, &settings).unwrap();
        assert_eq!(land_clusters(&g), 1);
        let first = &g.water_connections[0];
        assert!((first.distance - 1.0).abs() < 1e-9);
        let pair = [first.a, first.b];
        assert!(pair.contains(&face_at(&g, 2.5, 0.5)));
        assert!(pair.contains(&face_at(&g, 4.5, 0.5)));
    }

    #[test]
    fn distant_clusters_are_joined_anyway() {
        let mut g = grid(12, 1, 1.0);
        let water: Vec<(f64, f64)> = (3..9).map(|i| (f64::from(i) + 0.5, 0.5)).collect();
        flood(&mut g, &water);
        let settings = GenerationSettings::default();
        compute_groups(&mut g, &settings);

        let added = resolve(&mut g, &settings).unwrap();
        assert_eq!(added, 1);
        assert_eq!(land_clusters(&g), 1);
        assert!((g.water_connections[0].distance - 6.0).abs() < 1e-9);
    }

    #[test]
    fn bay_gets_a_shortcut() {
        let mut g = grid(5, 3, 1.0);
        flood(&mut g, &[(1.5, 1.5), (2.5, 1.5), (3.5, 1.5)]);
        let settings = GenerationSettings {
            connectivity: ConnectivityTuning {
                shortcut_distance: 2.0,
                shortcut_min_hops: 4,
                ..ConnectivityTuning::default()
            },
            ..GenerationSettings::default()
        };
        compute_groups(&mut g, &settings);
        assert_eq!(g.landmasses.len(), 1);

        resolve(&mut g, &settings).unwrap();
        assert!(!g.water_connections.is_empty());
        for conn in &g.water_connections {
            assert!((conn.distance - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn hops_count_face_steps() {
        let g = grid(4, 1, 1.0);
        let land = LandGraph::build(&g);
        let (a, b) = (face_at(&g, 0.5, 0.5), face_at(&g, 3.5, 0.5));
        assert_eq!(land.hops(a, b), Some(3));
        assert_eq!(land.clusters().len(), 1);
    }
}
