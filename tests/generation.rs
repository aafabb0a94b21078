use std::collections::BTreeMap;

use planar_mapgen::graph::geometry::{Point, is_simple_polygon, segment_crossing, signed_area};
use planar_mapgen::graph::{EdgeKind, NodeKind};
use planar_mapgen::{GenerationSettings, Map, MapType, generate_map};

const TYPES: [MapType; 4] = [
    MapType::Regional,
    MapType::Island,
    MapType::FractalNoise,
    MapType::BigOceans,
];

fn settings(map_type: MapType, seed: u64) -> GenerationSettings {
    GenerationSettings {
        seed,
        width: 16,
        height: 12,
        map_type,
        ..GenerationSettings::default()
    }
}

/// Крупные полигоны на маленькой карте: по несколько полигонов на тип.
fn coarse(map_type: MapType, seed: u64) -> GenerationSettings {
    GenerationSettings {
        seed,
        width: 6,
        height: 4,
        min_face_area: 3.0,
        max_face_area: 24.0,
        map_type,
        ..GenerationSettings::default()
    }
}

fn maps() -> Vec<Map> {
    let mut out = Vec::new();
    for map_type in TYPES {
        let fine = [1, 2, 3].map(|seed| settings(map_type, seed));
        let rough = [1, 2, 3, 4, 5].map(|seed| coarse(map_type, seed));
        for s in fine.iter().chain(&rough) {
            let map = generate_map(s).unwrap_or_else(|e| {
                panic!("{map_type:?} {}×{} seed {}: {e}", s.width, s.height, s.seed)
            });
            out.push(map);
        }
    }
    out
}

fn point(map: &Map, n: u32) -> Point {
    let node = &map.nodes[n as usize];
    Point::new(node.x, node.y)
}

fn ring(map: &Map, nodes: &[u32]) -> Vec<Point> {
    nodes.iter().map(|&n| point(map, n)).collect()
}

/// Кластеры суши по соседству и переправам.
fn land_clusters(map: &Map) -> usize {
    let mut parent: BTreeMap<u32, u32> = map
        .faces
        .iter()
        .filter(|f| !f.water)
        .map(|f| (f.id, f.id))
        .collect();
    fn find(parent: &mut BTreeMap<u32, u32>, x: u32) -> u32 {
        let p = parent[&x];
        if p == x {
            return x;
        }
        let root = find(parent, p);
        parent.insert(x, root);
        root
    }
    let mut links: Vec<(u32, u32)> = map.water_connections.iter().map(|c| (c.a, c.b)).collect();
    for face in map.faces.iter().filter(|f| !f.water) {
        for &g in &face.adjacent {
            if !map.faces[g as usize].water {
                links.push((face.id, g));
            }
        }
    }
    for (a, b) in links {
        let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
        if ra != rb {
            parent.insert(ra, rb);
        }
    }
    let ids: Vec<u32> = parent.keys().copied().collect();
    let mut roots: Vec<u32> = ids.into_iter().map(|x| find(&mut parent, x)).collect();
    roots.sort_unstable();
    roots.dedup();
    roots.len()
}

#[test]
fn generated_maps_hold_their_invariants() {
    for map in maps() {
        let label = format!(
            "{:?} {}×{} seed {}",
            map.settings.map_type, map.settings.width, map.settings.height, map.settings.seed
        );

        for edge in &map.edges {
            let expected = if edge.kind == EdgeKind::Boundary { 1 } else { 2 };
            assert_eq!(edge.faces.len(), expected, "{label}: edge {}", edge.id);
        }

        // плоскость: никакие два ребра не пересекаются во внутренних точках
        for (i, e) in map.edges.iter().enumerate() {
            let (a, b) = (point(&map, e.a), point(&map, e.b));
            for f in &map.edges[i + 1..] {
                let crossing = segment_crossing(a, b, point(&map, f.a), point(&map, f.b));
                assert!(crossing.is_none(), "{label}: edges {} and {} cross", e.id, f.id);
            }
        }

        // у внутреннего узла рёбер столько же, сколько полигонов; на рамке на одно больше
        let mut degree = vec![0usize; map.nodes.len()];
        let mut on_frame = vec![false; map.nodes.len()];
        for e in &map.edges {
            for n in [e.a, e.b] {
                degree[n as usize] += 1;
                on_frame[n as usize] |= e.kind == EdgeKind::Boundary;
            }
        }
        let mut faces_at = vec![0usize; map.nodes.len()];
        for face in &map.faces {
            for &n in &face.nodes {
                faces_at[n as usize] += 1;
            }
        }
        for node in &map.nodes {
            let i = node.id as usize;
            let expected = faces_at[i] + usize::from(on_frame[i]);
            assert_eq!(degree[i], expected, "{label}: node {} is invalid", node.id);
        }

        // полигоны покрывают карту целиком
        let covered: f64 = map.faces.iter().map(|f| f.area).sum();
        let total = map.width * map.height;
        assert!(
            (covered - total).abs() < 1e-6 * total,
            "{label}: faces cover {covered} of {total}"
        );

        let (min, max) = (map.settings.min_face_area, map.settings.max_face_area);
        for face in &map.faces {
            let points = ring(&map, &face.nodes);
            assert!(is_simple_polygon(&points), "{label}: face {} is not simple", face.id);
            assert!((signed_area(&points) - face.area).abs() < 1e-9, "{label}: face {}", face.id);
            assert_eq!(face.nodes.len(), face.edges.len());
            if !face.outer {
                assert!(
                    face.area >= min * (1.0 - 1e-6) && face.area <= max * (1.0 + 1e-6),
                    "{label}: face {} area {}",
                    face.id,
                    face.area
                );
            }
        }

        assert!(land_clusters(&map) <= 1, "{label}: land is split");

        for river in &map.rivers {
            let od: Vec<u32> = river.nodes.iter().map(|&n| map.nodes[n as usize].ocean_distance).collect();
            assert!(od.windows(2).all(|w| w[0] >= w[1]), "{label}: river {} climbs", river.id);
            assert!(river.widths.windows(2).all(|w| w[0] <= w[1]), "{label}: river {} narrows", river.id);
            let mouth = river.nodes.last().map(|&n| map.nodes[n as usize].kind);
            assert_eq!(mouth, Some(NodeKind::Shore), "{label}: river {}", river.id);
        }
    }
}

#[test]
fn same_settings_give_the_same_map() {
    for map_type in TYPES {
        let s = settings(map_type, 77);
        let a = generate_map(&s).unwrap();
        let b = generate_map(&s).unwrap();
        assert_eq!(a, b, "{map_type:?}");
    }
}

#[test]
fn different_seeds_give_different_maps() {
    let a = generate_map(&settings(MapType::Regional, 1)).unwrap();
    let b = generate_map(&settings(MapType::Regional, 2)).unwrap();
    assert_ne!(a.nodes, b.nodes);
}

#[test]
fn island_scenario() {
    let s = GenerationSettings {
        seed: 42,
        width: 10,
        height: 10,
        min_face_area: 0.08,
        max_face_area: 1.5,
        map_type: MapType::Island,
        ..GenerationSettings::default()
    };
    let map = generate_map(&s).unwrap();
    assert_eq!(land_clusters(&map), 1);
    assert!(map.land_ratio() >= MapType::Island.min_land_coverage() - 1e-9);
    assert!(map.faces.iter().any(|f| f.outer));
    for face in map.faces.iter().filter(|f| f.outer) {
        assert!(face.water);
    }
}

#[test]
fn land_faces_carry_biomes_and_groups() {
    let map = generate_map(&settings(MapType::Regional, 9)).unwrap();
    for face in &map.faces {
        if face.water {
            assert!(face.biome.is_none());
            assert!(face.water_body.is_some());
            assert!(face.altitude < 0);
        } else {
            assert!(face.biome.is_some());
            assert!(face.landmass.is_some());
            assert!(face.continent.is_some());
            assert!(face.altitude > 0);
        }
    }
    let grouped: usize = map.landmasses.iter().map(Vec::len).sum();
    assert_eq!(grouped, map.faces.iter().filter(|f| !f.water).count());
}

#[test]
fn map_survives_json() {
    let map = generate_map(&settings(MapType::FractalNoise, 4)).unwrap();
    let json = map.to_json().unwrap();
    assert_eq!(Map::from_json(&json).unwrap(), map);
}
