//! Разбиение полигонов на сушу и воду
//!
//! Рецепт каждого типа карты собирается из примитивов:
//! - `outer_ocean` — внешнее кольцо островной рамки всегда вода;
//! - `edge_to_water` — полигоны, касающиеся внутреннего кольца, становятся водой;
//! - `continent_cut` — дуги больших окружностей прорезают каналы через сушу;
//! - `ball_ocean` — круглый океан, смещённый к краю карты;
//! - `random_water` — случайные озёра;
//! - `expand_ocean` / `expand_land` — рост воды или суши от берега до целевой доли;
//! - `noise_continents` — суша там, где фрактальный шум выше;
//! - `size_cap` — разделённые континенты ограниченного размера в океане.
//!
//! После рецепта вычисляются массивы суши и водные тела.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use log::{debug, info};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::{GenerationSettings, MapType};
use crate::graph::geometry::Point;
use crate::graph::{FaceId, FrameRole, PlanarGraph};

/// Вероятность оставить сушей полигон на линии разреза.
const CUT_SKIP_CHANCE: f64 = 0.12;
/// Вероятность оставить островок внутри круглого океана.
const BALL_ISLAND_CHANCE: f64 = 0.06;
/// Площадь карты на одно случайное озеро.
const AREA_PER_LAKE: f64 = 150.0;
/// Попыток найти стартовый полигон континента.
const CONTINENT_START_ATTEMPTS: usize = 20;

fn playable(graph: &PlanarGraph) -> Vec<FaceId> {
    graph.face_ids().filter(|&f| !graph.face(f).outer).collect()
}

fn pick(rng: &mut ChaCha8Rng, items: &[FaceId]) -> Option<FaceId> {
    if items.is_empty() {
        None
    } else {
        Some(items[rng.gen_range(0..items.len())])
    }
}

/// Полигоны с флагом воды `water`, у которых есть сосед с противоположным флагом.
fn frontier(graph: &PlanarGraph, water: bool) -> Vec<FaceId> {
    graph
        .face_ids()
        .filter(|&f| {
            let face = graph.face(f);
            !face.outer
                && face.water == water
                && face.adjacent.iter().any(|&g| graph.face(g).water != water)
        })
        .collect()
}

fn land_area(graph: &PlanarGraph) -> f64 {
    graph
        .face_ids()
        .map(|f| graph.face(f))
        .filter(|face| !face.outer && face.is_land())
        .map(|face| face.area)
        .sum()
}

/// Внешнее кольцо — постоянный океан.
pub fn outer_ocean(graph: &mut PlanarGraph) {
    let outer: Vec<FaceId> = graph.face_ids().filter(|&f| graph.face(f).outer).collect();
    for f in outer {
        graph.set_water(f, true);
    }
}

/// Полигоны, касающиеся внутреннего кольца рамки, становятся водой.
pub fn edge_to_water(graph: &mut PlanarGraph) -> usize {
    let touching: Vec<FaceId> = playable(graph)
        .into_iter()
        .filter(|&f| {
            graph
                .face(f)
                .nodes
                .iter()
                .any(|&n| graph.node(n).frame != FrameRole::None)
        })
        .collect();
    for &f in &touching {
        graph.set_water(f, true);
    }
    touching.len()
}

/// Прорезает `cuts` каналов дугами окружностей с центрами за пределами карты.
pub fn continent_cut(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, settings: &GenerationSettings, cuts: usize) {
    let (w, h) = (graph.width, graph.height);
    let middle = Point::new(w / 2.0, h / 2.0);
    let diagonal = w.hypot(h);
    let l = settings.length_scale();

    for _ in 0..cuts {
        let theta = rng.gen_range(0.0..std::f64::consts::TAU);
        let center = middle + Point::from_angle(theta) * (diagonal * rng.gen_range(0.6..1.0));
        let through = middle
            + Point::new(
                rng.gen_range(-0.3..0.3) * w,
                rng.gen_range(-0.3..0.3) * h,
            );
        let radius = center.distance(through);
        let half_band = l * rng.gen_range(0.5..1.0);

        let mut flooded = 0;
        for f in playable(graph) {
            let on_arc = graph
                .face(f)
                .nodes
                .iter()
                .any(|&n| (graph.pos(n).distance(center) - radius).abs() < half_band);
            if !on_arc || rng.gen_bool(CUT_SKIP_CHANCE) {
                continue;
            }
            graph.set_water(f, true);
            flooded += 1;
        }
        debug!("Разрез континента: {flooded} полигонов под водой");
    }
}

/// Круглый океан у случайного края карты.
pub fn ball_ocean(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, settings: &GenerationSettings) {
    let (w, h) = (graph.width, graph.height);
    let t = rng.gen_range(0.0..1.0);
    let inward = rng.gen_range(0.0..0.2);
    let center = match rng.gen_range(0..4) {
        0 => Point::new(t * w, inward * h),
        1 => Point::new(w - inward * w, t * h),
        2 => Point::new(t * w, h - inward * h),
        _ => Point::new(inward * w, t * h),
    };
    let radius = rng.gen_range(0.15..0.3) * w.min(h) * settings.continent_scale.sqrt().min(2.0);
    for f in playable(graph) {
        if graph.face(f).centroid.distance(center) < radius && !rng.gen_bool(BALL_ISLAND_CHANCE) {
            graph.set_water(f, true);
        }
    }
}

/// Случайные озёра: `count` полигонов суши становятся водой.
pub fn random_water(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, count: usize) {
    for _ in 0..count {
        let land: Vec<FaceId> = playable(graph)
            .into_iter()
            .filter(|&f| graph.face(f).is_land())
            .collect();
        let Some(f) = pick(rng, &land) else {
            return;
        };
        graph.set_water(f, true);
    }
}

/// Затапливает береговую сушу, пока доля суши больше `target`.
pub fn expand_ocean(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, target: f64) {
    let total = graph.playable_area();
    if total <= 0.0 {
        return;
    }
    let mut land = land_area(graph);
    while land / total > target {
        let mut candidates = frontier(graph, false);
        if candidates.is_empty() {
            // воды ещё нет: начинаем с любого полигона суши
            candidates = playable(graph)
                .into_iter()
                .filter(|&f| graph.face(f).is_land())
                .collect();
        }
        let Some(f) = pick(rng, &candidates) else {
            break;
        };
        land -= graph.face(f).area;
        graph.set_water(f, true);
    }
}

/// Осушает прибрежную воду, пока доля суши меньше `target`.
pub fn expand_land(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, target: f64) {
    let total = graph.playable_area();
    if total <= 0.0 {
        return;
    }
    let mut land = land_area(graph);
    while land / total < target {
        let mut candidates: Vec<FaceId> = frontier(graph, true);
        if land <= 0.0 {
            candidates = playable(graph);
        }
        let Some(f) = pick(rng, &candidates) else {
            break;
        };
        land += graph.face(f).area;
        graph.set_water(f, false);
    }
}

/// Суша — полигоны с наибольшим значением фрактального шума (с понижением к краям).
pub fn noise_continents(graph: &mut PlanarGraph, settings: &GenerationSettings, target: f64) {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(settings.seed.wrapping_add(1000) as i32));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(4));
    noise.set_frequency(Some((0.12 / settings.continent_scale) as f32));

    let (w, h) = (graph.width, graph.height);
    let half = 0.5 * w.min(h);
    let mut scored: Vec<(f64, FaceId)> = playable(graph)
        .into_iter()
        .map(|f| {
            let c = graph.face(f).centroid;
            let value = f64::from((noise.get_noise_2d(c.x as f32, c.y as f32) + 1.0) * 0.5);
            let edge = (c.x.min(w - c.x).min(c.y).min(h - c.y) / half).clamp(0.0, 1.0);
            (value - 0.35 * (1.0 - edge).powi(2), f)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    let total = graph.playable_area();
    let mut land = 0.0;
    for (_, f) in scored {
        let is_land = land < target * total;
        if is_land {
            land += graph.face(f).area;
        }
        graph.set_water(f, !is_land);
    }
}

/// Разделённые континенты ограниченного размера в сплошном океане.
pub fn size_cap(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, settings: &GenerationSettings) {
    let faces = playable(graph);
    for &f in &faces {
        graph.set_water(f, true);
    }
    let count = ((3.0 / settings.continent_scale).round() as usize).max(2);
    let mut owner: BTreeMap<FaceId, usize> = BTreeMap::new();

    for continent in 0..count {
        let mut start = None;
        for _ in 0..CONTINENT_START_ATTEMPTS {
            let candidate = pick(rng, &faces);
            let Some(f) = candidate else {
                break;
            };
            let face = graph.face(f);
            let touches_frame = face
                .nodes
                .iter()
                .any(|&n| graph.node(n).frame != FrameRole::None);
            let near_land = face.adjacent.iter().any(|&g| graph.face(g).is_land());
            if face.water && !touches_frame && !near_land {
                start = Some(f);
                break;
            }
        }
        let Some(start) = start else {
            continue;
        };

        let upper = settings.max_cluster_size.saturating_mul(2);
        let cap = rng.gen_range(settings.min_cluster_size..=upper);
        let mut open = vec![start];
        let mut size = 0;
        while size < cap && !open.is_empty() {
            let g = open.swap_remove(rng.gen_range(0..open.len()));
            let face = graph.face(g);
            if !face.water || face.outer {
                continue;
            }
            let foreign = face
                .adjacent
                .iter()
                .any(|h| owner.get(h).is_some_and(|&o| o != continent));
            if foreign {
                continue;
            }
            let next: Vec<FaceId> = face.adjacent.clone();
            graph.set_water(g, false);
            owner.insert(g, continent);
            size += 1;
            open.extend(next.into_iter().filter(|&h| graph.face(h).water));
        }
        debug!("Континент {continent}: {size} полигонов (предел {cap})");
    }

    if owner.is_empty() {
        if let Some(f) = pick(rng, &faces) {
            graph.set_water(f, false);
        }
    }
}

/// Применяет рецепт типа карты и гарантирует минимальную долю суши.
pub fn apply_recipe(graph: &mut PlanarGraph, rng: &mut ChaCha8Rng, settings: &GenerationSettings) {
    let target = settings.map_type.target_land_ratio();
    let lakes = (settings.map_area() / AREA_PER_LAKE).ceil() as usize;
    outer_ocean(graph);
    match settings.map_type {
        MapType::Regional => {
            let cuts = ((2.0 / settings.continent_scale).round() as usize).max(1);
            continent_cut(graph, rng, settings, cuts);
            ball_ocean(graph, rng, settings);
            random_water(graph, rng, lakes);
            expand_ocean(graph, rng, target);
            expand_land(graph, rng, target);
        }
        MapType::Island => {
            edge_to_water(graph);
            random_water(graph, rng, lakes);
            expand_ocean(graph, rng, target);
            expand_land(graph, rng, target);
        }
        MapType::FractalNoise => noise_continents(graph, settings, target),
        MapType::BigOceans => size_cap(graph, rng, settings),
    }

    let coverage = settings.map_type.min_land_coverage();
    if graph.land_ratio() < coverage {
        expand_land(graph, rng, coverage);
    }
    graph.refresh_kinds();
}

/// Компоненты связности по соседству среди полигонов, удовлетворяющих `member`.
pub fn components(graph: &PlanarGraph, member: impl Fn(FaceId) -> bool) -> Vec<Vec<FaceId>> {
    let mut seen: BTreeSet<FaceId> = BTreeSet::new();
    let mut out = Vec::new();
    for start in graph.face_ids() {
        if !member(start) || !seen.insert(start) {
            continue;
        }
        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(f) = queue.pop_front() {
            for &g in &graph.face(f).adjacent {
                if member(g) && seen.insert(g) {
                    component.push(g);
                    queue.push_back(g);
                }
            }
        }
        component.sort_unstable();
        out.push(component);
    }
    out
}

/// Вычисляет массивы суши и водные тела.
///
/// Внешнее кольцо — водное тело 0; примыкающие к нему водные компоненты из не менее
/// чем `max_cluster_size` полигонов сливаются с ним.
pub fn compute_groups(graph: &mut PlanarGraph, settings: &GenerationSettings) {
    let landmasses = components(graph, |f| graph.face(f).is_land());

    let outer: Vec<FaceId> = graph.face_ids().filter(|&f| graph.face(f).outer).collect();
    let mut bodies: Vec<Vec<FaceId>> = Vec::new();
    if !outer.is_empty() {
        bodies.push(outer.clone());
    }
    for component in components(graph, |f| {
        let face = graph.face(f);
        face.water && !face.outer
    }) {
        let joins_ocean = !outer.is_empty()
            && component.len() >= settings.max_cluster_size
            && component
                .iter()
                .any(|&f| graph.face(f).adjacent.iter().any(|&g| graph.face(g).outer));
        if joins_ocean {
            bodies[0].extend(component);
        } else {
            bodies.push(component);
        }
    }
    if let Some(ocean) = bodies.first_mut() {
        ocean.sort_unstable();
    }

    let ids: Vec<FaceId> = graph.face_ids().collect();
    for f in ids {
        let face = graph.face_mut(f);
        face.landmass = None;
        face.water_body = None;
    }
    for (i, mass) in landmasses.iter().enumerate() {
        for &f in mass {
            graph.face_mut(f).landmass = Some(i as u32);
        }
    }
    for (i, body) in bodies.iter().enumerate() {
        for &f in body {
            graph.face_mut(f).water_body = Some(i as u32);
        }
    }
    info!(
        "Суша {:.1}%: массивов суши {}, водных тел {}",
        graph.land_ratio() * 100.0,
        landmasses.len(),
        bodies.len()
    );
    graph.landmasses = landmasses;
    graph.water_bodies = bodies;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::testutil::{face_at, flood, grid};
    use rand::SeedableRng;

    #[test]
    fn expansion_reaches_target_ratio() {
        let mut g = grid(10, 10, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        expand_ocean(&mut g, &mut rng, 0.6);
        let ratio = g.land_ratio();
        assert!(ratio <= 0.6 && ratio >= 0.58, "ratio {ratio}");

        expand_land(&mut g, &mut rng, 0.8);
        let ratio = g.land_ratio();
        assert!(ratio >= 0.8 && ratio <= 0.82, "ratio {ratio}");
    }

    #[test]
    fn expand_land_seeds_an_all_water_map() {
        let mut g = grid(4, 4, 1.0);
        for f in g.face_ids().collect::<Vec<_>>() {
            g.set_water(f, true);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        expand_land(&mut g, &mut rng, 0.5);
        assert!(g.land_ratio() >= 0.5);
        compute_groups(&mut g, &GenerationSettings::default());
        assert_eq!(g.landmasses.len(), 1);
    }

    #[test]
    fn kinds_follow_water_flags() {
        let mut g = grid(3, 1, 1.0);
        flood(&mut g, &[(2.5, 0.5)]);
        let water = face_at(&g, 2.5, 0.5);
        let land = face_at(&g, 1.5, 0.5);
        let shared = g
            .face(water)
            .edges
            .iter()
            .copied()
            .find(|e| g.face(land).edges.contains(e))
            .unwrap();
        let edge = g.edge(shared);
        assert_eq!(edge.kind, crate::graph::EdgeKind::Shore);
        assert_eq!(g.node(edge.a).kind, NodeKind::Shore);
        let far = g.nodes_near(Point::new(3.0, 0.0), 0.01)[0];
        assert_eq!(g.node(far).kind, NodeKind::Water);
    }

    #[test]
    fn groups_split_landmasses_and_water_bodies() {
        let mut g = grid(5, 1, 1.0);
        flood(&mut g, &[(1.5, 0.5), (3.5, 0.5)]);
        compute_groups(&mut g, &GenerationSettings::default());
        assert_eq!(g.landmasses.len(), 3);
        assert_eq!(g.water_bodies.len(), 2);
        let mid = face_at(&g, 2.5, 0.5);
        assert_eq!(g.face(mid).landmass, Some(1));
        assert!(g.face(mid).water_body.is_none());
    }

    #[test]
    fn size_cap_builds_separated_continents() {
        let mut g = grid(16, 16, 1.0);
        let settings = GenerationSettings {
            width: 16,
            height: 16,
            min_cluster_size: 3,
            max_cluster_size: 6,
            map_type: MapType::BigOceans,
            ..GenerationSettings::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        size_cap(&mut g, &mut rng, &settings);
        compute_groups(&mut g, &settings);
        assert!(!g.landmasses.is_empty());
        for mass in &g.landmasses {
            assert!(mass.len() <= 12);
        }
    }

    #[test]
    fn size_cap_tolerates_huge_cluster_limits() {
        let mut g = grid(6, 6, 1.0);
        let settings = GenerationSettings {
            width: 6,
            height: 6,
            min_cluster_size: 1,
            max_cluster_size: usize::MAX,
            map_type: MapType::BigOceans,
            ..GenerationSettings::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        size_cap(&mut g, &mut rng, &settings);
        assert!(g.land_ratio() > 0.0);
    }
}
