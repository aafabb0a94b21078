//! Континенты: группы соседних полигонов внутри одного массива суши
//!
//! Каждый массив суши жадно делится поиском в ширину на группы не больше
//! `max_cluster_size` полигонов. Остатки меньше `min_cluster_size` поглощаются
//! соседней группой того же массива (поэтому отдельные группы могут превышать максимум).

use log::info;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::GenerationSettings;
use crate::graph::{FaceId, PlanarGraph};

fn grow_group(
    graph: &PlanarGraph,
    members: &BTreeSet<FaceId>,
    assigned: &mut BTreeSet<FaceId>,
    start: FaceId,
    target_size: usize,
) -> Vec<FaceId> {
    let mut group = vec![start];
    assigned.insert(start);
    let mut queue = VecDeque::from([start]);

    while group.len() < target_size {
        let Some(current) = queue.pop_front() else {
            break;
        };
        for &n in &graph.face(current).adjacent {
            if members.contains(&n) && assigned.insert(n) {
                group.push(n);
                queue.push_back(n);
                if group.len() >= target_size {
                    break;
                }
            }
        }
    }
    group
}

/// Делит один массив суши на группы.
fn split_landmass(graph: &PlanarGraph, landmass: &[FaceId], settings: &GenerationSettings) -> Vec<Vec<FaceId>> {
    let members: BTreeSet<FaceId> = landmass.iter().copied().collect();
    let mut assigned = BTreeSet::new();
    let mut groups: Vec<Vec<FaceId>> = Vec::new();
    for &face in landmass {
        if !assigned.contains(&face) {
            groups.push(grow_group(graph, &members, &mut assigned, face, settings.max_cluster_size));
        }
    }

    // поглощение мелких остатков соседней группой
    loop {
        let owner: BTreeMap<FaceId, usize> = groups
            .iter()
            .enumerate()
            .flat_map(|(i, g)| g.iter().map(move |&f| (f, i)))
            .collect();
        let absorbed = groups.iter().enumerate().find_map(|(i, group)| {
            if group.is_empty() || group.len() >= settings.min_cluster_size {
                return None;
            }
            group
                .iter()
                .flat_map(|&f| graph.face(f).adjacent.iter())
                .filter_map(|n| owner.get(n).copied())
                .filter(|&j| j != i)
                .min_by_key(|&j| (groups[j].len(), j))
                .map(|j| (i, j))
        });
        let Some((small, target)) = absorbed else {
            break;
        };
        let moved = std::mem::take(&mut groups[small]);
        groups[target].extend(moved);
    }

    groups.retain(|g| !g.is_empty());
    for group in &mut groups {
        group.sort_unstable();
    }
    groups
}

/// Группирует сушу в континенты и проставляет `Face::continent`.
pub fn group_continents(graph: &mut PlanarGraph, settings: &GenerationSettings) {
    let mut continents: Vec<Vec<FaceId>> = Vec::new();
    for landmass in &graph.landmasses {
        continents.extend(split_landmass(graph, landmass, settings));
    }

    let ids: Vec<FaceId> = graph.face_ids().collect();
    for f in ids {
        graph.face_mut(f).continent = None;
    }
    for (i, group) in continents.iter().enumerate() {
        for &f in group {
            graph.face_mut(f).continent = Some(i as u32);
        }
    }
    info!("Континентов: {}", continents.len());
    graph.continents = continents;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::grid;
    use crate::water::compute_groups;

    #[test]
    fn groups_respect_size_limits() {
        let mut g = grid(6, 6, 1.0);
        let settings = GenerationSettings {
            min_cluster_size: 3,
            max_cluster_size: 8,
            ..GenerationSettings::default()
        };
        compute_groups(&mut g, &settings);
        group_continents(&mut g, &settings);

        let total: usize = g.continents.iter().map(Vec::len).sum();
        assert_eq!(total, 36);
        for group in &g.continents {
            assert!(group.len() >= 3);
        }
        for f in g.face_ids() {
            assert!(g.face(f).continent.is_some());
        }
    }

    #[test]
    fn small_landmass_stays_whole() {
        let mut g = grid(2, 1, 1.0);
        let settings = GenerationSettings {
            min_cluster_size: 4,
            max_cluster_size: 8,
            ..GenerationSettings::default()
        };
        compute_groups(&mut g, &settings);
        group_continents(&mut g, &settings);
        assert_eq!(g.continents.len(), 1);
        assert_eq!(g.continents[0].len(), 2);
    }
}
