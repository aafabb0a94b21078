use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::{FaceId, PlanarGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Biome {
    Ice,
    Tundra,
    Grassland,
    Shrubland,
    Taiga,
    Temperate,
    TemperateRainForest,
    Desert,
    Savanna,
    Tropical,
    TropicalRainForest,
}

impl Biome {
    pub fn to_rgb(&self) -> [u8; 3] {
        match self {
            Biome::Ice => [220, 220, 255],
            Biome::Tundra => [200, 220, 180],
            Biome::Grassland => [150, 200, 100],
            Biome::Shrubland => [170, 180, 110],
            Biome::Taiga => [100, 150, 100],
            Biome::Temperate => [60, 120, 60],
            Biome::TemperateRainForest => [40, 110, 70],
            Biome::Desert => [200, 180, 120],
            Biome::Savanna => [200, 180, 100],
            Biome::Tropical => [70, 140, 40],
            Biome::TropicalRainForest => [30, 100, 30],
        }
    }

    /// Биом по температуре (°C) и осадкам (мм/год)
    ///
    /// Шесть температурных поясов, в каждом до четырёх градаций влажности.
    #[must_use]
    pub fn classify(temperature: f64, precipitation: f64) -> Self {
        let (t, p) = (temperature, precipitation);
        if t < -5.0 {
            // Ледяной пояс не зависит от осадков
            Biome::Ice
        } else if t < 0.0 {
            if p < 400.0 { Biome::Tundra } else { Biome::Taiga }
        } else if t < 7.0 {
            if p < 300.0 {
                Biome::Grassland
            } else if p < 700.0 {
                Biome::Shrubland
            } else if p < 1500.0 {
                Biome::Taiga
            } else {
                Biome::Temperate
            }
        } else if t < 15.0 {
            if p < 250.0 {
                Biome::Desert
            } else if p < 700.0 {
                Biome::Grassland
            } else if p < 1500.0 {
                Biome::Temperate
            } else {
                Biome::TemperateRainForest
            }
        } else if t < 22.0 {
            if p < 400.0 {
                Biome::Desert
            } else if p < 1000.0 {
                Biome::Shrubland
            } else if p < 2000.0 {
                Biome::Savanna
            } else {
                Biome::Tropical
            }
        } else if p < 500.0 {
            Biome::Desert
        } else if p < 1500.0 {
            Biome::Savanna
        } else if p < 2500.0 {
            Biome::Tropical
        } else {
            Biome::TropicalRainForest
        }
    }
}

/// Цвет воды на рисунке карты
pub const WATER_RGB: [u8; 3] = [0, 64, 128];

/// Назначает биомы суше по уже рассчитанному климату; вода остаётся без биома.
pub fn assign_biomes(graph: &mut PlanarGraph) {
    let ids: Vec<FaceId> = graph.face_ids().collect();
    let mut counts: BTreeMap<Biome, usize> = BTreeMap::new();
    for f in ids {
        let face = graph.face_mut(f);
        face.biome = if face.water {
            None
        } else {
            let biome = Biome::classify(face.temperature, face.precipitation);
            *counts.entry(biome).or_default() += 1;
            Some(biome)
        };
    }
    info!("Биомы: {counts:?}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{face_at, flood, grid};

    #[test]
    fn table_fixed_points() {
        assert_eq!(Biome::classify(-10.0, 100.0), Biome::Ice);
        assert_eq!(Biome::classify(5.0, 250.0), Biome::Grassland);
        assert_eq!(Biome::classify(20.0, 2600.0), Biome::Tropical);
        assert_eq!(Biome::classify(25.0, 3000.0), Biome::TropicalRainForest);
    }

    #[test]
    fn band_edges_belong_to_the_warmer_band() {
        assert_eq!(Biome::classify(-5.0, 100.0), Biome::Tundra);
        assert_eq!(Biome::classify(0.0, 100.0), Biome::Grassland);
        assert_eq!(Biome::classify(22.0, 100.0), Biome::Desert);
        assert_eq!(Biome::classify(22.0, 500.0), Biome::Savanna);
    }

    #[test]
    fn water_has_no_biome() {
        let mut g = grid(2, 1, 1.0);
        flood(&mut g, &[(0.5, 0.5)]);
        let land = face_at(&g, 1.5, 0.5);
        g.face_mut(land).temperature = 10.0;
        g.face_mut(land).precipitation = 1000.0;
        assign_biomes(&mut g);
        assert_eq!(g.face(face_at(&g, 0.5, 0.5)).biome, None);
        assert_eq!(g.face(land).biome, Some(Biome::Temperate));
    }
}
