//! Климат полигонов: температура и осадки
//!
//! Оба поля — линейный по широте градиент плюс ограниченный шум. Верхний край
//! карты (`y = 0`) — полюс, нижний — экватор. Значения снимаются в центроидах.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::graph::geometry::Point;
use crate::graph::{FaceId, PlanarGraph};

/// Температура на полюсе, °C
pub const POLE_TEMPERATURE: f64 = -15.0;
/// Прирост температуры от полюса к экватору, °C
pub const TEMPERATURE_SPAN: f64 = 45.0;
const TEMPERATURE_NOISE: f64 = 8.0;

const BASE_PRECIPITATION: f64 = 150.0;
const PRECIPITATION_SPAN: f64 = 2600.0;
const PRECIPITATION_NOISE: f64 = 700.0;
pub const MAX_PRECIPITATION: f64 = 4500.0;

/// Пара шумовых полей климата
pub struct ClimateField {
    height: f64,
    temperature: FastNoiseLite,
    precipitation: FastNoiseLite,
}

fn fbm(seed: i32, frequency: f32) -> FastNoiseLite {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(seed));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(4));
    noise.set_frequency(Some(frequency));
    noise
}

impl ClimateField {
    #[must_use]
    pub fn new(seed: u64, width: f64, height: f64) -> Self {
        // Частота выбрана так, чтобы на карту приходилось несколько пятен шума
        let frequency = (4.0 / width.max(height).max(1.0)) as f32;
        Self {
            height,
            temperature: fbm(seed.wrapping_add(500) as i32, frequency),
            precipitation: fbm(seed.wrapping_add(700) as i32, frequency),
        }
    }

    fn latitude(&self, p: Point) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        (p.y / self.height).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn temperature_at(&self, p: Point) -> f64 {
        let n = f64::from(self.temperature.get_noise_2d(p.x as f32, p.y as f32));
        POLE_TEMPERATURE + TEMPERATURE_SPAN * self.latitude(p) + n * TEMPERATURE_NOISE
    }

    #[must_use]
    pub fn precipitation_at(&self, p: Point) -> f64 {
        let n = f64::from(self.precipitation.get_noise_2d(p.x as f32, p.y as f32));
        let lat = self.latitude(p);
        (BASE_PRECIPITATION + PRECIPITATION_SPAN * lat.powf(1.5) + n * PRECIPITATION_NOISE)
            .clamp(0.0, MAX_PRECIPITATION)
    }

    #[must_use]
    pub fn sample(&self, p: Point) -> (f64, f64) {
        (self.temperature_at(p), self.precipitation_at(p))
    }
}

/// Проставляет температуру и осадки всем полигонам.
pub fn assign_climate(graph: &mut PlanarGraph, seed: u64) {
    let field = ClimateField::new(seed, graph.width, graph.height);
    let samples: Vec<(FaceId, Point)> = graph.face_ids().map(|f| (f, graph.face(f).centroid)).collect();

    #[cfg(feature = "parallel")]
    let values: Vec<(f64, f64)> = samples.par_iter().map(|&(_, p)| field.sample(p)).collect();
    #[cfg(not(feature = "parallel"))]
    let values: Vec<(f64, f64)> = samples.iter().map(|&(_, p)| field.sample(p)).collect();

    let (mut coldest, mut warmest) = (f64::INFINITY, f64::NEG_INFINITY);
    for (&(f, _), &(t, p)) in samples.iter().zip(&values) {
        coldest = coldest.min(t);
        warmest = warmest.max(t);
        let face = graph.face_mut(f);
        face.temperature = t;
        face.precipitation = p;
    }
    if !samples.is_empty() {
        info!("Климат: температура от {coldest:.1} до {warmest:.1} °C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::grid;

    #[test]
    fn equator_is_warmer_than_pole() {
        let field = ClimateField::new(7, 100.0, 100.0);
        let north = field.temperature_at(Point::new(50.0, 0.0));
        let south = field.temperature_at(Point::new(50.0, 100.0));
        assert!(south > north);
        assert!(north < 0.0);
        assert!(south > 15.0);
    }

    #[test]
    fn precipitation_stays_in_range() {
        let field = ClimateField::new(3, 20.0, 20.0);
        for i in 0..=20 {
            for j in 0..=20 {
                let p = field.precipitation_at(Point::new(f64::from(i), f64::from(j)));
                assert!((0.0..=MAX_PRECIPITATION).contains(&p));
            }
        }
    }

    #[test]
    fn same_seed_same_climate() {
        let mut a = grid(3, 3, 1.0);
        let mut b = grid(3, 3, 1.0);
        assign_climate(&mut a, 11);
        assign_climate(&mut b, 11);
        for f in a.face_ids() {
            assert_eq!(a.face(f).temperature, b.face(f).temperature);
            assert_eq!(a.face(f).precipitation, b.face(f).precipitation);
        }
    }
}
