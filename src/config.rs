// src/config.rs
//! Конфигурация генерации карты
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Типы карт (регион, остров, фрактальные континенты, большие океаны)
//! - Границы площади полигонов и размеров кластеров
//! - Настраиваемые допуски связности
//!
//! Все структуры поддерживают сериализацию в TOML/JSON. После начала генерации
//! настройки не меняются: для сетевой игры достаточно передать их вместе с сидом,
//! получатель восстановит идентичную карту.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{MapGenError, Result};

/// Тип генерируемой карты
///
/// Определяет рамку карты, плотность роста и рецепт разбиения на сушу и воду.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MapType {
    /// Прямоугольная рамка, материки разрезаны каналами (≈65% суши)
    #[default]
    Regional,
    /// Внутреннее кольцо, вокруг него постоянный океан (≈60% суши)
    Island,
    /// Континенты по фрактальному шуму (≈45% суши)
    FractalNoise,
    /// Несколько разделённых континентов ограниченного размера в океане
    BigOceans,
}

impl MapType {
    /// Возвращает целевую долю суши (по площади, без внешнего кольца).
    ///
    /// # Примеры
    /// ```
    /// use planar_mapgen::config::MapType;
    /// assert_eq!(MapType::Regional.target_land_ratio(), 0.65);
    /// assert_eq!(MapType::FractalNoise.target_land_ratio(), 0.45);
    /// ```
    #[must_use]
    pub fn target_land_ratio(self) -> f64 {
        match self {
            MapType::Regional => 0.65,
            MapType::Island => 0.60,
            MapType::FractalNoise => 0.45,
            MapType::BigOceans => 0.30,
        }
    }

    /// Минимальная доля суши, которую рецепт обязан обеспечить.
    #[must_use]
    pub fn min_land_coverage(self) -> f64 {
        match self {
            MapType::Island => 0.5,
            _ => 0.0,
        }
    }

    /// Использует ли тип «островную» рамку с внутренним кольцом.
    #[must_use]
    pub fn inset_frame(self) -> bool {
        matches!(self, MapType::Island)
    }

    /// Множитель плотности стартовых точек роста (линий на единицу площади).
    #[must_use]
    pub fn seed_density(self) -> f64 {
        match self {
            MapType::BigOceans => 1.0 / 1.5,
            _ => 1.0,
        }
    }
}

/// Допуски фазы связности
///
/// Численные константы не имеют строгого вывода, поэтому вынесены в конфигурацию.
/// Расстояния выражены в единицах масштаба длины `L` (см. [`GenerationSettings::length_scale`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityTuning {
    /// Сколько ближайших по центроидам пар уточнять точным расстоянием
    #[serde(default = "default_candidate_pairs")]
    pub candidate_pairs: usize,

    /// Относительный допуск к кратчайшему реальному расстоянию для дополнительных переправ
    #[serde(default = "default_real_distance_margin")]
    pub real_distance_margin: f64,

    /// Минимальная дистанция в графе (переходы между полигонами), чтобы переправа имела смысл
    #[serde(default = "default_min_bridge_hops")]
    pub min_bridge_hops: usize,

    /// Дальше этого расстояния материки не соединяются в первой фазе
    #[serde(default = "default_max_bridge_distance")]
    pub max_bridge_distance: f64,

    /// Максимальное расстояние для коротких путей внутри одного материка
    #[serde(default = "default_shortcut_distance")]
    pub shortcut_distance: f64,

    /// Минимальная дистанция в графе для короткого пути внутри материка
    #[serde(default = "default_shortcut_min_hops")]
    pub shortcut_min_hops: usize,
}

fn default_candidate_pairs() -> usize {
    8
}
fn default_real_distance_margin() -> f64 {
    0.35
}
fn default_min_bridge_hops() -> usize {
    6
}
fn default_max_bridge_distance() -> f64 {
    4.0
}
fn default_shortcut_distance() -> f64 {
    1.5
}
fn default_shortcut_min_hops() -> usize {
    8
}

impl Default for ConnectivityTuning {
    fn default() -> Self {
        Self {
            candidate_pairs: default_candidate_pairs(),
            real_distance_margin: default_real_distance_margin(),
            min_bridge_hops: default_min_bridge_hops(),
            max_bridge_distance: default_max_bridge_distance(),
            shortcut_distance: default_shortcut_distance(),
            shortcut_min_hops: default_shortcut_min_hops(),
        }
    }
}

/// Основные параметры генерации
///
/// Полная конфигурация одной карты. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Сид генератора случайных чисел (детерминированная генерация)
    pub seed: u64,

    /// Ширина карты в единицах длины
    #[serde(default = "default_width")]
    pub width: u32,

    /// Высота карты в единицах длины
    #[serde(default = "default_height")]
    pub height: u32,

    /// Минимальная площадь полигона
    #[serde(default = "default_min_face_area")]
    pub min_face_area: f64,

    /// Максимальная площадь полигона
    #[serde(default = "default_max_face_area")]
    pub max_face_area: f64,

    /// Минимальный размер группы полигонов (континента) в полигонах
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Максимальный размер группы полигонов (континента) в полигонах
    #[serde(default = "default_max_cluster_size")]
    pub max_cluster_size: usize,

    /// Тип карты (по умолчанию `Regional`)
    #[serde(default)]
    pub map_type: MapType,

    /// Масштаб континентов: больше — меньше разрезов и крупнее массивы суши
    #[serde(default = "default_continent_scale")]
    pub continent_scale: f64,

    /// Допуски фазы связности
    #[serde(default)]
    pub connectivity: ConnectivityTuning,
}

fn default_width() -> u32 {
    40
}
fn default_height() -> u32 {
    24
}
fn default_min_face_area() -> f64 {
    0.08
}
fn default_max_face_area() -> f64 {
    1.5
}
fn default_min_cluster_size() -> usize {
    4
}
fn default_max_cluster_size() -> usize {
    24
}
fn default_continent_scale() -> f64 {
    1.0
}

/// Максимальная сторона карты.
const MAX_DIMENSION: u32 = 1000;
/// Верхняя граница ожидаемого числа полигонов (площадь карты / минимальная площадь).
const MAX_FACE_BUDGET: f64 = 200_000.0;
/// Сплит допустим только для полигонов крупнее этого множителя минимальной площади.
pub const SPLIT_ELIGIBILITY_FACTOR: f64 = 3.0;
/// Отступ островного кольца не больше этой доли меньшей стороны карты.
const MAX_INSET_SHARE: f64 = 0.25;
/// Внутри островного кольца должно помещаться столько минимальных полигонов.
const MIN_INSET_FACES: f64 = 2.0;

impl GenerationSettings {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # map.toml
    /// seed = 42
    /// width = 10
    /// height = 10
    /// map_type = "Island"
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)?;
        Ok(settings)
    }

    /// Проверяет ограничения до начала генерации.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MapGenError::InvalidSettings(msg));

        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(3..=MAX_DIMENSION).contains(&value) {
                return invalid(format!("{name} must be in 3..={MAX_DIMENSION}, got {value}"));
            }
        }
        if !(self.min_face_area.is_finite() && self.min_face_area > 0.0) {
            return invalid(format!(
                "min_face_area must be positive, got {}",
                self.min_face_area
            ));
        }
        if !(self.max_face_area.is_finite() && self.min_face_area < self.max_face_area) {
            return invalid(format!(
                "min_face_area ({}) must be less than max_face_area ({})",
                self.min_face_area, self.max_face_area
            ));
        }
        if self.max_face_area < SPLIT_ELIGIBILITY_FACTOR * self.min_face_area {
            return invalid(format!(
                "max_face_area must be at least {SPLIT_ELIGIBILITY_FACTOR}× min_face_area"
            ));
        }
        let map_area = f64::from(self.width) * f64::from(self.height);
        if self.max_face_area > map_area {
            return invalid(format!(
                "max_face_area ({}) exceeds the map area ({map_area})",
                self.max_face_area
            ));
        }
        if map_area / self.min_face_area > MAX_FACE_BUDGET {
            return invalid(format!(
                "min_face_area {} is too small for a {}×{} map",
                self.min_face_area, self.width, self.height
            ));
        }
        if self.min_cluster_size == 0 || self.min_cluster_size > self.max_cluster_size {
            return invalid(format!(
                "cluster sizes must satisfy 1 <= min ({}) <= max ({})",
                self.min_cluster_size, self.max_cluster_size
            ));
        }
        if !(self.continent_scale.is_finite()
            && self.continent_scale > 0.0
            && self.continent_scale <= 10.0)
        {
            return invalid(format!(
                "continent_scale must be in (0, 10], got {}",
                self.continent_scale
            ));
        }

        if self.map_type.inset_frame() {
            let (w, h) = self.inset_extent();
            if w * h < MIN_INSET_FACES * self.min_face_area {
                return invalid(format!(
                    "island ring {w:.2}×{h:.2} is too small for faces of area {}",
                    self.min_face_area
                ));
            }
        }

        let c = &self.connectivity;
        if c.candidate_pairs == 0
            || !(c.real_distance_margin >= 0.0)
            || !(c.max_bridge_distance > 0.0)
            || !(c.shortcut_distance > 0.0)
        {
            return invalid("connectivity tuning values must be positive".to_string());
        }
        Ok(())
    }

    /// Характерная длина карты: `(min_face_area · max_face_area)^(1/4)`.
    ///
    /// От неё зависят шаг роста, расстояние прилипания и пороги связности.
    #[must_use]
    pub fn length_scale(&self) -> f64 {
        (self.min_face_area * self.max_face_area).sqrt().sqrt()
    }

    /// Отступ островного кольца от края карты: `max(1.5·L, 0.08·min(w, h))`,
    /// но не больше четверти меньшей стороны.
    #[must_use]
    pub fn inset_margin(&self) -> f64 {
        let side = f64::from(self.width.min(self.height));
        (1.5 * self.length_scale())
            .max(0.08 * side)
            .min(MAX_INSET_SHARE * side)
    }

    /// Размеры области внутри островного кольца.
    #[must_use]
    pub fn inset_extent(&self) -> (f64, f64) {
        let margin = self.inset_margin();
        (
            f64::from(self.width) - 2.0 * margin,
            f64::from(self.height) - 2.0 * margin,
        )
    }

    #[must_use]
    pub fn map_area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            width: default_width(),
            height: default_height(),
            min_face_area: default_min_face_area(),
            max_face_area: default_max_face_area(),
            min_cluster_size: default_min_cluster_size(),
            max_cluster_size: default_max_cluster_size(),
            map_type: MapType::Regional,
            continent_scale: default_continent_scale(),
            connectivity: ConnectivityTuning::default(),
        }
    }
}
