//! Конвейер генерации
//!
//! Фазы выполняются строго по порядку, каждая до конца. [`MapGenerator::step`]
//! выполняет ровно одну фазу, что позволяет растянуть генерацию на несколько
//! внешних тиков. Ошибка любой фазы прерывает генерацию: частично построенный
//! граф наружу не отдаётся.
//!
//! Весь случайный выбор идёт из одного потока `ChaCha8Rng`, засеянного из
//! настроек, поэтому одинаковые настройки дают одинаковую карту.

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::balance;
use crate::biome::assign_biomes;
use crate::boundary::{Bounds, FrameSpec, build_frame};
use crate::climate::assign_climate;
use crate::config::GenerationSettings;
use crate::connectivity;
use crate::error::{MapGenError, Result};
use crate::faces;
use crate::graph::geometry::Point;
use crate::graph::{NodeId, PlanarGraph};
use crate::growth::{self, GrowthProfile, Walk};
use crate::map::Map;
use crate::region::group_continents;
use crate::repair;
use crate::rivers::grow_rivers;
use crate::topology::{assign_altitude, assign_ocean_distance};
use crate::water::{apply_recipe, compute_groups};

/// Изменяемое состояние одного прогона, передаваемое через все фазы.
pub struct GenerationContext {
    pub rng: ChaCha8Rng,
    pub profile: GrowthProfile,
    /// Очередь растущих линий, обрабатывается строго FIFO
    pub queue: VecDeque<Walk>,
    /// Пройденные полурёбра при извлечении полигонов
    pub visited: HashSet<(NodeId, NodeId)>,
    /// Область роста (внутри островного кольца, если оно есть)
    pub bounds: Bounds,
}

impl GenerationContext {
    #[must_use]
    pub fn new(settings: &GenerationSettings) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            profile: GrowthProfile::from_settings(settings),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            bounds: Bounds {
                min: Point::new(0.0, 0.0),
                max: Point::new(f64::from(settings.width), f64::from(settings.height)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Frame,
    Growth,
    Faces,
    Repair,
    Balance,
    Water,
    Connectivity,
    Topology,
    Biomes,
    Rivers,
    Done,
}

impl Phase {
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Phase::Frame => Phase::Growth,
            Phase::Growth => Phase::Faces,
            Phase::Faces => Phase::Repair,
            Phase::Repair => Phase::Balance,
            Phase::Balance => Phase::Water,
            Phase::Water => Phase::Connectivity,
            Phase::Connectivity => Phase::Topology,
            Phase::Topology => Phase::Biomes,
            Phase::Biomes => Phase::Rivers,
            Phase::Rivers | Phase::Done => Phase::Done,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct MapGenerator {
    settings: GenerationSettings,
    ctx: GenerationContext,
    graph: PlanarGraph,
    phase: Phase,
}

impl MapGenerator {
    /// Проверяет настройки и готовит пустой граф.
    pub fn new(settings: GenerationSettings) -> Result<Self> {
        settings.validate()?;
        let ctx = GenerationContext::new(&settings);
        let cell = ctx.profile.step_max.max(settings.length_scale());
        let graph = PlanarGraph::new(f64::from(settings.width), f64::from(settings.height), cell);
        Ok(Self {
            settings,
            ctx,
            graph,
            phase: Phase::Frame,
        })
    }

    /// Фаза, которая выполнится следующим вызовом [`Self::step`].
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn graph(&self) -> &PlanarGraph {
        &self.graph
    }

    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Выполняет одну фазу и возвращает следующую.
    pub fn step(&mut self) -> Result<Phase> {
        let phase = self.phase;
        let (graph, ctx, settings) = (&mut self.graph, &mut self.ctx, &self.settings);
        debug!("Фаза {phase}");
        match phase {
            Phase::Frame => {
                let profile = ctx.profile;
                let spec = FrameSpec {
                    segment_min: profile.frame_segment_min,
                    segment_max: profile.frame_segment_max,
                    inset: settings.map_type.inset_frame().then_some(profile.inset_margin),
                };
                ctx.bounds = build_frame(graph, &mut ctx.rng, &spec);
                info!("Рамка: {} узлов", graph.node_count());
            }
            Phase::Growth => {
                let seeds = growth::seed_walks(graph, ctx);
                let steps = growth::grow(graph, ctx);
                info!(
                    "Рост: стартов {seeds}, шагов {steps}, узлов {}, рёбер {}",
                    graph.node_count(),
                    graph.edge_count()
                );
            }
            Phase::Faces => {
                let count = faces::extract_all(graph, ctx)?;
                info!("Извлечено полигонов: {count}");
            }
            Phase::Repair => {
                repair::repair(graph, ctx)?;
            }
            Phase::Balance => {
                balance::balance(graph, ctx, settings)?;
            }
            Phase::Water => {
                apply_recipe(graph, &mut ctx.rng, settings);
                compute_groups(graph, settings);
                group_continents(graph, settings);
            }
            Phase::Connectivity => {
                connectivity::resolve(graph, settings)?;
            }
            Phase::Topology => {
                assign_altitude(graph);
                assign_ocean_distance(graph);
            }
            Phase::Biomes => {
                assign_climate(graph, settings.seed);
                assign_biomes(graph);
            }
            Phase::Rivers => {
                grow_rivers(graph, &mut ctx.rng);
            }
            Phase::Done => {}
        }
        self.phase = phase.next();
        Ok(self.phase)
    }

    /// Выполняет все оставшиеся фазы и возвращает карту.
    pub fn run(mut self) -> Result<Map> {
        while self.phase != Phase::Done {
            self.step()?;
        }
        self.finish()
    }

    /// Превращает завершённую генерацию в карту.
    pub fn finish(self) -> Result<Map> {
        if self.phase != Phase::Done {
            return Err(MapGenError::Invariant(format!(
                "generation stopped before phase {}",
                self.phase
            )));
        }
        let map = Map::from_graph(&self.graph, &self.settings);
        info!(
            "Карта готова: узлов {}, рёбер {}, полигонов {}, рек {}",
            map.nodes.len(),
            map.edges.len(),
            map.faces.len(),
            map.rivers.len()
        );
        Ok(map)
    }
}

/// Генерирует карту целиком.
pub fn generate_map(settings: &GenerationSettings) -> Result<Map> {
    MapGenerator::new(settings.clone())?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapType;

    fn small() -> GenerationSettings {
        GenerationSettings {
            seed: 5,
            width: 8,
            height: 6,
            map_type: MapType::Regional,
            ..GenerationSettings::default()
        }
    }

    #[test]
    fn phases_run_in_order() {
        let mut generator = MapGenerator::new(small()).unwrap();
        let mut seen = vec![generator.phase()];
        while generator.phase() != Phase::Done {
            seen.push(generator.step().unwrap());
        }
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
        assert_eq!(seen.len(), 11);
        assert!(generator.finish().is_ok());
    }

    #[test]
    fn unfinished_generator_does_not_yield_a_map() {
        let mut generator = MapGenerator::new(small()).unwrap();
        generator.step().unwrap();
        assert!(matches!(generator.finish(), Err(MapGenError::Invariant(_))));
    }

    #[test]
    fn invalid_settings_are_rejected_up_front() {
        let settings = GenerationSettings {
            width: 2,
            ..small()
        };
        assert!(matches!(
            MapGenerator::new(settings),
            Err(MapGenError::InvalidSettings(_))
        ));
    }

    #[test]
    fn frame_phase_sets_growth_bounds() {
        let settings = GenerationSettings {
            map_type: MapType::Island,
            width: 10,
            height: 10,
            ..small()
        };
        let mut generator = MapGenerator::new(settings).unwrap();
        generator.step().unwrap();
        assert!(generator.graph().inset);
        assert!(generator.ctx.bounds.min.x > 0.0);
        assert!(generator.ctx.bounds.max.x < 10.0);
    }

    #[test]
    fn coarse_island_ring_is_not_inverted() {
        let settings = GenerationSettings {
            map_type: MapType::Island,
            width: 6,
            height: 4,
            min_face_area: 3.0,
            max_face_area: 24.0,
            ..small()
        };
        let mut generator = MapGenerator::new(settings).unwrap();
        generator.step().unwrap();
        let bounds = generator.ctx.bounds;
        assert!(bounds.width() >= 3.0 - 1e-9);
        assert!(bounds.height() >= 2.0 - 1e-9);
    }
}
