pub mod balance;
pub mod biome;
pub mod boundary;
pub mod climate;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod faces;
pub mod generator;
pub mod graph;
pub mod growth;
pub mod map;
pub mod png;
pub mod region;
pub mod repair;
pub mod rivers;
pub mod topology;
pub mod water;

#[cfg(test)]
mod testutil;

pub use biome::Biome;
pub use config::{ConnectivityTuning, GenerationSettings, MapType};
pub use error::{MapGenError, Result};
pub use generator::{MapGenerator, Phase, generate_map};
pub use map::Map;
pub use png::MapImage;
