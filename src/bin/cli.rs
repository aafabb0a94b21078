use clap::Parser;
use log::info;
use planar_mapgen::{GenerationSettings, MapImage, generate_map};
use std::path::PathBuf;
use std::process::ExitCode;

/// Генератор карт на плоском графе
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Переопределить сид из конфигурации
    #[arg(short, long)]
    seed: Option<u64>,

    /// Путь для сохранения карты в JSON
    #[arg(short, long, default_value = "map.json")]
    output: PathBuf,

    /// Дополнительно сохранить рисунок карты в PNG
    #[arg(long)]
    png: Option<PathBuf>,

    /// Пикселей на единицу длины карты
    #[arg(long, default_value_t = 24)]
    scale: u32,
}

fn run(cli: &Cli) -> planar_mapgen::Result<()> {
    println!("Загрузка конфигурации...");
    let mut settings = GenerationSettings::from_toml_file(&cli.config)?;
    if let Some(seed) = cli.seed {
        settings.seed = seed;
    }
    info!(
        "Генерация карты {}×{} ({:?}), сид {}",
        settings.width, settings.height, settings.map_type, settings.seed
    );

    let map = generate_map(&settings)?;
    println!("Сохранение в {:?}", cli.output);
    map.save_json(&cli.output)?;

    if let Some(path) = &cli.png {
        MapImage::render(&map, cli.scale).save_as_png(path)?;
        info!("Рисунок сохранён в {}", path.display());
    }
    println!("\nГотово! Полигонов: {}, рек: {}.", map.faces.len(), map.rivers.len());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
