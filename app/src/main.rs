mod render;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{error, info};
use spacemap_core::{Engine, EngineConfig, QuadrantKey};
use spacemap_storage::QuadrantStore;

const USAGE: &str = "usage: spacemap [config.json] [--ticks N] [--png DIR] [--mongo URI]";

struct Options {
    config: Option<PathBuf>,
    ticks: usize,
    png_dir: Option<PathBuf>,
    mongo_uri: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options {
        config: None,
        ticks: 5,
        png_dir: None,
        mongo_uri: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ticks" => {
                let n = args.next().ok_or("--ticks needs a value")?;
                opts.ticks = n.parse().map_err(|_| format!("bad tick count {n}"))?;
            }
            "--png" => opts.png_dir = Some(args.next().ok_or("--png needs a directory")?.into()),
            "--mongo" => opts.mongo_uri = Some(args.next().ok_or("--mongo needs a uri")?),
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => {
                return Err(format!("unknown flag {other}\n{USAGE}"));
            }
            path => opts.config = Some(path.into()),
        }
    }
    Ok(opts)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn Error>> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)?;
            let config: EngineConfig = serde_json::from_str(&text)?;
            info!("loaded config from {}", p.display());
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

// Render the middle z layer of a quadrant as two PNGs
fn export_png(engine: &Engine, key: QuadrantKey, dir: &Path) -> Result<(), Box<dyn Error>> {
    let Some(handle) = engine.cache().get(key) else {
        return Ok(());
    };
    let quadrant = handle.read();
    let [w, h, d] = quadrant.shape();
    let z = d / 2;

    fs::create_dir_all(dir)?;
    let stem = format!("quadrant_{}_{}_{}", key[0], key[1], key[2]);
    let labels = dir.join(format!("{stem}_labels.png"));
    let samples = dir.join(format!("{stem}_samples.png"));
    render::category_image(&quadrant.slice_z(z)?, w, h).save(&labels)?;
    render::sample_image(&quadrant.field().slice_z(z)?, w, h).save(&samples)?;
    info!("saved {} and {}", labels.display(), samples.display());
    Ok(())
}

// Snapshot every resident quadrant on a single-threaded runtime
fn save_to_mongo(engine: &Engine, uri: &str) -> Result<(), Box<dyn Error>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let seed = engine.cache().seed();
    rt.block_on(async {
        let store = QuadrantStore::init(uri, "spacemap", "quadrants").await?;
        for (key, handle) in engine.cache().resident() {
            let quadrant = handle.read().clone();
            store.save(seed, key, &quadrant).await?;
        }
        info!("saved {} quadrants for seed {seed}", engine.cache().len());
        Ok::<_, spacemap_storage::StorageError>(())
    })?;
    Ok(())
}

fn run(opts: Options) -> Result<(), Box<dyn Error>> {
    let config = load_config(opts.config.as_deref())?;
    let edge = config.quadrant_edge_length as f64;
    let mut engine = Engine::new(config)?;

    // Walk east one quadrant per tick, starting in the middle of quadrant 0
    let mut viewer = [edge / 2.0; 3];
    for tick in 0..opts.ticks {
        let report = engine.tick(viewer);
        info!(
            "tick {tick}: center {:?} resident {} loaded {} evicted {} | \
             attractors {} mobile {} moved {} overwrites {}",
            report.view.center,
            report.resident,
            report.view.loaded.len(),
            report.view.evicted.len(),
            report.steps.attractors,
            report.steps.mobile,
            report.steps.moved,
            report.steps.overwrites
        );
        viewer[0] += edge;
    }

    let center = engine.cache().center();
    if let Some(handle) = engine.cache().get(center) {
        info!("viewer quadrant {center:?} counts {:?}", handle.read().counts());
    }
    if let Some(dir) = &opts.png_dir {
        export_png(&engine, center, dir)?;
    }
    if let Some(uri) = &opts.mongo_uri {
        save_to_mongo(&engine, uri)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
