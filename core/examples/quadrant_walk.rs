use spacemap_core::{Category, Dimensionality, Engine, EngineConfig};

fn main() {
    // Flat 16×16 quadrants, keep the 3×3 block around the viewer
    let config = EngineConfig {
        dimensions: Dimensionality::Two,
        quadrant_edge_length: 16,
        load_radius: 1,
        retention_radius: 1,
        ..EngineConfig::default()
    };
    let mut engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("bad config: {e}");
            return;
        }
    };

    // Walk east one quadrant per tick
    for step in 0..5 {
        let viewer = [step as f64 * 16.0 + 8.0, 8.0, 0.0];
        let report = engine.tick(viewer);
        println!(
            "tick {step}: center {:?}, loaded {}, evicted {}, moved {}",
            report.view.center,
            report.view.loaded.len(),
            report.view.evicted.len(),
            report.steps.moved
        );
    }

    // Print the viewer's quadrant as characters
    let center = engine.cache().center();
    if let Some(handle) = engine.cache().get(center) {
        let quadrant = handle.read();
        let [w, _, _] = quadrant.shape();
        if let Ok(layer) = quadrant.slice_z(0) {
            for row in layer.chunks(w) {
                let line: String = row
                    .iter()
                    .map(|c| match c {
                        Category::Empty => ' ',
                        Category::Sparse => '.',
                        Category::Dense => '*',
                        Category::Extreme => '@',
                    })
                    .collect();
                println!("{line}");
            }
        }
        println!("counts {:?}", quadrant.counts());
    }
}
