//! activity-map CLI - Debug tool for the map pipeline
//!
//! Usage:
//!   activity-map-cli <archive.json> [--year <Y> | --city <C> | --title <T>]
//!                    [--locate[=<id,...>]] [--animate] [--geojson <file>] [--config <file>]
//!
//! Loads an activity archive, applies one selection and prints what a map
//! renderer would be asked to draw: title, viewport, path and heatmap counts.
//! With `--animate` every reveal step is printed as well.

use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use activity_map::{
    aggregate_heatmap, ActivityRecord, AnimationPhase, MapConfig, MapSession, RenderFrame,
};

#[derive(Parser)]
#[command(name = "activity-map-cli")]
#[command(about = "Debug tool for activity map rendering", long_about = None)]
struct Cli {
    /// Activity archive (JSON array of runs)
    archive: PathBuf,

    /// Show a single year, or "Total"
    #[arg(short, long, group = "selection")]
    year: Option<String>,

    /// Show runs whose location contains this text
    #[arg(short, long, group = "selection")]
    city: Option<String>,

    /// Show runs whose name contains this text
    #[arg(short, long, group = "selection")]
    title: Option<String>,

    /// Locate runs by id after selecting (`--locate=1,2`; bare `--locate` = all)
    #[arg(short, long, value_delimiter = ',', num_args = 0..=1, require_equals = true)]
    locate: Option<Vec<i64>>,

    /// Print every animation step
    #[arg(short, long)]
    animate: bool,

    /// Write the final geometry as GeoJSON
    #[arg(short, long)]
    geojson: Option<PathBuf>,

    /// Map configuration (JSON, missing sections use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match read_file(path).and_then(|json| {
            MapConfig::from_json(&json).map_err(|e| e.to_string())
        }) {
            Ok(config) => config,
            Err(e) => fail(&format!("Invalid config {}: {}", path.display(), e)),
        },
        None => MapConfig::default(),
    };

    let activities = match read_file(&cli.archive)
        .and_then(|json| ActivityRecord::parse_archive(&json).map_err(|e| e.to_string()))
    {
        Ok(activities) => activities,
        Err(e) => fail(&format!("Failed to load {}: {}", cli.archive.display(), e)),
    };

    println!("\n{}", "=".repeat(60));
    println!("Loaded {} activities from {}", activities.len(), cli.archive.display());
    println!("{}", "=".repeat(60));

    let invalid: Vec<&ActivityRecord> = activities.iter().filter(|a| a.validate().is_err()).collect();
    if !invalid.is_empty() {
        println!("  {} records will be excluded from the map:", invalid.len());
        if cli.verbose {
            for record in &invalid {
                if let Err(e) = record.validate() {
                    println!("    {}", e);
                }
            }
        }
    }

    let mut session = match MapSession::new(activities, config.clone()) {
        Ok(session) => session,
        Err(e) => fail(&e.to_string()),
    };
    let years: Vec<String> = session.available_years().iter().map(|y| y.to_string()).collect();
    println!("  Years: {}", years.join(", "));

    let mut frame = if let Some(city) = &cli.city {
        session.select_city(city)
    } else if let Some(title) = &cli.title {
        session.select_title(title)
    } else {
        let year = cli.year.clone().unwrap_or_else(|| session.this_year().to_string());
        session.select_year(&year)
    };
    println!("  Selection: {:?} ({} runs)", session.filter(), session.runs().len());

    if cli.animate {
        println!("\n{}", "=".repeat(60));
        println!("Animation");
        println!("{}", "=".repeat(60));
    }
    let mut step = 0;
    while let Some(token) = frame.next_tick {
        // No real timer here; deliver immediately
        match session.tick(token) {
            Some(next) => frame = next,
            None => break,
        }
        step += 1;
        if cli.animate {
            println!(
                "  Tick {:>2} (+{}ms): {} paths, {} points",
                step,
                token.delay_ms,
                frame.geometry.len(),
                frame.geometry.point_count()
            );
        }
    }
    if frame.phase != AnimationPhase::Complete && cli.animate {
        println!("  Animation did not run (phase {:?})", frame.phase);
    }

    if let Some(ids) = &cli.locate {
        match session.locate(ids) {
            Some(located) => frame = located,
            None => println!("  Locate {:?}: no matching runs in the selection", ids),
        }
    }

    print_frame(&frame, &config, cli.verbose);

    if let Some(path) = &cli.geojson {
        let text = frame.geometry.to_geojson().to_string();
        match fs::write(path, text) {
            Ok(()) => println!("\n  Wrote GeoJSON to {}", path.display()),
            Err(e) => fail(&format!("Failed to write {}: {}", path.display(), e)),
        }
    }
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| e.to_string())
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn print_frame(frame: &RenderFrame, config: &MapConfig, verbose: bool) {
    println!("\n{}", "=".repeat(60));
    println!("Frame");
    println!("{}", "=".repeat(60));
    println!("  Title: {}", if frame.title.is_empty() { "(none)" } else { frame.title.as_str() });
    println!("  Year: {}", frame.year);
    if let Some(id) = frame.single_run_id {
        println!("  Single run: {}", id);
    }

    let viewport = &frame.viewport;
    println!(
        "  Viewport: center ({:.6}, {:.6}) zoom {}",
        viewport.center.latitude, viewport.center.longitude, viewport.zoom
    );
    if let Some(b) = viewport.bounds {
        println!(
            "    Bounds: lat {:.5}..{:.5}, lng {:.5}..{:.5}",
            b.min_lat, b.max_lat, b.min_lng, b.max_lng
        );
    } else {
        println!("    Bounds: none (fallback camera)");
    }

    println!(
        "  Geometry: {} paths, {} points",
        frame.geometry.len(),
        frame.geometry.point_count()
    );
    if verbose {
        for path in &frame.geometry.paths {
            println!(
                "    Run {}: {} points, {:.2}km",
                path.activity_id,
                path.points.len(),
                path.length_meters() / 1000.0
            );
        }
    }

    let total_weight: f64 = frame.heatmap.iter().map(|p| p.weight).sum();
    println!(
        "  Heatmap: {} samples, total weight {:.1}",
        frame.heatmap.len(),
        total_weight
    );
    let grid = aggregate_heatmap(&frame.heatmap, &config.heatmap);
    println!(
        "    {} cells at {:.0}m, heaviest {:.1}",
        grid.cells.len(),
        grid.cell_size_meters,
        grid.max_weight
    );
}
