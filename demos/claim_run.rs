//! Basic example of evaluating and claiming runs.
//!
//! Run with: cargo run --example claim_run

use territory_engine::{
    GeoPoint, InMemoryTerritoryStore, TerritoryConfig, TerritoryEngine, TerritoryStore,
};

fn main() {
    let config = TerritoryConfig::default();
    let engine = match TerritoryEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Bad config: {}", e);
            return;
        }
    };
    let store = InMemoryTerritoryStore::new();

    println!("Territory Claiming Example\n");
    println!(
        "Config: resolution={}, min_distance={}m, min_duration={}s, min_points={}\n",
        config.resolution, config.min_distance_m, config.min_duration_s, config.min_points
    );

    // A ~600m loop around a London park, one fix every 3 seconds
    let park_loop = circle(51.5074, -0.1278, 300.0, 120, 3.0);

    // A short walk to the shop
    let shop_walk = vec![
        GeoPoint::new(51.5074, -0.1278).with_timestamp(0.0),
        GeoPoint::new(51.5076, -0.1279).with_timestamp(20.0),
        GeoPoint::new(51.5078, -0.1280).with_timestamp(40.0),
    ];

    println!("1. Park loop by alice:");
    let run = engine.evaluate_run("run-1", "alice", &park_loop);
    report(&engine, &store, &run, 1_700_000_000);

    println!("2. Shop walk by alice:");
    let run = engine.evaluate_run("run-2", "alice", &shop_walk);
    report(&engine, &store, &run, 1_700_000_600);

    println!("3. Same park loop by bob:");
    let run = engine.evaluate_run("run-3", "bob", &park_loop);
    report(&engine, &store, &run, 1_700_003_600);

    // Regions are derived from a ledger snapshot
    let ledger = store.snapshot();
    println!("Ledger holds {} cells", ledger.len());
    for stats in engine.owner_stats(&ledger) {
        println!(
            "  {}: {} cells in {} regions ({:.3} km2), largest {} cells",
            stats.owner_id,
            stats.cell_count,
            stats.region_count,
            stats.area_km2,
            stats.largest_region_cells
        );
    }

    let center = GeoPoint::new(51.5074, -0.1278);
    let cell = engine.grid().coordinate_to_cell(&center, config.resolution);
    match store.get(&cell) {
        Some(claim) => println!("\nCell {} belongs to {} (run {})", cell, claim.owner_id, claim.source_run_id),
        None => println!("\nCell {} is unclaimed", cell),
    }
}

fn report(
    engine: &TerritoryEngine,
    store: &InMemoryTerritoryStore,
    run: &territory_engine::Run,
    claimed_at: i64,
) {
    println!("   Points kept: {}, simplified to {}", run.trace.len(), run.simplified.len());
    println!("   Distance: {:.0}m, duration: {:.0}s", run.distance_m, run.duration_s);
    match run.verdict.reason() {
        Some(reason) => println!("   Rejected: {}\n", reason),
        None => match engine.claim_run(store, run, claimed_at) {
            Ok(summary) => println!(
                "   Claimed {} cells ({} new, {} captured, {} renewed)\n",
                summary.cells_claimed,
                summary.cells_new,
                summary.cells_captured,
                summary.cells_renewed
            ),
            Err(e) => println!("   Store error: {}\n", e),
        },
    }
}

/// Points around a circle, `interval_s` apart, ending where they start.
fn circle(lat: f64, lng: f64, radius_m: f64, count: usize, interval_s: f64) -> Vec<GeoPoint> {
    let lng_scale = 111_195.0 * lat.to_radians().cos();
    (0..=count)
        .map(|i| {
            let angle = i as f64 / count as f64 * std::f64::consts::TAU;
            GeoPoint::new(
                lat + radius_m * angle.sin() / 111_195.0,
                lng + radius_m * angle.cos() / lng_scale,
            )
            .with_timestamp(i as f64 * interval_s)
            .with_accuracy(8.0)
        })
        .collect()
}
