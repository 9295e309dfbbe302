//! Example of grouping a large ledger into regions.
//!
//! Run with: cargo run --example territory_map --features parallel

use std::time::Instant;

use territory_engine::{
    CellId, Claim, GeoPoint, HexGrid, RegionIndex, TerritoryConfig, TerritoryGrouper,
};

fn main() {
    println!("Territory Map Example\n");

    let config = TerritoryConfig::default();
    let grid = HexGrid::new();
    let origin = grid.coordinate_to_cell(&GeoPoint::new(51.5074, -0.1278), config.resolution);

    // Owners hold interleaved stripes of a 200x200 block, with a few gaps
    let owners = ["alice", "bob", "carol", "dave"];
    let mut ledger = Vec::new();
    for dr in 0..200i64 {
        for dc in 0..200i64 {
            if (dr * 7 + dc * 13) % 29 == 0 {
                continue;
            }
            let owner = owners[((dr / 25 + dc / 40) % owners.len() as i64) as usize];
            ledger.push(Claim {
                cell_id: CellId::new(config.resolution, origin.row + dr, origin.col + dc),
                owner_id: owner.to_string(),
                source_run_id: format!("run-{}", dr / 10),
                claimed_at: 1_700_000_000 + dr,
                source_distance_m: 5_000.0,
            });
        }
    }
    println!("Ledger holds {} claims\n", ledger.len());

    let grouper = TerritoryGrouper::new(&config);

    let start = Instant::now();
    let sequential = grouper.group(&ledger);
    println!("Sequential grouping: {} regions in {:?}", sequential.len(), start.elapsed());

    let start = Instant::now();
    let regions = grouper.group_parallel(&ledger);
    println!("Parallel grouping:   {} regions in {:?}\n", regions.len(), start.elapsed());

    for stats in grouper.owner_stats(&regions) {
        println!(
            "  {:<6} {:>6} cells, {:>3} regions, largest {:>5} cells, {:.2} km2",
            stats.owner_id,
            stats.cell_count,
            stats.region_count,
            stats.largest_region_cells,
            stats.area_km2
        );
    }

    // Map lookups
    let index = RegionIndex::new(regions);
    let probe = grid.cell_to_center(&CellId::new(config.resolution, origin.row + 60, origin.col + 90));
    match index.region_at(&probe) {
        Some(region) => println!(
            "\nRegion under ({:.4}, {:.4}): {} with {} cells",
            probe.latitude,
            probe.longitude,
            region.owner_id,
            region.cells.len()
        ),
        None => println!("\nNothing under ({:.4}, {:.4})", probe.latitude, probe.longitude),
    }
    println!("Regions within 1km: {}", index.regions_near(&probe, 1_000.0).len());
}
