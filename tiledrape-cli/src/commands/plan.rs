//! Plan command - classify the selected tiles and show the three runs.

use super::tile_list;
use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("plan");
    let runtime = runner.runtime()?;
    let store = runner.connect(&runtime)?;
    let planned = runner.pipeline(store).plan()?;

    let classification = &planned.plan.classification;
    println!("Requested tiles:  {}", planned.requested.len());
    println!("Border set:       {}", planned.border_set.len());
    println!("Interior:         {}", classification.interior.len());
    println!("Border:           {}", tile_list(&classification.border));
    if !classification.unrequested_border.is_empty() {
        println!(
            "Not requested:    {}",
            tile_list(&classification.unrequested_border)
        );
    }

    for run in &planned.plan.runs {
        println!();
        println!("[{}]", run.variant);
        println!("  tiles:           {}", run.tiles.len());
        println!("  elevation index: {}", run.elevation_index);
        println!("  output:          {}", run.output_dir.display());
        println!("  table:           {}", run.buildings_table);
        for source in &run.sources {
            println!(
                "  source:          {} ({}, priority {})",
                source.directory.display(),
                source.pattern,
                source.priority
            );
        }
    }
    Ok(())
}
