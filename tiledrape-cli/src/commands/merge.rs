//! Merge command - rerun the boundary merge over published run tables.

use tiledrape::store::TableRef;

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("merge");
    let runtime = runner.runtime()?;
    let store = runner.connect(&runtime)?;

    let output = &runner.config().output;
    let target = TableRef::new(output.schema.clone(), output.final_table.clone());
    let rows = runner.pipeline(store).merge(&target)?;

    println!("{} rows in {}", rows, target);
    Ok(())
}
