//! CSV export for episode trajectories.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::state::StepRecord;

/// Fixed leading columns of the trajectory CSV schema. Two columns per
/// storage device (`<name>_kw`, `<name>_soc_kwh`) are inserted between
/// `production_kw` and `import_kwh`.
const FIXED_HEAD: &[&str] = &["step", "timestamp", "action", "consumption_kw", "production_kw"];

const FIXED_TAIL: &[&str] = &[
    "import_kwh",
    "export_kwh",
    "shed_kwh",
    "curtailed_kwh",
    "fuel_cost",
    "load_shedding",
    "curtailment",
    "storage_maintenance",
    "total_cost",
    "reward",
];

/// Exports an episode trajectory to a CSV file at the given path.
///
/// # Arguments
///
/// * `records` - Complete episode trajectory
/// * `storage_names` - Device names in grid order, used for column headers
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[StepRecord], storage_names: &[&str], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, storage_names, buf)
}

/// Writes an episode trajectory as CSV to any writer.
///
/// Produces deterministic output for identical inputs: a header row, then
/// one row per step.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(
    records: &[StepRecord],
    storage_names: &[&str],
    writer: impl Write,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header: Vec<String> = FIXED_HEAD.iter().map(ToString::to_string).collect();
    for name in storage_names {
        header.push(format!("{name}_kw"));
        header.push(format!("{name}_soc_kwh"));
    }
    header.extend(FIXED_TAIL.iter().map(ToString::to_string));
    wtr.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.step.to_string(),
            r.timestamp.to_string(),
            r.action.to_string(),
            format!("{:.4}", r.consumption_kw),
            format!("{:.4}", r.production_kw),
        ];
        for (kw, soc) in r.storage_kw.iter().zip(&r.storage_socs) {
            row.push(format!("{kw:.4}"));
            row.push(format!("{soc:.4}"));
        }
        row.extend([
            format!("{:.4}", r.info.import_kwh),
            format!("{:.4}", r.info.export_kwh),
            format!("{:.4}", r.info.shed_kwh),
            format!("{:.4}", r.info.curtailed_kwh),
            format!("{:.4}", r.info.fuel_cost),
            format!("{:.4}", r.info.load_shedding),
            format!("{:.4}", r.info.curtailment),
            format!("{:.4}", r.info.storage_maintenance),
            format!("{:.4}", r.info.total_cost),
            format!("{:.4}", r.reward),
        ]);
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
