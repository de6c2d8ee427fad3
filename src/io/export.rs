//! CSV export of dispatch plans and JSON persistence of fitted models.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dispatch::{Action, DispatchDecision, DispatchPlan};
use crate::error::{Error, Result};
use crate::forecast::ForecastModel;

/// Column header of the plan CSV, in the field order of its rows.
pub const PLAN_HEADER: &str = "timestamp,load_kw,action,charge_kw,discharge_kw,soc_kwh,\
                               grid_import_kw,shave_threshold_kw,fill_threshold_kw";

/// One row of the plan CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct PlanRecord {
    timestamp: NaiveDateTime,
    load_kw: f64,
    action: Action,
    charge_kw: f64,
    discharge_kw: f64,
    soc_kwh: f64,
    grid_import_kw: f64,
    shave_threshold_kw: f64,
    fill_threshold_kw: f64,
}

impl From<&DispatchDecision> for PlanRecord {
    fn from(d: &DispatchDecision) -> Self {
        Self {
            timestamp: d.timestamp,
            load_kw: d.load_kw,
            action: d.action,
            charge_kw: d.charge_kw,
            discharge_kw: d.discharge_kw,
            soc_kwh: d.soc_kwh,
            grid_import_kw: d.grid_import_kw,
            shave_threshold_kw: d.shave_threshold_kw,
            fill_threshold_kw: d.fill_threshold_kw,
        }
    }
}

impl From<PlanRecord> for DispatchDecision {
    fn from(r: PlanRecord) -> Self {
        Self {
            timestamp: r.timestamp,
            load_kw: r.load_kw,
            action: r.action,
            charge_kw: r.charge_kw,
            discharge_kw: r.discharge_kw,
            soc_kwh: r.soc_kwh,
            grid_import_kw: r.grid_import_kw,
            shave_threshold_kw: r.shave_threshold_kw,
            fill_threshold_kw: r.fill_threshold_kw,
        }
    }
}

/// Exports a plan to a CSV file at the given path.
///
/// Produces deterministic output for identical plans.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_plan_csv(plan: &DispatchPlan, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_plan_csv(plan, io::BufWriter::new(file))
}

/// Writes a plan as CSV to any writer: a [`PLAN_HEADER`] row, then one row
/// per decision.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_plan_csv(plan: &DispatchPlan, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(PLAN_HEADER.split(','))?;
    for d in plan.decisions() {
        wtr.serialize(PlanRecord::from(d))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads a plan written by [`write_plan_csv`].
///
/// The decoded decisions go through [`DispatchPlan::from_decisions`].
///
/// # Errors
///
/// Returns `Error::Data` for a header other than [`PLAN_HEADER`],
/// unparsable rows, an empty table, or decisions that do not form a
/// consistent plan.
pub fn read_plan_csv(reader: impl Read, step_minutes: u32) -> Result<DispatchPlan> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let header = rdr
        .headers()
        .map_err(|e| Error::data("plan_csv.header", e.to_string()))?;
    if !header.iter().eq(PLAN_HEADER.split(',')) {
        return Err(Error::data(
            "plan_csv.header",
            format!("expected \"{PLAN_HEADER}\""),
        ));
    }

    let decisions = rdr
        .deserialize::<PlanRecord>()
        .enumerate()
        .map(|(i, rec)| {
            rec.map(DispatchDecision::from)
                .map_err(|e| Error::data(format!("plan_csv[{i}]"), e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    if decisions.is_empty() {
        return Err(Error::data("plan_csv", "no decisions"));
    }
    DispatchPlan::from_decisions(step_minutes, decisions)
}

/// Saves a model as pretty-printed JSON.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn save_model_json(model: &ForecastModel, path: &Path) -> io::Result<()> {
    let mut buf = io::BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut buf, model)?;
    buf.flush()
}

/// Loads a model saved by [`save_model_json`].
///
/// # Errors
///
/// Returns `Error::Data` if the file cannot be read or does not hold a
/// consistent model.
pub fn load_model_json(path: &Path) -> Result<ForecastModel> {
    let file = File::open(path)
        .map_err(|e| Error::data("model", format!("cannot read \"{}\": {e}", path.display())))?;
    serde_json::from_reader(io::BufReader::new(file))
        .map_err(|e| Error::data("model", e.to_string()))
}
