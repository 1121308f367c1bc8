//! Cross-region combination, global calibration and CSV output.
//!
//! Regions are extracted independently (rayon, roster order preserved) and
//! folded into a [`CombinedTable`]. Calibration consumes the combined table
//! and produces a [`CalibratedTable`]; the scaled type has no calibration
//! method, so the factor cannot be applied twice.

use rayon::prelude::*;
use std::path::Path;

use crate::aggregate::{aggregate_region, DistrictAggregate, MedianMethod, RegionTable};
use crate::districts::state_fips;
use crate::error::{AggError, AggResult};
use crate::provider::SimulationSource;

/// USDA FY authoritative total benefit issuance, for raking-style calibration.
pub const SNAP_TARGET: f64 = 106_744_001_279.0;

pub struct PipelineOptions {
    pub median: MedianMethod,
    /// On a region failure: warn and continue instead of aborting the run.
    pub skip_missing: bool,
    pub target: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            median: MedianMethod::Weighted,
            skip_missing: false,
            target: SNAP_TARGET,
        }
    }
}

fn extract_region<S: SimulationSource>(
    source: &S,
    state: &str,
    method: MedianMethod,
) -> AggResult<RegionTable> {
    log::info!("processing {state}");
    let households = source
        .households(state)
        .map_err(|e| e.in_state(state))?;
    let persons = source.persons(state).map_err(|e| e.in_state(state))?;
    Ok(aggregate_region(state, households, &persons, method))
}

/// Combined but not yet calibrated district rows.
pub struct CombinedTable {
    rows: Vec<DistrictAggregate>,
    orphan_persons: u64,
}

impl CombinedTable {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            orphan_persons: 0,
        }
    }
}

/// Pure fold step: prior accumulated table plus one region's result.
fn combine(mut acc: CombinedTable, region: RegionTable) -> CombinedTable {
    acc.rows.extend(region.rows);
    acc.orphan_persons += region.orphan_persons;
    acc
}

fn pct(part: f64, whole: f64) -> Option<f64> {
    if whole > 0.0 {
        Some((part / whole * 1000.0).round() / 10.0)
    } else {
        None
    }
}

impl CombinedTable {
    /// Scale every row's total benefit so the column sums to `target`.
    ///
    /// Consumes the unscaled table: there is no path that re-applies the
    /// factor to already-calibrated rows. Also derives the percentage
    /// columns and sorts by (state, district).
    pub fn calibrate(self, target: f64) -> AggResult<CalibratedTable> {
        let estimate: f64 = self.rows.iter().map(|r| r.total_snap).sum();
        if !estimate.is_finite() || estimate <= 0.0 {
            return Err(AggError::EmptyEstimate);
        }
        let factor = target / estimate;

        let mut rows: Vec<DistrictRow> = self
            .rows
            .into_iter()
            .map(|r| DistrictRow {
                congressional_district_geoid: r.congressional_district_geoid,
                state_fips: r.state_fips,
                total_households: r.total_households,
                snap_population: r.snap_population,
                snap_under_18: r.snap_under_18,
                snap_over_65: r.snap_over_65,
                snap_employed: r.snap_employed,
                total_snap: r.total_snap * factor,
                median_household_income: r.median_household_income,
                pct_under_18: pct(r.snap_under_18, r.snap_population),
                pct_over_65: pct(r.snap_over_65, r.snap_population),
                employment_rate: pct(r.snap_employed, r.snap_population),
            })
            .collect();
        rows.sort_by_key(|r| (r.state_fips, r.congressional_district_geoid));

        Ok(CalibratedTable {
            factor,
            rows,
            orphan_persons: self.orphan_persons,
        })
    }
}

/// Final output row. Field order is the CSV column order.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct DistrictRow {
    pub congressional_district_geoid: u32,
    pub state_fips: u32,
    pub total_households: f64,
    pub snap_population: f64,
    pub snap_under_18: f64,
    pub snap_over_65: f64,
    pub snap_employed: f64,
    pub total_snap: f64,
    pub median_household_income: Option<f64>,
    pub pct_under_18: Option<f64>,
    pub pct_over_65: Option<f64>,
    pub employment_rate: Option<f64>,
}

#[derive(Debug)]
pub struct CalibratedTable {
    pub factor: f64,
    pub orphan_persons: u64,
    rows: Vec<DistrictRow>,
}

pub struct TableSummary {
    pub districts: usize,
    pub total_snap: f64,
    pub total_recipients: f64,
    pub avg_pct_under_18: Option<f64>,
    pub avg_pct_over_65: Option<f64>,
    pub avg_employment_rate: Option<f64>,
    pub avg_median_income: Option<f64>,
    pub low_benefit_districts: usize,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.iter().sum::<f64>() / collected.len() as f64)
    }
}

impl CalibratedTable {
    pub fn rows(&self) -> &[DistrictRow] {
        &self.rows
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> AggResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            districts: self.rows.len(),
            total_snap: self.rows.iter().map(|r| r.total_snap).sum(),
            total_recipients: self.rows.iter().map(|r| r.snap_population).sum(),
            avg_pct_under_18: mean(self.rows.iter().filter_map(|r| r.pct_under_18)),
            avg_pct_over_65: mean(self.rows.iter().filter_map(|r| r.pct_over_65)),
            avg_employment_rate: mean(self.rows.iter().filter_map(|r| r.employment_rate)),
            avg_median_income: mean(self.rows.iter().filter_map(|r| r.median_household_income)),
            low_benefit_districts: self.rows.iter().filter(|r| r.total_snap < 1000.0).count(),
        }
    }
}

/// Run the whole pipeline: extract every state, fold, calibrate once.
pub fn run<S: SimulationSource>(
    source: &S,
    states: &[String],
    opts: &PipelineOptions,
) -> AggResult<CalibratedTable> {
    for state in states {
        if state_fips(state).is_none() {
            return Err(AggError::UnknownState(state.clone()));
        }
    }

    // Regions are independent until the fold; collect preserves roster order.
    let results: Vec<AggResult<RegionTable>> = states
        .par_iter()
        .map(|state| extract_region(source, state, opts.median))
        .collect();

    let mut tables = Vec::new();
    for result in results {
        match result {
            Ok(table) => tables.push(table),
            Err(e) if opts.skip_missing => log::warn!("skipping region: {e}"),
            Err(e) => return Err(e),
        }
    }

    let combined = tables.into_iter().fold(CombinedTable::new(), combine);
    combined.calibrate(opts.target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{HouseholdRecord, MemorySource, PersonRecord};
    use proptest::prelude::*;

    fn hh(id: u64, weight: f64, geoid: u32, fips: u32, income: f64, snap: f64) -> HouseholdRecord {
        HouseholdRecord {
            id,
            weight,
            congressional_district_geoid: geoid,
            state_fips: fips,
            market_income: income,
            snap,
        }
    }

    fn person(id: u64, household_id: u64, age: u32, employment_income: f64) -> PersonRecord {
        PersonRecord {
            id,
            household_id,
            age,
            employment_income,
        }
    }

    fn two_state_source() -> MemorySource {
        let mut source = MemorySource::new();
        source.insert(
            "NC",
            vec![
                hh(1, 1.0, 3701, 37, 50_000.0, 0.0),
                hh(2, 2.0, 3701, 37, 12_000.0, 100.0),
            ],
            vec![person(10, 1, 40, 30_000.0), person(11, 2, 10, 0.0)],
        );
        source.insert(
            "WY",
            vec![hh(3, 1.0, 5600, 56, 28_000.0, 40.0)],
            vec![person(12, 3, 66, 0.0)],
        );
        source
    }

    #[test]
    fn calibrated_benefit_total_equals_target() {
        let source = two_state_source();
        let states = vec!["NC".to_owned(), "WY".to_owned()];
        let opts = PipelineOptions {
            target: 1_000_000.0,
            ..Default::default()
        };
        let table = run(&source, &states, &opts).unwrap();
        let total: f64 = table.rows().iter().map(|r| r.total_snap).sum();
        assert!((total - 1_000_000.0).abs() < 1e-6);
        // Unscaled estimate was 240; the factor reflects that.
        assert!((table.factor - 1_000_000.0 / 240.0).abs() < 1e-9);
    }

    #[test]
    fn synthetic_district_percentages() {
        let source = two_state_source();
        let states = vec!["NC".to_owned()];
        let opts = PipelineOptions {
            target: 200.0,
            ..Default::default()
        };
        let table = run(&source, &states, &opts).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.total_snap, 200.0);
        assert_eq!(row.snap_population, 2.0);
        assert_eq!(row.pct_under_18, Some(100.0));
        assert_eq!(row.pct_over_65, Some(0.0));
    }

    #[test]
    fn zero_recipient_district_yields_null_percentages() {
        let mut source = MemorySource::new();
        source.insert(
            "DE",
            vec![hh(1, 5.0, 1001, 10, 60_000.0, 25.0)],
            // Nobody lives in the receiving household's district rows, so
            // the weighted recipient population stays zero.
            vec![],
        );
        let states = vec!["DE".to_owned()];
        let table = run(&source, &states, &PipelineOptions::default()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row.snap_population, 0.0);
        assert_eq!(row.pct_under_18, None);
        assert_eq!(row.pct_over_65, None);
        assert_eq!(row.employment_rate, None);
    }

    #[test]
    fn missing_region_aborts_by_default() {
        let source = two_state_source();
        let states = vec!["NC".to_owned(), "AK".to_owned()];
        let err = run(&source, &states, &PipelineOptions::default()).unwrap_err();
        match err {
            AggError::Region { state, .. } => assert_eq!(state, "AK"),
            other => panic!("expected Region error, got {other}"),
        }
    }

    #[test]
    fn missing_region_skipped_when_asked() {
        let source = two_state_source();
        let states = vec!["NC".to_owned(), "AK".to_owned(), "WY".to_owned()];
        let opts = PipelineOptions {
            skip_missing: true,
            target: 240.0,
            ..Default::default()
        };
        let table = run(&source, &states, &opts).unwrap();
        // NC's one district plus WY's at-large district; AK contributed
        // nothing, not zero rows.
        assert_eq!(table.rows().len(), 2);
    }

    #[test]
    fn unknown_state_is_rejected_up_front() {
        let source = MemorySource::new();
        let states = vec!["ZZ".to_owned()];
        let err = run(&source, &states, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, AggError::UnknownState(s) if s == "ZZ"));
    }

    #[test]
    fn output_sorted_by_state_then_district() {
        let source = two_state_source();
        let states = vec!["WY".to_owned(), "NC".to_owned()];
        let table = run(&source, &states, &PipelineOptions::default()).unwrap();
        let keys: Vec<(u32, u32)> = table
            .rows()
            .iter()
            .map(|r| (r.state_fips, r.congressional_district_geoid))
            .collect();
        assert_eq!(keys, vec![(37, 3701), (56, 5601)]);
    }

    #[test]
    fn empty_table_cannot_be_calibrated() {
        let combined = CombinedTable::new();
        assert!(matches!(
            combined.calibrate(SNAP_TARGET),
            Err(AggError::EmptyEstimate)
        ));
    }

    fn bare_row(geoid: u32, total_snap: f64) -> DistrictAggregate {
        DistrictAggregate {
            congressional_district_geoid: geoid,
            state_fips: geoid / 100,
            total_households: 1.0,
            snap_population: 1.0,
            snap_under_18: 0.0,
            snap_over_65: 0.0,
            snap_employed: 0.0,
            total_snap,
            median_household_income: None,
        }
    }

    proptest! {
        #[test]
        fn calibration_hits_target_for_arbitrary_tables(
            benefits in proptest::collection::vec(1.0f64..1e9, 1..50),
            target in 1e3f64..1e12,
        ) {
            let rows = benefits
                .iter()
                .enumerate()
                .map(|(i, b)| bare_row(100 + i as u32, *b))
                .collect();
            let combined = CombinedTable { rows, orphan_persons: 0 };
            let calibrated = combined.calibrate(target).unwrap();
            let total: f64 = calibrated.rows().iter().map(|r| r.total_snap).sum();
            prop_assert!((total - target).abs() <= target * 1e-9);
        }
    }
}
