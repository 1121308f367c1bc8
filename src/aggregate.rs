//! Person→household join, subgroup counting and per-district weighted
//! aggregation for one state.

use itertools::Itertools;
use std::collections::HashMap;

use crate::districts::normalize_geoid;
use crate::provider::{HouseholdRecord, PersonRecord};

/// How the median market income of benefit-receiving households is computed.
///
/// `Weighted` is the true survey-weighted median (cumulative household weight
/// crossing half the total). `Unweighted` is the plain sample median, kept as
/// a documented approximation. One method per run; they are never mixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MedianMethod {
    Weighted,
    Unweighted,
}

impl std::str::FromStr for MedianMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weighted" => Ok(Self::Weighted),
            "unweighted" => Ok(Self::Unweighted),
            other => Err(format!("unknown median method '{other}'")),
        }
    }
}

/// Unweighted per-household person counts. Multiplied by the household
/// survey weight at aggregation time.
#[derive(Clone, Copy, Default)]
pub struct HouseholdCounts {
    pub n_recipients: u32,
    pub n_under_18: u32,
    pub n_over_65: u32,
    pub n_employed: u32,
}

/// One row per district: weighted sums plus the recipient income median.
#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct DistrictAggregate {
    pub congressional_district_geoid: u32,
    pub state_fips: u32,
    pub total_households: f64,
    pub snap_population: f64,
    pub snap_under_18: f64,
    pub snap_over_65: f64,
    pub snap_employed: f64,
    pub total_snap: f64,
    pub median_household_income: Option<f64>,
}

pub struct RegionTable {
    pub state: String,
    pub rows: Vec<DistrictAggregate>,
    /// Person rows referencing a household id absent from the household
    /// table. A data-quality defect: reported, never silently dropped.
    pub orphan_persons: u64,
}

/// Count benefit-subgroup members per household from the person table.
/// Returns the counts keyed by household id plus the orphan-person count.
pub fn household_counts(
    persons: &[PersonRecord],
    benefit_by_household: &HashMap<u64, f64>,
) -> (HashMap<u64, HouseholdCounts>, u64) {
    let mut counts: HashMap<u64, HouseholdCounts> = HashMap::new();
    let mut orphans = 0u64;

    for person in persons {
        let Some(&snap) = benefit_by_household.get(&person.household_id) else {
            orphans += 1;
            continue;
        };
        let c = counts.entry(person.household_id).or_default();
        if snap > 0.0 {
            c.n_recipients += 1;
            if person.age < 18 {
                c.n_under_18 += 1;
            }
            if person.age >= 65 {
                c.n_over_65 += 1;
            }
            if person.employment_income > 0.0 {
                c.n_employed += 1;
            }
        }
    }

    (counts, orphans)
}

/// Median of `(value, weight)` samples. `None` on an empty sample set or,
/// for the weighted method, zero total weight.
pub fn median(samples: Vec<(f64, f64)>, method: MedianMethod) -> Option<f64> {
    let sorted: Vec<(f64, f64)> = samples
        .into_iter()
        .sorted_by(|a, b| a.0.total_cmp(&b.0))
        .collect();
    if sorted.is_empty() {
        return None;
    }

    match method {
        MedianMethod::Unweighted => {
            let n = sorted.len();
            if n % 2 == 1 {
                Some(sorted[n / 2].0)
            } else {
                Some((sorted[n / 2 - 1].0 + sorted[n / 2].0) / 2.0)
            }
        }
        MedianMethod::Weighted => {
            let total: f64 = sorted.iter().map(|s| s.1).sum();
            if total <= 0.0 {
                return None;
            }
            let half = total / 2.0;
            let mut cum = 0.0;
            for (value, weight) in &sorted {
                cum += weight;
                if cum >= half {
                    return Some(*value);
                }
            }
            // Rounding left the cursor short of half; the largest value wins.
            sorted.last().map(|s| s.0)
        }
    }
}

#[derive(Default)]
struct DistrictAccumulator {
    total_households: f64,
    snap_population: f64,
    snap_under_18: f64,
    snap_over_65: f64,
    snap_employed: f64,
    total_snap: f64,
    recipient_incomes: Vec<(f64, f64)>,
}

/// Aggregate one state's tables into per-district weighted totals.
///
/// At-large geoid normalization happens here, on the raw household rows,
/// before anything is grouped. This is the only place it is applied.
pub fn aggregate_region(
    state: &str,
    mut households: Vec<HouseholdRecord>,
    persons: &[PersonRecord],
    method: MedianMethod,
) -> RegionTable {
    for hh in &mut households {
        hh.congressional_district_geoid = normalize_geoid(hh.congressional_district_geoid);
    }

    let benefit_by_household: HashMap<u64, f64> =
        households.iter().map(|hh| (hh.id, hh.snap)).collect();
    let (counts, orphan_persons) = household_counts(persons, &benefit_by_household);
    if orphan_persons > 0 {
        log::warn!("{state}: {orphan_persons} person rows reference unknown households");
    }

    let mut acc: HashMap<(u32, u32), DistrictAccumulator> = HashMap::new();
    for hh in &households {
        let entry = acc
            .entry((hh.congressional_district_geoid, hh.state_fips))
            .or_default();
        // Households with no person rows get zero counts, not an error.
        let c = counts.get(&hh.id).copied().unwrap_or_default();

        entry.total_households += hh.weight;
        entry.snap_population += f64::from(c.n_recipients) * hh.weight;
        entry.snap_under_18 += f64::from(c.n_under_18) * hh.weight;
        entry.snap_over_65 += f64::from(c.n_over_65) * hh.weight;
        entry.snap_employed += f64::from(c.n_employed) * hh.weight;
        entry.total_snap += hh.snap * hh.weight;
        if hh.snap > 0.0 {
            entry.recipient_incomes.push((hh.market_income, hh.weight));
        }
    }

    let rows = acc
        .into_iter()
        .map(|((geoid, fips), a)| DistrictAggregate {
            congressional_district_geoid: geoid,
            state_fips: fips,
            total_households: a.total_households,
            snap_population: a.snap_population,
            snap_under_18: a.snap_under_18,
            snap_over_65: a.snap_over_65,
            snap_employed: a.snap_employed,
            total_snap: a.total_snap,
            median_household_income: median(a.recipient_incomes, method),
        })
        .collect();

    RegionTable {
        state: state.to_owned(),
        rows,
        orphan_persons,
    }
}
