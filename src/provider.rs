//! Microsimulation data source: household and person tables per state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::AggResult;

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct HouseholdRecord {
    #[serde(rename = "household_id")]
    pub id: u64,
    #[serde(rename = "household_weight")]
    pub weight: f64,
    pub congressional_district_geoid: u32,
    pub state_fips: u32,
    #[serde(rename = "household_market_income")]
    pub market_income: f64,
    pub snap: f64,
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct PersonRecord {
    #[serde(rename = "person_id")]
    pub id: u64,
    #[serde(rename = "person_household_id")]
    pub household_id: u64,
    pub age: u32,
    pub employment_income: f64,
}

/// An opaque per-state provider of simulated microdata. Extraction failures
/// surface as errors; a region never yields partial tables.
pub trait SimulationSource: Sync {
    fn households(&self, state: &str) -> AggResult<Vec<HouseholdRecord>>;

    fn persons(&self, state: &str) -> AggResult<Vec<PersonRecord>>;
}

/// Reads `<data_dir>/<STATE>/households.csv` and `<data_dir>/<STATE>/persons.csv`.
pub struct CsvSource {
    data_dir: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_owned(),
        }
    }

    fn read_table<T: serde::de::DeserializeOwned>(
        &self,
        state: &str,
        file: &str,
    ) -> AggResult<Vec<T>> {
        let path = self.data_dir.join(state).join(file);
        let mut rdr = csv::Reader::from_path(&path)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize::<T>() {
            rows.push(result?);
        }
        Ok(rows)
    }
}

impl SimulationSource for CsvSource {
    fn households(&self, state: &str) -> AggResult<Vec<HouseholdRecord>> {
        self.read_table(state, "households.csv")
    }

    fn persons(&self, state: &str) -> AggResult<Vec<PersonRecord>> {
        self.read_table(state, "persons.csv")
    }
}

/// In-memory source for fixtures. States not inserted behave like a
/// provider outage for that region.
#[derive(Default)]
pub struct MemorySource {
    households: HashMap<String, Vec<HouseholdRecord>>,
    persons: HashMap<String, Vec<PersonRecord>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        state: &str,
        households: Vec<HouseholdRecord>,
        persons: Vec<PersonRecord>,
    ) {
        self.households.insert(state.to_owned(), households);
        self.persons.insert(state.to_owned(), persons);
    }

    fn missing(state: &str) -> crate::error::AggError {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no dataset for {state}"),
        )
        .into()
    }
}

impl SimulationSource for MemorySource {
    fn households(&self, state: &str) -> AggResult<Vec<HouseholdRecord>> {
        self.households
            .get(state)
            .cloned()
            .ok_or_else(|| Self::missing(state))
    }

    fn persons(&self, state: &str) -> AggResult<Vec<PersonRecord>> {
        self.persons
            .get(state)
            .cloned()
            .ok_or_else(|| Self::missing(state))
    }
}
