use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown state code '{0}'")]
    UnknownState(String),

    #[error("state {state}: {source}")]
    Region {
        state: String,
        #[source]
        source: Box<AggError>,
    },

    #[error("combined table has no benefit total to calibrate against")]
    EmptyEstimate,
}

impl AggError {
    /// Attach the state code to a per-region failure so a bad region is
    /// identifiable at the top of the pipeline, never silently skipped.
    pub fn in_state(self, state: &str) -> Self {
        Self::Region {
            state: state.to_owned(),
            source: Box::new(self),
        }
    }
}

pub type AggResult<T> = Result<T, AggError>;
