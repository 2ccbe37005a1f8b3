use crate::report::ReportStatus;
use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Catch-all result type for the store, the KML output, and the programs.
pub type HazardResult<T> = Result<T, Box<dyn Error>>;

/// Hotspot detection could not produce a trustworthy answer.
///
/// This is different from finding no hotspots, which is an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputationError {
    pub msg: &'static str,
}

impl Display for ComputationError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "hotspot computation failed: {}", self.msg)
    }
}

impl Error for ComputationError {}

/// A request to the report store that can't be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStoreError {
    /// No report with this id.
    NotFound(u64),
    /// Officials can't move a report into this status.
    InvalidStatus(ReportStatus),
    /// A new report is missing something or has too much of something.
    Invalid(&'static str),
}

impl Display for ReportStoreError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Self::NotFound(id) => write!(f, "report not found: {}", id),
            Self::InvalidStatus(status) => write!(f, "invalid status value: {}", status),
            Self::Invalid(msg) => write!(f, "invalid report: {}", msg),
        }
    }
}

impl Error for ReportStoreError {}
