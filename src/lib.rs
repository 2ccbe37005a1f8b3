//! Hotspot detection for crowdsourced maritime hazard reports.
//!
//! Reports come in from the public with an optional location. Wherever enough of them pile up
//! close together, that's a hotspot officials should look at first.

pub use cluster::{dbscan, ClusterSet, DbscanParams, HOTSPOT_EPSILON_KM, HOTSPOT_MIN_POINTS};
pub use database::{
    ReportDatabase, ReportDatabaseAddReport, ReportDatabaseQueryReports, ReportFilter,
};
pub use error::{ComputationError, HazardResult, ReportStoreError};
pub use geo::{great_circle_distance, BoundingBox, Coord, Geo};
pub use hotspot::{find_hotspots, find_hotspots_in_points, summarize, Hotspot};
pub use kml::{KmlFile, KmlWriter};
pub use point::{extract_points, GeoPoint};
pub use report::{
    Coordinates, HazardReport, NewReport, ReportStatus, Urgency, MAX_IMAGES_PER_REPORT,
};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod cluster;
mod database;
mod error;
mod geo;
mod hotspot;
mod kml;
mod point;
mod report;
