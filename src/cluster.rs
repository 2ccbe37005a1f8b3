/*!
 * Types and functions for grouping points into clusters.
 *
 * Clusters are found with DBSCAN: points with enough neighbors within a fixed great circle
 * distance are core points, core points within that distance of each other share a cluster, and
 * the remaining points either hang on to a nearby core point or are noise.
 */

pub use cluster_set::ClusterSet;
pub use dbscan::{dbscan, DbscanParams, HOTSPOT_EPSILON_KM, HOTSPOT_MIN_POINTS};

mod cluster_set;
mod dbscan;
