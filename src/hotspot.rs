/*!
 * Hotspots are the summary of a cluster of hazard reports shown to officials on the map.
 *
 * This is also where the whole detection pipeline lives: pull the points out of the reports,
 * cluster them, and summarize each cluster.
 */

use crate::{
    cluster::{dbscan, ClusterSet, DbscanParams},
    error::{ComputationError, HazardResult},
    geo::{great_circle_distance, Coord},
    kml::KmlWriter,
    point::{extract_points, GeoPoint},
    report::HazardReport,
};
use serde::Serialize;
use std::fmt::{self, Display, Write};

/// Number of vertices used to draw the outline of a hotspot in KML.
const KML_CIRCLE_VERTICES: usize = 36;

/**
 * The aggregate properties of a cluster of hazard reports.
 */
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hotspot {
    /// Average latitude of the reports in the cluster.
    pub lat: f64,
    /// Average longitude of the reports in the cluster.
    pub lon: f64,
    /// The number of reports in this cluster.
    pub count: usize,
    /// The distance from the cluster center to the farthest report in the cluster, kilometers.
    pub radius_km: f64,
}

impl Hotspot {
    /**
     * Summarize a single cluster.
     *
     * The center is the plain average of the latitudes and longitudes, not a spherical mean.
     *
     * #Arguments
     * points - the slice that was clustered.
     * members - indexes into `points` of the members of the cluster.
     */
    fn from_members(points: &[GeoPoint], members: &[usize]) -> Result<Self, ComputationError> {
        if members.is_empty() {
            return Err(ComputationError {
                msg: "cannot summarize an empty cluster",
            });
        }

        let members = members
            .iter()
            .map(|&i| {
                points.get(i).ok_or(ComputationError {
                    msg: "cluster member out of range",
                })
            })
            .collect::<Result<Vec<&GeoPoint>, _>>()?;

        let count = members.len();
        let (lat_sum, lon_sum) = members
            .iter()
            .fold((0.0, 0.0), |(lat_sum, lon_sum), pnt| {
                (lat_sum + pnt.lat, lon_sum + pnt.lon)
            });

        let lat = lat_sum / count as f64;
        let lon = lon_sum / count as f64;

        if !lat.is_finite() || !lon.is_finite() {
            return Err(ComputationError {
                msg: "non-finite cluster centroid",
            });
        }

        let radius_km = members
            .iter()
            .map(|pnt| great_circle_distance(lat, lon, pnt.lat, pnt.lon))
            .fold(0.0, f64::max);

        Ok(Hotspot {
            lat,
            lon,
            count,
            radius_km,
        })
    }

    /// Write this hotspot as a KML placemark, with its outline if it has any size.
    pub fn kml_write<K: KmlWriter>(&self, kml: &mut K, name: &str) -> HazardResult<()> {
        let mut description = String::new();
        write!(
            &mut description,
            concat!(
                "Reports: {}<br/>",
                "Center: {:.6}, {:.6}<br/>",
                "Radius: {:.1} km<br/>"
            ),
            self.count, self.lat, self.lon, self.radius_km
        )?;

        kml.start_placemark(Some(name), Some(&description), Some("#hotspot"))?;

        if self.radius_km > 0.0 {
            kml.start_multi_geometry()?;
            kml.create_point(self.lat, self.lon, 0.0)?;

            kml.start_polygon(false, true, Some("clampToGround"))?;
            kml.polygon_start_outer_ring()?;
            kml.start_linear_ring()?;
            for Coord { lat, lon } in self.outline(KML_CIRCLE_VERTICES) {
                kml.linear_ring_add_vertex(lat, lon, 0.0)?;
            }
            kml.finish_linear_ring()?;
            kml.polygon_finish_outer_ring()?;
            kml.finish_polygon()?;

            kml.finish_multi_geometry()?;
        } else {
            kml.create_point(self.lat, self.lon, 0.0)?;
        }

        kml.finish_placemark()?;

        Ok(())
    }

    /// Points on the circle of `radius_km` around the center, closed so the last point repeats
    /// the first.
    fn outline(&self, num_vertices: usize) -> Vec<Coord> {
        let angular = self.radius_km / crate::geo::EARTH_RADIUS_KM;
        let lat1 = self.lat.to_radians();
        let lon1 = self.lon.to_radians();

        let mut vertices: Vec<Coord> = (0..num_vertices)
            .map(|i| {
                let bearing = 2.0 * std::f64::consts::PI * (i as f64) / (num_vertices as f64);
                let lat2 = f64::asin(
                    lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos(),
                );
                let lon2 = lon1
                    + f64::atan2(
                        bearing.sin() * angular.sin() * lat1.cos(),
                        angular.cos() - lat1.sin() * lat2.sin(),
                    );

                let mut lon = lon2.to_degrees();
                if lon > 180.0 {
                    lon -= 360.0;
                } else if lon < -180.0 {
                    lon += 360.0;
                }

                Coord {
                    lat: lat2.to_degrees(),
                    lon,
                }
            })
            .collect();

        if let Some(&first) = vertices.first() {
            vertices.push(first);
        }

        vertices
    }
}

impl Display for Hotspot {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{:>10.6} {:>11.6} {:>6} {:>8.1} km",
            self.lat, self.lon, self.count, self.radius_km
        )
    }
}

/**
 * Summarize every cluster in a ClusterSet.
 *
 * Hotspots come back with the most reports first, ties broken by latitude and then longitude.
 *
 * #Arguments
 * points - the slice that was clustered.
 * clusters - the result of clustering `points`.
 */
pub fn summarize(
    points: &[GeoPoint],
    clusters: &ClusterSet,
) -> Result<Vec<Hotspot>, ComputationError> {
    let mut hotspots = clusters
        .clusters()
        .iter()
        .map(|members| Hotspot::from_members(points, members))
        .collect::<Result<Vec<_>, _>>()?;

    hotspots.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.lat.total_cmp(&b.lat))
            .then_with(|| a.lon.total_cmp(&b.lon))
    });

    Ok(hotspots)
}

/**
 * Find the hotspots in a collection of hazard reports.
 *
 * Reports without usable coordinates are ignored. Clustering always uses
 * [DbscanParams::HOTSPOTS]. An empty list means there were no hotspots, which is a normal
 * outcome when there are only a few geotagged reports.
 */
pub fn find_hotspots<'a, I>(reports: I) -> Result<Vec<Hotspot>, ComputationError>
where
    I: IntoIterator<Item = &'a HazardReport>,
{
    let points = extract_points(reports);
    find_hotspots_in_points(&points, DbscanParams::HOTSPOTS)
}

/// Cluster points that have already been extracted and summarize the clusters.
pub fn find_hotspots_in_points(
    points: &[GeoPoint],
    params: DbscanParams,
) -> Result<Vec<Hotspot>, ComputationError> {
    log::debug!(
        "Running DBSCAN on {} points with distance={}km and minPoints={}.",
        points.len(),
        params.epsilon_km,
        params.min_points
    );

    let clusters = dbscan(points, params)?;
    let hotspots = summarize(points, &clusters)?;

    log::debug!("Found {} hotspots.", hotspots.len());

    Ok(hotspots)
}
