use super::ClusterSet;
use crate::{
    error::ComputationError,
    geo::{self, great_circle_distance, Hilbert2DRTreeView},
    point::GeoPoint,
};
use static_assertions::const_assert;
use std::{cmp::Ordering, ops::ControlFlow};

/// Reports within this many kilometers of each other are neighbors when looking for hotspots.
pub const HOTSPOT_EPSILON_KM: f64 = 20.0;

/// A report needs this many neighbors, counting itself, to anchor a hotspot.
pub const HOTSPOT_MIN_POINTS: usize = 3;

const_assert!(HOTSPOT_MIN_POINTS >= 1);

/// The knobs for DBSCAN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    /// Largest great circle distance, in kilometers, between two points that are neighbors. The
    /// boundary is inclusive.
    pub epsilon_km: f64,
    /// The number of points, including itself, that must be within `epsilon_km` of a point for
    /// it to be a core point.
    pub min_points: usize,
}

impl DbscanParams {
    /// The fixed parameters used for hotspot detection.
    pub const HOTSPOTS: DbscanParams = DbscanParams {
        epsilon_km: HOTSPOT_EPSILON_KM,
        min_points: HOTSPOT_MIN_POINTS,
    };

    fn validate(&self) -> Result<(), ComputationError> {
        if !self.epsilon_km.is_finite() || self.epsilon_km < 0.0 {
            return Err(ComputationError {
                msg: "epsilon must be a finite, non-negative distance",
            });
        }

        if self.min_points == 0 {
            return Err(ComputationError {
                msg: "minimum points must be at least 1",
            });
        }

        Ok(())
    }
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self::HOTSPOTS
    }
}

/**
 * Group points into density connected clusters.
 *
 * A point with at least `min_points` points (itself included) within `epsilon_km` is a core
 * point. Core points within `epsilon_km` of each other belong to the same cluster, transitively.
 * A point that isn't a core point joins the cluster of the nearest core point within
 * `epsilon_km` of it, or is noise if there is none. Ties between equally distant core points
 * go to the one with the smaller latitude, then longitude, then id, so the grouping never
 * depends on the order of `points`.
 *
 * Rarely, a cluster loses so many border points to nearer core points of other clusters that it
 * drops below `min_points` members. Such a cluster is merged with the clusters that took them.
 * The merged cluster can span two dense groups whose core points are not density connected, so
 * its centroid may fall between them rather than on either one.
 *
 * A point with a non-finite latitude or longitude is an error, not noise.
 *
 * If there are fewer than `min_points` points there can't be a cluster, and every point is
 * returned as noise without doing any work.
 *
 * #Arguments
 * points - the points to cluster. The returned ClusterSet indexes into this slice.
 * params - the neighbor distance and core point threshold.
 */
pub fn dbscan(points: &[GeoPoint], params: DbscanParams) -> Result<ClusterSet, ComputationError> {
    params.validate()?;

    if points
        .iter()
        .any(|pnt| !pnt.lat.is_finite() || !pnt.lon.is_finite())
    {
        return Err(ComputationError {
            msg: "non-finite point coordinates",
        });
    }

    if points.len() < params.min_points {
        log::debug!(
            "Not enough points to form a cluster. Needed {}, found {}.",
            params.min_points,
            points.len()
        );
        return Ok(ClusterSet::all_noise(points.len()));
    }

    let index = Hilbert2DRTreeView::build_for(points, None).ok_or(ComputationError {
        msg: "unable to build a spatial index over the points",
    })?;

    let neighborhoods = points
        .iter()
        .map(|center| neighborhood(&index, points, center, params.epsilon_km))
        .collect::<Result<Vec<_>, _>>()?;

    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|nbrs| nbrs.len() >= params.min_points)
        .collect();

    let (mut clusters, mut labels) = expand_core_clusters(&neighborhoods, &is_core);

    let mut noise = vec![];
    for (idx, nbrs) in neighborhoods.iter().enumerate() {
        if is_core[idx] {
            continue;
        }

        let nearest_core = nbrs
            .iter()
            .copied()
            .filter(|&nbr| is_core[nbr])
            .min_by(|&a, &b| compare_cores(&points[idx], &points[a], &points[b]));

        match nearest_core {
            Some(core) => {
                let label = labels[core].ok_or(ComputationError {
                    msg: "core point was never assigned to a cluster",
                })?;
                clusters[label].push(idx);
                labels[idx] = Some(label);
            }
            None => noise.push(idx),
        }
    }

    let mut clusters =
        merge_undersized_clusters(clusters, &labels, &neighborhoods, &is_core, params.min_points);

    for members in clusters.iter_mut() {
        members.sort_unstable();
    }

    log::debug!(
        "DBSCAN with epsilon={}km and min_points={} found {} core points, {} clusters, {} noise.",
        params.epsilon_km,
        params.min_points,
        is_core.iter().filter(|&&c| c).count(),
        clusters.len(),
        noise.len()
    );

    Ok(ClusterSet::new(clusters, noise))
}

/// Find the index of every point within `epsilon_km` of `center`, including `center` itself.
///
/// The spatial index narrows the search to a few boxes around `center`, then every candidate is
/// checked with the exact great circle distance.
pub(crate) fn neighborhood(
    index: &Hilbert2DRTreeView<GeoPoint>,
    points: &[GeoPoint],
    center: &GeoPoint,
    epsilon_km: f64,
) -> Result<Vec<usize>, ComputationError> {
    let mut candidates: Vec<usize> = vec![];
    for region in geo::search_regions(center.coord(), epsilon_km) {
        candidates = index.foreach(region, candidates, |_pt, idx, mut found| {
            found.push(idx);
            ControlFlow::Continue(found)
        });
    }

    // The regions on either side of the antimeridian can share an edge.
    candidates.sort_unstable();
    candidates.dedup();

    let mut neighbors = Vec::with_capacity(candidates.len());
    for idx in candidates {
        let other = &points[idx];
        let dist = great_circle_distance(center.lat, center.lon, other.lat, other.lon);

        if !dist.is_finite() {
            return Err(ComputationError {
                msg: "non-finite distance between points",
            });
        }

        if dist <= epsilon_km {
            neighbors.push(idx);
        }
    }

    Ok(neighbors)
}

/// Label the core points by growing a cluster from each unlabeled core point through the core
/// points in its neighborhood.
///
/// Returns the core members of each cluster and the cluster label of every point (`None` for
/// points that are not core points).
fn expand_core_clusters(
    neighborhoods: &[Vec<usize>],
    is_core: &[bool],
) -> (Vec<Vec<usize>>, Vec<Option<usize>>) {
    let mut clusters: Vec<Vec<usize>> = vec![];
    let mut labels: Vec<Option<usize>> = vec![None; neighborhoods.len()];
    let mut frontier: Vec<usize> = vec![];

    for seed in 0..neighborhoods.len() {
        if !is_core[seed] || labels[seed].is_some() {
            continue;
        }

        let label = clusters.len();
        labels[seed] = Some(label);
        let mut members = vec![seed];

        frontier.clear();
        frontier.push(seed);
        while let Some(current) = frontier.pop() {
            for &nbr in &neighborhoods[current] {
                if is_core[nbr] && labels[nbr].is_none() {
                    labels[nbr] = Some(label);
                    members.push(nbr);
                    frontier.push(nbr);
                }
            }
        }

        clusters.push(members);
    }

    (clusters, labels)
}

/// Merge every cluster left with fewer than `min_points` members, after its border points went
/// to nearer core points, with the clusters that took them.
///
/// A core point and its whole neighborhood end up together, so every resulting cluster has at
/// least `min_points` members.
fn merge_undersized_clusters(
    clusters: Vec<Vec<usize>>,
    labels: &[Option<usize>],
    neighborhoods: &[Vec<usize>],
    is_core: &[bool],
    min_points: usize,
) -> Vec<Vec<usize>> {
    fn find(parents: &mut [usize], mut label: usize) -> usize {
        while parents[label] != label {
            parents[label] = parents[parents[label]];
            label = parents[label];
        }
        label
    }

    let mut parents: Vec<usize> = (0..clusters.len()).collect();
    let mut num_merged = 0;

    for (label, members) in clusters.iter().enumerate() {
        if members.len() >= min_points {
            continue;
        }

        for &core in members.iter().filter(|&&m| is_core[m]) {
            for &nbr in &neighborhoods[core] {
                if let Some(other) = labels[nbr] {
                    let root_a = find(&mut parents, label);
                    let root_b = find(&mut parents, other);
                    if root_a != root_b {
                        parents[root_b.max(root_a)] = root_a.min(root_b);
                        num_merged += 1;
                    }
                }
            }
        }
    }

    if num_merged == 0 {
        return clusters;
    }

    log::debug!("Merged {} undersized clusters into neighbors.", num_merged);

    let mut merged: Vec<Vec<usize>> = vec![vec![]; clusters.len()];
    for (label, members) in clusters.into_iter().enumerate() {
        let root = find(&mut parents, label);
        merged[root].extend(members);
    }
    merged.retain(|members| !members.is_empty());

    merged
}

/// Order two core points by how well they claim `border`: nearer first, then by latitude,
/// longitude, and id.
fn compare_cores(border: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> Ordering {
    let dist_a = great_circle_distance(border.lat, border.lon, a.lat, a.lon);
    let dist_b = great_circle_distance(border.lat, border.lon, b.lat, b.lon);

    dist_a
        .total_cmp(&dist_b)
        .then_with(|| a.lat.total_cmp(&b.lat))
        .then_with(|| a.lon.total_cmp(&b.lon))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod test {
    use super::*;

    /// A small deterministic generator so the tests don't need a random number crate.
    struct XorShift(u64);

    impl XorShift {
        fn next_f64(&mut self) -> f64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn in_range(&mut self, min: f64, max: f64) -> f64 {
            min + (max - min) * self.next_f64()
        }
    }

    fn scattered_points(seed: u64, n: usize, center: (f64, f64), spread_deg: f64) -> Vec<GeoPoint> {
        let mut rng = XorShift(seed);
        (0..n)
            .map(|i| {
                let mut lon = center.0 + rng.in_range(-spread_deg, spread_deg);
                if lon > 180.0 {
                    lon -= 360.0;
                } else if lon < -180.0 {
                    lon += 360.0;
                }
                let lat = (center.1 + rng.in_range(-spread_deg, spread_deg)).clamp(-90.0, 90.0);
                GeoPoint::new(i as u64, lon, lat)
            })
            .collect()
    }

    fn brute_force_neighborhood(points: &[GeoPoint], center: &GeoPoint, eps: f64) -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| great_circle_distance(center.lat, center.lon, p.lat, p.lon) <= eps)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_neighborhood_matches_brute_force() {
        let cases = [
            scattered_points(0x1234_5678, 300, (-70.0, 42.0), 1.5),
            scattered_points(0x9e37_79b9, 200, (179.9, -15.0), 0.5),
            scattered_points(0xdead_beef, 200, (0.0, 89.8), 0.4),
            scattered_points(0x0bad_cafe, 150, (72.8, 19.0), 0.2),
        ];

        for points in &cases {
            let index = Hilbert2DRTreeView::build_for(points, None).unwrap();
            for center in points {
                let fast = neighborhood(&index, points, center, HOTSPOT_EPSILON_KM).unwrap();
                let slow = brute_force_neighborhood(points, center, HOTSPOT_EPSILON_KM);
                assert_eq!(fast, slow, "{:?}", center);
            }
        }
    }

    #[test]
    fn test_neighborhood_includes_self() {
        let points = [GeoPoint::new(1, 10.0, 10.0), GeoPoint::new(2, 11.0, 11.0)];
        let index = Hilbert2DRTreeView::build_for(&points, None).unwrap();

        let nbrs = neighborhood(&index, &points, &points[0], 0.0).unwrap();
        assert_eq!(nbrs, vec![0]);
    }

    #[test]
    fn test_invalid_params() {
        let points = [GeoPoint::new(1, 0.0, 0.0)];

        let bad_eps = DbscanParams {
            epsilon_km: f64::NAN,
            min_points: 1,
        };
        assert!(dbscan(&points, bad_eps).is_err());

        let negative_eps = DbscanParams {
            epsilon_km: -1.0,
            min_points: 1,
        };
        assert!(dbscan(&points, negative_eps).is_err());

        let bad_min = DbscanParams {
            epsilon_km: 1.0,
            min_points: 0,
        };
        assert!(dbscan(&points, bad_min).is_err());
    }

    #[test]
    fn test_non_finite_point_is_an_error() {
        let points = [
            GeoPoint::new(1, 0.0, 0.0),
            GeoPoint::new(2, 0.001, 0.0),
            GeoPoint::new(3, f64::NAN, 0.0),
        ];
        assert!(dbscan(&points, DbscanParams::HOTSPOTS).is_err());

        // Even when there are too few points to cluster.
        let points = [GeoPoint::new(1, 0.0, f64::INFINITY)];
        assert!(dbscan(&points, DbscanParams::HOTSPOTS).is_err());
    }

    #[test]
    fn test_short_circuit_below_min_points() {
        // Right on top of each other, but only two of them.
        let points = [GeoPoint::new(1, 0.0, 0.0), GeoPoint::new(2, 0.0, 0.0)];

        let set = dbscan(&points, DbscanParams::HOTSPOTS).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.noise(), &[0, 1]);
    }

    #[test]
    fn test_chain_is_one_cluster() {
        // Points every 0.1 degrees of longitude along the equator, about 11 km apart. Each
        // interior point has three neighbors counting itself, the two ends only two.
        let points: Vec<GeoPoint> = (0..10)
            .map(|i| GeoPoint::new(i, i as f64 * 0.1, 0.0))
            .collect();

        let set = dbscan(&points, DbscanParams::HOTSPOTS).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.clusters()[0], (0..10).collect::<Vec<usize>>());
        assert!(set.noise().is_empty());
    }

    #[test]
    fn test_border_point_does_not_seed() {
        let params = DbscanParams {
            epsilon_km: 20.0,
            min_points: 4,
        };

        // Four points close together, then a point 19.5 km from the last of them, then one more
        // 19 km beyond that. The middle one is a border point, so the last one is noise even
        // though it's in reach of the border point.
        let points = [
            GeoPoint::new(1, 0.0, 0.0),
            GeoPoint::new(2, 0.005, 0.0),
            GeoPoint::new(3, 0.01, 0.0),
            GeoPoint::new(4, 0.015, 0.0),
            GeoPoint::new(5, 0.19, 0.0),
            GeoPoint::new(6, 0.36, 0.0),
        ];

        let set = dbscan(&points, params).unwrap();
        assert_eq!(set.id_partition(&points), vec![vec![1, 2, 3, 4, 5]]);
        assert_eq!(set.noise(), &[5]);
    }

    #[test]
    fn test_contested_border_point_goes_to_nearest_core() {
        let params = DbscanParams {
            epsilon_km: 20.0,
            min_points: 4,
        };

        // Two rows of four points along the equator with a lone point between them. The lone
        // point is 19 km from the nearest point of the west row and 18 km from the nearest
        // point of the east row, so it's a border point of both clusters.
        let km_per_deg = great_circle_distance(0.0, 0.0, 0.0, 1.0);
        let at_km = |id: u64, km: f64| GeoPoint::new(id, km / km_per_deg, 0.0);

        let points = [
            at_km(1, -19.0),
            at_km(2, -22.0),
            at_km(3, -25.0),
            at_km(4, -28.0),
            at_km(5, 18.0),
            at_km(6, 21.0),
            at_km(7, 24.0),
            at_km(8, 27.0),
            at_km(9, 0.0),
        ];

        let expected = vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8, 9]];

        let set = dbscan(&points, params).unwrap();
        assert_eq!(set.id_partition(&points), expected);
        assert!(set.noise().is_empty());

        let mut reversed = points;
        reversed.reverse();
        let set = dbscan(&reversed, params).unwrap();
        assert_eq!(set.id_partition(&reversed), expected);
    }

    #[test]
    fn test_undersized_cluster_is_merged() {
        let params = DbscanParams {
            epsilon_km: 20.0,
            min_points: 4,
        };

        // A core point with three border points 15 km north, south, and east of it. A second
        // group sits 28 to 38 km east, and its nearest point is 13 km from the east border point,
        // so it takes that border point and leaves the first cluster with only three members.
        let km_per_deg = great_circle_distance(0.0, 0.0, 0.0, 1.0);
        let at_km =
            |id: u64, east: f64, north: f64| GeoPoint::new(id, east / km_per_deg, north / km_per_deg);

        let points = [
            at_km(1, 0.0, 0.0),
            at_km(2, 0.0, 15.0),
            at_km(3, 0.0, -15.0),
            at_km(4, 15.0, 0.0),
            at_km(5, 28.0, 0.0),
            at_km(6, 36.0, 0.0),
            at_km(7, 37.0, 0.0),
            at_km(8, 38.0, 0.0),
        ];

        let set = dbscan(&points, params).unwrap();
        assert_eq!(set.id_partition(&points), vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]);
        assert!(set.noise().is_empty());

        let mut reversed = points;
        reversed.reverse();
        let set = dbscan(&reversed, params).unwrap();
        assert_eq!(set.id_partition(&reversed), vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]);
    }

    #[test]
    fn test_duplicate_locations() {
        let points: Vec<GeoPoint> = (0..5).map(|i| GeoPoint::new(i, -70.0, 42.0)).collect();

        let set = dbscan(&points, DbscanParams::HOTSPOTS).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.clusters()[0].len(), 5);
    }
}
