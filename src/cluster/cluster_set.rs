use crate::point::GeoPoint;

/**
 * The outcome of clustering a list of points.
 *
 * Clusters and noise are stored as indexes into the slice of points that was clustered, so a
 * ClusterSet is only meaningful next to that slice. Cluster order carries no meaning and is not
 * stable between runs over the same points in a different order.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSet {
    /// Indexes of the members of each cluster, in ascending order.
    clusters: Vec<Vec<usize>>,
    /// Indexes of the points that didn't end up in any cluster, in ascending order.
    noise: Vec<usize>,
}

impl ClusterSet {
    pub(crate) fn new(clusters: Vec<Vec<usize>>, noise: Vec<usize>) -> Self {
        ClusterSet { clusters, noise }
    }

    /// Every point is noise.
    pub(crate) fn all_noise(num_points: usize) -> Self {
        ClusterSet {
            clusters: vec![],
            noise: (0..num_points).collect(),
        }
    }

    /// The members of each cluster.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    /// The points that are not in any cluster.
    pub fn noise(&self) -> &[usize] {
        &self.noise
    }

    /// The number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Were there no clusters at all?
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /**
     * Translate the clusters into sets of report ids.
     *
     * Each cluster's ids are sorted and then the clusters themselves are sorted, so two runs that
     * grouped the same reports together compare equal no matter how the clusters were labeled.
     *
     * #Arguments
     * points - the same slice that was clustered to produce this set.
     *
     * #Panics
     * If `points` is not the slice that was clustered and is too short.
     */
    pub fn id_partition(&self, points: &[GeoPoint]) -> Vec<Vec<u64>> {
        let mut partition: Vec<Vec<u64>> = self
            .clusters
            .iter()
            .map(|members| {
                let mut ids: Vec<u64> = members.iter().map(|&i| points[i].id).collect();
                ids.sort_unstable();
                ids
            })
            .collect();

        partition.sort_unstable();
        partition
    }
}
