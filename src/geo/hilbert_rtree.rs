use super::*;
use std::ops::ControlFlow;

const RTREE_CHILDREN_PER_NODE: usize = 8;
const OVERLAP_FUDGE_FACTOR: f64 = 1.0e-9;
const HILBERT_ITERATIONS: u32 = 16;

#[derive(Debug)]
enum RTreeNode {
    Node {
        bbox: BoundingBox,
        children: Vec<RTreeNode>,
    },
    Leaf {
        bbox: BoundingBox,
        hilbert_num: u64,
        index: usize,
    },
}

impl RTreeNode {
    fn bounding_box(&self) -> BoundingBox {
        match self {
            Self::Node { bbox, .. } => *bbox,
            Self::Leaf { bbox, .. } => *bbox,
        }
    }

    fn max_hilbert_num(&self) -> u64 {
        match self {
            Self::Leaf { hilbert_num, .. } => *hilbert_num,
            Self::Node { children, .. } => children
                .iter()
                .map(|node| node.max_hilbert_num())
                .max()
                .unwrap_or(0),
        }
    }

    fn new_nodes(children: Vec<Self>) -> Self {
        let mut bbox = BoundingBox::empty();
        for child_box in children.iter().map(|c| c.bounding_box()) {
            bbox.expand_to(&child_box);
        }

        Self::Node { bbox, children }
    }

    /// Recursively apply `visit` to objects in `data` that have bounding boxes that overlap
    /// `region`.
    ///
    /// ## Parameters
    ///
    /// data - is owned by the parent Hilbert2DRTreeView object. Indexes of `Self::Leaf{..}`
    /// nodes index into this slice.
    ///
    /// region - is the region of interest.
    ///
    /// visit - is applied to any items that overlap `region`. If it returns `Break(..)`, then
    /// further iteration stops. If it returns `Continue(..)`, then iteration carries on. The
    /// arguments are a reference to an item whose bounding box overlaps `region`, the index of
    /// that item in the underlying slice, and the `user_data` passed in below.
    ///
    /// user_data - will be passed from call to call of `visit` so you can accumulate results
    /// while iterating. This behaves similar to the accumulator on the fold method of iterators.
    fn foreach<T, V, F>(
        &self,
        data: &[T],
        region: &BoundingBox,
        visit: F,
        user_data: V,
    ) -> ControlFlow<V, V>
    where
        T: Geo,
        F: FnMut(&T, usize, V) -> ControlFlow<V, V> + Copy,
    {
        if !self.bounding_box().overlap(region, OVERLAP_FUDGE_FACTOR) {
            return ControlFlow::Continue(user_data);
        }

        match self {
            Self::Leaf { index, .. } => {
                let mut visit = visit;
                visit(&data[*index], *index, user_data)
            }
            Self::Node { children, .. } => {
                let mut user_data = user_data;
                for child in children.iter() {
                    match child.foreach(data, region, visit, user_data) {
                        ControlFlow::Continue(value) => user_data = value,
                        ControlFlow::Break(value) => return ControlFlow::Break(value),
                    }
                }

                ControlFlow::Continue(user_data)
            }
        }
    }
}

/// A static, Hilbert curve packed R-tree built over a borrowed slice.
///
/// The tree is built once and never modified. Items are sorted along a Hilbert curve through the
/// domain and packed into nodes of `RTREE_CHILDREN_PER_NODE`, which keeps nearby items in the
/// same branches.
#[derive(Debug)]
pub struct Hilbert2DRTreeView<'a, T> {
    root: RTreeNode,
    data: &'a [T],
}

impl<'a, T: Geo> Hilbert2DRTreeView<'a, T> {
    /// Build a view into the provided list.
    ///
    /// Returns `None` if the list is empty.
    pub fn build_for(data: &'a [T], precomputed_domain: Option<BoundingBox>) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let data_domain = precomputed_domain.unwrap_or_else(|| Self::build_domain(data));

        let hc = HilbertCurve::new(HILBERT_ITERATIONS, data_domain);

        // Build the leaf nodes - level 0
        let mut leaves: Vec<RTreeNode> = data
            .iter()
            .enumerate()
            .map(|(index, item)| RTreeNode::Leaf {
                bbox: item.bounding_box(),
                hilbert_num: hc.translate_to_curve_distance(item.centroid()),
                index,
            })
            .collect();

        // Sort the leaf nodes by Hilbert number. This is how we get locality for the parent nodes.
        leaves.sort_unstable_by_key(RTreeNode::max_hilbert_num);

        let mut level_nodes = leaves;
        while level_nodes.len() > 1 {
            let child_nodes = level_nodes;
            level_nodes = Vec::with_capacity(child_nodes.len() / RTREE_CHILDREN_PER_NODE + 1);

            let mut children = Vec::with_capacity(RTREE_CHILDREN_PER_NODE);
            for child_node in child_nodes.into_iter() {
                children.push(child_node);

                if children.len() == RTREE_CHILDREN_PER_NODE {
                    level_nodes.push(RTreeNode::new_nodes(children));
                    children = Vec::with_capacity(RTREE_CHILDREN_PER_NODE);
                }
            }

            if !children.is_empty() {
                level_nodes.push(RTreeNode::new_nodes(children));
            }
        }

        debug_assert_eq!(level_nodes.len(), 1);
        let root = level_nodes.into_iter().next()?;

        Some(Hilbert2DRTreeView { root, data })
    }

    /// Apply a function to all elements with bounding boxes that overlap `region`.
    pub fn foreach<V, F>(&self, region: BoundingBox, user_data: V, visit: F) -> V
    where
        F: FnMut(&T, usize, V) -> ControlFlow<V, V> + Copy,
    {
        match self.root.foreach(self.data, &region, visit, user_data) {
            ControlFlow::Break(value) => value,
            ControlFlow::Continue(value) => value,
        }
    }

    fn build_domain(data: &[T]) -> BoundingBox {
        let mut mbr = BoundingBox::empty();

        for item in data {
            mbr.expand_to(&item.bounding_box());
        }

        mbr
    }
}

#[derive(Debug)]
struct HilbertCurve {
    // The number of iterations to use for this curve.
    //
    // This number can be a maximum of 31. If it is larger than 31, we won't have enough bits to do
    // the binary transformation correctly.
    iterations: u32,

    // This is the domain that the curve will cover.
    domain: BoundingBox,

    // These are needed for fast transformations from the "domain" space into the "Hilbert" space.
    max_dim: u32,
    width: f64,
    height: f64,
}

impl HilbertCurve {
    fn calc_max_dim_for_iterations(iterations: u32) -> u32 {
        (1u32 << iterations) - 1u32
    }

    fn calc_max_num(&self) -> u64 {
        let iterations = u64::from(self.iterations);

        (1u64 << (2 * iterations)) - 1u64
    }

    fn new(iterations: u32, domain: BoundingBox) -> Self {
        // iterations must be in the range 1 to 31 inclusive
        debug_assert!((1..=31).contains(&iterations));

        let max_dim = Self::calc_max_dim_for_iterations(iterations);

        // A domain collapsed to a line or a single point (e.g. all reports at the same place)
        // still needs a non-zero extent to map onto the curve.
        let width = (domain.ur.lon - domain.ll.lon).max(f64::EPSILON);
        let height = (domain.ur.lat - domain.ll.lat).max(f64::EPSILON);

        Self {
            iterations,
            domain,
            max_dim,
            width,
            height,
        }
    }

    fn coords_to_integer(&self, HilbertCoord { x, y }: HilbertCoord) -> u64 {
        debug_assert!(x <= Self::calc_max_dim_for_iterations(self.iterations));
        debug_assert!(y <= Self::calc_max_dim_for_iterations(self.iterations));

        let mut x = x;
        let mut y = y;

        let m = 1u32 << (self.iterations - 1);

        // Inverse undo excess work
        let mut q = m;
        while q > 1 {
            let p = q - 1;
            if (x & q) != 0 {
                x ^= p;
            }

            if (y & q) != 0 {
                x ^= p;
            } else {
                let t = (x ^ y) & p;
                x ^= t;
                y ^= t;
            }
            q >>= 1;
        }

        // Gray encode
        y ^= x;
        let mut t = 0u32;
        q = m;
        while q > 1 {
            if (y & q) != 0 {
                t ^= q - 1;
            }
            q >>= 1;
        }

        x ^= t;
        y ^= t;

        // This is the transpose operation
        let mut hilbert_int = 0;
        for b in 0..self.iterations {
            let bb = u64::from(b);
            let xx = u64::from(x);
            let yy = u64::from(y);
            let x_val: u64 = (((1u64 << bb) & xx) >> bb) << (2 * bb + 1);
            let y_val: u64 = (((1u64 << bb) & yy) >> bb) << (2 * bb);

            hilbert_int |= x_val;
            hilbert_int |= y_val;
        }

        debug_assert!(hilbert_int <= self.calc_max_num());

        hilbert_int
    }

    fn translate_to_hilbert_coords(&self, coord: Coord) -> HilbertCoord {
        let hilbert_edge_len = (self.max_dim + 1) as f64;

        // Float to int casts saturate, so anything west or south of the domain lands on 0.
        let mut x = ((coord.lon - self.domain.ll.lon) / self.width * hilbert_edge_len) as u32;
        let mut y = ((coord.lat - self.domain.ll.lat) / self.height * hilbert_edge_len) as u32;

        x = x.min(self.max_dim);
        y = y.min(self.max_dim);

        HilbertCoord { x, y }
    }

    fn translate_to_curve_distance(&self, coord: Coord) -> u64 {
        let hilbert_coords = self.translate_to_hilbert_coords(coord);
        self.coords_to_integer(hilbert_coords)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HilbertCoord {
    x: u32,
    y: u32,
}
