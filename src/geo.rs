/*!
 * Geographic calculations.
 *
 * Simple spherical-Earth geometry: great circle distances, bounding boxes, and the search regions
 * used to ask a spatial index for everything within some distance of a point.
 */

pub(crate) use hilbert_rtree::Hilbert2DRTreeView;

mod hilbert_rtree;

/// Mean radius of the Earth in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0090;

const DEG2RAD: f64 = 2.0 * std::f64::consts::PI / 360.0;

// Relative and absolute padding applied to search regions so rounding never excludes a point
// that the exact distance test would accept.
const SEARCH_PAD_REL: f64 = 1.0e-6;
const SEARCH_PAD_ABS: f64 = 1.0e-9;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    /// Is this a coordinate that could actually exist on the Earth?
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// An area described by a lower left and upper right corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// The lower left (southwest) corner.
    pub ll: Coord,
    /// The upper right (northeast) corner.
    pub ur: Coord,
}

impl BoundingBox {
    /// A box covering the entire globe.
    pub const GLOBE: BoundingBox = BoundingBox {
        ll: Coord {
            lat: -90.0,
            lon: -180.0,
        },
        ur: Coord {
            lat: 90.0,
            lon: 180.0,
        },
    };

    /// Check whether two boxes overlap, treating edges within `eps` of each other as touching.
    pub fn overlap(&self, other: &BoundingBox, eps: f64) -> bool {
        let disjoint = self.ur.lat + eps < other.ll.lat
            || other.ur.lat + eps < self.ll.lat
            || self.ur.lon + eps < other.ll.lon
            || other.ur.lon + eps < self.ll.lon;

        !disjoint
    }

    /// Check whether a coordinate is inside (or on the edge of) the box.
    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat <= self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon <= self.ur.lon
    }

    /// Grow this box so that it also covers `other`.
    pub fn expand_to(&mut self, other: &BoundingBox) {
        self.ll.lat = self.ll.lat.min(other.ll.lat);
        self.ll.lon = self.ll.lon.min(other.ll.lon);
        self.ur.lat = self.ur.lat.max(other.ur.lat);
        self.ur.lon = self.ur.lon.max(other.ur.lon);
    }

    /// An inverted box that any call to `expand_to` will replace.
    pub(crate) fn empty() -> Self {
        BoundingBox {
            ll: Coord {
                lat: f64::INFINITY,
                lon: f64::INFINITY,
            },
            ur: Coord {
                lat: -f64::INFINITY,
                lon: -f64::INFINITY,
            },
        }
    }
}

/// Anything with a location and an extent on the globe.
pub trait Geo {
    /// The center point.
    fn centroid(&self) -> Coord;

    /// The smallest box containing the whole object.
    fn bounding_box(&self) -> BoundingBox;
}

/**
 * The simple great circle (haversine) distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1 * DEG2RAD;
    let lon1_r = lon1 * DEG2RAD;
    let lat2_r = lat2 * DEG2RAD;
    let lon2_r = lon2 * DEG2RAD;

    let dlat2 = (lat2_r - lat1_r) / 2.0;
    let dlon2 = (lon2_r - lon1_r) / 2.0;

    let sin2_dlat = f64::powf(f64::sin(dlat2), 2.0);
    let sin2_dlon = f64::powf(f64::sin(dlon2), 2.0);

    // Multiply the cosines first so swapping the points gives bit-identical results. Clamp so
    // rounding near antipodal points can't push asin out of its domain, but let NaN through.
    let h = sin2_dlat + sin2_dlon * (f64::cos(lat1_r) * f64::cos(lat2_r));
    let h = if h > 1.0 { 1.0 } else { h };

    let arc = 2.0 * f64::asin(f64::sqrt(h));

    arc * EARTH_RADIUS_KM
}

/**
 * Get the regions to search for everything within `radius_km` of `center`.
 *
 * The returned boxes are a conservative cover of the circle: every point on the globe within the
 * radius lies inside at least one of them, but they will also contain points that are farther
 * away, so results still need to be checked with [great_circle_distance].
 *
 * Near the poles the cover widens to all longitudes. A circle that crosses the antimeridian is
 * covered with two boxes, one on each side.
 */
pub fn search_regions(center: Coord, radius_km: f64) -> Vec<BoundingBox> {
    let angular = radius_km / EARTH_RADIUS_KM;
    if !(angular < std::f64::consts::PI) {
        return vec![BoundingBox::GLOBE];
    }

    let dlat = angular / DEG2RAD * (1.0 + SEARCH_PAD_REL) + SEARCH_PAD_ABS;
    let min_lat = center.lat - dlat;
    let max_lat = center.lat + dlat;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return vec![BoundingBox {
            ll: Coord {
                lat: min_lat.max(-90.0),
                lon: -180.0,
            },
            ur: Coord {
                lat: max_lat.min(90.0),
                lon: 180.0,
            },
        }];
    }

    // Widest longitude spread of a small circle that stays clear of the poles.
    let ratio = (f64::sin(angular) / f64::cos(center.lat * DEG2RAD)).min(1.0);
    let dlon = f64::asin(ratio) / DEG2RAD * (1.0 + SEARCH_PAD_REL) + SEARCH_PAD_ABS;

    if dlon >= 180.0 {
        return vec![BoundingBox {
            ll: Coord {
                lat: min_lat,
                lon: -180.0,
            },
            ur: Coord {
                lat: max_lat,
                lon: 180.0,
            },
        }];
    }

    let min_lon = center.lon - dlon;
    let max_lon = center.lon + dlon;

    let band = |west: f64, east: f64| BoundingBox {
        ll: Coord {
            lat: min_lat,
            lon: west,
        },
        ur: Coord {
            lat: max_lat,
            lon: east,
        },
    };

    if min_lon < -180.0 {
        vec![band(-180.0, max_lon), band(min_lon + 360.0, 180.0)]
    } else if max_lon > 180.0 {
        vec![band(min_lon, 180.0), band(-180.0, max_lon - 360.0)]
    } else {
        vec![band(min_lon, max_lon)]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_great_circle_distance() {
        // One degree of latitude along a meridian.
        let one_deg = great_circle_distance(0.0, 0.0, 1.0, 0.0);
        assert!((one_deg - EARTH_RADIUS_KM * DEG2RAD).abs() < 1.0e-9);

        // Symmetric
        let d1 = great_circle_distance(45.5, -120.0, 46.0, -119.0);
        let d2 = great_circle_distance(46.0, -119.0, 45.5, -120.0);
        assert!((d1 - d2).abs() < 1.0e-12);

        // Zero distance
        assert_eq!(great_circle_distance(12.0, 34.0, 12.0, 34.0), 0.0);

        // Across the antimeridian is short, not half way around the world.
        let d = great_circle_distance(0.0, 179.95, 0.0, -179.95);
        assert!(d < 12.0, "{}", d);

        // Antipodal points are half the circumference apart.
        let d = great_circle_distance(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1.0e-6);

        // Garbage in, garbage out.
        assert!(great_circle_distance(f64::NAN, 0.0, 0.0, 0.0).is_nan());
        assert!(great_circle_distance(0.0, 0.0, 0.0, f64::NAN).is_nan());
    }

    #[test]
    fn test_coord_validity() {
        assert!(Coord { lat: 0.0, lon: 0.0 }.is_valid());
        assert!(Coord { lat: 90.0, lon: -180.0 }.is_valid());
        assert!(!Coord { lat: 90.5, lon: 0.0 }.is_valid());
        assert!(!Coord { lat: 0.0, lon: 180.5 }.is_valid());
        assert!(!Coord { lat: f64::NAN, lon: 0.0 }.is_valid());
        assert!(!Coord { lat: 0.0, lon: f64::INFINITY }.is_valid());
    }

    #[test]
    fn test_bounding_box_overlap() {
        let a = BoundingBox {
            ll: Coord { lat: 0.0, lon: 0.0 },
            ur: Coord { lat: 1.0, lon: 1.0 },
        };
        let b = BoundingBox {
            ll: Coord { lat: 1.0, lon: 1.0 },
            ur: Coord { lat: 2.0, lon: 2.0 },
        };
        let c = BoundingBox {
            ll: Coord { lat: 1.5, lon: 1.5 },
            ur: Coord { lat: 2.0, lon: 2.0 },
        };

        assert!(a.overlap(&b, 0.0));
        assert!(b.overlap(&a, 0.0));
        assert!(!a.overlap(&c, 0.0));
        assert!(a.overlap(&c, 0.6));
    }

    /// Every point at exactly the radius must land in one of the regions.
    fn check_circle_covered(center: Coord, radius_km: f64) {
        let regions = search_regions(center, radius_km);
        let angular = radius_km / EARTH_RADIUS_KM;
        let (lat1, lon1) = (center.lat * DEG2RAD, center.lon * DEG2RAD);

        for step in 0..360 {
            let bearing = (step as f64) * DEG2RAD;
            let lat2 = f64::asin(
                f64::sin(lat1) * f64::cos(angular)
                    + f64::cos(lat1) * f64::sin(angular) * f64::cos(bearing),
            );
            let mut lon2 = lon1
                + f64::atan2(
                    f64::sin(bearing) * f64::sin(angular) * f64::cos(lat1),
                    f64::cos(angular) - f64::sin(lat1) * f64::sin(lat2),
                );
            lon2 /= DEG2RAD;
            while lon2 > 180.0 {
                lon2 -= 360.0;
            }
            while lon2 < -180.0 {
                lon2 += 360.0;
            }

            let edge = Coord {
                lat: lat2 / DEG2RAD,
                lon: lon2,
            };

            assert!(
                regions.iter().any(|r| r.contains(edge)),
                "{:?} at {} km from {:?} not covered by {:?}",
                edge,
                radius_km,
                center,
                regions
            );
        }
    }

    #[test]
    fn test_search_regions_cover_circle() {
        check_circle_covered(Coord { lat: 0.0, lon: 0.0 }, 20.0);
        check_circle_covered(Coord { lat: 45.0, lon: -120.0 }, 20.0);
        check_circle_covered(Coord { lat: -60.0, lon: 30.0 }, 150.0);
        check_circle_covered(Coord { lat: 89.9, lon: 0.0 }, 20.0);
        check_circle_covered(Coord { lat: -89.95, lon: 100.0 }, 20.0);
    }

    #[test]
    fn test_search_regions_antimeridian() {
        let regions = search_regions(Coord { lat: 10.0, lon: 179.9 }, 20.0);
        assert_eq!(regions.len(), 2);
        check_circle_covered(Coord { lat: 10.0, lon: 179.9 }, 20.0);

        let regions = search_regions(Coord { lat: -10.0, lon: -179.9 }, 20.0);
        assert_eq!(regions.len(), 2);
        check_circle_covered(Coord { lat: -10.0, lon: -179.9 }, 20.0);

        let regions = search_regions(Coord { lat: 10.0, lon: 0.0 }, 20.0);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_search_regions_huge_radius() {
        let regions = search_regions(Coord { lat: 10.0, lon: 0.0 }, 50_000.0);
        assert_eq!(regions, vec![BoundingBox::GLOBE]);
    }
}
