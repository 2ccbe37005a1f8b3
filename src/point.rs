/*!
 * Geotagged points, the input to hotspot detection.
 *
 * A GeoPoint is the location of a single report, stripped of everything else.
 */

use crate::{
    geo::{BoundingBox, Coord, Geo},
    report::HazardReport,
};

/// The location of a single hazard report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// The id of the report this point came from.
    pub id: u64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(id: u64, lon: f64, lat: f64) -> Self {
        GeoPoint { id, lon, lat }
    }

    pub fn coord(&self) -> Coord {
        Coord {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

impl Geo for GeoPoint {
    fn centroid(&self) -> Coord {
        self.coord()
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            ll: self.coord(),
            ur: self.coord(),
        }
    }
}

/**
 * Pull the location out of every report that has a usable one.
 *
 * Reports without coordinates, with only one half of the pair, or with values that aren't a
 * real place on the globe (non-finite, latitude outside -90 to 90, longitude outside -180 to 180)
 * are skipped. That is not an error, those reports just can't take part in hotspot detection.
 */
pub fn extract_points<'a, I>(reports: I) -> Vec<GeoPoint>
where
    I: IntoIterator<Item = &'a HazardReport>,
{
    let mut skipped = 0;

    let points: Vec<GeoPoint> = reports
        .into_iter()
        .filter_map(|report| {
            let point = report
                .coord()
                .filter(Coord::is_valid)
                .map(|Coord { lat, lon }| GeoPoint::new(report.id, lon, lat));

            if point.is_none() {
                skipped += 1;
            }

            point
        })
        .collect();

    log::debug!(
        "Extracted {} geotagged points, skipped {} reports without usable coordinates.",
        points.len(),
        skipped
    );

    points
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::{Coordinates, ReportStatus, Urgency};
    use chrono::{TimeZone, Utc};

    fn report(id: u64, coordinates: Option<Coordinates>) -> HazardReport {
        HazardReport {
            id,
            hazard_type: "oil-spill".to_owned(),
            description: "test".to_owned(),
            location: None,
            urgency: Urgency::Low,
            vessel_info: None,
            coordinates,
            status: ReportStatus::Submitted,
            submitted_by: "tester".to_owned(),
            image_urls: vec![],
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_extract_points() {
        let reports = vec![
            report(1, Some(Coordinates::new(10.0, 20.0))),
            report(2, None),
            report(
                3,
                Some(Coordinates {
                    lat: None,
                    lon: Some(20.0),
                }),
            ),
            report(
                4,
                Some(Coordinates {
                    lat: Some(10.0),
                    lon: None,
                }),
            ),
            report(5, Some(Coordinates::new(f64::NAN, 20.0))),
            report(6, Some(Coordinates::new(10.0, f64::INFINITY))),
            report(7, Some(Coordinates::new(95.0, 20.0))),
            report(8, Some(Coordinates::new(-10.0, -20.0))),
        ];

        let points = extract_points(&reports);

        assert_eq!(
            points,
            vec![GeoPoint::new(1, 20.0, 10.0), GeoPoint::new(8, -20.0, -10.0)]
        );
    }

    #[test]
    fn test_extract_points_empty() {
        let reports: Vec<HazardReport> = vec![];
        assert!(extract_points(&reports).is_empty());
    }
}
