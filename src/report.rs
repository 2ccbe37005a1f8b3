/*! Hazard reports as submitted by the public and reviewed by officials. */

use crate::{error::ReportStoreError, geo::Coord, kml::KmlWriter, HazardResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Write};
use strum::{EnumIter, EnumString, IntoStaticStr};

/// The most images that may be attached to a single report.
pub const MAX_IMAGES_PER_REPORT: usize = 3;

/** How urgent the person submitting the report thinks it is. */
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Get a string representing the urgency, as stored in the database.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/** Where a report is in the review process. */
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportStatus {
    /// Just came in, nobody has looked at it.
    Submitted,
    /// Acknowledged, waiting for review.
    Pending,
    /// Someone is looking into it.
    Investigating,
    /// Confirmed by an official.
    Verified,
    /// Not a real hazard, or a duplicate.
    Dismissed,
    /// Handed off to another agency.
    Escalated,
}

impl ReportStatus {
    /// Get a string representing the status, as stored in the database.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Can an official move a report into this status?
    pub fn is_assignable(&self) -> bool {
        use ReportStatus::*;

        matches!(self, Pending | Investigating | Verified | Dismissed)
    }

    /// Is a report with this status still open?
    pub fn is_active(&self) -> bool {
        !matches!(self, ReportStatus::Verified | ReportStatus::Dismissed)
    }
}

impl Default for ReportStatus {
    fn default() -> Self {
        ReportStatus::Submitted
    }
}

impl Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/// The location attached to a report.
///
/// Either value may be missing; the report form lets people submit without a GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinates {
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    /// Both halves of the pair, if both are present.
    pub fn coord(&self) -> Option<Coord> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coord { lat, lon }),
            _ => None,
        }
    }
}

/// A report that hasn't been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub hazard_type: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub urgency: Urgency,
    #[serde(default)]
    pub vessel_info: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub submitted_by: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl NewReport {
    /// Check the fields the report form requires.
    pub fn validate(&self) -> Result<(), ReportStoreError> {
        if self.hazard_type.trim().is_empty() {
            return Err(ReportStoreError::Invalid("missing hazard type"));
        }

        if self.description.trim().is_empty() {
            return Err(ReportStoreError::Invalid("missing description"));
        }

        if self.submitted_by.trim().is_empty() {
            return Err(ReportStoreError::Invalid("missing submitter"));
        }

        if self.image_urls.len() > MAX_IMAGES_PER_REPORT {
            return Err(ReportStoreError::Invalid("too many images"));
        }

        Ok(())
    }
}

/// A report as it exists in the report store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardReport {
    pub id: u64,
    pub hazard_type: String,
    pub description: String,
    pub location: Option<String>,
    pub urgency: Urgency,
    pub vessel_info: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub status: ReportStatus,
    pub submitted_by: String,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl HazardReport {
    /// The location of this report, if it has a complete pair of coordinates.
    pub fn coord(&self) -> Option<Coord> {
        self.coordinates.as_ref().and_then(Coordinates::coord)
    }

    /// Write this report as a KML placemark. Reports without a location are skipped.
    pub fn kml_write<K: KmlWriter>(&self, kml: &mut K) -> HazardResult<()> {
        let Coord { lat, lon } = match self.coord() {
            Some(coord) => coord,
            None => return Ok(()),
        };

        let mut description = String::new();
        write!(
            &mut description,
            concat!(
                "Urgency: {}<br/>",
                "Status: {}<br/>",
                "Submitted by: {}<br/>"
            ),
            self.urgency, self.status, self.submitted_by
        )?;
        if let Some(ref vessel_info) = self.vessel_info {
            write!(&mut description, "Vessel: {}<br/>", vessel_info)?;
        }
        write!(&mut description, "<br/>{}", self.description)?;

        let name = format!("{} #{}", self.hazard_type, self.id);
        let style = format!("#{}", self.urgency);

        kml.start_placemark(Some(&name), Some(&description), Some(&style))?;
        kml.timestamp(self.created_at)?;
        kml.create_point(lat, lon, 0.0)?;
        kml.finish_placemark()?;

        Ok(())
    }
}

impl Display for HazardReport {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "          ID: {}", self.id)?;
        writeln!(f, " Hazard Type: {}", self.hazard_type)?;
        writeln!(f, "     Urgency: {}", self.urgency)?;
        writeln!(f, "      Status: {}", self.status)?;
        writeln!(f, "   Submitted: {} by {}", self.created_at, self.submitted_by)?;
        if let Some(ref location) = self.location {
            writeln!(f, "    Location: {}", location)?;
        }
        match self.coord() {
            Some(Coord { lat, lon }) => writeln!(f, " Coordinates: {:.6},{:.6}", lat, lon)?,
            None => writeln!(f, " Coordinates: none")?,
        }
        if let Some(ref vessel_info) = self.vessel_info {
            writeln!(f, "      Vessel: {}", vessel_info)?;
        }
        writeln!(f, "      Images: {}", self.image_urls.len())?;
        writeln!(f, " Description: {}", self.description)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_status_names_round_trip() {
        for status in ReportStatus::iter() {
            assert_eq!(ReportStatus::from_str(status.name()).unwrap(), status);
        }

        assert!(ReportStatus::from_str("closed").is_err());
    }

    #[test]
    fn test_assignable_statuses() {
        let assignable: Vec<_> = ReportStatus::iter().filter(|s| s.is_assignable()).collect();
        assert_eq!(
            assignable,
            vec![
                ReportStatus::Pending,
                ReportStatus::Investigating,
                ReportStatus::Verified,
                ReportStatus::Dismissed
            ]
        );

        assert!(ReportStatus::Submitted.is_active());
        assert!(ReportStatus::Escalated.is_active());
        assert!(!ReportStatus::Verified.is_active());
        assert!(!ReportStatus::Dismissed.is_active());
    }

    #[test]
    fn test_new_report_from_json() {
        let json = r#"{
            "hazardType": "oil-spill",
            "description": "Sheen on the water near the jetty",
            "urgency": "high",
            "coordinates": {"lat": 19.07, "lon": 72.87},
            "submittedBy": "user-1"
        }"#;

        let report: NewReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.hazard_type, "oil-spill");
        assert_eq!(report.urgency, Urgency::High);
        assert_eq!(report.coordinates, Some(Coordinates::new(19.07, 72.87)));
        assert!(report.image_urls.is_empty());
        assert!(report.validate().is_ok());

        let json = r#"{
            "hazardType": "marine-debris",
            "description": "Ghost nets",
            "urgency": "low",
            "coordinates": {"lat": null},
            "submittedBy": "user-2"
        }"#;

        let report: NewReport = serde_json::from_str(json).unwrap();
        let coords = report.coordinates.unwrap();
        assert_eq!(coords.lat, None);
        assert_eq!(coords.lon, None);
        assert_eq!(coords.coord(), None);
    }

    #[test]
    fn test_kml_placemark() {
        use chrono::TimeZone;

        let mut report = HazardReport {
            id: 7,
            hazard_type: "oil-spill".to_owned(),
            description: "Sheen <near> the jetty".to_owned(),
            location: None,
            urgency: Urgency::Critical,
            vessel_info: Some("MV Example".to_owned()),
            coordinates: Some(Coordinates::new(19.07, 72.87)),
            status: ReportStatus::Investigating,
            submitted_by: "user-1".to_owned(),
            image_urls: vec![],
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };

        let mut kml: Vec<u8> = vec![];
        report.kml_write(&mut kml).unwrap();
        let text = String::from_utf8(kml).unwrap();

        assert!(text.contains("<name>oil-spill #7</name>"));
        assert!(text.contains("<styleUrl>#critical</styleUrl>"));
        assert!(text.contains("Status: investigating"));
        assert!(text.contains("Vessel: MV Example"));
        assert!(text.contains("<when>2023-11-14T22:13:20Z</when>"));
        assert!(text.contains("<coordinates>72.87,19.07,0</coordinates>"));

        report.coordinates = Some(Coordinates {
            lat: Some(19.07),
            lon: None,
        });
        let mut kml: Vec<u8> = vec![];
        report.kml_write(&mut kml).unwrap();
        assert!(kml.is_empty());
    }

    #[test]
    fn test_new_report_validation() {
        let mut report = NewReport {
            hazard_type: "algal-bloom".to_owned(),
            description: "Red tide".to_owned(),
            location: None,
            urgency: Urgency::Medium,
            vessel_info: None,
            coordinates: None,
            submitted_by: "user-3".to_owned(),
            image_urls: vec![],
        };
        assert!(report.validate().is_ok());

        report.image_urls = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        assert_eq!(
            report.validate(),
            Err(ReportStoreError::Invalid("too many images"))
        );

        report.image_urls.clear();
        report.description = "   ".to_owned();
        assert_eq!(
            report.validate(),
            Err(ReportStoreError::Invalid("missing description"))
        );
    }

    #[test]
    fn test_stored_report_json_shape() {
        let report = HazardReport {
            id: 12,
            hazard_type: "marine-debris".to_owned(),
            description: "Drifting nets".to_owned(),
            location: Some("Outer harbor".to_owned()),
            urgency: Urgency::High,
            vessel_info: None,
            coordinates: Some(Coordinates::new(-33.9, 18.4)),
            status: ReportStatus::Verified,
            submitted_by: "user-9".to_owned(),
            image_urls: vec!["https://img/1.jpg".to_owned()],
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["id"], 12);
        assert_eq!(json["hazardType"], "marine-debris");
        assert_eq!(json["urgency"], "high");
        assert_eq!(json["status"], "verified");
        assert_eq!(json["submittedBy"], "user-9");
        assert_eq!(json["imageUrls"][0], "https://img/1.jpg");
        assert_eq!(json["coordinates"]["lat"], -33.9);
        assert_eq!(json["createdAt"], "2023-11-14T22:13:20Z");
        assert!(json["vesselInfo"].is_null());
    }
}
