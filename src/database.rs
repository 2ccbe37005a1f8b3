use crate::{
    error::ReportStoreError,
    hotspot::{find_hotspots, Hotspot},
    report::{Coordinates, HazardReport, NewReport, ReportStatus, Urgency},
    HazardResult,
};
use chrono::{DateTime, TimeZone, Utc};
use log::info;
use rusqlite::{Connection, OpenFlags, ToSql};
use std::{path::Path, str::FromStr};

/// Represents a connection to the database where the hazard reports are stored.
pub struct ReportDatabase {
    conn: Connection,
}

/// Which reports to pull out of the store with [ReportDatabase::query_reports].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportFilter {
    /// Every report in the store.
    All,
    /// Only the reports submitted by this user.
    SubmittedBy(String),
    /// Only the reports with this status.
    Status(ReportStatus),
}

impl ReportDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be run
    /// before any other connections are opened to the database to ensure consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> HazardResult<()> {
        let path = path.as_ref();

        let _conn = Self::open_database_to_write(path)?;
        Ok(())
    }

    /// Open a connection to the reports database, creating it if needed.
    pub fn connect<P: AsRef<Path>>(path: P) -> HazardResult<Self> {
        let path = path.as_ref();

        let conn = Self::open_database_to_write(path)?;
        Ok(ReportDatabase { conn })
    }

    fn open_database_to_write(path: &Path) -> HazardResult<Connection> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // A 5-second busy time out is WAY too much. If we hit this something has gone terribly wrong.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("database/create_report_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// Prepare to add reports to the database.
    ///
    /// This starts a transaction that is committed by [ReportDatabaseAddReport::finish]. If the
    /// handle is dropped without finishing, nothing added through it is kept.
    pub fn prepare_to_add_reports(&self) -> HazardResult<ReportDatabaseAddReport<'_>> {
        const ADD_REPORT_QUERY: &str = include_str!("database/add_report.sql");

        let add_report_stmt = self.conn.prepare(ADD_REPORT_QUERY)?;
        self.conn.execute("BEGIN TRANSACTION", [])?;

        Ok(ReportDatabaseAddReport {
            add_report_stmt,
            conn: &self.conn,
            num_added: 0,
            finished: false,
        })
    }

    /// Add a single report and return its new id.
    pub fn add_report(&self, report: &NewReport) -> HazardResult<u64> {
        let mut adder = self.prepare_to_add_reports()?;
        let id = adder.add(report)?;
        adder.finish()?;

        Ok(id)
    }

    /// Retrieve a single report, if there is one with this id.
    pub fn report(&self, id: u64) -> HazardResult<Option<HazardReport>> {
        const QUERY: &str = include_str!("database/query_single_report.sql");
        let mut stmt = self.conn.prepare(QUERY)?;

        let mut rows = stmt.query_and_then([id], row_to_report)?;
        rows.next().transpose()
    }

    /// Query reports from the database, newest first.
    pub fn query_reports(
        &self,
        filter: ReportFilter,
    ) -> HazardResult<ReportDatabaseQueryReports<'_>> {
        const QUERY: &str = include_str!("database/query_reports.sql");

        let stmt = self.conn.prepare(QUERY)?;

        Ok(ReportDatabaseQueryReports { stmt, filter })
    }

    /// Get every report that has both a latitude and a longitude.
    ///
    /// This is the snapshot that hotspot detection runs on.
    pub fn geotagged_reports(&self) -> HazardResult<Vec<HazardReport>> {
        const QUERY: &str = include_str!("database/query_geotagged_reports.sql");
        let mut stmt = self.conn.prepare(QUERY)?;

        let reports = stmt
            .query_and_then([], row_to_report)?
            .collect::<HazardResult<Vec<_>>>()?;

        Ok(reports)
    }

    /// Move a report into a new status and return the updated report.
    ///
    /// Only the statuses an official may assign are accepted, see [ReportStatus::is_assignable].
    pub fn update_status(&self, id: u64, status: ReportStatus) -> HazardResult<HazardReport> {
        if !status.is_assignable() {
            return Err(ReportStoreError::InvalidStatus(status).into());
        }

        const QUERY: &str = include_str!("database/update_status.sql");
        let num_changed = self
            .conn
            .execute(QUERY, [&status.name() as &dyn ToSql, &id])?;

        if num_changed == 0 {
            return Err(ReportStoreError::NotFound(id).into());
        }

        info!("Report {} is now {}.", id, status);

        let report = self.report(id)?.ok_or(ReportStoreError::NotFound(id))?;
        Ok(report)
    }

    /// The number of reports that are neither verified nor dismissed.
    pub fn count_active(&self) -> HazardResult<u64> {
        const QUERY: &str = include_str!("database/count_active.sql");

        let count: i64 = self.conn.query_row(QUERY, [], |row| row.get(0))?;
        Ok(u64::try_from(count)?)
    }

    /// Find the hotspots among the reports currently in the store.
    pub fn hotspots(&self) -> HazardResult<Vec<Hotspot>> {
        let reports = self.geotagged_reports()?;
        info!("Retrieved {} geotagged reports from database.", reports.len());

        let hotspots = find_hotspots(&reports)?;
        info!("Found {} hotspots.", hotspots.len());

        Ok(hotspots)
    }
}

pub struct ReportDatabaseAddReport<'a> {
    add_report_stmt: rusqlite::Statement<'a>,
    conn: &'a Connection,
    num_added: usize,
    finished: bool,
}

impl<'a> ReportDatabaseAddReport<'a> {
    /// Check and add a report, returning the id it was stored under.
    ///
    /// New reports always start out as [ReportStatus::Submitted] and are stamped with the
    /// current time.
    pub fn add(&mut self, report: &NewReport) -> HazardResult<u64> {
        report.validate()?;

        let (lat, lon) = match report.coordinates {
            Some(Coordinates { lat, lon }) => (lat, lon),
            None => (None, None),
        };
        let image_urls = serde_json::to_string(&report.image_urls)?;
        let created_at = Utc::now().timestamp();

        self.add_report_stmt.execute([
            &report.hazard_type as &dyn ToSql,
            &report.description,
            &report.location,
            &report.urgency.name(),
            &report.vessel_info,
            &lat,
            &lon,
            &ReportStatus::Submitted.name(),
            &report.submitted_by,
            &image_urls,
            &created_at,
        ])?;

        self.num_added += 1;

        Ok(u64::try_from(self.conn.last_insert_rowid())?)
    }

    /// Commit everything added with this handle.
    pub fn finish(mut self) -> HazardResult<()> {
        self.conn.execute("COMMIT", [])?;
        self.finished = true;

        info!("Added {} reports to the database.", self.num_added);

        Ok(())
    }
}

impl<'a> Drop for ReportDatabaseAddReport<'a> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute("ROLLBACK", []);
        }
    }
}

pub struct ReportDatabaseQueryReports<'a> {
    stmt: rusqlite::Statement<'a>,
    filter: ReportFilter,
}

impl<'a> ReportDatabaseQueryReports<'a> {
    /// Get an iterator over the rows
    pub fn rows(&mut self) -> HazardResult<impl Iterator<Item = HazardResult<HazardReport>> + '_> {
        let (submitter, status): (Option<&str>, Option<&str>) = match &self.filter {
            ReportFilter::All => (None, None),
            ReportFilter::SubmittedBy(user) => (Some(user.as_str()), None),
            ReportFilter::Status(status) => (None, Some(status.name())),
        };

        Ok(self.stmt.query_and_then([submitter, status], row_to_report)?)
    }
}

fn row_to_report(row: &rusqlite::Row) -> HazardResult<HazardReport> {
    let id: u64 = u64::try_from(row.get::<_, i64>(0)?)?;
    let hazard_type: String = row.get(1)?;
    let description: String = row.get(2)?;
    let location: Option<String> = row.get(3)?;
    let urgency = Urgency::from_str(row.get_ref(4)?.as_str()?)?;
    let vessel_info: Option<String> = row.get(5)?;

    let lat: Option<f64> = row.get(6)?;
    let lon: Option<f64> = row.get(7)?;
    let coordinates = if lat.is_none() && lon.is_none() {
        None
    } else {
        Some(Coordinates { lat, lon })
    };

    let status = ReportStatus::from_str(row.get_ref(8)?.as_str()?)?;
    let submitted_by: String = row.get(9)?;
    let image_urls: Vec<String> = serde_json::from_str(row.get_ref(10)?.as_str()?)?;

    let created_at: DateTime<Utc> = Utc
        .timestamp_opt(row.get(11)?, 0)
        .single()
        .ok_or("invalid created_at timestamp")?;

    Ok(HazardReport {
        id,
        hazard_type,
        description,
        location,
        urgency,
        vessel_info,
        coordinates,
        status,
        submitted_by,
        image_urls,
        created_at,
    })
}
