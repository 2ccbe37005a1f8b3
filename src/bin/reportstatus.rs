use clap::Parser;
use hazardwatch::{HazardResult, ReportDatabase, ReportStatus, ReportStoreError};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{path::PathBuf, str::FromStr};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Show a hazard report, or move it to a new status.
///
/// Officials may set a report to pending, investigating, verified, or dismissed.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "reportstatus")]
#[clap(author, version, about)]
struct ReportStatusOptions {
    /// The path to the reports database file.
    ///
    /// If this is not specified, then the program will check for it in the "HAZARD_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "HAZARD_DB")]
    reports_store_file: PathBuf,

    /// The id of the report.
    id: u64,

    /// The new status for the report.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_status))]
    set: Option<ReportStatus>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/// Parse a status an official is allowed to assign.
fn parse_status(status: &str) -> Result<ReportStatus, String> {
    let status = ReportStatus::from_str(&status.to_lowercase())
        .map_err(|_| format!("Unknown status: {}", status))?;

    if !status.is_assignable() {
        return Err(ReportStoreError::InvalidStatus(status).to_string());
    }

    Ok(status)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> HazardResult<()> {
    let opts = ReportStatusOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init()?;

    info!("Database: {}", opts.reports_store_file.display());

    let db = ReportDatabase::connect(&opts.reports_store_file)?;

    let report = match opts.set {
        Some(status) => db.update_status(opts.id, status)?,
        None => db
            .report(opts.id)?
            .ok_or(ReportStoreError::NotFound(opts.id))?,
    };

    println!("{}", report);
    println!("Active reports: {}", db.count_active()?);

    Ok(())
}
