use clap::Parser;
use hazardwatch::{HazardResult, KmlFile, KmlWriter, ReportDatabase, ReportFilter, Urgency};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};
use strum::IntoEnumIterator;

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Find the hotspots among the hazard reports in the store.
///
/// The hotspots are printed to standard output as a JSON array, busiest first. Optionally a KML
/// file with the hotspots and every geotagged report can be written for viewing on a map.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "hotspots")]
#[clap(author, version, about)]
struct HotspotsOptionsInit {
    /// The path to the reports database file.
    ///
    /// If this is not specified, then the program will check for it in the "HAZARD_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "HAZARD_DB")]
    reports_store_file: PathBuf,

    /// The path to a KML file to produce from this run.
    ///
    /// If this is not specified, no KML is written.
    #[clap(short, long)]
    kml_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct HotspotsOptionsChecked {
    /// The path to the database file.
    reports_store_file: PathBuf,

    /// The path to a KML file to produce from this run.
    kml_file: Option<PathBuf>,

    /// Verbose output
    verbose: bool,
}

impl Display for HotspotsOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "  Database: {}", self.reports_store_file.display())?;
        match self.kml_file {
            Some(ref kml_file) => writeln!(f, "Output KML: {}", kml_file.display())?,
            None => writeln!(f, "Output KML: none")?,
        }
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> HazardResult<HotspotsOptionsChecked> {
    let HotspotsOptionsInit {
        reports_store_file,
        kml_file,
        verbose,
    } = HotspotsOptionsInit::parse();

    if !reports_store_file.exists() {
        return Err(format!(
            "Reports database does not exist: {}",
            reports_store_file.display()
        )
        .into());
    }

    Ok(HotspotsOptionsChecked {
        reports_store_file,
        kml_file,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> HazardResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    SimpleLogger::new().with_level(level).init()?;

    info!("{}", opts);

    let db = ReportDatabase::connect(&opts.reports_store_file)?;
    let hotspots = db.hotspots()?;

    if opts.verbose {
        info!("{:>10} {:>11} {:>6} {:>11}", "lat", "lon", "count", "radius");
        for hotspot in &hotspots {
            info!("{}", hotspot);
        }
    }

    println!("{}", serde_json::to_string_pretty(&hotspots)?);

    if let Some(ref kml_file) = opts.kml_file {
        let mut kfile = KmlFile::start_document(kml_file)?;
        write_styles(&mut kfile)?;

        kfile.start_folder(Some("Hotspots"), None, true)?;
        for (i, hotspot) in hotspots.iter().enumerate() {
            let name = format!("Hotspot {}", i + 1);
            hotspot.kml_write(&mut kfile, &name)?;
        }
        kfile.finish_folder()?;

        kfile.start_folder(Some("Reports"), None, false)?;
        let mut query = db.query_reports(ReportFilter::All)?;
        for report_res in query.rows()? {
            match report_res {
                Ok(report) => report.kml_write(&mut kfile)?,
                Err(err) => warn!("Error reading report from database: {}", err),
            }
        }
        kfile.finish_folder()?;

        info!("Wrote {}", kml_file.display());
    }

    Ok(())
}

fn write_styles<K: KmlWriter>(kfile: &mut K) -> HazardResult<()> {
    kfile.start_style(Some("hotspot"))?;
    kfile.create_icon_style(
        Some("http://maps.google.com/mapfiles/kml/shapes/caution.png"),
        1.3,
    )?;
    kfile.create_poly_style(Some("550000ff"), true, true)?;
    kfile.finish_style()?;

    for urgency in Urgency::iter() {
        let scale = match urgency {
            Urgency::Low => 0.6,
            Urgency::Medium => 0.8,
            Urgency::High => 1.0,
            Urgency::Critical => 1.2,
        };

        kfile.start_style(Some(urgency.name()))?;
        kfile.create_icon_style(
            Some("http://maps.google.com/mapfiles/kml/shapes/placemark_circle.png"),
            scale,
        )?;
        kfile.finish_style()?;
    }

    Ok(())
}
