use clap::Parser;
use hazardwatch::{HazardResult, NewReport, ReportDatabase};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    fs::File,
    io::BufReader,
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Load hazard reports into the store.
///
/// The input is a JSON array of reports in the same shape the report form submits them. Reports
/// that are missing required fields are skipped with a warning, the rest are added in a single
/// transaction.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "importreports")]
#[clap(author, version, about)]
struct ImportReportsOptionsInit {
    /// The path to the reports database file.
    ///
    /// If this is not specified, then the program will check for it in the "HAZARD_DB"
    /// environment variable. It will be created if it doesn't exist.
    #[clap(short, long)]
    #[clap(env = "HAZARD_DB")]
    reports_store_file: PathBuf,

    /// The JSON file with the reports to import.
    input: PathBuf,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct ImportReportsOptionsChecked {
    /// The path to the database file.
    reports_store_file: PathBuf,

    /// The reports to import.
    input: PathBuf,

    /// Verbose output
    verbose: bool,
}

impl Display for ImportReportsOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "Database: {}", self.reports_store_file.display())?;
        writeln!(f, "   Input: {}", self.input.display())?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> HazardResult<ImportReportsOptionsChecked> {
    let ImportReportsOptionsInit {
        reports_store_file,
        input,
        verbose,
    } = ImportReportsOptionsInit::parse();

    if !input.exists() {
        return Err(format!("Input file does not exist: {}", input.display()).into());
    }

    Ok(ImportReportsOptionsChecked {
        reports_store_file,
        input,
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
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let reader = BufReader::new(File::open(&opts.input)?);
    let reports: Vec<NewReport> = serde_json::from_reader(reader)?;
    info!("Read {} reports from {}", reports.len(), opts.input.display());

    ReportDatabase::initialize(&opts.reports_store_file)?;
    let db = ReportDatabase::connect(&opts.reports_store_file)?;

    let mut adder = db.prepare_to_add_reports()?;
    let mut num_skipped = 0;
    for (i, report) in reports.iter().enumerate() {
        if let Err(err) = adder.add(report) {
            warn!("Skipping report {} of {}: {}", i + 1, reports.len(), err);
            num_skipped += 1;
        }
    }
    adder.finish()?;

    if num_skipped > 0 {
        warn!("Skipped {} reports.", num_skipped);
    }

    Ok(())
}
