use anyhow::{Context, Result};
use clap::Parser;
use functrace::cli::CoverageCli;
use functrace::coverage::{self, CoverageData};
use functrace::html_output::HtmlReport;
use functrace::json_output::JsonCoverage;
use functrace::xunit_output::XunitReport;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Write one report per image into `dir`, creating it if needed
fn write_reports<F>(dir: &Path, kind: &str, data: &CoverageData, render: F) -> Result<()>
where
    F: Fn(&str, &coverage::ImageCoverage) -> (String, String),
{
    fs::create_dir_all(dir)
        .with_context(|| format!("Could not create {} output directory '{}'", kind, dir.display()))?;

    println!("\n--> Generating {} reports in '{}'...", kind, dir.display());
    for (image, image_coverage) in data.images() {
        let (file_name, contents) = render(image, image_coverage);
        let path = dir.join(file_name);
        match fs::write(&path, contents) {
            Ok(()) => println!("    - {} report saved to {}", kind, path.display()),
            Err(e) => eprintln!("Error writing {} file {}: {}", kind, path.display(), e),
        }
    }
    println!("--> {} generation complete.", kind);
    Ok(())
}

fn main() -> Result<()> {
    let args = CoverageCli::parse();

    init_tracing(args.debug);

    println!("--> Processing {} log file(s)...", args.log_files.len());
    let data = coverage::analyze_logs(&args.log_files);
    println!("--> Processing complete.");

    print!("{}", coverage::console_report(&data));

    if let Some(dir) = &args.html_output {
        if let Err(e) = write_reports(dir, "HTML", &data, |image, c| {
            let report = HtmlReport::new(image, c);
            (report.file_name(), report.to_html())
        }) {
            eprintln!("Error: {:#}", e);
        }
    }

    if let Some(dir) = &args.xunit_output {
        if let Err(e) = write_reports(dir, "XUnit", &data, |image, c| {
            let report = XunitReport::new(image, c);
            (report.file_name(), report.to_xml())
        }) {
            eprintln!("Error: {:#}", e);
        }
    }

    if let Some(path) = &args.json_output {
        let json = JsonCoverage::from_data(&data).to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
        println!("--> JSON summary saved to {}", path.display());
    }

    Ok(())
}
