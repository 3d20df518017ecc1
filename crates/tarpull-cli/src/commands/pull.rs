use super::{
    client_config, colorize_status, json_pretty, spin_fail, spin_ok, spinner, ClientOverrides,
    EXIT_FAILURE, EXIT_SUCCESS,
};
use indicatif::{HumanBytes, ProgressBar};
use std::path::Path;
use tarpull_core::{BundleOptions, BundleReport, Bundler, CoreError};
use tarpull_registry::HttpRegistry;
use tarpull_schema::read_image_list;
use tracing::info;

pub fn run(
    registry: &str,
    image_list: &Path,
    output: &Path,
    overrides: &ClientOverrides<'_>,
    options: BundleOptions,
    json: bool,
) -> Result<u8, CoreError> {
    let entries = read_image_list(image_list)?;
    let config = client_config(registry, overrides)?;
    let source = HttpRegistry::new(config);
    info!(
        "pulling {} images from {} for {}",
        entries.len(),
        source.base_url(),
        options.platform
    );

    let pb = if json {
        ProgressBar::hidden()
    } else {
        spinner("connecting…")
    };
    let result = Bundler::new(&source, options)
        .on_image(|entry, i, n| pb.set_message(format!("[{i}/{n}] pulling {entry}")))
        .run(&entries, output);
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            spin_fail(&pb, "pull failed");
            return Err(e);
        }
    };

    if json {
        match json_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: {e}");
                return Ok(EXIT_FAILURE);
            }
        }
    } else {
        let done = format!(
            "wrote {} ({} images, {})",
            report.output.display(),
            report.catalog_entries(),
            HumanBytes(report.bytes_written)
        );
        if report.is_complete() {
            spin_ok(&pb, &done);
        } else {
            spin_fail(&pb, &done);
        }
        print_summary(&report);
    }

    Ok(if report.is_complete() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}

fn print_summary(report: &BundleReport) {
    for image in &report.images {
        match &image.error {
            Some(err) => println!("  {}  {}: {err}", image.image, colorize_status(image.status)),
            None => println!("  {}  {}", image.image, colorize_status(image.status)),
        }
    }
    println!(
        "  {} blobs written, {} already in the archive",
        report.blobs_written, report.blobs_skipped
    );
}
