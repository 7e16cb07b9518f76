//! A CLI that scrapes conference calls for papers and syncs them into a remote API.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use cfp_common::client_api::{HttpConferenceStore, build_http_client};
use cfp_common::extract::extract_conferences;
use cfp_common::pipeline::{SyncReport, sync_extraction};
use cfp_common::source::fetch_source_page;
use cfp_common::{
    CLIENT_REQUEST_TIMEOUT_SECS, CLIENT_VERSION, DEFAULT_API_URL, DEFAULT_BATCH_SIZE,
    DEFAULT_LINK_BASE, DEFAULT_SOURCE_URL, DeleteRequest, MSG_ALREADY_EXISTS,
    MSG_DELETE_SUCCEEDED, MSG_INSERT_SUCCEEDED, MSG_UPDATE_SUCCEEDED, ResponseMessages,
    SyncConfig,
};
use clap::Parser;
use clap::builder::TypedValueParser as _;
use log::info;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The listing page to scrape
    #[arg(long, default_value = DEFAULT_SOURCE_URL, env = "CFP_SOURCE_URL")]
    source_url: String,

    /// The conference API endpoint
    #[arg(long, default_value = DEFAULT_API_URL, env = "CFP_API_URL")]
    api_url: String,

    /// Base URL for resolving relative conference links
    #[arg(long, default_value = DEFAULT_LINK_BASE, env = "CFP_LINK_BASE")]
    link_base: Url,

    /// Maximum records per API call
    #[arg(
        long,
        default_value_t = DEFAULT_BATCH_SIZE,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from),
        env = "CFP_BATCH_SIZE"
    )]
    batch_size: usize,

    /// Timeout for every HTTP request (seconds)
    #[arg(long, default_value_t = CLIENT_REQUEST_TIMEOUT_SECS, env = "CFP_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Delete a stored conference, given as ID:ACRONYM (repeatable)
    #[arg(long = "delete", value_name = "ID:ACRONYM")]
    deletes: Vec<DeleteRequest>,

    /// API message for a successful insert
    #[arg(long, default_value = MSG_INSERT_SUCCEEDED, env = "CFP_MSG_INSERTED")]
    insert_message: String,

    /// API message for an insert refused as a duplicate
    #[arg(long, default_value = MSG_ALREADY_EXISTS, env = "CFP_MSG_EXISTS")]
    exists_message: String,

    /// API message for a successful update
    #[arg(long, default_value = MSG_UPDATE_SUCCEEDED, env = "CFP_MSG_UPDATED")]
    update_message: String,

    /// API message for a successful delete
    #[arg(long, default_value = MSG_DELETE_SUCCEEDED, env = "CFP_MSG_DELETED")]
    delete_message: String,

    /// Show additional output
    #[arg(short, long, env = "CFP_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            link_base: self.link_base.clone(),
            batch_size: self.batch_size,
            messages: ResponseMessages {
                inserted: self.insert_message.clone(),
                already_exists: self.exists_message.clone(),
                updated: self.update_message.clone(),
                deleted: self.delete_message.clone(),
            },
            deletes: self.deletes.clone(),
        }
    }
}

fn print_summary(report: &SyncReport) {
    println!();
    println!(
        "Finished! Processed {}/{} records successfully.",
        report.success_count(),
        report.total_records
    );
    println!(
        "  Rows: {} seen, {} short, {} failed",
        report.extract.rows_seen, report.extract.rows_short, report.extract.rows_failed
    );
    if report.lookup_degraded {
        println!("  Existing conferences could not be read; all records were sent as new.");
    } else {
        println!(
            "  Existing: {} stored, {} matched",
            report.existing_count, report.matched
        );
    }
    for (name, stats) in [
        ("Inserts", &report.inserts),
        ("Updates", &report.updates),
        ("Deletes", &report.deletes),
    ] {
        if stats.batches_sent == 0 {
            continue;
        }
        println!(
            "  {name}: {} ok, {} failed, {} unknown ({} of {} batches failed)",
            stats.succeeded,
            stats.failed,
            stats.unattributed,
            stats.batches_failed,
            stats.batches_sent
        );
    }
    if report.requeued > 0 {
        println!("  Requeued as updates: {}", report.requeued);
    }
    if !report.duplicate_keys.is_empty() {
        println!("  Duplicate scraped keys:");
        for key in &report.duplicate_keys {
            println!("    {key}");
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Set up logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("CFP Sync v{CLIENT_VERSION} started.");
    if cli.verbose {
        println!("CLI Inputs: {cli:?}");
    }

    let client = build_http_client(cli.timeout_secs)?;

    // Scrape the listing; nothing is sent if this fails
    info!("Scraping {}...", cli.source_url);
    let page = fetch_source_page(&client, &cli.source_url)?;
    let config = cli.sync_config();
    let extraction = extract_conferences(&page, &config.link_base)?;

    if cli.verbose {
        println!(
            "Extracted Records: {}",
            serde_json::to_string_pretty(&extraction.records)?
        );
    }

    let store = HttpConferenceStore::new(client, cli.api_url.clone());
    let report = sync_extraction(&store, extraction, &config);
    print_summary(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["cfp_sync"]).unwrap();
        let config = cli.sync_config();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.link_base.as_str(), "https://easychair.org/");
        assert_eq!(config.messages, ResponseMessages::default());
        assert!(config.deletes.is_empty());
    }

    #[test_log::test]
    fn test_cli_batch_size_and_deletes() {
        let cli = Cli::try_parse_from([
            "cfp_sync",
            "--batch-size",
            "10",
            "--delete",
            "3:OLD",
            "--delete",
            "4:OLDER",
        ])
        .unwrap();
        let config = cli.sync_config();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.deletes.len(), 2);
        assert_eq!(config.deletes[1].id_conference, 4);
    }

    #[test_log::test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["cfp_sync", "--batch-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["cfp_sync", "--delete", "OLD"]).is_err());
    }
}
