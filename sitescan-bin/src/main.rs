//! `sitescan` is a fast, asynchronous broken-link finder for rendered
//! web pages and whole sites.
//!
//! The binary is a wrapper around `sitescan-lib`, which provides
//! convenience functions for running scans from the command line.
//!
//! Check the links of a single page:
//!
//! ```sh
//! sitescan https://example.org/
//! ```
//!
//! Crawl a whole site, seeded from its `sitemap.xml`:
//!
//! ```sh
//! sitescan --site https://example.org/
//! ```
//!
//! Export the broken links of a site scan as CSV:
//!
//! ```sh
//! sitescan --site https://example.org/ --export-csv
//! ```
#![warn(clippy::all)]

use std::{collections::HashSet, fs, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use http::{
    header::{HeaderMap, HeaderName},
    StatusCode,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::error;
use regex::RegexSet;
use url::Url;

mod options;
mod stats;
mod writer;

use options::{Config, Format, SitescanOptions};
use sitescan_lib::{
    ClientBuilder, ErrorKind, ResponseCache, RetryPolicy, ScanState, Scanner,
    DEFAULT_RETRY_WAIT_TIME,
};
use stats::ScanSummary;

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to
    // `main()` using the `?` operator. For now, 1 acts as a catch-all
    // for everything non-link related.
    #[allow(unused)]
    UnexpectedFailure = 1,
    BrokenLinks = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be
    // run, therefore we wrap the main code in another function to ensure
    // that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

fn run_main() -> Result<i32> {
    let mut opts = SitescanOptions::parse();
    init_logging(opts.config.verbose);

    // Load a potentially existing config file and merge it into the
    // config from the CLI
    match Config::load_from_file(&opts.config_file) {
        Ok(Some(config)) => opts.config.merge(config),
        Ok(None) => {}
        Err(e) => {
            error!(
                "Cannot load configuration file `{}`: {e:?}",
                opts.config_file.display()
            );
            return Ok(ExitCode::ConfigFile as i32);
        }
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&opts))
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn run(opts: &SitescanOptions) -> Result<i32> {
    let cfg = &opts.config;
    let url = parse_url(&opts.url)?;

    let headers = parse_headers(&cfg.headers)?;
    let accepted = cfg
        .accept
        .as_deref()
        .map(parse_statuscodes)
        .transpose()?;
    let includes = parse_regex_set(&cfg.include)?;
    let excludes = parse_regex_set(&cfg.exclude)?;

    let client = ClientBuilder::builder()
        .includes(includes)
        .excludes(excludes)
        .max_redirects(cfg.max_redirects)
        .retry_policy(RetryPolicy::new(
            cfg.retries,
            Duration::from_secs(DEFAULT_RETRY_WAIT_TIME),
        ))
        .user_agent(cfg.user_agent.clone())
        .allow_insecure(cfg.insecure)
        .custom_headers(headers)
        .accepted(accepted)
        .timeout(Some(Duration::from_secs(cfg.timeout as u64)))
        .build()
        .client()?;

    let cache = ResponseCache::new(Duration::from_secs(cfg.cache_ttl));
    let scanner = Scanner::new(client, cache, cfg.batch_size);
    let mut updates = scanner.subscribe();
    let token = scanner.cancel_token();

    // Ctrl-C aborts the scan but keeps the partial results
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    let site = cfg.site;
    let handle = tokio::spawn(async move {
        if site {
            scanner.scan_site(&url).await
        } else {
            scanner.scan_page(&url).await
        }
    });

    if cfg.no_progress {
        drop(updates);
    } else {
        let bar = progress_bar();
        while updates.changed().await.is_ok() {
            let state = updates.borrow().clone();
            render_progress(&bar, &state);
        }
        bar.finish_and_clear();
    }

    let state = handle.await.context("The scan task panicked")?;
    let summary = ScanSummary::new(state);

    let formatted = match cfg.format {
        Format::Compact => summary.to_string(),
        Format::Json => serde_json::to_string_pretty(summary.state())?,
    };
    if let Some(output) = &cfg.output {
        fs::write(output, formatted).context("Cannot write report to file")?;
    } else {
        println!("{formatted}");
    }

    if let Some(path) = &cfg.export_csv {
        let path = writer::resolve_csv_path(path);
        writer::write_broken_links_csv(&path, &summary.state().broken)?;
        println!("Broken links exported to {}", path.display());
    }

    if summary.state().broken.is_empty() {
        Ok(ExitCode::Success as i32)
    } else {
        Ok(ExitCode::BrokenLinks as i32)
    }
}

fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input)
        .map_err(|e| ErrorKind::from((input.to_string(), e)))
        .with_context(|| format!("Scheme required, e.g. `https://{input}`"))
}

fn parse_regex_set(patterns: &[String]) -> Result<Option<RegexSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    Ok(Some(RegexSet::new(patterns)?))
}

fn read_header(input: &str) -> Result<(String, String)> {
    let elements: Vec<_> = input.split('=').collect();
    if elements.len() != 2 {
        return Err(anyhow!(
            "Header value should be of the form key=value, got {input}"
        ));
    }
    Ok((elements[0].into(), elements[1].into()))
}

fn parse_headers<T: AsRef<str>>(headers: &[T]) -> Result<HeaderMap> {
    let mut out = HeaderMap::new();
    for header in headers {
        let (key, val) = read_header(header.as_ref())?;
        out.insert(HeaderName::from_bytes(key.as_bytes())?, val.parse()?);
    }
    Ok(out)
}

fn parse_statuscodes(accept: &str) -> Result<HashSet<StatusCode>> {
    let mut statuscodes = HashSet::new();
    for code in accept.split(',') {
        let code = StatusCode::from_bytes(code.trim().as_bytes())?;
        statuscodes.insert(code);
    }
    Ok(statuscodes)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .expect("valid progress template")
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn render_progress(bar: &ProgressBar, state: &ScanState) {
    bar.set_length(state.total_links as u64);
    bar.set_position(state.checked_links as u64);
    bar.set_message(format!(
        "{}% · {} broken · {}/{} pages",
        state.progress(),
        state.broken.len(),
        state.pages_scanned,
        state.total_pages
    ));
}
