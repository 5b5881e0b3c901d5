use anyhow::{Context, Result};
use citemap_core::community::detect_communities;
use citemap_core::crawl::{
    CrawlAbort, CrawlOptions, DEFAULT_SEARCH_URL, execute_crawl, generate_graph_summary,
    resolve_target,
};
use citemap_core::export::{JSON_OUTPUT, WrittenOutputs, write_outputs};
use citemap_core::graph::CitationGraph;
use citemap_scanner::{BlockPolicy, Fetcher, HttpFetcher};
use clap::ArgMatches;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// Exit status for a crawl stopped by a persistent anti-bot check.
pub const EXIT_BLOCKED: u8 = 2;
const EXIT_FAILURE: u8 = 1;

/// Installs the stderr log subscriber. Safe to call more than once.
pub fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn block_policy_from_args(args: &ArgMatches) -> BlockPolicy {
    if args.get_flag("non-interactive") {
        return BlockPolicy::Abort;
    }

    let poll_interval = args.get_one::<u64>("poll-interval").copied().unwrap_or(10);
    BlockPolicy::Wait {
        poll_interval: Duration::from_secs(poll_interval),
        max_polls: args.get_one::<u32>("max-polls").copied(),
    }
}

pub fn expand_output_prefix(prefix: &str) -> String {
    shellexpand::tilde(prefix).into_owned()
}

pub fn crawl_options_from_args(args: &ArgMatches, start_url: String) -> CrawlOptions {
    let seconds = |name: &str, default: u64| {
        Duration::from_secs(args.get_one::<u64>(name).copied().unwrap_or(default))
    };

    let mut options = CrawlOptions::new(start_url);
    options.depth = args.get_one::<u32>("depth").copied().unwrap_or(1);
    options.pages = args.get_one::<u32>("pages").copied().unwrap_or(1);
    options.min_delay = seconds("min-delay", 1);
    options.max_delay = seconds("max-delay", 5);
    options.block_policy = block_policy_from_args(args);
    options
}

/// Runs community detection on a finished graph and writes every output.
/// Prints a notice and writes nothing when the graph is empty.
pub fn finish_graph(
    graph: &mut CitationGraph,
    prefix: &str,
    json_path: &Path,
) -> Result<Option<WrittenOutputs>> {
    if graph.is_empty() {
        println!(
            "{} No publications found, nothing to write",
            "!".yellow().bold()
        );
        return Ok(None);
    }

    let partition = detect_communities(graph);
    graph.assign_communities(&partition);

    let written = write_outputs(graph, prefix, json_path)
        .with_context(|| format!("Failed to write graph files for prefix '{}'", prefix))?;

    if let Some(ref outputs) = written {
        for path in [&outputs.gexf, &outputs.graphml, &outputs.json] {
            println!(
                "{} Wrote {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
    }

    Ok(written)
}

pub async fn handle_crawl(args: &ArgMatches) -> ExitCode {
    init_tracing(args.get_flag("debug"));

    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);
    let fetcher = match HttpFetcher::with_timeout(timeout) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("{} Could not set up HTTP client: {}", "✗".red().bold(), e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match run_crawl(args, fetcher, Path::new(JSON_OUTPUT), true).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Crawls the target named in `args` with `fetcher` and writes the graph.
/// Returns the process exit status for a crawl that ran; setup and write
/// failures are errors.
pub async fn run_crawl<F: Fetcher>(
    args: &ArgMatches,
    fetcher: F,
    json_path: &Path,
    show_progress_bars: bool,
) -> Result<ExitCode> {
    let target = args
        .get_one::<String>("TARGET")
        .context("No search target given")?;
    let base_url = args
        .get_one::<Url>("base-url")
        .map(Url::as_str)
        .unwrap_or(DEFAULT_SEARCH_URL);
    let prefix = expand_output_prefix(
        args.get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("graph"),
    );
    let quiet = args.get_flag("quiet");

    let start_url = resolve_target(target, base_url)?;
    let mut options = crawl_options_from_args(args, start_url);
    options.show_progress_bars = show_progress_bars;

    println!(
        "\n{} Crawling citations for {}",
        "→".blue().bold(),
        target.bright_white()
    );
    println!(
        "  depth {}, up to {} page(s) per level",
        options.depth.to_string().cyan(),
        options.pages.to_string().cyan()
    );

    let mut graph = match execute_crawl(fetcher, options, None).await {
        Ok(graph) => graph,
        Err(CrawlAbort { error, mut partial }) => {
            eprintln!("{} {}", "✗".red().bold(), error);
            if args.get_flag("save-partial") {
                finish_graph(&mut partial, &prefix, json_path)?;
            } else if !partial.is_empty() {
                eprintln!(
                    "  Discarded {} publications gathered before the block (see --save-partial)",
                    partial.node_count()
                );
            }
            let code = if error.is_blocked() {
                EXIT_BLOCKED
            } else {
                EXIT_FAILURE
            };
            return Ok(ExitCode::from(code));
        }
    };

    let written = finish_graph(&mut graph, &prefix, json_path)?;
    if written.is_some() && !quiet {
        print!("\n{}", generate_graph_summary(&graph));
    }

    Ok(ExitCode::SUCCESS)
}
