use crate::CLAP_STYLING;
use citemap_core::crawl::DEFAULT_SEARCH_URL;
use clap::arg;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("citemap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("citemap")
        .about(
            "Crawls a scholarly search engine's \"cited by\" links into a citation graph and \
        writes it as GEXF, GraphML and JSON.",
        )
        .styles(CLAP_STYLING)
        .arg(
            arg!(<TARGET>)
                .help("A search results url, or a free-text query to search for")
                .required(true),
        )
        .arg(
            arg!(-d --"depth" <DEPTH>)
                .required(false)
                .help("How many levels of \"cited by\" links to follow (0 reads only the start page)")
                .value_parser(clap::value_parser!(u32))
                .default_value("1"),
        )
        .arg(
            arg!(-p --"pages" <PAGES>)
                .required(false)
                .help("Maximum result pages to read per citation level")
                .value_parser(clap::value_parser!(u32).range(1..))
                .default_value("1"),
        )
        .arg(
            arg!(-o --"output" <PREFIX>)
                .required(false)
                .help("Prefix for the .gexf and .graphml files (graph.json is always written as-is)")
                .default_value("graph"),
        )
        .arg(
            arg!(--"debug")
                .required(false)
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"non-interactive")
                .required(false)
                .help("Abort on an anti-bot check instead of waiting for it to be cleared")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"poll-interval" <SECONDS>)
                .required(false)
                .help("Seconds between retries while blocked")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("10"),
        )
        .arg(
            arg!(--"max-polls" <N>)
                .required(false)
                .help("Give up after this many retries while blocked (default: keep waiting)")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            arg!(--"min-delay" <SECONDS>)
                .required(false)
                .help("Minimum random delay before each page fetch")
                .value_parser(clap::value_parser!(u64))
                .default_value("1"),
        )
        .arg(
            arg!(--"max-delay" <SECONDS>)
                .required(false)
                .help("Maximum random delay before each page fetch")
                .value_parser(clap::value_parser!(u64))
                .default_value("5"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("HTTP request timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("30"),
        )
        .arg(
            arg!(--"save-partial")
                .required(false)
                .help("Write whatever was collected when a crawl is stopped by an anti-bot check")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"base-url" <URL>)
                .required(false)
                .help("Search endpoint used for free-text queries")
                .value_parser(clap::value_parser!(Url))
                .default_value(DEFAULT_SEARCH_URL),
        )
        .arg(arg!(-q --"quiet" "Suppress the end-of-run summary").required(false))
}
