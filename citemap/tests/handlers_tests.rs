use citemap::commands::command_argument_builder;
use citemap::handlers::*;
use citemap_core::graph::{CitationGraph, PublicationAttrs};
use citemap_scanner::{BlockPolicy, HttpFetcher};
use clap::ArgMatches;
use serde_json::Value;
use std::process::ExitCode;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn parse(args: &[&str]) -> ArgMatches {
    let mut argv = vec!["citemap"];
    argv.extend_from_slice(args);
    command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap()
}

// ============================================================================
// Argument Parsing Tests
// ============================================================================

#[test]
fn test_defaults() {
    let args = parse(&["deep learning"]);

    assert_eq!(args.get_one::<String>("TARGET").unwrap(), "deep learning");
    assert_eq!(args.get_one::<u32>("depth"), Some(&1));
    assert_eq!(args.get_one::<u32>("pages"), Some(&1));
    assert_eq!(args.get_one::<String>("output").unwrap(), "graph");
    assert_eq!(args.get_one::<u64>("timeout"), Some(&30));
    assert!(!args.get_flag("debug"));
    assert!(!args.get_flag("save-partial"));
    assert!(!args.get_flag("quiet"));
}

#[test]
fn test_target_is_required() {
    let result = command_argument_builder().try_get_matches_from(["citemap"]);
    assert!(result.is_err());
}

#[test]
fn test_pages_must_be_positive() {
    let result = command_argument_builder().try_get_matches_from(["citemap", "q", "--pages", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_poll_interval_must_be_positive() {
    let result = command_argument_builder()
        .try_get_matches_from(["citemap", "q", "--poll-interval", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_timeout_must_be_positive() {
    let result =
        command_argument_builder().try_get_matches_from(["citemap", "q", "--timeout", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_base_url_must_be_a_url() {
    let result =
        command_argument_builder().try_get_matches_from(["citemap", "q", "--base-url", "nope"]);
    assert!(result.is_err());
}

#[test]
fn test_default_block_policy_waits() {
    let args = parse(&["q"]);
    assert_eq!(
        block_policy_from_args(&args),
        BlockPolicy::Wait {
            poll_interval: Duration::from_secs(10),
            max_polls: None,
        }
    );
}

#[test]
fn test_block_policy_with_bounded_polls() {
    let args = parse(&["q", "--poll-interval", "3", "--max-polls", "4"]);
    assert_eq!(
        block_policy_from_args(&args),
        BlockPolicy::Wait {
            poll_interval: Duration::from_secs(3),
            max_polls: Some(4),
        }
    );
}

#[test]
fn test_non_interactive_aborts() {
    let args = parse(&["q", "--non-interactive", "--max-polls", "4"]);
    assert_eq!(block_policy_from_args(&args), BlockPolicy::Abort);
}

#[test]
fn test_crawl_options_from_args() {
    let args = parse(&[
        "q",
        "-d",
        "3",
        "-p",
        "2",
        "--min-delay",
        "0",
        "--max-delay",
        "2",
    ]);
    let options = crawl_options_from_args(&args, "https://scholar.example/?q=q".to_string());

    assert_eq!(options.start_url, "https://scholar.example/?q=q");
    assert_eq!(options.depth, 3);
    assert_eq!(options.pages, 2);
    assert_eq!(options.min_delay, Duration::ZERO);
    assert_eq!(options.max_delay, Duration::from_secs(2));
}

#[test]
fn test_expand_output_prefix() {
    assert_eq!(expand_output_prefix("out/graph"), "out/graph");

    if let Ok(home) = std::env::var("HOME") {
        assert_eq!(
            expand_output_prefix("~/graphs/run"),
            format!("{}/graphs/run", home)
        );
    }
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_finish_graph_empty_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("graph");
    let json_path = temp_dir.path().join("graph.json");

    let written = finish_graph(
        &mut CitationGraph::new(),
        prefix.to_str().unwrap(),
        &json_path,
    )
    .unwrap();

    assert!(written.is_none());
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_finish_graph_assigns_communities() {
    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("citations");
    let json_path = temp_dir.path().join("graph.json");

    let mut graph = CitationGraph::new();
    graph.add_node(
        "a",
        PublicationAttrs {
            title: Some("Paper A".to_string()),
            ..Default::default()
        },
    );
    graph.add_edge("b", "a");

    let written = finish_graph(&mut graph, prefix.to_str().unwrap(), &json_path)
        .unwrap()
        .unwrap();

    assert!(written.gexf.exists());
    assert!(written.graphml.exists());
    assert_eq!(graph.node("a").unwrap().attrs.community, Some(0));
    assert_eq!(graph.node("b").unwrap().attrs.community, Some(0));

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["nodes"][0]["community"], 0);
}

// ============================================================================
// End-to-end Crawl Tests
// ============================================================================

fn entry(id: &str, cited: bool) -> String {
    let cited = if cited {
        format!(r#"<a href="/scholar?cites={id}">Cited by 4</a>"#)
    } else {
        String::new()
    };
    format!(
        r#"<div class="gs_r" data-cid="{id}">
            <h3 class="gs_rt"><a href="https://pubs.example/{id}">Paper {id}</a></h3>
            <div class="gs_a">Author {id} - Journal, 2021</div>
            <div class="gs_fl">{cited}</div>
        </div>"#
    )
}

fn results_page(parent: Option<&str>, entries: &[String]) -> String {
    let header = parent
        .map(|id| format!(r#"<div id="gs_res_ccl_top"><a href="/scholar?cluster={id}">Paper {id}</a></div>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body>{header}<div id="gs_res_ccl_mid">{}</div></body></html>"#,
        entries.concat()
    )
}

async fn search_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("q", "graphs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(None, &[entry("a", true), entry("b", false)])),
        )
        .mount(&server)
        .await;
    server
}

fn crawl_args(server: &MockServer, prefix: &str, extra: &[&str]) -> ArgMatches {
    let base_url = format!("{}/scholar", server.uri());
    let mut args = vec![
        "graphs",
        "--base-url",
        base_url.as_str(),
        "--min-delay",
        "0",
        "--max-delay",
        "0",
        "-o",
        prefix,
        "-q",
    ];
    args.extend_from_slice(extra);
    parse(&args)
}

#[tokio::test]
async fn test_run_crawl_writes_graph() {
    let server = search_server().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("cites", "a"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(results_page(Some("a"), &[entry("c", false)])),
        )
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("citations");
    let json_path = temp_dir.path().join("graph.json");
    let args = crawl_args(&server, prefix.to_str().unwrap(), &[]);

    let code = run_crawl(&args, HttpFetcher::with_timeout(5).unwrap(), &json_path, false)
        .await
        .unwrap();

    assert_eq!(code, ExitCode::SUCCESS);
    assert!(temp_dir.path().join("citations.gexf").exists());
    assert!(temp_dir.path().join("citations.graphml").exists());

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    let ids: Vec<&str> = json["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "c", "b"]);
    assert_eq!(json["links"][0]["source"], "c");
    assert_eq!(json["links"][0]["target"], "a");
}

#[tokio::test]
async fn test_run_crawl_blocked_discards_graph() {
    let server = search_server().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("cites", "a"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("citations");
    let json_path = temp_dir.path().join("graph.json");
    let args = crawl_args(&server, prefix.to_str().unwrap(), &["--non-interactive"]);

    let code = run_crawl(&args, HttpFetcher::with_timeout(5).unwrap(), &json_path, false)
        .await
        .unwrap();

    assert_eq!(code, ExitCode::from(EXIT_BLOCKED));
    assert!(!json_path.exists());
    assert!(!temp_dir.path().join("citations.gexf").exists());
}

#[tokio::test]
async fn test_run_crawl_blocked_saves_partial_graph() {
    let server = search_server().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("cites", "a"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("citations");
    let json_path = temp_dir.path().join("graph.json");
    let args = crawl_args(
        &server,
        prefix.to_str().unwrap(),
        &["--non-interactive", "--save-partial"],
    );

    let code = run_crawl(&args, HttpFetcher::with_timeout(5).unwrap(), &json_path, false)
        .await
        .unwrap();

    assert_eq!(code, ExitCode::from(EXIT_BLOCKED));
    let json: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(json["nodes"][0]["id"], "a");
}

#[tokio::test]
async fn test_run_crawl_with_no_results_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(None, &[])))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("citations");
    let json_path = temp_dir.path().join("graph.json");
    let args = crawl_args(&server, prefix.to_str().unwrap(), &[]);

    let code = run_crawl(&args, HttpFetcher::with_timeout(5).unwrap(), &json_path, false)
        .await
        .unwrap();

    assert_eq!(code, ExitCode::SUCCESS);
    assert!(!json_path.exists());
}
