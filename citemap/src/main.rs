use citemap::{command_argument_builder, handle_crawl};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = command_argument_builder().get_matches();
    handle_crawl(&matches).await
}
