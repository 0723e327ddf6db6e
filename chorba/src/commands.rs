use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("chorba")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("chorba")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress progress and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Enable debug logging (overridden by RUST_LOG)")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Walk the sitemap tree of a site or collection of sites and list the \
                recipe pages it advertises.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The site or sitemap URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of site URLs to crawl")
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(--"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum sitemap index nesting to follow")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(timeout_arg())
                .arg(user_agent_arg())
                .arg(
                    arg!(--"host-pattern" <HOST_REGEX>)
                        .required(false)
                        .help("Extra recipe path policy as HOST=REGEX (repeatable)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"extract" <COUNT>)
                        .required(false)
                        .help("Fetch and extract the first COUNT recipes discovered")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of concurrent extraction requests")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(--"delay-ms" <MILLIS>)
                        .required(false)
                        .help("Pause between extraction requests, per worker")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("0"),
                )
                .arg(format_arg())
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("recipe")
                .about("Extract the recipe from a single page")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The recipe page to fetch")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("file"),
                )
                .arg(
                    arg!(--"file" <PATH>)
                        .required(false)
                        .help("A saved HTML page to read instead of fetching")
                        .conflicts_with("url"),
                )
                .arg(timeout_arg())
                .arg(user_agent_arg())
                .arg(format_arg()),
        )
        .subcommand(
            command!("serve")
                .about("Serve recipe extraction over HTTP")
                .arg(
                    arg!(--"bind" <ADDR>)
                        .required(false)
                        .help("Address to listen on")
                        .value_parser(clap::value_parser!(std::net::SocketAddr))
                        .default_value("127.0.0.1:8000"),
                )
                .arg(timeout_arg())
                .arg(user_agent_arg()),
        )
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Request timeout in seconds")
        .value_parser(clap::value_parser!(u64))
        .default_value("10")
}

fn user_agent_arg() -> clap::Arg {
    arg!(--"user-agent" <AGENT>)
        .required(false)
        .help("User-Agent header to send (default: chorba's own)")
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Output format: text, json, markdown")
        .value_parser(["text", "json", "markdown"])
        .default_value("text")
}
