use crate::CLAP_STYLING;
use webprobe::handlers::parse_seconds;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("webprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("webprobe")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and informational logs")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "Log every request and probe decision")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Crawl a site from a start URL, then probe every discovered URL \
                parameter and form with the selected vulnerability modules.",
                )
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("Absolute http(s) start URL, e.g. http://example.com/"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link hops from the start URL")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"scope" <PATTERN>)
                        .required(false)
                        .help("Only crawl URLs matching this regex (case-sensitive)"),
                )
                .arg(
                    arg!(--"exclude" <PATTERN>)
                        .required(false)
                        .help("Skip URLs matching this regex (case-sensitive)"),
                )
                .arg(
                    arg!(--"delay" <SECONDS>)
                        .required(false)
                        .help("Minimum delay between requests in seconds")
                        .value_parser(parse_seconds)
                        .default_value("0"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(parse_seconds)
                        .default_value("10"),
                )
                .arg(
                    arg!(--"user-agent" <UA>)
                        .required(false)
                        .help("Custom User-Agent header"),
                )
                .arg(
                    arg!(-m --"modules" <LIST>)
                        .required(false)
                        .help("Comma-separated module ids, or 'all' (see `webprobe modules`)")
                        .default_value("all"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Concurrent requests while crawling and while probing")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(--"verify-url" <URL>)
                        .required(false)
                        .help("Page to re-read after submitting stored XSS payloads"),
                )
                .arg(
                    arg!(--"payloads" <DIR>)
                        .required(false)
                        .help(
                            "Directory with sql.txt, sql_blind.txt, xss.txt, nosql.txt, \
                        nosql_blind.txt and rce.txt (default: built-in payloads)",
                        ),
                )
                .arg(
                    arg!(--"length-threshold" <BYTES>)
                        .required(false)
                        .help("Minimum body length difference for boolean-based findings")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50"),
                )
                .arg(
                    arg!(--"timing-baseline")
                        .required(false)
                        .help("Subtract the unmodified request time before judging time-based probes")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, html")
                        .value_parser(["text", "json", "csv", "html"])
                        .default_value("text"),
                ),
        )
        .subcommand(command!("modules").about("List the available vulnerability modules"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_scan_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["webprobe", "scan", "http://example.com/"])
            .unwrap();
        let (name, scan) = matches.subcommand().unwrap();
        assert_eq!(name, "scan");
        assert_eq!(scan.get_one::<usize>("depth"), Some(&1));
        assert_eq!(scan.get_one::<Duration>("timeout"), Some(&Duration::from_secs(10)));
        assert_eq!(scan.get_one::<String>("modules").map(String::as_str), Some("all"));
        assert_eq!(scan.get_one::<String>("format").map(String::as_str), Some("text"));
        assert!(!scan.get_flag("timing-baseline"));
    }

    #[test]
    fn test_rejects_negative_delay_and_unknown_format() {
        let cmd = command_argument_builder();
        assert!(
            cmd.clone()
                .try_get_matches_from(["webprobe", "scan", "http://x/", "--delay", "-1"])
                .is_err()
        );
        assert!(
            cmd.try_get_matches_from(["webprobe", "scan", "http://x/", "-f", "pdf"])
                .is_err()
        );
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let result = command_argument_builder().try_get_matches_from([
            "webprobe",
            "scan",
            "http://x/",
            "-q",
            "-v",
        ]);
        assert!(result.is_err());
    }
}
