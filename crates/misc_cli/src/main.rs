//! Single-request driver for the misc store.
//!
//! # Responsibility
//! - Open the store configured by `MISC_*` variables, handle one request
//!   (topic argument, JSON payload on stdin) and print every published
//!   message as `<topic> <payload>`.
//! - Exit non-zero when the reply status is `error` or the request cannot
//!   be handled at all.
//!
//! # Invariants
//! - An unknown topic is rejected before stdin is read or the database is
//!   opened.

use clap::Parser;
use log::error;
use misc_core::{
    init_logging, open_db, ActionError, ActionHandler, MiscConfig, Publisher, ReplyStatus,
    SqliteDocumentStore, TopicScheme, VersionedStore,
};
use std::io::Read;
use std::process::ExitCode;

/// Runs one misc-service request read from stdin.
#[derive(Parser, Debug)]
#[command(name = "misc_cli", version)]
struct Cli {
    /// Request topic, e.g. `misc/categories/save/request`.
    topic: String,
}

struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn publish(&self, topic: &str, payload: &str) {
        println!("{topic} {payload}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli.topic) {
        Ok(ReplyStatus::Ok) => ExitCode::SUCCESS,
        Ok(ReplyStatus::Error) => ExitCode::FAILURE,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("misc_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(topic: &str) -> Result<ReplyStatus, String> {
    let config = MiscConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(config.log_level, log_dir).map_err(|err| err.to_string())?;
    }

    let topics = TopicScheme::new(config.topic_prefix);
    ensure_request_topic(&topics, topic)?;

    let mut payload = String::new();
    std::io::stdin()
        .read_to_string(&mut payload)
        .map_err(|err| format!("cannot read request from stdin: {err}"))?;

    let conn = open_db(&config.db_path).map_err(|err| {
        format!("cannot open store `{}`: {err}", config.db_path.display())
    })?;
    let store = SqliteDocumentStore::try_new(&conn).map_err(|err| err.to_string())?;
    let handler = ActionHandler::new(VersionedStore::new(store), StdoutPublisher, topics);

    handler
        .handle(topic, &payload)
        .map_err(|err| err.to_string())
}

fn ensure_request_topic(topics: &TopicScheme, topic: &str) -> Result<(), String> {
    match topics.parse_request(topic) {
        Some(_) => Ok(()),
        None => Err(ActionError::UnknownTopic(topic.trim().to_string()).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_request_topic, Cli};
    use misc_core::TopicScheme;
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn help_and_version_are_flags_not_topics() {
        let err = Cli::try_parse_from(["misc_cli", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let err = Cli::try_parse_from(["misc_cli", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        assert!(Cli::try_parse_from(["misc_cli"]).is_err());
    }

    #[test]
    fn topic_is_positional() {
        let cli = Cli::try_parse_from(["misc_cli", "misc/states/get/request"]).unwrap();
        assert_eq!(cli.topic, "misc/states/get/request");
    }

    #[test]
    fn unknown_and_flag_like_topics_are_rejected() {
        let topics = TopicScheme::default();
        ensure_request_topic(&topics, "misc/states/get/request").unwrap();

        for topic in ["misc/widgets/save/request", "--help", "misc/states/get/reply"] {
            let err = ensure_request_topic(&topics, topic).unwrap_err();
            assert!(err.contains("unknown request topic"), "{topic}");
        }
    }
}
