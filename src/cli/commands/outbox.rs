use clap::{Arg, ArgMatches, Command};

pub const ARG_POLL_SECONDS: &str = "email-outbox-poll-seconds";
pub const ARG_BATCH_SIZE: &str = "email-outbox-batch-size";
pub const ARG_MAX_ATTEMPTS: &str = "email-outbox-max-attempts";
pub const ARG_BACKOFF_BASE_SECONDS: &str = "email-outbox-backoff-base-seconds";
pub const ARG_BACKOFF_MAX_SECONDS: &str = "email-outbox-backoff-max-seconds";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub poll_seconds: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            poll_seconds: matches.get_one::<u64>(ARG_POLL_SECONDS).copied().unwrap_or(5),
            batch_size: matches.get_one::<usize>(ARG_BATCH_SIZE).copied().unwrap_or(10),
            max_attempts: matches.get_one::<u32>(ARG_MAX_ATTEMPTS).copied().unwrap_or(5),
            backoff_base_seconds: matches
                .get_one::<u64>(ARG_BACKOFF_BASE_SECONDS)
                .copied()
                .unwrap_or(5),
            backoff_max_seconds: matches
                .get_one::<u64>(ARG_BACKOFF_MAX_SECONDS)
                .copied()
                .unwrap_or(300),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_POLL_SECONDS)
                .long(ARG_POLL_SECONDS)
                .help("Email outbox poll interval in seconds")
                .env("CARELINK_EMAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_BATCH_SIZE)
                .long(ARG_BATCH_SIZE)
                .help("Email outbox batch size per poll")
                .env("CARELINK_EMAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Max attempts before marking an email as failed")
                .env("CARELINK_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_BACKOFF_BASE_SECONDS)
                .long(ARG_BACKOFF_BASE_SECONDS)
                .help("Base delay for email outbox retry backoff")
                .env("CARELINK_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_BACKOFF_MAX_SECONDS)
                .long(ARG_BACKOFF_MAX_SECONDS)
                .help("Max delay for email outbox retry backoff")
                .env("CARELINK_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_overrides() {
        let matches = with_args(Command::new("carelink")).get_matches_from(vec![
            "carelink",
            "--email-outbox-batch-size",
            "50",
            "--email-outbox-backoff-max-seconds",
            "60",
        ]);
        let options = Options::parse(&matches);
        assert_eq!(options.poll_seconds, 5);
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.backoff_base_seconds, 5);
        assert_eq!(options.backoff_max_seconds, 60);
    }
}
