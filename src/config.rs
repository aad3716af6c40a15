use crate::{
    api::DEFAULT_API_URL,
    view_state::StalePolicy,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::path::PathBuf;

pub const API_URL_ENV: &str = "CLAIMBOARD_API_URL";
pub const DEFAULT_LOG_DIR: &str = "~/.claimboard/logs";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub api_url: String,
    pub log_dir: PathBuf,
    pub stale_policy: StalePolicy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Run(AppConfig),
    Help,
}

pub fn usage() -> String {
    format!(
        "Usage: claimboard [--api-url <url>] [--log-dir <path>] [--discard-stale]\n\
         \n\
         Flags:\n\
           --api-url <url>   Base address of the points API (default {DEFAULT_API_URL},\n\
                             or ${API_URL_ENV} when set)\n\
           --log-dir <path>  Directory for the log file (default {DEFAULT_LOG_DIR})\n\
           --discard-stale   Ignore read responses older than the one already shown"
    )
}

/// Parses the arguments after the program name. `env_api_url` is the value of
/// [`API_URL_ENV`], used when `--api-url` is absent.
pub fn parse_args(
    args: impl IntoIterator<Item = String>,
    env_api_url: Option<String>,
) -> Result<Command> {
    let mut args = args.into_iter();
    let mut api_url: Option<String> = None;
    let mut log_dir: Option<String> = None;
    let mut stale_policy = StalePolicy::LastWriteWins;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--api-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--api-url requires a URL argument"))?;
                if api_url.is_some() {
                    return Err(eyre!("--api-url may only be specified once"));
                }
                api_url = Some(url);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(dir);
            }
            "--discard-stale" => stale_policy = StalePolicy::DiscardStale,
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let api_url = api_url
        .or(env_api_url.filter(|url| !url.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = api_url.trim_end_matches('/').to_string();
    if api_url.is_empty() {
        return Err(eyre!("API URL must not be empty"));
    }
    let log_dir = resolve_log_dir(log_dir.as_deref().unwrap_or(DEFAULT_LOG_DIR));

    Ok(Command::Run(AppConfig {
        api_url,
        log_dir,
        stale_policy,
    }))
}

fn resolve_log_dir(raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    PathBuf::from(expanded.into_owned())
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parse_args__defaults_without_flags() {
        // when
        let command = parse_args(args(&[]), None).unwrap();

        // then
        let Command::Run(config) = command else {
            panic!("expected run command, got {command:?}");
        };
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.stale_policy, StalePolicy::LastWriteWins);
        assert!(config.log_dir.ends_with(".claimboard/logs"));
    }

    #[test]
    fn parse_args__flag_overrides_environment() {
        // given
        let env = Some("http://env:5000".to_string());

        // when
        let command = parse_args(
            args(&["--api-url", "http://flag:8080/", "--discard-stale"]),
            env,
        )
        .unwrap();

        // then
        let Command::Run(config) = command else {
            panic!("expected run command, got {command:?}");
        };
        assert_eq!(config.api_url, "http://flag:8080");
        assert_eq!(config.stale_policy, StalePolicy::DiscardStale);
    }

    #[test]
    fn parse_args__uses_environment_when_flag_absent() {
        let command = parse_args(args(&[]), Some("http://env:5000".to_string())).unwrap();
        let Command::Run(config) = command else {
            panic!("expected run command, got {command:?}");
        };
        assert_eq!(config.api_url, "http://env:5000");
    }

    #[test]
    fn parse_args__rejects_unknown_and_repeated_flags() {
        assert!(parse_args(args(&["--verbose"]), None).is_err());
        assert!(parse_args(args(&["--api-url", "a", "--api-url", "b"]), None).is_err());
        assert!(parse_args(args(&["--log-dir"]), None).is_err());
    }

    #[test]
    fn parse_args__help_short_circuits() {
        let command = parse_args(args(&["-h", "--bogus"]), None).unwrap();
        assert_eq!(command, Command::Help);
    }
}
