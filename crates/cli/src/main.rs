//! urlttl command-line entry point.
//!
//! Fetches URLs through the policy session, sweeps expired responses, or
//! clears the cache. Logging goes to stderr as JSON so stdout carries only
//! command output.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use urlttl_client::{PolicySession, SessionResponse};
use urlttl_core::{AppConfig, ExpireAfter};

/// HTTP response cache with per-URL expiry.
#[derive(Parser, Debug)]
#[command(name = "urlttl")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file (overrides URLTTL_CONFIG_FILE)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Register a TTL for a URL or cache key before running the command.
    /// TTL is seconds, `default`, or `never`. Repeatable. Registrations last
    /// for one run only, so the first request for a registered URL in each
    /// run refetches it.
    #[arg(long = "register", value_name = "URL=TTL", value_parser = parse_registration, global = true)]
    registrations: Vec<(String, ExpireAfter)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GET each URL through the cache and report hits and misses.
    ///
    /// Cached responses persist between runs but TTL registrations do not:
    /// a non-default `--expire-after` or a `--register` counts as a new
    /// registration in every run and refetches the URL once.
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,

        /// TTL override for these requests: seconds, `default`, or `never`
        #[arg(long, value_parser = parse_ttl, default_value = "default")]
        expire_after: ExpireAfter,

        /// Request each URL this many times
        #[arg(long, default_value_t = 1)]
        repeat: u32,

        /// Print one JSON object per request
        #[arg(long)]
        json: bool,
    },

    /// Delete responses past their effective expiry
    Sweep,

    /// Delete every cached response
    Clear,
}

#[derive(Debug, Serialize)]
struct FetchLine<'a> {
    url: &'a str,
    from_cache: bool,
    status: u16,
    bytes: usize,
    expire_after: String,
    cache_key: &'a str,
}

impl<'a> From<&'a SessionResponse> for FetchLine<'a> {
    fn from(r: &'a SessionResponse) -> Self {
        Self {
            url: &r.response.url,
            from_cache: r.from_cache,
            status: r.response.status_code,
            bytes: r.response.body.len(),
            expire_after: r.expire_after.to_string(),
            cache_key: &r.cache_key,
        }
    }
}

fn parse_ttl(s: &str) -> Result<ExpireAfter, String> {
    s.parse().map_err(|e: urlttl_core::Error| e.to_string())
}

/// Split `URL=TTL` on the last `=`, so query strings survive.
fn parse_registration(s: &str) -> Result<(String, ExpireAfter), String> {
    let (url, ttl) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected URL=TTL, got {s:?}"))?;
    if url.trim().is_empty() {
        return Err(format!("missing URL in {s:?}"));
    }
    Ok((url.trim().to_string(), parse_ttl(ttl)?))
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(Some(path)),
        None => AppConfig::load(),
    }
    .context("loading configuration")?;

    let session = PolicySession::from_config(&config)
        .await
        .context("opening response cache")?;

    for (url, ttl) in &cli.registrations {
        session
            .register_url(url, *ttl)
            .await
            .with_context(|| format!("registering {url}"))?;
    }

    match cli.command {
        Command::Fetch { urls, expire_after, repeat, json } => {
            for _ in 0..repeat {
                for url in &urls {
                    let response = session
                        .get(url, expire_after)
                        .await
                        .with_context(|| format!("fetching {url}"))?;
                    let line = FetchLine::from(&response);
                    if json {
                        println!("{}", serde_json::to_string(&line)?);
                    } else {
                        println!(
                            "{} {} status={} bytes={} ttl={}",
                            line.url,
                            if line.from_cache { "hit" } else { "miss" },
                            line.status,
                            line.bytes,
                            line.expire_after
                        );
                    }
                }
            }
        }
        Command::Sweep => {
            let removed = session.remove_expired_responses().await?;
            println!("removed {removed} expired responses");
        }
        Command::Clear => {
            let removed = session.clear().await?;
            println!("removed {removed} responses");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, registrations = cli.registrations.len(), "starting urlttl");

    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registration_keeps_query() {
        let (url, ttl) = parse_registration("https://example.com/?a=1=30").unwrap();
        assert_eq!(url, "https://example.com/?a=1");
        assert_eq!(ttl, ExpireAfter::seconds(30));
    }

    #[test]
    fn test_parse_registration_rejects() {
        assert!(parse_registration("https://example.com/").is_err());
        assert!(parse_registration("=5").is_err());
        assert!(parse_registration("https://example.com/=soon").is_err());
    }

    #[test]
    fn test_cli_fetch_defaults() {
        let cli = Cli::try_parse_from(["urlttl", "fetch", "https://httpbin.org/get"]).unwrap();
        match cli.command {
            Command::Fetch { urls, expire_after, repeat, json } => {
                assert_eq!(urls, vec!["https://httpbin.org/get".to_string()]);
                assert_eq!(expire_after, ExpireAfter::Default);
                assert_eq!(repeat, 1);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_global_registrations() {
        let cli = Cli::try_parse_from([
            "urlttl",
            "sweep",
            "--register",
            "https://httpbin.org/get=never",
            "--register",
            "https://httpbin.org/anything=-1",
        ])
        .unwrap();
        assert_eq!(cli.registrations.len(), 2);
        assert_eq!(cli.registrations[0].1, ExpireAfter::Never);
        assert_eq!(cli.registrations[1].1, ExpireAfter::seconds(-1));
    }

    #[test]
    fn test_cli_rejects_bad_ttl() {
        assert!(Cli::try_parse_from(["urlttl", "fetch", "--expire-after", "later", "https://x"]).is_err());
    }

    #[test]
    fn test_fetch_line_json() {
        let response = SessionResponse {
            response: urlttl_core::CachedResponse {
                method: "GET".into(),
                url: "https://httpbin.org/get".into(),
                final_url: "https://httpbin.org/get".into(),
                status_code: 200,
                content_type: None,
                headers: Vec::new(),
                body: b"{}".to_vec(),
            },
            from_cache: true,
            cache_key: "k".into(),
            expire_after: ExpireAfter::seconds(5),
        };
        let json = serde_json::to_value(FetchLine::from(&response)).unwrap();
        assert_eq!(json["from_cache"], true);
        assert_eq!(json["bytes"], 2);
        assert_eq!(json["expire_after"], "5s");
    }
}
