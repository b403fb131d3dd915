//! `wsproxy` command line: one `select(service).invoke(operation, payload)` call.
//!
//! Exits 0 and prints the result on success. On failure prints the last
//! dispatcher error to stderr and exits 1.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wsproxy_client::{ProxyConfig, ServiceProxy};
use wsproxy_core::{Credentials, PasswordMode};

#[derive(Parser, Debug)]
#[command(
    name = "wsproxy",
    version,
    about = "Invoke a SOAP operation by service name",
    long_about = None
)]
struct Args {
    /// Registry name of the service, e.g. `KiasSVC`
    service: String,

    /// Remote operation name
    operation: String,

    /// Operation arguments as JSON
    payload: Option<String>,

    /// JSON registry file (defaults to the built-in table)
    #[arg(long, env = "WSPROXY_REGISTRY")]
    registry: Option<PathBuf>,

    #[arg(short, long, env = "WSPROXY_USERNAME", default_value = "")]
    username: String,

    #[arg(short, long, env = "WSPROXY_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Seconds added to the local clock for the token `Created` stamp
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    clock_offset: i64,

    /// Send the password in clear text instead of a digest
    #[arg(long)]
    text_password: bool,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_payload(raw: Option<&str>) -> Result<Value> {
    raw.map_or(Ok(Value::Null), |text| {
        serde_json::from_str(text).context("payload is not valid JSON")
    })
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.log_json);

    let payload = parse_payload(args.payload.as_deref())?;
    let config = ProxyConfig {
        credentials: Credentials::new(args.username, args.password, args.clock_offset),
        password_mode: if args.text_password {
            PasswordMode::Text
        } else {
            PasswordMode::Digest
        },
        request_timeout: Duration::from_secs(args.timeout_secs),
        registry_path: args.registry,
        ..ProxyConfig::default()
    };
    let mut proxy = ServiceProxy::from_config(&config).context("failed to build dispatcher")?;

    match proxy.select(&args.service).invoke(&args.operation, payload) {
        Some(Value::String(body)) => println!("{body}"),
        Some(other) => println!("{other}"),
        None => {
            eprintln!("{}", proxy.last_error_message().unwrap_or("call failed"));
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_negative_offset_and_payload() {
        let args = Args::try_parse_from([
            "wsproxy",
            "--clock-offset",
            "-80",
            "--text-password",
            "KiasSVC",
            "GetDictiList",
            r#"{"id": 1}"#,
        ])
        .unwrap();
        assert_eq!(args.clock_offset, -80);
        assert!(args.text_password);
        assert_eq!(args.service, "KiasSVC");
        assert_eq!(args.operation, "GetDictiList");
        assert_eq!(parse_payload(args.payload.as_deref()).unwrap()["id"], 1);
    }

    #[test]
    fn missing_payload_is_null() {
        assert_eq!(parse_payload(None).unwrap(), Value::Null);
        assert!(parse_payload(Some("{oops")).is_err());
    }

    #[test]
    fn operation_is_required() {
        assert!(Args::try_parse_from(["wsproxy", "KiasSVC"]).is_err());
    }
}
