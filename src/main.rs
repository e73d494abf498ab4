//! Purpose: `nsq-api` CLI entry point for calling NSQ daemon HTTP APIs.
//! Role: Binary crate root; parses args, runs one request, emits JSON on stdout.
//! Invariants: Successful responses are printed as JSON (compact unless `--pretty`).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Diagnostics go to stderr via `tracing`; stdout carries only results.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use nsq_http_api::api::{
    ApiClient, DEFAULT_TIMEOUT, DeadlineMode, Error, ErrorKind, TransportConfig, endpoint,
    to_exit_code,
};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "nsq-api",
    version,
    about = "Call NSQ daemon HTTP APIs and print the decoded JSON",
    long_about = None,
    after_help = r#"EXAMPLES
  $ nsq-api stats 127.0.0.1:4151
  $ nsq-api stats 127.0.0.1:4151 --topic orders
  $ nsq-api get http://127.0.0.1:4161/topics
  $ nsq-api post 'http://127.0.0.1:4151/topic/create?topic=orders'
  $ nsq-api post 'http://127.0.0.1:4151/pub?topic=orders' --data '{"id":1}'
  $ nsq-api request DELETE 'http://127.0.0.1:4151/topic/delete?topic=orders'

Responses negotiated as `nsq; version=1.0` are printed as-is; legacy
`{"status_code","status_txt","data"}` envelopes are unwrapped to `data`.

Set RUST_LOG=debug to trace requests on stderr."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ClientArgs {
    #[arg(
        long,
        global = true,
        value_parser = parse_duration_arg,
        help = "Connect and read/write timeout (e.g. 500ms, 2s, 1m) [default: 2s]"
    )]
    timeout: Option<Duration>,
    #[arg(
        long = "connect-timeout",
        global = true,
        value_parser = parse_duration_arg,
        help = "Connect timeout; overrides --timeout for dialing"
    )]
    connect_timeout: Option<Duration>,
    #[arg(
        long,
        global = true,
        default_value = "sliding",
        value_enum,
        help = "Deadline mode: sliding (per read/write) | total (whole exchange)"
    )]
    deadline: DeadlineCli,
    #[arg(long = "tls-ca", global = true, help = "PEM CA file trusted for https endpoints")]
    tls_ca: Option<PathBuf>,
    #[arg(long = "user-agent", global = true, help = "User-Agent header value")]
    user_agent: Option<String>,
    #[arg(long, global = true, help = "Pretty-print JSON output")]
    pretty: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DeadlineCli {
    Sliding,
    Total,
}

impl From<DeadlineCli> for DeadlineMode {
    fn from(value: DeadlineCli) -> Self {
        match value {
            DeadlineCli::Sliding => DeadlineMode::Sliding,
            DeadlineCli::Total => DeadlineMode::Total,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Request(RequestCommand),
    #[command(
        about = "Generate shell completion scripts",
        after_help = r#"EXAMPLES
  $ nsq-api completion bash > ~/.local/share/bash-completion/completions/nsq-api
  $ nsq-api completion zsh > ~/.zfunc/_nsq-api
  $ nsq-api completion fish > ~/.config/fish/completions/nsq-api.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args)]
struct BodyArgs {
    #[arg(long, conflicts_with = "data_file", help = "Request body, sent as-is")]
    data: Option<String>,
    #[arg(long = "data-file", help = "Read the request body from a file (`-` for stdin)")]
    data_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RequestCommand {
    #[command(about = "GET an endpoint URL and print the decoded response")]
    Get {
        #[arg(help = "Absolute endpoint URL (http or https)")]
        endpoint: String,
    },
    #[command(about = "POST to an endpoint URL and print the decoded response")]
    Post {
        #[arg(help = "Absolute endpoint URL (http or https)")]
        endpoint: String,
        #[command(flatten)]
        body: BodyArgs,
    },
    #[command(about = "Send an arbitrary method to an endpoint URL")]
    Request {
        #[arg(help = "HTTP method (e.g. DELETE, PUT)")]
        method: String,
        #[arg(help = "Absolute endpoint URL (http or https)")]
        endpoint: String,
        #[command(flatten)]
        body: BodyArgs,
    },
    #[command(about = "Fetch /stats from an nsqd address")]
    Stats {
        #[arg(help = "nsqd HTTP address: host:port or http(s)://host:port")]
        address: String,
        #[arg(long, help = "Limit stats to one topic")]
        topic: Option<String>,
        #[arg(long, requires = "topic", help = "Limit stats to one channel of --topic")]
        channel: Option<String>,
    },
    #[command(about = "Check /ping on an nsqd or nsqlookupd address")]
    Ping {
        #[arg(help = "HTTP address: host:port or http(s)://host:port")]
        address: String,
    },
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `nsq-api --help`."));
            }
        },
    };

    init_tracing();

    match cli.command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "nsq-api", &mut io::stdout());
        }
        Command::Request(command) => {
            let client = build_client(&cli.client)?;
            let value = dispatch(command, &client)?;
            emit_json(&value, cli.client.pretty);
        }
    }
    Ok(0)
}

fn dispatch(command: RequestCommand, client: &ApiClient) -> Result<Value, Error> {
    match command {
        RequestCommand::Get { endpoint } => client.get_v1(&endpoint),
        RequestCommand::Post { endpoint, body } => {
            let payload = read_body(&body)?;
            send(client, "POST", &endpoint, payload.as_deref())
        }
        RequestCommand::Request {
            method,
            endpoint,
            body,
        } => {
            let payload = read_body(&body)?;
            let method = method.to_ascii_uppercase();
            send(client, &method, &endpoint, payload.as_deref())
        }
        RequestCommand::Stats {
            address,
            topic,
            channel,
        } => {
            let mut query = vec![("format", "json")];
            if let Some(topic) = topic.as_deref() {
                query.push(("topic", topic));
            }
            if let Some(channel) = channel.as_deref() {
                query.push(("channel", channel));
            }
            let url = endpoint(&address, "/stats", &query)?;
            client.get_v1(url.as_str())
        }
        RequestCommand::Ping { address } => {
            let url = endpoint(&address, "/ping", &[])?;
            let text = client.request_text("GET", url.as_str(), None)?;
            Ok(json!({"address": address, "status": text.trim()}))
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn build_client(cli: &ClientArgs) -> Result<ApiClient, Error> {
    let timeout = cli.timeout.unwrap_or(DEFAULT_TIMEOUT);
    let mut config = TransportConfig::new()
        .with_timeout(timeout)
        .with_deadline(cli.deadline.into());
    if let Some(connect_timeout) = cli.connect_timeout {
        config = config.with_connect_timeout(connect_timeout);
    }
    if let Some(path) = &cli.tls_ca {
        config = config.with_tls_ca_file(path)?;
    }
    let mut client = ApiClient::new(config);
    if let Some(user_agent) = &cli.user_agent {
        client = client.with_user_agent(user_agent.clone());
    }
    Ok(client)
}

fn send(
    client: &ApiClient,
    method: &str,
    endpoint: &str,
    payload: Option<&[u8]>,
) -> Result<Value, Error> {
    match payload {
        Some(mut bytes) => client.request_v1(method, endpoint, Some(&mut bytes)),
        None => client.request_v1(method, endpoint, None),
    }
}

fn read_body(args: &BodyArgs) -> Result<Option<Vec<u8>>, Error> {
    if let Some(data) = &args.data {
        return Ok(Some(data.clone().into_bytes()));
    }
    let Some(path) = &args.data_file else {
        return Ok(None);
    };
    let mut bytes = Vec::new();
    if path == Path::new("-") {
        io::stdin().lock().read_to_end(&mut bytes).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to read request body from stdin")
                .with_source(err)
        })?;
    } else {
        bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("failed to read request body {}", path.display()))
                .with_source(err)
        })?;
    }
    Ok(Some(bytes))
}

fn emit_json(value: &Value, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Transport => "request failed".to_string(),
        ErrorKind::Timeout => "request timed out".to_string(),
        ErrorKind::Status => "unexpected response status".to_string(),
        ErrorKind::Decode => "invalid response json".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = StdError::source(err);
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(body) = err.body() {
        inner.insert("body".to_string(), json!(body));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(url) = err.url() {
        lines.push(format!("url: {url}"));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    if let Some(body) = err.body().filter(|body| !body.is_empty()) {
        lines.push(format!("body: {body}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn parse_duration_arg(input: &str) -> Result<Duration, String> {
    parse_duration(input).map_err(|err| error_message(&err))
}

fn parse_duration(input: &str) -> Result<Duration, Error> {
    let invalid = || {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid duration {input:?}"))
            .with_hint("Use a number plus ms|s|m (e.g. 2s).")
    };
    let trimmed = input.trim();
    let split = trimmed.char_indices().find(|(_, ch)| !ch.is_ascii_digit());
    let (num_str, unit) = match split {
        Some((idx, _)) => trimmed.split_at(idx),
        None => return Err(invalid()),
    };
    let value: u64 = num_str.parse().map_err(|_| invalid())?;
    let millis = match unit {
        "ms" => value,
        "s" => value.saturating_mul(1_000),
        "m" => value.saturating_mul(60_000),
        _ => return Err(invalid()),
    };
    if millis == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(millis))
}
