//! replywire CLI
//!
//! Renders replies with the real builders and writes the wire bytes to
//! stdout. Handy for eyeballing protocol output:
//!
//! ```text
//! replywire-cli --resp3 double 1.5
//! replywire-cli --protocol memcache mget a=1 b c=3
//! replywire-cli command SET key value
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use replywire::reply::{CollectionType, ErrorKind, GetResp, MGetResponse};
use replywire::{Config, MCReplyBuilder, RedisReplyBuilder, ReplyBuilder, ReplyError, ReqSerializer};
use tracing_subscriber::{fmt, EnvFilter};

/// replywire CLI
#[derive(Parser, Debug)]
#[command(name = "replywire-cli")]
#[command(about = "Render Redis/Memcached replies to stdout")]
#[command(version)]
struct Args {
    /// Wire protocol to render
    #[arg(short, long, value_enum, default_value = "redis")]
    protocol: Protocol,

    /// Use RESP3 instead of RESP2 (redis only)
    #[arg(long)]
    resp3: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Protocol {
    Redis,
    Memcache,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Generic,
    Syntax,
    WrongType,
    NotFound,
    OutOfRange,
    Server,
}

impl From<Kind> for ErrorKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Generic => ErrorKind::Generic,
            Kind::Syntax => ErrorKind::Syntax,
            Kind::WrongType => ErrorKind::WrongType,
            Kind::NotFound => ErrorKind::NotFound,
            Kind::OutOfRange => ErrorKind::OutOfRange,
            Kind::Server => ErrorKind::Server,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Integer reply
    Long { value: i64 },

    /// Double reply (redis only)
    Double { value: f64 },

    /// Error reply
    Error {
        message: String,

        #[arg(short, long, value_enum, default_value = "generic")]
        kind: Kind,
    },

    /// Multi-get reply; `key=value` is a hit, a bare `key` a miss
    Mget {
        entries: Vec<String>,

        /// Copy values into the response arena instead of referencing them
        #[arg(long)]
        copy: bool,
    },

    /// Member/score array, `member=score` (redis only)
    Scored {
        pairs: Vec<String>,

        #[arg(long)]
        with_scores: bool,
    },

    /// Array of bulk strings (redis only)
    Array { items: Vec<String> },

    /// Outbound request
    Command {
        name: String,
        args: Vec<String>,

        /// Inline form instead of a multi-bulk array
        #[arg(long)]
        inline: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,replywire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> replywire::Result<()> {
    let config = Arc::new(Config::builder().resp3(args.resp3).build()?);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Commands::Command { name, args: cmd_args, inline } = &args.command {
        let mut serializer = ReqSerializer::new(&mut out);
        if *inline {
            let mut line = name.clone();
            for arg in cmd_args {
                line.push(' ');
                line.push_str(arg);
            }
            serializer.send_command(&line)?;
        } else {
            serializer.send_command_args(name, cmd_args)?;
        }
        return Ok(());
    }

    match args.protocol {
        Protocol::Redis => {
            let mut rb = RedisReplyBuilder::with_config(&mut out, config);
            render_redis(&mut rb, &args.command)?;
            finish(&rb)?;
        }
        Protocol::Memcache => {
            let mut rb = MCReplyBuilder::with_config(&mut out, config);
            render_common(&mut rb, &args.command)?;
            finish(&rb)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn finish<B: ReplyBuilder>(rb: &B) -> replywire::Result<()> {
    match rb.error() {
        Some(e) => Err(ReplyError::Io(io::Error::new(e.kind(), e.to_string()))),
        None => Ok(()),
    }
}

fn render_redis<W: Write>(
    rb: &mut RedisReplyBuilder<W>,
    command: &Commands,
) -> replywire::Result<()> {
    match command {
        Commands::Double { value } => rb.send_double(*value),
        Commands::Scored { pairs, with_scores } => {
            let scored = pairs
                .iter()
                .map(|p| parse_pair(p))
                .collect::<replywire::Result<Vec<_>>>()?;
            rb.send_scored_array(&scored, *with_scores);
        }
        Commands::Array { items } => rb.send_string_arr(items, CollectionType::Array),
        other => render_common(rb, other)?,
    }
    Ok(())
}

fn render_common<B: ReplyBuilder>(rb: &mut B, command: &Commands) -> replywire::Result<()> {
    match command {
        Commands::Long { value } => rb.send_long(*value),
        Commands::Error { message, kind } => rb.send_error(message, &ErrorKind::from(*kind)),
        Commands::Mget { entries, copy } => rb.send_mget_response(build_mget(entries, *copy)),
        other => {
            return Err(ReplyError::Protocol(format!(
                "{:?} is not supported by this protocol",
                other
            )))
        }
    }
    Ok(())
}

fn build_mget(entries: &[String], copy: bool) -> MGetResponse<'_> {
    let mut resp = MGetResponse::with_len(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        if let Some((key, value)) = entry.split_once('=') {
            let value = if copy {
                resp.copy_value(value.as_bytes())
            } else {
                value.into()
            };
            resp.set(i, GetResp::new(key, value));
        }
    }
    resp
}

fn parse_pair(pair: &str) -> replywire::Result<(&str, f64)> {
    let (member, score) = pair
        .split_once('=')
        .ok_or_else(|| ReplyError::Protocol(format!("expected member=score, got {}", pair)))?;
    let score = score
        .parse::<f64>()
        .map_err(|e| ReplyError::Protocol(format!("invalid score {}: {}", score, e)))?;
    Ok((member, score))
}
