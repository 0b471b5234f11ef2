//! Command-line runner: spawn a program and script it with expect/send steps.
//!
//! ```text
//! ptyexpect --timeout 5 "python3 -i" 'exact:>>>' 'line:print(3 * 7)' 'exact:21' 'line:exit()' eof
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use ptyexpect::{CallGuard, Pattern, Session};
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ptyexpect")]
#[command(author, version, about = "Drive an interactive program with expect/send steps", long_about = None)]
struct Args {
    /// Command to spawn, split with shell quoting rules
    command: String,

    /// Steps to run in order: expect:<regex>, exact:<text>, send:<text>,
    /// line:<text>, read, eof
    steps: Vec<Step>,

    /// Timeout for each expect step in seconds (default: derived from --limit)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Hard limit for the whole run in seconds
    #[arg(short, long, default_value_t = ptyexpect::guard::DEFAULT_LIMIT_SECS)]
    limit: u64,

    /// Log engine activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone)]
enum Step {
    Expect(Pattern),
    Send(String),
    SendLine(String),
    Read,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eof" => return Ok(Step::Expect(Pattern::Eof)),
            "read" => return Ok(Step::Read),
            _ => {}
        }

        let (kind, arg) = s
            .split_once(':')
            .ok_or_else(|| format!("unknown step {s:?}"))?;
        match kind {
            "expect" => Pattern::regex(arg)
                .map(Step::Expect)
                .map_err(|e| e.to_string()),
            "exact" => Ok(Step::Expect(Pattern::exact(arg))),
            "send" => Ok(Step::Send(unescape(arg))),
            "line" => Ok(Step::SendLine(unescape(arg))),
            _ => Err(format!("unknown step kind {kind:?}")),
        }
    }
}

/// Expand `\n`, `\r`, `\t`, `\\` and `\xNN` so control keys can be sent.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) if byte.is_ascii() => out.push(byte as char),
                    _ => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

async fn run_steps(session: &Session, steps: &[Step]) -> Result<(), ptyexpect::ExpectError> {
    let mut stdout = std::io::stdout();
    for step in steps {
        match step {
            Step::Expect(pattern) => {
                let result = session.expect(pattern.clone()).await?;
                print!("{}{}", result.before, result.matched);
            }
            Step::Send(text) => session.send(text.as_bytes()).await?,
            Step::SendLine(text) => session.send_line(text).await?,
            Step::Read => print!("{}", session.read(None).await?),
        }
        stdout.flush()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let guard = CallGuard::new(Duration::from_secs(args.limit));
    let timeout = match args.timeout {
        Some(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
        Some(secs) => bail!("invalid timeout: {secs}"),
        None => guard.expect_budget(),
    };

    let session = Session::builder()
        .timeout(timeout)
        .spawn(&args.command)
        .with_context(|| format!("failed to spawn {:?}", args.command))?;

    let outcome = guard.interrupt(run_steps(&session, &args.steps)).await;
    session.close().await.context("failed to close session")?;
    outcome.context("step failed")?;

    Ok(())
}
