//! MathLine: a textual interface to a symbolic-computation kernel.
//!
//! Run with: mathline --linkname "math -mathlink"

mod args;
mod images;
mod input;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mathline_core::{LineEditing, Link};
use mathline_session::{ExitReason, LineReader, Repl, Session};
use mathline_transport::ProcessLink;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    args::Args,
    images::ImageSink,
    input::{EditorReader, PlainReader},
};

const BANNER: &str = "MathLine: A free and open source textual interface to Mathematica.";
/// Evaluated by `--check` to prove the kernel answers.
const CHECK_INPUT: &str = "1+2";
const LOG_ENV: &str = "MATHLINE_LOG";

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| fallback.into()))
        .init();
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    println!("{BANNER}");

    let config = args.session_config()?;
    let link_name = config.link.name.clone();
    let line_editing = config.line_editing;
    let max_history = config.max_history;

    let mut session = match Session::open(config, std::io::stdout(), ProcessLink::open) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            eprintln!(
                "Could not connect to Mathematica. Check that {link_name} works from a command line."
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    let version = session
        .kernel_version()
        .context("failed to query the kernel version")?;
    tracing::info!(%version, "connected to kernel");
    println!("Mathematica {version}\n");

    if args.check {
        println!("{}{CHECK_INPUT}", session.kernel_prompt());
        let result = session
            .evaluated(CHECK_INPUT)
            .context("kernel did not evaluate the check input")?;
        println!("{result}");
        return Ok(ExitCode::SUCCESS);
    }

    let mut images = ImageSink::new(args.image_dir.clone()).context("cannot use image directory")?;
    let reason = match line_editing {
        LineEditing::Editor => {
            let mut reader = EditorReader::new(max_history).context("cannot start line editor")?;
            let reason = repl(&mut session, &mut reader, &mut images);
            reader.save_history();
            reason
        }
        LineEditing::Plain => repl(&mut session, PlainReader::stdio(), &mut images),
    };
    session.disconnect();

    match reason {
        ExitReason::Quit | ExitReason::EndOfInput => Ok(ExitCode::SUCCESS),
        ExitReason::Input(err) => Err(err).context("failed to read input"),
        ExitReason::Failed(_) => Ok(ExitCode::FAILURE),
    }
}

fn repl<L: Link, R: LineReader>(
    session: &mut Session<L>,
    reader: R,
    images: &mut ImageSink,
) -> ExitReason {
    let reason = Repl::new(session).run(reader, |session| images.collect(session));
    tracing::debug!(?reason, images = images.received(), "session loop finished");
    reason
}
