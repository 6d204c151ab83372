use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use mirrordom_core::cli::{Cli, Command, MarkupArgs, ReplayArgs};
use mirrordom_core::config::Config;
use mirrordom_core::markup::{self, ContentType};
use mirrordom_core::mirror::Viewer;
use mirrordom_core::model::FramePath;
use mirrordom_core::protocol::{UpdateBatch, UpdateRequest};
use mirrordom_core::session::{SessionConfig, SessionRegistry};
use mirrordom_core::telemetry::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    logging::init(&cli.logging.to_config(&config)).context("failed to initialise logging")?;
    let pretty = cli.pretty || config.pretty;

    match cli.command {
        Command::Parse(args) => parse(&args, pretty),
        Command::Sanitize(args) => sanitize(&args),
        Command::Replay(args) => replay(&args, pretty),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn parse(args: &MarkupArgs, pretty: bool) -> Result<()> {
    let input = read_input(&args.input)?;
    let root = markup::parse_with(&input, ContentType::from(args.content_type))
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    print_json(&root, pretty)
}

fn sanitize(args: &MarkupArgs) -> Result<()> {
    let input = read_input(&args.input)?;
    let clean = markup::sanitize(&input, ContentType::from(args.content_type))
        .with_context(|| format!("failed to sanitize {}", args.input.display()))?;
    println!("{clean}");
    Ok(())
}

fn replay(args: &ReplayArgs, pretty: bool) -> Result<()> {
    let script = read_input(&args.script)?;
    let batches: Vec<UpdateBatch> =
        serde_json::from_str(&script).context("update script must be a JSON array of batches")?;

    let registry = SessionRegistry::new(SessionConfig::default());
    let (session_id, session) = registry.create()?;
    info!(session = %session_id, batches = batches.len(), "replaying update script");
    for batch in batches {
        let last = session.submit_update(batch);
        debug!(change_id = last, "batch applied");
    }

    let response = session.get_update(&UpdateRequest {
        since: args.since,
        init_required: args.init_required,
    });
    print_json(&response, pretty)?;

    if args.render {
        let mut viewer = Viewer::new();
        viewer.apply(&session.get_update(&viewer.next_request()))?;
        let main = FramePath::main();
        match viewer.render(&main) {
            Some(markup) => println!("{markup}"),
            None => match viewer.error(&main) {
                Some(error) => bail!("main frame is in a bad state: {error}"),
                None => bail!("no main frame after replay"),
            },
        }
    }

    registry.end(&session_id);
    Ok(())
}
