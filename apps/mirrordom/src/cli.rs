use clap::{Args, Parser, Subcommand, ValueEnum};
use mirror_markup::ContentType;
use std::path::PathBuf;

use crate::config::Config;
use crate::model::ChangeId;
use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "mirrordom",
    about = "Parse, sanitize and replay mirrored document updates",
    author,
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    #[arg(
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Pretty-print JSON output (also MIRRORDOM_PRETTY)"
    )]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        global = true,
        value_enum,
        help = "Minimum log level (error, warn, info, debug, trace); overrides MIRRORDOM_LOG_LEVEL"
    )]
    pub level: Option<LogLevel>,

    #[arg(
        long = "log-file",
        global = true,
        value_name = "PATH",
        help = "Write logs to the specified file; overrides MIRRORDOM_LOG_FILE"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self, config: &Config) -> LogConfig {
        LogConfig {
            level: self.level.unwrap_or(config.log_level),
            file: self.file.clone().or_else(|| config.log_file.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse markup and print the node tree as JSON
    Parse(MarkupArgs),
    /// Sanitize markup and print the result
    Sanitize(MarkupArgs),
    /// Feed update batches through a session and print what a viewer would receive
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct MarkupArgs {
    #[arg(value_name = "FILE", help = "Markup to read, or - for stdin")]
    pub input: PathBuf,

    #[arg(
        long = "content-type",
        value_enum,
        default_value_t = ContentTypeArg::Html,
        help = "Markup dialect; svg and vml keep name case"
    )]
    pub content_type: ContentTypeArg,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[arg(
        value_name = "SCRIPT",
        help = "JSON array of update batches, or - for stdin"
    )]
    pub script: PathBuf,

    #[arg(long, value_name = "CHANGE_ID", help = "First change id the viewer has not seen")]
    pub since: Option<ChangeId>,

    #[arg(
        long = "init-required",
        action = clap::ArgAction::SetTrue,
        help = "Withhold updates until the main frame has been reloaded"
    )]
    pub init_required: bool,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Also print the main frame as rebuilt by a viewer from scratch"
    )]
    pub render: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ContentTypeArg {
    #[default]
    Html,
    Svg,
    Vml,
}

impl From<ContentTypeArg> for ContentType {
    fn from(arg: ContentTypeArg) -> Self {
        match arg {
            ContentTypeArg::Html => ContentType::Html,
            ContentTypeArg::Svg => ContentType::Svg,
            ContentTypeArg::Vml => ContentType::Vml,
        }
    }
}
