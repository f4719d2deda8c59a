use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use followup::commands::{self, RenderArgs};
use followup::Config;

#[derive(Parser)]
#[command(name = "followup")]
#[command(about = "WhatsApp follow-up messages for property listings.

Load a listing export (csv, xlsx, xls, ods or json), pick a property by tag and
compose a campaign of ready-to-send WhatsApp messages, from templates or with a
hosted text generator.
")]
#[command(version)]
struct Cli {
  /// Config file (JSON or YAML)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Verbose diagnostics on stderr
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Google Maps API key for the neighborhood lookup
  #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true, global = true)]
  maps_api_key: Option<String>,

  /// Gemini API key for generated mode
  #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
  gemini_api_key: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Show the canonical column names detected in a listing file
  Columns {
    /// Listing file
    file: PathBuf,
  },
  /// Show every tagged property in a listing file
  List {
    /// Listing file
    file: PathBuf,
  },
  /// Show available campaigns, their phases and message categories
  Campaigns {
    /// Custom template set file (JSON or YAML)
    #[arg(long)]
    templates: Option<PathBuf>,
  },
  /// Compose messages for one property and save them as text
  Generate {
    /// Listing file
    file: PathBuf,
    /// Tag of the property to compose for
    #[arg(long)]
    tag: String,
    /// Output file (one phase) or directory (several phases)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Don't print message cards
    #[arg(short, long)]
    quiet: bool,
    #[command(flatten)]
    render: RenderArgs,
  },
  /// Compose messages for every tagged property into a zip archive
  Batch {
    /// Listing file
    file: PathBuf,
    /// Archive to write
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    render: RenderArgs,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  bentley::init(cli.verbose);

  let config = Config::load(cli.config.as_deref())?.with_credentials(cli.maps_api_key, cli.gemini_api_key);

  match cli.command {
    Commands::Columns { file } => commands::columns::handle(&file),
    Commands::List { file } => commands::list::handle(&file),
    Commands::Campaigns { templates } => commands::campaigns::handle(templates.as_deref()),
    Commands::Generate { file, tag, output, quiet, render } => {
      commands::generate::handle(&config, &file, &tag, output.as_deref(), quiet, &render).await
    }
    Commands::Batch { file, output, render } => commands::batch::handle(&config, &file, &output, &render).await,
  }
}
