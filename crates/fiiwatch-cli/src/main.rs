mod run;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use fiiwatch_core::{load_app_config, FundMapping, SourceKind};

#[derive(Debug, Parser)]
#[command(name = "fiiwatch")]
#[command(about = "FII disclosure consolidation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Fatos,
    Ofertas,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Fatos => SourceKind::FatoRelevante,
            SourceArg::Ofertas => SourceKind::OfertaPublica,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute one full pipeline run: fetch, extract, consolidate, notify
    Run {
        /// Restrict the run to a single source
        #[arg(long, value_enum)]
        source: Option<SourceArg>,

        /// Fetch and extract but do not write the ledger or send email
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve a fund code against the DEPARA mapping (triage helper)
    Depara {
        /// Raw code as it appears on a listing page
        code: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { source, dry_run } => {
            let config = load_app_config()?;
            run::execute(&config, source.map(SourceKind::from), dry_run).await
        }
        Commands::Depara { code } => {
            let config = load_app_config()?;
            let mapping = FundMapping::load(&config.depara_path)?;
            match mapping.resolve(&code) {
                fiiwatch_core::Resolution::Canonical { code: canonical } => {
                    println!("{code} -> {canonical}");
                }
                fiiwatch_core::Resolution::Unmapped { raw } => {
                    println!("{raw} has no DEPARA entry (would be recorded as UNMAPPED:{raw})");
                }
            }
            Ok(())
        }
    }
}
