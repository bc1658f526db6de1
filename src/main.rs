use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use industry_nowcast::{
    AnalysisPipeline, AnalysisRequest, ClassificationIndex, EstatSource, PeriodRange,
    PresetCatalog, Settings, StaticSource, StatisticsSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "industry-nowcast")]
#[command(about = "Resolve an industry to JSIC and nowcast its official statistics")]
struct Args {
    /// Classification seed dictionary (code,label,keywords,parent_code)
    #[arg(long, default_value = "data/jsic_seed.csv", global = true)]
    dictionary: PathBuf,

    /// Table preset catalog
    #[arg(long, default_value = "data/presets.json", global = true)]
    presets: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve, fetch, project and print the report as JSON
    Analyze {
        /// Free-text industry description (e.g. "ラーメン屋")
        industry: String,

        /// Region name or area code
        #[arg(short, long, default_value = "全国")]
        region: String,

        /// Table preset id from the catalog
        #[arg(short, long)]
        preset: String,

        /// First year of the requested range
        #[arg(long)]
        from: i32,

        /// Last year of the requested range
        #[arg(long)]
        to: i32,

        /// Monthly growth rate overriding the trailing average (0.01 = 1%)
        #[arg(long, allow_hyphen_values = true)]
        growth_rate: Option<f64>,

        /// Use this classification code instead of the best match
        #[arg(long)]
        code: Option<String>,

        /// Periods to project past the last observation
        #[arg(long, default_value_t = 1)]
        horizon: usize,

        /// Read series from a JSON file instead of e-Stat
        #[arg(long)]
        series_file: Option<PathBuf>,
    },
    /// Print ranked classification candidates as JSON
    Resolve {
        industry: String,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;

    let index = ClassificationIndex::from_csv_path(&args.dictionary)
        .with_context(|| format!("Failed to load dictionary {}", args.dictionary.display()))?;
    let index = Arc::new(index);

    match args.command {
        Command::Resolve { industry, limit } => {
            if let Some(limit) = limit {
                settings.candidate_limit = limit.max(1);
            }
            let candidates = settings.resolver(index).resolve(&industry)?;
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        Command::Analyze {
            industry,
            region,
            preset,
            from,
            to,
            growth_rate,
            code,
            horizon,
            series_file,
        } => {
            let presets = PresetCatalog::from_path(&args.presets)?;

            let source: Arc<dyn StatisticsSource> = match series_file {
                Some(path) => {
                    info!(path = %path.display(), "Using series file");
                    Arc::new(StaticSource::from_json_path(&path)?)
                }
                None => {
                    let app_id = std::env::var("ESTAT_APP_ID")
                        .context("ESTAT_APP_ID must be set when --series-file is not given")?;
                    Arc::new(EstatSource::new(app_id))
                }
            };

            let range = PeriodRange::new(from, to)?;
            let mut request =
                AnalysisRequest::new(industry, region, preset, range).with_horizon(horizon);
            if let Some(rate) = growth_rate {
                request = request.with_growth_rate(rate);
            }
            if let Some(code) = code {
                request = request.with_code(code);
            }

            let pipeline = AnalysisPipeline::new(index, Arc::new(presets), source, settings);
            let report = pipeline.run(&request).await?;
            println!("{}", report.to_json()?);
        }
    }

    Ok(())
}
