//! Device Categorizer
//!
//! Command line entry point.
//!
//! ```text
//! device-categorizer [categorize]   classify ./devices.csv and write reports
//! device-categorizer rules          export the effective rule table
//! device-categorizer rank           rank product offers from a JSON file
//! ```

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use device_categorizer::{
    rank_products, AppConfig, CsvDeviceSource, CsvReportSink, DeviceClassifier, Enricher,
    JsonSummarySink, Pipeline, PipelineConfig, Product, RankingWeights, ReportSink, RuleTable,
    WebSearchLookup,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Device Categorizer - rule-based inventory categorization
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "CATEGORIZER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify devices and write the CSV report and JSON summary (default)
    Categorize(CategorizeArgs),

    /// Export the rule table in effect
    Rules {
        /// Custom rule table to load instead of the built-in one
        #[arg(long, env = "CATEGORIZER_RULES")]
        rules: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = RuleFormat::Yaml)]
        format: RuleFormat,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Rank product offers by price, rating and review count
    Rank {
        /// JSON array of products
        input: PathBuf,

        /// Write ranked products to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Number of top products to log
        #[arg(long, default_value = "5")]
        top: usize,

        #[arg(long, default_value = "0.4")]
        price_weight: f64,

        #[arg(long, default_value = "0.4")]
        rating_weight: f64,

        #[arg(long, default_value = "0.2")]
        reviews_weight: f64,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct CategorizeArgs {
    /// Device CSV export
    #[arg(long, env = "CATEGORIZER_INPUT")]
    input: Option<PathBuf>,

    /// Directory for the reports
    #[arg(long, env = "CATEGORIZER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Custom rule table (YAML or JSON)
    #[arg(long, env = "CATEGORIZER_RULES")]
    rules: Option<PathBuf>,

    /// Look up unrecognized CPUs online
    #[arg(long, env = "CATEGORIZER_ENRICH")]
    enrich: bool,

    /// Fail instead of classifying the sample records when the input is unreadable
    #[arg(long)]
    no_sample_fallback: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum RuleFormat {
    Yaml,
    Json,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match args.command.unwrap_or(Command::Categorize(CategorizeArgs::default())) {
        Command::Categorize(cmd) => {
            apply_overrides(&mut config, cmd);
            config.validate()?;
            run_categorize(config).await
        }
        Command::Rules {
            rules,
            format,
            output,
        } => export_rules(rules.or(config.rules_path), format, output),
        Command::Rank {
            input,
            output,
            top,
            price_weight,
            rating_weight,
            reviews_weight,
        } => {
            let weights = RankingWeights::new(price_weight, rating_weight, reviews_weight)?;
            run_rank(input, output, top, &weights)
        }
    }
}

fn apply_overrides(config: &mut AppConfig, cmd: CategorizeArgs) {
    if let Some(input) = cmd.input {
        config.input.path = input;
    }
    if let Some(dir) = cmd.output_dir {
        config.output.dir = dir;
    }
    if cmd.rules.is_some() {
        config.rules_path = cmd.rules;
    }
    if cmd.enrich {
        config.enrichment.enabled = true;
    }
    if cmd.no_sample_fallback {
        config.input.fallback_to_sample = false;
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn run_categorize(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Device Categorizer");
    info!("  Version: {}", device_categorizer::VERSION);
    info!("  Input: {}", config.input.path.display());
    info!("  Output dir: {}", config.output.dir.display());
    info!("  Enrichment: {}", config.enrichment.enabled);

    let classifier = match &config.rules_path {
        Some(path) => {
            info!("  Rules: {}", path.display());
            DeviceClassifier::with_table(RuleTable::load(path)?)?
        }
        None => DeviceClassifier::new(),
    };

    let mut pipeline = Pipeline::new(
        PipelineConfig {
            fallback_to_sample: config.input.fallback_to_sample,
        },
        classifier,
    );

    if config.enrichment.enabled {
        let lookup = WebSearchLookup::new(&config.enrichment)?;
        pipeline = pipeline.with_enricher(Enricher::new(Arc::new(lookup), &config.enrichment));
    }

    let source = CsvDeviceSource::new(&config.input.path);
    let sinks: Vec<Box<dyn ReportSink>> = vec![
        Box::new(CsvReportSink::new(config.output.categorized_csv_path())),
        Box::new(JsonSummarySink::new(config.output.summary_json_path())),
    ];

    let report = pipeline.run(&source, &sinks).await?;
    report.log_summary();

    if !report.failed_sinks.is_empty() {
        anyhow::bail!("failed to write reports: {}", report.failed_sinks.join(", "));
    }
    Ok(())
}

fn export_rules(
    rules: Option<PathBuf>,
    format: RuleFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let table = match rules {
        Some(path) => RuleTable::load(&path)?,
        None => RuleTable::builtin(),
    };
    // Compiling validates every pattern before export
    let classifier = DeviceClassifier::with_table(table)?;

    let text = match format {
        RuleFormat::Yaml => classifier.rule_table().to_yaml()?,
        RuleFormat::Json => classifier.rule_table().to_json()?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("writing rule table to {}", path.display()))?;
            info!("Wrote rule table to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run_rank(
    input: PathBuf,
    output: Option<PathBuf>,
    top: usize,
    weights: &RankingWeights,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("reading products from {}", input.display()))?;
    let products: Vec<Product> = serde_json::from_str(&content)
        .with_context(|| format!("parsing products from {}", input.display()))?;

    let ranked = rank_products(products, weights);
    info!("Ranked {} products", ranked.len());
    for (i, r) in ranked.iter().take(top).enumerate() {
        info!(
            "  {}. {} ({}) price={:.2} rating={:.1} reviews={} score={:.3}",
            i + 1,
            r.product.name,
            r.product.source,
            r.product.price.unwrap_or_default(),
            r.product.rating,
            r.product.reviews_count,
            r.score
        );
    }

    let json = serde_json::to_string_pretty(&ranked)?;
    match output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("writing ranked products to {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(d) = directive.parse::<Directive>() {
            filter = filter.add_directive(d);
        }
    }

    // Logs go to stderr so exported rules and rankings can be piped
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
