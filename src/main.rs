use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crimviz::config::AppConfig;
use crimviz::ngrams::{self, NgramFilter};
use crimviz::network::intervals::{self, IntervalKind};
use crimviz::network::relationships::{self as relationship_network, ColorMode};
use crimviz::observations::{self, DEFAULT_MAIN_CATEGORY, DEFAULT_OTHER_CATEGORY};
use crimviz::relationships::{self, RelationshipFilter};
use crimviz::scores::{self, CompareMode, ScoreMatrix};
use crimviz::table::{DurationTable, NgramTable, RecordTable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "crimviz",
    version,
    about = "Reshape CRIM n-grams and relationships for visualization"
)]
struct Cli {
    /// Config file (defaults to ~/.config/crimviz/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Comparator for the score matrix, applied to token tuples.
#[derive(Clone, Copy, ValueEnum)]
enum Metric {
    /// Edit distance in tokens
    Levenshtein,
    /// 1 - distance / longer length (1.0 = identical)
    NormalizedLevenshtein,
}

impl Metric {
    fn score(self, a: &[String], b: &[String]) -> f64 {
        let distance = strsim::generic_levenshtein(&a.to_vec(), &b.to_vec()) as f64;
        match self {
            Self::Levenshtein => distance,
            Self::NormalizedLevenshtein => {
                let longest = a.len().max(b.len());
                if longest == 0 {
                    1.0
                } else {
                    1.0 - distance / longest as f64
                }
            }
        }
    }
}

/// Options shared by commands that melt an n-gram table.
#[derive(clap::Args)]
struct NgramArgs {
    /// N-gram table (pandas orient="split" JSON)
    table: PathBuf,

    /// Matching duration table; without it every n-gram is one unit wide
    #[arg(long)]
    durations: Option<PathBuf>,

    /// Keep only these voices (repeatable)
    #[arg(long = "voice")]
    voices: Vec<String>,

    /// Keep only these patterns (repeatable)
    #[arg(long = "pattern")]
    patterns: Vec<String>,
}

impl NgramArgs {
    fn load(&self) -> Result<(NgramTable, Vec<ngrams::NgramRecord>)> {
        let table = NgramTable::from_path(&self.table)
            .with_context(|| format!("Failed to load n-grams from {}", self.table.display()))?;
        let durations = match &self.durations {
            Some(path) => Some(
                DurationTable::from_path(path)
                    .with_context(|| format!("Failed to load durations from {}", path.display()))?,
            ),
            None => None,
        };
        let filter = NgramFilter::default()
            .voices(self.voices.iter().cloned())
            .patterns(self.patterns.iter().cloned());
        let records = ngrams::reshape(&table, durations.as_ref(), &filter)
            .context("Reshape failed")?;
        Ok((table, records))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Melt an n-gram table into start/end/voice/pattern rows
    Ngrams {
        #[command(flatten)]
        args: NgramArgs,
    },

    /// Score every pair of distinct patterns in an n-gram table
    Scores {
        /// N-gram table (pandas orient="split" JSON)
        table: PathBuf,

        #[arg(long, value_enum, default_value = "levenshtein")]
        metric: Metric,
    },

    /// Score n-grams against one key pattern
    CloseMatch {
        #[command(flatten)]
        args: NgramArgs,

        /// Pattern to compare every n-gram with
        key: String,

        /// d = distance, s = similarity
        #[arg(long, default_value = "d")]
        compare: CompareMode,

        #[arg(long, value_enum, default_value = "levenshtein")]
        metric: Metric,

        /// Keep only n-grams passing this cutoff
        #[arg(long)]
        cutoff: Option<f64>,
    },

    /// Explode observation/relationship addresses into measure spans
    Observations {
        /// Records (JSON array, nested objects flattened to dotted columns)
        records: PathBuf,

        /// Column holding the EMA address
        #[arg(long)]
        ema_column: String,

        #[arg(long, default_value = DEFAULT_MAIN_CATEGORY)]
        main_category: String,

        #[arg(long, default_value = DEFAULT_OTHER_CATEGORY)]
        other_category: String,
    },

    /// Build the model → derivative relationship network
    Network {
        /// Relationship records (JSON array)
        records: PathBuf,

        /// derivative or model (defaults to config, then derivative)
        #[arg(long)]
        color: Option<ColorMode>,

        /// Keep only these relationship types (repeatable)
        #[arg(long = "relationship-type")]
        relationship_types: Vec<String>,

        /// Keep only relationships with these model pieces (repeatable)
        #[arg(long = "model-id")]
        model_ids: Vec<String>,

        /// Keep only relationships with these derivative pieces (repeatable)
        #[arg(long = "derivative-id")]
        derivative_ids: Vec<String>,

        /// Keep the families of these pieces (repeatable)
        #[arg(long = "family")]
        families: Vec<String>,
    },

    /// List families of pieces connected through relationships
    Families {
        /// Relationship records (JSON array)
        records: PathBuf,
    },

    /// Build prefix networks of observation intervals
    Intervals {
        /// Observation records (JSON array)
        records: PathBuf,

        /// Column holding the interval strings
        #[arg(long)]
        column: String,

        /// melodic or time
        #[arg(long)]
        kind: IntervalKind,

        /// Keep only these interval strings (repeatable)
        #[arg(long = "pattern")]
        patterns: Vec<String>,
    },
}

#[derive(Serialize)]
struct CloseMatchOutput<'a> {
    key: &'a str,
    min_score: Option<f64>,
    max_score: Option<f64>,
    cutoff_step: Option<f64>,
    color_order: scores::SortOrder,
    rows: Vec<&'a scores::ScoredNgram>,
}

#[derive(Serialize)]
struct NetworkOutput {
    #[serde(flatten)]
    network: crimviz::network::NetworkExport,
    missing_family_members: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Ngrams { args } => {
            let (_, records) = args.load()?;
            log::info!("{} n-gram rows", records.len());
            emit(&records)?;
        }

        Commands::Scores { table, metric } => {
            let table = NgramTable::from_path(&table)
                .with_context(|| format!("Failed to load n-grams from {}", table.display()))?;
            let matrix = ScoreMatrix::build(&table, &config.scores.token_separator, |a, b| {
                metric.score(a, b)
            });
            emit(&matrix.entries())?;
        }

        Commands::CloseMatch {
            args,
            key,
            compare,
            metric,
            cutoff,
        } => {
            let (table, records) = args.load()?;
            let matrix = ScoreMatrix::build(&table, &config.scores.token_separator, |a, b| {
                metric.score(a, b)
            });
            let matched = scores::close_match(&records, &key, &matrix, compare)
                .context("Close-match scoring failed")?;

            let rows = match cutoff {
                Some(c) => matched.within_cutoff(c),
                None => matched.rows.iter().collect(),
            };
            emit(&CloseMatchOutput {
                key: &key,
                min_score: matched.min_score(),
                max_score: matched.max_score(),
                cutoff_step: matched.cutoff_step(),
                color_order: compare.color_order(),
                rows,
            })?;
        }

        Commands::Observations {
            records,
            ema_column,
            main_category,
            other_category,
        } => {
            let table = load_records(&records)?;
            let spans = observations::observation_spans(
                &table,
                &ema_column,
                &main_category,
                &other_category,
            )
            .context("Failed to build observation spans")?;
            if let Some(first) = spans.invalid_records.first() {
                log::info!("First invalid address at record {}", first);
            }
            emit(&spans.spans)?;
        }

        Commands::Network {
            records,
            color,
            relationship_types,
            model_ids,
            derivative_ids,
            families,
        } => {
            let table = load_records(&records)?;
            let filter = RelationshipFilter {
                relationship_types,
                model_pieces: model_ids,
                derivative_pieces: derivative_ids,
                families,
            };
            let mode = color.unwrap_or(config.network.color);
            let built = relationship_network::build_from_records(
                &table,
                &config.weight_table(),
                &filter,
                mode,
            )
            .context("Failed to build relationship network")?;

            emit(&NetworkOutput {
                network: built.network.to_export(),
                missing_family_members: built.missing_family_members,
            })?;
        }

        Commands::Families { records } => {
            let table = load_records(&records)?;
            let rels = relationships::normalize(&table, &config.weight_table())
                .context("Failed to normalize relationships")?;
            let index = crimviz::family::FamilyIndex::build(
                rels.iter().map(|r| (r.model_id.as_str(), r.derivative_id.as_str())),
            );
            emit(&index.families())?;
        }

        Commands::Intervals {
            records,
            column,
            kind,
            patterns,
        } => {
            let table = load_records(&records)?;
            let networks = intervals::networks_from_records(&table, &column, kind, &patterns)
                .context("Failed to build interval networks")?;
            let export: BTreeMap<&str, _> = networks
                .iter()
                .map(|(group, net)| (group.as_str(), net.to_export()))
                .collect();
            emit(&export)?;
        }
    }

    Ok(())
}

fn load_records(path: &Path) -> Result<RecordTable> {
    RecordTable::from_path(path)
        .with_context(|| format!("Failed to load records from {}", path.display()))
}

/// Print a value as pretty JSON on stdout.
fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
