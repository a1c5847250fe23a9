use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the rankboard binary.
#[derive(Debug, Parser)]
#[command(
    name = "rankboard",
    version,
    about = "Leaderboard analytics over a cached Postgres store"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RANKBOARD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Enable or disable the read-through cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of players in one comparison.
    #[arg(long = "comparison-max-entities", value_name = "COUNT", global = true)]
    pub comparison_max_entities: Option<u32>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Show one player's profile.
    Player(PlayerArgs),
    /// Rank several players on the comparison metrics.
    Compare(CompareArgs),
    /// Compare two players on the beatmaps both have scores on.
    #[command(name = "head-to-head")]
    HeadToHead(PairArgs),
    /// Compare two players' best scores on one beatmap.
    Duel(DuelArgs),
    /// Search scores.
    #[command(name = "search-scores")]
    SearchScores(ScoreSearchArgs),
    /// Search beatmaps.
    #[command(name = "search-beatmaps")]
    SearchBeatmaps(BeatmapSearchArgs),
    /// Leaderboard-wide aggregates.
    Summary(SummaryArgs),
    /// Answer line-delimited JSON requests from stdin until EOF, sharing
    /// one cache across them.
    Serve,
}

#[derive(Debug, Args, Clone)]
pub struct PlayerArgs {
    #[arg(value_name = "USER_ID")]
    pub user_id: i64,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// Player ids, in display order.
    #[arg(value_name = "USER_ID", num_args = 1..)]
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Args, Clone)]
pub struct PairArgs {
    #[arg(value_name = "USER_A")]
    pub user_a: i64,
    #[arg(value_name = "USER_B")]
    pub user_b: i64,
}

#[derive(Debug, Args, Clone)]
pub struct DuelArgs {
    #[arg(long = "beatmap-id", value_name = "ID")]
    pub beatmap_id: i64,
    #[command(flatten)]
    pub players: PairArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct PageArgs {
    #[arg(long, value_name = "COUNT", allow_negative_numbers = true)]
    pub limit: Option<i64>,
    #[arg(long, value_name = "COUNT", allow_negative_numbers = true)]
    pub offset: Option<i64>,
    /// Symbolic sort key, e.g. `pp_desc`.
    #[arg(long, value_name = "KEY")]
    pub sort: Option<String>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ScoreSearchArgs {
    #[arg(long = "min-pp", value_name = "PP")]
    pub min_pp: Option<f64>,
    #[arg(long = "max-pp", value_name = "PP")]
    pub max_pp: Option<f64>,
    #[arg(long = "min-accuracy", value_name = "PERCENT")]
    pub min_accuracy: Option<f64>,
    #[arg(long = "max-accuracy", value_name = "PERCENT")]
    pub max_accuracy: Option<f64>,
    /// Grades to include; repeat or separate with commas.
    #[arg(long = "grade", value_name = "GRADE", value_delimiter = ',')]
    pub grades: Vec<String>,
    /// Mod combinations to include; repeat or separate with commas.
    #[arg(long = "mods", value_name = "MODS", value_delimiter = ',')]
    pub mods: Vec<String>,
    #[arg(long, value_name = "TEXT")]
    pub username: Option<String>,
    #[arg(long = "beatmap-title", value_name = "TEXT")]
    pub beatmap_title: Option<String>,
    /// Earliest play date, `YYYY-MM-DD`.
    #[arg(long = "played-from", value_name = "DATE")]
    pub played_from: Option<String>,
    /// Latest play date, `YYYY-MM-DD`.
    #[arg(long = "played-to", value_name = "DATE")]
    pub played_to: Option<String>,
    #[arg(long = "user-id", value_name = "ID")]
    pub user_id: Option<i64>,
    #[arg(long = "beatmap-id", value_name = "ID")]
    pub beatmap_id: Option<i64>,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct BeatmapSearchArgs {
    #[arg(long = "min-stars", value_name = "STARS")]
    pub min_stars: Option<f64>,
    #[arg(long = "max-stars", value_name = "STARS")]
    pub max_stars: Option<f64>,
    #[arg(long = "min-bpm", value_name = "BPM")]
    pub min_bpm: Option<f64>,
    #[arg(long = "max-bpm", value_name = "BPM")]
    pub max_bpm: Option<f64>,
    /// Maximum drain length in seconds.
    #[arg(long = "max-length", value_name = "SECONDS")]
    pub max_length: Option<i64>,
    /// Game modes to include; repeat or separate with commas.
    #[arg(long = "mode", value_name = "MODE", value_delimiter = ',')]
    pub modes: Vec<String>,
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,
    #[arg(long, value_name = "TEXT")]
    pub artist: Option<String>,
    #[arg(long, value_name = "TEXT")]
    pub creator: Option<String>,
    /// Earliest ranked date, `YYYY-MM-DD`.
    #[arg(long = "ranked-from", value_name = "DATE")]
    pub ranked_from: Option<String>,
    /// Latest ranked date, `YYYY-MM-DD`.
    #[arg(long = "ranked-to", value_name = "DATE")]
    pub ranked_to: Option<String>,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct SummaryArgs {
    /// Restrict the summary to one country code.
    #[arg(long, value_name = "CODE")]
    pub country: Option<String>,
}
