//! Fixed query shapes, sort allow-lists and metric declarations.
//!
//! Everything here is static text. Request values only ever reach storage
//! as bound parameters appended by the predicate builder.

use crate::compare::MetricSpec;
use crate::query::SortOption;

pub(crate) const PLAYER_SELECT: &str = "SELECT p.user_id::text AS id, p.user_id, p.username, \
    p.country, p.pp::float8 AS pp, p.accuracy::float8 AS accuracy, p.play_count, \
    p.ranked_score, p.max_combo, p.global_rank, p.country_rank, \
    s.aim_skill::float8 AS aim_skill, s.speed_skill::float8 AS speed_skill, \
    s.accuracy_skill::float8 AS accuracy_skill \
    FROM players p LEFT JOIN player_skills s ON s.user_id = p.user_id";

pub(crate) const SCORE_SELECT: &str = "SELECT sc.score_id::text AS id, sc.user_id, \
    sc.beatmap_id, p.username, b.title AS beatmap_title, sc.pp::float8 AS pp, \
    sc.accuracy::float8 AS accuracy, sc.max_combo, sc.score, sc.grade, sc.mods, sc.played_at \
    FROM scores sc \
    JOIN players p ON p.user_id = sc.user_id \
    JOIN beatmaps b ON b.beatmap_id = sc.beatmap_id";

pub(crate) const BEATMAP_SELECT: &str = "SELECT b.beatmap_id::text AS id, b.beatmap_id, \
    b.title, b.artist, b.creator, b.mode, b.stars::float8 AS stars, b.bpm::float8 AS bpm, \
    b.length, b.play_count, b.ranked_at \
    FROM beatmaps b";

pub(crate) const LEADERBOARD_AGGREGATE_SELECT: &str = "SELECT 'leaderboard' AS id, \
    COUNT(*)::int8 AS player_count, AVG(p.pp)::float8 AS pp_average, \
    MAX(p.pp)::float8 AS pp_max, AVG(p.accuracy)::float8 AS accuracy_average \
    FROM players p";

pub(crate) const GRADE_DISTRIBUTION_SELECT: &str = "SELECT sc.grade AS id, \
    COUNT(*)::int8 AS score_count \
    FROM scores sc JOIN players p ON p.user_id = sc.user_id";

pub(crate) const GRADE_DISTRIBUTION_TAIL: &str = " GROUP BY sc.grade ORDER BY sc.grade";

pub(crate) const SINGLE_ROW: &str = " LIMIT 1";

pub(crate) const SCORE_TIEBREAK: &str = "sc.score_id";
pub(crate) const BEATMAP_TIEBREAK: &str = "b.beatmap_id";

/// Item field that joins two players' scores in a head-to-head.
pub(crate) const SHARED_ITEM_FIELD: &str = "beatmap_id";

pub const SCORE_SORTS: &[SortOption] = &[
    SortOption::desc("pp_desc", "sc.pp"),
    SortOption::asc("pp_asc", "sc.pp"),
    SortOption::desc("accuracy_desc", "sc.accuracy"),
    SortOption::desc("recent", "sc.played_at"),
    SortOption::asc("oldest", "sc.played_at"),
    SortOption::desc("combo_desc", "sc.max_combo"),
];

pub const BEATMAP_SORTS: &[SortOption] = &[
    SortOption::desc("stars_desc", "b.stars"),
    SortOption::asc("stars_asc", "b.stars"),
    SortOption::desc("bpm_desc", "b.bpm"),
    SortOption::desc("newest", "b.ranked_at"),
    SortOption::desc("play_count_desc", "b.play_count"),
];

/// Player comparison metrics. Ranks count an unranked player as last.
pub const PLAYER_METRICS: &[MetricSpec] = &[
    MetricSpec::higher("pp"),
    MetricSpec::higher("accuracy"),
    MetricSpec::higher("play_count"),
    MetricSpec::higher("ranked_score"),
    MetricSpec::higher("max_combo"),
    MetricSpec::lower("global_rank"),
    MetricSpec::lower("country_rank"),
    MetricSpec::higher("aim_skill"),
    MetricSpec::higher("speed_skill"),
    MetricSpec::higher("accuracy_skill"),
];

/// Decides score-level contests.
pub const SCORE_PRIMARY: MetricSpec = MetricSpec::higher("pp");

pub const SCORE_DUEL_METRICS: &[MetricSpec] = &[
    MetricSpec::higher("pp"),
    MetricSpec::higher("accuracy"),
    MetricSpec::higher("max_combo"),
    MetricSpec::higher("score"),
];
