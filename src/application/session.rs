//! Long-lived request handling.
//!
//! A session reads one JSON request per line and answers each with one
//! [`ApiResponse`] line. Every request goes through the same
//! [`AnalyticsService`], so its cache serves repeats for the whole session.
//!
//! ```json
//! {"op":"compare","user_ids":[2,7]}
//! {"op":"search_scores","min_pp":300,"grades":["S"],"played_from":"2024-01-01"}
//! {"op":"invalidate_player","user_id":7}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

use super::analytics::AnalyticsService;
use super::error::AppError;
use super::repos::RecordSource;
use super::response::ApiResponse;
use super::search::{BeatmapSearch, ScoreSearch};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Player { user_id: i64 },
    Compare { user_ids: Vec<i64> },
    HeadToHead { user_a: i64, user_b: i64 },
    Duel { beatmap_id: i64, user_a: i64, user_b: i64 },
    SearchScores(ScoreSearch),
    SearchBeatmaps(BeatmapSearch),
    Summary {
        #[serde(default)]
        country: Option<String>,
    },
    InvalidatePlayer { user_id: i64 },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Player { .. } => "player",
            Request::Compare { .. } => "compare",
            Request::HeadToHead { .. } => "head_to_head",
            Request::Duel { .. } => "duel",
            Request::SearchScores(_) => "search_scores",
            Request::SearchBeatmaps(_) => "search_beatmaps",
            Request::Summary { .. } => "summary",
            Request::InvalidatePlayer { .. } => "invalidate_player",
        }
    }
}

impl<S: RecordSource> AnalyticsService<S> {
    /// Run one request and render its result as JSON.
    pub async fn handle(&self, request: Request) -> Result<Value, AppError> {
        match request {
            Request::Player { user_id } => to_json(self.player(user_id).await?),
            Request::Compare { user_ids } => to_json(self.compare_players(&user_ids).await?),
            Request::HeadToHead { user_a, user_b } => {
                to_json(self.head_to_head(user_a, user_b).await?)
            }
            Request::Duel {
                beatmap_id,
                user_a,
                user_b,
            } => to_json(self.score_duel(beatmap_id, user_a, user_b).await?),
            Request::SearchScores(search) => to_json(self.search_scores(&search).await?),
            Request::SearchBeatmaps(search) => to_json(self.search_beatmaps(&search).await?),
            Request::Summary { country } => {
                to_json(self.leaderboard_summary(country.as_deref()).await?)
            }
            Request::InvalidatePlayer { user_id } => {
                to_json(self.invalidate_player(user_id).await)
            }
        }
    }
}

/// Serve line-delimited requests from `reader` until it is exhausted.
///
/// Malformed lines are answered with an `invalid_input` envelope and the
/// session continues; only I/O failures end it early. Returns the number of
/// requests answered.
#[instrument(skip_all)]
pub async fn serve_lines<S, R, W>(
    service: &AnalyticsService<S>,
    reader: R,
    mut writer: W,
) -> std::io::Result<usize>
where
    S: RecordSource,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!(op = request.op(), "Handling session request");
                service.handle(request).await
            }
            Err(err) => Err(AppError::validation(format!("malformed request: {err}"))),
        };
        if let Err(error) = &result {
            error.report().log();
        }

        write_envelope(&mut writer, &ApiResponse::from(result)).await?;
        answered += 1;

        // Let pending write-behind tasks land before the next request.
        tokio::task::yield_now().await;
    }

    Ok(answered)
}

async fn write_envelope<W, T>(writer: &mut W, envelope: &ApiResponse<T>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut text = serde_json::to_string(envelope).map_err(std::io::Error::other)?;
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

pub(crate) fn to_json<T: Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|err| AppError::unexpected(err.to_string()))
}
