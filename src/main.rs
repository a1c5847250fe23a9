use std::{process::ExitCode, sync::Arc};

use rankboard::{
    application::{
        analytics::{AnalyticsService, AnalyticsSettings},
        error::AppError,
        repos::RecordSource,
        response::ApiResponse,
        search::{BeatmapSearch, ScoreSearch, parse_date},
        session::{Request, serve_lines},
    },
    cache::{CacheConfig, MemoryStore, ReadThrough, spawn_sweeper},
    config::{self, BeatmapSearchArgs, Command, ScoreSearchArgs},
    infra::{db::PostgresRepositories, error::InfraError, telemetry},
};
use serde_json::Value;
use tokio::io::{BufReader, stdin, stdout};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(error) => {
            report_application_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

/// Runs one command and prints its envelope, or serves a session on stdin.
/// `Ok(false)` means a one-shot command was rejected or failed after a
/// successful bootstrap.
async fn run() -> Result<bool, AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is not set"))?;
    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(MemoryStore::new(&cache_config));
    let sweeper = cache_config
        .sweep_interval()
        .map(|every| spawn_sweeper(&store, every));
    let cache = ReadThrough::new(store, cache_config);

    let service = AnalyticsService::new(repositories, cache, AnalyticsSettings::from(&settings));

    info!(
        target = "rankboard::cli",
        cache_enabled = settings.cache.enabled,
        "Running command"
    );
    let outcome = match request_for(cli_args.command) {
        Ok(None) => serve(&service).await,
        Ok(Some(request)) => one_shot(&service, Ok(request)).await,
        Err(error) => one_shot(&service, Err(error)).await,
    };

    if let Some(handle) = sweeper {
        handle.abort();
    }
    outcome
}

async fn serve<S: RecordSource>(service: &AnalyticsService<S>) -> Result<bool, AppError> {
    let answered = serve_lines(service, BufReader::new(stdin()), stdout())
        .await
        .map_err(|err| AppError::unexpected(format!("session I/O failed: {err}")))?;
    info!(answered, "Session ended");
    Ok(true)
}

async fn one_shot<S: RecordSource>(
    service: &AnalyticsService<S>,
    request: Result<Request, AppError>,
) -> Result<bool, AppError> {
    let result = match request {
        Ok(request) => service.handle(request).await,
        Err(error) => Err(error),
    };

    let succeeded = result.is_ok();
    if let Err(error) = &result {
        error.report().log();
    }
    print_envelope(&ApiResponse::from(result))?;
    Ok(succeeded)
}

/// The request a one-shot command stands for; `None` for `serve`.
fn request_for(command: Command) -> Result<Option<Request>, AppError> {
    let request = match command {
        Command::Player(args) => Request::Player {
            user_id: args.user_id,
        },
        Command::Compare(args) => Request::Compare {
            user_ids: args.user_ids,
        },
        Command::HeadToHead(args) => Request::HeadToHead {
            user_a: args.user_a,
            user_b: args.user_b,
        },
        Command::Duel(args) => Request::Duel {
            beatmap_id: args.beatmap_id,
            user_a: args.players.user_a,
            user_b: args.players.user_b,
        },
        Command::SearchScores(args) => Request::SearchScores(score_search(args)?),
        Command::SearchBeatmaps(args) => Request::SearchBeatmaps(beatmap_search(args)?),
        Command::Summary(args) => Request::Summary {
            country: args.country,
        },
        Command::Serve => return Ok(None),
    };
    Ok(Some(request))
}

fn score_search(args: ScoreSearchArgs) -> Result<ScoreSearch, AppError> {
    Ok(ScoreSearch {
        min_pp: args.min_pp,
        max_pp: args.max_pp,
        min_accuracy: args.min_accuracy,
        max_accuracy: args.max_accuracy,
        grades: args.grades,
        mods: args.mods,
        username: args.username,
        beatmap_title: args.beatmap_title,
        played_from: optional_date("played_from", args.played_from)?,
        played_to: optional_date("played_to", args.played_to)?,
        user_id: args.user_id,
        beatmap_id: args.beatmap_id,
        sort: args.page.sort,
        limit: args.page.limit,
        offset: args.page.offset,
    })
}

fn beatmap_search(args: BeatmapSearchArgs) -> Result<BeatmapSearch, AppError> {
    Ok(BeatmapSearch {
        min_stars: args.min_stars,
        max_stars: args.max_stars,
        min_bpm: args.min_bpm,
        max_bpm: args.max_bpm,
        max_length: args.max_length,
        modes: args.modes,
        title: args.title,
        artist: args.artist,
        creator: args.creator,
        ranked_from: optional_date("ranked_from", args.ranked_from)?,
        ranked_to: optional_date("ranked_to", args.ranked_to)?,
        sort: args.page.sort,
        limit: args.page.limit,
        offset: args.page.offset,
    })
}

fn optional_date(field: &str, text: Option<String>) -> Result<Option<time::Date>, AppError> {
    text.map(|text| parse_date(field, &text)).transpose()
}

fn print_envelope(envelope: &ApiResponse<Value>) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(envelope)
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{text}");
    Ok(())
}
