// SPDX-License-Identifier: MPL-2.0

use std::process::ExitCode;
use std::sync::Arc;
use tapgol_feed::backend::{Collaborators, FirestoreClient, ViewerSlot};
use tapgol_feed::cache::{CacheDb, FeedCache};
use tapgol_feed::config::{APP_NAME, IS_DEVEL, PROJECT_ID_ENV};
use tapgol_feed::feed::{FeedAggregator, FeedOptions};
use tapgol_feed::model::ContentItem;
use tapgol_feed::runtime;
use tapgol_feed::state::{AppSettings, Session, SessionError, SessionManager};
use tracing_subscriber::EnvFilter;

const EXCERPT_LEN: usize = 40;

enum Command {
    Show,
    Like(String),
    /// Keep a session obtained elsewhere: uid, id token, optional display name
    Login(Session),
    Logout,
}

fn parse_command() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(Command::Show),
        [cmd, key] if cmd == "like" => Ok(Command::Like(key.clone())),
        [cmd, uid, id_token, rest @ ..] if cmd == "login" => Ok(Command::Login(Session {
            uid: uid.clone(),
            display_name: (!rest.is_empty()).then(|| rest.join(" ")),
            id_token: id_token.clone(),
        })),
        [cmd] if cmd == "logout" => Ok(Command::Logout),
        _ => Err(
            "usage: tapgol-feed [like <source:id> | login <uid> <id-token> [name] | logout]"
                .to_string(),
        ),
    }
}

fn main() -> ExitCode {
    let default_filter = if IS_DEVEL {
        "tapgol_feed=debug"
    } else {
        "tapgol_feed=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = match parse_command() {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("{usage}");
            return ExitCode::from(2);
        }
    };

    let settings = AppSettings::load();
    runtime::block_on(run(settings, command))
}

async fn load_session() -> Option<Session> {
    match SessionManager::load().await {
        Ok(session) => Some(session),
        Err(SessionError::NotFound) => None,
        Err(e) => {
            tracing::warn!(error = %e, "could not load session, continuing anonymously");
            None
        }
    }
}

async fn run(settings: AppSettings, command: Command) -> ExitCode {
    match &command {
        Command::Logout => {
            return match SessionManager::clear().await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "failed to clear session");
                    ExitCode::FAILURE
                }
            };
        }
        Command::Login(session) => {
            return match SessionManager::store(session).await {
                Ok(()) => {
                    tracing::info!(uid = %session.uid, "session stored");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to store session");
                    ExitCode::FAILURE
                }
            };
        }
        Command::Show | Command::Like(_) => {}
    }

    let Some(project_id) = settings.project_id() else {
        tracing::error!("no Firestore project configured; set {PROJECT_ID_ENV}");
        return ExitCode::FAILURE;
    };

    let client = match FirestoreClient::new(&project_id) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "failed to create backend client");
            return ExitCode::FAILURE;
        }
    };

    let session = load_session().await;
    client.set_id_token(session.as_ref().map(|s| s.id_token.clone()));
    let viewer = session.as_ref().map(Session::viewer);
    tracing::info!(
        app = APP_NAME,
        project = %project_id,
        viewer = viewer.as_ref().map(|v| v.id.as_str()).unwrap_or("anonymous"),
        "starting"
    );

    let cache_owner = viewer
        .as_ref()
        .map(|v| v.id.clone())
        .unwrap_or_else(|| "anonymous".to_string());
    let viewer_slot = Arc::new(ViewerSlot::new(viewer));
    let aggregator = FeedAggregator::new(
        Collaborators::from_client(client, viewer_slot),
        FeedOptions::from(&settings),
    );

    let cache = if settings.use_snapshot_cache {
        match CacheDb::open(&cache_owner) {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::warn!(error = %e, "snapshot cache unavailable");
                None
            }
        }
    } else {
        None
    };

    if let Some(db) = &cache {
        if let Err(e) = db.cleanup_stale() {
            tracing::warn!(error = %e, "snapshot cleanup failed");
        }
        match FeedCache::new(db).load_snapshot() {
            Ok(items) if !items.is_empty() => aggregator.seed_from_snapshot(items),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read snapshot"),
        }
    }

    let outcome = aggregator.refresh().await;
    if !outcome.replaced {
        tracing::warn!(items = outcome.items, "offline, showing the cached feed");
    }

    if let Some(db) = &cache
        && let Err(e) = FeedCache::new(db).store_refreshed(&outcome, &aggregator.feed())
    {
        tracing::warn!(error = %e, "failed to store snapshot");
    }

    match command {
        Command::Like(raw_key) => match aggregator.toggle_like_str(&raw_key).await {
            Ok(liked) => {
                println!("{raw_key}: {}", if liked { "liked" } else { "unliked" });
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(key = %raw_key, error = %e, "like toggle failed");
                ExitCode::FAILURE
            }
        },
        _ => {
            aggregator.backfill_prefix().await;
            for item in aggregator.feed().iter() {
                print_item(&aggregator, item);
            }
            ExitCode::SUCCESS
        }
    }
}

fn print_item(aggregator: &FeedAggregator, item: &ContentItem) {
    let key = item.key();
    let comments = aggregator
        .comment_count_for(&key)
        .value()
        .map_or_else(|| "…".to_string(), |n| n.to_string());
    let liked = if aggregator.is_liked(&key) { "♥" } else { "♡" };
    let title = if item.title.is_empty() {
        item.excerpt(EXCERPT_LEN).unwrap_or_default()
    } else {
        item.title.clone()
    };

    println!(
        "{} {:<24} {} {} {} · {} 💬{}",
        item.created_at.format("%Y-%m-%d %H:%M"),
        item.route(),
        liked,
        item.like_count,
        title,
        item.author,
        comments,
    );
    if let Some(url) = aggregator.active_video_url(&key) {
        println!("    ▶ {url}");
    }
}
