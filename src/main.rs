use std::process;
use std::sync::Arc;

use clap::Parser;
use lamina::{
    application::comments::{CommentService, RateLimitPolicy},
    application::error::AppError,
    application::images::ImageService,
    application::posts::PostService,
    application::regen::{RegenQueue, RegenTask, RegenWorker},
    application::site::SiteService,
    config::{self, CliArgs, Command},
    infra::{
        blob::FsBlobStore,
        db::SqliteRepositories,
        http::{self, AppState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli = CliArgs::parse();
    let settings = config::load(&cli)
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    match cli.command {
        Some(Command::RebuildAll(_)) => run_rebuild_all(settings).await,
        Some(Command::Serve(_)) | None => run_serve(settings).await,
    }
}

struct Context {
    state: AppState,
    queue: Arc<RegenQueue>,
    worker: Arc<RegenWorker>,
}

async fn build_context(settings: &config::Settings) -> Result<Context, AppError> {
    let pool = SqliteRepositories::connect(
        &settings.database.url,
        settings.database.max_connections,
    )
    .await?;
    SqliteRepositories::run_migrations(&pool).await?;
    let repositories = SqliteRepositories::new(pool);

    let blobs = Arc::new(FsBlobStore::new(settings.blob.root.clone()));
    let queue = Arc::new(RegenQueue::new());

    let posts_repo = Arc::new(repositories.clone());
    let worker = Arc::new(RegenWorker::new(
        posts_repo.clone(),
        Arc::new(repositories.clone()),
        Arc::new(repositories.clone()),
        blobs.clone(),
    ));

    let posts = Arc::new(PostService::new(
        posts_repo.clone(),
        Arc::new(repositories.clone()),
        Arc::new(repositories.clone()),
        queue.clone(),
    ));
    let comments = Arc::new(CommentService::new(
        Arc::new(repositories.clone()),
        posts_repo.clone(),
        Arc::new(repositories.clone()),
        queue.clone(),
        RateLimitPolicy {
            window: settings.comments.rate_limit_window,
            max_comments: settings.comments.rate_limit_max,
        },
    ));
    let images = Arc::new(ImageService::new(
        Arc::new(repositories.clone()),
        blobs.clone(),
    ));
    let site = Arc::new(SiteService::new(
        posts_repo.clone(),
        Arc::new(repositories.clone()),
        Arc::new(repositories.clone()),
    ));

    let state = AppState {
        posts,
        comments,
        images,
        site,
        posts_repo,
        comments_repo: Arc::new(repositories.clone()),
        images_repo: Arc::new(repositories.clone()),
        links_repo: Arc::new(repositories.clone()),
        settings_repo: Arc::new(repositories.clone()),
        blacklist_repo: Arc::new(repositories.clone()),
        stats_repo: Arc::new(repositories.clone()),
        blobs,
        worker: worker.clone(),
        repositories,
        admin: Arc::new(settings.admin.clone()),
    };

    Ok(Context {
        state,
        queue,
        worker,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let context = build_context(&settings).await?;

    tokio::spawn(context.worker.clone().run(context.queue.clone()));

    let router = http::build_router(context.state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to bind listener: {err}")))?;

    info!(addr = %settings.server.addr, "lamina listening");
    axum::serve(listener, router)
        .await
        .map_err(|err| AppError::unexpected(format!("server terminated: {err}")))
}

async fn run_rebuild_all(settings: config::Settings) -> Result<(), AppError> {
    let context = build_context(&settings).await?;

    context.queue.publish(RegenTask::RebuildAll);
    context.worker.drain(&context.queue).await;

    info!("full rebuild finished");
    Ok(())
}
