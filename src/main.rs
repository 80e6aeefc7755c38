use std::{future::IntoFuture, process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use plaza::{
    application::{
        error::AppError,
        feed::FeedService,
        jobs::{
            FullCleanupJob, OrphanCleanupJob, ProfileSyncJob, ReconcileJobContext,
            process_full_cleanup_job, process_orphan_cleanup_job, process_profile_sync_job,
        },
        likes::LikeService,
        reconcile::ReconcileService,
        repos::{
            AccountsRepo, CommentsRepo, CommentsWriteRepo, LikesRepo, PostsRepo, PostsWriteRepo,
            ReconcileRepo,
        },
    },
    cache::{CacheBackend, CacheConfig, CommentCache, KvStore, MemoryKvStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, RouterState},
        redis::RedisKvStore,
        telemetry,
    },
};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Reconcile(args) => run_reconcile(settings, args.job).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings).await?;

    let monitor_handle = settings
        .scheduler
        .enabled
        .then(|| spawn_job_monitor(app.job_context.clone(), &settings.scheduler));

    let result = serve_http(&settings, app.router_state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    // Give pending invalidations a chance to land before the process exits.
    if tokio::time::timeout(settings.cache.op_timeout * 2, app.cache.wait_idle())
        .await
        .is_err()
    {
        warn!(
            target = "plaza::shutdown",
            "cache invalidations still pending at exit; entries expire by TTL"
        );
    }

    result
}

async fn run_reconcile(
    settings: config::Settings,
    job: config::ReconcileJob,
) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings).await?;
    let reconcile = app.job_context.reconcile;

    info!(target = "plaza::reconcile", job = job.as_str(), "Starting reconcile pass");

    match job {
        config::ReconcileJob::ProfileSync => {
            let summary = reconcile
                .sync_profiles(OffsetDateTime::now_utc())
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            info!(
                target = "plaza::reconcile",
                accounts = summary.accounts,
                failed = summary.failed,
                posts = summary.posts,
                comments = summary.comments,
                "Profile sync completed"
            );
        }
        config::ReconcileJob::OrphanCleanup => {
            let report = reconcile
                .cleanup_orphans()
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            info!(
                target = "plaza::reconcile",
                removed = report.removed_total(),
                repaired_posts = report.repaired_posts,
                repaired_comments = report.repaired_comments,
                "Orphan cleanup completed"
            );
        }
        config::ReconcileJob::FullCleanup => {
            let summary = reconcile
                .full_cleanup()
                .await
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            info!(
                target = "plaza::reconcile",
                removed = summary.orphans.removed_total(),
                purged_keys = summary.purged_keys,
                "Full cleanup completed"
            );
        }
    }

    Ok(())
}

struct ApplicationContext {
    router_state: RouterState,
    job_context: ReconcileJobContext,
    cache: CommentCache,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool = PostgresRepositories::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
        settings.database.statement_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool = PostgresRepositories::connect(
        database_url,
        settings.database.jobs_max_connections.get(),
        settings.database.acquire_timeout,
        settings.database.jobs_statement_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

async fn build_kv_store(config: &CacheConfig) -> Result<Arc<dyn KvStore>, AppError> {
    match &config.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryKvStore::new(config))),
        CacheBackend::Redis { url } => {
            let store = RedisKvStore::connect(url)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            store
                .ping()
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(target = "plaza::cache", "Connected to redis comment cache");
            Ok(Arc::new(store))
        }
    }
}

async fn build_application_context(
    http_repositories: Arc<PostgresRepositories>,
    job_repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = http_repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = http_repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = http_repositories.clone();
    let comments_write_repo: Arc<dyn CommentsWriteRepo> = http_repositories.clone();
    let accounts_repo: Arc<dyn AccountsRepo> = http_repositories.clone();
    let likes_repo: Arc<dyn LikesRepo> = http_repositories.clone();

    let cache_config = CacheConfig::from(&settings.cache);
    let kv_store = build_kv_store(&cache_config).await?;
    let cache = CommentCache::new(kv_store, comments_repo.clone(), cache_config);

    let feed = Arc::new(
        FeedService::new(
            posts_repo.clone(),
            posts_write_repo,
            comments_repo.clone(),
            comments_write_repo,
            accounts_repo,
            cache.clone(),
        )
        .with_limits(settings.feed),
    );
    let likes = Arc::new(LikeService::new(posts_repo, comments_repo, likes_repo));

    let job_accounts: Arc<dyn AccountsRepo> = job_repositories.clone();
    let job_reconcile: Arc<dyn ReconcileRepo> = job_repositories;
    let reconcile = Arc::new(
        ReconcileService::new(job_accounts, job_reconcile, cache.clone())
            .with_lookback(settings.scheduler.profile_sync_lookback),
    );

    Ok(ApplicationContext {
        router_state: RouterState {
            api: ApiState { feed, likes },
            db: http_repositories,
        },
        job_context: ReconcileJobContext::new(reconcile),
        cache,
    })
}

fn spawn_job_monitor(
    context: ReconcileJobContext,
    scheduler: &config::SchedulerSettings,
) -> tokio::task::JoinHandle<()> {
    let profile_sync_worker = WorkerBuilder::new("profile-sync-worker")
        .data(context.clone())
        .backend(CronStream::<ProfileSyncJob, _>::new(
            scheduler.profile_sync.clone(),
        ))
        .build_fn(process_profile_sync_job);
    let orphan_cleanup_worker = WorkerBuilder::new("orphan-cleanup-worker")
        .data(context.clone())
        .backend(CronStream::<OrphanCleanupJob, _>::new(
            scheduler.orphan_cleanup.clone(),
        ))
        .build_fn(process_orphan_cleanup_job);
    let full_cleanup_worker = WorkerBuilder::new("full-cleanup-worker")
        .data(context)
        .backend(CronStream::<FullCleanupJob, _>::new(
            scheduler.full_cleanup.clone(),
        ))
        .build_fn(process_full_cleanup_job);

    let monitor = Monitor::new()
        .register(profile_sync_worker)
        .register(orphan_cleanup_worker)
        .register(full_cleanup_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, router_state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "plaza::http",
        addr = %settings.server.addr,
        "Listening"
    );

    let drain = Arc::new(Notify::new());
    let drain_signal = drain.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { drain_signal.notified().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_signal() => {}
    }

    info!(
        target = "plaza::shutdown",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested; draining connections"
    );
    drain.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "plaza::shutdown",
                "Graceful shutdown timed out; dropping remaining connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
