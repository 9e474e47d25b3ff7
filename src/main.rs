use std::{process, sync::Arc};

use kartenwerk::{
    application::{
        error::AppError,
        jobs::{
            JobBroker, JobStore, JobWorkerContext, RENDER_JOB_WAIT_TIMEOUT, RenderRequest,
            StatusTracker, spawn_reaper, spawn_workers, wait_for_job_completion,
        },
        render::{BackgroundSource, CliRasterizer, RenderPipeline},
        repos::{ArtifactRepo, MapSource},
    },
    config,
    domain::{
        artifact::{VersionSelector, artifact_path},
        error::DomainError,
        geo::BBox,
        grid::{Grid, GridCells, GridStyle},
        types::FileFormat,
    },
    infra::{
        artifacts::ArtifactStore,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        maps::DirectoryMapSource,
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Grid(args) => run_grid(&settings, args),
    }
}

/// Services shared by the HTTP API, the worker pool and the CLI.
struct ApplicationContext {
    store: Arc<JobStore>,
    artifacts: Arc<dyn ArtifactRepo>,
    maps: Arc<dyn MapSource>,
    broker: Arc<JobBroker>,
    status: Arc<StatusTracker>,
    job_context: JobWorkerContext,
}

fn build_application_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let artifacts: Arc<dyn ArtifactRepo> = Arc::new(
        ArtifactStore::new(settings.storage.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let maps: Arc<dyn MapSource> = Arc::new(DirectoryMapSource::new(
        settings.maps.directory.clone(),
    ));

    let background = BackgroundSource::new(
        settings.render.themes.clone(),
        settings.render.default_theme.clone(),
        settings.render.background_timeout,
    )
    .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let rasterizer = Arc::new(CliRasterizer::new(settings.render.rasterizer_path.clone()));
    let renderer = Arc::new(RenderPipeline::new(
        background,
        rasterizer,
        settings.render.grid_style,
    ));

    let store = Arc::new(JobStore::new());
    let broker = Arc::new(JobBroker::new(
        Arc::clone(&store),
        Arc::clone(&artifacts),
        settings.render.grid_style,
    ));
    let status = Arc::new(StatusTracker::new(Arc::clone(&store), Arc::clone(&artifacts)));
    let job_context = JobWorkerContext {
        store: Arc::clone(&store),
        artifacts: Arc::clone(&artifacts),
        renderer,
    };

    Ok(ApplicationContext {
        store,
        artifacts,
        maps,
        broker,
        status,
        job_context,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings)?;

    let worker_handles = spawn_workers(
        app.job_context.clone(),
        settings.jobs.concurrency.get() as usize,
    );
    let reaper_handle = spawn_reaper(
        Arc::clone(&app.store),
        settings.jobs.reap_interval,
        settings.jobs.retention,
    );

    let router_state = RouterState {
        http: HttpState {
            artifacts: Arc::clone(&app.artifacts),
        },
        api: ApiState {
            broker: Arc::clone(&app.broker),
            status: Arc::clone(&app.status),
            maps: Arc::clone(&app.maps),
            public_url: settings.server.public_url.clone(),
            grid_style: settings.render.grid_style,
        },
    };

    let result = serve_http(&settings, router_state).await;

    reaper_handle.abort();
    let _ = reaper_handle.await;
    for handle in worker_handles {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_app(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "kartenwerk::http",
        addr = %settings.server.addr,
        public_url = %settings.server.public_url,
        workers = settings.jobs.concurrency.get(),
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let format: FileFormat = args
        .format
        .parse()
        .map_err(DomainError::from)?;
    let app = build_application_context(&settings)?;
    let worker_handles = spawn_workers(
        app.job_context.clone(),
        settings.jobs.concurrency.get() as usize,
    );

    info!(
        target = "kartenwerk::render",
        maps = args.map_ids.len(),
        file_type = %format,
        force = args.force,
        "Starting render"
    );

    let result = render_maps(&app, &settings, &args.map_ids, format, args.force).await;

    for handle in worker_handles {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn render_maps(
    app: &ApplicationContext,
    settings: &config::Settings,
    map_ids: &[String],
    format: FileFormat,
    force: bool,
) -> Result<(), AppError> {
    for map_id in map_ids {
        let content = app.maps.load(map_id).await?.ok_or_else(|| {
            AppError::validation(format!(
                "map `{map_id}` not found in {}",
                settings.maps.directory.display()
            ))
        })?;

        let outcome = app
            .broker
            .submit(RenderRequest {
                map_id: map_id.clone(),
                content,
                format,
                force,
            })
            .await?;

        let key = outcome.job.key;
        match outcome.job.job_id {
            Some(job_id) if !outcome.already_satisfied => {
                wait_for_job_completion(&app.store, job_id, RENDER_JOB_WAIT_TIMEOUT).await?;
            }
            _ => info!(
                target = "kartenwerk::render",
                map_id = %map_id,
                version = %key.version,
                "Artifact already present"
            ),
        }

        let relative = artifact_path(
            &key.map_id,
            &VersionSelector::Exact(key.version.clone()),
            key.format,
        );
        let path = settings.storage.directory.join(relative);
        println!("{map_id}\t{}\t{}", key.version, path.display());
    }

    Ok(())
}

fn run_grid(settings: &config::Settings, args: config::GridArgs) -> Result<(), AppError> {
    let bbox = BBox::parse(&args.bbox)?;
    let cells = match args.cells.as_deref() {
        Some(cells) => cells.parse::<GridCells>()?,
        None => GridCells::for_bbox(&bbox),
    };
    let style = match args.style.as_deref() {
        Some(style) => style.parse::<GridStyle>()?,
        None => settings.render.grid_style,
    };

    let grid = Grid::generate(bbox, cells, style).to_feature_collection();
    let json = serde_json::to_string_pretty(&grid)
        .map_err(|err| AppError::unexpected(format!("failed to encode grid: {err}")))?;
    println!("{json}");
    Ok(())
}
