use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use viewdocs::{
    application::{
        cascade::FetchChain,
        docs::DocsService,
        error::AppError,
        redirect::RedirectRules,
        render::RenderPipeline,
    },
    cache::{CacheConfig, DocumentCache},
    config,
    domain::request::ParsedRequest,
    infra::{
        error::InfraError,
        github::{self, GitHubMarkdownRenderer, GitHubRawSource},
        http::{self, HttpState},
        local::LocalSource,
        telemetry,
    },
};

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

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
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
    }
}

async fn build_docs_service(settings: &config::Settings) -> Result<DocsService, AppError> {
    let token = settings.upstream.access_token.clone().ok_or_else(|| {
        InfraError::configuration("ACCESS_TOKEN (upstream.access_token) must be set")
    })?;

    let client = github::build_client(settings.upstream.request_timeout)?;
    let default_template =
        github::fetch_default_template(&client, &settings.upstream.default_template_url).await?;
    info!(
        target = "viewdocs::startup",
        url = %settings.upstream.default_template_url,
        bytes = default_template.len(),
        "default template loaded"
    );

    let remote = Arc::new(GitHubRawSource::new(
        client.clone(),
        &settings.upstream.raw_origin,
    ));
    let mut chain = FetchChain::new(remote, default_template);
    if settings.development.local_override {
        info!(
            target = "viewdocs::startup",
            root = %settings.development.path_prefix.display(),
            "serving working tree before the origin"
        );
        chain = chain.with_local_override(Arc::new(LocalSource::new(
            settings.development.path_prefix.clone(),
        )));
    }

    let markup = Arc::new(GitHubMarkdownRenderer::new(
        client,
        settings.upstream.markdown_endpoint.clone(),
        token,
    ));
    let cache = Arc::new(DocumentCache::new(CacheConfig::from(&settings.cache)));
    let pipeline = RenderPipeline::new(
        chain,
        markup,
        cache.clone(),
        settings.routing.hostname.clone(),
    );

    Ok(DocsService::new(
        pipeline,
        cache,
        RedirectRules::from(&settings.routing),
        settings.routing.tenant_override.clone(),
    ))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let docs = Arc::new(build_docs_service(&settings).await?);
    let router = http::build_router(HttpState { docs });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "viewdocs::startup",
        addr = %settings.server.addr,
        cache = settings.cache.enabled,
        "listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };
    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        stopping.notified().await;
        tokio::time::sleep(grace).await;
    };

    let server = axum::serve(listener, router)
        .with_graceful_shutdown(signal)
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(
                target = "viewdocs::shutdown",
                seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let docs = build_docs_service(&settings).await?;
    let target = args.target.trim_start_matches('/');
    let request = ParsedRequest::parse("", &format!("/{target}"), Some(&args.tenant));

    let body = docs.render(&request).await?;

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&body)
        .and_then(|()| stdout.flush())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!(target = "viewdocs::shutdown", "shutdown signal received, draining connections");
}
