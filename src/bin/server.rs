use std::{
    env,
    error::Error,
    fs::OpenOptions,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

#[cfg(debug_assertions)]
use tower_livereload::LiveReloadLayer;

use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use coopex::{
    AppConfig, AppState, CreditPolicy, DEFAULT_TIMEZONE, EditWindow, build_router,
    graceful_shutdown, logging_middleware,
};

/// The web server for coopex.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the app from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the timezone used to display and filter ledger entries.
    #[arg(long, default_value_t = DEFAULT_TIMEZONE.to_owned())]
    timezone: String,

    /// How many hours an establishment may edit or delete an entry after creating it.
    #[arg(long, default_value_t = 10)]
    edit_window_hours: u32,

    /// Let ledger entries take a member's credit below zero.
    #[arg(long)]
    allow_negative_credit: bool,

    /// The directory with the CSS, JavaScript and image files served under /static.
    #[arg(long, default_value = "static/")]
    static_dir: PathBuf,

    /// Log the body of every request and response.
    #[arg(long)]
    log_bodies: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let secret = env::var("SECRET").map_err(|_| "The environment variable 'SECRET' must be set")?;

    let config = AppConfig {
        local_timezone: args.timezone,
        edit_window: EditWindow::from_hours(args.edit_window_hours),
        credit_policy: if args.allow_negative_credit {
            CreditPolicy::AllowNegative
        } else {
            CreditPolicy::RequireSufficientCredit
        },
    };
    tracing::info!(
        "Using timezone {}, an edit window of {} hours and {:?}",
        config.local_timezone,
        args.edit_window_hours,
        config.credit_policy
    );

    let connection = Connection::open(&args.db_path)?;
    let state = AppState::new(connection, &secret, config)?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state, &args.static_dir);
    let router = if args.log_bodies {
        router.layer(middleware::from_fn(logging_middleware))
    } else {
        router
    };
    let router = add_tracing_layer(router);

    #[cfg(debug_assertions)]
    let router = router.layer(LiveReloadLayer::new());

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
