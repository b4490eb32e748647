use std::{
    future::IntoFuture as _,
    io,
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        OnceLock,
    },
};

use application::{
    args::{AdminCommand, Command, OfferCommand},
    cli, Args, Config, Error, Service,
};
use service::infra::{postgres, LogNotifier, Postgres};
use tracing as log;
use tracing_subscriber::{
    filter::filter_fn,
    layer::{Layer as _, SubscriberExt as _},
    util::SubscriberInitExt as _,
};

const STDERR_LEVELS: &[log::Level] = &[log::Level::WARN, log::Level::ERROR];

static LOG_LEVEL: OnceLock<log::Level> = OnceLock::new();

/// Indicator whether STDOUT carries a JSON output, so no logs may go there.
static STDOUT_RESERVED: AtomicBool = AtomicBool::new(false);

postgres::embed_migrations!("../migrations");

#[tokio::main]
async fn main() -> ExitCode {
    let enabled = |meta: &log::Metadata<'_>| {
        LOG_LEVEL.get().copied().unwrap_or(log::Level::INFO) >= *meta.level()
    };
    let to_stderr = |meta: &log::Metadata<'_>| {
        STDERR_LEVELS.contains(meta.level())
            || STDOUT_RESERVED.load(Ordering::Relaxed)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_thread_names(true)
                .with_writer(io::stdout)
                .with_filter(filter_fn(move |meta| {
                    meta.is_span() || (!to_stderr(meta) && enabled(meta))
                })),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_thread_names(true)
                .with_writer(io::stderr)
                .with_filter(filter_fn(move |meta| {
                    meta.is_span() || (to_stderr(meta) && enabled(meta))
                })),
        )
        .init();

    let args = Args::parse().unwrap_or_else(|e| e.exit());

    match start(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            match serde_json::to_string_pretty(&e) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{e}"),
            }
            e.exit_code()
        }
    }
}

async fn start(args: Args) -> Result<(), Error> {
    let Args { config, command } = args;

    let Config {
        postgres,
        service,
        log,
    } = Config::new(&config).map_err(|e| {
        Error::internal(&format!("failed to load `Config`: {e}"))
    })?;

    LOG_LEVEL
        .set(log.level.into())
        .unwrap_or_else(|_| unreachable!("first initialization"));
    STDOUT_RESERVED.store(
        !matches!(command, Command::Migrate | Command::Run),
        Ordering::Relaxed,
    );

    let postgres_config = postgres.into();
    let mut postgres = Postgres::new(&postgres_config).map_err(|e| {
        Error::internal(&format!("failed to initialize `Postgres` client: {e}"))
    })?;

    match command {
        Command::Migrate => migrate(&mut postgres).await,
        Command::Run => {
            migrate(&mut postgres).await?;

            let (_service, background) =
                Service::new(service.into(), postgres, LogNotifier);
            log::info!("running background tasks");

            background
                .into_future()
                .await
                .map_err(|e| Error::internal(&e))
        }
        Command::Meta => {
            let svc =
                Service::without_tasks(service.into(), postgres, LogNotifier);
            cli::print(&cli::meta::execute(&svc).await?).await
        }
        Command::Calculate { input } => {
            let svc =
                Service::without_tasks(service.into(), postgres, LogNotifier);
            let input = cli::read_input(&input).await?;
            cli::print(&cli::calculate::execute(&svc, input).await?).await
        }
        Command::Offer(cmd) => {
            let svc =
                Service::without_tasks(service.into(), postgres, LogNotifier);
            offer(&svc, cmd).await
        }
        Command::Admin(cmd) => {
            let svc =
                Service::without_tasks(service.into(), postgres, LogNotifier);
            admin(&svc, cmd).await
        }
    }
}

/// Applies pending database migrations.
async fn migrate(postgres: &mut Postgres) -> Result<(), Error> {
    let report =
        migrations::runner()
            .run_async(postgres)
            .await
            .map_err(|e| {
                Error::internal(&format!(
                    "failed to run database migrations: {e}",
                ))
            })?;
    log::info!(
        "applied {} database migrations",
        report.applied_migrations().len(),
    );
    Ok(())
}

/// Executes the provided [`OfferCommand`], printing the resulting offer.
async fn offer(svc: &Service, cmd: OfferCommand) -> Result<(), Error> {
    let offer = match cmd {
        OfferCommand::Show { token } => cli::offer::show(svc, &token).await?,
        OfferCommand::Create { input } => {
            let input = cli::read_input(&input).await?;
            cli::offer::create(svc, input).await?
        }
        OfferCommand::Package { token, key } => {
            cli::offer::package(svc, &token, key).await?
        }
        OfferCommand::Discount { token, code } => {
            cli::offer::discount(svc, &token, code).await?
        }
        OfferCommand::Billing { token, input } => {
            let input = cli::read_input(&input).await?;
            cli::offer::billing(svc, &token, input).await?
        }
        OfferCommand::Confirm { token } => {
            cli::offer::confirm(svc, &token).await?
        }
        OfferCommand::Price { id, price } => {
            cli::offer::price(svc, &id, price).await?
        }
    };
    cli::print(&offer).await
}

/// Executes the provided [`AdminCommand`], printing the affected record.
async fn admin(svc: &Service, cmd: AdminCommand) -> Result<(), Error> {
    match cmd {
        AdminCommand::PropertyType { input } => {
            let input = cli::read_input(&input).await?;
            cli::print(&cli::admin::property_type(svc, input).await?).await
        }
        AdminCommand::Pricing { input } => {
            let input = cli::read_input(&input).await?;
            cli::print(&cli::admin::pricing(svc, input).await?).await
        }
        AdminCommand::Formula { input } => {
            let input = cli::read_input(&input).await?;
            cli::print(&cli::admin::formula(svc, input).await?).await
        }
        AdminCommand::DiscountCode { input } => {
            let input = cli::read_input(&input).await?;
            cli::print(&cli::admin::discount_code(svc, input).await?).await
        }
        AdminCommand::DeleteDiscountCode { code } => {
            let deleted = cli::admin::delete_discount_code(svc, code).await?;
            cli::print(&deleted).await
        }
    }
}
