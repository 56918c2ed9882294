//! vendor-store - terminal storefront for restaurant vendors
//!
//! ```bash
//! vendor-store login vendor@test.com
//! vendor-store orders
//! vendor-store accept A123 --prep 20
//! vendor-store watch
//! vendor-store --demo watch --simulate 10
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use shared::OrderStatus;
use store_client::{MemoryService, MutationOutcome, NotificationOutcome, SessionStore, StoreClient};
use store_app::alerts::{self, Alert};
use store_app::dashboard::Dashboard;
use store_app::{AppConfig, LoginFlow, Route, WatchCommand, demo, logger, render, startup_route};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "vendor-store", about = "Vendor storefront for food delivery orders")]
struct Cli {
    /// Hosted service base URL
    #[arg(long, env = "STORE_SERVICE_URL")]
    service_url: Option<String>,

    /// Public API key of the hosted project
    #[arg(long, env = "STORE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding the persisted session
    #[arg(long, env = "STORE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter (e.g. "info", "store_client=debug")
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// JSON log lines
    #[arg(long)]
    log_json: bool,

    /// Directory for rotating log files
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Run against a seeded in-memory backend, signed in as the demo vendor
    #[arg(long)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login {
        email: String,
        /// Read from STORE_PASSWORD or prompted when omitted
        #[arg(long, env = "STORE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the session
    Logout,
    /// Show the vendor and owned restaurants
    Profile,
    /// List orders (active ones by default)
    Orders {
        #[arg(long, value_parser = parse_status)]
        status: Option<OrderStatus>,
        /// Include delivered and cancelled orders
        #[arg(long)]
        all: bool,
    },
    /// Show one order in detail, by display code or id
    Show { order_id: String },
    /// Accept a pending order
    Accept {
        order_id: String,
        /// Preparation time in minutes
        #[arg(long)]
        prep: Option<u32>,
    },
    /// Reject an order
    Reject {
        order_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Mark an accepted order ready for pickup
    Ready { order_id: String },
    /// Live dashboard
    Watch {
        /// Demo only: place a new order every N seconds
        #[arg(long)]
        simulate: Option<u64>,
    },
}

fn parse_status(value: &str) -> Result<OrderStatus, String> {
    value
        .parse()
        .map_err(|_| format!("unknown status '{value}'"))
}

/// Backend plus persisted session for one invocation
struct Context {
    client: StoreClient,
    session: Arc<Mutex<SessionStore>>,
    demo: Option<MemoryService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(url) = &cli.service_url {
        config.client.service_url = url.trim_end_matches('/').to_string();
    }
    if let Some(key) = &cli.api_key {
        config.client.api_key = key.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.client.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config.log_json |= cli.log_json;
    if cli.log_dir.is_some() {
        config.log_dir = cli.log_dir.clone();
    }

    logger::init_logger(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    tracing::debug!(demo = cli.demo, service_url = %config.client.service_url, "Starting");

    let ctx = connect(&config, cli.demo).await?;
    match cli.command {
        Command::Login { email, password } => login(&ctx, &email, password).await,
        Command::Logout => logout(&ctx).await,
        Command::Profile => profile(&ctx).await,
        Command::Orders { status, all } => orders(&ctx, status, all).await,
        Command::Show { order_id } => show(&ctx, &order_id).await,
        Command::Accept { order_id, prep } => {
            let id = resolve_order(&ctx, &order_id).await?;
            let outcome = ctx.client.orders().accept_order(&id, prep).await?;
            report(&outcome);
            Ok(())
        }
        Command::Reject { order_id, reason } => {
            let id = resolve_order(&ctx, &order_id).await?;
            let outcome = ctx.client.orders().reject_order(&id, &reason).await?;
            report(&outcome);
            Ok(())
        }
        Command::Ready { order_id } => {
            let id = resolve_order(&ctx, &order_id).await?;
            let outcome = ctx.client.orders().mark_ready(&id).await?;
            report(&outcome);
            Ok(())
        }
        Command::Watch { simulate } => watch(ctx, simulate.map(Duration::from_secs)).await,
    }
}

async fn connect(config: &AppConfig, demo_mode: bool) -> anyhow::Result<Context> {
    if demo_mode {
        // Demo sessions live next to, never over, the real one
        let session = SessionStore::new(config.client.data_dir.join("demo-session.json"));
        let service = demo::demo_service();
        let ctx = Context {
            client: StoreClient::memory(service.clone()),
            session: Arc::new(Mutex::new(session)),
            demo: Some(service),
        };
        LoginFlow::new(ctx.client.clone(), ctx.session.clone())
            .submit(demo::DEMO_EMAIL, demo::DEMO_PASSWORD)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        return Ok(ctx);
    }

    config.client.validate()?;
    let session = SessionStore::load(config.session_file())
        .with_context(|| format!("reading {}", config.session_file().display()))?;
    Ok(Context {
        client: StoreClient::http(&config.client)?,
        session: Arc::new(Mutex::new(session)),
        demo: None,
    })
}

/// Restaurant of the restored session, or a hint to log in
async fn require_session(ctx: &Context) -> anyhow::Result<String> {
    match startup_route(&ctx.client, &ctx.session, store_app::login::unix_now()).await {
        Route::Dashboard { restaurant_id } => Ok(restaurant_id),
        Route::Login => bail!("Not logged in, run `vendor-store login <email>` first"),
    }
}

/// Row id of an order given by display code or id, within the session restaurant
async fn resolve_order(ctx: &Context, reference: &str) -> anyhow::Result<String> {
    let restaurant_id = require_session(ctx).await?;
    let order = ctx.client.orders().find_order(&restaurant_id, reference).await?;
    Ok(order.id)
}

async fn login(ctx: &Context, email: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ").await?,
    };
    let flow = LoginFlow::new(ctx.client.clone(), ctx.session.clone());
    match flow.submit(email, &password).await {
        Ok(Route::Dashboard { restaurant_id }) => {
            println!("Logged in, restaurant {restaurant_id}");
            Ok(())
        }
        Ok(Route::Login) => bail!("Login did not complete"),
        Err(e) => {
            tracing::warn!(code = %e.code(), "Login failed: {e}");
            bail!(e.user_message())
        }
    }
}

async fn logout(ctx: &Context) -> anyhow::Result<()> {
    if let Err(e) = require_session(ctx).await {
        tracing::debug!("No live session to sign out: {e}");
    } else if let Err(e) = ctx.client.auth().sign_out().await {
        tracing::warn!("Sign-out failed, clearing local session anyway: {e}");
    }
    ctx.session.lock().clear()?;
    println!("Logged out");
    Ok(())
}

async fn profile(ctx: &Context) -> anyhow::Result<()> {
    let current = require_session(ctx).await?;
    let profile = ctx.client.auth().get_profile().await?;
    let user = &profile.user;
    println!(
        "{} <{}>",
        user.name.as_deref().unwrap_or("Vendor"),
        user.email.as_deref().unwrap_or("-")
    );
    for restaurant in &profile.restaurants {
        let marker = if restaurant.id == current { "*" } else { " " };
        println!("{marker} {} ({})", restaurant.name, restaurant.id);
    }
    if profile.restaurants.is_empty() {
        println!("No restaurants found for this vendor");
    }
    Ok(())
}

async fn orders(ctx: &Context, status: Option<OrderStatus>, all: bool) -> anyhow::Result<()> {
    let restaurant_id = require_session(ctx).await?;
    let orders = match (status, all) {
        (Some(status), _) => {
            ctx.client
                .orders()
                .get_orders_for_restaurant(&restaurant_id, Some(status))
                .await?
        }
        (None, true) => {
            ctx.client
                .orders()
                .get_orders_for_restaurant(&restaurant_id, None)
                .await?
        }
        (None, false) => ctx.client.orders().get_active_orders(&restaurant_id).await?,
    };
    if orders.is_empty() {
        println!("No orders");
    }
    for order in &orders {
        println!("{}", render::order_line(order));
    }
    Ok(())
}

async fn show(ctx: &Context, order_id: &str) -> anyhow::Result<()> {
    let restaurant_id = require_session(ctx).await?;
    let order = ctx.client.orders().find_order(&restaurant_id, order_id).await?;
    print!("{}", render::order_detail(&order));
    Ok(())
}

fn report(outcome: &MutationOutcome) {
    println!(
        "Order {} is now {}",
        outcome.order.order_id,
        outcome.order.order_status.label()
    );
    if let NotificationOutcome::Failed(reason) = &outcome.notification {
        println!("Warning: customer was not notified ({reason})");
    }
}

async fn watch(ctx: Context, simulate: Option<Duration>) -> anyhow::Result<()> {
    require_session(&ctx).await?;
    let (alert_tx, mut alert_rx) = alerts::channel();
    let dashboard = Dashboard::new(ctx.client.clone(), ctx.session.clone(), alert_tx);

    let cancel = CancellationToken::new();
    let simulator = match (&ctx.demo, simulate) {
        (Some(service), Some(every)) => Some(demo::spawn_simulator(
            service.clone(),
            every,
            cancel.clone(),
        )),
        (None, Some(_)) => {
            tracing::warn!("--simulate only applies with --demo");
            None
        }
        _ => None,
    };

    if let Err(e) = dashboard.mount().await {
        // Mount already raised an alert describing the failure
        while let Ok(alert) = alert_rx.try_recv() {
            eprintln!("{alert}");
        }
        cancel.cancel();
        return Err(e.into());
    }
    print!("{}", render::dashboard(&dashboard.snapshot()));
    println!("Type 'help' for commands");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(alert) = alert_rx.recv() => {
                print_alert(&alert);
                if alert.kind == alerts::AlertKind::NewOrder {
                    print!("{}", render::dashboard(&dashboard.snapshot()));
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.parse::<WatchCommand>() {
                    Ok(WatchCommand::Quit) => break,
                    Ok(command) => run_command(&dashboard, command).await,
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    cancel.cancel();
    if let Some(simulator) = simulator {
        let _ = simulator.await;
    }
    dashboard.unmount().await;
    tracing::info!("Dashboard closed");
    Ok(())
}

async fn run_command(dashboard: &Dashboard, command: WatchCommand) {
    let resolve = |reference: &str| -> Option<String> {
        let state = dashboard.snapshot();
        state
            .find(reference)
            .or_else(|| state.find_by_code(reference))
            .map(|o| o.id.clone())
    };
    let unknown = |reference: &str| println!("No listed order '{reference}'");

    match command {
        WatchCommand::List => print!("{}", render::dashboard(&dashboard.snapshot())),
        WatchCommand::Help => println!("{}", store_app::watch::HELP),
        WatchCommand::Refresh => {
            if dashboard.refresh().await.is_ok() {
                print!("{}", render::dashboard(&dashboard.snapshot()));
            }
        }
        WatchCommand::Open(reference) => match resolve(&reference) {
            Some(id) => {
                dashboard.open_detail(&id);
                if let Some(order) = dashboard.snapshot().selected_order() {
                    print!("{}", render::order_detail(order));
                }
            }
            None => unknown(&reference),
        },
        WatchCommand::Close => {
            dashboard.close_detail();
            print!("{}", render::dashboard(&dashboard.snapshot()));
        }
        WatchCommand::Accept {
            order,
            preparation_time,
        } => match resolve(&order) {
            Some(id) => {
                if let Ok(outcome) = dashboard.accept(&id, preparation_time).await {
                    report(&outcome);
                }
            }
            None => unknown(&order),
        },
        WatchCommand::Reject { order, reason } => match resolve(&order) {
            Some(id) => {
                if let Ok(outcome) = dashboard.reject(&id, &reason).await {
                    report(&outcome);
                }
            }
            None => unknown(&order),
        },
        WatchCommand::Ready(order) => match resolve(&order) {
            Some(id) => {
                if let Ok(outcome) = dashboard.mark_ready(&id).await {
                    report(&outcome);
                }
            }
            None => unknown(&order),
        },
        WatchCommand::Quit => {}
    }
}

fn print_alert(alert: &Alert) {
    match alert.kind {
        alerts::AlertKind::NewOrder => println!("\x07>> {alert}"),
        alerts::AlertKind::Info => println!("{alert}"),
        _ => eprintln!("!! {alert}"),
    }
}

async fn prompt(label: &str) -> anyhow::Result<String> {
    use tokio::io::AsyncWriteExt;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let line = lines.next_line().await?.unwrap_or_default();
    Ok(line.trim_end().to_string())
}
