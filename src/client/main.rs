//! This client is the rider's terminal front-end. `scan` reads decoded QR
//! codes from stdin and pays the fare for each one; `register` and `topup`
//! validate their form locally before sending it to the server; `respond`
//! answers a boarding notification. Outcomes are shown as banners on a
//! terminal-backed page.
use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use farepass::{
    bootstrap::Bootstrap,
    config::ClientConfig,
    form::{check_topup, validate_registration_form, validate_topup_form},
    notify::Notifier,
    page::{
        respond_to_notification, BannerEvent, Form, MemoryPage, NOTIFICATION_RESPONSE_FORM,
        REGISTRATION_FORM, SCAN_REGION, TOPUP_FORM,
    },
    request::{NotificationResponseRequest, RegisterRequest, TopUpRequest},
    response::{BoardingResponse, ErrorResponse, MessageResponse, TopUpResponse},
    scanner::{init_scanner, LineWidget},
    submit::{FareDesk, FareSubmitter},
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "client", version, about = "Pay bus fares by scanning QR codes")]
struct Cli {
    #[arg(long, global = true, help = "Config file to use instead of the default")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read decoded QR codes from stdin, one per line, and pay each fare.
    Scan,
    /// Create a rider account.
    Register(RegisterArgs),
    /// Add money to the rider's balance.
    Topup {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        payment_method: Option<String>,
    },
    /// Answer a boarding notification for the rider's regular bus.
    Respond {
        #[arg(long)]
        notification_id: String,
        /// `yes` claims a seat, anything else declines.
        #[arg(long)]
        response: String,
    },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    usn: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    bus_number: Option<String>,
    #[arg(long, default_value = "")]
    address: String,
}

/// Everything a subcommand needs.
struct Session {
    config: ClientConfig,
    client: reqwest::Client,
}

impl Session {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn notifier(&self, page: Arc<MemoryPage>) -> Notifier {
        Notifier::new(page).with_lifetime(self.config.notification_lifetime())
    }
}

/// A page whose banners are printed to the terminal.
fn terminal_page() -> MemoryPage {
    MemoryPage::new().with_observer(|event| match event {
        BannerEvent::Shown(banner) => println!("[{}] {}", banner.kind, banner.message),
        BannerEvent::Removed(id) => debug!("banner {id} removed"),
    })
}

/// Finds the location for this app's local configuration.
fn get_config_base_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        Ok(PathBuf::from(path))
    } else if let Some(home) = dirs::home_dir() {
        Ok(home.join(".config"))
    } else {
        Err(anyhow!("failed to find config file path"))
    }
}

/// Pays the fare for every code read from stdin.
async fn scan(session: &Session) -> anyhow::Result<bool> {
    let page = Arc::new(terminal_page().with_element(SCAN_REGION));
    let notifier = session.notifier(page.clone());
    let submitter = FareSubmitter::new(session.client.clone(), &session.config.base_url)
        .with_token(session.config.token.clone());
    let desk = FareDesk::new(submitter, notifier);

    let mut scanner = None;
    Bootstrap::new().on_ready(page.as_ref(), || {
        scanner = Some(init_scanner(
            page.as_ref(),
            SCAN_REGION,
            session.config.scanner,
            LineWidget::new(tokio::io::stdin()),
        ));
    });

    let scanner = scanner
        .context("page has no scan region")?
        .context("failed to start the scanner")?;
    let handled = desk.run(scanner.into_stream()).await;

    debug!("handled {handled} scanned codes");

    Ok(true)
}

async fn register(session: &Session, args: RegisterArgs) -> anyhow::Result<bool> {
    let form = Form::new()
        .with("usn", &args.usn)
        .with("name", &args.name)
        .with("password", &args.password)
        .with("confirm_password", &args.confirm_password)
        .with("phone", &args.phone)
        .with("email", &args.email);
    let page = Arc::new(terminal_page().with_form(REGISTRATION_FORM, form));
    let notifier = session.notifier(page.clone());

    if !validate_registration_form(page.as_ref(), &notifier) {
        return Ok(false);
    }

    let request = RegisterRequest {
        usn: args.usn,
        name: args.name,
        phone: args.phone,
        email: args.email,
        password: args.password,
        confirm_password: args.confirm_password,
        bus_number: args.bus_number,
        address: args.address,
    };

    let res = match session
        .client
        .post(session.url("/register"))
        .json(&request)
        .send()
        .await
    {
        Ok(res) => res,
        Err(err) => {
            debug!("registration request failed: {err:?}");
            notifier.error("Registration failed. Please try again.");
            return Ok(false);
        }
    };

    if res.status().is_success() {
        let body = res
            .json::<MessageResponse>()
            .await
            .context("failed to parse registration response")?;
        notifier.success(&body.message);
        Ok(true)
    } else {
        notifier.error(&error_message(res).await);
        Ok(false)
    }
}

async fn top_up(
    session: &Session,
    amount: String,
    payment_method: Option<String>,
) -> anyhow::Result<bool> {
    let form = Form::new().with("amount", amount);
    let page = Arc::new(terminal_page().with_form(TOPUP_FORM, form.clone()));
    let notifier = session.notifier(page.clone());

    if !validate_topup_form(page.as_ref(), &notifier) {
        return Ok(false);
    }

    let amount = check_topup(&form)?;
    let mut req = session.client.post(session.url("/topup")).json(&TopUpRequest {
        amount,
        payment_method,
    });

    if let Some(token) = &session.config.token {
        req = req.bearer_auth(token);
    }

    let res = match req.send().await {
        Ok(res) => res,
        Err(err) => {
            debug!("top-up request failed: {err:?}");
            notifier.error("An error occurred. Please try again.");
            return Ok(false);
        }
    };

    if res.status().is_success() {
        let body = res
            .json::<TopUpResponse>()
            .await
            .context("failed to parse top-up response")?;
        notifier.success(&body.message);
        Ok(true)
    } else {
        notifier.error(&error_message(res).await);
        Ok(false)
    }
}

async fn respond(
    session: &Session,
    notification_id: String,
    response: String,
) -> anyhow::Result<bool> {
    let form = Form::new()
        .with("notification_id", "")
        .with("response", "");
    let page = Arc::new(terminal_page().with_form(NOTIFICATION_RESPONSE_FORM, form));
    let notifier = session.notifier(page.clone());

    let form = respond_to_notification(page.as_ref(), &notification_id, &response)
        .context("notification response form could not be filled")?;
    let request = NotificationResponseRequest {
        notification_id: form.value("notification_id").to_owned(),
        response: form.value("response").to_owned(),
    };

    let mut req = session
        .client
        .post(session.url("/respond-notification"))
        .json(&request);

    if let Some(token) = &session.config.token {
        req = req.bearer_auth(token);
    }

    let res = match req.send().await {
        Ok(res) => res,
        Err(err) => {
            debug!("notification response failed: {err:?}");
            notifier.error("An error occurred. Please try again.");
            return Ok(false);
        }
    };

    if !res.status().is_success() {
        notifier.error(&error_message(res).await);
        return Ok(false);
    }

    let body = res
        .json::<BoardingResponse>()
        .await
        .context("failed to parse notification response")?;

    if body.success {
        notifier.success(&body.message);
    } else {
        notifier.error(&body.message);
        for bus in &body.alternatives {
            println!(
                "  Bus {}: {} to {}, {} seats left, fare ₹{:.2}",
                bus.bus_number, bus.starting_point, bus.ending_point, bus.available_seats, bus.fare
            );
        }
    }

    Ok(body.success)
}

/// Pulls the server's error text out of a failed response.
async fn error_message(res: reqwest::Response) -> String {
    let status = res.status();

    match res.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => format!("Request failed with status {status}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // setup logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "client=debug".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global default")?;

    // determine config file path
    let config_file_path = match cli.config {
        Some(path) => path,
        None => get_config_base_path()?.join("farepass").join("config.toml"),
    };
    let config = ClientConfig::load(&config_file_path).context("failed to load config file")?;

    debug!("config file path: {:?}", config_file_path);
    debug!("base url: {}", config.base_url);

    // use the same http client for all requests
    let session = Session {
        config,
        client: reqwest::Client::new(),
    };

    let ok = match cli.command {
        Commands::Scan => scan(&session).await?,
        Commands::Register(args) => register(&session, args).await?,
        Commands::Topup {
            amount,
            payment_method,
        } => top_up(&session, amount, payment_method).await?,
        Commands::Respond {
            notification_id,
            response,
        } => respond(&session, notification_id, response).await?,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
