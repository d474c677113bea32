use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use checkout::api::{ContractStatus, NewCounterparty, PortalApi, PortalClient};
use checkout::config::Config;
use checkout::logging;
use checkout::services::{SignatureEvent, SignatureMonitor};
use checkout::state::FileStateStore;
use checkout::wizard::{CheckoutStep, StepEntry, WizardController};

#[derive(Parser)]
#[command(name = "checkout")]
#[command(about = "Checkout and e-signing client for direct-marketing contracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available offers
    Offers,

    /// Choose the offer to contract
    Select {
        /// Offer identifier from `checkout offers`
        offer_id: i64,
    },

    /// Enter customer details and create the customer record
    Customer {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        street: String,

        #[arg(long = "postal-code")]
        postal_code: String,

        #[arg(long)]
        city: String,

        /// 2-letter uppercase country code
        #[arg(long, default_value = "DE")]
        country: String,

        /// person or company
        #[arg(long = "type", default_value = "person")]
        kind: String,
    },

    /// Create (or reuse) the contract draft and show it
    Preview,

    /// Start e-signing for the drafted contract
    Sign {
        /// Poll until the contract is signed
        #[arg(long)]
        wait: bool,
    },

    /// Show stored checkout progress
    Status,

    /// Discard progress and start over
    Reset,

    /// Write the default config file
    Init,
}

type Controller = WizardController<FileStateStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _logging = logging::init_logging(&config, cli.debug)?;

    let client = PortalClient::with_timeout(config.api.base_url.clone(), config.request_timeout())?;
    let api: Arc<dyn PortalApi> = Arc::new(client);
    let store = FileStateStore::new(config.state_path());
    let controller = WizardController::new(api.clone(), store);

    match cli.command {
        Commands::Offers => cmd_offers(&controller).await,
        Commands::Select { offer_id } => cmd_select(&controller, offer_id),
        Commands::Customer {
            name,
            email,
            street,
            postal_code,
            city,
            country,
            kind,
        } => {
            let new = NewCounterparty {
                kind,
                name,
                street,
                postal_code,
                city,
                country,
                email,
            };
            cmd_customer(&controller, &new).await
        }
        Commands::Preview => cmd_preview(&controller).await,
        Commands::Sign { wait } => cmd_sign(&controller, api, &config, wait).await,
        Commands::Status => cmd_status(&controller),
        Commands::Reset => {
            controller.restart();
            println!("Checkout progress cleared.");
            Ok(())
        }
        Commands::Init => cmd_init(&config),
    }
}

/// Step 1: list the offers to choose from
async fn cmd_offers(controller: &Controller) -> Result<()> {
    let offers = controller
        .list_offers()
        .await
        .context("Failed to list offers")?;

    if offers.is_empty() {
        println!("No offers available right now.");
        return Ok(());
    }

    println!("Available offers:");
    for offer in &offers {
        println!(
            "  [{}] {} - {} ({})",
            offer.id,
            offer.code,
            offer.name,
            offer.display_price()
        );
        if let Some(description) = &offer.description {
            println!("      {}", description);
        }
        println!(
            "      min term {} months, notice period {} days",
            offer.min_term_months, offer.notice_period_days
        );
    }
    println!();
    println!("Next: checkout select <OFFER_ID>");
    Ok(())
}

fn cmd_select(controller: &Controller, offer_id: i64) -> Result<()> {
    controller.select_offer(offer_id);
    println!("Offer {} selected.", offer_id);
    println!(
        "Next: checkout customer --name <NAME> --email <EMAIL> --street <STREET> \
         --postal-code <CODE> --city <CITY>"
    );
    Ok(())
}

async fn cmd_customer(controller: &Controller, new: &NewCounterparty) -> Result<()> {
    match controller
        .submit_customer(new)
        .await
        .context("Failed to create the customer record")?
    {
        StepEntry::Redirected(step) => redirect_to_offers(controller, step).await,
        StepEntry::Done(counterparty) => {
            println!(
                "Customer record {} created for {}.",
                counterparty.id, counterparty.name
            );
            println!("Next: checkout preview");
            Ok(())
        }
    }
}

async fn cmd_preview(controller: &Controller) -> Result<()> {
    match controller
        .prepare_preview()
        .await
        .context("Failed to prepare the contract draft")?
    {
        StepEntry::Redirected(step) => redirect_to_offers(controller, step).await,
        StepEntry::Done(contract) => {
            println!("Contract {} ({})", contract.id, contract.status);
            if let Some(offer) = &contract.offer {
                println!("  Offer:    {} - {}", offer.name, offer.display_price());
            }
            if let Some(counterparty) = &contract.counterparty {
                println!("  Customer: {} <{}>", counterparty.name, counterparty.email);
            }
            if contract.draft_pdf_available {
                println!("  Draft PDF: {}", controller.draft_pdf_url(&contract.id));
            }
            println!();
            println!("Next: checkout sign");
            Ok(())
        }
    }
}

async fn cmd_sign(
    controller: &Controller,
    api: Arc<dyn PortalApi>,
    config: &Config,
    wait: bool,
) -> Result<()> {
    // Re-check the contract once on entry; the signature may already have
    // come through, or signing may already be underway from a previous run.
    let contract = match controller
        .fetch_contract()
        .await
        .context("Failed to fetch the contract")?
    {
        StepEntry::Redirected(step) => return redirect_to_offers(controller, step).await,
        StepEntry::Done(contract) => contract,
    };

    match contract.status {
        ContractStatus::Signed => {
            println!("Contract {} is already signed.", contract.id);
            println!("Signed PDF: {}", controller.signed_pdf_url(&contract.id));
            controller.complete();
            return Ok(());
        }
        ContractStatus::Draft => {
            let session = match controller
                .start_signing()
                .await
                .context("Failed to start the signing session")?
            {
                StepEntry::Redirected(step) => return redirect_to_offers(controller, step).await,
                StepEntry::Done(session) => session,
            };
            println!("Signing session started with provider {}.", session.provider);
            println!("Sign here: {}", session.signing_url);
        }
        _ => {
            println!("Signing already in progress for contract {}.", contract.id);
        }
    }

    if wait {
        wait_for_signature(controller, api, config, &contract.id).await
    } else {
        println!();
        println!("Run `checkout sign --wait` to poll for the confirmation.");
        Ok(())
    }
}

/// Drive the signature monitor until it reports signed or gives up;
/// ctrl-c cancels the wait without aborting the signing itself.
async fn wait_for_signature(
    controller: &Controller,
    api: Arc<dyn PortalApi>,
    config: &Config,
    contract_id: &str,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let mut monitor = SignatureMonitor::new(api, contract_id, event_tx)
        .with_poll_interval(config.poll_interval())
        .with_max_attempts(config.signing.max_poll_attempts)
        .with_shutdown(shutdown_rx);
    let handle = tokio::spawn(async move { monitor.run().await });

    println!("Waiting for the signature confirmation (ctrl-c to stop waiting)...");

    tokio::select! {
        event = event_rx.recv() => match event {
            Some(SignatureEvent::Signed { contract }) => {
                println!("Contract {} signed.", contract.id);
                println!("Signed PDF: {}", controller.signed_pdf_url(&contract.id));
                controller.complete();
            }
            Some(SignatureEvent::TimedOut { attempts }) => {
                println!(
                    "Signing is taking longer than expected (checked {} times).",
                    attempts
                );
                println!("Run `checkout sign --wait` again to keep waiting.");
            }
            None => {}
        },
        _ = tokio::signal::ctrl_c() => {
            let _ = shutdown_tx.send(()).await;
            println!("Stopped waiting; signing can still complete on the provider side.");
        }
    }

    let _ = handle.await;
    Ok(())
}

fn cmd_status(controller: &Controller) -> Result<()> {
    let state = controller.state();
    if state.is_empty() {
        println!("No checkout in progress.");
        println!("Start with: checkout offers");
        return Ok(());
    }

    let resume = controller.resume_step();
    println!("Checkout progress:");
    let mut reached_resume = false;
    for step in CheckoutStep::all() {
        if *step == resume {
            reached_resume = true;
        }
        let marker = if reached_resume { ' ' } else { 'x' };
        println!("  [{}] {}", marker, step.title());
    }
    println!();
    println!(
        "  Offer:    {}",
        state
            .offer_id
            .map_or_else(|| "-".to_string(), |id| id.to_string())
    );
    println!(
        "  Customer: {}",
        state
            .counterparty_id
            .map_or_else(|| "-".to_string(), |id| id.to_string())
    );
    println!("  Contract: {}", state.contract_id.as_deref().unwrap_or("-"));
    println!();
    println!("Resume with: checkout {}", resume.command());
    Ok(())
}

fn cmd_init(config: &Config) -> Result<()> {
    config.save()?;
    println!("Wrote {}", Config::project_config_path().display());
    Ok(())
}

/// Entry guard fallback: earlier step data is missing, so the flow starts
/// over at offer selection. This is a navigation correction, not an error.
async fn redirect_to_offers(controller: &Controller, step: CheckoutStep) -> Result<()> {
    info!(step = %step, "prerequisites missing, returning to offer selection");
    println!("Missing earlier checkout data; returning to offer selection.");
    println!();
    cmd_offers(controller).await
}
