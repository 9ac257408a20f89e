use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use binck_export::browser::ChromeBrowser;
use binck_export::clock::SystemClock;
use binck_export::config::{default_config_path, Config};
use binck_export::portal::{login, PortalApiClient};
use binck_export::reports::{run_report, ReportContext, ReportKind};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "binck-export")]
#[command(about = "Export reports from the Binck web portal")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dividends received per security during the report year
    #[command(name = "export:cash-dividend-report")]
    CashDividendReport,

    /// Position mutations of every fund held during the report year
    #[command(name = "export:investments")]
    Investments,

    /// Realized results of tracker sales during the report year
    #[command(name = "export:sales-report")]
    SalesReport,

    /// Position history of every fund currently in the portfolio
    #[command(name = "export:transaction-history")]
    TransactionHistory,
}

impl Command {
    fn report(&self) -> ReportKind {
        match self {
            Command::CashDividendReport => ReportKind::CashDividends,
            Command::Investments => ReportKind::Investments,
            Command::SalesReport => ReportKind::Sales,
            Command::TransactionHistory => ReportKind::TransactionHistory,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off")
    });
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_default(&config_path)?;
    let kind = cli.command.report();

    // Fail on missing credentials before a browser is started.
    config.credentials.require()?;

    let browser = ChromeBrowser::launch(&config.browser)
        .await
        .context("Failed to start Chrome")?;
    let result = export(&browser, &config, &config_path, kind).await;
    if let Err(e) = browser.shutdown().await {
        warn!(error = %e, "failed to close browser");
    }
    result
}

async fn export(
    browser: &ChromeBrowser,
    config: &Config,
    config_path: &Path,
    kind: ReportKind,
) -> Result<()> {
    let (username, password) = config.credentials.require()?;
    let session = login(browser, &config.portal, username, password, config.wait).await?;
    let api = PortalApiClient::new(&config.portal.base_url)?;
    let ctx = ReportContext::new(
        session,
        api,
        config.portal.clone(),
        config.reports.clone(),
        Arc::new(SystemClock),
    );

    let output = run_report(kind, &ctx)
        .await
        .with_context(|| format!("Failed to build the {kind}"))?;

    for (caption, table) in &output.tables {
        if let Some(caption) = caption {
            println!("{caption}");
        }
        println!("{table}\n");
    }

    let path = output.save(&config.resolve_output_dir(config_path))?;
    info!(path = %path.display(), "export written");
    println!("Saved {}", path.display());
    Ok(())
}
