use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use vcd_preflight::api::{Credentials, HttpApiClient, VcdSession};
use vcd_preflight::cli::commands::{FactsCommand, RunCommand, ValidateCommand};
use vcd_preflight::cli::output::*;
use vcd_preflight::cli::{Cli, Command};
use vcd_preflight::core::MigrationConfig;
use vcd_preflight::execution::{PreflightEngine, PreflightEvent, STEP_SEQUENCE};
use vcd_preflight::persistence::FactStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_preflight(cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Facts(cmd) => show_facts(cmd)?,
    }

    Ok(())
}

fn open_store(config: &MigrationConfig) -> Result<FactStore> {
    let store = match &config.facts_path {
        Some(path) => FactStore::new(path),
        None => FactStore::with_default_path()?,
    };
    Ok(store)
}

async fn run_preflight(cmd: &RunCommand) -> Result<()> {
    let config =
        MigrationConfig::from_file(&cmd.file).context("Failed to load migration config")?;

    println!(
        "{} Loaded migration config for organization {}",
        INFO,
        style(&config.organization).bold()
    );

    let store = open_store(&config)?;
    println!(
        "{} Fact document: {}",
        INFO,
        style(store.path().display()).dim()
    );

    let client = HttpApiClient::new(config.vcd.verify_tls)?;
    let credentials = Credentials::new(&config.vcd.username, &config.vcd.password);
    let session = VcdSession::new(client, config.vcd.endpoint.clone(), credentials);

    let mut engine = PreflightEngine::new(session, store, config);

    // Console progress driven by engine events
    let progress = create_progress_bar(STEP_SEQUENCE.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| match event {
        PreflightEvent::StepStarted { name, .. } => {
            bar.set_message(name.to_string());
        }
        PreflightEvent::StepCompleted { .. } => {
            bar.inc(1);
        }
        PreflightEvent::RunFailed { .. }
        | PreflightEvent::RollbackStarted { .. }
        | PreflightEvent::RollbackCompleted { .. }
        | PreflightEvent::RollbackFailed { .. } => {
            bar.println(format_event(event));
        }
        _ => {}
    });

    println!();
    let result = engine.execute().await;
    progress.finish_and_clear();

    match result {
        Ok(report) => {
            println!(
                "{} {} is {}",
                CHECK,
                style("source environment").bold(),
                style("eligible for migration").green()
            );
            println!("  Source org VDC id: {}", style(&report.source_org_vdc_id).cyan());
            println!("  Edge gateway id:   {}", style(&report.edge_gateway_id).cyan());
            println!(
                "  Org VDC networks:  {}",
                style(report.org_vdc_networks.len()).cyan()
            );
            println!(
                "  BGP configured:    {}",
                style(report.bgp_config.is_some()).cyan()
            );
            println!(
                "  IPSec configured:  {}",
                style(report.ipsec_config.is_some()).cyan()
            );
            println!(
                "  Completed at:      {}",
                style(report.completed_at.to_rfc3339()).dim()
            );
            if cmd.show_facts {
                let document = engine.store().read_all()?;
                println!("\n{}", serde_json::to_string_pretty(&document)?);
            }
            Ok(())
        }
        Err(err) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style("preflight validation").bold(),
                style("failed").red()
            );
            println!("  {}", style(&err).red());
            std::process::exit(1);
        }
    }
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating migration config...", INFO);

    match MigrationConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Migration config is valid!", CHECK);
            println!("  Organization:   {}", style(&config.organization).bold());
            println!("  Source org VDC: {}", style(&config.source_org_vdc).cyan());
            println!(
                "  Target org VDC: {}",
                style(config.target_org_vdc_name()).cyan()
            );
            println!(
                "  Provider VDCs:  {} -> {}",
                style(&config.nsxv_provider_vdc.name).cyan(),
                style(&config.nsxt_provider_vdc.name).cyan()
            );
            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(err) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(err).red());
            std::process::exit(1);
        }
    }
}

fn show_facts(cmd: &FactsCommand) -> Result<()> {
    let store = match &cmd.file {
        Some(file) => {
            let config =
                MigrationConfig::from_file(file).context("Failed to load migration config")?;
            open_store(&config)?
        }
        None => FactStore::with_default_path()?,
    };

    let document = store.read_all()?;
    if document.is_empty() {
        println!("{} No facts recorded at {}", INFO, store.path().display());
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
