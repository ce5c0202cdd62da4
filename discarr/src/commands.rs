use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use discarr_config::{Config, ServiceConfig, validate_metadata_sweep};
use discarr_core::infra::{
    ArrClient, MarkFailedExecutor, MetadataStallSource, TransmissionClient,
};
use discarr_core::{JsonFileLedgerStore, LedgerStore, Reconciler, RunReport};
use discarr_model::{LedgerTimestamp, ServiceKind};
use tracing::{error, info};

use crate::cli::LedgerTarget;

/// Name the metadata sweep logs under.
const METADATA_SWEEP: &str = "transmission-metadata";

/// Outcome of a command that may partially fail.
#[derive(Debug, Default)]
pub struct Outcome {
    pub aborted: Vec<String>,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        self.aborted.is_empty()
    }
}

/// Run the stall sweep for each requested service, or every configured one
/// when `requested` is empty. Services run one after another; a failure in
/// one does not stop the next.
pub async fn run_services(
    config: &Config,
    requested: &[ServiceKind],
) -> anyhow::Result<Outcome> {
    let selected: Vec<&ServiceConfig> = if requested.is_empty() {
        config.services().collect()
    } else {
        let mut seen = BTreeSet::new();
        let mut selected = Vec::new();
        for kind in requested {
            if !seen.insert(kind.as_str()) {
                continue;
            }
            let service = config.service(*kind).with_context(|| {
                format!("{kind} was requested but is not configured")
            })?;
            selected.push(service);
        }
        selected
    };

    if selected.is_empty() {
        info!("no services configured; nothing to do");
    }

    let mut outcome = Outcome::default();
    for service in selected {
        let name = service.kind.as_str();
        match run_service(service, config.request_timeout).await {
            Ok(report) => log_report(name, &report),
            Err(err) => {
                let detail = format!("{err:#}");
                error!(service = name, error = %detail, "run aborted");
                outcome.aborted.push(name.to_string());
            }
        }
    }
    Ok(outcome)
}

async fn run_service(
    service: &ServiceConfig,
    timeout: Duration,
) -> anyhow::Result<RunReport> {
    let client = Arc::new(
        ArrClient::new(
            service.kind,
            &service.url,
            service.api_key.clone(),
            timeout,
        )
        .with_context(|| format!("failed to build {} client", service.kind))?,
    );
    let store = Arc::new(JsonFileLedgerStore::new(&service.ledger_path));
    let reconciler = Reconciler::new(
        service.kind.as_str(),
        client.clone(),
        client,
        store,
        service.thresholds.policy(),
    );
    Ok(reconciler.run().await?)
}

/// Sweep Transmission for torrents that never obtained metadata and fail
/// them through whichever *arr service tracks them.
pub async fn run_metadata_sweep(config: &Config) -> anyhow::Result<Outcome> {
    validate_metadata_sweep(config)?;
    let Some(transmission_config) = config.transmission.as_ref() else {
        bail!("transmission is not configured");
    };

    let transmission = Arc::new(
        TransmissionClient::new(
            &transmission_config.url,
            transmission_config.credentials(),
            config.request_timeout,
        )
        .context("failed to build transmission client")?,
    );

    let mut services = Vec::new();
    for service in config.services() {
        services.push(Arc::new(
            ArrClient::new(
                service.kind,
                &service.url,
                service.api_key.clone(),
                config.request_timeout,
            )
            .with_context(|| {
                format!("failed to build {} client", service.kind)
            })?,
        ));
    }

    let reconciler = Reconciler::new(
        METADATA_SWEEP,
        Arc::new(MetadataStallSource::new(transmission.clone())),
        Arc::new(MarkFailedExecutor::new(services, transmission)),
        Arc::new(JsonFileLedgerStore::new(
            &config.metadata_sweep.ledger_path,
        )),
        config.metadata_sweep.policy(),
    );

    let mut outcome = Outcome::default();
    match reconciler.run().await {
        Ok(report) => log_report(METADATA_SWEEP, &report),
        Err(err) => {
            error!(service = METADATA_SWEEP, error = %err, "run aborted");
            outcome.aborted.push(METADATA_SWEEP.to_string());
        }
    }
    Ok(outcome)
}

fn log_report(service: &str, report: &RunReport) {
    if !report.failed_discards.is_empty() {
        info!(
            service,
            failed = ?report.failed_discards,
            "some discards failed and will be retried next run"
        );
    }
}

/// Print a ledger's ids, last-healthy timestamps and their age.
pub fn print_ledger(config: &Config, target: LedgerTarget) {
    let path = match target {
        LedgerTarget::Radarr => ledger_path(config, ServiceKind::Radarr),
        LedgerTarget::Sonarr => ledger_path(config, ServiceKind::Sonarr),
        LedgerTarget::Metadata => config.metadata_sweep.ledger_path.clone(),
    };
    let rendered = render_ledger(&path, LedgerTimestamp::now());
    print!("{rendered}");
}

fn ledger_path(config: &Config, kind: ServiceKind) -> std::path::PathBuf {
    config
        .service(kind)
        .map(|service| service.ledger_path.clone())
        .unwrap_or_else(|| config.state_dir.join(kind.default_ledger_file()))
}

pub(crate) fn render_ledger(path: &Path, now: LedgerTimestamp) -> String {
    let ledger = JsonFileLedgerStore::new(path).load();
    let mut out = format!("{} ({} entries)\n", path.display(), ledger.len());
    for record in ledger.records() {
        let age = record
            .last_healthy_at
            .elapsed_until(now)
            .to_std()
            .map(|elapsed| Duration::from_secs(elapsed.as_secs()))
            .unwrap_or_default();
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            record.id,
            record.last_healthy_at,
            humantime::format_duration(age)
        ));
    }
    out
}

/// Print a summary of the effective configuration.
pub fn print_config_summary(config: &Config) {
    match &config.metadata.config_path {
        Some(path) => println!("config file: {}", path.display()),
        None => println!("config file: none"),
    }
    println!("state dir: {}", config.state_dir.display());
    println!(
        "request timeout: {}",
        humantime::format_duration(config.request_timeout)
    );
    for service in config.services() {
        println!(
            "{}: {} (download {}, catch-up {}, ledger {})",
            service.kind,
            service.url,
            humantime::format_duration(
                service.thresholds.max_allowed_download_time
            ),
            humantime::format_duration(
                service.thresholds.max_allowed_catchup_time
            ),
            service.ledger_path.display()
        );
    }
    match &config.transmission {
        Some(transmission) => println!(
            "transmission: {} (metadata window {})",
            transmission.url,
            humantime::format_duration(
                config.metadata_sweep.max_time_without_metadata
            )
        ),
        None => println!("transmission: not configured"),
    }
}
