use std::sync::Arc;

use anyhow::Context;
use migrator_core::OutcomeKind;
use migrator_engine::{
    ArtifactStore, BrevoSource, CloudinaryStore, ContentTransformer, FetchSettings,
    HttpDraftPublisher, ImageRehoster, LedgerStore, MigrationPipeline, PipelineSettings,
    ReqwestImageFetcher, SessionCookies,
};
use migrator_logging::{migrator_debug, migrator_error, migrator_info, migrator_warn};

use crate::cli::RunArgs;
use crate::config::{MigratorConfig, StoragePaths};

fn base_pipeline(
    config: &MigratorConfig,
    transformer: ContentTransformer,
    batch_size: usize,
) -> anyhow::Result<MigrationPipeline> {
    let source = BrevoSource::new(config.brevo_api_key.clone(), &FetchSettings::default())
        .context("failed to build campaign source client")?
        .with_base_url(config.brevo_base_url.clone());

    Ok(MigrationPipeline::new(
        Arc::new(source),
        transformer,
        ArtifactStore::new(config.paths.converted_dir.clone()),
        LedgerStore::new(config.paths.ledger_path.clone()),
        PipelineSettings {
            batch_size,
            pacing: config.pacing,
            retry: config.retry.clone(),
            resume_from_artifacts: config.resume_from_artifacts,
        },
    ))
}

/// Wire every collaborator described by `config` into a pipeline.
fn batch_pipeline(config: &MigratorConfig, batch_size: usize) -> anyhow::Result<MigrationPipeline> {
    let settings = FetchSettings::default();

    let mut transformer = ContentTransformer::new();
    match &config.cloudinary {
        Some(cloudinary) => {
            let store = CloudinaryStore::new(cloudinary.credentials.clone(), &settings)
                .context("failed to build CDN client")?
                .with_base_url(cloudinary.base_url.clone());
            let fetcher = ReqwestImageFetcher::new(settings.clone())
                .context("failed to build image downloader")?;
            transformer = transformer.with_rehoster(
                ImageRehoster::new(Arc::new(fetcher), Arc::new(store))
                    .with_folder(cloudinary.folder.clone())
                    .with_retry(config.retry.clone()),
            );
        }
        None => migrator_warn!("Cloudinary is not configured; images keep their original URLs"),
    }

    migrator_debug!(
        "Remote calls: {} attempts, waits {:?}",
        config.retry.max_attempts,
        config.retry.delays()
    );
    let pipeline = base_pipeline(config, transformer, batch_size)?;
    match &config.publisher {
        Some(publisher) => {
            let cookies = SessionCookies::load(&publisher.cookies_path)?;
            let draft = HttpDraftPublisher::new(publisher.endpoint.clone(), cookies, &settings)?;
            migrator_info!("Publishing drafts to {}", publisher.endpoint);
            Ok(pipeline.with_publisher(Arc::new(draft)))
        }
        None => {
            migrator_info!("No DRAFT_ENDPOINT configured; running export-only");
            Ok(pipeline)
        }
    }
}

pub async fn run(config: &MigratorConfig, args: RunArgs) -> anyhow::Result<()> {
    let pipeline = batch_pipeline(config, args.batch_size)?;
    let summary = match pipeline.run().await {
        Ok(summary) => summary,
        Err(err) if !err.is_setup_failure() => {
            migrator_error!("Batch skipped: {}", err);
            println!("No campaigns processed: {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    for outcome in summary.outcomes() {
        if !matches!(outcome.kind, OutcomeKind::Skipped) {
            println!("{outcome}");
        }
    }
    println!("{summary}");
    Ok(())
}

pub async fn pending(config: &MigratorConfig) -> anyhow::Result<()> {
    let pipeline = base_pipeline(config, ContentTransformer::new(), 0)?;
    let statuses = pipeline.campaign_statuses().await?;

    let mut waiting = 0;
    for status in &statuses {
        if !status.exported {
            waiting += 1;
        }
        println!(
            "[{}] {:>8}  {:<25}  {}",
            if status.exported { "x" } else { " " },
            status.campaign.id.as_str(),
            status.campaign.sent_at.as_deref().unwrap_or("-"),
            status.title
        );
    }
    println!("{} campaigns, {} pending", statuses.len(), waiting);
    Ok(())
}

pub fn history(paths: &StoragePaths) -> anyhow::Result<()> {
    let store = LedgerStore::new(paths.ledger_path.clone());
    let Some(parsed) = store.read()? else {
        println!("No campaigns exported yet ({} does not exist)", store.path().display());
        return Ok(());
    };

    for entry in parsed.ledger.entries() {
        let date = if entry.exported_date.is_empty() {
            "-"
        } else {
            entry.exported_date.as_str()
        };
        println!("{:>8}  {:<19}  {}", entry.id.as_str(), date, entry.title);
    }
    println!("{} campaigns exported", parsed.ledger.len());
    Ok(())
}
