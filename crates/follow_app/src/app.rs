use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::Confirm;
use engine_logging::{engine_info, engine_warn};
use follow_core::{Identifier, OutcomeLog};
use follow_engine::{
    ensure_output_dir, prepare_targets, FileStore, Humanizer, ListHarvester, LogSink,
    MutationExecutor, PrepareOptions, RecordStore, StorePaths, Throttle, WebSession,
};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::config::{EnvConfig, FileConfig};
use crate::report::{render_preview, render_summary, PREVIEW_LIMIT};

pub async fn run(cli: Cli) -> Result<()> {
    let settings = FileConfig::load(cli.config.as_deref())?.into_settings();
    let env = EnvConfig::from_env()?;
    let owner = Identifier::parse(&env.credentials.username).with_context(|| {
        format!("IG_USERNAME {:?} is not a valid handle", env.credentials.username)
    })?;

    ensure_output_dir(&cli.data_dir)
        .with_context(|| format!("data directory {}", cli.data_dir.display()))?;
    let store = Arc::new(FileStore::new(StorePaths {
        data_dir: cli.data_dir.clone(),
        whitelist: cli.whitelist.clone(),
    }));

    let humanizer = match cli.seed {
        Some(seed) => Humanizer::seeded(seed),
        None => Humanizer::from_entropy(),
    };
    let mut throttle = Throttle::new(settings.monitor, settings.cooldown, humanizer);
    let sink = LogSink;
    let cancel = watch_for_interrupt();

    let mut web = settings.web;
    if let Some(base_url) = env.base_url {
        web.base_url = base_url;
    }
    let mut session = WebSession::connect(web, env.credentials)
        .await
        .context("could not start the web session")?;
    engine_info!("Signed in as @{}", session.username());

    let harvester = ListHarvester::new(settings.harvest);
    let options = PrepareOptions {
        mode: cli.mode.into(),
        skip_harvest: cli.skip_harvest,
    };
    let targets = tokio::select! {
        targets = prepare_targets(
            &mut session,
            &owner,
            store.as_ref(),
            &harvester,
            &mut throttle,
            &sink,
            options,
        ) => targets.context("could not build the target list")?,
        _ = cancel.cancelled() => {
            engine_warn!("Interrupted before any account was touched");
            return Ok(());
        }
    };

    if targets.is_empty() {
        println!("Nothing to do: every followed account is whitelisted or already handled.");
        return Ok(());
    }
    print!("{}", render_preview(&targets, PREVIEW_LIMIT));
    if !cli.dry_run && !cli.yes && !confirm(targets.len()).await? {
        println!("Aborted; nobody was unfollowed.");
        return Ok(());
    }

    let mut executor = MutationExecutor::new(settings.executor).with_cancellation(cancel);
    if !cli.dry_run {
        let prior = if cli.resume {
            store.load_outcomes().context("could not read the run journal")?
        } else {
            let fresh = OutcomeLog::new();
            store.save_outcomes(&fresh).context("could not reset the run journal")?;
            fresh
        };
        executor = executor.with_prior_outcomes(prior).with_store(store.clone());
    }

    let result = executor
        .run(&mut session, &targets, cli.dry_run, &mut throttle, &sink)
        .await;
    drop(session);

    print!("{}", render_summary(&executor.summary(), cli.dry_run));
    result.context("run aborted")?;
    Ok(())
}

/// Ctrl-C cancels the returned token; the run stops at the next safe point.
fn watch_for_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Interrupt received; stopping at the next safe point");
            trigger.cancel();
        }
    });
    cancel
}

async fn confirm(count: usize) -> Result<bool> {
    let prompt = format!("Unfollow {count} account(s)?");
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::new().with_prompt(prompt).default(false).interact()
    })
    .await??;
    Ok(answer)
}
