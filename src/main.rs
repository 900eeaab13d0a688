use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use octocrab::Octocrab;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use membership_sync::config::SyncConfig;
use membership_sync::effects::{DryRunInterpreter, GitHubInterpreter};
use membership_sync::github::{OctocrabClient, RetryConfig, RetryPolicy};
use membership_sync::reconcile::{DesiredState, MembershipReconciler};
use membership_sync::types::{Login, RepoId};

/// Reconcile GitHub repository collaborators against a JSON config file.
#[derive(Parser, Debug)]
#[command(name = "membership-sync", version, about, long_about = None)]
struct Args {
    /// Path to the desired-state config file.
    #[arg(long, env = "MEMBERSHIP_SYNC_CONFIG")]
    config: PathBuf,

    /// GitHub token with admin access to every configured repository.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,

    /// Log mutations instead of performing them.
    #[arg(long)]
    dry_run: bool,

    /// Re-run every SECONDS until interrupted, instead of once.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Fail on the first transient API error instead of backing off.
    #[arg(long)]
    no_retry: bool,

    /// Only reconcile these repositories (`owner/repo`, repeatable).
    #[arg(long = "repo", value_name = "OWNER/REPO", value_parser = parse_repo)]
    repos: Vec<RepoId>,
}

fn parse_repo(s: &str) -> Result<RepoId, String> {
    RepoId::parse(s).ok_or_else(|| format!("expected owner/repo, got {s:?}"))
}

/// Membership and owner carried from one cycle to the next.
type Snapshot = (Vec<Login>, Option<Login>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "membership_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = SyncConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let targets = select_targets(&config, &args.repos)?;

    let octocrab = Octocrab::builder()
        .personal_token(args.token.clone())
        .build()
        .context("building GitHub client")?;

    let retry_policy = if args.no_retry {
        RetryPolicy::NoRetry
    } else {
        RetryPolicy::RetryTransient
    };
    let retry_config = if args.interval.is_some() {
        RetryConfig::DAEMON
    } else {
        RetryConfig::DEFAULT
    };

    let runner = Runner {
        octocrab,
        retry_config,
        retry_policy,
        dry_run: args.dry_run,
    };
    let mut cache: HashMap<RepoId, Snapshot> = HashMap::new();

    let Some(interval) = args.interval else {
        let aborted = runner.run_cycle(&targets, &mut cache).await;
        if aborted > 0 {
            bail!("{aborted} of {} repositories could not be reconciled", targets.len());
        }
        return Ok(());
    };

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current cycle");
            ctrl_c_token.cancel();
        }
    });

    tracing::info!(
        interval_secs = interval,
        repos = targets.len(),
        dry_run = args.dry_run,
        "Starting membership sync loop"
    );
    loop {
        runner.run_cycle(&targets, &mut cache).await;
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
        }
    }

    Ok(())
}

/// Desired states for the configured repositories, narrowed to `only` when set.
fn select_targets(config: &SyncConfig, only: &[RepoId]) -> anyhow::Result<Vec<DesiredState>> {
    let all: Vec<DesiredState> = config.repos.iter().map(|r| r.desired_state()).collect();
    if only.is_empty() {
        return Ok(all);
    }

    let same = |a: &RepoId, b: &RepoId| {
        a.owner.eq_ignore_ascii_case(&b.owner) && a.repo.eq_ignore_ascii_case(&b.repo)
    };
    for wanted in only {
        if !all.iter().any(|d| same(&d.repo, wanted)) {
            bail!("repository {wanted} is not in the config");
        }
    }
    Ok(all
        .into_iter()
        .filter(|d| only.iter().any(|wanted| same(&d.repo, wanted)))
        .collect())
}

struct Runner {
    octocrab: Octocrab,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
    dry_run: bool,
}

impl Runner {
    /// Reconciles every target once. Returns the number of repositories that
    /// aborted with a fatal error.
    async fn run_cycle(
        &self,
        targets: &[DesiredState],
        cache: &mut HashMap<RepoId, Snapshot>,
    ) -> usize {
        let mut aborted = 0;
        for desired in targets {
            let client = OctocrabClient::new(self.octocrab.clone(), desired.repo.clone())
                .with_retry(self.retry_config, self.retry_policy);

            let ok = if self.dry_run {
                // A dry run never changes anything, so its result is not a
                // snapshot of the repository.
                reconcile_repo(DryRunInterpreter::new(client), desired, cache, false).await
            } else {
                reconcile_repo(client, desired, cache, true).await
            };
            if !ok {
                aborted += 1;
            }
        }
        aborted
    }
}

async fn reconcile_repo<G>(
    github: G,
    desired: &DesiredState,
    cache: &mut HashMap<RepoId, Snapshot>,
    keep_snapshot: bool,
) -> bool
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let reconciler = MembershipReconciler::new(github);
    let (cached_members, cached_owner) = match cache.get(&desired.repo) {
        Some((members, owner)) => (Some(members.as_slice()), owner.clone()),
        None => (None, None),
    };

    let result = reconciler
        .reconcile(desired, cached_members, cached_owner)
        .await;

    match result {
        Ok(outcome) => {
            let summary = outcome.report.summary();
            if outcome.report.has_failures() {
                tracing::warn!(repo = %desired.repo, %summary, "Reconciled with failures");
            } else {
                tracing::info!(repo = %desired.repo, %summary, "Reconciled");
            }
            if keep_snapshot {
                cache.insert(desired.repo.clone(), (outcome.members, outcome.owner));
            }
            true
        }
        Err(e) => {
            tracing::error!(repo = %desired.repo, error = %e, "Reconciliation aborted");
            cache.remove(&desired.repo);
            false
        }
    }
}
