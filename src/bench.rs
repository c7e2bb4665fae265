use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::aggregate::{RoundBody, RoundEvent, RunReport, run_rounds};
use crate::config::BenchConfig;
use crate::store::{Schema, Store};
use crate::timer::Recorder;
use crate::types::{Op, User};

/// Insert, find, update and remove `count` users against a store.
pub struct CrudRound<'a> {
    store: &'a dyn Store,
    count: usize,
    find_repeat: usize,
}

impl<'a> CrudRound<'a> {
    pub fn new(store: &'a dyn Store, count: usize, find_repeat: usize) -> Self {
        CrudRound {
            store,
            count,
            find_repeat,
        }
    }
}

#[async_trait]
impl RoundBody for CrudRound<'_> {
    async fn run_round(&mut self, recorder: &mut Recorder) -> Result<()> {
        let store = self.store;
        let count = self.count;

        recorder
            .time(Op::Insert, || async {
                store.delete_all().await?;
                store.insert_many((1..=count).map(User::fixture).collect()).await
            })
            .await
            .context("insert")?;

        let (mut items, _) = recorder
            .time_repeated(Op::Find, self.find_repeat, || store.find_all())
            .await
            .context("find")?;

        items.iter_mut().for_each(|user| user.priority += 1);
        recorder
            .time(Op::Update, || store.update_many(&items))
            .await
            .context("update")?;

        recorder
            .time(Op::Remove, || store.delete_all())
            .await
            .context("remove")?;

        Ok(())
    }
}

/// Provision `store`, run every round of `config` and close the store.
///
/// The store is closed whether or not the rounds succeed; a round failure
/// takes precedence over a close failure.
pub async fn run<F>(store: &dyn Store, config: &BenchConfig, on_event: F) -> Result<RunReport>
where
    F: FnMut(RoundEvent<'_>),
{
    let outcome = run_provisioned(store, config, on_event).await;
    let closed = store.close().await;

    match (outcome, closed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e.context("closing store")),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "failed to close store after aborted run");
            Err(e)
        }
    }
}

async fn run_provisioned<F>(store: &dyn Store, config: &BenchConfig, on_event: F) -> Result<RunReport>
where
    F: FnMut(RoundEvent<'_>),
{
    let plan = config.plan()?;
    store
        .provision(&Schema::user())
        .await
        .context("provisioning schema")?;

    info!(
        backend = %store.backend(),
        count = config.count,
        rounds = plan.total(),
        warmup = plan.warmup(),
        "benchmark starting"
    );
    let mut body = CrudRound::new(store, config.count, config.find_repeat);
    run_rounds(plan, &mut body, on_event).await
}
