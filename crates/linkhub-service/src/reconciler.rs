use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use linkhub_db::Database;
use linkhub_db::spaces::SpaceCounter;
use linkhub_types::events::CounterEvent;

/// Retry budget for one counter event, including the first attempt.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Applies counter adjustments on a dedicated task, decoupled from the
/// publishing request. Each attempt is an independent read-modify-write under
/// an optimistic version check; a version clash retries the whole cycle.
/// Exhausted events are dead-lettered rather than silently dropped.
#[derive(Clone)]
pub struct CounterReconciler {
    tx: mpsc::UnboundedSender<CounterEvent>,
}

impl CounterReconciler {
    pub fn spawn(db: Arc<Database>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(db, rx));
        Self { tx }
    }

    /// Fire-and-forget: the publisher continues without waiting and gets no
    /// failure signal beyond the dead-letter record.
    pub fn publish(&self, event: CounterEvent) {
        if self.tx.send(event).is_err() {
            warn!("Counter reconciler stopped; dropping {:?}", event);
        }
    }
}

async fn run(db: Arc<Database>, mut rx: mpsc::UnboundedReceiver<CounterEvent>) {
    while let Some(event) = rx.recv().await {
        let handle = db.clone();
        apply_with_retry(&db, event, move || {
            let db = handle.clone();
            // Blocking DB work stays off the async runtime
            async move { tokio::task::spawn_blocking(move || apply_once(&db, event)).await? }
        })
        .await;
    }
}

enum Attempt {
    Applied,
    /// The owning row no longer exists; the event is dropped.
    Missing,
    /// A concurrent writer changed the row between read and write.
    Conflict,
}

/// Drive one event through the retry budget, attempt by attempt. The attempt
/// itself is a closure so the loop stays independent of how the write runs.
async fn apply_with_retry<F, Fut>(db: &Arc<Database>, event: CounterEvent, mut attempt_fn: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<Attempt>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match attempt_fn().await {
            Ok(Attempt::Applied) => return,
            Ok(Attempt::Missing) => {
                debug!("Dropping {} for missing row {}", event.kind(), event.target_id());
                return;
            }
            Ok(Attempt::Conflict) => {
                debug!(
                    "Version clash on {} {} (attempt {}/{})",
                    event.kind(),
                    event.target_id(),
                    attempt,
                    MAX_ATTEMPTS
                );
            }
            Err(e) => {
                warn!(
                    "Counter write failed on {} {} (attempt {}/{}): {}",
                    event.kind(),
                    event.target_id(),
                    attempt,
                    MAX_ATTEMPTS,
                    e
                );
            }
        }

        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }

    warn!(
        "Retry budget exhausted for {} {}; dead-lettering",
        event.kind(),
        event.target_id()
    );
    let db = db.clone();
    let record = tokio::task::spawn_blocking(move || {
        db.record_dead_letter(event.kind(), event.target_id(), event.delta(), MAX_ATTEMPTS)
    })
    .await;
    if let Ok(Err(e)) = record {
        warn!("Failed to record dead letter: {}", e);
    }
}

/// One read-modify-write cycle. The counter is clamped at zero: a decrement
/// below zero persists as zero and counts as applied.
fn apply_once(db: &Database, event: CounterEvent) -> anyhow::Result<Attempt> {
    let read = match event {
        CounterEvent::LinkLike { link_id, .. } => db.read_link_like_counter(link_id)?,
        CounterEvent::SpaceView { space_id } => {
            db.read_space_counter(space_id, SpaceCounter::View)?
        }
        CounterEvent::SpaceScrap { space_id } => {
            db.read_space_counter(space_id, SpaceCounter::Scrap)?
        }
    };

    let Some((value, version)) = read else {
        return Ok(Attempt::Missing);
    };
    let new_value = (value + event.delta()).max(0);

    let updated = match event {
        CounterEvent::LinkLike { link_id, .. } => {
            db.try_update_link_like_counter(link_id, new_value, version)?
        }
        CounterEvent::SpaceView { space_id } => {
            db.try_update_space_counter(space_id, SpaceCounter::View, new_value, version)?
        }
        CounterEvent::SpaceScrap { space_id } => {
            db.try_update_space_counter(space_id, SpaceCounter::Scrap, new_value, version)?
        }
    };

    Ok(if updated {
        Attempt::Applied
    } else {
        Attempt::Conflict
    })
}
