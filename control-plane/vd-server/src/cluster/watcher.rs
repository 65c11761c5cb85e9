//! Per-(cluster, kind) resource watcher. Each watcher is an independent
//! task: it opens a server-side change stream, projects every event into a
//! DTO, feeds the fan-out hub and evaluates the notification rules. Missed
//! events are never replayed; the hub is a best-effort broadcast.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use kube::api::{Api, DynamicObject, WatchEvent, WatchParams};
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use vd_models::{NotificationEvent, ResourceKind, WatchAction, WsEvent};

use crate::cluster::client::{self, VeleroClient};
use crate::hub::Hub;
use crate::metrics;
use crate::notify::{EventNotifier, failure_event};

const RESTART_BACKOFF: Duration = Duration::from_secs(2);
const START_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Everything a watcher needs besides its API handle.
pub struct WatchContext {
    pub cluster_id: String,
    pub cluster_name: String,
    pub hub: Arc<Hub>,
    pub notifier: Option<Arc<dyn EventNotifier>>,
}

/// Spawns one watcher task per tracked resource kind.
pub fn spawn_watchers(
    client: &VeleroClient,
    ctx: Arc<WatchContext>,
    token: CancellationToken,
    tracker: &TaskTracker,
) {
    for kind in ResourceKind::ALL {
        let api = client.watch_api(kind);
        let ctx = Arc::clone(&ctx);
        let token = token.clone();
        tracker.spawn(run_watch(api, kind, ctx, token));
    }
}

async fn run_watch(
    api: Api<DynamicObject>,
    kind: ResourceKind,
    ctx: Arc<WatchContext>,
    token: CancellationToken,
) {
    info!(cluster = %ctx.cluster_id, resource = %kind, "Starting watcher");

    loop {
        if token.is_cancelled() {
            break;
        }

        let stream = match api.watch(&WatchParams::default(), "0").await {
            Ok(stream) => stream,
            Err(err) => {
                error!(
                    cluster = %ctx.cluster_id,
                    resource = %kind,
                    error = %err,
                    "Failed to start watch"
                );
                if !pause(&token, START_FAILURE_BACKOFF).await {
                    break;
                }
                continue;
            }
        };
        let mut stream = stream.boxed();

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!(cluster = %ctx.cluster_id, resource = %kind, "Watcher stopped");
                    return;
                }
                item = stream.try_next() => match item {
                    Ok(Some(WatchEvent::Added(obj))) => {
                        handle_event(kind, WatchAction::Added, &obj, &ctx).await;
                    }
                    Ok(Some(WatchEvent::Modified(obj))) => {
                        handle_event(kind, WatchAction::Modified, &obj, &ctx).await;
                    }
                    Ok(Some(WatchEvent::Deleted(obj))) => {
                        handle_event(kind, WatchAction::Deleted, &obj, &ctx).await;
                    }
                    // bookmarks and upstream error events carry no resource change
                    Ok(Some(WatchEvent::Bookmark(_))) | Ok(Some(WatchEvent::Error(_))) => {}
                    Ok(None) => {
                        warn!(cluster = %ctx.cluster_id, resource = %kind, "Watch channel closed, restarting");
                        break;
                    }
                    Err(err) => {
                        warn!(
                            cluster = %ctx.cluster_id,
                            resource = %kind,
                            error = %err,
                            "Watch stream failed, restarting"
                        );
                        break;
                    }
                }
            }
        }

        if !pause(&token, RESTART_BACKOFF).await {
            break;
        }
    }

    info!(cluster = %ctx.cluster_id, resource = %kind, "Watcher stopped");
}

/// Sleeps for the back-off unless cancelled first. Returns false on cancel.
async fn pause(token: &CancellationToken, backoff: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = sleep(backoff) => true,
    }
}

async fn handle_event(
    kind: ResourceKind,
    action: WatchAction,
    obj: &DynamicObject,
    ctx: &WatchContext,
) {
    let resource = client::project(kind, obj);

    let event = WsEvent {
        kind,
        action,
        resource: resource.clone(),
        cluster_id: ctx.cluster_id.clone(),
    };
    ctx.hub.broadcast(&event).await;
    debug!(
        cluster = %ctx.cluster_id,
        resource = %kind,
        action = %action,
        name = obj.metadata.name.as_deref().unwrap_or(""),
        "Broadcast event"
    );

    if kind == ResourceKind::Backup {
        metrics::BACKUP_EVENTS_TOTAL
            .with_label_values(&[&ctx.cluster_id, action.as_str()])
            .inc();
    }

    if action == WatchAction::Deleted {
        return;
    }
    let Some(notifier) = &ctx.notifier else {
        return;
    };

    let phase = obj.data["status"]["phase"].as_str().unwrap_or_default();
    let name = obj.metadata.name.as_deref().unwrap_or_default();
    if let Some((event_type, title, message)) = failure_event(kind, phase, name) {
        notifier.dispatch(NotificationEvent {
            event_type,
            title,
            message,
            cluster_id: ctx.cluster_id.clone(),
            cluster_name: ctx.cluster_name.clone(),
            resource: Some(resource),
            timestamp: Utc::now(),
        });
    }
}
