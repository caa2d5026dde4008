// ── Subscription creation ──
//
// One job per origin resource, plus one per member of an expanded
// collection or aggregate. Jobs run with bounded concurrency; top-level
// jobs report their status on a channel drained by a supervisor task that
// drives task progress and tracks the bubble-up status.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::merge::dedup;
use super::validate::parse_request;
use super::{OriginOutcome, SUBSCRIPTIONS_URI, SubscriptionReconciler, created_body};
use crate::error::CoreError;
use crate::model::collection::{
    AGGREGATE_COLLECTIONS, CollectionKind, FABRICS_PREFIX, is_aggregate_uri, last_segment,
};
use crate::model::{DEFAULT_ORIGIN_RESOURCES, EventDestination, Subscription};
use crate::response::{ApiResponse, StatusMessage};
use crate::store::{SubscriptionQuery, Table};
use crate::task::{TaskReporter, TaskState, TaskUpdate};

const PARTIAL_FAILURE: &str =
    "event subscription for one or more origin resource(s) failed, check sub tasks for more info.";

/// One unit of subscribe work.
#[derive(Debug, Clone)]
struct OriginJob {
    origin: String,
    /// Collection marker when `origin` names a collection or aggregate.
    marker: Option<String>,
    /// Aggregate URI the job belongs to; results are keyed by it.
    aggregate: Option<String>,
    /// Top-level jobs get a sub-task and report progress.
    top_level: bool,
}

/// What a collection or aggregate origin expands into.
#[derive(Debug, Default)]
pub(crate) struct Expansion {
    pub members: Vec<String>,
    pub marker: Option<String>,
    pub aggregate: bool,
}

impl SubscriptionReconciler {
    /// Create a subscription from a client request body.
    ///
    /// Parse, validation and duplicate-destination failures return at once
    /// without task reports. Otherwise `task_id` receives progress and the
    /// final state, and the response is 201 only if every origin succeeded.
    pub async fn create_subscription(&self, task_id: &str, user: &str, body: &[u8]) -> ApiResponse {
        let request = match parse_request(body) {
            Ok(request) => request,
            Err(e) => return ApiResponse::from(&e),
        };
        match self
            .inner
            .store
            .read_subscriptions(&SubscriptionQuery::ByDestination(request.destination.clone()))
            .await
        {
            Ok(existing) if !existing.is_empty() => {
                return ApiResponse::from(&CoreError::Conflict {
                    destination: request.destination,
                });
            }
            Ok(_) => {}
            Err(e) => return ApiResponse::from(&CoreError::from(e)),
        }

        let mut origins = request.origin_uris();
        dedup(&mut origins);
        let explicit = !origins.is_empty();
        if !explicit {
            origins = DEFAULT_ORIGIN_RESOURCES.iter().map(|o| (*o).to_owned()).collect();
        }

        let (jobs, members) = self.plan(&origins).await;
        let total = jobs.iter().filter(|j| j.top_level).count();
        info!(
            destination = %request.destination,
            origins = origins.len(),
            jobs = jobs.len(),
            "creating event subscription"
        );

        let (progress_tx, progress_rx) = mpsc::channel(total.max(1));
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&self.inner.tasks),
            task_id.to_owned(),
            total,
            progress_rx,
        ));

        let finished: Vec<(String, OriginOutcome)> = stream::iter(jobs)
            .map(|job| self.run_job(task_id, &request, job, progress_tx.clone()))
            .buffer_unordered(self.inner.max_concurrent_origins)
            .collect()
            .await;
        // Producers are done; closing the channel ends the supervisor.
        drop(progress_tx);
        let bubble_up = supervisor.await.unwrap_or_else(|e| {
            warn!(error = %e, "progress supervisor failed");
            500
        });

        let mut results: BTreeMap<String, OriginOutcome> = BTreeMap::new();
        for (key, outcome) in finished {
            results
                .entry(key)
                .and_modify(|current| {
                    if outcome.status > current.status {
                        *current = outcome.clone();
                    }
                })
                .or_insert(outcome);
        }

        let mut processed = results.len();
        let mut succeeded: Vec<String> = origins
            .iter()
            .filter(|o| results.get(*o).is_some_and(OriginOutcome::is_created))
            .cloned()
            .collect();
        for member in &members {
            if results.get(member).is_some_and(OriginOutcome::is_created) {
                if let Some(pos) = succeeded.iter().position(|o| o == member) {
                    succeeded.remove(pos);
                }
                processed -= 1;
            }
        }
        let mut hosts: Vec<String> = results
            .values()
            .filter(|o| o.is_created())
            .map(|o| o.host.clone())
            .collect();
        dedup(&mut hosts);

        let mut location = None;
        if !succeeded.is_empty() {
            let id = Uuid::new_v4().to_string();
            let (origin_resources, hosts) = if explicit {
                (succeeded.clone(), hosts)
            } else {
                (Vec::new(), Vec::new())
            };
            let subscription = subscription_record(&id, user, &request, origin_resources, hosts);
            if let Err(e) = self.insert_subscription(&subscription).await {
                warn!(error = %e, "failed to save subscription");
                let response = ApiResponse::from(&e);
                self.finish(task_id, TaskState::Exception, &response).await;
                return response;
            }
            location = Some(format!("{SUBSCRIPTIONS_URI}/{id}"));
        }

        if processed == succeeded.len() {
            let response = ApiResponse::created(location.unwrap_or_default(), created_body());
            self.finish(task_id, TaskState::Completed, &response).await;
            return response;
        }

        let worst = results.values().map(|o| o.status).max().unwrap_or(500);
        let mut response = ApiResponse::error(
            bubble_up.max(worst),
            StatusMessage::GeneralError,
            PARTIAL_FAILURE,
            Vec::new(),
        );
        response.location = location;
        warn!(
            processed,
            succeeded = succeeded.len(),
            status = response.status,
            "event subscription partially failed"
        );
        self.finish(task_id, TaskState::Exception, &response).await;
        response
    }

    pub(super) async fn finish(&self, task_id: &str, state: TaskState, response: &ApiResponse) {
        let update = TaskUpdate {
            state,
            ..TaskUpdate::finished(task_id, response.status, response.body.clone())
        };
        self.inner.tasks.update(update).await;
    }

    /// Expand `origins` into jobs; also returns the collection members
    /// that must not be recorded as subscription origins.
    async fn plan(&self, origins: &[String]) -> (Vec<OriginJob>, HashSet<String>) {
        let mut jobs = Vec::new();
        let mut members = HashSet::new();
        for origin in origins {
            let expansion = self.expand(origin).await;
            let aggregate = expansion.aggregate.then(|| origin.clone());
            jobs.push(OriginJob {
                origin: origin.clone(),
                marker: expansion.marker,
                aggregate: aggregate.clone(),
                top_level: true,
            });
            for member in expansion.members {
                jobs.push(OriginJob {
                    origin: member.clone(),
                    marker: None,
                    aggregate: aggregate.clone(),
                    top_level: false,
                });
                if aggregate.is_none() {
                    members.insert(member);
                }
            }
        }
        (jobs, members)
    }

    /// Current members and marker of a collection or aggregate origin.
    ///
    /// Plain resource URIs expand to nothing.
    pub(crate) async fn expand(&self, origin: &str) -> Expansion {
        let store = &self.inner.store;
        if let Some(kind) = CollectionKind::from_origin(origin) {
            let members = match kind {
                CollectionKind::Systems => store.list_keys(Table::ComputerSystem).await,
                CollectionKind::Fabrics => store.list_keys(Table::Fabric).await.map(|ids| {
                    ids.into_iter()
                        .map(|id| format!("{FABRICS_PREFIX}{id}"))
                        .collect()
                }),
                CollectionKind::Chassis | CollectionKind::Managers | CollectionKind::Tasks => {
                    Ok(Vec::new())
                }
            };
            let members = members.unwrap_or_else(|e| {
                warn!(origin, error = %e, "failed to list collection members");
                Vec::new()
            });
            return Expansion {
                members,
                marker: Some(kind.to_string()),
                aggregate: false,
            };
        }
        if is_aggregate_uri(origin) {
            let members = match store.read_aggregate(origin).await {
                Ok(Some(aggregate)) => aggregate.member_uris().map(str::to_owned).collect(),
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!(origin, error = %e, "failed to read aggregate");
                    Vec::new()
                }
            };
            return Expansion {
                members,
                marker: Some(AGGREGATE_COLLECTIONS.to_owned()),
                aggregate: true,
            };
        }
        Expansion::default()
    }

    async fn run_job(
        &self,
        task_id: &str,
        request: &EventDestination,
        job: OriginJob,
        progress: mpsc::Sender<u16>,
    ) -> (String, OriginOutcome) {
        let tasks = &self.inner.tasks;
        let sub_task = if job.top_level {
            let id = tasks.create_child(task_id).await;
            tasks.update(TaskUpdate::running(&id, 0)).await;
            Some(id)
        } else {
            None
        };

        let mut outcome = match self
            .subscribe_origin(request, &job.origin, job.marker.as_deref())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(origin = %job.origin, error = %e, "origin subscription failed");
                OriginOutcome::failed(&e)
            }
        };
        debug!(origin = %job.origin, status = outcome.status, "origin processed");

        let key = match job.aggregate {
            Some(aggregate) => {
                // A member already covered by this destination is fine.
                if outcome.status == 409 {
                    outcome.status = 201;
                }
                outcome.host = last_segment(&aggregate).to_owned();
                aggregate
            }
            None => job.origin,
        };

        if let Some(id) = sub_task {
            tasks
                .update(TaskUpdate::finished(&id, outcome.status, outcome.body.clone()))
                .await;
            if progress.send(outcome.status).await.is_err() {
                debug!("progress supervisor gone");
            }
        }
        (key, outcome)
    }
}

/// Drain per-origin statuses until every producer is done.
///
/// Returns the worst status seen, starting from 201.
async fn supervise(
    tasks: Arc<dyn TaskReporter>,
    task_id: String,
    total: usize,
    mut statuses: mpsc::Receiver<u16>,
) -> u16 {
    let mut bubble_up = 201;
    let mut seen = 0usize;
    while let Some(status) = statuses.recv().await {
        bubble_up = bubble_up.max(status);
        seen += 1;
        if seen <= total {
            let percent = i32::try_from(seen * 100 / total).unwrap_or(100) - 1;
            tasks.update(TaskUpdate::running(&task_id, percent)).await;
        }
    }
    bubble_up
}

fn subscription_record(
    id: &str,
    user: &str,
    request: &EventDestination,
    origin_resources: Vec<String>,
    hosts: Vec<String>,
) -> Subscription {
    Subscription {
        id: id.to_owned(),
        user_name: user.to_owned(),
        name: request.name.clone(),
        destination: request.destination.clone(),
        context: request.context.clone(),
        event_types: request.event_types.clone(),
        message_ids: request.message_ids.clone(),
        resource_types: request.resource_types.clone(),
        protocol: request.protocol.clone(),
        subscription_type: request.subscription_type.clone(),
        event_format_type: request.event_format_type.clone(),
        subordinate_resources: request.subordinate_resources,
        delivery_retry_policy: request.delivery_retry_policy.clone(),
        origin_resources,
        hosts,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::task::MemoryTaskReporter;

    #[tokio::test]
    async fn supervisor_tracks_progress_and_worst_status() {
        let reporter = Arc::new(MemoryTaskReporter::new());
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(supervise(reporter.clone(), "task1".into(), 2, rx));
        tx.send(201).await.unwrap();
        tx.send(404).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 404);
        let percents: Vec<i32> = reporter
            .updates()
            .await
            .iter()
            .map(|u| u.percent_complete)
            .collect();
        assert_eq!(percents, vec![49, 99]);
    }

    #[tokio::test]
    async fn supervisor_without_reports_is_created() {
        let reporter = Arc::new(MemoryTaskReporter::new());
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        assert_eq!(supervise(reporter, "task1".into(), 0, rx).await, 201);
    }
}
