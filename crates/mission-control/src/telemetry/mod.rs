//! # Telemetry Aggregator
//!
//! A single scheduled task that, on each tick, pulls counters from the
//! Brain and Engineer and per-agent statistics from the Traffic Manager
//! for every subscribed mission, merges them into one sample per mission,
//! and pushes the sample to each subscribed client through the PostOffice.
//!
//! Partial collaborator failures degrade to zero/empty substructures; a
//! failed publish never stops the tick. Per-mission work is guarded so an
//! outstanding sample causes the mission to be skipped on the next tick
//! rather than piling up.
//!
//! After publishing, quiescent missions (Completed or Error with zero
//! RUNNING agents) are handed to the reflection coordinator.

pub mod normalize;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use mission_shared::types::{MessageEnvelope, MessageType, TelemetrySample};

use crate::context::SystemContext;
use crate::reflection::ReflectionCoordinator;

#[derive(Debug)]
pub struct TelemetryAggregator {
    context: Arc<SystemContext>,
    reflection: Arc<ReflectionCoordinator>,
    /// Missions with an outstanding sample; skipped for the current tick
    in_flight: Mutex<HashSet<Uuid>>,
}

impl TelemetryAggregator {
    pub fn new(context: Arc<SystemContext>, reflection: Arc<ReflectionCoordinator>) -> Arc<Self> {
        Arc::new(Self {
            context,
            reflection,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Run the ticker until shutdown
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let interval = Duration::from_millis(self.context.config.telemetry.tick_interval_ms);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_ms = interval.as_millis() as u64, "Telemetry ticker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Telemetry ticker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// One tick: spawn guarded sampling work per subscribed mission.
    /// No subscriptions means no work.
    pub fn tick(self: &Arc<Self>) {
        if !self.context.registry.has_subscriptions() {
            return;
        }

        for (mission_id, clients) in self.context.registry.subscription_fanout() {
            let eligible = self
                .context
                .registry
                .status_of(&mission_id)
                .map(|s| s.is_telemetry_eligible())
                .unwrap_or(false);
            if !eligible {
                continue;
            }
            self.spawn_guarded(mission_id, clients);
        }
    }

    /// Push fresh statistics for one mission outside the regular cadence
    /// (used by the agent-statistics-update ingress).
    pub fn trigger_mission_push(self: &Arc<Self>, mission_id: Uuid) {
        let clients = self.context.registry.subscribers_of(&mission_id);
        if clients.is_empty() {
            return;
        }
        self.spawn_guarded(mission_id, clients);
    }

    fn spawn_guarded(self: &Arc<Self>, mission_id: Uuid, clients: Vec<String>) {
        {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !in_flight.insert(mission_id) {
                debug!(mission_id = %mission_id, "Previous sample still outstanding; skipping this tick");
                return;
            }
        }

        let aggregator = self.clone();
        tokio::spawn(async move {
            aggregator.sample_and_publish(mission_id, clients).await;
            let mut in_flight = aggregator
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            in_flight.remove(&mission_id);
        });
    }

    /// Collect one sample, publish it to every subscribed client, then run
    /// the quiescence check.
    #[instrument(skip(self, clients))]
    async fn sample_and_publish(&self, mission_id: Uuid, clients: Vec<String>) {
        let sample = self.collect_sample(mission_id).await;

        for client_id in &clients {
            let envelope = MessageEnvelope::outbound(MessageType::Statistics, json!(&sample))
                .with_recipient("user")
                .with_client_id(client_id.clone());
            if let Err(e) = self.context.post_office.send_message(&envelope).await {
                warn!(
                    mission_id = %mission_id,
                    client_id = %client_id,
                    error = %e,
                    "Failed to publish telemetry sample"
                );
            }
        }

        self.maybe_reflect(mission_id, &sample).await;
    }

    /// Concurrent pull from the three collaborators, each tolerating
    /// failure with a warning and an empty substructure.
    async fn collect_sample(&self, mission_id: Uuid) -> TelemetrySample {
        let (llm, engineer, agents) = tokio::join!(
            self.context.brain.get_llm_calls(),
            self.context.engineer.statistics(),
            self.context.traffic_manager.get_agent_statistics(mission_id),
        );

        let llm = llm.unwrap_or_else(|e| {
            warn!(mission_id = %mission_id, error = %e, "Brain counters unavailable for this sample");
            Default::default()
        });
        let engineer_stats = engineer.unwrap_or_else(|e| {
            warn!(mission_id = %mission_id, error = %e, "Engineer statistics unavailable for this sample");
            Default::default()
        });
        let raw_agents = agents.unwrap_or_else(|e| {
            warn!(mission_id = %mission_id, error = %e, "Agent statistics unavailable for this sample");
            json!({})
        });

        let normalized = normalize::normalize_agent_statistics(raw_agents);

        TelemetrySample {
            llm_calls: llm.llm_calls,
            active_llm_calls: llm.active_llm_calls,
            agent_count_by_status: normalized.agent_count_by_status,
            per_agent_stats: normalized.per_agent_stats,
            engineer_stats,
        }
    }

    /// Quiescence check: a Completed or Error mission with no RUNNING
    /// agents enters reflection. The Reflecting transition happens under
    /// the registry entry lock and is the re-entry guard.
    async fn maybe_reflect(&self, mission_id: Uuid, sample: &TelemetrySample) {
        let candidate = self
            .context
            .registry
            .status_of(&mission_id)
            .map(|s| s.is_reflection_candidate())
            .unwrap_or(false);
        if !candidate || sample.running_agent_count() > 0 {
            return;
        }

        let Some((prior_status, mission)) = self.context.registry.begin_reflection(&mission_id)
        else {
            return;
        };

        self.reflection
            .reflect(mission, prior_status, sample)
            .await;
    }
}
