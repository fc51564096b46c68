//! Envelope routing: resolves an audience to handles, applies the delivery
//! policy, and fans out through the registry.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{debug, trace};

use chathub_core::result::AppResult;
use chathub_core::types::UserId;

use super::policy::{DeliveryPolicy, DeliveryScope};
use crate::connection::registry::{Delivery, Departure, HubRegistry};
use crate::message::{Audience, Envelope, OutboundFrame};
use crate::metrics::HubMetrics;

/// Upper bound on concurrent relationship lookups for one envelope.
const POLICY_CONCURRENCY: usize = 16;

/// What happened to one routed envelope.
#[derive(Debug, Default)]
pub struct RouteReport {
    /// Handles the frame was enqueued on.
    pub delivered: usize,
    /// Online targets refused by the delivery policy.
    pub refused: usize,
    /// Connections removed because their queue overflowed during fan-out.
    pub departures: Vec<Departure>,
}

impl RouteReport {
    fn absorb(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Enqueued => self.delivered += 1,
            other => self.departures.extend(other.into_departure()),
        }
    }
}

/// Routes envelopes to the handles of their recipients.
#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<HubRegistry>,
    policy: DeliveryPolicy,
    metrics: Arc<HubMetrics>,
}

impl MessageRouter {
    pub fn new(registry: Arc<HubRegistry>, policy: DeliveryPolicy, metrics: Arc<HubMetrics>) -> Self {
        Self {
            registry,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    /// Deliver an envelope.
    ///
    /// Offline targets and refused targets are not errors: the report counts
    /// what was enqueued. Only a failure to serialize the envelope is an error.
    pub async fn route(&self, envelope: &Envelope) -> AppResult<RouteReport> {
        let frame = envelope.to_frame()?;

        let report = match (envelope.audience(), envelope.sender()) {
            (Audience::System, _) | (_, None) => {
                let fan_out = self.registry.broadcast_all(frame, envelope.origin());
                RouteReport {
                    delivered: fan_out.delivered,
                    refused: 0,
                    departures: fan_out.departures,
                }
            }
            (Audience::Direct(target), Some(sender)) => {
                self.deliver_to_users(envelope, sender, vec![*target], DeliveryScope::Personal, &frame)
                    .await
            }
            (Audience::Group(members), Some(sender)) => {
                self.deliver_to_users(envelope, sender, members.clone(), DeliveryScope::Personal, &frame)
                    .await
            }
            (Audience::Broadcast, Some(sender)) => {
                let targets = self.registry.online_users();
                self.deliver_to_users(envelope, sender, targets, DeliveryScope::Broadcast, &frame)
                    .await
            }
        };

        debug!(
            message_id = %envelope.id(),
            kind = %envelope.kind(),
            delivered = report.delivered,
            refused = report.refused,
            "Envelope routed"
        );
        Ok(report)
    }

    async fn deliver_to_users(
        &self,
        envelope: &Envelope,
        sender: UserId,
        targets: Vec<UserId>,
        scope: DeliveryScope,
        frame: &OutboundFrame,
    ) -> RouteReport {
        let online: Vec<UserId> = targets
            .into_iter()
            .filter(|target| self.registry.is_online(target))
            .collect();

        let decisions: Vec<(UserId, bool)> = stream::iter(online)
            .map(|target| async move {
                let allowed =
                    target == sender || self.policy.permits(sender, target, scope).await;
                (target, allowed)
            })
            .buffer_unordered(POLICY_CONCURRENCY)
            .collect()
            .await;

        let mut report = RouteReport::default();
        for (target, allowed) in decisions {
            if !allowed {
                trace!(sender = %sender, target = %target, "Delivery refused");
                self.metrics.record_refused();
                report.refused += 1;
                continue;
            }

            // Re-read the handles: the user may have connected or left while
            // the policy was consulted.
            for handle in self.registry.lookup(&target) {
                if Some(handle.id()) == envelope.origin() {
                    continue;
                }
                report.absorb(self.registry.deliver(&handle, frame.clone()));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use chathub_database::MemoryRelationshipDirectory;

    use super::*;
    use crate::connection::handle::{ClientHandle, OutboundQueue};

    struct Fixture {
        registry: Arc<HubRegistry>,
        directory: Arc<MemoryRelationshipDirectory>,
        router: MessageRouter,
    }

    fn fixture(require_friendship: bool) -> Fixture {
        let metrics = Arc::new(HubMetrics::new());
        let registry = Arc::new(HubRegistry::new(metrics.clone()));
        let directory = Arc::new(MemoryRelationshipDirectory::new());
        let policy = DeliveryPolicy::new(directory.clone(), require_friendship);
        let router = MessageRouter::new(registry.clone(), policy, metrics);
        Fixture {
            registry,
            directory,
            router,
        }
    }

    fn connect(registry: &HubRegistry, user: i64) -> (Arc<ClientHandle>, OutboundQueue) {
        let (handle, queue) = ClientHandle::new(UserId(user), 8);
        registry.register(handle.clone());
        (handle, queue)
    }

    #[tokio::test]
    async fn test_direct_reaches_every_target_connection() {
        let fx = fixture(false);
        let (a, _qa) = connect(&fx.registry, 1);
        let (_b1, mut qb1) = connect(&fx.registry, 2);
        let (_b2, mut qb2) = connect(&fx.registry, 2);

        let env = Envelope::direct(UserId(1), a.id(), UserId(2), serde_json::json!("hi"));
        let report = fx.router.route(&env).await.unwrap();

        assert_eq!(report.delivered, 2);
        assert!(qb1.try_recv().is_ok());
        assert!(qb2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_direct_to_offline_user_is_not_an_error() {
        let fx = fixture(false);
        let (a, _qa) = connect(&fx.registry, 1);

        let env = Envelope::direct(UserId(1), a.id(), UserId(99), serde_json::Value::Null);
        let report = fx.router.route(&env).await.unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.refused, 0);
    }

    #[tokio::test]
    async fn test_friendship_gate_on_group() {
        let fx = fixture(true);
        fx.directory.add_friend(UserId(1), UserId(2));
        let (a, _qa) = connect(&fx.registry, 1);
        let (_b, mut qb) = connect(&fx.registry, 2);
        let (_c, mut qc) = connect(&fx.registry, 3);

        let env = Envelope::group(
            UserId(1),
            a.id(),
            [UserId(2), UserId(3)],
            serde_json::json!({"room": "lobby"}),
        );
        let report = fx.router.route(&env).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.refused, 1);
        assert!(qb.try_recv().is_ok());
        assert!(qc.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_system_skips_policy() {
        let fx = fixture(true);
        fx.directory.block(UserId(2), UserId(1));
        let (_a, mut qa) = connect(&fx.registry, 1);
        let (_b, mut qb) = connect(&fx.registry, 2);

        let report = fx
            .router
            .route(&Envelope::system(serde_json::json!("restarting")))
            .await
            .unwrap();

        assert_eq!(report.delivered, 2);
        assert!(qa.try_recv().is_ok());
        assert!(qb.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_message_to_self_reaches_other_devices_only() {
        let fx = fixture(true);
        let (phone, mut q_phone) = connect(&fx.registry, 1);
        let (_laptop, mut q_laptop) = connect(&fx.registry, 1);

        let env = Envelope::direct(UserId(1), phone.id(), UserId(1), serde_json::json!("note"));
        let report = fx.router.route(&env).await.unwrap();

        assert_eq!(report.delivered, 1);
        assert!(q_phone.try_recv().is_err());
        assert!(q_laptop.try_recv().is_ok());
    }
}
