//! Live queries over the social documents.
//!
//! A subscription remembers the last snapshot it delivered. After a mutation
//! the hub re-runs every query and queues a `snapshot` event for each one
//! whose result changed; the main loop writes queued events after the
//! response to the request that caused them.

use crate::error::{PortalError, Result};
use crate::store::{schedules, social};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Friends,
    IncomingRequests,
    OutgoingRequests,
    StudySchedule,
}

impl SubscriptionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "friends" => Some(SubscriptionKind::Friends),
            "incomingRequests" => Some(SubscriptionKind::IncomingRequests),
            "outgoingRequests" => Some(SubscriptionKind::OutgoingRequests),
            "studySchedule" => Some(SubscriptionKind::StudySchedule),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionKind::Friends => "friends",
            SubscriptionKind::IncomingRequests => "incomingRequests",
            SubscriptionKind::OutgoingRequests => "outgoingRequests",
            SubscriptionKind::StudySchedule => "studySchedule",
        }
    }
}

struct Subscription {
    kind: SubscriptionKind,
    user_id: String,
    last: serde_json::Value,
}

#[derive(Default)]
pub struct SubscriptionHub {
    subs: BTreeMap<String, Subscription>,
    pending: Vec<serde_json::Value>,
}

fn snapshot(conn: &Connection, kind: SubscriptionKind, user_id: &str) -> Result<serde_json::Value> {
    let value = match kind {
        SubscriptionKind::Friends => serde_json::to_value(social::list_friends(conn, user_id)?)?,
        SubscriptionKind::IncomingRequests => {
            serde_json::to_value(social::incoming_requests(conn, user_id)?)?
        }
        SubscriptionKind::OutgoingRequests => {
            serde_json::to_value(social::outgoing_requests(conn, user_id)?)?
        }
        SubscriptionKind::StudySchedule => {
            serde_json::to_value(schedules::get(conn, user_id)?.sessions)?
        }
    };
    Ok(value)
}

impl SubscriptionHub {
    pub fn open(
        &mut self,
        conn: &Connection,
        kind: SubscriptionKind,
        user_id: &str,
    ) -> Result<(String, serde_json::Value)> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(PortalError::bad_params("userId must not be empty"));
        }
        let data = snapshot(conn, kind, user_id)?;
        let id = Uuid::new_v4().to_string();
        self.subs.insert(
            id.clone(),
            Subscription {
                kind,
                user_id: user_id.to_string(),
                last: data.clone(),
            },
        );
        debug!(subscription_id = %id, kind = kind.as_str(), user_id, "subscription opened");
        Ok((id, data))
    }

    pub fn close(&mut self, id: &str) -> Result<()> {
        self.subs
            .remove(id)
            .map(|_| ())
            .ok_or(PortalError::NotFound("subscription"))
    }

    /// Number of open subscriptions.
    pub fn open_count(&self) -> usize {
        self.subs.len()
    }

    /// Re-runs every live query and queues events for changed results.
    pub fn refresh(&mut self, conn: &Connection) {
        for (id, sub) in self.subs.iter_mut() {
            let data = match snapshot(conn, sub.kind, &sub.user_id) {
                Ok(v) => v,
                Err(e) => {
                    warn!(subscription_id = %id, error = %e, "subscription refresh failed");
                    continue;
                }
            };
            if data == sub.last {
                continue;
            }
            sub.last = data.clone();
            self.pending.push(json!({
                "event": "snapshot",
                "subscriptionId": id,
                "kind": sub.kind.as_str(),
                "userId": sub.user_id,
                "data": data,
            }));
        }
    }

    pub fn drain(&mut self) -> Vec<serde_json::Value> {
        std::mem::take(&mut self.pending)
    }

    /// Drops every subscription, e.g. when the workspace changes underneath them.
    pub fn clear(&mut self) {
        self.subs.clear();
        self.pending.clear();
    }
}
