//! Subscription entitlement model

use serde::{Deserialize, Deserializer, Serialize};

use super::proxy::ProxyNode;

fn default_true() -> bool {
    true
}

/// One user's entitlement, built fresh per request from panel data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    #[serde(alias = "shortId", alias = "short_uuid")]
    pub short_id: String,
    pub username: String,
    /// Traffic used so far, in bytes
    #[serde(alias = "used")]
    pub used_traffic: u64,
    /// Traffic limit in bytes, `0` means unlimited
    #[serde(alias = "limit")]
    pub traffic_limit: u64,
    /// Expiration as unix seconds, absent means unlimited
    #[serde(alias = "expire_at")]
    pub expires_at: Option<i64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for Subscription {
    fn default() -> Self {
        Subscription {
            short_id: String::new(),
            username: String::new(),
            used_traffic: 0,
            traffic_limit: 0,
            expires_at: None,
            enabled: true,
        }
    }
}

/// Entitlement state at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Disabled,
    /// Traffic limit reached
    Limited,
}

impl SubscriptionStatus {
    pub fn is_active(self) -> bool {
        self == SubscriptionStatus::Active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Disabled => "disabled",
            SubscriptionStatus::Limited => "limited",
        }
    }
}

impl Subscription {
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn is_traffic_exhausted(&self) -> bool {
        self.traffic_limit > 0 && self.used_traffic >= self.traffic_limit
    }

    /// Disabled wins over expired, expired over limited.
    pub fn status(&self, now: i64) -> SubscriptionStatus {
        if !self.enabled {
            SubscriptionStatus::Disabled
        } else if self.is_expired(now) {
            SubscriptionStatus::Expired
        } else if self.is_traffic_exhausted() {
            SubscriptionStatus::Limited
        } else {
            SubscriptionStatus::Active
        }
    }

    pub fn summary(&self) -> UsageSummary {
        UsageSummary {
            upload: 0,
            download: self.used_traffic,
            total: self.traffic_limit,
            expire: self.expires_at,
        }
    }
}

/// Traffic and expiry summary exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UsageSummary {
    pub upload: u64,
    pub download: u64,
    /// `0` means unlimited
    pub total: u64,
    pub expire: Option<i64>,
}

impl UsageSummary {
    /// Value for the `subscription-userinfo` response header.
    ///
    /// Pairs are joined with `; `, the separator clients split on; a comma
    /// would leave every pair after the first unread.
    ///
    /// ```
    /// use subpage::models::UsageSummary;
    ///
    /// let summary = UsageSummary { upload: 0, download: 5, total: 10, expire: None };
    /// assert_eq!(summary.to_header_value(), "upload=0; download=5; total=10; expire=0");
    /// ```
    pub fn to_header_value(&self) -> String {
        format!(
            "upload={}; download={}; total={}; expire={}",
            self.upload,
            self.download,
            self.total,
            self.expire.unwrap_or(0).max(0)
        )
    }
}

/// Subscription plus its nodes, as delivered by the panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalPayload {
    pub subscription: Subscription,
    #[serde(default, deserialize_with = "lenient_nodes")]
    pub nodes: Vec<ProxyNode>,
}

impl CanonicalPayload {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Decodes each node on its own so one malformed record cannot reject the
/// whole payload.
fn lenient_nodes<'de, D>(deserializer: D) -> Result<Vec<ProxyNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut nodes = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        if !value.is_object() {
            log::debug!("Skipping node record #{}: not an object", index);
            continue;
        }
        match serde_json::from_value::<ProxyNode>(value) {
            Ok(node) => nodes.push(node),
            Err(e) => log::debug!("Skipping node record #{}: {}", index, e),
        }
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_status_ordering() {
        let mut sub = Subscription {
            traffic_limit: 10,
            used_traffic: 20,
            expires_at: Some(NOW - 1),
            enabled: false,
            ..Default::default()
        };
        assert_eq!(sub.status(NOW), SubscriptionStatus::Disabled);
        sub.enabled = true;
        assert_eq!(sub.status(NOW), SubscriptionStatus::Expired);
        sub.expires_at = None;
        assert_eq!(sub.status(NOW), SubscriptionStatus::Limited);
        sub.traffic_limit = 0;
        assert_eq!(sub.status(NOW), SubscriptionStatus::Active);
    }

    #[test]
    fn test_summary_keeps_counters() {
        let sub = Subscription {
            used_traffic: 500,
            traffic_limit: 1000,
            expires_at: Some(NOW),
            enabled: false,
            ..Default::default()
        };
        let summary = sub.summary();
        assert_eq!(summary.download, 500);
        assert_eq!(summary.total, 1000);
        assert_eq!(summary.expire, Some(NOW));
        assert_eq!(
            summary.to_header_value(),
            format!("upload=0; download=500; total=1000; expire={}", NOW)
        );
    }

    #[test]
    fn test_payload_skips_malformed_nodes() {
        let json = r#"{
            "subscription": {"short_id": "abc", "username": "alice"},
            "nodes": [
                {"id": "1", "protocol": "trojan", "server": "a.example", "port": 443},
                {"id": "2", "protocol": "trojan", "server": "b.example", "port": "not-a-port"},
                42
            ]
        }"#;
        let payload = CanonicalPayload::from_json(json).unwrap();
        assert_eq!(payload.subscription.short_id, "abc");
        assert_eq!(payload.nodes.len(), 1);
        assert_eq!(payload.nodes[0].id, "1");
    }
}
