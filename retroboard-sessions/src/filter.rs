//! Listing filters
//!
//! Query parameters are resolved permissively: unknown keys are ignored and a
//! malformed value only drops its own key, so a listing never fails because
//! of a client-side typo.

use crate::types::{BoardSession, SessionRole};
use std::collections::HashSet;

/// Conjunction of optional predicates over session fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub connected: Option<bool>,
    pub ready: Option<bool>,
    pub raised_hand: Option<bool>,
    pub role: Option<SessionRole>,
}

impl SessionFilter {
    /// Filter that matches every session
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = Some(connected);
        self
    }

    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }

    pub fn with_raised_hand(mut self, raised_hand: bool) -> Self {
        self.raised_hand = Some(raised_hand);
        self
    }

    pub fn with_role(mut self, role: SessionRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Resolve a filter from raw query pairs.
    ///
    /// The first occurrence of a key decides its value.
    pub fn from_query<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        let mut seen = HashSet::new();

        for (key, value) in params {
            let key = key.as_ref();
            if !seen.insert(key.to_string()) {
                continue;
            }

            let value = value.as_ref();
            match key {
                "connected" => filter.connected = parse_bool(value),
                "ready" => filter.ready = parse_bool(value),
                "raisedHand" => filter.raised_hand = parse_bool(value),
                "role" => filter.role = value.parse().ok(),
                _ => {}
            }
        }

        filter
    }

    pub fn matches(&self, session: &BoardSession) -> bool {
        self.connected.map_or(true, |c| session.connected == c)
            && self.ready.map_or(true, |r| session.ready == r)
            && self.raised_hand.map_or(true, |h| session.raised_hand == h)
            && self.role.map_or(true, |role| session.role == role)
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }
}

/// Accepts the usual spellings: 1, t, T, TRUE, true, True and their false counterparts.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
