//! Row <-> domain conversions. Text columns that carry typed values
//! (status, couple ids, purge counts) are parsed here and fail loudly.

use anyhow::Context;
use std::collections::BTreeMap;

use crate::contract::couple_id::CoupleId;
use crate::contract::model::{MatchRequest, User};
use crate::domain::repo::{Couple, PurgeEntry, PurgeIntent};
use crate::infra::storage::entity::{couples, match_requests, purge_journal, users};

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(m: users::Model) -> anyhow::Result<Self> {
        let couple_id = m
            .couple_id
            .map(|raw| raw.parse::<CoupleId>())
            .transpose()
            .with_context(|| format!("user {} has a malformed couple_id", m.id))?;
        Ok(Self {
            id: m.id,
            email: m.email,
            display_name: m.display_name,
            couple_id,
            created_at: m.created_at,
        })
    }
}

impl TryFrom<match_requests::Model> for MatchRequest {
    type Error = anyhow::Error;

    fn try_from(m: match_requests::Model) -> anyhow::Result<Self> {
        let status = m
            .status
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("match request {}", m.id))?;
        Ok(Self {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            receiver_email: m.receiver_email,
            anniversary_date: m.anniversary_date,
            message: m.message,
            status,
            created_at: m.created_at,
            updated_at: m.updated_at,
            responded_at: m.responded_at,
        })
    }
}

impl TryFrom<couples::Model> for Couple {
    type Error = anyhow::Error;

    fn try_from(m: couples::Model) -> anyhow::Result<Self> {
        let id = m
            .id
            .parse::<CoupleId>()
            .with_context(|| format!("malformed couple id '{}'", m.id))?;
        Ok(Self {
            id,
            request_id: m.request_id,
            matched_at: m.matched_at,
            anniversary_date: m.anniversary_date,
        })
    }
}

impl TryFrom<purge_journal::Model> for PurgeEntry {
    type Error = anyhow::Error;

    fn try_from(m: purge_journal::Model) -> anyhow::Result<Self> {
        let couple_id = m
            .couple_id
            .parse::<CoupleId>()
            .with_context(|| format!("journal {} has a malformed couple id", m.id))?;
        let purged = parse_counts(&m.purged)
            .with_context(|| format!("journal {} has malformed purge counts", m.id))?;
        Ok(Self {
            intent: PurgeIntent {
                journal_id: m.id,
                couple_id,
                requested_by: m.requested_by,
                requested_at: m.requested_at,
            },
            purged,
            completed_at: m.completed_at,
        })
    }
}

pub fn parse_counts(raw: &str) -> anyhow::Result<BTreeMap<String, u64>> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(raw)?)
}

pub fn encode_counts(counts: &BTreeMap<String, u64>) -> anyhow::Result<String> {
    Ok(serde_json::to_string(counts)?)
}
