use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::contract::error::PairingError;
use crate::contract::model::{
    MatchRequest, MatchRequestStatus, MatchRequestView, MatchResponse, NewMatchRequest, Page,
    PartnerLink, RequestListQuery, UnmatchOutcome,
};

/// REST DTO for sending a match request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMatchRequestReq {
    pub receiver_email: String,
    pub anniversary_date: NaiveDate,
    #[serde(default)]
    pub message: Option<String>,
}

/// REST DTO for answering a received request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RespondMatchRequestReq {
    /// `accept` or `decline`
    pub action: String,
    #[serde(default)]
    pub anniversary_date_override: Option<NaiveDate>,
}

/// REST DTO for list query parameters
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListMatchRequestsQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequestDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub receiver_email: String,
    pub anniversary_date: NaiveDate,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequestPageDto {
    pub items: Vec<MatchRequestDto>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDto {
    pub partner_id: Uuid,
    pub partner_name: Option<String>,
    pub couple_id: String,
    pub matched_at: DateTime<Utc>,
    pub anniversary_date: NaiveDate,
}

/// Result of an unmatch call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchDto {
    pub dissolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub couple_id: Option<String>,
    /// Records removed per shared-data store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub purged: BTreeMap<String, u64>,
}

// Conversion implementations between REST DTOs and contract models

impl From<SendMatchRequestReq> for NewMatchRequest {
    fn from(req: SendMatchRequestReq) -> Self {
        Self {
            receiver_email: req.receiver_email,
            anniversary_date: req.anniversary_date,
            message: req.message,
        }
    }
}

impl From<RespondMatchRequestReq> for MatchResponse {
    fn from(req: RespondMatchRequestReq) -> Self {
        Self {
            action: req.action,
            anniversary_override: req.anniversary_date_override,
        }
    }
}

impl TryFrom<ListMatchRequestsQuery> for RequestListQuery {
    type Error = PairingError;

    fn try_from(q: ListMatchRequestsQuery) -> Result<Self, Self::Error> {
        let status = q
            .status
            .as_deref()
            .map(str::parse::<MatchRequestStatus>)
            .transpose()
            .map_err(PairingError::invalid_input)?;
        Ok(Self {
            status,
            page: q.page,
            limit: q.limit,
        })
    }
}

impl From<MatchRequest> for MatchRequestDto {
    fn from(r: MatchRequest) -> Self {
        Self {
            id: r.id,
            sender_id: r.sender_id,
            receiver_id: r.receiver_id,
            receiver_email: r.receiver_email,
            anniversary_date: r.anniversary_date,
            message: r.message,
            status: r.status.to_string(),
            created_at: r.created_at,
            updated_at: r.updated_at,
            responded_at: r.responded_at,
            sender_name: None,
            sender_email: None,
        }
    }
}

impl From<MatchRequestView> for MatchRequestDto {
    fn from(v: MatchRequestView) -> Self {
        let (sender_name, sender_email) = match v.sender {
            Some(s) => (Some(s.display_name), Some(s.email)),
            None => (None, None),
        };
        Self {
            sender_name,
            sender_email,
            ..Self::from(v.request)
        }
    }
}

impl<T: Into<MatchRequestDto>> From<Page<T>> for MatchRequestPageDto {
    fn from(page: Page<T>) -> Self {
        let page = page.map_items(Into::into);
        Self {
            items: page.items,
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}

impl From<PartnerLink> for PartnerDto {
    fn from(p: PartnerLink) -> Self {
        Self {
            partner_id: p.partner_id,
            partner_name: p.partner_name,
            couple_id: p.couple_id.into(),
            matched_at: p.matched_at,
            anniversary_date: p.anniversary_date,
        }
    }
}

impl From<UnmatchOutcome> for UnmatchDto {
    fn from(outcome: UnmatchOutcome) -> Self {
        match outcome {
            UnmatchOutcome::NotMatched => Self {
                dissolved: false,
                couple_id: None,
                purged: BTreeMap::new(),
            },
            UnmatchOutcome::Dissolved(report) => Self {
                dissolved: true,
                couple_id: Some(report.couple_id.into()),
                purged: report.purged,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::model::UserSummary;
    use serde_json::json;

    fn request() -> MatchRequest {
        let now = Utc::now();
        MatchRequest {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            receiver_email: "b@example.com".into(),
            anniversary_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            message: None,
            status: MatchRequestStatus::Pending,
            created_at: now,
            updated_at: now,
            responded_at: None,
        }
    }

    #[test]
    fn send_request_reads_camel_case() {
        let req: SendMatchRequestReq = serde_json::from_value(json!({
            "receiverEmail": "b@example.com",
            "anniversaryDate": "2024-01-01"
        }))
        .unwrap();
        let new: NewMatchRequest = req.into();
        assert_eq!(new.receiver_email, "b@example.com");
        assert_eq!(new.message, None);
    }

    #[test]
    fn respond_keeps_raw_action_and_override() {
        let req: RespondMatchRequestReq = serde_json::from_value(json!({
            "action": "accepted",
            "anniversaryDateOverride": "2023-06-15"
        }))
        .unwrap();
        let resp: MatchResponse = req.into();
        assert_eq!(resp.action, "accepted");
        assert_eq!(resp.anniversary_override, NaiveDate::from_ymd_opt(2023, 6, 15));
    }

    #[test]
    fn unknown_status_filter_is_invalid_input() {
        let q = ListMatchRequestsQuery {
            status: Some("cancelled".into()),
            ..Default::default()
        };
        let err = RequestListQuery::try_from(q).unwrap_err();
        assert!(matches!(err, PairingError::InvalidInput { .. }));

        let ok = RequestListQuery::try_from(ListMatchRequestsQuery {
            status: Some("declined".into()),
            page: Some(2),
            limit: None,
        })
        .unwrap();
        assert_eq!(ok.status, Some(MatchRequestStatus::Declined));
        assert_eq!(ok.page, Some(2));
    }

    #[test]
    fn view_carries_sender_details_only_when_present() {
        let with_sender = MatchRequestDto::from(MatchRequestView {
            request: request(),
            sender: Some(UserSummary {
                id: Uuid::new_v4(),
                display_name: "Ann".into(),
                email: "a@example.com".into(),
            }),
        });
        let v = serde_json::to_value(&with_sender).unwrap();
        assert_eq!(v["senderName"], "Ann");
        assert_eq!(v["senderEmail"], "a@example.com");
        assert_eq!(v["status"], "pending");

        let orphan = MatchRequestDto::from(MatchRequestView {
            request: request(),
            sender: None,
        });
        let v = serde_json::to_value(&orphan).unwrap();
        assert!(v.get("senderName").is_none());
    }
}
