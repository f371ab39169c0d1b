use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::advisor::AdvisorId;
use crate::domain::customer::CustomerId;
use crate::domain::property::PropertyId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestTypeId(pub i64);

impl fmt::Display for RequestTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a request, stored as a small integer.
///
/// Only `Sent`, `Assigned` and `Cancelled` drive lifecycle rules. Any other
/// identifier is carried through unchanged as `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RequestStatus {
    Sent,
    Assigned,
    Cancelled,
    Other(i64),
}

impl RequestStatus {
    pub const SENT_ID: i64 = 1;
    pub const ASSIGNED_ID: i64 = 2;
    pub const CANCELLED_ID: i64 = 12;

    pub fn id(&self) -> i64 {
        match self {
            Self::Sent => Self::SENT_ID,
            Self::Assigned => Self::ASSIGNED_ID,
            Self::Cancelled => Self::CANCELLED_ID,
            Self::Other(id) => *id,
        }
    }

    pub fn from_id(id: i64) -> Self {
        match id {
            Self::SENT_ID => Self::Sent,
            Self::ASSIGNED_ID => Self::Assigned,
            Self::CANCELLED_ID => Self::Cancelled,
            other => Self::Other(other),
        }
    }
}

impl From<i64> for RequestStatus {
    fn from(value: i64) -> Self {
        Self::from_id(value)
    }
}

impl From<RequestStatus> for i64 {
    fn from(value: RequestStatus) -> Self {
        value.id()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Assigned => write!(f, "assigned"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Other(id) => write!(f, "status#{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub customer_id: CustomerId,
    pub property_id: PropertyId,
    pub advisor_id: Option<AdvisorId>,
    pub request_type_id: RequestTypeId,
    pub status: RequestStatus,
    pub creation_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
}

impl Request {
    /// A request stays open until a close date is recorded, whatever its status.
    pub fn is_open(&self) -> bool {
        self.close_date.is_none()
    }
}

/// Customer-supplied fields for a new request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub customer_id: CustomerId,
    pub property_id: PropertyId,
    pub request_type_id: RequestTypeId,
}

/// A request ready to be written; the store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub property_id: PropertyId,
    pub advisor_id: Option<AdvisorId>,
    pub request_type_id: RequestTypeId,
    pub status: RequestStatus,
    pub creation_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Request, RequestId, RequestStatus, RequestTypeId};
    use crate::domain::{advisor::AdvisorId, customer::CustomerId, property::PropertyId};

    #[test]
    fn known_status_ids_map_to_named_variants() {
        assert_eq!(RequestStatus::from_id(1), RequestStatus::Sent);
        assert_eq!(RequestStatus::from_id(2), RequestStatus::Assigned);
        assert_eq!(RequestStatus::from_id(12), RequestStatus::Cancelled);
        assert_eq!(RequestStatus::from_id(7), RequestStatus::Other(7));
        assert_eq!(RequestStatus::Other(7).id(), 7);
    }

    #[test]
    fn status_serializes_as_bare_integer() {
        let json = serde_json::to_string(&RequestStatus::Cancelled).expect("serialize");
        assert_eq!(json, "12");

        let parsed: RequestStatus = serde_json::from_str("4").expect("deserialize");
        assert_eq!(parsed, RequestStatus::Other(4));
    }

    #[test]
    fn request_without_close_date_is_open() {
        let mut request = Request {
            id: RequestId(1),
            customer_id: CustomerId(10),
            property_id: PropertyId(5),
            advisor_id: Some(AdvisorId(3)),
            request_type_id: RequestTypeId(1),
            status: RequestStatus::Cancelled,
            creation_date: Utc::now(),
            close_date: None,
        };
        assert!(request.is_open());

        request.close_date = Some(Utc::now());
        assert!(!request.is_open());
    }
}
