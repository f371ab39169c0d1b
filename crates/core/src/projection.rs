//! Read views over requests and their related records.
//!
//! The list view keeps nested data small (one cover picture per property);
//! the detail view carries everything a customer needs to follow up on a
//! single request, including the advisor's contact fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::advisor::{Advisor, AdvisorId};
use crate::domain::customer::CustomerId;
use crate::domain::property::PropertyId;
use crate::domain::request::{RequestId, RequestTypeId};
use crate::errors::{ApplicationError, EntityKind};
use crate::store::RequestReadModel;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPicture {
    pub id: i64,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRef {
    pub id: i64,
    pub name: String,
    pub department: NamedRef,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOverview {
    pub id: PropertyId,
    pub address: String,
    pub price: Decimal,
    pub property_type: Option<NamedRef>,
    pub cover_picture: Option<PropertyPicture>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetail {
    pub id: PropertyId,
    pub address: String,
    pub price: Decimal,
    pub video_source: Option<String>,
    pub property_type: Option<NamedRef>,
    pub pictures: Vec<PropertyPicture>,
    pub city: Option<CityRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorContact {
    pub id: AdvisorId,
    pub first_name: String,
    pub second_name: Option<String>,
    pub first_last_name: String,
    pub second_last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

impl From<Advisor> for AdvisorContact {
    fn from(advisor: Advisor) -> Self {
        Self {
            id: advisor.id,
            first_name: advisor.first_name,
            second_name: advisor.second_name,
            first_last_name: advisor.first_last_name,
            second_last_name: advisor.second_last_name,
            email: advisor.email,
            phone: advisor.phone,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub creation_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
    pub request_type: NamedRef,
    pub request_status: NamedRef,
    pub property: PropertyOverview,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetail {
    pub id: RequestId,
    pub creation_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
    pub request_type_id: RequestTypeId,
    pub advisor_id: Option<AdvisorId>,
    pub request_type: NamedRef,
    pub request_status: NamedRef,
    pub property: PropertyDetail,
    pub advisor: Option<AdvisorContact>,
    pub reports: Vec<Report>,
}

pub async fn list_requests<R>(
    read_model: &R,
    customer_id: CustomerId,
) -> Result<Vec<RequestSummary>, ApplicationError>
where
    R: RequestReadModel + ?Sized,
{
    Ok(read_model.list_customer_requests(customer_id).await?)
}

pub async fn request_detail<R>(
    read_model: &R,
    customer_id: CustomerId,
    request_id: RequestId,
) -> Result<RequestDetail, ApplicationError>
where
    R: RequestReadModel + ?Sized,
{
    read_model
        .find_request_detail(customer_id, request_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found(EntityKind::Request, request_id))
}
