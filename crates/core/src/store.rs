use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::advisor::{Advisor, AdvisorId};
use crate::domain::customer::{Customer, CustomerId};
use crate::domain::property::{Property, PropertyId};
use crate::domain::request::{NewRequest, Request, RequestId};
use crate::projection::{RequestDetail, RequestSummary};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("referenced record does not exist: {0}")]
    InvalidReference(String),
    #[error("stored record could not be decoded: {0}")]
    Decode(String),
    #[error("record does not exist: {0}")]
    MissingRecord(String),
}

/// Selects a single request, optionally scoped to its owning customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestLookup {
    pub customer_id: Option<CustomerId>,
    pub request_id: RequestId,
}

impl RequestLookup {
    pub fn by_id(request_id: RequestId) -> Self {
        Self { customer_id: None, request_id }
    }

    pub fn for_customer(customer_id: CustomerId, request_id: RequestId) -> Self {
        Self { customer_id: Some(customer_id), request_id }
    }

    fn matches(&self, request: &Request) -> bool {
        request.id == self.request_id
            && self.customer_id.map_or(true, |customer_id| request.customer_id == customer_id)
    }
}

/// Write-side access the lifecycle engine needs.
///
/// `create_request` must refuse a second open request for the same
/// customer and property with [`StoreError::UniqueViolation`]; this is what
/// closes the race between two concurrent creates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_request(&self, lookup: RequestLookup) -> Result<Option<Request>, StoreError>;

    async fn find_request_advisor(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Advisor>, StoreError>;

    async fn find_requests_by_customer_and_property(
        &self,
        customer_id: CustomerId,
        property_id: PropertyId,
    ) -> Result<Vec<Request>, StoreError>;

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    async fn find_property(&self, id: PropertyId) -> Result<Option<Property>, StoreError>;

    async fn find_advisor(&self, id: AdvisorId) -> Result<Option<Advisor>, StoreError>;

    async fn create_request(
        &self,
        customer_id: CustomerId,
        request: NewRequest,
    ) -> Result<Request, StoreError>;

    async fn save_request(&self, request: Request) -> Result<Request, StoreError>;
}

/// Read projections for listing and detail views.
#[async_trait]
pub trait RequestReadModel: Send + Sync {
    async fn list_customer_requests(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<RequestSummary>, StoreError>;

    async fn find_request_detail(
        &self,
        customer_id: CustomerId,
        request_id: RequestId,
    ) -> Result<Option<RequestDetail>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    requests: RwLock<HashMap<i64, Request>>,
    customers: RwLock<HashMap<i64, Customer>>,
    properties: RwLock<HashMap<i64, Property>>,
    advisors: RwLock<HashMap<i64, Advisor>>,
    next_request_id: AtomicI64,
    writes: AtomicUsize,
}

impl InMemoryRecordStore {
    pub async fn insert_customer(&self, customer: Customer) {
        self.customers.write().await.insert(customer.id.0, customer);
    }

    pub async fn insert_advisor(&self, advisor: Advisor) {
        self.advisors.write().await.insert(advisor.id.0, advisor);
    }

    pub async fn insert_property(&self, property: Property) {
        self.properties.write().await.insert(property.id.0, property);
    }

    /// Seeds a request as-is, bypassing the open-request constraint.
    pub async fn insert_request(&self, request: Request) {
        self.next_request_id.fetch_max(request.id.0, Ordering::SeqCst);
        self.requests.write().await.insert(request.id.0, request);
    }

    pub async fn request(&self, id: RequestId) -> Option<Request> {
        self.requests.read().await.get(&id.0).cloned()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Number of successful `create_request` and `save_request` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_request(&self, lookup: RequestLookup) -> Result<Option<Request>, StoreError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&lookup.request_id.0).filter(|request| lookup.matches(request)).cloned())
    }

    async fn find_request_advisor(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Advisor>, StoreError> {
        let advisor_id = {
            let requests = self.requests.read().await;
            requests.get(&request_id.0).and_then(|request| request.advisor_id)
        };
        match advisor_id {
            Some(advisor_id) => self.find_advisor(advisor_id).await,
            None => Ok(None),
        }
    }

    async fn find_requests_by_customer_and_property(
        &self,
        customer_id: CustomerId,
        property_id: PropertyId,
    ) -> Result<Vec<Request>, StoreError> {
        let requests = self.requests.read().await;
        let mut matching = requests
            .values()
            .filter(|request| {
                request.customer_id == customer_id && request.property_id == property_id
            })
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by_key(|request| request.id.0);
        Ok(matching)
    }

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.read().await.get(&id.0).cloned())
    }

    async fn find_property(&self, id: PropertyId) -> Result<Option<Property>, StoreError> {
        Ok(self.properties.read().await.get(&id.0).cloned())
    }

    async fn find_advisor(&self, id: AdvisorId) -> Result<Option<Advisor>, StoreError> {
        Ok(self.advisors.read().await.get(&id.0).cloned())
    }

    async fn create_request(
        &self,
        customer_id: CustomerId,
        request: NewRequest,
    ) -> Result<Request, StoreError> {
        let mut requests = self.requests.write().await;
        let open_duplicate = requests.values().any(|existing| {
            existing.customer_id == customer_id
                && existing.property_id == request.property_id
                && existing.is_open()
        });
        if open_duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "open request for customer {customer_id} and property {}",
                request.property_id
            )));
        }

        let id = RequestId(self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1);
        let created = Request {
            id,
            customer_id,
            property_id: request.property_id,
            advisor_id: request.advisor_id,
            request_type_id: request.request_type_id,
            status: request.status,
            creation_date: request.creation_date,
            close_date: None,
        };
        requests.insert(id.0, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn save_request(&self, request: Request) -> Result<Request, StoreError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id.0) {
            Some(existing) => {
                *existing = request.clone();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(request)
            }
            None => Err(StoreError::MissingRecord(format!("request {}", request.id))),
        }
    }
}
