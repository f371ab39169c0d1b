use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use estatedesk_core::domain::advisor::{Advisor, AdvisorId};
use estatedesk_core::domain::customer::{Customer, CustomerId};
use estatedesk_core::domain::property::{Property, PropertyId};
use estatedesk_core::domain::request::{
    NewRequest, Request, RequestId, RequestStatus, RequestTypeId,
};
use estatedesk_core::store::{RecordStore, RequestLookup, StoreError};

use super::{column, parse_optional_timestamp, parse_timestamp, RepositoryError};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, customer_id, property_id, advisor_id, request_type_id,
                               request_status_id, creation_date, close_date";

const ADVISOR_COLUMNS: &str =
    "a.id, a.first_name, a.second_name, a.first_last_name, a.second_last_name, a.email, a.phone";

/// SQLite-backed record store and read model for requests.
pub struct SqlRequestStore {
    pool: DbPool,
}

impl SqlRequestStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn fetch_request(
        &self,
        lookup: RequestLookup,
    ) -> Result<Option<Request>, RepositoryError> {
        let customer_id = lookup.customer_id.map(|customer_id| customer_id.0);
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM request
             WHERE id = ?1 AND (?2 IS NULL OR customer_id = ?2)"
        ))
        .bind(lookup.request_id.0)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn fetch_request_advisor(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Advisor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ADVISOR_COLUMNS}
             FROM request r
             JOIN advisor a ON a.id = r.advisor_id
             WHERE r.id = ?"
        ))
        .bind(request_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_advisor).transpose()
    }

    async fn fetch_requests_for_pair(
        &self,
        customer_id: CustomerId,
        property_id: PropertyId,
    ) -> Result<Vec<Request>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM request
             WHERE customer_id = ? AND property_id = ?
             ORDER BY id"
        ))
        .bind(customer_id.0)
        .bind(property_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn fetch_customer(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, first_name, second_name, first_last_name, second_last_name,
                    document_number, email, phone
             FROM customer WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn fetch_property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        let row = sqlx::query("SELECT id, address, price, advisor_id FROM property WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(Property {
                id: PropertyId(column(row, "id")?),
                address: column(row, "address")?,
                price: parse_price(&column::<String>(row, "price")?)?,
                advisor_id: column::<Option<i64>>(row, "advisor_id")?.map(AdvisorId),
            })),
            None => Ok(None),
        }
    }

    async fn fetch_advisor(&self, id: AdvisorId) -> Result<Option<Advisor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ADVISOR_COLUMNS} FROM advisor a WHERE a.id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_advisor).transpose()
    }

    async fn insert_request(
        &self,
        customer_id: CustomerId,
        request: NewRequest,
    ) -> Result<Request, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO request (customer_id, property_id, advisor_id, request_type_id,
                                  request_status_id, creation_date, close_date)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(customer_id.0)
        .bind(request.property_id.0)
        .bind(request.advisor_id.map(|advisor_id| advisor_id.0))
        .bind(request.request_type_id.0)
        .bind(request.status.id())
        .bind(request.creation_date.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Request {
            id: RequestId(result.last_insert_rowid()),
            customer_id,
            property_id: request.property_id,
            advisor_id: request.advisor_id,
            request_type_id: request.request_type_id,
            status: request.status,
            creation_date: request.creation_date,
            close_date: None,
        })
    }

    async fn update_request(&self, request: &Request) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE request
             SET advisor_id = ?, request_type_id = ?, request_status_id = ?, close_date = ?
             WHERE id = ?",
        )
        .bind(request.advisor_id.map(|advisor_id| advisor_id.0))
        .bind(request.request_type_id.0)
        .bind(request.status.id())
        .bind(request.close_date.map(|close_date| close_date.to_rfc3339()))
        .bind(request.id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordStore for SqlRequestStore {
    async fn find_request(&self, lookup: RequestLookup) -> Result<Option<Request>, StoreError> {
        Ok(self.fetch_request(lookup).await?)
    }

    async fn find_request_advisor(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Advisor>, StoreError> {
        Ok(self.fetch_request_advisor(request_id).await?)
    }

    async fn find_requests_by_customer_and_property(
        &self,
        customer_id: CustomerId,
        property_id: PropertyId,
    ) -> Result<Vec<Request>, StoreError> {
        Ok(self.fetch_requests_for_pair(customer_id, property_id).await?)
    }

    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.fetch_customer(id).await?)
    }

    async fn find_property(&self, id: PropertyId) -> Result<Option<Property>, StoreError> {
        Ok(self.fetch_property(id).await?)
    }

    async fn find_advisor(&self, id: AdvisorId) -> Result<Option<Advisor>, StoreError> {
        Ok(self.fetch_advisor(id).await?)
    }

    async fn create_request(
        &self,
        customer_id: CustomerId,
        request: NewRequest,
    ) -> Result<Request, StoreError> {
        Ok(self.insert_request(customer_id, request).await?)
    }

    async fn save_request(&self, request: Request) -> Result<Request, StoreError> {
        match self.update_request(&request).await? {
            0 => Err(StoreError::MissingRecord(format!("request {}", request.id))),
            _ => Ok(request),
        }
    }
}

fn row_to_request(row: &SqliteRow) -> Result<Request, RepositoryError> {
    Ok(Request {
        id: RequestId(column(row, "id")?),
        customer_id: CustomerId(column(row, "customer_id")?),
        property_id: PropertyId(column(row, "property_id")?),
        advisor_id: column::<Option<i64>>(row, "advisor_id")?.map(AdvisorId),
        request_type_id: RequestTypeId(column(row, "request_type_id")?),
        status: RequestStatus::from_id(column(row, "request_status_id")?),
        creation_date: parse_timestamp(&column::<String>(row, "creation_date")?)?,
        close_date: parse_optional_timestamp(column(row, "close_date")?)?,
    })
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(column(row, "id")?),
        first_name: column(row, "first_name")?,
        second_name: column(row, "second_name")?,
        first_last_name: column(row, "first_last_name")?,
        second_last_name: column(row, "second_last_name")?,
        document_number: column(row, "document_number")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
    })
}

pub(crate) fn row_to_advisor(row: &SqliteRow) -> Result<Advisor, RepositoryError> {
    Ok(Advisor {
        id: AdvisorId(column(row, "id")?),
        first_name: column(row, "first_name")?,
        second_name: column(row, "second_name")?,
        first_last_name: column(row, "first_last_name")?,
        second_last_name: column(row, "second_last_name")?,
        email: column(row, "email")?,
        phone: column(row, "phone")?,
    })
}

pub(crate) fn parse_price(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("price `{value}`: {error}")))
}
