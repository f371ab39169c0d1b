use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use estatedesk_core::domain::advisor::AdvisorId;
use estatedesk_core::domain::customer::CustomerId;
use estatedesk_core::domain::property::PropertyId;
use estatedesk_core::domain::request::{RequestId, RequestTypeId};
use estatedesk_core::projection::{
    AdvisorContact, CityRef, NamedRef, PropertyDetail, PropertyOverview, PropertyPicture, Report,
    RequestDetail, RequestSummary,
};
use estatedesk_core::store::{RequestReadModel, StoreError};

use super::request::{parse_price, row_to_advisor, SqlRequestStore};
use super::{column, parse_optional_timestamp, parse_timestamp, RepositoryError};

const SUMMARY_QUERY: &str = "
    SELECT r.id, r.creation_date, r.close_date,
           rt.id AS request_type_id, rt.name AS request_type_name,
           rs.id AS request_status_id, rs.name AS request_status_name,
           p.id AS property_id, p.address, p.price,
           pt.id AS property_type_id, pt.name AS property_type_name,
           pp.id AS picture_id, pp.url AS picture_url
    FROM request r
    JOIN request_type rt ON rt.id = r.request_type_id
    JOIN request_status rs ON rs.id = r.request_status_id
    JOIN property p ON p.id = r.property_id
    LEFT JOIN property_type pt ON pt.id = p.property_type_id
    LEFT JOIN property_picture pp ON pp.id = (
        SELECT cover.id FROM property_picture cover
        WHERE cover.property_id = p.id
        ORDER BY cover.position, cover.id
        LIMIT 1
    )
    WHERE r.customer_id = ?
    ORDER BY r.creation_date DESC, r.id DESC";

const DETAIL_QUERY: &str = "
    SELECT r.id, r.creation_date, r.close_date, r.request_type_id, r.advisor_id,
           rt.name AS request_type_name,
           rs.id AS request_status_id, rs.name AS request_status_name,
           p.id AS property_id, p.address, p.price, p.video_source,
           pt.id AS property_type_id, pt.name AS property_type_name,
           c.id AS city_id, c.name AS city_name,
           d.id AS department_id, d.name AS department_name
    FROM request r
    JOIN request_type rt ON rt.id = r.request_type_id
    JOIN request_status rs ON rs.id = r.request_status_id
    JOIN property p ON p.id = r.property_id
    LEFT JOIN property_type pt ON pt.id = p.property_type_id
    LEFT JOIN city c ON c.id = p.city_id
    LEFT JOIN department d ON d.id = c.department_id
    WHERE r.id = ? AND r.customer_id = ?";

impl SqlRequestStore {
    async fn fetch_summaries(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<RequestSummary>, RepositoryError> {
        let rows = sqlx::query(SUMMARY_QUERY).bind(customer_id.0).fetch_all(self.pool()).await?;
        rows.iter().map(row_to_summary).collect()
    }

    async fn fetch_detail(
        &self,
        customer_id: CustomerId,
        request_id: RequestId,
    ) -> Result<Option<RequestDetail>, RepositoryError> {
        let Some(row) = sqlx::query(DETAIL_QUERY)
            .bind(request_id.0)
            .bind(customer_id.0)
            .fetch_optional(self.pool())
            .await?
        else {
            return Ok(None);
        };

        let property_id = PropertyId(column(&row, "property_id")?);
        let advisor_id = column::<Option<i64>>(&row, "advisor_id")?.map(AdvisorId);

        let pictures = sqlx::query(
            "SELECT id, url FROM property_picture WHERE property_id = ? ORDER BY position, id",
        )
        .bind(property_id.0)
        .fetch_all(self.pool())
        .await?
        .iter()
        .map(|picture| {
            Ok(PropertyPicture { id: column(picture, "id")?, url: column(picture, "url")? })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let advisor = match advisor_id {
            Some(advisor_id) => sqlx::query(
                "SELECT a.id, a.first_name, a.second_name, a.first_last_name,
                        a.second_last_name, a.email, a.phone
                 FROM advisor a WHERE a.id = ?",
            )
            .bind(advisor_id.0)
            .fetch_optional(self.pool())
            .await?
            .as_ref()
            .map(row_to_advisor)
            .transpose()?
            .map(AdvisorContact::from),
            None => None,
        };

        let reports = sqlx::query(
            "SELECT id, comment, created_at FROM report WHERE request_id = ? ORDER BY created_at, id",
        )
        .bind(request_id.0)
        .fetch_all(self.pool())
        .await?
        .iter()
        .map(|report| {
            Ok(Report {
                id: column(report, "id")?,
                comment: column(report, "comment")?,
                created_at: parse_timestamp(&column::<String>(report, "created_at")?)?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let city = match column::<Option<i64>>(&row, "city_id")? {
            Some(city_id) => Some(CityRef {
                id: city_id,
                name: column(&row, "city_name")?,
                department: NamedRef {
                    id: column(&row, "department_id")?,
                    name: column(&row, "department_name")?,
                },
            }),
            None => None,
        };

        Ok(Some(RequestDetail {
            id: RequestId(column(&row, "id")?),
            creation_date: parse_timestamp(&column::<String>(&row, "creation_date")?)?,
            close_date: parse_optional_timestamp(column(&row, "close_date")?)?,
            request_type_id: RequestTypeId(column(&row, "request_type_id")?),
            advisor_id,
            request_type: NamedRef {
                id: column(&row, "request_type_id")?,
                name: column(&row, "request_type_name")?,
            },
            request_status: NamedRef {
                id: column(&row, "request_status_id")?,
                name: column(&row, "request_status_name")?,
            },
            property: PropertyDetail {
                id: property_id,
                address: column(&row, "address")?,
                price: parse_price(&column::<String>(&row, "price")?)?,
                video_source: column(&row, "video_source")?,
                property_type: property_type(&row)?,
                pictures,
                city,
            },
            advisor,
            reports,
        }))
    }
}

#[async_trait]
impl RequestReadModel for SqlRequestStore {
    async fn list_customer_requests(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<RequestSummary>, StoreError> {
        Ok(self.fetch_summaries(customer_id).await?)
    }

    async fn find_request_detail(
        &self,
        customer_id: CustomerId,
        request_id: RequestId,
    ) -> Result<Option<RequestDetail>, StoreError> {
        Ok(self.fetch_detail(customer_id, request_id).await?)
    }
}

fn property_type(row: &SqliteRow) -> Result<Option<NamedRef>, RepositoryError> {
    match column::<Option<i64>>(row, "property_type_id")? {
        Some(id) => Ok(Some(NamedRef { id, name: column(row, "property_type_name")? })),
        None => Ok(None),
    }
}

fn row_to_summary(row: &SqliteRow) -> Result<RequestSummary, RepositoryError> {
    let cover_picture = match column::<Option<i64>>(row, "picture_id")? {
        Some(id) => Some(PropertyPicture { id, url: column(row, "picture_url")? }),
        None => None,
    };

    Ok(RequestSummary {
        id: RequestId(column(row, "id")?),
        creation_date: parse_timestamp(&column::<String>(row, "creation_date")?)?,
        close_date: parse_optional_timestamp(column(row, "close_date")?)?,
        request_type: NamedRef {
            id: column(row, "request_type_id")?,
            name: column(row, "request_type_name")?,
        },
        request_status: NamedRef {
            id: column(row, "request_status_id")?,
            name: column(row, "request_status_name")?,
        },
        property: PropertyOverview {
            id: PropertyId(column(row, "property_id")?),
            address: column(row, "address")?,
            price: parse_price(&column::<String>(row, "price")?)?,
            property_type: property_type(row)?,
            cover_picture,
        },
    })
}
