//! Supabase (PostgREST) implementation of [`PersistenceGateway`].

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use super::{from_rows, CarouselRow, PersistenceGateway, SlideRow};
use crate::carousel::model::Carousel;
use crate::error::{CarouselError, CarouselResult};

const CAROUSELS_TABLE: &str = "carousels";
const SLIDES_TABLE: &str = "slides";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

/// `carousels` row with its embedded `slides(*)`.
#[derive(Debug, Deserialize)]
struct CarouselWithSlides {
    #[serde(flatten)]
    carousel: CarouselRow,
    #[serde(default)]
    slides: Vec<SlideRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostgrestError {
    message: Option<String>,
    details: Option<String>,
}

/// Remote store client.
pub struct SupabaseGateway {
    client: Client,
    rest_url: String,
}

impl SupabaseGateway {
    /// Creates a client for the project at `project_url`.
    ///
    /// `access_token` is the signed-in user's JWT; without one the anon key
    /// is used as the bearer token.
    pub fn new(project_url: &str, anon_key: &str, access_token: Option<&str>) -> CarouselResult<Self> {
        let bearer = access_token.filter(|t| !t.is_empty()).unwrap_or(anon_key);

        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header_value(anon_key)?);
        headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn execute(&self, request: RequestBuilder) -> CarouselResult<reqwest::Response> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let parsed: PostgrestError = serde_json::from_str(&body).unwrap_or_default();
            let message = match (parsed.message, parsed.details) {
                (Some(m), Some(d)) => format!("{} ({})", m, d),
                (Some(m), None) => m,
                _ if body.is_empty() => status.to_string(),
                _ => body,
            };
            return Err(CarouselError::persistence(message));
        }
        Ok(resp)
    }
}

fn header_value(value: &str) -> CarouselResult<header::HeaderValue> {
    header::HeaderValue::from_str(value)
        .map_err(|e| CarouselError::configuration(format!("invalid Supabase credential: {}", e)))
}

#[async_trait]
impl PersistenceGateway for SupabaseGateway {
    async fn upsert_carousel(&self, row: &CarouselRow) -> CarouselResult<()> {
        debug!(carousel_id = %row.id, "upserting carousel row");
        let request = self
            .client
            .post(self.table(CAROUSELS_TABLE))
            .header("Prefer", UPSERT_PREFERENCE)
            .json(row);
        self.execute(request).await?;
        Ok(())
    }

    async fn upsert_slides(&self, rows: &[SlideRow]) -> CarouselResult<()> {
        debug!(count = rows.len(), "upserting slide rows");
        let request = self
            .client
            .post(self.table(SLIDES_TABLE))
            .header("Prefer", UPSERT_PREFERENCE)
            .json(rows);
        self.execute(request).await?;
        Ok(())
    }

    async fn fetch_carousels(&self, owner_id: &str) -> CarouselResult<Vec<Carousel>> {
        let owner_filter = format!("eq.{}", owner_id);
        let request = self.client.get(self.table(CAROUSELS_TABLE)).query(&[
            ("select", "*,slides(*)"),
            ("user_id", owner_filter.as_str()),
            ("order", "created_at.desc"),
        ]);
        let rows: Vec<CarouselWithSlides> = self.execute(request).await?.json().await?;
        debug!(count = rows.len(), "fetched carousels");
        Ok(rows
            .into_iter()
            .map(|r| from_rows(r.carousel, r.slides))
            .collect())
    }

    async fn delete_carousel(&self, id: &str) -> CarouselResult<()> {
        let filter = format!("eq.{}", id);
        let request = self
            .client
            .delete(self.table(CAROUSELS_TABLE))
            .query(&[("id", filter.as_str())]);
        self.execute(request).await?;
        Ok(())
    }

    async fn delete_all_carousels(&self, owner_id: &str) -> CarouselResult<()> {
        let filter = format!("eq.{}", owner_id);
        let request = self
            .client
            .delete(self.table(CAROUSELS_TABLE))
            .query(&[("user_id", filter.as_str())]);
        self.execute(request).await?;
        Ok(())
    }
}
