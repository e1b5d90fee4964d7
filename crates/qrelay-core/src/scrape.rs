//! Best-effort catalog scraping helper.
//!
//! Inbound messages containing [`CATALOG_TRIGGER`] get a reply listing the
//! top products from the Wildberries public search API.

use async_trait::async_trait;
use serde_json::Value;

use crate::{errors::Error, Result};

/// Text trigger recognized by the inbound relay.
pub const CATALOG_TRIGGER: &str = "wild: любой товар";

const SEARCH_URL: &str = "https://search.wb.ru/exactmatch/ru/common/v4/search";

#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Up to `count` formatted product lines.
    async fn top_products(&self, count: usize) -> Result<Vec<String>>;
}

/// Live catalog source hitting the Wildberries search API.
pub struct WildberriesCatalog {
    http: reqwest::Client,
}

impl WildberriesCatalog {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client build");
        Self { http }
    }
}

impl Default for WildberriesCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductSource for WildberriesCatalog {
    async fn top_products(&self, count: usize) -> Result<Vec<String>> {
        let mut products: Vec<Value> = Vec::new();
        let mut page = 1u32;

        while products.len() < count {
            let page_param = page.to_string();
            let resp = self
                .http
                .get(SEARCH_URL)
                .query(&[
                    ("appType", "1"),
                    ("curr", "rub"),
                    ("dest", "-1029256,-102269,-2162196,-1255563"),
                    ("regions", "77"),
                    ("resultset", "catalog"),
                    ("query", "любой товар"),
                    ("sort", "popular"),
                    ("spp", "0"),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await
                .map_err(|e| Error::Upstream(format!("catalog request error: {e}")))?;

            if !resp.status().is_success() {
                return Err(Error::Upstream(format!(
                    "catalog search failed: {}",
                    resp.status()
                )));
            }

            // The API sometimes answers with a non-JSON content type; parse
            // the body regardless.
            let text = resp
                .text()
                .await
                .map_err(|e| Error::Upstream(format!("catalog read error: {e}")))?;
            let body: Value = serde_json::from_str(&text)?;

            let Some(batch) = body
                .get("data")
                .and_then(|d| d.get("products"))
                .and_then(|p| p.as_array())
            else {
                break;
            };
            if batch.is_empty() {
                break;
            }

            products.extend(batch.iter().cloned());
            page += 1;
        }

        products.truncate(count);
        Ok(format_products(&products))
    }
}

/// `"{name} - {price} руб. - {link}"` per product; prices arrive in kopecks.
fn format_products(products: &[Value]) -> Vec<String> {
    products
        .iter()
        .map(|p| {
            let name = p.get("name").and_then(|v| v.as_str()).unwrap_or("?");
            let price = p
                .get("salePriceU")
                .and_then(|v| v.as_f64())
                .map(|kopecks| kopecks / 100.0)
                .unwrap_or(0.0);
            let id = p.get("id").and_then(|v| v.as_i64()).unwrap_or(0);
            format!(
                "{name} - {price} руб. - https://www.wildberries.ru/catalog/{id}/detail.aspx"
            )
        })
        .collect()
}
