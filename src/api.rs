//! Blocking client for the Pegasus backend (`/api/v1`). Fetches run on
//! worker threads owned by the app; results travel back over the event
//! channel. The client never retries on its own — a failed fetch surfaces
//! as a pane error and waits for an explicit reload.

use crate::chart_data::CategoryCount;
use crate::dataset::Dataset;
use crate::view::Row;
use log::debug;
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Backend list endpoints cap `limit`; the client pages through with this
/// chunk size until a short page comes back.
const LIST_CHUNK: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("requête échouée: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} sur {url}")]
    Status { status: u16, url: String },

    #[error("réponse inattendue de {url}: {detail}")]
    Shape { url: String, detail: String },
}

impl ApiError {
    fn shape(url: &str, detail: impl Into<String>) -> Self {
        ApiError::Shape {
            url: url.to_string(),
            detail: detail.into(),
        }
    }
}

/// Shared HTTP client. Cheap to clone; worker threads each hold a clone.
#[derive(Clone)]
pub struct PegasusClient {
    http: Client,
    base_url: String,
}

impl PegasusClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, url: &str) -> Result<Value, ApiError> {
        debug!("GET {url}");
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let value = response
            .json::<Value>()
            .map_err(|e| ApiError::shape(url, format!("JSON invalide ({e})")))?;
        Ok(value)
    }

    /// Root endpoint; used to verify connectivity before entering the UI.
    pub fn health(&self) -> Result<(), ApiError> {
        let url = self.url("/");
        let value = self.get(&url)?;
        match value {
            Value::Object(_) => Ok(()),
            _ => Err(ApiError::shape(&url, "objet attendu")),
        }
    }

    /// Fetch every row of a list endpoint, paging with limit/offset until a
    /// short page signals the end.
    pub fn list_rows(&self, dataset: Dataset) -> Result<Vec<Row>, ApiError> {
        let mut rows: Vec<Row> = Vec::new();
        let mut offset = 0usize;
        loop {
            let url = self.url(&format!(
                "/api/v1/{}/?limit={LIST_CHUNK}&offset={offset}",
                dataset.path()
            ));
            let page = expect_rows(&url, self.get(&url)?)?;
            let got = page.len();
            rows.extend(page);
            if got < LIST_CHUNK {
                break;
            }
            offset += got;
        }
        debug!("{}: {} lignes chargées", dataset.path(), rows.len());
        Ok(rows)
    }

    /// Stats endpoint: a single object of named numeric KPIs. Non-numeric
    /// fields are skipped.
    pub fn stats(&self, dataset: Dataset) -> Result<BTreeMap<String, f64>, ApiError> {
        let url = self.url(&format!("/api/v1/{}/stats", dataset.path()));
        let value = self.get(&url)?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ApiError::shape(
                    &url,
                    format!("objet attendu, reçu {}", type_name(&other)),
                ))
            }
        };
        let mut stats = BTreeMap::new();
        for (key, value) in object {
            match value.as_f64() {
                Some(number) => {
                    stats.insert(key, number);
                }
                None => debug!("stat ignorée (non numérique): {key}"),
            }
        }
        Ok(stats)
    }

    /// Aggregate endpoint: counts grouped by `by`, optionally restricted to
    /// one `field=value` filter.
    pub fn aggregate(
        &self,
        dataset: Dataset,
        by: &str,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<CategoryCount>, ApiError> {
        let mut query = format!("by={}", urlencoding::encode(by));
        if let Some((field, value)) = filter {
            query.push_str(&format!(
                "&{}={}",
                urlencoding::encode(field),
                urlencoding::encode(value)
            ));
        }
        let url = self.url(&format!("/api/v1/{}/aggregate?{query}", dataset.path()));
        let value = self.get(&url)?;
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(ApiError::shape(
                    &url,
                    format!("tableau attendu, reçu {}", type_name(&other)),
                ))
            }
        };
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<CategoryCount>(item)
                    .map_err(|e| ApiError::shape(&url, format!("paire catégorie/count invalide ({e})")))
            })
            .collect()
    }

    /// Distinct-values endpoint: filter-field name -> allowed string values.
    pub fn distinct(&self, dataset: Dataset) -> Result<BTreeMap<String, Vec<String>>, ApiError> {
        let url = self.url(&format!("/api/v1/{}/distinct", dataset.path()));
        let value = self.get(&url)?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ApiError::shape(
                    &url,
                    format!("objet attendu, reçu {}", type_name(&other)),
                ))
            }
        };
        let mut distinct = BTreeMap::new();
        for (field, values) in object {
            let items = match values {
                Value::Array(items) => items,
                other => {
                    return Err(ApiError::shape(
                        &url,
                        format!("tableau attendu pour {field}, reçu {}", type_name(&other)),
                    ))
                }
            };
            let strings: Vec<String> = items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect();
            distinct.insert(field, strings);
        }
        Ok(distinct)
    }
}

/// A list endpoint must answer with an array of objects.
fn expect_rows(url: &str, value: Value) -> Result<Vec<Row>, ApiError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(ApiError::shape(
                url,
                format!("tableau attendu, reçu {}", type_name(&other)),
            ))
        }
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(ApiError::shape(
                url,
                format!("ligne non-objet ({})", type_name(&other)),
            )),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "booléen",
        Value::Number(_) => "nombre",
        Value::String(_) => "chaîne",
        Value::Array(_) => "tableau",
        Value::Object(_) => "objet",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_building_trims_slashes() {
        let client = PegasusClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.url("/api/v1/sites/stats"),
            "http://localhost:8000/api/v1/sites/stats"
        );
    }

    #[test]
    fn rows_require_array_of_objects() {
        let ok = expect_rows("u", json!([{"a": 1}, {"b": null}])).unwrap();
        assert_eq!(ok.len(), 2);

        let not_array = expect_rows("u", json!({"a": 1}));
        assert!(matches!(not_array, Err(ApiError::Shape { .. })));

        let bad_item = expect_rows("u", json!([{"a": 1}, 42]));
        assert!(matches!(bad_item, Err(ApiError::Shape { .. })));
    }

    #[test]
    fn aggregate_pairs_deserialize() {
        let pair: CategoryCount =
            serde_json::from_value(json!({"category": "Kinshasa", "count": 12})).unwrap();
        assert_eq!(pair.category, "Kinshasa");
        assert_eq!(pair.count, 12);
    }
}
