//! Row sources: turn an uploaded file reference into raw price rows.
//!
//! Files are CSV with a header row and columns `sku, price, cost, msrp`.
//! Rows that cannot be read or whose SKU/price do not parse are skipped.

use std::io::Read;

use url::Url;

/// One parsed input row. `cost` is optional here because temporary campaigns
/// take their cost from the base campaign and ignore the column.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub sku: String,
    pub price: f64,
    pub cost: Option<f64>,
    /// Defaults to 0 when missing or unparseable.
    pub msrp: f64,
}

impl RawRow {
    pub fn new(sku: impl Into<String>, price: f64, cost: f64, msrp: f64) -> Self {
        Self {
            sku: sku.into(),
            price,
            cost: Some(cost),
            msrp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RowSourceError {
    #[error("invalid file reference: {0}")]
    InvalidReference(String),

    #[error("unsupported file reference scheme: {0}")]
    UnsupportedScheme(String),

    #[error("failed to read {reference}: {message}")]
    Io { reference: String, message: String },

    #[error("failed to fetch {reference}: {message}")]
    Http { reference: String, message: String },
}

/// Fetches rows for a file reference.
#[async_trait::async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_rows(&self, reference: &str) -> Result<Vec<RawRow>, RowSourceError>;
}

const SKU_COLUMN: usize = 0;
const PRICE_COLUMN: usize = 1;
const COST_COLUMN: usize = 2;
const MSRP_COLUMN: usize = 3;

/// Finite numbers only: `inf` and `NaN` parse as floats but are not prices.
fn parse_number(field: Option<&str>) -> Option<f64> {
    field
        .and_then(|f| f.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse CSV content (header row first). Unreadable or malformed rows are
/// logged at `debug` and skipped.
pub fn parse_rows<R: Read>(reader: R) -> Vec<RawRow> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, record) in csv.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(line = line + 2, error = %err, "skipping unreadable row");
                continue;
            }
        };

        let sku = record.get(SKU_COLUMN).unwrap_or_default();
        let price = parse_number(record.get(PRICE_COLUMN));
        match (sku.is_empty(), price) {
            (false, Some(price)) => rows.push(RawRow {
                sku: sku.to_string(),
                price,
                cost: parse_number(record.get(COST_COLUMN)),
                msrp: parse_number(record.get(MSRP_COLUMN)).unwrap_or(0.0),
            }),
            _ => tracing::debug!(line = line + 2, "skipping malformed row"),
        }
    }
    rows
}

fn parse_reference(reference: &str) -> Result<Url, RowSourceError> {
    Url::parse(reference.trim()).map_err(|e| RowSourceError::InvalidReference(format!("{reference}: {e}")))
}

/// Reads `file://` references from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFileRowSource;

#[async_trait::async_trait]
impl RowSource for CsvFileRowSource {
    async fn fetch_rows(&self, reference: &str) -> Result<Vec<RawRow>, RowSourceError> {
        let url = parse_reference(reference)?;
        if url.scheme() != "file" {
            return Err(RowSourceError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| RowSourceError::InvalidReference(reference.to_string()))?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| RowSourceError::Io {
            reference: reference.to_string(),
            message: e.to_string(),
        })?;
        Ok(parse_rows(bytes.as_slice()))
    }
}

/// Downloads `http(s)://` references (e.g. pre-signed object storage URLs).
#[derive(Debug, Clone, Default)]
pub struct HttpRowSource {
    client: reqwest::Client,
}

impl HttpRowSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RowSource for HttpRowSource {
    async fn fetch_rows(&self, reference: &str) -> Result<Vec<RawRow>, RowSourceError> {
        let url = parse_reference(reference)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RowSourceError::UnsupportedScheme(url.scheme().to_string()));
        }

        let http_err = |e: reqwest::Error| RowSourceError::Http {
            reference: reference.to_string(),
            message: e.to_string(),
        };
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?
            .bytes()
            .await
            .map_err(http_err)?;

        Ok(parse_rows(body.as_ref()))
    }
}

/// Dispatches on the reference scheme: `file` or `http(s)`.
#[derive(Debug, Clone, Default)]
pub struct UrlRowSource {
    file: CsvFileRowSource,
    http: HttpRowSource,
}

#[async_trait::async_trait]
impl RowSource for UrlRowSource {
    async fn fetch_rows(&self, reference: &str) -> Result<Vec<RawRow>, RowSourceError> {
        match parse_reference(reference)?.scheme() {
            "file" => self.file.fetch_rows(reference).await,
            "http" | "https" => self.http.fetch_rows(reference).await,
            other => Err(RowSourceError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Fixed rows keyed by reference, for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRowSource {
    files: std::collections::HashMap<String, Vec<RawRow>>,
}

impl StaticRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, reference: impl Into<String>, rows: Vec<RawRow>) -> Self {
        self.files.insert(reference.into(), rows);
        self
    }
}

#[async_trait::async_trait]
impl RowSource for StaticRowSource {
    async fn fetch_rows(&self, reference: &str) -> Result<Vec<RawRow>, RowSourceError> {
        self.files.get(reference).cloned().ok_or_else(|| RowSourceError::Io {
            reference: reference.to_string(),
            message: "no such file".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_skipped_and_columns_are_mapped() {
        let csv = "sku,price,cost,msrp\nA,100,40,120\nB, 50.5 ,20,\n";
        let rows = parse_rows(csv.as_bytes());
        assert_eq!(
            rows,
            vec![
                RawRow::new("A", 100.0, 40.0, 120.0),
                RawRow::new("B", 50.5, 20.0, 0.0),
            ]
        );
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let csv = "sku,price,cost,msrp\n,10,1,0\nC,abc,1,0\nD\nE,30,,0\n";
        let rows = parse_rows(csv.as_bytes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "E");
        assert_eq!(rows[0].cost, None);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let csv = "sku,price,cost,msrp\nA,inf,1,0\nB,NaN,1,0\nC,10,-inf,NaN\n";
        let rows = parse_rows(csv.as_bytes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "C");
        assert_eq!(rows[0].cost, None);
        assert_eq!(rows[0].msrp, 0.0);
    }

    #[tokio::test]
    async fn static_source_returns_configured_rows() {
        let source = StaticRowSource::new().with_file("mem://a", vec![RawRow::new("A", 1.0, 1.0, 0.0)]);
        assert_eq!(source.fetch_rows("mem://a").await.unwrap().len(), 1);
        assert!(source.fetch_rows("mem://missing").await.is_err());
    }

    #[tokio::test]
    async fn url_source_rejects_unknown_schemes() {
        let err = UrlRowSource::default().fetch_rows("ftp://host/rows.csv").await.unwrap_err();
        assert!(matches!(err, RowSourceError::UnsupportedScheme(s) if s == "ftp"));
    }

    #[tokio::test]
    async fn file_source_reads_local_csv() {
        let path = std::env::temp_dir().join(format!("pricebook-rows-{}.csv", uuid::Uuid::now_v7()));
        std::fs::write(&path, "sku,price,cost,msrp\nA,100,40,0\n").unwrap();
        let reference = Url::from_file_path(&path).unwrap().to_string();

        let rows = CsvFileRowSource.fetch_rows(&reference).await.unwrap();
        assert_eq!(rows, vec![RawRow::new("A", 100.0, 40.0, 0.0)]);
        std::fs::remove_file(path).unwrap();
    }
}
