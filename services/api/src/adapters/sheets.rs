//! services/api/src/adapters/sheets.rs
//!
//! This module contains the Google Sheets adapter, which is the concrete
//! implementation of the `TableStore` port from the `core` crate. It talks to
//! the Sheets v4 `values` API over HTTPS using `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use study_tracker_core::append_log::append_record;
use study_tracker_core::domain::{Cell, Record, Table};
use study_tracker_core::ports::{PortError, PortResult, TableStore};
use tracing::{debug, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `TableStore` port on top of one Google spreadsheet.
/// Each worksheet (tab) is one table; its first row is the header.
#[derive(Clone)]
pub struct SheetsAdapter {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl SheetsAdapter {
    /// Creates a new `SheetsAdapter`.
    pub fn new(client: Client, base_url: String, spreadsheet_id: String) -> Self {
        Self {
            client,
            base_url,
            spreadsheet_id,
            api_key: None,
            access_token: None,
        }
    }

    /// Sends `key=<api_key>` with every request. Enough for reading public sheets.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sends an OAuth bearer token with every request. Required for writes.
    pub fn with_access_token(mut self, access_token: Option<String>) -> Self {
        self.access_token = access_token;
        self
    }

    /// Builds `{base}/{spreadsheet}/values/{range}` with the range percent-encoded.
    fn values_url(&self, range: &str) -> PortResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PortError::Unexpected(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Sheets base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key)]);
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> PortResult<Response> {
        builder
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Sheets request failed: {}", e)))
    }

    /// Fetches the raw values of `range`. `None` means the worksheet does not
    /// exist; the API answers 400 ("Unable to parse range") for that.
    async fn fetch_values(&self, range: &str) -> PortResult<Option<Vec<Vec<Value>>>> {
        let url = self.values_url(range)?;
        let response = self.send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        let range: ValueRange = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed Sheets response: {}", e)))?;
        Ok(Some(range.values))
    }

    async fn header_row(&self, name: &str) -> PortResult<Vec<String>> {
        let values = self
            .fetch_values(&format!("{}!1:1", name))
            .await?
            .unwrap_or_default();
        Ok(values_to_table(values).columns().to_vec())
    }
}

//=========================================================================================
// Wire Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody {
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

impl ValueRangeBody {
    fn rows(values: Vec<Vec<Value>>) -> Self {
        Self {
            major_dimension: "ROWS",
            values,
        }
    }
}

/// Maps non-success statuses onto port errors.
async fn ensure_success(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortError::Unauthorized),
        StatusCode::NOT_FOUND => Err(PortError::NotFound(format!("Spreadsheet: {}", body))),
        _ => Err(PortError::Unexpected(format!(
            "Sheets API error ({}): {}",
            status, body
        ))),
    }
}

//=========================================================================================
// Cell Conversion
//=========================================================================================

fn value_to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::String(s) if s.is_empty() => Cell::Empty,
        Value::String(s) => Cell::Text(s),
        Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Value::Bool(b) => Cell::Text(if b { "TRUE" } else { "FALSE" }.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

fn cell_to_value(cell: &Cell) -> Value {
    match cell {
        Cell::Empty => Value::String(String::new()),
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(String::new())),
    }
}

/// First row is the header; trailing empty cells are omitted by the API and
/// padded back here.
fn values_to_table(values: Vec<Vec<Value>>) -> Table {
    let mut rows = values.into_iter();
    let columns = match rows.next() {
        Some(header) => header
            .into_iter()
            .map(|v| value_to_cell(v).to_text().trim().to_string())
            .collect(),
        None => return Table::default(),
    };
    Table::from_rows(
        columns,
        rows.map(|row| row.into_iter().map(value_to_cell).collect())
            .collect(),
    )
}

/// Rows and columns currently holding values, header included.
fn extent(values: &[Vec<Value>]) -> (usize, usize) {
    let width = values.iter().map(Vec::len).max().unwrap_or(0);
    (values.len(), width)
}

/// Grows `values` to cover `rows` x `width` with empty strings, which the
/// update call writes as cleared cells.
fn cover_extent(mut values: Vec<Vec<Value>>, (rows, width): (usize, usize)) -> Vec<Vec<Value>> {
    let blank = Value::String(String::new());
    let width = values.iter().map(Vec::len).max().unwrap_or(0).max(width);
    for row in &mut values {
        row.resize(width, blank.clone());
    }
    if values.len() < rows {
        values.resize(rows, vec![blank; width]);
    }
    values
}

fn table_to_values(table: &Table) -> Vec<Vec<Value>> {
    let header = table
        .columns()
        .iter()
        .map(|c| Value::String(c.clone()))
        .collect();
    std::iter::once(header)
        .chain(
            table
                .rows()
                .iter()
                .map(|row| row.iter().map(cell_to_value).collect()),
        )
        .collect()
}

//=========================================================================================
// `TableStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TableStore for SheetsAdapter {
    async fn read_table(&self, name: &str) -> PortResult<Table> {
        let Some(values) = self.fetch_values(name).await? else {
            warn!("Worksheet '{}' not found; treating it as empty", name);
            return Ok(Table::default());
        };
        let table = values_to_table(values);
        debug!("Read {} rows from worksheet '{}'", table.len(), name);
        Ok(table)
    }

    /// Replaces the worksheet in a single update. Cells the old contents used
    /// beyond the new table are overwritten with blanks in that same request,
    /// so a failed update leaves the worksheet as it was.
    async fn write_table(&self, name: &str, table: &Table) -> PortResult<()> {
        let previous = self
            .fetch_values(name)
            .await?
            .map(|values| extent(&values))
            .unwrap_or((0, 0));

        let mut update_url = self.values_url(&format!("{}!A1", name))?;
        update_url
            .query_pairs_mut()
            .append_pair("valueInputOption", "RAW");
        let update = self
            .request(Method::PUT, update_url)
            .json(&ValueRangeBody::rows(cover_extent(table_to_values(table), previous)));
        ensure_success(self.send(update).await?).await?;

        debug!("Wrote {} rows to worksheet '{}'", table.len(), name);
        Ok(())
    }

    async fn append_row(&self, name: &str, record: &Record) -> PortResult<()> {
        let header = self.header_row(name).await?;
        let fits_header =
            !header.is_empty() && record.columns().all(|c| header.iter().any(|h| h == c));

        if !fits_header {
            // The header has to change, which only a whole-table write can do.
            let table = self.read_table(name).await?;
            return self
                .write_table(name, &append_record(&table, record.clone()))
                .await;
        }

        let row: Vec<Value> = header
            .iter()
            .map(|column| record.get(column).map(cell_to_value).unwrap_or(Value::String(String::new())))
            .collect();

        let mut url = self.values_url(&format!("{}!A1", name))?;
        url.set_path(&format!("{}:append", url.path()));
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let append = self
            .request(Method::POST, url)
            .json(&ValueRangeBody::rows(vec![row]));
        ensure_success(self.send(append).await?).await?;

        debug!("Appended one row to worksheet '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::Uri;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// A local stand-in for the Sheets API: answers GETs with `current`, PUTs
    /// with `update_status`, and records every request it sees.
    struct FakeSheets {
        current: Value,
        update_status: StatusCode,
        requests: Mutex<Vec<String>>,
        updates: Mutex<Vec<Value>>,
    }

    impl FakeSheets {
        fn new(current: Value, update_status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                current,
                update_status,
                requests: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
            })
        }
    }

    async fn fake_sheets(
        State(fake): State<Arc<FakeSheets>>,
        method: Method,
        uri: Uri,
        body: String,
    ) -> (StatusCode, String) {
        fake.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", method, uri.path()));
        if method == Method::GET {
            (StatusCode::OK, json!({ "values": fake.current }).to_string())
        } else if method == Method::PUT {
            fake.updates
                .lock()
                .unwrap()
                .push(serde_json::from_str(&body).unwrap());
            (fake.update_status, "{}".to_string())
        } else {
            (StatusCode::OK, "{}".to_string())
        }
    }

    async fn serve(fake: Arc<FakeSheets>) -> SheetsAdapter {
        let app = axum::Router::new().fallback(fake_sheets).with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        SheetsAdapter::new(Client::new(), format!("http://{}", addr), "sheet-id".to_string())
    }

    fn guestbook() -> Table {
        let mut table = Table::with_columns(&["Date", "Nickname", "Content"]);
        table.push_record(
            Record::new()
                .with("Date", "2024-01-01 10:00")
                .with("Nickname", "Ann")
                .with("Content", "open the book"),
        );
        table
    }

    fn adapter() -> SheetsAdapter {
        SheetsAdapter::new(
            Client::new(),
            "https://sheets.googleapis.com/v4/spreadsheets".to_string(),
            "sheet-id".to_string(),
        )
    }

    #[test]
    fn values_url_encodes_the_range() {
        let url = adapter().values_url("My Study!A1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/My%20Study!A1"
        );
    }

    #[test]
    fn response_values_become_a_table() {
        let range: ValueRange = serde_json::from_value(json!({
            "range": "Study!A1:Z1000",
            "majorDimension": "ROWS",
            "values": [
                ["Date", "Pages"],
                ["2024-01-01", "10"],
                ["2024-01-02"],
                ["", ""]
            ]
        }))
        .unwrap();

        let table = values_to_table(range.values);

        assert_eq!(table.columns(), &["Date".to_string(), "Pages".to_string()]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(0, "Pages"), Some(&Cell::text("10")));
        assert_eq!(table.cell(1, "Pages"), Some(&Cell::Empty));
        assert!(table.rows()[2].iter().all(Cell::is_blank));
    }

    #[test]
    fn missing_values_field_is_an_empty_table() {
        let range: ValueRange = serde_json::from_value(json!({ "range": "Comments!A1:Z1000" })).unwrap();
        assert!(values_to_table(range.values).columns().is_empty());
    }

    #[test]
    fn table_is_written_with_its_header() {
        let mut table = Table::with_columns(&["Date", "Pages"]);
        table.push_record(Record::new().with("Date", "2024-01-01").with("Pages", 12.5));

        let values = table_to_values(&table);

        assert_eq!(
            values,
            vec![
                vec![json!("Date"), json!("Pages")],
                vec![json!("2024-01-01"), json!(12.5)],
            ]
        );
    }

    #[tokio::test]
    async fn failed_update_never_clears_the_worksheet() {
        let fake = FakeSheets::new(
            json!([
                ["Date", "Nickname", "Content"],
                ["2024-01-01 10:00", "Ann", "open the book"],
                ["2024-01-02 11:00", "Bo", "no excuses"]
            ]),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        let adapter = serve(fake.clone()).await;

        let result = adapter.write_table("Comments", &guestbook()).await;

        assert!(matches!(result, Err(PortError::Unexpected(_))));
        let requests = fake.requests.lock().unwrap();
        let methods: Vec<&str> = requests
            .iter()
            .map(|r| r.split(' ').next().unwrap_or_default())
            .collect();
        assert_eq!(methods, vec!["GET", "PUT"]);
        assert!(requests.iter().all(|r| !r.contains("clear")));
    }

    #[tokio::test]
    async fn shorter_table_blanks_leftover_cells_in_the_same_update() {
        let fake = FakeSheets::new(
            json!([
                ["Date", "Nickname", "Content", "Note"],
                ["2024-01-01 10:00", "Ann", "open the book", "x"],
                ["2024-01-02 11:00", "Bo", "no excuses"]
            ]),
            StatusCode::OK,
        );
        let adapter = serve(fake.clone()).await;

        adapter.write_table("Comments", &guestbook()).await.unwrap();

        let updates = fake.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0]["values"],
            json!([
                ["Date", "Nickname", "Content", ""],
                ["2024-01-01 10:00", "Ann", "open the book", ""],
                ["", "", "", ""]
            ])
        );
    }

    #[test]
    fn cover_extent_keeps_a_larger_table() {
        let values = vec![vec![json!("a"), json!("b")], vec![json!("c"), json!("d")]];
        assert_eq!(cover_extent(values.clone(), (1, 1)), values);
    }

    #[test]
    fn body_uses_row_major_layout() {
        let body = serde_json::to_value(ValueRangeBody::rows(vec![vec![json!("x")]])).unwrap();
        assert_eq!(body, json!({ "majorDimension": "ROWS", "values": [["x"]] }));
    }
}
