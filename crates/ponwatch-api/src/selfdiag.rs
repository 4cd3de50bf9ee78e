// Self-reported diagnostics scrape.
//
// Terminals report their own optical readings on an HTML status page.
// These are measured at the subscriber end and are never mixed with the
// OLT-side readings; callers store them in their own fields.

use std::sync::LazyLock;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::mac;
use crate::transport::TransportConfig;

static ROW: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").ok());
static CELL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<t([dh])[^>]*>(.*?)</t[dh]>").ok());
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Readings one terminal reported about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelfReportedRow {
    pub mac: String,
    pub model: Option<String>,
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    pub temperature_c: Option<f64>,
    pub voltage_v: Option<f64>,
    pub bias_ma: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Mac,
    Model,
    Rx,
    Tx,
    Temperature,
    Voltage,
    Bias,
    Other,
}

impl Field {
    fn from_header(header: &str) -> Self {
        let h = header.to_ascii_lowercase();
        if h.contains("mac") {
            Self::Mac
        } else if h.contains("model") || h.contains("type") {
            Self::Model
        } else if h.contains("rx") || h.contains("receive") {
            Self::Rx
        } else if h.contains("tx") || h.contains("transmit") {
            Self::Tx
        } else if h.contains("temp") {
            Self::Temperature
        } else if h.contains("volt") {
            Self::Voltage
        } else if h.contains("bias") || h.contains("current") {
            Self::Bias
        } else {
            Self::Other
        }
    }
}

/// Column order used when the page has no header row.
const DEFAULT_LAYOUT: &[Field] = &[
    Field::Mac,
    Field::Model,
    Field::Rx,
    Field::Tx,
    Field::Temperature,
    Field::Voltage,
    Field::Bias,
];

#[derive(Clone)]
pub struct SelfDiagClient {
    http: reqwest::Client,
    username: Option<String>,
    password: Option<SecretString>,
}

impl SelfDiagClient {
    pub fn new(
        transport: &TransportConfig,
        username: Option<String>,
        password: Option<SecretString>,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            username,
            password,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            username: None,
            password: None,
        }
    }

    /// Send HTTP basic credentials with every fetch.
    pub fn with_credentials(mut self, username: String, password: Option<SecretString>) -> Self {
        self.username = Some(username);
        self.password = password;
        self
    }

    /// Fetch and parse the diagnostics page at `url`.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<SelfReportedRow>, Error> {
        debug!("GET {}", url);
        let mut request = self.http.get(url.clone());
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref().map(|p| p.expose_secret()));
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.text().await?;
        let rows = parse_diagnostics_page(&body);
        debug!(rows = rows.len(), "self-reported diagnostics parsed");
        Ok(rows)
    }
}

fn cell_text(raw: &str) -> String {
    let stripped = TAG
        .as_ref()
        .map_or_else(|| raw.to_owned(), |tag| tag.replace_all(raw, "").into_owned());
    stripped.replace("&nbsp;", " ").trim().to_owned()
}

fn number(text: &str) -> Option<f64> {
    // Values may carry units: "-13.2 dBm", "3.28V".
    let end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
        .map_or(text.len(), |(i, _)| i);
    text.get(..end)?.parse().ok()
}

/// Parse every table row whose MAC cell holds a hardware address.
pub fn parse_diagnostics_page(html: &str) -> Vec<SelfReportedRow> {
    let (Some(row_re), Some(cell_re)) = (ROW.as_ref(), CELL.as_ref()) else {
        return Vec::new();
    };

    let mut layout: Vec<Field> = DEFAULT_LAYOUT.to_vec();
    let mut rows = Vec::new();

    for row in row_re.captures_iter(html) {
        let Some(inner) = row.get(1) else { continue };
        let cells: Vec<(bool, String)> = cell_re
            .captures_iter(inner.as_str())
            .filter_map(|c| {
                let is_header = c.get(1)?.as_str().eq_ignore_ascii_case("h");
                Some((is_header, cell_text(c.get(2)?.as_str())))
            })
            .collect();

        if !cells.is_empty() && cells.iter().all(|(h, _)| *h) {
            layout = cells.iter().map(|(_, t)| Field::from_header(t)).collect();
            continue;
        }

        let mut record = SelfReportedRow::default();
        for (field, (_, text)) in layout.iter().zip(&cells) {
            match field {
                Field::Mac => record.mac = mac::normalize(text).unwrap_or_default(),
                Field::Model => record.model = (!text.is_empty()).then(|| text.clone()),
                Field::Rx => record.rx_power_dbm = number(text),
                Field::Tx => record.tx_power_dbm = number(text),
                Field::Temperature => record.temperature_c = number(text),
                Field::Voltage => record.voltage_v = number(text),
                Field::Bias => record.bias_ma = number(text),
                Field::Other => {}
            }
        }
        if record.mac.is_empty() {
            trace!(cells = cells.len(), "diagnostics row without address skipped");
            continue;
        }
        rows.push(record);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_drives_column_mapping() {
        let html = r#"
<table>
  <tr><th>Rx Power</th><th>MAC Address</th><th>Temperature</th></tr>
  <tr><td>-13.20 dBm</td><td><b>AA:BB:CC:DD:EE:01</b></td><td>41.5</td></tr>
  <tr><td>n/a</td><td>not-a-mac</td><td>40</td></tr>
</table>"#;
        let rows = parse_diagnostics_page(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mac, "aa:bb:cc:dd:ee:01");
        assert_eq!(rows[0].rx_power_dbm, Some(-13.2));
        assert_eq!(rows[0].temperature_c, Some(41.5));
        assert_eq!(rows[0].tx_power_dbm, None);
    }

    #[test]
    fn default_layout_without_header() {
        let html = "<tr><td>aabb.ccdd.ee02</td><td>HG8010</td><td>-14.1</td><td>2.3</td><td>38</td><td>3.28V</td><td>11.2</td></tr>";
        let rows = parse_diagnostics_page(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].model.as_deref(), Some("HG8010"));
        assert_eq!(rows[0].voltage_v, Some(3.28));
        assert_eq!(rows[0].bias_ma, Some(11.2));
    }

    #[test]
    fn number_strips_units() {
        assert_eq!(number("-13.2 dBm"), Some(-13.2));
        assert_eq!(number("n/a"), None);
        assert_eq!(number(""), None);
    }
}
