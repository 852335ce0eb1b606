use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::BucketClient;
use crate::config::StoreConfig;
use crate::error::StoreError;

pub const DEFAULT_SITE_BUCKET: &str = "aurn";
pub const DEFAULT_SITE_DATA_KEY: &str = "AURN_Site_Information.csv";

const EXPECTED_HEADER: [&str; 8] = [
    "Code",
    "Name",
    "Type",
    "Latitude",
    "Longitude",
    "Date_Opened",
    "Date_Closed",
    "Species",
];

/// AURN site environment type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteType {
    UrbanBackground,
    UrbanTraffic,
    UrbanIndustrial,
    SuburbanBackground,
    SuburbanIndustrial,
    RuralBackground,
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SiteType::UrbanBackground => "URBAN_BACKGROUND",
            SiteType::UrbanTraffic => "URBAN_TRAFFIC",
            SiteType::UrbanIndustrial => "URBAN_INDUSTRIAL",
            SiteType::SuburbanBackground => "SUBURBAN_BACKGROUND",
            SiteType::SuburbanIndustrial => "SUBURBAN_INDUSTRIAL",
            SiteType::RuralBackground => "RURAL_BACKGROUND",
        };
        write!(f, "{name}")
    }
}

impl FromStr for SiteType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "URBAN_BACKGROUND" => Ok(SiteType::UrbanBackground),
            "URBAN_TRAFFIC" => Ok(SiteType::UrbanTraffic),
            "URBAN_INDUSTRIAL" => Ok(SiteType::UrbanIndustrial),
            "SUBURBAN_BACKGROUND" => Ok(SiteType::SuburbanBackground),
            "SUBURBAN_INDUSTRIAL" => Ok(SiteType::SuburbanIndustrial),
            "RURAL_BACKGROUND" => Ok(SiteType::RuralBackground),
            other => Err(StoreError::Deserialization(format!(
                "unknown site type: {other}"
            ))),
        }
    }
}

/// One Automatic Urban and Rural Network monitoring site.
/// Refer to https://uk-air.defra.gov.uk/networks/network-info?view=aurn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AurnSite {
    pub code: String,
    /// Human readable name, with underscores instead of spaces
    pub name: String,
    pub site_type: SiteType,
    pub latitude: f64,
    pub longitude: f64,
    pub opened: NaiveDate,
    /// `None` while the site is still open
    pub closed: Option<NaiveDate>,
    /// Chemical species recorded at the site
    pub species: Vec<String>,
}

/// Read-only registry of AURN sites, backed by a single CSV object.
/// `all()` re-downloads and re-parses on every call; callers that want
/// caching wrap it themselves.
pub struct AurnSiteStore {
    client: Arc<BucketClient>,
    data_key: String,
}

impl AurnSiteStore {
    /// Connects to the standard AURN registry location: the `aurn` bucket and
    /// site information CSV, anonymously via the external endpoint.
    pub fn connect_default() -> Result<Self, StoreError> {
        let config = StoreConfig {
            bucket: DEFAULT_SITE_BUCKET.to_string(),
            ..StoreConfig::default()
        };
        Self::connect(&config, DEFAULT_SITE_DATA_KEY)
    }

    pub fn connect(config: &StoreConfig, data_key: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self::from_client(
            Arc::new(BucketClient::connect(config)?),
            data_key,
        ))
    }

    pub fn from_client(client: Arc<BucketClient>, data_key: impl Into<String>) -> Self {
        Self {
            client,
            data_key: data_key.into(),
        }
    }

    pub fn client(&self) -> &Arc<BucketClient> {
        &self.client
    }

    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    pub fn all(&self) -> Result<Vec<AurnSite>, StoreError> {
        let body = self.client.get_bytes(&self.data_key)?;
        let text = std::str::from_utf8(&body).map_err(|err| {
            StoreError::Deserialization(format!("{}: {err}", self.data_key))
        })?;
        let sites = parse_site_csv(text)?;
        debug!(key = %self.data_key, count = sites.len(), "parsed AURN site registry");
        Ok(sites)
    }
}

fn parse_site_csv(text: &str) -> Result<Vec<AurnSite>, StoreError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| StoreError::Deserialization("site data file is empty".to_string()))?;
    if split_csv_line(header) != EXPECTED_HEADER {
        return Err(StoreError::Deserialization(format!(
            "unexpected CSV header: {header}"
        )));
    }

    let mut sites = Vec::new();
    for line in lines {
        sites.push(parse_site_row(line)?);
    }
    if sites.is_empty() {
        return Err(StoreError::Deserialization(
            "site data file contains no site rows".to_string(),
        ));
    }
    Ok(sites)
}

fn parse_site_row(line: &str) -> Result<AurnSite, StoreError> {
    let fields = split_csv_line(line);
    if fields.len() != EXPECTED_HEADER.len() {
        return Err(StoreError::Deserialization(format!(
            "expected {} fields, got {}: {line}",
            EXPECTED_HEADER.len(),
            fields.len()
        )));
    }

    let latitude = fields[3]
        .trim()
        .parse::<f64>()
        .map_err(|err| StoreError::Deserialization(format!("latitude {}: {err}", fields[3])))?;
    let longitude = fields[4]
        .trim()
        .parse::<f64>()
        .map_err(|err| StoreError::Deserialization(format!("longitude {}: {err}", fields[4])))?;
    let opened = parse_compact_date(&fields[5])?;
    // A close date of 0 denotes a site that is still open
    let closed = if fields[6].trim() == "0" {
        None
    } else {
        Some(parse_compact_date(&fields[6])?)
    };
    // The species field is a comma-joined sub-list inside one quoted CSV
    // field, split again after CSV-level parsing
    let species = fields[7]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(AurnSite {
        code: fields[0].clone(),
        name: fields[1].clone(),
        site_type: fields[2].parse()?,
        latitude,
        longitude,
        opened,
        closed,
        species,
    })
}

fn parse_compact_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map_err(|err| StoreError::Deserialization(format!("date {value}: {err}")))
}

/// Splits one CSV record into fields, honouring quoted fields and doubled
/// quotes. Parsing is line-based: the site file holds one record per line,
/// so quoted fields must not contain newlines.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
