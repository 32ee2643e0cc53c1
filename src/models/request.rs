//! Request body and query parameters for build-itineraries.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/20/2026 - Query-map parsing for the ingress collaborator (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, FieldError};
use crate::ids;

/// Validated body of `POST /build-itineraries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildItinerariesRequest {
    /// "/"-separated airport or city codes.
    pub origin: String,
    /// "/"-separated airport or city codes.
    pub destination: String,
    pub max_stop: u8,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub cabin: Option<String>,
    #[serde(default)]
    pub carriers: Option<String>,
    #[serde(default)]
    pub min_reliability_percent: Option<u8>,
    #[serde(default)]
    pub seats: Option<u32>,
    #[serde(default)]
    pub united: Option<bool>,
    #[serde(default)]
    pub binbin: Option<bool>,
    /// Waypoints are subregions instead of airports; pre-filtering is skipped.
    #[serde(default)]
    pub region: Option<bool>,
}

impl BuildItinerariesRequest {
    pub fn origin_codes(&self) -> Vec<String> {
        split_codes(&self.origin)
    }

    pub fn destination_codes(&self) -> Vec<String> {
        split_codes(&self.destination)
    }

    pub fn is_region(&self) -> bool {
        self.region.unwrap_or(false)
    }

    pub fn reliability_percent(&self, default: u8) -> u8 {
        self.min_reliability_percent.unwrap_or(default)
    }

    /// Days in the requested window, inclusive.
    pub fn date_span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let mut details = Vec::new();

        let origins = self.origin_codes();
        let destinations = self.destination_codes();
        if origins.is_empty() {
            details.push(field_err("origin", "at least one code is required"));
        }
        if destinations.is_empty() {
            details.push(field_err("destination", "at least one code is required"));
        }
        for code in origins.iter().chain(destinations.iter()) {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                details.push(field_err("origin/destination", format!("invalid code: {}", code)));
            }
        }
        if self.max_stop > 4 {
            details.push(field_err("maxStop", "must be between 0 and 4"));
        }
        if self.end_date < self.start_date {
            details.push(field_err("endDate", "must not precede startDate"));
        }
        if let Some(p) = self.min_reliability_percent {
            if p > 100 {
                details.push(field_err("minReliabilityPercent", "must be between 0 and 100"));
            }
        }
        if let Some(seats) = self.seats {
            if seats < 1 {
                details.push(field_err("seats", "must be at least 1"));
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidInput { details })
        }
    }

    /// Identity of a "unique search" for rate limiting: the core tuple only,
    /// so re-filtered and paginated calls hash identically.
    pub fn search_tuple_hash(&self) -> String {
        ids::sha256_hex(&format!(
            "{}|{}|{}|{}|{}",
            self.origin, self.destination, self.max_stop, self.start_date, self.end_date
        ))
    }

    /// Hash over every parameter that shapes the raw (pre-filter) result.
    pub fn core_params_hash(&self) -> String {
        ids::sha256_hex(&format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.origin,
            self.destination,
            self.max_stop,
            self.start_date,
            self.end_date,
            self.cabin.as_deref().unwrap_or(""),
            self.carriers.as_deref().unwrap_or(""),
            self.min_reliability_percent.map(|p| p.to_string()).unwrap_or_default(),
            self.seats.map(|s| s.to_string()).unwrap_or_default(),
            self.united.unwrap_or(false),
            self.binbin.unwrap_or(false),
            self.is_region(),
        ))
    }
}

fn split_codes(value: &str) -> Vec<String> {
    value
        .split('/')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn field_err(field: &str, message: impl Into<String>) -> FieldError {
    FieldError {
        field: field.into(),
        message: message.into(),
    }
}

/// Ranking keys for the metadata pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Duration,
    Departure,
    Arrival,
    Y,
    W,
    J,
    F,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "duration" => Some(Self::Duration),
            "departure" => Some(Self::Departure),
            "arrival" => Some(Self::Arrival),
            "y" => Some(Self::Y),
            "w" => Some(Self::W),
            "j" => Some(Self::J),
            "f" => Some(Self::F),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::Departure => "departure",
            Self::Arrival => "arrival",
            Self::Y => "y",
            Self::W => "w",
            Self::J => "j",
            Self::F => "f",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filter, sort and pagination parameters from the query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(default)]
    pub stops: Option<Vec<u32>>,
    #[serde(default)]
    pub include_airlines: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_airlines: Option<Vec<String>>,
    /// Maximum total duration in minutes.
    #[serde(default)]
    pub max_duration: Option<u32>,
    #[serde(default)]
    pub min_y_percent: Option<u8>,
    #[serde(default)]
    pub min_w_percent: Option<u8>,
    #[serde(default)]
    pub min_j_percent: Option<u8>,
    #[serde(default)]
    pub min_f_percent: Option<u8>,
    /// Departure/arrival windows in epoch milliseconds.
    #[serde(default)]
    pub dep_time_min: Option<i64>,
    #[serde(default)]
    pub dep_time_max: Option<i64>,
    #[serde(default)]
    pub arr_time_min: Option<i64>,
    #[serde(default)]
    pub arr_time_max: Option<i64>,
    #[serde(default)]
    pub include_origin: Option<Vec<String>>,
    #[serde(default)]
    pub include_destination: Option<Vec<String>>,
    #[serde(default)]
    pub include_connection: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_origin: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_destination: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_connection: Option<Vec<String>>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_page")]
    pub page: u32,
    /// None means the default of 10; Some marks an explicit pageSize, which
    /// counts as pagination for rate limiting.
    #[serde(default)]
    pub page_size: Option<u32>,
}

fn default_page() -> u32 {
    1
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            stops: None,
            include_airlines: None,
            exclude_airlines: None,
            max_duration: None,
            min_y_percent: None,
            min_w_percent: None,
            min_j_percent: None,
            min_f_percent: None,
            dep_time_min: None,
            dep_time_max: None,
            arr_time_min: None,
            arr_time_max: None,
            include_origin: None,
            include_destination: None,
            include_connection: None,
            exclude_origin: None,
            exclude_destination: None,
            exclude_connection: None,
            search: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: default_page(),
            page_size: None,
        }
    }
}

impl FilterParams {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;

    pub fn effective_page_size(&self) -> u32 {
        self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE)
    }

    /// A request is "pagination" iff page > 1 or pageSize was explicit.
    pub fn is_pagination(&self) -> bool {
        self.page > 1 || self.page_size.is_some()
    }

    /// Hash over everything that shapes the filtered/paginated response.
    pub fn filter_hash(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        ids::sha256_hex(&canonical)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let mut details = Vec::new();
        if self.page < 1 {
            details.push(field_err("page", "must be at least 1"));
        }
        if let Some(size) = self.page_size {
            if size < 1 {
                details.push(field_err("pageSize", "must be at least 1"));
            }
        }
        for (name, value) in [
            ("minYPercent", self.min_y_percent),
            ("minWPercent", self.min_w_percent),
            ("minJPercent", self.min_j_percent),
            ("minFPercent", self.min_f_percent),
        ] {
            if let Some(p) = value {
                if p > 100 {
                    details.push(field_err(name, "must be between 0 and 100"));
                }
            }
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidInput { details })
        }
    }

    /// Parse from the raw query map handed over by the ingress collaborator.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, EngineError> {
        let mut params = Self::default();

        if let Some(v) = query.get("stops") {
            let stops: Result<Vec<u32>, _> = csv(v).iter().map(|s| s.parse()).collect();
            params.stops = Some(
                stops.map_err(|_| EngineError::invalid("stops", "expected a CSV of integers"))?,
            );
        }
        params.include_airlines = query.get("includeAirlines").map(|v| csv_upper(v));
        params.exclude_airlines = query.get("excludeAirlines").map(|v| csv_upper(v));
        params.max_duration = parse_num(query, "maxDuration")?;
        params.min_y_percent = parse_num(query, "minYPercent")?;
        params.min_w_percent = parse_num(query, "minWPercent")?;
        params.min_j_percent = parse_num(query, "minJPercent")?;
        params.min_f_percent = parse_num(query, "minFPercent")?;
        params.dep_time_min = parse_num(query, "depTimeMin")?;
        params.dep_time_max = parse_num(query, "depTimeMax")?;
        params.arr_time_min = parse_num(query, "arrTimeMin")?;
        params.arr_time_max = parse_num(query, "arrTimeMax")?;
        params.include_origin = query.get("includeOrigin").map(|v| csv_upper(v));
        params.include_destination = query.get("includeDestination").map(|v| csv_upper(v));
        params.include_connection = query.get("includeConnection").map(|v| csv_upper(v));
        params.exclude_origin = query.get("excludeOrigin").map(|v| csv_upper(v));
        params.exclude_destination = query.get("excludeDestination").map(|v| csv_upper(v));
        params.exclude_connection = query.get("excludeConnection").map(|v| csv_upper(v));
        params.search = query.get("search").map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if let Some(v) = query.get("sortBy") {
            params.sort_by = SortBy::parse(v)
                .ok_or_else(|| EngineError::invalid("sortBy", format!("unknown sort key: {}", v)))?;
        }
        if let Some(v) = query.get("sortOrder") {
            params.sort_order = match v.to_lowercase().as_str() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                other => {
                    return Err(EngineError::invalid(
                        "sortOrder",
                        format!("expected asc or desc, got {}", other),
                    ))
                }
            };
        }
        if let Some(page) = parse_num::<u32>(query, "page")? {
            params.page = page;
        }
        params.page_size = parse_num(query, "pageSize")?;

        params.validate()?;
        Ok(params)
    }
}

fn csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn csv_upper(value: &str) -> Vec<String> {
    csv(value).into_iter().map(|s| s.to_uppercase()).collect()
}

fn parse_num<T: std::str::FromStr>(
    query: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, EngineError> {
    match query.get(key) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| EngineError::invalid(key, format!("invalid number: {}", v))),
        None => Ok(None),
    }
}
