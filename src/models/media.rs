use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability of a title (or one of its seasons) in a downstream library.
///
/// The ordering is meaningful: `Unknown < Pending < Processing <
/// PartiallyAvailable < Available`. Two independent values are tracked per
/// title, one for the standard library and one for the high-quality variant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    #[default]
    Unknown,
    Pending,
    Processing,
    PartiallyAvailable,
    Available,
}

impl AvailabilityStatus {
    /// Integer code used by persisted records.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 1,
            Self::Pending => 2,
            Self::Processing => 3,
            Self::PartiallyAvailable => 4,
            Self::Available => 5,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Unknown),
            2 => Some(Self::Pending),
            3 => Some(Self::Processing),
            4 => Some(Self::PartiallyAvailable),
            5 => Some(Self::Available),
            _ => None,
        }
    }

    /// True for `PartiallyAvailable` and `Available`.
    pub fn is_at_least_partial(self) -> bool {
        self >= Self::PartiallyAvailable
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::PartiallyAvailable => "partially available",
            Self::Available => "available",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => f.write_str("movie"),
            Self::Tv => f.write_str("tv"),
        }
    }
}

/// External identifiers of a title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaIds {
    pub tmdb_id: i64,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub tvdb_id: Option<i64>,
}

impl MediaIds {
    pub fn tmdb(tmdb_id: i64) -> Self {
        Self {
            tmdb_id,
            ..Self::default()
        }
    }
}

/// Observed availability of one season, as reported by a library scan.
///
/// `hq_override` marks a season observed in a high-quality library: its
/// standard episode count also counts toward the high-quality axis.
/// `processing` marks a season whose download is still in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonFact {
    pub season_number: u32,
    pub total_episodes: u32,
    #[serde(default)]
    pub available_episodes: u32,
    #[serde(default)]
    pub available_episodes_hq: u32,
    #[serde(default)]
    pub hq_override: bool,
    #[serde(default)]
    pub processing: bool,
}

impl SeasonFact {
    pub fn new(season_number: u32, total_episodes: u32, available_episodes: u32) -> Self {
        Self {
            season_number,
            total_episodes,
            available_episodes,
            ..Self::default()
        }
    }

    pub fn with_hq(mut self, available_episodes_hq: u32) -> Self {
        self.available_episodes_hq = available_episodes_hq;
        self
    }

    pub fn processing(mut self) -> Self {
        self.processing = true;
        self
    }

    /// Episodes counted on the high-quality axis.
    pub fn effective_hq_episodes(&self) -> u32 {
        if self.hq_override {
            self.available_episodes
        } else {
            self.available_episodes_hq
        }
    }
}

/// Per-item options handed to the library processors.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// The observation came from the high-quality library.
    pub is_hq: bool,
    pub media_added_at: Option<DateTime<Utc>>,
    pub rating_key: Option<String>,
    pub service_id: Option<i64>,
    pub external_service_id: Option<i64>,
    pub external_service_slug: Option<String>,
    pub title: Option<String>,
    pub processing: bool,
}

impl ProcessOptions {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub season_number: u32,
    pub status: AvailabilityStatus,
    pub status_hq: AvailabilityStatus,
}

/// Persisted availability record of one title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub media_type: MediaType,
    pub tmdb_id: i64,
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i64>,
    pub status: AvailabilityStatus,
    pub status_hq: AvailabilityStatus,
    pub seasons: Vec<SeasonRecord>,
    pub rating_key: Option<String>,
    pub rating_key_hq: Option<String>,
    pub service_id: Option<i64>,
    pub service_id_hq: Option<i64>,
    pub external_service_id: Option<i64>,
    pub external_service_id_hq: Option<i64>,
    pub external_service_slug: Option<String>,
    pub external_service_slug_hq: Option<String>,
    pub media_added_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(media_type: MediaType, ids: &MediaIds) -> Self {
        Self {
            media_type,
            tmdb_id: ids.tmdb_id,
            imdb_id: ids.imdb_id.clone(),
            tvdb_id: ids.tvdb_id,
            status: AvailabilityStatus::Unknown,
            status_hq: AvailabilityStatus::Unknown,
            seasons: Vec::new(),
            rating_key: None,
            rating_key_hq: None,
            service_id: None,
            service_id_hq: None,
            external_service_id: None,
            external_service_id_hq: None,
            external_service_slug: None,
            external_service_slug_hq: None,
            media_added_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Record service linkage on the standard or high-quality slot.
    pub fn apply_service(&mut self, options: &ProcessOptions) {
        let (service_id, external_id, slug) = if options.is_hq {
            (
                &mut self.service_id_hq,
                &mut self.external_service_id_hq,
                &mut self.external_service_slug_hq,
            )
        } else {
            (
                &mut self.service_id,
                &mut self.external_service_id,
                &mut self.external_service_slug,
            )
        };

        if options.service_id.is_some() {
            *service_id = options.service_id;
        }
        if options.external_service_id.is_some() {
            *external_id = options.external_service_id;
        }
        if options.external_service_slug.is_some() {
            slug.clone_from(&options.external_service_slug);
        }
    }
}
