//! Status aggregation: folds per-season availability facts into whole-title
//! statuses on the standard and high-quality axes.
//!
//! Everything here is pure. The same facts always produce the same
//! [`Reconciliation`], whatever order the seasons arrive in.

use crate::models::{AvailabilityStatus, SeasonFact, SeasonRecord};

/// Result of reconciling one title's seasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub status: AvailabilityStatus,
    pub status_hq: AvailabilityStatus,
    pub rating_key: Option<String>,
    pub rating_key_hq: Option<String>,
    /// Per-season statuses, one per season number, in ascending order.
    pub seasons: Vec<SeasonRecord>,
}

/// Status of one season on one axis.
pub fn season_status(total_episodes: u32, available: u32, processing: bool) -> AvailabilityStatus {
    if total_episodes > 0 && available == total_episodes {
        AvailabilityStatus::Available
    } else if available > 0 {
        AvailabilityStatus::PartiallyAvailable
    } else if processing {
        AvailabilityStatus::Processing
    } else {
        AvailabilityStatus::Unknown
    }
}

/// Whole-title status from per-season statuses.
///
/// `Available` requires a non-empty list where every season is complete;
/// otherwise the best of partial, processing and unknown wins.
pub fn aggregate_status<I>(statuses: I) -> AvailabilityStatus
where
    I: IntoIterator<Item = AvailabilityStatus>,
{
    let mut seen_any = false;
    let mut all_available = true;
    let mut any_partial = false;
    let mut any_processing = false;

    for status in statuses {
        seen_any = true;
        all_available &= status == AvailabilityStatus::Available;
        any_partial |= status.is_at_least_partial();
        any_processing |= status == AvailabilityStatus::Processing;
    }

    if seen_any && all_available {
        AvailabilityStatus::Available
    } else if any_partial {
        AvailabilityStatus::PartiallyAvailable
    } else if any_processing {
        AvailabilityStatus::Processing
    } else {
        AvailabilityStatus::Unknown
    }
}

/// Reconcile a title's seasons.
///
/// The high-quality axis is only evaluated when `hq_enabled`; otherwise every
/// HQ status is `Unknown` and no HQ rating key is attached. `rating_key` is
/// attached on an axis once at least one season is partially available there.
pub fn reconcile(
    facts: &[SeasonFact],
    hq_enabled: bool,
    rating_key: Option<&str>,
) -> Reconciliation {
    let mut seasons: Vec<SeasonRecord> = facts
        .iter()
        .map(|fact| SeasonRecord {
            season_number: fact.season_number,
            status: season_status(
                fact.total_episodes,
                fact.available_episodes,
                fact.processing,
            ),
            status_hq: if hq_enabled {
                season_status(
                    fact.total_episodes,
                    fact.effective_hq_episodes(),
                    fact.processing,
                )
            } else {
                AvailabilityStatus::Unknown
            },
        })
        .collect();
    // A season reported more than once keeps its best observation
    seasons.sort_by(|a, b| {
        a.season_number
            .cmp(&b.season_number)
            .then(b.status.cmp(&a.status))
            .then(b.status_hq.cmp(&a.status_hq))
    });
    seasons.dedup_by_key(|season| season.season_number);

    let status = aggregate_status(seasons.iter().map(|season| season.status));
    let status_hq = if hq_enabled {
        aggregate_status(seasons.iter().map(|season| season.status_hq))
    } else {
        AvailabilityStatus::Unknown
    };

    let rating_key_for = |reached: bool| {
        if reached {
            rating_key.map(str::to_string)
        } else {
            None
        }
    };

    Reconciliation {
        rating_key: rating_key_for(seasons.iter().any(|s| s.status.is_at_least_partial())),
        rating_key_hq: rating_key_for(
            hq_enabled && seasons.iter().any(|s| s.status_hq.is_at_least_partial()),
        ),
        status,
        status_hq,
        seasons,
    }
}
