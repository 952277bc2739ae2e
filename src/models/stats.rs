//! Dashboard summary over persisted sessions

use std::collections::BTreeMap;

use serde::Serialize;

use super::record::TelemetryRecord;

/// Sessions faster than this with fewer than two clicks look automated
const HEURISTIC_MAX_TIME_ON_PAGE_MS: f64 = 3000.0;
const HEURISTIC_MIN_CLICKS: f64 = 2.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub avg_time_on_page_secs: f64,
    pub avg_clicks: f64,
    pub bot_sessions: u64,
    pub human_sessions: u64,
    /// Sessions without a stored verdict, labeled by the click/time heuristic
    pub heuristic_labeled: u64,
    pub platforms: BTreeMap<String, u64>,
}

impl SessionStats {
    pub fn summarize<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a TelemetryRecord>,
    {
        let mut stats = Self::default();
        let mut time_sum = 0.0;
        let mut click_sum = 0.0;

        for record in records {
            stats.total_sessions += 1;

            let time_on_page = record.number("timeOnPage").unwrap_or(0.0);
            let clicks = record.number("clickCount").unwrap_or(0.0);
            time_sum += time_on_page;
            click_sum += clicks;

            let is_bot = match record.is_bot() {
                Some(label) => label,
                None => {
                    stats.heuristic_labeled += 1;
                    clicks < HEURISTIC_MIN_CLICKS && time_on_page < HEURISTIC_MAX_TIME_ON_PAGE_MS
                }
            };
            if is_bot {
                stats.bot_sessions += 1;
            } else {
                stats.human_sessions += 1;
            }

            let platform = record
                .get("platform")
                .and_then(|p| p.as_str())
                .filter(|p| !p.is_empty())
                .unwrap_or("Unknown");
            *stats.platforms.entry(platform.to_string()).or_default() += 1;
        }

        if stats.total_sessions > 0 {
            let n = stats.total_sessions as f64;
            stats.avg_time_on_page_secs = time_sum / n / 1000.0;
            stats.avg_clicks = click_sum / n;
        }

        stats
    }
}
