//! Turns a job target plus collection params into the locator a source opens.

use chrono::{DateTime, Duration, Utc};
use gleaner_core::{CollectionParams, SortMode, Target};

/// Append the search operators implied by `params` to a free-text query.
///
/// An explicit `since:` already present in the query wins over the
/// configured age window.
pub fn enhance_query(query: &str, params: &CollectionParams, now: DateTime<Utc>) -> String {
    let mut parts = vec![query.trim().to_string()];

    if let Some(lang) = params.language.as_deref().filter(|l| !l.trim().is_empty()) {
        parts.push(format!("lang:{}", lang.trim()));
    }

    // A window past the representable range adds no `since:`.
    if !query.to_lowercase().contains("since:") {
        if let Some(minutes) = params.max_age_minutes {
            if let Some(since) = now.checked_sub_signed(Duration::minutes(i64::from(minutes))) {
                parts.push(format!("since:{}", since.format("%Y-%m-%d_%H:%M:%S_UTC")));
            }
        } else if let Some(days) = params.max_age_days {
            if let Some(since) = now.checked_sub_signed(Duration::days(i64::from(days))) {
                parts.push(format!("since:{}", since.format("%Y-%m-%d")));
            }
        }
    }

    if !params.include_replies {
        parts.push("-filter:replies".to_string());
    }
    if !params.include_reposts {
        parts.push("-filter:retweets".to_string());
    }

    parts.join(" ")
}

/// The locator for `target`: URLs pass through, queries become a search URL.
pub fn build_locator(
    target: &Target,
    params: &CollectionParams,
    search_base_url: &str,
    now: DateTime<Utc>,
) -> String {
    match target {
        Target::Url(url) => url.clone(),
        Target::Query(query) => {
            let q = enhance_query(query, params, now);
            let mut url = format!(
                "{search_base_url}?q={}&src=typed_query",
                urlencoding::encode(&q)
            );
            if params.sort == SortMode::Latest {
                url.push_str("&f=live");
            }
            url
        }
    }
}
