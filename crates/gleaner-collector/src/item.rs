use chrono::{DateTime, Utc};
use gleaner_core::CollectionParams;
use serde::{Deserialize, Serialize};

/// Opaque cursor into the source's feed. Only the source interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(pub u64);

impl Position {
    pub fn start() -> Self {
        Self(0)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Content-type markers used by the inclusion filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFlags {
    #[serde(default)]
    pub repost: bool,
    #[serde(default)]
    pub reply: bool,
    #[serde(default)]
    pub quote: bool,
}

/// One collected unit as surfaced by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier used for dedup across iterations.
    pub id: String,
    /// Publication instant, when the source could read one.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flags: ContentFlags,
    /// Whatever the source scraped; carried through to exporters untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            flags: ContentFlags::default(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_flags(mut self, flags: ContentFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the inclusion flags in `params` let this item through.
    pub fn passes_filters(&self, params: &CollectionParams) -> bool {
        !(self.flags.repost && !params.include_reposts
            || self.flags.reply && !params.include_replies
            || self.flags.quote && !params.include_quotes)
    }

    /// An item without a timestamp is never considered too old.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp.is_some_and(|ts| ts < cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filters_reject_excluded_content_types() {
        let params = CollectionParams {
            include_reposts: false,
            include_quotes: false,
            ..Default::default()
        };
        let plain = Item::new("1");
        let repost = Item::new("2").with_flags(ContentFlags {
            repost: true,
            ..Default::default()
        });
        let reply = Item::new("3").with_flags(ContentFlags {
            reply: true,
            ..Default::default()
        });
        let quote = Item::new("4").with_flags(ContentFlags {
            quote: true,
            ..Default::default()
        });

        assert!(plain.passes_filters(&params));
        assert!(!repost.passes_filters(&params));
        assert!(reply.passes_filters(&params));
        assert!(!quote.passes_filters(&params));
    }

    #[test]
    fn undated_items_are_never_too_old() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(!Item::new("x").is_older_than(cutoff));
        assert!(Item::new("y")
            .at(cutoff - chrono::Duration::seconds(1))
            .is_older_than(cutoff));
        assert!(!Item::new("z").at(cutoff).is_older_than(cutoff));
    }

    #[test]
    fn item_json_fields_are_optional() {
        let item: Item = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(item, Item::new("abc"));
    }
}
