//! `gleaner-collector`: drives one incremental, page-by-page collection
//! session against an external [`ItemSource`].
//!
//! The controller owns dedup, content filtering and the stop policy; the
//! source only renders and scrolls. Exactly one [`StopReason`] ends every
//! session:
//!
//! | Reason             | Trigger                                             |
//! |--------------------|-----------------------------------------------------|
//! | `MaxItemsReached`  | accepted count hit `max_items`                      |
//! | `DateLimitReached` | an item older than the age cutoff was seen          |
//! | `NoNewItems`       | `empty_fetch_limit` consecutive fetches added nothing |
//! | `Blocked`          | the source raised its soft-block signal             |
//! | `Error`            | a fatal collaborator error                          |
//! | `Completed`        | the source has no further positions                 |

pub mod controller;
pub mod error;
pub mod item;
pub mod query;
pub mod source;

pub use controller::{CollectionController, CollectionResult, ControllerConfig};
pub use error::SourceError;
pub use gleaner_core::StopReason;
pub use item::{ContentFlags, Item, Position};
pub use source::ItemSource;
