use async_trait::async_trait;

use crate::{
    error::SourceError,
    item::{Item, Position},
};

/// The page-rendering/navigation collaborator a collection session runs against.
///
/// One instance serves exactly one session. Implementations must be `Send`
/// so an execution can move across Tokio worker threads between calls.
#[async_trait]
pub trait ItemSource: Send {
    /// Whether the source holds a usable (logged-in) session.
    async fn is_authenticated(&mut self) -> Result<bool, SourceError>;

    /// Navigate to `locator` and return the starting position.
    async fn open(&mut self, locator: &str) -> Result<Position, SourceError>;

    /// Items currently visible at `position`. May re-surface items seen
    /// at earlier positions; the controller deduplicates.
    async fn fetch_visible(&mut self, position: Position) -> Result<Vec<Item>, SourceError>;

    /// Scroll past `position`. `None` means the feed has nothing further.
    async fn advance(&mut self, position: Position) -> Result<Option<Position>, SourceError>;

    /// Whether the source currently shows an anomaly / soft-block page
    /// (captcha, identity check, rate-limit notice).
    async fn has_block_signal(&mut self) -> Result<bool, SourceError>;
}
