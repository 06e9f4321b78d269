//! Collaborator seams. The engine never knows whether a browser or an HTTP
//! client sits behind these traits.
use follow_core::{Direction, Extent, Identifier, TargetProfile};

use crate::DriverError;

/// A scrollable or paginated view over one relationship direction.
#[async_trait::async_trait]
pub trait RelationSource: Send {
    /// Open `handle`'s list for `direction`, discarding any previous state.
    async fn open(&mut self, handle: &Identifier, direction: Direction) -> Result<(), DriverError>;

    /// Best-effort total from the summary counter; read right after `open`.
    async fn expected_count(&mut self) -> Option<usize>;

    /// Scroll or page to the current end of the list.
    async fn advance(&mut self) -> Result<(), DriverError>;

    async fn extent(&mut self) -> Result<Extent, DriverError>;

    /// Raw content of the current view, for rate-signal scanning.
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Every handle currently present in the view, navigational links excluded.
    async fn extract(&mut self) -> Result<Vec<String>, DriverError>;
}

/// What a target's detail view showed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetPage {
    pub content: String,
    pub profile: TargetProfile,
}

/// Result of the first sever interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverStep {
    /// The relation is gone; nothing to confirm.
    Done,
    /// A confirmation dialog is open and `confirm_sever` must follow.
    NeedsConfirmation,
}

#[async_trait::async_trait]
pub trait TargetDriver: Send {
    async fn visit(&mut self, target: &Identifier) -> Result<(), DriverError>;

    async fn inspect(&mut self, target: &Identifier) -> Result<TargetPage, DriverError>;

    async fn begin_sever(&mut self, target: &Identifier) -> Result<SeverStep, DriverError>;

    async fn confirm_sever(&mut self, target: &Identifier) -> Result<(), DriverError>;

    async fn current_content(&mut self) -> Result<String, DriverError>;
}
