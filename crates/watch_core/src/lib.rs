//! Watch core: pure poll state machine, view-model helpers and card ordering.
mod effect;
mod msg;
mod reorder;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Notification};
pub use msg::Msg;
pub use reorder::{drop_position, CardOrder, DropPosition};
pub use state::{JobId, JobStatus, Phase, PollSettings, PollerState, StatusSnapshot};
pub use update::{update, CONNECTION_RETRY_NOTE, TIMEOUT_MESSAGE};
pub use view_model::{ActionAvailability, JobProgressView};
