//! Tradedesk Client: backend access and editing state for configurations.
//!
//! This crate builds on `tradedesk-core` to provide:
//! - A transport seam with a blocking reqwest implementation
//! - Typed REST calls with read retries
//! - Error taxonomy and user-facing messages
//! - The load/save orchestrator (`ConfigEditor`)
//! - A debounced list view over fetched collections
//! - Session state (bearer token, notifications) and TOML settings

pub mod api;
pub mod editor;
pub mod error;
pub mod list_view;
pub mod retry;
pub mod session;
pub mod settings;
pub mod testing;
pub mod transport;

pub use api::{CheckReport, ConfigApi};
pub use editor::{
    ConfigEditor, DeleteOutcome, EditError, EditorState, LoadOutcome, LoadStep, LoadTicket,
    SaveBlock, SaveOutcome, SaveTicket,
};
pub use error::{ApiError, ErrorKind, Failure, Operation, TransportError};
pub use list_view::ListView;
pub use retry::RetryPolicy;
pub use session::{Level, Notification, NotificationCenter, Session, TokenStore};
pub use settings::{ClientSettings, SettingsError};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn shared_pieces_are_send_sync() {
        assert_send::<Session>();
        assert_sync::<Session>();
        assert_send::<HttpTransport>();
        assert_sync::<HttpTransport>();
        assert_send::<ConfigApi>();
        assert_sync::<ConfigApi>();
        assert_send::<testing::ScriptedTransport>();
        assert_sync::<testing::ScriptedTransport>();
    }

    #[test]
    fn editor_can_move_to_a_worker_thread() {
        assert_send::<ConfigEditor>();
        assert_send::<ListView>();
        assert_send::<Failure>();
    }
}
