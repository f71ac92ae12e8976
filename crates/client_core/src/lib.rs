use std::sync::Arc;

use shared::{
    domain::UserId,
    protocol::{Message, User},
};

pub mod api;
pub mod composer;
pub mod config;
pub mod conversation;
pub mod error;
mod flags;
pub mod forms;
pub mod realtime;
pub mod session;
pub mod view;

pub use api::{ChatApi, HttpChatApi};
pub use composer::{Composer, OutgoingMessage};
pub use config::{load_settings, ClientSettings};
pub use conversation::{ConversationSnapshot, ConversationStore, LiveSubscription};
pub use error::{ClientError, Result};
pub use forms::{LoginForm, SignUpForm};
pub use realtime::{
    ConnectParams, ConnectionStatus, MissingRealtimeConnector, RealtimeConnection,
    RealtimeConnector, RealtimeEvent, SocketIoConnector,
};
pub use session::{SessionSnapshot, SessionStore};

pub(crate) const EVENT_CAPACITY: usize = 1024;

/// State-change notifications the view layer re-renders on.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    AuthUserChanged(Option<User>),
    OnlineUsersChanged(Vec<UserId>),
    ContactsChanged,
    SelectionChanged(Option<UserId>),
    MessagesChanged,
    MessageAppended(Message),
}

/// Both stores wired to the same backend and realtime connector.
#[derive(Clone)]
pub struct ChatClient {
    pub session: Arc<SessionStore>,
    pub conversation: Arc<ConversationStore>,
}

impl ChatClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let api = Arc::new(HttpChatApi::new(settings)?);
        let connector = Arc::new(SocketIoConnector::new(&settings.socket_url)?);
        Ok(Self::new_with_dependencies(api, connector))
    }

    pub fn new_with_dependencies(
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn RealtimeConnector>,
    ) -> Self {
        let session = SessionStore::new(Arc::clone(&api), connector);
        let conversation = ConversationStore::new(api, Arc::clone(&session));
        Self {
            session,
            conversation,
        }
    }

    /// Logs out and drops all conversation state. Local state is kept when the backend refuses.
    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await?;
        self.conversation.reset().await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
