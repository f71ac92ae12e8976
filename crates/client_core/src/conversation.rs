//! Conversation store: contacts, the selected contact, and that contact's message thread.
//!
//! History fetches replace the thread; sends and live `newMessage` events append
//! to it. Overlapping fetches for different contacts are not cancelled, so the
//! last one to resolve wins.

use std::sync::{atomic::AtomicBool, Arc, Weak};

use shared::{
    domain::UserId,
    protocol::{Message, ServerEvent, User},
};
use tokio::{
    sync::{broadcast, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    api::ChatApi,
    composer::OutgoingMessage,
    error::{ClientError, Result},
    flags::{is_set, InFlight},
    realtime::{RealtimeConnection, RealtimeEvent},
    session::SessionStore,
    ClientEvent, EVENT_CAPACITY,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub contacts: Vec<User>,
    pub selected_contact: Option<User>,
    pub messages: Vec<Message>,
    pub is_users_loading: bool,
    pub is_messages_loading: bool,
    pub is_sending: bool,
    pub is_live: bool,
}

/// The single `newMessage` listener for the selected contact. It moves to the
/// new connection whenever the session reconnects. Dropping it deregisters the
/// listener.
pub struct LiveSubscription {
    contact_id: UserId,
    task: JoinHandle<()>,
}

impl LiveSubscription {
    pub fn contact_id(&self) -> &UserId {
        &self.contact_id
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Default)]
struct ConversationState {
    contacts: Vec<User>,
    selected: Option<User>,
    messages: Vec<Message>,
    live: Option<LiveSubscription>,
}

struct ConversationFlags {
    users_loading: AtomicBool,
    messages_loading: AtomicBool,
    sending: AtomicBool,
}

pub struct ConversationStore {
    api: Arc<dyn ChatApi>,
    session: Arc<SessionStore>,
    inner: RwLock<ConversationState>,
    flags: ConversationFlags,
    events: broadcast::Sender<ClientEvent>,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn ChatApi>, session: Arc<SessionStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            api,
            session,
            inner: RwLock::new(ConversationState::default()),
            flags: ConversationFlags {
                users_loading: AtomicBool::new(false),
                messages_loading: AtomicBool::new(false),
                sending: AtomicBool::new(false),
            },
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        let state = self.inner.read().await;
        ConversationSnapshot {
            contacts: state.contacts.clone(),
            selected_contact: state.selected.clone(),
            messages: state.messages.clone(),
            is_users_loading: is_set(&self.flags.users_loading),
            is_messages_loading: is_set(&self.flags.messages_loading),
            is_sending: is_set(&self.flags.sending),
            is_live: state.live.is_some(),
        }
    }

    pub async fn contacts(&self) -> Vec<User> {
        self.inner.read().await.contacts.clone()
    }

    pub async fn selected_contact(&self) -> Option<User> {
        self.inner.read().await.selected.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.read().await.messages.clone()
    }

    pub async fn list_contacts(&self) -> Result<Vec<User>> {
        let _loading = InFlight::begin(&self.flags.users_loading);
        let contacts = self.api.list_users().await?;
        self.inner.write().await.contacts = contacts.clone();
        let _ = self.events.send(ClientEvent::ContactsChanged);
        Ok(contacts)
    }

    /// Replaces the thread with the history for `contact_id`, whichever contact
    /// is selected when the response lands.
    pub async fn fetch_history(&self, contact_id: &UserId) -> Result<Vec<Message>> {
        let _loading = InFlight::begin(&self.flags.messages_loading);
        let messages = self.api.list_messages(contact_id).await?;
        {
            let mut state = self.inner.write().await;
            let selected = state.selected.as_ref().map(|contact| &contact.id);
            if selected != Some(contact_id) {
                warn!(
                    fetched = %contact_id,
                    selected = ?selected.map(UserId::as_str),
                    "conversation: history resolved for a contact that is not selected"
                );
            }
            state.messages = messages.clone();
        }
        let _ = self.events.send(ClientEvent::MessagesChanged);
        Ok(messages)
    }

    pub async fn send(&self, message: OutgoingMessage) -> Result<Message> {
        let request = message.into_request()?;
        let contact_id = self
            .inner
            .read()
            .await
            .selected
            .as_ref()
            .map(|contact| contact.id.clone())
            .ok_or(ClientError::NoContactSelected)?;

        let _sending = InFlight::begin(&self.flags.sending);
        let sent = self.api.send_message(&contact_id, &request).await?;
        {
            let mut state = self.inner.write().await;
            let still_selected = state
                .selected
                .as_ref()
                .is_some_and(|contact| contact.id == contact_id);
            if !still_selected {
                debug!(contact_id = %contact_id, "conversation: sent message not shown, contact changed");
                return Ok(sent);
            }
            state.messages.push(sent.clone());
        }
        let _ = self.events.send(ClientEvent::MessageAppended(sent.clone()));
        Ok(sent)
    }

    /// Selecting a different contact clears the thread and releases the live listener.
    pub async fn select_contact(&self, contact: Option<User>) {
        let mut state = self.inner.write().await;
        let previous = state.selected.as_ref().map(|user| user.id.clone());
        let next = contact.as_ref().map(|user| user.id.clone());
        state.selected = contact;
        if previous == next {
            return;
        }
        state.messages.clear();
        state.live = None;
        drop(state);
        let _ = self.events.send(ClientEvent::SelectionChanged(next));
    }

    /// Registers the one `newMessage` listener for the selected contact,
    /// replacing any earlier one. Returns `false` when there is no contact
    /// selected or no realtime connection.
    pub async fn subscribe_to_live_updates(self: &Arc<Self>) -> bool {
        let mut connections = self.session.watch_connection();
        let Some(connection) = connections.borrow_and_update().clone() else {
            debug!("conversation: no realtime connection; live updates skipped");
            return false;
        };
        let mut state = self.inner.write().await;
        let Some(contact_id) = state.selected.as_ref().map(|contact| contact.id.clone()) else {
            return false;
        };
        state.live = None;
        let task = spawn_message_listener(Arc::downgrade(self), connection.subscribe(), connections);
        info!(contact_id = %contact_id, "conversation: live updates on");
        state.live = Some(LiveSubscription { contact_id, task });
        true
    }

    pub async fn unsubscribe(&self) {
        if self.inner.write().await.live.take().is_some() {
            info!("conversation: live updates off");
        }
    }

    /// Select, listen, then load history.
    pub async fn open_conversation(self: &Arc<Self>, contact: User) -> Result<Vec<Message>> {
        let contact_id = contact.id.clone();
        self.select_contact(Some(contact)).await;
        self.subscribe_to_live_updates().await;
        self.fetch_history(&contact_id).await
    }

    pub async fn close_conversation(&self) {
        self.unsubscribe().await;
        self.select_contact(None).await;
    }

    /// Forgets everything, e.g. after logout.
    pub async fn reset(&self) {
        {
            let mut state = self.inner.write().await;
            *state = ConversationState::default();
        }
        let _ = self.events.send(ClientEvent::SelectionChanged(None));
        let _ = self.events.send(ClientEvent::ContactsChanged);
    }

    async fn accept_live_message(&self, message: Message) -> bool {
        let mut state = self.inner.write().await;
        let from_selected = state
            .selected
            .as_ref()
            .is_some_and(|contact| contact.id == message.sender_id);
        if !from_selected {
            debug!(sender_id = %message.sender_id, "conversation: live message for another contact dropped");
            return false;
        }
        state.messages.push(message.clone());
        drop(state);
        let _ = self.events.send(ClientEvent::MessageAppended(message));
        true
    }
}

fn spawn_message_listener(
    store: Weak<ConversationStore>,
    mut events: broadcast::Receiver<RealtimeEvent>,
    mut connections: watch::Receiver<Option<Arc<dyn RealtimeConnection>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = connections.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    // Signed out: wait for the next connection.
                    let Some(connection) = connections.borrow_and_update().clone() else {
                        continue;
                    };
                    debug!(user_id = %connection.user_id(), "conversation: listener moved to new connection");
                    events = connection.subscribe();
                }
                event = events.recv() => match event {
                    Ok(RealtimeEvent::Server(ServerEvent::NewMessage(message))) => {
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        store.accept_live_message(message).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "conversation: message listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        if connections.changed().await.is_err() {
                            break;
                        }
                        if let Some(connection) = connections.borrow_and_update().clone() {
                            events = connection.subscribe();
                        }
                    }
                },
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
