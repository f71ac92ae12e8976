//! Render branches derived from store snapshots. Each branch is exclusive, so a
//! front end matches on the result instead of re-checking flags.

use shared::{
    domain::UserId,
    protocol::{Message, User},
};

use crate::{conversation::ConversationSnapshot, session::SessionSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum HomeView {
    /// Session verification has not resolved yet.
    CheckingSession,
    SignedOut,
    Chat(ChatView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub me: User,
    pub contacts: ContactList,
    pub pane: ChatPane,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatPane {
    NoChatSelected,
    LoadingMessages { header: ChatHeader },
    Thread { header: ChatHeader, bubbles: Vec<MessageBubble> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatHeader {
    pub contact_id: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactList {
    pub entries: Vec<ContactEntry>,
    /// Online contacts, the signed-in user excluded.
    pub online_count: usize,
    pub is_loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactEntry {
    pub id: UserId,
    pub name: String,
    pub online: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageBubble {
    pub id: String,
    pub outgoing: bool,
    pub time: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub avatar: Option<String>,
}

pub fn home_view(session: &SessionSnapshot, conversation: &ConversationSnapshot) -> HomeView {
    if session.is_checking_auth && session.auth_user.is_none() {
        return HomeView::CheckingSession;
    }
    let Some(me) = session.auth_user.clone() else {
        return HomeView::SignedOut;
    };
    let contacts = contact_list(&me, session, conversation, false);
    let pane = chat_pane(&me, session, conversation);
    HomeView::Chat(ChatView { me, contacts, pane })
}

/// Sidebar entries. With `online_only` set, offline contacts are left out.
pub fn contact_list(
    me: &User,
    session: &SessionSnapshot,
    conversation: &ConversationSnapshot,
    online_only: bool,
) -> ContactList {
    let selected = conversation
        .selected_contact
        .as_ref()
        .map(|contact| &contact.id);
    let entries = conversation
        .contacts
        .iter()
        .filter(|contact| contact.id != me.id)
        .map(|contact| ContactEntry {
            id: contact.id.clone(),
            name: contact.full_name(),
            online: session.online_users.contains(&contact.id),
            selected: selected == Some(&contact.id),
        })
        .filter(|entry| !online_only || entry.online)
        .collect();
    let online_count = session
        .online_users
        .iter()
        .filter(|id| **id != me.id)
        .count();

    ContactList {
        entries,
        online_count,
        is_loading: conversation.is_users_loading,
    }
}

fn chat_pane(me: &User, session: &SessionSnapshot, conversation: &ConversationSnapshot) -> ChatPane {
    let Some(contact) = conversation.selected_contact.as_ref() else {
        return ChatPane::NoChatSelected;
    };
    let header = chat_header(session, contact);
    if conversation.is_messages_loading {
        return ChatPane::LoadingMessages { header };
    }
    let bubbles = conversation
        .messages
        .iter()
        .map(|message| bubble(me, contact, message))
        .collect();
    ChatPane::Thread { header, bubbles }
}

/// Bubble for one appended message, built from the message itself so that
/// payloads without an `_id` still render as themselves.
pub fn appended_bubble(
    session: &SessionSnapshot,
    conversation: &ConversationSnapshot,
    message: &Message,
) -> Option<(ChatHeader, MessageBubble)> {
    let me = session.auth_user.as_ref()?;
    let contact = conversation.selected_contact.as_ref()?;
    Some((chat_header(session, contact), bubble(me, contact, message)))
}

fn chat_header(session: &SessionSnapshot, contact: &User) -> ChatHeader {
    ChatHeader {
        contact_id: contact.id.clone(),
        name: contact.full_name(),
        avatar: contact.avatar().map(str::to_string),
        online: session.online_users.contains(&contact.id),
    }
}

fn bubble(me: &User, contact: &User, message: &Message) -> MessageBubble {
    let outgoing = message.sender_id == me.id;
    let author = if outgoing { me } else { contact };
    MessageBubble {
        id: message.id.to_string(),
        outgoing,
        time: message.display_time(),
        text: message.text().map(str::to_string),
        image: message.image().map(str::to_string),
        avatar: author.avatar().map(str::to_string),
    }
}
