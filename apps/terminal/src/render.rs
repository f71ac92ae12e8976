//! Plain-text rendering of the view branches.

use client_core::view::{ChatHeader, ChatPane, ContactList, HomeView, MessageBubble};
use shared::protocol::User;

pub fn home(view: &HomeView, online_only: bool) -> String {
    match view {
        HomeView::CheckingSession => "Checking session...".to_string(),
        HomeView::SignedOut => "Signed out. Use /login or /signup.".to_string(),
        HomeView::Chat(chat) => {
            let mut out = format!("Signed in as {}\n", chat.me.full_name());
            out.push_str(&contacts(&chat.contacts, online_only));
            out.push('\n');
            out.push_str(&pane(&chat.pane));
            out
        }
    }
}

pub fn contacts(list: &ContactList, online_only: bool) -> String {
    if list.is_loading {
        return "Contacts: loading...".to_string();
    }
    let filter = if online_only { ", online only" } else { "" };
    let mut out = format!("Contacts ({} online{filter}):", list.online_count);
    if list.entries.is_empty() {
        out.push_str("\n  (none)");
    }
    for (index, entry) in list.entries.iter().enumerate() {
        let marker = if entry.selected { '>' } else { ' ' };
        let status = if entry.online { "online" } else { "offline" };
        out.push_str(&format!(
            "\n{marker} {:>2}. {} [{status}]",
            index + 1,
            entry.name
        ));
    }
    out
}

pub fn pane(pane: &ChatPane) -> String {
    match pane {
        ChatPane::NoChatSelected => "No chat selected. Use /open to pick a contact.".to_string(),
        ChatPane::LoadingMessages { header: h } => format!("{}\n  loading messages...", header(h)),
        ChatPane::Thread { header: h, bubbles } => {
            let mut out = header(h);
            if bubbles.is_empty() {
                out.push_str("\n  (no messages yet)");
            }
            for item in bubbles {
                out.push('\n');
                out.push_str(&bubble(item, &h.name));
            }
            out
        }
    }
}

fn header(header: &ChatHeader) -> String {
    let status = if header.online { "online" } else { "offline" };
    format!("== {} ({status}) ==", header.name)
}

pub fn bubble(bubble: &MessageBubble, contact_name: &str) -> String {
    let author = if bubble.outgoing { "you" } else { contact_name };
    let mut body = Vec::new();
    if bubble.image.is_some() {
        body.push("[image]");
    }
    if let Some(text) = bubble.text.as_deref() {
        body.push(text);
    }
    let time = if bubble.time.is_empty() {
        String::new()
    } else {
        format!("[{}] ", bubble.time)
    };
    format!("  {time}{author}: {}", body.join(" "))
}

pub fn profile(user: &User, online: bool) -> String {
    format!(
        "{}\n  email: {}\n  avatar: {}\n  member since: {}\n  status: {}",
        user.full_name(),
        user.email,
        if user.avatar().is_some() { "set" } else { "default" },
        user.member_since(),
        if online { "active" } else { "offline" },
    )
}

#[cfg(test)]
mod tests {
    use client_core::view::ContactEntry;
    use shared::domain::UserId;

    use super::*;

    fn bubble_with(outgoing: bool, text: Option<&str>, image: bool) -> MessageBubble {
        MessageBubble {
            id: "m1".into(),
            outgoing,
            time: "2024-01-01 10:00".into(),
            text: text.map(str::to_string),
            image: image.then(|| "data:image/png;base64,AQID".to_string()),
            avatar: None,
        }
    }

    #[test]
    fn bubble_names_author_and_marks_images() {
        assert_eq!(
            bubble(&bubble_with(false, Some("hi"), false), "Cy Doe"),
            "  [2024-01-01 10:00] Cy Doe: hi"
        );
        assert_eq!(
            bubble(&bubble_with(true, Some("look"), true), "Cy Doe"),
            "  [2024-01-01 10:00] you: [image] look"
        );
    }

    #[test]
    fn contact_lines_show_selection_and_presence() {
        let list = ContactList {
            entries: vec![
                ContactEntry {
                    id: UserId::from("u1"),
                    name: "Bob Doe".into(),
                    online: true,
                    selected: true,
                },
                ContactEntry {
                    id: UserId::from("u2"),
                    name: "Cy Doe".into(),
                    online: false,
                    selected: false,
                },
            ],
            online_count: 1,
            is_loading: false,
        };
        assert_eq!(
            contacts(&list, false),
            "Contacts (1 online):\n>  1. Bob Doe [online]\n   2. Cy Doe [offline]"
        );
    }

    #[test]
    fn empty_thread_says_so() {
        let rendered = pane(&ChatPane::Thread {
            header: ChatHeader {
                contact_id: UserId::from("u1"),
                name: "Bob Doe".into(),
                avatar: None,
                online: false,
            },
            bubbles: Vec::new(),
        });
        assert_eq!(rendered, "== Bob Doe (offline) ==\n  (no messages yet)");
    }
}
