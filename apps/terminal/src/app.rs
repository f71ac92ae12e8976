//! REPL loop: stdin lines become store calls, store events become output.

use std::path::Path;

use anyhow::Result;
use client_core::{
    composer::encode_image,
    view::{self, HomeView},
    ChatClient, ClientError, ClientEvent, Composer, LoginForm, SignUpForm,
};
use shared::{
    domain::UserId,
    protocol::{Message, User},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream, LinesStream},
    StreamExt,
};
use tracing::{debug, warn};

use crate::{
    commands::{self, Command, HELP},
    render,
};

enum Flow {
    Continue,
    Quit,
}

pub struct App {
    client: ChatClient,
    composer: Composer,
    online_only: bool,
}

impl App {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            composer: Composer::new(),
            online_only: false,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let session_events = BroadcastStream::new(self.client.session.subscribe_events());
        let conversation_events =
            BroadcastStream::new(self.client.conversation.subscribe_events());
        let mut store_events = session_events.merge(conversation_events);
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

        println!("{}", render::home(&self.view().await, self.online_only));
        match self.client.session.check_auth().await {
            Ok(user) => debug!(user_id = %user.id, "terminal: session restored"),
            Err(err) if err.requires_reauth() => {}
            Err(err) => notify(&err.user_message()),
        }
        if self.client.session.current_user().await.is_none() {
            println!("{}", render::home(&self.view().await, self.online_only));
        }

        loop {
            tokio::select! {
                line = lines.next() => match line {
                    Some(Ok(line)) => {
                        if let Flow::Quit = self.handle_line(&line).await {
                            break;
                        }
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                },
                event = store_events.next() => match event {
                    Some(Ok(event)) => self.on_store_event(event).await,
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped, "terminal: store events lagged; re-rendering");
                        println!("{}", render::home(&self.view().await, self.online_only));
                    }
                    None => break,
                },
            }
        }

        if self.client.session.current_user().await.is_some() {
            self.client.session.disconnect_socket().await;
        }
        Ok(())
    }

    async fn view(&self) -> HomeView {
        let session = self.client.session.snapshot().await;
        let conversation = self.client.conversation.snapshot().await;
        let mut home = view::home_view(&session, &conversation);
        if let HomeView::Chat(chat) = &mut home {
            chat.contacts =
                view::contact_list(&chat.me, &session, &conversation, self.online_only);
        }
        home
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let command = match commands::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(err) => {
                notify(&err.to_string());
                return Flow::Continue;
            }
        };
        if let Err(err) = self.execute(command.clone()).await {
            notify(&err.user_message());
        }
        match command {
            Command::Quit => Flow::Quit,
            _ => Flow::Continue,
        }
    }

    async fn execute(&mut self, command: Command) -> client_core::Result<()> {
        let session = &self.client.session;
        let conversation = &self.client.conversation;
        match command {
            Command::SignUp {
                first_name,
                last_name,
                email,
                password,
            } => {
                let user = session
                    .sign_up(&SignUpForm {
                        first_name,
                        last_name,
                        email,
                        password,
                    })
                    .await?;
                println!("Account created. Welcome, {}!", user.first_name);
            }
            Command::Login { email, password } => {
                let user = session.login(&LoginForm { email, password }).await?;
                println!("Logged in as {}", user.full_name());
            }
            Command::Logout => {
                self.client.logout().await?;
                self.composer = Composer::new();
                println!("Logged out");
            }
            Command::Contacts => {
                conversation.list_contacts().await?;
            }
            Command::ToggleOnlineOnly => {
                self.online_only = !self.online_only;
                self.print_contacts().await;
            }
            Command::Open(query) => {
                let contact = self.find_contact(&query).await.ok_or_else(|| {
                    ClientError::validation(format!("No contact matches '{query}'"))
                })?;
                discard_stale_draft(&mut self.composer, Some(&contact.id));
                conversation.open_conversation(contact).await?;
            }
            Command::Close => {
                conversation.close_conversation().await;
                discard_stale_draft(&mut self.composer, None);
            }
            Command::Send(text) => {
                self.composer.set_text(text);
                let message = self.composer.submission()?;
                conversation.send(message).await?;
                self.composer.clear();
            }
            Command::AttachImage(Some(path)) => {
                let (mime, bytes) = read_image(&path).await?;
                self.composer.attach_image(&mime, &bytes)?;
                println!("Image attached; /send to deliver it");
            }
            Command::AttachImage(None) => {
                self.composer.remove_image();
                println!("Image removed");
            }
            Command::Avatar(path) => {
                let (mime, bytes) = read_image(&path).await?;
                let data_url = encode_image(&mime, &bytes)?;
                session.update_profile(data_url).await?;
                println!("Profile updated successfully");
            }
            Command::Profile => match session.current_user().await {
                Some(user) => {
                    let online = session.connection().await.is_some();
                    println!("{}", render::profile(&user, online));
                }
                None => return Err(ClientError::NotAuthenticated),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn on_store_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::AuthUserChanged(Some(user)) => {
                debug!(user_id = %user.id, "terminal: signed in");
                if let Err(err) = self.client.conversation.list_contacts().await {
                    notify(&err.user_message());
                }
            }
            ClientEvent::AuthUserChanged(None) => {
                self.client.conversation.reset().await;
                println!("{}", render::home(&self.view().await, self.online_only));
            }
            ClientEvent::ContactsChanged | ClientEvent::OnlineUsersChanged(_) => {
                self.print_contacts().await;
            }
            ClientEvent::SelectionChanged(None) | ClientEvent::MessagesChanged => {
                if let HomeView::Chat(chat) = self.view().await {
                    println!("{}", render::pane(&chat.pane));
                }
            }
            ClientEvent::SelectionChanged(Some(_)) => {}
            ClientEvent::MessageAppended(message) => self.print_appended(&message).await,
        }
    }

    async fn print_contacts(&self) {
        if let HomeView::Chat(chat) = self.view().await {
            println!("{}", render::contacts(&chat.contacts, self.online_only));
        }
    }

    async fn print_appended(&self, message: &Message) {
        let session = self.client.session.snapshot().await;
        let conversation = self.client.conversation.snapshot().await;
        if let Some((header, bubble)) = view::appended_bubble(&session, &conversation, message) {
            println!("{}", render::bubble(&bubble, &header.name));
        }
    }

    /// 1-based index into the rendered list, a user id, or a name prefix.
    async fn find_contact(&self, query: &str) -> Option<User> {
        let contacts = self.client.conversation.contacts().await;
        if let HomeView::Chat(chat) = self.view().await {
            if let Ok(index) = query.parse::<usize>() {
                let id = &chat.contacts.entries.get(index.checked_sub(1)?)?.id;
                return contacts.iter().find(|contact| &contact.id == id).cloned();
            }
        }
        let needle = query.to_lowercase();
        contacts
            .iter()
            .find(|contact| contact.id.as_str() == query)
            .or_else(|| {
                contacts
                    .iter()
                    .find(|contact| contact.full_name().to_lowercase().starts_with(&needle))
            })
            .cloned()
    }
}

async fn read_image(path: &Path) -> client_core::Result<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        ClientError::validation(format!("Cannot read '{}': {err}", path.display()))
    })?;
    let mime = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok((mime, bytes))
}

fn discard_stale_draft(composer: &mut Composer, contact_id: Option<&UserId>) {
    if composer.retarget(contact_id) {
        notify("Draft discarded for the previous conversation");
    }
}

fn notify(message: &str) {
    println!("! {message}");
}
