//! In-process fakes for the HTTP and realtime capabilities.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{MessageId, UserId},
    protocol::{
        LoginRequest, Message, SendMessageRequest, ServerEvent, SignUpRequest,
        UpdateProfileRequest, User,
    },
};
use tokio::{sync::broadcast, time::timeout};

use crate::{
    api::ChatApi,
    error::{ClientError, Result},
    realtime::{ConnectParams, ConnectionStatus, RealtimeConnection, RealtimeConnector, RealtimeEvent},
    ClientEvent,
};

pub(crate) const PASSWORD: &str = "secret1";

pub(crate) fn user(id: &str, first_name: &str) -> User {
    User {
        id: UserId::from(id),
        email: format!("{id}@example.com"),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        profile_pic: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub(crate) fn message(id: &str, sender: &str, receiver: &str, text: &str) -> Message {
    Message {
        id: MessageId::from(id),
        sender_id: UserId::from(sender),
        receiver_id: UserId::from(receiver),
        text: Some(text.to_string()),
        image: None,
        created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
    }
}

fn rejected(status: u16, message: &str) -> ClientError {
    ClientError::Api {
        status,
        message: message.to_string(),
    }
}

/// Scriptable backend. `me` is the account every auth call resolves to.
pub(crate) struct FakeChatApi {
    pub me: User,
    pub session_valid: AtomicBool,
    pub logout_fails: AtomicBool,
    pub send_fails: AtomicBool,
    pub contacts: Mutex<Vec<User>>,
    pub histories: Mutex<HashMap<UserId, Vec<Message>>>,
    pub delays: Mutex<HashMap<UserId, Duration>>,
    pub login_delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(UserId, SendMessageRequest)>>,
    next_message: AtomicUsize,
}

impl FakeChatApi {
    pub fn new(me: User) -> Self {
        Self {
            me,
            session_valid: AtomicBool::new(false),
            logout_fails: AtomicBool::new(false),
            send_fails: AtomicBool::new(false),
            contacts: Mutex::new(Vec::new()),
            histories: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            login_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            next_message: AtomicUsize::new(1),
        }
    }

    pub fn with_history(self, contact: &str, messages: Vec<Message>) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(UserId::from(contact), messages);
        self
    }

    pub fn with_delay(self, contact: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert(UserId::from(contact), delay);
        self
    }

    pub fn with_login_delay(self, delay: Duration) -> Self {
        *self.login_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn check_auth(&self) -> Result<User> {
        self.record("check_auth");
        if self.session_valid.load(Ordering::SeqCst) {
            Ok(self.me.clone())
        } else {
            Err(rejected(401, "Unauthorized - No Token Provided"))
        }
    }

    async fn login(&self, request: &LoginRequest) -> Result<User> {
        self.record("login");
        let delay = *self.login_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if request.password != PASSWORD {
            return Err(rejected(400, "Invalid credentials"));
        }
        self.session_valid.store(true, Ordering::SeqCst);
        Ok(self.me.clone())
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout");
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(rejected(500, "Internal Server Error"));
        }
        self.session_valid.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<User> {
        self.record("sign_up");
        if request.email == self.me.email {
            return Err(rejected(400, "Email already exists"));
        }
        self.session_valid.store(true, Ordering::SeqCst);
        Ok(User {
            email: request.email.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            ..self.me.clone()
        })
    }

    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User> {
        self.record("update_profile");
        Ok(User {
            profile_pic: Some(request.profile_pic.clone()),
            ..self.me.clone()
        })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.record("list_users");
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn list_messages(&self, contact_id: &UserId) -> Result<Vec<Message>> {
        self.record(format!("list_messages:{contact_id}"));
        let delay = self.delays.lock().unwrap().get(contact_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(contact_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(
        &self,
        contact_id: &UserId,
        request: &SendMessageRequest,
    ) -> Result<Message> {
        self.record(format!("send_message:{contact_id}"));
        let delay = self.delays.lock().unwrap().get(contact_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.send_fails.load(Ordering::SeqCst) {
            return Err(rejected(413, "Image too large"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((contact_id.clone(), request.clone()));
        let n = self.next_message.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            id: MessageId::new(format!("sent-{n}")),
            sender_id: self.me.id.clone(),
            receiver_id: contact_id.clone(),
            text: request.text.clone(),
            image: request.image.clone(),
            created_at: Some(Utc::now()),
        })
    }
}

pub(crate) struct FakeConnection {
    user_id: UserId,
    events: broadcast::Sender<RealtimeEvent>,
    disconnected: AtomicBool,
}

impl FakeConnection {
    pub fn emit(&self, event: ServerEvent) {
        let _ = self.events.send(RealtimeEvent::Server(event));
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl RealtimeConnection for FakeConnection {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn status(&self) -> ConnectionStatus {
        if self.is_disconnected() {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Connected
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    pub attempts: Mutex<Vec<ConnectParams>>,
    pub connections: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn attempts(&self) -> Vec<ConnectParams> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Arc<FakeConnection> {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("a connection was opened")
    }
}

impl RealtimeConnector for FakeConnector {
    fn connect(&self, params: ConnectParams) -> Arc<dyn RealtimeConnection> {
        let (events, _) = broadcast::channel(64);
        let connection = Arc::new(FakeConnection {
            user_id: params.user_id.clone(),
            events,
            disconnected: AtomicBool::new(false),
        });
        self.attempts.lock().unwrap().push(params);
        self.connections
            .lock()
            .unwrap()
            .push(Arc::clone(&connection));
        connection
    }
}

/// Waits for the first event matching `pred`, skipping others.
pub(crate) async fn wait_for(
    events: &mut broadcast::Receiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("store event");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected store event before timeout")
}

/// Aborted listener tasks release their receivers on the next scheduler pass.
pub(crate) async fn settle_listeners(connection: &FakeConnection, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while connection.listener_count() != expected {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("listener count settles");
}
