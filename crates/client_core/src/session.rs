//! Session store: the signed-in user, presence, and the realtime connection lifecycle.
//!
//! The connection exists exactly while a user is signed in. Every path that
//! sets or clears the user goes through [`SessionStore::set_auth_user`], which
//! keeps the two in step.

use std::sync::{atomic::AtomicBool, Arc, Weak};

use shared::{
    domain::UserId,
    protocol::{ServerEvent, UpdateProfileRequest, User},
};
use tokio::{
    sync::{broadcast, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    api::ChatApi,
    error::{ClientError, Result},
    flags::{is_set, InFlight},
    forms::{LoginForm, SignUpForm},
    realtime::{
        ConnectParams, ConnectionStatus, RealtimeConnection, RealtimeConnector, RealtimeEvent,
    },
    ClientEvent, EVENT_CAPACITY,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub auth_user: Option<User>,
    pub online_users: Vec<UserId>,
    pub connection_status: Option<ConnectionStatus>,
    pub is_checking_auth: bool,
    pub is_signing_up: bool,
    pub is_logging_in: bool,
    pub is_updating_profile: bool,
}

struct SessionFlags {
    checking_auth: AtomicBool,
    signing_up: AtomicBool,
    logging_in: AtomicBool,
    updating_profile: AtomicBool,
}

struct ActiveConnection {
    handle: Arc<dyn RealtimeConnection>,
    presence_task: JoinHandle<()>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.presence_task.abort();
        self.handle.disconnect();
    }
}

#[derive(Default)]
struct SessionState {
    auth_user: Option<User>,
    online_users: Vec<UserId>,
    connection: Option<ActiveConnection>,
}

pub struct SessionStore {
    api: Arc<dyn ChatApi>,
    connector: Arc<dyn RealtimeConnector>,
    inner: RwLock<SessionState>,
    flags: SessionFlags,
    events: broadcast::Sender<ClientEvent>,
    /// The live connection handle, published on every connect and disconnect.
    current_connection: watch::Sender<Option<Arc<dyn RealtimeConnection>>>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn ChatApi>, connector: Arc<dyn RealtimeConnector>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (current_connection, _) = watch::channel(None);
        Arc::new(Self {
            api,
            connector,
            inner: RwLock::new(SessionState::default()),
            flags: SessionFlags {
                checking_auth: AtomicBool::new(true),
                signing_up: AtomicBool::new(false),
                logging_in: AtomicBool::new(false),
                updating_profile: AtomicBool::new(false),
            },
            events,
            current_connection,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.read().await;
        SessionSnapshot {
            auth_user: state.auth_user.clone(),
            online_users: state.online_users.clone(),
            connection_status: state
                .connection
                .as_ref()
                .map(|active| active.handle.status()),
            is_checking_auth: is_set(&self.flags.checking_auth),
            is_signing_up: is_set(&self.flags.signing_up),
            is_logging_in: is_set(&self.flags.logging_in),
            is_updating_profile: is_set(&self.flags.updating_profile),
        }
    }

    pub async fn current_user(&self) -> Option<User> {
        self.inner.read().await.auth_user.clone()
    }

    pub async fn connection(&self) -> Option<Arc<dyn RealtimeConnection>> {
        self.inner
            .read()
            .await
            .connection
            .as_ref()
            .map(|active| Arc::clone(&active.handle))
    }

    /// Follows the connection across reconnects; yields `None` while signed out.
    pub fn watch_connection(&self) -> watch::Receiver<Option<Arc<dyn RealtimeConnection>>> {
        self.current_connection.subscribe()
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        self.inner.read().await.online_users.clone()
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.inner.read().await.online_users.contains(user_id)
    }

    pub fn is_checking_auth(&self) -> bool {
        is_set(&self.flags.checking_auth)
    }

    pub fn is_signing_up(&self) -> bool {
        is_set(&self.flags.signing_up)
    }

    pub fn is_logging_in(&self) -> bool {
        is_set(&self.flags.logging_in)
    }

    pub fn is_updating_profile(&self) -> bool {
        is_set(&self.flags.updating_profile)
    }

    /// Verifies the existing session with the backend.
    pub async fn check_auth(self: &Arc<Self>) -> Result<User> {
        let _checking = InFlight::begin(&self.flags.checking_auth);
        match self.api.check_auth().await {
            Ok(user) => {
                self.set_auth_user(Some(user.clone())).await;
                Ok(user)
            }
            Err(err) => {
                debug!("session: check-auth failed: {err}");
                self.set_auth_user(None).await;
                Err(err)
            }
        }
    }

    pub async fn sign_up(self: &Arc<Self>, form: &SignUpForm) -> Result<User> {
        let request = form.validate()?;
        let _signing_up = InFlight::begin(&self.flags.signing_up);
        let user = self.api.sign_up(&request).await?;
        info!(user_id = %user.id, "session: account created");
        self.set_auth_user(Some(user.clone())).await;
        Ok(user)
    }

    pub async fn login(self: &Arc<Self>, form: &LoginForm) -> Result<User> {
        let request = form.validate()?;
        let _logging_in = InFlight::begin(&self.flags.logging_in);
        match self.api.login(&request).await {
            Ok(user) => {
                info!(user_id = %user.id, "session: logged in");
                self.set_auth_user(Some(user.clone())).await;
                Ok(user)
            }
            Err(err) => {
                self.set_auth_user(None).await;
                Err(err)
            }
        }
    }

    /// Ends the session. A backend failure leaves local state untouched.
    pub async fn logout(self: &Arc<Self>) -> Result<()> {
        self.api.logout().await?;
        info!("session: logged out");
        self.set_auth_user(None).await;
        Ok(())
    }

    pub async fn update_profile(self: &Arc<Self>, profile_pic: impl Into<String>) -> Result<User> {
        if self.current_user().await.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        let _updating = InFlight::begin(&self.flags.updating_profile);
        let user = self
            .api
            .update_profile(&UpdateProfileRequest {
                profile_pic: profile_pic.into(),
            })
            .await?;

        let mut state = self.inner.write().await;
        // Signed out while the request was in flight.
        if state.auth_user.is_none() {
            return Err(ClientError::NotAuthenticated);
        }
        state.auth_user = Some(user.clone());
        drop(state);
        let _ = self.events.send(ClientEvent::AuthUserChanged(Some(user.clone())));
        Ok(user)
    }

    /// Opens a realtime connection for the current user, replacing any existing one.
    pub async fn connect_socket(self: &Arc<Self>) {
        let mut state = self.inner.write().await;
        self.connect_locked(&mut state);
    }

    pub async fn disconnect_socket(&self) {
        let mut state = self.inner.write().await;
        self.disconnect_locked(&mut state);
    }

    async fn set_auth_user(self: &Arc<Self>, user: Option<User>) {
        let mut state = self.inner.write().await;
        let changed = state.auth_user != user;
        state.auth_user = user;
        if let Some(user_id) = state.auth_user.as_ref().map(|user| user.id.clone()) {
            let reusable = state.connection.as_ref().is_some_and(|active| {
                active.handle.user_id() == &user_id
                    && active.handle.status() != ConnectionStatus::Disconnected
            });
            if reusable {
                debug!(user_id = %user_id, "session: keeping existing realtime connection");
            } else {
                self.connect_locked(&mut state);
            }
        } else {
            self.disconnect_locked(&mut state);
        }
        let current = state.auth_user.clone();
        drop(state);
        if changed {
            let _ = self.events.send(ClientEvent::AuthUserChanged(current));
        }
    }

    fn connect_locked(self: &Arc<Self>, state: &mut SessionState) {
        let Some(user) = state.auth_user.as_ref() else {
            debug!("session: connect skipped without a signed-in user");
            return;
        };
        let params = ConnectParams {
            user_id: user.id.clone(),
            name: user.first_name.clone(),
        };
        self.disconnect_locked(state);

        let handle = self.connector.connect(params);
        let presence_task = spawn_presence_listener(Arc::downgrade(self), handle.subscribe());
        self.current_connection.send_replace(Some(Arc::clone(&handle)));
        state.connection = Some(ActiveConnection {
            handle,
            presence_task,
        });
    }

    fn disconnect_locked(&self, state: &mut SessionState) {
        if state.connection.take().is_some() {
            self.current_connection.send_replace(None);
            info!("session: realtime connection closed");
        }
        if !state.online_users.is_empty() {
            state.online_users.clear();
            let _ = self.events.send(ClientEvent::OnlineUsersChanged(Vec::new()));
        }
    }

    async fn replace_online_users(&self, user_ids: Vec<UserId>) {
        let mut state = self.inner.write().await;
        if state.connection.is_none() {
            return;
        }
        state.online_users = user_ids.clone();
        drop(state);
        let _ = self.events.send(ClientEvent::OnlineUsersChanged(user_ids));
    }
}

fn spawn_presence_listener(
    store: Weak<SessionStore>,
    mut events: broadcast::Receiver<RealtimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RealtimeEvent::Server(ServerEvent::OnlineUsers(user_ids))) => {
                    let Some(store) = store.upgrade() else {
                        break;
                    };
                    store.replace_online_users(user_ids).await;
                }
                Ok(RealtimeEvent::ConnectError(reason)) => {
                    warn!("session: realtime connection failed: {reason}");
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session: presence listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
