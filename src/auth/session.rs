use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use teloxide::types::ChatId;

use crate::auth::{AuthState, User};

/// Gets told about every sign-in and sign-out.
pub trait AuthObserver: Send + Sync {
    fn on_auth_state_changed(&self, chat: ChatId, state: &AuthState);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-chat sign-in state, shared by every handler through the dispatcher's
/// dependency map.
#[derive(Default)]
pub struct AuthSessions {
    states: Mutex<HashMap<ChatId, AuthState>>,
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn AuthObserver>)>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn AuthObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.observers).push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn current(&self, chat: ChatId) -> AuthState {
        lock(&self.states).get(&chat).cloned().unwrap_or_default()
    }

    pub fn is_signed_in(&self, chat: ChatId) -> bool {
        lock(&self.states)
            .get(&chat)
            .map_or(false, AuthState::is_signed_in)
    }

    pub fn sign_in(&self, chat: ChatId, user: User) {
        self.set(chat, AuthState::SignedIn(user));
    }

    pub fn sign_out(&self, chat: ChatId) {
        self.set(chat, AuthState::SignedOut);
    }

    fn set(&self, chat: ChatId, state: AuthState) {
        {
            let mut states = lock(&self.states);
            match &state {
                AuthState::SignedOut => {
                    if states.remove(&chat).is_none() {
                        return;
                    }
                }
                AuthState::SignedIn(_) => {
                    states.insert(chat, state.clone());
                }
            }
        }
        self.notify(chat, &state);
    }

    // Observers are called without holding any lock so they may query back.
    fn notify(&self, chat: ChatId, state: &AuthState) {
        let observers: Vec<Arc<dyn AuthObserver>> = lock(&self.observers)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.on_auth_state_changed(chat, state);
        }
    }
}

pub struct LogObserver;

impl AuthObserver for LogObserver {
    fn on_auth_state_changed(&self, chat: ChatId, state: &AuthState) {
        match state {
            AuthState::SignedIn(user) => {
                log::info!("Chat {} signed in as {} ({})", chat.0, user.email, user.uid)
            }
            AuthState::SignedOut => log::info!("Chat {} signed out", chat.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(ChatId, bool)>>,
    }

    impl AuthObserver for Recorder {
        fn on_auth_state_changed(&self, chat: ChatId, state: &AuthState) {
            self.seen.lock().unwrap().push((chat, state.is_signed_in()));
        }
    }

    fn user(email: &str) -> User {
        User {
            uid: format!("uid-{email}"),
            email: email.to_string(),
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn chats_start_signed_out() {
        let sessions = AuthSessions::new();
        assert!(!sessions.is_signed_in(ChatId(1)));
        assert_eq!(sessions.current(ChatId(1)), AuthState::SignedOut);
    }

    #[test]
    fn sign_in_and_out_notify_observers() {
        let sessions = AuthSessions::new();
        let recorder = Arc::new(Recorder::default());
        sessions.subscribe(recorder.clone());

        sessions.sign_in(ChatId(1), user("sophie@example.com"));
        assert!(sessions.is_signed_in(ChatId(1)));
        assert_eq!(
            sessions.current(ChatId(1)).user().map(|u| u.email.as_str()),
            Some("sophie@example.com")
        );

        sessions.sign_out(ChatId(1));
        assert!(!sessions.is_signed_in(ChatId(1)));

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![(ChatId(1), true), (ChatId(1), false)]
        );
    }

    #[test]
    fn signing_out_a_signed_out_chat_is_silent() {
        let sessions = AuthSessions::new();
        let recorder = Arc::new(Recorder::default());
        sessions.subscribe(recorder.clone());

        sessions.sign_out(ChatId(3));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn chats_are_independent() {
        let sessions = AuthSessions::new();
        sessions.sign_in(ChatId(1), user("kiki@example.com"));
        assert!(!sessions.is_signed_in(ChatId(2)));
    }

    #[test]
    fn unsubscribed_observer_hears_nothing_more() {
        let sessions = AuthSessions::new();
        let recorder = Arc::new(Recorder::default());
        let id = sessions.subscribe(recorder.clone());

        sessions.sign_in(ChatId(1), user("san@example.com"));
        assert!(sessions.unsubscribe(id));
        assert!(!sessions.unsubscribe(id));
        sessions.sign_out(ChatId(1));

        assert_eq!(*recorder.seen.lock().unwrap(), vec![(ChatId(1), true)]);
    }

    struct Reentrant(Arc<AuthSessions>, Mutex<Option<bool>>);

    impl AuthObserver for Reentrant {
        fn on_auth_state_changed(&self, chat: ChatId, _: &AuthState) {
            *self.1.lock().unwrap() = Some(self.0.is_signed_in(chat));
        }
    }

    #[test]
    fn observers_can_read_the_new_state() {
        let sessions = Arc::new(AuthSessions::new());
        let observer = Arc::new(Reentrant(sessions.clone(), Mutex::new(None)));
        sessions.subscribe(observer.clone());

        sessions.sign_in(ChatId(5), user("ashitaka@example.com"));
        assert_eq!(*observer.1.lock().unwrap(), Some(true));
    }
}
