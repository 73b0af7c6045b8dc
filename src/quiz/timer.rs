use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use teloxide::types::ChatId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::auth::{AuthObserver, AuthState};

/// Pending "show the next question" tasks, at most one per chat.
///
/// Scheduling replaces the chat's previous task, cancelling aborts it, and
/// dropping the registry aborts everything still waiting.
#[derive(Debug, Default)]
pub struct AdvanceTimers {
    pending: Mutex<HashMap<ChatId, JoinHandle<()>>>,
}

impl AdvanceTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<ChatId, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `task` after `delay` unless the chat's timer is cancelled first.
    pub fn schedule<F>(&self, chat: ChatId, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        let mut pending = self.pending();
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = pending.insert(chat, handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self, chat: ChatId) -> bool {
        match self.pending().remove(&chat) {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self, chat: ChatId) -> bool {
        self.pending()
            .get(&chat)
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for AdvanceTimers {
    fn drop(&mut self) {
        for (_, handle) in self.pending().drain() {
            handle.abort();
        }
    }
}

impl AuthObserver for AdvanceTimers {
    fn on_auth_state_changed(&self, chat: ChatId, state: &AuthState) {
        if !state.is_signed_in() && self.cancel(chat) {
            log::debug!("Dropped pending quiz advance for chat {} on sign-out", chat.0);
        }
    }
}

/// One async lock per chat. Whoever reads the stored quiz, changes it and
/// writes it back holds the chat's lock for the whole round trip, so a timer
/// firing mid-handler cannot overwrite what the handler stored.
#[derive(Debug, Default)]
pub struct ChatLocks {
    locks: Mutex<HashMap<ChatId, Arc<AsyncMutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, chat: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Nobody holds or waits on a lock whose only reference is the map.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(chat).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSessions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CHAT: ChatId = ChatId(42);

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_delay() {
        let timers = AdvanceTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timers.is_pending(CHAT));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timers.is_pending(CHAT));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let timers = AdvanceTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        assert!(timers.cancel(CHAT));
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timers.cancel(CHAT));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_previous_timer() {
        let timers = AdvanceTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn chats_do_not_share_timers() {
        let timers = AdvanceTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        timers.schedule(ChatId(7), Duration::from_millis(1000), counting_task(&fired));
        timers.cancel(ChatId(7));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_cancels_the_chat_timer() {
        let timers = AdvanceTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        timers.on_auth_state_changed(CHAT, &AuthState::SignedOut);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_registry_aborts_everything() {
        let timers = AdvanceTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        drop(timers);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_registry_is_released_and_aborts() {
        let sessions = AuthSessions::new();
        let timers = Arc::new(AdvanceTimers::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let id = sessions.subscribe(timers.clone());
        timers.schedule(CHAT, Duration::from_millis(1000), counting_task(&fired));
        assert!(sessions.unsubscribe(id));
        drop(timers);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_lock_keeps_read_modify_write_whole() {
        let locks = Arc::new(ChatLocks::new());
        let stored = Arc::new(AtomicUsize::new(0));

        let writers: Vec<_> = [10, 20]
            .into_iter()
            .map(|pause| {
                let locks = locks.clone();
                let stored = stored.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock(CHAT).await;
                    let read = stored.load(Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                    stored.store(read + 1, Ordering::SeqCst);
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        assert_eq!(stored.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_locks_are_independent() {
        let locks = ChatLocks::new();
        let _held = locks.lock(CHAT).await;

        let other = tokio::time::timeout(Duration::from_millis(10), locks.lock(ChatId(7))).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(10), locks.lock(CHAT)).await;
        assert!(same.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn released_chat_lock_can_be_taken_again() {
        let locks = ChatLocks::new();
        drop(locks.lock(CHAT).await);
        drop(locks.lock(ChatId(7)).await);

        let again = tokio::time::timeout(Duration::from_millis(10), locks.lock(CHAT)).await;
        assert!(again.is_ok());
    }
}
