use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{ChatTurn, Role};
use crate::rag::{Answer, RagPipeline};

/// Append-only transcript of one chat session.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Runs the pipeline for `query` and records the exchange.
    ///
    /// The user and assistant turns are appended together once the pipeline
    /// finishes. A failed query leaves the transcript untouched.
    pub async fn ask(
        &mut self,
        pipeline: &RagPipeline,
        query: &str,
    ) -> Result<Answer, PipelineError> {
        let answer = pipeline.run(query).await?;
        self.record(query, answer.message());
        Ok(answer)
    }

    fn record(&mut self, query: &str, reply: &str) {
        self.turns.reserve(2);
        self.turns.push(ChatTurn::new(Role::User, query));
        self.turns.push(ChatTurn::new(Role::Assistant, reply));
    }
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    last_active: Instant,
}

/// Live chat sessions keyed by id. Sessions exist only in memory and end
/// after `idle_limit` without a request.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    idle_limit: Duration,
}

impl SessionStore {
    pub fn new(idle_limit: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_limit,
        }
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            session: Arc::new(Mutex::new(ChatSession::new())),
            last_active: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        tracing::info!("Started chat session {}", id);
        id
    }

    /// Looks up a session and marks it active.
    ///
    /// The session's lock is meant to be held for a whole query, which keeps
    /// one query in flight per session.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<ChatSession>>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_active = Instant::now();
        Some(entry.session.clone())
    }

    pub async fn end(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!("Ended chat session {}", id);
        }
        removed
    }

    /// Ends every session idle for longer than the limit. Returns how many ended.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = now.duration_since(entry.last_active);
            if idle > self.idle_limit {
                tracing::info!("Ended chat session {} after {}s idle", id, idle.as_secs());
                false
            } else {
                true
            }
        });
        before - sessions.len()
    }

    pub fn start_sweeper(store: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let ended = store.sweep().await;
                if ended > 0 {
                    tracing::debug!("Session sweep ended {} idle sessions", ended);
                }
            }
        });
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
