//! Stress helpers for kvmodel.
//!
//! Many engines sharing one store from several threads.

use crate::fixtures::{Post, User};
use kvmodel_core::Orm;
use kvmodel_store::InMemoryStore;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Ids returned by successful saves, in no particular order.
    pub ids: Vec<String>,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Successful operations.
    pub fn successful_ops(&self) -> usize {
        self.ids.len()
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads, each with its own engine.
    pub threads: usize,
    /// Saves per thread.
    pub saves_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            saves_per_thread: 250,
        }
    }
}

/// Saves users concurrently, each thread with its own engine on `store`.
///
/// Every user gets a distinct email; half of them share the `Oslo` index.
pub fn stress_concurrent_saves(
    store: &Arc<InMemoryStore>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let saves = config.saves_per_thread;
            thread::spawn(move || {
                let orm = Orm::new(store).expect("Failed to create engine");
                let mut ids = Vec::with_capacity(saves);
                let mut failed = 0usize;
                for i in 0..saves {
                    let city = if i % 2 == 0 { "Oslo" } else { "Bergen" };
                    let mut user = User::new(format!("t{t}-{i}@example.com"), city);
                    match orm.save(&mut user) {
                        Ok(id) => ids.push(id),
                        Err(_) => failed += 1,
                    }
                }
                (ids, failed)
            })
        })
        .collect();

    let mut ids = Vec::new();
    let mut failed_ops = 0;
    for handle in handles {
        let (thread_ids, failed) = handle.join().expect("Stress thread panicked");
        ids.extend(thread_ids);
        failed_ops += failed;
    }

    StressTestResult {
        ids,
        failed_ops,
        duration: start.elapsed(),
    }
}

/// Pushes posts onto one user's list from several threads while another
/// thread reads the list back. Returns the final member ids.
pub fn stress_member_list(store: &Arc<InMemoryStore>, config: &StressConfig) -> Vec<String> {
    let orm = Orm::new(Arc::clone(store)).expect("Failed to create engine");
    let mut owner = User::new("owner@example.com", "Oslo");
    orm.save(&mut owner).expect("Failed to save owner");

    let writers: Vec<_> = (0..config.threads)
        .map(|t| {
            let store = Arc::clone(store);
            let owner = owner.clone();
            let saves = config.saves_per_thread;
            thread::spawn(move || {
                let orm = Orm::new(store).expect("Failed to create engine");
                for i in 0..saves {
                    let mut post = Post::new(format!("{t}/{i}"), "rust");
                    orm.save(&mut post).expect("Failed to save post");
                    orm.push_member(&owner, User::POSTS, &post.id)
                        .expect("Failed to push member");
                }
            })
        })
        .collect();

    let reader = {
        let store = Arc::clone(store);
        let owner = owner.clone();
        thread::spawn(move || {
            let orm = Orm::new(store).expect("Failed to create engine");
            for _ in 0..10 {
                let posts: Vec<Post> = orm
                    .list_ordered_members(&owner, User::POSTS)
                    .expect("Failed to list members");
                assert!(posts.iter().all(|p| p.tag == "rust"));
            }
        })
    };

    for writer in writers {
        writer.join().expect("Writer panicked");
    }
    reader.join().expect("Reader panicked");

    orm.member_ids(&owner, User::POSTS)
        .expect("Failed to read member ids")
}
