use tracing::debug;

use crate::db::{Database, Feed};
use crate::error::{CommandError, CommandResult};

/// Picks feeds in least-recently-fetched order.
///
/// There is no queue: marking a feed fetched pushes it behind every other
/// feed, so alternating [`Scheduler::next_due`] and [`Scheduler::mark_fetched`]
/// walks the whole pool before coming back to the first one.
pub struct Scheduler<'a> {
    db: &'a Database,
}

impl<'a> Scheduler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn next_due(&self) -> CommandResult<Feed> {
        self.db
            .get_next_feed_to_fetch()
            .await?
            .ok_or_else(|| CommandError::NotFound("no feeds to fetch".to_string()))
    }

    pub async fn mark_fetched(&self, feed_id: i64) -> CommandResult<Feed> {
        let feed = self.db.mark_feed_fetched(feed_id).await?;
        debug!("Marked feed '{}' fetched", feed.name);
        Ok(feed)
    }
}
