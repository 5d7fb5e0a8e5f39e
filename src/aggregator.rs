use tracing::{info, warn};

use crate::db::{Database, Feed};
use crate::error::{CommandError, CommandResult};
use crate::fetcher::{FeedClient, FetchError, RssFeed};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleOptions {
    /// Feeds to visit; `None` means one pass over the whole pool.
    pub size: Option<usize>,
    /// Log fetch failures and move on instead of aborting the cycle.
    ///
    /// A feed that fails in this mode is still marked fetched: its
    /// `last_fetched_at` moves even though nothing was fetched.
    pub keep_going: bool,
}

#[derive(Debug)]
pub struct FailedFetch {
    pub feed: Feed,
    pub error: FetchError,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub fetched: usize,
    pub failed: Vec<FailedFetch>,
}

/// One bounded pass of select, fetch, mark, store.
pub struct Aggregator<'a> {
    db: &'a Database,
    client: &'a FeedClient,
    scheduler: Scheduler<'a>,
}

impl<'a> Aggregator<'a> {
    pub fn new(db: &'a Database, client: &'a FeedClient) -> Self {
        Self {
            db,
            client,
            scheduler: Scheduler::new(db),
        }
    }

    /// Runs the cycle, calling `on_fetched` after each feed is fetched and stored.
    ///
    /// Iterations are strictly sequential: a feed is marked fetched before the
    /// next one is selected, which is what keeps the round-robin order intact.
    pub async fn run<F>(&self, options: CycleOptions, mut on_fetched: F) -> CommandResult<CycleReport>
    where
        F: FnMut(&Feed, &RssFeed),
    {
        let feed_count = usize::try_from(self.db.count_feeds().await?).unwrap_or_default();
        if feed_count == 0 {
            return Err(CommandError::NoFeeds);
        }

        let rounds = options.size.map_or(feed_count, |size| size.min(feed_count));
        info!("Aggregating {} of {} feeds", rounds, feed_count);

        let mut report = CycleReport::default();
        for _ in 0..rounds {
            let feed = match self.scheduler.next_due().await {
                Ok(feed) => feed,
                Err(CommandError::NotFound(_)) => {
                    warn!("Feed pool emptied mid-cycle, stopping early");
                    break;
                }
                Err(e) => return Err(e),
            };

            let document = match self.client.fetch(&feed.url).await {
                Ok(document) => document,
                Err(error) if options.keep_going => {
                    warn!("Failed to fetch feed '{}': {}", feed.name, error);
                    // Still demote it, or the next round would pick it again.
                    let feed = self.scheduler.mark_fetched(feed.id).await?;
                    report.failed.push(FailedFetch { feed, error });
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            let feed = self.scheduler.mark_fetched(feed.id).await?;
            self.store_items(&feed, &document).await?;

            on_fetched(&feed, &document);
            report.fetched += 1;
        }

        info!(
            "Aggregation cycle complete: {} fetched, {} failed",
            report.fetched,
            report.failed.len()
        );
        Ok(report)
    }

    async fn store_items(&self, feed: &Feed, document: &RssFeed) -> CommandResult {
        for item in &document.items {
            self.db
                .upsert_item(
                    feed.id,
                    item.key(),
                    &item.title,
                    &item.link,
                    &item.description,
                    item.pub_date.as_deref(),
                )
                .await?;
        }
        info!(
            "Stored {} items for feed '{}'",
            document.items.len(),
            feed.name
        );
        Ok(())
    }
}
