//! Console output for command results. Every function returns the full text,
//! newline-terminated, and leaves printing to the caller.

use crate::aggregator::FailedFetch;
use crate::db::{Feed, FeedFollowWithFeed, FeedWithCreator, ItemWithFeed, User};
use crate::fetcher::RssFeed;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn users(users: &[User], current: Option<&str>) -> String {
    if users.is_empty() {
        return "No users registered.\n".to_string();
    }

    let mut lines = vec!["Users:".to_string()];
    for user in users {
        if Some(user.name.as_str()) == current {
            lines.push(format!("* {} (current)", user.name));
        } else {
            lines.push(format!("* {}", user.name));
        }
    }
    finish(lines)
}

pub fn feeds(feeds: &[FeedWithCreator]) -> String {
    if feeds.is_empty() {
        return "No feeds yet.\n".to_string();
    }

    let mut lines = vec!["Feeds:".to_string()];
    for (i, entry) in feeds.iter().enumerate() {
        lines.push(format!("[{}] {}", i + 1, entry.feed.name));
        lines.push(format!("    URL:        {}", entry.feed.url));
        lines.push(format!("    Created by: {}", entry.creator_name));
    }
    finish(lines)
}

pub fn feed_created(feed: &Feed) -> String {
    finish(vec![
        format!("Feed created: {}", feed.name),
        format!("    ID:      {}", feed.id),
        format!("    URL:     {}", feed.url),
        format!("    Created: {}", feed.created_at.format(DATE_FORMAT)),
    ])
}

pub fn following(user: &User, follows: &[FeedFollowWithFeed]) -> String {
    if follows.is_empty() {
        return format!("{} is not following any feeds.\n", user.name);
    }

    let mut lines = vec![format!("{} follows:", user.name)];
    for (i, follow) in follows.iter().enumerate() {
        lines.push(format!("[{}] {}", i + 1, follow.feed_name));
        lines.push(format!("    URL:      {}", follow.feed_url));
        lines.push(format!(
            "    Followed: {}",
            follow.follow.created_at.format(DATE_FORMAT)
        ));
    }
    finish(lines)
}

pub fn fetched_feed(feed: &Feed, document: &RssFeed) -> String {
    let mut lines = vec![
        format!("=== {} ===", feed.name),
        format!("Title:       {}", document.title),
        format!("Link:        {}", document.link),
        format!("Description: {}", document.description),
    ];

    if document.items.is_empty() {
        lines.push("No items.".to_string());
        return finish(lines);
    }

    for (i, item) in document.items.iter().enumerate() {
        lines.push(format!("  [{}] {}", i + 1, item.title));
        if let Some(published) = &item.pub_date {
            lines.push(format!("      Published:   {}", published));
        }
        lines.push(format!("      Link:        {}", item.link));
        if !item.description.is_empty() {
            lines.push(format!("      Description: {}", item.description));
        }
    }
    finish(lines)
}

pub fn failed_fetches(failed: &[FailedFetch]) -> String {
    let mut lines = vec![format!("{} feed(s) could not be fetched:", failed.len())];
    for failure in failed {
        lines.push(format!(
            "  {} ({}): {}",
            failure.feed.name, failure.feed.url, failure.error
        ));
    }
    finish(lines)
}

pub fn items(items: &[ItemWithFeed]) -> String {
    if items.is_empty() {
        return "No stored items; run `agg` first.\n".to_string();
    }

    let mut lines = Vec::new();
    for entry in items {
        let item = &entry.item;
        lines.push(format!("{} ({})", item.title, entry.feed_name));
        if let Some(published) = &item.published {
            lines.push(format!("    {}", published));
        }
        lines.push(format!("    {}", item.link));
    }
    finish(lines)
}
