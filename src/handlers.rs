use futures::future::LocalBoxFuture;
use tracing::{info, warn};

use crate::aggregator::{Aggregator, CycleOptions};
use crate::db::{Database, Feed, User};
use crate::error::{CommandError, CommandResult};
use crate::fetcher::FeedClient;
use crate::render;
use crate::router::Command;
use crate::session::Session;

const DEFAULT_BROWSE_LIMIT: i64 = 2;

pub struct AppState {
    pub db: Database,
    pub client: FeedClient,
    pub session: Session,
}

impl AppState {
    pub fn new(db: Database, client: FeedClient, session: Session) -> Self {
        Self {
            db,
            client,
            session,
        }
    }
}

// Account commands

pub fn register<'a>(
    state: &'a mut AppState,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let [name] = command.expect_args::<1>("register <name>")?;

        if state.db.get_user_by_name(name).await?.is_some() {
            return Err(CommandError::Duplicate(format!(
                "a user named `{name}` is already registered"
            )));
        }

        let user = state.db.create_user(name).await?;
        state.session.login(&user.name);
        info!("Registered user '{}'", user.name);

        println!(
            "User `{}` has been created at {}.",
            user.name,
            user.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    })
}

pub fn login<'a>(
    state: &'a mut AppState,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let [name] = command.expect_args::<1>("login <name>")?;

        let user = state
            .db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| CommandError::NotFound(format!("no user named `{name}`")))?;

        state.session.login(&user.name);
        println!("Logged in as `{}`.", user.name);
        Ok(())
    })
}

pub fn reset<'a>(
    state: &'a mut AppState,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        command.expect_args::<0>("reset")?;

        let removed = state.db.delete_all_users().await?;
        warn!("Reset removed {} users and everything they owned", removed);

        println!("Successfully reset the database ({} users removed).", removed);
        Ok(())
    })
}

pub fn users<'a>(
    state: &'a mut AppState,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        command.expect_args::<0>("users")?;

        let users = state.db.get_users().await?;
        print!("{}", render::users(&users, state.session.current_user_name()));
        Ok(())
    })
}

// Feed commands

pub fn feeds<'a>(
    state: &'a mut AppState,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        command.expect_args::<0>("feeds")?;

        let feeds = state.db.get_feeds_with_creators().await?;
        print!("{}", render::feeds(&feeds));
        Ok(())
    })
}

/// Creates the feed and follows it on the creator's behalf.
pub fn add_feed<'a>(
    state: &'a mut AppState,
    user: &'a User,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let [name, url] = command.expect_args::<2>("addfeed <name> <url>")?;

        let feed = state.db.create_feed(name, url, user.id).await?;
        state.db.create_feed_follow(user.id, feed.id).await?;
        info!("User '{}' added feed '{}' ({})", user.name, feed.name, feed.url);

        print!("{}", render::feed_created(&feed));
        Ok(())
    })
}

pub fn follow<'a>(
    state: &'a mut AppState,
    user: &'a User,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let [url] = command.expect_args::<1>("follow <url>")?;
        let feed = find_feed(&state.db, url).await?;

        if state
            .db
            .get_feed_follow_by_user_and_feed(user.id, feed.id)
            .await?
            .is_some()
        {
            return Err(CommandError::Duplicate(format!(
                "you are already following `{url}`"
            )));
        }

        state.db.create_feed_follow(user.id, feed.id).await?;
        println!("{} now follows {} ({}).", user.name, feed.name, feed.url);
        Ok(())
    })
}

pub fn unfollow<'a>(
    state: &'a mut AppState,
    user: &'a User,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let [url] = command.expect_args::<1>("unfollow <url>")?;
        let feed = find_feed(&state.db, url).await?;

        if !state.db.delete_feed_follow(user.id, feed.id).await? {
            return Err(CommandError::NotFound(format!(
                "you are not following `{url}`"
            )));
        }

        println!("{} unfollowed {} ({}).", user.name, feed.name, feed.url);
        Ok(())
    })
}

pub fn following<'a>(
    state: &'a mut AppState,
    user: &'a User,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        command.expect_args::<0>("following")?;

        let follows = state.db.get_feed_follows_for_user(user.id).await?;
        print!("{}", render::following(user, &follows));
        Ok(())
    })
}

async fn find_feed(db: &Database, url: &str) -> CommandResult<Feed> {
    db.get_feed_by_url(url)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("no feed with url `{url}`")))
}

// Reading commands

pub fn agg<'a>(
    state: &'a mut AppState,
    user: &'a User,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let options = parse_cycle_options(command)?;
        info!("User '{}' started an aggregation cycle", user.name);

        let report = Aggregator::new(&state.db, &state.client)
            .run(options, |feed, document| {
                print!("{}", render::fetched_feed(feed, document));
            })
            .await?;

        if !report.failed.is_empty() {
            print!("{}", render::failed_fetches(&report.failed));
        }
        Ok(())
    })
}

pub fn browse<'a>(
    state: &'a mut AppState,
    user: &'a User,
    command: &'a Command,
) -> LocalBoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let limit = match command.args.as_slice() {
            [] => DEFAULT_BROWSE_LIMIT,
            [limit] => parse_positive(limit, "browse [limit]")?,
            _ => {
                return Err(CommandError::Argument(
                    "usage: browse [limit]".to_string(),
                ))
            }
        };

        let items = state.db.get_items_for_user(user.id, limit).await?;
        print!("{}", render::items(&items));
        Ok(())
    })
}

/// `agg [cycle_size] [--keep-going]`, in either order.
pub fn parse_cycle_options(command: &Command) -> CommandResult<CycleOptions> {
    const USAGE: &str = "agg [cycle_size] [--keep-going]";

    let mut options = CycleOptions::default();
    for arg in &command.args {
        match arg.as_str() {
            "--keep-going" | "-k" if !options.keep_going => options.keep_going = true,
            value if options.size.is_none() && !value.starts_with('-') => {
                options.size = Some(parse_positive(value, USAGE)?);
            }
            _ => return Err(CommandError::Argument(format!("usage: {USAGE}"))),
        }
    }
    Ok(options)
}

fn parse_positive<T>(value: &str, usage: &str) -> CommandResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(CommandError::Argument(format!(
            "`{value}` is not a positive number, usage: {usage}"
        ))),
    }
}
