//! TMI client connection.
//!
//! One background task owns the socket. It logs in, re-joins every wanted
//! channel after each (re)connect, answers PINGs, tracks which joins the
//! server confirmed or refused, and forwards every other line, in arrival
//! order, to the inbound queue.

use super::{FeedConnection, FeedError};
use crate::metrics;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tmi_proto::{IrcMessage, TmiCodec, channel_from_param, command};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Inbound lines buffered between the socket task and the consumer.
const INBOUND_QUEUE: usize = 4096;

/// Notice ids sent in place of a JOIN confirmation.
const JOIN_REFUSAL_NOTICES: [&str; 4] = [
    "msg_channel_suspended",
    "msg_banned",
    "msg_channel_blocked",
    "tos_ban",
];

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub join_timeout: Duration,
    /// Report join counts and channel gauges. Off for the bot connection.
    pub track_metrics: bool,
}

type JoinWaiter = oneshot::Sender<Result<(), FeedError>>;

struct Shared {
    settings: FeedSettings,
    outbound: mpsc::UnboundedSender<String>,
    joined: DashSet<String>,
    wanted: DashSet<String>,
    pending_joins: DashMap<String, Vec<JoinWaiter>>,
    join_limiter: DefaultDirectRateLimiter,
}

impl Shared {
    fn new(settings: FeedSettings, outbound: mpsc::UnboundedSender<String>) -> Self {
        // 20 joins per 10 seconds
        let quota = Quota::per_second(nonzero!(2u32)).allow_burst(nonzero!(20u32));
        Self {
            settings,
            outbound,
            joined: DashSet::new(),
            wanted: DashSet::new(),
            pending_joins: DashMap::new(),
            join_limiter: RateLimiter::direct(quota),
        }
    }

    fn update_gauges(&self) {
        if self.settings.track_metrics {
            metrics::set_channel_counts(self.joined.len(), self.wanted.len());
        }
    }

    fn is_self(&self, msg: &IrcMessage) -> bool {
        msg.source_nickname()
            .is_some_and(|nick| nick.eq_ignore_ascii_case(&self.settings.username))
    }

    fn resolve_join(&self, channel: &str, outcome: impl Fn() -> Result<(), FeedError>) {
        if let Some((_, waiters)) = self.pending_joins.remove(channel) {
            for waiter in waiters {
                let _ = waiter.send(outcome());
            }
        }
    }
}

/// What the socket task should do with one inbound line.
#[derive(Debug)]
enum Inbound {
    Reply(String),
    Forward(IrcMessage),
    Reconnect,
    Handled,
}

fn handle_inbound(shared: &Shared, msg: IrcMessage) -> Inbound {
    let channel = msg.param(0).and_then(channel_from_param).map(str::to_owned);

    match msg.command() {
        "PING" => Inbound::Reply(command::pong(msg.param(0).unwrap_or("tmi.twitch.tv"))),
        "RECONNECT" => {
            info!("Chat server requested a reconnect");
            Inbound::Reconnect
        }
        "JOIN" if shared.is_self(&msg) => {
            if let Some(channel) = channel {
                debug!(channel = %channel, "Joined channel");
                shared.joined.insert(channel.clone());
                shared.resolve_join(&channel, || Ok(()));
                if shared.settings.track_metrics {
                    metrics::record_joined();
                }
                shared.update_gauges();
            }
            Inbound::Handled
        }
        "PART" if shared.is_self(&msg) => {
            if let Some(channel) = channel {
                debug!(channel = %channel, "Parted channel");
                shared.joined.remove(&channel);
                shared.update_gauges();
            }
            Inbound::Handled
        }
        "NOTICE" => {
            let refusal = msg
                .tag_value("msg-id")
                .is_some_and(|id| JOIN_REFUSAL_NOTICES.contains(&id));
            match channel {
                Some(channel) if refusal && shared.pending_joins.contains_key(&channel) => {
                    let reason = msg.param(1).unwrap_or("Join refused").to_owned();
                    warn!(channel = %channel, reason = %reason, "Join refused");
                    shared.wanted.remove(&channel);
                    shared.resolve_join(&channel, || Err(FeedError::join(&channel, &reason)));
                    shared.update_gauges();
                    Inbound::Handled
                }
                Some(_) => Inbound::Forward(msg),
                None => {
                    warn!(notice = %msg.param(1).unwrap_or(""), "Chat server notice");
                    Inbound::Handled
                }
            }
        }
        _ if channel.is_some() => Inbound::Forward(msg),
        _ => Inbound::Handled,
    }
}

#[derive(Clone)]
pub struct TmiClient {
    shared: Arc<Shared>,
}

impl TmiClient {
    /// Start the connection task. Inbound channel lines arrive on the
    /// returned receiver in the order the server sent them.
    pub fn spawn(
        settings: FeedSettings,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, mpsc::Receiver<IrcMessage>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let shared = Arc::new(Shared::new(settings, outbound_tx));

        tokio::spawn(run_connection(
            shared.clone(),
            outbound_rx,
            inbound_tx,
            shutdown,
        ));

        (Self { shared }, inbound_rx)
    }

    fn send(&self, line: String) -> Result<(), FeedError> {
        self.shared
            .outbound
            .send(line)
            .map_err(|_| FeedError::Closed)
    }
}

#[async_trait]
impl FeedConnection for TmiClient {
    async fn join(&self, channel: &str) -> Result<(), FeedError> {
        let shared = &self.shared;
        shared.wanted.insert(channel.to_owned());
        shared.update_gauges();

        if shared.joined.contains(channel) {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = shared.pending_joins.entry(channel.to_owned()).or_default();
            waiters.retain(|w| !w.is_closed());
            waiters.push(tx);
        }

        shared.join_limiter.until_ready().await;
        self.send(command::join(channel))?;

        match tokio::time::timeout(shared.settings.join_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(FeedError::Closed),
            // still wanted: a reconnect retries it
            Err(_) => Err(FeedError::join(
                channel,
                "Timed out waiting for the chat server to confirm the join",
            )),
        }
    }

    async fn part(&self, channel: &str) -> Result<(), FeedError> {
        self.shared.wanted.remove(channel);
        self.shared.joined.remove(channel);
        self.shared.update_gauges();
        self.send(command::part(channel))
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), FeedError> {
        self.send(command::privmsg(channel, text))
    }

    fn joined_channels(&self) -> BTreeSet<String> {
        self.shared.joined.iter().map(|c| c.key().clone()).collect()
    }

    fn wanted_channels(&self) -> BTreeSet<String> {
        self.shared.wanted.iter().map(|c| c.key().clone()).collect()
    }
}

async fn login(
    framed: &mut Framed<TcpStream, TmiCodec>,
    settings: &FeedSettings,
) -> Result<(), FeedError> {
    framed.send(command::cap_req()).await?;
    if let Some(password) = settings.password.as_deref().filter(|p| !p.is_empty()) {
        framed.send(command::pass(password)).await?;
    }
    framed.send(command::nick(&settings.username)).await?;
    Ok(())
}

/// Queue JOINs for every wanted channel, paced by the join limiter.
fn spawn_rejoin(shared: Arc<Shared>) {
    let channels: Vec<String> = shared.wanted.iter().map(|c| c.key().clone()).collect();
    if channels.is_empty() {
        return;
    }
    info!(count = channels.len(), "Re-joining wanted channels");
    tokio::spawn(async move {
        for channel in channels {
            if !shared.wanted.contains(&channel) {
                continue;
            }
            shared.join_limiter.until_ready().await;
            if shared.outbound.send(command::join(&channel)).is_err() {
                break;
            }
        }
    });
}

async fn run_connection(
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: mpsc::Sender<IrcMessage>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let addr = format!("{}:{}", shared.settings.host, shared.settings.port);

    'reconnect_loop: loop {
        info!(addr = %addr, username = %shared.settings.username, "Connecting to chat server");

        let mut framed = match TcpStream::connect(&addr).await {
            Ok(stream) => Framed::new(stream, TmiCodec::new()),
            Err(e) => {
                warn!(addr = %addr, error = %e, "Failed to connect to chat server, retrying in 5s");
                tokio::select! {
                    _ = shutdown.recv() => break 'reconnect_loop,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                }
            }
        };

        if let Err(e) = login(&mut framed, &shared.settings).await {
            warn!(error = %e, "Failed to log in to chat server, retrying in 5s");
            tokio::select! {
                _ = shutdown.recv() => break 'reconnect_loop,
                _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
            }
        }

        spawn_rejoin(shared.clone());

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Chat connection stopping");
                    let _ = framed.close().await;
                    break 'reconnect_loop;
                }
                line = outbound_rx.recv() => {
                    match line {
                        Some(line) => {
                            if let Err(e) = framed.send(line).await {
                                warn!(error = %e, "Failed to send to chat server");
                                break;
                            }
                        }
                        None => {
                            info!("Feed client dropped, closing chat connection");
                            let _ = framed.close().await;
                            break 'reconnect_loop;
                        }
                    }
                }
                result = framed.next() => {
                    match result {
                        Some(Ok(msg)) => match handle_inbound(&shared, msg) {
                            Inbound::Reply(line) => {
                                if let Err(e) = framed.send(line).await {
                                    warn!(error = %e, "Failed to reply to chat server");
                                    break;
                                }
                            }
                            Inbound::Forward(msg) => {
                                if inbound_tx.send(msg).await.is_err() {
                                    info!("Inbound consumer gone, closing chat connection");
                                    break 'reconnect_loop;
                                }
                            }
                            Inbound::Reconnect => break,
                            Inbound::Handled => {}
                        },
                        Some(Err(e)) => {
                            warn!(error = %e, "Chat connection error");
                            break;
                        }
                        None => {
                            info!("Chat server closed the connection");
                            break;
                        }
                    }
                }
            }
        }

        shared.joined.clear();
        shared.update_gauges();

        info!("Reconnecting to chat server in 5s");
        tokio::select! {
            _ = shutdown.recv() => break 'reconnect_loop,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}
