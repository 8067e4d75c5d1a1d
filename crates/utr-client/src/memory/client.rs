//! Client connected to a [`MemoryServer`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use utr_model::{Document, EventKind, Value};

use crate::client::{ClientOptions, CommandOptions, DatabaseClient, ServerInfo};
use crate::error::ClientError;
use crate::event::{
    ClientEvent, CmapEvent, CommandFailed, CommandStarted, CommandSucceeded, EventListener,
};
use crate::ids::new_session_id;
use crate::memory::lock;
use crate::memory::server::{MemoryServer, Response};
use crate::monitoring::published_body;

const LOG_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::memory");

/// Commands that never carry the declared API version.
const UNVERSIONED_COMMANDS: &[&str] = &["getMore"];

#[derive(Debug, Default)]
struct Pool {
    idle: Vec<u64>,
    checked_out: usize,
    next_connection_id: u64,
    closed: bool,
}

#[derive(Debug)]
struct Session {
    lsid: Document,
    dirty: bool,
}

/// What happened to the connection a command was sent on.
enum Completion {
    Reply(Document),
    Closed,
    TimedOut,
}

/// A client of a [`MemoryServer`] with its own connection pool.
///
/// Connections are simulated: each has an identifier and a lifecycle that is
/// published as pool events, but commands run directly against the shared
/// server.
#[derive(Debug)]
pub struct MemoryClient {
    server: Arc<MemoryServer>,
    options: ClientOptions,
    address: String,
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
    pool: Mutex<Pool>,
    sessions: Mutex<Vec<Session>>,
    next_request_id: AtomicI64,
}

impl MemoryClient {
    /// Connects to the server and publishes the pool creation events to the
    /// listeners in `options`.
    #[must_use]
    pub fn new(server: Arc<MemoryServer>, mut options: ClientOptions) -> Self {
        let listeners = std::mem::take(&mut options.listeners);
        let address = options
            .uri
            .split_once("://")
            .map(|(_, rest)| rest.trim_end_matches('/'))
            .filter(|host| !host.is_empty())
            .unwrap_or("localhost:27017")
            .to_owned();
        let client = Self {
            server,
            options,
            address,
            listeners: Mutex::new(listeners),
            pool: Mutex::new(Pool::default()),
            sessions: Mutex::new(Vec::new()),
            next_request_id: AtomicI64::new(1),
        };
        client.publish_cmap(EventKind::PoolCreatedEvent, None, None);
        client.publish_cmap(EventKind::PoolReadyEvent, None, None);
        client
    }

    fn publish(&self, event: &ClientEvent) {
        let listeners = lock(&self.listeners).clone();
        for listener in &listeners {
            listener.handle(event);
        }
    }

    fn publish_cmap(&self, kind: EventKind, connection_id: Option<u64>, reason: Option<&str>) {
        self.publish(&ClientEvent::Cmap(CmapEvent {
            kind,
            address: self.address.clone(),
            connection_id,
            reason: reason.map(str::to_owned),
        }));
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if lock(&self.pool).closed {
            Err(ClientError::client("client has been closed"))
        } else {
            Ok(())
        }
    }

    fn check_out(&self) -> u64 {
        self.publish_cmap(EventKind::ConnectionCheckOutStartedEvent, None, None);
        let (connection_id, created) = {
            let mut pool = lock(&self.pool);
            pool.checked_out += 1;
            let reused = pool.idle.pop();
            let connection_id = reused.unwrap_or_else(|| {
                pool.next_connection_id += 1;
                pool.next_connection_id
            });
            (connection_id, reused.is_none())
        };
        if created {
            self.publish_cmap(EventKind::ConnectionCreatedEvent, Some(connection_id), None);
            self.publish_cmap(EventKind::ConnectionReadyEvent, Some(connection_id), None);
        }
        self.publish_cmap(
            EventKind::ConnectionCheckedOutEvent,
            Some(connection_id),
            None,
        );
        connection_id
    }

    fn check_in(&self, connection_id: u64) {
        {
            let mut pool = lock(&self.pool);
            pool.checked_out = pool.checked_out.saturating_sub(1);
            pool.idle.push(connection_id);
        }
        self.publish_cmap(EventKind::ConnectionCheckedInEvent, Some(connection_id), None);
    }

    /// Closes a connection that failed while in use.
    fn discard(&self, connection_id: u64, clear_pool: bool) {
        let idle = {
            let mut pool = lock(&self.pool);
            pool.checked_out = pool.checked_out.saturating_sub(1);
            if clear_pool {
                std::mem::take(&mut pool.idle)
            } else {
                Vec::new()
            }
        };
        self.publish_cmap(EventKind::ConnectionCheckedInEvent, Some(connection_id), None);
        self.publish_cmap(
            EventKind::ConnectionClosedEvent,
            Some(connection_id),
            Some("error"),
        );
        if clear_pool {
            self.publish_cmap(EventKind::PoolClearedEvent, None, None);
            for stale in idle {
                self.publish_cmap(EventKind::ConnectionClosedEvent, Some(stale), Some("stale"));
            }
        }
    }

    fn ensure_session(&self, lsid: &Document) -> Result<(), ClientError> {
        if lock(&self.sessions).iter().any(|session| session.lsid == *lsid) {
            Ok(())
        } else {
            Err(ClientError::client(
                "cannot use a session that has ended or belongs to another client",
            ))
        }
    }

    fn mark_dirty(&self, lsid: &Document) {
        for session in lock(&self.sessions).iter_mut() {
            if session.lsid == *lsid {
                session.dirty = true;
            }
        }
    }

    fn decorate(&self, command_name: &str, command: &mut Document, options: &CommandOptions) {
        if let Some(lsid) = &options.session {
            command.insert("lsid", lsid.clone());
        }
        if let Some(api) = &self.options.server_api
            && !UNVERSIONED_COMMANDS.contains(&command_name)
        {
            command.insert("apiVersion", api.version.as_str());
            if let Some(strict) = api.strict {
                command.insert("apiStrict", strict);
            }
            if let Some(deprecation_errors) = api.deprecation_errors {
                command.insert("apiDeprecationErrors", deprecation_errors);
            }
        }
    }

    /// Waits out a server-side delay, giving up at the deadline.
    fn wait(delay: Option<Duration>, deadline: Option<Instant>) -> bool {
        let Some(pause) = delay else {
            return true;
        };
        let finished = Instant::now() + pause;
        match deadline {
            Some(limit) if limit < finished => {
                thread::sleep(limit.saturating_duration_since(Instant::now()));
                false
            }
            _ => {
                thread::sleep(pause);
                true
            }
        }
    }

    fn elapsed_micros(started: Instant) -> u64 {
        u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

fn is_ok_reply(reply: &Document) -> bool {
    reply
        .get("ok")
        .and_then(Value::as_f64)
        .is_some_and(|ok| ok > 0.5)
}

impl DatabaseClient for MemoryClient {
    fn run_command(
        &self,
        database: &str,
        mut command: Document,
        options: &CommandOptions,
    ) -> Result<Document, ClientError> {
        self.ensure_open()?;
        let command_name = command
            .first()
            .map(|(name, _)| name.to_owned())
            .ok_or_else(|| ClientError::client("command document is empty"))?;
        if let Some(lsid) = &options.session {
            self.ensure_session(lsid)?;
        }
        self.decorate(&command_name, &mut command, options);
        if options.is_expired() {
            return Err(ClientError::timeout(format!(
                "deadline expired before '{command_name}' was sent"
            )));
        }

        let connection_id = self.check_out();
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let observe_sensitive = self.options.observe_sensitive_commands;
        self.publish(&ClientEvent::CommandStarted(CommandStarted {
            command_name: command_name.clone(),
            database_name: database.to_owned(),
            command: published_body(&command_name, &command, &command, observe_sensitive),
            request_id,
            connection_id,
        }));
        debug!(
            target: LOG_TARGET,
            command = command_name.as_str(),
            database,
            request_id,
            connection_id,
            "command started"
        );

        let started = Instant::now();
        let execution = self
            .server
            .execute(database, &command, self.options.app_name());
        let completion = if Self::wait(execution.delay, options.deadline) {
            match execution.response {
                Response::Reply(reply) => Completion::Reply(reply),
                Response::CloseConnection => Completion::Closed,
            }
        } else {
            Completion::TimedOut
        };

        let failed = |failure: String| {
            ClientEvent::CommandFailed(CommandFailed {
                command_name: command_name.clone(),
                database_name: database.to_owned(),
                failure,
                request_id,
                connection_id,
                duration_micros: Self::elapsed_micros(started),
            })
        };
        match completion {
            Completion::Reply(reply) if is_ok_reply(&reply) => {
                self.publish(&ClientEvent::CommandSucceeded(CommandSucceeded {
                    command_name: command_name.clone(),
                    database_name: database.to_owned(),
                    reply: published_body(&command_name, &command, &reply, observe_sensitive),
                    request_id,
                    connection_id,
                    duration_micros: Self::elapsed_micros(started),
                }));
                self.check_in(connection_id);
                Ok(reply)
            }
            Completion::Reply(reply) => {
                let error = ClientError::from_reply(&reply);
                self.publish(&failed(error.to_string()));
                self.check_in(connection_id);
                Err(error)
            }
            Completion::Closed => {
                let error = ClientError::network(format!(
                    "connection {connection_id} closed while running '{command_name}'"
                ));
                warn!(
                    target: LOG_TARGET,
                    connection_id,
                    command = command_name.as_str(),
                    "connection closed by server"
                );
                self.publish(&failed(error.to_string()));
                self.discard(connection_id, true);
                if let Some(lsid) = &options.session {
                    self.mark_dirty(lsid);
                }
                Err(error)
            }
            Completion::TimedOut => {
                let error =
                    ClientError::timeout(format!("'{command_name}' exceeded its deadline"));
                self.publish(&failed(error.to_string()));
                self.discard(connection_id, false);
                Err(error)
            }
        }
    }

    fn start_session(&self) -> Result<Document, ClientError> {
        self.ensure_open()?;
        let lsid = new_session_id();
        lock(&self.sessions).push(Session {
            lsid: lsid.clone(),
            dirty: false,
        });
        Ok(lsid)
    }

    fn end_session(&self, lsid: &Document) -> Result<(), ClientError> {
        let mut sessions = lock(&self.sessions);
        let position = sessions
            .iter()
            .position(|session| session.lsid == *lsid)
            .ok_or_else(|| ClientError::client("session is not active on this client"))?;
        sessions.remove(position);
        Ok(())
    }

    fn is_session_dirty(&self, lsid: &Document) -> bool {
        lock(&self.sessions)
            .iter()
            .any(|session| session.lsid == *lsid && session.dirty)
    }

    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        lock(&self.listeners).push(listener);
    }

    fn server_info(&self) -> ServerInfo {
        self.server.info()
    }

    fn checked_out_connections(&self) -> usize {
        lock(&self.pool).checked_out
    }

    fn close(&self) -> Result<(), ClientError> {
        let idle = {
            let mut pool = lock(&self.pool);
            if pool.closed {
                return Err(ClientError::client("client is already closed"));
            }
            pool.closed = true;
            std::mem::take(&mut pool.idle)
        };
        lock(&self.sessions).clear();
        for connection_id in idle {
            self.publish_cmap(
                EventKind::ConnectionClosedEvent,
                Some(connection_id),
                Some("poolClosed"),
            );
        }
        self.publish_cmap(EventKind::PoolClosedEvent, None, None);
        Ok(())
    }
}
