//! Tokio shell around a [`Session`]: one reader task, one paced writer task.
//!
//! The reader task owns the session and is the only place the store is
//! mutated. Events leave it through an unbounded channel, so application
//! code never runs on the reader task and may block on
//! [`Client::channel_mode`] without stalling input.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio_rustls::rustls;
use tracing::{debug, info, trace, warn};

use crate::command::{Command, LineFormatter};
use crate::config::ClientConfig;
use crate::dao::{DaoHandle, DaoSnapshot, ModeQuery, UserView};
use crate::error::{ClientError, RegistrationError, Result};
use crate::event::Event;
use crate::session::{Action, Session};
use crate::transport::{self, AsyncStream, BoxedStream, LineCodec, LineReader, LineWriter};

/// State shared between the handle and both tasks.
struct Shared {
    dao: DaoHandle,
    formatter: LineFormatter,
    queue: mpsc::UnboundedSender<String>,
    writer: AsyncMutex<Option<LineWriter>>,
    shutdown: watch::Sender<bool>,
    failure: Mutex<Option<String>>,
}

impl Shared {
    async fn write_line(&self, line: String) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(ClientError::Disconnected)?;
        trace!(line = %line, ">>");
        writer.send(line).await?;
        Ok(())
    }

    /// Record the first fatal error and stop both tasks.
    fn fail(&self, error: String) {
        self.failure.lock().get_or_insert(error);
        self.shutdown.send_replace(true);
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Handle to a running connection. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Connect to `config.host`, negotiating TLS first when `config.tls` is
    /// set, and start registering.
    pub async fn connect(config: ClientConfig) -> Result<(Client, mpsc::UnboundedReceiver<Event>)> {
        info!(host = %config.host, port = config.port, tls = config.tls, "connecting");
        let tcp = transport::connect_tcp(&config.host, config.port).await?;
        let mut stream: BoxedStream = Box::new(tcp);
        if config.tls {
            let tls = transport::client_config(config.tls_config.as_ref());
            stream = transport::handshake(stream, &config.host, tls).await?;
        }
        Self::from_stream(stream, config)
    }

    /// Run a session over an already open stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(
        stream: S,
        config: ClientConfig,
    ) -> Result<(Client, mpsc::UnboundedReceiver<Event>)>
    where
        S: AsyncStream + 'static,
    {
        let codec = LineCodec::new(&config.encoding)?;
        let (reader, writer) = transport::split(Box::new(stream), codec);

        let dao = DaoHandle::default();
        let session = Session::new(&config, dao.clone());
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            dao,
            formatter: config.line_formatter(),
            queue: queue_tx,
            writer: AsyncMutex::new(Some(writer)),
            shutdown,
            failure: Mutex::new(None),
        });

        let reader_task = ReaderTask {
            shared: Arc::clone(&shared),
            session,
            reader: Some(reader),
            events: events_tx,
            host: config.host.clone(),
            socket_timeout: config.socket_timeout,
            tls_config: config.tls_config.clone(),
        };
        tokio::spawn(reader_task.run());
        tokio::spawn(run_writer(
            Arc::clone(&shared),
            queue_rx,
            config.message_delay,
        ));

        Ok((Client { shared }, events_rx))
    }

    /// Queue `command` behind the message delay.
    pub fn send(&self, command: Command) -> Result<()> {
        if self.shared.is_shut_down() {
            return Err(ClientError::Disconnected);
        }
        for line in self.shared.formatter.format(&command) {
            self.shared
                .queue
                .send(line)
                .map_err(|_| ClientError::Disconnected)?;
        }
        Ok(())
    }

    /// Write `command` immediately, bypassing the queue.
    pub async fn send_now(&self, command: Command) -> Result<()> {
        for line in self.shared.formatter.format(&command) {
            self.shared.write_line(line).await?;
        }
        Ok(())
    }

    pub fn send_privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.send(Command::privmsg(target, text))
    }

    pub fn send_notice(&self, target: &str, text: &str) -> Result<()> {
        self.send(Command::Notice(target.to_string(), text.to_string()))
    }

    pub fn join(&self, channel: &str) -> Result<()> {
        self.send(Command::Join(channel.to_string(), None))
    }

    pub fn part(&self, channel: &str, reason: Option<&str>) -> Result<()> {
        self.send(Command::Part(
            channel.to_string(),
            reason.map(str::to_string),
        ))
    }

    /// Say goodbye. The server closes the connection in response.
    pub async fn quit(&self, reason: Option<&str>) -> Result<()> {
        self.send_now(Command::Quit(reason.map(str::to_string))).await
    }

    /// Close the connection. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.is_shut_down()
    }

    /// The live store. Hold its lock briefly.
    pub fn dao(&self) -> &DaoHandle {
        &self.shared.dao
    }

    pub fn snapshot(&self) -> DaoSnapshot {
        self.shared.dao.snapshot()
    }

    /// Our nick once registration completed.
    pub fn nick(&self) -> Option<String> {
        self.shared
            .dao
            .lock()
            .self_user()
            .map(|me| me.nick().to_string())
    }

    /// The mode string of `channel`.
    ///
    /// When the stored mode is stale a `MODE` query is sent and this waits
    /// for the reply. Fails with [`ClientError::ModeWaitInterrupted`] if the
    /// channel goes away or the session ends first.
    pub async fn channel_mode(&self, channel: &str) -> Result<String> {
        let query = self.shared.dao.lock().channel_mode(channel);
        match query {
            None => Err(ClientError::NoSuchChannel(channel.to_string())),
            Some(ModeQuery::Known(mode)) => Ok(mode),
            Some(ModeQuery::Stale(mut rx)) => {
                self.send(Command::Mode(channel.to_string(), None))?;
                let mode = rx
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| ClientError::ModeWaitInterrupted {
                        channel: channel.to_string(),
                    })?
                    .clone();
                Ok(mode.unwrap_or_default())
            }
        }
    }
}

struct ReaderTask {
    shared: Arc<Shared>,
    session: Session,
    reader: Option<LineReader>,
    events: mpsc::UnboundedSender<Event>,
    host: String,
    socket_timeout: Duration,
    tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl ReaderTask {
    async fn run(mut self) {
        let start = self.session.start();
        let error = match self.perform(start).await {
            Ok(()) => self.read_loop().await,
            Err(error) => Some(error),
        };
        let error = error.or_else(|| self.shared.failure.lock().take());

        self.shared.shutdown.send_replace(true);
        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            if let Err(e) = writer.close().await {
                debug!(%e, "error closing connection");
            }
        }

        if let Some(event) = self.session.disconnect(error) {
            let _ = self.events.send(event);
        }
    }

    /// Returns the error that ended the connection, if any.
    async fn read_loop(&mut self) -> Option<String> {
        let mut shutdown = self.shared.shutdown.subscribe();
        loop {
            if *shutdown.borrow() {
                return None;
            }
            let reader = self.reader.as_mut()?;
            let next = tokio::select! {
                _ = shutdown.changed() => continue,
                next = tokio::time::timeout(self.socket_timeout, reader.next()) => next,
            };

            match next {
                Err(_) => {
                    debug!("read timed out, checking liveness");
                    let ping = Command::Ping(self.host.clone()).to_string();
                    if let Err(e) = self.shared.write_line(ping).await {
                        return Some(e.to_string());
                    }
                }
                Ok(None) if self.session.is_registered() => return None,
                Ok(None) => return Some(RegistrationError::ConnectionClosed.to_string()),
                Ok(Some(Err(e))) => return Some(e.to_string()),
                Ok(Some(Ok(line))) => {
                    let actions = self.session.handle_line(&line);
                    if let Err(error) = self.perform(actions).await {
                        return Some(error);
                    }
                }
            }
        }
    }

    async fn perform(&mut self, actions: Vec<Action>) -> Result<(), String> {
        for action in actions {
            match action {
                Action::Send(line) => {
                    if self.shared.queue.send(line).is_err() {
                        return Err(ClientError::Disconnected.to_string());
                    }
                }
                Action::SendNow(line) => {
                    self.shared
                        .write_line(line)
                        .await
                        .map_err(|e| e.to_string())?;
                }
                Action::StartTls => self.start_tls().await.map_err(|e| e.to_string())?,
                Action::Emit(event) => {
                    let _ = self.events.send(event);
                }
                Action::Fail(error) => return Err(error.to_string()),
            }
        }
        Ok(())
    }

    /// Swap the transport for a TLS stream over the same socket.
    async fn start_tls(&mut self) -> Result<()> {
        let mut slot = self.shared.writer.lock().await;
        let (Some(reader), Some(writer)) = (self.reader.take(), slot.take()) else {
            return Err(ClientError::Disconnected);
        };

        let (stream, codec) = transport::reunite(reader, writer);
        let config = transport::client_config(self.tls_config.as_ref());
        let stream = transport::handshake(stream, &self.host, config).await?;
        let (reader, writer) = transport::split(stream, codec);

        self.reader = Some(reader);
        *slot = Some(writer);
        Ok(())
    }
}

async fn run_writer(
    shared: Arc<Shared>,
    mut queue: mpsc::UnboundedReceiver<String>,
    delay: Duration,
) {
    let mut shutdown = shared.shutdown.subscribe();
    loop {
        if *shutdown.borrow() {
            break;
        }
        let line = tokio::select! {
            _ = shutdown.changed() => continue,
            line = queue.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        if let Err(e) = shared.write_line(line).await {
            warn!(%e, "write failed");
            shared.fail(e.to_string());
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!("writer stopped");
}
