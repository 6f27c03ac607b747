//! # slirc-client
//!
//! The client side of an IRC connection: registration, capability
//! negotiation and a consistent model of who is on which channel with what
//! privileges.
//!
//! ## Features
//!
//! - Line tokenizer with IRCv3 message tags
//! - Relational user/channel store with five privilege levels
//! - Immutable snapshots for events that describe departures
//! - Channel mode state machine with stale-mode tracking
//! - Registration with CAP negotiation, SASL PLAIN and STARTTLS
//! - Paced outbound queue with auto-split of long messages
//! - Optional Tokio runtime (`runtime` feature, on by default)

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Driving a session by hand
//!
//! [`Session`] is sans-IO: feed it lines, perform the [`Action`]s it returns.
//!
//! ```rust
//! use slirc_client::{ClientConfig, DaoHandle, Event, Session, Action};
//!
//! let mut config = ClientConfig::new("irc.example.net", 6667, "bot");
//! config.cap_enabled = false;
//! let dao = DaoHandle::default();
//! let mut session = Session::new(&config, dao.clone());
//!
//! let _ = session.start();
//! let _ = session.handle_line(":irc.example.net 001 bot :Welcome");
//! let _ = session.handle_line(":bot!b@host JOIN #rust");
//! let _ = session.handle_line(":alice!a@host JOIN #rust");
//!
//! let actions = session.handle_line(":alice!a@host PART #rust :bye");
//! let part = actions.iter().find_map(|a| match a {
//!     Action::Emit(Event::Part { user, .. }) => Some(user.clone()),
//!     _ => None,
//! });
//! assert!(part.is_some());
//! assert!(!dao.lock().contains_user("alice"));
//! ```
//!
//! ### Connecting
//!
//! ```no_run
//! use slirc_client::{Client, ClientConfig, Event};
//!
//! # async fn run() -> slirc_client::Result<()> {
//! let config = ClientConfig::new("irc.libera.chat", 6667, "slirc-bot");
//! let (client, mut events) = Client::connect(config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Event::Connect => client.join("#slirc")?,
//!         Event::Disconnect { .. } => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod caps;
pub mod casemap;
pub mod command;
pub mod config;
pub mod ctcp;
pub mod dao;
pub mod error;
pub mod event;
pub mod hostmask;
pub mod isupport;
pub mod line;
pub mod mode;
pub mod sasl;
pub mod session;
pub mod state;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod client;
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod transport;

pub use self::caps::{CapContext, CapHandler, EnableCapHandler, TlsCapHandler};
pub use self::casemap::{irc_eq, irc_to_lower, CaseMapping};
pub use self::command::{Command, LineFormatter};
pub use self::config::{AutoJoin, CapRequest, ClientConfig, WebIrcConfig};
pub use self::ctcp::Ctcp;
pub use self::dao::{
    ChannelSnapshot, ChannelView, DaoHandle, DaoSnapshot, ModeQuery, PrivilegeLevel,
    UserChannelDao, UserSnapshot, UserView,
};
pub use self::error::{ClientError, ConsistencyError, LineParseError, RegistrationError, Result};
pub use self::event::Event;
pub use self::hostmask::UserHostmask;
pub use self::isupport::ServerInfo;
pub use self::line::{tokenize, Line};
pub use self::sasl::SaslCapHandler;
pub use self::session::{Action, Session};
pub use self::state::{Registration, RegistrationAction, RegistrationState};

#[cfg(feature = "runtime")]
pub use self::client::Client;
#[cfg(feature = "runtime")]
pub use self::transport::{LineCodec, MAX_INBOUND_LINE_LEN};
