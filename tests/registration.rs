//! Registration and capability negotiation, driven line by line.

use slirc_client::line::Line;
use slirc_client::state::RegistrationConfig;
use slirc_client::{
    CapContext, CapHandler, Command, EnableCapHandler, Event, Registration, RegistrationAction,
    RegistrationError, RegistrationState,
};

fn config() -> RegistrationConfig {
    RegistrationConfig {
        nickname: "bot".to_string(),
        username: "bot".to_string(),
        realname: "Test Bot".to_string(),
        ..RegistrationConfig::default()
    }
}

fn feed(registration: &mut Registration, raw: &str) -> Vec<RegistrationAction> {
    registration.feed(&Line::parse(raw).unwrap())
}

fn sent(actions: &[RegistrationAction]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|a| match a {
            RegistrationAction::SendNow(cmd) => Some(cmd.to_string()),
            _ => None,
        })
        .collect()
}

/// Finishes when it sees a line whose command is `trigger`.
struct FinishOn {
    name: String,
    trigger: &'static str,
}

impl FinishOn {
    fn boxed(name: &str, trigger: &'static str) -> Box<dyn CapHandler> {
        Box::new(Self {
            name: name.to_string(),
            trigger,
        })
    }
}

impl CapHandler for FinishOn {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_ls(
        &mut self,
        _ctx: &mut CapContext<'_>,
        _caps: &[String],
    ) -> Result<bool, RegistrationError> {
        Ok(self.trigger == "LS")
    }

    fn handle_ack(
        &mut self,
        _ctx: &mut CapContext<'_>,
        _caps: &[String],
    ) -> Result<bool, RegistrationError> {
        Ok(self.trigger == "ACK")
    }

    fn handle_nak(
        &mut self,
        _ctx: &mut CapContext<'_>,
        _caps: &[String],
    ) -> Result<bool, RegistrationError> {
        Ok(self.trigger == "NAK")
    }

    fn handle_unknown(
        &mut self,
        _ctx: &mut CapContext<'_>,
        line: &Line,
    ) -> Result<bool, RegistrationError> {
        Ok(line.command == self.trigger)
    }
}

#[test]
fn test_cap_end_sent_once_after_last_handler() {
    let handlers = vec![
        FinishOn::boxed("ls", "LS"),
        FinishOn::boxed("ack", "ACK"),
        FinishOn::boxed("notice", "NOTICE"),
    ];
    let mut registration = Registration::new(config(), handlers);
    let _ = registration.start();

    let mut cap_ends = 0;
    let lines = [
        ":irc.example.net CAP * LS :multi-prefix sasl",
        ":irc.example.net CAP * ACK :multi-prefix",
        ":irc.example.net NOTICE * :*** Looking up your hostname",
        ":irc.example.net NOTICE * :*** Found your hostname",
        ":irc.example.net CAP * ACK :sasl",
    ];
    for (i, raw) in lines.iter().enumerate() {
        let actions = feed(&mut registration, raw);
        let ends = sent(&actions).iter().filter(|l| *l == "CAP END").count();
        if i == 2 {
            assert_eq!(ends, 1, "CAP END should follow the last handler");
        }
        cap_ends += ends;
    }

    assert_eq!(cap_ends, 1);
    assert!(registration.cap_end_sent());
    // ACKs after CAP END do not extend the enabled set.
    assert_eq!(registration.enabled_caps(), ["multi-prefix".to_string()]);
}

#[test]
fn test_enable_handler_requests_offered_cap() {
    let handlers: Vec<Box<dyn CapHandler>> = vec![
        Box::new(EnableCapHandler::new("multi-prefix")),
        Box::new(EnableCapHandler::new("away-notify")),
    ];
    let mut registration = Registration::new(config(), handlers);
    assert_eq!(
        sent(&registration.start()),
        vec!["CAP LS 302", "NICK bot", "USER bot 0 * :Test Bot"]
    );

    let actions = feed(
        &mut registration,
        ":irc.example.net CAP * LS :multi-prefix extended-join",
    );
    assert_eq!(sent(&actions), vec!["CAP REQ :multi-prefix"]);

    let actions = feed(&mut registration, ":irc.example.net CAP bot ACK :multi-prefix");
    assert_eq!(sent(&actions), vec!["CAP END"]);
    assert_eq!(registration.state(), RegistrationState::PreAuth);

    let actions = feed(&mut registration, ":irc.example.net 001 bot :Welcome");
    assert!(matches!(
        &actions[..],
        [RegistrationAction::Complete { nick }] if nick == "bot"
    ));
    assert_eq!(registration.state(), RegistrationState::Authenticated);
}

#[test]
fn test_required_cap_refused_fails() {
    let handlers: Vec<Box<dyn CapHandler>> = vec![Box::new(EnableCapHandler::required("sasl"))];
    let mut registration = Registration::new(config(), handlers);
    let _ = registration.start();

    let actions = feed(&mut registration, ":irc.example.net CAP * LS :multi-prefix");
    assert!(matches!(
        actions.last(),
        Some(RegistrationAction::Fail(RegistrationError::Capability { .. }))
    ));
    assert!(sent(&actions).is_empty());
}

#[test]
fn test_nick_in_use_retries_with_suffix() {
    let mut cfg = config();
    cfg.auto_nick_change = true;
    cfg.cap_enabled = false;
    let mut registration = Registration::new(cfg, Vec::new());
    let _ = registration.start();

    let actions = feed(&mut registration, ":irc.example.net 433 * bot :Nickname is already in use");
    assert_eq!(sent(&actions), vec!["NICK bot1"]);
    assert!(actions.iter().any(|a| matches!(
        a,
        RegistrationAction::Emit(Event::NickAlreadyInUse { auto_new_nick: Some(n), .. }) if n == "bot1"
    )));

    let actions = feed(&mut registration, ":irc.example.net 433 * bot1 :Nickname is already in use");
    assert_eq!(sent(&actions), vec!["NICK bot2"]);

    let actions = feed(&mut registration, ":irc.example.net 001 bot2 :Welcome");
    assert!(matches!(&actions[..], [RegistrationAction::Complete { nick }] if nick == "bot2"));
    assert_eq!(registration.nick(), "bot2");
}

#[test]
fn test_error_numeric_before_welcome_is_fatal() {
    let mut registration = Registration::new(config(), Vec::new());
    let _ = registration.start();
    let actions = feed(&mut registration, ":irc.example.net 451 * :You have not registered");
    assert!(matches!(
        &actions[..],
        [RegistrationAction::Fail(RegistrationError::Rejected { code: 451, .. })]
    ));
}

#[test]
fn test_lines_after_welcome_are_ignored() {
    let mut cfg = config();
    cfg.cap_enabled = false;
    let mut registration = Registration::new(cfg, Vec::new());
    let _ = registration.start();
    let _ = feed(&mut registration, ":irc.example.net 001 bot :Welcome");
    assert!(feed(&mut registration, ":irc.example.net 433 * bot :in use").is_empty());
    assert_eq!(Command::CapEnd.to_string(), "CAP END");
}
