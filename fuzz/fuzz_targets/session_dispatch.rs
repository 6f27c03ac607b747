//! Fuzz target for the dispatcher
//!
//! Splits the input into lines and feeds them to a registered session. The
//! store must stay consistent whatever the server says.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::{ClientConfig, DaoHandle, Session};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);

    let mut config = ClientConfig::new("irc.example.net", 6667, "bot");
    config.cap_enabled = false;
    let dao = DaoHandle::default();
    let mut session = Session::new(&config, dao.clone());
    let _ = session.start();
    let _ = session.handle_line(":irc.example.net 001 bot :Welcome");
    let _ = session.handle_line(":bot!b@host JOIN #fuzz");

    for line in input.lines() {
        let _ = session.handle_line(line);
        assert!(dao.lock().verify().is_ok());
    }
});
