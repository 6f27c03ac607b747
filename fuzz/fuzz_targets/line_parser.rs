//! Fuzz target for line parsing
//!
//! Feeds arbitrary input to the tokenizer, the line parser and the channel
//! mode parser. None of them may panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 8704 {
            return;
        }

        let _ = slirc_client::tokenize(input);
        if let Ok(line) = slirc_client::Line::parse(input) {
            let _ = line.numeric();
            let _ = slirc_client::mode::parse_channel_modes(input, &line.params);
        }
        let _ = slirc_client::Ctcp::parse(input);
    }
});
