//! Benchmarks for line parsing, dispatch and outbound formatting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slirc_client::{tokenize, ClientConfig, Command, DaoHandle, Line, Session};

/// Simple PING line
const SIMPLE_LINE: &str = "PING :irc.example.com";

/// Line with a source
const SOURCE_LINE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Line with IRCv3 tags
const TAGGED_LINE: &str = "@time=2023-01-01T00:00:00.000Z;msgid=abc123;+example/tag=value :nick!user@host PRIVMSG #channel :Hello with tags!";

/// NAMES reply with status prefixes
const NAMES_LINE: &str = ":irc.server.net 353 bot = #channel :@alice +bob carol ~dave %erin frank";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Parsing");

    for (name, raw) in [
        ("simple", SIMPLE_LINE),
        ("source", SOURCE_LINE),
        ("tagged", TAGGED_LINE),
        ("names", NAMES_LINE),
    ] {
        group.bench_with_input(BenchmarkId::new("tokenize", name), raw, |b, s| {
            b.iter(|| black_box(tokenize(black_box(s))))
        });
        group.bench_with_input(BenchmarkId::new("parse", name), raw, |b, s| {
            b.iter(|| black_box(Line::parse(black_box(s)).unwrap()))
        });
    }

    group.finish();
}

fn registered_session() -> Session {
    let mut config = ClientConfig::new("irc.server.net", 6667, "bot");
    config.cap_enabled = false;
    let mut session = Session::new(&config, DaoHandle::default());
    let _ = session.start();
    let _ = session.handle_line(":irc.server.net 001 bot :Welcome");
    let _ = session.handle_line(":bot!b@host JOIN #channel");
    let _ = session.handle_line(NAMES_LINE);
    session
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Dispatch");

    group.bench_function("channel_message", |b| {
        let mut session = registered_session();
        b.iter(|| black_box(session.handle_line(black_box(SOURCE_LINE))))
    });

    group.bench_function("join_part", |b| {
        let mut session = registered_session();
        b.iter(|| {
            let _ = session.handle_line(":guest!g@host JOIN #channel");
            black_box(session.handle_line(":guest!g@host PART #channel :bye"))
        })
    });

    group.bench_function("op_deop", |b| {
        let mut session = registered_session();
        b.iter(|| {
            let _ = session.handle_line(":alice!a@host MODE #channel +o carol");
            black_box(session.handle_line(":alice!a@host MODE #channel -o carol"))
        })
    });

    group.finish();
}

fn benchmark_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("Formatting");
    let formatter = ClientConfig::default().line_formatter();
    let long_text = "lorem ipsum dolor sit amet ".repeat(60);

    group.bench_function("privmsg_short", |b| {
        let command = Command::privmsg("#channel", "Hello, world!");
        b.iter(|| black_box(formatter.format(black_box(&command))))
    });

    group.bench_function("privmsg_split", |b| {
        let command = Command::privmsg("#channel", &long_text);
        b.iter(|| black_box(formatter.format(black_box(&command))))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_dispatch,
    benchmark_formatting,
);

criterion_main!(benches);
