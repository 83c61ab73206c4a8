#![allow(dead_code)]

use std::io::{BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use redis::{Parser, Value};
use relationship_store::{MemoryStore, RelationshipStore, StoreConfig};
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness. Set `RUST_LOG=debug`
/// to see connection events.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Relationship layer over a fresh in-process store.
pub fn memory_relationships() -> RelationshipStore<MemoryStore> {
    RelationshipStore::new(MemoryStore::new())
}

/// A scripted RESP server on an ephemeral port.
///
/// Each session serves one accepted connection: every command received gets
/// the next raw reply of that session, and the connection is closed once the
/// session's replies run out.
pub struct FakeServer {
    pub port: u16,
    handle: JoinHandle<Vec<Vec<String>>>,
}

impl FakeServer {
    pub fn start<S: Into<String>>(replies: Vec<S>) -> Self {
        Self::start_sessions(vec![replies])
    }

    pub fn start_sessions<S: Into<String>>(sessions: Vec<Vec<S>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let sessions: Vec<Vec<String>> = sessions
            .into_iter()
            .map(|replies| replies.into_iter().map(Into::into).collect())
            .collect();

        let handle = thread::spawn(move || {
            let mut received = Vec::new();

            for replies in sessions {
                let (stream, _) = listener.accept().unwrap();
                let mut writer = stream.try_clone().unwrap();
                let mut reader = BufReader::new(stream);
                let mut parser = Parser::new();

                for reply in replies {
                    let Ok(command) = parser.parse_value(&mut reader) else {
                        break;
                    };
                    received.push(command_arguments(command));

                    if writer.write_all(reply.as_bytes()).is_err() {
                        break;
                    }
                }
            }

            received
        });

        Self { port, handle }
    }

    pub fn config(&self) -> StoreConfig {
        StoreConfig::builder()
            .host("127.0.0.1")
            .port(self.port)
            .connection_retries(0)
            .build()
            .unwrap()
    }

    /// Waits for every session to finish and returns the commands received,
    /// each as its list of arguments.
    pub async fn received(self) -> Vec<Vec<String>> {
        let handle = self.handle;
        tokio::task::spawn_blocking(move || handle.join().unwrap())
            .await
            .unwrap()
    }
}

fn command_arguments(command: Value) -> Vec<String> {
    match command {
        Value::Array(elements) => elements
            .into_iter()
            .map(|element| match element {
                Value::BulkString(argument) => String::from_utf8(argument).unwrap(),
                other => panic!("unexpected command element {:?}", other),
            })
            .collect(),
        other => panic!("unexpected command {:?}", other),
    }
}

pub fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}
