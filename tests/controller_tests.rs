use std::sync::{Arc, Mutex};
use std::time::Duration;

use nanofactory::adapters::AsciiTcpAdapter;
use nanofactory::devices::{Aerotech3200, ControllerSettings};
use nanofactory::domain::constants::{ProgrammingMode, VelocityMode, WaitMode};
use nanofactory::ports::ControllerPort;
use nanofactory::DomainError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// What the fake controller does with one received line
enum Action {
    Reply(&'static str),
    /// Reply after a delay in milliseconds
    Delayed(u64, &'static str),
    /// Write without terminator, then close
    Partial(&'static str),
    Close,
}

/// Minimal stand-in for the A3200 ASCII interface
struct FakeController {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
}

fn reply(line: &str) -> Action {
    if line.starts_with("~STATUS") {
        Action::Reply("%1.5 2.5 -0.25\n")
    } else if line.starts_with("~LASTERROR") {
        Action::Reply("%Axis fault on X\n")
    } else if line.starts_with("~VERSION") {
        Action::Reply("%4.9.1.2\n")
    } else if line == "FAULTY" {
        Action::Reply("#\n")
    } else if line == "GARBAGE" {
        Action::Reply("!\n")
    } else if line == "SLOW" {
        Action::Delayed(300, "%slow-answer\n")
    } else if line == "FAST" {
        Action::Reply("%answer-to-FAST\n")
    } else if line == "UNTERMINATED" {
        Action::Partial("%no-newline")
    } else if line == "HANGUP" {
        Action::Close
    } else {
        Action::Reply("%\n")
    }
}

impl FakeController {
    /// Accepts any number of connections, one line at a time each
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let (reader, mut writer) = socket.into_split();
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        log.lock().unwrap().push(line.clone());
                        let text = match reply(&line) {
                            Action::Reply(text) => text,
                            Action::Delayed(ms, text) => {
                                tokio::time::sleep(Duration::from_millis(ms)).await;
                                text
                            }
                            Action::Partial(text) => {
                                let _ = writer.write_all(text.as_bytes()).await;
                                break;
                            }
                            Action::Close => break,
                        };
                        if writer.write_all(text.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { port, received }
    }

    fn adapter(&self) -> Arc<AsciiTcpAdapter> {
        self.adapter_with_timeout(Duration::from_secs(2))
    }

    fn adapter_with_timeout(&self, timeout: Duration) -> Arc<AsciiTcpAdapter> {
        Arc::new(AsciiTcpAdapter::new("127.0.0.1", self.port, timeout))
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_adapter_success_and_history() {
    let fake = FakeController::start().await;
    let adapter = fake.adapter();
    adapter.connect().await.unwrap();
    assert!(adapter.is_connected().await);

    assert_eq!(adapter.send("ENABLE X Y Z").await.unwrap(), "");
    assert_eq!(adapter.send("~VERSION").await.unwrap(), "4.9.1.2");

    let history = adapter.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].data.as_deref(), Some("4.9.1.2"));
    assert!(history[1].ping_ms().is_some());

    adapter.close().await.unwrap();
    assert!(!adapter.is_connected().await);
    assert_eq!(fake.received(), vec!["ENABLE X Y Z", "~VERSION"]);
}

#[tokio::test]
async fn test_adapter_invalid_syntax() {
    let fake = FakeController::start().await;
    let adapter = fake.adapter();
    adapter.connect().await.unwrap();

    let err = adapter.send("GARBAGE").await.unwrap_err();
    assert_eq!(
        err,
        DomainError::InvalidSyntax {
            command: "GARBAGE".to_string()
        }
    );
    assert_eq!(adapter.history().await.len(), 1);
}

#[tokio::test]
async fn test_adapter_fault_asks_last_error() {
    let fake = FakeController::start().await;
    let adapter = fake.adapter();
    adapter.connect().await.unwrap();

    match adapter.send("FAULTY").await.unwrap_err() {
        DomainError::ControllerFault { command, reason } => {
            assert_eq!(command, "FAULTY");
            assert_eq!(reason, "Axis fault on X");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let history = adapter.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].error.as_deref(), Some("Axis fault on X"));
    assert_eq!(fake.received(), vec!["FAULTY", "~LASTERROR"]);
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let adapter = AsciiTcpAdapter::new("127.0.0.1", port, Duration::from_millis(500));
    assert!(adapter.connect().await.is_err());
    assert!(!adapter.is_connected().await);
}

#[tokio::test]
async fn test_controller_initialize_and_position() {
    let fake = FakeController::start().await;
    let port = fake.adapter();
    let mut controller = Aerotech3200::new(port, ControllerSettings::default());
    controller.connect().await.unwrap();

    controller.initialize().await.unwrap();
    assert_eq!(controller.programming_mode(), Some(ProgrammingMode::Absolute));
    assert_eq!(controller.velocity_mode(), Some(VelocityMode::On));
    assert_eq!(controller.wait_mode(), Some(WaitMode::Auto));

    let position = controller.xyz().await.unwrap();
    assert_eq!(position.x, 1.5);
    assert_eq!(position.y, 2.5);
    assert_eq!(position.z, -0.25);

    assert_eq!(controller.version().await.unwrap().to_string(), "4.9.1.2");
    // Cached after the first query
    controller.version().await.unwrap();

    controller.close().await.unwrap();
    let received = fake.received();
    assert_eq!(&received[..3], &["ABSOLUTE", "VELOCITY ON", "WAIT MODE AUTO"]);
    assert!(received[3].starts_with("~STATUS"));
    assert_eq!(received.iter().filter(|l| *l == "~VERSION").count(), 1);
}

#[tokio::test]
async fn test_late_reply_is_not_taken_for_next_answer() {
    let fake = FakeController::start().await;
    let adapter = fake.adapter_with_timeout(Duration::from_millis(100));
    adapter.connect().await.unwrap();

    assert!(matches!(
        adapter.send("SLOW").await.unwrap_err(),
        DomainError::Timeout(_)
    ));
    assert!(!adapter.is_connected().await);
    assert_eq!(adapter.send("FAST").await.unwrap_err(), DomainError::NotConnected);

    // A fresh connection starts in step again
    adapter.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(adapter.send("FAST").await.unwrap(), "answer-to-FAST");

    let history = adapter.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].command.trim_end(), "SLOW");
    assert!(!history[0].has_response());
    assert!(history[0].error.as_deref().unwrap().contains("No response"));
    assert_eq!(history[1].data.as_deref(), Some("answer-to-FAST"));
}

#[tokio::test]
async fn test_connection_closed_without_reply() {
    let fake = FakeController::start().await;
    let adapter = fake.adapter();
    adapter.connect().await.unwrap();

    assert!(matches!(
        adapter.send("HANGUP").await.unwrap_err(),
        DomainError::Protocol(_)
    ));
    assert!(!adapter.is_connected().await);

    let history = adapter.history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].error.is_some());
}

#[tokio::test]
async fn test_unterminated_reply_ends_with_stream() {
    let fake = FakeController::start().await;
    let adapter = fake.adapter();
    adapter.connect().await.unwrap();

    assert_eq!(adapter.send("UNTERMINATED").await.unwrap(), "no-newline");
    assert_eq!(fake.received(), vec!["UNTERMINATED"]);
}
