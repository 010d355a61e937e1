//! Helpers shared by the client and backup tests: a one-shot HTTP/1.1 server
//! that answers from a script, and a logger that keeps every record.

use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use log::{Level, LevelFilter, Log, Metadata, Record};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Answers the n-th connection with the n-th `(status, body)` pair, then
/// closes it. `{base}` in a body is replaced by the server's own address.
pub struct StubServer {
    pub base_address: String,
    heads: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(responses: &[(u16, &str)]) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_address = format!("http://{}", listener.local_addr().unwrap());
        let heads = Arc::new(Mutex::new(Vec::new()));

        let script: Vec<(u16, String)> = responses
            .iter()
            .map(|(status, body)| (*status, body.replace("{base}", &base_address)))
            .collect();
        let recorded = Arc::clone(&heads);
        tokio::spawn(async move {
            for (status, body) in script {
                let (mut socket, _) = listener.accept().await.unwrap();
                let head = read_request(&mut socket).await;
                recorded.lock().unwrap().push(head);

                let reply = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        StubServer {
            base_address,
            heads,
        }
    }

    /// First line of every request served so far.
    pub fn request_lines(&self) -> Vec<String> {
        self.heads
            .lock()
            .unwrap()
            .iter()
            .map(|head| head.lines().next().unwrap_or_default().to_string())
            .collect()
    }

    /// Request line and headers, lower-cased, of the n-th request.
    pub fn head(&self, n: usize) -> String {
        self.heads.lock().unwrap()[n].to_ascii_lowercase()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            if body_complete(&head, &buf[end + 4..]) {
                return head;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn body_complete(head: &str, body: &[u8]) -> bool {
    let head = head.to_ascii_lowercase();
    if head.contains("transfer-encoding: chunked") {
        return body.ends_with(b"0\r\n\r\n");
    }
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= length
}

/// Process-wide logger for tests. Records are tagged with the thread that
/// emitted them so each test only sees its own.
#[derive(Default)]
pub struct CapturedLog {
    records: Mutex<Vec<(String, Level, String)>>,
}

impl CapturedLog {
    pub fn install() -> &'static CapturedLog {
        static LOG: OnceLock<&'static CapturedLog> = OnceLock::new();
        LOG.get_or_init(|| {
            let log: &'static CapturedLog = Box::leak(Box::new(CapturedLog::default()));
            let _ = log::set_logger(log);
            log::set_max_level(LevelFilter::Trace);
            log
        })
    }

    /// Position to pass to `messages_since`.
    pub fn mark(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Messages logged at `level` by the calling thread after `mark`.
    pub fn messages_since(&self, mark: usize, level: Level) -> Vec<String> {
        let current = thread_name();
        self.records
            .lock()
            .unwrap()
            .iter()
            .skip(mark)
            .filter(|(thread, l, _)| *thread == current && *l == level)
            .map(|(_, _, message)| message.clone())
            .collect()
    }
}

impl Log for CapturedLog {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((thread_name(), record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn thread_name() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}
