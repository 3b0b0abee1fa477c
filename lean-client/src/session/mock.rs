//! Scripted stand-in for `lean --server` over in-memory pipes

use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use lean_protocol::{Request, ServerCodec};
use serde_json::{json, Value};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

const PIPE_CAPACITY: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One step of a mock server script
pub enum Step {
    /// Read one request and compare it, `seq_num` included
    Expect(Value),
    /// Assert that no request arrives for this long
    ExpectNothing(Duration),
    /// Write one JSON line
    Send(Value),
    /// Write raw bytes as they are
    SendRaw(Vec<u8>),
    /// Read `n` search requests, then answer them in reverse order with a
    /// single result whose text is the query
    EchoSearches(usize),
    /// Close server output
    Close,
}

pub struct MockServer {
    handle: JoinHandle<()>,
}

/// Client ends of the pipes: read server output, write server input
pub struct ClientEnds {
    pub reader: DuplexStream,
    pub writer: DuplexStream,
}

impl MockServer {
    pub fn spawn(script: Vec<Step>) -> (Self, ClientEnds) {
        let (client_writer, server_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (server_writer, client_reader) = tokio::io::duplex(PIPE_CAPACITY);

        let handle = tokio::spawn(run(script, server_reader, server_writer));
        let ends = ClientEnds {
            reader: client_reader,
            writer: client_writer,
        };
        (Self { handle }, ends)
    }

    /// Wait for the script to finish and the client to hang up
    ///
    /// Panics raised inside the script are re-raised here.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            std::panic::resume_unwind(e.into_panic());
        }
    }
}

async fn run(script: Vec<Step>, input: DuplexStream, mut output: DuplexStream) {
    let mut requests = FramedRead::new(input, ServerCodec::new());

    for step in script {
        match step {
            Step::Expect(expected) => {
                let request = next_request(&mut requests).await;
                assert_eq!(request_json(&request), expected, "unexpected request");
            }
            Step::ExpectNothing(duration) => {
                if let Ok(Some(request)) = tokio::time::timeout(duration, requests.next()).await {
                    panic!("expected no request, got {:?}", request);
                }
            }
            Step::Send(value) => write_line(&mut output, &value).await,
            Step::SendRaw(bytes) => {
                output.write_all(&bytes).await.unwrap();
                output.flush().await.unwrap();
            }
            Step::EchoSearches(count) => {
                let mut seen = HashSet::new();
                let mut batch = Vec::new();
                for _ in 0..count {
                    let request = next_request(&mut requests).await;
                    assert!(seen.insert(request.seq_num), "seq_num {} reused", request.seq_num);
                    batch.push(request);
                }
                for request in batch.into_iter().rev() {
                    let query = request_json(&request)["query"].clone();
                    let reply = json!({
                        "response": "ok",
                        "seq_num": request.seq_num,
                        "results": [{"text": query, "type": "Prop"}],
                    });
                    write_line(&mut output, &reply).await;
                }
            }
            Step::Close => {
                output.shutdown().await.unwrap();
            }
        }
    }

    // Keep output open until the client drops its end of the input pipe
    if let Some(request) = requests.next().await {
        panic!("request after end of script: {:?}", request);
    }
}

async fn next_request(requests: &mut FramedRead<DuplexStream, ServerCodec>) -> Request {
    match tokio::time::timeout(REQUEST_TIMEOUT, requests.next()).await {
        Ok(Some(Ok(request))) => request,
        Ok(Some(Err(e))) => panic!("client sent an undecodable line: {}", e),
        Ok(None) => panic!("client closed its input"),
        Err(_) => panic!("timed out waiting for a request"),
    }
}

fn request_json(request: &Request) -> Value {
    serde_json::from_str(&request.to_json().unwrap()).unwrap()
}

async fn write_line(output: &mut DuplexStream, value: &Value) {
    let mut line = serde_json::to_vec(value).unwrap();
    line.push(b'\n');
    output.write_all(&line).await.unwrap();
    output.flush().await.unwrap();
}
