//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use command_gateway::admission::LoadWatcher;
use command_gateway::config::GatewayConfig;
use command_gateway::engine::{CommandDescriptor, DataType, Engine, EngineError, Invocation};
use command_gateway::http::HttpServer;
use command_gateway::lifecycle::Shutdown;
use command_gateway::tree::{self, Node};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};

/// What the engine saw for one invocation.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub command: String,
    pub input_format: String,
    pub output_format: String,
    pub parameters: serde_json::Value,
    pub input: Vec<u8>,
}

/// Engine with a fixed command table whose behaviour is chosen by command name.
pub struct ScriptedEngine {
    descriptors: Vec<CommandDescriptor>,
    calls: Mutex<Vec<Recorded>>,
    release: Notify,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        use DataType::{Binary, Structured, Tabular};
        let nothing = DataType::None;

        Arc::new(Self {
            descriptors: vec![
                CommandDescriptor::new("get", nothing, Structured),
                CommandDescriptor::new("set", Structured, nothing).volatile(),
                CommandDescriptor::new("create", nothing, Structured).volatile(),
                CommandDescriptor::new("echo", Binary, Binary).volatile(),
                CommandDescriptor::new("read", nothing, Tabular).heavy(),
                CommandDescriptor::new("hold", nothing, Structured),
                CommandDescriptor::new("fail", nothing, Structured),
                CommandDescriptor::new("panic", nothing, Structured),
                CommandDescriptor::new("stream_fail", nothing, Tabular),
                CommandDescriptor::new("big", nothing, Binary),
            ],
            calls: Mutex::new(Vec::new()),
            release: Notify::new(),
        })
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Recorded {
        self.calls().pop().expect("engine was not invoked")
    }

    /// Let one `hold` invocation finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn find_command_descriptor(&self, name: &str) -> Option<CommandDescriptor> {
        self.descriptors.iter().find(|d| d.name == name).cloned()
    }

    fn list_command_descriptors(&self) -> Vec<CommandDescriptor> {
        self.descriptors.clone()
    }

    fn is_format_registered(&self, name: &str) -> bool {
        ["json", "yson", "dsv"].contains(&name)
    }

    async fn execute(&self, invocation: Invocation) -> Result<(), EngineError> {
        let Invocation {
            command,
            mut input,
            input_format,
            output,
            output_format,
            parameters,
        } = invocation;

        let parameters_json = tree::encode(&Node::Map(parameters.clone()));

        if command == "echo" {
            while let Some(chunk) = input.read().await {
                if !output.write(chunk) {
                    break;
                }
            }
            output.finish();
            return Ok(());
        }

        let body = input.read_to_end().await;
        self.calls.lock().unwrap().push(Recorded {
            command: command.clone(),
            input_format: input_format.name().to_string(),
            output_format: output_format.name().to_string(),
            parameters: parameters_json.clone(),
            input: body,
        });

        match command.as_str() {
            "get" | "create" => {
                output.write(parameters_json.to_string());
            }
            "read" => {
                output.write("row\n");
            }
            "hold" => {
                self.release.notified().await;
                output.write("{}");
            }
            "fail" => {
                let status = parameters
                    .get("status")
                    .and_then(Node::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500);
                return Err(EngineError::new(status, "resolution failed").with_code(42));
            }
            "panic" => panic!("engine blew up"),
            "stream_fail" => {
                output.write("partial\n");
                tokio::time::sleep(Duration::from_millis(200)).await;
                return Err(EngineError::new(500, "lost the tablet"));
            }
            "big" => {
                for i in 0..64u8 {
                    output.write(vec![i; 64 * 1024]);
                }
            }
            _ => {}
        }
        output.finish();
        Ok(())
    }
}

/// A gateway serving on an ephemeral port until dropped.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub load: Arc<LoadWatcher>,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn spawn_gateway(config: GatewayConfig, engine: Arc<dyn Engine>) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, engine);
    let load = server.load_watcher();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        load,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let (status, body) = f().await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that returns a fixed 200 response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// Start a backend that answers 200 and reports each request head it saw.
pub async fn start_recording_backend() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let head = read_request_head(&mut socket).await;
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, rx)
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    head
}
