#![allow(dead_code, missing_docs)]

use async_trait::async_trait;
use ftpgate::{
    Authorization, Config, EngineConfig, EngineError, ProtocolEngine, SessionHandle,
    auth::{AccountStore, MemoryAccountRepository, Pbkdf2Verifier},
    account::NewAccount,
    command::CommandToken,
    policy::Verdict,
};
use slog::Drain;
use std::{io::Cursor, net::SocketAddr, num::NonZeroU32, path::Path, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

pub fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

pub fn config() -> Config {
    Config::from_json(r#"{"ftp.url": "ftp://127.0.0.1:0", "ftp.failed_login_delay_ms": 0, "ftp.greeting": "Welcome test"}"#).unwrap()
}

pub async fn store_with_alice(home: &Path) -> AccountStore {
    let store = AccountStore::new(Arc::new(MemoryAccountRepository::new()))
        .verifier(Arc::new(Pbkdf2Verifier::with_iterations(NonZeroU32::new(1000).unwrap())))
        .logger(logger());
    store
        .create(NewAccount {
            username: "alice1234".to_string(),
            password: "longenoughpw".to_string(),
            home_directory: home.to_string_lossy().into_owned(),
            quota: 0,
            ratio: 0,
            driver: None,
            permissions: Some(vec!["STOR".to_string(), "RETR".to_string(), "!DELE".to_string()]),
        })
        .await
        .unwrap();
    store
}

/// A line protocol standing in for FTP: `USER`, `PASS`, `QUIT` and `<TOKEN> <path> [data]`.
#[derive(Debug)]
pub struct LineEngine {
    config: EngineConfig,
}

pub fn line_engine(config: EngineConfig) -> Result<Arc<dyn ProtocolEngine>, EngineError> {
    Ok(Arc::new(LineEngine { config }))
}

impl LineEngine {
    async fn command(&self, session: &SessionHandle, token: CommandToken, path: &str, data: &str) -> String {
        let fs = match session.filesystem_for(token, path).await {
            Ok(fs) => fs,
            Err(Verdict::NotLoggedIn) => return "530 Please login".to_string(),
            Err(_) => return format!("550 {token} not permitted"),
        };
        let path = Path::new(path);
        match token {
            CommandToken::Stor => match fs.put(Box::new(Cursor::new(data.as_bytes().to_vec())), path, 0).await {
                Ok(n) => format!("226 {n}"),
                Err(e) => format!("451 {e}"),
            },
            CommandToken::Retr => match fs.get(path, 0).await {
                Ok(mut reader) => {
                    let mut content = String::new();
                    match reader.read_to_string(&mut content).await {
                        Ok(_) => format!("226 {content}"),
                        Err(e) => format!("451 {e}"),
                    }
                }
                Err(e) => format!("550 {e}"),
            },
            CommandToken::Dele => match fs.del(path).await {
                Ok(()) => "250 deleted".to_string(),
                Err(e) => format!("550 {e}"),
            },
            _ => "200 ok".to_string(),
        }
    }
}

#[async_trait]
impl ProtocolEngine for LineEngine {
    async fn serve(&self, stream: TcpStream, session: SessionHandle) -> Result<(), EngineError> {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let tls = if self.config.tls.is_some() { " (TLS)" } else { "" };
        write.write_all(format!("220 {}{}\n", self.config.greeting, tls).as_bytes()).await?;

        let mut username = String::new();
        while let Some(line) = lines.next_line().await? {
            let mut parts = line.splitn(3, ' ');
            let verb = parts.next().unwrap_or_default();
            let arg = parts.next().unwrap_or_default();
            let rest = parts.next().unwrap_or_default();
            let reply = match verb {
                "USER" => {
                    username = arg.to_string();
                    "331 Password required".to_string()
                }
                "PASS" => match session.login(&username, arg.into()).await {
                    Ok(Authorization { deny_list, .. }) => {
                        let denied: Vec<&str> = deny_list.iter().map(|t| t.as_str()).collect();
                        format!("230 deny={}", denied.join(","))
                    }
                    Err(e) => format!("530 {e}"),
                },
                "QUIT" => {
                    write.write_all(b"221 Bye\n").await?;
                    break;
                }
                other => match other.parse::<CommandToken>() {
                    Ok(token) => self.command(&session, token, arg, rest).await,
                    Err(_) => "500 unknown command".to_string(),
                },
            };
            write.write_all(format!("{reply}\n").as_bytes()).await?;
        }
        Ok(())
    }
}

pub struct Client {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    write: tokio::net::tcp::OwnedWriteHalf,
    pub greeting: String,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Client {
        let (read, write) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(read).lines();
        let greeting = lines.next_line().await.unwrap().unwrap();
        Client { lines, write, greeting }
    }

    pub async fn send(&mut self, line: &str) -> String {
        self.write.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.lines.next_line()).await.unwrap().unwrap().unwrap()
    }

    pub async fn login(&mut self, username: &str, password: &str) -> String {
        assert_eq!(self.send(&format!("USER {username}")).await, "331 Password required");
        self.send(&format!("PASS {password}")).await
    }
}

/// Polls `check` until it holds or a second has passed.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
