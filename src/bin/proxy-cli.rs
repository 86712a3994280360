use clap::{Parser, Subcommand};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Check a running dual-protocol proxy", long_about = None)]
struct Cli {
    /// Proxy address (host:port).
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Give up after this many seconds.
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the HTTP health endpoint
    Health {
        #[arg(short, long, default_value = "/health")]
        path: String,
    },
    /// Send a Redis PING through the proxy port
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Health { path } => {
            let client = reqwest::Client::builder().timeout(timeout).build()?;
            let res = client
                .get(format!("http://{}{}", cli.addr, path))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Ping => {
            let reply = tokio::time::timeout(timeout, ping(&cli.addr)).await??;
            if reply != "+PONG" {
                return Err(format!("unexpected reply: {reply}").into());
            }
            println!("PONG");
        }
    }

    Ok(())
}

/// Send an inline-array PING and return the first reply line.
async fn ping(addr: &str) -> Result<String, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(b"*1\r\n$4\r\nPING\r\n").await?;

    let mut reply = Vec::new();
    let mut buf = [0u8; 64];
    while !reply.ends_with(b"\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err("connection closed before reply".into());
        }
        reply.extend_from_slice(&buf[..n]);
    }

    Ok(String::from_utf8_lossy(&reply).trim_end().to_string())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    println!("{}", status);

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        return Err(format!("proxy returned status {}", status).into());
    }
    Ok(())
}
