use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "capp-logs")]
#[command(about = "Stream Capp and pod logs to WebSocket clients")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Kubeconfig context (defaults to the current context)
    #[arg(long)]
    pub context: Option<String>,

    /// Lines of history sent when a stream is opened
    #[arg(long, default_value_t = 10)]
    pub tail_lines: i64,

    /// Minimum interval between forwarded lines, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub throttle_ms: u64,

    /// Label key linking a pod to its parent Capp
    #[arg(long, default_value = "rcs.dana.io/parent-capp")]
    pub capp_label: String,

    /// Request header carrying the session token
    #[arg(long, default_value = "Sec-WebSocket-Protocol")]
    pub token_header: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
