//! Run one command on a switch over its telnet console.
//!
//! Connects, logs in, runs the command at the privileged shell prompt, and
//! prints the captured output.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_command -- --host 192.0.2.10 --user admin --password secret --command "show clock"
//! ```
//!
//! Set `RUST_LOG=debug` for verbose session logging.

use std::env;

use reflash::{Connector, Session, SessionConfig, TelnetConnector};
use secrecy::SecretString;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}...", args.host);
    let connector = TelnetConnector::default();
    let transport = connector.connect(&args.host).await?;

    let mut config = SessionConfig::new(&args.host)
        .with_label("demo")
        .with_username(&args.user);
    if let Some(password) = &args.password {
        config = config.with_password(SecretString::from(password.as_str()));
    }

    let mut session = Session::open(transport, config).await?;
    println!("Connected!");

    println!("\nExecuting: {}", args.command);
    println!("{}", "-".repeat(50));
    let output = session.run_command(&args.command, false).await?;
    println!("{}", output.trim());
    println!("{}", "-".repeat(50));

    println!("Transcript written to {}", session.transcript_path().display());
    session.close().await?;
    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    user: String,
    password: Option<String>,
    command: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut user = "admin".to_string();
        let mut password = None;
        let mut command = "show clock".to_string();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--command" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        command = args[i].clone();
                    }
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Args {
            host,
            user,
            password,
            command,
        }
    }
}
