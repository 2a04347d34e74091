//! Gmail bridge binary
//!
//! Runs the stdio tool server by default; subcommands drive the OAuth flow
//! and call the mail client directly from the command line.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use gmail_bridge::auth::{AuthServer, CredentialStore};
use gmail_bridge::config::Config;
use gmail_bridge::error::Result;
use gmail_bridge::gmail::client::GmailClient;
use gmail_bridge::mcp::server::ToolServer;

/// Gmail bridge
#[derive(Parser)]
#[command(name = "gmail-bridge")]
#[command(author, version, about = "Gmail tool server and CLI")]
struct Cli {
    /// Emit results as a JSON envelope instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Gmail (run this first)
    Auth,

    /// Run the stdio tool server (default)
    Serve,

    /// List recent emails from a label
    ListEmails {
        /// Maximum number of emails to return
        #[arg(long, default_value_t = 10)]
        max_results: u32,

        /// Label to list from
        #[arg(long, default_value = "INBOX")]
        label: String,
    },

    /// Search emails with Gmail query syntax
    Search {
        /// Search query (e.g. "from:someone is:unread")
        query: String,

        /// Maximum number of emails to return
        #[arg(long, default_value_t = 10)]
        max_results: u32,
    },

    /// Read a specific email
    Read {
        /// Email id
        id: String,
    },

    /// Send a plain-text email
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Message body
        #[arg(long)]
        body: String,

        /// CC recipients
        #[arg(long)]
        cc: Option<String>,

        /// BCC recipients
        #[arg(long)]
        bcc: Option<String>,
    },

    /// List all labels
    Labels,

    /// Show authentication status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for the transport
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new()?;
    let store = Arc::new(CredentialStore::new(&config));

    match cli.command {
        Some(Commands::Auth) => {
            let server = AuthServer::new(&config, store)?;
            server.authenticate_interactive().await?;
            eprintln!("Authentication completed successfully!");
        }
        Some(Commands::ListEmails { max_results, label }) => {
            let client = GmailClient::new(store);
            match client.list_emails(max_results, &label).await {
                Ok(emails) => {
                    if cli.json {
                        let count = emails.len();
                        print_json(json!({"success": true, "emails": emails, "count": count}));
                    } else {
                        for email in &emails {
                            println!("{}  {}  {}", email.id, email.from, email.subject);
                        }
                    }
                }
                Err(e) => fail(cli.json, e)?,
            }
        }
        Some(Commands::Search { query, max_results }) => {
            let client = GmailClient::new(store);
            match client.search_emails(&query, max_results).await {
                Ok(emails) => {
                    if cli.json {
                        let count = emails.len();
                        print_json(json!({"success": true, "emails": emails, "count": count}));
                    } else {
                        for email in &emails {
                            println!("{}  {}  {}", email.id, email.from, email.subject);
                        }
                    }
                }
                Err(e) => fail(cli.json, e)?,
            }
        }
        Some(Commands::Read { id }) => {
            let client = GmailClient::new(store);
            match client.read_email(&id).await {
                Ok(email) => {
                    if cli.json {
                        print_json(json!({"success": true, "email": email}));
                    } else {
                        println!("From: {}", email.from);
                        println!("Date: {}", email.date);
                        println!("Subject: {}", email.subject);
                        println!();
                        println!("{}", email.body);
                    }
                }
                Err(e) => fail(cli.json, e)?,
            }
        }
        Some(Commands::Send {
            to,
            subject,
            body,
            cc,
            bcc,
        }) => {
            let client = GmailClient::new(store);
            let message = gmail_bridge::gmail::mime::OutgoingMessage {
                to,
                subject,
                body,
                cc,
                bcc,
            };
            match client.send_email(&message).await {
                Ok(message_id) => {
                    if cli.json {
                        print_json(json!({"success": true, "message_id": message_id}));
                    } else {
                        println!("Email sent: {}", message_id);
                    }
                }
                Err(e) => fail(cli.json, e)?,
            }
        }
        Some(Commands::Labels) => {
            let client = GmailClient::new(store);
            match client.get_labels().await {
                Ok(labels) => {
                    if cli.json {
                        print_json(json!({"success": true, "labels": labels}));
                    } else {
                        for label in &labels {
                            println!("{}  {}", label.id, label.name);
                        }
                    }
                }
                Err(e) => fail(cli.json, e)?,
            }
        }
        Some(Commands::Status) => {
            let (authenticated, expires_at) = store.status().await;
            if cli.json {
                print_json(json!({
                    "success": true,
                    "authenticated": authenticated,
                    "expires_at": expires_at.map(|e| e.to_rfc3339()),
                }));
            } else if authenticated {
                match expires_at {
                    Some(expiry) => println!("Authenticated (token expires {})", expiry),
                    None => println!("Authenticated (no expiry recorded)"),
                }
            } else {
                println!("Not authenticated. Run 'gmail-bridge auth' first.");
            }
        }
        Some(Commands::Serve) | None => {
            run_server(&config, store).await?;
        }
    }

    Ok(())
}

/// Run the stdio tool server
async fn run_server(config: &Config, store: Arc<CredentialStore>) -> Result<()> {
    if !config.oauth_keys_exist() {
        eprintln!("Error: OAuth keys file not found.");
        eprintln!(
            "Please place gcp-oauth.keys.json in {}",
            config.config_dir.display()
        );
        std::process::exit(1);
    }

    if !store.is_authenticated().await {
        eprintln!("Error: Not authenticated. Please run 'gmail-bridge auth' first.");
        std::process::exit(1);
    }

    let gmail_client = Arc::new(GmailClient::new(store));

    let mut server = ToolServer::new(gmail_client);
    server.run_stdio().await?;

    Ok(())
}

fn print_json(value: serde_json::Value) {
    println!("{}", value);
}

/// Report a failed operation and exit non-zero
fn fail(json: bool, error: gmail_bridge::GmailBridgeError) -> Result<()> {
    if json {
        print_json(json!({"success": false, "error": error.to_string()}));
        std::process::exit(1);
    }
    Err(error)
}
