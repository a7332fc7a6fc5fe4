//! # CLI Layer
//!
//! The binary is a thin client of the `moin` library. This layer is the
//! **only** place that:
//! - Parses arguments
//! - Prompts the user
//! - Writes to stdout/stderr
//! - Decides the exit status (via `main.rs`)
//!
//! ## Structure
//!
//! - `run()`: Parses arguments, sets up logging and the config store, dispatches
//! - `handle_*()`: Per-command handlers that call the library and print the result
//! - `render`: Output formatting, returned as strings
//! - `prompt`: Interactive input behind the `Prompter` trait

use super::prompt::{Prompter, TerminalPrompter};
use super::render::{
    render_history, render_page_list, render_recent, render_search_results, render_servers,
};
use super::setup::{Cli, Commands};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use moin::auth::{authenticate, connection_options, AuthRequest};
use moin::client::WikiClient;
use moin::config::ConfigStore;
use moin::error::{MoinError, Result};
use moin::logging;
use moin::model::{WikiUrl, RPC_ACTION_SUFFIX};
use moin::rpc::http::HttpTransport;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let store = match &cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::from_home()?,
    };

    match cli.command {
        Commands::Auth => handle_auth(&store, &mut TerminalPrompter::new()),
        Commands::Get {
            pagename,
            server,
            revision,
            history,
        } => handle_get(&store, server.as_deref(), &pagename, revision, history),
        Commands::Put {
            pagename,
            content,
            file,
            server,
        } => handle_put(&store, server.as_deref(), &pagename, content, file),
        Commands::List { server } => handle_list(&store, server.as_deref()),
        Commands::Search { query, server } => handle_search(&store, server.as_deref(), &query),
        Commands::Recent { days, server } => handle_recent(&store, server.as_deref(), days),
        Commands::Servers => handle_servers(&store),
    }
}

fn handle_auth(store: &ConfigStore, prompter: &mut impl Prompter) -> Result<()> {
    let request = collect_auth_request(prompter)?;
    let endpoint = format!("{}{}", WikiUrl::parse(&request.url)?, RPC_ACTION_SUFFIX);
    let config = store.load_or_default(&request.alias)?;
    let (timeout, verify_ssl) = connection_options(&config, &request.alias);
    let client =
        WikiClient::with_transport(HttpTransport::with_options(endpoint, timeout, verify_ssl)?);

    let server = authenticate(store, &client, &request)?;
    println!(
        "{}",
        format!(
            "Authentication successful. Token for '{}' ({}) saved to {}",
            request.alias,
            server.url,
            store.config_path().display()
        )
        .green()
    );
    Ok(())
}

fn collect_auth_request(prompter: &mut impl Prompter) -> Result<AuthRequest> {
    let alias = required(prompter.input("Server alias")?, "server alias")?;
    let url = required(prompter.input("Wiki URL")?, "wiki URL")?;
    let username = required(prompter.input("Username")?, "username")?;
    let password = prompter.secret("Password")?;
    Ok(AuthRequest {
        alias,
        url,
        username,
        password,
    })
}

fn required(answer: String, what: &str) -> Result<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(MoinError::Validation(format!("{} must not be empty", what)));
    }
    Ok(answer.to_string())
}

fn handle_get(
    store: &ConfigStore,
    server: Option<&str>,
    pagename: &str,
    revision: Option<u32>,
    history: bool,
) -> Result<()> {
    let client = WikiClient::from_config(store, server)?;
    if history {
        let revisions = client.get_page_history(pagename);
        print!("{}", render_history(pagename, &revisions, Utc::now()));
        return Ok(());
    }

    let content = client.get_page(pagename, revision)?;
    if content.ends_with('\n') {
        print!("{}", content);
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn handle_put(
    store: &ConfigStore,
    server: Option<&str>,
    pagename: &str,
    content: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let content = read_content(content, file.as_deref())?;
    let client = WikiClient::from_config(store, server)?;
    if client.put_page(pagename, &content, None, server)? {
        println!("{}", format!("Successfully updated {}", pagename).green());
        Ok(())
    } else {
        Err(MoinError::WriteRejected {
            page: pagename.to_string(),
        })
    }
}

/// Page content from the argument, a file, or piped stdin, in that order.
fn read_content(content: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content);
    }
    match file {
        Some(path) if path.as_os_str() == "-" => read_stdin(),
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None if !std::io::stdin().is_terminal() => piped_content(read_stdin()?),
        None => Err(MoinError::Validation(
            "no content given; pass it as an argument, with --file, or on stdin".to_string(),
        )),
    }
}

/// Implicit stdin must carry text; an empty pipe would blank the page.
/// `--file -` still sends whatever stdin holds.
fn piped_content(piped: String) -> Result<String> {
    if piped.is_empty() {
        return Err(MoinError::Validation(
            "stdin was empty; pass content as an argument, or use --file - to send it as is"
                .to_string(),
        ));
    }
    Ok(piped)
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn handle_list(store: &ConfigStore, server: Option<&str>) -> Result<()> {
    let client = WikiClient::from_config(store, server)?;
    let pages = client.get_all_pages()?;
    print!("{}", render_page_list(&pages));
    Ok(())
}

fn handle_search(store: &ConfigStore, server: Option<&str>, query: &str) -> Result<()> {
    let client = WikiClient::from_config(store, server)?;
    let pages = client.search_pages(query)?;
    print!("{}", render_search_results(query, &pages));
    Ok(())
}

fn handle_recent(store: &ConfigStore, server: Option<&str>, days: u32) -> Result<()> {
    let client = WikiClient::from_config(store, server)?;
    let pages = client.get_recent_changes(days)?;
    print!("{}", render_recent(days, &pages));
    Ok(())
}

fn handle_servers(store: &ConfigStore) -> Result<()> {
    let config = store.load_config()?;
    print!("{}", render_servers(&config));
    Ok(())
}
