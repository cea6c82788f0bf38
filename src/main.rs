use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay::RelayClient;
use relay::config::RelayConfig;
use relay::context::UploadedContext;
use relay::session::{ContextPolicy, Orchestrator, SessionState};

const HELP: &str = "commands:
  /upload <path>    attach a .csv or .txt file to the session
  /preview <text>   show the payload that would be sent, without sending
  /image            render the diagram in the last assistant reply
  /reset            clear turns and uploaded context
  /quit             exit";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RelayConfig::from_env()?;
    let client = RelayClient::new(&config.endpoint, &config.api_key, config.timeout)?;
    let orchestrator = Orchestrator::new(client);
    let mut session = SessionState::new(ContextPolicy::EveryMessage);

    info!(port = config.port, endpoint = config.endpoint.as_str(), "relay ready");
    println!("{}", HELP);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input == "/quit" {
            break;
        } else if input == "/help" {
            println!("{}", HELP);
        } else if input == "/reset" {
            session.reset();
            println!("session cleared");
        } else if let Some(path) = input.strip_prefix("/upload ") {
            upload(&mut session, path.trim());
        } else if let Some(message) = input.strip_prefix("/preview ") {
            println!("{}", orchestrator.preview(message, &session));
        } else if input == "/image" {
            render_last_diagram(&orchestrator, &session).await;
        } else {
            let reply = orchestrator.handle(input, &mut session).await;
            println!("{}", reply);
        }
    }

    Ok(())
}

fn upload(session: &mut SessionState, path: &str) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("could not read {}: {}", path, e);
            return;
        }
    };
    match UploadedContext::from_file_name_and_bytes(path, &bytes) {
        Ok(context) => {
            session.upload(context);
            println!("uploaded {}", path);
        }
        Err(e) => println!("{}", e),
    }
}

async fn render_last_diagram<R: relay::Relay>(
    orchestrator: &Orchestrator<R>,
    session: &SessionState,
) {
    let Some(text) = session.last_assistant_text() else {
        println!("no assistant reply yet");
        return;
    };
    match orchestrator.render_diagram(text).await {
        Some(image) => {
            let out = "diagram.png";
            match image.save(out) {
                Ok(()) => println!("diagram written to {}", out),
                Err(e) => println!("could not write {}: {}", out, e),
            }
        }
        None => println!("no diagram available"),
    }
}
