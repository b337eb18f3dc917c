use clap::Parser;
use termgrok::grok::chat::GrokChat;
use termgrok::grok::client::{GrokApiKey, GrokClient, GrokModel, Result};
use termgrok::repl::GrokRepl;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant replying inside a terminal session. Keep answers short and plain.";

#[derive(Parser)]
struct Cli {
    #[clap(
        short = 'k',
        long = "key",
        help = "API key for xAI, defaults to the XAI_API_KEY environment variable"
    )]
    key: Option<String>,
    #[clap(short = 'm', long = "model", default_value = "grok-beta")]
    model: GrokModel,
}

impl Cli {
    fn api_key(&self) -> Result<GrokApiKey> {
        match &self.key {
            Some(key) => Ok(GrokApiKey::new(key)),
            None => GrokApiKey::from_env(),
        }
    }
}

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let key = cli.api_key()?;
    let client = GrokClient::new(key)?;
    let chat = GrokChat::new(client, cli.model, SYSTEM_PROMPT);
    GrokRepl::new(chat).repl()
}
