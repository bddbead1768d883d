use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use careline::bank::QuestionBank;
use careline::config::Config;
use careline::context::{ContextStore, InMemoryContextStore};
use careline::fallback::{FallbackResponder, GroqClient};
use careline::pipeline::matcher::{MatchPolicy, Matcher};
use careline::pipeline::resolver::Resolver;
use careline::pipeline::types::InboundMessage;
use careline::translate::{LanguageEnvelope, LibreTranslate};
use careline::webhook::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env();

    let bank = Arc::new(QuestionBank::from_path(&config.bank_path).with_context(|| {
        format!(
            "failed to load question bank from {}",
            config.bank_path.display()
        )
    })?);

    eprintln!("🏥 CareLine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Bank: {} ({} questions)",
        config.bank_path.display(),
        bank.len()
    );
    eprintln!(
        "   Matcher: {:?} on {:?} text, threshold {}",
        config.scorer, config.score_on, config.match_threshold
    );
    eprintln!("   Context TTL: {}s", config.context_ttl_secs);

    // Translation is optional. Without it the bot still answers, English
    // only.
    let envelope = match &config.translate_api_url {
        Some(url) => {
            eprintln!("   Translation: enabled ({url})");
            LanguageEnvelope::new(Arc::new(LibreTranslate::new(
                url.clone(),
                config.translate_api_key.clone(),
                config.request_timeout,
            )))
        }
        None => {
            eprintln!("   Translation: disabled (English only)");
            LanguageEnvelope::disabled()
        }
    };

    // The generative fallback is optional too. Without a key, unmatched
    // questions get a fixed apology instead of a completion.
    let fallback = match config.groq_api_key.clone() {
        Some(key) => {
            eprintln!("   Fallback: groq ({})", config.groq_model);
            FallbackResponder::new(Arc::new(GroqClient::new(
                key,
                config.groq_model.clone(),
                config.groq_api_url.clone(),
                config.request_timeout,
            )))
        }
        None => {
            eprintln!("   Fallback: disabled (GROQ_API_KEY not set)");
            FallbackResponder::unconfigured()
        }
    };

    let matcher = Matcher::new(
        Arc::clone(&bank),
        config.scorer.create(),
        MatchPolicy {
            threshold: config.match_threshold,
            score_on: config.score_on,
            ..MatchPolicy::default()
        },
    );

    let context: Arc<dyn ContextStore> = InMemoryContextStore::new(config.context_ttl_secs);
    let resolver = Arc::new(Resolver::new(envelope, matcher, context, fallback));

    if std::env::args().any(|arg| arg == "--repl") {
        eprintln!("   Mode: REPL. Type a question and press Enter, Ctrl-D to exit.\n");
        run_repl(resolver).await;
        return Ok(());
    }

    eprintln!("   Webhook: http://{}/webhook\n", config.bind_addr);

    let app = webhook::routes(AppState { resolver });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Stdin/stdout loop for local testing without a messaging provider.
async fn run_repl(resolver: Arc<Resolver>) {
    let stdin = tokio::io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    eprint!("> ");
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    eprint!("> ");
                    continue;
                }
                let message = InboundMessage::new(&line, "local-user", None);
                let resolution = resolver.handle(&message).await;
                println!("\n{}\n", resolution.reply);
                eprint!("> ");
            }
            Ok(None) => break, // EOF
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        }
    }
}
