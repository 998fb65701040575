use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use ai_workflows::channels::{GmailSource, TelegramSink};
use ai_workflows::classifier::{Allowlist, TieredClassifier};
use ai_workflows::config::{
    GmailConfig, LlmConfig, RetrievalConfig, TelegramConfig, TriageConfig,
};
use ai_workflows::index::loader::load_corpus;
use ai_workflows::index::{PassageRetriever, SimilarityIndex};
use ai_workflows::llm::{CompletionClient, Embedder, OllamaClient, OllamaEmbedder};
use ai_workflows::pipeline::{
    QaPipeline, ReviewOutcome, TriageOutcome, TriagePipeline, spawn_triage_poller,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_else(|| "triage".to_string());

    match mode.as_str() {
        "triage" => run_triage(false).await,
        "watch" => run_triage(true).await,
        "ask" => {
            let question: String = args.collect::<Vec<_>>().join(" ");
            run_qa(question).await
        }
        other => {
            eprintln!("Unknown mode: {other}");
            eprintln!("Usage: ai-workflows [triage | watch | ask <question>]");
            std::process::exit(2);
        }
    }
}

/// Build the similarity index from the configured corpus directory.
async fn build_retriever(llm_config: &LlmConfig) -> anyhow::Result<Arc<dyn PassageRetriever>> {
    let retrieval_config = RetrievalConfig::from_env()?;
    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(llm_config));
    let passages = load_corpus(&retrieval_config.corpus_dir).await?;
    eprintln!(
        "   Corpus: {} passages from {}",
        passages.len(),
        retrieval_config.corpus_dir.display()
    );
    let index = SimilarityIndex::build(embedder, passages).await?;
    Ok(Arc::new(index))
}

async fn run_triage(watch: bool) -> anyhow::Result<()> {
    let llm_config = LlmConfig::from_env()?;
    let triage_config = TriageConfig::from_env()?;
    let telegram_config = TelegramConfig::from_env()?;
    let gmail_config = GmailConfig::from_env()?;

    eprintln!("📧 ai-workflows triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);

    let llm: Arc<dyn CompletionClient> = Arc::new(OllamaClient::new(&llm_config));
    let retriever = build_retriever(&llm_config).await?;
    let allowlist = Allowlist::load(&triage_config.allowlist_file).await;
    eprintln!("   Allowlist: {} senders", allowlist.len());

    let classifier = TieredClassifier::new(allowlist, retriever, Arc::clone(&llm))
        .with_similarity_threshold(triage_config.similarity_threshold)
        .with_max_content_chars(triage_config.max_content_chars);

    let source = Arc::new(GmailSource::new(gmail_config));
    let sink = Arc::new(TelegramSink::new(telegram_config));
    let pipeline = TriagePipeline::new(source, classifier, llm, sink)
        .with_max_content_chars(triage_config.max_content_chars);

    if watch {
        let (handle, shutdown) =
            spawn_triage_poller(Arc::new(pipeline), triage_config.poll_interval);
        eprintln!(
            "   Watching every {:?} — Ctrl-C to stop\n",
            triage_config.poll_interval
        );
        tokio::signal::ctrl_c().await?;
        shutdown.store(true, Ordering::Relaxed);
        handle.abort();
        return Ok(());
    }

    let run = pipeline.run().await?;
    match run.outcome {
        TriageOutcome::NoItem => println!("No new emails found."),
        TriageOutcome::Filtered { verdict } => {
            println!("Filtered: {verdict}");
        }
        TriageOutcome::Notified {
            summary, delivered, ..
        } => {
            println!("Summary: {summary}");
            if !delivered {
                println!("(notification delivery failed — see logs)");
            }
        }
    }
    Ok(())
}

async fn run_qa(question: String) -> anyhow::Result<()> {
    let llm_config = LlmConfig::from_env()?;
    let retrieval_config = RetrievalConfig::from_env()?;

    let question = if question.trim().is_empty() {
        prompt_for_question()?
    } else {
        question
    };

    let llm: Arc<dyn CompletionClient> = Arc::new(OllamaClient::new(&llm_config));
    let retriever = build_retriever(&llm_config).await?;
    let pipeline = QaPipeline::new(llm, retriever).with_top_k(retrieval_config.top_k);

    let run = pipeline.run(&question).await?;
    if matches!(run.review, ReviewOutcome::Revised(_)) {
        tracing::debug!("Review pass revised the answer");
    }
    println!("\nFinal Answer:");
    println!("{}", run.final_answer);
    Ok(())
}

fn prompt_for_question() -> anyhow::Result<String> {
    print!("Ask me a question: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
