use anyhow::{Context as _, Result};
use bytes::Bytes;
use std::env;
use study_document_service::tasks::{ContentStrategy, GeminiClient};
use study_document_service::{ServiceConfig, UploadedFile};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("PDF -> Study Document Test");
    println!("==========================");

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <pdf_file_path>", args[0]);
        eprintln!("Example: {} /path/to/lecture-notes.pdf", args[0]);
        std::process::exit(1);
    }
    let pdf_path = &args[1];

    let config = ServiceConfig::from_env()?;
    if config.gemini_api_key.is_none() {
        eprintln!("Please set GEMINI_API_KEY environment variable");
        eprintln!("Example: export GEMINI_API_KEY='your_key_here'");
        std::process::exit(1);
    }

    let bytes = tokio::fs::read(pdf_path)
        .await
        .with_context(|| format!("Failed to read {}", pdf_path))?;

    println!("Processing PDF: {} ({} bytes)", pdf_path, bytes.len());
    println!("Strategy: {:?}, model: {}", config.strategy, config.model);
    println!();

    let file = UploadedFile::new(
        Some(pdf_path.clone()),
        Some(study_document_service::PDF_MEDIA_TYPE.to_string()),
        Bytes::from(bytes),
    );
    let strategy = ContentStrategy::from_config(&config);
    let generator = GeminiClient::from_config(&config);

    let response = strategy.generate(file, &generator).await?;

    if let Some(length) = response.original_length {
        println!("Extracted {} characters", length);
    }
    if let Some(size) = response.original_size {
        println!("Sent {} bytes as attachment", size);
    }
    println!("Processed at {}", response.processed_at);
    println!();
    println!("Study Document:");
    println!("───────────────");
    println!("{}", response.study_document);

    Ok(())
}
