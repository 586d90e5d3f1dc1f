use std::{process, sync::Arc};

use novella::{
    application::{
        client::NovelClient,
        error::AppError,
        translation::{TranslationProgress, TranslationService},
    },
    cache::{CacheConfig, RequestCache},
    config::{self, Command},
    infra::{http::HttpNovelApi, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let api = HttpNovelApi::new(&settings.api)?;
    let cache = RequestCache::new(CacheConfig::from(&settings.cache));
    let client = NovelClient::new(Arc::new(api), cache, settings.client.clone());

    match cli_args.command {
        Command::Series(args) => match args.id.as_deref() {
            Some(series_id) => print_json(&client.series_by_id(series_id).await?),
            None => print_json(&client.series().await?),
        },
        Command::Chapters(args) => print_json(&client.chapters(args.series.as_deref()).await?),
        Command::Glossary(args) => print_json(
            &client
                .glossary_terms(Some(&args.series), args.chapter.as_deref())
                .await?,
        ),
        Command::Highlight(args) => {
            let matcher = client
                .glossary_matcher(Some(&args.series), args.chapter.as_deref())
                .await?;
            println!("{}", matcher.highlight(&args.text));
            Ok(())
        }
        Command::Translate(args) => run_translate(client, &args.chapter, args.batch_size).await,
        Command::Shares => print_json(&client.shares().await?),
        Command::Stats => run_stats(&client).await,
    }
}

async fn run_translate(
    client: NovelClient,
    chapter_id: &str,
    batch_size: usize,
) -> Result<(), AppError> {
    let service = TranslationService::new(client).with_batch_size(batch_size);
    let outcome = service
        .translate_chapter(chapter_id, |progress: TranslationProgress| {
            info!(
                done = progress.done,
                total = progress.total,
                percent = progress.percent(),
                "Translation progress"
            );
        })
        .await?;

    for failure in &outcome.failures {
        error!(index = failure.index, error = %failure.error, "Paragraph left untranslated");
    }
    print_json(&outcome.chapter)?;

    if outcome.is_complete() {
        Ok(())
    } else {
        Err(AppError::unexpected(format!(
            "{} paragraph(s) failed to translate",
            outcome.failures.len()
        )))
    }
}

async fn run_stats(client: &NovelClient) -> Result<(), AppError> {
    let series = client.series().await?;
    let chapters = client.chapters(None).await?;
    for entry in &series {
        client.glossary_terms(Some(&entry.id), None).await?;
    }

    let stats = client.cache().stats();
    println!("series      {}", series.len());
    println!("chapters    {}", chapters.len());
    println!("entries     {}", stats.entries);
    println!("tags        {}", stats.tags);
    println!("in_flight   {}", stats.in_flight);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
