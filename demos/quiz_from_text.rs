//! Example: generating a quiz with MockBackend, no live LLM needed.
//!
//! The scripted model misbehaves on purpose: it hits a rate limit, wraps its
//! questions in a fence with a stack trace after it, and under-delivers, so
//! every recovery path runs.
//!
//! Run with: `RUST_LOG=wiki_quiz=debug cargo run --example quiz_from_text`

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiki_quiz::backend::BackoffConfig;
use wiki_quiz::events::{Event, FnEventHandler};
use wiki_quiz::{ExecCtx, MockBackend, MockReply, QuizGenerator};

const ARTICLE: &str = "The Danube is Europe's second-longest river after the Volga. \
    It rises in the Black Forest in Germany and flows southeast for 2,850 km through \
    Vienna, Bratislava, Budapest and Belgrade before emptying into the Black Sea. \
    The Danube Commission, founded in 1948, oversees navigation along the river.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let questions: Vec<_> = [
        ("Where does the Danube rise?", "The Black Forest"),
        ("Where does the Danube end?", "The Black Sea"),
        ("How long is the Danube?", "2,850 km"),
    ]
    .iter()
    .map(|(q, a)| {
        json!({
            "question": q,
            "options": [a, "The Alps", "The North Sea", "1,200 km"],
            "answer": a,
            "explanation": "Stated in the article.",
            "difficulty": "Easy"
        })
    })
    .collect();

    let mock = MockBackend::scripted(vec![
        MockReply::Fail("429 RESOURCE_EXHAUSTED. Please retry in 0.5s.".into()),
        MockReply::Text(
            json!({
                "title": "Danube",
                "summary": "The Danube is Europe's second-longest river. It ends in the Black Sea.",
                "key_entities": {
                    "people": null,
                    "organizations": ["Danube Commission"],
                    "locations": ["Vienna", "Bratislava", "Budapest", "Belgrade"]
                },
                "sections": ["Course", "Navigation"]
            })
            .to_string(),
        ),
        MockReply::Text(format!(
            "```json\n{}\n```\nTraceback (most recent call last): ...",
            serde_json::to_string(&questions)?
        )),
        MockReply::Text("[]".into()),
        MockReply::Text(String::new()),
        MockReply::Text(r#"["Volga", "Black Forest", "Rhine–Main–Danube Canal"]"#.into()),
    ]);

    let events = Arc::new(FnEventHandler(|event: Event| match event {
        Event::TransportRetry { attempt, delay_ms, .. } => {
            println!("  rate limited, retry {} in {} ms", attempt, delay_ms)
        }
        Event::SupplementRound { round, needed, added } => {
            println!("  supplemental round {}: asked for {}, got {}", round, needed, added)
        }
        Event::FallbackFilled { count, shortfall } => {
            println!("  synthesized {} fillers, {} still missing", count, shortfall)
        }
        _ => {}
    }));

    let ctx = ExecCtx::builder("http://unused")
        .backend(Arc::new(mock))
        .backoff(BackoffConfig {
            max_delay: Duration::from_secs(2),
            ..BackoffConfig::standard()
        })
        .event_handler(events)
        .build();

    println!("Generating quiz...");
    let quiz = QuizGenerator::new(Arc::new(ctx))
        .with_seed(2024)
        .generate(ARTICLE)
        .await?;

    println!("\n{}", quiz.analysis.title.as_deref().unwrap_or("(untitled)"));
    for (i, q) in quiz.questions.iter().enumerate() {
        println!("{:2}. [{}] {}", i + 1, q.difficulty, q.question);
        for option in &q.options {
            let marker = if *option == q.answer { "*" } else { " " };
            println!("     {} {}", marker, option);
        }
    }

    println!("\nRead next: {}", quiz.related_topics.join(", "));
    println!("\nDiagnostics: {:#?}", quiz.diagnostics);
    Ok(())
}
