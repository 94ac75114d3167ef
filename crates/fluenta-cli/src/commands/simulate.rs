//! The `fluenta simulate` command.
//!
//! Drives a synthetic candidate with a known true ability through a full
//! session: objective skills answer according to the 3PL response model,
//! productive skills are graded by the mock grader at the band the scale
//! maps the true ability to.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use fluenta_core::bank::{self, InMemoryBank};
use fluenta_core::irt;
use fluenta_core::model::{CefrLevel, Item, Skill};
use fluenta_core::scale::ScaleConfig;
use fluenta_engine::session::Session;
use fluenta_engine::store::InMemorySessionStore;
use fluenta_engine::{EngineConfig, SessionEngine, StartOutcome, SubmitOutcome};
use fluenta_grader::config::load_config_from;
use fluenta_grader::MockGrader;
use fluenta_report::{render_certificate, SessionReport};

const WRITING_PROMPT: &str = "Describe a journey that changed how you see the world.";
const SPEAKING_PROMPT: &str = "Talk about a skill you would like to learn and why.";
const SIMULATED_SUBMISSION: &str = "[simulated candidate submission]";

pub async fn execute(
    bank_path: PathBuf,
    true_theta: f64,
    level: Option<String>,
    candidate: String,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        (irt::THETA_MIN..=irt::THETA_MAX).contains(&true_theta),
        "theta must be between {} and {}",
        irt::THETA_MIN,
        irt::THETA_MAX
    );
    let initial_level: Option<CefrLevel> = level
        .map(|s| s.parse().map_err(|e: String| anyhow::anyhow!(e)))
        .transpose()?;

    let config = load_config_from(config_path.as_deref())?;

    // Merge all bank files into one pool for the session.
    let banks = if bank_path.is_dir() {
        bank::load_bank_directory(&bank_path)?
    } else {
        vec![bank::parse_bank(&bank_path)?]
    };
    let items: Vec<Item> = banks.iter().flat_map(|b| b.items().to_vec()).collect();
    anyhow::ensure!(!items.is_empty(), "no items found in {}", bank_path.display());
    let bank = Arc::new(InMemoryBank::new("simulation", "Simulation pool", items));
    let exposure = bank.exposure();

    let scale = ScaleConfig::default();
    scale.validate()?;
    // Grade productive skills at the band the true ability maps to.
    let grader = Arc::new(MockGrader::with_fixed_band(scale.ielts(true_theta)));

    let engine_config = EngineConfig {
        skills: config.skills.clone(),
        scale: scale.clone(),
        initial_level,
        grader_max_retries: config.max_retries,
        grader_retry_delay: Duration::from_millis(config.retry_delay_ms),
    };
    let engine = Arc::new(SessionEngine::new(
        bank,
        exposure,
        Arc::new(InMemorySessionStore::new()),
        grader,
        engine_config,
    ));

    let session_id = engine.create_session(&candidate).await?;
    eprintln!("Simulating session {session_id} at true theta {true_theta:+.2}");

    for skill in [Skill::Reading, Skill::Listening] {
        simulate_objective(&engine, session_id, skill, true_theta).await?;
    }
    for (skill, prompt) in [
        (Skill::Writing, WRITING_PROMPT),
        (Skill::Speaking, SPEAKING_PROMPT),
    ] {
        engine.start_skill(session_id, skill).await?;
        engine
            .submit_productive(session_id, skill, prompt, SIMULATED_SUBMISSION)
            .await?;
        wait_for_completion(&engine, session_id, skill).await?;
    }

    let snapshot = engine.snapshot(session_id).await?;
    let report = SessionReport::from_session(&snapshot, &scale);

    print_summary(&snapshot, &report);
    println!("\n{}", render_certificate(&report));

    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let report_path = output.join(format!("report-{timestamp}.json"));
    report.save_json(&report_path)?;
    eprintln!("Report saved to: {}", report_path.display());

    Ok(())
}

/// Answer items by the response model: correct whenever the 3PL success
/// probability at the true ability reaches one half.
async fn simulate_objective(
    engine: &Arc<SessionEngine>,
    session_id: uuid::Uuid,
    skill: Skill,
    true_theta: f64,
) -> Result<()> {
    let mut current = match engine.start_skill(session_id, skill).await? {
        StartOutcome::FirstItem(item) => item,
        StartOutcome::Completed(reason) => {
            eprintln!("  {skill}: no items available ({reason})");
            return Ok(());
        }
        StartOutcome::AwaitingSubmission => unreachable!("objective skill"),
    };
    loop {
        let p = irt::probability_correct(
            true_theta,
            current.discrimination,
            current.difficulty,
            current.guessing,
        );
        let correct = p >= 0.5;
        match engine
            .submit_answer(session_id, skill, &current.id, correct, 850)
            .await?
        {
            SubmitOutcome::NextItem(item) => current = item,
            SubmitOutcome::Completed(reason) => {
                eprintln!("  {skill}: stopped ({reason})");
                return Ok(());
            }
            SubmitOutcome::PendingExternalScore => unreachable!("objective skill"),
        }
    }
}

async fn wait_for_completion(
    engine: &Arc<SessionEngine>,
    session_id: uuid::Uuid,
    skill: Skill,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let snapshot = engine.snapshot(session_id).await?;
        if snapshot.module(skill).state.is_completed() {
            eprintln!("  {skill}: graded");
            return Ok(());
        }
        anyhow::ensure!(
            tokio::time::Instant::now() < deadline,
            "grading did not complete for {skill}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn print_summary(session: &Session, report: &SessionReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Skill", "Items", "Theta", "SE", "CEFR", "IELTS", "TOEFL"]);

    for (skill, detail) in &report.skills {
        let module = session.module(*skill);
        table.add_row(vec![
            Cell::new(skill),
            Cell::new(module.administered.len()),
            Cell::new(format!("{:+.2}", detail.theta)),
            Cell::new(
                detail
                    .se
                    .map(|se| format!("{se:.3}"))
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(detail.cefr),
            Cell::new(format!("{:.1}", detail.ielts)),
            Cell::new(detail.toefl),
        ]);
    }

    eprintln!("\n{table}");
}
