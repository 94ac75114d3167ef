//! Plain-text certificate rendering.

use std::fmt::Write;

use crate::SessionReport;

/// Render the candidate-facing certificate text.
///
/// Sessions without an overall result render an incomplete notice plus
/// whatever skill results exist.
pub fn render_certificate(report: &SessionReport) -> String {
    let mut text = String::new();

    match &report.overall {
        Some(overall) => {
            let _ = write!(
                text,
                "ENGLISH PROFICIENCY CERTIFICATE\n\n\
                 Candidate: {}\n\
                 Overall CEFR Level: {}\n\
                 IELTS Band Equivalent: {}\n\
                 Score: {:.0}%\n\n\
                 {}\n\n\
                 Skill Breakdown:\n",
                report.candidate_id,
                overall.cefr,
                overall.ielts_band,
                overall.percentage,
                overall.description
            );
        }
        None => {
            let _ = write!(
                text,
                "ASSESSMENT INCOMPLETE\n\n\
                 Candidate: {}\n\n\
                 Partial results:\n",
                report.candidate_id
            );
        }
    }

    for (skill, detail) in &report.skills {
        let mut line = format!(
            "\n{}: {} ({:.0}%)",
            capitalize(&skill.to_string()),
            detail.cefr,
            detail.percentage
        );
        if detail.evidence_limited {
            line.push_str(" [limited evidence]");
        }
        if detail.score_fallback {
            line.push_str(" [provisional]");
        }
        text.push_str(&line);
        let _ = write!(text, "\n  - {}", detail.can_do);
    }

    text.push('\n');
    text
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{band_equivalent, OverallReport, SkillReport};
    use chrono::Utc;
    use fluenta_core::model::{CefrLevel, Skill};
    use fluenta_core::stopping::StopReason;
    use fluenta_engine::session::SessionStatus;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn sample_report(with_overall: bool) -> SessionReport {
        let mut skills = BTreeMap::new();
        skills.insert(
            Skill::Reading,
            SkillReport {
                cefr: CefrLevel::B2,
                ielts: 6.5,
                toefl: 75,
                theta: 1.0,
                se: Some(0.28),
                percentage: 62.5,
                items_administered: 14,
                stop_reason: Some(StopReason::PrecisionReached),
                evidence_limited: false,
                score_fallback: false,
                can_do: "Can read articles and reports.".into(),
            },
        );
        SessionReport {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            candidate_id: "candidate-1".into(),
            created_at: Utc::now(),
            session_status: SessionStatus::Finalized,
            skills,
            overall: with_overall.then(|| OverallReport {
                cefr: CefrLevel::B2,
                ielts_band: band_equivalent(CefrLevel::B2),
                percentage: 62.5,
                description: "Independent User - Upper Intermediate".into(),
                policy: "lowest-skill-band".into(),
            }),
        }
    }

    #[test]
    fn certificate_headline() {
        let text = render_certificate(&sample_report(true));
        assert!(text.contains("ENGLISH PROFICIENCY CERTIFICATE"));
        assert!(text.contains("Overall CEFR Level: B2"));
        assert!(text.contains("IELTS Band Equivalent: 6.5"));
        assert!(text.contains("Reading: B2 (62%)"));
    }

    #[test]
    fn incomplete_certificate() {
        let text = render_certificate(&sample_report(false));
        assert!(text.contains("ASSESSMENT INCOMPLETE"));
        assert!(text.contains("Partial results"));
        assert!(text.contains("Reading: B2"));
    }

    #[test]
    fn provisional_marker() {
        let mut report = sample_report(true);
        report
            .skills
            .get_mut(&Skill::Reading)
            .unwrap()
            .score_fallback = true;
        let text = render_certificate(&report);
        assert!(text.contains("[provisional]"));
    }
}
