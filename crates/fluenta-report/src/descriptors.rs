//! CEFR can-do descriptors.
//!
//! One general descriptor per level plus one per skill, following the
//! CEFR self-assessment grid wording.

use fluenta_core::model::{CefrLevel, Skill};

/// Short label for a level ("Independent User - Intermediate").
pub fn general_descriptor(level: CefrLevel) -> &'static str {
    match level {
        CefrLevel::A1 => "Basic User - Beginner",
        CefrLevel::A2 => "Basic User - Elementary",
        CefrLevel::B1 => "Independent User - Intermediate",
        CefrLevel::B2 => "Independent User - Upper Intermediate",
        CefrLevel::C1 => "Proficient User - Advanced",
        CefrLevel::C2 => "Proficient User - Mastery",
    }
}

/// Skill-specific can-do statement for a level.
pub fn can_do_statement(level: CefrLevel, skill: Skill) -> &'static str {
    match (level, skill) {
        (CefrLevel::A1, Skill::Reading) => {
            "Can understand familiar names, words and very simple sentences."
        }
        (CefrLevel::A1, Skill::Listening) => {
            "Can recognise familiar words and basic phrases when spoken slowly and clearly."
        }
        (CefrLevel::A1, Skill::Writing) => {
            "Can write a short, simple postcard and fill in forms with personal details."
        }
        (CefrLevel::A1, Skill::Speaking) => {
            "Can interact in a simple way provided the other person repeats slowly."
        }
        (CefrLevel::A2, Skill::Reading) => {
            "Can read very short, simple texts and find specific information in simple everyday material."
        }
        (CefrLevel::A2, Skill::Listening) => {
            "Can understand phrases and high frequency vocabulary related to immediate personal relevance."
        }
        (CefrLevel::A2, Skill::Writing) => {
            "Can write short, simple notes and messages relating to matters of immediate need."
        }
        (CefrLevel::A2, Skill::Speaking) => {
            "Can communicate in simple and routine tasks requiring a direct exchange of information."
        }
        (CefrLevel::B1, Skill::Reading) => {
            "Can understand texts that consist mainly of high frequency everyday language."
        }
        (CefrLevel::B1, Skill::Listening) => {
            "Can understand main points of clear standard speech on familiar matters."
        }
        (CefrLevel::B1, Skill::Writing) => {
            "Can write simple connected text on familiar topics."
        }
        (CefrLevel::B1, Skill::Speaking) => {
            "Can deal with most situations likely to arise while travelling."
        }
        (CefrLevel::B2, Skill::Reading) => {
            "Can read articles and reports concerned with contemporary problems."
        }
        (CefrLevel::B2, Skill::Listening) => {
            "Can understand extended speech and lectures on complex topics if reasonably familiar."
        }
        (CefrLevel::B2, Skill::Writing) => {
            "Can write clear, detailed text on a wide range of subjects related to interests."
        }
        (CefrLevel::B2, Skill::Speaking) => {
            "Can interact with fluency and spontaneity making regular interaction possible."
        }
        (CefrLevel::C1, Skill::Reading) => {
            "Can understand long and complex factual and literary texts, appreciating distinctions of style."
        }
        (CefrLevel::C1, Skill::Listening) => {
            "Can understand extended speech even when not clearly structured."
        }
        (CefrLevel::C1, Skill::Writing) => {
            "Can express ideas fluently and spontaneously with clear, well-structured text."
        }
        (CefrLevel::C1, Skill::Speaking) => {
            "Can use language flexibly and effectively for social, academic and professional purposes."
        }
        (CefrLevel::C2, Skill::Reading) => {
            "Can read with ease virtually all forms of written language including abstract texts."
        }
        (CefrLevel::C2, Skill::Listening) => {
            "Has no difficulty understanding any kind of spoken language, live or broadcast."
        }
        (CefrLevel::C2, Skill::Writing) => {
            "Can write smooth, fluent text in appropriate style with logical structure."
        }
        (CefrLevel::C2, Skill::Speaking) => {
            "Can express finely-shaded meanings precisely, using colloquial expressions naturally."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_and_skill_has_a_statement() {
        for level in CefrLevel::ALL {
            assert!(!general_descriptor(level).is_empty());
            for skill in Skill::ALL {
                assert!(!can_do_statement(level, skill).is_empty());
            }
        }
    }

    #[test]
    fn b1_speaking_wording() {
        assert!(can_do_statement(CefrLevel::B1, Skill::Speaking).contains("travelling"));
    }
}
