//! Instruction prompt sent to the generative backend.
//!
//! The prompt is a static template with a single interpolation point, the
//! question. It is assembled as:
//! 1. Scholar framing (fixed)
//! 2. The question (the only dynamic part)
//! 3. Output directive with the exact JSON shape (fixed)
//!
//! Nothing else is derived per call.

use crate::types::Question;

/// Framing that establishes the comparative four-school answer.
pub const SCHOLAR_PREAMBLE: &str = "أنت عالم فقه إسلامي متخصص في المذاهب الأربعة. \
أجب عن السؤال التالي بالتفصيل من منظور كل مذهب من المذاهب السنية الأربعة.";

/// Label preceding the caller's question.
pub const QUESTION_LABEL: &str = "السؤال:";

/// Output directive: JSON only, exactly the shape the reply parser accepts.
pub const OUTPUT_DIRECTIVE: &str = r#"أجب بصيغة JSON فقط بدون أي نص إضافي، بالشكل التالي:
{
  "question": "السؤال المطروح",
  "hanafi": {
    "ruling": "الحكم الشرعي",
    "explanation": "الشرح والتفصيل مع الأدلة",
    "evidence": "الدليل من القرآن أو السنة"
  },
  "maliki": {
    "ruling": "الحكم الشرعي",
    "explanation": "الشرح والتفصيل مع الأدلة",
    "evidence": "الدليل من القرآن أو السنة"
  },
  "shafii": {
    "ruling": "الحكم الشرعي",
    "explanation": "الشرح والتفصيل مع الأدلة",
    "evidence": "الدليل من القرآن أو السنة"
  },
  "hanbali": {
    "ruling": "الحكم الشرعي",
    "explanation": "الشرح والتفصيل مع الأدلة",
    "evidence": "الدليل من القرآن أو السنة"
  },
  "consensus": "نقاط الاتفاق بين المذاهب إن وجدت",
  "note": "ملاحظة عامة أو نصيحة"
}"#;

/// Build the full instruction for a question.
pub fn build_prompt(question: &Question) -> String {
    format!(
        "{SCHOLAR_PREAMBLE}\n\n{QUESTION_LABEL} {}\n\n{OUTPUT_DIRECTIVE}",
        question.as_str()
    )
}
