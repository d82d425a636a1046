//! # fatwa-core
//!
//! Deterministic building blocks for four-school fatwa answers.
//!
//! This crate answers two questions for every request:
//! - What exactly do we ask the generative backend?
//! - Is what came back a usable comparative answer?
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: Nothing here touches the network or the filesystem
//! 2. **Deterministic**: The same question always yields the same prompt
//! 3. **Strict**: A reply either validates completely or is rejected; no
//!    partially parsed school data ever escapes
//!
//! ## Example
//!
//! ```rust
//! use fatwa_core::{parse_reply, prompt::build_prompt, Question, School};
//!
//! let question = Question::parse("ما حكم صلاة الجماعة؟").unwrap();
//! let prompt = build_prompt(&question);
//! assert!(prompt.contains(question.as_str()));
//!
//! let reply = "```json\n{\"hanafi\": {\"ruling\": \"سنة مؤكدة\"}, \
//!     \"maliki\": {}, \"shafii\": {}, \"hanbali\": {}}\n```";
//! let result = parse_reply(reply).unwrap();
//! assert_eq!(result.opinion(School::Hanafi).ruling.as_deref(), Some("سنة مؤكدة"));
//! ```

pub mod prompt;
pub mod reply;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use reply::{parse_reply, strip_code_fences, ReplyError};
pub use types::{FatwaResult, Question, QuestionError, School, SchoolOpinion};
