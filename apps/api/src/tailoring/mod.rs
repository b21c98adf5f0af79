// Tailoring: rewrite selected resume sections for one job description and
// splice them back into the reconstructed document.

pub mod handlers;
pub mod jd_fetch;
pub mod pipeline;
pub mod prompts;
pub mod rewriter;

pub use pipeline::{run_parse, tailor_resume, ParseOutcome, PipelineOptions, TailorOutcome};
pub use rewriter::{LlmSectionRewriter, RewriteError, SectionRewriter};
