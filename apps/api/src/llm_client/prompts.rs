// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment for calls whose answer is pasted into a LaTeX document.
pub const LATEX_BODY_ONLY_SYSTEM: &str = "You are a precise resume-writing assistant. \
    You MUST respond with LaTeX body content only. \
    Do NOT include a preamble, \\documentclass, \\begin{document} or section headings. \
    Do NOT use markdown code fences. \
    Do NOT include explanations, apologies or placeholders.";

/// Instruction appended to rewrite prompts so the model cannot invent experience.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Only use facts present in the original section. \
    Do NOT invent employers, titles, dates, degrees or metrics. \
    If the job description asks for something the candidate does not show, leave it out.";
