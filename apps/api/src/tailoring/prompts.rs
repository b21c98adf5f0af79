// Prompt constants for section rewriting.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Section rewrite template. Replace `{section_name}`, `{section_content}`,
/// `{job_description}` and `{no_fabrication}` before sending.
pub const REWRITE_PROMPT_TEMPLATE: &str = r#"You are an expert resume writer and career coach. Rewrite the following resume section so it is more impactful and tailored to the job description below.

Instructions:
1. Analyze: read the original section and the job description. Identify the key skills, experiences and keywords the job asks for.
2. Rewrite: highlight the experience and skills in the original that match the job's requirements and preferences.
3. Keywords: integrate relevant keywords from the job description naturally. Avoid keyword stuffing.
4. Action verbs: start bullet points and accomplishments with strong action verbs.
5. Format: output only the content of the section, with no section heading. If the original was a paragraph, keep it a paragraph unless a list is clearly better. If the original was a list, keep it a list.
6. Conciseness: keep the language clear, concise and professional.
7. No suggestions: do not include suggestions, examples in brackets or placeholders. Only include real content.
8. EXPERIENCE entries: keep every job title, company name and date exactly as in the original, and format each entry as:
   \textbf{Job Title} \hfill \textit{Date}
   \textbf{Company Name}
   \begin{itemize}
   \item First bullet point
   \item Second bullet point
   \end{itemize}
9. LaTeX escaping: escape &, %, $, #, _, {, }, ~ and ^ with a backslash, for example R\&D rather than R&D.
10. Lists: always use
   \begin{itemize}
   \item First item
   \item Second item
   \end{itemize}

{no_fabrication}

Job description:
---
{job_description}
---

Original resume section ({section_name}):
---
{section_content}
---

Rewritten section content (LaTeX only, no heading):"#;
