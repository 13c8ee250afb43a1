//! Prompt templates.

/// Render retrieved passages as numbered `Document {n}: {text}` blocks
/// separated by blank lines. Numbering starts at 1.
pub fn render_context<S: AsRef<str>>(context: &[S]) -> String {
    context
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Document {}: {}", i + 1, text.as_ref()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt for a single free-form report.
pub fn narrative_prompt<S: AsRef<str>>(query: &str, context: &[S], report_type: &str) -> String {
    format!(
        "User Query: {query}\n\n\
         Context Information:\n{}\n\n\
         Task: Based on the user query and the provided context, generate a comprehensive financial research report.\n\
         The report should be well-structured, factually accurate, and provide valuable insights for {report_type} analysis.\n\
         Include relevant metrics, trends, and actionable recommendations where appropriate.\n\
         Ensure all information is grounded in the provided context.",
        render_context(context)
    )
}

/// Prompt for one section of a structured report.
pub fn section_prompt<S: AsRef<str>>(
    query: &str,
    context: &[S],
    report_type: &str,
    section: &str,
) -> String {
    format!(
        "User Query: {query}\n\n\
         Context Information:\n{}\n\n\
         Task: Generate the \"{section}\" section of a financial research report for {report_type} analysis.\n\
         Focus specifically on information relevant to this section.\n\
         Ensure all information is factually accurate and grounded in the provided context.",
        render_context(context)
    )
}
