use crate::orchestrator::Translation;

/// Prefix marking an inserted translation line
pub const ANNOTATION_PREFIX: &str = "» ";

/// Reproduce `document` with each translation inserted below the block it
/// belongs to, indented to the block's column.
pub fn render_annotated(document: &str, translations: &[Translation]) -> String {
    let mut by_end_line: Vec<&Translation> = translations.iter().collect();
    by_end_line.sort_by_key(|t| t.range.end_line);
    let mut upcoming = by_end_line.into_iter().peekable();

    let mut output = String::with_capacity(document.len());
    for (index, line) in document.split('\n').enumerate() {
        if index > 0 {
            output.push('\n');
        }
        output.push_str(line);

        // Inserted lines follow the line ending of the line they annotate
        let line_end = if line.ends_with('\r') { "\r" } else { "" };
        while let Some(translation) = upcoming.next_if(|t| t.range.end_line == index) {
            let indent = " ".repeat(translation.range.start_column);
            for translated in translation.text.lines() {
                output.push('\n');
                output.push_str(&indent);
                output.push_str(ANNOTATION_PREFIX);
                output.push_str(translated);
                output.push_str(line_end);
            }
        }
    }

    output
}

/// One line per translation: `start-end: text`, 1-based line numbers
pub fn render_summary(translations: &[Translation]) -> String {
    translations
        .iter()
        .map(|t| {
            let lines = if t.range.start_line == t.range.end_line {
                format!("{}", t.range.start_line + 1)
            } else {
                format!("{}-{}", t.range.start_line + 1, t.range.end_line + 1)
            };
            format!("{:>7}  {}", lines, t.text.replace('\n', " / "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
