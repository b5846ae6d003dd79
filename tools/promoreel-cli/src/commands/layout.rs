//! Show how a caption line is wrapped and styled.

use promoreel_text_layout::{layout_line, EmphasisClassifier};

pub fn run(text: &str, width: f64, font_size: u32, emphasis_size: u32) -> anyhow::Result<()> {
    let defaults = promoreel_composition_model::CaptionStyle::default();
    let classifier = EmphasisClassifier::new(defaults.emphasis_markers, font_size, emphasis_size);

    let lines = layout_line(text, &classifier, width)?;
    let Some(first) = lines.first() else {
        println!("(no lines)");
        return Ok(());
    };

    println!(
        "{} line(s) at {}pt{}:",
        lines.len(),
        first.font_size_pt,
        if first.bold { " bold" } else { "" }
    );
    for line in &lines {
        println!("  {:>3} | {}", line.text.chars().count(), line.text);
    }

    Ok(())
}
