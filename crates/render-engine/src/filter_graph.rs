//! Filter graph construction for the overlay and assembly stages.

use std::collections::BTreeMap;

use promoreel_common::error::{PromoreelError, PromoreelResult};
use promoreel_composition_model::{
    escape_text, CaptionBlock, CaptionStyle, EncodeSettings, FilterChain, FilterSpec, FontSet,
    ResolvedWindow, TargetFrame,
};
use promoreel_text_layout::{layout_line, LineClassifier};

/// Scale to fit inside the target box without upscaling past it.
pub fn scale_node(target: TargetFrame) -> FilterSpec {
    FilterSpec::new("scale")
        .with("w", target.width)
        .with("h", target.height)
        .with("force_original_aspect_ratio", "decrease")
}

/// Center the scaled frame on a black canvas of exactly the target size.
pub fn pad_node(target: TargetFrame) -> FilterSpec {
    FilterSpec::new("pad")
        .with("w", target.width)
        .with("h", target.height)
        .with("x", "(ow-iw)/2")
        .with("y", "(oh-ih)/2")
        .with("color", "black")
}

/// Drop font files that do not exist, so drawtext falls back to the
/// encoder's built-in font instead of failing the stage.
pub fn resolve_fonts(fonts: &FontSet) -> FontSet {
    let keep = |font: &Option<std::path::PathBuf>, weight: &str| {
        font.as_ref().and_then(|path| {
            if path.exists() {
                Some(path.clone())
            } else {
                tracing::warn!(
                    path = %path.display(),
                    weight,
                    "Font file not found, using built-in default"
                );
                None
            }
        })
    };

    FontSet {
        regular: keep(&fonts.regular, "regular"),
        bold: keep(&fonts.bold, "bold"),
    }
}

/// Build the caption chain applied to the merged main video.
///
/// `scale` and `pad` come first so text is positioned on the padded canvas.
/// Lines are stacked per anchor: blocks sharing an anchor continue the line
/// counter instead of restarting it, and rely on disjoint windows to avoid
/// drawing on top of each other. Lines whose text would extend past the
/// bottom of the frame are kept but logged.
pub fn build_caption_chain(
    target: TargetFrame,
    style: &CaptionStyle,
    blocks: &[CaptionBlock],
    classifier: &dyn LineClassifier,
    lead_in_end_secs: f64,
) -> PromoreelResult<FilterChain> {
    let mut chain = FilterChain::new();
    chain.push(scale_node(target));
    chain.push(pad_node(target));

    let fonts = resolve_fonts(&style.fonts);
    let mut line_counters: BTreeMap<u32, u32> = BTreeMap::new();
    let mut windows: Vec<(&str, u32, ResolvedWindow)> = Vec::new();

    for block in blocks {
        let window = block.window.resolve(lead_in_end_secs);
        warn_on_overlap(&windows, block, &window);
        windows.push((block.name.as_str(), block.anchor_y, window));

        let enable = window.enable_expr();
        let mut block_lines = 0usize;

        for source_line in &block.lines {
            for decision in layout_line(source_line, classifier, f64::from(style.max_text_width))? {
                let counter = line_counters.entry(block.anchor_y).or_insert(0);
                let y = line_y(block.anchor_y, *counter, style.line_spacing).ok_or_else(|| {
                    PromoreelError::layout(format!(
                        "caption block '{}': line {} at anchor {} overflows the y offset",
                        block.name, *counter, block.anchor_y
                    ))
                })?;
                *counter += 1;
                block_lines += 1;

                if u64::from(y) + u64::from(decision.font_size_pt) > u64::from(target.height) {
                    tracing::warn!(
                        block = %block.name,
                        y,
                        font_size_pt = decision.font_size_pt,
                        frame_height = target.height,
                        "Caption line extends past the bottom of the frame"
                    );
                }

                let mut node = FilterSpec::new("drawtext");
                if let Some(font) = fonts.for_weight(decision.bold) {
                    node = node.with("fontfile", escape_text(&font.to_string_lossy()));
                }
                chain.push(
                    node.with("text", escape_text(&decision.text))
                        .with("expansion", "none")
                        .with("fontsize", decision.font_size_pt)
                        .with("fontcolor", &style.fill_color)
                        .with("x", format!("w-text_w-{}", style.margin))
                        .with("y", y)
                        .with("enable", &enable),
                );
            }
        }

        tracing::debug!(
            block = %block.name,
            lines = block_lines,
            start_secs = window.start_secs,
            end_secs = window.end_secs,
            "Built caption block"
        );
    }

    Ok(chain)
}

fn line_y(anchor_y: u32, index: u32, line_spacing: u32) -> Option<u32> {
    index
        .checked_mul(line_spacing)
        .and_then(|offset| anchor_y.checked_add(offset))
}

fn warn_on_overlap(
    earlier: &[(&str, u32, ResolvedWindow)],
    block: &CaptionBlock,
    window: &ResolvedWindow,
) {
    for (name, anchor_y, other) in earlier {
        if *anchor_y == block.anchor_y && other.overlaps(window) {
            tracing::warn!(
                first = name,
                second = %block.name,
                anchor_y,
                "Caption blocks share an anchor and have overlapping windows"
            );
        }
    }
}

/// Build the three-input assembly graph: intro, main, outro.
///
/// Each input is normalized on its own (frame size, sample aspect ratio,
/// audio format) before the concat, which emits `[outv]` and `[outa]`.
pub fn build_assembly_graph(target: TargetFrame, encode: &EncodeSettings) -> String {
    const INPUTS: usize = 3;
    let mut parts = Vec::with_capacity(INPUTS * 2 + 1);
    let mut concat_inputs = String::new();

    for index in 0..INPUTS {
        let video: FilterChain = [
            scale_node(target),
            pad_node(target),
            FilterSpec::new("setsar").with("sar", 1),
        ]
        .into_iter()
        .collect();
        parts.push(video.render_labeled(&format!("{index}:v"), &format!("v{index}")));

        let audio: FilterChain = [FilterSpec::new("aformat")
            .with("sample_rates", encode.audio_sample_rate)
            .with("channel_layouts", &encode.channel_layout)]
        .into_iter()
        .collect();
        parts.push(audio.render_labeled(&format!("{index}:a"), &format!("a{index}")));

        concat_inputs.push_str(&format!("[v{index}][a{index}]"));
    }

    let concat = FilterSpec::new("concat")
        .with("n", INPUTS)
        .with("v", 1)
        .with("a", 1);
    parts.push(format!("{concat_inputs}{concat}[outv][outa]"));

    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use promoreel_composition_model::{CaptionWindow, Composition, StyleDecision};
    use promoreel_text_layout::EmphasisClassifier;

    fn drawtexts(chain: &FilterChain) -> Vec<&FilterSpec> {
        chain.nodes_named("drawtext").collect()
    }

    #[test]
    fn test_scale_and_pad_lead_the_chain() {
        let chain = build_caption_chain(
            TargetFrame::default(),
            &CaptionStyle::default(),
            &[],
            &EmphasisClassifier::default(),
            4.0,
        )
        .unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.render(),
            "scale=w=1280:h=720:force_original_aspect_ratio=decrease,\
             pad=w=1280:h=720:x=(ow-iw)/2:y=(oh-ih)/2:color=black"
        );
    }

    #[test]
    fn test_sample_blocks_emit_one_node_per_wrapped_line() {
        let dir = tempfile::tempdir().unwrap();
        let regular = dir.path().join("Regular.ttf");
        let bold = dir.path().join("Bold.ttf");
        std::fs::write(&regular, b"").unwrap();
        std::fs::write(&bold, b"").unwrap();

        let composition = Composition::sample();
        let mut style = composition.captions.style.clone();
        style.fonts = FontSet::new(&regular, &bold);
        let classifier = EmphasisClassifier::from_style(&style);

        let expected_lines: usize = composition
            .captions
            .blocks
            .iter()
            .flat_map(|b| b.lines.iter())
            .map(|l| layout_line(l, &classifier, 600.0).unwrap().len())
            .sum();

        let chain = build_caption_chain(
            composition.target,
            &style,
            &composition.captions.blocks,
            &classifier,
            4.0,
        )
        .unwrap();

        assert_eq!(chain.len(), 2 + expected_lines);
        assert_eq!(chain.nodes()[0].name, "scale");
        assert_eq!(chain.nodes()[1].name, "pad");

        let emphasized: Vec<_> = drawtexts(&chain)
            .into_iter()
            .filter(|n| n.option("text").is_some_and(|t| t.contains("Rs.")))
            .collect();
        assert_eq!(emphasized.len(), 1);
        assert_eq!(emphasized[0].option("fontsize"), Some("48"));
        assert_eq!(
            emphasized[0].option("fontfile"),
            Some(escape_text(&bold.to_string_lossy()).as_str())
        );

        let regular_node = drawtexts(&chain)[0];
        assert_eq!(regular_node.option("fontsize"), Some("26"));
        assert_eq!(
            regular_node.option("fontfile"),
            Some(escape_text(&regular.to_string_lossy()).as_str())
        );
    }

    #[test]
    fn test_line_counter_continues_across_blocks_sharing_anchor() {
        let blocks = vec![
            CaptionBlock {
                name: "first".to_string(),
                lines: vec!["one".to_string(), "two".to_string()],
                anchor_y: 100,
                window: CaptionWindow::fixed(0.0, 5.0),
            },
            CaptionBlock {
                name: "second".to_string(),
                lines: vec!["three".to_string()],
                anchor_y: 100,
                window: CaptionWindow::fixed(5.0, 5.0),
            },
            CaptionBlock {
                name: "elsewhere".to_string(),
                lines: vec!["four".to_string()],
                anchor_y: 500,
                window: CaptionWindow::fixed(0.0, 5.0),
            },
        ];
        let chain = build_caption_chain(
            TargetFrame::default(),
            &CaptionStyle::default(),
            &blocks,
            &EmphasisClassifier::default(),
            0.0,
        )
        .unwrap();

        let ys: Vec<_> = drawtexts(&chain)
            .iter()
            .map(|n| n.option("y").unwrap().to_string())
            .collect();
        assert_eq!(ys, vec!["100", "160", "220", "500"]);
    }

    #[test]
    fn test_sample_lines_fit_the_frame() {
        let composition = Composition::sample();
        let style = &composition.captions.style;
        let classifier = EmphasisClassifier::from_style(style);
        let chain = build_caption_chain(
            composition.target,
            style,
            &composition.captions.blocks,
            &classifier,
            4.0,
        )
        .unwrap();

        let nodes = drawtexts(&chain);
        assert_eq!(nodes.len(), 14);
        for node in nodes {
            let y: u32 = node.option("y").unwrap().parse().unwrap();
            let size: u32 = node.option("fontsize").unwrap().parse().unwrap();
            assert!(
                y + size <= composition.target.height,
                "line at y={y} size={size} leaves the {}px frame",
                composition.target.height
            );
        }
    }

    #[test]
    fn test_line_offset_overflow_is_an_error() {
        let blocks = vec![CaptionBlock {
            name: "low".to_string(),
            lines: vec!["one".to_string(), "two".to_string()],
            anchor_y: u32::MAX - 10,
            window: CaptionWindow::fixed(0.0, 1.0),
        }];
        let err = build_caption_chain(
            TargetFrame::default(),
            &CaptionStyle::default(),
            &blocks,
            &EmphasisClassifier::default(),
            0.0,
        )
        .unwrap_err();

        assert!(matches!(err, PromoreelError::Layout { .. }));
        assert!(err.to_string().contains("low"));
    }

    #[test]
    fn test_line_y() {
        assert_eq!(line_y(80, 0, 60), Some(80));
        assert_eq!(line_y(80, 3, 60), Some(260));
        assert_eq!(line_y(u32::MAX, 1, 1), None);
        assert_eq!(line_y(0, u32::MAX, 2), None);
    }

    #[test]
    fn test_overlapping_windows_on_shared_anchor_still_build() {
        let blocks = vec![
            CaptionBlock {
                name: "first".to_string(),
                lines: vec!["one".to_string()],
                anchor_y: 100,
                window: CaptionWindow::fixed(0.0, 5.0),
            },
            CaptionBlock {
                name: "second".to_string(),
                lines: vec!["two".to_string()],
                anchor_y: 100,
                window: CaptionWindow::fixed(3.0, 5.0),
            },
        ];
        let chain = build_caption_chain(
            TargetFrame::default(),
            &CaptionStyle::default(),
            &blocks,
            &EmphasisClassifier::default(),
            0.0,
        )
        .unwrap();

        let nodes = drawtexts(&chain);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].option("enable"), Some("between(t,0,5)"));
        assert_eq!(nodes[1].option("enable"), Some("between(t,3,8)"));
        assert_eq!(nodes[1].option("y"), Some("160"));
    }

    #[test]
    fn test_drawtext_options() {
        let blocks = vec![CaptionBlock {
            name: "box".to_string(),
            lines: vec!["Due: today's bill".to_string()],
            anchor_y: 80,
            window: CaptionWindow::after_lead_in(0.5, 3.0),
        }];
        let chain = build_caption_chain(
            TargetFrame::default(),
            &CaptionStyle::default(),
            &blocks,
            &EmphasisClassifier::default(),
            3.5,
        )
        .unwrap();

        let node = drawtexts(&chain)[0];
        assert_eq!(node.option("text"), Some("Due\\: today\\'s bill"));
        assert_eq!(node.option("x"), Some("w-text_w-40"));
        assert_eq!(node.option("y"), Some("80"));
        assert_eq!(node.option("fontcolor"), Some("white"));
        assert_eq!(node.option("enable"), Some("between(t,4,7)"));
        assert_eq!(node.option("fontfile"), None);
    }

    #[test]
    fn test_missing_fonts_fall_back_to_default() {
        let fonts = FontSet::new("/nonexistent/Regular.ttf", "/nonexistent/Bold.ttf");
        let resolved = resolve_fonts(&fonts);
        assert_eq!(resolved, FontSet::default());
    }

    #[test]
    fn test_custom_classifier_is_used() {
        let blocks = vec![CaptionBlock {
            name: "box".to_string(),
            lines: vec!["FREE entry".to_string(), "details inside".to_string()],
            anchor_y: 10,
            window: CaptionWindow::fixed(0.0, 1.0),
        }];
        let classifier = |line: &str| StyleDecision {
            text: line.to_string(),
            font_size_pt: if line.contains("FREE") { 36 } else { 20 },
            bold: line.contains("FREE"),
        };
        let chain = build_caption_chain(
            TargetFrame::default(),
            &CaptionStyle::default(),
            &blocks,
            &classifier,
            0.0,
        )
        .unwrap();

        let sizes: Vec<_> = drawtexts(&chain)
            .iter()
            .map(|n| n.option("fontsize").unwrap().to_string())
            .collect();
        assert_eq!(sizes, vec!["36", "20"]);
    }

    #[test]
    fn test_assembly_graph() {
        let graph = build_assembly_graph(TargetFrame::default(), &EncodeSettings::default());
        let chains: Vec<&str> = graph.split(';').collect();

        assert_eq!(chains.len(), 7);
        assert_eq!(
            chains[0],
            "[0:v]scale=w=1280:h=720:force_original_aspect_ratio=decrease,\
             pad=w=1280:h=720:x=(ow-iw)/2:y=(oh-ih)/2:color=black,setsar=sar=1[v0]"
        );
        assert_eq!(
            chains[1],
            "[0:a]aformat=sample_rates=44100:channel_layouts=stereo[a0]"
        );
        assert!(chains[4].starts_with("[2:v]"));
        assert_eq!(
            chains[6],
            "[v0][a0][v1][a1][v2][a2]concat=n=3:v=1:a=1[outv][outa]"
        );
    }
}
