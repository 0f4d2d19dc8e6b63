use std::fmt::Write as _;

use piece_contracts::analysis::{AnalysisState, Phase};
use piece_contracts::image::EncodedImage;
use piece_contracts::links::{FoundOnline, NO_LINKS_FOUND_MESSAGE};
use serde_json::{json, Value};

const TAGLINE: &str = "Find the clothes you love. Scan any item to discover where to buy it online.";
const FEATURE_HIGHLIGHTS: &[(&str, &str)] = &[
    (
        "Visual Recognition",
        "Advanced technology identifies fabric, brand style, and cut.",
    ),
    (
        "Global Search",
        "Scans thousands of retailers for the best match.",
    ),
];
const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

pub fn render_state(state: &AnalysisState) -> String {
    match state.phase() {
        Phase::Idle => render_idle(),
        Phase::Analyzing => render_analyzing(state),
        Phase::Complete => render_complete(state),
        Phase::Error => render_error(state),
    }
}

fn render_idle() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Piece Finder");
    let _ = writeln!(out, "{TAGLINE}");
    let _ = writeln!(out);
    for (title, desc) in FEATURE_HIGHLIGHTS {
        let _ = writeln!(out, "  * {title}: {desc}");
    }
    let _ = writeln!(out);
    let _ = write!(out, "Type /open <path> (or paste a path) to scan an item.");
    out
}

fn render_analyzing(state: &AnalysisState) -> String {
    let mut out = String::new();
    if let Some(image) = state.image() {
        let _ = writeln!(out, "Image: {}", describe_image(image));
    }
    let _ = write!(
        out,
        "Analyzing the item and searching retailers for matches..."
    );
    out
}

fn render_complete(state: &AnalysisState) -> String {
    let mut out = String::new();
    if let Some(image) = state.image() {
        let _ = writeln!(out, "Image: {}", describe_image(image));
        let _ = writeln!(out);
    }
    let Some(result) = state.result() else {
        let _ = write!(out, "No result available.");
        return out;
    };

    let _ = writeln!(out, "Description");
    let _ = writeln!(out, "{}", result.description().trim());
    let _ = writeln!(out);
    let _ = writeln!(out, "Found Online");
    match result.found_online() {
        FoundOnline::Links(links) => {
            for (idx, link) in links.iter().enumerate() {
                let _ = writeln!(out, "  {}. {} ({})", idx + 1, link.title, link.host_label());
                let _ = writeln!(out, "     {}", link.uri);
            }
        }
        FoundOnline::NoneFound => {
            let _ = writeln!(out, "  {NO_LINKS_FOUND_MESSAGE}");
        }
    }
    let _ = writeln!(out);
    let _ = write!(out, "Type /reset to scan another item.");
    out
}

fn render_error(state: &AnalysisState) -> String {
    format!(
        "Scan Failed\n{}\nType /reset to try again.",
        state.error_message().unwrap_or(UNEXPECTED_ERROR_MESSAGE)
    )
}

fn describe_image(image: &EncodedImage) -> String {
    format!(
        "{}, {}",
        image.declared_media_type().unwrap_or("unknown type"),
        format_size(image.decoded_len())
    )
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{kb:.1} KB");
    }
    format!("{:.1} MB", kb / 1024.0)
}

/// Machine-readable form of a state, for `analyze --json`.
pub fn state_json(state: &AnalysisState) -> Value {
    let result = state.result();
    let links: Vec<Value> = result
        .map(|result| result.found_online())
        .map(|found| {
            found
                .links()
                .iter()
                .map(|link| {
                    json!({
                        "uri": link.uri,
                        "title": link.title,
                        "host": link.host_label(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    json!({
        "phase": state.phase(),
        "description": result.map(|result| result.description()),
        "citations": result.map(|result| result.citations()),
        "links": links,
        "error": state.error_message(),
    })
}
