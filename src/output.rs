//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Each input is shown by its positional index and file name, with paths,
//! dimensions and written files as indented context lines. Failures use the
//! short user-facing message; full error detail goes to the log.
//!
//! # Output Format
//!
//! ## Upscale
//!
//! ```text
//! Mode: degraded (no provider credential)
//! 001 dawn.jpg
//!     Source: photos/dawn.jpg
//!     800x600 → 1600x1200 (2x, resized)
//!     Report: out/dawn-upscaled-2x-1f3a9c07.json
//! 002 broken.png
//!     Source: photos/broken.png
//!     Failed: The upscaling service could not process the image.
//!
//! Upscaled 1 of 2 images
//! ```
//!
//! ## Plan
//!
//! ```text
//! 2000x3000 at 4x → 2731x4096 (scale 1.365, capped at 4096)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability; [`print_lines`] writes to stdout. Format functions are
//! pure: no I/O, no side effects.

use crate::imaging::{Dimensions, UpscalePlan};
use crate::pipeline::Mode;
use crate::types::{Factor, UpscaleOutcome};
use std::path::{Path, PathBuf};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Header line for one input: index plus file name (or the full path if it
/// has none).
fn input_header(index: usize, source: &Path) -> String {
    let name = source
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());
    format!("{} {}", format_index(index), name)
}

fn source_line(source: &Path) -> String {
    format!("{}Source: {}", indent(1), source.display())
}

// ============================================================================
// Upscale output
// ============================================================================

/// One line describing how the upscaler will run.
pub fn format_mode(mode: Mode) -> String {
    match mode {
        Mode::Enhanced => "Mode: enhanced (upscale provider)".to_string(),
        Mode::Degraded => "Mode: degraded (no provider credential)".to_string(),
    }
}

/// Display lines for a completed upscale and the files written for it.
pub fn format_outcome(
    index: usize,
    source: &Path,
    original: Dimensions,
    factor: Factor,
    outcome: &UpscaleOutcome,
    written: &[PathBuf],
) -> Vec<String> {
    let mut lines = vec![input_header(index, source), source_line(source)];
    lines.push(format!(
        "{}{} \u{2192} {} ({}, {})",
        indent(1),
        original,
        outcome.dimensions(),
        factor,
        outcome.origin
    ));
    for path in written {
        let label = if path.extension().is_some_and(|e| e == "json") {
            "Report"
        } else {
            "Image"
        };
        lines.push(format!("{}{}: {}", indent(1), label, path.display()));
    }
    lines
}

/// Display lines for an input that could not be upscaled.
pub fn format_failure(index: usize, source: &Path, message: &str) -> Vec<String> {
    vec![
        input_header(index, source),
        source_line(source),
        format!("{}Failed: {}", indent(1), message),
    ]
}

/// Closing summary line.
pub fn format_summary(succeeded: usize, total: usize) -> String {
    let noun = if total == 1 { "image" } else { "images" };
    format!("Upscaled {} of {} {}", succeeded, total, noun)
}

// ============================================================================
// Plan output
// ============================================================================

/// Single line describing a planned upscale.
pub fn format_plan(
    original: Dimensions,
    factor: u32,
    max_dimension: u32,
    plan: &UpscalePlan,
) -> String {
    let scale = format!("{:.3}", plan.scale);
    let scale = scale.trim_end_matches('0').trim_end_matches('.');
    let mut line = format!(
        "{} at {}x \u{2192} {} (scale {}",
        original, factor, plan.target, scale
    );
    if plan.capped {
        line.push_str(&format!(", capped at {}", max_dimension));
    }
    line.push(')');
    line
}

/// Print lines to stdout.
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{MediaType, encode_payload};
    use crate::imaging::plan_upscale;
    use crate::types::Origin;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_single_digit() {
        assert_eq!(format_index(1), "001");
    }

    #[test]
    fn format_index_triple_digit() {
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn input_header_uses_file_name() {
        assert_eq!(input_header(3, Path::new("photos/dawn.jpg")), "003 dawn.jpg");
    }

    // =========================================================================
    // Upscale output
    // =========================================================================

    #[test]
    fn outcome_lines() {
        let outcome = UpscaleOutcome {
            payload: encode_payload(b"x", MediaType::Jpeg).unwrap(),
            width: 1600,
            height: 1200,
            origin: Origin::Resized,
        };
        let lines = format_outcome(
            1,
            Path::new("photos/dawn.jpg"),
            dims(800, 600),
            Factor::new(2, &[2, 4]).unwrap(),
            &outcome,
            &[
                PathBuf::from("out/dawn-upscaled-2x-1f3a9c07.json"),
                PathBuf::from("out/dawn-upscaled-2x-1f3a9c07.jpg"),
            ],
        );
        assert_eq!(
            lines,
            vec![
                "001 dawn.jpg",
                "    Source: photos/dawn.jpg",
                "    800x600 \u{2192} 1600x1200 (2x, resized)",
                "    Report: out/dawn-upscaled-2x-1f3a9c07.json",
                "    Image: out/dawn-upscaled-2x-1f3a9c07.jpg",
            ]
        );
    }

    #[test]
    fn failure_lines() {
        let lines = format_failure(
            2,
            Path::new("photos/broken.png"),
            "The image could not be read.",
        );
        assert_eq!(
            lines,
            vec![
                "002 broken.png",
                "    Source: photos/broken.png",
                "    Failed: The image could not be read.",
            ]
        );
    }

    #[test]
    fn summary_pluralises() {
        assert_eq!(format_summary(1, 2), "Upscaled 1 of 2 images");
        assert_eq!(format_summary(1, 1), "Upscaled 1 of 1 image");
    }

    #[test]
    fn mode_lines() {
        assert!(format_mode(Mode::Enhanced).contains("enhanced"));
        assert!(format_mode(Mode::Degraded).contains("no provider credential"));
    }

    // =========================================================================
    // Plan output
    // =========================================================================

    #[test]
    fn plan_line_capped() {
        let original = dims(2000, 3000);
        let plan = plan_upscale(original, 4, 4096).unwrap();
        assert_eq!(
            format_plan(original, 4, 4096, &plan),
            "2000x3000 at 4x \u{2192} 2731x4096 (scale 1.365, capped at 4096)"
        );
    }

    #[test]
    fn plan_line_uncapped() {
        let original = dims(1000, 1000);
        let plan = plan_upscale(original, 4, 4096).unwrap();
        assert_eq!(
            format_plan(original, 4, 4096, &plan),
            "1000x1000 at 4x \u{2192} 4000x4000 (scale 4)"
        );
    }
}
