use crate::image_pipeline::PixelBuffer;
use crate::model::ValidationDecision;

const MAX_LABEL_LEN: usize = 48;

pub fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_LABEL_LEN {
        let mut truncated = label.chars().take(MAX_LABEL_LEN).collect::<String>();
        truncated.push('…');
        truncated
    } else {
        label.to_string()
    }
}

pub fn format_dimensions(pixels: &PixelBuffer) -> String {
    let layout = match pixels.channels() {
        1 => "grayscale",
        3 => "RGB",
        _ => "RGBA",
    };
    format!("{}×{} {layout}", pixels.width(), pixels.height())
}

pub fn format_slice_position(index: usize, total: usize) -> String {
    if total == 0 {
        return String::from("No slices");
    }
    let suffix = if total == 1 { "" } else { "s" };
    format!("Slice {} of {total} slice{suffix}", index + 1)
}

pub fn format_decision(decision: Option<&ValidationDecision>) -> String {
    match decision {
        Some(decision) => format!(
            "{} at {}",
            decision.outcome,
            decision.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => String::from("pending"),
    }
}
