// file: src/types/byte_size.rs
// version: 1.0.0
// guid: d7b1c35c-78d0-4874-9454-8d3518eba06b

//! Human readable byte sizes

const UNIT_LABELS: [&str; 5] = ["byte", "KiB", "MiB", "GiB", "TiB"];
const FACTOR: f64 = 1024.0;

/// Format a byte count using binary units with up to three decimals.
///
/// Values of at least half a unit are shown in the next larger unit,
/// e.g. 512 bytes become "0.5 KiB". Sizes beyond the TiB range stay in TiB.
pub fn format_byte_size(size_bytes: u64) -> String {
    let last = UNIT_LABELS.len() - 1;
    let mut value = size_bytes as f64;
    let mut exponent = 0;

    while value >= FACTOR && exponent < last {
        value /= FACTOR;
        exponent += 1;
    }

    if value >= FACTOR / 2.0 && exponent < last {
        value /= FACTOR;
        exponent += 1;
    }

    format!(
        "{} {}",
        trim_decimals(&format!("{:.3}", value)),
        UNIT_LABELS[exponent]
    )
}

fn trim_decimals(text: &str) -> &str {
    text.trim_end_matches('0').trim_end_matches('.')
}
