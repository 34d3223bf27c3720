use log::warn;

const TB: f64 = 1e12;
const GB: f64 = 1e9;
const MB: f64 = 1e6;
const KB: f64 = 1e3;

/// Parse a human-readable size string ("12.3G", "500K", "812") into a byte count.
///
/// Unit letters are case-insensitive and decimal (T=10^12 … K=10^3, B=1); a bare
/// numeric string is already a byte count. Upstream data is unreliable, so
/// malformed input is logged and counted as 0 rather than failing the whole
/// averaging pass.
pub fn size_to_bytes(size: &str) -> u64 {
    let s = size.trim();
    if s.is_empty() {
        warn!("invalid size value: {:?}", size);
        return 0;
    }

    let last = s.chars().last().unwrap();
    let (number, multiplier) = if last.is_ascii_digit() {
        (s, 1.0)
    } else {
        let mult = match last.to_ascii_uppercase() {
            'T' => TB,
            'G' => GB,
            'M' => MB,
            'K' => KB,
            'B' => 1.0,
            _ => {
                warn!("invalid size value: {:?}", size);
                return 0;
            }
        };
        (&s[..s.len() - last.len_utf8()], mult)
    };

    match number.parse::<f64>() {
        Ok(n) if n >= 0.0 => (n * multiplier) as u64,
        _ => {
            warn!("invalid size value: {:?}", size);
            0
        }
    }
}

/// Format a byte count using the largest unit that keeps the numeric part >= 1,
/// always with two decimals and no space: 2_000_000_000 → "2.00G".
pub fn bytes_to_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= TB      { format!("{:.2}T", b / TB) }
    else if b >= GB { format!("{:.2}G", b / GB) }
    else if b >= MB { format!("{:.2}M", b / MB) }
    else if b >= KB { format!("{:.2}K", b / KB) }
    else            { format!("{:.2}B", b) }
}
