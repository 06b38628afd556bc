use std::time::Duration;

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub fn format_qps(qps: f64) -> String {
    if qps >= 1_000_000.0 {
        format!("{:.2}M", qps / 1_000_000.0)
    } else if qps >= 1_000.0 {
        format!("{:.2}K", qps / 1_000.0)
    } else {
        format!("{:.2}", qps)
    }
}

/// Operations per second, 0 for an unmeasurably short run
pub fn rate(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// One search result line: address left-aligned in 15 columns
pub fn format_search_line(address: &str, matched: bool) -> String {
    format!("{:<15.15}  {}", address, if matched { "matched" } else { "-" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(500000), "500,000");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(31), "31 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
    }

    #[test]
    fn test_format_search_line() {
        assert_eq!(format_search_line("10.0.0.1", true), "10.0.0.1         matched");
        assert_eq!(
            format_search_line("255.255.255.255x", false),
            "255.255.255.255  -"
        );
    }
}
