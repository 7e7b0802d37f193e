//! 通用工具函数

use uuid::Uuid;

/// 生成带实体前缀的短标识符，形如 scan_9f8b2c1d
pub fn short_id(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &simple[..8])
}

/// 生成零填充的年度流水编号，形如 RPT-2025-0042
pub fn sequence_number(prefix: &str, year: i32, seq: usize) -> String {
    format!("{}-{}-{:04}", prefix, year, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_format() {
        let id = short_id("scan");
        assert!(id.starts_with("scan_"));
        assert_eq!(id.len(), "scan_".len() + 8);
        assert!(id["scan_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_short_id_unique() {
        assert_ne!(short_id("usr"), short_id("usr"));
    }

    #[test]
    fn test_sequence_number_padding() {
        assert_eq!(sequence_number("RPT", 2025, 7), "RPT-2025-0007");
        assert_eq!(sequence_number("P", 2025, 1234), "P-2025-1234");
    }
}
