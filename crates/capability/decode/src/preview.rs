use std::fmt::Write;

/// 预览截断标记。
pub const TRUNCATION_MARKER: &str = "...";

/// 十六进制预览：每个字符转为大写十六进制码（至少两位），空格分隔；
/// 超过 `max_chars` 时截断并追加 [`TRUNCATION_MARKER`]。
///
/// 这是展示辅助，不是线上字节的忠实 hex dump。
pub fn hex_preview(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(max_chars.saturating_add(TRUNCATION_MARKER.len()));
    for (index, ch) in text.chars().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", ch as u32);
        // 输出只含 ASCII，len() 即字符数
        if out.len() > max_chars {
            out.truncate(max_chars);
            out.push_str(TRUNCATION_MARKER);
            return out;
        }
    }
    out
}
