//! 文本分块
//!
//! 按空白切词，贪心地把词拼进当前分块，长度以 Unicode 标量值计。
//! 单个超长词独占一个分块，不会在词中间截断。

/// 默认分块大小（字符）
pub const DEFAULT_CHUNK_SIZE: usize = 2500;

/// 将文本切分为不超过 `limit` 字符的分块
///
/// 分块内的词以单个空格连接。空文本或纯空白文本返回空列表。
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + word_len + 1 <= limit {
            current.push(' ');
            current.push_str(word);
            current_len += word_len + 1;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}
