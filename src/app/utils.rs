//! 辅助函数
//!
//! 包含通用工具函数。

use anyhow::{bail, Context, Result};
use std::path::Path;
use url::Url;

/// 检查是否为回环地址
pub fn is_loopback_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<std::net::IpAddr>() {
        Ok(addr) => addr.is_loopback(),
        Err(_) => false,
    }
}

/// 校验自定义 API Host
///
/// 凭证放在请求头里发送，非回环地址必须使用 https。
pub fn validate_api_host(url: &str) -> Result<()> {
    let parsed = Url::parse(url).with_context(|| format!("无效的 API Host: {url}"))?;
    let Some(host) = parsed.host_str() else {
        bail!("无效的 API Host: {url}");
    };
    match parsed.scheme() {
        "https" => Ok(()),
        "http" if is_loopback_host(host) => Ok(()),
        _ => bail!("API Host 必须使用 https（本机地址除外）: {url}"),
    }
}

/// 按行解析凭证，去掉空行
pub fn parse_key_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 读取待转换文本：`--text` 优先，否则读取 `--input` 文件
pub fn read_text_input(input: Option<&Path>, text: Option<String>) -> Result<String> {
    match (text, input) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("无法读取输入文件 {}", path.display())),
        (None, None) => bail!("需要 --input 或 --text"),
    }
}

/// 默认输出文件名前缀：输入文件名（不含扩展名）
pub fn base_name_from_input(input: Option<&Path>) -> Option<String> {
    input
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_loopback_host() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("::1"));
        assert!(is_loopback_host("[::1]"));
        assert!(!is_loopback_host("0.0.0.0"));
        assert!(!is_loopback_host("192.168.1.1"));
    }

    #[test]
    fn test_validate_api_host() {
        assert!(validate_api_host("https://api.elevenlabs.io").is_ok());
        assert!(validate_api_host("http://127.0.0.1:8080").is_ok());
        assert!(validate_api_host("http://[::1]:9000/proxy").is_ok());
        assert!(validate_api_host("http://localhost").is_ok());
        assert!(validate_api_host("http://proxy.example.com").is_err());
        assert!(validate_api_host("api.elevenlabs.io").is_err());
        assert!(validate_api_host("ftp://127.0.0.1").is_err());
    }

    #[test]
    fn test_validate_api_host_rejects_lookalike_loopback() {
        for url in [
            "http://evil.example.com#@127.0.0.1",
            "http://evil.example.com?@127.0.0.1",
            "http://evil.example.com\\@127.0.0.1",
            "http://127.0.0.1.evil.example.com",
            "http://localhost.evil.example.com:8080",
            "http://127.0.0.1@evil.example.com",
        ] {
            assert!(validate_api_host(url).is_err(), "{url} should be rejected");
        }
        assert!(validate_api_host("http://user@127.0.0.1:8080").is_ok());
    }

    #[test]
    fn test_parse_key_lines() {
        let keys = parse_key_lines("  sk-one \n\n sk-two\r\n\t\nsk-three");
        assert_eq!(keys, vec!["sk-one", "sk-two", "sk-three"]);
    }

    #[test]
    fn test_read_text_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapter.txt");
        std::fs::write(&path, "from file").unwrap();

        assert_eq!(read_text_input(Some(&path), None).unwrap(), "from file");
        assert_eq!(
            read_text_input(Some(&path), Some("inline".into())).unwrap(),
            "inline"
        );
        assert!(read_text_input(None, None).is_err());
        assert!(read_text_input(Some(&dir.path().join("missing.txt")), None).is_err());
    }

    #[test]
    fn test_base_name_from_input() {
        assert_eq!(
            base_name_from_input(Some(Path::new("/books/chapter-01.txt"))),
            Some("chapter-01".to_string())
        );
        assert_eq!(base_name_from_input(None), None);
    }
}
