use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 失败现场：按调用顺序排列的若干行，最内层原因在最后
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Traceback(Vec<String>);

impl Traceback {
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    /// 从错误链构造：最外层上下文在前，根因在后
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self(error.chain().map(|cause| cause.to_string()).collect())
    }

    /// 从 panic 载荷构造
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self(vec![format!("panicked: {message}")])
    }

    /// 在最前面加一行上下文
    pub fn with_context(mut self, line: impl Into<String>) -> Self {
        self.0.insert(0, line.into());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn into_lines(self) -> Vec<String> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Traceback {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn error_chain_puts_root_cause_last() {
        let err = std::fs::read("/definitely/not/here")
            .context("reading seed list")
            .context("crawl-x failed")
            .unwrap_err();
        let traceback = Traceback::from_error(&err);
        let lines = traceback.lines();
        assert_eq!(lines[0], "crawl-x failed");
        assert_eq!(lines[1], "reading seed list");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(Traceback::from_panic(payload.as_ref()).lines(), ["panicked: boom"]);

        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        assert_eq!(
            Traceback::from_panic(payload.as_ref()).lines(),
            ["panicked: index out of bounds"]
        );
    }

    #[test]
    fn serializes_as_plain_array() {
        let traceback = Traceback::new(vec!["a".into(), "b".into()]);
        assert_eq!(serde_json::to_string(&traceback).unwrap(), r#"["a","b"]"#);
    }
}
