use serde::Deserialize;
use thiserror::Error;

/// パイプラインの設定
///
/// ```toml
/// passes = ["ComponentCall", "StringConcatenation"]
/// verify_tree = true
/// parallel = false
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// 実行する下げパスの名前。書いた順に実行されます
    pub passes: Vec<String>,
    /// 各パスの後で木の所有関係と契約を検査するかどうか
    pub verify_tree: bool,
    /// 複数の翻訳単位を並列に処理するかどうか
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            passes: vec!["ComponentCall".to_string(), "StringConcatenation".to_string()],
            verify_tree: true,
            parallel: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pipeline configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown lowering pass `{name}`")]
    UnknownPass { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = PipelineConfig::from_toml_str("parallel = false").unwrap();
        assert!(!config.parallel);
        assert!(config.verify_tree);
        assert_eq!(config.passes, PipelineConfig::default().passes);
        assert_eq!(PipelineConfig::from_toml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_pass_order_is_kept() {
        let config = PipelineConfig::from_toml_str(r#"passes = ["StringConcatenation"]"#).unwrap();
        assert_eq!(config.passes, vec!["StringConcatenation".to_string()]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = PipelineConfig::from_toml_str("verify = true");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
