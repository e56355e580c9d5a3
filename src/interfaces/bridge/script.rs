//! ドキュメント側の関数呼び出しの組み立て

use super::BridgeError;
use serde::Serialize;
use serde_json::Value;

/// ドキュメント側の関数を呼び出すスクリプト
///
/// 引数はすべて JSON としてエンコードする
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    function: String,
    args: Vec<Value>,
}

impl ScriptCall {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Serialize) -> Result<Self, BridgeError> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// 実行するスクリプトを作成する
    pub fn render(&self) -> Result<String, BridgeError> {
        if !is_function_path(&self.function) {
            return Err(BridgeError::InvalidFunction(self.function.clone()));
        }

        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            args.push(escape_line_terminators(&serde_json::to_string(arg)?));
        }
        Ok(format!("{}({});", self.function, args.join(",")))
    }
}

/// `name` または `ns.name` の形の識別子か
fn is_function_path(function: &str) -> bool {
    !function.is_empty()
        && function.split('.').all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => chars
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
                _ => false,
            }
        })
}

/// JSON では有効だが JavaScript の文字列リテラルでは改行扱いになる文字
fn escape_line_terminators(json: &str) -> String {
    json.replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}
