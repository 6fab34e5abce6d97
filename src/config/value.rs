//! 嵌套配置值
//!
//! `workerConfig` 和密钥数据都是任意形状的键值树，这里用递归的标签值类型表示，
//! 并实现确定性的深度合并。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 映射类型，键按字典序排列
pub type ValueMap = BTreeMap<String, Value>;

/// 递归配置值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// 空值
    Null,
    /// 布尔值
    Bool(bool),
    /// 整数
    Integer(i64),
    /// 浮点数
    Float(f64),
    /// 字符串
    String(String),
    /// 有序列表
    List(Vec<Value>),
    /// 字符串键映射
    Map(ValueMap),
}

/// 列表合并策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMerge {
    /// 覆盖层的列表整体替换基础列表
    #[default]
    Replace,
    /// 覆盖层的元素追加在基础列表之后
    Append,
}

impl Value {
    /// 创建空映射
    pub fn empty_map() -> Self {
        Value::Map(ValueMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// 按键读取映射中的值
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// 按点分隔路径读取嵌套值，例如 `"a.b.c"`
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// 简短的类型名称，用于错误信息
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// 将 `overlay` 深度合并到当前值之上，冲突时 `overlay` 优先
    ///
    /// # 规则
    /// - 映射与映射：逐键递归合并
    /// - 列表与列表：按 `lists` 策略替换或追加
    /// - 其余组合：`overlay` 直接替换当前值（包括 `overlay` 为空值的情况）
    pub fn merge(self, overlay: Value, lists: ListMerge) -> Value {
        match (self, overlay) {
            (Value::Map(mut base), Value::Map(over)) => {
                for (key, value) in over {
                    let merged = match base.remove(&key) {
                        Some(existing) => existing.merge(value, lists),
                        None => value,
                    };
                    base.insert(key, merged);
                }
                Value::Map(base)
            }
            (Value::List(mut base), Value::List(over)) if lists == ListMerge::Append => {
                base.extend(over);
                Value::List(base)
            }
            (_, over) => over,
        }
    }

    /// 查找第一个非有限浮点数（`inf`、`-inf`、`nan`），返回其点分隔路径
    ///
    /// JSON 无法表示这些值，含有它们的配置不能写入缓存后原样读回。
    pub fn find_non_finite(&self) -> Option<String> {
        match self {
            Value::Float(f) if !f.is_finite() => Some(String::new()),
            Value::List(items) => items.iter().enumerate().find_map(|(index, item)| {
                item.find_non_finite()
                    .map(|rest| join_path(&index.to_string(), &rest))
            }),
            Value::Map(map) => map.iter().find_map(|(key, item)| {
                item.find_non_finite().map(|rest| join_path(key, &rest))
            }),
            _ => None,
        }
    }

    /// 依次访问所有字符串叶子，允许原地修改
    ///
    /// 映射的键不会被访问。
    pub fn try_for_each_string_mut<E, F>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut String) -> Result<(), E>,
    {
        match self {
            Value::String(s) => f(s),
            Value::List(items) => items
                .iter_mut()
                .try_for_each(|item| item.try_for_each_string_mut(f)),
            Value::Map(map) => map
                .values_mut()
                .try_for_each(|item| item.try_for_each_string_mut(f)),
            _ => Ok(()),
        }
    }
}

/// 拼接点分隔路径，`rest` 为空时只返回 `head`
pub(crate) fn join_path(head: &str, rest: &str) -> String {
    if rest.is_empty() {
        head.to_string()
    } else {
        format!("{}.{}", head, rest)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty_map()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Map(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
