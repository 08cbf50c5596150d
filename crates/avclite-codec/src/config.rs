//! 编解码器配置.

use serde::{Deserialize, Serialize};

/// 片数据结束判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RbspEndPolicy {
    /// 标准 more_rbsp_data(): 最后一个停止位之前仍有数据
    #[default]
    Exact,
    /// 剩余不足 17 位即视为结束
    Heuristic,
}

/// 解码器配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub rbsp_end: RbspEndPolicy,
    /// 单帧允许的最大宏块数
    #[serde(default = "default_max_macroblocks")]
    pub max_macroblocks: u32,
    /// 保留逐样本亮度残差平面 (宏块模式图总是输出)
    #[serde(default)]
    pub keep_diagnostics: bool,
}

fn default_max_macroblocks() -> u32 {
    // level 5.1 的 MaxFS
    139_264
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            rbsp_end: RbspEndPolicy::default(),
            max_macroblocks: default_max_macroblocks(),
            keep_diagnostics: false,
        }
    }
}

/// 编码器配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EncoderConfig {
    /// 片 QP (0..=51)
    #[serde(default = "default_qp")]
    pub qp: i32,
    /// chroma_qp_index_offset (-12..=12)
    #[serde(default)]
    pub chroma_qp_index_offset: i32,
    /// 每隔多少帧插入一个 IDR, 0 表示只有第一帧
    #[serde(default = "default_idr_interval")]
    pub idr_interval: u32,
    #[serde(default = "default_level_idc")]
    pub level_idc: u8,
    /// 每个访问单元前写入 AUD
    #[serde(default)]
    pub emit_aud: bool,
    /// 允许 P_Skip 宏块
    #[serde(default = "default_true")]
    pub p_skip: bool,
}

fn default_qp() -> i32 {
    26
}

fn default_idr_interval() -> u32 {
    30
}

fn default_level_idc() -> u8 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            qp: default_qp(),
            chroma_qp_index_offset: 0,
            idr_interval: default_idr_interval(),
            level_idc: default_level_idc(),
            emit_aud: false,
            p_skip: true,
        }
    }
}
