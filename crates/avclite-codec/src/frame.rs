//! 解码后的帧 (Frame).

use avclite_core::Picture;

use crate::packet::NOPTS_VALUE;

/// 图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// 帧内编码
    I,
    /// 前向预测
    P,
}

/// 视频帧: 一幅 4:2:0 图像加时间信息
#[derive(Debug, Clone)]
pub struct Frame {
    pub picture: Picture,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    pub is_keyframe: bool,
    pub picture_type: PictureType,
}

impl Frame {
    /// 包装一幅图像, 时间戳未设置
    pub fn new(picture: Picture) -> Self {
        Self {
            picture,
            pts: NOPTS_VALUE,
            is_keyframe: false,
            picture_type: PictureType::None,
        }
    }

    /// 设置 PTS
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = pts;
        self
    }

    pub fn width(&self) -> usize {
        self.picture.width()
    }

    pub fn height(&self) -> usize {
        self.picture.height()
    }
}
